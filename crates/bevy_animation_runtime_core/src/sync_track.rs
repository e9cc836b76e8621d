use bevy::reflect::{Reflect, std_traits::ReflectDefault};
use serde::{Deserialize, Serialize};

/// A named marker on a clip's normalized timeline.
#[derive(Clone, Debug, PartialEq, Reflect, Serialize, Deserialize)]
pub struct SyncTrackMarker {
    pub id: String,
    /// Percentage through the clip at which the marker sits.
    pub start: f32,
}

#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct SyncTrackEvent {
    pub id: String,
    pub start: f32,
    pub duration: f32,
}

/// A position on a sync track: the event we're in and how far through it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Reflect)]
#[reflect(Default)]
pub struct SyncTrackTime {
    pub event_index: i32,
    pub percentage_through: f32,
}

impl SyncTrackTime {
    pub fn new(event_index: i32, percentage_through: f32) -> Self {
        Self {
            event_index,
            percentage_through,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Reflect)]
#[reflect(Default)]
pub struct SyncTrackTimeRange {
    pub start: SyncTrackTime,
    pub end: SyncTrackTime,
}

/// Sequence of events partitioning a normalized timeline.
///
/// Events are contiguous and cover the whole `[0, 1]` range. If the first
/// marker does not sit at 0, the last event wraps around and also covers the
/// start of the timeline.
#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct SyncTrack {
    events: Vec<SyncTrackEvent>,
}

impl Default for SyncTrack {
    fn default() -> Self {
        Self {
            events: vec![SyncTrackEvent {
                id: "Default".into(),
                start: 0.,
                duration: 1.,
            }],
        }
    }
}

impl SyncTrack {
    pub fn new(mut markers: Vec<SyncTrackMarker>) -> Self {
        markers.retain(|m| (0. ..1.).contains(&m.start));
        if markers.is_empty() {
            return Self::default();
        }
        markers.sort_by(|a, b| a.start.total_cmp(&b.start));

        let first_start = markers[0].start;
        let events = markers
            .iter()
            .enumerate()
            .map(|(i, marker)| {
                let end = markers
                    .get(i + 1)
                    .map_or(first_start + 1., |next| next.start);
                SyncTrackEvent {
                    id: marker.id.clone(),
                    start: marker.start,
                    duration: end - marker.start,
                }
            })
            .collect();

        Self { events }
    }

    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    pub fn event(&self, index: usize) -> Option<&SyncTrackEvent> {
        self.events.get(index)
    }

    pub fn events(&self) -> &[SyncTrackEvent] {
        &self.events
    }

    pub fn event_index(&self, id: &str) -> Option<usize> {
        self.events.iter().position(|e| e.id == id)
    }

    fn wrap_event_index(&self, index: i32) -> usize {
        index.rem_euclid(self.events.len() as i32) as usize
    }

    /// Converts a percentage through the timeline into a sync track time.
    pub fn get_time(&self, percentage: f32) -> SyncTrackTime {
        let percentage = percentage.clamp(0., 1.);
        let first_start = self.events[0].start;
        // Values before the first marker belong to the wrapping last event.
        let shifted = if percentage < first_start {
            percentage + 1.
        } else {
            percentage
        };

        let index = self
            .events
            .iter()
            .rposition(|e| e.start <= shifted)
            .unwrap_or(self.events.len() - 1);
        let event = &self.events[index];
        let percentage_through = if event.duration > 0. {
            ((shifted - event.start) / event.duration).clamp(0., 1.)
        } else {
            0.
        };

        SyncTrackTime::new(index as i32, percentage_through)
    }

    /// Converts a sync track time back into a percentage through the
    /// timeline. Event indices wrap around the track.
    pub fn get_percentage_through(&self, time: SyncTrackTime) -> f32 {
        let event = &self.events[self.wrap_event_index(time.event_index)];
        let percentage = event.start + time.percentage_through.clamp(0., 1.) * event.duration;
        if percentage > 1. {
            percentage - 1.
        } else {
            percentage
        }
    }

    /// Offsets a time by a number of whole events.
    pub fn offset_time(&self, time: SyncTrackTime, event_offset: i32) -> SyncTrackTime {
        SyncTrackTime::new(
            self.wrap_event_index(time.event_index + event_offset) as i32,
            time.percentage_through,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(id: &str, start: f32) -> SyncTrackMarker {
        SyncTrackMarker {
            id: id.into(),
            start,
        }
    }

    #[test]
    fn test_default_track_is_identity() {
        let track = SyncTrack::default();
        for p in [0., 0.25, 0.5, 1.] {
            let time = track.get_time(p);
            assert_eq!(time.event_index, 0);
            assert!((track.get_percentage_through(time) - p).abs() < 1e-6);
        }
    }

    #[test]
    fn test_markers_partition_timeline() {
        let track = SyncTrack::new(vec![marker("right", 0.5), marker("left", 0.)]);

        assert_eq!(track.num_events(), 2);
        assert_eq!(track.event(0).unwrap().id, "left");
        assert_eq!(track.get_time(0.75), SyncTrackTime::new(1, 0.5));
        assert_eq!(track.get_time(0.25), SyncTrackTime::new(0, 0.5));
    }

    #[test]
    fn test_wrapping_last_event() {
        let track = SyncTrack::new(vec![marker("a", 0.2), marker("b", 0.6)]);
        let last = track.event(1).unwrap();
        assert!((last.duration - 0.6).abs() < 1e-6);

        // 0.1 sits before the first marker, so it belongs to "b"
        let time = track.get_time(0.1);
        assert_eq!(time.event_index, 1);
        assert!((time.percentage_through - 0.5 / 0.6).abs() < 1e-5);
        assert!((track.get_percentage_through(time) - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_offset_wraps() {
        let track = SyncTrack::new(vec![marker("a", 0.), marker("b", 0.5)]);
        let time = track.offset_time(SyncTrackTime::new(1, 0.3), 3);
        assert_eq!(time, SyncTrackTime::new(0, 0.3));
    }
}
