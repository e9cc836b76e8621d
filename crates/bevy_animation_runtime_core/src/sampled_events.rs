use std::fmt::Write;

use bevy::reflect::{Reflect, std_traits::ReflectDefault};

use crate::{NodeIndex, animation_clip::AnimationEvent};

/// Half-open range `[start, end)` of events in a [`SampledEventsBuffer`].
///
/// Ranges stay valid until the buffer is reset; appending more events never
/// moves existing ones.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[reflect(Default)]
pub struct SampledEventRange {
    pub start: usize,
    pub end: usize,
}

impl SampledEventRange {
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "invalid sampled event range {start}..{end}");
        Self { start, end }
    }

    pub fn empty_at(index: usize) -> Self {
        Self::new(index, index)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..self.end).contains(&index)
    }

    /// Smallest range covering both ranges.
    pub fn combine(&self, other: &SampledEventRange) -> SampledEventRange {
        if self.is_empty() && other.is_empty() {
            return Self::empty_at(self.start.max(other.start));
        }
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn indices(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SampledEventKind {
    Animation(AnimationEvent),
    State(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SampledEvent {
    source_node: NodeIndex,
    kind: SampledEventKind,
    percentage_through: f32,
    weight: f32,
    is_from_inactive_branch: bool,
    is_ignored: bool,
}

impl SampledEvent {
    pub fn source_node(&self) -> NodeIndex {
        self.source_node
    }

    pub fn kind(&self) -> &SampledEventKind {
        &self.kind
    }

    pub fn id(&self) -> &str {
        match &self.kind {
            SampledEventKind::Animation(event) => &event.id,
            SampledEventKind::State(id) => id,
        }
    }

    pub fn is_animation_event(&self) -> bool {
        matches!(self.kind, SampledEventKind::Animation(_))
    }

    pub fn is_state_event(&self) -> bool {
        matches!(self.kind, SampledEventKind::State(_))
    }

    pub fn animation_event(&self) -> Option<&AnimationEvent> {
        match &self.kind {
            SampledEventKind::Animation(event) => Some(event),
            SampledEventKind::State(_) => None,
        }
    }

    pub fn percentage_through(&self) -> f32 {
        self.percentage_through
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn is_from_active_branch(&self) -> bool {
        !self.is_from_inactive_branch
    }

    pub fn is_from_inactive_branch(&self) -> bool {
        self.is_from_inactive_branch
    }

    pub fn is_ignored(&self) -> bool {
        self.is_ignored
    }
}

/// Per-frame, append-only log of the events sampled during graph evaluation.
#[derive(Clone, Debug, Default)]
pub struct SampledEventsBuffer {
    events: Vec<SampledEvent>,
    num_animation_events: usize,
    num_state_events: usize,
}

impl SampledEventsBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.events.clear();
        self.num_animation_events = 0;
        self.num_state_events = 0;
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn num_animation_events(&self) -> usize {
        self.num_animation_events
    }

    pub fn num_state_events(&self) -> usize {
        self.num_state_events
    }

    pub fn get(&self, index: usize) -> Option<&SampledEvent> {
        self.events.get(index)
    }

    pub fn events(&self) -> &[SampledEvent] {
        &self.events
    }

    pub fn range(&self, range: SampledEventRange) -> &[SampledEvent] {
        &self.events[range.indices()]
    }

    /// Empty range at the current write offset.
    pub fn empty_range(&self) -> SampledEventRange {
        SampledEventRange::empty_at(self.events.len())
    }

    /// Range from `start` up to the current write offset.
    pub fn range_since(&self, start: usize) -> SampledEventRange {
        SampledEventRange::new(start, self.events.len())
    }

    pub fn emit_animation_event(
        &mut self,
        source_node: NodeIndex,
        event: AnimationEvent,
        percentage_through: f32,
        is_from_inactive_branch: bool,
    ) -> usize {
        self.num_animation_events += 1;
        self.push(SampledEvent {
            source_node,
            kind: SampledEventKind::Animation(event),
            percentage_through,
            weight: 1.,
            is_from_inactive_branch,
            is_ignored: false,
        })
    }

    pub fn emit_state_event(
        &mut self,
        source_node: NodeIndex,
        id: impl Into<String>,
        is_from_inactive_branch: bool,
    ) -> usize {
        self.num_state_events += 1;
        self.push(SampledEvent {
            source_node,
            kind: SampledEventKind::State(id.into()),
            percentage_through: 1.,
            weight: 1.,
            is_from_inactive_branch,
            is_ignored: false,
        })
    }

    fn push(&mut self, event: SampledEvent) -> usize {
        self.events.push(event);
        self.events.len() - 1
    }

    /// Copies every event of `other` to the end of this buffer, returning the
    /// range they now occupy. When `source_override` is set the copied events
    /// are attributed to that node.
    pub fn append(
        &mut self,
        other: &SampledEventsBuffer,
        source_override: Option<NodeIndex>,
    ) -> SampledEventRange {
        let start = self.events.len();
        self.events.extend(other.events.iter().cloned().map(|mut event| {
            if let Some(source) = source_override {
                event.source_node = source;
            }
            event
        }));
        self.num_animation_events += other.num_animation_events;
        self.num_state_events += other.num_state_events;
        self.range_since(start)
    }

    /// Multiplies the weight of every event in the range.
    pub fn update_weights(&mut self, range: SampledEventRange, weight: f32) {
        for event in &mut self.events[range.indices()] {
            event.weight *= weight;
        }
    }

    /// Scales events by the weight their source contributes to a two-way blend.
    pub fn blend_weights(
        &mut self,
        source_0: SampledEventRange,
        source_1: SampledEventRange,
        blend_weight: f32,
    ) {
        self.update_weights(source_0, 1. - blend_weight);
        self.update_weights(source_1, blend_weight);
    }

    pub fn mark_as_from_inactive_branch(&mut self, range: SampledEventRange) {
        for event in &mut self.events[range.indices()] {
            event.is_from_inactive_branch = true;
        }
    }

    pub fn mark_as_ignored(&mut self, range: SampledEventRange) {
        for event in &mut self.events[range.indices()] {
            event.is_ignored = true;
        }
    }

    pub fn animation_events(&self) -> impl Iterator<Item = &SampledEvent> {
        self.events.iter().filter(|e| e.is_animation_event())
    }

    pub fn state_events(&self) -> impl Iterator<Item = &SampledEvent> {
        self.events.iter().filter(|e| e.is_state_event())
    }

    /// Whether a non-ignored event with this id was sampled this frame.
    pub fn contains_event(&self, id: &str, only_from_active_branch: bool) -> bool {
        self.events.iter().any(|e| {
            e.id() == id && !e.is_ignored && (!only_from_active_branch || e.is_from_active_branch())
        })
    }

    /// Human readable table of every event, one per line.
    pub fn debug_table(&self) -> String {
        let mut table = String::new();
        let _ = writeln!(
            table,
            "{:>4} {:<6} {:<24} {:>5} {:<8} {:<7} {:>6} {:>6}",
            "#", "type", "id", "node", "branch", "ignored", "weight", "%"
        );
        for (index, event) in self.events.iter().enumerate() {
            let _ = writeln!(
                table,
                "{:>4} {:<6} {:<24} {:>5} {:<8} {:<7} {:>6.3} {:>6.3}",
                index,
                if event.is_animation_event() { "anim" } else { "state" },
                event.id(),
                event.source_node,
                if event.is_from_inactive_branch { "inactive" } else { "active" },
                event.is_ignored,
                event.weight,
                event.percentage_through,
            );
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn footstep() -> AnimationEvent {
        AnimationEvent::immediate("footstep", 0.5)
    }

    #[test]
    fn test_ranges_stay_valid_after_append() {
        let mut buffer = SampledEventsBuffer::new();
        let start = buffer.len();
        buffer.emit_animation_event(1, footstep(), 1., false);
        buffer.emit_state_event(2, "entered", false);
        let first = buffer.range_since(start);

        let start = buffer.len();
        buffer.emit_animation_event(3, AnimationEvent::immediate("land", 0.1), 1., false);
        let second = buffer.range_since(start);

        assert_eq!(first, SampledEventRange::new(0, 2));
        assert_eq!(second, SampledEventRange::new(2, 3));
        assert_eq!(buffer.range(first)[0].id(), "footstep");
        assert_eq!(buffer.range(first)[1].id(), "entered");
        assert_eq!(buffer.num_animation_events(), 2);
        assert_eq!(buffer.num_state_events(), 1);
    }

    #[test]
    fn test_blend_weights() {
        let mut buffer = SampledEventsBuffer::new();
        buffer.emit_animation_event(0, footstep(), 1., false);
        buffer.emit_animation_event(1, footstep(), 1., false);

        buffer.blend_weights(SampledEventRange::new(0, 1), SampledEventRange::new(1, 2), 0.25);

        assert!((buffer.events()[0].weight() - 0.75).abs() < 1e-6);
        assert!((buffer.events()[1].weight() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_append_reanchors_and_overrides_source() {
        let mut child = SampledEventsBuffer::new();
        child.emit_animation_event(0, footstep(), 1., false);
        child.emit_state_event(1, "jump", false);

        let mut parent = SampledEventsBuffer::new();
        parent.emit_state_event(4, "idle", false);
        let range = parent.append(&child, Some(7));

        assert_eq!(range, SampledEventRange::new(1, 3));
        assert!(parent.range(range).iter().all(|e| e.source_node() == 7));
        assert_eq!(parent.num_state_events(), 2);
        assert_eq!(parent.num_animation_events(), 1);
    }

    #[test]
    fn test_flags() {
        let mut buffer = SampledEventsBuffer::new();
        buffer.emit_animation_event(0, footstep(), 1., false);
        buffer.emit_state_event(0, "footstep", false);

        buffer.mark_as_from_inactive_branch(SampledEventRange::new(0, 1));
        assert!(buffer.contains_event("footstep", true));

        buffer.mark_as_ignored(SampledEventRange::new(1, 2));
        assert!(!buffer.contains_event("footstep", true));
        assert!(buffer.contains_event("footstep", false));

        buffer.reset();
        assert!(buffer.is_empty());
        assert_eq!(buffer.num_animation_events(), 0);
    }

    #[test]
    fn test_combine_ranges() {
        let a = SampledEventRange::new(2, 4);
        let b = SampledEventRange::new(4, 6);
        assert_eq!(a.combine(&b), SampledEventRange::new(2, 6));
        assert_eq!(a.combine(&SampledEventRange::empty_at(9)), a);
    }
}
