use std::{any::Any, fmt};

use bevy::reflect::{Reflect, std_traits::ReflectDefault};
use bevy_animation_runtime_core::NodeIndex;

use crate::{
    errors::{GraphError, GraphResult},
    value::GraphValue,
};

/// Time of a pose node, as percentages through its duration.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq)]
#[reflect(Default)]
pub struct PoseNodeTime {
    pub previous_time: f32,
    pub current_time: f32,
    /// Duration in seconds.
    pub duration: f32,
}

impl PoseNodeTime {
    pub fn at(time: f32, duration: f32) -> Self {
        Self {
            previous_time: time,
            current_time: time,
            duration,
        }
    }
}

#[derive(Default)]
struct NodeState {
    /// Last computed value and the update it was computed in.
    cached_value: Option<(u64, GraphValue)>,
    time: PoseNodeTime,
    is_initialized: bool,
    last_active_update: Option<u64>,
    custom: Option<Box<dyn Any + Send + Sync>>,
}

impl fmt::Debug for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeState")
            .field("cached_value", &self.cached_value)
            .field("time", &self.time)
            .field("is_initialized", &self.is_initialized)
            .field("last_active_update", &self.last_active_update)
            .field("has_custom_state", &self.custom.is_some())
            .finish()
    }
}

/// Mutable per-instance state of every node of a graph.
#[derive(Debug, Default)]
pub struct NodeStates {
    states: Vec<NodeState>,
}

impl NodeStates {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            states: (0..num_nodes).map(|_| NodeState::default()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn get(&self, node: NodeIndex) -> &NodeState {
        &self.states[node as usize]
    }

    fn get_mut(&mut self, node: NodeIndex) -> &mut NodeState {
        &mut self.states[node as usize]
    }

    pub fn cached_value(&self, node: NodeIndex, update_id: u64) -> Option<&GraphValue> {
        match &self.get(node).cached_value {
            Some((id, value)) if *id == update_id => Some(value),
            _ => None,
        }
    }

    pub fn set_cached_value(&mut self, node: NodeIndex, update_id: u64, value: GraphValue) {
        self.get_mut(node).cached_value = Some((update_id, value));
    }

    pub fn was_value_updated(&self, node: NodeIndex, update_id: u64) -> bool {
        self.cached_value(node, update_id).is_some()
    }

    pub fn time(&self, node: NodeIndex) -> PoseNodeTime {
        self.get(node).time
    }

    pub fn time_mut(&mut self, node: NodeIndex) -> &mut PoseNodeTime {
        &mut self.get_mut(node).time
    }

    pub fn is_initialized(&self, node: NodeIndex) -> bool {
        self.get(node).is_initialized
    }

    pub fn set_initialized(&mut self, node: NodeIndex, is_initialized: bool) {
        self.get_mut(node).is_initialized = is_initialized;
    }

    /// Forces every node to be initialized again before its next update.
    pub fn clear_initialized(&mut self) {
        for state in &mut self.states {
            state.is_initialized = false;
        }
    }

    pub fn mark_active(&mut self, node: NodeIndex, update_id: u64) {
        self.get_mut(node).last_active_update = Some(update_id);
    }

    pub fn is_active(&self, node: NodeIndex, update_id: u64) -> bool {
        self.get(node).last_active_update == Some(update_id)
    }

    pub fn has_state(&self, node: NodeIndex) -> bool {
        self.get(node).custom.is_some()
    }

    pub fn set_state<T: Any + Send + Sync>(&mut self, node: NodeIndex, state: T) {
        self.get_mut(node).custom = Some(Box::new(state));
    }

    pub fn state<T: Any + Send + Sync>(&self, node: NodeIndex) -> GraphResult<&T> {
        self.get(node)
            .custom
            .as_ref()
            .ok_or(GraphError::MissingStateValue(node))
            .and_then(|state| {
                state
                    .downcast_ref::<T>()
                    .ok_or(GraphError::MismatchedStateType(node))
            })
    }

    pub fn state_mut<T: Any + Send + Sync>(&mut self, node: NodeIndex) -> GraphResult<&mut T> {
        self.get_mut(node)
            .custom
            .as_mut()
            .ok_or(GraphError::MissingStateValue(node))
            .and_then(|state| {
                state
                    .downcast_mut::<T>()
                    .ok_or(GraphError::MismatchedStateType(node))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_value_is_keyed_on_update() {
        let mut states = NodeStates::new(2);
        states.set_cached_value(1, 7, GraphValue::Float(1.5));

        assert_eq!(states.cached_value(1, 7), Some(&GraphValue::Float(1.5)));
        assert!(states.was_value_updated(1, 7));
        assert_eq!(states.cached_value(1, 8), None);
        assert!(!states.was_value_updated(0, 7));
    }

    #[test]
    fn test_custom_state() {
        let mut states = NodeStates::new(1);
        assert_eq!(states.state::<u32>(0), Err(GraphError::MissingStateValue(0)));

        states.set_state(0, 3_u32);
        *states.state_mut::<u32>(0).unwrap() += 1;
        assert_eq!(states.state::<u32>(0), Ok(&4));
        assert_eq!(
            states.state::<String>(0),
            Err(GraphError::MismatchedStateType(0))
        );
    }

    #[test]
    fn test_activity_and_initialization() {
        let mut states = NodeStates::new(1);
        states.mark_active(0, 3);
        assert!(states.is_active(0, 3));
        assert!(!states.is_active(0, 4));

        states.set_initialized(0, true);
        states.clear_initialized();
        assert!(!states.is_initialized(0));
    }
}
