//! Player Input
//!
//! Abstract per-frame input produced by whatever device layer sits above
//! the engine, plus a bounded ring buffer of sent-but-unacknowledged inputs
//! for resync.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::core::vec2::Vec2;

// =============================================================================
// ACTIONS
// =============================================================================

/// Discrete actions. The discriminant is the wire byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Action {
    /// Fire the main gun
    Fire = 0,
    /// Context action (lobby ready toggle)
    Interact = 1,
    /// Throttle, used as an analog intensity
    Boost = 2,
}

impl Action {
    /// Wire byte.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse the wire byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Action::Fire),
            1 => Some(Action::Interact),
            2 => Some(Action::Boost),
            _ => None,
        }
    }
}

// =============================================================================
// INPUT
// =============================================================================

/// Input for one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Monotonic per-sender sequence number
    pub sequence: u32,
    /// Sender clock, milliseconds
    pub timestamp: u64,
    /// Desired movement; snapped to a cardinal axis by the engine
    pub movement: Vec2,
    /// Aim point in world coordinates
    pub aim: Vec2,
    /// Actions held this frame
    pub actions: BTreeSet<Action>,
    /// Analog actions and their intensity in [0, 1]
    pub analog: BTreeMap<Action, f32>,
}

impl PlayerInput {
    /// Empty input with a sequence and timestamp.
    pub fn new(sequence: u32, timestamp: u64) -> Self {
        Self {
            sequence,
            timestamp,
            ..Self::default()
        }
    }

    /// Builder: set movement.
    pub fn with_movement(mut self, movement: Vec2) -> Self {
        self.movement = movement;
        self
    }

    /// Builder: hold an action.
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.insert(action);
        self
    }

    /// Check if an action is held.
    #[inline]
    pub fn has(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }

    /// Analog intensity, clamped to [0, 1]; 0 when absent or NaN.
    pub fn intensity(&self, action: Action) -> f32 {
        match self.analog.get(&action) {
            Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    /// Check if this input does nothing.
    pub fn is_idle(&self) -> bool {
        self.movement == Vec2::ZERO && self.actions.is_empty() && self.analog.is_empty()
    }
}

// =============================================================================
// INPUT BUFFER
// =============================================================================

/// Default ring capacity (about two seconds at 60 Hz).
pub const DEFAULT_INPUT_BUFFER: usize = 128;

/// Fixed-capacity ring of recent inputs, oldest first.
///
/// Pushing into a full buffer drops the oldest entry.
#[derive(Clone, Debug)]
pub struct InputBuffer {
    inputs: VecDeque<PlayerInput>,
    capacity: usize,
    acknowledged: u32,
}

impl InputBuffer {
    /// Create a buffer holding at most `capacity` inputs.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inputs: VecDeque::with_capacity(capacity),
            capacity,
            acknowledged: 0,
        }
    }

    /// Record an input. Returns the evicted entry, if any.
    pub fn push(&mut self, input: PlayerInput) -> Option<PlayerInput> {
        let evicted = if self.inputs.len() == self.capacity {
            self.inputs.pop_front()
        } else {
            None
        };
        self.inputs.push_back(input);
        evicted
    }

    /// Drop every input with `sequence <= seq`.
    pub fn acknowledge(&mut self, seq: u32) {
        self.acknowledged = self.acknowledged.max(seq);
        while self.inputs.front().is_some_and(|i| i.sequence <= seq) {
            self.inputs.pop_front();
        }
    }

    /// Highest acknowledged sequence.
    pub fn acknowledged(&self) -> u32 {
        self.acknowledged
    }

    /// Inputs not yet acknowledged, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &PlayerInput> {
        self.inputs.iter()
    }

    /// Input with the given sequence, if still buffered.
    pub fn get(&self, seq: u32) -> Option<&PlayerInput> {
        self.inputs.iter().find(|i| i.sequence == seq)
    }

    /// Most recent input.
    pub fn latest(&self) -> Option<&PlayerInput> {
        self.inputs.back()
    }

    /// Number of buffered inputs.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// True if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Maximum number of buffered inputs.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_BUFFER)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn input(seq: u32) -> PlayerInput {
        PlayerInput::new(seq, seq as u64 * 16)
    }

    #[test]
    fn test_action_codes() {
        for action in [Action::Fire, Action::Interact, Action::Boost] {
            assert_eq!(Action::from_u8(action.as_u8()), Some(action));
        }
        assert_eq!(Action::from_u8(200), None);
    }

    #[test]
    fn test_intensity_clamped() {
        let mut i = input(1);
        i.analog.insert(Action::Boost, 3.0);
        assert_eq!(i.intensity(Action::Boost), 1.0);
        i.analog.insert(Action::Boost, f32::NAN);
        assert_eq!(i.intensity(Action::Boost), 0.0);
        assert_eq!(i.intensity(Action::Fire), 0.0);
    }

    #[test]
    fn test_idle() {
        assert!(input(1).is_idle());
        assert!(!input(1).with_action(Action::Fire).is_idle());
        assert!(!input(1).with_movement(Vec2::RIGHT).is_idle());
    }

    #[test]
    fn test_ring_drops_oldest() {
        let mut buffer = InputBuffer::new(3);
        for seq in 1..=3 {
            assert!(buffer.push(input(seq)).is_none());
        }
        let evicted = buffer.push(input(4)).unwrap();
        assert_eq!(evicted.sequence, 1);
        assert_eq!(buffer.len(), 3);
        let seqs: Vec<u32> = buffer.pending().map(|i| i.sequence).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
    }

    #[test]
    fn test_acknowledge_prunes() {
        let mut buffer = InputBuffer::new(10);
        for seq in 1..=5 {
            buffer.push(input(seq));
        }
        buffer.acknowledge(3);
        assert_eq!(buffer.acknowledged(), 3);
        assert!(buffer.get(3).is_none());
        assert_eq!(buffer.get(4).map(|i| i.sequence), Some(4));
        assert_eq!(buffer.pending().count(), 2);

        // Stale acks never move backwards
        buffer.acknowledge(1);
        assert_eq!(buffer.acknowledged(), 3);
        assert_eq!(buffer.latest().map(|i| i.sequence), Some(5));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut buffer = InputBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push(input(1));
        buffer.push(input(2));
        assert_eq!(buffer.len(), 1);
    }
}
