//! Snapshot Model
//!
//! Point-in-time copies of object and world state. A `GameState` is built
//! once per authoritative tick and never mutated afterwards; consumers share
//! it behind an `Arc` and interpolate between two of them.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::props::{PropertyMap, PropertyValue};
use crate::core::vec2::Vec2;
use crate::game::object::{ObjectId, ObjectType};

/// World-state key holding the round phase / game mode.
pub const WORLD_PHASE: &str = "phase";

/// World-state key holding the authoritative tick counter.
pub const WORLD_TICK: &str = "tick";

// =============================================================================
// OBJECT STATE
// =============================================================================

/// Replicated state of one object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameObjectState {
    /// Top-left corner
    pub position: Vec2,
    pub velocity: Vec2,
    /// Degrees
    pub rotation: f32,
    pub scale: Vec2,
    /// False once tombstoned
    pub active: bool,
    pub health: f32,
    pub mass: f32,
    pub object_type: ObjectType,
    /// User and kind properties
    pub custom: PropertyMap,
    pub animation_tag: String,
    pub animation_time: f32,
    /// Last input sequence the authority applied
    pub last_input_sequence: u32,
    /// Authority clock, milliseconds
    pub timestamp: u64,
}

impl GameObjectState {
    /// Interpolate from `a` to `b`.
    ///
    /// `t` is clamped to [0, 1] and the endpoints return exact copies.
    /// Position, velocity, scale and health are linear; rotation takes the
    /// shortest way around. Flags, type, tag, properties and input sequence
    /// are taken from `b`. Animation time is interpolated only while the
    /// tag is unchanged.
    pub fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        if t.is_nan() || t <= 0.0 {
            return a.clone();
        }
        if t >= 1.0 {
            return b.clone();
        }

        let animation_time = if a.animation_tag == b.animation_tag {
            lerp_f32(a.animation_time, b.animation_time, t)
        } else {
            b.animation_time
        };

        Self {
            position: a.position.lerp(b.position, t),
            velocity: a.velocity.lerp(b.velocity, t),
            rotation: lerp_angle(a.rotation, b.rotation, t),
            scale: a.scale.lerp(b.scale, t),
            active: b.active,
            health: lerp_f32(a.health, b.health, t),
            mass: b.mass,
            object_type: b.object_type,
            custom: b.custom.clone(),
            animation_tag: b.animation_tag.clone(),
            animation_time,
            last_input_sequence: b.last_input_sequence,
            timestamp: lerp_u64(a.timestamp, b.timestamp, t),
        }
    }
}

#[inline]
fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn lerp_u64(a: u64, b: u64, t: f32) -> u64 {
    if b >= a {
        a + ((b - a) as f64 * t as f64) as u64
    } else {
        a - ((a - b) as f64 * t as f64) as u64
    }
}

/// Shortest-path angle interpolation in degrees.
///
/// The difference is mapped into [-180, 180) before scaling, so 170 to -170
/// passes through 180 rather than 0.
pub fn lerp_angle(a: f32, b: f32, t: f32) -> f32 {
    let diff = (b - a + 180.0).rem_euclid(360.0) - 180.0;
    a + diff * t
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Immutable world snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    sequence: u32,
    timestamp: u64,
    objects: BTreeMap<ObjectId, GameObjectState>,
    world: PropertyMap,
}

impl GameState {
    /// Build a snapshot.
    pub fn new(
        sequence: u32,
        timestamp: u64,
        objects: BTreeMap<ObjectId, GameObjectState>,
        world: PropertyMap,
    ) -> Self {
        Self {
            sequence,
            timestamp,
            objects,
            world,
        }
    }

    /// Authority sequence number.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Authority clock, milliseconds.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Per-object states.
    pub fn objects(&self) -> &BTreeMap<ObjectId, GameObjectState> {
        &self.objects
    }

    /// State of one object.
    pub fn get(&self, id: &ObjectId) -> Option<&GameObjectState> {
        self.objects.get(id)
    }

    /// Free-form world values.
    pub fn world(&self) -> &PropertyMap {
        &self.world
    }

    /// Round phase, if recorded.
    pub fn phase(&self) -> Option<&str> {
        self.world.get(WORLD_PHASE).and_then(PropertyValue::as_str)
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True if no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Interpolate two snapshots.
    ///
    /// Only ids present in both survive; the world map, sequence and
    /// membership come from `b`.
    pub fn interpolate(a: &GameState, b: &GameState, t: f32) -> GameState {
        let objects = b
            .objects
            .iter()
            .filter_map(|(id, sb)| {
                a.objects
                    .get(id)
                    .map(|sa| (*id, GameObjectState::lerp(sa, sb, t)))
            })
            .collect();

        let t_clamped = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        GameState {
            sequence: b.sequence,
            timestamp: lerp_u64(a.timestamp, b.timestamp, t_clamped),
            objects,
            world: b.world.clone(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
