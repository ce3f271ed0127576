//! Game Events
//!
//! Notable outcomes of a tick (shots, hits, pickups, joins). Collected by
//! the engine in tick order and returned with the tick result for logging
//! and client feedback. Events never drive simulation state.

use serde::{Deserialize, Serialize};

use crate::game::object::{ObjectId, ObjectType};
use crate::network::ClientId;

/// Ordering of events within one tick.
///
/// Lower values sort first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Tank destroyed
    Destruction = 0,
    /// Damage dealt
    Damage = 1,
    /// Pickup collected
    Pickup = 2,
    /// Projectile fired
    Fire = 3,
    /// Membership, round changes
    Other = 4,
}

/// Event payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// A tank fired a projectile
    ProjectileFired {
        tank: ObjectId,
        projectile: ObjectId,
    },

    /// A tank took projectile damage and survived
    TankHit {
        tank: ObjectId,
        attacker: ObjectId,
        damage: f32,
        remaining_health: f32,
    },

    /// A tank reached zero health
    TankDestroyed {
        tank: ObjectId,
        attacker: Option<ObjectId>,
    },

    /// A tank picked something up
    PickupCollected {
        tank: ObjectId,
        pickup: ObjectId,
        kind: ObjectType,
    },

    /// A remote player joined and was given a tank
    PlayerJoined {
        client: ClientId,
        tank: ObjectId,
    },

    /// A remote player left; their tank was removed
    PlayerLeft {
        client: ClientId,
        tank: Option<ObjectId>,
    },

    /// Round mode changed (server announcement or lobby start)
    ModeChanged {
        mode: String,
    },
}

/// A game event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u64,

    /// Processing priority
    pub priority: EventPriority,

    /// Object involved (for tie-breaking)
    pub subject: Option<ObjectId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u64, priority: EventPriority, data: GameEventData) -> Self {
        let subject = match &data {
            GameEventData::ProjectileFired { tank, .. } => Some(*tank),
            GameEventData::TankHit { tank, .. } => Some(*tank),
            GameEventData::TankDestroyed { tank, .. } => Some(*tank),
            GameEventData::PickupCollected { tank, .. } => Some(*tank),
            GameEventData::PlayerJoined { tank, .. } => Some(*tank),
            GameEventData::PlayerLeft { tank, .. } => *tank,
            GameEventData::ModeChanged { .. } => None,
        };

        Self {
            tick,
            priority,
            subject,
            data,
        }
    }

    /// Create projectile fired event.
    pub fn projectile_fired(tick: u64, tank: ObjectId, projectile: ObjectId) -> Self {
        Self::new(
            tick,
            EventPriority::Fire,
            GameEventData::ProjectileFired { tank, projectile },
        )
    }

    /// Create tank hit event.
    pub fn tank_hit(tick: u64, tank: ObjectId, attacker: ObjectId, damage: f32, remaining_health: f32) -> Self {
        Self::new(
            tick,
            EventPriority::Damage,
            GameEventData::TankHit {
                tank,
                attacker,
                damage,
                remaining_health,
            },
        )
    }

    /// Create tank destroyed event.
    pub fn tank_destroyed(tick: u64, tank: ObjectId, attacker: Option<ObjectId>) -> Self {
        Self::new(
            tick,
            EventPriority::Destruction,
            GameEventData::TankDestroyed { tank, attacker },
        )
    }

    /// Create pickup collected event.
    pub fn pickup_collected(tick: u64, tank: ObjectId, pickup: ObjectId, kind: ObjectType) -> Self {
        Self::new(
            tick,
            EventPriority::Pickup,
            GameEventData::PickupCollected { tank, pickup, kind },
        )
    }

    /// Create player joined event.
    pub fn player_joined(tick: u64, client: ClientId, tank: ObjectId) -> Self {
        Self::new(tick, EventPriority::Other, GameEventData::PlayerJoined { client, tank })
    }

    /// Create player left event.
    pub fn player_left(tick: u64, client: ClientId, tank: Option<ObjectId>) -> Self {
        Self::new(tick, EventPriority::Other, GameEventData::PlayerLeft { client, tank })
    }

    /// Create mode changed event.
    pub fn mode_changed(tick: u64, mode: impl Into<String>) -> Self {
        Self::new(
            tick,
            EventPriority::Other,
            GameEventData::ModeChanged { mode: mode.into() },
        )
    }
}

impl PartialEq for GameEvent {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick
            && self.priority == other.priority
            && self.subject == other.subject
    }
}

impl Eq for GameEvent {}

impl PartialOrd for GameEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Sort by: tick, then priority, then subject
        self.tick
            .cmp(&other.tick)
            .then(self.priority.cmp(&other.priority))
            .then(self.subject.cmp(&other.subject))
    }
}
