//! Game Objects
//!
//! One struct for every simulated entity: shared physical state plus a
//! closed per-kind payload. Position is always the top-left corner of
//! `bounds`; physics works on the bounds center, so the two never diverge.
//!
//! Kind-specific fields travel on the wire inside the custom property map
//! under reserved keys (`type`, `ammo`, `owner`, ...).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::props::{PropertyMap, PropertyValue};
use crate::core::rng::DeterministicRng;
use crate::core::vec2::{Bounds, Vec2};
use crate::game::ai::{AiAgent, AiKind, WorldQuery};
use crate::game::state::GameObjectState;
use crate::network::codec::{ObjectRecord, WireError};
use crate::physics::collider::CompositeCollider;
use crate::physics::shape::CollisionShape;
use crate::physics::system::RigidBody;

/// Opaque object identity, 16 bytes on the wire.
pub type ObjectId = Uuid;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Tank footprint.
pub const TANK_SIZE: Vec2 = Vec2::new(64.0, 64.0);

/// Tank cruise speed (units/s).
pub const TANK_SPEED: f32 = 120.0;

/// Starting and maximum tank health.
pub const TANK_MAX_HEALTH: f32 = 100.0;

/// Ammo a freshly spawned tank carries.
pub const TANK_START_AMMO: i32 = 10;

/// Minimum seconds between player shots.
pub const PLAYER_FIRE_COOLDOWN: f32 = 0.25;

/// Fraction of angular velocity removed per second.
pub const ANGULAR_DAMPING: f32 = 4.0;

/// Projectile edge length; its collider is a circle of half this.
pub const PROJECTILE_SIZE: f32 = 8.0;

/// Projectile speed (units/s).
pub const PROJECTILE_SPEED: f32 = 100.0;

/// Damage per projectile hit.
pub const PROJECTILE_DAMAGE: f32 = 10.0;

/// Seconds before an unspent projectile expires.
pub const PROJECTILE_LIFETIME: f32 = 5.0;

/// Distance from the tank's leading reference to the projectile spawn.
pub const MUZZLE_DISTANCE: f32 = 100.0;

/// Pickup footprint.
pub const PICKUP_SIZE: Vec2 = Vec2::new(24.0, 24.0);

// Reserved property keys
const KEY_TYPE: &str = "type";
const KEY_AMMO: &str = "ammo";
const KEY_MAX_HEALTH: &str = "max_health";
const KEY_AI: &str = "ai";
const KEY_OWNER: &str = "owner";
const KEY_DAMAGE: &str = "damage";
const KEY_COUNT: &str = "count";
const KEY_AMOUNT: &str = "amount";

const RESERVED_KEYS: [&str; 8] = [
    KEY_TYPE,
    KEY_AMMO,
    KEY_MAX_HEALTH,
    KEY_AI,
    KEY_OWNER,
    KEY_DAMAGE,
    KEY_COUNT,
    KEY_AMOUNT,
];

// =============================================================================
// OBJECT TYPE
// =============================================================================

/// Type tag used for collision dispatch and wire identification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ObjectType {
    Tank = 0,
    Projectile = 1,
    Wall = 2,
    AmmoPickup = 3,
    HealthPickup = 4,
}

impl ObjectType {
    /// Wire byte.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse the wire byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ObjectType::Tank),
            1 => Some(ObjectType::Projectile),
            2 => Some(ObjectType::Wall),
            3 => Some(ObjectType::AmmoPickup),
            4 => Some(ObjectType::HealthPickup),
            _ => None,
        }
    }

    /// Name stored under the `type` property.
    pub const fn name(self) -> &'static str {
        match self {
            ObjectType::Tank => "Tank",
            ObjectType::Projectile => "Projectile",
            ObjectType::Wall => "Wall",
            ObjectType::AmmoPickup => "AmmoPickup",
            ObjectType::HealthPickup => "HealthPickup",
        }
    }

    /// Parse a `type` property.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Tank" => Some(ObjectType::Tank),
            "Projectile" => Some(ObjectType::Projectile),
            "Wall" => Some(ObjectType::Wall),
            "AmmoPickup" => Some(ObjectType::AmmoPickup),
            "HealthPickup" => Some(ObjectType::HealthPickup),
            _ => None,
        }
    }
}

// =============================================================================
// KIND PAYLOADS
// =============================================================================

/// Who drives a tank.
#[derive(Clone, Debug, PartialEq)]
pub enum Controller {
    /// Driven by `PlayerInput` (local player or a remote client).
    Input,
    /// Driven by an AI strategy.
    Ai(AiAgent),
}

/// Tank-only state.
#[derive(Clone, Debug, PartialEq)]
pub struct TankState {
    /// Remaining shots. AI tanks do not consume ammo.
    pub ammo: i32,
    /// Health ceiling for healing
    pub max_health: f32,
    /// Seconds until the next shot is allowed
    pub fire_cooldown: f32,
    /// Input source
    pub controller: Controller,
}

/// Projectile-only state.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectileState {
    /// Tank that fired it; never damaged by it.
    pub owner: ObjectId,
    /// Damage on hit
    pub damage: f32,
    /// Seconds alive
    pub age: f32,
}

/// Closed set of object kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectKind {
    Tank(TankState),
    Projectile(ProjectileState),
    Wall,
    AmmoPickup { count: i32 },
    HealthPickup { amount: f32 },
}

impl ObjectKind {
    /// Wire/dispatch tag of this kind.
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectKind::Tank(_) => ObjectType::Tank,
            ObjectKind::Projectile(_) => ObjectType::Projectile,
            ObjectKind::Wall => ObjectType::Wall,
            ObjectKind::AmmoPickup { .. } => ObjectType::AmmoPickup,
            ObjectKind::HealthPickup { .. } => ObjectType::HealthPickup,
        }
    }

    /// Kind fields as reserved properties.
    fn to_properties(&self, map: &mut PropertyMap) {
        map.insert(KEY_TYPE.into(), self.object_type().name().into());
        match self {
            ObjectKind::Tank(tank) => {
                map.insert(KEY_AMMO.into(), PropertyValue::Int(tank.ammo));
                map.insert(KEY_MAX_HEALTH.into(), PropertyValue::Float(tank.max_health));
                let ai = match &tank.controller {
                    Controller::Input => "none",
                    Controller::Ai(agent) => agent.kind.name(),
                };
                map.insert(KEY_AI.into(), ai.into());
            }
            ObjectKind::Projectile(p) => {
                map.insert(KEY_OWNER.into(), PropertyValue::String(p.owner.to_string()));
                map.insert(KEY_DAMAGE.into(), PropertyValue::Float(p.damage));
            }
            ObjectKind::Wall => {}
            ObjectKind::AmmoPickup { count } => {
                map.insert(KEY_COUNT.into(), PropertyValue::Int(*count));
            }
            ObjectKind::HealthPickup { amount } => {
                map.insert(KEY_AMOUNT.into(), PropertyValue::Float(*amount));
            }
        }
    }

    /// Rebuild a kind from reserved properties.
    ///
    /// Missing optional fields fall back to spawn defaults; a missing or
    /// unknown `type` is an error.
    fn from_properties(map: &PropertyMap) -> Result<Self, WireError> {
        let type_name = map
            .get(KEY_TYPE)
            .and_then(PropertyValue::as_str)
            .ok_or_else(|| WireError::InvalidProperty(KEY_TYPE.into()))?;
        let object_type = ObjectType::from_name(type_name)
            .ok_or_else(|| WireError::InvalidProperty(KEY_TYPE.into()))?;

        let int = |key: &str, default: i32| {
            map.get(key)
                .and_then(PropertyValue::as_i64)
                .map_or(default, |v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
        };
        let float = |key: &str, default: f32| {
            map.get(key).and_then(PropertyValue::as_f64).map_or(default, |v| v as f32)
        };

        Ok(match object_type {
            ObjectType::Tank => {
                let controller = match map.get(KEY_AI).and_then(PropertyValue::as_str) {
                    None | Some("none") => Controller::Input,
                    Some(name) => Controller::Ai(AiAgent::new(
                        AiKind::from_name(name).ok_or_else(|| WireError::InvalidProperty(KEY_AI.into()))?,
                    )),
                };
                ObjectKind::Tank(TankState {
                    ammo: int(KEY_AMMO, TANK_START_AMMO),
                    max_health: float(KEY_MAX_HEALTH, TANK_MAX_HEALTH),
                    fire_cooldown: 0.0,
                    controller,
                })
            }
            ObjectType::Projectile => {
                let owner = map
                    .get(KEY_OWNER)
                    .and_then(PropertyValue::as_str)
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .ok_or_else(|| WireError::InvalidProperty(KEY_OWNER.into()))?;
                ObjectKind::Projectile(ProjectileState {
                    owner,
                    damage: float(KEY_DAMAGE, PROJECTILE_DAMAGE),
                    age: 0.0,
                })
            }
            ObjectType::Wall => ObjectKind::Wall,
            ObjectType::AmmoPickup => ObjectKind::AmmoPickup { count: int(KEY_COUNT, 0) },
            ObjectType::HealthPickup => ObjectKind::HealthPickup {
                amount: float(KEY_AMOUNT, 0.0),
            },
        })
    }
}

// =============================================================================
// GAME OBJECT
// =============================================================================

/// A simulated entity.
#[derive(Clone, Debug, PartialEq)]
pub struct GameObject {
    /// Unique id
    pub id: ObjectId,
    /// Top-left position and size
    pub bounds: Bounds,
    /// Linear velocity (units/s)
    pub velocity: Vec2,
    /// Rotation in degrees
    pub rotation: f32,
    /// Angular velocity in degrees/s
    pub angular_velocity: f32,
    /// Render scale
    pub scale: Vec2,
    /// Current health
    pub health: f32,
    /// Mass (carried for the wire; resolution uses an equal split)
    pub mass: f32,
    /// Never moved by physics
    pub is_static: bool,
    /// Tombstone, purged by the owning table between ticks
    pub delete_me: bool,
    /// Per-kind payload
    pub kind: ObjectKind,
    /// Free-form user properties (reserved keys excluded)
    pub properties: PropertyMap,
    /// Current animation name
    pub animation_tag: String,
    /// Seconds into the current animation
    pub animation_time: f32,
    /// Last input sequence applied to this object
    pub last_input_sequence: u32,
    collider: CompositeCollider,
}

impl GameObject {
    fn base(id: ObjectId, bounds: Bounds, kind: ObjectKind, collider: CompositeCollider) -> Self {
        let is_static = matches!(
            kind,
            ObjectKind::Wall | ObjectKind::AmmoPickup { .. } | ObjectKind::HealthPickup { .. }
        );
        let health = match &kind {
            ObjectKind::Tank(t) => t.max_health,
            _ => 1.0,
        };
        let mut object = Self {
            id,
            bounds,
            velocity: Vec2::ZERO,
            rotation: 0.0,
            angular_velocity: 0.0,
            scale: Vec2::ONE,
            health,
            mass: 1.0,
            is_static,
            delete_me: false,
            kind,
            properties: PropertyMap::new(),
            animation_tag: String::new(),
            animation_time: 0.0,
            last_input_sequence: 0,
            collider,
        };
        object.refresh_collider();
        object
    }

    /// Default collider for a kind at a size.
    fn collider_for(kind: &ObjectKind, size: Vec2) -> CompositeCollider {
        let shape = match kind {
            ObjectKind::Projectile(_) => CollisionShape::circle(size.x.min(size.y) * 0.5, Vec2::ZERO),
            _ => CollisionShape::rectangle(size, Vec2::ZERO),
        };
        CompositeCollider::with_shapes(vec![shape])
    }

    /// Tank with its top-left at `position`.
    pub fn tank(position: Vec2, controller: Controller) -> Self {
        let kind = ObjectKind::Tank(TankState {
            ammo: TANK_START_AMMO,
            max_health: TANK_MAX_HEALTH,
            fire_cooldown: 0.0,
            controller,
        });
        let bounds = Bounds::new(position, TANK_SIZE);
        let collider = Self::collider_for(&kind, TANK_SIZE);
        let mut tank = Self::base(Uuid::new_v4(), bounds, kind, collider);
        tank.mass = 10.0;
        tank
    }

    /// Projectile owned by `owner`.
    pub fn projectile(owner: ObjectId, position: Vec2, velocity: Vec2) -> Self {
        let size = Vec2::new(PROJECTILE_SIZE, PROJECTILE_SIZE);
        let kind = ObjectKind::Projectile(ProjectileState {
            owner,
            damage: PROJECTILE_DAMAGE,
            age: 0.0,
        });
        let collider = Self::collider_for(&kind, size);
        let mut projectile = Self::base(Uuid::new_v4(), Bounds::new(position, size), kind, collider);
        projectile.velocity = velocity;
        projectile
    }

    /// Static wall.
    pub fn wall(bounds: Bounds) -> Self {
        let collider = Self::collider_for(&ObjectKind::Wall, bounds.size);
        Self::base(Uuid::new_v4(), bounds, ObjectKind::Wall, collider)
    }

    /// Ammo pickup granting `count` shots.
    pub fn ammo_pickup(position: Vec2, count: i32) -> Self {
        let kind = ObjectKind::AmmoPickup { count };
        let collider = Self::collider_for(&kind, PICKUP_SIZE);
        Self::base(Uuid::new_v4(), Bounds::new(position, PICKUP_SIZE), kind, collider)
    }

    /// Health pickup restoring `amount`.
    pub fn health_pickup(position: Vec2, amount: f32) -> Self {
        let kind = ObjectKind::HealthPickup { amount };
        let collider = Self::collider_for(&kind, PICKUP_SIZE);
        Self::base(Uuid::new_v4(), Bounds::new(position, PICKUP_SIZE), kind, collider)
    }

    /// Replace the generated id.
    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = id;
        self
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Dispatch tag.
    #[inline]
    pub fn object_type(&self) -> ObjectType {
        self.kind.object_type()
    }

    /// Top-left corner.
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.bounds.position
    }

    /// Move the top-left corner.
    #[inline]
    pub fn set_position(&mut self, position: Vec2) {
        self.bounds.position = position;
    }

    /// Width and height.
    #[inline]
    pub fn size(&self) -> Vec2 {
        self.bounds.size
    }

    /// Tank payload, if a tank.
    pub fn tank_state(&self) -> Option<&TankState> {
        match &self.kind {
            ObjectKind::Tank(t) => Some(t),
            _ => None,
        }
    }

    /// Mutable tank payload, if a tank.
    pub fn tank_state_mut(&mut self) -> Option<&mut TankState> {
        match &mut self.kind {
            ObjectKind::Tank(t) => Some(t),
            _ => None,
        }
    }

    /// Projectile payload, if a projectile.
    pub fn projectile_state(&self) -> Option<&ProjectileState> {
        match &self.kind {
            ObjectKind::Projectile(p) => Some(p),
            _ => None,
        }
    }

    /// True for tanks driven by input.
    pub fn is_input_driven(&self) -> bool {
        matches!(
            &self.kind,
            ObjectKind::Tank(TankState { controller: Controller::Input, .. })
        )
    }

    /// Recompute the collider from current bounds and rotation.
    pub fn refresh_collider(&mut self) {
        let center = self.bounds.center();
        self.collider.update_transform(center, self.rotation);
    }

    // =========================================================================
    // BEHAVIOR
    // =========================================================================

    /// Spawn a projectile from this tank's muzzle.
    ///
    /// Facing is snapped to the nearest cardinal direction. At 0 degrees the
    /// projectile appears `MUZZLE_DISTANCE` right of the tank's left edge,
    /// vertically centered; the other directions mirror that about the
    /// tank center. Returns `None` for non-tanks.
    pub fn fire_projectile(&self) -> Option<GameObject> {
        self.tank_state()?;
        let p = PROJECTILE_SIZE;
        let half = p * 0.5;
        let Bounds { position: pos, size } = self.bounds;

        let (spawn, direction) = match cardinal_of(self.rotation) {
            Cardinal::Right => (
                Vec2::new(pos.x + MUZZLE_DISTANCE, pos.y + size.y * 0.5 - half),
                Vec2::RIGHT,
            ),
            Cardinal::Left => (
                Vec2::new(pos.x + size.x - MUZZLE_DISTANCE - p, pos.y + size.y * 0.5 - half),
                Vec2::LEFT,
            ),
            Cardinal::Down => (
                Vec2::new(pos.x + size.x * 0.5 - half, pos.y + MUZZLE_DISTANCE),
                Vec2::DOWN,
            ),
            Cardinal::Up => (
                Vec2::new(pos.x + size.x * 0.5 - half, pos.y + size.y - MUZZLE_DISTANCE - p),
                Vec2::UP,
            ),
        };

        Some(GameObject::projectile(self.id, spawn, direction * PROJECTILE_SPEED))
    }

    /// Autonomous per-tick behavior. Returns a spawned object, if any.
    ///
    /// Tanks tick their cooldown, damp tumble and (for AI) decide and act.
    /// Projectiles age and expire. Static kinds do nothing.
    pub fn update(
        &mut self,
        world: &dyn WorldQuery,
        dt: f32,
        rng: &mut DeterministicRng,
    ) -> Option<GameObject> {
        if self.delete_me {
            return None;
        }

        let id = self.id;
        let bounds = self.bounds;
        match &mut self.kind {
            ObjectKind::Tank(tank) => {
                tank.fire_cooldown = (tank.fire_cooldown - dt).max(0.0);
                self.angular_velocity *= (1.0 - ANGULAR_DAMPING * dt).max(0.0);

                let decision = match &tank.controller {
                    Controller::Ai(agent) => {
                        agent.decide(id, &bounds, &mut tank.fire_cooldown, world, rng)
                    }
                    Controller::Input => return None,
                };

                self.velocity = decision.movement * TANK_SPEED;
                if let Some(facing) = decision.facing {
                    self.rotation = facing;
                }
                if decision.fire {
                    return self.fire_projectile();
                }
                None
            }
            ObjectKind::Projectile(p) => {
                p.age += dt;
                if p.age >= PROJECTILE_LIFETIME {
                    self.delete_me = true;
                }
                None
            }
            ObjectKind::Wall | ObjectKind::AmmoPickup { .. } | ObjectKind::HealthPickup { .. } => None,
        }
    }

    // =========================================================================
    // STATE / WIRE
    // =========================================================================

    /// Snapshot of the replicated fields.
    pub fn get_state(&self, timestamp: u64) -> GameObjectState {
        GameObjectState {
            position: self.bounds.position,
            velocity: self.velocity,
            rotation: self.rotation,
            scale: self.scale,
            active: !self.delete_me,
            health: self.health,
            mass: self.mass,
            object_type: self.object_type(),
            custom: self.all_properties(),
            animation_tag: self.animation_tag.clone(),
            animation_time: self.animation_time,
            last_input_sequence: self.last_input_sequence,
            timestamp,
        }
    }

    /// Overwrite replicated fields from a snapshot.
    ///
    /// Size is not part of a snapshot and is left unchanged. A snapshot for
    /// a different kind only updates the shared fields.
    pub fn apply_state(&mut self, state: &GameObjectState) {
        self.bounds.position = state.position;
        self.velocity = state.velocity;
        self.rotation = state.rotation;
        self.scale = state.scale;
        self.delete_me = !state.active;
        self.health = state.health;
        self.mass = state.mass;
        self.animation_tag.clone_from(&state.animation_tag);
        self.animation_time = state.animation_time;
        self.last_input_sequence = state.last_input_sequence;

        if state.object_type == self.object_type() {
            if let Ok(kind) = ObjectKind::from_properties(&state.custom) {
                self.merge_kind(kind);
            }
        }
        self.properties = user_properties(&state.custom);
        self.refresh_collider();
    }

    /// Replace replicated kind fields while keeping local-only ones
    /// (cooldowns, projectile age).
    fn merge_kind(&mut self, incoming: ObjectKind) {
        match (&mut self.kind, incoming) {
            (ObjectKind::Tank(current), ObjectKind::Tank(next)) => {
                current.ammo = next.ammo;
                current.max_health = next.max_health;
                current.controller = next.controller;
            }
            (ObjectKind::Projectile(current), ObjectKind::Projectile(next)) => {
                current.owner = next.owner;
                current.damage = next.damage;
            }
            (slot, next) => *slot = next,
        }
    }

    /// User properties plus the reserved kind properties.
    pub fn all_properties(&self) -> PropertyMap {
        let mut map = self.properties.clone();
        self.kind.to_properties(&mut map);
        map
    }

    /// Wire record (the `GameObjects` message element).
    pub fn to_record(&self) -> ObjectRecord {
        ObjectRecord {
            id: self.id,
            health: self.health,
            bounds: self.bounds,
            velocity: self.velocity,
            rotation: self.rotation,
            scale: self.scale,
            is_static: self.is_static,
            mass: self.mass,
            properties: self.all_properties(),
        }
    }

    /// Rebuild an object from its wire record.
    pub fn from_record(record: &ObjectRecord) -> Result<GameObject, WireError> {
        let kind = ObjectKind::from_properties(&record.properties)?;
        let collider = Self::collider_for(&kind, record.bounds.size);
        let mut object = Self::base(record.id, record.bounds, kind, collider);
        object.health = record.health;
        object.velocity = record.velocity;
        object.rotation = record.rotation;
        object.scale = record.scale;
        object.is_static = record.is_static;
        object.mass = record.mass;
        object.properties = user_properties(&record.properties);
        object.refresh_collider();
        Ok(object)
    }

    /// Rebuild an object first seen in a snapshot.
    ///
    /// Snapshots carry no size, so the kind's spawn size is used. Walls have
    /// none and only arrive through full object lists.
    pub fn from_state(id: ObjectId, state: &GameObjectState) -> Result<GameObject, WireError> {
        let kind = ObjectKind::from_properties(&state.custom)?;
        let size = match &kind {
            ObjectKind::Tank(_) => TANK_SIZE,
            ObjectKind::Projectile(_) => Vec2::new(PROJECTILE_SIZE, PROJECTILE_SIZE),
            ObjectKind::AmmoPickup { .. } | ObjectKind::HealthPickup { .. } => PICKUP_SIZE,
            ObjectKind::Wall => return Err(WireError::InvalidProperty("size".into())),
        };
        let collider = Self::collider_for(&kind, size);
        let mut object = Self::base(id, Bounds::new(state.position, size), kind, collider);
        object.apply_state(state);
        Ok(object)
    }
}

/// Strip reserved keys from a property map.
fn user_properties(map: &PropertyMap) -> PropertyMap {
    map.iter()
        .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl RigidBody for GameObject {
    fn is_static(&self) -> bool {
        self.is_static
    }

    fn is_deleted(&self) -> bool {
        self.delete_me
    }

    fn is_trigger(&self) -> bool {
        matches!(
            self.kind,
            ObjectKind::AmmoPickup { .. } | ObjectKind::HealthPickup { .. }
        )
    }

    fn center(&self) -> Vec2 {
        self.bounds.center()
    }

    fn rotation(&self) -> f32 {
        self.rotation
    }

    fn set_rotation(&mut self, degrees: f32) {
        self.rotation = degrees;
    }

    fn velocity(&self) -> Vec2 {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    fn set_angular_velocity(&mut self, w: f32) {
        self.angular_velocity = w;
    }

    fn translate(&mut self, delta: Vec2) {
        self.bounds.position += delta;
    }

    fn collider(&self) -> &CompositeCollider {
        &self.collider
    }

    fn collider_mut(&mut self) -> &mut CompositeCollider {
        &mut self.collider
    }
}

// =============================================================================
// CARDINAL DIRECTIONS
// =============================================================================

/// The four directions tanks may move and aim in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinal {
    Right,
    Down,
    Left,
    Up,
}

impl Cardinal {
    /// Unit vector (screen coordinates, +Y down).
    pub fn vector(self) -> Vec2 {
        match self {
            Cardinal::Right => Vec2::RIGHT,
            Cardinal::Down => Vec2::DOWN,
            Cardinal::Left => Vec2::LEFT,
            Cardinal::Up => Vec2::UP,
        }
    }

    /// Canonical angle: 0, 90, 180 or -90.
    pub fn degrees(self) -> f32 {
        match self {
            Cardinal::Right => 0.0,
            Cardinal::Down => 90.0,
            Cardinal::Left => 180.0,
            Cardinal::Up => -90.0,
        }
    }

    /// Snap a vector to its dominant axis. `None` for a zero or
    /// non-finite vector. Ties go to the horizontal axis.
    pub fn from_vector(v: Vec2) -> Option<Cardinal> {
        if !v.is_finite() || v.length_squared() == 0.0 {
            return None;
        }
        Some(if v.x.abs() >= v.y.abs() {
            if v.x >= 0.0 { Cardinal::Right } else { Cardinal::Left }
        } else if v.y > 0.0 {
            Cardinal::Down
        } else {
            Cardinal::Up
        })
    }
}

/// Snap any angle (degrees) to the nearest cardinal direction.
pub fn cardinal_of(degrees: f32) -> Cardinal {
    let wrapped = (degrees + 180.0).rem_euclid(360.0) - 180.0;
    let quarter = (wrapped / 90.0).round() as i32;
    match quarter {
        0 => Cardinal::Right,
        1 => Cardinal::Down,
        -1 => Cardinal::Up,
        _ => Cardinal::Left,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ai::WorldView;

    #[test]
    fn test_fire_right_spawn_point() {
        let tank = GameObject::tank(Vec2::new(200.0, 300.0), Controller::Input);
        let shot = tank.fire_projectile().unwrap();
        assert_eq!(shot.position(), Vec2::new(300.0, 300.0 + 32.0 - 4.0));
        assert_eq!(shot.velocity, Vec2::new(100.0, 0.0));
        assert_eq!(shot.projectile_state().unwrap().owner, tank.id);
    }

    #[test]
    fn test_fire_mirrors_about_center() {
        let mut tank = GameObject::tank(Vec2::new(200.0, 300.0), Controller::Input);
        let center = tank.bounds.center();

        tank.rotation = 180.0;
        let left = tank.fire_projectile().unwrap();
        tank.rotation = 0.0;
        let right = tank.fire_projectile().unwrap();
        // Projectile centers are symmetric about the tank center
        let lc = left.bounds.center();
        let rc = right.bounds.center();
        assert!((lc.x + rc.x - 2.0 * center.x).abs() < 1e-4);
        assert_eq!(left.velocity, Vec2::new(-100.0, 0.0));

        tank.rotation = -90.0;
        let up = tank.fire_projectile().unwrap();
        assert_eq!(up.velocity, Vec2::new(0.0, -100.0));
        assert!(up.bounds.center().y < center.y);
    }

    #[test]
    fn test_non_tank_cannot_fire() {
        let wall = GameObject::wall(Bounds::from_xywh(0.0, 0.0, 10.0, 10.0));
        assert!(wall.fire_projectile().is_none());
    }

    #[test]
    fn test_cardinal_snapping() {
        assert_eq!(cardinal_of(10.0), Cardinal::Right);
        assert_eq!(cardinal_of(80.0), Cardinal::Down);
        assert_eq!(cardinal_of(-179.0), Cardinal::Left);
        assert_eq!(cardinal_of(180.0), Cardinal::Left);
        assert_eq!(cardinal_of(-100.0), Cardinal::Up);
        assert_eq!(cardinal_of(350.0), Cardinal::Right);

        assert_eq!(Cardinal::from_vector(Vec2::new(0.5, -2.0)), Some(Cardinal::Up));
        assert_eq!(Cardinal::from_vector(Vec2::ZERO), None);
    }

    #[test]
    fn test_record_round_trip_preserves_kind() {
        let owner = Uuid::new_v4();
        let mut shot = GameObject::projectile(owner, Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0));
        shot.properties.insert("skin".into(), "blue".into());

        let rebuilt = GameObject::from_record(&shot.to_record()).unwrap();
        assert_eq!(rebuilt.id, shot.id);
        assert_eq!(rebuilt.object_type(), ObjectType::Projectile);
        assert_eq!(rebuilt.projectile_state().unwrap().owner, owner);
        assert_eq!(rebuilt.properties.get("skin"), Some(&PropertyValue::from("blue")));
        assert!(!rebuilt.properties.contains_key(KEY_TYPE));
    }

    #[test]
    fn test_record_without_type_rejected() {
        let mut record = GameObject::wall(Bounds::from_xywh(0.0, 0.0, 5.0, 5.0)).to_record();
        record.properties.remove(KEY_TYPE);
        assert!(GameObject::from_record(&record).is_err());
    }

    #[test]
    fn test_state_round_trip() {
        let mut tank = GameObject::tank(Vec2::new(10.0, 20.0), Controller::Input);
        tank.velocity = Vec2::new(5.0, 0.0);
        tank.health = 42.0;
        let state = tank.get_state(99);

        let mut other = GameObject::tank(Vec2::ZERO, Controller::Input).with_id(tank.id);
        other.apply_state(&state);
        assert_eq!(other.position(), Vec2::new(10.0, 20.0));
        assert_eq!(other.velocity, Vec2::new(5.0, 0.0));
        assert_eq!(other.health, 42.0);
        assert_eq!(other.tank_state().unwrap().ammo, TANK_START_AMMO);
    }

    #[test]
    fn test_from_state_rebuilds_new_objects() {
        let owner = Uuid::new_v4();
        let shot = GameObject::projectile(owner, Vec2::new(30.0, 40.0), Vec2::new(100.0, 0.0));
        let rebuilt = GameObject::from_state(shot.id, &shot.get_state(5)).unwrap();
        assert_eq!(rebuilt.id, shot.id);
        assert_eq!(rebuilt.position(), Vec2::new(30.0, 40.0));
        assert_eq!(rebuilt.size(), Vec2::new(PROJECTILE_SIZE, PROJECTILE_SIZE));
        assert_eq!(rebuilt.projectile_state().unwrap().owner, owner);

        let wall = GameObject::wall(Bounds::from_xywh(0.0, 0.0, 50.0, 5.0));
        assert!(GameObject::from_state(wall.id, &wall.get_state(5)).is_err());
    }

    #[test]
    fn test_projectile_expires() {
        let mut shot = GameObject::projectile(Uuid::nil(), Vec2::ZERO, Vec2::RIGHT);
        let world = WorldView::default();
        let mut rng = DeterministicRng::new(1);
        shot.update(&world, PROJECTILE_LIFETIME - 0.1, &mut rng);
        assert!(!shot.delete_me);
        shot.update(&world, 0.2, &mut rng);
        assert!(shot.delete_me);
    }

    #[test]
    fn test_tank_cooldown_ticks_down() {
        let mut tank = GameObject::tank(Vec2::ZERO, Controller::Input);
        tank.tank_state_mut().unwrap().fire_cooldown = 0.5;
        let world = WorldView::default();
        let mut rng = DeterministicRng::new(1);
        tank.update(&world, 0.2, &mut rng);
        assert!((tank.tank_state().unwrap().fire_cooldown - 0.3).abs() < 1e-6);
        tank.update(&world, 1.0, &mut rng);
        assert_eq!(tank.tank_state().unwrap().fire_cooldown, 0.0);
    }

    #[test]
    fn test_pickups_are_static_triggers() {
        let pickup = GameObject::ammo_pickup(Vec2::ZERO, 5);
        assert!(pickup.is_static);
        assert!(pickup.is_trigger());
        let tank = GameObject::tank(Vec2::ZERO, Controller::Input);
        assert!(!tank.is_static);
        assert!(!tank.is_trigger());
    }
}
