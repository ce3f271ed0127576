//! Game Engine Instance
//!
//! Owns the object table and runs the fixed-rate tick. The authority
//! (solo play or server) simulates; a client only mirrors what the server
//! sends. Tick order on the authority:
//!
//! 1. Purge objects tombstoned during the previous tick
//! 2. Physics step; contacts dispatched through the response table
//! 3. Per-object update (AI decisions, cooldowns, projectile expiry)
//! 4. Append spawned projectiles
//! 5. Round-end check
//! 6. Build an immutable snapshot
//!
//! Objects are only ever flagged during a tick, never removed mid-tick.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::assets::{AssetProvider, Renderer};
use crate::core::props::{PropertyMap, PropertyValue};
use crate::core::rng::DeterministicRng;
use crate::core::transform::Transform;
use crate::core::vec2::{Bounds, Vec2};
use crate::game::ai::{ProjectileSighting, WorldView};
use crate::game::events::GameEvent;
use crate::game::input::{Action, PlayerInput};
use crate::game::level::{LevelData, LevelError};
use crate::game::object::{
    Cardinal, Controller, GameObject, ObjectId, ObjectKind, ObjectType, PLAYER_FIRE_COOLDOWN,
    TANK_SPEED,
};
use crate::game::response::{handle_collision, ContactView};
use crate::game::state::{GameState, WORLD_PHASE, WORLD_TICK};
use crate::network::codec::{ObjectRecord, WireError};
use crate::physics::system::{PhysicsSystem, StepStats};

/// Waiting for players.
pub const PHASE_LOBBY: &str = "lobby";

/// Round in progress.
pub const PHASE_ROUND: &str = "round";

/// Solo round won.
pub const PHASE_VICTORY: &str = "victory";

/// Solo round lost.
pub const PHASE_DEFEAT: &str = "defeat";

/// Extra speed at full `Boost` intensity.
pub const BOOST_FACTOR: f32 = 0.5;

// =============================================================================
// TYPES
// =============================================================================

/// Who this instance is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Local authority with a local player
    SinglePlayer,
    /// Network authority, one tank per client
    Server,
    /// Mirror of a remote authority
    Client,
}

impl Role {
    /// True if this role runs the simulation.
    pub fn is_authority(self) -> bool {
        !matches!(self, Role::Client)
    }
}

/// Engine errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Level(#[from] LevelError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("{role:?} cannot {operation}")]
    WrongRole { role: Role, operation: &'static str },
}

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Tick number just completed
    pub tick: u64,
    /// Events, ordered by tick, priority and subject
    pub events: Vec<GameEvent>,
    /// Objects created this tick
    pub spawned: Vec<ObjectId>,
    /// Objects purged at the start of this tick
    pub removed: Vec<ObjectId>,
    /// Snapshot taken at the end of the tick (authority only)
    pub snapshot: Option<Arc<GameState>>,
    /// Physics counters
    pub stats: StepStats,
}

// =============================================================================
// ENGINE
// =============================================================================

/// One running game.
pub struct GameInstance {
    role: Role,
    objects: Vec<GameObject>,
    physics: PhysicsSystem,
    world_bounds: Bounds,
    rng: DeterministicRng,
    tick: u64,
    sequence: u32,
    elapsed: f64,
    phase: String,
    local_player: Option<ObjectId>,
    ai_spawned: usize,
    spawn_points: Vec<Vec2>,
    next_spawn: usize,
    pending_events: Vec<GameEvent>,
    snapshot: Option<Arc<GameState>>,
}

impl GameInstance {
    /// Empty instance. Solo and server games start with `load_level`.
    pub fn new(role: Role, seed: u64) -> Self {
        let world_bounds = LevelData::default().world_bounds();
        Self {
            role,
            objects: Vec::new(),
            physics: PhysicsSystem::new(world_bounds),
            world_bounds,
            rng: DeterministicRng::new(seed),
            tick: 0,
            sequence: 0,
            elapsed: 0.0,
            phase: PHASE_LOBBY.to_string(),
            local_player: None,
            ai_spawned: 0,
            spawn_points: Vec::new(),
            next_spawn: 0,
            pending_events: Vec::new(),
            snapshot: None,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Ticks completed.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Authority clock in milliseconds.
    pub fn clock_ms(&self) -> u64 {
        (self.elapsed * 1000.0) as u64
    }

    /// Round phase / game mode.
    pub fn phase(&self) -> &str {
        &self.phase
    }

    /// Object table in update order.
    pub fn objects(&self) -> &[GameObject] {
        &self.objects
    }

    /// Look up an object.
    pub fn get(&self, id: &ObjectId) -> Option<&GameObject> {
        self.objects.iter().find(|o| o.id == *id)
    }

    fn get_mut(&mut self, id: &ObjectId) -> Option<&mut GameObject> {
        self.objects.iter_mut().find(|o| o.id == *id)
    }

    /// The locally controlled tank.
    pub fn local_player(&self) -> Option<ObjectId> {
        self.local_player
    }

    /// World rectangle.
    pub fn world_bounds(&self) -> Bounds {
        self.world_bounds
    }

    /// Most recent authority snapshot.
    pub fn snapshot(&self) -> Option<&Arc<GameState>> {
        self.snapshot.as_ref()
    }

    /// Change the round phase, recording a `ModeChanged` event.
    pub fn set_phase(&mut self, phase: &str) {
        if self.phase != phase {
            info!(from = %self.phase, to = %phase, "Phase changed");
            self.phase = phase.to_string();
            self.pending_events.push(GameEvent::mode_changed(self.tick, phase));
        }
    }

    /// Queue an event for the next tick result.
    pub fn record_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }

    // =========================================================================
    // SETUP
    // =========================================================================

    /// Replace the world with a level.
    ///
    /// Static and AI objects are added first and the player last. Solo play
    /// needs a player spawn; nothing is changed if the level is refused.
    pub fn load_level(&mut self, level: &LevelData) -> Result<(), EngineError> {
        if !self.role.is_authority() {
            return Err(EngineError::WrongRole {
                role: self.role,
                operation: "load a level",
            });
        }
        level.validate(self.role == Role::SinglePlayer)?;

        self.world_bounds = level.world_bounds();
        self.physics = PhysicsSystem::new(self.world_bounds);
        self.objects = level.spawn_static_and_ai();
        self.ai_spawned = level.tanks.len();
        self.spawn_points = level.spawn_points();
        self.next_spawn = 0;
        self.local_player = None;

        if self.role == Role::SinglePlayer {
            let player = level.spawn_player().ok_or(LevelError::MissingPlayer)?;
            self.local_player = Some(player.id);
            self.objects.push(player);
            self.set_phase(PHASE_ROUND);
        }

        info!(
            objects = self.objects.len(),
            ai = self.ai_spawned,
            spawns = self.spawn_points.len(),
            "Level loaded"
        );
        Ok(())
    }

    /// Fetch a level through the asset provider and load it.
    pub fn load_level_from(&mut self, assets: &dyn AssetProvider, name: &str) -> Result<(), EngineError> {
        let level = LevelData::load(assets, name).map_err(|e| {
            warn!(level = %name, error = %e, "Refusing to start");
            e
        })?;
        self.load_level(&level)
    }

    /// Server: spawn a tank for a joining client.
    pub fn spawn_player(&mut self) -> ObjectId {
        let position = if self.spawn_points.is_empty() {
            self.world_bounds.center()
        } else {
            let p = self.spawn_points[self.next_spawn % self.spawn_points.len()];
            self.next_spawn += 1;
            p
        };
        let tank = GameObject::tank(position, Controller::Input);
        let id = tank.id;
        self.objects.push(tank);
        debug!(%id, "Player tank spawned");
        id
    }

    /// Flag an object for removal at the next tick.
    pub fn remove_object(&mut self, id: &ObjectId) -> bool {
        match self.get_mut(id) {
            Some(object) => {
                object.delete_me = true;
                true
            }
            None => false,
        }
    }

    /// Wire records of every live object, with `last` (if present) at the end.
    pub fn records_with_last(&self, last: Option<ObjectId>) -> Vec<ObjectRecord> {
        let mut records: Vec<ObjectRecord> = self
            .objects
            .iter()
            .filter(|o| !o.delete_me && Some(o.id) != last)
            .map(GameObject::to_record)
            .collect();
        if let Some(object) = last.and_then(|id| self.get(&id)) {
            records.push(object.to_record());
        }
        records
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    /// Apply one input to an input-driven tank.
    ///
    /// Movement snaps to the dominant cardinal axis and the tank faces it.
    /// `Fire` shoots if ammo and cooldown allow. Returns the spawned
    /// projectile id.
    pub fn apply_input(&mut self, tank_id: &ObjectId, input: &PlayerInput) -> Result<Option<ObjectId>, EngineError> {
        if !self.role.is_authority() {
            return Err(EngineError::WrongRole {
                role: self.role,
                operation: "apply input",
            });
        }

        let Some(tank) = self.get_mut(tank_id) else {
            return Ok(None);
        };
        if tank.delete_me || !tank.is_input_driven() {
            return Ok(None);
        }
        if input.sequence <= tank.last_input_sequence && tank.last_input_sequence != 0 {
            debug!(sequence = input.sequence, "Stale input ignored");
            return Ok(None);
        }
        tank.last_input_sequence = input.sequence;

        let speed = TANK_SPEED * (1.0 + BOOST_FACTOR * input.intensity(Action::Boost).clamp(0.0, 1.0));
        match Cardinal::from_vector(input.movement) {
            Some(direction) => {
                tank.velocity = direction.vector() * speed;
                tank.rotation = direction.degrees();
            }
            None => tank.velocity = Vec2::ZERO,
        }

        if input.has(Action::Fire) {
            return Ok(self.try_fire(tank_id));
        }
        Ok(None)
    }

    /// Fire an input-driven tank's gun if it has ammo and is off cooldown.
    pub fn try_fire(&mut self, tank_id: &ObjectId) -> Option<ObjectId> {
        let tick = self.tick;
        let tank = self.objects.iter_mut().find(|o| o.id == *tank_id)?;
        if tank.delete_me || !tank.is_input_driven() {
            return None;
        }
        let state = tank.tank_state_mut()?;
        if state.ammo <= 0 || state.fire_cooldown > 0.0 {
            return None;
        }
        state.ammo -= 1;
        state.fire_cooldown = PLAYER_FIRE_COOLDOWN;

        let projectile = tank.fire_projectile()?;
        let id = projectile.id;
        self.pending_events
            .push(GameEvent::projectile_fired(tick, *tank_id, id));
        self.objects.push(projectile);
        Some(id)
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// Run one tick of `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> TickResult {
        let mut result = TickResult {
            removed: self.purge(),
            ..TickResult::default()
        };

        self.tick += 1;
        self.elapsed += dt as f64;
        let tick = self.tick;
        result.tick = tick;
        let mut events = std::mem::take(&mut self.pending_events);

        if !self.role.is_authority() {
            events.sort();
            result.events = events;
            return result;
        }

        // 1. Physics
        result.stats = self.physics.step(&mut self.objects, dt, |a, b| {
            let view_a = ContactView::of(a);
            let view_b = ContactView::of(b);
            handle_collision(a, &view_b, tick, &mut events);
            handle_collision(b, &view_a, tick, &mut events);
        });

        // 2. Update
        let view = self.world_view();
        let mut spawned = Vec::new();
        for object in self.objects.iter_mut() {
            if let Some(projectile) = object.update(&view, dt, &mut self.rng) {
                events.push(GameEvent::projectile_fired(tick, object.id, projectile.id));
                spawned.push(projectile);
            }
            if object.object_type() == ObjectType::Projectile
                && !object.bounds.intersects(&self.world_bounds)
            {
                object.delete_me = true;
            }
        }

        // 3. Spawns
        result.spawned = spawned.iter().map(|o| o.id).collect();
        self.objects.extend(spawned);

        // 4. Round end
        self.check_round_end();
        events.append(&mut self.pending_events);

        // 5. Snapshot
        self.sequence = self.sequence.wrapping_add(1);
        let snapshot = Arc::new(self.build_state());
        self.snapshot = Some(snapshot.clone());
        result.snapshot = Some(snapshot);

        events.sort();
        result.events = events;
        result
    }

    fn purge(&mut self) -> Vec<ObjectId> {
        let removed: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|o| o.delete_me)
            .map(|o| o.id)
            .collect();
        if !removed.is_empty() {
            self.objects.retain(|o| !o.delete_me);
        }
        removed
    }

    /// What AI may see this tick.
    fn world_view(&self) -> WorldView {
        let mut view = WorldView::default();
        for object in self.objects.iter().filter(|o| !o.delete_me) {
            match &object.kind {
                ObjectKind::Tank(_) if object.is_input_driven() => view.players.push(object.bounds),
                ObjectKind::Projectile(p) => view.projectiles.push(ProjectileSighting {
                    owner: p.owner,
                    center: object.bounds.center(),
                    velocity: object.velocity,
                }),
                _ => {}
            }
        }
        view
    }

    /// Solo play: the round ends when the player dies or every AI tank has.
    fn check_round_end(&mut self) {
        if self.role != Role::SinglePlayer || self.phase != PHASE_ROUND {
            return;
        }
        let player_alive = self
            .local_player
            .and_then(|id| self.get(&id))
            .is_some_and(|p| !p.delete_me);
        let ai_alive = self
            .objects
            .iter()
            .filter(|o| !o.delete_me && o.tank_state().is_some() && !o.is_input_driven())
            .count();

        if !player_alive {
            self.set_phase(PHASE_DEFEAT);
        } else if self.ai_spawned > 0 && ai_alive == 0 {
            self.set_phase(PHASE_VICTORY);
        }
    }

    fn build_state(&self) -> GameState {
        let timestamp = self.clock_ms();
        let objects = self
            .objects
            .iter()
            .map(|o| (o.id, o.get_state(timestamp)))
            .collect();
        let mut world = PropertyMap::new();
        world.insert(WORLD_PHASE.into(), PropertyValue::String(self.phase.clone()));
        world.insert(WORLD_TICK.into(), PropertyValue::Long(self.tick as i64));
        GameState::new(self.sequence, timestamp, objects, world)
    }

    // =========================================================================
    // CLIENT MIRROR
    // =========================================================================

    /// Client: replace the table with a full object list.
    ///
    /// The first list received names the local tank as its last record.
    pub fn apply_objects(&mut self, records: &[ObjectRecord]) -> Result<(), EngineError> {
        let objects = records
            .iter()
            .map(GameObject::from_record)
            .collect::<Result<Vec<_>, _>>()?;

        if self.local_player.is_none() && self.role == Role::Client {
            self.local_player = objects.last().map(|o| o.id);
        }
        self.objects = objects;
        debug!(objects = self.objects.len(), "Object table replaced");
        Ok(())
    }

    /// Client: bring the table in line with a snapshot.
    ///
    /// Known objects take the snapshot state. Objects missing from the
    /// snapshot, or inactive in it, are dropped; objects seen for the first
    /// time are rebuilt from their state and appended in id order.
    pub fn apply_snapshot(&mut self, state: &GameState) {
        let before = self.objects.len();
        self.objects
            .retain(|o| state.get(&o.id).is_some_and(|s| s.active));
        let dropped = before - self.objects.len();

        for object in self.objects.iter_mut() {
            if let Some(s) = state.get(&object.id) {
                object.apply_state(s);
            }
        }

        let known: BTreeSet<ObjectId> = self.objects.iter().map(|o| o.id).collect();
        let mut created = 0;
        for (id, s) in state.objects() {
            if !s.active || known.contains(id) {
                continue;
            }
            match GameObject::from_state(*id, s) {
                Ok(object) => {
                    self.objects.push(object);
                    created += 1;
                }
                Err(e) => debug!(%id, error = %e, "Snapshot object skipped"),
            }
        }
        if dropped > 0 || created > 0 {
            debug!(dropped, created, "Object table reconciled");
        }

        if let Some(phase) = state.phase() {
            if phase != self.phase {
                self.set_phase(phase);
            }
        }
    }

    // =========================================================================
    // RENDER
    // =========================================================================

    /// Walk live objects, mapping world positions through `view`.
    pub fn render(&self, renderer: &mut dyn Renderer, view: &Transform) {
        renderer.begin_frame();
        for object in self.objects.iter().filter(|o| !o.delete_me) {
            renderer.draw_object(object, view.apply(object.position()));
        }
        renderer.end_frame();
    }
}

// =============================================================================
// TESTS
// =============================================================================
