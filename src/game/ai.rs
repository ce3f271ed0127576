//! AI Agents
//!
//! Priority-ordered decision functions evaluated once per tick per AI tank.
//! No state machine: each tick looks at the world fresh.
//!
//! 1. `ChaseAndDodge` only: an opposing projectile inside `DANGER_RADIUS`
//!    pre-empts everything; sidestep perpendicular to its travel axis.
//! 2. Chase the nearest input-driven tank along the snapped cardinal axis,
//!    firing when lined up and the cooldown has elapsed.

use serde::{Deserialize, Serialize};

use crate::core::rng::DeterministicRng;
use crate::core::vec2::{Bounds, Vec2};
use crate::game::object::{cardinal_of, Cardinal, ObjectId};

/// Radius around the tank center in which projectiles are dodged.
pub const DANGER_RADIUS: f32 = 200.0;

/// Maximum perpendicular offset from the target that counts as lined up.
pub const ALIGN_THRESHOLD: f32 = 20.0;

/// Range for the randomized cooldown after an AI shot (seconds).
pub const AI_FIRE_COOLDOWN_MIN: f32 = 1.0;
pub const AI_FIRE_COOLDOWN_MAX: f32 = 3.0;

/// Chase stops this close to the target (center distance).
pub const STANDOFF_DISTANCE: f32 = 80.0;

// =============================================================================
// WORLD QUERY
// =============================================================================

/// A projectile as seen by AI.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectileSighting {
    /// Tank that fired it
    pub owner: ObjectId,
    /// World center
    pub center: Vec2,
    /// Velocity
    pub velocity: Vec2,
}

/// Read-only world facts AI needs, captured before objects update.
pub trait WorldQuery {
    /// Bounds of the input-driven tank nearest to `from`.
    fn nearest_player(&self, from: Vec2) -> Option<Bounds>;

    /// Every live projectile.
    fn projectiles(&self) -> &[ProjectileSighting];
}

/// Plain snapshot implementation of [`WorldQuery`].
#[derive(Clone, Debug, Default)]
pub struct WorldView {
    /// Input-driven tanks
    pub players: Vec<Bounds>,
    /// Live projectiles
    pub projectiles: Vec<ProjectileSighting>,
}

impl WorldQuery for WorldView {
    fn nearest_player(&self, from: Vec2) -> Option<Bounds> {
        self.players
            .iter()
            .copied()
            .min_by(|a, b| {
                a.center()
                    .distance_squared(from)
                    .total_cmp(&b.center().distance_squared(from))
            })
    }

    fn projectiles(&self) -> &[ProjectileSighting] {
        &self.projectiles
    }
}

// =============================================================================
// AGENT
// =============================================================================

/// AI strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiKind {
    /// Chase and shoot
    Chase,
    /// Chase and shoot, dodging incoming fire first
    ChaseAndDodge,
}

impl AiKind {
    /// Name used in levels and on the wire.
    pub const fn name(self) -> &'static str {
        match self {
            AiKind::Chase => "chase",
            AiKind::ChaseAndDodge => "chase_and_dodge",
        }
    }

    /// Parse a name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "chase" => Some(AiKind::Chase),
            "chase_and_dodge" => Some(AiKind::ChaseAndDodge),
            _ => None,
        }
    }
}

/// What the agent wants its tank to do this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AiDecision {
    /// Unit cardinal direction or zero
    pub movement: Vec2,
    /// New facing in degrees, if it changes
    pub facing: Option<f32>,
    /// Spawn a projectile
    pub fire: bool,
}

impl AiDecision {
    fn idle() -> Self {
        Self {
            movement: Vec2::ZERO,
            facing: None,
            fire: false,
        }
    }

    fn go(direction: Cardinal) -> Self {
        Self {
            movement: direction.vector(),
            facing: Some(direction.degrees()),
            fire: false,
        }
    }
}

/// Per-tank AI controller.
#[derive(Clone, Debug, PartialEq)]
pub struct AiAgent {
    /// Strategy
    pub kind: AiKind,
}

impl AiAgent {
    /// Create an agent.
    pub fn new(kind: AiKind) -> Self {
        Self { kind }
    }

    /// Decide this tick's action.
    ///
    /// `cooldown` is the tank's fire cooldown, already decremented for this
    /// tick; a shot resets it to a random value in the AI cooldown range.
    pub fn decide(
        &self,
        me: ObjectId,
        bounds: &Bounds,
        cooldown: &mut f32,
        world: &dyn WorldQuery,
        rng: &mut DeterministicRng,
    ) -> AiDecision {
        let center = bounds.center();

        if self.kind == AiKind::ChaseAndDodge {
            if let Some(direction) = dodge_direction(me, center, world.projectiles()) {
                return AiDecision::go(direction);
            }
        }

        let target = match world.nearest_player(center) {
            Some(t) => t,
            None => return AiDecision::idle(),
        };
        let to_target = target.center() - center;
        if !to_target.is_finite() {
            return AiDecision::idle();
        }

        let angle = to_target.y.atan2(to_target.x).to_degrees();
        let direction = cardinal_of(angle);
        let mut decision = AiDecision::go(direction);

        if to_target.length_squared() <= STANDOFF_DISTANCE * STANDOFF_DISTANCE {
            decision.movement = Vec2::ZERO;
        }

        let off_axis = match direction {
            Cardinal::Left | Cardinal::Right => to_target.y.abs(),
            Cardinal::Up | Cardinal::Down => to_target.x.abs(),
        };
        if off_axis <= ALIGN_THRESHOLD && *cooldown <= 0.0 {
            decision.fire = true;
            *cooldown = rng.next_f32_range(AI_FIRE_COOLDOWN_MIN, AI_FIRE_COOLDOWN_MAX);
        }

        decision
    }
}

/// Sidestep for the nearest opposing projectile in range.
///
/// The dodge axis is perpendicular to the projectile's dominant velocity
/// axis; the direction points away from the projectile's offset on that
/// axis (down when exactly on it).
fn dodge_direction(me: ObjectId, center: Vec2, projectiles: &[ProjectileSighting]) -> Option<Cardinal> {
    let danger_sq = DANGER_RADIUS * DANGER_RADIUS;
    let threat = projectiles
        .iter()
        .filter(|p| p.owner != me)
        .map(|p| (p, p.center.distance_squared(center)))
        .filter(|(_, d)| *d <= danger_sq)
        .min_by(|a, b| a.1.total_cmp(&b.1))?
        .0;

    let offset = center - threat.center;
    let direction = if threat.velocity.x.abs() >= threat.velocity.y.abs() {
        if offset.y < 0.0 { Cardinal::Up } else { Cardinal::Down }
    } else if offset.x < 0.0 {
        Cardinal::Left
    } else {
        Cardinal::Right
    };
    Some(direction)
}

// =============================================================================
// TESTS
// =============================================================================
