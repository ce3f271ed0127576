//! Physics System
//!
//! Per-tick pipeline: refresh collider transforms, rebuild the broad phase,
//! collect candidate pairs, confirm with the narrow phase, resolve with an
//! impulse, notify both bodies, then integrate.

use std::collections::BTreeSet;
use tracing::trace;

use crate::core::vec2::{Bounds, Vec2};
use super::collider::CompositeCollider;
use super::spatial::QuadTree;

/// Restitution applied to every contact.
pub const RESTITUTION: f32 = 0.5;

/// Angular kick (degrees/s) per unit of linear impulse.
///
/// Gives hits the "paper tank" tumble. Pure stylization.
pub const TUMBLE_FACTOR: f32 = 0.1;

/// What the physics system needs from a simulated body.
pub trait RigidBody {
    /// Static bodies never move and are never resolved against each other.
    fn is_static(&self) -> bool;
    /// Tombstoned bodies are inert for the rest of the tick.
    fn is_deleted(&self) -> bool;
    /// Triggers report contacts but receive no impulse.
    fn is_trigger(&self) -> bool {
        false
    }
    /// World-space center, used for the contact normal.
    fn center(&self) -> Vec2;
    /// Rotation in degrees.
    fn rotation(&self) -> f32;
    /// Set rotation in degrees.
    fn set_rotation(&mut self, degrees: f32);
    /// Linear velocity.
    fn velocity(&self) -> Vec2;
    /// Set linear velocity.
    fn set_velocity(&mut self, velocity: Vec2);
    /// Angular velocity in degrees/s.
    fn angular_velocity(&self) -> f32;
    /// Set angular velocity.
    fn set_angular_velocity(&mut self, w: f32);
    /// Move by a delta.
    fn translate(&mut self, delta: Vec2);
    /// Collider.
    fn collider(&self) -> &CompositeCollider;
    /// Mutable collider.
    fn collider_mut(&mut self) -> &mut CompositeCollider;
}

/// Counters from one step, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepStats {
    /// Unique broad-phase pairs
    pub candidate_pairs: usize,
    /// Pairs confirmed by the narrow phase
    pub contacts: usize,
}

/// Broad phase plus resolution over a slice of bodies.
#[derive(Debug)]
pub struct PhysicsSystem {
    index: QuadTree<usize>,
}

impl PhysicsSystem {
    /// System whose quadtree covers `world_region`.
    pub fn new(world_region: Bounds) -> Self {
        Self {
            index: QuadTree::new(world_region),
        }
    }

    /// Run one tick over `bodies`.
    ///
    /// `on_contact(a, b)` is called once per confirmed pair after resolution;
    /// it is expected to deliver the collision to both bodies. Pair order is
    /// by ascending index, so it is stable for a stable body order.
    pub fn step<B, F>(&mut self, bodies: &mut [B], dt: f32, mut on_contact: F) -> StepStats
    where
        B: RigidBody,
        F: FnMut(&mut B, &mut B),
    {
        let mut stats = StepStats::default();

        // 1. Refresh world transforms
        for body in bodies.iter_mut().filter(|b| !b.is_deleted()) {
            let center = body.center();
            let rotation = body.rotation();
            body.collider_mut().update_transform(center, rotation);
        }

        // 2. Rebuild broad phase
        self.index.clear();
        for (i, body) in bodies.iter().enumerate() {
            if !body.is_deleted() {
                self.index.insert(body.collider().bounding_box(), i);
            }
        }

        // 3. Candidate pairs from each dynamic body
        let mut pairs: BTreeSet<(usize, usize)> = BTreeSet::new();
        for (i, body) in bodies.iter().enumerate() {
            if body.is_static() || body.is_deleted() {
                continue;
            }
            for j in self.index.query(&body.collider().bounding_box()) {
                if j != i {
                    pairs.insert((i.min(j), i.max(j)));
                }
            }
        }
        stats.candidate_pairs = pairs.len();

        // 4. Narrow phase, resolve, notify
        for (i, j) in pairs {
            let (a, b) = pair_mut(bodies, i, j);
            if a.is_deleted() || b.is_deleted() {
                continue;
            }
            if !a.collider().collides_with(b.collider()) {
                continue;
            }
            stats.contacts += 1;
            if !a.is_trigger() && !b.is_trigger() {
                resolve_collision(a, b);
            }
            on_contact(a, b);
        }

        // 5. Integrate
        for body in bodies.iter_mut() {
            if body.is_static() || body.is_deleted() {
                continue;
            }
            let v = body.velocity();
            body.translate(v * dt);
            let r = body.rotation() + body.angular_velocity() * dt;
            body.set_rotation(r);
        }

        trace!(pairs = stats.candidate_pairs, contacts = stats.contacts, "physics step");
        stats
    }
}

/// Impulse resolution for one contact.
///
/// No-op when both are static, when centers coincide (no usable normal), or
/// when the bodies already separate along the normal.
pub fn resolve_collision<B: RigidBody>(a: &mut B, b: &mut B) {
    let a_static = a.is_static();
    let b_static = b.is_static();
    if a_static && b_static {
        return;
    }

    let normal = match (b.center() - a.center()).try_normalize() {
        Some(n) => n,
        None => return,
    };

    let relative = b.velocity() - a.velocity();
    let velocity_along_normal = relative.dot(normal);
    if velocity_along_normal > 0.0 {
        return;
    }

    let mut j = -(1.0 + RESTITUTION) * velocity_along_normal;
    if !j.is_finite() {
        return;
    }

    match (a_static, b_static) {
        (false, false) => {
            // Equal mass split
            j *= 0.5;
            a.set_velocity(a.velocity() - normal * j);
            b.set_velocity(b.velocity() + normal * j);
            a.set_angular_velocity(a.angular_velocity() - j * TUMBLE_FACTOR);
            b.set_angular_velocity(b.angular_velocity() + j * TUMBLE_FACTOR);
        }
        (true, false) => {
            b.set_velocity(b.velocity() + normal * j);
            b.set_angular_velocity(b.angular_velocity() + j * TUMBLE_FACTOR);
        }
        (false, true) => {
            a.set_velocity(a.velocity() - normal * j);
            a.set_angular_velocity(a.angular_velocity() - j * TUMBLE_FACTOR);
        }
        (true, true) => {}
    }
}

/// Two disjoint mutable references into a slice, `i < j`.
fn pair_mut<B>(bodies: &mut [B], i: usize, j: usize) -> (&mut B, &mut B) {
    debug_assert!(i < j);
    let (left, right) = bodies.split_at_mut(j);
    (&mut left[i], &mut right[0])
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::shape::CollisionShape;

    #[derive(Debug, Clone)]
    struct Ball {
        center: Vec2,
        velocity: Vec2,
        rotation: f32,
        angular: f32,
        fixed: bool,
        deleted: bool,
        trigger: bool,
        collider: CompositeCollider,
        hits: u32,
    }

    impl Ball {
        fn new(x: f32, y: f32, vx: f32, fixed: bool) -> Self {
            Self {
                center: Vec2::new(x, y),
                velocity: Vec2::new(vx, 0.0),
                rotation: 0.0,
                angular: 0.0,
                fixed,
                deleted: false,
                trigger: false,
                collider: CompositeCollider::with_shapes(vec![CollisionShape::circle(5.0, Vec2::ZERO)]),
                hits: 0,
            }
        }
    }

    impl RigidBody for Ball {
        fn is_static(&self) -> bool { self.fixed }
        fn is_deleted(&self) -> bool { self.deleted }
        fn is_trigger(&self) -> bool { self.trigger }
        fn center(&self) -> Vec2 { self.center }
        fn rotation(&self) -> f32 { self.rotation }
        fn set_rotation(&mut self, degrees: f32) { self.rotation = degrees; }
        fn velocity(&self) -> Vec2 { self.velocity }
        fn set_velocity(&mut self, velocity: Vec2) { self.velocity = velocity; }
        fn angular_velocity(&self) -> f32 { self.angular }
        fn set_angular_velocity(&mut self, w: f32) { self.angular = w; }
        fn translate(&mut self, delta: Vec2) { self.center += delta; }
        fn collider(&self) -> &CompositeCollider { &self.collider }
        fn collider_mut(&mut self) -> &mut CompositeCollider { &mut self.collider }
    }

    fn system() -> PhysicsSystem {
        PhysicsSystem::new(Bounds::from_xywh(-100.0, -100.0, 400.0, 400.0))
    }

    #[test]
    fn test_head_on_equal_split() {
        let mut a = Ball::new(0.0, 0.0, 10.0, false);
        let mut b = Ball::new(8.0, 0.0, -10.0, false);
        resolve_collision(&mut a, &mut b);
        // van = -20, j = 30, halved = 15
        assert_eq!(a.velocity, Vec2::new(-5.0, 0.0));
        assert_eq!(b.velocity, Vec2::new(5.0, 0.0));
        assert!((a.angular + 1.5).abs() < 1e-5);
        assert!((b.angular - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_against_static_full_impulse() {
        let mut a = Ball::new(0.0, 0.0, 10.0, false);
        let mut wall = Ball::new(8.0, 0.0, 0.0, true);
        resolve_collision(&mut a, &mut wall);
        assert_eq!(a.velocity, Vec2::new(-5.0, 0.0));
        assert_eq!(wall.velocity, Vec2::ZERO);

        let mut wall = Ball::new(0.0, 0.0, 0.0, true);
        let mut b = Ball::new(8.0, 0.0, -10.0, false);
        resolve_collision(&mut wall, &mut b);
        assert_eq!(b.velocity, Vec2::new(5.0, 0.0));
    }

    #[test]
    fn test_separating_bodies_untouched() {
        let mut a = Ball::new(0.0, 0.0, -10.0, false);
        let mut b = Ball::new(8.0, 0.0, 10.0, false);
        resolve_collision(&mut a, &mut b);
        assert_eq!(a.velocity, Vec2::new(-10.0, 0.0));
        assert_eq!(b.velocity, Vec2::new(10.0, 0.0));
    }

    #[test]
    fn test_coincident_centers_no_nan() {
        let mut a = Ball::new(5.0, 5.0, 10.0, false);
        let mut b = Ball::new(5.0, 5.0, -10.0, false);
        resolve_collision(&mut a, &mut b);
        assert!(a.velocity.is_finite() && b.velocity.is_finite());
        assert_eq!(a.velocity, Vec2::new(10.0, 0.0));
    }

    #[test]
    fn test_step_notifies_once_and_integrates() {
        let mut bodies = vec![
            Ball::new(0.0, 0.0, 10.0, false),
            Ball::new(8.0, 0.0, -10.0, false),
            Ball::new(200.0, 200.0, 0.0, true),
        ];
        let mut sys = system();
        let stats = sys.step(&mut bodies, 0.1, |a, b| {
            a.hits += 1;
            b.hits += 1;
        });
        assert_eq!(stats.contacts, 1);
        assert_eq!(bodies[0].hits, 1);
        assert_eq!(bodies[1].hits, 1);
        assert_eq!(bodies[2].hits, 0);
        // Resolved to -5 then integrated for 0.1 s
        assert!((bodies[0].center.x - (-0.5)).abs() < 1e-5);
        assert_eq!(bodies[2].center, Vec2::new(200.0, 200.0));
    }

    #[test]
    fn test_static_pairs_skipped() {
        let mut bodies = vec![
            Ball::new(0.0, 0.0, 0.0, true),
            Ball::new(1.0, 0.0, 0.0, true),
        ];
        let mut contacts = 0;
        let stats = system().step(&mut bodies, 0.1, |_, _| contacts += 1);
        assert_eq!(stats.candidate_pairs, 0);
        assert_eq!(contacts, 0);
    }

    #[test]
    fn test_trigger_reports_without_impulse() {
        let mut bodies = vec![
            Ball::new(0.0, 0.0, 10.0, false),
            Ball::new(8.0, 0.0, 0.0, true),
        ];
        bodies[1].trigger = true;
        let stats = system().step(&mut bodies, 0.1, |a, b| {
            a.hits += 1;
            b.hits += 1;
        });
        assert_eq!(stats.contacts, 1);
        assert_eq!(bodies[0].hits, 1);
        assert_eq!(bodies[0].velocity, Vec2::new(10.0, 0.0));
    }

    #[test]
    fn test_deleted_bodies_are_inert() {
        let mut bodies = vec![
            Ball::new(0.0, 0.0, 10.0, false),
            Ball::new(8.0, 0.0, -10.0, false),
        ];
        bodies[1].deleted = true;
        let mut contacts = 0;
        system().step(&mut bodies, 0.1, |_, _| contacts += 1);
        assert_eq!(contacts, 0);
        assert_eq!(bodies[1].center, Vec2::new(8.0, 0.0));
    }
}
