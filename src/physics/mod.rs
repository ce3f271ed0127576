//! Physics
//!
//! Shapes, composite colliders, the quadtree broad phase and the per-tick
//! collision pipeline. Game objects plug in through [`RigidBody`].

pub mod shape;
pub mod collider;
pub mod spatial;
pub mod system;

pub use shape::{CollisionShape, ShapeKind};
pub use collider::CompositeCollider;
pub use spatial::QuadTree;
pub use system::{PhysicsSystem, RigidBody, StepStats, RESTITUTION, TUMBLE_FACTOR};
