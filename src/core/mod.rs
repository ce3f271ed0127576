//! Core primitives.
//!
//! Geometry, transforms, seeded randomness and tagged property values.
//! Everything above this layer builds on these types.

pub mod vec2;
pub mod transform;
pub mod rng;
pub mod props;

// Re-export core types
pub use vec2::{Bounds, Vec2};
pub use transform::Transform;
pub use rng::DeterministicRng;
pub use props::{PropertyMap, PropertyValue};
