//! Collision Shapes
//!
//! Local circle and rectangle shapes with cached world transforms and the
//! pairwise narrow-phase tests between them.

use crate::core::transform::Transform;
use crate::core::vec2::{quads_overlap, Bounds, Vec2};

/// Geometry of a shape in its own local frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShapeKind {
    /// Circle centered on the local origin.
    Circle {
        /// Radius
        radius: f32,
    },
    /// Rectangle centered on the local origin.
    Rectangle {
        /// Full width and height
        size: Vec2,
    },
}

/// A shape attached to a collider at a local offset from the owner's center.
#[derive(Clone, Debug, PartialEq)]
pub struct CollisionShape {
    /// Geometry
    pub kind: ShapeKind,
    /// Offset from the owning object's center, in the object's frame.
    pub offset: Vec2,
    world: Transform,
}

impl CollisionShape {
    /// Circle shape.
    pub fn circle(radius: f32, offset: Vec2) -> Self {
        Self {
            kind: ShapeKind::Circle { radius },
            offset,
            world: Transform::from_translation(offset),
        }
    }

    /// Rectangle shape.
    pub fn rectangle(size: Vec2, offset: Vec2) -> Self {
        Self {
            kind: ShapeKind::Rectangle { size },
            offset,
            world: Transform::from_translation(offset),
        }
    }

    /// Recompute the cached world transform from the parent's.
    pub fn update_transform(&mut self, parent: &Transform) {
        self.world = parent.then(&Transform::from_translation(self.offset));
    }

    /// Cached world transform.
    #[inline]
    pub fn world_transform(&self) -> &Transform {
        &self.world
    }

    /// World-space AABB under the cached transform.
    pub fn bounding_box(&self) -> Bounds {
        self.bounding_box_with(&self.world)
    }

    /// World-space AABB under an explicit transform.
    pub fn bounding_box_with(&self, transform: &Transform) -> Bounds {
        match self.kind {
            ShapeKind::Circle { radius } => {
                let c = transform.apply(Vec2::ZERO);
                let r = Vec2::new(radius, radius);
                Bounds::from_corners(c - r, c + r)
            }
            ShapeKind::Rectangle { size } => {
                let corners = rect_corners(size, transform);
                let mut min = corners[0];
                let mut max = corners[0];
                for c in &corners[1..] {
                    min = min.min(*c);
                    max = max.max(*c);
                }
                Bounds::from_corners(min, max)
            }
        }
    }

    /// Narrow-phase test using the cached world transforms of both shapes.
    pub fn collides_with(&self, other: &CollisionShape) -> bool {
        self.test_collision(other, &self.world, &other.world)
    }

    /// Narrow-phase test under explicit transforms.
    ///
    /// Symmetric: `a.test_collision(b, ta, tb) == b.test_collision(a, tb, ta)`.
    pub fn test_collision(
        &self,
        other: &CollisionShape,
        this_transform: &Transform,
        other_transform: &Transform,
    ) -> bool {
        match (self.kind, other.kind) {
            (ShapeKind::Circle { radius: ra }, ShapeKind::Circle { radius: rb }) => {
                circle_circle(ra, this_transform, rb, other_transform)
            }
            (ShapeKind::Circle { radius }, ShapeKind::Rectangle { size }) => {
                circle_rectangle(radius, this_transform, size, other_transform)
            }
            (ShapeKind::Rectangle { size }, ShapeKind::Circle { radius }) => {
                circle_rectangle(radius, other_transform, size, this_transform)
            }
            (ShapeKind::Rectangle { size: sa }, ShapeKind::Rectangle { size: sb }) => {
                quads_overlap(&rect_corners(sa, this_transform), &rect_corners(sb, other_transform))
            }
        }
    }
}

/// Corners of a centered rectangle mapped through a transform.
fn rect_corners(size: Vec2, transform: &Transform) -> [Vec2; 4] {
    let h = size.scale(0.5);
    [
        transform.apply(Vec2::new(-h.x, -h.y)),
        transform.apply(Vec2::new(h.x, -h.y)),
        transform.apply(Vec2::new(h.x, h.y)),
        transform.apply(Vec2::new(-h.x, h.y)),
    ]
}

fn circle_circle(ra: f32, ta: &Transform, rb: f32, tb: &Transform) -> bool {
    let ca = ta.apply(Vec2::ZERO);
    let cb = tb.apply(Vec2::ZERO);
    let sum = ra + rb;
    ca.distance_squared(cb) < sum * sum
}

/// Circle center is taken into the rectangle's local frame and clamped to its
/// extents. A singular rectangle transform reports no collision.
fn circle_rectangle(radius: f32, circle_tf: &Transform, size: Vec2, rect_tf: &Transform) -> bool {
    let inverse = match rect_tf.inverse() {
        Some(inv) => inv,
        None => return false,
    };
    let local = inverse.apply(circle_tf.apply(Vec2::ZERO));
    let h = size.scale(0.5);
    let closest = Vec2::new(local.x.clamp(-h.x, h.x), local.y.clamp(-h.y, h.y));
    local.distance_squared(closest) < radius * radius
}

// =============================================================================
// TESTS
// =============================================================================
