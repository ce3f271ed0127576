//! Composite Collider
//!
//! One collider per game object. Aggregates shapes and caches the world
//! transform plus a world AABB, recomputed once per tick.

use crate::core::transform::Transform;
use crate::core::vec2::{Bounds, Vec2};
use super::shape::CollisionShape;

/// Collection of shapes moving with one object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompositeCollider {
    shapes: Vec<CollisionShape>,
    world: Transform,
    bounding_box: Bounds,
}

impl CompositeCollider {
    /// Empty collider. Its bounding box is a point at the last update position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collider with the given shapes.
    pub fn with_shapes(shapes: Vec<CollisionShape>) -> Self {
        Self {
            shapes,
            ..Self::default()
        }
    }

    /// Attached shapes.
    pub fn shapes(&self) -> &[CollisionShape] {
        &self.shapes
    }

    /// Cached world transform of the owner.
    pub fn world_transform(&self) -> &Transform {
        &self.world
    }

    /// Cached world AABB (union of shape boxes).
    pub fn bounding_box(&self) -> Bounds {
        self.bounding_box
    }

    /// Refresh every child transform from the owner's center and rotation,
    /// then recompute the cached bounding box.
    pub fn update_transform(&mut self, center: Vec2, rotation_degrees: f32) {
        self.world = Transform::from_rotation_translation(rotation_degrees, center);
        for shape in &mut self.shapes {
            shape.update_transform(&self.world);
        }

        let mut boxes = self.shapes.iter().map(|s| s.bounding_box());
        self.bounding_box = match boxes.next() {
            Some(first) => boxes.fold(first, |acc, b| acc.union(&b)),
            None => Bounds::point(center),
        };
    }

    /// Broad check on cached boxes, then any shape pair.
    pub fn collides_with(&self, other: &CompositeCollider) -> bool {
        if !self.bounding_box.intersects(&other.bounding_box) {
            return false;
        }
        self.shapes
            .iter()
            .any(|a| other.shapes.iter().any(|b| a.collides_with(b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(center: Vec2, size: Vec2) -> CompositeCollider {
        let mut c = CompositeCollider::with_shapes(vec![CollisionShape::rectangle(size, Vec2::ZERO)]);
        c.update_transform(center, 0.0);
        c
    }

    #[test]
    fn test_bounding_box_union() {
        let mut c = CompositeCollider::with_shapes(vec![
            CollisionShape::rectangle(Vec2::new(10.0, 10.0), Vec2::new(-10.0, 0.0)),
            CollisionShape::circle(5.0, Vec2::new(10.0, 0.0)),
        ]);
        c.update_transform(Vec2::new(100.0, 100.0), 0.0);
        assert_eq!(c.bounding_box(), Bounds::from_xywh(85.0, 95.0, 30.0, 10.0));
    }

    #[test]
    fn test_empty_collider_is_point() {
        let mut c = CompositeCollider::new();
        c.update_transform(Vec2::new(3.0, 4.0), 0.0);
        assert_eq!(c.bounding_box(), Bounds::point(Vec2::new(3.0, 4.0)));

        let other = boxed(Vec2::new(3.0, 4.0), Vec2::new(10.0, 10.0));
        assert!(!c.collides_with(&other));
    }

    #[test]
    fn test_collides() {
        let a = boxed(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0));
        let b = boxed(Vec2::new(8.0, 0.0), Vec2::new(10.0, 10.0));
        let c = boxed(Vec2::new(30.0, 0.0), Vec2::new(10.0, 10.0));
        assert!(a.collides_with(&b));
        assert!(b.collides_with(&a));
        assert!(!a.collides_with(&c));
    }

    #[test]
    fn test_aabb_overlap_but_shapes_apart() {
        // Two circles whose boxes overlap at the corners but whose discs do not
        let mut a = CompositeCollider::with_shapes(vec![CollisionShape::circle(5.0, Vec2::ZERO)]);
        let mut b = CompositeCollider::with_shapes(vec![CollisionShape::circle(5.0, Vec2::ZERO)]);
        a.update_transform(Vec2::new(0.0, 0.0), 0.0);
        b.update_transform(Vec2::new(8.0, 8.0), 0.0);
        assert!(a.bounding_box().intersects(&b.bounding_box()));
        assert!(!a.collides_with(&b));
    }
}
