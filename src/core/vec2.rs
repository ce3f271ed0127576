//! 2D Vector and Bounds
//!
//! Float geometry primitives shared by physics, game objects and the wire codec.
//! Screen convention: +X right, +Y down, rotation in degrees clockwise from +X.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use serde::{Serialize, Deserialize};

/// Squared lengths below this are treated as zero.
pub const EPSILON_SQ: f32 = 1e-12;

/// 2D vector with f32 components.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
}

impl Vec2 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Unit vector (1, 1), the default object scale.
    pub const ONE: Self = Self { x: 1.0, y: 1.0 };

    /// Unit vector pointing right (+X, 0°)
    pub const RIGHT: Self = Self { x: 1.0, y: 0.0 };

    /// Unit vector pointing left (-X, 180°)
    pub const LEFT: Self = Self { x: -1.0, y: 0.0 };

    /// Unit vector pointing down the screen (+Y, 90°)
    pub const DOWN: Self = Self { x: 0.0, y: 1.0 };

    /// Unit vector pointing up the screen (-Y, -90°)
    pub const UP: Self = Self { x: 0.0, y: -1.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Scale by a scalar.
    #[inline]
    pub fn scale(self, scalar: f32) -> Self {
        Self::new(self.x * scalar, self.y * scalar)
    }

    /// Component-wise product.
    #[inline]
    pub fn mul_elem(self, other: Self) -> Self {
        Self::new(self.x * other.x, self.y * other.y)
    }

    /// Squared length (avoids sqrt - prefer this for comparisons).
    #[inline]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    /// Length (magnitude).
    #[inline]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Squared distance to another point.
    #[inline]
    pub fn distance_squared(self, other: Self) -> f32 {
        (self - other).length_squared()
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Normalize to unit length.
    /// Returns `None` for (near) zero vectors instead of producing NaN.
    #[inline]
    pub fn try_normalize(self) -> Option<Self> {
        let len_sq = self.length_squared();
        if len_sq <= EPSILON_SQ || !len_sq.is_finite() {
            return None;
        }
        Some(self.scale(1.0 / len_sq.sqrt()))
    }

    /// Dot product with another vector.
    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Rotate 90 degrees (left-hand normal on screen).
    #[inline]
    pub fn perpendicular(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Rotate by an angle in degrees.
    #[inline]
    pub fn rotate_degrees(self, degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Linear interpolation between two vectors.
    /// t = 0 returns self, t = 1 returns other.
    #[inline]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }

    /// Component-wise min.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y))
    }

    /// Component-wise max.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y))
    }

    /// True when both components are finite.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f32) -> Self {
        self.scale(rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl fmt::Debug for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec2({:.3}, {:.3})", self.x, self.y)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

// =============================================================================
// BOUNDS
// =============================================================================

/// Axis-aligned rectangle: top-left `position` plus `size`.
///
/// Game objects keep non-negative sizes; a zero size is a point box.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    /// Top-left corner
    pub position: Vec2,
    /// Width and height
    pub size: Vec2,
}

impl Bounds {
    /// Create bounds from position and size.
    #[inline]
    pub const fn new(position: Vec2, size: Vec2) -> Self {
        Self { position, size }
    }

    /// Create bounds from raw components.
    #[inline]
    pub const fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(Vec2::new(x, y), Vec2::new(w, h))
    }

    /// Degenerate box at a single point.
    #[inline]
    pub const fn point(at: Vec2) -> Self {
        Self::new(at, Vec2::ZERO)
    }

    /// Smallest bounds containing two corners.
    #[inline]
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self::new(min, max - min)
    }

    /// Left edge.
    #[inline]
    pub fn left(&self) -> f32 {
        self.position.x
    }

    /// Top edge.
    #[inline]
    pub fn top(&self) -> f32 {
        self.position.y
    }

    /// Right edge.
    #[inline]
    pub fn right(&self) -> f32 {
        self.position.x + self.size.x
    }

    /// Bottom edge.
    #[inline]
    pub fn bottom(&self) -> f32 {
        self.position.y + self.size.y
    }

    /// Bottom-right corner.
    #[inline]
    pub fn max(&self) -> Vec2 {
        self.position + self.size
    }

    /// Center point.
    #[inline]
    pub fn center(&self) -> Vec2 {
        self.position + self.size.scale(0.5)
    }

    /// Strict overlap test. Touching edges do not intersect.
    #[inline]
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }

    /// True if `other` lies entirely inside `self`.
    #[inline]
    pub fn contains(&self, other: &Bounds) -> bool {
        other.left() >= self.left()
            && other.right() <= self.right()
            && other.top() >= self.top()
            && other.bottom() <= self.bottom()
    }

    /// Smallest bounds containing both.
    #[inline]
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds::from_corners(self.position.min(other.position), self.max().max(other.max()))
    }

    /// Corners of this rectangle rotated about its center, clockwise from top-left.
    pub fn rotated_corners(&self, rotation_degrees: f32) -> [Vec2; 4] {
        let c = self.center();
        let h = self.size.scale(0.5);
        [
            c + Vec2::new(-h.x, -h.y).rotate_degrees(rotation_degrees),
            c + Vec2::new(h.x, -h.y).rotate_degrees(rotation_degrees),
            c + Vec2::new(h.x, h.y).rotate_degrees(rotation_degrees),
            c + Vec2::new(-h.x, h.y).rotate_degrees(rotation_degrees),
        ]
    }

    /// Oriented-rectangle overlap: each bounds is rotated about its own center.
    pub fn intersects_rotated(&self, rotation: f32, other: &Bounds, other_rotation: f32) -> bool {
        quads_overlap(&self.rotated_corners(rotation), &other.rotated_corners(other_rotation))
    }
}

/// Separating-axis test for two convex quads given by their corners.
///
/// Candidate axes are the edge normals of both quads; any axis on which the
/// projections do not overlap proves separation.
pub fn quads_overlap(a: &[Vec2; 4], b: &[Vec2; 4]) -> bool {
    for quad in [a, b] {
        for i in 0..4 {
            let edge = quad[(i + 1) % 4] - quad[i];
            let axis = edge.perpendicular();
            if axis.length_squared() <= EPSILON_SQ {
                continue;
            }
            let (min_a, max_a) = project(a, axis);
            let (min_b, max_b) = project(b, axis);
            if max_a <= min_b || max_b <= min_a {
                return false;
            }
        }
    }
    true
}

/// Project corners onto an axis, returning (min, max).
#[inline]
fn project(corners: &[Vec2; 4], axis: Vec2) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for c in corners {
        let p = c.dot(axis);
        min = min.min(p);
        max = max.max(p);
    }
    (min, max)
}

// =============================================================================
// TESTS
// =============================================================================
