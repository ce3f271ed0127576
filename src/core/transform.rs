//! 2D Affine Transform
//!
//! Row-major 2x3 matrix mapping shape-local points to world space.

use super::vec2::Vec2;

/// Determinants below this are considered singular.
const SINGULAR_EPSILON: f32 = 1e-9;

/// Affine transform `p' = M * p + t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Linear part, row 0
    pub m11: f32,
    /// Linear part, row 0
    pub m12: f32,
    /// Linear part, row 1
    pub m21: f32,
    /// Linear part, row 1
    pub m22: f32,
    /// Translation
    pub translation: Vec2,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        m11: 1.0,
        m12: 0.0,
        m21: 0.0,
        m22: 1.0,
        translation: Vec2::ZERO,
    };

    /// Pure translation.
    pub fn from_translation(t: Vec2) -> Self {
        Self { translation: t, ..Self::IDENTITY }
    }

    /// Rotation (degrees, clockwise on screen) followed by translation.
    pub fn from_rotation_translation(degrees: f32, t: Vec2) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            m11: cos,
            m12: -sin,
            m21: sin,
            m22: cos,
            translation: t,
        }
    }

    /// Scale, then rotate about the origin, then translate.
    pub fn from_scale_rotation_translation(scale: Vec2, degrees: f32, t: Vec2) -> Self {
        let r = Self::from_rotation_translation(degrees, t);
        Self {
            m11: r.m11 * scale.x,
            m12: r.m12 * scale.y,
            m21: r.m21 * scale.x,
            m22: r.m22 * scale.y,
            translation: t,
        }
    }

    /// Map a point.
    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.m11 * p.x + self.m12 * p.y + self.translation.x,
            self.m21 * p.x + self.m22 * p.y + self.translation.y,
        )
    }

    /// Map a direction (no translation).
    #[inline]
    pub fn apply_vector(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.m11 * v.x + self.m12 * v.y, self.m21 * v.x + self.m22 * v.y)
    }

    /// `self` applied after `inner`.
    pub fn then(&self, inner: &Transform) -> Transform {
        Transform {
            m11: self.m11 * inner.m11 + self.m12 * inner.m21,
            m12: self.m11 * inner.m12 + self.m12 * inner.m22,
            m21: self.m21 * inner.m11 + self.m22 * inner.m21,
            m22: self.m21 * inner.m12 + self.m22 * inner.m22,
            translation: self.apply(inner.translation),
        }
    }

    /// Determinant of the linear part.
    #[inline]
    pub fn determinant(&self) -> f32 {
        self.m11 * self.m22 - self.m12 * self.m21
    }

    /// Inverse transform, or `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<Transform> {
        let det = self.determinant();
        if det.abs() < SINGULAR_EPSILON || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        let m11 = self.m22 * inv;
        let m12 = -self.m12 * inv;
        let m21 = -self.m21 * inv;
        let m22 = self.m11 * inv;
        let t = self.translation;
        Some(Transform {
            m11,
            m12,
            m21,
            m22,
            translation: Vec2::new(-(m11 * t.x + m12 * t.y), -(m21 * t.x + m22 * t.y)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_rotation_translation() {
        let t = Transform::from_rotation_translation(90.0, Vec2::new(10.0, 0.0));
        assert!(approx(t.apply(Vec2::new(1.0, 0.0)), Vec2::new(10.0, 1.0)));
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = Transform::from_scale_rotation_translation(
            Vec2::new(2.0, 0.5),
            37.0,
            Vec2::new(-4.0, 9.0),
        );
        let inv = t.inverse().unwrap();
        let p = Vec2::new(3.0, -7.0);
        assert!(approx(inv.apply(t.apply(p)), p));
    }

    #[test]
    fn test_singular_has_no_inverse() {
        let t = Transform::from_scale_rotation_translation(Vec2::new(0.0, 1.0), 0.0, Vec2::ZERO);
        assert!(t.inverse().is_none());
    }

    #[test]
    fn test_compose() {
        let a = Transform::from_translation(Vec2::new(5.0, 0.0));
        let b = Transform::from_rotation_translation(90.0, Vec2::ZERO);
        let c = a.then(&b);
        assert!(approx(c.apply(Vec2::new(1.0, 0.0)), Vec2::new(5.0, 1.0)));
    }
}
