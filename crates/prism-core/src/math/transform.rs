// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! 2D affine transforms.

use super::vector::Vec2;

/// A 2D affine transform stored as the six coefficients of a 3x2 matrix.
///
/// A point is mapped as:
///
/// ```text
/// x' = x * a + y * c + e
/// y' = x * b + y * d + f
/// ```
///
/// Camera view matrices, sprite matrices and parent container matrices all
/// use this type. Composition follows the convention that
/// `parent.multiply(&child)` yields a transform applying `child` first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformMatrix {
    /// Horizontal scale / rotation term.
    pub a: f32,
    /// Vertical skew / rotation term.
    pub b: f32,
    /// Horizontal skew / rotation term.
    pub c: f32,
    /// Vertical scale / rotation term.
    pub d: f32,
    /// Horizontal translation.
    pub e: f32,
    /// Vertical translation.
    pub f: f32,
}

impl Default for TransformMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl TransformMatrix {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// Creates a transform from its six coefficients.
    #[inline]
    pub const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Builds a translate-rotate-scale transform.
    ///
    /// # Arguments
    ///
    /// * `translation` - The position the local origin maps to.
    /// * `rotation` - The rotation in radians, clockwise in y-down space.
    /// * `scale` - The per-axis scale applied before rotating.
    #[inline]
    pub fn from_itrs(translation: Vec2, rotation: f32, scale: Vec2) -> Self {
        let (sin, cos) = rotation.sin_cos();
        Self {
            a: cos * scale.x,
            b: sin * scale.x,
            c: -sin * scale.y,
            d: cos * scale.y,
            e: translation.x,
            f: translation.y,
        }
    }

    /// Pre-applies a translation in local space.
    #[inline]
    pub fn translate(&mut self, offset: Vec2) -> &mut Self {
        self.e += self.a * offset.x + self.c * offset.y;
        self.f += self.b * offset.x + self.d * offset.y;
        self
    }

    /// Returns `self * rhs`: a transform that applies `rhs`, then `self`.
    #[inline]
    pub fn multiply(&self, rhs: &TransformMatrix) -> TransformMatrix {
        TransformMatrix {
            a: rhs.a * self.a + rhs.b * self.c,
            b: rhs.a * self.b + rhs.b * self.d,
            c: rhs.c * self.a + rhs.d * self.c,
            d: rhs.c * self.b + rhs.d * self.d,
            e: rhs.e * self.a + rhs.f * self.c + self.e,
            f: rhs.e * self.b + rhs.f * self.d + self.f,
        }
    }

    /// Translates by `offset` in local space, then multiplies by `rhs`.
    ///
    /// This is how a camera matrix absorbs a parent container together with
    /// the camera scroll scaled by the object's scroll factor.
    #[inline]
    pub fn multiply_with_offset(&self, rhs: &TransformMatrix, offset: Vec2) -> TransformMatrix {
        let mut shifted = *self;
        shifted.translate(offset);
        shifted.multiply(rhs)
    }

    /// Maps a point through the transform.
    #[inline]
    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x * self.a + p.y * self.c + self.e,
            p.x * self.b + p.y * self.d + self.f,
        )
    }

    /// Returns the inverse transform, or `None` if the matrix is singular.
    pub fn inverse(&self) -> Option<TransformMatrix> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f32::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        Some(TransformMatrix {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{approx_eq, FRAC_PI_2};

    fn vec2_approx_eq(a: Vec2, b: Vec2) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
    }

    #[test]
    fn test_itrs_applies_scale_then_rotation_then_translation() {
        let m = TransformMatrix::from_itrs(Vec2::new(10.0, 20.0), FRAC_PI_2, Vec2::new(2.0, 1.0));
        // (1, 0) -> scaled (2, 0) -> rotated 90deg (0, 2) -> translated (10, 22)
        assert!(vec2_approx_eq(
            m.transform_point(Vec2::new(1.0, 0.0)),
            Vec2::new(10.0, 22.0)
        ));
    }

    #[test]
    fn test_multiply_applies_rhs_first() {
        let translate = TransformMatrix::from_itrs(Vec2::new(5.0, 0.0), 0.0, Vec2::ONE);
        let scale = TransformMatrix::from_itrs(Vec2::ZERO, 0.0, Vec2::splat(2.0));
        let p = Vec2::new(1.0, 1.0);
        assert_eq!(translate.multiply(&scale).transform_point(p), Vec2::new(7.0, 2.0));
        assert_eq!(scale.multiply(&translate).transform_point(p), Vec2::new(12.0, 2.0));
    }

    #[test]
    fn test_translate_is_local() {
        let mut m = TransformMatrix::from_itrs(Vec2::ZERO, 0.0, Vec2::splat(2.0));
        m.translate(Vec2::new(3.0, 4.0));
        assert_eq!(m.transform_point(Vec2::ZERO), Vec2::new(6.0, 8.0));
    }

    #[test]
    fn test_multiply_with_offset_matches_translate_then_multiply() {
        let cam = TransformMatrix::from_itrs(Vec2::new(100.0, 50.0), 0.3, Vec2::splat(1.5));
        let parent = TransformMatrix::from_itrs(Vec2::new(7.0, -3.0), -0.2, Vec2::ONE);
        let offset = Vec2::new(-12.0, 4.0);
        let mut expected = cam;
        expected.translate(offset);
        let expected = expected.multiply(&parent);
        let p = Vec2::new(2.0, 9.0);
        assert!(vec2_approx_eq(
            cam.multiply_with_offset(&parent, offset).transform_point(p),
            expected.transform_point(p)
        ));
    }

    #[test]
    fn test_inverse() {
        let m = TransformMatrix::from_itrs(Vec2::new(4.0, -2.0), 0.7, Vec2::new(2.0, 3.0));
        let inv = m.inverse().expect("matrix should be invertible");
        let p = Vec2::new(3.5, -8.0);
        assert!(vec2_approx_eq(inv.transform_point(m.transform_point(p)), p));
        assert!(TransformMatrix::new(0.0, 0.0, 0.0, 0.0, 1.0, 1.0)
            .inverse()
            .is_none());
    }
}
