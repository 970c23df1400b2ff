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

//! Provides the 4x4 matrix used as the pipelines' projection uniform.

use super::vector::Vec2;

/// A 4x4 column-major matrix.
///
/// The renderer only needs it for the orthographic projection every pipeline
/// uploads as `uProjectionMatrix`. The memory layout is column-major, which is
/// what `uniformMatrix4fv` expects with `transpose = false`.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix. `cols[0]` is the first column, and so on.
    pub cols: [[f32; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    /// The 4x4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Creates an OpenGL-style orthographic projection with a [-1, 1] depth range.
    ///
    /// Passing `bottom > top` yields a y-down projection, which is how the
    /// renderer maps pixel coordinates onto clip space.
    pub fn orthographic_gl(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        z_near: f32,
        z_far: f32,
    ) -> Self {
        let lr = 1.0 / (left - right);
        let bt = 1.0 / (bottom - top);
        let nf = 1.0 / (z_near - z_far);
        Self {
            cols: [
                [-2.0 * lr, 0.0, 0.0, 0.0],
                [0.0, -2.0 * bt, 0.0, 0.0],
                [0.0, 0.0, 2.0 * nf, 0.0],
                [(left + right) * lr, (top + bottom) * bt, (z_far + z_near) * nf, 1.0],
            ],
        }
    }

    /// The y-down pixel projection for a drawing surface of the given size.
    #[inline]
    pub fn pixel_projection(width: f32, height: f32) -> Self {
        Self::orthographic_gl(0.0, width, height, 0.0, -1000.0, 1000.0)
    }

    /// Returns the matrix as a flat column-major array.
    #[inline]
    pub fn to_cols_array(&self) -> [f32; 16] {
        bytemuck::cast(self.cols)
    }

    /// Transforms a 2D point (z = 0, w = 1) and returns its clip-space x/y.
    #[inline]
    pub fn transform_point2(&self, p: Vec2) -> Vec2 {
        let c = &self.cols;
        Vec2::new(
            c[0][0] * p.x + c[1][0] * p.y + c[3][0],
            c[0][1] * p.x + c[1][1] * p.y + c[3][1],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_eq;

    #[test]
    fn test_pixel_projection_maps_corners_to_clip_space() {
        let m = Mat4::pixel_projection(800.0, 600.0);
        let tl = m.transform_point2(Vec2::new(0.0, 0.0));
        let br = m.transform_point2(Vec2::new(800.0, 600.0));
        assert!(approx_eq(tl.x, -1.0) && approx_eq(tl.y, 1.0));
        assert!(approx_eq(br.x, 1.0) && approx_eq(br.y, -1.0));
    }

    #[test]
    fn test_cols_array_is_column_major() {
        let m = Mat4::pixel_projection(2.0, 2.0);
        let arr = m.to_cols_array();
        assert_eq!(arr[12], m.cols[3][0]);
        assert_eq!(arr[15], 1.0);
    }
}
