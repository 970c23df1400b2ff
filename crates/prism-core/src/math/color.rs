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

//! Defines the `LinearRgba` color type and the packed 32-bit tint format.

use serde::{Deserialize, Serialize};

/// Represents a color using `f32` RGBA components.
///
/// Clear colors, camera backgrounds and blend constants use this type.
/// Per-vertex tints are stored packed, see [`pack_tint`].
///
/// `#[repr(C)]` ensures a consistent memory layout, which is important when passing
/// color data to graphics APIs.
#[derive(
    Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct LinearRgba {
    /// The red component.
    pub r: f32,
    /// The green component.
    pub g: f32,
    /// The blue component.
    pub b: f32,
    /// The alpha (opacity) component.
    pub a: f32,
}

impl LinearRgba {
    /// Opaque white (`[1.0, 1.0, 1.0, 1.0]`).
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    /// Opaque black (`[0.0, 0.0, 0.0, 1.0]`).
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    /// Fully transparent black (`[0.0, 0.0, 0.0, 0.0]`).
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a new `LinearRgba` with explicit RGBA values.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a new opaque `LinearRgba` (alpha = 1.0).
    #[inline]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Creates a color from a `0xRRGGBB` integer and an alpha value.
    #[inline]
    pub fn from_rgb_u32(rgb: u32, a: f32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xFF) as f32 / 255.0,
            g: ((rgb >> 8) & 0xFF) as f32 / 255.0,
            b: (rgb & 0xFF) as f32 / 255.0,
            a,
        }
    }

    /// Returns a new color with the same RGB components but a different alpha.
    #[inline]
    pub fn with_alpha(&self, a: f32) -> Self {
        Self { a, ..*self }
    }

    /// Packs this color into the 32-bit vertex tint format.
    #[inline]
    pub fn to_packed(&self) -> u32 {
        let rgb = ((unit_to_byte(self.r) as u32) << 16)
            | ((unit_to_byte(self.g) as u32) << 8)
            | unit_to_byte(self.b) as u32;
        pack_tint(rgb, self.a)
    }
}

impl Default for LinearRgba {
    fn default() -> Self {
        Self::BLACK
    }
}

#[inline]
fn unit_to_byte(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Packs a `0xRRGGBB` tint and an alpha in `[0, 1]` into a vertex tint.
///
/// The result is laid out so its little-endian bytes read `R, G, B, A`,
/// which a normalized `UNSIGNED_BYTE x4` attribute turns back into a
/// `vec4` in the shader.
#[inline]
pub fn pack_tint(rgb: u32, alpha: f32) -> u32 {
    let r = (rgb >> 16) & 0xFF;
    let g = (rgb >> 8) & 0xFF;
    let b = rgb & 0xFF;
    let a = unit_to_byte(alpha) as u32;
    r | (g << 8) | (b << 16) | (a << 24)
}
