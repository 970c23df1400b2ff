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

//! Provides the pixel extent type used for textures, render targets and the
//! drawing buffer.

use serde::{Deserialize, Serialize};

/// A two-dimensional extent, typically representing width and height.
///
/// This is commonly used for texture dimensions or the canvas size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
}

impl Extent2D {
    /// Creates a new extent.
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either side is zero.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Scales the extent, rounding down and keeping each side at least 1.
    #[inline]
    pub fn scaled(&self, scale: f32) -> Self {
        Self {
            width: ((self.width as f32 * scale).floor() as u32).max(1),
            height: ((self.height as f32 * scale).floor() as u32).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_never_drops_to_zero() {
        assert_eq!(Extent2D::new(800, 600).scaled(0.5), Extent2D::new(400, 300));
        assert_eq!(Extent2D::new(1, 1).scaled(0.1), Extent2D::new(1, 1));
        assert!(Extent2D::new(0, 10).is_empty());
    }
}
