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

//! Provides the 2D mathematics primitives used by the renderer.
//!
//! Screen space is y-down with the origin at the top-left corner, matching
//! the coordinates game code works in. All angular functions operate in
//! **radians**.

// --- Fundamental Constants ---

/// A small constant for floating-point comparisons.
pub const EPSILON: f32 = 1e-5;

pub use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// The factor to convert degrees to radians (PI / 180.0).
pub const DEG_TO_RAD: f32 = PI / 180.0;

// --- Declare Sub-Modules ---

pub mod color;
pub mod dimension;
pub mod geometry;
pub mod matrix;
pub mod transform;
pub mod vector;

// --- Re-export Principal Types ---

pub use self::color::{pack_tint, LinearRgba};
pub use self::dimension::Extent2D;
pub use self::geometry::Rect;
pub use self::matrix::Mat4;
pub use self::transform::TransformMatrix;
pub use self::vector::Vec2;

/// Converts an angle from degrees to radians.
///
/// # Examples
///
/// ```
/// use prism_core::math::{degrees_to_radians, PI};
/// assert_eq!(degrees_to_radians(180.0), PI);
/// ```
#[inline]
pub fn degrees_to_radians(degrees: f32) -> f32 {
    degrees * DEG_TO_RAD
}

/// Checks if two `f32` values are approximately equal within [`EPSILON`].
#[inline]
pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}
