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

//! Built-in GLSL ES 1.00 shader sources.
//!
//! The sources are embedded at compile time and run unchanged on WebGL 1 and
//! OpenGL ES 2 contexts.
//!
//! # Available Shaders
//!
//! - [`MULTI_VERT`] / [`MULTI_FRAG`] - Multi-texture sprite batching. The fragment
//!   source is a template, see [`MULTI_FRAG`].
//! - [`SINGLE_FRAG`] - Single-texture sprite batching, paired with [`MULTI_VERT`].
//! - [`QUAD_VERT`] - Full-screen quad for post-processing passes.
//! - [`COPY_FRAG`] / [`GRAYSCALE_FRAG`] - Post-processing effects.

/// Vertex stage shared by the sprite batching pipelines.
///
/// Reads the 28-byte sprite vertex: position, texture coordinate, texture
/// unit, tint effect and a packed RGBA tint.
pub const MULTI_VERT: &str = include_str!("multi.vert");

/// Fragment template of the multi-texture pipeline.
///
/// Contains two placeholders filled in by
/// [`multi_fragment_source`](super::multi_fragment_source):
/// - `%count%` - the size of the `uMainSampler` array
/// - `%forloop%` - an if/else chain sampling the unit picked by `outTexId`
pub const MULTI_FRAG: &str = include_str!("multi.frag");

/// Fragment stage of the single-texture pipeline.
pub const SINGLE_FRAG: &str = include_str!("single.frag");

/// Vertex stage of post-processing pipelines.
pub const QUAD_VERT: &str = include_str!("quad.vert");

/// Copies a texture, scaled by `uBrightness`.
pub const COPY_FRAG: &str = include_str!("copy.frag");

/// Blends a texture towards its luminance by `uGray`.
pub const GRAYSCALE_FRAG: &str = include_str!("grayscale.frag");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_source_has_an_entry_point() {
        for source in [MULTI_VERT, MULTI_FRAG, SINGLE_FRAG, QUAD_VERT, COPY_FRAG, GRAYSCALE_FRAG] {
            assert!(source.contains("void main"));
        }
    }

    #[test]
    fn multi_fragment_is_a_template() {
        assert!(MULTI_FRAG.contains("%count%"));
        assert!(MULTI_FRAG.contains("%forloop%"));
    }
}
