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

//! GPU resource handles and their descriptors.

use crate::math::Extent2D;
use std::borrow::Cow;

/// An opaque handle to a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub usize);

/// An opaque handle to a GPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);

/// An opaque handle to a 2D texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

/// An opaque handle to a framebuffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub usize);

/// The location of a uniform inside a specific program.
///
/// Locations are only meaningful for the program they were reflected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// How often the contents of a buffer are expected to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// Written once, drawn many times.
    Static,
    /// Rewritten every frame or more often. Batch vertex buffers use this.
    #[default]
    Dynamic,
    /// Written once, drawn a few times.
    Stream,
}

/// A descriptor used to create a [`BufferId`].
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The total size of the buffer in bytes.
    pub size: u64,
    /// The expected update frequency.
    pub usage: BufferUsage,
}

/// Texture sampling filter for both minification and magnification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Bilinear filtering.
    #[default]
    Linear,
    /// Nearest-texel sampling, for pixel art.
    Nearest,
}

/// A descriptor used to create a [`TextureId`].
///
/// Textures are always RGBA8 with clamp-to-edge wrapping, which is all the
/// 2D pipelines sample.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The size of the texture in pixels.
    pub size: Extent2D,
    /// The sampling filter.
    pub filter: FilterMode,
    /// `true` if the texture will be attached to a framebuffer.
    ///
    /// Render target textures are stored bottom-up, so pipelines flip their
    /// `v` coordinate when sampling them.
    pub render_target: bool,
}

impl TextureDescriptor<'_> {
    /// The number of bytes of RGBA8 pixel data the texture expects.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.size.width as usize * self.size.height as usize * 4
    }
}

/// A rectangle in framebuffer pixels with a bottom-left origin.
///
/// This is the coordinate space `glViewport` and `glScissor` use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelRect {
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelRect {
    /// Creates a new rectangle.
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Converts a top-left-origin rectangle into framebuffer space for a
    /// surface `surface_height` pixels tall.
    #[inline]
    pub fn from_top_left(x: i32, y: i32, width: u32, height: u32, surface_height: u32) -> Self {
        Self {
            x,
            y: surface_height as i32 - (y + height as i32),
            width,
            height,
        }
    }
}
