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

//! Static pipeline state: vertex layouts, primitive topology and blending.

use crate::renderer::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// The scalar type of a vertex attribute component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// 32-bit float (`GL_FLOAT`).
    Float,
    /// 8-bit unsigned integer (`GL_UNSIGNED_BYTE`).
    UnsignedByte,
}

impl AttributeType {
    /// The size of one component in bytes.
    pub const fn size(self) -> u32 {
        match self {
            AttributeType::Float => 4,
            AttributeType::UnsignedByte => 1,
        }
    }
}

/// One named attribute inside an interleaved vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// The attribute name in the vertex shader.
    pub name: Cow<'static, str>,
    /// The number of components (1 to 4).
    pub components: u8,
    /// The component type.
    pub kind: AttributeType,
    /// Whether integer components are normalized to `[0, 1]`.
    pub normalized: bool,
    /// Byte offset from the start of the vertex.
    pub offset: u32,
}

impl VertexAttribute {
    /// The size of the whole attribute in bytes.
    #[inline]
    pub fn size(&self) -> u32 {
        self.components as u32 * self.kind.size()
    }
}

/// The interleaved layout of every vertex in a pipeline's buffer.
///
/// Built with [`VertexLayout::builder`], which computes offsets and the stride:
///
/// ```
/// use prism_core::renderer::{AttributeType, VertexLayout};
///
/// let layout = VertexLayout::builder()
///     .attribute("inPosition", 2, AttributeType::Float, false)
///     .attribute("inTint", 4, AttributeType::UnsignedByte, true)
///     .build()
///     .unwrap();
/// assert_eq!(layout.stride(), 12);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    stride: u32,
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Starts a new layout.
    pub fn builder() -> VertexLayoutBuilder {
        VertexLayoutBuilder::default()
    }

    /// The size of one vertex in bytes.
    #[inline]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// The attributes in declaration order.
    #[inline]
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Finds an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Accumulates attributes for a [`VertexLayout`].
#[derive(Debug, Default)]
pub struct VertexLayoutBuilder {
    offset: u32,
    attributes: Vec<VertexAttribute>,
}

impl VertexLayoutBuilder {
    /// Appends an attribute right after the previous one.
    pub fn attribute(
        mut self,
        name: impl Into<Cow<'static, str>>,
        components: u8,
        kind: AttributeType,
        normalized: bool,
    ) -> Self {
        let attribute = VertexAttribute {
            name: name.into(),
            components,
            kind,
            normalized,
            offset: self.offset,
        };
        self.offset += attribute.size();
        self.attributes.push(attribute);
        self
    }

    /// Finishes the layout.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidLayout`] if the layout is empty, an
    /// attribute has 0 or more than 4 components, or two attributes share a name.
    pub fn build(self) -> Result<VertexLayout, PipelineError> {
        if self.attributes.is_empty() {
            return Err(PipelineError::InvalidLayout(
                "a vertex layout needs at least one attribute".to_string(),
            ));
        }
        for (i, attr) in self.attributes.iter().enumerate() {
            if !(1..=4).contains(&attr.components) {
                return Err(PipelineError::InvalidLayout(format!(
                    "attribute '{}' has {} components",
                    attr.name, attr.components
                )));
            }
            if self.attributes[..i].iter().any(|a| a.name == attr.name) {
                return Err(PipelineError::InvalidLayout(format!(
                    "attribute '{}' is declared twice",
                    attr.name
                )));
            }
        }
        // GL requires 4-byte aligned strides for the vertex fetch to stay fast.
        let stride = self.offset.next_multiple_of(4);
        Ok(VertexLayout {
            stride,
            attributes: self.attributes,
        })
    }
}

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Every three vertices form an independent triangle.
    #[default]
    TriangleList,
    /// Each vertex after the first two forms a triangle with the previous two.
    TriangleStrip,
    /// Every two vertices form a line.
    LineList,
}

impl PrimitiveTopology {
    /// The number of vertices that must stay together when a batch is split.
    pub const fn primitive_size(self) -> usize {
        match self {
            PrimitiveTopology::TriangleList => 3,
            PrimitiveTopology::TriangleStrip => 1,
            PrimitiveTopology::LineList => 2,
        }
    }
}

/// A blend factor, mirroring the GL enum.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

/// A blend equation, mirroring the GL enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendEquation {
    /// `src * sf + dst * df`
    #[default]
    Add,
    /// `src * sf - dst * df`
    Subtract,
    /// `dst * df - src * sf`
    ReverseSubtract,
}

/// The fixed-function blend state applied before a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlendState {
    /// Source factor for color channels.
    pub src_rgb: BlendFactor,
    /// Destination factor for color channels.
    pub dst_rgb: BlendFactor,
    /// Source factor for the alpha channel.
    pub src_alpha: BlendFactor,
    /// Destination factor for the alpha channel.
    pub dst_alpha: BlendFactor,
    /// The equation for both color and alpha.
    pub equation: BlendEquation,
}

impl BlendState {
    /// Uses the same factors for color and alpha with an additive equation.
    pub const fn uniform(src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            src_rgb: src,
            dst_rgb: dst,
            src_alpha: src,
            dst_alpha: dst,
            equation: BlendEquation::Add,
        }
    }
}

/// The blend modes a Game Object can request.
///
/// All textures are premultiplied, which is why `Normal` uses `ONE` as its
/// source factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// Standard alpha compositing.
    #[default]
    Normal,
    /// Adds the source on top of the destination.
    Add,
    /// Multiplies the destination by the source.
    Multiply,
    /// Inverts, multiplies and inverts again, lightening the destination.
    Screen,
    /// Removes the destination where the source is opaque.
    Erase,
    /// Copies the source, ignoring the destination.
    Copy,
    /// A user-defined blend state.
    Custom(BlendState),
}

impl BlendMode {
    /// The GL blend state for this mode.
    pub const fn state(self) -> BlendState {
        use BlendFactor::*;
        match self {
            BlendMode::Normal => BlendState::uniform(One, OneMinusSrcAlpha),
            BlendMode::Add => BlendState::uniform(One, DstAlpha),
            BlendMode::Multiply => BlendState::uniform(DstColor, OneMinusSrcAlpha),
            BlendMode::Screen => BlendState::uniform(One, OneMinusSrcColor),
            BlendMode::Erase => BlendState::uniform(Zero, OneMinusSrcAlpha),
            BlendMode::Copy => BlendState::uniform(One, Zero),
            BlendMode::Custom(state) => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite_layout() -> VertexLayout {
        VertexLayout::builder()
            .attribute("inPosition", 2, AttributeType::Float, false)
            .attribute("inTexCoord", 2, AttributeType::Float, false)
            .attribute("inTexId", 1, AttributeType::Float, false)
            .attribute("inTintEffect", 1, AttributeType::Float, false)
            .attribute("inTint", 4, AttributeType::UnsignedByte, true)
            .build()
            .expect("valid layout")
    }

    #[test]
    fn builder_computes_offsets_and_stride() {
        let layout = sprite_layout();
        assert_eq!(layout.stride(), 28);
        assert_eq!(layout.attribute("inTexCoord").map(|a| a.offset), Some(8));
        assert_eq!(layout.attribute("inTint").map(|a| a.offset), Some(24));
        assert!(layout.attribute("inMissing").is_none());
    }

    #[test]
    fn stride_is_padded_to_four_bytes() {
        let layout = VertexLayout::builder()
            .attribute("a", 3, AttributeType::UnsignedByte, true)
            .build()
            .expect("valid layout");
        assert_eq!(layout.stride(), 4);
    }

    #[test]
    fn invalid_layouts_are_rejected() {
        assert!(VertexLayout::builder().build().is_err());
        assert!(VertexLayout::builder()
            .attribute("a", 5, AttributeType::Float, false)
            .build()
            .is_err());
        assert!(VertexLayout::builder()
            .attribute("a", 2, AttributeType::Float, false)
            .attribute("a", 2, AttributeType::Float, false)
            .build()
            .is_err());
    }

    #[test]
    fn blend_modes_map_to_distinct_states() {
        assert_ne!(BlendMode::Normal.state(), BlendMode::Add.state());
        assert_eq!(BlendMode::Erase.state().src_rgb, BlendFactor::Zero);
        let custom = BlendState::uniform(BlendFactor::SrcAlpha, BlendFactor::One);
        assert_eq!(BlendMode::Custom(custom).state(), custom);
    }
}
