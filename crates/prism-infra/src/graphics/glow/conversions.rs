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

//! Conversions from Prism API enums to GL constants.

use prism_core::renderer::{
    AttributeType, BlendEquation, BlendFactor, BufferUsage, FilterMode, PrimitiveTopology,
    ShaderStage, UniformKind,
};

/// Converts a Prism type into the GL enum it stands for.
pub(super) trait IntoGl {
    fn into_gl(self) -> u32;
}

impl IntoGl for BlendFactor {
    fn into_gl(self) -> u32 {
        match self {
            BlendFactor::Zero => glow::ZERO,
            BlendFactor::One => glow::ONE,
            BlendFactor::SrcColor => glow::SRC_COLOR,
            BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
            BlendFactor::DstColor => glow::DST_COLOR,
            BlendFactor::OneMinusDstColor => glow::ONE_MINUS_DST_COLOR,
            BlendFactor::SrcAlpha => glow::SRC_ALPHA,
            BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
            BlendFactor::DstAlpha => glow::DST_ALPHA,
            BlendFactor::OneMinusDstAlpha => glow::ONE_MINUS_DST_ALPHA,
        }
    }
}

impl IntoGl for BlendEquation {
    fn into_gl(self) -> u32 {
        match self {
            BlendEquation::Add => glow::FUNC_ADD,
            BlendEquation::Subtract => glow::FUNC_SUBTRACT,
            BlendEquation::ReverseSubtract => glow::FUNC_REVERSE_SUBTRACT,
        }
    }
}

impl IntoGl for PrimitiveTopology {
    fn into_gl(self) -> u32 {
        match self {
            PrimitiveTopology::TriangleList => glow::TRIANGLES,
            PrimitiveTopology::TriangleStrip => glow::TRIANGLE_STRIP,
            PrimitiveTopology::LineList => glow::LINES,
        }
    }
}

impl IntoGl for AttributeType {
    fn into_gl(self) -> u32 {
        match self {
            AttributeType::Float => glow::FLOAT,
            AttributeType::UnsignedByte => glow::UNSIGNED_BYTE,
        }
    }
}

impl IntoGl for BufferUsage {
    fn into_gl(self) -> u32 {
        match self {
            BufferUsage::Static => glow::STATIC_DRAW,
            BufferUsage::Dynamic => glow::DYNAMIC_DRAW,
            BufferUsage::Stream => glow::STREAM_DRAW,
        }
    }
}

impl IntoGl for FilterMode {
    fn into_gl(self) -> u32 {
        match self {
            FilterMode::Linear => glow::LINEAR,
            FilterMode::Nearest => glow::NEAREST,
        }
    }
}

impl IntoGl for ShaderStage {
    fn into_gl(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        }
    }
}

/// Maps the `type` reported by `glGetActiveUniform`.
pub(super) fn uniform_kind_from_gl(utype: u32) -> Option<UniformKind> {
    Some(match utype {
        glow::FLOAT => UniformKind::Float,
        glow::FLOAT_VEC2 => UniformKind::Vec2,
        glow::FLOAT_VEC3 => UniformKind::Vec3,
        glow::FLOAT_VEC4 => UniformKind::Vec4,
        glow::INT => UniformKind::Int,
        glow::INT_VEC2 => UniformKind::IVec2,
        glow::INT_VEC3 => UniformKind::IVec3,
        glow::INT_VEC4 => UniformKind::IVec4,
        glow::BOOL => UniformKind::Bool,
        glow::FLOAT_MAT2 => UniformKind::Mat2,
        glow::FLOAT_MAT3 => UniformKind::Mat3,
        glow::FLOAT_MAT4 => UniformKind::Mat4,
        glow::SAMPLER_2D => UniformKind::Sampler2D,
        _ => return None,
    })
}

/// Converts a size or offset to the `i32` GL entry points take.
pub(super) fn gl_i32(value: impl TryInto<i32>) -> i32 {
    value.try_into().unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_types_round_trip() {
        assert_eq!(
            uniform_kind_from_gl(glow::SAMPLER_2D),
            Some(UniformKind::Sampler2D)
        );
        assert_eq!(uniform_kind_from_gl(glow::SAMPLER_CUBE), None);
    }

    #[test]
    fn blend_factors() {
        assert_eq!(BlendFactor::OneMinusSrcAlpha.into_gl(), glow::ONE_MINUS_SRC_ALPHA);
        assert_eq!(gl_i32(u64::MAX), i32::MAX);
    }
}
