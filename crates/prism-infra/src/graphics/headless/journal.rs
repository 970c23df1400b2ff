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

//! The command journal kept by [`RecordingDevice`](super::RecordingDevice).

use prism_core::math::LinearRgba;
use prism_core::renderer::{
    BlendState, BufferId, FramebufferId, PixelRect, PrimitiveTopology, ProgramId, TextureId,
    UniformLocation,
};
use std::collections::BTreeMap;

/// The last value uploaded to a uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformData {
    /// Set with `uniform_floats`.
    Floats {
        /// Vector width of each element.
        components: u8,
        /// The uploaded values.
        data: Vec<f32>,
    },
    /// Set with `uniform_ints`.
    Ints {
        /// Vector width of each element.
        components: u8,
        /// The uploaded values.
        data: Vec<i32>,
    },
    /// Set with `uniform_matrix`.
    Matrix {
        /// 2, 3 or 4.
        dimension: u8,
        /// Column-major values.
        data: Vec<f32>,
    },
}

impl UniformData {
    /// The uploaded floats, for float and matrix uniforms.
    pub fn floats(&self) -> Option<&[f32]> {
        match self {
            UniformData::Floats { data, .. } | UniformData::Matrix { data, .. } => Some(data),
            UniformData::Ints { .. } => None,
        }
    }

    /// The uploaded ints, for int and sampler uniforms.
    pub fn ints(&self) -> Option<&[i32]> {
        match self {
            UniformData::Ints { data, .. } => Some(data),
            _ => None,
        }
    }
}

/// One draw call, with the state it was issued under.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// The active program.
    pub program: ProgramId,
    /// The label the program was created with.
    pub program_label: String,
    /// How the vertices were assembled.
    pub topology: PrimitiveTopology,
    /// First vertex.
    pub first: u32,
    /// Vertex count.
    pub count: u32,
    /// Every texture unit with a texture bound, in unit order.
    pub textures: Vec<(u32, TextureId)>,
    /// The blend state in effect.
    pub blend: Option<BlendState>,
    /// The bound framebuffer, `None` for the default one.
    pub framebuffer: Option<FramebufferId>,
    /// The viewport in effect.
    pub viewport: PixelRect,
    /// The scissor rectangle, if the scissor test was enabled.
    pub scissor: Option<PixelRect>,
    /// The values of the active program's uniforms, by name.
    pub uniforms: BTreeMap<String, UniformData>,
    /// The vertex stride from the last vertex layout.
    pub stride: u32,
    /// The bytes of the drawn vertices, `count * stride` long.
    pub vertex_data: Vec<u8>,
}

impl DrawCall {
    /// Iterates over the raw bytes of each drawn vertex.
    pub fn vertices(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.vertex_data.chunks_exact(self.stride.max(1) as usize)
    }

    /// The texture bound to `unit` when the call was issued.
    pub fn texture_on_unit(&self, unit: u32) -> Option<TextureId> {
        self.textures
            .iter()
            .find_map(|(u, t)| (*u == unit).then_some(*t))
    }
}

/// Every state-changing call the device received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// A program was linked.
    CreateProgram {
        /// The new program.
        id: ProgramId,
        /// Its label.
        label: String,
    },
    /// A program became active.
    UseProgram(ProgramId),
    /// A uniform of the active program was set.
    SetUniform {
        /// The program it was set on.
        program: ProgramId,
        /// The uniform location.
        location: UniformLocation,
        /// The uploaded data.
        data: UniformData,
    },
    /// A buffer became the array buffer.
    BindVertexBuffer(BufferId),
    /// Bytes were written into a buffer.
    WriteBuffer {
        /// The target buffer.
        id: BufferId,
        /// Byte offset of the write.
        offset: u64,
        /// Number of bytes written.
        len: usize,
    },
    /// Attribute pointers were set.
    SetVertexLayout {
        /// The program the layout was resolved against.
        program: ProgramId,
        /// Attributes the program actually declares.
        enabled: Vec<String>,
        /// The vertex stride.
        stride: u32,
    },
    /// A texture was bound to a unit.
    BindTexture {
        /// The unit.
        unit: u32,
        /// The texture.
        texture: TextureId,
    },
    /// A framebuffer was bound.
    BindFramebuffer(Option<FramebufferId>),
    /// The bound framebuffer was cleared.
    Clear(LinearRgba),
    /// The viewport changed.
    Viewport(PixelRect),
    /// The scissor test changed.
    Scissor(Option<PixelRect>),
    /// The blend state changed.
    Blend(BlendState),
    /// A draw call was issued.
    Draw(DrawCall),
}
