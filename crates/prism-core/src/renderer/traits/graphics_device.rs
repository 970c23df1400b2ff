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

use crate::math::LinearRgba;
use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use std::fmt::Debug;

/// The backend-agnostic contract for a GL-style graphics device.
///
/// The methods mirror the state machine of OpenGL ES 2 / WebGL: one active
/// program, one bound array buffer, numbered texture units, a bound
/// framebuffer and fixed-function blend state. The device does not elide
/// redundant calls. Callers go through a state cache for that.
///
/// Every method that touches a resource fails with
/// [`ResourceError::ContextLost`] once the context is lost. Handles created
/// before the loss stay dead even after the context comes back.
pub trait GraphicsDevice: Debug + 'static {
    /// Returns the limits of this device.
    fn capabilities(&self) -> DeviceCapabilities;

    /// Returns `true` if the GPU context has been lost.
    fn is_context_lost(&self) -> bool;

    // --- Programs ---

    /// Compiles both stages of a program and links them.
    /// ## Arguments
    /// * `descriptor` - The program label and its GLSL sources.
    /// ## Returns
    /// The ID of the linked program.
    /// ## Errors
    /// * `ResourceError::Shader` - If a stage fails to compile or the program fails to link.
    ///   The error carries the driver's info log.
    fn create_program(&self, descriptor: &ProgramDescriptor) -> Result<ProgramId, ResourceError>;

    /// Destroys a program.
    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError>;

    /// Lists the active uniforms of a linked program.
    /// Array uniforms are reported once, under their base name.
    fn active_uniforms(&self, id: ProgramId) -> Result<Vec<ActiveUniform>, ResourceError>;

    /// Makes `id` the active program.
    fn use_program(&self, id: ProgramId) -> Result<(), ResourceError>;

    /// Uploads float data to a uniform of the active program.
    /// ## Arguments
    /// * `location` - The uniform location in the active program.
    /// * `components` - The vector width (1 to 4) of each element.
    /// * `data` - `components * element count` floats.
    fn uniform_floats(
        &self,
        location: UniformLocation,
        components: u8,
        data: &[f32],
    ) -> Result<(), ResourceError>;

    /// Uploads int data to a uniform of the active program.
    /// Samplers are set with this method, one unit index per element.
    fn uniform_ints(
        &self,
        location: UniformLocation,
        components: u8,
        data: &[i32],
    ) -> Result<(), ResourceError>;

    /// Uploads a column-major square matrix of dimension 2, 3 or 4.
    fn uniform_matrix(
        &self,
        location: UniformLocation,
        dimension: u8,
        data: &[f32],
    ) -> Result<(), ResourceError>;

    // --- Buffers ---

    /// Creates a new GPU buffer.
    /// ## Arguments
    /// * `descriptor` - The size and usage hint of the buffer.
    /// ## Returns
    /// The ID of the created buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Destroys a GPU buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Binds a buffer as the array buffer vertex attributes read from.
    fn bind_vertex_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes data to a GPU buffer.
    /// ## Arguments
    /// * `id` - The ID of the buffer to write to.
    /// * `offset` - The offset in the buffer where the data will be written.
    /// * `data` - The bytes to write.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the write does not fit the buffer.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Points the program's attributes at the bound array buffer.
    /// Attributes the program does not use are skipped.
    fn set_vertex_layout(&self, program: ProgramId, layout: &VertexLayout)
        -> Result<(), ResourceError>;

    // --- Textures and framebuffers ---

    /// Creates an RGBA8 texture, optionally filled with `pixels`.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If `pixels` does not match the texture size.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        pixels: Option<&[u8]>,
    ) -> Result<TextureId, ResourceError>;

    /// Destroys a texture.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Binds a texture to a texture unit.
    fn bind_texture(&self, unit: u32, id: TextureId) -> Result<(), ResourceError>;

    /// Creates a framebuffer with `color` as its only color attachment.
    fn create_framebuffer(&self, color: TextureId) -> Result<FramebufferId, ResourceError>;

    /// Destroys a framebuffer. The attached texture is left alive.
    fn destroy_framebuffer(&self, id: FramebufferId) -> Result<(), ResourceError>;

    /// Binds a framebuffer, or the default framebuffer for `None`.
    fn bind_framebuffer(&self, id: Option<FramebufferId>) -> Result<(), ResourceError>;

    // --- Fixed-function state and drawing ---

    /// Clears the color buffer of the bound framebuffer, honouring the scissor.
    fn clear(&self, color: LinearRgba) -> Result<(), ResourceError>;

    /// Sets the viewport in framebuffer space.
    fn set_viewport(&self, rect: PixelRect) -> Result<(), ResourceError>;

    /// Enables the scissor test with `rect`, or disables it for `None`.
    fn set_scissor(&self, rect: Option<PixelRect>) -> Result<(), ResourceError>;

    /// Applies a blend state.
    fn set_blend_state(&self, state: BlendState) -> Result<(), ResourceError>;

    /// Issues one non-indexed draw call.
    /// ## Arguments
    /// * `topology` - How the vertices are assembled.
    /// * `first` - The first vertex to draw.
    /// * `count` - The number of vertices to draw.
    fn draw(&self, topology: PrimitiveTopology, first: u32, count: u32)
        -> Result<(), ResourceError>;
}
