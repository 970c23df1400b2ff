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

use super::conversions::{gl_i32, uniform_kind_from_gl, IntoGl};
use ahash::AHashMap;
use glow::{HasContext, PixelUnpackData};
use prism_core::math::LinearRgba;
use prism_core::renderer::{
    ActiveUniform, BlendState, BufferDescriptor, BufferId, DeviceCapabilities, FramebufferId,
    GraphicsDevice, PixelRect, PrimitiveTopology, ProgramDescriptor, ProgramId, ResourceError,
    ShaderError, ShaderStage, TextureDescriptor, TextureId, UniformLocation, VertexLayout,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct GlProgram {
    raw: glow::Program,
    uniforms: Vec<ActiveUniform>,
    /// Indexed by `UniformLocation.0`.
    locations: Vec<glow::UniformLocation>,
}

struct GlBuffer {
    raw: glow::Buffer,
    size: u64,
}

/// GL bindings the device changes behind the caller's back while creating
/// resources, so they can be put back afterwards.
#[derive(Default)]
struct Bindings {
    program: Option<ProgramId>,
    vertex_buffer: Option<glow::Buffer>,
    unit0: Option<glow::Texture>,
    framebuffer: Option<glow::Framebuffer>,
}

struct GlowDeviceInternal {
    gl: Arc<glow::Context>,
    capabilities: DeviceCapabilities,
    context_lost: AtomicBool,
    programs: Mutex<AHashMap<ProgramId, GlProgram>>,
    buffers: Mutex<AHashMap<BufferId, GlBuffer>>,
    textures: Mutex<AHashMap<TextureId, glow::Texture>>,
    framebuffers: Mutex<AHashMap<FramebufferId, glow::Framebuffer>>,
    bindings: Mutex<Bindings>,
    next_id: AtomicUsize,
}

/// A clonable handle to an OpenGL ES 2 / WebGL device.
///
/// Every method issues GL calls on the context handed to [`GlowDevice::new`],
/// so it must only be used while that context is current.
///
/// GL has no portable context-loss query, so the host reports it with
/// [`mark_context_lost`](GlowDevice::mark_context_lost) (for example from a
/// `webglcontextlost` event). After `webglcontextrestored` the host builds a
/// fresh `GlowDevice` and hands it to the renderer.
#[derive(Clone)]
pub struct GlowDevice {
    internal: Arc<GlowDeviceInternal>,
}

impl fmt::Debug for GlowDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlowDevice")
            .field("capabilities", &self.internal.capabilities)
            .field(
                "context_lost",
                &self.internal.context_lost.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl GlowDevice {
    /// Wraps a GL context.
    ///
    /// # Safety
    ///
    /// `gl` must be current on this thread for as long as the device is used.
    pub unsafe fn new(gl: Arc<glow::Context>) -> Self {
        let capabilities = unsafe {
            // Desktop core profiles refuse to draw without a bound vertex array.
            if let Ok(vao) = gl.create_vertex_array() {
                gl.bind_vertex_array(Some(vao));
            }
            gl.enable(glow::BLEND);
            gl.disable(glow::DEPTH_TEST);
            gl.disable(glow::CULL_FACE);
            DeviceCapabilities {
                max_texture_units: gl
                    .get_parameter_i32(glow::MAX_TEXTURE_IMAGE_UNITS)
                    .max(1) as u32,
                max_texture_size: gl.get_parameter_i32(glow::MAX_TEXTURE_SIZE).max(1) as u32,
            }
        };
        log::info!(
            "GlowDevice: {} texture units, max texture size {}",
            capabilities.max_texture_units,
            capabilities.max_texture_size
        );
        Self {
            internal: Arc::new(GlowDeviceInternal {
                gl,
                capabilities,
                context_lost: AtomicBool::new(false),
                programs: Mutex::new(AHashMap::new()),
                buffers: Mutex::new(AHashMap::new()),
                textures: Mutex::new(AHashMap::new()),
                framebuffers: Mutex::new(AHashMap::new()),
                bindings: Mutex::new(Bindings::default()),
                next_id: AtomicUsize::new(1),
            }),
        }
    }

    /// Reports that the GL context was lost. Every later call fails with
    /// [`ResourceError::ContextLost`].
    pub fn mark_context_lost(&self) {
        log::warn!("GlowDevice: context lost");
        self.internal.context_lost.store(true, Ordering::SeqCst);
    }

    fn next_id(&self) -> usize {
        self.internal.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn ensure_alive(&self) -> Result<(), ResourceError> {
        if self.internal.context_lost.load(Ordering::SeqCst) {
            Err(ResourceError::ContextLost)
        } else {
            Ok(())
        }
    }

    fn gl(&self) -> &glow::Context {
        &self.internal.gl
    }

    unsafe fn compile_stage(
        &self,
        label: &str,
        stage: ShaderStage,
        source: &str,
    ) -> Result<glow::Shader, ResourceError> {
        let gl = self.gl();
        unsafe {
            let shader = gl
                .create_shader(stage.into_gl())
                .map_err(ResourceError::BackendError)?;
            gl.shader_source(shader, source);
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                gl.delete_shader(shader);
                return Err(ShaderError::CompilationError {
                    label: label.to_string(),
                    stage,
                    log,
                }
                .into());
            }
            Ok(shader)
        }
    }

    /// Reflects uniforms, merging `name[0]` array entries under their base name.
    unsafe fn reflect(
        &self,
        program: glow::Program,
    ) -> (Vec<ActiveUniform>, Vec<glow::UniformLocation>) {
        let gl = self.gl();
        let mut uniforms = Vec::new();
        let mut locations = Vec::new();
        unsafe {
            for index in 0..gl.get_active_uniforms(program) {
                let Some(active) = gl.get_active_uniform(program, index) else {
                    continue;
                };
                let Some(kind) = uniform_kind_from_gl(active.utype) else {
                    log::debug!("GlowDevice: skipping uniform '{}' of unsupported type", active.name);
                    continue;
                };
                let Some(location) = gl.get_uniform_location(program, &active.name) else {
                    continue;
                };
                let name = active
                    .name
                    .strip_suffix("[0]")
                    .unwrap_or(&active.name)
                    .to_string();
                uniforms.push(ActiveUniform {
                    name,
                    kind,
                    array_len: active.size.max(1) as usize,
                    location: UniformLocation(locations.len() as u32),
                });
                locations.push(location);
            }
        }
        (uniforms, locations)
    }

    fn with_location<R>(
        &self,
        location: UniformLocation,
        f: impl FnOnce(&glow::Context, &glow::UniformLocation) -> R,
    ) -> Result<R, ResourceError> {
        self.ensure_alive()?;
        let program = lock(&self.internal.bindings)
            .program
            .ok_or(ResourceError::InvalidHandle)?;
        let programs = lock(&self.internal.programs);
        let entry = programs.get(&program).ok_or(ResourceError::InvalidHandle)?;
        let raw = entry
            .locations
            .get(location.0 as usize)
            .ok_or(ResourceError::InvalidHandle)?;
        Ok(f(self.gl(), raw))
    }
}

impl GraphicsDevice for GlowDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.internal.capabilities
    }

    fn is_context_lost(&self) -> bool {
        self.internal.context_lost.load(Ordering::SeqCst)
    }

    fn create_program(&self, descriptor: &ProgramDescriptor) -> Result<ProgramId, ResourceError> {
        self.ensure_alive()?;
        let label: &str = &descriptor.label;
        let gl = self.gl();
        unsafe {
            let vs = self.compile_stage(label, ShaderStage::Vertex, &descriptor.vertex_source)?;
            let fs = match self.compile_stage(label, ShaderStage::Fragment, &descriptor.fragment_source)
            {
                Ok(fs) => fs,
                Err(e) => {
                    gl.delete_shader(vs);
                    return Err(e);
                }
            };
            let program = gl.create_program().map_err(ResourceError::BackendError)?;
            gl.attach_shader(program, vs);
            gl.attach_shader(program, fs);
            gl.link_program(program);
            gl.detach_shader(program, vs);
            gl.detach_shader(program, fs);
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(ShaderError::LinkError {
                    label: label.to_string(),
                    log,
                }
                .into());
            }

            let (uniforms, locations) = self.reflect(program);
            let id = ProgramId(self.next_id());
            lock(&self.internal.programs).insert(
                id,
                GlProgram {
                    raw: program,
                    uniforms,
                    locations,
                },
            );
            log::debug!("GlowDevice: Linked program '{label}' with ID: {id:?}");
            Ok(id)
        }
    }

    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let entry = lock(&self.internal.programs)
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        unsafe { self.gl().delete_program(entry.raw) };
        Ok(())
    }

    fn active_uniforms(&self, id: ProgramId) -> Result<Vec<ActiveUniform>, ResourceError> {
        self.ensure_alive()?;
        lock(&self.internal.programs)
            .get(&id)
            .map(|p| p.uniforms.clone())
            .ok_or(ResourceError::NotFound)
    }

    fn use_program(&self, id: ProgramId) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let raw = lock(&self.internal.programs)
            .get(&id)
            .map(|p| p.raw)
            .ok_or(ResourceError::InvalidHandle)?;
        unsafe { self.gl().use_program(Some(raw)) };
        lock(&self.internal.bindings).program = Some(id);
        Ok(())
    }

    fn uniform_floats(
        &self,
        location: UniformLocation,
        components: u8,
        data: &[f32],
    ) -> Result<(), ResourceError> {
        self.with_location(location, |gl, loc| unsafe {
            match components {
                1 => gl.uniform_1_f32_slice(Some(loc), data),
                2 => gl.uniform_2_f32_slice(Some(loc), data),
                3 => gl.uniform_3_f32_slice(Some(loc), data),
                _ => gl.uniform_4_f32_slice(Some(loc), data),
            }
        })
    }

    fn uniform_ints(
        &self,
        location: UniformLocation,
        components: u8,
        data: &[i32],
    ) -> Result<(), ResourceError> {
        self.with_location(location, |gl, loc| unsafe {
            match components {
                1 => gl.uniform_1_i32_slice(Some(loc), data),
                2 => gl.uniform_2_i32_slice(Some(loc), data),
                3 => gl.uniform_3_i32_slice(Some(loc), data),
                _ => gl.uniform_4_i32_slice(Some(loc), data),
            }
        })
    }

    fn uniform_matrix(
        &self,
        location: UniformLocation,
        dimension: u8,
        data: &[f32],
    ) -> Result<(), ResourceError> {
        self.with_location(location, |gl, loc| unsafe {
            match dimension {
                2 => gl.uniform_matrix_2_f32_slice(Some(loc), false, data),
                3 => gl.uniform_matrix_3_f32_slice(Some(loc), false, data),
                _ => gl.uniform_matrix_4_f32_slice(Some(loc), false, data),
            }
        })
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        self.ensure_alive()?;
        let gl = self.gl();
        let raw = unsafe {
            let raw = gl.create_buffer().map_err(ResourceError::BackendError)?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(raw));
            gl.buffer_data_size(
                glow::ARRAY_BUFFER,
                gl_i32(descriptor.size),
                descriptor.usage.into_gl(),
            );
            gl.bind_buffer(glow::ARRAY_BUFFER, lock(&self.internal.bindings).vertex_buffer);
            raw
        };
        let id = BufferId(self.next_id());
        lock(&self.internal.buffers).insert(
            id,
            GlBuffer {
                raw,
                size: descriptor.size,
            },
        );
        log::debug!(
            "GlowDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            descriptor.size
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let entry = lock(&self.internal.buffers)
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        let mut bindings = lock(&self.internal.bindings);
        if bindings.vertex_buffer == Some(entry.raw) {
            bindings.vertex_buffer = None;
        }
        unsafe { self.gl().delete_buffer(entry.raw) };
        Ok(())
    }

    fn bind_vertex_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let raw = lock(&self.internal.buffers)
            .get(&id)
            .map(|b| b.raw)
            .ok_or(ResourceError::InvalidHandle)?;
        unsafe { self.gl().bind_buffer(glow::ARRAY_BUFFER, Some(raw)) };
        lock(&self.internal.bindings).vertex_buffer = Some(raw);
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let buffers = lock(&self.internal.buffers);
        let entry = buffers.get(&id).ok_or(ResourceError::NotFound)?;
        if offset + data.len() as u64 > entry.size {
            return Err(ResourceError::OutOfBounds);
        }
        let gl = self.gl();
        let bound = lock(&self.internal.bindings).vertex_buffer;
        unsafe {
            if bound != Some(entry.raw) {
                gl.bind_buffer(glow::ARRAY_BUFFER, Some(entry.raw));
            }
            gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, gl_i32(offset), data);
            if bound != Some(entry.raw) {
                gl.bind_buffer(glow::ARRAY_BUFFER, bound);
            }
        }
        Ok(())
    }

    fn set_vertex_layout(
        &self,
        program: ProgramId,
        layout: &VertexLayout,
    ) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let raw = lock(&self.internal.programs)
            .get(&program)
            .map(|p| p.raw)
            .ok_or(ResourceError::InvalidHandle)?;
        let gl = self.gl();
        let stride = gl_i32(layout.stride());
        unsafe {
            for attribute in layout.attributes() {
                let Some(index) = gl.get_attrib_location(raw, &attribute.name) else {
                    continue;
                };
                gl.enable_vertex_attrib_array(index);
                gl.vertex_attrib_pointer_f32(
                    index,
                    attribute.components as i32,
                    attribute.kind.into_gl(),
                    attribute.normalized,
                    stride,
                    gl_i32(attribute.offset),
                );
            }
        }
        Ok(())
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        pixels: Option<&[u8]>,
    ) -> Result<TextureId, ResourceError> {
        self.ensure_alive()?;
        if pixels.is_some_and(|p| p.len() != descriptor.byte_len()) {
            return Err(ResourceError::OutOfBounds);
        }
        let gl = self.gl();
        let filter = descriptor.filter.into_gl() as i32;
        let raw = unsafe {
            let raw = gl.create_texture().map_err(ResourceError::BackendError)?;
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(raw));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter);
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                gl_i32(descriptor.size.width),
                gl_i32(descriptor.size.height),
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(pixels),
            );
            gl.bind_texture(glow::TEXTURE_2D, lock(&self.internal.bindings).unit0);
            raw
        };
        let id = TextureId(self.next_id());
        lock(&self.internal.textures).insert(id, raw);
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let raw = lock(&self.internal.textures)
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        let mut bindings = lock(&self.internal.bindings);
        if bindings.unit0 == Some(raw) {
            bindings.unit0 = None;
        }
        unsafe { self.gl().delete_texture(raw) };
        Ok(())
    }

    fn bind_texture(&self, unit: u32, id: TextureId) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        if unit >= self.internal.capabilities.max_texture_units {
            return Err(ResourceError::OutOfBounds);
        }
        let raw = *lock(&self.internal.textures)
            .get(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        unsafe {
            self.gl().active_texture(glow::TEXTURE0 + unit);
            self.gl().bind_texture(glow::TEXTURE_2D, Some(raw));
        }
        if unit == 0 {
            lock(&self.internal.bindings).unit0 = Some(raw);
        }
        Ok(())
    }

    fn create_framebuffer(&self, color: TextureId) -> Result<FramebufferId, ResourceError> {
        self.ensure_alive()?;
        let texture = *lock(&self.internal.textures)
            .get(&color)
            .ok_or(ResourceError::InvalidHandle)?;
        let gl = self.gl();
        let raw = unsafe {
            let raw = gl.create_framebuffer().map_err(ResourceError::BackendError)?;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(raw));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, lock(&self.internal.bindings).framebuffer);
            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_framebuffer(raw);
                return Err(ResourceError::BackendError(format!(
                    "framebuffer incomplete: 0x{status:X}"
                )));
            }
            raw
        };
        let id = FramebufferId(self.next_id());
        lock(&self.internal.framebuffers).insert(id, raw);
        Ok(id)
    }

    fn destroy_framebuffer(&self, id: FramebufferId) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let raw = lock(&self.internal.framebuffers)
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        let mut bindings = lock(&self.internal.bindings);
        if bindings.framebuffer == Some(raw) {
            bindings.framebuffer = None;
        }
        unsafe { self.gl().delete_framebuffer(raw) };
        Ok(())
    }

    fn bind_framebuffer(&self, id: Option<FramebufferId>) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let raw = match id {
            Some(id) => Some(
                *lock(&self.internal.framebuffers)
                    .get(&id)
                    .ok_or(ResourceError::InvalidHandle)?,
            ),
            None => None,
        };
        unsafe { self.gl().bind_framebuffer(glow::FRAMEBUFFER, raw) };
        lock(&self.internal.bindings).framebuffer = raw;
        Ok(())
    }

    fn clear(&self, color: LinearRgba) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        unsafe {
            self.gl().clear_color(color.r, color.g, color.b, color.a);
            self.gl().clear(glow::COLOR_BUFFER_BIT);
        }
        Ok(())
    }

    fn set_viewport(&self, rect: PixelRect) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        unsafe {
            self.gl()
                .viewport(rect.x, rect.y, gl_i32(rect.width), gl_i32(rect.height))
        };
        Ok(())
    }

    fn set_scissor(&self, rect: Option<PixelRect>) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let gl = self.gl();
        unsafe {
            match rect {
                Some(r) => {
                    gl.enable(glow::SCISSOR_TEST);
                    gl.scissor(r.x, r.y, gl_i32(r.width), gl_i32(r.height));
                }
                None => gl.disable(glow::SCISSOR_TEST),
            }
        }
        Ok(())
    }

    fn set_blend_state(&self, state: BlendState) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let gl = self.gl();
        unsafe {
            gl.blend_equation(state.equation.into_gl());
            gl.blend_func_separate(
                state.src_rgb.into_gl(),
                state.dst_rgb.into_gl(),
                state.src_alpha.into_gl(),
                state.dst_alpha.into_gl(),
            );
        }
        Ok(())
    }

    fn draw(
        &self,
        topology: PrimitiveTopology,
        first: u32,
        count: u32,
    ) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        unsafe {
            self.gl()
                .draw_arrays(topology.into_gl(), gl_i32(first), gl_i32(count))
        };
        Ok(())
    }
}
