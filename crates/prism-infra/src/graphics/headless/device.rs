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

use super::journal::{DrawCall, GpuCommand, UniformData};
use super::reflection;
use ahash::AHashMap;
use prism_core::math::LinearRgba;
use prism_core::renderer::{
    ActiveUniform, BlendState, BufferDescriptor, BufferId, DeviceCapabilities, FramebufferId,
    GraphicsDevice, PixelRect, PrimitiveTopology, ProgramDescriptor, ProgramId, ResourceError,
    ShaderError, ShaderStage, TextureDescriptor, TextureId, UniformLocation, VertexLayout,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Limits and behavior of a [`RecordingDevice`].
#[derive(Debug, Clone)]
pub struct RecordingDeviceConfig {
    /// Reported as `MAX_TEXTURE_IMAGE_UNITS`.
    pub max_texture_units: u32,
    /// Reported as `MAX_TEXTURE_SIZE`.
    pub max_texture_size: u32,
    /// Store every buffer write and snapshot vertices into each [`DrawCall`].
    pub capture_vertex_data: bool,
}

impl Default for RecordingDeviceConfig {
    fn default() -> Self {
        Self {
            max_texture_units: 16,
            max_texture_size: 4096,
            capture_vertex_data: true,
        }
    }
}

#[derive(Debug)]
struct ProgramEntry {
    label: String,
    uniforms: Vec<ActiveUniform>,
    attributes: HashSet<String>,
    values: AHashMap<UniformLocation, UniformData>,
}

#[derive(Debug)]
struct BufferEntry {
    bytes: Vec<u8>,
}

#[derive(Debug)]
struct TextureEntry {
    label: Option<String>,
}

/// GL state the device tracks between calls.
#[derive(Debug, Default)]
struct BoundState {
    program: Option<ProgramId>,
    vertex_buffer: Option<BufferId>,
    stride: u32,
    units: BTreeMap<u32, TextureId>,
    framebuffer: Option<FramebufferId>,
    viewport: PixelRect,
    scissor: Option<PixelRect>,
    blend: Option<BlendState>,
}

/// The internal, non-clonable state of the RecordingDevice.
#[derive(Debug)]
struct RecordingDeviceInternal {
    config: RecordingDeviceConfig,
    context_lost: AtomicBool,
    programs: Mutex<AHashMap<ProgramId, ProgramEntry>>,
    buffers: Mutex<AHashMap<BufferId, BufferEntry>>,
    textures: Mutex<AHashMap<TextureId, TextureEntry>>,
    framebuffers: Mutex<AHashMap<FramebufferId, TextureId>>,
    state: Mutex<BoundState>,
    journal: Mutex<Vec<GpuCommand>>,
    failing_labels: Mutex<HashSet<String>>,

    next_program_id: AtomicUsize,
    next_buffer_id: AtomicUsize,
    next_texture_id: AtomicUsize,
    next_framebuffer_id: AtomicUsize,
}

/// A clonable handle to a headless device that records every call.
///
/// Clones share the same state, so a test can hand one clone to the renderer
/// and inspect the journal through another:
///
/// ```
/// use prism_core::renderer::GraphicsDevice;
/// use prism_infra::RecordingDevice;
///
/// let device = RecordingDevice::default();
/// let observer = device.clone();
/// assert_eq!(device.capabilities().max_texture_units, 16);
/// assert!(observer.draw_calls().is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct RecordingDevice {
    internal: Arc<RecordingDeviceInternal>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new(RecordingDeviceConfig::default())
    }
}

/// Locks a mutex, recovering the data if a panicking test poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingDevice {
    /// Creates a device with the given limits.
    pub fn new(config: RecordingDeviceConfig) -> Self {
        Self {
            internal: Arc::new(RecordingDeviceInternal {
                config,
                context_lost: AtomicBool::new(false),
                programs: Mutex::new(AHashMap::new()),
                buffers: Mutex::new(AHashMap::new()),
                textures: Mutex::new(AHashMap::new()),
                framebuffers: Mutex::new(AHashMap::new()),
                state: Mutex::new(BoundState::default()),
                journal: Mutex::new(Vec::new()),
                failing_labels: Mutex::new(HashSet::new()),
                next_program_id: AtomicUsize::new(1),
                next_buffer_id: AtomicUsize::new(1),
                next_texture_id: AtomicUsize::new(1),
                next_framebuffer_id: AtomicUsize::new(1),
            }),
        }
    }

    /// Creates a device reporting `units` texture units.
    pub fn with_texture_units(units: u32) -> Self {
        Self::new(RecordingDeviceConfig {
            max_texture_units: units,
            ..Default::default()
        })
    }

    // --- Inspection ---

    /// A copy of the journal.
    pub fn commands(&self) -> Vec<GpuCommand> {
        lock(&self.internal.journal).clone()
    }

    /// Drains the journal.
    pub fn take_commands(&self) -> Vec<GpuCommand> {
        std::mem::take(&mut *lock(&self.internal.journal))
    }

    /// Every draw call in the journal, in issue order.
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        lock(&self.internal.journal)
            .iter()
            .filter_map(|c| match c {
                GpuCommand::Draw(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }

    /// Empties the journal without touching resources or bound state.
    pub fn clear_journal(&self) {
        lock(&self.internal.journal).clear();
    }

    /// The number of live programs, buffers, textures and framebuffers.
    pub fn live_resources(&self) -> (usize, usize, usize, usize) {
        (
            lock(&self.internal.programs).len(),
            lock(&self.internal.buffers).len(),
            lock(&self.internal.textures).len(),
            lock(&self.internal.framebuffers).len(),
        )
    }

    /// The label a live texture was created with.
    pub fn texture_label(&self, id: TextureId) -> Option<String> {
        lock(&self.internal.textures)
            .get(&id)
            .and_then(|t| t.label.clone())
    }

    /// The labels of every live program.
    pub fn program_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = lock(&self.internal.programs)
            .values()
            .map(|p| p.label.clone())
            .collect();
        labels.sort();
        labels
    }

    // --- Fault injection ---

    /// Simulates `webglcontextlost`: every resource is gone and every call fails.
    pub fn lose_context(&self) {
        log::warn!("RecordingDevice: context lost");
        self.internal.context_lost.store(true, Ordering::SeqCst);
        lock(&self.internal.programs).clear();
        lock(&self.internal.buffers).clear();
        lock(&self.internal.textures).clear();
        lock(&self.internal.framebuffers).clear();
        *lock(&self.internal.state) = BoundState::default();
    }

    /// Simulates `webglcontextrestored`. Old handles stay invalid.
    pub fn restore_context(&self) {
        log::info!("RecordingDevice: context restored");
        self.internal.context_lost.store(false, Ordering::SeqCst);
    }

    /// Makes every later `create_program` for `label` fail to link.
    pub fn fail_programs_labelled(&self, label: impl Into<String>) {
        lock(&self.internal.failing_labels).insert(label.into());
    }

    // --- Internal helpers ---

    fn ensure_alive(&self) -> Result<(), ResourceError> {
        if self.internal.context_lost.load(Ordering::SeqCst) {
            Err(ResourceError::ContextLost)
        } else {
            Ok(())
        }
    }

    fn record(&self, command: GpuCommand) {
        lock(&self.internal.journal).push(command);
    }

    fn set_uniform(
        &self,
        location: UniformLocation,
        data: UniformData,
    ) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let program = lock(&self.internal.state)
            .program
            .ok_or(ResourceError::InvalidHandle)?;
        let mut programs = lock(&self.internal.programs);
        let entry = programs
            .get_mut(&program)
            .ok_or(ResourceError::InvalidHandle)?;
        if !entry.uniforms.iter().any(|u| u.location == location) {
            return Err(ResourceError::InvalidHandle);
        }
        entry.values.insert(location, data.clone());
        drop(programs);
        self.record(GpuCommand::SetUniform {
            program,
            location,
            data,
        });
        Ok(())
    }
}

impl GraphicsDevice for RecordingDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities {
            max_texture_units: self.internal.config.max_texture_units,
            max_texture_size: self.internal.config.max_texture_size,
        }
    }

    fn is_context_lost(&self) -> bool {
        self.internal.context_lost.load(Ordering::SeqCst)
    }

    fn create_program(&self, descriptor: &ProgramDescriptor) -> Result<ProgramId, ResourceError> {
        self.ensure_alive()?;
        let label = descriptor.label.to_string();
        for (stage, source) in [
            (ShaderStage::Vertex, &descriptor.vertex_source),
            (ShaderStage::Fragment, &descriptor.fragment_source),
        ] {
            reflection::check_stage(stage, source).map_err(|log| ShaderError::CompilationError {
                label: label.clone(),
                stage,
                log,
            })?;
        }
        let samplers: usize = reflection::declarations(&descriptor.fragment_source, "uniform")
            .iter()
            .filter(|d| d.type_name == "sampler2D")
            .map(|d| d.array_len)
            .sum();
        let units = self.internal.config.max_texture_units as usize;
        if samplers > units {
            return Err(ShaderError::LinkError {
                label,
                log: format!(
                    "ERROR: too many samplers in the fragment shader ({samplers} > {units})"
                ),
            }
            .into());
        }
        if lock(&self.internal.failing_labels).contains(&label) {
            return Err(ShaderError::LinkError {
                label,
                log: "ERROR: link failed (injected)".to_string(),
            }
            .into());
        }

        let uniforms = reflection::program_uniforms(
            &descriptor.vertex_source,
            &descriptor.fragment_source,
        )
        .into_iter()
        .enumerate()
        .map(|(i, (kind, decl))| ActiveUniform {
            name: decl.name,
            kind,
            array_len: decl.array_len,
            location: UniformLocation(i as u32),
        })
        .collect();
        let attributes = reflection::declarations(&descriptor.vertex_source, "attribute")
            .into_iter()
            .map(|d| d.name)
            .collect();

        let id = ProgramId(
            self.internal
                .next_program_id
                .fetch_add(1, Ordering::Relaxed),
        );
        lock(&self.internal.programs).insert(
            id,
            ProgramEntry {
                label: label.clone(),
                uniforms,
                attributes,
                values: AHashMap::new(),
            },
        );
        log::debug!("RecordingDevice: Linked program '{label}' with ID: {id:?}");
        self.record(GpuCommand::CreateProgram { id, label });
        Ok(id)
    }

    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        lock(&self.internal.programs)
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)?;
        let mut state = lock(&self.internal.state);
        if state.program == Some(id) {
            state.program = None;
        }
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
        if !lock(&self.internal.programs).contains_key(&id) {
            return Err(ResourceError::InvalidHandle);
        }
        lock(&self.internal.state).program = Some(id);
        self.record(GpuCommand::UseProgram(id));
        Ok(())
    }

    fn uniform_floats(
        &self,
        location: UniformLocation,
        components: u8,
        data: &[f32],
    ) -> Result<(), ResourceError> {
        self.set_uniform(
            location,
            UniformData::Floats {
                components,
                data: data.to_vec(),
            },
        )
    }

    fn uniform_ints(
        &self,
        location: UniformLocation,
        components: u8,
        data: &[i32],
    ) -> Result<(), ResourceError> {
        self.set_uniform(
            location,
            UniformData::Ints {
                components,
                data: data.to_vec(),
            },
        )
    }

    fn uniform_matrix(
        &self,
        location: UniformLocation,
        dimension: u8,
        data: &[f32],
    ) -> Result<(), ResourceError> {
        if data.len() != dimension as usize * dimension as usize {
            return Err(ResourceError::OutOfBounds);
        }
        self.set_uniform(
            location,
            UniformData::Matrix {
                dimension,
                data: data.to_vec(),
            },
        )
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        self.ensure_alive()?;
        let id = BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.buffers).insert(
            id,
            BufferEntry {
                bytes: vec![0; descriptor.size as usize],
            },
        );
        log::debug!(
            "RecordingDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            descriptor.size
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        lock(&self.internal.buffers)
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        let mut state = lock(&self.internal.state);
        if state.vertex_buffer == Some(id) {
            state.vertex_buffer = None;
        }
        Ok(())
    }

    fn bind_vertex_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        if !lock(&self.internal.buffers).contains_key(&id) {
            return Err(ResourceError::InvalidHandle);
        }
        lock(&self.internal.state).vertex_buffer = Some(id);
        self.record(GpuCommand::BindVertexBuffer(id));
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let mut buffers = lock(&self.internal.buffers);
        let entry = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let start = offset as usize;
        let end = start + data.len();
        if end > entry.bytes.len() {
            return Err(ResourceError::OutOfBounds);
        }
        if self.internal.config.capture_vertex_data {
            entry.bytes[start..end].copy_from_slice(data);
        }
        drop(buffers);
        self.record(GpuCommand::WriteBuffer {
            id,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn set_vertex_layout(
        &self,
        program: ProgramId,
        layout: &VertexLayout,
    ) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let programs = lock(&self.internal.programs);
        let entry = programs.get(&program).ok_or(ResourceError::InvalidHandle)?;
        let enabled: Vec<String> = layout
            .attributes()
            .iter()
            .filter(|a| entry.attributes.contains(&*a.name))
            .map(|a| a.name.to_string())
            .collect();
        drop(programs);
        lock(&self.internal.state).stride = layout.stride();
        self.record(GpuCommand::SetVertexLayout {
            program,
            enabled,
            stride: layout.stride(),
        });
        Ok(())
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        pixels: Option<&[u8]>,
    ) -> Result<TextureId, ResourceError> {
        self.ensure_alive()?;
        let max = self.internal.config.max_texture_size;
        if descriptor.size.width > max || descriptor.size.height > max {
            return Err(ResourceError::BackendError(format!(
                "texture {}x{} exceeds MAX_TEXTURE_SIZE {max}",
                descriptor.size.width, descriptor.size.height
            )));
        }
        if pixels.is_some_and(|p| p.len() != descriptor.byte_len()) {
            return Err(ResourceError::OutOfBounds);
        }
        let id = TextureId(
            self.internal
                .next_texture_id
                .fetch_add(1, Ordering::Relaxed),
        );
        lock(&self.internal.textures).insert(
            id,
            TextureEntry {
                label: descriptor.label.as_deref().map(str::to_string),
            },
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        lock(&self.internal.textures)
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        lock(&self.internal.state).units.retain(|_, t| *t != id);
        Ok(())
    }

    fn bind_texture(&self, unit: u32, id: TextureId) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        if unit >= self.internal.config.max_texture_units {
            return Err(ResourceError::OutOfBounds);
        }
        if !lock(&self.internal.textures).contains_key(&id) {
            return Err(ResourceError::InvalidHandle);
        }
        lock(&self.internal.state).units.insert(unit, id);
        self.record(GpuCommand::BindTexture { unit, texture: id });
        Ok(())
    }

    fn create_framebuffer(&self, color: TextureId) -> Result<FramebufferId, ResourceError> {
        self.ensure_alive()?;
        if !lock(&self.internal.textures).contains_key(&color) {
            return Err(ResourceError::InvalidHandle);
        }
        let id = FramebufferId(
            self.internal
                .next_framebuffer_id
                .fetch_add(1, Ordering::Relaxed),
        );
        lock(&self.internal.framebuffers).insert(id, color);
        Ok(id)
    }

    fn destroy_framebuffer(&self, id: FramebufferId) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        lock(&self.internal.framebuffers)
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        let mut state = lock(&self.internal.state);
        if state.framebuffer == Some(id) {
            state.framebuffer = None;
        }
        Ok(())
    }

    fn bind_framebuffer(&self, id: Option<FramebufferId>) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        if let Some(id) = id {
            if !lock(&self.internal.framebuffers).contains_key(&id) {
                return Err(ResourceError::InvalidHandle);
            }
        }
        lock(&self.internal.state).framebuffer = id;
        self.record(GpuCommand::BindFramebuffer(id));
        Ok(())
    }

    fn clear(&self, color: LinearRgba) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        self.record(GpuCommand::Clear(color));
        Ok(())
    }

    fn set_viewport(&self, rect: PixelRect) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        lock(&self.internal.state).viewport = rect;
        self.record(GpuCommand::Viewport(rect));
        Ok(())
    }

    fn set_scissor(&self, rect: Option<PixelRect>) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        lock(&self.internal.state).scissor = rect;
        self.record(GpuCommand::Scissor(rect));
        Ok(())
    }

    fn set_blend_state(&self, state: BlendState) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        lock(&self.internal.state).blend = Some(state);
        self.record(GpuCommand::Blend(state));
        Ok(())
    }

    fn draw(
        &self,
        topology: PrimitiveTopology,
        first: u32,
        count: u32,
    ) -> Result<(), ResourceError> {
        self.ensure_alive()?;
        let state = lock(&self.internal.state);
        let program = state.program.ok_or(ResourceError::InvalidHandle)?;
        let buffer = state.vertex_buffer.ok_or(ResourceError::InvalidHandle)?;

        let (program_label, uniforms) = {
            let programs = lock(&self.internal.programs);
            let entry = programs.get(&program).ok_or(ResourceError::InvalidHandle)?;
            let uniforms = entry
                .uniforms
                .iter()
                .filter_map(|u| {
                    entry
                        .values
                        .get(&u.location)
                        .map(|v| (u.name.clone(), v.clone()))
                })
                .collect();
            (entry.label.clone(), uniforms)
        };

        let start = first as usize * state.stride as usize;
        let end = start + count as usize * state.stride as usize;
        let vertex_data = {
            let buffers = lock(&self.internal.buffers);
            let entry = buffers.get(&buffer).ok_or(ResourceError::InvalidHandle)?;
            if end > entry.bytes.len() {
                return Err(ResourceError::OutOfBounds);
            }
            if self.internal.config.capture_vertex_data {
                entry.bytes[start..end].to_vec()
            } else {
                Vec::new()
            }
        };

        let call = DrawCall {
            program,
            program_label,
            topology,
            first,
            count,
            textures: state.units.iter().map(|(u, t)| (*u, *t)).collect(),
            blend: state.blend,
            framebuffer: state.framebuffer,
            viewport: state.viewport,
            scissor: state.scissor,
            uniforms,
            stride: state.stride,
            vertex_data,
        };
        drop(state);
        log::trace!(
            "RecordingDevice: draw '{}' {} vertices",
            call.program_label,
            call.count
        );
        self.record(GpuCommand::Draw(call));
        Ok(())
    }
}
