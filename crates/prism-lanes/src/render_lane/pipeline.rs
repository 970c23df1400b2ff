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

//! The batching pipeline: a program, a vertex buffer and a texture unit table.

use super::gpu_state::GpuStateCache;
use super::shader::{ShaderProgram, UniformOutcome};
use super::texture_units::{TextureUnitBinder, UnitBinding};
use super::vertex_buffer::VertexBuffer;
use bytemuck::Pod;
use prism_core::math::{Extent2D, Mat4};
use prism_core::renderer::{
    BlendMode, FlushReason, PipelineError, PrimitiveTopology, ResourceError, TextureId,
    UniformValue, VertexLayout,
};
use std::borrow::Cow;
use std::fmt;

/// Whether a pipeline draws game objects or whole framebuffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineRole {
    /// Accumulates geometry from batch calls.
    Batch,
    /// Draws one full-screen quad per pass. Cannot be made current.
    PostFx,
}

/// The lifecycle state of a pipeline's GPU resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStatus {
    /// Program and buffer are live.
    Ready,
    /// The context was lost. Waiting for [`Pipeline::recreate`].
    Invalidated,
    /// The program failed to rebuild. Batches sent here are dropped.
    Broken,
}

/// Everything needed to build a [`Pipeline`], retained for rebuilds.
#[derive(Debug, Clone)]
pub struct PipelineDescriptor {
    /// The unique name the pipeline is registered under.
    pub name: String,
    /// GLSL ES 1.00 vertex stage.
    pub vertex_source: Cow<'static, str>,
    /// GLSL ES 1.00 fragment stage.
    pub fragment_source: Cow<'static, str>,
    /// The layout of one vertex.
    pub layout: VertexLayout,
    /// How vertices are assembled.
    pub topology: PrimitiveTopology,
    /// The capacity of the vertex buffer, in vertices.
    pub vertex_capacity: usize,
    /// Texture units one batch may use, clamped to the device limit.
    pub max_textures: u32,
    /// Regenerates the fragment stage for a unit count. Used when the device
    /// offers fewer units than `max_textures`.
    pub fragment_for_units: Option<fn(u32) -> String>,
    /// Batch or post-processing.
    pub role: PipelineRole,
    /// The blend mode the pipeline starts with.
    pub blend_mode: BlendMode,
    /// The sampler uniform that is pointed at units `0..max_textures` on boot.
    pub sampler_uniform: Option<Cow<'static, str>>,
    /// Uniform values set on boot, before the boot hooks run.
    pub uniform_defaults: Vec<(Cow<'static, str>, UniformValue)>,
}

impl PipelineDescriptor {
    /// The texture units this pipeline gets on the device behind `state`.
    pub fn units_for(&self, state: &GpuStateCache) -> u32 {
        state
            .capabilities()
            .resolve_texture_units(Some(self.max_textures))
    }

    /// The fragment stage for `units` texture units.
    pub fn fragment_source_for(&self, units: u32) -> String {
        match self.fragment_for_units {
            Some(generate) if units != self.max_textures => generate(units),
            _ => self.fragment_source.to_string(),
        }
    }
}

/// What a hook sees of its pipeline.
pub struct HookContext<'a> {
    /// The pipeline name.
    pub pipeline: &'a str,
    /// The pipeline's program.
    pub shader: &'a mut ShaderProgram,
    /// The shared GL state.
    pub state: &'a mut GpuStateCache,
    /// The size of the surface the pipeline renders to.
    pub resolution: Extent2D,
}

impl HookContext<'_> {
    /// Sets a uniform on the pipeline's program.
    pub fn set_uniform(
        &mut self,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> Result<UniformOutcome, ResourceError> {
        self.shader.set_uniform(self.state, name, value)
    }
}

/// Custom behavior attached to a pipeline.
///
/// Hooks replace subclassing: a pipeline that needs a time uniform or extra
/// per-frame state carries a hook instead of overriding methods. Every method
/// has an empty default, so a hook implements only the moments it cares about.
pub trait PipelineHooks: fmt::Debug {
    /// After the program is linked, and again after every context restore.
    fn on_boot(&mut self, _ctx: &mut HookContext<'_>) -> Result<(), ResourceError> {
        Ok(())
    }

    /// When the pipeline becomes current.
    fn on_bind(&mut self, _ctx: &mut HookContext<'_>) -> Result<(), ResourceError> {
        Ok(())
    }

    /// Once per frame, before any camera is rendered.
    fn on_pre_render(&mut self, _ctx: &mut HookContext<'_>) -> Result<(), ResourceError> {
        Ok(())
    }

    /// Once per frame, after every camera was rendered.
    fn on_post_render(&mut self, _ctx: &mut HookContext<'_>) -> Result<(), ResourceError> {
        Ok(())
    }

    /// After the renderer was resized.
    fn on_resize(&mut self, _ctx: &mut HookContext<'_>) -> Result<(), ResourceError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum HookStage {
    Boot,
    Bind,
    PreRender,
    PostRender,
    Resize,
}

/// A shader program with its own vertex buffer and texture unit table.
///
/// Batch calls [`reserve`](Pipeline::reserve) room, then
/// [`push`](Pipeline::push) vertices. Whenever the buffer or the unit table
/// runs out, the pending batch is flushed first, so a flush always becomes
/// exactly one draw call.
#[derive(Debug)]
pub struct Pipeline {
    descriptor: PipelineDescriptor,
    shader: ShaderProgram,
    vertices: VertexBuffer,
    textures: TextureUnitBinder,
    blend_mode: BlendMode,
    projection: Mat4,
    resolution: Extent2D,
    status: PipelineStatus,
    hooks: Vec<Box<dyn PipelineHooks>>,
    warned_dropping: bool,
}

impl Pipeline {
    /// Compiles the program, allocates the buffer and runs the boot hooks.
    /// ## Errors
    /// * `ResourceError::Pipeline` - If the capacity cannot hold one primitive.
    /// * `ResourceError::Shader` - If the program fails to build.
    pub fn new(
        state: &mut GpuStateCache,
        descriptor: PipelineDescriptor,
        hooks: Vec<Box<dyn PipelineHooks>>,
    ) -> Result<Self, ResourceError> {
        let primitive = descriptor.topology.primitive_size();
        if descriptor.vertex_capacity < primitive {
            return Err(PipelineError::InvalidLayout(format!(
                "pipeline '{}' holds {} vertices, one primitive needs {primitive}",
                descriptor.name, descriptor.vertex_capacity
            ))
            .into());
        }

        let max_units = descriptor.units_for(state);
        let mut shader = ShaderProgram::compile(
            state.device().as_ref(),
            descriptor.name.clone(),
            &*descriptor.vertex_source,
            descriptor.fragment_source_for(max_units),
        )?;
        let mut vertices = VertexBuffer::new(
            descriptor.name.clone(),
            descriptor.layout.stride() as usize,
            descriptor.vertex_capacity,
        );
        if let Err(e) = vertices.create(state.device().as_ref()) {
            let _ = shader.destroy(state);
            return Err(e);
        }

        let mut pipeline = Self {
            blend_mode: descriptor.blend_mode,
            descriptor,
            shader,
            vertices,
            textures: TextureUnitBinder::new(max_units),
            projection: Mat4::IDENTITY,
            resolution: Extent2D::default(),
            status: PipelineStatus::Ready,
            hooks,
            warned_dropping: false,
        };
        pipeline.boot(state)?;
        log::info!(
            "Pipeline '{}' ready: {} vertices, {} texture units",
            pipeline.descriptor.name,
            pipeline.descriptor.vertex_capacity,
            max_units
        );
        Ok(pipeline)
    }

    fn boot(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        if let Some(sampler) = &self.descriptor.sampler_uniform {
            let units: Vec<i32> = (0..self.textures.max_units() as i32).collect();
            self.shader
                .set_uniform(state, sampler, UniformValue::IntArray(units))?;
        }
        for (name, value) in &self.descriptor.uniform_defaults {
            self.shader.set_uniform(state, name, value.clone())?;
        }
        self.run_hooks(state, HookStage::Boot)
    }

    fn run_hooks(
        &mut self,
        state: &mut GpuStateCache,
        stage: HookStage,
    ) -> Result<(), ResourceError> {
        if self.status != PipelineStatus::Ready || self.hooks.is_empty() {
            return Ok(());
        }
        let mut ctx = HookContext {
            pipeline: &self.descriptor.name,
            shader: &mut self.shader,
            state,
            resolution: self.resolution,
        };
        for hook in &mut self.hooks {
            match stage {
                HookStage::Boot => hook.on_boot(&mut ctx)?,
                HookStage::Bind => hook.on_bind(&mut ctx)?,
                HookStage::PreRender => hook.on_pre_render(&mut ctx)?,
                HookStage::PostRender => hook.on_post_render(&mut ctx)?,
                HookStage::Resize => hook.on_resize(&mut ctx)?,
            }
        }
        Ok(())
    }

    // --- Accessors ---

    /// The registered name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// The descriptor the pipeline was built from.
    pub fn descriptor(&self) -> &PipelineDescriptor {
        &self.descriptor
    }

    /// Batch or post-processing.
    pub fn role(&self) -> PipelineRole {
        self.descriptor.role
    }

    /// The lifecycle state.
    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    /// `true` if the program and buffer are live.
    pub fn is_ready(&self) -> bool {
        self.status == PipelineStatus::Ready
    }

    /// The program.
    pub fn shader(&self) -> &ShaderProgram {
        &self.shader
    }

    /// The vertex layout.
    pub fn layout(&self) -> &VertexLayout {
        &self.descriptor.layout
    }

    /// Vertices waiting for a flush.
    pub fn vertex_count(&self) -> usize {
        self.vertices.vertex_count()
    }

    /// The capacity of the vertex buffer.
    pub fn vertex_capacity(&self) -> usize {
        self.vertices.capacity()
    }

    /// Texture units one batch may use.
    pub fn max_textures(&self) -> u32 {
        self.textures.max_units()
    }

    /// The unit `texture` holds in the pending batch.
    pub fn texture_unit(&self, texture: TextureId) -> Option<u32> {
        self.textures.unit_of(texture)
    }

    /// The active blend mode.
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// The projection uploaded on the next flush.
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// The size of the surface the pipeline renders to.
    pub fn resolution(&self) -> Extent2D {
        self.resolution
    }

    // --- Batching ---

    /// Makes room for `count` vertices sampling `texture`.
    ///
    /// Flushes first if the buffer lacks room or every texture unit is taken
    /// by another texture. Returns the unit the texture sits on, `0` when no
    /// texture is given, or `None` if the pipeline is not ready and the
    /// geometry must be dropped.
    /// ## Errors
    /// * `ResourceError::Pipeline` - If `count` exceeds the whole buffer.
    pub fn reserve(
        &mut self,
        state: &mut GpuStateCache,
        count: usize,
        texture: Option<TextureId>,
    ) -> Result<Option<u32>, ResourceError> {
        if !self.is_ready() {
            if !self.warned_dropping {
                log::warn!(
                    "Pipeline '{}' is {:?}, dropping batched geometry",
                    self.descriptor.name,
                    self.status
                );
                self.warned_dropping = true;
            }
            return Ok(None);
        }
        if count > self.vertices.capacity() {
            return Err(PipelineError::BatchTooLarge {
                pipeline: self.descriptor.name.clone(),
                requested: count,
                capacity: self.vertices.capacity(),
            }
            .into());
        }
        if !self.vertices.has_room(count) {
            self.flush(state, FlushReason::VertexCapacity)?;
        }
        let Some(texture) = texture else {
            return Ok(Some(0));
        };
        match self.textures.bind(texture) {
            UnitBinding::Resident(unit) | UnitBinding::Assigned(unit) => Ok(Some(unit)),
            UnitBinding::Full => {
                self.flush(state, FlushReason::TextureUnits)?;
                let retry = self.textures.bind(texture);
                debug_assert!(
                    matches!(retry, UnitBinding::Assigned(0)),
                    "an empty unit table refused a texture"
                );
                Ok(retry.unit())
            }
        }
    }

    /// Appends vertices previously reserved with [`Pipeline::reserve`].
    pub fn push<T: Pod>(&mut self, vertices: &[T]) -> Result<(), ResourceError> {
        self.vertices.append_slice(vertices)?;
        Ok(())
    }

    /// Submits the pending vertices as one draw call.
    ///
    /// Binds the program, uploads the projection, writes the used part of the
    /// buffer, binds every assigned texture unit, applies the blend mode and
    /// draws. Returns `false` if there was nothing to draw.
    pub fn flush(
        &mut self,
        state: &mut GpuStateCache,
        reason: FlushReason,
    ) -> Result<bool, ResourceError> {
        if self.vertices.is_empty() {
            return Ok(false);
        }
        if !self.is_ready() {
            self.vertices.reset();
            self.textures.reset_frame();
            return Ok(false);
        }
        let program = self.shader.program().ok_or(ResourceError::InvalidHandle)?;
        let buffer = self.vertices.handle().ok_or(ResourceError::InvalidHandle)?;
        let count = self.vertices.vertex_count();

        self.shader.bind(state)?;
        self.shader.set_uniform(
            state,
            "uProjectionMatrix",
            UniformValue::Mat4(self.projection.to_cols_array()),
        )?;
        self.shader.set_uniform(
            state,
            "uResolution",
            [self.resolution.width as f32, self.resolution.height as f32],
        )?;
        self.vertices.upload(state)?;
        state.apply_vertex_layout(program, buffer, &self.descriptor.layout)?;
        for (unit, texture) in self.textures.assignments() {
            state.bind_texture(unit, texture)?;
        }
        state.set_blend(self.blend_mode.state())?;
        state.draw(self.descriptor.topology, 0, count as u32)?;
        state.record_flush(reason);
        log::trace!(
            "Pipeline '{}' flushed {count} vertices ({reason})",
            self.descriptor.name
        );

        self.vertices.reset();
        self.textures.reset_frame();
        Ok(true)
    }

    /// Changes the blend mode, flushing pending vertices drawn under the old one.
    pub fn set_blend_mode(
        &mut self,
        state: &mut GpuStateCache,
        mode: BlendMode,
    ) -> Result<bool, ResourceError> {
        if mode == self.blend_mode {
            return Ok(false);
        }
        self.flush(state, FlushReason::BlendChange)?;
        self.blend_mode = mode;
        Ok(true)
    }

    /// Sets a uniform, flushing first if pending vertices would see the new value.
    pub fn set_uniform(
        &mut self,
        state: &mut GpuStateCache,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> Result<UniformOutcome, ResourceError> {
        if !self.is_ready() {
            return Ok(UniformOutcome::Unknown);
        }
        let value = value.into();
        if !self.vertices.is_empty() && self.shader.would_change(name, &value) {
            self.flush(state, FlushReason::Explicit)?;
        }
        self.shader.set_uniform(state, name, value)
    }

    /// Points the projection at a `width` x `height` surface, y down.
    /// Only call this with no pending vertices.
    pub fn set_projection(&mut self, width: u32, height: u32) {
        debug_assert!(
            self.vertices.is_empty(),
            "projection changed under pending vertices"
        );
        self.projection = Mat4::pixel_projection(width as f32, height as f32);
        self.resolution = Extent2D::new(width, height);
    }

    /// Flushes, sets the projection and runs the resize hooks.
    pub fn resize(
        &mut self,
        state: &mut GpuStateCache,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceError> {
        self.flush(state, FlushReason::Explicit)?;
        self.set_projection(width, height);
        self.run_hooks(state, HookStage::Resize)
    }

    // --- Lifecycle ---

    /// Makes the program active and runs the bind hooks.
    pub fn bind(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        if !self.is_ready() {
            return Ok(());
        }
        self.shader.bind(state)?;
        self.run_hooks(state, HookStage::Bind)
    }

    /// Runs the per-frame pre-render hooks.
    pub fn pre_render(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        self.run_hooks(state, HookStage::PreRender)
    }

    /// Runs the per-frame post-render hooks.
    pub fn post_render(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        self.run_hooks(state, HookStage::PostRender)
    }

    /// Forgets every GPU handle after a context loss. Pending vertices are lost.
    pub fn invalidate(&mut self) {
        self.shader.invalidate();
        self.vertices.invalidate();
        self.textures.reset_frame();
        self.status = PipelineStatus::Invalidated;
        self.warned_dropping = false;
    }

    /// Rebuilds the program and buffer from the retained descriptor.
    ///
    /// The texture units are resolved again against the current device, so a
    /// device with fewer units gets a smaller unit table and sampler array.
    /// A program that fails to build marks this pipeline
    /// [`Broken`](PipelineStatus::Broken) and returns `Ok`, so the others can
    /// still come back. Device failures are returned as errors.
    pub fn recreate(
        &mut self,
        state: &mut GpuStateCache,
    ) -> Result<PipelineStatus, ResourceError> {
        self.invalidate();
        let units = self.descriptor.units_for(state);
        if units != self.textures.max_units() {
            log::info!(
                "Pipeline '{}' now uses {units} texture units instead of {}",
                self.descriptor.name,
                self.textures.max_units()
            );
            self.textures = TextureUnitBinder::new(units);
            self.shader
                .set_fragment_source(self.descriptor.fragment_source_for(units));
        }
        match self.shader.recreate(state.device().as_ref()) {
            Ok(()) => {}
            Err(ResourceError::Shader(e)) => {
                log::error!("Pipeline '{}' could not be rebuilt: {e}", self.descriptor.name);
                self.status = PipelineStatus::Broken;
                return Ok(self.status);
            }
            Err(e) => return Err(e),
        }
        self.vertices.recreate(state.device().as_ref())?;
        self.status = PipelineStatus::Ready;
        self.boot(state)?;
        Ok(self.status)
    }

    /// Releases the program and buffer.
    pub fn destroy(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        self.vertices.reset();
        self.textures.reset_frame();
        self.status = PipelineStatus::Invalidated;
        self.shader.destroy(state)?;
        self.vertices.destroy(state)
    }
}
