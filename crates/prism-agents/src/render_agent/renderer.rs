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

//! Defines the Renderer, the central orchestrator of a frame.

use super::camera::Camera;
use super::compositor::{Compositor, PassResources};
use super::render_target::{RenderTarget, RenderTargets};
use super::scene::SceneSource;
use super::textures::{TextureRegistry, TextureSource};
use prism_core::math::Extent2D;
use prism_core::renderer::{
    BlendMode, FilterMode, FlushReason, FrameStats, GraphicsDevice, PipelineError, RenderError,
    RendererConfig, ResourceError, TextureId, UniformValue,
};
use prism_lanes::render_lane::{
    bitmap_text_pipeline_descriptor, copy_fx_descriptor, grayscale_fx_descriptor,
    multi_pipeline_descriptor, single_pipeline_descriptor, GpuStateCache, Pipeline,
    PipelineDescriptor, PipelineHandle, PipelineHooks, PipelineManager, UniformOutcome,
};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramePhase {
    Idle,
    Rendering,
}

/// The top-level renderer.
///
/// Owns the GPU state cache, every pipeline, texture and render target, and
/// drives the frame:
///
/// ```text
/// pre_render() -> render(scene, camera) per camera -> post_render()
/// ```
///
/// When the graphics context is lost, every GPU resource is invalidated and
/// all pending batches are dropped. [`restore_context`](Renderer::restore_context)
/// rebuilds everything from the retained descriptors under the same names.
#[derive(Debug)]
pub struct Renderer {
    config: RendererConfig,
    state: GpuStateCache,
    pipelines: PipelineManager,
    textures: TextureRegistry,
    targets: RenderTargets,
    compositor: Compositor,
    max_textures: u32,
    // Units the built-in pipelines were described with.
    described_textures: u32,
    phase: FramePhase,
    frame_number: u64,
    context_lost: bool,
    last_stats: FrameStats,
}

fn init_failed(err: impl std::fmt::Display) -> RenderError {
    log::error!("Renderer initialization failed: {err}");
    RenderError::InitializationFailed(err.to_string())
}

impl Renderer {
    /// Creates a renderer and registers the built-in pipelines.
    ///
    /// The built-ins are the multi-texture sprite pipeline (the default), the
    /// single-texture sprite pipeline, the bitmap text pipeline and the
    /// `CopyFX` and `GrayscaleFX` post-processing pipelines.
    /// ## Errors
    /// * `RenderError::InvalidConfig` - If the configuration is out of range.
    /// * `RenderError::InitializationFailed` - If a built-in pipeline or the
    ///   post-FX targets cannot be created.
    pub fn new(device: Arc<dyn GraphicsDevice>, config: RendererConfig) -> Result<Self, RenderError> {
        config.validate()?;
        if device.is_context_lost() {
            return Err(init_failed("the graphics context is lost"));
        }
        let max_textures = device
            .capabilities()
            .resolve_texture_units(config.max_textures);
        let mut state = GpuStateCache::new(device);
        let mut pipelines = PipelineManager::new(config.replace_duplicate_pipelines);

        let builtins = [
            multi_pipeline_descriptor(config.batch_size, max_textures),
            single_pipeline_descriptor(config.batch_size),
            bitmap_text_pipeline_descriptor(config.batch_size, max_textures),
            copy_fx_descriptor(),
            grayscale_fx_descriptor(),
        ];
        for descriptor in builtins {
            let descriptor = descriptor.map_err(init_failed)?;
            pipelines
                .add(&mut state, descriptor, Vec::new())
                .map_err(init_failed)?;
        }
        let resolution = config.resolution;
        pipelines
            .resize(&mut state, resolution.width, resolution.height)
            .map_err(init_failed)?;
        let compositor = Compositor::new(
            state.device().as_ref(),
            resolution,
            config.post_fx_resolution_scale,
        )
        .map_err(init_failed)?;

        if !pipelines.contains(&config.default_pipeline) {
            log::warn!(
                "Default pipeline '{}' is not registered yet",
                config.default_pipeline
            );
        }
        log::info!(
            "Renderer ready: {}x{}, batches of {} quads, {} texture units",
            resolution.width,
            resolution.height,
            config.batch_size,
            max_textures
        );

        Ok(Self {
            config,
            state,
            pipelines,
            textures: TextureRegistry::new(),
            targets: RenderTargets::default(),
            compositor,
            max_textures,
            described_textures: max_textures,
            phase: FramePhase::Idle,
            frame_number: 0,
            context_lost: false,
            last_stats: FrameStats::default(),
        })
    }

    // --- Accessors ---

    /// The active configuration.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// The size of the drawing buffer.
    pub fn resolution(&self) -> Extent2D {
        self.config.resolution
    }

    /// The graphics device.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        self.state.device()
    }

    /// The texture units the multi-texture pipelines use.
    pub fn max_textures(&self) -> u32 {
        self.max_textures
    }

    /// Every registered pipeline.
    pub fn pipelines(&self) -> &PipelineManager {
        &self.pipelines
    }

    /// The post-FX compositor.
    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// The number of the last frame started.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Returns `true` while the graphics context is lost.
    pub fn is_context_lost(&self) -> bool {
        self.context_lost || self.state.device().is_context_lost()
    }

    fn ensure_live(&self) -> Result<(), RenderError> {
        if self.context_lost {
            Err(RenderError::DeviceLost)
        } else {
            Ok(())
        }
    }

    // --- Pipelines ---

    /// Registers a pipeline.
    /// ## Errors
    /// * `PipelineError::Duplicate` - If the name is taken and duplicates are not replaced.
    /// * `ShaderError` - If the program fails to build.
    pub fn add_pipeline(
        &mut self,
        descriptor: PipelineDescriptor,
    ) -> Result<PipelineHandle, RenderError> {
        self.add_pipeline_with_hooks(descriptor, Vec::new())
    }

    /// Registers a pipeline with lifecycle hooks.
    pub fn add_pipeline_with_hooks(
        &mut self,
        descriptor: PipelineDescriptor,
        hooks: Vec<Box<dyn PipelineHooks>>,
    ) -> Result<PipelineHandle, RenderError> {
        self.ensure_live()?;
        let handle = self.pipelines.add(&mut self.state, descriptor, hooks)?;
        Ok(handle)
    }

    /// The pipeline registered under `name`.
    pub fn get_pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.get(name)
    }

    /// The pipeline registered under `name`.
    pub fn get_pipeline_mut(&mut self, name: &str) -> Option<&mut Pipeline> {
        self.pipelines.get_mut(name)
    }

    /// Flushes and destroys a pipeline. Returns `false` for an unknown name.
    pub fn remove_pipeline(&mut self, name: &str) -> Result<bool, RenderError> {
        Ok(self.pipelines.remove(&mut self.state, name)?)
    }

    /// Sets a uniform of a pipeline's program.
    pub fn set_pipeline_uniform(
        &mut self,
        pipeline: &str,
        uniform: &str,
        value: impl Into<UniformValue>,
    ) -> Result<UniformOutcome, RenderError> {
        let pipeline = self
            .pipelines
            .get_mut(pipeline)
            .ok_or_else(|| PipelineError::NotFound(pipeline.to_string()))?;
        Ok(pipeline.set_uniform(&mut self.state, uniform, value)?)
    }

    // --- Textures and render targets ---

    /// Uploads an RGBA8 texture under `key`. `None` pixels leave it uninitialized.
    /// An existing texture under `key` is replaced after pending batches are flushed.
    pub fn create_texture(
        &mut self,
        key: &str,
        width: u32,
        height: u32,
        filter: FilterMode,
        pixels: Option<&[u8]>,
    ) -> Result<TextureId, RenderError> {
        self.ensure_live()?;
        self.flush()?;
        let size = Extent2D::new(width, height);
        Ok(self
            .textures
            .insert(&mut self.state, key, size, filter, pixels)?)
    }

    /// Looks up a texture key, then a render target name.
    pub fn texture(&self, key: &str) -> Option<TextureSource> {
        self.textures
            .get(key)
            .or_else(|| self.targets.get(key).and_then(RenderTarget::source))
    }

    /// Destroys a texture. Returns `false` for an unknown key.
    pub fn remove_texture(&mut self, key: &str) -> Result<bool, RenderError> {
        self.flush()?;
        Ok(self.textures.remove(&mut self.state, key)?)
    }

    /// Creates a render target cameras can draw into by name.
    pub fn create_render_target(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
    ) -> Result<TextureId, RenderError> {
        self.add_render_target(RenderTarget::new(name, width, height))
    }

    /// Allocates and registers a configured render target, replacing any
    /// target with the same name. Returns its color texture.
    pub fn add_render_target(&mut self, mut target: RenderTarget) -> Result<TextureId, RenderError> {
        self.ensure_live()?;
        target.create(self.state.device().as_ref())?;
        let texture = target
            .texture()
            .ok_or_else(|| RenderError::RenderTargetLost(target.name().to_string()))?;
        if let Some(mut old) = self.targets.insert(target.name().to_string(), target) {
            log::debug!("Render target '{}' replaced", old.name());
            self.pipelines
                .flush_all(&mut self.state, FlushReason::Explicit)?;
            old.destroy(&mut self.state)?;
        }
        Ok(texture)
    }

    /// The render target registered under `name`.
    pub fn render_target(&self, name: &str) -> Option<&RenderTarget> {
        self.targets.get(name)
    }

    /// Destroys a render target. Returns `false` for an unknown name.
    pub fn remove_render_target(&mut self, name: &str) -> Result<bool, RenderError> {
        let Some(mut target) = self.targets.remove(name) else {
            return Ok(false);
        };
        self.pipelines
            .flush_all(&mut self.state, FlushReason::Explicit)?;
        target.destroy(&mut self.state)?;
        Ok(true)
    }

    // --- Frame lifecycle ---

    /// Starts a frame: binds and clears the screen and runs the pipelines'
    /// pre-render hooks.
    /// ## Errors
    /// * `RenderError::FrameState` - If a frame is already in progress.
    /// * `RenderError::DeviceLost` - If the context is lost. Every resource is
    ///   invalidated before this returns.
    pub fn pre_render(&mut self) -> Result<(), RenderError> {
        if self.phase == FramePhase::Rendering {
            return Err(RenderError::FrameState(
                "pre_render called twice without post_render".to_string(),
            ));
        }
        if self.is_context_lost() {
            self.handle_context_loss();
            return Err(RenderError::DeviceLost);
        }

        self.frame_number += 1;
        self.state.begin_frame(self.frame_number);
        match self.begin_frame() {
            Ok(()) => {
                self.phase = FramePhase::Rendering;
                Ok(())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    fn begin_frame(&mut self) -> Result<(), ResourceError> {
        let screen = self.config.resolution;
        self.pipelines
            .flush_all(&mut self.state, FlushReason::PassBoundary)?;
        self.state.bind_framebuffer(None, screen)?;
        self.state.set_viewport(0, 0, screen.width, screen.height)?;
        self.state.set_scissor(None)?;
        if self.config.clear_before_render {
            self.state.clear(self.config.background_color)?;
        }
        self.pipelines.set_projection(screen.width, screen.height);
        self.pipelines.pre_render(&mut self.state)
    }

    /// Draws `scene` through `camera`. Call between
    /// [`pre_render`](Self::pre_render) and [`post_render`](Self::post_render).
    /// ## Errors
    /// * `RenderError::FrameState` - Outside of a frame.
    /// * `RenderError::RenderTargetLost` - If the camera's target is missing.
    ///   The renderer treats it as a context loss.
    pub fn render<S: SceneSource + ?Sized>(
        &mut self,
        scene: &S,
        camera: &Camera,
    ) -> Result<(), RenderError> {
        if self.phase != FramePhase::Rendering {
            return Err(RenderError::FrameState(
                "render called outside pre_render / post_render".to_string(),
            ));
        }
        let resources = PassResources {
            state: &mut self.state,
            pipelines: &mut self.pipelines,
            textures: &self.textures,
            targets: &self.targets,
            config: &self.config,
        };
        let result = self.compositor.render_camera(resources, scene, camera);
        result.map_err(|e| self.fail(e))
    }

    /// Ends the frame: flushes every pipeline and runs the post-render hooks.
    /// Returns the frame's statistics.
    pub fn post_render(&mut self) -> Result<FrameStats, RenderError> {
        if self.phase != FramePhase::Rendering {
            return Err(RenderError::FrameState(
                "post_render called without pre_render".to_string(),
            ));
        }
        self.phase = FramePhase::Idle;
        let finished = self
            .pipelines
            .flush_all(&mut self.state, FlushReason::PassBoundary)
            .and_then(|()| self.pipelines.post_render(&mut self.state));
        if let Err(e) = finished {
            return Err(self.fail(e.into()));
        }

        let stats = self.state.take_stats();
        log::trace!(
            "Frame {}: {} draw calls, {} vertices, {} flushes",
            stats.frame_number,
            stats.draw_calls,
            stats.vertices,
            stats.total_flushes()
        );
        self.last_stats = stats.clone();
        Ok(stats)
    }

    /// Renders one whole frame: every camera over the same scene.
    pub fn render_frame<S: SceneSource + ?Sized>(
        &mut self,
        scene: &S,
        cameras: &[Camera],
    ) -> Result<FrameStats, RenderError> {
        self.pre_render()?;
        for camera in cameras {
            self.render(scene, camera)?;
        }
        self.post_render()
    }

    fn fail(&mut self, err: RenderError) -> RenderError {
        if err.is_context_loss() {
            self.handle_context_loss();
        }
        err
    }

    // --- Global state ---

    /// Changes the blend mode of the current pipeline, flushing if needed.
    pub fn set_blend_mode(&mut self, mode: BlendMode) -> Result<bool, RenderError> {
        match self.pipelines.current_mut() {
            Some(pipeline) => Ok(pipeline.set_blend_mode(&mut self.state, mode)?),
            None => Ok(false),
        }
    }

    /// Flushes every pipeline now.
    pub fn flush(&mut self) -> Result<(), RenderError> {
        if self.context_lost {
            return Ok(());
        }
        Ok(self
            .pipelines
            .flush_all(&mut self.state, FlushReason::Explicit)?)
    }

    /// The counters of the frame in progress.
    pub fn stats(&self) -> &FrameStats {
        self.state.stats()
    }

    /// The counters of the last finished frame.
    pub fn last_frame_stats(&self) -> &FrameStats {
        &self.last_stats
    }

    /// Changes the drawing buffer size.
    ///
    /// Pipelines get a new projection, the post-FX targets and every
    /// auto-resizing render target are reallocated.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "cannot resize to {width}x{height}"
            )));
        }
        self.config.resolution = Extent2D::new(width, height);
        if self.context_lost {
            // Applied by restore_context.
            return Ok(());
        }
        self.pipelines.resize(&mut self.state, width, height)?;
        self.compositor.resize(&mut self.state, width, height)?;
        for target in self.targets.values_mut().filter(|t| t.auto_resize()) {
            target.resize(&mut self.state, width, height)?;
        }
        log::debug!("Renderer resized to {width}x{height}");
        Ok(())
    }

    // --- Context loss ---

    /// Invalidates every GPU resource and drops all pending batches.
    ///
    /// Called automatically when a frame detects the loss. Platform code may
    /// call it directly from its context-lost event.
    pub fn handle_context_loss(&mut self) {
        self.phase = FramePhase::Idle;
        if self.context_lost {
            return;
        }
        log::error!("Graphics context lost, invalidating every GPU resource");
        self.context_lost = true;
        self.pipelines.invalidate_all();
        self.textures.invalidate();
        for target in self.targets.values_mut() {
            target.invalidate();
        }
        self.compositor.invalidate();
        self.state.invalidate();
    }

    /// Rebuilds every GPU resource on `device`, in dependency order: programs
    /// and vertex buffers, then textures, then render targets. Texture units
    /// are resolved again against the new device.
    ///
    /// Returns the names of the pipelines whose program failed to build. Those
    /// stay registered but render nothing.
    pub fn restore_context(
        &mut self,
        device: Arc<dyn GraphicsDevice>,
    ) -> Result<Vec<String>, RenderError> {
        if device.is_context_lost() {
            return Err(RenderError::DeviceLost);
        }
        self.handle_context_loss();
        self.state.replace_device(device);
        let device = Arc::clone(self.state.device());
        self.max_textures = self
            .state
            .capabilities()
            .resolve_texture_units(Some(self.described_textures));

        let broken = self.pipelines.recreate_all(&mut self.state)?;
        self.textures.recreate(device.as_ref())?;
        for target in self.targets.values_mut() {
            if target.auto_resize() {
                let screen = self.config.resolution;
                target.resize(&mut self.state, screen.width, screen.height)?;
            } else {
                target.recreate(device.as_ref())?;
            }
        }
        self.compositor.recreate(device.as_ref())?;
        let screen = self.config.resolution;
        self.compositor
            .resize(&mut self.state, screen.width, screen.height)?;
        self.pipelines
            .resize(&mut self.state, screen.width, screen.height)?;

        self.context_lost = false;
        if broken.is_empty() {
            log::info!("Graphics context restored");
        } else {
            log::warn!(
                "Graphics context restored, {} pipeline(s) left broken: {}",
                broken.len(),
                broken.join(", ")
            );
        }
        Ok(broken)
    }

    /// Releases every GPU resource. The renderer is empty afterwards.
    pub fn destroy(&mut self) -> Result<(), RenderError> {
        self.phase = FramePhase::Idle;
        if self.is_context_lost() {
            self.handle_context_loss();
            return Ok(());
        }
        self.pipelines.destroy_all(&mut self.state)?;
        self.textures.destroy(&mut self.state)?;
        for (_, mut target) in self.targets.drain() {
            target.destroy(&mut self.state)?;
        }
        self.compositor.destroy(&mut self.state)?;
        log::info!("Renderer destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::{
        BITMAP_TEXT_PIPELINE, COPY_FX_PIPELINE, GRAYSCALE_FX_PIPELINE, MULTI_PIPELINE,
        SINGLE_PIPELINE,
    };
    use prism_infra::RecordingDevice;

    fn renderer(device: &RecordingDevice) -> Renderer {
        let config = RendererConfig {
            batch_size: 8,
            ..Default::default()
        };
        Renderer::new(Arc::new(device.clone()), config).expect("renderer")
    }

    #[test]
    fn new_registers_the_builtins_in_order() {
        let device = RecordingDevice::with_texture_units(4);
        let renderer = renderer(&device);
        let names: Vec<&str> = renderer.pipelines().names().collect();
        assert_eq!(
            names,
            [
                MULTI_PIPELINE,
                SINGLE_PIPELINE,
                BITMAP_TEXT_PIPELINE,
                COPY_FX_PIPELINE,
                GRAYSCALE_FX_PIPELINE
            ]
        );
        assert_eq!(renderer.max_textures(), 4);
        let multi = renderer.get_pipeline(MULTI_PIPELINE).expect("multi");
        assert_eq!(multi.vertex_capacity(), 8 * 6);
        assert_eq!(multi.resolution(), Extent2D::new(800, 600));
        assert!(renderer.compositor().swap_targets().iter().all(RenderTarget::is_valid));
    }

    #[test]
    fn configured_texture_units_are_clamped_to_the_device() {
        let device = RecordingDevice::with_texture_units(4);
        let config = RendererConfig {
            max_textures: Some(32),
            ..Default::default()
        };
        let renderer = Renderer::new(Arc::new(device), config).expect("renderer");
        assert_eq!(renderer.max_textures(), 4);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let device = RecordingDevice::default();
        let config = RendererConfig {
            batch_size: 0,
            ..Default::default()
        };
        let err = Renderer::new(Arc::new(device), config).unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfig(_)));
    }

    #[test]
    fn lost_device_fails_initialization() {
        let device = RecordingDevice::default();
        device.lose_context();
        let err = Renderer::new(Arc::new(device), RendererConfig::default()).unwrap_err();
        assert!(matches!(err, RenderError::InitializationFailed(_)));
    }

    #[test]
    fn frame_calls_out_of_order_are_rejected() {
        let device = RecordingDevice::default();
        let mut renderer = renderer(&device);
        let scene: [crate::render_agent::Sprite; 0] = [];
        let camera = Camera::default();

        assert!(matches!(
            renderer.render(&scene[..], &camera),
            Err(RenderError::FrameState(_))
        ));
        assert!(matches!(renderer.post_render(), Err(RenderError::FrameState(_))));

        renderer.pre_render().expect("pre");
        assert!(matches!(renderer.pre_render(), Err(RenderError::FrameState(_))));
        renderer.render(&scene[..], &camera).expect("render");
        let stats = renderer.post_render().expect("post");
        assert_eq!(stats.frame_number, 1);
        assert_eq!(stats.cameras_rendered, 1);
        assert!(matches!(renderer.post_render(), Err(RenderError::FrameState(_))));
    }

    #[test]
    fn resize_reaches_pipelines_and_auto_targets() {
        let device = RecordingDevice::default();
        let mut renderer = renderer(&device);
        renderer
            .add_render_target(RenderTarget::new("follow", 800, 600).with_auto_resize(true))
            .expect("target");
        renderer.create_render_target("fixed", 64, 64).expect("target");
        renderer.resize(1024, 768).expect("resize");

        let multi = renderer.get_pipeline(MULTI_PIPELINE).expect("multi");
        assert_eq!(multi.resolution(), Extent2D::new(1024, 768));
        let follow = renderer.render_target("follow").expect("follow");
        assert_eq!(follow.size(), Extent2D::new(1024, 768));
        let fixed = renderer.render_target("fixed").expect("fixed");
        assert_eq!(fixed.size(), Extent2D::new(64, 64));
        assert!(matches!(
            renderer.resize(0, 10),
            Err(RenderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn destroy_releases_everything() {
        let device = RecordingDevice::default();
        let mut renderer = renderer(&device);
        renderer
            .create_texture("t", 4, 4, FilterMode::Linear, None)
            .expect("texture");
        renderer.create_render_target("rt", 16, 16).expect("target");
        renderer.destroy().expect("destroy");
        assert_eq!(device.live_resources(), (0, 0, 0, 0));
    }
}
