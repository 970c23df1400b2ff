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

//! The camera render pass.
//!
//! One call to [`Compositor::render_camera`] draws one camera: it picks the
//! surface, clips to the viewport, batches every visible object of the render
//! list in order and flushes at the end, so nothing carries over to the next
//! camera. Cameras with post-FX draw into an offscreen swap target first and
//! are then copied through each effect, ping-ponging between two targets.

use super::camera::Camera;
use super::render_target::{RenderTarget, RenderTargets};
use super::scene::{BatchContext, SceneSource};
use super::textures::TextureRegistry;
use ahash::AHashSet;
use prism_core::math::{Extent2D, Rect};
use prism_core::renderer::{
    FlushReason, GraphicsDevice, PipelineError, RenderError, RendererConfig, ResourceError,
};
use prism_lanes::render_lane::{
    draw_post_pass, GpuStateCache, PipelineHandle, PipelineManager, PipelineRole,
};

const SWAP_NAMES: [&str; 2] = ["__post_fx_swap_a", "__post_fx_swap_b"];

/// The renderer state a camera pass borrows.
#[derive(Debug)]
pub struct PassResources<'a> {
    /// The GPU state cache.
    pub state: &'a mut GpuStateCache,
    /// Every registered pipeline.
    pub pipelines: &'a mut PipelineManager,
    /// Game textures.
    pub textures: &'a TextureRegistry,
    /// Named render targets.
    pub targets: &'a RenderTargets,
    /// Renderer configuration. `resolution` is the screen size.
    pub config: &'a RendererConfig,
}

#[derive(Debug, Clone, Copy)]
enum Surface<'t> {
    Screen,
    Target(&'t RenderTarget),
}

impl Surface<'_> {
    fn logical_size(self, screen: Extent2D) -> Extent2D {
        match self {
            Surface::Screen => screen,
            Surface::Target(target) => target.logical_size(),
        }
    }

    fn scale(self) -> f32 {
        match self {
            Surface::Screen => 1.0,
            Surface::Target(target) => target.scale(),
        }
    }

    /// Binds the surface and points every pipeline's projection at it.
    fn bind(
        self,
        state: &mut GpuStateCache,
        pipelines: &mut PipelineManager,
        screen: Extent2D,
        clear: bool,
    ) -> Result<(), RenderError> {
        match self {
            Surface::Screen => {
                state.bind_framebuffer(None, screen)?;
                state.set_viewport(0, 0, screen.width, screen.height)?;
            }
            Surface::Target(target) => target.bind(state, clear)?,
        }
        let logical = self.logical_size(screen);
        pipelines.set_projection(logical.width, logical.height);
        Ok(())
    }

    /// The camera's clip rectangle on this surface, in its physical pixels.
    fn scissor(self, camera: &Camera, screen: Extent2D) -> Option<(i32, i32, u32, u32)> {
        let logical = self.logical_size(screen);
        let bounds = Rect::new(0.0, 0.0, logical.width as f32, logical.height as f32);
        let clip = camera.clip_rect(bounds)?;
        let scale = self.scale();
        let x = (clip.x * scale).round();
        let y = (clip.y * scale).round();
        let w = (clip.right() * scale).round() - x;
        let h = (clip.bottom() * scale).round() - y;
        (w >= 1.0 && h >= 1.0).then(|| (x as i32, y as i32, w as u32, h as u32))
    }
}

/// Runs camera passes and owns the two post-FX swap targets.
#[derive(Debug)]
pub struct Compositor {
    swap: [RenderTarget; 2],
    warned: AHashSet<String>,
}

impl Compositor {
    /// Allocates the swap targets at `resolution` scaled by `scale`.
    pub fn new(
        device: &dyn GraphicsDevice,
        resolution: Extent2D,
        scale: f32,
    ) -> Result<Self, ResourceError> {
        let mut swap = SWAP_NAMES.map(|name| {
            RenderTarget::new(name, resolution.width, resolution.height).with_scale(scale)
        });
        for target in &mut swap {
            target.create(device)?;
        }
        Ok(Self {
            swap,
            warned: AHashSet::new(),
        })
    }

    /// The two ping-pong targets.
    pub fn swap_targets(&self) -> &[RenderTarget; 2] {
        &self.swap
    }

    /// Draws `scene` through `camera`.
    ///
    /// Invisible cameras and cameras with an empty viewport are skipped and
    /// counted. Objects are culled by [`will_render`] and by their bounds
    /// against the camera's world view. Every object is batched with its own
    /// pipeline (the default one when unset or unknown) in render list order.
    ///
    /// [`will_render`]: super::Renderable::will_render
    /// ## Errors
    /// * `RenderError::RenderTargetLost` - If the camera's target is missing or invalid.
    /// * `RenderError::DeviceLost` - If the context was lost during the pass.
    pub fn render_camera<S: SceneSource + ?Sized>(
        &mut self,
        resources: PassResources<'_>,
        scene: &S,
        camera: &Camera,
    ) -> Result<(), RenderError> {
        let PassResources {
            state,
            pipelines,
            textures,
            targets,
            config,
        } = resources;
        let screen = config.resolution;

        if !camera.visible {
            state.stats_mut().cameras_skipped += 1;
            return Ok(());
        }
        if camera.has_empty_viewport() {
            log::warn!("Camera '{}' has an empty viewport, skipping it", camera.name);
            state.stats_mut().cameras_skipped += 1;
            return Ok(());
        }

        let destination = match &camera.render_target {
            Some(name) => {
                let target = targets
                    .get(name)
                    .filter(|t| t.is_valid())
                    .ok_or_else(|| RenderError::RenderTargetLost(name.clone()))?;
                Surface::Target(target)
            }
            None => Surface::Screen,
        };
        let effects = self.post_fx_chain(pipelines, camera);
        let scene_surface = if effects.is_empty() {
            destination
        } else {
            let swap = &self.swap[0];
            if !swap.is_valid() {
                return Err(RenderError::RenderTargetLost(swap.name().to_string()));
            }
            Surface::Target(swap)
        };
        let (Some(scene_scissor), Some(final_scissor)) = (
            scene_surface.scissor(camera, screen),
            destination.scissor(camera, screen),
        ) else {
            log::debug!("Camera '{}' is clipped away entirely", camera.name);
            state.stats_mut().cameras_skipped += 1;
            return Ok(());
        };

        // Nothing may be pending when the surface or projection changes.
        pipelines.flush_all(state, FlushReason::PassBoundary)?;
        let clear = match scene_surface {
            Surface::Screen => false,
            Surface::Target(target) => !effects.is_empty() || target.auto_clear(),
        };
        scene_surface.bind(state, pipelines, screen, clear)?;
        state.set_scissor(Some(scene_scissor))?;
        if let Some(background) = camera.background {
            state.clear(background)?;
        }

        self.batch_objects(state, pipelines, textures, targets, config, scene, camera)?;
        pipelines.flush_all(state, FlushReason::PassBoundary)?;

        let count = effects.len();
        for (i, handle) in effects.into_iter().enumerate() {
            let source_target = &self.swap[i % 2];
            let source = source_target
                .texture()
                .ok_or_else(|| RenderError::RenderTargetLost(source_target.name().to_string()))?;
            let last = i + 1 == count;
            let surface = if last {
                destination
            } else {
                Surface::Target(&self.swap[(i + 1) % 2])
            };
            surface.bind(state, pipelines, screen, !last)?;
            state.set_scissor(if last { Some(final_scissor) } else { None })?;

            let pipeline = pipelines
                .get_by_handle_mut(handle)
                .ok_or_else(|| RenderError::Internal("post-FX pipeline vanished".to_string()))?;
            pipeline.bind(state)?;
            draw_post_pass(pipeline, state, source, surface.logical_size(screen))?;
        }

        state.stats_mut().cameras_rendered += 1;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn batch_objects<S: SceneSource + ?Sized>(
        &mut self,
        state: &mut GpuStateCache,
        pipelines: &mut PipelineManager,
        textures: &TextureRegistry,
        targets: &RenderTargets,
        config: &RendererConfig,
        scene: &S,
        camera: &Camera,
    ) -> Result<(), RenderError> {
        let view = camera.view(config.round_pixels);
        let world_view = camera.world_view();

        for object in scene.render_list(camera) {
            let culled = !object.will_render(camera)
                || object.bounds().is_some_and(|b| !b.intersects(&world_view));
            if culled {
                state.stats_mut().objects_culled += 1;
                continue;
            }

            let handle = self.resolve(pipelines, object.pipeline(), &config.default_pipeline)?;
            pipelines.set_current_handle(state, handle)?;
            let Some(pipeline) = pipelines.current_mut() else {
                continue;
            };
            pipeline.set_blend_mode(state, object.blend_mode())?;

            let mut ctx = BatchContext::new(pipeline, state, &view, textures, targets);
            match object.batch(&mut ctx) {
                Ok(()) => {}
                Err(ResourceError::Pipeline(e)) => {
                    log::warn!("Camera '{}' skipped an object: {e}", camera.name);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// The batch pipeline an object asked for, or the default one.
    fn resolve(
        &mut self,
        pipelines: &PipelineManager,
        requested: Option<&str>,
        default: &str,
    ) -> Result<PipelineHandle, RenderError> {
        if let Some(name) = requested {
            if let Some(handle) = batch_handle(pipelines, name) {
                return Ok(handle);
            }
            if self.warned.insert(name.to_string()) {
                log::warn!("No batch pipeline named '{name}', using '{default}' instead");
            }
        }
        batch_handle(pipelines, default)
            .ok_or_else(|| PipelineError::NotFound(default.to_string()).into())
    }

    fn post_fx_chain(&mut self, pipelines: &PipelineManager, camera: &Camera) -> Vec<PipelineHandle> {
        let mut chain = Vec::with_capacity(camera.post_fx.len());
        for name in &camera.post_fx {
            let handle = pipelines
                .get(name)
                .filter(|p| p.role() == PipelineRole::PostFx)
                .and_then(|_| pipelines.handle(name));
            match handle {
                Some(handle) => chain.push(handle),
                None => {
                    if self.warned.insert(name.clone()) {
                        log::warn!(
                            "Camera '{}': '{name}' is not a post-FX pipeline, ignoring it",
                            camera.name
                        );
                    }
                }
            }
        }
        chain
    }

    // --- Swap target lifecycle ---

    /// Follows a new screen resolution.
    pub fn resize(
        &mut self,
        state: &mut GpuStateCache,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceError> {
        for target in &mut self.swap {
            target.resize(state, width, height)?;
        }
        Ok(())
    }

    /// Forgets the swap targets' GPU handles.
    pub fn invalidate(&mut self) {
        for target in &mut self.swap {
            target.invalidate();
        }
    }

    /// Rebuilds the swap targets.
    pub fn recreate(&mut self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        for target in &mut self.swap {
            target.recreate(device)?;
        }
        Ok(())
    }

    /// Releases the swap targets.
    pub fn destroy(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        for target in &mut self.swap {
            target.destroy(state)?;
        }
        Ok(())
    }
}

fn batch_handle(pipelines: &PipelineManager, name: &str) -> Option<PipelineHandle> {
    pipelines
        .get(name)
        .filter(|p| p.role() == PipelineRole::Batch)?;
    pipelines.handle(name)
}
