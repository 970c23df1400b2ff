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

//! Offscreen surfaces: a color texture attached to a framebuffer.

use super::textures::TextureSource;
use ahash::AHashMap;
use prism_core::math::{Extent2D, LinearRgba};
use prism_core::renderer::{
    FilterMode, FramebufferId, GraphicsDevice, RenderError, ResourceError, TextureDescriptor,
    TextureId,
};
use prism_lanes::render_lane::GpuStateCache;
use std::borrow::Cow;

/// Render targets by name.
pub type RenderTargets = AHashMap<String, RenderTarget>;

/// A named offscreen surface cameras can draw into.
///
/// The target has a logical size, which is what cameras and projections see,
/// and a physical size scaled by [`scale`](RenderTarget::scale). Its texture is
/// stored bottom-up, so sprites sampling it must flip `v`.
#[derive(Debug)]
pub struct RenderTarget {
    name: String,
    logical: Extent2D,
    scale: f32,
    auto_resize: bool,
    auto_clear: bool,
    filter: FilterMode,
    texture: Option<TextureId>,
    framebuffer: Option<FramebufferId>,
}

impl RenderTarget {
    /// Describes a target. Nothing is allocated until [`create`](Self::create).
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            logical: Extent2D::new(width.max(1), height.max(1)),
            scale: 1.0,
            auto_resize: false,
            auto_clear: true,
            filter: FilterMode::Linear,
            texture: None,
            framebuffer: None,
        }
    }

    /// Sets the ratio of physical to logical pixels.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = if scale > 0.0 { scale } else { 1.0 };
        self
    }

    /// Follow the renderer's resolution on resize.
    pub fn with_auto_resize(mut self, auto_resize: bool) -> Self {
        self.auto_resize = auto_resize;
        self
    }

    /// Clear to transparent every time a camera starts drawing into it.
    pub fn with_auto_clear(mut self, auto_clear: bool) -> Self {
        self.auto_clear = auto_clear;
        self
    }

    /// Sets the sampling filter of the color texture.
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    /// Allocates the texture and framebuffer.
    pub fn create(&mut self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        let texture = device.create_texture(
            &TextureDescriptor {
                label: Some(Cow::Borrowed(self.name.as_str())),
                size: self.size(),
                filter: self.filter,
                render_target: true,
            },
            None,
        )?;
        match device.create_framebuffer(texture) {
            Ok(framebuffer) => {
                self.texture = Some(texture);
                self.framebuffer = Some(framebuffer);
                Ok(())
            }
            Err(e) => {
                let _ = device.destroy_texture(texture);
                Err(e)
            }
        }
    }

    // --- Accessors ---

    /// The target name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The size cameras and projections work in.
    pub fn logical_size(&self) -> Extent2D {
        self.logical
    }

    /// The size of the texture in pixels.
    pub fn size(&self) -> Extent2D {
        if self.scale == 1.0 {
            self.logical
        } else {
            self.logical.scaled(self.scale)
        }
    }

    /// The ratio of physical to logical pixels.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Whether the target follows the renderer's resolution.
    pub fn auto_resize(&self) -> bool {
        self.auto_resize
    }

    /// Whether the target is cleared when a camera starts drawing into it.
    pub fn auto_clear(&self) -> bool {
        self.auto_clear
    }

    /// The color texture, `None` while invalid.
    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    /// The framebuffer, `None` while invalid.
    pub fn framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer
    }

    /// Returns `true` if the GPU objects exist.
    pub fn is_valid(&self) -> bool {
        self.texture.is_some() && self.framebuffer.is_some()
    }

    /// The color texture as something sprites can sample.
    pub fn source(&self) -> Option<TextureSource> {
        Some(TextureSource {
            id: self.texture?,
            size: self.size(),
            render_target: true,
        })
    }

    // --- Use ---

    /// Binds the framebuffer with a viewport covering the whole target.
    ///
    /// With `clear`, the scissor is disabled and the target is cleared to
    /// transparent.
    /// ## Errors
    /// * `RenderError::RenderTargetLost` - If the target has no framebuffer.
    pub fn bind(&self, state: &mut GpuStateCache, clear: bool) -> Result<(), RenderError> {
        let framebuffer = self
            .framebuffer
            .ok_or_else(|| RenderError::RenderTargetLost(self.name.clone()))?;
        let size = self.size();
        state.bind_framebuffer(Some(framebuffer), size)?;
        state.set_viewport(0, 0, size.width, size.height)?;
        if clear {
            state.set_scissor(None)?;
            state.clear(LinearRgba::TRANSPARENT)?;
        }
        Ok(())
    }

    /// Reallocates the target at a new logical size.
    /// Returns `false` if the size did not change.
    pub fn resize(
        &mut self,
        state: &mut GpuStateCache,
        width: u32,
        height: u32,
    ) -> Result<bool, ResourceError> {
        let logical = Extent2D::new(width.max(1), height.max(1));
        if logical == self.logical && self.is_valid() {
            return Ok(false);
        }
        self.release(state)?;
        self.logical = logical;
        self.create(state.device().as_ref())?;
        log::debug!(
            "Render target '{}' resized to {}x{}",
            self.name,
            logical.width,
            logical.height
        );
        Ok(true)
    }

    /// Forgets the GPU handles after a context loss.
    pub fn invalidate(&mut self) {
        self.texture = None;
        self.framebuffer = None;
    }

    /// Allocates the GPU objects again with the same name and size.
    pub fn recreate(&mut self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        self.invalidate();
        self.create(device)
    }

    /// Releases the GPU objects.
    pub fn destroy(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        self.release(state)
    }

    fn release(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        if let Some(framebuffer) = self.framebuffer.take() {
            state.forget_framebuffer(framebuffer);
            state.device().destroy_framebuffer(framebuffer)?;
        }
        if let Some(texture) = self.texture.take() {
            state.forget_texture(texture);
            state.device().destroy_texture(texture)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::PixelRect;
    use prism_infra::graphics::headless::GpuCommand;
    use prism_infra::RecordingDevice;
    use std::sync::Arc;

    fn setup() -> (RecordingDevice, GpuStateCache) {
        let device = RecordingDevice::default();
        let state = GpuStateCache::new(Arc::new(device.clone()));
        (device, state)
    }

    #[test]
    fn create_allocates_texture_and_framebuffer() {
        let (device, _state) = setup();
        let mut target = RenderTarget::new("minimap", 128, 64);
        assert!(!target.is_valid());
        target.create(&device).expect("create");
        assert!(target.is_valid());
        let (_, _, textures, framebuffers) = device.live_resources();
        assert_eq!((textures, framebuffers), (1, 1));
        let texture = target.texture().expect("texture");
        assert_eq!(device.texture_label(texture).as_deref(), Some("minimap"));
        assert!(target.source().expect("source").render_target);
    }

    #[test]
    fn scale_changes_the_physical_size_only() {
        let target = RenderTarget::new("half", 800, 600).with_scale(0.5);
        assert_eq!(target.logical_size(), Extent2D::new(800, 600));
        assert_eq!(target.size(), Extent2D::new(400, 300));
    }

    #[test]
    fn bind_covers_the_target_and_clears() {
        let (device, mut state) = setup();
        let mut target = RenderTarget::new("rt", 64, 32);
        target.create(&device).expect("create");
        device.clear_journal();
        target.bind(&mut state, true).expect("bind");
        let commands = device.commands();
        assert!(commands.contains(&GpuCommand::BindFramebuffer(target.framebuffer())));
        assert!(commands.contains(&GpuCommand::Viewport(PixelRect::new(0, 0, 64, 32))));
        assert!(commands.contains(&GpuCommand::Clear(LinearRgba::TRANSPARENT)));
    }

    #[test]
    fn binding_an_invalid_target_is_a_lost_target() {
        let (_device, mut state) = setup();
        let target = RenderTarget::new("never-created", 8, 8);
        let err = target.bind(&mut state, false).unwrap_err();
        assert!(matches!(err, RenderError::RenderTargetLost(ref name) if name == "never-created"));
    }

    #[test]
    fn resize_reallocates_only_on_change() {
        let (device, mut state) = setup();
        let mut target = RenderTarget::new("rt", 64, 64);
        target.create(&device).expect("create");
        assert!(!target.resize(&mut state, 64, 64).expect("same size"));
        assert!(target.resize(&mut state, 32, 16).expect("new size"));
        assert_eq!(target.size(), Extent2D::new(32, 16));
        let (_, _, textures, framebuffers) = device.live_resources();
        assert_eq!((textures, framebuffers), (1, 1));
    }

    #[test]
    fn recreate_after_context_loss() {
        let (device, mut state) = setup();
        let mut target = RenderTarget::new("rt", 16, 16);
        target.create(&device).expect("create");
        device.lose_context();
        target.invalidate();
        assert!(!target.is_valid());
        device.restore_context();
        target.recreate(&device).expect("recreate");
        assert!(target.is_valid());
        target.destroy(&mut state).expect("destroy");
        assert_eq!(device.live_resources(), (0, 0, 0, 0));
    }
}
