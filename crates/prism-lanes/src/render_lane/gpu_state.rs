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

//! The one place GL state is mutated from.
//!
//! WebGL is a global state machine, and redundant binds cost real time on
//! some drivers. Every pipeline, render target and the compositor go through
//! a [`GpuStateCache`] passed down by `&mut`, so the cache always knows what
//! is bound and can skip calls that would change nothing.

use prism_core::math::{Extent2D, LinearRgba};
use prism_core::renderer::{
    BlendState, BufferId, DeviceCapabilities, FlushReason, FrameStats, FramebufferId,
    GraphicsDevice, PixelRect, PrimitiveTopology, ProgramId, ResourceError, TextureId,
    VertexLayout,
};
use std::sync::Arc;

/// The cached GL state plus the counters of the frame in progress.
///
/// `None` in any slot means "unknown": the next request for that state always
/// reaches the device. [`GpuStateCache::invalidate`] resets every slot to
/// unknown, which is what happens after a context loss.
#[derive(Debug)]
pub struct GpuStateCache {
    device: Arc<dyn GraphicsDevice>,
    capabilities: DeviceCapabilities,

    program: Option<ProgramId>,
    vertex_buffer: Option<BufferId>,
    layout_for: Option<(ProgramId, BufferId)>,
    units: Vec<Option<TextureId>>,
    blend: Option<BlendState>,
    // Outer `None` is unknown, inner `None` is the default framebuffer.
    framebuffer: Option<Option<FramebufferId>>,
    surface: Extent2D,
    viewport: Option<PixelRect>,
    scissor: Option<Option<PixelRect>>,

    stats: FrameStats,
}

impl GpuStateCache {
    /// Wraps a device. The initial GL state is treated as unknown.
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        let capabilities = device.capabilities();
        Self {
            device,
            units: vec![None; capabilities.max_texture_units as usize],
            capabilities,
            program: None,
            vertex_buffer: None,
            layout_for: None,
            blend: None,
            framebuffer: None,
            surface: Extent2D::default(),
            viewport: None,
            scissor: None,
            stats: FrameStats::default(),
        }
    }

    /// The device behind the cache.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The limits reported by the device when the cache was created.
    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    /// Forgets everything the cache believes is bound.
    pub fn invalidate(&mut self) {
        log::debug!("GpuStateCache: invalidated");
        self.program = None;
        self.vertex_buffer = None;
        self.layout_for = None;
        self.units.iter_mut().for_each(|u| *u = None);
        self.blend = None;
        self.framebuffer = None;
        self.viewport = None;
        self.scissor = None;
    }

    /// Swaps in a new device, typically after a context restore.
    pub fn replace_device(&mut self, device: Arc<dyn GraphicsDevice>) {
        self.capabilities = device.capabilities();
        self.units = vec![None; self.capabilities.max_texture_units as usize];
        self.device = device;
        self.invalidate();
    }

    // --- Programs and buffers ---

    /// Makes `program` active. Returns `true` if the device was called.
    pub fn use_program(&mut self, program: ProgramId) -> Result<bool, ResourceError> {
        if self.program == Some(program) {
            return Ok(false);
        }
        self.device.use_program(program)?;
        self.program = Some(program);
        self.stats.program_switches += 1;
        Ok(true)
    }

    /// The program the cache believes is active.
    pub fn current_program(&self) -> Option<ProgramId> {
        self.program
    }

    /// Binds `buffer` as the array buffer.
    pub fn bind_vertex_buffer(&mut self, buffer: BufferId) -> Result<bool, ResourceError> {
        if self.vertex_buffer == Some(buffer) {
            return Ok(false);
        }
        self.device.bind_vertex_buffer(buffer)?;
        self.vertex_buffer = Some(buffer);
        Ok(true)
    }

    /// Points `program`'s attributes at `buffer`.
    ///
    /// Attribute pointers are global state captured at the time of the call,
    /// so they are re-applied whenever the program or the buffer changed
    /// since the last application.
    pub fn apply_vertex_layout(
        &mut self,
        program: ProgramId,
        buffer: BufferId,
        layout: &VertexLayout,
    ) -> Result<(), ResourceError> {
        if self.layout_for == Some((program, buffer)) {
            return Ok(());
        }
        self.bind_vertex_buffer(buffer)?;
        self.device.set_vertex_layout(program, layout)?;
        self.layout_for = Some((program, buffer));
        Ok(())
    }

    /// Called when a program or buffer is destroyed so stale ids are never trusted.
    pub fn forget_program(&mut self, program: ProgramId) {
        if self.program == Some(program) {
            self.program = None;
        }
        if self.layout_for.is_some_and(|(p, _)| p == program) {
            self.layout_for = None;
        }
    }

    /// See [`GpuStateCache::forget_program`].
    pub fn forget_buffer(&mut self, buffer: BufferId) {
        if self.vertex_buffer == Some(buffer) {
            self.vertex_buffer = None;
        }
        if self.layout_for.is_some_and(|(_, b)| b == buffer) {
            self.layout_for = None;
        }
    }

    // --- Textures ---

    /// Binds `texture` to `unit`.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the unit does not exist on this device.
    pub fn bind_texture(&mut self, unit: u32, texture: TextureId) -> Result<bool, ResourceError> {
        let slot = self
            .units
            .get_mut(unit as usize)
            .ok_or(ResourceError::OutOfBounds)?;
        if *slot == Some(texture) {
            return Ok(false);
        }
        self.device.bind_texture(unit, texture)?;
        *slot = Some(texture);
        self.stats.texture_binds += 1;
        Ok(true)
    }

    /// The texture the cache believes is bound to `unit`.
    pub fn texture_on_unit(&self, unit: u32) -> Option<TextureId> {
        self.units.get(unit as usize).copied().flatten()
    }

    /// Drops every unit binding of a destroyed texture.
    pub fn forget_texture(&mut self, texture: TextureId) {
        for slot in &mut self.units {
            if *slot == Some(texture) {
                *slot = None;
            }
        }
    }

    // --- Fixed-function state ---

    /// Applies a blend state if it differs from the current one.
    pub fn set_blend(&mut self, blend: BlendState) -> Result<(), ResourceError> {
        if self.blend == Some(blend) {
            return Ok(());
        }
        self.device.set_blend_state(blend)?;
        self.blend = Some(blend);
        Ok(())
    }

    /// Binds a framebuffer, or the canvas for `None`.
    ///
    /// `surface` is the size of what gets bound. Viewports and scissors given
    /// in top-left coordinates are flipped against its height.
    pub fn bind_framebuffer(
        &mut self,
        framebuffer: Option<FramebufferId>,
        surface: Extent2D,
    ) -> Result<(), ResourceError> {
        self.surface = surface;
        if self.framebuffer == Some(framebuffer) {
            return Ok(());
        }
        self.device.bind_framebuffer(framebuffer)?;
        self.framebuffer = Some(framebuffer);
        Ok(())
    }

    /// The framebuffer the cache believes is bound, `Some(None)` for the canvas.
    pub fn current_framebuffer(&self) -> Option<Option<FramebufferId>> {
        self.framebuffer
    }

    /// The size of the bound surface.
    pub fn surface_size(&self) -> Extent2D {
        self.surface
    }

    /// Forgets a destroyed framebuffer.
    pub fn forget_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.framebuffer == Some(Some(framebuffer)) {
            self.framebuffer = None;
        }
    }

    /// Sets the viewport from a top-left rectangle on the bound surface.
    pub fn set_viewport(
        &mut self,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceError> {
        let rect = PixelRect::from_top_left(x, y, width, height, self.surface.height);
        if self.viewport == Some(rect) {
            return Ok(());
        }
        self.device.set_viewport(rect)?;
        self.viewport = Some(rect);
        Ok(())
    }

    /// Enables the scissor with a top-left rectangle, or disables it for `None`.
    pub fn set_scissor(&mut self, rect: Option<(i32, i32, u32, u32)>) -> Result<(), ResourceError> {
        let surface_height = self.surface.height;
        let rect = rect.map(|(x, y, w, h)| PixelRect::from_top_left(x, y, w, h, surface_height));
        if self.scissor == Some(rect) {
            return Ok(());
        }
        self.device.set_scissor(rect)?;
        self.scissor = Some(rect);
        Ok(())
    }

    /// Clears the bound surface inside the current scissor.
    pub fn clear(&mut self, color: LinearRgba) -> Result<(), ResourceError> {
        self.device.clear(color)
    }

    /// Issues a draw and counts it.
    pub fn draw(
        &mut self,
        topology: PrimitiveTopology,
        first: u32,
        count: u32,
    ) -> Result<(), ResourceError> {
        self.device.draw(topology, first, count)?;
        self.stats.draw_calls += 1;
        self.stats.vertices += count;
        Ok(())
    }

    // --- Statistics ---

    /// Counts one flush.
    pub fn record_flush(&mut self, reason: FlushReason) {
        self.stats.record_flush(reason);
    }

    /// The counters of the frame in progress.
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Mutable access for the compositor's camera and culling counters.
    pub fn stats_mut(&mut self) -> &mut FrameStats {
        &mut self.stats
    }

    /// Starts counting a new frame.
    pub fn begin_frame(&mut self, frame_number: u64) {
        self.stats = FrameStats::new(frame_number);
    }

    /// Returns the finished frame's counters and starts from zero.
    pub fn take_stats(&mut self) -> FrameStats {
        let frame_number = self.stats.frame_number;
        std::mem::replace(&mut self.stats, FrameStats::new(frame_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::{BlendMode, FilterMode, TextureDescriptor};
    use prism_infra::graphics::headless::GpuCommand;
    use prism_infra::RecordingDevice;
    use std::borrow::Cow;

    fn setup() -> (RecordingDevice, GpuStateCache) {
        let device = RecordingDevice::with_texture_units(4);
        let state = GpuStateCache::new(Arc::new(device.clone()));
        (device, state)
    }

    fn texture(state: &GpuStateCache) -> TextureId {
        state
            .device()
            .create_texture(
                &TextureDescriptor {
                    label: Some(Cow::Borrowed("t")),
                    size: Extent2D::new(1, 1),
                    filter: FilterMode::Nearest,
                    render_target: false,
                },
                None,
            )
            .expect("texture")
    }

    #[test]
    fn redundant_texture_binds_are_elided() {
        let (device, mut state) = setup();
        let tex = texture(&state);
        assert!(state.bind_texture(2, tex).expect("bind"));
        assert!(!state.bind_texture(2, tex).expect("bind again"));
        let binds = device
            .commands()
            .iter()
            .filter(|c| matches!(c, GpuCommand::BindTexture { .. }))
            .count();
        assert_eq!(binds, 1);
        assert_eq!(state.stats().texture_binds, 1);
        assert!(matches!(
            state.bind_texture(4, tex),
            Err(ResourceError::OutOfBounds)
        ));
    }

    #[test]
    fn blend_is_applied_once() {
        let (device, mut state) = setup();
        state.set_blend(BlendMode::Normal.state()).expect("blend");
        state.set_blend(BlendMode::Normal.state()).expect("blend");
        state.set_blend(BlendMode::Add.state()).expect("blend");
        let blends = device
            .commands()
            .iter()
            .filter(|c| matches!(c, GpuCommand::Blend(_)))
            .count();
        assert_eq!(blends, 2);
    }

    #[test]
    fn viewport_is_flipped_against_the_bound_surface() {
        let (device, mut state) = setup();
        state
            .bind_framebuffer(None, Extent2D::new(800, 600))
            .expect("bind");
        state.set_viewport(0, 0, 400, 100).expect("viewport");
        assert!(device
            .commands()
            .iter()
            .any(|c| matches!(c, GpuCommand::Viewport(r) if r.y == 500 && r.height == 100)));
    }

    #[test]
    fn invalidate_forces_rebinds() {
        let (device, mut state) = setup();
        let tex = texture(&state);
        state.bind_texture(0, tex).expect("bind");
        state.invalidate();
        assert_eq!(state.texture_on_unit(0), None);
        assert!(state.bind_texture(0, tex).expect("rebind"));
        device.clear_journal();
        state.bind_framebuffer(None, Extent2D::new(1, 1)).expect("fb");
        assert_eq!(device.commands().len(), 1);
    }

    #[test]
    fn take_stats_keeps_the_frame_number() {
        let (_, mut state) = setup();
        state.begin_frame(7);
        state.record_flush(FlushReason::Explicit);
        let stats = state.take_stats();
        assert_eq!(stats.frame_number, 7);
        assert_eq!(stats.total_flushes(), 1);
        assert_eq!(state.stats().total_flushes(), 0);
        assert_eq!(state.stats().frame_number, 7);
    }
}
