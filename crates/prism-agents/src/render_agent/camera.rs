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

//! The 2D camera: a viewport onto the world with scroll, zoom and rotation.

use prism_core::math::{LinearRgba, Rect, TransformMatrix, Vec2};
use prism_lanes::render_lane::CameraView;

/// A view of the scene drawn into a rectangle of the screen.
///
/// Cameras are plain data owned by game code. The renderer reads one per
/// [`render`](super::Renderer::render) call and never keeps it.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// A single bit identifying the camera. Objects can exclude cameras by
    /// setting this bit in their camera filter.
    pub id: u32,
    /// A name used in logs.
    pub name: String,
    /// The screen rectangle the camera draws into, in pixels.
    pub viewport: Rect,
    /// The world position of the viewport's top-left corner at zoom 1.
    pub scroll: Vec2,
    /// Magnification. `2.0` shows half as much of the world.
    pub zoom: f32,
    /// Rotation in radians around the origin.
    pub rotation: f32,
    /// Normalized pivot for zoom and rotation. `(0.5, 0.5)` is the center.
    pub origin: Vec2,
    /// Multiplied into the alpha of everything the camera draws.
    pub alpha: f32,
    /// Snap vertex positions to whole pixels.
    pub round_pixels: bool,
    /// Fills the viewport before anything is drawn.
    pub background: Option<LinearRgba>,
    /// Draw into the named render target instead of the screen.
    pub render_target: Option<String>,
    /// Post-FX pipelines applied to the camera's output, in order.
    pub post_fx: Vec<String>,
    /// A screen rectangle the output is clipped to, on top of the viewport.
    pub mask: Option<Rect>,
    /// Invisible cameras are skipped.
    pub visible: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new("main", 0.0, 0.0, 800.0, 600.0)
    }
}

impl Camera {
    /// Creates a visible camera with no scroll, zoom 1 and a centered origin.
    pub fn new(name: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            id: 1,
            name: name.into(),
            viewport: Rect::new(x, y, width, height),
            scroll: Vec2::ZERO,
            zoom: 1.0,
            rotation: 0.0,
            origin: Vec2::HALF,
            alpha: 1.0,
            round_pixels: false,
            background: None,
            render_target: None,
            post_fx: Vec::new(),
            mask: None,
            visible: true,
        }
    }

    /// Returns `true` if the camera cannot show anything: a viewport smaller
    /// than a pixel or a non-positive zoom.
    pub fn has_empty_viewport(&self) -> bool {
        self.viewport.width < 1.0 || self.viewport.height < 1.0 || !(self.zoom > 0.0)
    }

    /// The origin in pixels, relative to the viewport.
    #[inline]
    fn origin_px(&self) -> Vec2 {
        Vec2::new(
            self.viewport.width * self.origin.x,
            self.viewport.height * self.origin.y,
        )
    }

    /// The camera matrix, without scroll.
    ///
    /// Moves to the viewport position plus origin, rotates and zooms there,
    /// then moves back by the origin. Scroll is applied per object because
    /// it depends on the object's scroll factor.
    pub fn view_matrix(&self) -> TransformMatrix {
        let origin = self.origin_px();
        let translation = Vec2::new(self.viewport.x, self.viewport.y) + origin;
        let mut matrix =
            TransformMatrix::from_itrs(translation, self.rotation, Vec2::splat(self.zoom));
        matrix.translate(-origin);
        matrix
    }

    /// The world rectangle visible through the viewport, for culling.
    ///
    /// With a rotation this is the bounding box of the rotated view.
    pub fn world_view(&self) -> Rect {
        let Some(inverse) = self.view_matrix().inverse() else {
            return Rect::default();
        };
        let v = self.viewport;
        let corners = [
            Vec2::new(v.x, v.y),
            Vec2::new(v.right(), v.y),
            Vec2::new(v.x, v.bottom()),
            Vec2::new(v.right(), v.bottom()),
        ]
        .map(|corner| inverse.transform_point(corner) + self.scroll);
        Rect::from_points(&corners)
    }

    /// What the batching functions need from this camera.
    ///
    /// `force_round_pixels` comes from the renderer configuration.
    pub fn view(&self, force_round_pixels: bool) -> CameraView {
        CameraView {
            matrix: self.view_matrix(),
            scroll: self.scroll,
            alpha: self.alpha,
            round_pixels: self.round_pixels || force_round_pixels,
        }
    }

    /// The screen area the camera may touch: the viewport, clipped by the
    /// mask and by `surface`. `None` if nothing is left.
    pub fn clip_rect(&self, surface: Rect) -> Option<Rect> {
        let clipped = self.viewport.intersection(&surface)?;
        match &self.mask {
            Some(mask) => clipped.intersection(mask),
            None => Some(clipped),
        }
    }

    /// Scrolls so that the world point `(x, y)` sits at the camera origin.
    pub fn center_on(&mut self, x: f32, y: f32) {
        let origin = self.origin_px();
        self.scroll = Vec2::new(x - origin.x, y - origin.y);
    }
}
