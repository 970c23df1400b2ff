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

//! What the renderer draws: the Game Object contract, the render list and
//! the two concrete objects the renderer ships with.

use super::camera::Camera;
use super::render_target::{RenderTarget, RenderTargets};
use super::textures::{TextureRegistry, TextureSource};
use ahash::AHashMap;
use prism_core::math::{Rect, TransformMatrix, Vec2};
use prism_core::renderer::{
    BlendMode, ResourceError, TextureId, UniformValue, BITMAP_TEXT_PIPELINE,
};
use prism_lanes::render_lane::{
    batch_fill_path, batch_fill_rect, batch_line, batch_quad, batch_stroke_path, batch_texture,
    batch_vertices, CameraView, GpuStateCache, Pipeline, Quad, SpriteVertex, TextureDraw,
    TintMode, UniformOutcome,
};
use std::fmt;
use std::sync::Arc;

/// Everything an object may touch while it batches itself.
///
/// The pipeline is already current and its blend mode already matches the
/// object's, so the object only appends geometry.
pub struct BatchContext<'a> {
    pipeline: &'a mut Pipeline,
    state: &'a mut GpuStateCache,
    camera: &'a CameraView,
    textures: &'a TextureRegistry,
    targets: &'a RenderTargets,
}

impl<'a> BatchContext<'a> {
    /// Bundles the borrows of one batch call.
    pub fn new(
        pipeline: &'a mut Pipeline,
        state: &'a mut GpuStateCache,
        camera: &'a CameraView,
        textures: &'a TextureRegistry,
        targets: &'a RenderTargets,
    ) -> Self {
        Self {
            pipeline,
            state,
            camera,
            textures,
            targets,
        }
    }

    /// The camera being rendered.
    pub fn camera(&self) -> &CameraView {
        self.camera
    }

    /// The pipeline the object batches into.
    pub fn pipeline(&self) -> &Pipeline {
        self.pipeline
    }

    /// Resolves a texture key, then a render target name.
    pub fn texture(&self, key: &str) -> Option<TextureSource> {
        self.textures
            .get(key)
            .or_else(|| self.targets.get(key).and_then(RenderTarget::source))
    }

    /// Appends a pre-transformed quad.
    pub fn batch_quad(&mut self, quad: &Quad, texture: TextureId) -> Result<bool, ResourceError> {
        batch_quad(self.pipeline, self.state, quad, texture)
    }

    /// Projects a sprite through the camera and appends it.
    pub fn batch_texture(&mut self, draw: &TextureDraw) -> Result<bool, ResourceError> {
        batch_texture(self.pipeline, self.state, draw, self.camera)
    }

    /// Appends triangle-list geometry.
    pub fn batch_vertices(
        &mut self,
        vertices: &[SpriteVertex],
        texture: Option<TextureId>,
    ) -> Result<bool, ResourceError> {
        batch_vertices(self.pipeline, self.state, vertices, texture)
    }

    /// Fills a world-space rectangle with a packed tint.
    pub fn fill_rect(&mut self, rect: Rect, tint: u32) -> Result<bool, ResourceError> {
        let matrix = self.camera.shape_matrix();
        batch_fill_rect(self.pipeline, self.state, &matrix, rect, tint)
    }

    /// Fills a simple world-space polygon.
    pub fn fill_path(&mut self, points: &[Vec2], tint: u32) -> Result<bool, ResourceError> {
        let matrix = self.camera.shape_matrix();
        batch_fill_path(self.pipeline, self.state, &matrix, points, tint)
    }

    /// Strokes a world-space polyline.
    pub fn stroke_path(
        &mut self,
        points: &[Vec2],
        thickness: f32,
        closed: bool,
        tint: u32,
    ) -> Result<bool, ResourceError> {
        let matrix = self.camera.shape_matrix();
        batch_stroke_path(self.pipeline, self.state, &matrix, points, thickness, closed, tint)
    }

    /// Draws a world-space line.
    pub fn line(
        &mut self,
        from: Vec2,
        to: Vec2,
        thickness: f32,
        tint: u32,
    ) -> Result<bool, ResourceError> {
        let matrix = self.camera.shape_matrix();
        batch_line(self.pipeline, self.state, &matrix, from, to, thickness, tint)
    }

    /// Sets a uniform of the pipeline, flushing first if needed.
    pub fn set_uniform(
        &mut self,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> Result<UniformOutcome, ResourceError> {
        self.pipeline.set_uniform(self.state, name, value)
    }
}

/// A Game Object as the renderer sees it.
pub trait Renderable {
    /// The pipeline to batch with. `None` uses the renderer's default.
    fn pipeline(&self) -> Option<&str> {
        None
    }

    /// The blend mode the object is drawn with.
    fn blend_mode(&self) -> BlendMode {
        BlendMode::Normal
    }

    /// Returns `false` to skip the object for this camera.
    fn will_render(&self, camera: &Camera) -> bool {
        let _ = camera;
        true
    }

    /// World-space bounds used for culling. `None` is never culled.
    fn bounds(&self) -> Option<Rect> {
        None
    }

    /// Appends the object's geometry.
    fn batch(&self, ctx: &mut BatchContext<'_>) -> Result<(), ResourceError>;
}

/// Produces the render list of a camera, sorted back to front.
pub trait SceneSource {
    /// The objects to draw for `camera`, in draw order.
    fn render_list(&self, camera: &Camera) -> Vec<&dyn Renderable>;
}

/// A slice is drawn in its own order.
impl<T: Renderable> SceneSource for [T] {
    fn render_list(&self, _camera: &Camera) -> Vec<&dyn Renderable> {
        self.iter().map(|object| object as &dyn Renderable).collect()
    }
}

struct Entry {
    depth: f32,
    object: Box<dyn Renderable>,
}

/// A scene of boxed objects drawn in ascending depth.
///
/// Objects with equal depth keep their insertion order.
#[derive(Default)]
pub struct DisplayList {
    entries: Vec<Entry>,
}

impl fmt::Debug for DisplayList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayList")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl DisplayList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object and returns its index.
    pub fn add(&mut self, depth: f32, object: impl Renderable + 'static) -> usize {
        self.entries.push(Entry {
            depth,
            object: Box::new(object),
        });
        self.entries.len() - 1
    }

    /// Moves an object in the draw order.
    pub fn set_depth(&mut self, index: usize, depth: f32) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => {
                entry.depth = depth;
                true
            }
            None => false,
        }
    }

    /// The object at `index`.
    pub fn get(&self, index: usize) -> Option<&dyn Renderable> {
        self.entries.get(index).map(|e| e.object.as_ref())
    }

    /// The number of objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the list holds no object.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SceneSource for DisplayList {
    fn render_list(&self, _camera: &Camera) -> Vec<&dyn Renderable> {
        let mut sorted: Vec<&Entry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        sorted.into_iter().map(|e| e.object.as_ref()).collect()
    }
}

/// Bounds of a `width` x `height` frame placed by a transform.
fn placed_bounds(matrix: &TransformMatrix, origin: Vec2, width: f32, height: f32) -> Rect {
    let x = -origin.x * width;
    let y = -origin.y * height;
    Rect::from_points(&[
        matrix.transform_point(Vec2::new(x, y)),
        matrix.transform_point(Vec2::new(x + width, y)),
        matrix.transform_point(Vec2::new(x, y + height)),
        matrix.transform_point(Vec2::new(x + width, y + height)),
    ])
}

/// A textured quad, the workhorse Game Object.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    /// Texture key, or the name of a render target.
    pub texture: String,
    /// The region of the texture to draw, in pixels.
    pub frame: Rect,
    /// World position of the origin.
    pub position: Vec2,
    /// Rotation in radians.
    pub rotation: f32,
    /// Scale.
    pub scale: Vec2,
    /// Normalized pivot within the frame.
    pub origin: Vec2,
    /// How much camera scroll moves the sprite. `(0, 0)` pins it to the screen.
    pub scroll_factor: Vec2,
    /// Mirror horizontally.
    pub flip_x: bool,
    /// Mirror vertically.
    pub flip_y: bool,
    /// `0xRRGGBB` corner tints: top-left, top-right, bottom-left, bottom-right.
    pub tint: [u32; 4],
    /// Opacity.
    pub alpha: f32,
    /// How the tint is applied.
    pub tint_mode: TintMode,
    /// Blend mode.
    pub blend_mode: BlendMode,
    /// Pipeline name. `None` uses the renderer's default.
    pub pipeline: Option<String>,
    /// Hidden sprites are skipped.
    pub visible: bool,
    /// Camera ids, as bits, that must not draw this sprite.
    pub camera_filter: u32,
    /// The world transform of a parent container.
    pub parent: Option<TransformMatrix>,
}

impl Sprite {
    /// A sprite showing `frame` of `texture`, centered on the world origin.
    pub fn new(texture: impl Into<String>, frame: Rect) -> Self {
        Self {
            texture: texture.into(),
            frame,
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            origin: Vec2::HALF,
            scroll_factor: Vec2::ONE,
            flip_x: false,
            flip_y: false,
            tint: [0xFF_FF_FF; 4],
            alpha: 1.0,
            tint_mode: TintMode::Multiply,
            blend_mode: BlendMode::Normal,
            pipeline: None,
            visible: true,
            camera_filter: 0,
            parent: None,
        }
    }

    /// Places the sprite.
    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Vec2::new(x, y);
        self
    }

    /// Selects the pipeline by name.
    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }

    /// The batch description of this sprite for a resolved texture.
    pub fn to_draw(&self, source: TextureSource) -> TextureDraw {
        TextureDraw {
            frame: self.frame,
            position: self.position,
            rotation: self.rotation,
            scale: self.scale,
            origin: self.origin,
            scroll_factor: self.scroll_factor,
            flip_x: self.flip_x,
            flip_y: self.flip_y,
            tint: self.tint,
            alpha: [self.alpha; 4],
            tint_mode: self.tint_mode,
            parent: self.parent,
            render_target_source: source.render_target,
            ..TextureDraw::new(source.id, source.size)
        }
    }

    fn local_matrix(&self) -> TransformMatrix {
        let matrix = TransformMatrix::from_itrs(self.position, self.rotation, self.scale);
        match &self.parent {
            Some(parent) => parent.multiply(&matrix),
            None => matrix,
        }
    }
}

impl Renderable for Sprite {
    fn pipeline(&self) -> Option<&str> {
        self.pipeline.as_deref()
    }

    fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    fn will_render(&self, camera: &Camera) -> bool {
        self.visible
            && self.alpha > 0.0
            && self.scale.x != 0.0
            && self.scale.y != 0.0
            && self.camera_filter & camera.id == 0
    }

    fn bounds(&self) -> Option<Rect> {
        // Culling works in scroll factor 1 world space.
        if self.scroll_factor != Vec2::ONE {
            return None;
        }
        Some(placed_bounds(
            &self.local_matrix(),
            self.origin,
            self.frame.width,
            self.frame.height,
        ))
    }

    fn batch(&self, ctx: &mut BatchContext<'_>) -> Result<(), ResourceError> {
        let Some(source) = ctx.texture(&self.texture) else {
            log::debug!("Sprite texture '{}' is not loaded", self.texture);
            return Ok(());
        };
        ctx.batch_texture(&self.to_draw(source))?;
        Ok(())
    }
}

/// One character of a bitmap font.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    /// The region of the font texture.
    pub frame: Rect,
    /// Offset of the frame from the pen position.
    pub offset: Vec2,
    /// How far the pen moves after this glyph.
    pub advance: f32,
}

/// A texture atlas of glyphs.
#[derive(Debug, Clone)]
pub struct BitmapFont {
    /// Texture key of the atlas.
    pub texture: String,
    /// Distance between baselines.
    pub line_height: f32,
    glyphs: AHashMap<char, Glyph>,
}

impl BitmapFont {
    /// A font with no glyphs.
    pub fn new(texture: impl Into<String>, line_height: f32) -> Self {
        Self {
            texture: texture.into(),
            line_height,
            glyphs: AHashMap::new(),
        }
    }

    /// A fixed-width font laid out in a grid, row by row, in `chars` order.
    pub fn monospace(
        texture: impl Into<String>,
        cell_width: f32,
        cell_height: f32,
        columns: usize,
        chars: &str,
    ) -> Self {
        let mut font = Self::new(texture, cell_height);
        let columns = columns.max(1);
        for (i, ch) in chars.chars().enumerate() {
            let (col, row) = (i % columns, i / columns);
            font.insert(
                ch,
                Glyph {
                    frame: Rect::new(
                        col as f32 * cell_width,
                        row as f32 * cell_height,
                        cell_width,
                        cell_height,
                    ),
                    offset: Vec2::ZERO,
                    advance: cell_width,
                },
            );
        }
        font
    }

    /// Adds or replaces a glyph.
    pub fn insert(&mut self, ch: char, glyph: Glyph) {
        self.glyphs.insert(ch, glyph);
    }

    /// The glyph of `ch`.
    pub fn glyph(&self, ch: char) -> Option<&Glyph> {
        self.glyphs.get(&ch)
    }
}

/// A run of text drawn from a [`BitmapFont`], one quad per glyph.
#[derive(Debug, Clone)]
pub struct BitmapText {
    /// The font, shared between texts.
    pub font: Arc<BitmapFont>,
    /// The text. `\n` starts a new line.
    pub text: String,
    /// World position of the top-left corner.
    pub position: Vec2,
    /// Uniform scale.
    pub scale: f32,
    /// Extra space after every glyph, before scaling.
    pub letter_spacing: f32,
    /// `0xRRGGBB` tint.
    pub tint: u32,
    /// Opacity.
    pub alpha: f32,
    /// How much camera scroll moves the text.
    pub scroll_factor: Vec2,
    /// Blend mode.
    pub blend_mode: BlendMode,
    /// Pipeline name, the bitmap text pipeline by default.
    pub pipeline: Option<String>,
    /// Hidden texts are skipped.
    pub visible: bool,
}

impl BitmapText {
    /// A text at the world origin.
    pub fn new(font: Arc<BitmapFont>, text: impl Into<String>) -> Self {
        Self {
            font,
            text: text.into(),
            position: Vec2::ZERO,
            scale: 1.0,
            letter_spacing: 0.0,
            tint: 0xFF_FF_FF,
            alpha: 1.0,
            scroll_factor: Vec2::ONE,
            blend_mode: BlendMode::Normal,
            pipeline: Some(BITMAP_TEXT_PIPELINE.to_string()),
            visible: true,
        }
    }

    /// Every drawable glyph with its top-left corner relative to `position`,
    /// unscaled. Characters missing from the font are skipped.
    pub fn layout(&self) -> Vec<(Glyph, Vec2)> {
        let mut placed = Vec::with_capacity(self.text.len());
        let mut pen = Vec2::ZERO;
        for ch in self.text.chars() {
            if ch == '\n' {
                pen = Vec2::new(0.0, pen.y + self.font.line_height);
                continue;
            }
            let Some(glyph) = self.font.glyph(ch) else {
                continue;
            };
            placed.push((*glyph, pen + glyph.offset));
            pen.x += glyph.advance + self.letter_spacing;
        }
        placed
    }
}

impl Renderable for BitmapText {
    fn pipeline(&self) -> Option<&str> {
        self.pipeline.as_deref()
    }

    fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    fn will_render(&self, _camera: &Camera) -> bool {
        self.visible && self.alpha > 0.0 && self.scale != 0.0 && !self.text.is_empty()
    }

    fn bounds(&self) -> Option<Rect> {
        if self.scroll_factor != Vec2::ONE {
            return None;
        }
        let corners: Vec<Vec2> = self
            .layout()
            .iter()
            .flat_map(|(glyph, at)| {
                let top_left = self.position + *at * self.scale;
                let size = Vec2::new(glyph.frame.width, glyph.frame.height) * self.scale;
                [top_left, top_left + size]
            })
            .collect();
        (!corners.is_empty()).then(|| Rect::from_points(&corners))
    }

    fn batch(&self, ctx: &mut BatchContext<'_>) -> Result<(), ResourceError> {
        let Some(source) = ctx.texture(&self.font.texture) else {
            log::debug!("Font texture '{}' is not loaded", self.font.texture);
            return Ok(());
        };
        for (glyph, at) in self.layout() {
            let draw = TextureDraw {
                frame: glyph.frame,
                position: self.position + at * self.scale,
                scale: Vec2::splat(self.scale),
                origin: Vec2::ZERO,
                scroll_factor: self.scroll_factor,
                tint: [self.tint; 4],
                alpha: [self.alpha; 4],
                render_target_source: source.render_target,
                ..TextureDraw::new(source.id, source.size)
            };
            if !ctx.batch_texture(&draw)? {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::math::Extent2D;
    use prism_core::renderer::FilterMode;
    use prism_infra::RecordingDevice;
    use prism_lanes::render_lane::{bitmap_text_pipeline_descriptor, SpriteVertex};

    struct Marker(&'static str);

    impl Renderable for Marker {
        fn pipeline(&self) -> Option<&str> {
            Some(self.0)
        }

        fn batch(&self, _ctx: &mut BatchContext<'_>) -> Result<(), ResourceError> {
            Ok(())
        }
    }

    fn names(list: Vec<&dyn Renderable>) -> Vec<&str> {
        list.into_iter().filter_map(|o| o.pipeline()).collect()
    }

    #[test]
    fn display_list_sorts_by_depth_and_keeps_ties_stable() {
        let mut list = DisplayList::new();
        list.add(2.0, Marker("c"));
        list.add(0.0, Marker("a"));
        list.add(1.0, Marker("b1"));
        let late = list.add(5.0, Marker("b2"));
        assert!(list.set_depth(late, 1.0));
        let camera = Camera::default();
        assert_eq!(names(list.render_list(&camera)), ["a", "b1", "b2", "c"]);
        assert!(!list.set_depth(99, 0.0));
    }

    #[test]
    fn slices_render_in_their_own_order() {
        let objects = [Marker("z"), Marker("a")];
        assert_eq!(names(objects.render_list(&Camera::default())), ["z", "a"]);
    }

    #[test]
    fn sprite_bounds_follow_origin_and_scale() {
        let sprite = Sprite {
            scale: Vec2::new(2.0, 1.0),
            ..Sprite::new("t", Rect::new(0.0, 0.0, 10.0, 20.0)).at(100.0, 100.0)
        };
        assert_eq!(sprite.bounds(), Some(Rect::new(90.0, 90.0, 20.0, 20.0)));
        let pinned = Sprite {
            scroll_factor: Vec2::ZERO,
            ..sprite
        };
        assert_eq!(pinned.bounds(), None);
    }

    #[test]
    fn camera_filter_hides_sprite_from_one_camera() {
        let main = Camera::default();
        let minimap = Camera {
            id: 2,
            ..Camera::new("minimap", 0.0, 0.0, 100.0, 100.0)
        };
        let sprite = Sprite {
            camera_filter: 2,
            ..Sprite::new("t", Rect::new(0.0, 0.0, 4.0, 4.0))
        };
        assert!(sprite.will_render(&main));
        assert!(!sprite.will_render(&minimap));
        let hidden = Sprite {
            alpha: 0.0,
            ..Sprite::new("t", Rect::new(0.0, 0.0, 4.0, 4.0))
        };
        assert!(!hidden.will_render(&main));
    }

    #[test]
    fn bitmap_text_lays_out_lines_and_skips_unknown_chars() {
        let font = Arc::new(BitmapFont::monospace("font", 8.0, 10.0, 16, "AB"));
        let text = BitmapText {
            letter_spacing: 1.0,
            ..BitmapText::new(font, "AB?\nB")
        };
        let layout = text.layout();
        let pens: Vec<Vec2> = layout.iter().map(|(_, at)| *at).collect();
        assert_eq!(
            pens,
            [Vec2::new(0.0, 0.0), Vec2::new(9.0, 0.0), Vec2::new(0.0, 10.0)]
        );
        assert_eq!(layout[1].0.frame, Rect::new(8.0, 0.0, 8.0, 10.0));
        assert_eq!(text.bounds(), Some(Rect::new(0.0, 0.0, 17.0, 20.0)));
        assert_eq!(text.pipeline(), Some(BITMAP_TEXT_PIPELINE));
    }

    #[test]
    fn bitmap_text_batches_one_quad_per_glyph() {
        let device = RecordingDevice::default();
        let mut state = GpuStateCache::new(Arc::new(device.clone()));
        let mut textures = TextureRegistry::new();
        textures
            .insert(&mut state, "font", Extent2D::new(128, 64), FilterMode::Nearest, None)
            .expect("texture");
        let targets = RenderTargets::default();
        let descriptor = bitmap_text_pipeline_descriptor(16, 4).expect("descriptor");
        let mut pipeline = Pipeline::new(&mut state, descriptor, Vec::new()).expect("pipeline");
        pipeline.set_projection(800, 600);

        let font = Arc::new(BitmapFont::monospace("font", 8.0, 10.0, 16, "HI"));
        let text = BitmapText::new(font, "HI HI");
        let view = CameraView::default();
        let mut ctx = BatchContext::new(&mut pipeline, &mut state, &view, &textures, &targets);
        text.batch(&mut ctx).expect("batch");
        assert_eq!(pipeline.vertex_count(), 4 * 6);

        pipeline
            .flush(&mut state, prism_core::renderer::FlushReason::Explicit)
            .expect("flush");
        let call = &device.draw_calls()[0];
        let first: SpriteVertex =
            bytemuck::pod_read_unaligned(call.vertices().next().expect("vertex"));
        assert_eq!(first.position, [0.0, 0.0]);
        assert_eq!(call.program_label, BITMAP_TEXT_PIPELINE);
    }

    #[test]
    fn missing_texture_draws_nothing() {
        let device = RecordingDevice::default();
        let mut state = GpuStateCache::new(Arc::new(device.clone()));
        let textures = TextureRegistry::new();
        let targets = RenderTargets::default();
        let descriptor = bitmap_text_pipeline_descriptor(4, 1).expect("descriptor");
        let mut pipeline = Pipeline::new(&mut state, descriptor, Vec::new()).expect("pipeline");
        let view = CameraView::default();
        let mut ctx = BatchContext::new(&mut pipeline, &mut state, &view, &textures, &targets);
        Sprite::new("nope", Rect::new(0.0, 0.0, 1.0, 1.0))
            .batch(&mut ctx)
            .expect("batch");
        assert_eq!(pipeline.vertex_count(), 0);
    }
}
