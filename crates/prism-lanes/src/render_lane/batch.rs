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

//! Turning quads, sprites and raw triangles into pipeline vertices.

use super::gpu_state::GpuStateCache;
use super::pipeline::Pipeline;
use bytemuck::{Pod, Zeroable};
use prism_core::math::{pack_tint, Extent2D, Rect, TransformMatrix, Vec2};
use prism_core::renderer::{FlushReason, PipelineError, ResourceError, TextureId};

/// The vertex of the sprite batching pipelines. 28 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    /// Position in pixels, y down.
    pub position: [f32; 2],
    /// Texture coordinate.
    pub tex_coord: [f32; 2],
    /// The texture unit to sample, as a float for GLSL ES 1.00.
    pub tex_id: f32,
    /// A [`TintMode`] as a float.
    pub tint_effect: f32,
    /// Packed RGBA tint, see [`pack_tint`].
    pub tint: u32,
}

/// The vertex of full-screen post-processing quads. 16 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    /// Position in pixels, y down.
    pub position: [f32; 2],
    /// Texture coordinate.
    pub tex_coord: [f32; 2],
}

/// How the fragment stage combines the tint with the texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TintMode {
    /// Texel times tint.
    #[default]
    Multiply,
    /// Tint color, texel alpha.
    Fill,
    /// Tint color and alpha, texel ignored.
    Solid,
}

impl TintMode {
    /// The value the shader compares `outTintEffect` against.
    pub fn as_f32(self) -> f32 {
        match self {
            TintMode::Multiply => 0.0,
            TintMode::Fill => 1.0,
            TintMode::Solid => 2.0,
        }
    }
}

/// Texture coordinates of a quad's top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    /// Left.
    pub u0: f32,
    /// Top.
    pub v0: f32,
    /// Right.
    pub u1: f32,
    /// Bottom.
    pub v1: f32,
}

impl UvRect {
    /// The whole texture.
    pub const FULL: UvRect = UvRect {
        u0: 0.0,
        v0: 0.0,
        u1: 1.0,
        v1: 1.0,
    };
}

/// A packed tint per corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadTint {
    /// Top-left corner.
    pub top_left: u32,
    /// Top-right corner.
    pub top_right: u32,
    /// Bottom-left corner.
    pub bottom_left: u32,
    /// Bottom-right corner.
    pub bottom_right: u32,
}

impl QuadTint {
    /// Opaque white, which leaves texels unchanged.
    pub const WHITE: QuadTint = QuadTint::uniform(0xFFFF_FFFF);

    /// The same packed tint on all four corners.
    pub const fn uniform(packed: u32) -> Self {
        Self {
            top_left: packed,
            top_right: packed,
            bottom_left: packed,
            bottom_right: packed,
        }
    }
}

/// Four corners in render space, ready to batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    /// Top-left corner.
    pub top_left: Vec2,
    /// Bottom-left corner.
    pub bottom_left: Vec2,
    /// Bottom-right corner.
    pub bottom_right: Vec2,
    /// Top-right corner.
    pub top_right: Vec2,
    /// Texture coordinates.
    pub uv: UvRect,
    /// Per-corner tints.
    pub tint: QuadTint,
    /// How the tint is applied.
    pub tint_mode: TintMode,
}

impl Quad {
    /// An axis-aligned rectangle with the full texture and no tint.
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            top_left: Vec2::new(rect.x, rect.y),
            bottom_left: Vec2::new(rect.x, rect.bottom()),
            bottom_right: Vec2::new(rect.right(), rect.bottom()),
            top_right: Vec2::new(rect.right(), rect.y),
            uv: UvRect::FULL,
            tint: QuadTint::WHITE,
            tint_mode: TintMode::Multiply,
        }
    }

    fn vertices(&self, unit: u32) -> [SpriteVertex; 6] {
        let tex_id = unit as f32;
        let tint_effect = self.tint_mode.as_f32();
        let vertex = |p: Vec2, u: f32, v: f32, tint: u32| SpriteVertex {
            position: p.into(),
            tex_coord: [u, v],
            tex_id,
            tint_effect,
            tint,
        };
        let UvRect { u0, v0, u1, v1 } = self.uv;
        let tl = vertex(self.top_left, u0, v0, self.tint.top_left);
        let bl = vertex(self.bottom_left, u0, v1, self.tint.bottom_left);
        let br = vertex(self.bottom_right, u1, v1, self.tint.bottom_right);
        let tr = vertex(self.top_right, u1, v0, self.tint.top_right);
        [tl, bl, br, tl, br, tr]
    }
}

/// What the camera contributes to every sprite it renders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    /// The camera matrix, see `Camera::view_matrix` in the agents crate.
    pub matrix: TransformMatrix,
    /// The camera scroll in world units.
    pub scroll: Vec2,
    /// Multiplied into every tint alpha.
    pub alpha: f32,
    /// Snap vertex positions to whole pixels.
    pub round_pixels: bool,
}

impl Default for CameraView {
    fn default() -> Self {
        Self {
            matrix: TransformMatrix::IDENTITY,
            scroll: Vec2::ZERO,
            alpha: 1.0,
            round_pixels: false,
        }
    }
}

impl CameraView {
    /// The transform of world-space geometry that scrolls with the camera.
    pub fn shape_matrix(&self) -> TransformMatrix {
        self.matrix
            .multiply(&TransformMatrix::from_itrs(-self.scroll, 0.0, Vec2::ONE))
    }
}

/// A textured sprite in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureDraw {
    /// The texture to sample.
    pub texture: TextureId,
    /// The texture size in pixels, to turn the frame into texture coordinates.
    pub texture_size: Extent2D,
    /// The region of the texture to draw, in pixels.
    pub frame: Rect,
    /// World position of the origin.
    pub position: Vec2,
    /// Rotation in radians.
    pub rotation: f32,
    /// Scale.
    pub scale: Vec2,
    /// Normalized origin within the frame. `(0.5, 0.5)` is the center.
    pub origin: Vec2,
    /// How much the camera scroll moves the sprite.
    pub scroll_factor: Vec2,
    /// Mirror horizontally.
    pub flip_x: bool,
    /// Mirror vertically.
    pub flip_y: bool,
    /// `0xRRGGBB` tints: top-left, top-right, bottom-left, bottom-right.
    pub tint: [u32; 4],
    /// Alphas in the same corner order.
    pub alpha: [f32; 4],
    /// How the tint is applied.
    pub tint_mode: TintMode,
    /// The world transform of a parent container.
    pub parent: Option<TransformMatrix>,
    /// The texture is a render target, stored bottom-up.
    pub render_target_source: bool,
}

impl TextureDraw {
    /// Draws the whole texture at the origin with default settings.
    pub fn new(texture: TextureId, texture_size: Extent2D) -> Self {
        Self {
            texture,
            texture_size,
            frame: Rect::new(
                0.0,
                0.0,
                texture_size.width as f32,
                texture_size.height as f32,
            ),
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            origin: Vec2::HALF,
            scroll_factor: Vec2::ONE,
            flip_x: false,
            flip_y: false,
            tint: [0xFF_FF_FF; 4],
            alpha: [1.0; 4],
            tint_mode: TintMode::Multiply,
            parent: None,
            render_target_source: false,
        }
    }

    /// The full world-to-render transform of the sprite.
    pub fn world_matrix(&self, camera: &CameraView) -> TransformMatrix {
        let mut sprite = TransformMatrix::from_itrs(self.position, self.rotation, self.scale);
        let scroll = camera.scroll.mul_components(self.scroll_factor);
        match &self.parent {
            Some(parent) => camera
                .matrix
                .multiply_with_offset(parent, -scroll)
                .multiply(&sprite),
            None => {
                sprite.e -= scroll.x;
                sprite.f -= scroll.y;
                camera.matrix.multiply(&sprite)
            }
        }
    }

    /// Projects the sprite through the camera into a render-space quad.
    pub fn to_quad(&self, camera: &CameraView) -> Quad {
        let matrix = self.world_matrix(camera);
        let frame = self.frame;
        let x = -self.origin.x * frame.width;
        let y = -self.origin.y * frame.height;
        let (xw, yh) = (x + frame.width, y + frame.height);

        let corner = |px: f32, py: f32| {
            let p = matrix.transform_point(Vec2::new(px, py));
            if camera.round_pixels {
                p.round()
            } else {
                p
            }
        };

        let tw = self.texture_size.width.max(1) as f32;
        let th = self.texture_size.height.max(1) as f32;
        let mut uv = UvRect {
            u0: frame.x / tw,
            v0: frame.y / th,
            u1: frame.right() / tw,
            v1: frame.bottom() / th,
        };
        if self.render_target_source {
            uv.v0 = 1.0 - uv.v0;
            uv.v1 = 1.0 - uv.v1;
        }
        if self.flip_x {
            std::mem::swap(&mut uv.u0, &mut uv.u1);
        }
        if self.flip_y {
            std::mem::swap(&mut uv.v0, &mut uv.v1);
        }

        let tint = |i: usize| pack_tint(self.tint[i], self.alpha[i] * camera.alpha);
        Quad {
            top_left: corner(x, y),
            bottom_left: corner(x, yh),
            bottom_right: corner(xw, yh),
            top_right: corner(xw, y),
            uv,
            tint: QuadTint {
                top_left: tint(0),
                top_right: tint(1),
                bottom_left: tint(2),
                bottom_right: tint(3),
            },
            tint_mode: self.tint_mode,
        }
    }
}

fn check_stride<T>(pipeline: &Pipeline) -> Result<(), ResourceError> {
    let stride = pipeline.layout().stride() as usize;
    if stride != std::mem::size_of::<T>() {
        return Err(PipelineError::InvalidLayout(format!(
            "pipeline '{}' has a {stride}-byte vertex, {} expected",
            pipeline.name(),
            std::mem::size_of::<T>()
        ))
        .into());
    }
    Ok(())
}

/// Appends one quad as two triangles.
///
/// Returns `false` if the pipeline is not ready and the quad was dropped.
pub fn batch_quad(
    pipeline: &mut Pipeline,
    state: &mut GpuStateCache,
    quad: &Quad,
    texture: TextureId,
) -> Result<bool, ResourceError> {
    check_stride::<SpriteVertex>(pipeline)?;
    let Some(unit) = pipeline.reserve(state, 6, Some(texture))? else {
        return Ok(false);
    };
    pipeline.push(&quad.vertices(unit))?;
    Ok(true)
}

/// Projects a sprite through the camera and appends it.
pub fn batch_texture(
    pipeline: &mut Pipeline,
    state: &mut GpuStateCache,
    draw: &TextureDraw,
    camera: &CameraView,
) -> Result<bool, ResourceError> {
    batch_quad(pipeline, state, &draw.to_quad(camera), draw.texture)
}

/// Appends arbitrary triangle-list geometry sampling one texture.
///
/// The `tex_id` of every vertex is overwritten with the unit the texture
/// lands on. Geometry larger than the whole buffer is split on primitive
/// boundaries, one flush per full buffer.
pub fn batch_vertices(
    pipeline: &mut Pipeline,
    state: &mut GpuStateCache,
    vertices: &[SpriteVertex],
    texture: Option<TextureId>,
) -> Result<bool, ResourceError> {
    check_stride::<SpriteVertex>(pipeline)?;
    let primitive = pipeline.descriptor().topology.primitive_size();
    if vertices.len() % primitive != 0 {
        return Err(PipelineError::InvalidLayout(format!(
            "{} vertices do not form whole primitives of {primitive}",
            vertices.len()
        ))
        .into());
    }
    let chunk_size = pipeline.vertex_capacity() - pipeline.vertex_capacity() % primitive;
    if chunk_size == 0 {
        return Err(PipelineError::BatchTooLarge {
            pipeline: pipeline.name().to_string(),
            requested: primitive,
            capacity: pipeline.vertex_capacity(),
        }
        .into());
    }

    let mut scratch = Vec::with_capacity(vertices.len().min(chunk_size));
    for chunk in vertices.chunks(chunk_size) {
        let Some(unit) = pipeline.reserve(state, chunk.len(), texture)? else {
            return Ok(false);
        };
        scratch.clear();
        scratch.extend(chunk.iter().map(|v| SpriteVertex {
            tex_id: unit as f32,
            ..*v
        }));
        pipeline.push(&scratch)?;
    }
    Ok(true)
}

/// Appends an axis-aligned rectangle in a solid color.
pub fn batch_fill_rect(
    pipeline: &mut Pipeline,
    state: &mut GpuStateCache,
    matrix: &TransformMatrix,
    rect: Rect,
    tint: u32,
) -> Result<bool, ResourceError> {
    let corners = [
        Vec2::new(rect.x, rect.y),
        Vec2::new(rect.x, rect.bottom()),
        Vec2::new(rect.right(), rect.bottom()),
        Vec2::new(rect.right(), rect.y),
    ]
    .map(|p| matrix.transform_point(p));
    batch_vertices(pipeline, state, &solid_quad(corners, tint).vertices(0), None)
}

/// Appends one triangle in a solid color.
pub fn batch_fill_triangle(
    pipeline: &mut Pipeline,
    state: &mut GpuStateCache,
    matrix: &TransformMatrix,
    points: [Vec2; 3],
    tint: u32,
) -> Result<bool, ResourceError> {
    let vertices = points.map(|p| solid_vertex(matrix.transform_point(p), tint));
    batch_vertices(pipeline, state, &vertices, None)
}

/// Appends the outline of a triangle as a closed stroke.
pub fn batch_stroke_triangle(
    pipeline: &mut Pipeline,
    state: &mut GpuStateCache,
    matrix: &TransformMatrix,
    points: [Vec2; 3],
    thickness: f32,
    tint: u32,
) -> Result<bool, ResourceError> {
    batch_stroke_path(pipeline, state, matrix, &points, thickness, true, tint)
}

/// Appends a line `thickness` pixels wide as one quad.
pub fn batch_line(
    pipeline: &mut Pipeline,
    state: &mut GpuStateCache,
    matrix: &TransformMatrix,
    from: Vec2,
    to: Vec2,
    thickness: f32,
    tint: u32,
) -> Result<bool, ResourceError> {
    let Some(corners) = line_corners(from, to, thickness * 0.5) else {
        return Ok(true);
    };
    let corners = corners.map(|p| matrix.transform_point(p));
    batch_vertices(pipeline, state, &solid_quad(corners, tint).vertices(0), None)
}

/// Fills a simple polygon by ear clipping.
///
/// Either winding is accepted. A repeated closing point is ignored. The
/// clipping stops early on self-intersecting outlines, so only part of such
/// a polygon is drawn.
pub fn batch_fill_path(
    pipeline: &mut Pipeline,
    state: &mut GpuStateCache,
    matrix: &TransformMatrix,
    points: &[Vec2],
    tint: u32,
) -> Result<bool, ResourceError> {
    let points = match points {
        [first, .., last] if points.len() > 3 && first == last => &points[..points.len() - 1],
        _ => points,
    };
    let triangles = triangulate(points);
    let mut vertices = Vec::with_capacity(triangles.len() * 3);
    for triangle in triangles {
        vertices.extend(triangle.map(|i| solid_vertex(matrix.transform_point(points[i]), tint)));
    }
    if vertices.is_empty() {
        return Ok(true);
    }
    batch_vertices(pipeline, state, &vertices, None)
}

/// Strokes a polyline, one quad per segment.
///
/// Lines thicker than two pixels get a join quad between consecutive
/// segments. A `closed` path also connects the last point to the first.
/// Zero-length segments are skipped.
pub fn batch_stroke_path(
    pipeline: &mut Pipeline,
    state: &mut GpuStateCache,
    matrix: &TransformMatrix,
    points: &[Vec2],
    thickness: f32,
    closed: bool,
    tint: u32,
) -> Result<bool, ResourceError> {
    let mut path = points.to_vec();
    if closed && points.len() > 2 && points.first() != points.last() {
        path.push(points[0]);
    }
    let joins = thickness > 2.0;
    let mut quads = Vec::with_capacity(path.len() * 2);
    let mut first: Option<[Vec2; 4]> = None;
    let mut previous: Option<[Vec2; 4]> = None;
    for segment in path.windows(2) {
        let Some(corners) = line_corners(segment[0], segment[1], thickness * 0.5) else {
            continue;
        };
        let [tl, bl, br, tr] = corners.map(|p| matrix.transform_point(p));
        quads.push([tl, bl, br, tr]);
        if joins {
            if let Some([_, _, prev_br, prev_tr]) = previous {
                quads.push([tl, bl, prev_br, prev_tr]);
            }
        }
        first.get_or_insert([tl, bl, br, tr]);
        previous = Some([tl, bl, br, tr]);
    }
    if joins && closed && quads.len() > 1 {
        if let (Some([first_tl, first_bl, _, _]), Some([_, _, br, tr])) = (first, previous) {
            quads.push([br, tr, first_tl, first_bl]);
        }
    }
    if quads.is_empty() {
        return Ok(true);
    }
    let vertices: Vec<SpriteVertex> = quads
        .into_iter()
        .flat_map(|corners| solid_quad(corners, tint).vertices(0))
        .collect();
    batch_vertices(pipeline, state, &vertices, None)
}

fn solid_vertex(position: Vec2, tint: u32) -> SpriteVertex {
    SpriteVertex {
        position: position.into(),
        tint_effect: TintMode::Solid.as_f32(),
        tint,
        ..Default::default()
    }
}

/// Corners in `[top_left, bottom_left, bottom_right, top_right]` order.
fn solid_quad(corners: [Vec2; 4], tint: u32) -> Quad {
    let [top_left, bottom_left, bottom_right, top_right] = corners;
    Quad {
        top_left,
        bottom_left,
        bottom_right,
        top_right,
        uv: UvRect::FULL,
        tint: QuadTint::uniform(tint),
        tint_mode: TintMode::Solid,
    }
}

/// The four corners of a segment widened by `half` on each side, or `None`
/// for a zero-length segment.
fn line_corners(from: Vec2, to: Vec2, half: f32) -> Option<[Vec2; 4]> {
    let delta = to - from;
    let length = delta.dot(delta).sqrt();
    if length <= f32::EPSILON {
        return None;
    }
    let normal = Vec2::new(delta.y, -delta.x) * (half / length);
    Some([from + normal, from - normal, to - normal, to + normal])
}

fn cross(o: Vec2, a: Vec2, b: Vec2) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn signed_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let (p, q) = (points[i], points[(i + 1) % n]);
            p.x * q.y - q.x * p.y
        })
        .sum::<f32>()
        * 0.5
}

/// Ear-clipping triangulation of a simple polygon, as index triples.
fn triangulate(points: &[Vec2]) -> Vec<[usize; 3]> {
    if points.len() < 3 {
        return Vec::new();
    }
    let mut remaining: Vec<usize> = if signed_area(points) >= 0.0 {
        (0..points.len()).collect()
    } else {
        (0..points.len()).rev().collect()
    };
    let mut triangles = Vec::with_capacity(points.len() - 2);
    let (mut i, mut misses) = (0, 0);
    while remaining.len() > 3 {
        let len = remaining.len();
        let (prev, cur, next) = (
            remaining[(i + len - 1) % len],
            remaining[i],
            remaining[(i + 1) % len],
        );
        if is_ear(points, &remaining, prev, cur, next) {
            triangles.push([prev, cur, next]);
            remaining.remove(i);
            if i >= remaining.len() {
                i = 0;
            }
            misses = 0;
        } else {
            misses += 1;
            if misses > len {
                log::debug!("Polygon is not simple, {} points left unfilled", len);
                return triangles;
            }
            i = (i + 1) % len;
        }
    }
    triangles.push([remaining[0], remaining[1], remaining[2]]);
    triangles
}

fn is_ear(points: &[Vec2], remaining: &[usize], prev: usize, cur: usize, next: usize) -> bool {
    let (a, b, c) = (points[prev], points[cur], points[next]);
    if cross(a, b, c) <= 0.0 {
        return false;
    }
    remaining
        .iter()
        .filter(|&&j| j != prev && j != cur && j != next)
        .map(|&j| points[j])
        .all(|p| cross(a, b, p) < 0.0 || cross(b, c, p) < 0.0 || cross(c, a, p) < 0.0)
}

/// Draws `source` over the whole `size` surface with a post-processing pipeline.
///
/// The source is a render target, so it is sampled bottom-up. The pass is
/// flushed immediately.
pub fn draw_post_pass(
    pipeline: &mut Pipeline,
    state: &mut GpuStateCache,
    source: TextureId,
    size: Extent2D,
) -> Result<bool, ResourceError> {
    check_stride::<QuadVertex>(pipeline)?;
    if pipeline.reserve(state, 6, Some(source))?.is_none() {
        return Ok(false);
    }
    let (w, h) = (size.width as f32, size.height as f32);
    let tl = QuadVertex {
        position: [0.0, 0.0],
        tex_coord: [0.0, 1.0],
    };
    let bl = QuadVertex {
        position: [0.0, h],
        tex_coord: [0.0, 0.0],
    };
    let br = QuadVertex {
        position: [w, h],
        tex_coord: [1.0, 0.0],
    };
    let tr = QuadVertex {
        position: [w, 0.0],
        tex_coord: [1.0, 1.0],
    };
    pipeline.push(&[tl, bl, br, tl, br, tr])?;
    pipeline.flush(state, FlushReason::PassBoundary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::{copy_fx_descriptor, multi_pipeline_descriptor};
    use prism_core::math::approx_eq;
    use prism_core::renderer::{FilterMode, GraphicsDevice, TextureDescriptor};
    use prism_infra::RecordingDevice;
    use std::borrow::Cow;
    use std::sync::Arc;

    fn setup(units: u32, batch_size: usize) -> (RecordingDevice, GpuStateCache, Pipeline) {
        let device = RecordingDevice::with_texture_units(units);
        let mut state = GpuStateCache::new(Arc::new(device.clone()));
        let descriptor = multi_pipeline_descriptor(batch_size, units).expect("descriptor");
        let mut pipeline = Pipeline::new(&mut state, descriptor, Vec::new()).expect("pipeline");
        pipeline.set_projection(800, 600);
        (device, state, pipeline)
    }

    fn texture(device: &RecordingDevice) -> TextureId {
        device
            .create_texture(
                &TextureDescriptor {
                    label: Some(Cow::Borrowed("t")),
                    size: Extent2D::new(64, 32),
                    filter: FilterMode::Linear,
                    render_target: false,
                },
                None,
            )
            .expect("texture")
    }

    fn close(a: Vec2, x: f32, y: f32) -> bool {
        approx_eq(a.x, x) && approx_eq(a.y, y)
    }

    fn sprite(texture: TextureId) -> TextureDraw {
        TextureDraw {
            frame: Rect::new(0.0, 0.0, 10.0, 20.0),
            position: Vec2::new(100.0, 50.0),
            ..TextureDraw::new(texture, Extent2D::new(64, 32))
        }
    }

    #[test]
    fn sprite_vertex_is_28_bytes() {
        assert_eq!(std::mem::size_of::<SpriteVertex>(), 28);
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
    }

    #[test]
    fn quad_vertex_order_is_tl_bl_br_tl_br_tr() {
        let quad = Quad::from_rect(Rect::new(0.0, 0.0, 2.0, 4.0));
        let v = quad.vertices(3);
        let positions: Vec<[f32; 2]> = v.iter().map(|v| v.position).collect();
        assert_eq!(
            positions,
            vec![[0.0, 0.0], [0.0, 4.0], [2.0, 4.0], [0.0, 0.0], [2.0, 4.0], [2.0, 0.0]]
        );
        assert!(v.iter().all(|v| v.tex_id == 3.0));
        assert_eq!(v[5].tex_coord, [1.0, 0.0]);
    }

    #[test]
    fn origin_centers_the_frame_on_the_position() {
        let quad = sprite(TextureId(1)).to_quad(&CameraView::default());
        assert!(close(quad.top_left, 95.0, 40.0));
        assert!(close(quad.bottom_right, 105.0, 60.0));
        assert!(approx_eq(quad.uv.u1, 10.0 / 64.0));
        assert!(approx_eq(quad.uv.v1, 20.0 / 32.0));
    }

    #[test]
    fn scroll_respects_the_scroll_factor() {
        let camera = CameraView {
            scroll: Vec2::new(10.0, 0.0),
            ..Default::default()
        };
        let scrolled = sprite(TextureId(1)).to_quad(&camera);
        assert!(close(scrolled.top_left, 85.0, 40.0));

        let pinned = TextureDraw {
            scroll_factor: Vec2::ZERO,
            ..sprite(TextureId(1))
        };
        assert!(close(pinned.to_quad(&camera).top_left, 95.0, 40.0));
    }

    #[test]
    fn parent_transform_is_applied_with_the_scroll() {
        let camera = CameraView {
            scroll: Vec2::new(10.0, 0.0),
            ..Default::default()
        };
        let child = TextureDraw {
            parent: Some(TransformMatrix::from_itrs(
                Vec2::new(5.0, 5.0),
                0.0,
                Vec2::ONE,
            )),
            ..sprite(TextureId(1))
        };
        assert!(close(child.to_quad(&camera).top_left, 90.0, 45.0));
    }

    #[test]
    fn flips_and_render_targets_swap_texture_coordinates() {
        let mut draw = TextureDraw::new(TextureId(1), Extent2D::new(4, 4));
        draw.flip_x = true;
        let uv = draw.to_quad(&CameraView::default()).uv;
        assert_eq!((uv.u0, uv.u1), (1.0, 0.0));

        let target = TextureDraw {
            render_target_source: true,
            ..TextureDraw::new(TextureId(1), Extent2D::new(4, 4))
        };
        let uv = target.to_quad(&CameraView::default()).uv;
        assert_eq!((uv.v0, uv.v1), (1.0, 0.0));
    }

    #[test]
    fn camera_alpha_and_rounding() {
        let camera = CameraView {
            alpha: 0.5,
            round_pixels: true,
            ..Default::default()
        };
        let draw = TextureDraw {
            position: Vec2::new(10.3, 10.6),
            ..sprite(TextureId(1))
        };
        let quad = draw.to_quad(&camera);
        assert_eq!(quad.tint.top_left >> 24, 128);
        assert_eq!(quad.top_left, Vec2::new(5.0, 1.0));
    }

    #[test]
    fn overflow_flushes_once_and_keeps_every_vertex() {
        let (device, mut state, mut pipeline) = setup(8, 4);
        let tex = texture(&device);
        for _ in 0..5 {
            batch_texture(&mut pipeline, &mut state, &sprite(tex), &CameraView::default())
                .expect("batch");
        }
        assert_eq!(state.stats().flushes(FlushReason::VertexCapacity), 1);
        pipeline.flush(&mut state, FlushReason::Explicit).expect("flush");
        let counts: Vec<u32> = device.draw_calls().iter().map(|c| c.count).collect();
        assert_eq!(counts, vec![24, 6]);
    }

    #[test]
    fn textures_share_one_draw_on_distinct_units() {
        let (device, mut state, mut pipeline) = setup(8, 16);
        let (a, b) = (texture(&device), texture(&device));
        for tex in [a, b, a] {
            batch_texture(&mut pipeline, &mut state, &sprite(tex), &CameraView::default())
                .expect("batch");
        }
        pipeline.flush(&mut state, FlushReason::Explicit).expect("flush");
        let calls = device.draw_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].texture_on_unit(0), Some(a));
        assert_eq!(calls[0].texture_on_unit(1), Some(b));
        let ids: Vec<f32> = calls[0]
            .vertices()
            .map(|v| bytemuck::pod_read_unaligned::<SpriteVertex>(v).tex_id)
            .step_by(6)
            .collect();
        assert_eq!(ids, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn large_geometry_is_split_on_triangles() {
        let (device, mut state, mut pipeline) = setup(8, 1);
        let tex = texture(&device);
        let tris = vec![SpriteVertex::default(); 15];
        batch_vertices(&mut pipeline, &mut state, &tris, Some(tex)).expect("batch");
        pipeline.flush(&mut state, FlushReason::Explicit).expect("flush");
        let counts: Vec<u32> = device.draw_calls().iter().map(|c| c.count).collect();
        assert_eq!(counts, vec![6, 6, 3]);
        assert!(batch_vertices(&mut pipeline, &mut state, &tris[..4], Some(tex)).is_err());
    }

    fn solid_vertices(device: &RecordingDevice) -> Vec<SpriteVertex> {
        device
            .draw_calls()
            .iter()
            .flat_map(|c| {
                c.vertices()
                    .map(|v| bytemuck::pod_read_unaligned::<SpriteVertex>(v))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn triangle_area(v: &[SpriteVertex]) -> f32 {
        let (a, b, c) = (
            Vec2::from(v[0].position),
            Vec2::from(v[1].position),
            Vec2::from(v[2].position),
        );
        (cross(a, b, c) * 0.5).abs()
    }

    #[test]
    fn fill_rect_is_one_solid_quad() {
        let (device, mut state, mut pipeline) = setup(8, 16);
        let matrix = TransformMatrix::from_itrs(Vec2::new(10.0, 0.0), 0.0, Vec2::ONE);
        let tint = pack_tint(0xFF0000, 1.0);
        assert!(batch_fill_rect(
            &mut pipeline,
            &mut state,
            &matrix,
            Rect::new(0.0, 0.0, 4.0, 2.0),
            tint
        )
        .expect("rect"));
        pipeline.flush(&mut state, FlushReason::Explicit).expect("flush");
        let v = solid_vertices(&device);
        assert_eq!(v.len(), 6);
        assert_eq!(v[0].position, [10.0, 0.0]);
        assert_eq!(v[2].position, [14.0, 2.0]);
        assert!(v.iter().all(|v| v.tint == tint && v.tint_effect == 2.0));
        assert!(device.draw_calls()[0].textures.is_empty());
    }

    #[test]
    fn fill_triangle_shares_the_batch_with_sprites() {
        let (device, mut state, mut pipeline) = setup(8, 16);
        let tex = texture(&device);
        batch_texture(&mut pipeline, &mut state, &sprite(tex), &CameraView::default())
            .expect("sprite");
        let points = [Vec2::ZERO, Vec2::new(0.0, 8.0), Vec2::new(8.0, 8.0)];
        batch_fill_triangle(
            &mut pipeline,
            &mut state,
            &TransformMatrix::IDENTITY,
            points,
            pack_tint(0x00FF00, 1.0),
        )
        .expect("triangle");
        pipeline.flush(&mut state, FlushReason::Explicit).expect("flush");
        let counts: Vec<u32> = device.draw_calls().iter().map(|c| c.count).collect();
        assert_eq!(counts, vec![9]);
        let v = solid_vertices(&device);
        assert_eq!(v[7].position, [0.0, 8.0]);
        assert_eq!(v[8].tint_effect, TintMode::Solid.as_f32());
    }

    #[test]
    fn line_is_widened_around_its_axis() {
        let (device, mut state, mut pipeline) = setup(8, 16);
        batch_line(
            &mut pipeline,
            &mut state,
            &TransformMatrix::IDENTITY,
            Vec2::new(0.0, 5.0),
            Vec2::new(10.0, 5.0),
            4.0,
            0xFFFF_FFFF,
        )
        .expect("line");
        // Zero-length lines draw nothing.
        batch_line(
            &mut pipeline,
            &mut state,
            &TransformMatrix::IDENTITY,
            Vec2::ONE,
            Vec2::ONE,
            4.0,
            0xFFFF_FFFF,
        )
        .expect("dot");
        pipeline.flush(&mut state, FlushReason::Explicit).expect("flush");
        let v = solid_vertices(&device);
        assert_eq!(v.len(), 6);
        let mut ys: Vec<f32> = v.iter().map(|v| v.position[1]).collect();
        ys.sort_by(f32::total_cmp);
        assert!(approx_eq(ys[0], 3.0) && approx_eq(ys[5], 7.0));
        assert!(approx_eq(triangle_area(&v[0..3]) + triangle_area(&v[3..6]), 40.0));
    }

    #[test]
    fn fill_path_covers_a_concave_polygon() {
        let (device, mut state, mut pipeline) = setup(8, 16);
        // An L shape of area 3, clockwise on screen, with a repeated closing point.
        let l_shape = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(0.0, 2.0),
            Vec2::new(0.0, 0.0),
        ];
        batch_fill_path(
            &mut pipeline,
            &mut state,
            &TransformMatrix::IDENTITY,
            &l_shape,
            0xFFFF_FFFF,
        )
        .expect("path");
        pipeline.flush(&mut state, FlushReason::Explicit).expect("flush");
        let v = solid_vertices(&device);
        assert_eq!(v.len(), 12);
        let area: f32 = v.chunks(3).map(triangle_area).sum();
        assert!(approx_eq(area, 3.0));

        let mut reversed = l_shape;
        reversed.reverse();
        assert_eq!(triangulate(&reversed[..6]).len(), 4);
        assert!(triangulate(&l_shape[..2]).is_empty());
    }

    #[test]
    fn stroke_path_adds_joins_on_thick_lines() {
        let (device, mut state, mut pipeline) = setup(8, 64);
        let square = [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ];
        let identity = TransformMatrix::IDENTITY;
        batch_stroke_path(&mut pipeline, &mut state, &identity, &square, 1.0, false, 0)
            .expect("thin open");
        pipeline.flush(&mut state, FlushReason::Explicit).expect("flush");
        batch_stroke_path(&mut pipeline, &mut state, &identity, &square, 4.0, true, 0)
            .expect("thick closed");
        pipeline.flush(&mut state, FlushReason::Explicit).expect("flush");
        batch_stroke_triangle(
            &mut pipeline,
            &mut state,
            &identity,
            [square[0], square[1], square[2]],
            1.0,
            0,
        )
        .expect("triangle");
        pipeline.flush(&mut state, FlushReason::Explicit).expect("flush");

        let counts: Vec<u32> = device.draw_calls().iter().map(|c| c.count).collect();
        // 3 segments; 4 segments + 3 joins + 1 closing join; 3 segments.
        assert_eq!(counts, vec![18, 48, 18]);
    }

    #[test]
    fn long_strokes_split_across_flushes() {
        let (device, mut state, mut pipeline) = setup(8, 2);
        let zigzag: Vec<Vec2> = (0..6)
            .map(|i| Vec2::new(i as f32 * 10.0, (i % 2) as f32 * 10.0))
            .collect();
        batch_stroke_path(
            &mut pipeline,
            &mut state,
            &TransformMatrix::IDENTITY,
            &zigzag,
            1.0,
            false,
            0,
        )
        .expect("stroke");
        pipeline.flush(&mut state, FlushReason::Explicit).expect("flush");
        let counts: Vec<u32> = device.draw_calls().iter().map(|c| c.count).collect();
        assert_eq!(counts, vec![12, 12, 6]);
        assert_eq!(state.stats().flushes(FlushReason::VertexCapacity), 2);
    }

    #[test]
    fn shape_matrix_follows_the_scroll() {
        let camera = CameraView {
            scroll: Vec2::new(5.0, 2.0),
            ..Default::default()
        };
        let p = camera.shape_matrix().transform_point(Vec2::new(10.0, 10.0));
        assert!(close(p, 5.0, 8.0));
    }

    #[test]
    fn post_pass_draws_one_flipped_quad() {
        let device = RecordingDevice::default();
        let mut state = GpuStateCache::new(Arc::new(device.clone()));
        let mut pipeline =
            Pipeline::new(&mut state, copy_fx_descriptor().expect("descriptor"), Vec::new())
                .expect("pipeline");
        pipeline.set_projection(32, 32);
        let source = texture(&device);
        assert!(
            draw_post_pass(&mut pipeline, &mut state, source, Extent2D::new(32, 32))
                .expect("pass")
        );
        let calls = device.draw_calls();
        assert_eq!(calls.len(), 1);
        let first: QuadVertex = bytemuck::pod_read_unaligned(&calls[0].vertex_data[..16]);
        assert_eq!(first.tex_coord, [0.0, 1.0]);
        assert_eq!(state.stats().flushes(FlushReason::PassBoundary), 1);
    }

    #[test]
    fn sprite_pipelines_reject_foreign_vertex_sizes() {
        let device = RecordingDevice::default();
        let mut state = GpuStateCache::new(Arc::new(device.clone()));
        let mut post =
            Pipeline::new(&mut state, copy_fx_descriptor().expect("descriptor"), Vec::new())
                .expect("pipeline");
        let quad = Quad::from_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
        assert!(batch_quad(&mut post, &mut state, &quad, texture(&device)).is_err());
    }
}
