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

//! Integration tests for batching: flush triggers, texture units, pipeline
//! selection, draw order and culling, observed through a RecordingDevice.

use prism_agents::render_agent::{
    BatchContext, BitmapFont, BitmapText, Camera, DisplayList, Renderable, Renderer, Sprite,
};
use prism_core::math::{pack_tint, Rect, Vec2};
use prism_core::renderer::{
    BlendMode, FilterMode, FlushReason, PipelineError, RenderError, RendererConfig,
    ResourceError, ShaderError, ShaderStage, TextureId, BITMAP_TEXT_PIPELINE, COPY_FX_PIPELINE,
    MULTI_PIPELINE, SINGLE_PIPELINE,
};
use prism_infra::graphics::headless::DrawCall;
use prism_infra::RecordingDevice;
use prism_lanes::render_lane::{copy_fx_descriptor, SpriteVertex, TintMode};
use std::borrow::Cow;
use std::sync::Arc;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Helper: a renderer over a fresh device with `batch_size` quads per batch.
fn setup(batch_size: usize, units: u32) -> (RecordingDevice, Renderer) {
    init_logs();
    let device = RecordingDevice::with_texture_units(units);
    let config = RendererConfig {
        batch_size,
        ..Default::default()
    };
    let renderer = Renderer::new(Arc::new(device.clone()), config).expect("renderer");
    (device, renderer)
}

fn texture(renderer: &mut Renderer, key: &str) -> TextureId {
    renderer
        .create_texture(key, 32, 32, FilterMode::Linear, None)
        .expect("texture")
}

fn sprite(key: &str, x: f32, y: f32) -> Sprite {
    Sprite::new(key, Rect::new(0.0, 0.0, 16.0, 16.0)).at(x, y)
}

fn vertices(call: &DrawCall) -> Vec<SpriteVertex> {
    call.vertices().map(bytemuck::pod_read_unaligned).collect()
}

/// Renders one frame of `scene` through the default camera and returns the
/// draw calls it issued.
fn draw_frame<S: prism_agents::render_agent::SceneSource + ?Sized>(
    device: &RecordingDevice,
    renderer: &mut Renderer,
    scene: &S,
) -> Vec<DrawCall> {
    device.clear_journal();
    renderer
        .render_frame(scene, &[Camera::default()])
        .expect("frame");
    device.draw_calls()
}

// ─────────────────────────────────────────────────────────────────────────────
// Flush triggers
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_single_batch_is_one_draw_call() {
    let (device, mut renderer) = setup(16, 8);
    texture(&mut renderer, "a");
    let scene: Vec<Sprite> = (0..5).map(|i| sprite("a", 20.0 * i as f32 + 10.0, 50.0)).collect();

    let draws = draw_frame(&device, &mut renderer, &scene[..]);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].count, 5 * 6);
    assert_eq!(draws[0].program_label, MULTI_PIPELINE);

    let stats = renderer.last_frame_stats();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.vertices, 30);
    assert_eq!(stats.flushes(FlushReason::VertexCapacity), 0);
}

#[test]
fn test_full_buffer_flushes_before_the_next_quad() {
    let (device, mut renderer) = setup(4, 8);
    texture(&mut renderer, "a");
    let scene: Vec<Sprite> = (0..5).map(|i| sprite("a", 20.0 * i as f32 + 10.0, 50.0)).collect();

    let draws = draw_frame(&device, &mut renderer, &scene[..]);
    let counts: Vec<u32> = draws.iter().map(|d| d.count).collect();
    assert_eq!(counts, [24, 6]);
    assert_eq!(
        renderer.last_frame_stats().flushes(FlushReason::VertexCapacity),
        1
    );
}

#[test]
fn test_texture_units_overflow_starts_a_new_batch() {
    // Batches of 4 quads, 2 texture units, textures A A B A A.
    let (device, mut renderer) = setup(4, 2);
    let a = texture(&mut renderer, "a");
    let b = texture(&mut renderer, "b");
    let scene = [
        sprite("a", 10.0, 10.0),
        sprite("a", 30.0, 10.0),
        sprite("b", 50.0, 10.0),
        sprite("a", 70.0, 10.0),
        sprite("a", 90.0, 10.0),
    ];

    let draws = draw_frame(&device, &mut renderer, &scene[..]);
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].count, 24);
    assert_eq!(draws[1].count, 6);
    for call in &draws {
        assert!(call.textures.len() <= 2);
    }
    assert_eq!(draws[0].texture_on_unit(0), Some(a));
    assert_eq!(draws[0].texture_on_unit(1), Some(b));
    assert_eq!(draws[1].texture_on_unit(0), Some(a));

    let first = vertices(&draws[0]);
    let units: Vec<f32> = first.chunks(6).map(|quad| quad[0].tex_id).collect();
    assert_eq!(units, [0.0, 0.0, 1.0, 0.0]);
    assert!(vertices(&draws[1]).iter().all(|v| v.tex_id == 0.0));
}

#[test]
fn test_third_texture_on_two_units_flushes() {
    let (device, mut renderer) = setup(64, 2);
    for key in ["a", "b", "c"] {
        texture(&mut renderer, key);
    }
    let scene = [sprite("a", 10.0, 10.0), sprite("b", 30.0, 10.0), sprite("c", 50.0, 10.0)];

    let draws = draw_frame(&device, &mut renderer, &scene[..]);
    let counts: Vec<u32> = draws.iter().map(|d| d.count).collect();
    assert_eq!(counts, [12, 6]);
    assert_eq!(
        renderer.last_frame_stats().flushes(FlushReason::TextureUnits),
        1
    );
}

#[test]
fn test_pipeline_switch_flushes_the_outgoing_pipeline() {
    let (device, mut renderer) = setup(64, 8);
    texture(&mut renderer, "a");
    let scene = [
        sprite("a", 10.0, 10.0),
        sprite("a", 30.0, 10.0).with_pipeline(SINGLE_PIPELINE),
        sprite("a", 50.0, 10.0),
    ];

    let draws = draw_frame(&device, &mut renderer, &scene[..]);
    let labels: Vec<&str> = draws.iter().map(|d| d.program_label.as_str()).collect();
    assert_eq!(labels, [MULTI_PIPELINE, SINGLE_PIPELINE, MULTI_PIPELINE]);
    assert_eq!(
        renderer.last_frame_stats().flushes(FlushReason::PipelineSwitch),
        2
    );
}

#[test]
fn test_blend_change_flushes() {
    let (device, mut renderer) = setup(64, 8);
    texture(&mut renderer, "a");
    let mut additive = sprite("a", 30.0, 10.0);
    additive.blend_mode = BlendMode::Add;
    let scene = [sprite("a", 10.0, 10.0), additive, sprite("a", 50.0, 10.0)];

    let draws = draw_frame(&device, &mut renderer, &scene[..]);
    assert_eq!(draws.len(), 3);
    assert_eq!(draws[0].blend, Some(BlendMode::Normal.state()));
    assert_eq!(draws[1].blend, Some(BlendMode::Add.state()));
    assert_eq!(
        renderer.last_frame_stats().flushes(FlushReason::BlendChange),
        2
    );
}

#[test]
fn test_explicit_flush_mid_frame() {
    let (device, mut renderer) = setup(64, 8);
    texture(&mut renderer, "a");
    let scene = [sprite("a", 10.0, 10.0)];
    device.clear_journal();

    renderer.pre_render().expect("pre");
    renderer.render(&scene[..], &Camera::default()).expect("render");
    // The camera pass already flushed, so this is a no-op.
    renderer.flush().expect("flush");
    let stats = renderer.post_render().expect("post");
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.flushes(FlushReason::Explicit), 0);
    assert_eq!(device.draw_calls().len(), 1);
}

#[test]
fn test_replacing_a_texture_flushes_pending_geometry_first() {
    let (device, mut renderer) = setup(64, 8);
    let old = texture(&mut renderer, "a");
    renderer
        .get_pipeline_mut(MULTI_PIPELINE)
        .expect("multi")
        .push(&[SpriteVertex::default(); 6])
        .expect("push");
    device.clear_journal();

    let new = texture(&mut renderer, "a");
    assert_ne!(old, new);
    let draws = device.draw_calls();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].count, 6);
    assert_eq!(renderer.stats().flushes(FlushReason::Explicit), 1);
    assert_eq!(device.texture_label(old), None);
}

// ─────────────────────────────────────────────────────────────────────────────
// Ordering
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_display_list_draws_in_depth_order() {
    let (device, mut renderer) = setup(64, 8);
    texture(&mut renderer, "a");
    let mut scene = DisplayList::new();
    scene.add(2.0, sprite("a", 300.0, 100.0));
    scene.add(0.0, sprite("a", 100.0, 100.0));
    scene.add(1.0, sprite("a", 200.0, 100.0));

    let draws = draw_frame(&device, &mut renderer, &scene);
    assert_eq!(draws.len(), 1);
    let xs: Vec<f32> = vertices(&draws[0])
        .chunks(6)
        .map(|quad| quad[0].position[0])
        .collect();
    assert_eq!(xs, [92.0, 192.0, 292.0]);
}

#[test]
fn test_order_survives_texture_flushes() {
    let (device, mut renderer) = setup(64, 1);
    texture(&mut renderer, "a");
    texture(&mut renderer, "b");
    let scene = [
        sprite("a", 10.0, 10.0),
        sprite("b", 30.0, 10.0),
        sprite("a", 50.0, 10.0),
    ];

    let draws = draw_frame(&device, &mut renderer, &scene[..]);
    let xs: Vec<f32> = draws
        .iter()
        .flat_map(|d| vertices(d).into_iter().step_by(6))
        .map(|v| v.position[0])
        .collect();
    assert_eq!(xs, [2.0, 22.0, 42.0]);
    assert_eq!(draws.len(), 3);
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline selection
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_pipeline_falls_back_to_default() {
    let (device, mut renderer) = setup(64, 8);
    texture(&mut renderer, "a");
    let scene = [
        sprite("a", 10.0, 10.0).with_pipeline("DoesNotExist"),
        sprite("a", 30.0, 10.0).with_pipeline(COPY_FX_PIPELINE),
    ];

    let draws = draw_frame(&device, &mut renderer, &scene[..]);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].program_label, MULTI_PIPELINE);
    assert_eq!(draws[0].count, 12);
}

#[test]
fn test_missing_default_pipeline_fails_the_pass() {
    init_logs();
    let device = RecordingDevice::default();
    let config = RendererConfig {
        default_pipeline: "Custom".to_string(),
        ..Default::default()
    };
    let mut renderer = Renderer::new(Arc::new(device), config).expect("renderer");
    renderer
        .create_texture("a", 8, 8, FilterMode::Nearest, None)
        .expect("texture");

    renderer.pre_render().expect("pre");
    let err = renderer
        .render(&[sprite("a", 10.0, 10.0)][..], &Camera::default())
        .unwrap_err();
    assert!(matches!(
        err,
        RenderError::ResourceError(ResourceError::Pipeline(PipelineError::NotFound(_)))
    ));
}

#[test]
fn test_duplicate_pipeline_is_rejected_by_default() {
    let (_device, mut renderer) = setup(64, 8);
    let err = renderer
        .add_pipeline(copy_fx_descriptor().expect("descriptor"))
        .unwrap_err();
    assert!(matches!(
        err,
        RenderError::ResourceError(ResourceError::Pipeline(PipelineError::Duplicate(_)))
    ));
    assert_eq!(renderer.pipelines().names().count(), 5);
}

#[test]
fn test_duplicate_pipeline_replaces_when_configured() {
    init_logs();
    let device = RecordingDevice::default();
    let config = RendererConfig {
        replace_duplicate_pipelines: true,
        ..Default::default()
    };
    let mut renderer = Renderer::new(Arc::new(device.clone()), config).expect("renderer");
    let before = renderer.pipelines().handle(COPY_FX_PIPELINE);
    let handle = renderer
        .add_pipeline(copy_fx_descriptor().expect("descriptor"))
        .expect("replace");

    assert_eq!(Some(handle), before);
    assert_eq!(renderer.pipelines().names().count(), 5);
    // The old program was destroyed, so only one CopyFX program is live.
    let copies = device
        .program_labels()
        .iter()
        .filter(|l| *l == COPY_FX_PIPELINE)
        .count();
    assert_eq!(copies, 1);
}

#[test]
fn test_broken_shader_is_reported_and_other_pipelines_keep_drawing() {
    let (device, mut renderer) = setup(64, 8);
    texture(&mut renderer, "a");
    let mut descriptor = copy_fx_descriptor().expect("descriptor");
    descriptor.name = "Broken".to_string();
    descriptor.fragment_source = Cow::Borrowed("#error missing include\nvoid main() {}");

    let err = renderer.add_pipeline(descriptor).unwrap_err();
    match err {
        RenderError::ResourceError(ResourceError::Shader(ShaderError::CompilationError {
            label,
            stage,
            log,
        })) => {
            assert_eq!(label, "Broken");
            assert_eq!(stage, ShaderStage::Fragment);
            assert!(log.contains("missing include"), "{log}");
        }
        other => panic!("expected a compilation error, got {other:?}"),
    }
    assert!(renderer.pipelines().handle("Broken").is_none());
    assert_eq!(renderer.pipelines().names().count(), 5);
    assert!(!device.program_labels().iter().any(|l| l == "Broken"));

    let scene = [sprite("a", 10.0, 10.0)];
    let draws = draw_frame(&device, &mut renderer, &scene[..]);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].program_label, MULTI_PIPELINE);
    assert_eq!(draws[0].count, 6);
}

/// A solid panel with an outline, drawn through the shape helpers.
struct Panel;

impl Renderable for Panel {
    fn batch(&self, ctx: &mut BatchContext<'_>) -> Result<(), ResourceError> {
        let white = pack_tint(0xFFFFFF, 1.0);
        ctx.fill_rect(Rect::new(20.0, 20.0, 40.0, 20.0), white)?;
        let corners = [
            Vec2::new(20.0, 20.0),
            Vec2::new(60.0, 20.0),
            Vec2::new(60.0, 40.0),
            Vec2::new(20.0, 40.0),
        ];
        ctx.stroke_path(&corners, 1.0, true, white)?;
        ctx.line(Vec2::new(20.0, 20.0), Vec2::new(60.0, 40.0), 1.0, white)?;
        ctx.fill_path(&corners[..3], white)?;
        Ok(())
    }
}

#[test]
fn test_shapes_batch_with_sprites_in_one_draw() {
    let (device, mut renderer) = setup(64, 8);
    texture(&mut renderer, "a");
    let mut scene = DisplayList::new();
    scene.add(0.0, sprite("a", 10.0, 10.0));
    scene.add(1.0, Panel);

    let draws = draw_frame(&device, &mut renderer, &scene);
    assert_eq!(draws.len(), 1);
    // Sprite, rect, 4 stroke segments, line, one filled triangle.
    assert_eq!(draws[0].count, 6 + 6 + 24 + 6 + 3);
    let solid = vertices(&draws[0])
        .iter()
        .filter(|v| v.tint_effect == TintMode::Solid.as_f32())
        .count();
    assert_eq!(solid, 39);
}

#[test]
fn test_bitmap_text_uses_its_own_pipeline() {
    let (device, mut renderer) = setup(64, 8);
    texture(&mut renderer, "a");
    renderer
        .create_texture("font", 64, 64, FilterMode::Nearest, None)
        .expect("font");
    let font = Arc::new(BitmapFont::monospace("font", 8.0, 8.0, 8, "ABCDEFGH"));
    let mut scene = DisplayList::new();
    scene.add(0.0, sprite("a", 10.0, 10.0));
    let mut text = BitmapText::new(font, "HEAD");
    text.position = prism_core::math::Vec2::new(100.0, 100.0);
    scene.add(1.0, text);

    let draws = draw_frame(&device, &mut renderer, &scene);
    let labels: Vec<&str> = draws.iter().map(|d| d.program_label.as_str()).collect();
    assert_eq!(labels, [MULTI_PIPELINE, BITMAP_TEXT_PIPELINE]);
    assert_eq!(draws[1].count, 4 * 6);
}

// ─────────────────────────────────────────────────────────────────────────────
// Cameras and culling
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_objects_outside_the_view_are_culled() {
    let (device, mut renderer) = setup(64, 8);
    texture(&mut renderer, "a");
    let mut hidden = sprite("a", 50.0, 50.0);
    hidden.visible = false;
    let mut filtered = sprite("a", 70.0, 50.0);
    filtered.camera_filter = 1;
    let scene = [
        sprite("a", 10.0, 10.0),
        sprite("a", -500.0, -500.0),
        hidden,
        filtered,
    ];

    let draws = draw_frame(&device, &mut renderer, &scene[..]);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].count, 6);
    assert_eq!(renderer.last_frame_stats().objects_culled, 3);
}

#[test]
fn test_empty_viewport_camera_is_skipped() {
    let (device, mut renderer) = setup(64, 8);
    texture(&mut renderer, "a");
    let scene = [sprite("a", 10.0, 10.0)];
    let cameras = [
        Camera::new("empty", 0.0, 0.0, 0.0, 600.0),
        Camera::default(),
    ];
    device.clear_journal();

    let stats = renderer.render_frame(&scene[..], &cameras).expect("frame");
    assert_eq!(stats.cameras_skipped, 1);
    assert_eq!(stats.cameras_rendered, 1);
    assert_eq!(device.draw_calls().len(), 1);
}

#[test]
fn test_each_camera_is_clipped_to_its_viewport() {
    let (device, mut renderer) = setup(64, 8);
    texture(&mut renderer, "a");
    let scene = [sprite("a", 100.0, 100.0)];
    let mut right = Camera::new("right", 400.0, 0.0, 400.0, 300.0);
    right.id = 2;
    let cameras = [Camera::new("left", 0.0, 0.0, 400.0, 600.0), right];
    device.clear_journal();

    renderer.render_frame(&scene[..], &cameras).expect("frame");
    let draws = device.draw_calls();
    assert_eq!(draws.len(), 2);
    let left = draws[0].scissor.expect("scissor");
    assert_eq!((left.x, left.width, left.height), (0, 400, 600));
    let right = draws[1].scissor.expect("scissor");
    // Top-left (400, 0) on a 600 high canvas is bottom-left (400, 300).
    assert_eq!((right.x, right.y, right.width, right.height), (400, 300, 400, 300));

    // The second camera shifts world (0, 0) to its viewport.
    let first = vertices(&draws[1])[0];
    assert_eq!(first.position, [492.0, 92.0]);
}

#[test]
fn test_config_from_ron_sizes_the_batches() {
    init_logs();
    let config = RendererConfig::from_ron_str(
        "(resolution: (width: 320, height: 240), batch_size: 2, round_pixels: true)",
    )
    .expect("config");
    let device = RecordingDevice::default();
    let mut renderer = Renderer::new(Arc::new(device.clone()), config).expect("renderer");
    texture(&mut renderer, "a");
    let scene: Vec<Sprite> = (0..3).map(|i| sprite("a", 20.0 * i as f32 + 10.5, 50.0)).collect();

    device.clear_journal();
    renderer
        .render_frame(&scene[..], &[Camera::new("main", 0.0, 0.0, 320.0, 240.0)])
        .expect("frame");
    let draws = device.draw_calls();
    let counts: Vec<u32> = draws.iter().map(|d| d.count).collect();
    assert_eq!(counts, [12, 6]);
    // Rounded: 10.5 - 8 = 2.5 snaps to a whole pixel.
    let x = vertices(&draws[0])[0].position[0];
    assert_eq!(x, x.round());
}
