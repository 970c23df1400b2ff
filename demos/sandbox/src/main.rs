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

// Prism Sandbox
// Renders a small scene on the recording device and logs what the GPU saw.

use anyhow::{Context, Result};
use prism_agents::render_agent::{
    BatchContext, BitmapFont, BitmapText, Camera, DisplayList, Renderable, Renderer, Sprite,
};
use prism_core::math::{pack_tint, LinearRgba, Rect, Vec2, TAU};
use prism_core::renderer::{
    BlendMode, FilterMode, RenderError, RendererConfig, ResourceError, COPY_FX_PIPELINE,
    GRAYSCALE_FX_PIPELINE,
};
use prism_infra::RecordingDevice;
use prism_lanes::render_lane::{post_fx_descriptor, TimeUniform};
use std::sync::Arc;

const DEFAULT_CONFIG: &str = r#"(
    resolution: (width: 960, height: 540),
    batch_size: 256,
    background_color: (r: 0.05, g: 0.05, b: 0.1, a: 1.0),
    round_pixels: true,
)"#;

const PULSE_FRAG: &str = "
#define SHADER_NAME SANDBOX_PULSE_FS
precision mediump float;
uniform sampler2D uMainSampler;
uniform float uTime;
varying vec2 outTexCoord;
void main ()
{
    vec4 color = texture2D(uMainSampler, outTexCoord);
    gl_FragColor = vec4(color.rgb * (0.8 + 0.2 * sin(uTime * 4.0)), color.a);
}
";

const FONT_CHARS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 ";

/// A solid star with a white outline.
#[derive(Debug)]
struct Star {
    center: Vec2,
    radius: f32,
    points: usize,
    color: u32,
}

impl Star {
    fn corner(&self, i: usize) -> Vec2 {
        let angle = i as f32 * TAU / (self.points * 2) as f32;
        let r = if i % 2 == 0 { self.radius } else { self.radius * 0.45 };
        self.center + Vec2::new(angle.cos(), angle.sin()) * r
    }
}

impl Renderable for Star {
    fn blend_mode(&self) -> BlendMode {
        BlendMode::Add
    }

    fn bounds(&self) -> Option<Rect> {
        let r = self.radius;
        Some(Rect::new(self.center.x - r, self.center.y - r, r * 2.0, r * 2.0))
    }

    fn batch(&self, ctx: &mut BatchContext<'_>) -> Result<(), ResourceError> {
        let tint = pack_tint(self.color, ctx.camera().alpha);
        let outline: Vec<Vec2> = (0..self.points * 2).map(|i| self.corner(i)).collect();
        ctx.fill_path(&outline, tint)?;
        ctx.stroke_path(&outline, 3.0, true, pack_tint(0xFFFFFF, ctx.camera().alpha))?;
        Ok(())
    }
}

fn checker_pixels(size: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let on = (x / 4 + y / 4) % 2 == 0;
            let v = if on { 255 } else { 64 };
            pixels.extend_from_slice(&[v, v, v, 255]);
        }
    }
    pixels
}

fn load_config() -> Result<RendererConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading renderer config '{path}'"))?;
            RendererConfig::from_ron_str(&text)
                .with_context(|| format!("parsing renderer config '{path}'"))
        }
        None => RendererConfig::from_ron_str(DEFAULT_CONFIG).context("parsing built-in config"),
    }
}

fn build_scene(font: Arc<BitmapFont>) -> DisplayList {
    let mut scene = DisplayList::new();
    for i in 0..48 {
        let (col, row) = ((i % 12) as f32, (i / 12) as f32);
        let mut tile = Sprite::new("checker", Rect::new(0.0, 0.0, 32.0, 32.0))
            .at(40.0 + col * 72.0, 60.0 + row * 72.0);
        tile.rotation = i as f32 * 0.1;
        tile.tint = [0xFF_FF_FF, 0xFF_C0_C0, 0xC0_C0_FF, 0xC0_FF_C0];
        scene.add(0.0, tile);
    }
    scene.add(
        1.0,
        Star {
            center: Vec2::new(480.0, 270.0),
            radius: 90.0,
            points: 5,
            color: 0xFF_D0_40,
        },
    );

    let mut title = BitmapText::new(font, "PRISM SANDBOX");
    title.position = Vec2::new(24.0, 12.0);
    title.scale = 2.0;
    title.scroll_factor = Vec2::ZERO;
    scene.add(2.0, title);

    // Shows what the minimap camera drew, only on the main camera.
    let mut minimap = Sprite::new("minimap", Rect::new(0.0, 0.0, 240.0, 135.0)).at(820.0, 460.0);
    minimap.scroll_factor = Vec2::ZERO;
    minimap.camera_filter = 0b10;
    scene.add(3.0, minimap);
    scene
}

fn cameras(frame: u32) -> Vec<Camera> {
    let mut main = Camera::new("main", 0.0, 0.0, 960.0, 540.0);
    main.scroll = Vec2::new(frame as f32 * 8.0, 0.0);
    main.post_fx = vec!["Pulse".to_string()];

    let mut minimap = Camera::new("minimap", 0.0, 0.0, 240.0, 135.0);
    minimap.id = 0b10;
    minimap.zoom = 0.25;
    minimap.origin = Vec2::ZERO;
    minimap.background = Some(LinearRgba::BLACK);
    minimap.render_target = Some("minimap".to_string());

    let mut retro = Camera::new("retro", 16.0, 380.0, 240.0, 140.0);
    retro.id = 0b100;
    retro.scroll = Vec2::new(400.0, 200.0);
    retro.post_fx = vec![COPY_FX_PIPELINE.to_string(), GRAYSCALE_FX_PIPELINE.to_string()];

    vec![minimap, main, retro]
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let device = RecordingDevice::default();
    let mut renderer = Renderer::new(Arc::new(device.clone()), config)?;

    renderer.add_pipeline_with_hooks(
        post_fx_descriptor("Pulse", PULSE_FRAG)?,
        vec![Box::new(TimeUniform::new("uTime"))],
    )?;
    renderer.create_texture(
        "checker",
        32,
        32,
        FilterMode::Nearest,
        Some(&checker_pixels(32)),
    )?;
    renderer.create_texture("font", 128, 48, FilterMode::Nearest, None)?;
    renderer.create_render_target("minimap", 240, 135)?;
    renderer.set_pipeline_uniform(GRAYSCALE_FX_PIPELINE, "uGray", 0.8f32)?;

    let font = Arc::new(BitmapFont::monospace("font", 8.0, 8.0, 16, FONT_CHARS));
    let scene = build_scene(font);

    for frame in 0..6 {
        if frame == 3 {
            log::warn!("Sandbox: simulating a lost context");
            device.lose_context();
        }
        device.clear_journal();
        match renderer.render_frame(&scene, &cameras(frame)) {
            Ok(stats) => log::info!(
                "Frame {}: {} draw calls, {} vertices, {} program switches, {} cameras, {} culled",
                stats.frame_number,
                stats.draw_calls,
                stats.vertices,
                stats.program_switches,
                stats.cameras_rendered,
                stats.objects_culled
            ),
            Err(RenderError::DeviceLost) => {
                device.restore_context();
                let broken = renderer.restore_context(Arc::new(device.clone()))?;
                log::info!("Sandbox: context restored, {} broken pipeline(s)", broken.len());
            }
            Err(e) => return Err(e.into()),
        }
        for call in device.draw_calls() {
            log::debug!(
                "  {} x{} into {:?}",
                call.program_label,
                call.count,
                call.framebuffer
            );
        }
    }

    renderer.destroy()?;
    log::info!("Sandbox: live GPU objects after destroy {:?}", device.live_resources());
    Ok(())
}
