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

//! The pipelines every renderer registers, and reusable hooks.
//!
//! - `MultiPipeline` batches sprites across every texture unit the device has.
//! - `SinglePipeline` batches sprites with one texture per draw call.
//! - `BitmapText` batches glyph quads in their own buffer, so long runs of
//!   text do not split the sprite batch.
//! - `CopyFX` and `GrayscaleFX` are post-processing passes for cameras.

use super::pipeline::{HookContext, PipelineDescriptor, PipelineHooks, PipelineRole};
use super::shaders;
use prism_core::renderer::{
    AttributeType, BlendMode, PipelineError, PrimitiveTopology, ResourceError, UniformValue,
    VertexLayout, BITMAP_TEXT_PIPELINE, COPY_FX_PIPELINE, GRAYSCALE_FX_PIPELINE, MULTI_PIPELINE,
    SINGLE_PIPELINE,
};
use std::borrow::Cow;
use std::fmt::Write;
use std::time::Instant;

/// Vertices per batched quad.
pub const VERTICES_PER_QUAD: usize = 6;

/// The layout of [`SpriteVertex`](super::SpriteVertex).
pub fn sprite_vertex_layout() -> Result<VertexLayout, PipelineError> {
    VertexLayout::builder()
        .attribute("inPosition", 2, AttributeType::Float, false)
        .attribute("inTexCoord", 2, AttributeType::Float, false)
        .attribute("inTexId", 1, AttributeType::Float, false)
        .attribute("inTintEffect", 1, AttributeType::Float, false)
        .attribute("inTint", 4, AttributeType::UnsignedByte, true)
        .build()
}

/// The layout of [`QuadVertex`](super::QuadVertex).
pub fn quad_vertex_layout() -> Result<VertexLayout, PipelineError> {
    VertexLayout::builder()
        .attribute("inPosition", 2, AttributeType::Float, false)
        .attribute("inTexCoord", 2, AttributeType::Float, false)
        .build()
}

/// Fills the [`MULTI_FRAG`](shaders::MULTI_FRAG) template for `count` units.
pub fn multi_fragment_source(count: u32) -> String {
    let count = count.max(1);
    let mut chain = String::new();
    if count == 1 {
        chain.push_str("texel = texture2D(uMainSampler[0], outTexCoord);");
    } else {
        for unit in 0..count {
            if unit > 0 {
                chain.push_str("\n    else ");
            }
            if unit + 1 < count {
                let _ = write!(chain, "if (outTexId < {unit}.5)\n    ");
            }
            let _ = write!(
                chain,
                "{{\n        texel = texture2D(uMainSampler[{unit}], outTexCoord);\n    }}"
            );
        }
    }
    shaders::MULTI_FRAG
        .replace("%count%", &count.to_string())
        .replace("%forloop%", &chain)
}

/// A sprite batching pipeline with custom shaders.
///
/// `max_textures` must match the size of the `uMainSampler` array declared by
/// `fragment_source`, or be 1 for a plain `sampler2D`.
pub fn sprite_pipeline_descriptor(
    name: impl Into<String>,
    vertex_source: impl Into<Cow<'static, str>>,
    fragment_source: impl Into<Cow<'static, str>>,
    batch_size: usize,
    max_textures: u32,
) -> Result<PipelineDescriptor, PipelineError> {
    Ok(PipelineDescriptor {
        name: name.into(),
        vertex_source: vertex_source.into(),
        fragment_source: fragment_source.into(),
        layout: sprite_vertex_layout()?,
        topology: PrimitiveTopology::TriangleList,
        vertex_capacity: batch_size.saturating_mul(VERTICES_PER_QUAD),
        max_textures,
        fragment_for_units: None,
        role: PipelineRole::Batch,
        blend_mode: BlendMode::Normal,
        sampler_uniform: Some(Cow::Borrowed("uMainSampler")),
        uniform_defaults: Vec::new(),
    })
}

/// The multi-texture sprite pipeline for `max_textures` units.
///
/// `batch_size` is in quads.
pub fn multi_pipeline_descriptor(
    batch_size: usize,
    max_textures: u32,
) -> Result<PipelineDescriptor, PipelineError> {
    let max_textures = max_textures.max(1);
    let mut descriptor = sprite_pipeline_descriptor(
        MULTI_PIPELINE,
        shaders::MULTI_VERT,
        multi_fragment_source(max_textures),
        batch_size,
        max_textures,
    )?;
    descriptor.fragment_for_units = Some(multi_fragment_source);
    Ok(descriptor)
}

/// The single-texture sprite pipeline.
pub fn single_pipeline_descriptor(batch_size: usize) -> Result<PipelineDescriptor, PipelineError> {
    sprite_pipeline_descriptor(
        SINGLE_PIPELINE,
        shaders::MULTI_VERT,
        shaders::SINGLE_FRAG,
        batch_size,
        1,
    )
}

/// The bitmap text pipeline. Shares the multi-texture shaders.
pub fn bitmap_text_pipeline_descriptor(
    batch_size: usize,
    max_textures: u32,
) -> Result<PipelineDescriptor, PipelineError> {
    let max_textures = max_textures.max(1);
    let mut descriptor = sprite_pipeline_descriptor(
        BITMAP_TEXT_PIPELINE,
        shaders::MULTI_VERT,
        multi_fragment_source(max_textures),
        batch_size,
        max_textures,
    )?;
    descriptor.fragment_for_units = Some(multi_fragment_source);
    Ok(descriptor)
}

/// A post-processing pipeline drawing one full-screen quad per pass.
///
/// `fragment_source` samples `uMainSampler` at `outTexCoord`.
pub fn post_fx_descriptor(
    name: impl Into<String>,
    fragment_source: impl Into<Cow<'static, str>>,
) -> Result<PipelineDescriptor, PipelineError> {
    Ok(PipelineDescriptor {
        name: name.into(),
        vertex_source: Cow::Borrowed(shaders::QUAD_VERT),
        fragment_source: fragment_source.into(),
        layout: quad_vertex_layout()?,
        topology: PrimitiveTopology::TriangleList,
        vertex_capacity: VERTICES_PER_QUAD,
        max_textures: 1,
        fragment_for_units: None,
        role: PipelineRole::PostFx,
        blend_mode: BlendMode::Normal,
        sampler_uniform: Some(Cow::Borrowed("uMainSampler")),
        uniform_defaults: Vec::new(),
    })
}

/// Copies a camera's frame unchanged. `uBrightness` defaults to 1.
pub fn copy_fx_descriptor() -> Result<PipelineDescriptor, PipelineError> {
    let mut descriptor = post_fx_descriptor(COPY_FX_PIPELINE, shaders::COPY_FRAG)?;
    descriptor
        .uniform_defaults
        .push((Cow::Borrowed("uBrightness"), UniformValue::Float(1.0)));
    Ok(descriptor)
}

/// Desaturates a camera's frame. `uGray` defaults to 1, fully gray.
pub fn grayscale_fx_descriptor() -> Result<PipelineDescriptor, PipelineError> {
    let mut descriptor = post_fx_descriptor(GRAYSCALE_FX_PIPELINE, shaders::GRAYSCALE_FRAG)?;
    descriptor
        .uniform_defaults
        .push((Cow::Borrowed("uGray"), UniformValue::Float(1.0)));
    Ok(descriptor)
}

/// Uploads the seconds elapsed since creation to a float uniform every frame.
#[derive(Debug)]
pub struct TimeUniform {
    uniform: Cow<'static, str>,
    started: Instant,
}

impl TimeUniform {
    /// Drives the uniform called `uniform`.
    pub fn new(uniform: impl Into<Cow<'static, str>>) -> Self {
        Self {
            uniform: uniform.into(),
            started: Instant::now(),
        }
    }
}

impl PipelineHooks for TimeUniform {
    fn on_pre_render(&mut self, ctx: &mut HookContext<'_>) -> Result<(), ResourceError> {
        let seconds = self.started.elapsed().as_secs_f32();
        ctx.set_uniform(&self.uniform, seconds)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::{GpuStateCache, Pipeline};
    use prism_infra::RecordingDevice;
    use std::sync::Arc;

    #[test]
    fn multi_source_has_one_branch_per_unit() {
        let source = multi_fragment_source(3);
        assert!(source.contains("uniform sampler2D uMainSampler[3];"));
        assert!(source.contains("if (outTexId < 0.5)"));
        assert!(source.contains("else if (outTexId < 1.5)"));
        assert!(!source.contains("outTexId < 2.5"));
        assert!(source.contains("uMainSampler[2]"));
        assert!(!source.contains('%'));
    }

    #[test]
    fn single_unit_source_has_no_branches() {
        let source = multi_fragment_source(0);
        assert!(source.contains("uMainSampler[1]"));
        assert!(!source.contains("outTexId <"));
    }

    #[test]
    fn sprite_layout_is_28_bytes_with_normalized_tint() {
        let layout = sprite_vertex_layout().expect("layout");
        assert_eq!(layout.stride(), 28);
        let tint = layout.attribute("inTint").expect("tint");
        assert_eq!(tint.offset, 24);
        assert!(tint.normalized);
        assert_eq!(quad_vertex_layout().expect("layout").stride(), 16);
    }

    #[test]
    fn builtins_compile_and_bind_their_samplers() {
        let device = RecordingDevice::with_texture_units(4);
        let mut state = GpuStateCache::new(Arc::new(device.clone()));
        for descriptor in [
            multi_pipeline_descriptor(8, 4),
            single_pipeline_descriptor(8),
            bitmap_text_pipeline_descriptor(8, 4),
            copy_fx_descriptor(),
            grayscale_fx_descriptor(),
        ] {
            let pipeline = Pipeline::new(&mut state, descriptor.expect("descriptor"), Vec::new())
                .expect("pipeline");
            assert!(pipeline.shader().has_uniform("uMainSampler"));
        }
        assert_eq!(device.program_labels().len(), 5);
    }

    #[test]
    fn time_uniform_is_set_before_each_frame() {
        let device = RecordingDevice::default();
        let mut state = GpuStateCache::new(Arc::new(device.clone()));
        let descriptor = post_fx_descriptor(
            "Wobble",
            "precision mediump float;
             uniform sampler2D uMainSampler;
             uniform float uTime;
             varying vec2 outTexCoord;
             void main() { gl_FragColor = texture2D(uMainSampler, outTexCoord) * uTime; }",
        )
        .expect("descriptor");
        let mut pipeline =
            Pipeline::new(&mut state, descriptor, vec![Box::new(TimeUniform::new("uTime"))])
                .expect("pipeline");
        device.clear_journal();
        pipeline.pre_render(&mut state).expect("pre-render");
        assert!(device.commands().iter().any(|c| matches!(
            c,
            prism_infra::graphics::headless::GpuCommand::SetUniform { .. }
        )));
    }
}
