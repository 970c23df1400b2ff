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

//! Global settings for the rendering system.

use crate::math::{Extent2D, LinearRgba};
use crate::renderer::error::RenderError;
use serde::{Deserialize, Serialize};

/// The name under which the default multi-texture sprite pipeline is registered.
pub const MULTI_PIPELINE: &str = "MultiPipeline";
/// The name under which the single-texture sprite pipeline is registered.
pub const SINGLE_PIPELINE: &str = "SinglePipeline";
/// The name under which the bitmap text pipeline is registered.
pub const BITMAP_TEXT_PIPELINE: &str = "BitmapText";
/// The name of the post-FX pipeline that copies a target unchanged.
pub const COPY_FX_PIPELINE: &str = "CopyFX";
/// The name of the built-in grayscale post-FX pipeline.
pub const GRAYSCALE_FX_PIPELINE: &str = "GrayscaleFX";

/// A collection of global settings that configure the renderer.
///
/// Every field has a default, so a configuration file only needs to list the
/// values it changes:
///
/// ```
/// use prism_core::renderer::RendererConfig;
///
/// let config = RendererConfig::from_ron_str("(batch_size: 512, round_pixels: true)").unwrap();
/// assert_eq!(config.batch_size, 512);
/// assert!(config.round_pixels);
/// assert_eq!(config.resolution.width, 800);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// The size of the drawing buffer in pixels.
    pub resolution: Extent2D,
    /// How many quads a batch pipeline's vertex buffer holds before it must flush.
    pub batch_size: usize,
    /// Caps the texture units used by multi-texture pipelines. `None` uses the device maximum.
    pub max_textures: Option<u32>,
    /// The pipeline used by objects that do not name one.
    pub default_pipeline: String,
    /// When `true`, registering a pipeline under a taken name replaces it with a
    /// warning instead of failing.
    pub replace_duplicate_pipelines: bool,
    /// The color the default framebuffer is cleared to at the start of a frame.
    pub background_color: LinearRgba,
    /// Clear the default framebuffer in `pre_render`.
    pub clear_before_render: bool,
    /// Snap vertex positions to whole pixels for every camera.
    pub round_pixels: bool,
    /// The size of the post-FX swap targets relative to the resolution.
    pub post_fx_resolution_scale: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            resolution: Extent2D::new(800, 600),
            batch_size: 4096,
            max_textures: None,
            default_pipeline: MULTI_PIPELINE.to_string(),
            replace_duplicate_pipelines: false,
            background_color: LinearRgba::BLACK,
            clear_before_render: true,
            round_pixels: false,
            post_fx_resolution_scale: 1.0,
        }
    }
}

impl RendererConfig {
    /// Parses a configuration from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidConfig`] if the text is not valid RON for
    /// this struct, or if a value is out of range.
    pub fn from_ron_str(text: &str) -> Result<Self, RenderError> {
        let config: RendererConfig =
            ron::from_str(text).map_err(|e| RenderError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration as pretty-printed RON.
    pub fn to_ron_string(&self) -> Result<String, RenderError> {
        let pretty_config = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        ron::ser::to_string_pretty(self, pretty_config)
            .map_err(|e| RenderError::InvalidConfig(e.to_string()))
    }

    /// Checks the values that would make the renderer unusable.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.batch_size == 0 {
            return Err(RenderError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.resolution.is_empty() {
            return Err(RenderError::InvalidConfig(
                "resolution must not be empty".to_string(),
            ));
        }
        if !(self.post_fx_resolution_scale > 0.0) {
            return Err(RenderError::InvalidConfig(
                "post_fx_resolution_scale must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_pipeline, MULTI_PIPELINE);
        assert!(!config.replace_duplicate_pipelines);
    }

    #[test]
    fn ron_round_trip_keeps_changes() {
        let config = RendererConfig {
            batch_size: 128,
            max_textures: Some(4),
            background_color: LinearRgba::rgb(0.1, 0.2, 0.3),
            ..Default::default()
        };
        let text = config.to_ron_string().expect("serialize");
        let parsed = RendererConfig::from_ron_str(&text).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = RendererConfig::from_ron_str("(batch_size: 0)").unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfig(_)));
        assert!(RendererConfig::from_ron_str("(batch_size: \"lots\")").is_err());
    }
}
