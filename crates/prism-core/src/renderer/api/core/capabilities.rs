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

//! Hardware limits queried from the graphics device.

/// Limits reported by a [`GraphicsDevice`](crate::renderer::GraphicsDevice).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// `MAX_TEXTURE_IMAGE_UNITS`: how many textures one draw call may sample.
    pub max_texture_units: u32,
    /// `MAX_TEXTURE_SIZE`: the largest texture side in pixels.
    pub max_texture_size: u32,
}

impl DeviceCapabilities {
    /// Resolves how many texture units the multi-texture pipelines will use.
    ///
    /// A configured value is clamped to `1..=max_texture_units`. `None` means
    /// "use all of them".
    pub fn resolve_texture_units(&self, configured: Option<u32>) -> u32 {
        let max = self.max_texture_units.max(1);
        configured.map_or(max, |n| n.clamp(1, max))
    }
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        // The WebGL 1 guaranteed minimums.
        Self {
            max_texture_units: 8,
            max_texture_size: 2048,
        }
    }
}
