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

//! Textures owned by the renderer, addressed by key.

use ahash::AHashMap;
use prism_core::math::Extent2D;
use prism_core::renderer::{
    FilterMode, GraphicsDevice, ResourceError, TextureDescriptor, TextureId,
};
use prism_lanes::render_lane::GpuStateCache;
use std::borrow::Cow;

/// What a batch call needs to sample a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSource {
    /// The live GPU texture.
    pub id: TextureId,
    /// Its size in pixels.
    pub size: Extent2D,
    /// The texture is a render target and is stored bottom-up.
    pub render_target: bool,
}

#[derive(Debug)]
struct ManagedTexture {
    size: Extent2D,
    filter: FilterMode,
    // Kept for re-upload after a context loss.
    pixels: Option<Vec<u8>>,
    id: Option<TextureId>,
}

impl ManagedTexture {
    fn upload(&mut self, key: &str, device: &dyn GraphicsDevice) -> Result<TextureId, ResourceError> {
        let id = device.create_texture(
            &TextureDescriptor {
                label: Some(Cow::Borrowed(key)),
                size: self.size,
                filter: self.filter,
                render_target: false,
            },
            self.pixels.as_deref(),
        )?;
        self.id = Some(id);
        Ok(id)
    }
}

/// Game textures keyed by name.
///
/// Objects refer to textures by key, so a texture rebuilt after a context
/// loss is picked up under its new handle without game code noticing.
#[derive(Debug, Default)]
pub struct TextureRegistry {
    textures: AHashMap<String, ManagedTexture>,
}

impl TextureRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads a texture under `key`, replacing any texture with that key.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If `pixels` does not hold `size` RGBA8 texels.
    pub fn insert(
        &mut self,
        state: &mut GpuStateCache,
        key: &str,
        size: Extent2D,
        filter: FilterMode,
        pixels: Option<&[u8]>,
    ) -> Result<TextureId, ResourceError> {
        let mut texture = ManagedTexture {
            size,
            filter,
            pixels: pixels.map(<[u8]>::to_vec),
            id: None,
        };
        let id = texture.upload(key, state.device().as_ref())?;
        if let Some(mut old) = self.textures.insert(key.to_string(), texture) {
            log::debug!("Texture '{key}' replaced");
            release(state, &mut old)?;
        }
        Ok(id)
    }

    /// Looks up a live texture.
    pub fn get(&self, key: &str) -> Option<TextureSource> {
        let texture = self.textures.get(key)?;
        Some(TextureSource {
            id: texture.id?,
            size: texture.size,
            render_target: false,
        })
    }

    /// Returns `true` if a texture is registered under `key`, live or not.
    pub fn contains(&self, key: &str) -> bool {
        self.textures.contains_key(key)
    }

    /// The number of registered textures.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Returns `true` if no texture is registered.
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Destroys and forgets a texture. Returns `false` for an unknown key.
    pub fn remove(&mut self, state: &mut GpuStateCache, key: &str) -> Result<bool, ResourceError> {
        match self.textures.remove(key) {
            Some(mut texture) => {
                release(state, &mut texture)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Forgets every GPU handle after a context loss.
    pub fn invalidate(&mut self) {
        for texture in self.textures.values_mut() {
            texture.id = None;
        }
    }

    /// Uploads every texture again from its retained pixels.
    pub fn recreate(&mut self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        for (key, texture) in &mut self.textures {
            texture.upload(key, device)?;
        }
        Ok(())
    }

    /// Destroys every texture.
    pub fn destroy(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        for (_, mut texture) in self.textures.drain() {
            release(state, &mut texture)?;
        }
        Ok(())
    }
}

fn release(state: &mut GpuStateCache, texture: &mut ManagedTexture) -> Result<(), ResourceError> {
    if let Some(id) = texture.id.take() {
        state.forget_texture(id);
        state.device().destroy_texture(id)?;
    }
    Ok(())
}
