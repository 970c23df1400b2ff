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

//! # Prism Infra
//!
//! Concrete implementations of the [`GraphicsDevice`](prism_core::renderer::GraphicsDevice)
//! contract.
//!
//! - [`graphics::headless`]: a CPU-only device that records every call. Tests and
//!   tooling run the full renderer against it.
//! - `graphics::glow` (feature `glow`): an OpenGL ES 2 / WebGL backend.

pub mod graphics;

pub use graphics::headless::{RecordingDevice, RecordingDeviceConfig};
#[cfg(feature = "glow")]
pub use graphics::glow::GlowDevice;
