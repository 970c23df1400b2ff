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

//! Provides the public, backend-agnostic rendering contracts of the Prism renderer.
//!
//! This module defines the "common language" for all rendering operations. It contains
//! the abstract [`GraphicsDevice`] trait, the plain data types passed through it
//! (like [`ProgramDescriptor`] or [`VertexLayout`]) and the error types that form
//! the stable, public-facing API for rendering.
//!
//! The device contract is shaped after OpenGL ES 2 / WebGL: programs, a bound
//! array buffer, texture units, framebuffers and fixed-function blend state.
//! Backends in `prism-infra` implement it. `prism-lanes` and `prism-agents`
//! use it without knowing which backend is underneath.

pub mod api;
pub mod error;
pub mod traits;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::error::{PipelineError, RenderError, ResourceError, ShaderError};
pub use self::traits::GraphicsDevice;
