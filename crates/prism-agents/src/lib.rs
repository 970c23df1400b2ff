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

//! # Prism Agents
//!
//! The orchestration layer of the Prism renderer. Where `prism-lanes` knows
//! how to batch one quad, this crate decides *what* gets batched, into which
//! surface and in which order:
//!
//! - [`render_agent::Camera`] turns scroll, zoom and rotation into the view
//!   matrix every sprite is projected through.
//! - [`render_agent::Compositor`] runs one camera pass: binds the target,
//!   walks the scene's render list, flushes at the pass boundary and applies
//!   post-FX.
//! - [`render_agent::Renderer`] owns the pipelines, textures and render
//!   targets, drives the frame lifecycle and recovers from context loss.

#![warn(missing_docs)]

pub mod render_agent;
