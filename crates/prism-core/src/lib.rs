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

//! # Prism Core
//!
//! Foundational crate of the Prism 2D renderer. It holds the math primitives,
//! the backend-agnostic GPU types, the [`renderer::GraphicsDevice`] contract
//! and the renderer's error hierarchy.
//!
//! Nothing in this crate talks to a GPU. Backends live in `prism-infra`,
//! the batching hot path in `prism-lanes` and the frame orchestration in
//! `prism-agents`.

#![warn(missing_docs)]

pub mod math;
pub mod renderer;
