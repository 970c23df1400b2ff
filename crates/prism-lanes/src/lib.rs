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

//! # Prism Lanes
//!
//! The hot path of the renderer: everything that runs once per quad.
//!
//! A [`render_lane::Pipeline`] owns a shader program, a CPU-side vertex
//! buffer and a texture unit table. Batch functions append geometry to the
//! current pipeline. A flush turns the accumulated vertices into exactly one
//! draw call. The [`render_lane::PipelineManager`] decides which pipeline is
//! current and flushes the outgoing one on every switch. All GL state goes
//! through a single [`render_lane::GpuStateCache`].

#![warn(missing_docs)]

pub mod render_lane;
