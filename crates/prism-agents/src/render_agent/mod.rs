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

//! Acts as the **[A]gent** for the rendering subsystem.
//!
//! This module holds the per-frame logic that sits above the batching lanes.
//! It decides which surface a camera draws into, which pipeline each object
//! uses and when pending batches must reach the GPU, then delegates the actual
//! vertex packing to `prism_lanes::render_lane`.

mod camera;
mod compositor;
mod render_target;
mod renderer;
mod scene;
mod textures;

pub use camera::*;
pub use compositor::*;
pub use render_target::*;
pub use renderer::*;
pub use scene::*;
pub use textures::*;
