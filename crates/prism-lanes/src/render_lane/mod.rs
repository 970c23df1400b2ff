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

//! Rendering lane - hot path for batched 2D drawing.

mod batch;
mod builtin;
mod gpu_state;
mod pipeline;
mod pipeline_manager;
mod shader;
pub mod shaders;
mod texture_units;
mod vertex_buffer;

pub use batch::*;
pub use builtin::*;
pub use gpu_state::*;
pub use pipeline::*;
pub use pipeline_manager::*;
pub use shader::*;
pub use texture_units::*;
pub use vertex_buffer::*;
