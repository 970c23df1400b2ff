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

//! A headless graphics device that records every call instead of drawing.
//!
//! [`RecordingDevice`] validates handles and bounds the way a GL driver
//! would, reflects uniforms from the GLSL source and keeps a journal of
//! [`GpuCommand`]s. Each draw is captured as a [`DrawCall`] with a snapshot
//! of the vertices it read, so batching behavior can be asserted exactly.

mod device;
mod journal;
mod reflection;

pub use self::device::{RecordingDevice, RecordingDeviceConfig};
pub use self::journal::{DrawCall, GpuCommand, UniformData};
