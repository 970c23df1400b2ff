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

//! Device capabilities, frame statistics and renderer configuration.

pub mod capabilities;
pub mod settings;
pub mod stats;

pub use self::capabilities::DeviceCapabilities;
pub use self::settings::{
    RendererConfig, BITMAP_TEXT_PIPELINE, COPY_FX_PIPELINE, GRAYSCALE_FX_PIPELINE, MULTI_PIPELINE,
    SINGLE_PIPELINE,
};
pub use self::stats::{FlushReason, FrameStats};
