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

//! Performance statistics for the rendering system.

use std::fmt;

/// Why a pipeline's batch was submitted to the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushReason {
    /// Game code or the renderer asked for a flush directly.
    Explicit,
    /// The vertex buffer had no room for the next primitive.
    VertexCapacity,
    /// Every texture unit was taken by another texture.
    TextureUnits,
    /// Another pipeline became current.
    PipelineSwitch,
    /// The blend mode changed while vertices were pending.
    BlendChange,
    /// A camera pass, render target or frame ended.
    PassBoundary,
}

impl FlushReason {
    /// Every reason, in declaration order.
    pub const ALL: [FlushReason; 6] = [
        FlushReason::Explicit,
        FlushReason::VertexCapacity,
        FlushReason::TextureUnits,
        FlushReason::PipelineSwitch,
        FlushReason::BlendChange,
        FlushReason::PassBoundary,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlushReason::Explicit => "explicit",
            FlushReason::VertexCapacity => "vertex capacity",
            FlushReason::TextureUnits => "texture units",
            FlushReason::PipelineSwitch => "pipeline switch",
            FlushReason::BlendChange => "blend change",
            FlushReason::PassBoundary => "pass boundary",
        };
        f.write_str(name)
    }
}

/// A collection of statistics for a single rendered frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// A sequential counter for rendered frames.
    pub frame_number: u64,
    /// The number of draw calls issued during the frame.
    pub draw_calls: u32,
    /// The total number of vertices submitted.
    pub vertices: u32,
    /// How often the active program actually changed.
    pub program_switches: u32,
    /// How often a texture was actually bound to a unit.
    pub texture_binds: u32,
    /// Cameras that went through a render pass.
    pub cameras_rendered: u32,
    /// Cameras skipped because they were invisible or had an empty viewport.
    pub cameras_skipped: u32,
    /// Objects rejected by visibility or culling.
    pub objects_culled: u32,
    flushes: [u32; 6],
}

impl FrameStats {
    /// Zeroed counters for frame `frame_number`.
    pub fn new(frame_number: u64) -> Self {
        Self {
            frame_number,
            ..Default::default()
        }
    }

    /// Records one flush for `reason`.
    #[inline]
    pub fn record_flush(&mut self, reason: FlushReason) {
        self.flushes[reason.index()] += 1;
    }

    /// The number of flushes recorded for `reason`.
    #[inline]
    pub fn flushes(&self, reason: FlushReason) -> u32 {
        self.flushes[reason.index()]
    }

    /// The number of flushes for every reason combined.
    pub fn total_flushes(&self) -> u32 {
        self.flushes.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_counters_are_per_reason() {
        let mut stats = FrameStats::default();
        stats.record_flush(FlushReason::VertexCapacity);
        stats.record_flush(FlushReason::VertexCapacity);
        stats.record_flush(FlushReason::PassBoundary);
        assert_eq!(stats.flushes(FlushReason::VertexCapacity), 2);
        assert_eq!(stats.flushes(FlushReason::PassBoundary), 1);
        assert_eq!(stats.flushes(FlushReason::Explicit), 0);
        assert_eq!(stats.total_flushes(), 3);
    }

    #[test]
    fn new_starts_a_numbered_frame_from_zero() {
        let stats = FrameStats::new(7);
        assert_eq!(stats.frame_number, 7);
        assert_eq!(stats.total_flushes(), 0);
        assert_eq!(stats, FrameStats { frame_number: 7, ..Default::default() });
    }
}
