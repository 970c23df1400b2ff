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

use super::gpu_state::GpuStateCache;
use bytemuck::Pod;
use prism_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, GraphicsDevice, PipelineError, ResourceError,
};
use std::borrow::Cow;

/// Refusal to append to a [`VertexBuffer`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapacityError {
    /// The buffer holds `capacity` vertices already.
    #[error("vertex buffer '{label}' is full ({capacity} vertices)")]
    Full {
        /// The buffer label.
        label: String,
        /// The capacity in vertices.
        capacity: usize,
    },
    /// The appended bytes are not exactly one vertex.
    #[error("vertex is {got} bytes but the buffer stride is {stride}")]
    StrideMismatch {
        /// The byte length that was passed.
        got: usize,
        /// The stride of the buffer.
        stride: usize,
    },
    /// A resize would drop vertices that were not flushed yet.
    #[error("cannot shrink vertex buffer '{label}' below its {pending} pending vertices")]
    PendingVertices {
        /// The buffer label.
        label: String,
        /// Vertices waiting for a flush.
        pending: usize,
    },
}

impl From<CapacityError> for ResourceError {
    fn from(err: CapacityError) -> Self {
        let error = match err {
            CapacityError::StrideMismatch { .. } => PipelineError::InvalidLayout(err.to_string()),
            CapacityError::Full { .. } | CapacityError::PendingVertices { .. } => {
                PipelineError::VertexBuffer(err.to_string())
            }
        };
        ResourceError::Pipeline(error)
    }
}

/// A fixed-capacity vertex buffer with a CPU-side mirror.
///
/// Vertices are appended to the mirror and uploaded in one write when the
/// owning pipeline flushes. The buffer never grows on its own: running out of
/// room is the signal to flush.
#[derive(Debug)]
pub struct VertexBuffer {
    label: String,
    data: Vec<u8>,
    stride: usize,
    capacity: usize,
    offset: usize,
    usage: BufferUsage,
    handle: Option<BufferId>,
}

impl VertexBuffer {
    /// Creates the CPU mirror for `capacity` vertices of `stride` bytes.
    /// The GPU buffer is created by [`VertexBuffer::create`].
    pub fn new(label: impl Into<String>, stride: usize, capacity: usize) -> Self {
        Self {
            label: label.into(),
            data: vec![0; stride * capacity],
            stride,
            capacity,
            offset: 0,
            usage: BufferUsage::Dynamic,
            handle: None,
        }
    }

    /// Allocates the GPU buffer at full capacity.
    pub fn create(&mut self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        let id = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed(&self.label)),
            size: self.data.len() as u64,
            usage: self.usage,
        })?;
        self.handle = Some(id);
        Ok(())
    }

    /// The GPU buffer, if it exists.
    pub fn handle(&self) -> Option<BufferId> {
        self.handle
    }

    /// The size of one vertex in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The capacity in vertices.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of vertices waiting for upload.
    pub fn vertex_count(&self) -> usize {
        self.offset / self.stride
    }

    /// Room left, in vertices.
    pub fn remaining(&self) -> usize {
        self.capacity - self.vertex_count()
    }

    /// `true` if `count` more vertices fit.
    pub fn has_room(&self, count: usize) -> bool {
        count <= self.remaining()
    }

    /// `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    /// The pending bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.offset]
    }

    /// Appends one vertex given as raw bytes.
    pub fn append(&mut self, vertex: &[u8]) -> Result<(), CapacityError> {
        if vertex.len() != self.stride {
            return Err(CapacityError::StrideMismatch {
                got: vertex.len(),
                stride: self.stride,
            });
        }
        if self.offset + self.stride > self.data.len() {
            return Err(CapacityError::Full {
                label: self.label.clone(),
                capacity: self.capacity,
            });
        }
        self.write(vertex);
        Ok(())
    }

    /// Appends one `Pod` vertex.
    pub fn append_pod<T: Pod>(&mut self, vertex: &T) -> Result<(), CapacityError> {
        self.append(bytemuck::bytes_of(vertex))
    }

    /// Appends a run of `Pod` vertices, all or nothing.
    pub fn append_slice<T: Pod>(&mut self, vertices: &[T]) -> Result<(), CapacityError> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        if std::mem::size_of::<T>() != self.stride {
            return Err(CapacityError::StrideMismatch {
                got: std::mem::size_of::<T>(),
                stride: self.stride,
            });
        }
        if !self.has_room(vertices.len()) {
            return Err(CapacityError::Full {
                label: self.label.clone(),
                capacity: self.capacity,
            });
        }
        self.write(bytes);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) {
        let end = self.offset + bytes.len();
        debug_assert!(end <= self.data.len(), "vertex write past capacity");
        self.data[self.offset..end].copy_from_slice(bytes);
        self.offset = end;
    }

    /// Writes the pending bytes to the GPU buffer.
    pub fn upload(&self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        let handle = self.handle.ok_or(ResourceError::InvalidHandle)?;
        state.bind_vertex_buffer(handle)?;
        state.device().write_buffer(handle, 0, self.bytes())
    }

    /// Discards pending vertices.
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// Forgets the GPU buffer without touching the device. Used on context loss.
    pub fn invalidate(&mut self) {
        self.handle = None;
        self.offset = 0;
    }

    /// Creates a fresh GPU buffer after [`VertexBuffer::invalidate`].
    pub fn recreate(&mut self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        self.handle = None;
        self.create(device)
    }

    /// Changes the capacity. Pending vertices are kept and must still fit.
    pub fn resize(
        &mut self,
        state: &mut GpuStateCache,
        capacity: usize,
    ) -> Result<(), ResourceError> {
        if self.vertex_count() > capacity {
            return Err(CapacityError::PendingVertices {
                label: self.label.clone(),
                pending: self.vertex_count(),
            }
            .into());
        }
        self.data.resize(self.stride * capacity, 0);
        self.capacity = capacity;
        if self.handle.is_some() {
            self.destroy(state)?;
            self.create(state.device().as_ref())?;
        }
        Ok(())
    }

    /// Releases the GPU buffer.
    pub fn destroy(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        if let Some(handle) = self.handle.take() {
            state.forget_buffer(handle);
            state.device().destroy_buffer(handle)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_infra::RecordingDevice;
    use std::sync::Arc;

    fn state() -> (RecordingDevice, GpuStateCache) {
        let device = RecordingDevice::default();
        let state = GpuStateCache::new(Arc::new(device.clone()));
        (device, state)
    }

    #[test]
    fn append_until_full() {
        let mut buffer = VertexBuffer::new("test", 4, 2);
        buffer.append_pod(&1u32).expect("first");
        buffer.append_pod(&2u32).expect("second");
        assert!(!buffer.has_room(1));
        assert_eq!(
            buffer.append_pod(&3u32),
            Err(CapacityError::Full {
                label: "test".into(),
                capacity: 2
            })
        );
        assert_eq!(buffer.bytes(), &[1, 0, 0, 0, 2, 0, 0, 0]);
        buffer.reset();
        assert!(buffer.is_empty());
        assert_eq!(buffer.remaining(), 2);
    }

    #[test]
    fn stride_is_enforced() {
        let mut buffer = VertexBuffer::new("test", 8, 4);
        assert!(matches!(
            buffer.append(&[0; 4]),
            Err(CapacityError::StrideMismatch { got: 4, stride: 8 })
        ));
        assert!(buffer.append_slice(&[0u64; 5]).is_err());
        buffer.append_slice(&[0u64; 4]).expect("exact fit");
        assert_eq!(buffer.vertex_count(), 4);
    }

    #[test]
    fn capacity_errors_keep_their_message() {
        let full = ResourceError::from(CapacityError::Full {
            label: "quads".into(),
            capacity: 6,
        });
        match full {
            ResourceError::Pipeline(PipelineError::VertexBuffer(msg)) => {
                assert!(msg.contains("'quads' is full (6 vertices)"), "{msg}");
            }
            other => panic!("expected a vertex buffer error, got {other:?}"),
        }
        let stride = ResourceError::from(CapacityError::StrideMismatch { got: 4, stride: 8 });
        assert!(matches!(
            stride,
            ResourceError::Pipeline(PipelineError::InvalidLayout(_))
        ));
    }

    #[test]
    fn upload_writes_only_pending_bytes() {
        let (device, mut state) = state();
        let mut buffer = VertexBuffer::new("test", 4, 16);
        buffer.create(state.device().as_ref()).expect("create");
        buffer.append_pod(&7u32).expect("append");
        buffer.upload(&mut state).expect("upload");
        let writes: Vec<usize> = device
            .commands()
            .iter()
            .filter_map(|c| match c {
                prism_infra::graphics::headless::GpuCommand::WriteBuffer { len, .. } => Some(*len),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec![4]);
    }

    #[test]
    fn resize_keeps_pending_vertices_that_fit() {
        let (device, mut state) = state();
        let mut buffer = VertexBuffer::new("test", 4, 4);
        buffer.create(state.device().as_ref()).expect("create");
        buffer.append_slice(&[1u32, 2, 3]).expect("append");
        match buffer.resize(&mut state, 2) {
            Err(ResourceError::Pipeline(PipelineError::VertexBuffer(msg))) => {
                assert!(msg.contains("'test'") && msg.contains("3 pending"), "{msg}");
            }
            other => panic!("expected a vertex buffer error, got {other:?}"),
        }
        buffer.resize(&mut state, 8).expect("grow");
        assert_eq!(buffer.capacity(), 8);
        assert_eq!(buffer.vertex_count(), 3);
        assert_eq!(device.live_resources().1, 1);
    }

    #[test]
    fn invalidate_drops_handle_and_pending_data() {
        let (_, state) = state();
        let mut buffer = VertexBuffer::new("test", 4, 4);
        buffer.create(state.device().as_ref()).expect("create");
        buffer.append_pod(&1u32).expect("append");
        buffer.invalidate();
        assert!(buffer.handle().is_none());
        assert!(buffer.is_empty());
        buffer.recreate(state.device().as_ref()).expect("recreate");
        assert!(buffer.handle().is_some());
    }
}
