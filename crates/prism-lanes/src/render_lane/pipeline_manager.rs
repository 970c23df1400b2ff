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

//! Registration and switching of pipelines.

use super::gpu_state::GpuStateCache;
use super::pipeline::{Pipeline, PipelineDescriptor, PipelineHooks, PipelineRole, PipelineStatus};
use ahash::AHashMap;
use prism_core::renderer::{FlushReason, PipelineError, ResourceError};

/// A stable index to a registered pipeline, cheaper than a name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(usize);

/// Owns every pipeline and tracks which one is current.
///
/// Exactly one batch pipeline is current at a time. Switching flushes the
/// outgoing pipeline before the incoming one is bound, so draw order always
/// matches batch order across pipelines.
#[derive(Debug, Default)]
pub struct PipelineManager {
    // Registration order. Removed pipelines leave a hole so handles stay valid.
    slots: Vec<Option<Pipeline>>,
    names: AHashMap<String, usize>,
    current: Option<usize>,
    previous: Option<usize>,
    replace_duplicates: bool,
}

impl PipelineManager {
    /// Creates an empty manager.
    ///
    /// With `replace_duplicates`, registering a taken name replaces the old
    /// pipeline with a warning. Otherwise it fails with
    /// [`PipelineError::Duplicate`].
    pub fn new(replace_duplicates: bool) -> Self {
        Self {
            replace_duplicates,
            ..Default::default()
        }
    }

    /// Builds a pipeline and registers it under its descriptor's name.
    ///
    /// The name is checked before anything is compiled. A replaced pipeline
    /// keeps its place in the flush order.
    pub fn add(
        &mut self,
        state: &mut GpuStateCache,
        descriptor: PipelineDescriptor,
        hooks: Vec<Box<dyn PipelineHooks>>,
    ) -> Result<PipelineHandle, ResourceError> {
        let existing = self.names.get(&descriptor.name).copied();
        if existing.is_some() && !self.replace_duplicates {
            return Err(PipelineError::Duplicate(descriptor.name).into());
        }

        let mut pipeline = Pipeline::new(state, descriptor, hooks)?;
        if let Some((width, height)) = self.current_resolution() {
            pipeline.set_projection(width, height);
        }

        match existing {
            Some(index) => {
                log::warn!(
                    "Pipeline '{}' is already registered, replacing it",
                    pipeline.name()
                );
                if let Some(mut old) = self.slots[index].take() {
                    old.flush(state, FlushReason::PipelineSwitch)?;
                    old.destroy(state)?;
                }
                if self.current == Some(index) {
                    self.current = None;
                }
                self.slots[index] = Some(pipeline);
                Ok(PipelineHandle(index))
            }
            None => {
                let index = self.slots.len();
                self.names.insert(pipeline.name().to_string(), index);
                self.slots.push(Some(pipeline));
                Ok(PipelineHandle(index))
            }
        }
    }

    fn current_resolution(&self) -> Option<(u32, u32)> {
        self.pipelines()
            .map(|p| p.resolution())
            .find(|r| !r.is_empty())
            .map(|r| (r.width, r.height))
    }

    /// The handle of a registered name.
    pub fn handle(&self, name: &str) -> Option<PipelineHandle> {
        self.names.get(name).copied().map(PipelineHandle)
    }

    /// `true` if a pipeline is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Looks up a pipeline by name.
    pub fn get(&self, name: &str) -> Option<&Pipeline> {
        self.names
            .get(name)
            .and_then(|&i| self.slots[i].as_ref())
    }

    /// Looks up a pipeline by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Pipeline> {
        self.names
            .get(name)
            .and_then(|&i| self.slots[i].as_mut())
    }

    /// Looks up a pipeline by handle.
    pub fn get_by_handle_mut(&mut self, handle: PipelineHandle) -> Option<&mut Pipeline> {
        self.slots.get_mut(handle.0).and_then(Option::as_mut)
    }

    /// Every pipeline in registration order.
    pub fn pipelines(&self) -> impl Iterator<Item = &Pipeline> + '_ {
        self.slots.iter().flatten()
    }

    /// The names of every pipeline in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.pipelines().map(Pipeline::name)
    }

    /// Unregisters and destroys a pipeline. Pending vertices are flushed first.
    pub fn remove(
        &mut self,
        state: &mut GpuStateCache,
        name: &str,
    ) -> Result<bool, ResourceError> {
        let Some(index) = self.names.remove(name) else {
            return Ok(false);
        };
        if self.current == Some(index) {
            self.current = None;
        }
        if self.previous == Some(index) {
            self.previous = None;
        }
        if let Some(mut pipeline) = self.slots[index].take() {
            pipeline.flush(state, FlushReason::PipelineSwitch)?;
            pipeline.destroy(state)?;
        }
        Ok(true)
    }

    // --- Current pipeline ---

    /// Makes the named pipeline current, flushing the outgoing one.
    /// ## Errors
    /// * `PipelineError::NotFound` - If no pipeline has this name.
    /// * `PipelineError::NotBatchable` - For post-processing pipelines.
    pub fn set_current(
        &mut self,
        state: &mut GpuStateCache,
        name: &str,
    ) -> Result<PipelineHandle, ResourceError> {
        let handle = self
            .handle(name)
            .ok_or_else(|| PipelineError::NotFound(name.to_string()))?;
        self.set_current_handle(state, handle)?;
        Ok(handle)
    }

    /// Makes a pipeline current by handle. A no-op if it already is.
    pub fn set_current_handle(
        &mut self,
        state: &mut GpuStateCache,
        handle: PipelineHandle,
    ) -> Result<(), ResourceError> {
        if self.current == Some(handle.0) {
            return Ok(());
        }
        let incoming = self
            .slots
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| PipelineError::NotFound(format!("#{}", handle.0)))?;
        if incoming.role() == PipelineRole::PostFx {
            return Err(PipelineError::NotBatchable(incoming.name().to_string()).into());
        }

        if let Some(outgoing) = self.current.and_then(|i| self.slots[i].as_mut()) {
            outgoing.flush(state, FlushReason::PipelineSwitch)?;
        }
        self.previous = self.current;
        self.current = Some(handle.0);
        if let Some(pipeline) = self.slots[handle.0].as_mut() {
            pipeline.bind(state)?;
        }
        Ok(())
    }

    /// Makes the previous pipeline current again.
    pub fn rebind_previous(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        match self.previous {
            Some(index) => self.set_current_handle(state, PipelineHandle(index)),
            None => Ok(()),
        }
    }

    /// Flushes the current pipeline and leaves no pipeline current.
    pub fn clear_current(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        self.flush_current(state, FlushReason::PassBoundary)?;
        self.previous = self.current.take();
        Ok(())
    }

    /// The current pipeline.
    pub fn current(&self) -> Option<&Pipeline> {
        self.current.and_then(|i| self.slots[i].as_ref())
    }

    /// The current pipeline.
    pub fn current_mut(&mut self) -> Option<&mut Pipeline> {
        self.current.and_then(|i| self.slots[i].as_mut())
    }

    /// The handle of the current pipeline.
    pub fn current_handle(&self) -> Option<PipelineHandle> {
        self.current.map(PipelineHandle)
    }

    // --- Frame-wide operations ---

    /// Flushes the current pipeline.
    pub fn flush_current(
        &mut self,
        state: &mut GpuStateCache,
        reason: FlushReason,
    ) -> Result<bool, ResourceError> {
        match self.current_mut() {
            Some(pipeline) => pipeline.flush(state, reason),
            None => Ok(false),
        }
    }

    /// Flushes every pipeline in registration order.
    pub fn flush_all(
        &mut self,
        state: &mut GpuStateCache,
        reason: FlushReason,
    ) -> Result<(), ResourceError> {
        for pipeline in self.slots.iter_mut().flatten() {
            pipeline.flush(state, reason)?;
        }
        Ok(())
    }

    /// Runs every pipeline's pre-render hooks.
    pub fn pre_render(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        for pipeline in self.slots.iter_mut().flatten() {
            pipeline.pre_render(state)?;
        }
        Ok(())
    }

    /// Runs every pipeline's post-render hooks.
    pub fn post_render(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        for pipeline in self.slots.iter_mut().flatten() {
            pipeline.post_render(state)?;
        }
        Ok(())
    }

    /// Resizes every pipeline and runs their resize hooks.
    pub fn resize(
        &mut self,
        state: &mut GpuStateCache,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceError> {
        for pipeline in self.slots.iter_mut().flatten() {
            pipeline.resize(state, width, height)?;
        }
        Ok(())
    }

    /// Points every pipeline at a `width` x `height` surface.
    /// Used when a render target is bound. No pipeline may hold pending vertices.
    pub fn set_projection(&mut self, width: u32, height: u32) {
        for pipeline in self.slots.iter_mut().flatten() {
            pipeline.set_projection(width, height);
        }
    }

    // --- Context loss ---

    /// Forgets every pipeline's GPU handles.
    pub fn invalidate_all(&mut self) {
        for pipeline in self.slots.iter_mut().flatten() {
            pipeline.invalidate();
        }
        self.current = None;
        self.previous = None;
    }

    /// Rebuilds every pipeline. Returns the names of the pipelines left broken.
    pub fn recreate_all(
        &mut self,
        state: &mut GpuStateCache,
    ) -> Result<Vec<String>, ResourceError> {
        let mut broken = Vec::new();
        for pipeline in self.slots.iter_mut().flatten() {
            if pipeline.recreate(state)? == PipelineStatus::Broken {
                broken.push(pipeline.name().to_string());
            }
        }
        Ok(broken)
    }

    /// Destroys every pipeline.
    pub fn destroy_all(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        for mut pipeline in self.slots.drain(..).flatten() {
            pipeline.destroy(state)?;
        }
        self.names.clear();
        self.current = None;
        self.previous = None;
        Ok(())
    }
}
