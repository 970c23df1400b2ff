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

//! Shader programs and their uniform dispatch table.
//!
//! After linking, every active uniform is paired with a setter chosen from a
//! static table indexed by [`UniformKind`]. Setting a uniform is a hash
//! lookup, a cache comparison and one indirect call. There is no per-call
//! string matching on the type.

use super::gpu_state::GpuStateCache;
use ahash::{AHashMap, AHashSet};
use prism_core::renderer::{
    GraphicsDevice, ProgramDescriptor, ProgramId, ResourceError, ShaderError, UniformKind,
    UniformLocation, UniformValue,
};
use std::borrow::Cow;
use std::fmt;

/// Uploads a value to one uniform location.
/// Returns `None` when the value's shape does not fit the uniform.
type UniformSetter = fn(
    &dyn GraphicsDevice,
    UniformLocation,
    usize,
    &UniformValue,
) -> Option<Result<(), ResourceError>>;

fn set_floats<const N: u8>(
    device: &dyn GraphicsDevice,
    location: UniformLocation,
    array_len: usize,
    value: &UniformValue,
) -> Option<Result<(), ResourceError>> {
    let data: &[f32] = match value {
        UniformValue::Float(v) => std::slice::from_ref(v),
        UniformValue::Vec2(v) => v,
        UniformValue::Vec3(v) => v,
        UniformValue::Vec4(v) => v,
        UniformValue::FloatArray(v) => v,
        _ => return None,
    };
    let n = N as usize;
    if data.is_empty() || data.len() % n != 0 || data.len() / n > array_len {
        return None;
    }
    Some(device.uniform_floats(location, N, data))
}

fn set_ints<const N: u8>(
    device: &dyn GraphicsDevice,
    location: UniformLocation,
    array_len: usize,
    value: &UniformValue,
) -> Option<Result<(), ResourceError>> {
    let data: &[i32] = match value {
        UniformValue::Int(v) => std::slice::from_ref(v),
        UniformValue::IVec2(v) => v,
        UniformValue::IVec3(v) => v,
        UniformValue::IVec4(v) => v,
        UniformValue::IntArray(v) => v,
        _ => return None,
    };
    let n = N as usize;
    if data.is_empty() || data.len() % n != 0 || data.len() / n > array_len {
        return None;
    }
    Some(device.uniform_ints(location, N, data))
}

fn set_matrix<const N: u8>(
    device: &dyn GraphicsDevice,
    location: UniformLocation,
    _array_len: usize,
    value: &UniformValue,
) -> Option<Result<(), ResourceError>> {
    let data: &[f32] = match (N, value) {
        (2, UniformValue::Mat2(m)) => m,
        (3, UniformValue::Mat3(m)) => m,
        (4, UniformValue::Mat4(m)) => m,
        (_, UniformValue::FloatArray(v)) if v.len() == (N * N) as usize => v,
        _ => return None,
    };
    Some(device.uniform_matrix(location, N, data))
}

/// One setter per [`UniformKind`], in declaration order.
static DISPATCH: [UniformSetter; 13] = [
    set_floats::<1>,
    set_floats::<2>,
    set_floats::<3>,
    set_floats::<4>,
    set_ints::<1>,
    set_ints::<2>,
    set_ints::<3>,
    set_ints::<4>,
    set_ints::<1>,
    set_matrix::<2>,
    set_matrix::<3>,
    set_matrix::<4>,
    set_ints::<1>,
];

fn setter_for(kind: UniformKind) -> UniformSetter {
    DISPATCH[kind as usize]
}

struct UniformSlot {
    location: UniformLocation,
    kind: UniformKind,
    array_len: usize,
    setter: UniformSetter,
    cached: Option<UniformValue>,
}

impl fmt::Debug for UniformSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniformSlot")
            .field("location", &self.location)
            .field("kind", &self.kind)
            .field("array_len", &self.array_len)
            .field("cached", &self.cached)
            .finish()
    }
}

/// What [`ShaderProgram::set_uniform`] did with a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformOutcome {
    /// The value reached the device.
    Uploaded,
    /// The uniform already held this value.
    Unchanged,
    /// The program has no active uniform with that name.
    Unknown,
    /// The value's shape does not match the declaration.
    Rejected,
}

/// A linked program, the sources it was built from and its uniform table.
#[derive(Debug)]
pub struct ShaderProgram {
    label: String,
    vertex_source: String,
    fragment_source: String,
    program: Option<ProgramId>,
    uniforms: AHashMap<String, UniformSlot>,
    reported_unknown: AHashSet<String>,
}

impl ShaderProgram {
    /// Compiles and links a program, then builds its uniform table.
    /// ## Errors
    /// * `ResourceError::Shader` - With the driver's info log if a stage fails.
    pub fn compile(
        device: &dyn GraphicsDevice,
        label: impl Into<String>,
        vertex_source: impl Into<String>,
        fragment_source: impl Into<String>,
    ) -> Result<Self, ResourceError> {
        let mut shader = Self {
            label: label.into(),
            vertex_source: vertex_source.into(),
            fragment_source: fragment_source.into(),
            program: None,
            uniforms: AHashMap::new(),
            reported_unknown: AHashSet::new(),
        };
        shader.link(device)?;
        Ok(shader)
    }

    fn link(&mut self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        let id = device.create_program(&ProgramDescriptor {
            label: Cow::Borrowed(&self.label),
            vertex_source: Cow::Borrowed(&self.vertex_source),
            fragment_source: Cow::Borrowed(&self.fragment_source),
        })?;
        let active = match device.active_uniforms(id) {
            Ok(active) => active,
            Err(e) => {
                let _ = device.destroy_program(id);
                return Err(e);
            }
        };
        self.uniforms = active
            .into_iter()
            .map(|u| {
                let slot = UniformSlot {
                    location: u.location,
                    kind: u.kind,
                    array_len: u.array_len.max(1),
                    setter: setter_for(u.kind),
                    cached: None,
                };
                (u.name, slot)
            })
            .collect();
        self.program = Some(id);
        log::debug!(
            "Shader '{}' linked with {} active uniforms",
            self.label,
            self.uniforms.len()
        );
        Ok(())
    }

    /// The label given at compile time.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The linked program, or `None` after invalidation.
    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    /// `true` if the program has an active uniform called `name`.
    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains_key(name)
    }

    /// The declared kind of an active uniform.
    pub fn uniform_kind(&self, name: &str) -> Option<UniformKind> {
        self.uniforms.get(name).map(|s| s.kind)
    }

    /// `true` if setting `value` would reach the device.
    pub fn would_change(&self, name: &str, value: &UniformValue) -> bool {
        self.uniforms
            .get(name)
            .is_some_and(|s| s.cached.as_ref() != Some(value))
    }

    /// Makes this program active.
    pub fn bind(&self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        let program = self.program.ok_or(ResourceError::InvalidHandle)?;
        state.use_program(program)?;
        Ok(())
    }

    /// Sets a uniform, binding the program if needed.
    ///
    /// An unknown name is not an error: shaders compile away unused uniforms,
    /// so the first miss is logged at debug level and later misses are silent.
    /// A value of the wrong shape is refused with a warning.
    pub fn set_uniform(
        &mut self,
        state: &mut GpuStateCache,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> Result<UniformOutcome, ResourceError> {
        let program = self.program.ok_or(ResourceError::InvalidHandle)?;
        let value = value.into();
        let Some(slot) = self.uniforms.get_mut(name) else {
            if self.reported_unknown.insert(name.to_string()) {
                log::debug!("Shader '{}' has no active uniform '{name}'", self.label);
            }
            return Ok(UniformOutcome::Unknown);
        };
        if slot.cached.as_ref() == Some(&value) {
            return Ok(UniformOutcome::Unchanged);
        }
        state.use_program(program)?;
        match (slot.setter)(state.device().as_ref(), slot.location, slot.array_len, &value) {
            Some(result) => {
                result?;
                slot.cached = Some(value);
                Ok(UniformOutcome::Uploaded)
            }
            None => {
                let err = ShaderError::UniformMismatch {
                    name: name.to_string(),
                    expected: format!("{:?}", slot.kind),
                    found: value.shape_name().to_string(),
                };
                log::warn!("Shader '{}': {err}", self.label);
                Ok(UniformOutcome::Rejected)
            }
        }
    }

    /// Forgets the program without touching the device. Used on context loss.
    pub fn invalidate(&mut self) {
        self.program = None;
        self.uniforms.clear();
    }

    /// Replaces the fragment stage used by the next [`recreate`](Self::recreate).
    pub fn set_fragment_source(&mut self, source: impl Into<String>) {
        self.fragment_source = source.into();
    }

    /// The fragment stage the program is linked from.
    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    /// Relinks from the retained sources. Locations may differ from before.
    pub fn recreate(&mut self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        self.invalidate();
        self.link(device)
    }

    /// Releases the program.
    pub fn destroy(&mut self, state: &mut GpuStateCache) -> Result<(), ResourceError> {
        if let Some(id) = self.program.take() {
            state.forget_program(id);
            self.uniforms.clear();
            state.device().destroy_program(id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_infra::graphics::headless::{GpuCommand, UniformData};
    use prism_infra::RecordingDevice;
    use std::sync::Arc;

    const VS: &str = "
        uniform mat4 uProjectionMatrix;
        uniform vec2 uResolution;
        attribute vec2 inPosition;
        void main() { gl_Position = uProjectionMatrix * vec4(inPosition, 0.0, 1.0); }";
    const FS: &str = "
        precision mediump float;
        uniform sampler2D uMainSampler[4];
        uniform float uTime;
        uniform bool uInvert;
        void main() { gl_FragColor = vec4(uTime); }";

    fn setup() -> (RecordingDevice, GpuStateCache, ShaderProgram) {
        let device = RecordingDevice::default();
        let state = GpuStateCache::new(Arc::new(device.clone()));
        let shader =
            ShaderProgram::compile(state.device().as_ref(), "test", VS, FS).expect("compile");
        (device, state, shader)
    }

    fn uploads(device: &RecordingDevice) -> Vec<UniformData> {
        device
            .commands()
            .into_iter()
            .filter_map(|c| match c {
                GpuCommand::SetUniform { data, .. } => Some(data),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn dispatch_table_follows_kind_order() {
        let device = RecordingDevice::default();
        let loc = UniformLocation(0);
        let float = UniformValue::Float(1.0);
        let int = UniformValue::Int(1);
        assert!(setter_for(UniformKind::Float)(&device, loc, 1, &int).is_none());
        assert!(setter_for(UniformKind::Sampler2D)(&device, loc, 1, &float).is_none());
        assert!(setter_for(UniformKind::Bool)(&device, loc, 1, &float).is_none());
        assert!(setter_for(UniformKind::Vec2)(&device, loc, 1, &UniformValue::Vec4([0.0; 4]))
            .is_none());
        assert!(setter_for(UniformKind::Mat3)(&device, loc, 1, &UniformValue::Mat4([0.0; 16]))
            .is_none());
        // Shape accepted, upload fails because nothing is bound.
        assert!(setter_for(UniformKind::Mat4)(&device, loc, 1, &UniformValue::Mat4([0.0; 16]))
            .is_some());
    }

    #[test]
    fn equal_values_are_not_uploaded_twice() {
        let (device, mut state, mut shader) = setup();
        assert_eq!(
            shader.set_uniform(&mut state, "uTime", 1.5_f32).expect("set"),
            UniformOutcome::Uploaded
        );
        assert_eq!(
            shader.set_uniform(&mut state, "uTime", 1.5_f32).expect("set"),
            UniformOutcome::Unchanged
        );
        assert_eq!(
            shader.set_uniform(&mut state, "uTime", 2.0_f32).expect("set"),
            UniformOutcome::Uploaded
        );
        assert_eq!(uploads(&device).len(), 2);
    }

    #[test]
    fn unknown_uniforms_are_a_no_op() {
        let (device, mut state, mut shader) = setup();
        for _ in 0..3 {
            assert_eq!(
                shader.set_uniform(&mut state, "uMissing", 1.0_f32).expect("set"),
                UniformOutcome::Unknown
            );
        }
        assert!(uploads(&device).is_empty());
        assert!(!shader.has_uniform("uMissing"));
    }

    #[test]
    fn mismatched_values_are_rejected() {
        let (device, mut state, mut shader) = setup();
        assert_eq!(
            shader.set_uniform(&mut state, "uTime", 3_i32).expect("set"),
            UniformOutcome::Rejected
        );
        assert_eq!(
            shader
                .set_uniform(&mut state, "uMainSampler", UniformValue::IntArray(vec![0; 5]))
                .expect("set"),
            UniformOutcome::Rejected
        );
        assert!(uploads(&device).is_empty());
    }

    #[test]
    fn sampler_arrays_and_bools_take_ints() {
        let (device, mut state, mut shader) = setup();
        shader
            .set_uniform(&mut state, "uMainSampler", UniformValue::IntArray(vec![0, 1, 2, 3]))
            .expect("samplers");
        shader.set_uniform(&mut state, "uInvert", 1_i32).expect("bool");
        let data = uploads(&device);
        assert_eq!(data[0].ints(), Some(&[0, 1, 2, 3][..]));
        assert_eq!(data[1].ints(), Some(&[1][..]));
    }

    #[test]
    fn recreate_relinks_and_clears_the_cache() {
        let (device, mut state, mut shader) = setup();
        shader.set_uniform(&mut state, "uTime", 1.0_f32).expect("set");
        let old = shader.program();
        device.lose_context();
        shader.invalidate();
        state.invalidate();
        assert!(shader.set_uniform(&mut state, "uTime", 1.0_f32).is_err());
        device.restore_context();
        shader.recreate(state.device().as_ref()).expect("recreate");
        assert_ne!(shader.program(), old);
        assert_eq!(
            shader.set_uniform(&mut state, "uTime", 1.0_f32).expect("set"),
            UniformOutcome::Uploaded
        );
    }

    #[test]
    fn broken_sources_report_the_log() {
        let device = RecordingDevice::default();
        let err = ShaderProgram::compile(&device, "bad", VS, "#error oops\nvoid main() {}")
            .unwrap_err();
        assert!(err.to_string().contains("oops"));
    }
}
