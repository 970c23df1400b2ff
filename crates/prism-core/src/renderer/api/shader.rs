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

//! Shader program descriptors and uniform reflection types.

use super::resource::UniformLocation;
use std::borrow::Cow;
use std::fmt;

/// A programmable stage of a shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// The vertex stage.
    Vertex,
    /// The fragment stage.
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Describes a program to be compiled and linked by the `GraphicsDevice`.
///
/// Sources are GLSL ES 1.00 (WebGL 1 / OpenGL ES 2).
#[derive(Debug, Clone)]
pub struct ProgramDescriptor<'a> {
    /// A label used in logs and errors.
    pub label: Cow<'a, str>,
    /// The vertex shader source.
    pub vertex_source: Cow<'a, str>,
    /// The fragment shader source.
    pub fragment_source: Cow<'a, str>,
}

/// The GLSL type of an active uniform, as reported by reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    /// `float`
    Float,
    /// `vec2`
    Vec2,
    /// `vec3`
    Vec3,
    /// `vec4`
    Vec4,
    /// `int`
    Int,
    /// `ivec2`
    IVec2,
    /// `ivec3`
    IVec3,
    /// `ivec4`
    IVec4,
    /// `bool`, uploaded as an int.
    Bool,
    /// `mat2`
    Mat2,
    /// `mat3`
    Mat3,
    /// `mat4`
    Mat4,
    /// `sampler2D`, uploaded as the int index of a texture unit.
    Sampler2D,
}

impl UniformKind {
    /// Maps a GLSL type name to its kind.
    pub fn from_glsl(name: &str) -> Option<Self> {
        Some(match name {
            "float" => UniformKind::Float,
            "vec2" => UniformKind::Vec2,
            "vec3" => UniformKind::Vec3,
            "vec4" => UniformKind::Vec4,
            "int" => UniformKind::Int,
            "ivec2" => UniformKind::IVec2,
            "ivec3" => UniformKind::IVec3,
            "ivec4" => UniformKind::IVec4,
            "bool" => UniformKind::Bool,
            "mat2" => UniformKind::Mat2,
            "mat3" => UniformKind::Mat3,
            "mat4" => UniformKind::Mat4,
            "sampler2D" => UniformKind::Sampler2D,
            _ => return None,
        })
    }

    /// The number of scalars in one element of this kind.
    pub const fn scalar_count(self) -> usize {
        match self {
            UniformKind::Float | UniformKind::Int | UniformKind::Bool | UniformKind::Sampler2D => 1,
            UniformKind::Vec2 | UniformKind::IVec2 => 2,
            UniformKind::Vec3 | UniformKind::IVec3 => 3,
            UniformKind::Vec4 | UniformKind::IVec4 | UniformKind::Mat2 => 4,
            UniformKind::Mat3 => 9,
            UniformKind::Mat4 => 16,
        }
    }
}

/// A uniform reported by the device after a program is linked.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveUniform {
    /// The uniform name. Arrays are reported by their base name without `[0]`.
    pub name: String,
    /// The element type.
    pub kind: UniformKind,
    /// The number of array elements, 1 for non-arrays.
    pub array_len: usize,
    /// Where to upload it.
    pub location: UniformLocation,
}

/// A value to upload to a uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// A single `float`.
    Float(f32),
    /// A `vec2`.
    Vec2([f32; 2]),
    /// A `vec3`.
    Vec3([f32; 3]),
    /// A `vec4`.
    Vec4([f32; 4]),
    /// A single `int`, `bool` or `sampler2D`.
    Int(i32),
    /// An `ivec2`.
    IVec2([i32; 2]),
    /// An `ivec3`.
    IVec3([i32; 3]),
    /// An `ivec4`.
    IVec4([i32; 4]),
    /// A column-major `mat2`.
    Mat2([f32; 4]),
    /// A column-major `mat3`.
    Mat3([f32; 9]),
    /// A column-major `mat4`.
    Mat4([f32; 16]),
    /// A flat array of float elements, for `float[N]` or `vecN[M]` uniforms.
    FloatArray(Vec<f32>),
    /// A flat array of int elements, for `int[N]` or `sampler2D[N]` uniforms.
    IntArray(Vec<i32>),
}

impl UniformValue {
    /// A short name of the value's shape, used in warnings.
    pub fn shape_name(&self) -> &'static str {
        match self {
            UniformValue::Float(_) => "float",
            UniformValue::Vec2(_) => "vec2",
            UniformValue::Vec3(_) => "vec3",
            UniformValue::Vec4(_) => "vec4",
            UniformValue::Int(_) => "int",
            UniformValue::IVec2(_) => "ivec2",
            UniformValue::IVec3(_) => "ivec3",
            UniformValue::IVec4(_) => "ivec4",
            UniformValue::Mat2(_) => "mat2",
            UniformValue::Mat3(_) => "mat3",
            UniformValue::Mat4(_) => "mat4",
            UniformValue::FloatArray(_) => "float[]",
            UniformValue::IntArray(_) => "int[]",
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        UniformValue::Vec4(v)
    }
}
