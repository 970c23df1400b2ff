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

//! Defines the hierarchy of error types for the rendering subsystem.
//!
//! Buffer and texture-unit exhaustion never show up here: pipelines resolve
//! them by flushing. What remains are shader failures, pipeline registry
//! misuse, resource failures and the fatal loss of the GPU context.

use crate::renderer::api::shader::ShaderStage;
use std::fmt;

/// An error related to the compilation or linking of a shader program.
#[derive(Debug)]
pub enum ShaderError {
    /// One stage failed to compile.
    CompilationError {
        /// The label of the program being built.
        label: String,
        /// The stage that failed.
        stage: ShaderStage,
        /// The driver's info log.
        log: String,
    },
    /// Both stages compiled but the program failed to link.
    LinkError {
        /// The label of the program being built.
        label: String,
        /// The driver's info log.
        log: String,
    },
    /// A uniform was given a value whose shape does not match its declaration.
    UniformMismatch {
        /// The uniform name.
        name: String,
        /// The declared GLSL type.
        expected: String,
        /// The shape of the value that was supplied.
        found: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CompilationError { label, stage, log } => {
                write!(f, "Shader compilation failed for '{label}' ({stage} stage): {log}")
            }
            ShaderError::LinkError { label, log } => {
                write!(f, "Program link failed for '{label}': {log}")
            }
            ShaderError::UniformMismatch {
                name,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Uniform '{name}' is declared as {expected} but was given {found}"
                )
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the registration or use of a pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// A pipeline with this name is already registered.
    Duplicate(String),
    /// No pipeline is registered under this name.
    NotFound(String),
    /// A single primitive does not fit in the pipeline's vertex buffer.
    BatchTooLarge {
        /// The pipeline name.
        pipeline: String,
        /// The number of vertices that had to stay together.
        requested: usize,
        /// The capacity of the pipeline's buffer in vertices.
        capacity: usize,
    },
    /// The vertex layout is unusable.
    InvalidLayout(String),
    /// The pipeline cannot batch Game Objects (post-FX pipelines).
    NotBatchable(String),
    /// The pipeline's vertex buffer refused a write or a resize.
    VertexBuffer(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Duplicate(name) => {
                write!(f, "A pipeline named '{name}' is already registered")
            }
            PipelineError::NotFound(name) => write!(f, "No pipeline named '{name}'"),
            PipelineError::BatchTooLarge {
                pipeline,
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "Pipeline '{pipeline}' cannot fit {requested} vertices (capacity {capacity})"
                )
            }
            PipelineError::InvalidLayout(msg) => write!(f, "Invalid vertex layout: {msg}"),
            PipelineError::NotBatchable(name) => {
                write!(f, "Pipeline '{name}' is a post-FX pipeline and cannot batch objects")
            }
            PipelineError::VertexBuffer(msg) => write!(f, "Vertex buffer error: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}

/// An error related to the creation or use of a GPU resource (buffers, textures, etc.).
#[derive(Debug)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
    /// A generic resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
    /// An attempt was made to access a resource out of its bounds (e.g., in a buffer).
    OutOfBounds,
    /// The GPU context is lost. Every handle is dead until it is restored.
    ContextLost,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
            ResourceError::OutOfBounds => {
                write!(f, "Resource access out of bounds.")
            }
            ResourceError::ContextLost => write!(f, "The graphics context is lost."),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// A high-level error that can occur within the renderer.
#[derive(Debug)]
pub enum RenderError {
    /// An operation was attempted before the renderer was initialized.
    NotInitialized,
    /// A failure occurred while building the renderer's resources.
    InitializationFailed(String),
    /// The renderer configuration could not be parsed or is out of range.
    InvalidConfig(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// The graphics context was lost. Rendering stops until it is restored.
    DeviceLost,
    /// A camera's render target is missing or was invalidated mid-frame.
    RenderTargetLost(String),
    /// A frame lifecycle method was called out of order.
    FrameState(String),
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl RenderError {
    /// Returns `true` for errors that mean the GPU context must be rebuilt.
    pub fn is_context_loss(&self) -> bool {
        matches!(
            self,
            RenderError::DeviceLost
                | RenderError::RenderTargetLost(_)
                | RenderError::ResourceError(ResourceError::ContextLost)
        )
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => {
                write!(f, "The renderer is not initialized.")
            }
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize the renderer: {msg}")
            }
            RenderError::InvalidConfig(msg) => {
                write!(f, "Invalid renderer configuration: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::DeviceLost => write!(
                f,
                "The graphics context was lost and needs to be restored."
            ),
            RenderError::RenderTargetLost(name) => {
                write!(f, "Render target '{name}' is missing or invalid")
            }
            RenderError::FrameState(msg) => write!(f, "Frame lifecycle misuse: {msg}"),
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::ContextLost => RenderError::DeviceLost,
            other => RenderError::ResourceError(other),
        }
    }
}

impl From<PipelineError> for RenderError {
    fn from(err: PipelineError) -> Self {
        RenderError::ResourceError(ResourceError::Pipeline(err))
    }
}

impl From<ShaderError> for RenderError {
    fn from(err: ShaderError) -> Self {
        RenderError::ResourceError(ResourceError::Shader(err))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::CompilationError {
            label: "MultiPipeline".to_string(),
            stage: ShaderStage::Fragment,
            log: "ERROR: 0:5: syntax error".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Shader compilation failed for 'MultiPipeline' (fragment stage): ERROR: 0:5: syntax error"
        );
    }

    #[test]
    fn resource_error_display_wrapping_pipeline_error() {
        let res_err: ResourceError = PipelineError::Duplicate("Sprite".to_string()).into();
        assert_eq!(
            format!("{res_err}"),
            "Pipeline resource error: A pipeline named 'Sprite' is already registered"
        );
        assert!(res_err.source().is_some());
    }

    #[test]
    fn context_lost_resource_error_becomes_device_lost() {
        let err: RenderError = ResourceError::ContextLost.into();
        assert!(matches!(err, RenderError::DeviceLost));
        assert!(err.is_context_loss());
        assert!(RenderError::RenderTargetLost("rt".to_string()).is_context_loss());
        assert!(!RenderError::FrameState("x".to_string()).is_context_loss());
    }

    #[test]
    fn render_error_wraps_shader_error_with_source() {
        let err: RenderError = ShaderError::LinkError {
            label: "p".to_string(),
            log: "bad".to_string(),
        }
        .into();
        assert!(err.source().is_some());
        assert_eq!(
            format!("{err}"),
            "Graphics resource operation failed: Shader resource error: Program link failed for 'p': bad"
        );
    }
}
