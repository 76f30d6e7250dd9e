// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
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

//! Renderer error types
use thiserror::Error;

/// Result type for renderer operations
pub type Result<T> = std::result::Result<T, RendererError>;

/// Main error type for the hardware renderer
///
/// Culled primitives and feature downgrades are not errors; they are
/// logged and rendering continues. Everything in here is fatal for the
/// rendering configuration that produced it.
#[derive(Error, Debug)]
pub enum RendererError {
    #[error("Failed to compile pipeline '{name}': {source}")]
    PipelineCompilation {
        name: String,
        #[source]
        source: DeviceError,
    },

    #[error("Failed to create {what}: {source}")]
    ResourceCreation {
        what: &'static str,
        #[source]
        source: DeviceError,
    },

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error(
        "Save state VRAM mismatch: expected {expected_width}x{expected_height}x{expected_samples}, \
         got {got_width}x{got_height}x{got_samples}"
    )]
    SaveStateMismatch {
        expected_width: u32,
        expected_height: u32,
        expected_samples: u32,
        got_width: u32,
        got_height: u32,
        got_samples: u32,
    },

    #[error("Incompatible save state version: expected {expected}, got {got}")]
    IncompatibleSaveState { expected: u32, got: u32 },

    #[error("Corrupt save state: {0}")]
    CorruptSaveState(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Save state encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Save state decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("Software renderer error: {0}")]
    SoftwareRenderer(String),
}

/// Errors reported by a [`GpuDevice`](crate::core::device::GpuDevice) backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Out of device memory allocating {width}x{height} texture")]
    OutOfMemory { width: u32, height: u32 },

    #[error("Invalid texture dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Shader compilation failed: {0}")]
    ShaderCompilation(String),

    #[error("Unknown resource handle: {0}")]
    InvalidHandle(u32),

    #[error("Region ({x}, {y}, {width}x{height}) is outside the resource")]
    InvalidRegion {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}
