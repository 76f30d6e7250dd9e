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

//! Renderer core components
//!
//! - Configuration and error types
//! - The device abstraction and its headless reference backend
//! - The hardware renderer and its GP0/GP1 front end
//! - The software fallback renderer
//! - VRAM snapshots for save states

pub mod config;
pub mod device;
pub mod error;
pub mod gpu;
pub mod save_state;
pub mod software;

// Re-export commonly used types
pub use config::RendererSettings;
pub use device::{GpuDevice, HeadlessDevice};
pub use error::{RendererError, Result};
pub use gpu::HardwareRenderer;
pub use save_state::VramSnapshot;
