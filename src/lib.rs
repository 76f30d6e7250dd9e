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

//! Hardware-accelerated PlayStation GPU renderer core
//!
//! Translates the console's GPU command stream into batched draws on a host
//! graphics device, at an internal resolution that may be a multiple of the
//! native 1024×512 VRAM. The graphics API itself sits behind the
//! [`GpuDevice`](core::device::GpuDevice) trait.
//!
//! # Example
//!
//! ```
//! use psrx_hw::core::{HardwareRenderer, HeadlessDevice, RendererSettings};
//!
//! let mut renderer = HardwareRenderer::new(HeadlessDevice::default(), RendererSettings::default()).unwrap();
//!
//! // Fill a 16x16 block with red, then read it back
//! renderer.write_gp0(0x0200_00FF);
//! renderer.write_gp0(0x0000_0000);
//! renderer.write_gp0(0x0010_0010);
//! let vram = renderer.vram_contents().unwrap();
//! assert_eq!(vram[0], 0x001F);
//! ```

pub mod core;
