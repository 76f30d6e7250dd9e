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

//! Renderer integration tests
//!
//! Everything here drives a [`HardwareRenderer`](super::HardwareRenderer)
//! on the headless device through its public entry points:
//! - `basic`: construction, reset, status bits and creation failures
//! - `batching`: batch flushing, two-pass draws and the depth counter
//! - `gp0_commands`: command decoding into vertices and passes
//! - `vram`: fills, uploads, copies and readbacks through GPUREAD
//! - `settings`: live settings changes and notices
//! - `software`: the software readback renderer
//! - `snapshots`: save state files

mod batching;
mod gp0_commands;
mod settings;
mod snapshots;
mod software;
mod vram;

use super::HardwareRenderer;
use crate::core::config::RendererSettings;
use crate::core::device::HeadlessDevice;

fn renderer() -> HardwareRenderer<HeadlessDevice> {
    renderer_with(RendererSettings::default())
}

fn renderer_with(settings: RendererSettings) -> HardwareRenderer<HeadlessDevice> {
    HardwareRenderer::new(HeadlessDevice::default(), settings).unwrap()
}

/// Open the drawing area to all of VRAM
fn full_drawing_area(renderer: &mut HardwareRenderer<HeadlessDevice>) {
    renderer.write_gp0(0xE300_0000);
    renderer.write_gp0(0xE400_0000 | (511 << 10) | 1023);
}

fn write_all(renderer: &mut HardwareRenderer<HeadlessDevice>, words: &[u32]) {
    for &word in words {
        renderer.write_gp0(word);
    }
}
