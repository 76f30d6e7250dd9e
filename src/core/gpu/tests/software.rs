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

//! Readbacks through the software renderer

use super::{full_drawing_area, renderer, renderer_with, write_all};
use crate::core::config::RendererSettings;
use crate::core::gpu::VRAM_WIDTH;

fn software_settings() -> RendererSettings {
    RendererSettings {
        use_software_renderer_for_readbacks: true,
        ..Default::default()
    }
}

#[test]
fn test_drawn_triangle_is_visible_to_readbacks() {
    let mut renderer = renderer_with(software_settings());
    assert!(renderer.is_software_renderer_active());
    full_drawing_area(&mut renderer);

    write_all(&mut renderer, &[0x2000_00FF, 0x0000_0000, 0x0000_0010, 0x0010_0000]);

    let vram = renderer.vram_contents().unwrap();
    let width = VRAM_WIDTH as usize;
    assert_eq!(vram[width + 1], 0x001F);
    assert_eq!(vram[15 * width + 15], 0);
}

#[test]
fn test_gpuread_sees_software_vram() {
    let mut renderer = renderer_with(software_settings());
    full_drawing_area(&mut renderer);

    // Flat blue 8×8 sprite at (4, 4)
    write_all(&mut renderer, &[0x70FF_0000, 0x0004_0004]);
    write_all(&mut renderer, &[0xC000_0000, 0x0004_0003, 0x0001_0002]);
    assert_eq!(renderer.read_gpuread(), 0x7C00_0000);
}

#[test]
fn test_enabling_later_copies_device_vram() {
    let mut renderer = renderer();
    write_all(&mut renderer, &[0x0200_FF00, 0x0000_0010, 0x0008_0010]);

    renderer.update_settings(software_settings()).unwrap();
    assert!(renderer.is_software_renderer_active());

    let vram = renderer.vram_contents().unwrap();
    assert_eq!(vram[16], 0x03E0);
    assert_eq!(vram[7 * VRAM_WIDTH as usize + 31], 0x03E0);
    assert_eq!(vram[8 * VRAM_WIDTH as usize + 16], 0);
}

#[test]
fn test_disabling_hands_vram_back() {
    let mut renderer = renderer_with(software_settings());
    full_drawing_area(&mut renderer);
    write_all(&mut renderer, &[0x6800_00FF, 0x0000_0000]);

    renderer.update_settings(RendererSettings::default()).unwrap();
    assert!(!renderer.is_software_renderer_active());

    // The shadow holds what the worker drew until the next readback.
    let vram = renderer.vram_contents_unsynced();
    assert_eq!(vram[0], 0x001F);
}
