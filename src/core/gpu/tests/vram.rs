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

//! VRAM transfer tests
//!
//! Fills and uploads land anywhere in VRAM, including footprints that wrap
//! past the right or bottom edge, and must read back exactly.

use super::{full_drawing_area, renderer, write_all};
use crate::core::device::{DeviceCommand, HeadlessDevice, ShaderKey};
use crate::core::gpu::{
    rgba8888_to_rgba5551, vram_transfer_bounds, HardwareRenderer, VRAM_HEIGHT, VRAM_WIDTH,
};
use proptest::prelude::*;

fn index(x: u32, y: u32) -> usize {
    ((y % VRAM_HEIGHT) * VRAM_WIDTH + (x % VRAM_WIDTH)) as usize
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn fill_reads_back_and_marks_dirty(
        x in 0u32..VRAM_WIDTH,
        y in 0u32..VRAM_HEIGHT,
        width in 1u32..48,
        height in 1u32..48,
        color in 0u32..0x0100_0000,
    ) {
        let mut renderer = renderer();
        renderer.fill_vram(x, y, width, height, color);
        prop_assert_eq!(renderer.dirty_rect(), vram_transfer_bounds(x, y, width, height));

        renderer.read_vram(x, y, width, height).unwrap();
        let expected = rgba8888_to_rgba5551(color);
        let vram = renderer.with_vram(|vram| vram.to_vec()).unwrap();
        prop_assert_eq!(vram[index(x, y)], expected);
        prop_assert_eq!(vram[index(x + width - 1, y + height - 1)], expected);
        prop_assert_eq!(vram[index(x + width, y)], 0);
        prop_assert_eq!(vram[index(x, y + height)], 0);
    }

    #[test]
    fn upload_round_trips_through_gpuread(
        x in 0u32..VRAM_WIDTH,
        y in 0u32..VRAM_HEIGHT,
        width in 1u32..24,
        height in 1u32..24,
        seed in any::<u16>(),
    ) {
        let mut renderer = renderer();
        let pixels: Vec<u16> = (0..width * height)
            .map(|i| seed.wrapping_add(i as u16).wrapping_mul(0x9E37))
            .collect();

        let rect = (y << 16) | x;
        let size = (height << 16) | width;
        renderer.write_gp0(0xA000_0000);
        renderer.write_gp0(rect);
        renderer.write_gp0(size);
        for pair in pixels.chunks(2) {
            let low = pair[0] as u32;
            let high = pair.get(1).copied().unwrap_or(0) as u32;
            renderer.write_gp0(low | (high << 16));
        }

        renderer.write_gp0(0xC000_0000);
        renderer.write_gp0(rect);
        renderer.write_gp0(size);
        let mut read = Vec::with_capacity(pixels.len());
        while read.len() < pixels.len() {
            let word = renderer.read_gpuread();
            read.push(word as u16);
            read.push((word >> 16) as u16);
        }
        read.truncate(pixels.len());
        prop_assert_eq!(read, pixels);
    }
}

#[test]
fn test_wrapped_copy_moves_every_pixel() {
    let mut renderer = renderer();
    let pixels: Vec<u16> = (0..64).map(|i| 0x0400 | i).collect();
    renderer.update_vram(0, 0, 8, 8, &pixels, false, false).unwrap();

    // Destination straddles the bottom-right corner.
    renderer.copy_vram(0, 0, 1020, 508, 8, 8);

    let vram = renderer.vram_contents().unwrap();
    for row in 0..8u32 {
        for col in 0..8u32 {
            assert_eq!(
                vram[index(1020 + col, 508 + row)],
                pixels[(row * 8 + col) as usize],
                "pixel ({}, {})",
                col,
                row
            );
        }
    }
}

#[test]
fn test_masked_upload_keeps_protected_pixels() {
    let mut renderer = renderer();
    renderer
        .update_vram(0, 0, 4, 1, &[0x8001, 0x0002, 0x8003, 0x0004], false, false)
        .unwrap();

    // Set mask, check mask
    renderer.write_gp0(0xE600_0003);
    renderer.write_gp0(0xA000_0000);
    renderer.write_gp0(0x0000_0000);
    renderer.write_gp0(0x0001_0004);
    renderer.write_gp0(0x7FFF_7FFF);
    renderer.write_gp0(0x7FFF_7FFF);

    let vram = renderer.vram_contents().unwrap();
    assert_eq!(&vram[..4], &[0x8001, 0xFFFF, 0x8003, 0xFFFF]);
}

const FLAT_TRIANGLE: [u32; 4] = [0x2000_00FF, 0x0000_0000, 0x0000_0010, 0x0010_0000];

/// Renderer with one untextured triangle waiting in the batch
fn renderer_with_pending_triangle() -> HardwareRenderer<HeadlessDevice> {
    let mut renderer = renderer();
    full_drawing_area(&mut renderer);
    write_all(&mut renderer, &FLAT_TRIANGLE);
    assert_eq!(renderer.pending_vertex_count(), 3);
    renderer.device_mut().clear_commands();
    renderer
}

fn position(
    renderer: &HardwareRenderer<HeadlessDevice>,
    matches: impl Fn(&DeviceCommand) -> bool,
) -> Option<usize> {
    renderer.device().commands().iter().position(matches)
}

fn batch_draw_position(renderer: &HardwareRenderer<HeadlessDevice>) -> Option<usize> {
    position(renderer, |cmd| {
        matches!(
            cmd,
            DeviceCommand::Draw {
                fragment_shader: Some(ShaderKey::BatchFragment(_)),
                ..
            }
        )
    })
}

#[test]
fn test_fill_draws_pending_batch_first() {
    let mut renderer = renderer_with_pending_triangle();
    renderer.fill_vram(0, 0, 16, 16, 0x00FF_0000);
    assert_eq!(renderer.pending_vertex_count(), 0);

    let batch = batch_draw_position(&renderer).unwrap();
    let fill = position(&renderer, |cmd| {
        matches!(
            cmd,
            DeviceCommand::Draw {
                fragment_shader: Some(ShaderKey::VramFill { .. }),
                ..
            }
        )
    })
    .unwrap();
    assert!(batch < fill);
}

#[test]
fn test_copy_draws_pending_batch_first() {
    let mut renderer = renderer_with_pending_triangle();
    renderer.copy_vram(0, 0, 512, 0, 16, 16);
    assert_eq!(renderer.pending_vertex_count(), 0);

    let batch = batch_draw_position(&renderer).unwrap();
    let copy = position(&renderer, |cmd| {
        matches!(cmd, DeviceCommand::CopyTextureRegion { .. })
    })
    .unwrap();
    assert!(batch < copy);
}

#[test]
fn test_read_sees_pending_batch() {
    let mut renderer = renderer_with_pending_triangle();
    renderer.read_vram(0, 0, 32, 32).unwrap();
    assert_eq!(renderer.pending_vertex_count(), 0);

    let batch = batch_draw_position(&renderer).unwrap();
    let readback = position(&renderer, |cmd| {
        matches!(
            cmd,
            DeviceCommand::Draw {
                fragment_shader: Some(ShaderKey::VramReadback { .. }),
                ..
            }
        )
    })
    .unwrap();
    assert!(batch < readback);
}

#[test]
fn test_upload_draws_pending_batch_first() {
    let mut renderer = renderer_with_pending_triangle();
    renderer
        .update_vram(64, 64, 2, 1, &[0x001F, 0x001F], false, false)
        .unwrap();
    assert_eq!(renderer.pending_vertex_count(), 0);
    assert!(batch_draw_position(&renderer).is_some());
}
