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

//! GP0 command stream tests
//!
//! Commands are fed one word at a time, the way the DMA and CPU deliver
//! them, and checked through the vertices, passes and readbacks they cause.

use super::{full_drawing_area, renderer, write_all};
use crate::core::device::ShaderKey;
use crate::core::gpu::{BatchVertex, Rect, VRAM_WIDTH};

#[test]
fn test_textured_rectangle_splits_at_page_edges() {
    let mut renderer = renderer();
    full_drawing_area(&mut renderer);
    renderer.device_mut().clear_commands();

    // 300×16 at (400, 200) starting at texel (200, 250): crosses both page edges
    write_all(
        &mut renderer,
        &[0x6480_8080, 0x00C8_0190, (250 << 8) | 200, 0x0010_012C],
    );
    assert_eq!(renderer.pending_vertex_count(), 24);

    renderer.flush_render();
    let (_, count, base) = renderer.device().draw_calls()[0];
    let vertices: Vec<BatchVertex> = renderer.device().vertices(base, count);

    // First piece: 56 texels wide and 6 tall, ending on the page edge
    assert_eq!((vertices[0].x, vertices[0].y), (400.0, 200.0));
    assert_eq!((vertices[0].u, vertices[0].v), (200, 250));
    assert_eq!((vertices[5].x, vertices[5].y), (456.0, 206.0));
    assert_eq!((vertices[5].u, vertices[5].v), (256, 256));
    // Second piece restarts at texel column 0
    assert_eq!((vertices[6].x, vertices[6].u), (456.0, 0));
    // Lower row restarts at texel row 0
    assert_eq!((vertices[12].y, vertices[12].v), (206.0, 0));
    assert_eq!((vertices[23].x, vertices[23].y), (700.0, 216.0));

    assert_eq!(renderer.dirty_rect(), Rect::new(400, 200, 700, 216));
}

#[test]
fn test_oversized_polygon_is_culled() {
    let mut renderer = renderer();
    full_drawing_area(&mut renderer);

    write_all(&mut renderer, &[0x2000_00FF, 0x0000_0000, 0x0000_0400, 0x0010_0000]);
    assert_eq!(renderer.pending_vertex_count(), 0);
    assert!(!renderer.dirty_rect().is_valid());

    // One pixel narrower is drawn.
    write_all(&mut renderer, &[0x2000_00FF, 0x0000_0000, 0x0000_03FF, 0x0010_0000]);
    assert_eq!(renderer.pending_vertex_count(), 3);
}

#[test]
fn test_quad_culls_each_half_separately() {
    let mut renderer = renderer();
    full_drawing_area(&mut renderer);

    // The (2, 1, 3) half spans 1024 columns, the first half does not.
    write_all(
        &mut renderer,
        &[0x2800_00FF, 0x0000_0000, 0x0000_0010, 0x0010_0000, 0x0010_0410],
    );
    assert_eq!(renderer.pending_vertex_count(), 3);
}

#[test]
fn test_nothing_drawn_with_inverted_drawing_area() {
    let mut renderer = renderer();
    renderer.write_gp0(0xE300_0000 | (100 << 10) | 100);
    renderer.write_gp0(0xE400_0000 | (50 << 10) | 50);

    write_all(&mut renderer, &[0x2000_00FF, 0x0000_0000, 0x0000_0010, 0x0010_0000]);
    write_all(&mut renderer, &[0x7800_00FF, 0x0000_0000]);
    assert_eq!(renderer.pending_vertex_count(), 0);
    assert!(!renderer.dirty_rect().is_valid());
}

#[test]
fn test_draw_ticks() {
    let mut renderer = renderer();
    full_drawing_area(&mut renderer);
    assert_eq!(renderer.take_pending_ticks(), 0);

    // One tick per pixel for a flat 16×16 sprite
    write_all(&mut renderer, &[0x7800_00FF, 0x0000_0000]);
    assert_eq!(renderer.take_pending_ticks(), 256);

    // Texturing doubles the cost, semi-transparency adds half again.
    write_all(&mut renderer, &[0x7E80_8080, 0x0000_0000, 0x0000_0000]);
    assert_eq!(renderer.take_pending_ticks(), 768);
}

#[test]
fn test_upload_then_gpuread() {
    let mut renderer = renderer();
    let pixels = [0x0002_0001, 0x0004_0003, 0x8006_0005];

    // 3×2 at (10, 20)
    write_all(&mut renderer, &[0xA000_0000, 0x0014_000A, 0x0002_0003]);
    write_all(&mut renderer, &pixels);
    assert_eq!(renderer.dirty_rect(), Rect::new(10, 20, 13, 22));
    assert!(renderer
        .device()
        .draw_calls()
        .iter()
        .any(|(shader, _, _)| matches!(shader, Some(ShaderKey::VramWrite { .. }))));

    write_all(&mut renderer, &[0xC000_0000, 0x0014_000A, 0x0002_0003]);
    assert_eq!(renderer.read_gpuread(), 0x0002_0001);
    assert_eq!(renderer.read_gpuread(), 0x0004_0003);
    assert_eq!(renderer.read_gpuread(), 0x8006_0005);
    // The transfer is over.
    assert_eq!(renderer.read_gpuread(), 0);
}

#[test]
fn test_odd_sized_readback_pads_last_word() {
    let mut renderer = renderer();
    write_all(&mut renderer, &[0x0200_00FF, 0x0000_0000, 0x0001_0010]);

    write_all(&mut renderer, &[0xC000_0000, 0x0000_0000, 0x0001_0003]);
    assert_eq!(renderer.read_gpuread(), 0x001F_001F);
    assert_eq!(renderer.read_gpuread(), 0x0000_001F);
}

#[test]
fn test_vram_to_vram_copy_command() {
    let mut renderer = renderer();
    write_all(&mut renderer, &[0x0200_FF00, 0x0000_0000, 0x0010_0010]);
    write_all(&mut renderer, &[0x8000_0000, 0x0000_0000, 0x0064_0064, 0x0010_0010]);

    let vram = renderer.vram_contents().unwrap();
    let width = VRAM_WIDTH as usize;
    assert_eq!(vram[100 * width + 100], 0x03E0);
    assert_eq!(vram[115 * width + 115], 0x03E0);
    assert_eq!(vram[116 * width + 116], 0);
    assert_eq!(vram[0], 0x03E0);
}

#[test]
fn test_copy_onto_itself_is_skipped() {
    let mut renderer = renderer();
    renderer.device_mut().clear_commands();
    write_all(&mut renderer, &[0x8000_0000, 0x0010_0010, 0x0010_0010, 0x0010_0010]);
    assert!(renderer.device().commands().is_empty());
    assert!(!renderer.dirty_rect().is_valid());
}

#[test]
fn test_sampling_dirty_page_refreshes_read_texture() {
    let mut renderer = renderer();
    full_drawing_area(&mut renderer);

    // Draw into page 0, then texture from it in 15-bit mode.
    write_all(&mut renderer, &[0x0200_00FF, 0x0000_0000, 0x0010_0010]);
    renderer.write_gp0(0xE100_0100);
    assert_eq!(renderer.stats().num_vram_read_texture_updates, 0);

    write_all(&mut renderer, &[0x7580_8080, 0x0000_0200, 0x0000_0000]);
    assert_eq!(renderer.stats().num_vram_read_texture_updates, 1);
    assert_eq!(renderer.pending_vertex_count(), 6);

    // Texels outside the drawn area do not trigger another copy.
    write_all(&mut renderer, &[0x7580_8080, 0x0000_0300, 0x0000_8080]);
    assert_eq!(renderer.stats().num_vram_read_texture_updates, 1);
}

#[test]
fn test_rectangle_dirties_only_its_pixels() {
    let mut renderer = renderer();
    full_drawing_area(&mut renderer);

    // Two 16×16 sprites side by side, the second ending on the page edge
    write_all(&mut renderer, &[0x7800_00FF, 0x0000_00E0]);
    write_all(&mut renderer, &[0x7800_00FF, 0x0000_00F0]);
    assert_eq!(renderer.dirty_rect(), Rect::new(224, 0, 256, 16));

    // Sampling the next page does not need a refresh.
    renderer.write_gp0(0xE100_0104);
    write_all(&mut renderer, &[0x7580_8080, 0x012C_0258, 0x0000_0000]);
    assert_eq!(renderer.stats().num_vram_read_texture_updates, 0);
    assert_eq!(renderer.pending_vertex_count(), 6);
}
