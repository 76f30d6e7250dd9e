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

//! Batch flushing, multi-pass draws and the synthetic depth counter

use super::{full_drawing_area, renderer, write_all};
use crate::core::device::{DeviceCommand, HeadlessDevice, ShaderKey};
use crate::core::gpu::{
    BatchDepthTest, BatchRenderMode, BatchVertex, HardwareRenderer, TextureMode,
    TransparencyMode,
};

const FLAT_TRIANGLE: [u32; 4] = [0x2000_00FF, 0x0000_0000, 0x0000_0010, 0x0010_0000];
const TRANSPARENT_TRIANGLE: [u32; 4] = [0x2200_FF00, 0x0000_0000, 0x0000_0010, 0x0010_0000];

/// Render mode, vertex count and base vertex of every batch draw
fn batch_draws(
    renderer: &HardwareRenderer<HeadlessDevice>,
) -> Vec<(BatchRenderMode, u32, u32)> {
    renderer
        .device()
        .draw_calls()
        .into_iter()
        .filter_map(|(shader, count, base)| match shader {
            Some(ShaderKey::BatchFragment(key)) => Some((key.render_mode, count, base)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_matching_state_shares_a_batch() {
    let mut renderer = renderer();
    full_drawing_area(&mut renderer);

    write_all(&mut renderer, &FLAT_TRIANGLE);
    write_all(&mut renderer, &FLAT_TRIANGLE);
    assert_eq!(renderer.pending_vertex_count(), 6);
    assert_eq!(renderer.device().batch_draw_count(), 0);

    // Switching on semi-transparency closes the opaque batch.
    write_all(&mut renderer, &TRANSPARENT_TRIANGLE);
    renderer.flush_render();

    let draws = batch_draws(&renderer);
    assert_eq!(
        draws,
        vec![
            (BatchRenderMode::TransparencyDisabled, 6, 0),
            (BatchRenderMode::TransparentAndOpaque, 3, 6),
        ]
    );
    assert_eq!(
        renderer.batch_config().transparency_mode,
        TransparencyMode::HalfBackgroundPlusHalfForeground
    );
    assert_eq!(renderer.stats().num_batches, 2);
}

#[test]
fn test_flush_without_vertices_draws_nothing() {
    let mut renderer = renderer();
    renderer.flush_render();
    renderer.flush_render();
    assert_eq!(renderer.device().batch_draw_count(), 0);
    assert_eq!(renderer.stats().num_batches, 0);
}

#[test]
fn test_state_changes_flush() {
    let mut renderer = renderer();
    full_drawing_area(&mut renderer);

    write_all(&mut renderer, &FLAT_TRIANGLE);
    renderer.write_gp0(0xE500_0000 | (4 << 11) | 4);
    assert_eq!(renderer.pending_vertex_count(), 0);
    assert_eq!(renderer.device().batch_draw_count(), 1);

    write_all(&mut renderer, &FLAT_TRIANGLE);
    renderer.write_gp0(0xE300_0000 | (1 << 10) | 1);
    assert_eq!(renderer.device().batch_draw_count(), 2);

    // Re-sending the same area does not split the batch.
    write_all(&mut renderer, &FLAT_TRIANGLE);
    renderer.write_gp0(0xE300_0000 | (1 << 10) | 1);
    assert_eq!(renderer.pending_vertex_count(), 3);
}

#[test]
fn test_mask_settings_select_depth_test() {
    let mut renderer = renderer();
    full_drawing_area(&mut renderer);

    write_all(&mut renderer, &FLAT_TRIANGLE);
    assert_eq!(renderer.batch_config().depth_test(), BatchDepthTest::Always);

    renderer.write_gp0(0xE600_0002);
    assert_eq!(renderer.device().batch_draw_count(), 1);

    write_all(&mut renderer, &FLAT_TRIANGLE);
    assert!(renderer.batch_config().check_mask_before_draw);
    assert_eq!(renderer.batch_config().depth_test(), BatchDepthTest::GreaterEqual);
    assert_eq!(renderer.current_depth(), 2);
}

#[test]
fn test_subtractive_textured_draws_twice() {
    let mut renderer = renderer();
    full_drawing_area(&mut renderer);

    // 4-bit page 0 with subtractive blending, palette at (0, 480)
    let palette = 480 << 6;
    let texpage = 0x0040;
    write_all(
        &mut renderer,
        &[
            0x2680_8080,
            0x0000_0000,
            palette << 16,
            0x0000_0020,
            (texpage << 16) | 0x0010,
            0x0020_0000,
            0x1000,
        ],
    );
    renderer.flush_render();

    let draws = batch_draws(&renderer);
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].0, BatchRenderMode::OnlyOpaque);
    assert_eq!(draws[1].0, BatchRenderMode::OnlyTransparent);
    assert!(draws.iter().all(|&(_, count, _)| count == 3));
    assert_eq!(draws[0].2, draws[1].2);
    assert_eq!(renderer.batch_config().texture_mode, TextureMode::Palette4Bit);
    assert_eq!(
        renderer.batch_config().transparency_mode,
        TransparencyMode::BackgroundMinusForeground
    );
    assert_eq!(renderer.stats().num_batches, 2);
}

#[test]
fn test_additive_textured_draws_once_with_dual_source_blend() {
    let mut renderer = renderer();
    full_drawing_area(&mut renderer);

    write_all(
        &mut renderer,
        &[
            0x2680_8080,
            0x0000_0000,
            (480 << 6) << 16,
            0x0000_0020,
            (0x0020 << 16) | 0x0010,
            0x0020_0000,
            0x1000,
        ],
    );
    renderer.flush_render();

    let draws = batch_draws(&renderer);
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].0, BatchRenderMode::TransparentAndOpaque);
    assert_eq!(
        renderer.batch_config().transparency_mode,
        TransparencyMode::BackgroundPlusForeground
    );
}

#[test]
fn test_mask_checked_triangles_get_decreasing_depth() {
    let mut renderer = renderer();
    full_drawing_area(&mut renderer);
    renderer.write_gp0(0xE600_0002);

    write_all(&mut renderer, &FLAT_TRIANGLE);
    write_all(&mut renderer, &FLAT_TRIANGLE);
    renderer.flush_render();

    let (_, count, base) = batch_draws(&renderer)[0];
    let vertices: Vec<BatchVertex> = renderer.device().vertices(base, count);
    assert_eq!(vertices.len(), 6);
    assert!(vertices[0].z > vertices[3].z);
    assert_eq!(vertices[0].z, vertices[2].z);
}

#[test]
fn test_depth_counter_restarts_from_mask_bits() {
    let mut renderer = renderer();
    full_drawing_area(&mut renderer);
    renderer.write_gp0(0xE600_0002);
    renderer.device_mut().clear_commands();

    for _ in 0..70_000 {
        write_all(&mut renderer, &FLAT_TRIANGLE);
    }

    // The counter restarts once before the 65533rd triangle.
    assert_eq!(renderer.current_depth(), 4469);
    let depth_rebuilds = renderer
        .device()
        .draw_calls()
        .iter()
        .filter(|(shader, _, _)| matches!(shader, Some(ShaderKey::VramUpdateDepth)))
        .count();
    assert_eq!(depth_rebuilds, 1);
    assert!(renderer
        .device()
        .commands()
        .iter()
        .any(|command| matches!(command, DeviceCommand::Draw { vertex_count: 196_596, .. })));
}
