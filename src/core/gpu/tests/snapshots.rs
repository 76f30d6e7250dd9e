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

//! Save state files

use super::{renderer, renderer_with, write_all};
use crate::core::config::RendererSettings;
use crate::core::save_state::VramSnapshot;
use tempfile::tempdir;

#[test]
fn test_snapshot_file_restores_vram() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vram.state");

    let mut source = renderer();
    write_all(&mut source, &[0x0200_00FF, 0x0010_0020, 0x0004_0010]);
    source.capture_state().unwrap().save_to_file(&path).unwrap();

    let snapshot = VramSnapshot::load_from_file(&path).unwrap();
    let mut target = renderer_with(RendererSettings {
        use_software_renderer_for_readbacks: true,
        ..Default::default()
    });
    target.restore_state(&snapshot).unwrap();

    // The software renderer is seeded too.
    let vram = target.vram_contents().unwrap();
    assert_eq!(vram[16 * 1024 + 32], 0x001F);
    assert_eq!(vram[19 * 1024 + 47], 0x001F);
    assert_eq!(vram[20 * 1024 + 32], 0);
}

#[test]
fn test_restored_mask_bits_protect_pixels() {
    let mut source = renderer();
    source
        .update_vram(0, 0, 2, 1, &[0x8001, 0x0001], false, false)
        .unwrap();
    let snapshot = source.capture_state().unwrap();

    let mut target = renderer();
    target.restore_state(&snapshot).unwrap();

    // Check mask, then overwrite both pixels
    target.write_gp0(0xE600_0002);
    write_all(&mut target, &[0xA000_0000, 0x0000_0000, 0x0001_0002, 0x7FFF_7FFF]);

    let vram = target.vram_contents().unwrap();
    assert_eq!(&vram[..2], &[0x8001, 0x7FFF]);
}
