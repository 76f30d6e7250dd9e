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
//! End-to-end frames driven through the public API

use psrx_hw::core::error::{RendererError, Result};
use psrx_hw::core::gpu::VRAM_WIDTH;
use psrx_hw::core::{HardwareRenderer, HeadlessDevice, RendererSettings, VramSnapshot};
use tempfile::tempdir;

fn renderer(scale: u32) -> Result<HardwareRenderer<HeadlessDevice>> {
    let settings = RendererSettings {
        resolution_scale: scale,
        ..Default::default()
    };
    HardwareRenderer::new(HeadlessDevice::default(), settings)
}

fn write_all(renderer: &mut HardwareRenderer<HeadlessDevice>, words: &[u32]) {
    for &word in words {
        renderer.write_gp0(word);
    }
}

#[test]
fn test_filled_frame_is_presented() -> Result<()> {
    let mut renderer = renderer(1)?;

    // Green 320x240 fill, then enable the display at (0, 0)
    write_all(&mut renderer, &[0x0200_FF00, 0x0000_0000, 0x00F0_0140]);
    renderer.write_gp1(0x0300_0000);
    renderer.write_gp1(0x0500_0000);
    renderer.update_display();

    let frame = renderer.presented_frame().expect("display enabled");
    assert_eq!(frame.texture, renderer.framebuffer().vram);
    assert_eq!((frame.x, frame.y, frame.width, frame.height), (0, 0, 320, 240));

    let vram = renderer.vram_contents()?;
    assert_eq!(vram[0], 0x03E0);
    assert_eq!(vram[239 * VRAM_WIDTH as usize + 319], 0x03E0);
    assert_eq!(vram[240 * VRAM_WIDTH as usize], 0);
    Ok(())
}

#[test]
fn test_upscaled_upload_reads_back_native() -> Result<()> {
    let mut renderer = renderer(2)?;
    assert_eq!(renderer.framebuffer().width, 2 * VRAM_WIDTH);

    write_all(&mut renderer, &[0xA000_0000, 0x0000_0000, 0x0001_0002, 0x7FFF_001F]);
    write_all(&mut renderer, &[0xC000_0000, 0x0000_0000, 0x0001_0002]);
    assert_eq!(renderer.read_gpuread(), 0x7FFF_001F);
    Ok(())
}

#[test]
fn test_snapshot_bytes_require_matching_scale() -> Result<()> {
    let mut source = renderer(1)?;
    write_all(&mut source, &[0x0200_00FF, 0x0000_0000, 0x0004_0010]);
    let bytes = source.capture_state()?.to_bytes()?;
    let snapshot = VramSnapshot::from_bytes(&bytes)?;

    let mut same = renderer(1)?;
    same.restore_state(&snapshot)?;
    assert_eq!(same.vram_contents()?[15], 0x001F);

    let mut scaled = renderer(2)?;
    assert!(matches!(
        scaled.restore_state(&snapshot),
        Err(RendererError::SaveStateMismatch { .. })
    ));
    Ok(())
}

#[test]
fn test_settings_file_configures_renderer() -> Result<()> {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("renderer.toml");

    let settings = RendererSettings {
        resolution_scale: 3,
        use_software_renderer_for_readbacks: true,
        ..Default::default()
    };
    settings.save_to_file(&path)?;

    let loaded = RendererSettings::load_from_file(&path)?;
    assert_eq!(loaded, settings);

    let renderer = HardwareRenderer::new(HeadlessDevice::default(), loaded)?;
    assert_eq!(renderer.resolution_scale(), 3);
    assert!(renderer.is_software_renderer_active());
    Ok(())
}
