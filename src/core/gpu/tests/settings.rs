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

//! Live settings changes

use super::{renderer, write_all};
use crate::core::config::RendererSettings;
use crate::core::device::{DeviceInfo, HeadlessDevice};
use crate::core::gpu::{HardwareRenderer, RendererNotice, VRAM_HEIGHT, VRAM_WIDTH};

#[test]
fn test_scale_change_preserves_vram() {
    let mut renderer = renderer();
    write_all(&mut renderer, &[0x0200_00FF, 0x0020_0020, 0x0010_0010]);

    renderer
        .update_settings(RendererSettings {
            resolution_scale: 2,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(renderer.resolution_scale(), 2);
    assert_eq!(renderer.framebuffer().width, VRAM_WIDTH * 2);
    assert_eq!(renderer.framebuffer().height, VRAM_HEIGHT * 2);

    let vram = renderer.vram_contents().unwrap();
    let width = VRAM_WIDTH as usize;
    assert_eq!(vram[32 * width + 32], 0x001F);
    assert_eq!(vram[47 * width + 47], 0x001F);
    assert_eq!(vram[48 * width + 48], 0);
}

#[test]
fn test_scale_change_releases_old_textures() {
    let mut renderer = renderer();
    let textures = renderer.device().live_texture_count();

    for scale in [2, 4, 1] {
        renderer
            .update_settings(RendererSettings {
                resolution_scale: scale,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(renderer.device().live_texture_count(), textures);
    }
}

#[test]
fn test_shader_only_change_keeps_framebuffer() {
    let mut renderer = renderer();
    let vram = renderer.framebuffer().vram;
    let pipelines = renderer.device().live_pipeline_count();

    renderer
        .update_settings(RendererSettings {
            true_color: false,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(renderer.framebuffer().vram, vram);
    assert_eq!(renderer.device().live_pipeline_count(), pipelines);
}

#[test]
fn test_notices_are_raised_once() {
    let device = HeadlessDevice::new(DeviceInfo {
        max_multisamples: 4,
        ..DeviceInfo::default()
    });
    let settings = RendererSettings {
        multisamples: 8,
        ..Default::default()
    };
    let mut renderer = HardwareRenderer::new(device, settings.clone()).unwrap();

    let notices = renderer.take_notices();
    assert!(notices.contains(&RendererNotice::MultisamplingUnsupported {
        requested: 8,
        used: 4
    }));
    assert_eq!(renderer.resolved_settings().multisamples, 4);

    renderer.update_settings(settings).unwrap();
    assert!(renderer.take_notices().is_empty());
}

#[test]
fn test_failed_rebuild_is_reported() {
    let mut renderer = renderer();
    renderer.device_mut().set_fail_pipeline_creation(true);

    let result = renderer.update_settings(RendererSettings {
        true_color: false,
        ..Default::default()
    });
    assert!(result.is_err());
}
