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

//! Capture and restore of the render target for save states

use super::HardwareRenderer;
use crate::core::device::GpuDevice;
use crate::core::error::{RendererError, Result};
use crate::core::save_state::VramSnapshot;

impl<D: GpuDevice> HardwareRenderer<D> {
    /// Snapshot the render target and the CPU-visible VRAM
    ///
    /// Pending primitives are drawn first.
    pub fn capture_state(&mut self) -> Result<VramSnapshot> {
        let vram = self.vram_contents()?;

        let fb = &self.framebuffer;
        let (width, height) = (fb.width, fb.height);
        let mut pixels = vec![0u32; width as usize * height as usize];
        let download = self
            .device
            .download_texture(fb.vram, 0, 0, width, height, &mut pixels, width);
        self.restore_device_context();
        download?;

        log::debug!("Captured {}x{} VRAM render target", width, height);
        Ok(VramSnapshot::new(
            width,
            height,
            self.resolved.multisamples,
            pixels,
            vram,
        ))
    }

    /// Load a snapshot taken at the same resolution and multisampling
    ///
    /// The whole of VRAM is treated as dirty afterwards and the synthetic
    /// depth counter restarts, so rendering resumes without stale texture
    /// reads or depth rejects.
    pub fn restore_state(&mut self, snapshot: &VramSnapshot) -> Result<()> {
        snapshot.validate()?;

        let (width, height) = (self.framebuffer.width, self.framebuffer.height);
        let samples = self.resolved.multisamples;
        if snapshot.width != width || snapshot.height != height || snapshot.samples != samples {
            return Err(RendererError::SaveStateMismatch {
                expected_width: width,
                expected_height: height,
                expected_samples: samples,
                got_width: snapshot.width,
                got_height: snapshot.height,
                got_samples: snapshot.samples,
            });
        }

        self.discard_batch();
        self.device.update_texture(
            self.framebuffer.vram,
            0,
            0,
            width,
            height,
            &snapshot.pixels,
            width,
        )?;

        self.vram_shadow.copy_from_slice(&snapshot.vram);
        if let Some(sw) = &self.sw_renderer {
            sw.load_vram(&snapshot.vram)?;
        }

        self.set_full_vram_dirty_rectangle();
        self.current_depth = 1;
        if self.resolved.pgxp_depth_buffer {
            self.clear_depth_buffer();
        } else {
            self.update_depth_buffer_from_mask_bit();
        }
        self.restore_device_context();

        log::info!("Restored {}x{} VRAM render target", width, height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::config::RendererSettings;
    use crate::core::device::HeadlessDevice;
    use crate::core::error::RendererError;
    use crate::core::gpu::{HardwareRenderer, Rect};

    fn renderer(scale: u32) -> HardwareRenderer<HeadlessDevice> {
        let settings = RendererSettings {
            resolution_scale: scale,
            ..Default::default()
        };
        HardwareRenderer::new(HeadlessDevice::default(), settings).unwrap()
    }

    #[test]
    fn test_capture_restore_round_trip() {
        let mut source = renderer(2);
        source.fill_vram(16, 8, 16, 4, 0x0000_00FF);
        let snapshot = source.capture_state().unwrap();

        assert_eq!((snapshot.width, snapshot.height, snapshot.samples), (2048, 1024, 1));
        assert_eq!(snapshot.vram[8 * 1024 + 16], 0x001F);

        let mut target = renderer(2);
        target.restore_state(&snapshot).unwrap();

        assert_eq!(target.dirty_rect(), Rect::vram());
        assert_eq!(target.current_depth(), 1);
        let vram = target.vram_contents().unwrap();
        assert_eq!(vram[8 * 1024 + 16], 0x001F);
        assert_eq!(vram[11 * 1024 + 31], 0x001F);
        assert_eq!(vram[8 * 1024 + 32], 0);
    }

    #[test]
    fn test_restore_rejects_other_resolution() {
        let snapshot = renderer(1).capture_state().unwrap();
        let mut target = renderer(2);

        assert!(matches!(
            target.restore_state(&snapshot),
            Err(RendererError::SaveStateMismatch {
                expected_width: 2048,
                got_width: 1024,
                ..
            })
        ));
    }
}
