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

//! Mask-bit emulation through the depth buffer
//!
//! Every primitive drawn while mask checking is enabled gets a smaller depth
//! value than the last, and pixels carrying the mask bit are seeded into the
//! depth buffer at the front. The depth test then rejects exactly the pixels
//! the hardware would skip. When precise vertex depth is in use instead, the
//! buffer holds real perspective depth and is cleared between scenes.

use super::HardwareRenderer;
use crate::core::device::GpuDevice;

impl<D: GpuDevice> HardwareRenderer<D> {
    /// Depth value written by the next primitive
    pub(in crate::core::gpu) fn current_normalized_vertex_depth(&self) -> f32 {
        1.0 - (self.current_depth as f32 / Self::MAX_BATCH_VERTEX_COUNTER_IDS as f32)
    }

    /// Restart the depth counter once it runs out of distinct values
    pub(in crate::core::gpu) fn reset_batch_vertex_depth(&mut self) {
        if self.resolved.pgxp_depth_buffer {
            return;
        }

        log::debug!("Resetting batch vertex depth");
        self.flush_render();
        self.update_depth_buffer_from_mask_bit();
        self.current_depth = 1;
    }

    /// Rebuild the depth buffer from the mask bits currently in VRAM
    pub(in crate::core::gpu) fn update_depth_buffer_from_mask_bit(&mut self) {
        if self.resolved.pgxp_depth_buffer {
            return;
        }
        let Some(pipeline) = self.pipelines.vram_update_depth else {
            log::error!("Depth update pipeline missing");
            return;
        };

        let fb = &self.framebuffer;
        self.device.set_scissor(0, 0, fb.width, fb.height);
        self.device.invalidate_render_target(fb.vram_depth);
        self.device.set_render_targets(None, Some(fb.vram_depth));
        self.device.set_pipeline(pipeline);
        self.device
            .set_texture_sampler(0, fb.vram, fb.nearest_sampler);
        self.device.draw(3, 0);

        self.device
            .set_texture_sampler(0, fb.vram_read, fb.nearest_sampler);
        self.device
            .set_render_targets(Some(fb.vram), Some(fb.vram_depth));
        self.set_scissor();
    }

    pub(in crate::core::gpu) fn clear_depth_buffer(&mut self) {
        log::debug!("Clearing depth buffer");
        self.device.clear_depth(self.framebuffer.vram_depth, 1.0);
        self.last_depth_z = 1.0;
    }

    /// Switch the batch between mask-bit depth and perspective depth
    pub(in crate::core::gpu) fn set_batch_depth_buffer(&mut self, enabled: bool) {
        if self.batch.use_depth_buffer == enabled {
            return;
        }
        if !self.batch_vertices.is_empty() {
            self.flush_render();
            self.ensure_vertex_buffer_space_for_current_command();
        }
        self.batch.use_depth_buffer = enabled;
    }

    /// Clear the depth buffer when a polygon jumps far behind the last one
    ///
    /// A large increase in average depth usually means a new scene started
    /// drawing without the game clearing anything.
    pub(in crate::core::gpu) fn check_for_depth_clear(&mut self, ws: &[f32]) {
        if ws.is_empty() {
            return;
        }
        let average_z = (ws.iter().sum::<f32>() / ws.len() as f32).min(1.0);

        if (average_z - self.last_depth_z) >= self.resolved.pgxp_depth_clear_threshold {
            if !self.batch_vertices.is_empty() {
                self.flush_render();
                self.ensure_vertex_buffer_space_for_current_command();
            }
            self.clear_depth_buffer();
        }

        self.last_depth_z = average_z;
    }
}

#[cfg(test)]
mod tests {
    use crate::core::config::RendererSettings;
    use crate::core::device::{DeviceCommand, HeadlessDevice};
    use crate::core::gpu::HardwareRenderer;

    #[test]
    fn test_normalized_depth_decreases() {
        let mut renderer =
            HardwareRenderer::new(HeadlessDevice::default(), RendererSettings::default()).unwrap();
        let first = renderer.current_normalized_vertex_depth();
        renderer.current_depth += 1;
        assert!(renderer.current_normalized_vertex_depth() < first);
        assert!(first < 1.0);
    }

    #[test]
    fn test_depth_clear_threshold() {
        let settings = RendererSettings {
            pgxp_enable: true,
            pgxp_depth_buffer: true,
            ..Default::default()
        };
        let mut renderer = HardwareRenderer::new(HeadlessDevice::default(), settings).unwrap();
        let threshold = renderer.resolved.pgxp_depth_clear_threshold;

        let cleared = |renderer: &HardwareRenderer<HeadlessDevice>| {
            renderer
                .device()
                .commands()
                .iter()
                .any(|cmd| matches!(cmd, DeviceCommand::ClearDepth { depth, .. } if *depth == 1.0))
        };

        renderer.device_mut().clear_commands();
        renderer.last_depth_z = 0.1;
        renderer.check_for_depth_clear(&[0.1 + threshold / 2.0; 3]);
        assert!(!cleared(&renderer));

        renderer.last_depth_z = 0.0;
        renderer.check_for_depth_clear(&[threshold + 0.01; 4]);
        assert!(cleared(&renderer));
        assert!((renderer.last_depth_z - (threshold + 0.01)).abs() < 1e-6);
    }
}
