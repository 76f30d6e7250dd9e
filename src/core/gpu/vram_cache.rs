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

//! Read-texture coherency
//!
//! Batches render into the VRAM render target but sample from a separate
//! read texture. The dirty rectangle tracks what has been drawn since the
//! two were last synchronized; a primitive that samples from inside it
//! forces a flush and a partial copy.

use super::types::{Rect, VRAM_HEIGHT, VRAM_WIDTH};
use super::HardwareRenderer;
use crate::core::device::{DeviceFeatures, GpuDevice, TextureRegion};

impl<D: GpuDevice> HardwareRenderer<D> {
    pub(in crate::core::gpu) fn clear_vram_dirty_rectangle(&mut self) {
        self.vram_dirty_rect.set_invalid();
        self.draw_mode.texture_page_changed = true;
    }

    pub(in crate::core::gpu) fn set_full_vram_dirty_rectangle(&mut self) {
        self.vram_dirty_rect = Rect::vram();
        self.draw_mode.texture_page_changed = true;
    }

    /// Grow the dirty rectangle to cover a transfer destination
    ///
    /// Writing over the current page or palette marks the texture page
    /// changed, so the next textured primitive rechecks it.
    pub(in crate::core::gpu) fn include_vram_dirty_rectangle(&mut self, rect: &Rect) {
        self.vram_dirty_rect.include(rect);

        if !self.draw_mode.texture_page_changed && self.draw_mode.samples_from(rect) {
            self.draw_mode.texture_page_changed = true;
        }
    }

    /// Decide how the next textured primitive must treat the dirty rectangle
    pub(in crate::core::gpu) fn on_texture_page_changed(&mut self) {
        if !self.vram_dirty_rect.is_valid() {
            self.compute_uv_range = self.resolved.clamp_uvs;
            self.texpage_dirty = false;
            return;
        }

        // A dirty palette is always needed in full, so copy straight away.
        let palette_dirty = self.draw_mode.mode_reg.texture_mode().is_paletted()
            && self
                .draw_mode
                .palette_rect()
                .is_some_and(|palette| palette.intersects(&self.vram_dirty_rect));
        if palette_dirty {
            if !self.batch_vertices.is_empty() {
                self.flush_render();
            }
            self.update_vram_read_texture();
        }

        if self.vram_dirty_rect.is_valid()
            && self
                .draw_mode
                .texture_page_rect()
                .intersects(&self.vram_dirty_rect)
        {
            // Only texels actually sampled matter; track them per primitive.
            self.compute_uv_range = true;
            self.texpage_dirty = true;
            self.current_uv_range.set_invalid();
        } else {
            self.compute_uv_range = self.resolved.clamp_uvs;
            self.texpage_dirty = false;
        }
    }

    /// Test a primitive's texel range against the dirty rectangle
    ///
    /// Texel coordinates are inclusive and pass through the texture window
    /// before being mapped into the page of `texpage`. When the accumulated
    /// range first grows into the dirty rectangle the batch is flushed and
    /// the read texture refreshed.
    pub(in crate::core::gpu) fn check_for_texpage_overlap(
        &mut self,
        texpage: u32,
        min_u: u32,
        min_v: u32,
        max_u: u32,
        max_v: u32,
    ) {
        if !self.texpage_dirty {
            return;
        }

        // Paletted texels are packed 4 or 2 to a VRAM pixel.
        let (xshift, xadd) = match (texpage >> 7) & 3 {
            0 => (2, 3),
            1 => (1, 1),
            _ => (0, 0),
        };
        let page_x = (texpage & 0xF) * 64;
        let page_y = ((texpage >> 4) & 1) * 256;

        let window = self.draw_mode.texture_window;
        let wrap_u = |u: u32| (u & window.and_x as u32) | window.or_x as u32;
        let wrap_v = |v: u32| (v & window.and_y as u32) | window.or_y as u32;

        let range = Rect::new(
            ((wrap_u(min_u) >> xshift) + page_x).min(VRAM_WIDTH),
            (wrap_v(min_v) + page_y).min(VRAM_HEIGHT),
            (((wrap_u(max_u) + xadd) >> xshift) + page_x + 1).min(VRAM_WIDTH),
            (wrap_v(max_v) + page_y + 1).min(VRAM_HEIGHT),
        );

        let mut current = self.current_uv_range;
        current.include(&range);
        if current == self.current_uv_range {
            return;
        }
        self.current_uv_range = current;

        if current.intersects(&self.vram_dirty_rect) {
            log::trace!(
                "UV range ({}, {}) - ({}, {}) hit dirty area, refreshing read texture",
                current.left,
                current.top,
                current.right,
                current.bottom
            );
            if !self.batch_vertices.is_empty() {
                self.flush_render();
                self.ensure_vertex_buffer_space_for_current_command();
            }
            self.update_vram_read_texture();
        }
    }

    /// Copy the dirty part of the render target into the read texture
    pub(in crate::core::gpu) fn update_vram_read_texture(&mut self) {
        self.texpage_dirty = false;
        if !self.vram_dirty_rect.is_valid() {
            return;
        }

        let scale = self.resolved.resolution_scale;
        let rect = self.vram_dirty_rect.scaled(scale);
        let fb = &self.framebuffer;
        let dst = TextureRegion::new(fb.vram_read, rect.left, rect.top);
        let src = TextureRegion::new(fb.vram, rect.left, rect.top);

        if self.resolved.is_using_multisampling() {
            if self
                .device
                .features()
                .contains(DeviceFeatures::PARTIAL_MSAA_RESOLVE)
            {
                self.device
                    .resolve_texture_region(dst, src, rect.width(), rect.height());
            } else {
                self.device.resolve_texture_region(
                    TextureRegion::new(fb.vram_read, 0, 0),
                    TextureRegion::new(fb.vram, 0, 0),
                    fb.width,
                    fb.height,
                );
            }
        } else {
            self.device
                .copy_texture_region(dst, src, rect.width(), rect.height());
        }

        log::trace!(
            "Read texture update: ({}, {}) {}x{}",
            self.vram_dirty_rect.left,
            self.vram_dirty_rect.top,
            self.vram_dirty_rect.width(),
            self.vram_dirty_rect.height()
        );
        self.stats.num_vram_read_texture_updates += 1;
        self.clear_vram_dirty_rectangle();
    }
}
