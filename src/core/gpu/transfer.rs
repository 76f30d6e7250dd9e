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

//! VRAM transfers
//!
//! Fills, CPU uploads, readbacks and VRAM-to-VRAM copies. Each one runs as a
//! small full-screen pass (or a plain texture copy) outside the batch, so the
//! caller flushes first. Footprints that run off the right or bottom edge
//! wrap around, and the dirty rectangle grows to the wrapped bounds.

use super::types::{
    rgba5551_to_rgba8888, rgba8888_to_rgba5551, vram_transfer_bounds, Rect, VRAM_HEIGHT,
    VRAM_WIDTH,
};
use super::uniforms::{
    rgba8_to_float, VramCopyUniforms, VramFillUniforms, VramReadbackUniforms, VramWriteUniforms,
};
use super::{Framebuffer, HardwareRenderer, ReplacementTexture};
use crate::core::device::{DeviceFeatures, GpuDevice, TextureDesc, TextureKind, TextureRegion};
use crate::core::error::{RendererError, Result};
use crate::core::software::SoftwareCommand;

impl<D: GpuDevice> HardwareRenderer<D> {
    /// Fill a rectangle with a 24-bit color
    ///
    /// Pending primitives are drawn first.
    /// The color is reduced to 15 bits unless true color rendering is on.
    /// Lines of the displayed field are skipped while interlaced rendering
    /// is active.
    pub fn fill_vram(&mut self, x: u32, y: u32, width: u32, height: u32, color: u32) {
        self.flush_render();
        if let Some(sw) = &self.sw_renderer {
            sw.push(SoftwareCommand::FillVram {
                x,
                y,
                width,
                height,
                color,
                skip_field: self
                    .is_interlaced_rendering_enabled()
                    .then_some(self.status.interlaced_field as u32),
            });
        }

        let bounds = vram_transfer_bounds(x, y, width, height);
        self.include_vram_dirty_rectangle(&bounds);

        let scale = self.resolved.resolution_scale;
        let wrapped = (x + width) > VRAM_WIDTH || (y + height) > VRAM_HEIGHT;
        let interlaced = self.is_interlaced_rendering_enabled();
        let Some(pipeline) = self.pipelines.vram_fill[wrapped as usize][interlaced as usize] else {
            log::error!("VRAM fill pipeline missing");
            return;
        };

        let fill_color = if self.resolved.true_color {
            color
        } else {
            rgba5551_to_rgba8888(rgba8888_to_rgba5551(color))
        };
        let uniforms = VramFillUniforms {
            dst_x: (x % VRAM_WIDTH) * scale,
            dst_y: (y % VRAM_HEIGHT) * scale,
            end_x: ((x + width) % VRAM_WIDTH) * scale,
            end_y: ((y + height) % VRAM_HEIGHT) * scale,
            fill_color: rgba8_to_float(fill_color),
            interlaced_displayed_field: self.status.interlaced_field as u32,
        };

        let scaled = bounds.scaled(scale);
        self.device.set_pipeline(pipeline);
        self.device
            .set_viewport_and_scissor(scaled.left, scaled.top, scaled.width(), scaled.height());
        self.device.push_uniforms(bytemuck::bytes_of(&uniforms));
        self.device.draw(3, 0);

        self.restore_device_context();
    }

    /// Read a rectangle back into the CPU-visible VRAM
    ///
    /// Pixels are packed two to a texel by an encoding pass so the download
    /// is half the width. With the software renderer active its VRAM is
    /// already exact, so this only waits for it.
    pub fn read_vram(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<()> {
        self.flush_render();
        if let Some(sw) = &self.sw_renderer {
            return sw.sync();
        }

        let copy_rect = vram_transfer_bounds(x, y, width, height);
        let encoded_left = copy_rect.left / 2;
        let encoded_right = copy_rect.right.div_ceil(2);
        let encoded_width = encoded_right - encoded_left;
        let encoded_height = copy_rect.height();
        if encoded_width == 0 || encoded_height == 0 {
            return Ok(());
        }

        let Some(pipeline) = self.pipelines.vram_readback else {
            log::error!("VRAM readback pipeline missing");
            return Ok(());
        };

        // Encode from an even column so pairs line up with the shadow.
        let uniforms = VramReadbackUniforms {
            left: encoded_left * 2,
            top: copy_rect.top,
            width: copy_rect.width(),
            height: copy_rect.height(),
        };
        let fb = &self.framebuffer;
        self.device
            .set_render_targets(Some(fb.vram_readback), None);
        self.device.set_pipeline(pipeline);
        self.device
            .set_texture_sampler(0, fb.vram, fb.nearest_sampler);
        self.device
            .set_viewport_and_scissor(0, 0, encoded_width, encoded_height);
        self.device.push_uniforms(bytemuck::bytes_of(&uniforms));
        self.device.draw(3, 0);

        let mut encoded = vec![0u32; (encoded_width * encoded_height) as usize];
        let download = self.device.download_texture(
            fb.vram_readback,
            0,
            0,
            encoded_width,
            encoded_height,
            &mut encoded,
            encoded_width,
        );
        self.restore_device_context();
        download?;

        for (row, texels) in encoded.chunks_exact(encoded_width as usize).enumerate() {
            let line = (copy_rect.top as usize + row) * VRAM_WIDTH as usize;
            for (i, &texel) in texels.iter().enumerate() {
                let x = encoded_left * 2 + i as u32 * 2;
                for (half, value) in [(0, texel as u16), (1, (texel >> 16) as u16)] {
                    let px = x + half;
                    if px >= copy_rect.left && px < copy_rect.right {
                        self.vram_shadow[line + px as usize] = value;
                    }
                }
            }
        }
        Ok(())
    }

    /// Write CPU pixel data into VRAM (GP0(A0h) completion)
    ///
    /// `data` holds `width * height` pixels, row-major.
    #[allow(clippy::too_many_arguments)]
    pub fn update_vram(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u16],
        set_mask: bool,
        check_mask: bool,
    ) -> Result<()> {
        self.flush_render();
        if let Some(sw) = &self.sw_renderer {
            sw.push(SoftwareCommand::UpdateVram {
                x,
                y,
                width,
                height,
                data: data.to_vec(),
                set_mask,
                check_mask,
            });
        }
        self.upload_vram(x, y, width, height, data, set_mask, check_mask)
    }

    /// Device half of [`update_vram`](Self::update_vram)
    #[allow(clippy::too_many_arguments)]
    pub(in crate::core::gpu) fn upload_vram(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u16],
        set_mask: bool,
        check_mask: bool,
    ) -> Result<()> {
        let bounds = vram_transfer_bounds(x, y, width, height);
        self.include_vram_dirty_rectangle(&bounds);

        if check_mask {
            // Later than everything masked so far.
            self.current_depth += 1;
        } else {
            let replacement = self
                .replacements
                .as_ref()
                .and_then(|provider| provider.vram_write_replacement(width, height, data));
            if let Some(texture) = replacement {
                if self.blit_vram_replacement_texture(&texture, x, y, width, height)? {
                    return Ok(());
                }
            }
        }

        let Some(pipeline) = self.pipelines.vram_write[(check_mask && !self.resolved.pgxp_depth_buffer) as usize]
        else {
            log::error!("VRAM write pipeline missing");
            return Ok(());
        };

        let pixel_count = (width * height) as usize;
        let pixels = data.get(..pixel_count).unwrap_or(data);
        let base = self
            .device
            .write_texture_buffer(self.framebuffer.upload_buffer, pixels)?;

        let uniforms = VramWriteUniforms {
            dst_x: x % VRAM_WIDTH,
            dst_y: y % VRAM_HEIGHT,
            end_x: (x + width) % VRAM_WIDTH,
            end_y: (y + height) % VRAM_HEIGHT,
            width,
            height,
            buffer_base_offset: base,
            mask_or_bits: if set_mask { 0x8000 } else { 0 },
            depth_value: self.current_normalized_vertex_depth(),
        };

        // The viewport already covers all of VRAM.
        let scaled = bounds.scaled(self.resolved.resolution_scale);
        self.device
            .set_scissor(scaled.left, scaled.top, scaled.width(), scaled.height());
        self.device.set_pipeline(pipeline);
        self.device.push_uniforms(bytemuck::bytes_of(&uniforms));
        self.device
            .set_texture_buffer(0, self.framebuffer.upload_buffer);
        self.device.draw(3, 0);

        self.restore_device_context();
        Ok(())
    }

    /// Draw replacement art over a VRAM write
    ///
    /// Only art with the aspect ratio of the write is used. Returns whether
    /// the write was handled.
    fn blit_vram_replacement_texture(
        &mut self,
        texture: &ReplacementTexture,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<bool> {
        if texture.width == 0
            || texture.height == 0
            || texture.width as u64 * height as u64 != texture.height as u64 * width as u64
            || texture.pixels.len() < (texture.width * texture.height) as usize
        {
            log::debug!(
                "Ignoring {}x{} replacement for {}x{} write",
                texture.width,
                texture.height,
                width,
                height
            );
            return Ok(false);
        }
        let Some(pipeline) = self.pipelines.copy else {
            return Ok(false);
        };

        if !Framebuffer::texture_matches(
            &self.device,
            self.framebuffer.vram_replacement,
            texture.width,
            texture.height,
        ) {
            if let Some(old) = self.framebuffer.vram_replacement.take() {
                self.device.destroy_texture(old);
            }
            let desc = TextureDesc {
                kind: TextureKind::Texture,
                ..TextureDesc::render_target(texture.width, texture.height, 1)
            };
            let handle = self
                .device
                .create_texture(&desc)
                .map_err(|source| RendererError::ResourceCreation {
                    what: "VRAM replacement texture",
                    source,
                })?;
            self.framebuffer.vram_replacement = Some(handle);
        }
        let Some(replacement) = self.framebuffer.vram_replacement else {
            return Ok(false);
        };
        self.device.update_texture(
            replacement,
            0,
            0,
            texture.width,
            texture.height,
            &texture.pixels,
            texture.width,
        )?;

        let scale = self.resolved.resolution_scale;
        let fb = &self.framebuffer;
        self.device
            .set_render_targets(Some(fb.vram), Some(fb.vram_depth));
        self.device
            .set_texture_sampler(0, replacement, fb.linear_sampler);
        self.device.set_pipeline(pipeline);
        self.device
            .set_viewport_and_scissor(x * scale, y * scale, width * scale, height * scale);
        self.device.draw(3, 0);

        self.restore_device_context();
        Ok(true)
    }

    /// Copy a rectangle within VRAM (GP0(80h))
    ///
    /// Masking, wraparound and multisampling go through the copy shader; the
    /// rest is a plain texture region copy.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_vram(&mut self, src_x: u32, src_y: u32, dst_x: u32, dst_y: u32, width: u32, height: u32) {
        self.flush_render();
        if let Some(sw) = &self.sw_renderer {
            sw.push(SoftwareCommand::CopyVram {
                src_x,
                src_y,
                dst_x,
                dst_y,
                width,
                height,
                set_mask: self.status.set_mask_while_drawing,
                check_mask: self.status.check_mask_before_draw,
            });
        }

        let scale = self.resolved.resolution_scale;
        let use_shader = self.status.is_masking_enabled()
            || (src_x % VRAM_WIDTH) + width > VRAM_WIDTH
            || (src_y % VRAM_HEIGHT) + height > VRAM_HEIGHT
            || (dst_x % VRAM_WIDTH) + width > VRAM_WIDTH
            || (dst_y % VRAM_HEIGHT) + height > VRAM_HEIGHT;

        if use_shader || self.resolved.is_using_multisampling() {
            let src_bounds = vram_transfer_bounds(src_x, src_y, width, height);
            let dst_bounds = vram_transfer_bounds(dst_x, dst_y, width, height);
            if self.vram_dirty_rect.intersects(&src_bounds) {
                self.update_vram_read_texture();
            }
            self.include_vram_dirty_rectangle(&dst_bounds);

            let depth_test = self.status.check_mask_before_draw && !self.resolved.pgxp_depth_buffer;
            let Some(pipeline) = self.pipelines.vram_copy[depth_test as usize] else {
                log::error!("VRAM copy pipeline missing");
                return;
            };

            let uniforms = VramCopyUniforms {
                src_x: (src_x % VRAM_WIDTH) * scale,
                src_y: (src_y % VRAM_HEIGHT) * scale,
                dst_x: (dst_x % VRAM_WIDTH) * scale,
                dst_y: (dst_y % VRAM_HEIGHT) * scale,
                end_x: ((dst_x + width) % VRAM_WIDTH) * scale,
                end_y: ((dst_y + height) % VRAM_HEIGHT) * scale,
                width: width * scale,
                height: height * scale,
                set_mask_bit: self.status.set_mask_while_drawing as u32,
                depth_value: self.current_normalized_vertex_depth(),
            };

            // The read texture is still bound to slot 0.
            let scaled = dst_bounds.scaled(scale);
            self.device
                .set_viewport_and_scissor(scaled.left, scaled.top, scaled.width(), scaled.height());
            self.device.set_pipeline(pipeline);
            self.device.push_uniforms(bytemuck::bytes_of(&uniforms));
            self.device.draw(3, 0);
            self.restore_device_context();

            if depth_test {
                self.current_depth += 1;
            }
            return;
        }

        let src_rect = Rect::from_extents(src_x, src_y, width, height);
        let dst_rect = Rect::from_extents(dst_x, dst_y, width, height);
        let copy_to_self = self
            .device
            .features()
            .contains(DeviceFeatures::TEXTURE_COPY_TO_SELF);
        let src_texture = if copy_to_self && !src_rect.intersects(&dst_rect) {
            self.framebuffer.vram
        } else {
            if self.vram_dirty_rect.intersects(&src_rect) {
                self.update_vram_read_texture();
            }
            self.framebuffer.vram_read
        };

        self.include_vram_dirty_rectangle(&dst_rect.clamped(0, 0, VRAM_WIDTH, VRAM_HEIGHT));

        if self.status.check_mask_before_draw {
            self.current_depth += 1;
        }

        self.device.copy_texture_region(
            TextureRegion::new(self.framebuffer.vram, dst_x * scale, dst_y * scale),
            TextureRegion::new(src_texture, src_x * scale, src_y * scale),
            width * scale,
            height * scale,
        );
    }
}
