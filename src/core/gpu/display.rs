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

//! Display output
//!
//! Turns the display registers into a presentable region of VRAM. A plain
//! 15-bit progressive frame is presented straight out of the VRAM render
//! target; 24-bit color, interlacing and multisampling go through a
//! reinterpretation pass into a private texture first. Either result can
//! then be downsampled with a box filter or the adaptive mip-chain filter.

use super::types::{
    ColorDepth, DisplayMode, HorizontalRes, InterlacedRenderMode, VerticalRes, VideoMode,
};
use super::uniforms::{AdaptiveDownsampleUniforms, DisplayUniforms};
use super::{Framebuffer, HardwareRenderer};
use crate::core::config::DownsampleMode;
use crate::core::device::{GpuDevice, TextureDesc, TextureHandle, TextureRegion};

/// Display registers written through GP1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayState {
    pub mode: DisplayMode,
    /// Raw GP1(08h) bits 0-6
    pub mode_bits: u32,
    /// Top-left corner of the displayed area in VRAM
    pub vram_start_x: u32,
    pub vram_start_y: u32,
    /// Horizontal display range in dot clock units
    pub x1: u32,
    pub x2: u32,
    /// Vertical display range in scanlines
    pub y1: u32,
    pub y2: u32,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            mode: DisplayMode::default(),
            mode_bits: 0x01,
            vram_start_x: 0,
            vram_start_y: 0,
            x1: 0x200,
            x2: 0x200 + 256 * 10,
            y1: 0x10,
            y2: 0x10 + 240,
        }
    }
}

impl DisplayState {
    pub fn is_24bit(&self) -> bool {
        self.mode.color_depth == ColorDepth::C24Bit
    }

    /// 480-line interlaced output, where each field is a separate set of lines
    pub fn is_480i(&self) -> bool {
        self.mode.interlaced && self.mode.vertical_res == VerticalRes::R480
    }

    fn dot_clock_divider(&self) -> u32 {
        match self.mode.horizontal_res {
            HorizontalRes::R256 => 10,
            HorizontalRes::R320 => 8,
            HorizontalRes::R512 => 5,
            HorizontalRes::R640 => 4,
            HorizontalRes::R368 | HorizontalRes::R384 => 7,
        }
    }

    /// Visible width in VRAM pixels
    ///
    /// Derived from the horizontal range and rounded to a multiple of four,
    /// never wider than the horizontal resolution.
    ///
    /// ```
    /// use psrx_hw::core::gpu::DisplayState;
    ///
    /// let display = DisplayState::default();
    /// assert_eq!(display.display_width(), 320);
    /// assert_eq!(display.display_height(), 240);
    /// ```
    pub fn display_width(&self) -> u32 {
        let full = self.mode.horizontal_res.width();
        if self.x2 <= self.x1 {
            return 0;
        }
        let dots = ((self.x2 - self.x1) / self.dot_clock_divider() + 2) & !3;
        dots.min(full)
    }

    /// Visible height in VRAM lines, counting both fields when interlaced
    pub fn display_height(&self) -> u32 {
        if self.y2 <= self.y1 {
            return 0;
        }
        let lines = self.y2 - self.y1;
        if self.is_480i() {
            (lines * 2).min(480)
        } else {
            lines.min(if self.mode.video_mode == VideoMode::PAL {
                288
            } else {
                240
            })
        }
    }

    /// GPUSTAT bits 16-22
    pub fn gpustat_bits(&self) -> u32 {
        ((self.mode_bits & 0x3F) << 17) | (((self.mode_bits >> 6) & 1) << 16)
    }
}

/// The image a frontend should show for the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentedFrame {
    pub texture: TextureHandle,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl<D: GpuDevice> HardwareRenderer<D> {
    /// Presented frame from the last [`update_display`](Self::update_display)
    ///
    /// `None` while the display is disabled or empty.
    pub fn presented_frame(&self) -> Option<PresentedFrame> {
        self.presented
    }

    pub fn display_state(&self) -> &DisplayState {
        &self.display
    }

    /// How the display pass handles interlaced output
    pub fn interlaced_render_mode(&self) -> InterlacedRenderMode {
        if !self.display.mode.interlaced || self.resolved.disable_interlacing {
            InterlacedRenderMode::None
        } else if self.display.mode.vertical_res == VerticalRes::R480 {
            InterlacedRenderMode::InterleavedFields
        } else {
            InterlacedRenderMode::SeparateFields
        }
    }

    /// Drop the presented frame and blank the private display texture
    pub fn clear_display(&mut self) {
        self.presented = None;
        if let Some(private) = self.framebuffer.display_private {
            self.device.clear_render_target(private, 0xFF00_0000);
        }
    }

    fn set_presented(&mut self, texture: TextureHandle, x: u32, y: u32, width: u32, height: u32) {
        self.presented = Some(PresentedFrame {
            texture,
            x,
            y,
            width,
            height,
        });
    }

    /// Compose the frame the display registers select
    ///
    /// Flushes pending drawing first. Failing to allocate the private
    /// display texture leaves the display blank for this frame.
    pub fn update_display(&mut self) {
        self.flush_render();

        if self.status.display_disable {
            self.clear_display();
            return;
        }

        let display_width = self.display.display_width();
        let display_height = self.display.display_height();
        if display_width == 0 || display_height == 0 {
            self.clear_display();
            return;
        }

        let is_24bit = self.display.is_24bit();
        let scale = if is_24bit {
            1
        } else {
            self.resolved.resolution_scale
        };
        let scaled_x = self.display.vram_start_x * scale;
        let scaled_y = self.display.vram_start_y * scale;
        let scaled_width = display_width * scale;
        let scaled_height = display_height * scale;
        let interlaced = self.interlaced_render_mode();

        let direct = !is_24bit
            && interlaced == InterlacedRenderMode::None
            && !self.resolved.is_using_multisampling()
            && scaled_x + scaled_width <= self.framebuffer.width
            && scaled_y + scaled_height <= self.framebuffer.height;

        if direct {
            let vram = self.framebuffer.vram;
            if self.is_using_downsampling() {
                self.downsample_framebuffer(vram, scaled_x, scaled_y, scaled_width, scaled_height);
            } else {
                self.set_presented(vram, scaled_x, scaled_y, scaled_width, scaled_height);
            }
            return;
        }

        let Some(private) = self.ensure_display_texture(scaled_width, scaled_height) else {
            self.clear_display();
            return;
        };
        let Some(pipeline) = self.pipelines.display[is_24bit as usize][interlaced.index()] else {
            log::error!("Display pipeline missing");
            self.clear_display();
            return;
        };

        if interlaced == InterlacedRenderMode::None {
            self.device.invalidate_render_target(private);
        }

        let field_offset = if interlaced != InterlacedRenderMode::None {
            self.status.interlaced_field as u32
        } else {
            0
        };
        let uniforms = DisplayUniforms {
            vram_offset_x: scaled_x,
            vram_offset_y: scaled_y + field_offset,
            crop_left: 0,
            field_offset,
        };

        self.device.set_render_targets(Some(private), None);
        self.device.set_pipeline(pipeline);
        self.device
            .set_texture_sampler(0, self.framebuffer.vram, self.framebuffer.nearest_sampler);
        self.device.push_uniforms(bytemuck::bytes_of(&uniforms));
        self.device
            .set_viewport_and_scissor(0, 0, scaled_width, scaled_height);
        self.device.draw(3, 0);

        if self.is_using_downsampling() {
            self.downsample_framebuffer(private, 0, 0, scaled_width, scaled_height);
        } else {
            self.set_presented(private, 0, 0, scaled_width, scaled_height);
        }

        self.restore_device_context();
    }

    /// Private display texture of exactly `width` x `height`
    fn ensure_display_texture(&mut self, width: u32, height: u32) -> Option<TextureHandle> {
        if Framebuffer::texture_matches(&self.device, self.framebuffer.display_private, width, height)
        {
            return self.framebuffer.display_private;
        }

        if let Some(old) = self.framebuffer.display_private.take() {
            self.device.destroy_texture(old);
        }
        match self
            .device
            .create_texture(&TextureDesc::render_target(width, height, 1))
        {
            Ok(texture) => {
                self.framebuffer.display_private = Some(texture);
                Some(texture)
            }
            Err(e) => {
                log::error!("Failed to create {}x{} display texture: {}", width, height, e);
                None
            }
        }
    }

    fn downsample_framebuffer(
        &mut self,
        source: TextureHandle,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    ) {
        match self.resolved.downsample_mode {
            DownsampleMode::Adaptive => self.downsample_adaptive(source, left, top, width, height),
            DownsampleMode::Box => self.downsample_box(source, left, top, width, height),
            DownsampleMode::Disabled => self.set_presented(source, left, top, width, height),
        }
    }

    /// Mip chain, blur at the lowest level, then composite by the blur weight
    fn downsample_adaptive(
        &mut self,
        source: TextureHandle,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    ) {
        let fb = &self.framebuffer;
        let pl = &self.pipelines;
        let (
            Some(mips),
            Some(render),
            Some(weight),
            Some(first_pass),
            Some(mid_pass),
            Some(blur_pass),
            Some(composite_pass),
            Some(lod_sampler),
            Some(composite_sampler),
        ) = (
            fb.downsample_texture,
            fb.downsample_render,
            fb.downsample_weight,
            pl.downsample_first_pass,
            pl.downsample_mid_pass,
            pl.downsample_blur_pass,
            pl.downsample_composite_pass,
            pl.downsample_lod_sampler,
            pl.downsample_composite_sampler,
        )
        else {
            log::error!("Adaptive downsample resources missing");
            self.set_presented(source, left, top, width, height);
            return;
        };

        self.device.copy_texture_region(
            TextureRegion::new(mips, 0, 0),
            TextureRegion::new(source, left, top),
            width,
            height,
        );
        self.device.set_texture_sampler(0, mips, lod_sampler);

        let levels = self.resolved.adaptive_downsample_mip_levels();
        let (mip_width, mip_height) = (self.framebuffer.width, self.framebuffer.height);
        for level in 1..levels {
            let level_width = (width >> level).max(1);
            let level_height = (height >> level).max(1);
            let rcp_width = 1.0 / (mip_width >> level).max(1) as f32;
            let rcp_height = 1.0 / (mip_height >> level).max(1) as f32;
            let uniforms = AdaptiveDownsampleUniforms {
                min_uv: [0.0, 0.0],
                max_uv: [level_width as f32 * rcp_width, level_height as f32 * rcp_height],
                rcp_resolution: [rcp_width, rcp_height],
                lod: (level - 1) as f32,
            };

            self.device.clear_render_target(render, 0);
            self.device.set_render_targets(Some(render), None);
            self.device
                .set_viewport_and_scissor(0, 0, level_width, level_height);
            self.device
                .set_pipeline(if level == 1 { first_pass } else { mid_pass });
            self.device.push_uniforms(bytemuck::bytes_of(&uniforms));
            self.device.draw(3, 0);
            self.device.copy_texture_region(
                TextureRegion::new(mips, 0, 0).at_level(level),
                TextureRegion::new(render, 0, 0),
                level_width,
                level_height,
            );
        }

        let last_level = levels.saturating_sub(1);
        let last_width = (width >> last_level).max(1);
        let last_height = (height >> last_level).max(1);
        let rcp_width = 1.0 / mip_width as f32;
        let rcp_height = 1.0 / mip_height as f32;
        let uniforms = AdaptiveDownsampleUniforms {
            min_uv: [0.0, 0.0],
            max_uv: [last_width as f32 * rcp_width, last_height as f32 * rcp_height],
            rcp_resolution: [rcp_width, rcp_height],
            lod: 0.0,
        };
        self.device.clear_render_target(weight, 0);
        self.device.set_render_targets(Some(weight), None);
        self.device
            .set_texture_sampler(0, render, self.framebuffer.nearest_sampler);
        self.device
            .set_viewport_and_scissor(0, 0, last_width, last_height);
        self.device.set_pipeline(blur_pass);
        self.device.push_uniforms(bytemuck::bytes_of(&uniforms));
        self.device.draw(3, 0);

        self.device.clear_render_target(render, 0);
        self.device.set_render_targets(Some(render), None);
        self.device.set_texture_sampler(0, mips, composite_sampler);
        self.device.set_texture_sampler(1, weight, lod_sampler);
        self.device.set_viewport_and_scissor(0, 0, width, height);
        self.device.set_pipeline(composite_pass);
        self.device.draw(3, 0);

        self.restore_device_context();
        self.set_presented(render, 0, 0, width, height);
    }

    /// Single pass averaging `scale / box_downsample_scale` texels per axis
    fn downsample_box(&mut self, source: TextureHandle, left: u32, top: u32, width: u32, height: u32) {
        let (Some(render), Some(pipeline)) = (
            self.framebuffer.downsample_render,
            self.pipelines.downsample_first_pass,
        ) else {
            log::error!("Box downsample resources missing");
            self.set_presented(source, left, top, width, height);
            return;
        };

        let factor = (self.resolved.resolution_scale / self.resolved.box_downsample_scale).max(1);
        let ds_left = left / factor;
        let ds_top = top / factor;
        let ds_width = width / factor;
        let ds_height = height / factor;

        self.device.clear_render_target(render, 0);
        self.device.set_render_targets(Some(render), None);
        self.device.set_pipeline(pipeline);
        self.device
            .set_texture_sampler(0, source, self.framebuffer.nearest_sampler);
        self.device
            .set_viewport_and_scissor(ds_left, ds_top, ds_width, ds_height);
        self.device.draw(3, 0);

        self.restore_device_context();
        self.set_presented(render, ds_left, ds_top, ds_width, ds_height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RendererSettings;
    use crate::core::device::{DeviceCommand, HeadlessDevice, ShaderKey};

    fn renderer(settings: RendererSettings) -> HardwareRenderer<HeadlessDevice> {
        HardwareRenderer::new(HeadlessDevice::default(), settings).unwrap()
    }

    #[test]
    fn test_gpustat_mode_bits() {
        let display = DisplayState {
            mode_bits: 0x7F,
            ..Default::default()
        };
        assert_eq!(display.gpustat_bits(), 0x007F_0000);
    }

    #[test]
    fn test_progressive_15bit_is_presented_from_vram() {
        let mut renderer = renderer(RendererSettings {
            resolution_scale: 2,
            ..Default::default()
        });
        renderer.write_gp1(0x0300_0000);
        renderer.write_gp1(0x0500_0000 | (16 << 10) | 64);
        renderer.update_display();

        let frame = renderer.presented_frame().unwrap();
        assert_eq!(frame.texture, renderer.framebuffer().vram);
        assert_eq!((frame.x, frame.y), (128, 32));
        assert_eq!((frame.width, frame.height), (640, 480));
        assert!(renderer.framebuffer().display_private.is_none());
    }

    #[test]
    fn test_24bit_goes_through_private_texture() {
        let mut renderer = renderer(RendererSettings {
            resolution_scale: 2,
            ..Default::default()
        });
        renderer.write_gp1(0x0300_0000);
        renderer.write_gp1(0x0800_0011);
        renderer.update_display();

        let frame = renderer.presented_frame().unwrap();
        let private = renderer.framebuffer().display_private.unwrap();
        assert_eq!(frame.texture, private);
        // 24-bit output is native resolution.
        assert_eq!((frame.width, frame.height), (320, 240));
        assert!(renderer.device().draw_calls().iter().any(|(shader, _, _)| matches!(
            shader,
            Some(ShaderKey::Display {
                depth_24bit: true,
                ..
            })
        )));
    }

    #[test]
    fn test_disabled_display_presents_nothing() {
        let mut renderer = renderer(RendererSettings::default());
        renderer.write_gp1(0x0300_0000);
        renderer.update_display();
        assert!(renderer.presented_frame().is_some());

        renderer.write_gp1(0x0300_0001);
        renderer.update_display();
        assert!(renderer.presented_frame().is_none());
    }

    #[test]
    fn test_box_downsample_presents_reduced_region() {
        let mut renderer = renderer(RendererSettings {
            resolution_scale: 4,
            downsample_mode: DownsampleMode::Box,
            downsample_scale: 2,
            ..Default::default()
        });
        renderer.write_gp1(0x0300_0000);
        renderer.update_display();

        let frame = renderer.presented_frame().unwrap();
        assert_eq!(Some(frame.texture), renderer.framebuffer().downsample_render);
        assert_eq!((frame.width, frame.height), (640, 480));
    }

    #[test]
    fn test_adaptive_downsample_builds_mip_chain() {
        let mut renderer = renderer(RendererSettings {
            resolution_scale: 4,
            downsample_mode: DownsampleMode::Adaptive,
            ..Default::default()
        });
        renderer.write_gp1(0x0300_0000);
        renderer.device_mut().clear_commands();
        renderer.update_display();

        let mip_copies = renderer
            .device()
            .commands()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::CopyTextureRegion { dst, .. } if dst.level > 0))
            .count();
        assert_eq!(mip_copies, 2);
        let frame = renderer.presented_frame().unwrap();
        assert_eq!(Some(frame.texture), renderer.framebuffer().downsample_render);
        assert_eq!((frame.width, frame.height), (1280, 960));
    }

    fn interlaced_renderer() -> HardwareRenderer<HeadlessDevice> {
        renderer(RendererSettings {
            disable_interlacing: false,
            ..Default::default()
        })
    }

    #[test]
    fn test_interlaced_mode_selection() {
        let mut renderer = interlaced_renderer();
        assert_eq!(renderer.interlaced_render_mode(), InterlacedRenderMode::None);
        renderer.write_gp1(0x0800_0024);
        assert_eq!(
            renderer.interlaced_render_mode(),
            InterlacedRenderMode::InterleavedFields
        );
        renderer.write_gp1(0x0800_0020);
        assert_eq!(
            renderer.interlaced_render_mode(),
            InterlacedRenderMode::SeparateFields
        );
    }

    #[test]
    fn test_disable_interlacing_renders_progressive() {
        let mut renderer = renderer(RendererSettings::default());
        renderer.write_gp1(0x0800_0024);
        assert_eq!(renderer.interlaced_render_mode(), InterlacedRenderMode::None);
    }

    #[test]
    fn test_480i_display_samples_current_field() {
        let mut renderer = interlaced_renderer();
        renderer.write_gp1(0x0300_0000);
        renderer.write_gp1(0x0500_0000 | (16 << 10));
        renderer.write_gp1(0x0800_0024);
        renderer.set_interlaced_field(true);
        renderer.device_mut().clear_commands();
        renderer.update_display();

        let frame = renderer.presented_frame().unwrap();
        assert_eq!(Some(frame.texture), renderer.framebuffer().display_private);

        let commands = renderer.device().commands();
        let draw = commands
            .iter()
            .position(|cmd| {
                matches!(
                    cmd,
                    DeviceCommand::Draw {
                        fragment_shader: Some(ShaderKey::Display {
                            depth_24bit: false,
                            interlace: InterlacedRenderMode::InterleavedFields,
                            ..
                        }),
                        ..
                    }
                )
            })
            .unwrap();
        let uniforms = commands[..draw]
            .iter()
            .rev()
            .find_map(|cmd| match cmd {
                DeviceCommand::PushUniforms(bytes) => {
                    Some(bytemuck::pod_read_unaligned::<DisplayUniforms>(bytes))
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(uniforms.field_offset, 1);
        assert_eq!((uniforms.vram_offset_x, uniforms.vram_offset_y), (0, 17));
    }
}
