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

//! GP0 Drawing Mode Commands
//!
//! GP0 commands that control drawing settings: texture page, texture window,
//! drawing area, drawing offset and masking. Each forwards to the draw state
//! tracker, which flushes the pending batch when the change affects it.
//!
//! # Commands
//!
//! - 0xE1: Draw Mode Setting (texture page, transparency, dithering, etc.)
//! - 0xE2: Texture Window Setting
//! - 0xE3: Set Drawing Area Top-Left
//! - 0xE4: Set Drawing Area Bottom-Right
//! - 0xE5: Set Drawing Offset
//! - 0xE6: Mask Bit Setting
//!
//! # References
//!
//! - [PSX-SPX: GP0 Drawing Settings](http://problemkaputt.de/psx-spx.htm#gpurenderattributes)

use super::super::types::{sign_extend_11, DrawingArea};
use super::super::HardwareRenderer;
use crate::core::device::GpuDevice;

impl<D: GpuDevice> HardwareRenderer<D> {
    /// GP0(E1h) - Draw Mode Setting (aka "Texpage")
    ///
    /// # Command Format
    ///
    /// ```text
    /// 0xE1000000 | params
    ///   Bit 0-3:   Texture page X Base   (N*64)
    ///   Bit 4:     Texture page Y Base   (N*256)
    ///   Bit 5-6:   Semi Transparency     (0=B/2+F/2, 1=B+F, 2=B-F, 3=B+F/4)
    ///   Bit 7-8:   Texture page colors   (0=4bit, 1=8bit, 2=15bit)
    ///   Bit 9:     Dithering enabled
    ///   Bit 10:    Drawing to display area allowed
    ///   Bit 11:    Texture disable
    ///   Bit 12:    Textured rectangle X-flip
    ///   Bit 13:    Textured rectangle Y-flip
    /// ```
    ///
    /// # Examples
    ///
    /// ```
    /// use psrx_hw::core::config::RendererSettings;
    /// use psrx_hw::core::device::HeadlessDevice;
    /// use psrx_hw::core::gpu::HardwareRenderer;
    ///
    /// let mut renderer =
    ///     HardwareRenderer::new(HeadlessDevice::default(), RendererSettings::default()).unwrap();
    ///
    /// // Texture page at (128, 256), 4-bit, dithering on
    /// renderer.write_gp0(0xE100_0212);
    /// assert_eq!(renderer.gpustat() & 0x7FF, 0x212);
    /// ```
    pub(in crate::core::gpu) fn gp0_draw_mode(&mut self, value: u32) {
        self.set_draw_mode(value as u16);
        log::trace!("Draw mode: 0x{:04X}", value & 0x3FFF);
    }

    /// GP0(E2h) - Texture Window Setting
    ///
    /// ```text
    /// 0xE2000000 | params
    ///   Bit 0-4:   Texture window Mask X   (in 8 pixel steps)
    ///   Bit 5-9:   Texture window Mask Y   (in 8 pixel steps)
    ///   Bit 10-14: Texture window Offset X (in 8 pixel steps)
    ///   Bit 15-19: Texture window Offset Y (in 8 pixel steps)
    /// ```
    pub(in crate::core::gpu) fn gp0_texture_window(&mut self, value: u32) {
        self.set_texture_window(value);
        log::trace!("Texture window: 0x{:05X}", value & 0xF_FFFF);
    }

    /// GP0(E3h) - Set Drawing Area Top-Left
    ///
    /// ```text
    /// 0xE3000000 | params
    ///   Bit 0-9:   X-coordinate (0-1023)
    ///   Bit 10-18: Y-coordinate (0-511)
    /// ```
    pub(in crate::core::gpu) fn gp0_draw_area_top_left(&mut self, value: u32) {
        let area = DrawingArea {
            left: (value & 0x3FF) as i32,
            top: ((value >> 10) & 0x1FF) as i32,
            ..self.drawing_area
        };
        self.set_drawing_area(area);
    }

    /// GP0(E4h) - Set Drawing Area Bottom-Right
    ///
    /// Same layout as GP0(E3h); the edge is inclusive.
    pub(in crate::core::gpu) fn gp0_draw_area_bottom_right(&mut self, value: u32) {
        let area = DrawingArea {
            right: (value & 0x3FF) as i32,
            bottom: ((value >> 10) & 0x1FF) as i32,
            ..self.drawing_area
        };
        self.set_drawing_area(area);
    }

    /// GP0(E5h) - Set Drawing Offset
    ///
    /// ```text
    /// 0xE5000000 | params
    ///   Bit 0-10:  X-offset (signed 11-bit, -1024 to +1023)
    ///   Bit 11-21: Y-offset (signed 11-bit, -1024 to +1023)
    /// ```
    pub(in crate::core::gpu) fn gp0_draw_offset(&mut self, value: u32) {
        let x = sign_extend_11((value & 0x7FF) as i32);
        let y = sign_extend_11(((value >> 11) & 0x7FF) as i32);
        self.set_drawing_offset(x, y);
        log::trace!("Draw offset: ({}, {})", x, y);
    }

    /// GP0(E6h) - Mask Bit Setting
    ///
    /// ```text
    /// 0xE6000000 | params
    ///   Bit 0: Set mask bit while drawing
    ///   Bit 1: Check mask bit before draw (skip pixels with bit 15 set)
    /// ```
    pub(in crate::core::gpu) fn gp0_mask_settings(&mut self, value: u32) {
        let set_mask = (value & 1) != 0;
        let check_mask = (value & 2) != 0;
        self.set_mask_bits(set_mask, check_mask);
        log::trace!("Mask settings: set={} check={}", set_mask, check_mask);
    }
}

#[cfg(test)]
mod tests {
    use crate::core::config::RendererSettings;
    use crate::core::device::HeadlessDevice;
    use crate::core::gpu::{DrawingArea, HardwareRenderer};

    fn renderer() -> HardwareRenderer<HeadlessDevice> {
        HardwareRenderer::new(HeadlessDevice::default(), RendererSettings::default()).unwrap()
    }

    #[test]
    fn test_drawing_area_corners() {
        let mut renderer = renderer();
        renderer.write_gp0(0xE300_0000 | (20 << 10) | 10);
        renderer.write_gp0(0xE400_0000 | (479 << 10) | 639);
        assert_eq!(
            renderer.drawing_area(),
            DrawingArea {
                left: 10,
                top: 20,
                right: 639,
                bottom: 479
            }
        );
    }

    #[test]
    fn test_draw_offset_sign_extension() {
        let mut renderer = renderer();
        let y = ((-20i32) as u32) & 0x7FF;
        renderer.write_gp0(0xE500_0000 | 10 | (y << 11));
        assert_eq!(renderer.drawing_offset, (10, -20));
    }

    #[test]
    fn test_mask_settings_in_gpustat() {
        let mut renderer = renderer();
        renderer.write_gp0(0xE600_0003);
        assert_eq!(renderer.gpustat() & 0x1800, 0x1800);
        renderer.write_gp0(0xE600_0002);
        assert_eq!(renderer.gpustat() & 0x1800, 0x1000);
    }
}
