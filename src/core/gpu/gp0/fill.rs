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

//! GP0 Fill Rectangle command
//!
//! GP0(0x02) clears a VRAM rectangle to a solid color. It works on raw VRAM
//! coordinates, ignoring the drawing area, drawing offset and mask bits.

use super::super::HardwareRenderer;
use crate::core::device::GpuDevice;

impl<D: GpuDevice> HardwareRenderer<D> {
    /// GP0(0x02): Fill Rectangle in VRAM
    ///
    /// # Command Format
    ///
    /// ```text
    /// Word 0: 0x02BBGGRR  command + 24-bit color
    /// Word 1: YyyyXxxx    X in bits 0-15 (multiple of 16), Y in bits 16-31
    /// Word 2: HhhhWwww    width in bits 0-15, height in bits 16-31
    /// ```
    ///
    /// The width is rounded up to a multiple of 16 pixels. Rectangles that
    /// extend past the right or bottom edge wrap around.
    pub(in crate::core::gpu) fn gp0_fill_rectangle(&mut self, words: &[u32]) {
        let color = words[0] & 0x00FF_FFFF;
        let x = words[1] & 0x3F0;
        let y = (words[1] >> 16) & 0x1FF;
        let width = ((words[2] & 0x3FF) + 0xF) & !0xF;
        let height = (words[2] >> 16) & 0x1FF;

        log::debug!(
            "Fill Rectangle: ({}, {}) size {}×{} color=0x{:06X}",
            x,
            y,
            width,
            height,
            color
        );

        if width == 0 || height == 0 {
            return;
        }

        self.fill_vram(x, y, width, height, color);
    }
}

#[cfg(test)]
mod tests {
    use crate::core::config::RendererSettings;
    use crate::core::device::HeadlessDevice;
    use crate::core::gpu::{HardwareRenderer, Rect};

    #[test]
    fn test_fill_width_alignment() {
        let mut renderer =
            HardwareRenderer::new(HeadlessDevice::default(), RendererSettings::default()).unwrap();

        // Blue, 100x50 at (0, 0): the width rounds up to 112
        renderer.write_gp0(0x02FF_0000);
        renderer.write_gp0(0x0000_0000);
        renderer.write_gp0(0x0032_0064);
        assert_eq!(renderer.dirty_rect(), Rect::new(0, 0, 112, 50));

        let vram = renderer.vram_contents().unwrap();
        assert_eq!(vram[0], 0x7C00);
        assert_eq!(vram[111], 0x7C00);
        assert_eq!(vram[112], 0);
        assert_eq!(vram[49 * 1024], 0x7C00);
        assert_eq!(vram[50 * 1024], 0);
    }

    #[test]
    fn test_fill_ignores_drawing_offset_and_aligns_x() {
        let mut renderer =
            HardwareRenderer::new(HeadlessDevice::default(), RendererSettings::default()).unwrap();
        renderer.write_gp0(0xE500_0000 | 100);
        renderer.write_gp0(0x0200_00FF);
        renderer.write_gp0(0x0000_0013);
        renderer.write_gp0(0x0001_0001);
        assert_eq!(renderer.dirty_rect(), Rect::new(16, 0, 32, 1));
    }

    #[test]
    fn test_empty_fill_is_ignored() {
        let mut renderer =
            HardwareRenderer::new(HeadlessDevice::default(), RendererSettings::default()).unwrap();
        renderer.write_gp0(0x0200_00FF);
        renderer.write_gp0(0);
        renderer.write_gp0(0x0000_0010);
        assert!(!renderer.dirty_rect().is_valid());
    }
}
