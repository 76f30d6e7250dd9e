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

//! GP1 display configuration commands
//!
//! Display enable, the displayed VRAM area, screen ranges and video mode.
//! Nothing is presented until the next display update.

use super::super::types::{ColorDepth, HorizontalRes, VerticalRes, VideoMode};
use super::super::HardwareRenderer;
use crate::core::device::GpuDevice;

impl<D: GpuDevice> HardwareRenderer<D> {
    /// GP1(0x03): Display Enable
    ///
    /// Bit 0: 0=Enable, 1=Disable
    pub(in crate::core::gpu) fn gp1_display_enable(&mut self, value: u32) {
        let disabled = (value & 1) != 0;
        self.status.display_disable = disabled;

        log::debug!("Display {}", if disabled { "disabled" } else { "enabled" });
    }

    /// GP1(0x05): Start of Display Area
    ///
    /// Bits 0-9: X coordinate (halfword aligned), Bits 10-18: Y coordinate
    pub(in crate::core::gpu) fn gp1_display_area_start(&mut self, value: u32) {
        self.display.vram_start_x = value & 0x3FE;
        self.display.vram_start_y = (value >> 10) & 0x1FF;

        log::debug!(
            "Display area start: ({}, {})",
            self.display.vram_start_x,
            self.display.vram_start_y
        );
    }

    /// GP1(0x06): Horizontal Display Range
    ///
    /// Bits 0-11: X1 start, Bits 12-23: X2 end, in dot clock units
    pub(in crate::core::gpu) fn gp1_horizontal_display_range(&mut self, value: u32) {
        self.display.x1 = value & 0xFFF;
        self.display.x2 = (value >> 12) & 0xFFF;

        log::debug!(
            "Horizontal display range: {} to {} (width: {})",
            self.display.x1,
            self.display.x2,
            self.display.display_width()
        );
    }

    /// GP1(0x07): Vertical Display Range
    ///
    /// Bits 0-9: Y1 start, Bits 10-19: Y2 end, in scanlines
    pub(in crate::core::gpu) fn gp1_vertical_display_range(&mut self, value: u32) {
        self.display.y1 = value & 0x3FF;
        self.display.y2 = (value >> 10) & 0x3FF;

        log::debug!(
            "Vertical display range: {} to {} (height: {})",
            self.display.y1,
            self.display.y2,
            self.display.display_height()
        );
    }

    /// GP1(0x08): Display Mode
    ///
    /// - Bits 0-1: Horizontal resolution 1
    /// - Bit 2: Vertical resolution (0=240, 1=480)
    /// - Bit 3: Video mode (0=NTSC, 1=PAL)
    /// - Bit 4: Color depth (0=15bit, 1=24bit)
    /// - Bit 5: Interlace (0=Off, 1=On)
    /// - Bit 6: Horizontal resolution 2
    pub(in crate::core::gpu) fn gp1_display_mode(&mut self, value: u32) {
        let mut display = self.display;
        let hr1 = value & 3;
        let hr2 = (value >> 6) & 1;
        display.mode.horizontal_res = match (hr2, hr1) {
            (0, 0) => HorizontalRes::R256,
            (0, 1) => HorizontalRes::R320,
            (0, 2) => HorizontalRes::R512,
            (0, _) => HorizontalRes::R640,
            (_, 1) => HorizontalRes::R384,
            // Reserved combinations behave as 368
            _ => HorizontalRes::R368,
        };
        display.mode.vertical_res = if (value >> 2) & 1 != 0 {
            VerticalRes::R480
        } else {
            VerticalRes::R240
        };
        display.mode.video_mode = if (value >> 3) & 1 != 0 {
            VideoMode::PAL
        } else {
            VideoMode::NTSC
        };
        display.mode.color_depth = if (value >> 4) & 1 != 0 {
            ColorDepth::C24Bit
        } else {
            ColorDepth::C15Bit
        };
        display.mode.interlaced = (value >> 5) & 1 != 0;
        display.mode_bits = value & 0x7F;

        // Batched primitives were set up for the old field masking.
        if display.is_480i() != self.display.is_480i() {
            self.flush_render();
        }
        self.display = display;

        log::debug!(
            "Display mode: {:?} {:?} {:?} {:?} interlaced={}",
            self.display.mode.horizontal_res,
            self.display.mode.vertical_res,
            self.display.mode.video_mode,
            self.display.mode.color_depth,
            self.display.mode.interlaced
        );
    }
}
