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

//! Commands forwarded to the software renderer worker

use crossbeam_channel::Sender;

use crate::core::gpu::{DrawModeReg, DrawingArea, PaletteReg, RenderCommand, TextureWindow};

/// A vertex after the drawing offset has been applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SoftwareVertex {
    pub x: i32,
    pub y: i32,
    /// 24-bit BGR color
    pub color: u32,
    /// U in the low byte, V in the high byte
    pub texcoord: u16,
}

impl SoftwareVertex {
    pub fn u(&self) -> u8 {
        self.texcoord as u8
    }

    pub fn v(&self) -> u8 {
        (self.texcoord >> 8) as u8
    }
}

/// Drawing registers captured when a primitive was submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawParams {
    pub rc: RenderCommand,
    pub draw_mode: DrawModeReg,
    pub palette: PaletteReg,
    pub texture_window: TextureWindow,
    pub dithering: bool,
    pub set_mask: bool,
    pub check_mask: bool,
    /// Field whose lines are left untouched while interlaced rendering is on
    pub skip_field: Option<u32>,
}

#[derive(Debug)]
pub enum SoftwareCommand {
    FillVram {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        color: u32,
        skip_field: Option<u32>,
    },
    UpdateVram {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: Vec<u16>,
        set_mask: bool,
        check_mask: bool,
    },
    CopyVram {
        src_x: u32,
        src_y: u32,
        dst_x: u32,
        dst_y: u32,
        width: u32,
        height: u32,
        set_mask: bool,
        check_mask: bool,
    },
    DrawPolygon {
        params: DrawParams,
        vertices: Vec<SoftwareVertex>,
    },
    DrawRectangle {
        params: DrawParams,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        color: u32,
        texcoord: u16,
    },
    DrawLine {
        params: DrawParams,
        vertices: Vec<SoftwareVertex>,
    },
    SetDrawingArea(DrawingArea),
    /// Replace the whole of VRAM
    LoadVram(Vec<u16>),
    /// Reset the drawing area, zeroing VRAM as well when asked to
    Reset { clear_vram: bool },
    /// Acknowledged once every earlier command has executed
    Sync(Sender<()>),
}
