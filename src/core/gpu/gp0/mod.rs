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

//! GP0 command decoding
//!
//! Words are queued until the command at the head of the FIFO is complete,
//! then the whole command is handed to its handler. Polylines have no fixed
//! length and are complete once their terminator word arrives.
//!
//! # References
//!
//! - [PSX-SPX: GPU Command Summary](http://problemkaputt.de/psx-spx.htm#gpucommandsummary)

mod drawing_mode;
mod fill;
mod line;
mod polygon;
mod rectangle;
mod transfer;

pub use transfer::{VramTransfer, VramTransferDirection};

use super::types::{Primitive, RectangleSize, RenderCommand};
use super::HardwareRenderer;
use crate::core::device::GpuDevice;

/// Polyline terminator, matched under [`POLYLINE_TERMINATOR_MASK`]
pub const POLYLINE_TERMINATOR: u32 = 0x5000_5000;
pub const POLYLINE_TERMINATOR_MASK: u32 = 0xF000_F000;

/// Words making up the command at the front of `fifo`
///
/// `None` means more words are needed. For polylines the count includes
/// the terminator.
fn command_length(fifo: &[u32]) -> Option<usize> {
    let header = *fifo.first()?;
    let length = match header >> 24 {
        0x02 => 3,
        0x20..=0x7F => {
            let rc = RenderCommand(header);
            match rc.primitive() {
                Primitive::Polygon => {
                    let vertices = rc.num_polygon_vertices();
                    let per_vertex = 1 + rc.texture_enable() as usize;
                    let colors = if rc.shading_enable() { vertices - 1 } else { 0 };
                    1 + vertices * per_vertex + colors
                }
                Primitive::Line if rc.polyline() => return polyline_length(rc, fifo),
                Primitive::Line => {
                    if rc.shading_enable() {
                        4
                    } else {
                        3
                    }
                }
                Primitive::Rectangle => {
                    let size = rc.rectangle_size() == RectangleSize::Variable;
                    2 + rc.texture_enable() as usize + size as usize
                }
                Primitive::Reserved => 1,
            }
        }
        0x80..=0x9F => 4,
        0xA0..=0xDF => 3,
        _ => 1,
    };
    (fifo.len() >= length).then_some(length)
}

/// Length of a polyline up to and including its terminator
///
/// The terminator is only recognised where a color (shaded) or vertex
/// (flat) word could start, after the first two vertices.
fn polyline_length(rc: RenderCommand, fifo: &[u32]) -> Option<usize> {
    let (first, step) = if rc.shading_enable() { (4, 2) } else { (3, 1) };
    (first..fifo.len())
        .step_by(step)
        .find(|&i| fifo[i] & POLYLINE_TERMINATOR_MASK == POLYLINE_TERMINATOR)
        .map(|i| i + 1)
}

impl<D: GpuDevice> HardwareRenderer<D> {
    /// Run every complete command in the FIFO
    pub(in crate::core::gpu) fn try_process_command(&mut self) {
        loop {
            if self
                .vram_transfer
                .as_ref()
                .is_some_and(VramTransfer::is_cpu_to_vram)
            {
                // Remaining words are pixel data.
                let pending: Vec<u32> = self.command_fifo.drain(..).collect();
                for word in pending {
                    self.process_vram_write(word);
                }
                return;
            }

            let words = self.command_fifo.make_contiguous();
            let Some(length) = command_length(words) else {
                return;
            };
            let mut command: Vec<u32> = self.command_fifo.drain(..length).collect();
            let header = command[0];
            log::trace!("GP0 command 0x{:08X} ({} words)", header, length);

            match header >> 24 {
                0x00 => {}
                0x01 => log::trace!("Texture cache flush"),
                0x02 => self.gp0_fill_rectangle(&command),
                0x1F => log::debug!("GPU interrupt request"),
                0x20..=0x3F => self.gp0_polygon(&command),
                0x40..=0x5F => {
                    if RenderCommand(header).polyline() {
                        command.pop();
                    }
                    self.gp0_line(&command);
                }
                0x60..=0x7F => self.gp0_rectangle(&command),
                0x80..=0x9F => self.gp0_vram_to_vram_transfer(&command),
                0xA0..=0xBF => self.gp0_cpu_to_vram_transfer(&command),
                0xC0..=0xDF => self.gp0_vram_to_cpu_transfer(&command),
                0xE1 => self.gp0_draw_mode(header),
                0xE2 => self.gp0_texture_window(header),
                0xE3 => self.gp0_draw_area_top_left(header),
                0xE4 => self.gp0_draw_area_bottom_right(header),
                0xE5 => self.gp0_draw_offset(header),
                0xE6 => self.gp0_mask_settings(header),
                op => log::warn!("Unknown GP0 command: 0x{:02X}", op),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_lengths() {
        assert_eq!(command_length(&[0x0200_0000, 0, 0]), Some(3));
        assert_eq!(command_length(&[0x0200_0000, 0]), None);
        // Flat triangle, shaded textured quad
        assert_eq!(command_length(&[0x2000_0000; 4]), Some(4));
        assert_eq!(command_length(&[0x3C00_0000; 12]), Some(12));
        assert_eq!(command_length(&[0x3C00_0000; 11]), None);
        // Variable textured rectangle, 16x16 flat rectangle
        assert_eq!(command_length(&[0x6400_0000; 4]), Some(4));
        assert_eq!(command_length(&[0x7800_0000; 2]), Some(2));
        assert_eq!(command_length(&[0x8000_0000; 4]), Some(4));
        assert_eq!(command_length(&[0xE100_0000]), Some(1));
    }

    #[test]
    fn test_polyline_terminator() {
        let flat = [0x4800_0000, 0, 0x0010_0010, 0x5555_5555];
        assert_eq!(command_length(&flat), Some(4));
        assert_eq!(command_length(&flat[..3]), None);

        // A color word equal to the terminator pattern inside a shaded line
        // only terminates at a color position.
        let shaded = [0x5800_0000, 0, 0x5000_5000, 0x0010_0010, 0x5000_5000];
        assert_eq!(command_length(&shaded), Some(5));
    }
}
