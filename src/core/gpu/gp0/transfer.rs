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

//! GP0 VRAM transfer commands
//!
//! CPU→VRAM data is staged until the whole rectangle has arrived and then
//! uploaded in one pass. VRAM→CPU reads back the rectangle when the command
//! arrives and serves GPUREAD from that snapshot.

use super::super::types::{VRAM_HEIGHT, VRAM_WIDTH};
use super::super::HardwareRenderer;
use crate::core::device::GpuDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VramTransferDirection {
    CpuToVram,
    VramToCpu,
}

/// An in-flight CPU↔VRAM transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VramTransfer {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub direction: VramTransferDirection,
    /// Pixels received (CPU→VRAM) or still to be read (VRAM→CPU)
    pixels: Vec<u16>,
    position: usize,
}

impl VramTransfer {
    pub fn is_cpu_to_vram(&self) -> bool {
        self.direction == VramTransferDirection::CpuToVram
    }

    fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn is_complete(&self) -> bool {
        self.position >= self.pixel_count()
    }
}

/// Decode the position and size words shared by the transfer commands
///
/// Sizes of zero wrap to the maximum, as on hardware.
fn decode_rect(position: u32, size: u32) -> (u32, u32, u32, u32) {
    let x = position & 0x3FF;
    let y = (position >> 16) & 0x1FF;
    let width = ((size & 0xFFFF).wrapping_sub(1) & 0x3FF) + 1;
    let height = (((size >> 16) & 0xFFFF).wrapping_sub(1) & 0x1FF) + 1;
    (x, y, width, height)
}

impl<D: GpuDevice> HardwareRenderer<D> {
    /// GP0(0xA0): CPU→VRAM Transfer
    ///
    /// Following GP0 writes carry two pixels each until the rectangle is full.
    pub(in crate::core::gpu) fn gp0_cpu_to_vram_transfer(&mut self, words: &[u32]) {
        let (x, y, width, height) = decode_rect(words[1], words[2]);
        log::debug!("CPU→VRAM transfer: ({}, {}) size {}×{}", x, y, width, height);

        self.vram_transfer = Some(VramTransfer {
            x,
            y,
            width,
            height,
            direction: VramTransferDirection::CpuToVram,
            pixels: Vec::with_capacity((width * height) as usize),
            position: 0,
        });
    }

    /// Stage one data word of a CPU→VRAM transfer
    pub(in crate::core::gpu) fn process_vram_write(&mut self, value: u32) {
        let Some(mut transfer) = self.vram_transfer.take() else {
            return;
        };

        for pixel in [value as u16, (value >> 16) as u16] {
            if transfer.is_complete() {
                break;
            }
            transfer.pixels.push(pixel);
            transfer.position += 1;
        }

        if !transfer.is_complete() {
            self.vram_transfer = Some(transfer);
            return;
        }

        log::debug!("CPU→VRAM transfer complete");
        let set_mask = self.status.set_mask_while_drawing;
        let check_mask = self.status.check_mask_before_draw;
        if let Err(e) = self.update_vram(
            transfer.x,
            transfer.y,
            transfer.width,
            transfer.height,
            &transfer.pixels,
            set_mask,
            check_mask,
        ) {
            log::error!("VRAM upload failed: {}", e);
        }
    }

    /// GP0(0xC0): VRAM→CPU Transfer
    pub(in crate::core::gpu) fn gp0_vram_to_cpu_transfer(&mut self, words: &[u32]) {
        let (x, y, width, height) = decode_rect(words[1], words[2]);
        log::debug!("VRAM→CPU transfer: ({}, {}) size {}×{}", x, y, width, height);

        if let Err(e) = self.read_vram(x, y, width, height) {
            log::error!("VRAM readback failed: {}", e);
        }

        let snapshot = self.with_vram(|vram| {
            let mut pixels = Vec::with_capacity((width * height) as usize);
            for row in 0..height {
                let vy = ((y + row) % VRAM_HEIGHT) * VRAM_WIDTH;
                for col in 0..width {
                    pixels.push(vram[(vy + (x + col) % VRAM_WIDTH) as usize]);
                }
            }
            pixels
        });
        let pixels = match snapshot {
            Ok(pixels) => pixels,
            Err(e) => {
                log::error!("VRAM readback failed: {}", e);
                vec![0; (width * height) as usize]
            }
        };

        self.vram_transfer = Some(VramTransfer {
            x,
            y,
            width,
            height,
            direction: VramTransferDirection::VramToCpu,
            pixels,
            position: 0,
        });
    }

    /// The CPU↔VRAM transfer in progress, if any
    pub fn vram_transfer(&self) -> Option<&VramTransfer> {
        self.vram_transfer.as_ref()
    }

    /// Read the GPUREAD register
    ///
    /// Returns the next two pixels of a VRAM→CPU transfer, or zero when none
    /// is in progress.
    pub fn read_gpuread(&mut self) -> u32 {
        let Some(transfer) = self.vram_transfer.as_mut() else {
            return 0;
        };
        if transfer.is_cpu_to_vram() {
            return 0;
        }

        let mut value = 0;
        for shift in [0, 16] {
            if transfer.is_complete() {
                break;
            }
            value |= (transfer.pixels[transfer.position] as u32) << shift;
            transfer.position += 1;
        }

        if transfer.is_complete() {
            log::debug!("VRAM→CPU transfer complete");
            self.vram_transfer = None;
        }
        value
    }

    /// GP0(0x80): VRAM→VRAM Transfer
    pub(in crate::core::gpu) fn gp0_vram_to_vram_transfer(&mut self, words: &[u32]) {
        let (src_x, src_y, _, _) = decode_rect(words[1], 0);
        let (dst_x, dst_y, width, height) = decode_rect(words[2], words[3]);

        if src_x == dst_x && src_y == dst_y && !self.status.set_mask_while_drawing {
            return;
        }

        log::debug!(
            "VRAM→VRAM transfer: ({}, {}) → ({}, {}) size {}×{}",
            src_x,
            src_y,
            dst_x,
            dst_y,
            width,
            height
        );

        self.copy_vram(src_x, src_y, dst_x, dst_y, width, height);
    }
}
