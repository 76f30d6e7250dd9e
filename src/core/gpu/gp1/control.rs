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

//! GP1 control commands
//!
//! Reset, command buffer, interrupt and DMA control.

use super::super::HardwareRenderer;
use crate::core::device::GpuDevice;

impl<D: GpuDevice> HardwareRenderer<D> {
    /// GP1(0x00): Reset GPU
    ///
    /// Resets the register state and disables the display. VRAM contents
    /// are preserved; anything already batched is drawn first.
    pub(in crate::core::gpu) fn gp1_reset_gpu(&mut self) {
        self.flush_render();
        self.reset_registers();
        self.status.display_disable = true;

        log::debug!("GPU reset");
    }

    /// GP1(0x01): Reset Command Buffer
    ///
    /// Drops partially received GP0 commands and cancels any transfer.
    pub(in crate::core::gpu) fn gp1_reset_command_buffer(&mut self) {
        self.command_fifo.clear();
        self.vram_transfer = None;

        log::debug!("Command buffer reset");
    }

    /// GP1(0x02): Acknowledge GPU Interrupt
    pub(in crate::core::gpu) fn gp1_acknowledge_interrupt(&mut self) {
        log::debug!("GPU interrupt acknowledged");
    }

    /// GP1(0x04): DMA Direction
    ///
    /// Bits 0-1: Direction (0=Off, 1=FIFO, 2=CPU→GP0, 3=GPUREAD→CPU).
    /// Transfers are driven by register writes here, so this is only logged.
    pub(in crate::core::gpu) fn gp1_dma_direction(&mut self, value: u32) {
        match value & 3 {
            0 => log::debug!("DMA off"),
            1 => log::debug!("DMA FIFO"),
            2 => log::debug!("DMA CPU→GP0"),
            _ => log::debug!("DMA GPUREAD→CPU"),
        }
    }
}
