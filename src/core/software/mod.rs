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

//! Software fallback renderer
//!
//! Keeps an exact native-resolution copy of VRAM by replaying every draw and
//! transfer the hardware path executes. The replay runs on a worker thread fed
//! through an unbounded channel, so the hardware path never waits on it except
//! at an explicit [`SoftwareRenderer::sync`].
//!
//! While this renderer is active its VRAM, not the hardware renderer's shadow,
//! answers CPU reads.

mod commands;
mod rasterizer;

pub use commands::{DrawParams, SoftwareCommand, SoftwareVertex};
pub use rasterizer::Rasterizer;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::core::error::{RendererError, Result};
use crate::core::gpu::{DrawingArea, VRAM_SIZE};

fn lock_vram(vram: &Mutex<Vec<u16>>) -> MutexGuard<'_, Vec<u16>> {
    // A panic on the worker leaves VRAM in whatever state the last command
    // produced, which is still the best copy available.
    vram.lock().unwrap_or_else(PoisonError::into_inner)
}

fn worker_stopped() -> RendererError {
    RendererError::SoftwareRenderer("worker thread has stopped".to_string())
}

/// Handle to the software renderer worker
pub struct SoftwareRenderer {
    sender: Option<Sender<SoftwareCommand>>,
    worker: Option<JoinHandle<()>>,
    vram: Arc<Mutex<Vec<u16>>>,
}

impl SoftwareRenderer {
    /// Spawn the worker with zeroed VRAM
    pub fn new() -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let vram = Arc::new(Mutex::new(vec![0u16; VRAM_SIZE]));

        let worker_vram = Arc::clone(&vram);
        let worker = thread::Builder::new()
            .name("psx-sw-renderer".to_string())
            .spawn(move || Worker::new(receiver, worker_vram).run())
            .map_err(|e| RendererError::SoftwareRenderer(format!("failed to spawn worker: {}", e)))?;

        log::info!("Software renderer started");
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            vram,
        })
    }

    fn send(&self, command: SoftwareCommand) -> Result<()> {
        self.sender
            .as_ref()
            .ok_or_else(worker_stopped)?
            .send(command)
            .map_err(|_| worker_stopped())
    }

    /// Queue a command without waiting for it
    pub fn push(&self, command: SoftwareCommand) {
        if self.send(command).is_err() {
            log::error!("Software renderer worker has stopped, command dropped");
        }
    }

    /// Block until every queued command has executed
    pub fn sync(&self) -> Result<()> {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.send(SoftwareCommand::Sync(ack_tx))?;
        ack_rx.recv().map_err(|_| worker_stopped())
    }

    /// Run `f` on the worker's VRAM
    ///
    /// Call [`sync`](Self::sync) first to see the effect of queued commands.
    pub fn with_vram<R>(&self, f: impl FnOnce(&[u16]) -> R) -> R {
        let vram = lock_vram(&self.vram);
        f(&vram)
    }

    /// Replace VRAM after the queued commands have executed
    pub fn load_vram(&self, data: &[u16]) -> Result<()> {
        if data.len() != VRAM_SIZE {
            return Err(RendererError::SoftwareRenderer(format!(
                "VRAM image has {} pixels, expected {}",
                data.len(),
                VRAM_SIZE
            )));
        }
        self.send(SoftwareCommand::LoadVram(data.to_vec()))
    }

    pub fn set_drawing_area(&self, area: DrawingArea) -> Result<()> {
        self.send(SoftwareCommand::SetDrawingArea(area))
    }

    pub fn reset(&self, clear_vram: bool) {
        self.push(SoftwareCommand::Reset { clear_vram });
    }
}

impl Drop for SoftwareRenderer {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the queue drains.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Software renderer worker panicked");
            }
        }
        log::info!("Software renderer stopped");
    }
}

/// Worker thread state
struct Worker {
    receiver: Receiver<SoftwareCommand>,
    vram: Arc<Mutex<Vec<u16>>>,
    rasterizer: Rasterizer,
}

impl Worker {
    fn new(receiver: Receiver<SoftwareCommand>, vram: Arc<Mutex<Vec<u16>>>) -> Self {
        Self {
            receiver,
            vram,
            rasterizer: Rasterizer::new(),
        }
    }

    fn run(mut self) {
        while let Ok(command) = self.receiver.recv() {
            self.execute(command);
        }
    }

    fn execute(&mut self, command: SoftwareCommand) {
        use SoftwareCommand::*;

        match command {
            Sync(ack) => {
                // The sender may have given up waiting.
                let _ = ack.send(());
            }
            SetDrawingArea(area) => self.rasterizer.set_drawing_area(area),
            Reset { clear_vram } => {
                self.rasterizer.set_drawing_area(DrawingArea::default());
                if clear_vram {
                    lock_vram(&self.vram).fill(0);
                }
            }
            LoadVram(data) => lock_vram(&self.vram).copy_from_slice(&data),
            FillVram {
                x,
                y,
                width,
                height,
                color,
                skip_field,
            } => {
                let mut vram = lock_vram(&self.vram);
                self.rasterizer
                    .fill(&mut vram, x, y, width, height, color, skip_field);
            }
            UpdateVram {
                x,
                y,
                width,
                height,
                data,
                set_mask,
                check_mask,
            } => {
                let mut vram = lock_vram(&self.vram);
                self.rasterizer
                    .update(&mut vram, x, y, width, height, &data, set_mask, check_mask);
            }
            CopyVram {
                src_x,
                src_y,
                dst_x,
                dst_y,
                width,
                height,
                set_mask,
                check_mask,
            } => {
                let mut vram = lock_vram(&self.vram);
                self.rasterizer.copy(
                    &mut vram, src_x, src_y, dst_x, dst_y, width, height, set_mask, check_mask,
                );
            }
            DrawPolygon { params, vertices } => {
                let mut vram = lock_vram(&self.vram);
                self.rasterizer.draw_polygon(&mut vram, &params, &vertices);
            }
            DrawRectangle {
                params,
                x,
                y,
                width,
                height,
                color,
                texcoord,
            } => {
                let mut vram = lock_vram(&self.vram);
                self.rasterizer
                    .draw_rectangle(&mut vram, &params, x, y, width, height, color, texcoord);
            }
            DrawLine { params, vertices } => {
                let mut vram = lock_vram(&self.vram);
                self.rasterizer.draw_line(&mut vram, &params, &vertices);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gpu::{DrawModeReg, PaletteReg, RenderCommand, TextureWindow, VRAM_WIDTH};

    fn solid_params() -> DrawParams {
        DrawParams {
            rc: RenderCommand(0x6000_00FF),
            draw_mode: DrawModeReg(0),
            palette: PaletteReg(0),
            texture_window: TextureWindow::default(),
            dithering: false,
            set_mask: false,
            check_mask: false,
            skip_field: None,
        }
    }

    #[test]
    fn test_sync_waits_for_queued_fill() {
        let sw = SoftwareRenderer::new().unwrap();
        sw.push(SoftwareCommand::FillVram {
            x: 0,
            y: 0,
            width: 16,
            height: 1,
            color: 0x00FF_0000,
            skip_field: None,
        });
        sw.sync().unwrap();

        sw.with_vram(|vram| {
            assert_eq!(vram[0], 0x7C00);
            assert_eq!(vram[15], 0x7C00);
            assert_eq!(vram[16], 0);
        });
    }

    #[test]
    fn test_load_vram_rejects_wrong_size() {
        let sw = SoftwareRenderer::new().unwrap();
        assert!(matches!(
            sw.load_vram(&[0u16; 16]),
            Err(RendererError::SoftwareRenderer(_))
        ));
    }

    #[test]
    fn test_drawing_area_follows_commands() {
        let sw = SoftwareRenderer::new().unwrap();
        let rect = || SoftwareCommand::DrawRectangle {
            params: solid_params(),
            x: 0,
            y: 0,
            width: 4,
            height: 4,
            color: 0xFF,
            texcoord: 0,
        };

        // The default drawing area only covers the origin.
        sw.push(rect());
        sw.sync().unwrap();
        sw.with_vram(|vram| {
            assert_eq!(vram[0], 0x001F);
            assert_eq!(vram[1], 0);
        });

        sw.set_drawing_area(DrawingArea {
            left: 0,
            top: 0,
            right: 1023,
            bottom: 511,
        })
        .unwrap();
        sw.push(rect());
        sw.sync().unwrap();
        sw.with_vram(|vram| assert_eq!(vram[3 * VRAM_WIDTH as usize + 3], 0x001F));
    }

    #[test]
    fn test_load_then_reset() {
        let sw = SoftwareRenderer::new().unwrap();
        let mut image = vec![0u16; VRAM_SIZE];
        image[42] = 0x1234;
        sw.load_vram(&image).unwrap();
        sw.sync().unwrap();
        assert_eq!(sw.with_vram(|vram| vram[42]), 0x1234);

        sw.reset(false);
        sw.sync().unwrap();
        assert_eq!(sw.with_vram(|vram| vram[42]), 0x1234);

        sw.reset(true);
        sw.sync().unwrap();
        assert_eq!(sw.with_vram(|vram| vram[42]), 0);
    }
}
