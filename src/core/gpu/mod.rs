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

//! Hardware-accelerated GPU renderer
//!
//! This module turns the PlayStation GPU command stream into draw calls on an
//! abstract [`GpuDevice`]. VRAM lives in a device render target at an integer
//! multiple of the native 1024×512 resolution, and every native operation is
//! mapped onto it:
//! - Primitives are decomposed into triangles and batched until a
//!   pipeline-relevant state change forces a flush
//! - Mask-bit semantics are emulated with a synthetic depth buffer
//! - VRAM fills, copies and CPU transfers run as small full-screen passes
//! - A dirty rectangle keeps the sampled copy of VRAM coherent with what
//!   has been drawn
//!
//! # Coordinate System
//!
//! All register state is kept in native VRAM coordinates (0-1023 × 0-511).
//! Scaling to the internal resolution happens only when talking to the device.
//!
//! # References
//!
//! - [PSX-SPX: GPU](http://problemkaputt.de/psx-spx.htm#gpu)
//! - [PSX-SPX: GPU Rendering](http://problemkaputt.de/psx-spx.htm#gpurenderstatecommands)

use std::collections::{HashSet, VecDeque};

mod batch;
mod depth;
mod display;
mod draw_state;
mod framebuffer;
mod gp0;
mod gp1;
mod pipelines;
mod settings;
mod snapshot;
#[cfg(test)]
mod tests;
mod transfer;
mod types;
pub mod uniforms;
mod vram_cache;

pub use batch::BatchConfig;
pub use display::{DisplayState, PresentedFrame};
pub use draw_state::DrawModeState;
pub use framebuffer::Framebuffer;
pub use gp0::{VramTransfer, VramTransferDirection};
pub use pipelines::PipelineCache;
pub use settings::{box_downsample_scale, max_resolution_scale, RendererNotice, ResolvedSettings};
pub use types::*;

use crate::core::config::RendererSettings;
use crate::core::device::{DeviceFeatures, GpuDevice, VertexBufferMapping};
use crate::core::error::Result;
use crate::core::software::SoftwareRenderer;
use serde::Serialize;
use uniforms::BatchUboData;

/// Sub-pixel vertex data recorded by a precision geometry pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreciseVertex {
    pub x: f32,
    pub y: f32,
    pub w: f32,
}

/// Source of sub-pixel vertex positions and perspective weights
///
/// Looked up once per polygon vertex with the raw vertex word and the native
/// position it decoded to. Returning `None` falls back to the native position
/// and disables perspective correction for the primitive.
pub trait PreciseVertexSource: Send {
    fn precise_vertex(
        &self,
        packed_position: u32,
        native_x: i32,
        native_y: i32,
        offset_x: i32,
        offset_y: i32,
    ) -> Option<PreciseVertex>;
}

/// Higher-resolution art substituted for a CPU→VRAM write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementTexture {
    pub width: u32,
    pub height: u32,
    /// Packed RGBA8 texels, row-major
    pub pixels: Vec<u32>,
}

/// Looks up replacement art by the contents of a VRAM write
pub trait ReplacementTextureProvider: Send {
    fn vram_write_replacement(
        &self,
        width: u32,
        height: u32,
        pixels: &[u16],
    ) -> Option<ReplacementTexture>;
}

/// Counters describing how much device work rendering generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RendererStats {
    /// Batch draw calls, counting both passes of two-pass rendering
    pub num_batches: u32,
    pub num_vram_read_texture_updates: u32,
    pub num_uniform_buffer_updates: u32,
}

/// Hardware renderer for the PlayStation GPU
///
/// Owns the device, the VRAM textures and the pipeline cache. Commands are
/// processed synchronously in submission order; the only deferred work is
/// the pending vertex batch, which is flushed whenever ordering demands it.
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
/// // Fill a 16×16 block with red, then read it back through GPUREAD
/// renderer.write_gp0(0x0200_00FF);
/// renderer.write_gp0(0x0000_0000);
/// renderer.write_gp0(0x0010_0010);
/// renderer.write_gp0(0xC000_0000);
/// renderer.write_gp0(0x0000_0000);
/// renderer.write_gp0(0x0001_0002);
/// assert_eq!(renderer.read_gpuread(), 0x001F_001F);
/// ```
pub struct HardwareRenderer<D: GpuDevice> {
    pub(in crate::core::gpu) device: D,

    /// Settings as requested by the user
    pub(in crate::core::gpu) settings: RendererSettings,
    /// Settings as the device can honor them
    pub(in crate::core::gpu) resolved: ResolvedSettings,
    pub(in crate::core::gpu) supports_dual_source_blend: bool,
    pub(in crate::core::gpu) supports_framebuffer_fetch: bool,

    pub(in crate::core::gpu) framebuffer: Framebuffer,
    pub(in crate::core::gpu) pipelines: PipelineCache,

    pub(in crate::core::gpu) batch: BatchConfig,
    pub(in crate::core::gpu) batch_ubo_data: BatchUboData,
    pub(in crate::core::gpu) batch_ubo_dirty: bool,
    /// Vertices written since the buffer was mapped
    pub(in crate::core::gpu) batch_vertices: Vec<BatchVertex>,
    pub(in crate::core::gpu) batch_mapping: Option<VertexBufferMapping>,
    /// Vertices the command being dispatched may emit
    pub(in crate::core::gpu) command_vertex_count: u32,

    /// Synthetic depth counter; later primitives get smaller depth values
    pub(in crate::core::gpu) current_depth: u32,
    /// Average perspective weight of the last depth-buffered polygon
    pub(in crate::core::gpu) last_depth_z: f32,

    /// Region of the render target not yet copied to the read texture
    pub(in crate::core::gpu) vram_dirty_rect: Rect,
    /// Texels sampled since the texture page was found dirty
    pub(in crate::core::gpu) current_uv_range: Rect,
    pub(in crate::core::gpu) compute_uv_range: bool,
    pub(in crate::core::gpu) texpage_dirty: bool,

    pub(in crate::core::gpu) draw_mode: DrawModeState,
    pub(in crate::core::gpu) drawing_area: DrawingArea,
    pub(in crate::core::gpu) drawing_offset: (i32, i32),
    pub(in crate::core::gpu) drawing_area_changed: bool,
    pub(in crate::core::gpu) status: GpuStatus,
    pub(in crate::core::gpu) display: DisplayState,
    pub(in crate::core::gpu) presented: Option<PresentedFrame>,

    /// CPU-visible VRAM, authoritative only after a readback
    pub(in crate::core::gpu) vram_shadow: Vec<u16>,
    pub(in crate::core::gpu) sw_renderer: Option<SoftwareRenderer>,
    pub(in crate::core::gpu) precise_vertices: Option<Box<dyn PreciseVertexSource>>,
    pub(in crate::core::gpu) replacements: Option<Box<dyn ReplacementTextureProvider>>,

    pub(in crate::core::gpu) stats: RendererStats,
    pub(in crate::core::gpu) pending_ticks: u32,
    pub(in crate::core::gpu) notices: Vec<RendererNotice>,
    pub(in crate::core::gpu) raised_notices: HashSet<RendererNotice>,

    /// GP0 words of a partially received command
    pub(in crate::core::gpu) command_fifo: VecDeque<u32>,
    pub(in crate::core::gpu) vram_transfer: Option<VramTransfer>,
}

impl<D: GpuDevice> HardwareRenderer<D> {
    /// Synthetic depth values available before the depth buffer must be rebuilt
    pub const MAX_BATCH_VERTEX_COUNTER_IDS: u32 = 65535;

    /// Vertices a rectangle can emit after splitting at texture page boundaries
    pub const MAX_VERTICES_FOR_RECTANGLE: u32 = 6
        * (((MAX_PRIMITIVE_WIDTH as u32) / TEXTURE_PAGE_WIDTH) + 1)
        * (((MAX_PRIMITIVE_HEIGHT as u32) / TEXTURE_PAGE_HEIGHT) + 1);

    /// Create a renderer on `device`
    ///
    /// Settings are resolved against the device capabilities first; anything
    /// the device cannot do is downgraded and reported through
    /// [`take_notices`](Self::take_notices). Failure to create the framebuffer
    /// or any pipeline is returned as an error.
    pub fn new(mut device: D, settings: RendererSettings) -> Result<Self> {
        let info = device.info();
        let (resolved, notices) = ResolvedSettings::resolve(&settings, &info);
        let framebuffer = Framebuffer::create(&mut device, &resolved)?;

        let mut renderer = Self {
            device,
            settings,
            resolved,
            supports_dual_source_blend: info.features.contains(DeviceFeatures::DUAL_SOURCE_BLEND),
            supports_framebuffer_fetch: info.features.contains(DeviceFeatures::FRAMEBUFFER_FETCH),
            framebuffer,
            pipelines: PipelineCache::default(),
            batch: BatchConfig::default(),
            batch_ubo_data: BatchUboData::default(),
            batch_ubo_dirty: true,
            batch_vertices: Vec::new(),
            batch_mapping: None,
            command_vertex_count: 0,
            current_depth: 1,
            last_depth_z: 1.0,
            vram_dirty_rect: Rect::invalid(),
            current_uv_range: Rect::invalid(),
            compute_uv_range: resolved.clamp_uvs,
            texpage_dirty: false,
            draw_mode: DrawModeState::default(),
            drawing_area: DrawingArea::default(),
            drawing_offset: (0, 0),
            drawing_area_changed: true,
            status: GpuStatus::default(),
            display: DisplayState::default(),
            presented: None,
            vram_shadow: vec![0; VRAM_SIZE],
            sw_renderer: None,
            precise_vertices: None,
            replacements: None,
            stats: RendererStats::default(),
            pending_ticks: 0,
            notices: Vec::new(),
            raised_notices: HashSet::new(),
            command_fifo: VecDeque::new(),
            vram_transfer: None,
        };

        for notice in notices {
            renderer.raise_notice(notice);
        }
        renderer.update_software_renderer(false)?;
        renderer.print_settings_to_log();
        renderer.compile_pipelines()?;
        renderer.on_buffers_created();
        renderer.reset(true);
        Ok(renderer)
    }

    /// Reset rendering state, optionally clearing VRAM to black
    ///
    /// Any pending batch is discarded without being drawn.
    pub fn reset(&mut self, clear_vram: bool) {
        self.discard_batch();

        if clear_vram {
            self.vram_shadow.fill(0);
        }
        if let Some(sw) = &self.sw_renderer {
            sw.reset(clear_vram);
        }

        self.batch = BatchConfig::default();
        self.batch_ubo_data = BatchUboData::default();
        self.batch_ubo_dirty = true;
        self.current_depth = 1;
        self.reset_registers();

        if clear_vram {
            self.clear_framebuffer();
        }
        self.restore_device_context();
    }

    /// Reset the register state a GP1(00h) clears, leaving VRAM alone
    pub(in crate::core::gpu) fn reset_registers(&mut self) {
        self.draw_mode = DrawModeState::default();
        self.drawing_area = DrawingArea::default();
        self.drawing_offset = (0, 0);
        self.drawing_area_changed = true;
        self.status = GpuStatus::default();
        self.display = DisplayState::default();
        self.command_fifo.clear();
        self.vram_transfer = None;
        self.compute_uv_range = self.resolved.clamp_uvs;
        self.current_uv_range.set_invalid();
        self.texpage_dirty = false;
    }

    /// Rebind everything the batch path assumes is bound
    ///
    /// Called after any pass that changes render targets, samplers or the
    /// viewport.
    pub(in crate::core::gpu) fn restore_device_context(&mut self) {
        let fb = &self.framebuffer;
        self.device
            .set_texture_sampler(0, fb.vram_read, fb.nearest_sampler);
        self.device
            .set_render_targets(Some(fb.vram), Some(fb.vram_depth));
        self.device.set_viewport(0, 0, fb.width, fb.height);
        self.set_scissor();
        self.batch_ubo_dirty = true;
    }

    /// Clip batch draws to the drawing area at the internal resolution
    pub(in crate::core::gpu) fn set_scissor(&mut self) {
        let scale = self.resolved.resolution_scale;
        let area = self.drawing_area;
        let left = area.left.max(0) as u32 * scale;
        let top = area.top.max(0) as u32 * scale;
        let right = ((area.right.max(0) as u32 + 1) * scale).max(left + 1);
        let bottom = ((area.bottom.max(0) as u32 + 1) * scale).max(top + 1);
        self.device
            .set_scissor(left, top, right - left, bottom - top);
    }

    /// Clear VRAM and the depth buffer
    pub(in crate::core::gpu) fn clear_framebuffer(&mut self) {
        let fb = &self.framebuffer;
        self.device.clear_render_target(fb.vram, 0);
        self.device.clear_depth(
            fb.vram_depth,
            if self.resolved.pgxp_depth_buffer {
                1.0
            } else {
                0.0
            },
        );
        if let Some(private) = fb.display_private {
            self.device.clear_render_target(private, 0);
        }
        self.clear_vram_dirty_rectangle();
        self.last_depth_z = 1.0;
    }

    /// Finish setting up freshly created framebuffer textures
    pub(in crate::core::gpu) fn on_buffers_created(&mut self) {
        self.device.set_render_targets(
            Some(self.framebuffer.vram),
            Some(self.framebuffer.vram_depth),
        );
        self.set_full_vram_dirty_rectangle();
    }

    /// Release the framebuffer textures
    ///
    /// The handles left behind are dangling until the next
    /// [`Framebuffer::create`].
    pub(in crate::core::gpu) fn destroy_buffers(&mut self) {
        self.clear_display();
        self.discard_batch();
        self.framebuffer.destroy(&mut self.device);
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn pipelines(&self) -> &PipelineCache {
        &self.pipelines
    }

    pub fn stats(&self) -> RendererStats {
        self.stats
    }

    /// Return the counters and start a new measurement period
    pub fn take_stats(&mut self) -> RendererStats {
        std::mem::take(&mut self.stats)
    }

    /// Drawing time accumulated since the last call, in GPU ticks
    pub fn take_pending_ticks(&mut self) -> u32 {
        std::mem::take(&mut self.pending_ticks)
    }

    pub fn current_depth(&self) -> u32 {
        self.current_depth
    }

    pub fn dirty_rect(&self) -> Rect {
        self.vram_dirty_rect
    }

    pub fn drawing_area(&self) -> DrawingArea {
        self.drawing_area
    }

    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch
    }

    /// Vertices written into the current batch and not yet flushed
    pub fn pending_vertex_count(&self) -> usize {
        self.batch_vertices.len()
    }

    pub fn is_software_renderer_active(&self) -> bool {
        self.sw_renderer.is_some()
    }

    pub fn set_precise_vertex_source(&mut self, source: Option<Box<dyn PreciseVertexSource>>) {
        self.precise_vertices = source;
    }

    pub fn set_replacement_provider(
        &mut self,
        provider: Option<Box<dyn ReplacementTextureProvider>>,
    ) {
        self.replacements = provider;
    }

    /// Run `f` over the authoritative CPU copy of VRAM
    ///
    /// With the software renderer active this waits for it to drain and
    /// reads its VRAM; otherwise the shadow is used as-is, so callers wanting
    /// current hardware contents must read them back first.
    pub(in crate::core::gpu) fn with_vram<R>(&self, f: impl FnOnce(&[u16]) -> R) -> Result<R> {
        match &self.sw_renderer {
            Some(sw) => {
                sw.sync()?;
                Ok(sw.with_vram(f))
            }
            None => Ok(f(&self.vram_shadow)),
        }
    }

    /// Copy of the CPU-visible VRAM without touching the device
    pub(in crate::core::gpu) fn vram_contents_unsynced(&self) -> Vec<u16> {
        match &self.sw_renderer {
            Some(sw) => sw.with_vram(|vram| vram.to_vec()),
            None => self.vram_shadow.clone(),
        }
    }

    /// Current contents of all of VRAM, read back from the device
    pub fn vram_contents(&mut self) -> Result<Vec<u16>> {
        self.flush_render();
        self.read_vram(0, 0, VRAM_WIDTH, VRAM_HEIGHT)?;
        self.with_vram(|vram| vram.to_vec())
    }

    /// GPUSTAT bits tracked by the renderer
    pub fn gpustat(&self) -> u32 {
        let mut value = self.status.draw_mode_bits & DrawModeReg::GPUSTAT_MASK;
        value |= (self.status.set_mask_while_drawing as u32) << 11;
        value |= (self.status.check_mask_before_draw as u32) << 12;
        value |= (self.status.interlaced_field as u32) << 13;
        value |= (self.status.texture_disable as u32) << 15;
        value |= self.display.gpustat_bits();
        value |= (self.status.display_disable as u32) << 23;
        value
    }

    /// Process GP0 command (drawing and VRAM commands)
    ///
    /// Words are buffered until a command is complete, then executed. During
    /// a CPU→VRAM transfer, words are consumed as pixel data instead.
    pub fn write_gp0(&mut self, value: u32) {
        if self.vram_transfer.as_ref().is_some_and(VramTransfer::is_cpu_to_vram) {
            self.process_vram_write(value);
            return;
        }

        self.command_fifo.push_back(value);
        self.try_process_command();
    }

    /// Process GP1 command (control commands)
    pub fn write_gp1(&mut self, value: u32) {
        let command = (value >> 24) & 0xFF;
        log::trace!("GP1 write: 0x{:08X}", value);

        match command {
            0x00 => self.gp1_reset_gpu(),
            0x01 => self.gp1_reset_command_buffer(),
            0x02 => self.gp1_acknowledge_interrupt(),
            0x03 => self.gp1_display_enable(value),
            0x04 => self.gp1_dma_direction(value),
            0x05 => self.gp1_display_area_start(value),
            0x06 => self.gp1_horizontal_display_range(value),
            0x07 => self.gp1_vertical_display_range(value),
            0x08 => self.gp1_display_mode(value),
            _ => {
                log::warn!("Unknown GP1 command: 0x{:02X}", command);
            }
        }
    }
}

impl<D: GpuDevice> Drop for HardwareRenderer<D> {
    fn drop(&mut self) {
        // Teardown releases resources without drawing what is pending.
        self.discard_batch();
        self.pipelines.destroy(&mut self.device);
        self.framebuffer.destroy(&mut self.device);
    }
}
