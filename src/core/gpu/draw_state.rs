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

//! Draw-mode state tracking
//!
//! Holds the texture page, palette and texture window registers and decides,
//! for every incoming primitive, whether the pending batch can absorb it or
//! must be flushed first. State is only ever changed after the flush, never
//! retroactively for vertices already in the batch.

use super::types::{
    DrawModeReg, DrawingArea, PaletteReg, Primitive, Rect, RenderCommand, TextureMode,
    TextureWindow, TransparencyMode, TEXTURE_PAGE_HEIGHT, TEXTURE_PAGE_WIDTH,
};
use super::batch::polyline_vertex_count;
use super::HardwareRenderer;
use crate::core::device::GpuDevice;
use crate::core::software::SoftwareCommand;

/// Texture window register value bits
const TEXTURE_WINDOW_MASK: u32 = 0x000F_FFFF;

/// Texture-related drawing registers and their change flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawModeState {
    pub mode_reg: DrawModeReg,
    pub palette_reg: PaletteReg,
    pub texture_window: TextureWindow,
    /// Raw GP0(E2h) parameter the window was decoded from
    pub texture_window_value: u32,
    /// Set when the sampled page or palette moved, or was drawn over
    pub texture_page_changed: bool,
    pub texture_window_changed: bool,
}

impl Default for DrawModeState {
    fn default() -> Self {
        Self {
            mode_reg: DrawModeReg::default(),
            palette_reg: PaletteReg::default(),
            texture_window: TextureWindow::default(),
            texture_window_value: 0,
            texture_page_changed: true,
            texture_window_changed: true,
        }
    }
}

impl DrawModeState {
    /// Texture page origin in VRAM
    pub fn texture_page_offset(&self) -> (u32, u32) {
        (
            self.mode_reg.texture_page_x_base() * 64,
            self.mode_reg.texture_page_y_base() * TEXTURE_PAGE_HEIGHT,
        )
    }

    /// VRAM footprint of the current texture page
    ///
    /// Paletted modes pack several texels into one VRAM pixel, so a 4-bit
    /// page is only 64 pixels wide and an 8-bit page 128.
    ///
    /// ```
    /// use psrx_hw::core::gpu::{DrawModeReg, DrawModeState, Rect};
    ///
    /// let state = DrawModeState {
    ///     mode_reg: DrawModeReg(0x0012),
    ///     ..Default::default()
    /// };
    /// assert_eq!(state.texture_page_rect(), Rect::new(128, 256, 192, 512));
    /// ```
    pub fn texture_page_rect(&self) -> Rect {
        let (x, y) = self.texture_page_offset();
        let width = match self.mode_reg.texture_mode() {
            TextureMode::Palette4Bit => TEXTURE_PAGE_WIDTH / 4,
            TextureMode::Palette8Bit => TEXTURE_PAGE_WIDTH / 2,
            _ => TEXTURE_PAGE_WIDTH,
        };
        Rect::from_extents(x, y, width, TEXTURE_PAGE_HEIGHT)
    }

    /// VRAM footprint of the palette, for paletted modes
    pub fn palette_rect(&self) -> Option<Rect> {
        let width = match self.mode_reg.texture_mode() {
            TextureMode::Palette4Bit => 16,
            TextureMode::Palette8Bit => 256,
            _ => return None,
        };
        Some(Rect::from_extents(
            self.palette_reg.x_base(),
            self.palette_reg.y_base(),
            width,
            1,
        ))
    }

    /// Whether `rect` overlaps anything the current texture mode samples
    pub fn samples_from(&self, rect: &Rect) -> bool {
        self.texture_page_rect().intersects(rect)
            || self.palette_rect().is_some_and(|p| p.intersects(rect))
    }

    /// Packed per-vertex texture page attribute (`mode | palette << 16`)
    pub fn vertex_texpage(&self) -> u32 {
        (self.mode_reg.0 as u32) | ((self.palette_reg.0 as u32) << 16)
    }
}

impl<D: GpuDevice> HardwareRenderer<D> {
    /// Apply a new draw mode register value (GP0(E1h) or a polygon texpage)
    pub(in crate::core::gpu) fn set_draw_mode(&mut self, value: u16) {
        let new_mode = DrawModeReg(value & DrawModeReg::MASK);
        let old_mode = self.draw_mode.mode_reg;
        if new_mode == old_mode {
            return;
        }

        if (new_mode.0 & DrawModeReg::TEXTURE_PAGE_MASK)
            != (old_mode.0 & DrawModeReg::TEXTURE_PAGE_MASK)
        {
            self.draw_mode.texture_page_changed = true;
        }
        if new_mode.draw_to_displayed_field() != old_mode.draw_to_displayed_field() {
            self.flush_render();
        }

        self.draw_mode.mode_reg = new_mode;
        self.status.draw_mode_bits = new_mode.0 as u32 & DrawModeReg::GPUSTAT_MASK;
        self.status.texture_disable = new_mode.texture_disable();
    }

    pub(in crate::core::gpu) fn set_texture_palette(&mut self, value: u16) {
        let value = value & PaletteReg::MASK;
        if self.draw_mode.palette_reg.0 == value {
            return;
        }
        self.draw_mode.palette_reg = PaletteReg(value);
        self.draw_mode.texture_page_changed = true;
    }

    /// GP0(E2h)
    pub(in crate::core::gpu) fn set_texture_window(&mut self, value: u32) {
        let value = value & TEXTURE_WINDOW_MASK;
        if self.draw_mode.texture_window_value == value {
            return;
        }

        self.flush_render();
        self.draw_mode.texture_window = TextureWindow::from_u32(value);
        self.draw_mode.texture_window_value = value;
        self.draw_mode.texture_window_changed = true;
    }

    /// GP0(E3h)/GP0(E4h) share this; edges are clamped to VRAM
    pub(in crate::core::gpu) fn set_drawing_area(&mut self, area: DrawingArea) {
        let area = DrawingArea {
            left: area.left.min(1023),
            top: area.top.min(511),
            right: area.right.min(1023),
            bottom: area.bottom.min(511),
        };
        if self.drawing_area == area {
            return;
        }

        self.flush_render();
        self.drawing_area = area;
        self.drawing_area_changed = true;
        log::trace!(
            "Drawing area: ({}, {}) - ({}, {})",
            area.left,
            area.top,
            area.right,
            area.bottom
        );
    }

    /// GP0(E5h)
    pub(in crate::core::gpu) fn set_drawing_offset(&mut self, x: i32, y: i32) {
        if self.drawing_offset == (x, y) {
            return;
        }
        self.flush_render();
        self.drawing_offset = (x, y);
    }

    /// GP0(E6h)
    pub(in crate::core::gpu) fn set_mask_bits(&mut self, set_mask: bool, check_mask: bool) {
        if self.status.set_mask_while_drawing == set_mask
            && self.status.check_mask_before_draw == check_mask
        {
            return;
        }
        self.flush_render();
        self.status.set_mask_while_drawing = set_mask;
        self.status.check_mask_before_draw = check_mask;
    }

    /// Whether drawing skips the field currently being displayed
    pub(in crate::core::gpu) fn is_interlaced_rendering_enabled(&self) -> bool {
        !self.resolved.disable_interlacing
            && self.display.is_480i()
            && !self.status.draw_to_displayed_field()
    }

    /// Select the displayed field of an interlaced frame
    ///
    /// Called by the display timing owner once per field.
    pub fn set_interlaced_field(&mut self, odd: bool) {
        if self.status.interlaced_field == odd {
            return;
        }
        if self.is_interlaced_rendering_enabled() {
            self.flush_render();
        }
        self.status.interlaced_field = odd;
    }

    /// Bring the batch in line with `rc` and load its vertices
    ///
    /// `words` holds the complete command, header included.
    pub(in crate::core::gpu) fn dispatch_render_command(&mut self, rc: RenderCommand, words: &[u32]) {
        self.command_vertex_count = Self::required_vertices(rc, words.len());

        let texture_mode = if rc.is_textured() {
            if self.draw_mode.texture_page_changed {
                self.draw_mode.texture_page_changed = false;
                self.on_texture_page_changed();
            }

            let mode = self.draw_mode.mode_reg.texture_mode();
            if rc.raw_texture_enable() {
                mode.with_raw()
            } else {
                mode
            }
        } else {
            TextureMode::Disabled
        };

        let transparency_mode = if rc.transparency_enable() {
            self.draw_mode.mode_reg.transparency_mode()
        } else {
            TransparencyMode::Disabled
        };

        let dithering = !self.resolved.true_color
            && rc.is_dithering_enabled()
            && self.status.dither_enable();

        if texture_mode != self.batch.texture_mode
            || transparency_mode != self.batch.transparency_mode
            || dithering != self.batch.dithering
            || (transparency_mode == TransparencyMode::BackgroundMinusForeground
                && !self.supports_framebuffer_fetch)
        {
            self.flush_render();
        }

        self.ensure_vertex_buffer_space_for_current_command();

        if self.batch_vertices.is_empty() {
            self.begin_batch(texture_mode, transparency_mode, dithering);
        }

        self.load_vertices(rc, words);
    }

    /// Refresh per-batch state at the start of a new batch
    fn begin_batch(
        &mut self,
        texture_mode: TextureMode,
        transparency_mode: TransparencyMode,
        dithering: bool,
    ) {
        if transparency_mode != TransparencyMode::Disabled
            && (texture_mode == TextureMode::Disabled
                || !self.needs_shader_blending(transparency_mode))
        {
            let (src, dst) = transparency_mode.alpha_factors();
            if self.batch_ubo_data.src_alpha_factor != src
                || self.batch_ubo_data.dst_alpha_factor != dst
            {
                self.batch_ubo_data.src_alpha_factor = src;
                self.batch_ubo_data.dst_alpha_factor = dst;
                self.batch_ubo_dirty = true;
            }
        }

        let check_mask = self.status.check_mask_before_draw;
        let set_mask = self.status.set_mask_while_drawing;
        if self.batch.check_mask_before_draw != check_mask
            || self.batch.set_mask_while_drawing != set_mask
        {
            self.batch.check_mask_before_draw = check_mask;
            self.batch.set_mask_while_drawing = set_mask;
            self.batch_ubo_data.set_mask_while_drawing = set_mask as u32;
            self.batch_ubo_dirty = true;
        }

        self.batch.interlacing = self.is_interlaced_rendering_enabled();
        if self.batch.interlacing {
            let field = self.status.interlaced_field as u32;
            if self.batch_ubo_data.interlaced_displayed_field != field {
                self.batch_ubo_data.interlaced_displayed_field = field;
                self.batch_ubo_dirty = true;
            }
        }

        self.batch.texture_mode = texture_mode;
        self.batch.transparency_mode = transparency_mode;
        self.batch.dithering = dithering;

        if self.draw_mode.texture_window_changed {
            self.draw_mode.texture_window_changed = false;
            let window = self.draw_mode.texture_window;
            self.batch_ubo_data.texture_window_and = [window.and_x as u32, window.and_y as u32];
            self.batch_ubo_data.texture_window_or = [window.or_x as u32, window.or_y as u32];
            self.batch_ubo_dirty = true;
        }

        if self.drawing_area_changed {
            self.drawing_area_changed = false;
            self.set_scissor();

            if self.resolved.pgxp_depth_buffer && self.last_depth_z < 1.0 {
                self.clear_depth_buffer();
            }

            if let Some(sw) = &self.sw_renderer {
                sw.push(SoftwareCommand::SetDrawingArea(self.drawing_area));
            }
        }
    }

    /// Upper bound on the vertices `rc` can add to the batch
    fn required_vertices(rc: RenderCommand, num_words: usize) -> u32 {
        match rc.primitive() {
            Primitive::Polygon => {
                if rc.quad_polygon() {
                    6
                } else {
                    3
                }
            }
            Primitive::Rectangle => Self::MAX_VERTICES_FOR_RECTANGLE,
            Primitive::Line => {
                if rc.polyline() {
                    let num_vertices = polyline_vertex_count(rc, num_words) as u32;
                    num_vertices.saturating_sub(1).max(1) * 6
                } else {
                    6
                }
            }
            Primitive::Reserved => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_page_rect_by_mode() {
        let mut state = DrawModeState::default();
        assert_eq!(state.texture_page_rect(), Rect::new(0, 0, 64, 256));

        state.mode_reg = DrawModeReg(1 << 7 | 3);
        assert_eq!(state.texture_page_rect(), Rect::new(192, 0, 320, 256));

        state.mode_reg = DrawModeReg(2 << 7 | 0xF);
        assert_eq!(state.texture_page_rect(), Rect::new(960, 0, 1216, 256));
    }

    #[test]
    fn test_palette_rect() {
        let mut state = DrawModeState {
            palette_reg: PaletteReg(2 | (100 << 6)),
            ..Default::default()
        };
        assert_eq!(state.palette_rect(), Some(Rect::new(32, 100, 48, 101)));

        state.mode_reg = DrawModeReg(1 << 7);
        assert_eq!(state.palette_rect(), Some(Rect::new(32, 100, 288, 101)));

        state.mode_reg = DrawModeReg(2 << 7);
        assert_eq!(state.palette_rect(), None);
    }

    #[test]
    fn test_samples_from_palette() {
        let state = DrawModeState {
            palette_reg: PaletteReg(480 << 6),
            ..Default::default()
        };
        assert!(state.samples_from(&Rect::from_extents(0, 480, 4, 1)));
        assert!(!state.samples_from(&Rect::from_extents(512, 300, 4, 4)));
    }

    #[test]
    fn test_vertex_texpage_packing() {
        let state = DrawModeState {
            mode_reg: DrawModeReg(0x0115),
            palette_reg: PaletteReg(0x1234),
            ..Default::default()
        };
        assert_eq!(state.vertex_texpage(), 0x1234_0115);
    }
}
