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

//! GP0 polygon drawing commands
//!
//! GP0(0x20-0x3F) draw flat or Gouraud shaded triangles and quadrilaterals,
//! optionally textured. Textured polygons carry their own palette (in the
//! first texcoord word) and texture page (in the second), which replace the
//! current draw state before the vertices are batched.
//!
//! ```text
//! Word 0:  0xCCBBGGRR   command + color of vertex 0
//! Word 1:  YyyyXxxx     vertex 0
//! (Word:   ClutVvUu     texcoord 0 + palette, textured only)
//! (Word:   00BBGGRR     color of vertex 1, shaded only)
//! Word:    YyyyXxxx     vertex 1
//! (Word:   PageVvUu     texcoord 1 + texture page, textured only)
//! ...
//! ```

use super::super::types::{DrawModeReg, RenderCommand};
use super::super::HardwareRenderer;
use crate::core::device::GpuDevice;

impl<D: GpuDevice> HardwareRenderer<D> {
    /// GP0(0x20-0x3F): Render Polygon
    pub(in crate::core::gpu) fn gp0_polygon(&mut self, words: &[u32]) {
        let rc = RenderCommand(words[0]);

        if rc.texture_enable() {
            let palette_index = 2;
            let texpage_index = if rc.shading_enable() { 5 } else { 4 };
            self.set_texture_palette((words[palette_index] >> 16) as u16);

            let texpage = (words[texpage_index] >> 16) as u16 & DrawModeReg::POLYGON_TEXPAGE_MASK;
            let mode = self.draw_mode.mode_reg.0 & !DrawModeReg::POLYGON_TEXPAGE_MASK;
            self.set_draw_mode(mode | texpage);
        }

        log::trace!(
            "Polygon: {} vertices textured={} shaded={} transparent={}",
            rc.num_polygon_vertices(),
            rc.texture_enable(),
            rc.shading_enable(),
            rc.transparency_enable()
        );
        self.dispatch_render_command(rc, words);
    }
}

#[cfg(test)]
mod tests {
    use crate::core::config::RendererSettings;
    use crate::core::device::HeadlessDevice;
    use crate::core::gpu::{HardwareRenderer, Rect};

    fn renderer() -> HardwareRenderer<HeadlessDevice> {
        let mut renderer =
            HardwareRenderer::new(HeadlessDevice::default(), RendererSettings::default()).unwrap();
        renderer.write_gp0(0xE300_0000);
        renderer.write_gp0(0xE400_0000 | (511 << 10) | 1023);
        renderer
    }

    #[test]
    fn test_flat_triangle_and_quad_vertex_counts() {
        let mut renderer = renderer();
        renderer.write_gp0(0x2000_00FF);
        renderer.write_gp0(0x0000_0000);
        renderer.write_gp0(0x0000_0040);
        renderer.write_gp0(0x0040_0000);
        assert_eq!(renderer.pending_vertex_count(), 3);

        renderer.write_gp0(0x2800_00FF);
        for word in [0x0000_0000, 0x0000_0040, 0x0040_0000, 0x0040_0040] {
            renderer.write_gp0(word);
        }
        assert_eq!(renderer.pending_vertex_count(), 9);
        assert_eq!(renderer.dirty_rect(), Rect::new(0, 0, 65, 65));
    }

    #[test]
    fn test_textured_polygon_updates_palette_and_page() {
        let mut renderer = renderer();
        // Flat textured triangle, palette at (16, 480), page 3 in 8-bit mode
        let palette = (480 << 6) | 1;
        let texpage = 0x0083;
        renderer.write_gp0(0x2480_8080);
        renderer.write_gp0(0x0000_0000);
        renderer.write_gp0(palette << 16);
        renderer.write_gp0(0x0000_0020);
        renderer.write_gp0((texpage << 16) | 0x0020);
        renderer.write_gp0(0x0020_0000);
        renderer.write_gp0(0x2000);

        assert_eq!(renderer.draw_mode.palette_reg.0 as u32, palette);
        assert_eq!(renderer.draw_mode.mode_reg.0 as u32 & 0x1FF, texpage);
        assert_eq!(renderer.pending_vertex_count(), 3);
    }
}
