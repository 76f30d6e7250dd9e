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

//! GP0 rectangle drawing commands
//!
//! GP0(0x60-0x7F) draw axis-aligned rectangles of a fixed (1×1, 8×8,
//! 16×16) or variable size. Textured rectangles use the current texture
//! page and take their palette from the texcoord word.
//!
//! ```text
//! Word 0:  0xCCBBGGRR   command + color
//! Word 1:  YyyyXxxx     top-left vertex
//! (Word:   ClutVvUu     texcoord + palette, textured only)
//! (Word:   HhhhWwww     size, variable size only)
//! ```

use super::super::types::RenderCommand;
use super::super::HardwareRenderer;
use crate::core::device::GpuDevice;

impl<D: GpuDevice> HardwareRenderer<D> {
    /// GP0(0x60-0x7F): Render Rectangle
    pub(in crate::core::gpu) fn gp0_rectangle(&mut self, words: &[u32]) {
        let rc = RenderCommand(words[0]);
        if rc.texture_enable() {
            self.set_texture_palette((words[2] >> 16) as u16);
        }

        log::trace!(
            "Rectangle: {:?} textured={} transparent={}",
            rc.rectangle_size(),
            rc.texture_enable(),
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
        renderer.write_gp0(0xE400_0000 | (511 << 10) | 1023);
        renderer
    }

    #[test]
    fn test_fixed_size_rectangles() {
        let mut renderer = renderer();
        renderer.write_gp0(0x7800_00FF);
        renderer.write_gp0(0x0010_0010);
        assert_eq!(renderer.pending_vertex_count(), 6);
        assert_eq!(renderer.dirty_rect(), Rect::new(16, 16, 32, 32));

        renderer.write_gp0(0x6800_00FF);
        renderer.write_gp0(0x0000_0000);
        assert_eq!(renderer.pending_vertex_count(), 12);
    }

    #[test]
    fn test_variable_rectangle_uses_drawing_offset() {
        let mut renderer = renderer();
        renderer.write_gp0(0xE500_0000 | (8 << 11) | 4);
        renderer.write_gp0(0x6000_00FF);
        renderer.write_gp0(0x0000_0000);
        renderer.write_gp0(0x0020_0040);
        assert_eq!(renderer.dirty_rect(), Rect::new(4, 8, 68, 40));
    }

    #[test]
    fn test_textured_rectangle_sets_palette() {
        let mut renderer = renderer();
        renderer.write_gp0(0x6480_8080);
        renderer.write_gp0(0x0000_0000);
        renderer.write_gp0(0x7FC1_0000);
        renderer.write_gp0(0x0010_0010);
        assert_eq!(renderer.draw_mode.palette_reg.0, 0x7FC1);
    }
}
