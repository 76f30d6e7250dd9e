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

//! GP0 line drawing commands
//!
//! GP0(0x40-0x5F) draw single lines and polylines, flat or Gouraud shaded.
//! Polylines arrive here without their terminator word.

use super::super::types::RenderCommand;
use super::super::HardwareRenderer;
use crate::core::device::GpuDevice;

impl<D: GpuDevice> HardwareRenderer<D> {
    /// GP0(0x40-0x5F): Render Line / Polyline
    pub(in crate::core::gpu) fn gp0_line(&mut self, words: &[u32]) {
        let rc = RenderCommand(words[0]);
        log::trace!(
            "Line: polyline={} shaded={} ({} words)",
            rc.polyline(),
            rc.shading_enable(),
            words.len()
        );
        self.dispatch_render_command(rc, words);
    }
}

#[cfg(test)]
mod tests {
    use crate::core::config::RendererSettings;
    use crate::core::device::HeadlessDevice;
    use crate::core::gpu::HardwareRenderer;

    fn renderer() -> HardwareRenderer<HeadlessDevice> {
        let mut renderer =
            HardwareRenderer::new(HeadlessDevice::default(), RendererSettings::default()).unwrap();
        renderer.write_gp0(0xE400_0000 | (511 << 10) | 1023);
        renderer
    }

    #[test]
    fn test_single_line_is_one_quad() {
        let mut renderer = renderer();
        renderer.write_gp0(0x4000_FFFF);
        renderer.write_gp0(0x0010_0010);
        renderer.write_gp0(0x0020_0080);
        assert_eq!(renderer.pending_vertex_count(), 6);
    }

    #[test]
    fn test_polyline_waits_for_terminator() {
        let mut renderer = renderer();
        renderer.write_gp0(0x4800_FFFF);
        renderer.write_gp0(0x0000_0000);
        renderer.write_gp0(0x0000_0040);
        renderer.write_gp0(0x0040_0040);
        assert_eq!(renderer.pending_vertex_count(), 0);

        renderer.write_gp0(0x5555_5555);
        assert_eq!(renderer.pending_vertex_count(), 12);
    }

    #[test]
    fn test_shaded_polyline() {
        let mut renderer = renderer();
        renderer.write_gp0(0x5800_00FF);
        renderer.write_gp0(0x0000_0000);
        renderer.write_gp0(0x0000_FF00);
        renderer.write_gp0(0x0000_0040);
        renderer.write_gp0(0x00FF_0000);
        renderer.write_gp0(0x0040_0040);
        renderer.write_gp0(0x5000_5000);
        assert_eq!(renderer.pending_vertex_count(), 12);
    }
}
