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

//! Vertex batch assembly
//!
//! Draw commands are decomposed into triangles and appended to a mapped
//! region of the device vertex buffer. The batch stays open until a
//! pipeline-relevant state change, a transfer, or a display update flushes
//! it as one draw call (two for two-pass transparency).
//!
//! # Decomposition
//!
//! ```text
//!   Polygon    3 or 4 vertices; a quad is triangles (0,1,2) and (2,1,3)
//!   Rectangle  split at texture page boundaries, 6 vertices per piece
//!   Line       every segment becomes a 1-pixel-wide quad (6 vertices)
//! ```
//!
//! Triangles and segments spanning 1024 pixels or more horizontally, or 512
//! or more vertically, are culled like the hardware does.

use super::types::{
    sign_extend_11, BatchDepthTest, BatchRenderMode, BatchVertex, Primitive, RectangleSize,
    RenderCommand, TexCoord, TextureMode, TransparencyMode, Vertex, MAX_PRIMITIVE_HEIGHT,
    MAX_PRIMITIVE_WIDTH, TEXTURE_PAGE_HEIGHT, TEXTURE_PAGE_WIDTH,
};
use super::HardwareRenderer;
use crate::core::config::WireframeMode;
use crate::core::device::GpuDevice;
use crate::core::software::{DrawParams, SoftwareCommand, SoftwareVertex};

const BATCH_VERTEX_SIZE: u32 = std::mem::size_of::<BatchVertex>() as u32;

/// Pipeline-relevant state shared by every vertex of the open batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub texture_mode: TextureMode,
    pub transparency_mode: TransparencyMode,
    pub dithering: bool,
    pub interlacing: bool,
    pub set_mask_while_drawing: bool,
    pub check_mask_before_draw: bool,
    /// Depth holds perspective depth rather than draw order
    pub use_depth_buffer: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            texture_mode: TextureMode::Disabled,
            transparency_mode: TransparencyMode::Disabled,
            dithering: false,
            interlacing: false,
            set_mask_while_drawing: false,
            check_mask_before_draw: false,
            use_depth_buffer: false,
        }
    }
}

impl BatchConfig {
    /// Render mode of a single-pass draw
    pub fn render_mode(&self) -> BatchRenderMode {
        if self.transparency_mode == TransparencyMode::Disabled {
            BatchRenderMode::TransparencyDisabled
        } else {
            BatchRenderMode::TransparentAndOpaque
        }
    }

    pub fn depth_test(&self) -> BatchDepthTest {
        if self.use_depth_buffer {
            BatchDepthTest::LessEqual
        } else if self.check_mask_before_draw {
            BatchDepthTest::GreaterEqual
        } else {
            BatchDepthTest::Always
        }
    }
}

/// Sequential reader over the parameter words of a command
struct CommandWords<'a> {
    words: &'a [u32],
    pos: usize,
}

impl<'a> CommandWords<'a> {
    fn new(words: &'a [u32]) -> Self {
        Self { words, pos: 1 }
    }

    /// Next word; a truncated command reads as zeros
    fn next(&mut self) -> u32 {
        let word = self.words.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        word
    }
}

/// Fix up texture coordinates of flipped 2D sprites for upscaled rendering
///
/// The hardware samples each native pixel at its top-left corner. When U
/// or V decreases along exactly one screen axis, nearest sampling at a
/// higher resolution lands one texel off, so the coordinate is bumped by
/// one on every vertex. Quads that look 3D (differing `w`) or have no
/// texture area are left alone.
pub(in crate::core::gpu) fn handle_flipped_quad_texture_coordinates(vertices: &mut [BatchVertex; 4]) {
    let [v0, v1, v2, _] = *vertices;

    let abx = v1.x - v0.x;
    let aby = v1.y - v0.y;
    let bcx = v2.x - v1.x;
    let bcy = v2.y - v1.y;
    let cax = v0.x - v2.x;
    let cay = v0.y - v2.y;

    let (u0, u1, u2) = (v0.u as f32, v1.u as f32, v2.u as f32);
    let (t0, t1, t2) = (v0.v as f32, v1.v as f32, v2.v as f32);

    // Plane derivatives, scaled by the triangle area.
    let dudx = -aby * u2 - bcy * u0 - cay * u1;
    let dvdx = -aby * t2 - bcy * t0 - cay * t1;
    let dudy = abx * u2 + bcx * u0 + cax * u1;
    let dvdy = abx * t2 + bcx * t0 + cax * t1;
    let area = bcx * cay - bcy * cax;

    let tex_area = (v1.u as i32 - v0.u as i32) * (v2.v as i32 - v0.v as i32)
        - (v2.u as i32 - v0.u as i32) * (v1.v as i32 - v0.v as i32);
    let is_3d = v0.w != v1.w || v0.w != v2.w;
    if area == 0.0 || tex_area == 0 || is_3d {
        return;
    }

    let rcp_area = 1.0 / area;
    let dudx = dudx * rcp_area;
    let dudy = dudy * rcp_area;
    let dvdx = dvdx * rcp_area;
    let dvdy = dvdy * rcp_area;

    if (dudx < 0.0 && dudy == 0.0) || (dudy < 0.0 && dudx == 0.0) {
        for v in vertices.iter_mut() {
            v.u += 1;
        }
    }
    if (dvdx < 0.0 && dvdy == 0.0) || (dvdy < 0.0 && dvdx == 0.0) {
        for v in vertices.iter_mut() {
            v.v += 1;
        }
    }
}

/// Bounding box of native positions as `(min_x, max_x, min_y, max_y)`
fn bounds(points: &[(i32, i32)]) -> (i32, i32, i32, i32) {
    points.iter().fold(
        (i32::MAX, i32::MIN, i32::MAX, i32::MIN),
        |(min_x, max_x, min_y, max_y), &(x, y)| {
            (min_x.min(x), max_x.max(x), min_y.min(y), max_y.max(y))
        },
    )
}

/// Vertices in a polyline of `num_words` words, header included
///
/// Flat polylines carry one position word per vertex after the header;
/// shaded ones a color and a position word, the first color living in the
/// header itself.
pub(in crate::core::gpu) fn polyline_vertex_count(rc: RenderCommand, num_words: usize) -> usize {
    if rc.shading_enable() {
        num_words / 2
    } else {
        num_words.saturating_sub(1)
    }
}

fn exceeds_primitive_limits(min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> bool {
    (max_x - min_x) >= MAX_PRIMITIVE_WIDTH || (max_y - min_y) >= MAX_PRIMITIVE_HEIGHT
}

impl<D: GpuDevice> HardwareRenderer<D> {
    fn map_batch_vertex_pointer(&mut self, required_vertices: u32) {
        let mapping = self
            .device
            .map_vertex_buffer(BATCH_VERTEX_SIZE, required_vertices);
        self.batch_mapping = Some(mapping);
        self.batch_vertices.clear();
    }

    /// Vertices that still fit in the mapped region
    fn batch_vertex_space(&self) -> u32 {
        self.batch_mapping
            .map(|mapping| mapping.space.saturating_sub(self.batch_vertices.len() as u32))
            .unwrap_or(0)
    }

    /// Make room for `required_vertices`, flushing if the mapping is full
    pub(in crate::core::gpu) fn ensure_vertex_buffer_space(&mut self, required_vertices: u32) {
        if self.batch_mapping.is_some() {
            if self.batch_vertex_space() >= required_vertices {
                return;
            }
            self.flush_render();
        }
        self.map_batch_vertex_pointer(required_vertices);
    }

    /// Make room for the command being dispatched
    ///
    /// Also restarts the synthetic depth counter when the command could run
    /// it past its last distinct value.
    pub(in crate::core::gpu) fn ensure_vertex_buffer_space_for_current_command(&mut self) {
        let required_vertices = self.command_vertex_count;
        if self.current_depth + required_vertices > Self::MAX_BATCH_VERTEX_COUNTER_IDS {
            self.reset_batch_vertex_depth();
        }
        self.ensure_vertex_buffer_space(required_vertices);
    }

    /// Drop the open batch without drawing it
    pub(in crate::core::gpu) fn discard_batch(&mut self) {
        if self.batch_mapping.take().is_some() {
            self.device.unmap_vertex_buffer(&[], BATCH_VERTEX_SIZE, 0);
        }
        self.batch_vertices.clear();
    }

    /// Submit the open batch
    ///
    /// Does nothing when no vertices were written since the last flush.
    pub fn flush_render(&mut self) {
        let Some(mapping) = self.batch_mapping.take() else {
            return;
        };

        let vertex_count = self.batch_vertices.len() as u32;
        self.device.unmap_vertex_buffer(
            bytemuck::cast_slice(&self.batch_vertices),
            BATCH_VERTEX_SIZE,
            vertex_count,
        );
        self.batch_vertices.clear();
        if vertex_count == 0 {
            return;
        }

        if self.batch_ubo_dirty {
            self.device
                .upload_uniform_buffer(bytemuck::bytes_of(&self.batch_ubo_data));
            self.stats.num_uniform_buffer_updates += 1;
            self.batch_ubo_dirty = false;
        }

        let base_vertex = mapping.base_vertex;
        if self.resolved.wireframe_mode != WireframeMode::OnlyWireframe {
            if self.needs_two_pass_rendering() {
                self.stats.num_batches += 2;
                self.draw_batch_vertices(BatchRenderMode::OnlyOpaque, vertex_count, base_vertex);
                self.draw_batch_vertices(
                    BatchRenderMode::OnlyTransparent,
                    vertex_count,
                    base_vertex,
                );
            } else {
                self.stats.num_batches += 1;
                self.draw_batch_vertices(self.batch.render_mode(), vertex_count, base_vertex);
            }
        }

        if self.resolved.wireframe_mode != WireframeMode::Disabled {
            if let Some(pipeline) = self.pipelines.wireframe {
                self.stats.num_batches += 1;
                self.device.set_pipeline(pipeline);
                self.device.draw(vertex_count, base_vertex);
            }
        }
    }

    fn draw_batch_vertices(&mut self, render_mode: BatchRenderMode, count: u32, base_vertex: u32) {
        let batch = self.batch;
        match self.pipelines.batch(
            batch.depth_test(),
            render_mode,
            batch.texture_mode,
            batch.transparency_mode,
            batch.dithering,
            batch.interlacing,
        ) {
            Some(pipeline) => {
                self.device.set_pipeline(pipeline);
                self.device.draw(count, base_vertex);
            }
            None => log::error!(
                "No pipeline for {:?}/{:?}/{:?}/{:?}",
                batch.depth_test(),
                render_mode,
                batch.texture_mode,
                batch.transparency_mode
            ),
        }
    }

    fn is_drawing_area_valid(&self) -> bool {
        self.drawing_area.is_valid()
    }

    /// Clamp an inclusive native bounding box into the drawing area
    ///
    /// The returned right and bottom edges are exclusive.
    fn clip_to_drawing_area(&self, min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> (u32, u32, u32, u32) {
        let area = self.drawing_area;
        (
            min_x.clamp(area.left, area.right) as u32,
            max_x.clamp(area.left, area.right) as u32 + 1,
            min_y.clamp(area.top, area.bottom) as u32,
            max_y.clamp(area.top, area.bottom) as u32 + 1,
        )
    }

    /// Record drawn area in the dirty rectangle and the tick counter
    fn include_drawn_area(&mut self, clip: (u32, u32, u32, u32)) {
        let (left, right, top, bottom) = clip;
        self.vram_dirty_rect.include_bounds(left, right, top, bottom);
    }

    fn draw_cost(&self, pixels: u32, textured: bool, transparent: bool) -> u32 {
        let mut ticks = pixels;
        if textured {
            ticks *= 2;
        }
        if transparent || self.status.check_mask_before_draw {
            ticks += (ticks + 1) / 2;
        }
        if self.is_interlaced_rendering_enabled() {
            ticks /= 2;
        }
        ticks
    }

    fn add_draw_triangle_ticks(&mut self, points: [(i32, i32); 3], textured: bool, transparent: bool) {
        let [(x0, y0), (x1, y1), (x2, y2)] = points;
        let area = ((x1 - x0) * (y2 - y0) - (x2 - x0) * (y1 - y0)).unsigned_abs() / 2;
        self.pending_ticks += self.draw_cost(area, textured, transparent);
    }

    fn add_draw_rectangle_ticks(&mut self, width: u32, height: u32, textured: bool, transparent: bool) {
        self.pending_ticks += self.draw_cost(width * height, textured, transparent);
    }

    fn add_draw_line_ticks(&mut self, width: u32, height: u32) {
        self.pending_ticks += self.draw_cost(width.max(height), false, false);
    }

    /// Parameters the software renderer needs to draw like the device does
    fn software_draw_params(&self, rc: RenderCommand) -> DrawParams {
        DrawParams {
            rc,
            draw_mode: self.draw_mode.mode_reg,
            palette: self.draw_mode.palette_reg,
            texture_window: self.draw_mode.texture_window,
            dithering: self.batch.dithering,
            set_mask: self.status.set_mask_while_drawing,
            check_mask: self.status.check_mask_before_draw,
            skip_field: self
                .is_interlaced_rendering_enabled()
                .then_some(self.status.interlaced_field as u32),
        }
    }

    fn push_software_command(&self, command: impl FnOnce() -> SoftwareCommand) {
        if let Some(sw) = &self.sw_renderer {
            sw.push(command());
        }
    }

    /// Decode the words of `rc` into batch vertices
    pub(in crate::core::gpu) fn load_vertices(&mut self, rc: RenderCommand, words: &[u32]) {
        if self.status.check_mask_before_draw {
            self.current_depth += 1;
        }

        let texpage = self.draw_mode.vertex_texpage();
        let depth = self.current_normalized_vertex_depth();

        match rc.primitive() {
            Primitive::Polygon => self.load_polygon(rc, words, texpage, depth),
            Primitive::Rectangle => self.load_rectangle(rc, words, texpage, depth),
            Primitive::Line => self.load_line(rc, words, depth),
            Primitive::Reserved => {}
        }
    }

    fn load_polygon(&mut self, rc: RenderCommand, words: &[u32], texpage: u32, depth: f32) {
        let num_vertices = rc.num_polygon_vertices();
        let shaded = rc.shading_enable();
        let textured = rc.texture_enable();
        let pgxp = self.resolved.pgxp_enable && self.precise_vertices.is_some();
        let (offset_x, offset_y) = self.drawing_offset;

        let mut reader = CommandWords::new(words);
        let mut vertices = [BatchVertex::default(); 4];
        let mut positions = [(0i32, 0i32); 4];
        let mut texcoords = [0u16; 4];
        let mut valid_w = self.resolved.pgxp_texture_correction;

        for i in 0..num_vertices {
            let color = if shaded && i > 0 {
                reader.next() & 0x00FF_FFFF
            } else {
                rc.color_for_first_vertex()
            };
            let position_word = reader.next();
            let vp = Vertex::from_u32(position_word);
            let texcoord = if textured {
                TexCoord::from_u32(reader.next()).packed()
            } else {
                0
            };

            let native_x = offset_x + vp.x;
            let native_y = offset_y + vp.y;
            positions[i] = (native_x, native_y);
            texcoords[i] = texcoord;
            vertices[i] = BatchVertex::new(
                native_x as f32,
                native_y as f32,
                depth,
                1.0,
                color,
                texpage,
                texcoord,
                BatchVertex::NO_UV_LIMITS,
            );

            if pgxp {
                let precise = self.precise_vertices.as_ref().and_then(|source| {
                    source.precise_vertex(position_word, native_x, native_y, offset_x, offset_y)
                });
                match precise {
                    Some(p) => {
                        vertices[i].x = p.x;
                        vertices[i].y = p.y;
                        vertices[i].w = p.w;
                    }
                    None => valid_w = false,
                }
            }
        }

        if pgxp {
            if !valid_w {
                self.set_batch_depth_buffer(false);
                for v in vertices.iter_mut() {
                    v.w = 1.0;
                }
            } else if self.resolved.pgxp_depth_buffer {
                let use_depth = self.batch.transparency_mode == TransparencyMode::Disabled;
                self.set_batch_depth_buffer(use_depth);
                if use_depth {
                    let ws: Vec<f32> = vertices[..num_vertices].iter().map(|v| v.w).collect();
                    self.check_for_depth_clear(&ws);
                }
            }
        }

        if rc.quad_polygon() && self.resolved.resolution_scale > 1 {
            handle_flipped_quad_texture_coordinates(&mut vertices);
        }

        if self.compute_uv_range && textured {
            self.compute_polygon_uv_limits(texpage, &mut vertices[..num_vertices]);
        }

        if !self.is_drawing_area_valid() {
            return;
        }

        let transparent = rc.transparency_enable();
        for (index, tri) in [[0usize, 1, 2], [2, 1, 3]].into_iter().enumerate() {
            if index == 1 && !rc.quad_polygon() {
                break;
            }

            let points = tri.map(|i| positions[i]);
            let (min_x, max_x, min_y, max_y) = bounds(&points);
            if exceeds_primitive_limits(min_x, max_x, min_y, max_y) {
                log::debug!(
                    "Culling too-large polygon: {},{} {},{} {},{}",
                    points[0].0,
                    points[0].1,
                    points[1].0,
                    points[1].1,
                    points[2].0,
                    points[2].1
                );
                continue;
            }

            let clip = self.clip_to_drawing_area(min_x, max_x, min_y, max_y);
            self.include_drawn_area(clip);
            self.add_draw_triangle_ticks(points, textured, transparent);
            self.batch_vertices
                .extend(tri.iter().map(|&i| vertices[i]));
        }

        self.push_software_command(|| SoftwareCommand::DrawPolygon {
            params: self.software_draw_params(rc),
            vertices: (0..num_vertices)
                .map(|i| SoftwareVertex {
                    x: positions[i].0,
                    y: positions[i].1,
                    color: vertices[i].color,
                    texcoord: texcoords[i],
                })
                .collect(),
        });
    }

    /// Tag polygon vertices with the texel range they may sample
    fn compute_polygon_uv_limits(&mut self, texpage: u32, vertices: &mut [BatchVertex]) {
        let (mut min_u, mut max_u) = (u32::MAX, 0);
        let (mut min_v, mut max_v) = (u32::MAX, 0);
        for v in vertices.iter() {
            min_u = min_u.min(v.u as u32);
            max_u = max_u.max(v.u as u32);
            min_v = min_v.min(v.v as u32);
            max_v = max_v.max(v.v as u32);
        }

        // The far edge is exclusive when the range is not a single texel.
        if min_u != max_u {
            max_u -= 1;
        }
        if min_v != max_v {
            max_v -= 1;
        }

        self.check_for_texpage_overlap(texpage, min_u, min_v, max_u, max_v);

        for v in vertices.iter_mut() {
            v.set_uv_limits(min_u, max_u, min_v, max_v);
        }
    }

    fn load_rectangle(&mut self, rc: RenderCommand, words: &[u32], texpage: u32, depth: f32) {
        let mut reader = CommandWords::new(words);
        let color = rc.color_for_first_vertex();
        let vp = Vertex::from_u32(reader.next());
        let pos_x = sign_extend_11(self.drawing_offset.0 + vp.x);
        let pos_y = sign_extend_11(self.drawing_offset.1 + vp.y);

        let textured = rc.texture_enable();
        let texcoord = if textured {
            TexCoord::from_u32(reader.next())
        } else {
            TexCoord::default()
        };

        let (width, height) = match rc.rectangle_size() {
            RectangleSize::R1x1 => (1, 1),
            RectangleSize::R8x8 => (8, 8),
            RectangleSize::R16x16 => (16, 16),
            RectangleSize::Variable => {
                let size = reader.next();
                let width = (size & 0x3FF) as i32;
                let height = ((size >> 16) & 0x1FF) as i32;
                if width >= MAX_PRIMITIVE_WIDTH || height >= MAX_PRIMITIVE_HEIGHT {
                    log::debug!("Culling too-large rectangle: {},{} {}x{}", pos_x, pos_y, width, height);
                    return;
                }
                (width, height)
            }
        };

        if width == 0 || height == 0 || !self.is_drawing_area_valid() {
            return;
        }

        self.set_batch_depth_buffer(false);

        // Texture coordinates wrap every page, so split at page boundaries.
        let mut tex_top = texcoord.v as u32;
        let mut y_offset = 0;
        while y_offset < height {
            let quad_height = (height - y_offset).min((TEXTURE_PAGE_HEIGHT - tex_top) as i32);
            let start_y = (pos_y + y_offset) as f32;
            let end_y = start_y + quad_height as f32;
            let tex_bottom = tex_top + quad_height as u32;

            let mut tex_left = texcoord.u as u32;
            let mut x_offset = 0;
            while x_offset < width {
                let quad_width = (width - x_offset).min((TEXTURE_PAGE_WIDTH - tex_left) as i32);
                let start_x = (pos_x + x_offset) as f32;
                let end_x = start_x + quad_width as f32;
                let tex_right = tex_left + quad_width as u32;
                let uv_limits =
                    BatchVertex::pack_uv_limits(tex_left, tex_right - 1, tex_top, tex_bottom - 1);

                if textured {
                    self.check_for_texpage_overlap(texpage, tex_left, tex_top, tex_right - 1, tex_bottom - 1);
                }

                let corner = |x: f32, y: f32, u: u32, v: u32| BatchVertex {
                    u: u as u16,
                    v: v as u16,
                    ..BatchVertex::new(x, y, depth, 1.0, color, texpage, 0, uv_limits)
                };
                self.batch_vertices.extend([
                    corner(start_x, start_y, tex_left, tex_top),
                    corner(end_x, start_y, tex_right, tex_top),
                    corner(start_x, end_y, tex_left, tex_bottom),
                    corner(start_x, end_y, tex_left, tex_bottom),
                    corner(end_x, start_y, tex_right, tex_top),
                    corner(end_x, end_y, tex_right, tex_bottom),
                ]);

                x_offset += quad_width;
                tex_left = 0;
            }

            y_offset += quad_height;
            tex_top = 0;
        }

        let clip = self.clip_to_drawing_area(pos_x, pos_x + width - 1, pos_y, pos_y + height - 1);
        self.include_drawn_area(clip);
        let (left, right, top, bottom) = clip;
        self.add_draw_rectangle_ticks(right - left, bottom - top, textured, rc.transparency_enable());

        self.push_software_command(|| SoftwareCommand::DrawRectangle {
            params: self.software_draw_params(rc),
            x: pos_x,
            y: pos_y,
            width: width as u32,
            height: height as u32,
            color,
            texcoord: texcoord.packed(),
        });
    }

    fn load_line(&mut self, rc: RenderCommand, words: &[u32], depth: f32) {
        self.set_batch_depth_buffer(false);

        let shaded = rc.shading_enable();
        let (offset_x, offset_y) = self.drawing_offset;
        let mut reader = CommandWords::new(words);

        // A plain line is a polyline of two vertices.
        let num_vertices = if rc.polyline() {
            polyline_vertex_count(rc, words.len()).max(2)
        } else {
            2
        };

        let mut points = Vec::with_capacity(num_vertices);
        for i in 0..num_vertices {
            let color = if shaded && i > 0 {
                reader.next() & 0x00FF_FFFF
            } else {
                rc.color_for_first_vertex()
            };
            let vp = Vertex::from_u32(reader.next());
            points.push(SoftwareVertex {
                x: offset_x + vp.x,
                y: offset_y + vp.y,
                color,
                texcoord: 0,
            });
        }

        if !self.is_drawing_area_valid() {
            return;
        }

        for segment in points.windows(2) {
            let (start, end) = (segment[0], segment[1]);
            let (min_x, max_x, min_y, max_y) = bounds(&[(start.x, start.y), (end.x, end.y)]);
            if exceeds_primitive_limits(min_x, max_x, min_y, max_y) {
                log::debug!(
                    "Culling too-large line: {},{} - {},{}",
                    start.x,
                    start.y,
                    end.x,
                    end.y
                );
                continue;
            }

            let clip = self.clip_to_drawing_area(min_x, max_x, min_y, max_y);
            self.include_drawn_area(clip);
            let (left, right, top, bottom) = clip;
            self.add_draw_line_ticks(right - left, bottom - top);

            self.draw_line(
                (start.x as f32, start.y as f32, start.color),
                (end.x as f32, end.y as f32, end.color),
                depth,
            );
        }

        self.push_software_command(|| SoftwareCommand::DrawLine {
            params: self.software_draw_params(rc),
            vertices: points,
        });
    }

    /// Expand a segment into a quad one native pixel thick
    ///
    /// The quad is extruded perpendicular to the major axis and padded by a
    /// pixel at the end the line travels towards.
    fn draw_line(&mut self, start: (f32, f32, u32), end: (f32, f32, u32), depth: f32) {
        let (x0, y0, col0) = start;
        let (x1, y1, col1) = end;
        let vertex = |x: f32, y: f32, color: u32| BatchVertex::new(x, y, depth, 1.0, color, 0, 0, 0);

        let dx = x1 - x0;
        let dy = y1 - y0;
        let output = if dx == 0.0 && dy == 0.0 {
            // Degenerate, a single pixel
            [
                vertex(x0, y0, col0),
                vertex(x0 + 1.0, y0, col0),
                vertex(x1, y1 + 1.0, col0),
                vertex(x1 + 1.0, y1 + 1.0, col0),
            ]
        } else {
            let abs_dx = dx.abs();
            let abs_dy = dy.abs();
            let (mut pad_x0, mut pad_y0, mut pad_x1, mut pad_y1) = (0.0, 0.0, 0.0, 0.0);

            let (fill_dx, fill_dy) = if abs_dx > abs_dy {
                let dydk = dy / abs_dx;
                if dx > 0.0 {
                    pad_x1 = 1.0;
                    pad_y1 = dydk;
                } else {
                    pad_x0 = 1.0;
                    pad_y0 = -dydk;
                }
                (0.0, 1.0)
            } else {
                let dxdk = dx / abs_dy;
                if dy > 0.0 {
                    pad_y1 = 1.0;
                    pad_x1 = dxdk;
                } else {
                    pad_y0 = 1.0;
                    pad_x0 = -dxdk;
                }
                (1.0, 0.0)
            };

            let (ox0, oy0) = (x0 + pad_x0, y0 + pad_y0);
            let (ox1, oy1) = (x1 + pad_x1, y1 + pad_y1);
            [
                vertex(ox0, oy0, col0),
                vertex(ox0 + fill_dx, oy0 + fill_dy, col0),
                vertex(ox1, oy1, col1),
                vertex(ox1 + fill_dx, oy1 + fill_dy, col1),
            ]
        };

        self.batch_vertices.extend([
            output[0], output[1], output[2], output[3], output[2], output[1],
        ]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured_vertex(x: f32, y: f32, u: u16, v: u16) -> BatchVertex {
        BatchVertex::new(x, y, 0.5, 1.0, 0x808080, 0, u | (v << 8), BatchVertex::NO_UV_LIMITS)
    }

    #[test]
    fn test_flipped_quad_u_is_bumped() {
        let mut quad = [
            textured_vertex(0.0, 0.0, 32, 0),
            textured_vertex(32.0, 0.0, 0, 0),
            textured_vertex(0.0, 32.0, 32, 32),
            textured_vertex(32.0, 32.0, 0, 32),
        ];
        handle_flipped_quad_texture_coordinates(&mut quad);
        assert_eq!(quad.map(|v| v.u), [33, 1, 33, 1]);
        assert_eq!(quad.map(|v| v.v), [0, 0, 32, 32]);
    }

    #[test]
    fn test_flipped_quad_v_is_bumped() {
        let mut quad = [
            textured_vertex(0.0, 0.0, 0, 32),
            textured_vertex(32.0, 0.0, 32, 32),
            textured_vertex(0.0, 32.0, 0, 0),
            textured_vertex(32.0, 32.0, 32, 0),
        ];
        handle_flipped_quad_texture_coordinates(&mut quad);
        assert_eq!(quad.map(|v| v.u), [0, 32, 0, 32]);
        assert_eq!(quad.map(|v| v.v), [33, 33, 1, 1]);
    }

    #[test]
    fn test_unflipped_and_3d_quads_untouched() {
        let upright = [
            textured_vertex(0.0, 0.0, 0, 0),
            textured_vertex(32.0, 0.0, 32, 0),
            textured_vertex(0.0, 32.0, 0, 32),
            textured_vertex(32.0, 32.0, 32, 32),
        ];
        let mut quad = upright;
        handle_flipped_quad_texture_coordinates(&mut quad);
        assert_eq!(quad, upright);

        let mut flipped_3d = [
            textured_vertex(0.0, 0.0, 32, 0),
            textured_vertex(32.0, 0.0, 0, 0),
            textured_vertex(0.0, 32.0, 32, 32),
            textured_vertex(32.0, 32.0, 0, 32),
        ];
        flipped_3d[1].w = 0.5;
        let before = flipped_3d;
        handle_flipped_quad_texture_coordinates(&mut flipped_3d);
        assert_eq!(flipped_3d, before);
    }

    #[test]
    fn test_batch_config_depth_test() {
        let mut config = BatchConfig::default();
        assert_eq!(config.depth_test(), BatchDepthTest::Always);
        config.check_mask_before_draw = true;
        assert_eq!(config.depth_test(), BatchDepthTest::GreaterEqual);
        config.use_depth_buffer = true;
        assert_eq!(config.depth_test(), BatchDepthTest::LessEqual);
    }

    #[test]
    fn test_render_mode_follows_transparency() {
        let mut config = BatchConfig::default();
        assert_eq!(config.render_mode(), BatchRenderMode::TransparencyDisabled);
        config.transparency_mode = TransparencyMode::BackgroundPlusForeground;
        assert_eq!(config.render_mode(), BatchRenderMode::TransparentAndOpaque);
    }
}
