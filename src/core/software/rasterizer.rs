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

//! Native-resolution rasterizer
//!
//! Draws into the 1024×512 array of 15-bit pixels the way the console does:
//! integer vertex positions, 5-bit blending, the 4×4 ordered dither and the
//! mask bit rules.
//!
//! # Algorithm
//!
//! Triangles are walked over their bounding box clipped to the drawing area.
//! Each pixel is tested against the three edge functions; pixels on a right
//! or bottom edge are left to the neighbouring primitive, so the two halves
//! of a quad never touch the same pixel. Colors and texture coordinates are
//! interpolated from the same edge weights.
//!
//! Lines step one pixel along their major axis and include both end points.

use super::commands::{DrawParams, SoftwareVertex};
use crate::core::gpu::{
    rgba8888_to_rgba5551, DrawingArea, TextureMode, TransparencyMode, VRAM_HEIGHT, VRAM_WIDTH,
};

/// Primitives at least this wide or tall are dropped by the hardware
const MAX_PRIMITIVE_WIDTH: i32 = 1024;
const MAX_PRIMITIVE_HEIGHT: i32 = 512;

const MASK_BIT: u16 = 0x8000;

const DITHER_TABLE: [[i32; 4]; 4] = [
    [-4, 0, -3, 1],
    [2, -2, 3, -1],
    [-3, 1, -4, 0],
    [3, -1, 2, -2],
];

#[inline(always)]
fn vram_index(x: u32, y: u32) -> usize {
    ((y % VRAM_HEIGHT) * VRAM_WIDTH + (x % VRAM_WIDTH)) as usize
}

/// 8 bits per channel, signed so dithering can step outside the range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rgb {
    r: i32,
    g: i32,
    b: i32,
}

impl Rgb {
    fn from_u32(color: u32) -> Self {
        Self {
            r: (color & 0xFF) as i32,
            g: ((color >> 8) & 0xFF) as i32,
            b: ((color >> 16) & 0xFF) as i32,
        }
    }
}

/// Twice the signed area of (a, b, p)
#[inline(always)]
fn edge(a: &SoftwareVertex, b: &SoftwareVertex, px: i32, py: i32) -> i64 {
    (b.x - a.x) as i64 * (py - a.y) as i64 - (b.y - a.y) as i64 * (px - a.x) as i64
}

/// Whether pixels lying exactly on the edge a→b belong to the triangle
#[inline(always)]
fn is_top_left(a: &SoftwareVertex, b: &SoftwareVertex) -> bool {
    (b.y == a.y && b.x > a.x) || b.y < a.y
}

#[inline(always)]
fn covers(weight: i64, top_left: bool) -> bool {
    weight > 0 || (weight == 0 && top_left)
}

fn blend_channel(mode: TransparencyMode, back: i32, front: i32) -> i32 {
    match mode {
        TransparencyMode::HalfBackgroundPlusHalfForeground => (back + front) >> 1,
        TransparencyMode::BackgroundPlusForeground => (back + front).min(31),
        TransparencyMode::BackgroundMinusForeground => (back - front).max(0),
        TransparencyMode::BackgroundPlusQuarterForeground => (back + (front >> 2)).min(31),
        TransparencyMode::Disabled => front,
    }
}

/// Per-primitive pixel pipeline
struct Shader<'a> {
    params: &'a DrawParams,
    textured: bool,
    raw_texture: bool,
    transparent: bool,
    dither: bool,
    transparency_mode: TransparencyMode,
    texture_mode: TextureMode,
    page_x: u32,
    page_y: u32,
    clut_x: u32,
    clut_y: u32,
}

impl<'a> Shader<'a> {
    fn new(params: &'a DrawParams, allow_dither: bool) -> Self {
        let rc = params.rc;
        let textured = rc.is_textured();
        Self {
            params,
            textured,
            raw_texture: textured && rc.raw_texture_enable(),
            transparent: rc.transparency_enable(),
            dither: allow_dither && params.dithering && rc.is_dithering_enabled(),
            transparency_mode: params.draw_mode.transparency_mode(),
            texture_mode: params.draw_mode.texture_mode(),
            page_x: params.draw_mode.texture_page_x_base() * 64,
            page_y: params.draw_mode.texture_page_y_base() * 256,
            clut_x: params.palette.x_base(),
            clut_y: params.palette.y_base(),
        }
    }

    fn sample(&self, vram: &[u16], u: u8, v: u8) -> u16 {
        let window = self.params.texture_window;
        let u = ((u & window.and_x) | window.or_x) as u32;
        let v = ((v & window.and_y) | window.or_y) as u32;
        let y = self.page_y + v;

        match self.texture_mode {
            TextureMode::Palette4Bit | TextureMode::RawPalette4Bit => {
                let word = vram[vram_index(self.page_x + u / 4, y)];
                let entry = (word >> ((u & 3) * 4)) & 0xF;
                vram[vram_index(self.clut_x + entry as u32, self.clut_y)]
            }
            TextureMode::Palette8Bit | TextureMode::RawPalette8Bit => {
                let word = vram[vram_index(self.page_x + u / 2, y)];
                let entry = (word >> ((u & 1) * 8)) & 0xFF;
                vram[vram_index(self.clut_x + entry as u32, self.clut_y)]
            }
            _ => vram[vram_index(self.page_x + u, y)],
        }
    }

    /// Shade and write one pixel already known to be inside the drawing area
    fn plot(&self, vram: &mut [u16], x: i32, y: i32, color: Rgb, uv: (u8, u8)) {
        if let Some(field) = self.params.skip_field {
            if (y as u32 & 1) == field {
                return;
            }
        }

        let index = vram_index(x as u32, y as u32);
        let back = vram[index];
        if self.params.check_mask && back & MASK_BIT != 0 {
            return;
        }

        let (mut r, mut g, mut b, mask, blend) = if self.textured {
            let texel = self.sample(vram, uv.0, uv.1);
            if texel == 0 {
                return;
            }
            let tr = (texel & 0x1F) as i32;
            let tg = ((texel >> 5) & 0x1F) as i32;
            let tb = ((texel >> 10) & 0x1F) as i32;
            let mask = texel & MASK_BIT;
            let blend = self.transparent && mask != 0;
            if self.raw_texture {
                (tr << 3, tg << 3, tb << 3, mask, blend)
            } else {
                ((tr * color.r) >> 4, (tg * color.g) >> 4, (tb * color.b) >> 4, mask, blend)
            }
        } else {
            (color.r, color.g, color.b, 0, self.transparent)
        };

        if self.dither {
            let offset = DITHER_TABLE[(y & 3) as usize][(x & 3) as usize];
            r += offset;
            g += offset;
            b += offset;
        }

        r = r.clamp(0, 255) >> 3;
        g = g.clamp(0, 255) >> 3;
        b = b.clamp(0, 255) >> 3;

        if blend {
            let mode = self.transparency_mode;
            r = blend_channel(mode, (back & 0x1F) as i32, r);
            g = blend_channel(mode, ((back >> 5) & 0x1F) as i32, g);
            b = blend_channel(mode, ((back >> 10) & 0x1F) as i32, b);
        }

        let set_mask = if self.params.set_mask { MASK_BIT } else { 0 };
        vram[index] = (r | (g << 5) | (b << 10)) as u16 | mask | set_mask;
    }
}

pub struct Rasterizer {
    drawing_area: DrawingArea,
}

impl Rasterizer {
    pub fn new() -> Self {
        Self {
            drawing_area: DrawingArea::default(),
        }
    }

    pub fn drawing_area(&self) -> DrawingArea {
        self.drawing_area
    }

    pub fn set_drawing_area(&mut self, area: DrawingArea) {
        self.drawing_area = area;
    }

    /// Clip a bounding box to the drawing area and VRAM
    fn clip(&self, left: i32, top: i32, right: i32, bottom: i32) -> Option<(i32, i32, i32, i32)> {
        let area = self.drawing_area;
        let left = left.max(area.left).max(0);
        let top = top.max(area.top).max(0);
        let right = right.min(area.right).min(VRAM_WIDTH as i32 - 1);
        let bottom = bottom.min(area.bottom).min(VRAM_HEIGHT as i32 - 1);
        (left <= right && top <= bottom).then_some((left, top, right, bottom))
    }

    /// Solid fill; ignores the drawing area and mask settings
    #[allow(clippy::too_many_arguments)]
    pub fn fill(
        &self,
        vram: &mut [u16],
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        color: u32,
        skip_field: Option<u32>,
    ) {
        let pixel = rgba8888_to_rgba5551(color & 0x00FF_FFFF);
        for row in 0..height {
            let py = (y + row) % VRAM_HEIGHT;
            if skip_field == Some(py & 1) {
                continue;
            }
            for col in 0..width {
                vram[vram_index(x + col, py)] = pixel;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &self,
        vram: &mut [u16],
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u16],
        set_mask: bool,
        check_mask: bool,
    ) {
        if width == 0 {
            return;
        }
        let set_mask = if set_mask { MASK_BIT } else { 0 };
        for (i, &pixel) in data.iter().take((width * height) as usize).enumerate() {
            let i = i as u32;
            let index = vram_index(x + i % width, y + i / width);
            if check_mask && vram[index] & MASK_BIT != 0 {
                continue;
            }
            vram[index] = pixel | set_mask;
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn copy(
        &self,
        vram: &mut [u16],
        src_x: u32,
        src_y: u32,
        dst_x: u32,
        dst_y: u32,
        width: u32,
        height: u32,
        set_mask: bool,
        check_mask: bool,
    ) {
        let set_mask = if set_mask { MASK_BIT } else { 0 };
        let mut line = vec![0u16; width as usize];
        for row in 0..height {
            for (col, pixel) in (0..width).zip(line.iter_mut()) {
                *pixel = vram[vram_index(src_x + col, src_y + row)];
            }
            for (col, &pixel) in (0..width).zip(line.iter()) {
                let index = vram_index(dst_x + col, dst_y + row);
                if check_mask && vram[index] & MASK_BIT != 0 {
                    continue;
                }
                vram[index] = pixel | set_mask;
            }
        }
    }

    /// Draw a triangle or a quad; quads are split into (0,1,2) and (1,2,3)
    pub fn draw_polygon(&self, vram: &mut [u16], params: &DrawParams, vertices: &[SoftwareVertex]) {
        let shader = Shader::new(params, true);
        match vertices {
            [a, b, c] => self.draw_triangle(vram, &shader, [*a, *b, *c]),
            [a, b, c, d] => {
                self.draw_triangle(vram, &shader, [*a, *b, *c]);
                self.draw_triangle(vram, &shader, [*b, *c, *d]);
            }
            _ => log::warn!("Software polygon with {} vertices ignored", vertices.len()),
        }
    }

    fn draw_triangle(&self, vram: &mut [u16], shader: &Shader, vertices: [SoftwareVertex; 3]) {
        let [a, mut b, mut c] = vertices;
        let mut area = edge(&a, &b, c.x, c.y);
        if area == 0 {
            return;
        }
        if area < 0 {
            std::mem::swap(&mut b, &mut c);
            area = -area;
        }

        let min_x = a.x.min(b.x).min(c.x);
        let max_x = a.x.max(b.x).max(c.x);
        let min_y = a.y.min(b.y).min(c.y);
        let max_y = a.y.max(b.y).max(c.y);
        if max_x - min_x >= MAX_PRIMITIVE_WIDTH || max_y - min_y >= MAX_PRIMITIVE_HEIGHT {
            log::trace!("Software rasterizer culled oversized triangle");
            return;
        }
        let Some((left, top, right, bottom)) = self.clip(min_x, min_y, max_x, max_y) else {
            return;
        };

        let shaded = shader.params.rc.shading_enable();
        let (ca, cb, cc) = (Rgb::from_u32(a.color), Rgb::from_u32(b.color), Rgb::from_u32(c.color));
        let top_left = [is_top_left(&b, &c), is_top_left(&c, &a), is_top_left(&a, &b)];
        let lerp = |w: [i64; 3], va: i32, vb: i32, vc: i32| -> i32 {
            ((w[0] * va as i64 + w[1] * vb as i64 + w[2] * vc as i64) / area) as i32
        };

        for y in top..=bottom {
            for x in left..=right {
                let w = [edge(&b, &c, x, y), edge(&c, &a, x, y), edge(&a, &b, x, y)];
                if !(covers(w[0], top_left[0]) && covers(w[1], top_left[1]) && covers(w[2], top_left[2])) {
                    continue;
                }

                let color = if shaded {
                    Rgb {
                        r: lerp(w, ca.r, cb.r, cc.r),
                        g: lerp(w, ca.g, cb.g, cc.g),
                        b: lerp(w, ca.b, cb.b, cc.b),
                    }
                } else {
                    ca
                };
                let uv = if shader.textured {
                    (
                        lerp(w, a.u() as i32, b.u() as i32, c.u() as i32).clamp(0, 255) as u8,
                        lerp(w, a.v() as i32, b.v() as i32, c.v() as i32).clamp(0, 255) as u8,
                    )
                } else {
                    (0, 0)
                };
                shader.plot(vram, x, y, color, uv);
            }
        }
    }

    /// Draw a sprite; texture coordinates advance one texel per pixel
    #[allow(clippy::too_many_arguments)]
    pub fn draw_rectangle(
        &self,
        vram: &mut [u16],
        params: &DrawParams,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        color: u32,
        texcoord: u16,
    ) {
        if width == 0 || height == 0 {
            return;
        }
        let Some((left, top, right, bottom)) =
            self.clip(x, y, x + width as i32 - 1, y + height as i32 - 1)
        else {
            return;
        };

        let shader = Shader::new(params, false);
        let color = Rgb::from_u32(color);
        let (u0, v0) = (texcoord as u8, (texcoord >> 8) as u8);
        let flip_x = params.draw_mode.texture_x_flip();
        let flip_y = params.draw_mode.texture_y_flip();

        for py in top..=bottom {
            let dy = (py - y) as u8;
            let v = if flip_y { v0.wrapping_sub(dy) } else { v0.wrapping_add(dy) };
            for px in left..=right {
                let dx = (px - x) as u8;
                let u = if flip_x { u0.wrapping_sub(dx) } else { u0.wrapping_add(dx) };
                shader.plot(vram, px, py, color, (u, v));
            }
        }
    }

    /// Draw a line or polyline through `vertices`
    pub fn draw_line(&self, vram: &mut [u16], params: &DrawParams, vertices: &[SoftwareVertex]) {
        let shader = Shader::new(params, true);
        for segment in vertices.windows(2) {
            self.draw_segment(vram, &shader, segment[0], segment[1]);
        }
    }

    fn draw_segment(&self, vram: &mut [u16], shader: &Shader, start: SoftwareVertex, end: SoftwareVertex) {
        let dx = end.x - start.x;
        let dy = end.y - start.y;
        if dx.abs() >= MAX_PRIMITIVE_WIDTH || dy.abs() >= MAX_PRIMITIVE_HEIGHT {
            log::trace!("Software rasterizer culled oversized line");
            return;
        }
        let Some((left, top, right, bottom)) = self.clip(
            start.x.min(end.x),
            start.y.min(end.y),
            start.x.max(end.x),
            start.y.max(end.y),
        ) else {
            return;
        };

        let shaded = shader.params.rc.shading_enable();
        let (c0, c1) = (Rgb::from_u32(start.color), Rgb::from_u32(end.color));
        let steps = dx.abs().max(dy.abs());
        let step = |from: i32, delta: i32, i: i32| -> i32 {
            if steps == 0 {
                from
            } else {
                from + ((delta as f64 * i as f64) / steps as f64).round() as i32
            }
        };

        for i in 0..=steps {
            let x = step(start.x, dx, i);
            let y = step(start.y, dy, i);
            if x < left || x > right || y < top || y > bottom {
                continue;
            }
            let color = if shaded {
                Rgb {
                    r: step(c0.r, c1.r - c0.r, i),
                    g: step(c0.g, c1.g - c0.g, i),
                    b: step(c0.b, c1.b - c0.b, i),
                }
            } else {
                c0
            };
            shader.plot(vram, x, y, color, (0, 0));
        }
    }
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new()
    }
}
