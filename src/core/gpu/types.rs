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

//! GPU type definitions
//!
//! Register views, rectangles, primitive vertex formats and the mode
//! enumerations that key the pipeline permutation cache.

use bytemuck::{Pod, Zeroable};

/// VRAM width in 16-bit pixels
pub const VRAM_WIDTH: u32 = 1024;

/// VRAM height in lines
pub const VRAM_HEIGHT: u32 = 512;

/// Total VRAM size in pixels
pub const VRAM_SIZE: usize = (VRAM_WIDTH * VRAM_HEIGHT) as usize;

/// Texture page width in texels (texture coordinates wrap here)
pub const TEXTURE_PAGE_WIDTH: u32 = 256;

/// Texture page height in texels
pub const TEXTURE_PAGE_HEIGHT: u32 = 256;

/// Primitives spanning this many pixels or more horizontally are culled
pub const MAX_PRIMITIVE_WIDTH: i32 = 1024;

/// Primitives spanning this many lines or more vertically are culled
pub const MAX_PRIMITIVE_HEIGHT: i32 = 512;

/// A 24-bit RGB color used in GPU commands
///
/// # Examples
///
/// ```
/// use psrx_hw::core::gpu::Color;
///
/// let color = Color::from_u32(0x00FF8040);
/// assert_eq!(color.r, 0x40);
/// assert_eq!(color.b, 0xFF);
/// assert_eq!(color.to_rgb15(), (31 << 10) | (16 << 5) | 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Create a Color from the low 24 bits of a command word
    pub fn from_u32(value: u32) -> Self {
        Self {
            r: (value & 0xFF) as u8,
            g: ((value >> 8) & 0xFF) as u8,
            b: ((value >> 16) & 0xFF) as u8,
        }
    }

    /// Pack back into the command word layout (bits 0-23)
    pub fn to_u32(self) -> u32 {
        (self.r as u32) | ((self.g as u32) << 8) | ((self.b as u32) << 16)
    }

    /// Convert to the 5-5-5 VRAM format (mask bit clear)
    pub fn to_rgb15(self) -> u16 {
        let r = ((self.r as u16) >> 3) & 0x1F;
        let g = ((self.g as u16) >> 3) & 0x1F;
        let b = ((self.b as u16) >> 3) & 0x1F;
        (b << 10) | (g << 5) | r
    }
}

/// Expand a 5-bit channel to 8 bits with rounding
#[inline]
fn expand5(c: u32) -> u32 {
    ((c * 527) + 23) >> 6
}

/// Convert a VRAM pixel (5-5-5 + mask) to packed RGBA8
///
/// The mask bit becomes a fully opaque or fully transparent alpha.
///
/// ```
/// use psrx_hw::core::gpu::{rgba5551_to_rgba8888, rgba8888_to_rgba5551};
///
/// assert_eq!(rgba5551_to_rgba8888(0x7FFF), 0x00FF_FFFF);
/// assert_eq!(rgba5551_to_rgba8888(0x8000), 0xFF00_0000);
/// assert_eq!(rgba8888_to_rgba5551(rgba5551_to_rgba8888(0x1234)), 0x1234);
/// ```
pub fn rgba5551_to_rgba8888(pixel: u16) -> u32 {
    let p = pixel as u32;
    let r = expand5(p & 0x1F);
    let g = expand5((p >> 5) & 0x1F);
    let b = expand5((p >> 10) & 0x1F);
    let a = if (p & 0x8000) != 0 { 0xFF } else { 0 };
    r | (g << 8) | (b << 16) | (a << 24)
}

/// Convert packed RGBA8 to a VRAM pixel, truncating to 5 bits per channel
pub fn rgba8888_to_rgba5551(color: u32) -> u16 {
    let r = (color & 0xFF) >> 3;
    let g = ((color >> 8) & 0xFF) >> 3;
    let b = ((color >> 16) & 0xFF) >> 3;
    let a = (color >> 31) & 1;
    (r | (g << 5) | (b << 10) | (a << 15)) as u16
}

/// Sign-extend an 11-bit vertex coordinate
#[inline]
pub fn sign_extend_11(value: i32) -> i32 {
    (value << 21) >> 21
}

/// A 2D vertex position from a GP0 vertex word
///
/// Coordinates are signed 11-bit values; the upper bits of each half-word
/// are ignored by the rasterizer.
///
/// ```
/// use psrx_hw::core::gpu::Vertex;
///
/// let v = Vertex::from_u32(0x0064_0032);
/// assert_eq!((v.x, v.y), (50, 100));
///
/// let v = Vertex::from_u32(0x0000_07FF);
/// assert_eq!(v.x, -1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
}

impl Vertex {
    pub fn from_u32(value: u32) -> Self {
        Self {
            x: sign_extend_11((value & 0xFFFF) as i32),
            y: sign_extend_11(((value >> 16) & 0xFFFF) as i32),
        }
    }
}

/// Texture coordinate for textured primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TexCoord {
    pub u: u8,
    pub v: u8,
}

impl TexCoord {
    pub fn from_u32(value: u32) -> Self {
        Self {
            u: (value & 0xFF) as u8,
            v: ((value >> 8) & 0xFF) as u8,
        }
    }

    /// Packed form used by vertices and software commands (`u | v << 8`)
    pub fn packed(self) -> u16 {
        (self.u as u16) | ((self.v as u16) << 8)
    }
}

/// An axis-aligned rectangle with exclusive right/bottom edges
///
/// The invalid rectangle has `left > right`; including any valid
/// rectangle into it yields that rectangle, and it intersects nothing.
///
/// ```
/// use psrx_hw::core::gpu::Rect;
///
/// let mut r = Rect::invalid();
/// assert!(!r.is_valid());
///
/// r.include(&Rect::from_extents(10, 10, 5, 5));
/// r.include(&Rect::from_extents(0, 20, 2, 2));
/// assert_eq!(r, Rect::new(0, 10, 15, 22));
/// assert!(r.intersects(&Rect::from_extents(14, 21, 4, 4)));
/// assert!(!r.intersects(&Rect::from_extents(15, 0, 4, 40)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn invalid() -> Self {
        Self::new(u32::MAX, u32::MAX, 0, 0)
    }

    pub const fn from_extents(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// The whole of VRAM at native resolution
    pub const fn vram() -> Self {
        Self::new(0, 0, VRAM_WIDTH, VRAM_HEIGHT)
    }

    pub fn is_valid(&self) -> bool {
        self.left <= self.right && self.top <= self.bottom
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Grow to cover `other` as well
    pub fn include(&mut self, other: &Rect) {
        self.left = self.left.min(other.left);
        self.top = self.top.min(other.top);
        self.right = self.right.max(other.right);
        self.bottom = self.bottom.max(other.bottom);
    }

    /// Grow to cover a single point range `[left, right] x [top, bottom]`
    pub fn include_bounds(&mut self, left: u32, right: u32, top: u32, bottom: u32) {
        self.left = self.left.min(left);
        self.right = self.right.max(right);
        self.top = self.top.min(top);
        self.bottom = self.bottom.max(bottom);
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && self.right > other.left
            && self.top < other.bottom
            && self.bottom > other.top
    }

    /// Clamp every edge into the given bounds
    pub fn clamped(&self, left: u32, top: u32, right: u32, bottom: u32) -> Rect {
        Rect::new(
            self.left.clamp(left, right),
            self.top.clamp(top, bottom),
            self.right.clamp(left, right),
            self.bottom.clamp(top, bottom),
        )
    }

    pub fn scaled(&self, scale: u32) -> Rect {
        Rect::new(
            self.left * scale,
            self.top * scale,
            self.right * scale,
            self.bottom * scale,
        )
    }

    pub fn set_invalid(&mut self) {
        *self = Rect::invalid();
    }
}

/// Rectangle affected by a VRAM transfer, with wraparound folded in
///
/// A footprint crossing the right edge covers every column and one
/// crossing the bottom edge covers every line.
///
/// ```
/// use psrx_hw::core::gpu::{vram_transfer_bounds, Rect};
///
/// assert_eq!(vram_transfer_bounds(16, 16, 32, 8), Rect::new(16, 16, 48, 24));
/// assert_eq!(vram_transfer_bounds(1000, 0, 64, 8), Rect::new(0, 0, 1024, 8));
/// assert_eq!(vram_transfer_bounds(1040, 500, 8, 64), Rect::new(16, 0, 24, 512));
/// ```
pub fn vram_transfer_bounds(x: u32, y: u32, width: u32, height: u32) -> Rect {
    let mut rect = Rect::from_extents(x % VRAM_WIDTH, y % VRAM_HEIGHT, width, height);
    if rect.right > VRAM_WIDTH {
        rect.left = 0;
        rect.right = VRAM_WIDTH;
    }
    if rect.bottom > VRAM_HEIGHT {
        rect.top = 0;
        rect.bottom = VRAM_HEIGHT;
    }
    rect
}

/// One vertex of a batched primitive, laid out as the vertex shader reads it
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct BatchVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
    pub color: u32,
    pub texpage: u32,
    pub u: u16,
    pub v: u16,
    pub uv_limits: u32,
}

impl BatchVertex {
    /// UV limits that never clamp
    pub const NO_UV_LIMITS: u32 = 0xFFFF_0000;

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        x: f32,
        y: f32,
        z: f32,
        w: f32,
        color: u32,
        texpage: u32,
        texcoord: u16,
        uv_limits: u32,
    ) -> Self {
        Self {
            x,
            y,
            z,
            w,
            color,
            texpage,
            u: texcoord & 0xFF,
            v: texcoord >> 8,
            uv_limits,
        }
    }

    /// Pack UV limits as `min_u | min_v << 8 | max_u << 16 | max_v << 24`
    pub fn pack_uv_limits(min_u: u32, max_u: u32, min_v: u32, max_v: u32) -> u32 {
        min_u | (min_v << 8) | (max_u << 16) | (max_v << 24)
    }

    pub fn set_uv_limits(&mut self, min_u: u32, max_u: u32, min_v: u32, max_v: u32) {
        self.uv_limits = Self::pack_uv_limits(min_u, max_u, min_v, max_v);
    }
}

/// Texture sampling mode, including the raw (unmodulated) variants
///
/// Discriminants index the texture-mode axis of the pipeline cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TextureMode {
    Palette4Bit = 0,
    Palette8Bit = 1,
    Direct16Bit = 2,
    ReservedDirect16Bit = 3,
    RawPalette4Bit = 4,
    RawPalette8Bit = 5,
    RawDirect16Bit = 6,
    ReservedRawDirect16Bit = 7,
    Disabled = 8,
}

impl TextureMode {
    pub const COUNT: usize = 9;

    /// Bit that turns a mode into its raw-texture counterpart
    pub const RAW_TEXTURE_BIT: u8 = 4;

    pub const ALL: [TextureMode; Self::COUNT] = [
        Self::Palette4Bit,
        Self::Palette8Bit,
        Self::Direct16Bit,
        Self::ReservedDirect16Bit,
        Self::RawPalette4Bit,
        Self::RawPalette8Bit,
        Self::RawDirect16Bit,
        Self::ReservedRawDirect16Bit,
        Self::Disabled,
    ];

    pub fn from_index(index: u8) -> Self {
        Self::ALL
            .get(index as usize)
            .copied()
            .unwrap_or(Self::Disabled)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Raw-texture variant of this mode
    pub fn with_raw(self) -> Self {
        match self {
            Self::Disabled => Self::Disabled,
            mode => Self::from_index(mode as u8 | Self::RAW_TEXTURE_BIT),
        }
    }

    pub fn is_paletted(self) -> bool {
        self != Self::Disabled && (self as u8 & 3) < 2
    }
}

/// Semi-transparency blend formula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransparencyMode {
    /// B/2 + F/2
    HalfBackgroundPlusHalfForeground = 0,
    /// B + F
    BackgroundPlusForeground = 1,
    /// B - F
    BackgroundMinusForeground = 2,
    /// B + F/4
    BackgroundPlusQuarterForeground = 3,
    Disabled = 4,
}

impl TransparencyMode {
    pub const COUNT: usize = 5;

    pub const ALL: [TransparencyMode; Self::COUNT] = [
        Self::HalfBackgroundPlusHalfForeground,
        Self::BackgroundPlusForeground,
        Self::BackgroundMinusForeground,
        Self::BackgroundPlusQuarterForeground,
        Self::Disabled,
    ];

    pub fn from_bits(bits: u8) -> Self {
        Self::ALL[(bits & 3) as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Source and destination blend weights of the fixed formulas
    pub fn alpha_factors(self) -> (f32, f32) {
        match self {
            Self::HalfBackgroundPlusHalfForeground => (0.5, 0.5),
            Self::BackgroundPlusForeground => (1.0, 1.0),
            Self::BackgroundMinusForeground => (1.0, 1.0),
            Self::BackgroundPlusQuarterForeground => (0.25, 1.0),
            Self::Disabled => (1.0, 0.0),
        }
    }
}

/// Which pixels of a batch a draw call renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BatchRenderMode {
    TransparencyDisabled = 0,
    TransparentAndOpaque = 1,
    OnlyOpaque = 2,
    OnlyTransparent = 3,
}

impl BatchRenderMode {
    pub const COUNT: usize = 4;

    pub const ALL: [BatchRenderMode; Self::COUNT] = [
        Self::TransparencyDisabled,
        Self::TransparentAndOpaque,
        Self::OnlyOpaque,
        Self::OnlyTransparent,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Depth comparison used by a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BatchDepthTest {
    Always = 0,
    GreaterEqual = 1,
    LessEqual = 2,
}

impl BatchDepthTest {
    pub const COUNT: usize = 3;

    pub const ALL: [BatchDepthTest; Self::COUNT] =
        [Self::Always, Self::GreaterEqual, Self::LessEqual];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// How interlaced display fields are combined for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InterlacedRenderMode {
    None = 0,
    InterleavedFields = 1,
    SeparateFields = 2,
}

impl InterlacedRenderMode {
    pub const COUNT: usize = 3;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Primitive class encoded in bits 29-31 of a render command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Reserved,
    Polygon,
    Line,
    Rectangle,
}

/// Size encoding of a rectangle command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectangleSize {
    Variable,
    R1x1,
    R8x8,
    R16x16,
}

/// View of the first word of a GP0 draw command
///
/// ```text
///   Bit 0-23:  Color of the first vertex
///   Bit 24:    Raw texture (no color modulation)
///   Bit 25:    Semi-transparency
///   Bit 26:    Textured
///   Bit 27:    Quad / polyline
///   Bit 27-28: Rectangle size
///   Bit 28:    Gouraud shading
///   Bit 29-31: Primitive (1=polygon, 2=line, 3=rectangle)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderCommand(pub u32);

impl RenderCommand {
    pub fn color_for_first_vertex(self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    pub fn raw_texture_enable(self) -> bool {
        (self.0 >> 24) & 1 != 0
    }

    pub fn transparency_enable(self) -> bool {
        (self.0 >> 25) & 1 != 0
    }

    pub fn texture_enable(self) -> bool {
        (self.0 >> 26) & 1 != 0
    }

    pub fn quad_polygon(self) -> bool {
        (self.0 >> 27) & 1 != 0
    }

    pub fn polyline(self) -> bool {
        (self.0 >> 27) & 1 != 0
    }

    pub fn shading_enable(self) -> bool {
        (self.0 >> 28) & 1 != 0
    }

    pub fn rectangle_size(self) -> RectangleSize {
        match (self.0 >> 27) & 3 {
            0 => RectangleSize::Variable,
            1 => RectangleSize::R1x1,
            2 => RectangleSize::R8x8,
            _ => RectangleSize::R16x16,
        }
    }

    pub fn primitive(self) -> Primitive {
        match self.0 >> 29 {
            1 => Primitive::Polygon,
            2 => Primitive::Line,
            3 => Primitive::Rectangle,
            _ => Primitive::Reserved,
        }
    }

    /// Whether the primitive is textured at all (lines never are)
    pub fn is_textured(self) -> bool {
        self.primitive() != Primitive::Line && self.texture_enable()
    }

    /// Whether GPUSTAT dithering applies to this primitive
    pub fn is_dithering_enabled(self) -> bool {
        match self.primitive() {
            Primitive::Polygon => {
                self.shading_enable() || (self.texture_enable() && !self.raw_texture_enable())
            }
            Primitive::Line => true,
            _ => false,
        }
    }

    pub fn num_polygon_vertices(self) -> usize {
        if self.quad_polygon() {
            4
        } else {
            3
        }
    }
}

/// GP0(E1h) draw mode register
///
/// ```text
///   Bit 0-3:   Texture page X base (N*64)
///   Bit 4:     Texture page Y base (N*256)
///   Bit 5-6:   Semi-transparency
///   Bit 7-8:   Texture page colors (0=4bit, 1=8bit, 2/3=15bit)
///   Bit 9:     Dithering
///   Bit 10:    Drawing to display area allowed
///   Bit 11:    Texture disable
///   Bit 12-13: Textured rectangle X/Y flip
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawModeReg(pub u16);

impl DrawModeReg {
    pub const MASK: u16 = 0x1FFF;
    /// Bits that select the sampled texture page
    pub const TEXTURE_PAGE_MASK: u16 = 0x019F;
    /// Bits a polygon's texpage attribute overrides
    pub const POLYGON_TEXPAGE_MASK: u16 = 0x09FF;
    /// Bits mirrored into GPUSTAT
    pub const GPUSTAT_MASK: u32 = 0x07FF;

    pub fn texture_page_x_base(self) -> u32 {
        (self.0 & 0xF) as u32
    }

    pub fn texture_page_y_base(self) -> u32 {
        ((self.0 >> 4) & 1) as u32
    }

    pub fn transparency_mode(self) -> TransparencyMode {
        TransparencyMode::from_bits(((self.0 >> 5) & 3) as u8)
    }

    pub fn texture_mode(self) -> TextureMode {
        TextureMode::from_index(((self.0 >> 7) & 3) as u8)
    }

    pub fn dither_enable(self) -> bool {
        (self.0 >> 9) & 1 != 0
    }

    pub fn draw_to_displayed_field(self) -> bool {
        (self.0 >> 10) & 1 != 0
    }

    pub fn texture_disable(self) -> bool {
        (self.0 >> 11) & 1 != 0
    }

    pub fn texture_x_flip(self) -> bool {
        (self.0 >> 12) & 1 != 0
    }

    pub fn texture_y_flip(self) -> bool {
        (self.0 >> 13) & 1 != 0
    }
}

/// Texture palette (CLUT) register: bits 0-5 X/16, bits 6-14 Y
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaletteReg(pub u16);

impl PaletteReg {
    pub const MASK: u16 = 0x7FFF;

    pub fn x_base(self) -> u32 {
        ((self.0 & 0x3F) as u32) * 16
    }

    pub fn y_base(self) -> u32 {
        ((self.0 >> 6) & 0x1FF) as u32
    }
}

/// Texture window expressed as AND/OR masks on texel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureWindow {
    pub and_x: u8,
    pub and_y: u8,
    pub or_x: u8,
    pub or_y: u8,
}

impl Default for TextureWindow {
    fn default() -> Self {
        Self {
            and_x: 0xFF,
            and_y: 0xFF,
            or_x: 0,
            or_y: 0,
        }
    }
}

impl TextureWindow {
    /// Decode a GP0(E2h) parameter
    ///
    /// ```text
    ///   Bit 0-4:   Mask X   (in 8 pixel steps)
    ///   Bit 5-9:   Mask Y
    ///   Bit 10-14: Offset X
    ///   Bit 15-19: Offset Y
    /// ```
    pub fn from_u32(value: u32) -> Self {
        let mask_x = value & 0x1F;
        let mask_y = (value >> 5) & 0x1F;
        let offset_x = (value >> 10) & 0x1F;
        let offset_y = (value >> 15) & 0x1F;
        Self {
            and_x: (!(mask_x * 8) & 0xFF) as u8,
            and_y: (!(mask_y * 8) & 0xFF) as u8,
            or_x: ((offset_x & mask_x) * 8) as u8,
            or_y: ((offset_y & mask_y) * 8) as u8,
        }
    }
}

/// Drawing area clip rectangle, inclusive on every edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawingArea {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Default for DrawingArea {
    fn default() -> Self {
        Self {
            left: 0,
            top: 0,
            right: 0,
            bottom: 0,
        }
    }
}

impl DrawingArea {
    /// An area with an edge crossed over draws nothing
    pub fn is_valid(&self) -> bool {
        self.left <= self.right && self.top <= self.bottom
    }
}

/// Display mode settings from GP1(08h)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMode {
    pub horizontal_res: HorizontalRes,
    pub vertical_res: VerticalRes,
    pub video_mode: VideoMode,
    pub color_depth: ColorDepth,
    pub interlaced: bool,
}

impl Default for DisplayMode {
    fn default() -> Self {
        Self {
            horizontal_res: HorizontalRes::R320,
            vertical_res: VerticalRes::R240,
            video_mode: VideoMode::NTSC,
            color_depth: ColorDepth::C15Bit,
            interlaced: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalRes {
    R256,
    R320,
    R512,
    R640,
    R368,
    R384,
}

impl HorizontalRes {
    pub fn width(self) -> u32 {
        match self {
            Self::R256 => 256,
            Self::R320 => 320,
            Self::R512 => 512,
            Self::R640 => 640,
            Self::R368 => 368,
            Self::R384 => 384,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalRes {
    R240,
    R480,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMode {
    NTSC,
    PAL,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDepth {
    C15Bit,
    C24Bit,
}

/// The GPUSTAT bits this renderer depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpuStatus {
    /// Draw mode bits 0-10 mirrored from GP0(E1h)
    pub draw_mode_bits: u32,
    pub set_mask_while_drawing: bool,
    pub check_mask_before_draw: bool,
    pub interlaced_field: bool,
    pub texture_disable: bool,
    pub display_disable: bool,
}

impl GpuStatus {
    pub fn dither_enable(&self) -> bool {
        (self.draw_mode_bits >> 9) & 1 != 0
    }

    pub fn draw_to_displayed_field(&self) -> bool {
        (self.draw_mode_bits >> 10) & 1 != 0
    }

    pub fn is_masking_enabled(&self) -> bool {
        self.set_mask_while_drawing || self.check_mask_before_draw
    }
}
