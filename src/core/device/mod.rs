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

//! Graphics device abstraction
//!
//! The renderer never talks to a graphics API directly. Everything it needs
//! (textures, samplers, compiled pipelines, a streaming vertex buffer,
//! uniform uploads, draws, copies and downloads) goes through [`GpuDevice`].
//! A backend is chosen once at startup and owned by the renderer.
//!
//! [`HeadlessDevice`] is the in-tree backend. It keeps texel storage for
//! every texture and executes the VRAM transfer passes on the CPU, which
//! makes it usable both for tests and for the headless command replayer.

mod headless;

pub use headless::{DeviceCommand, HeadlessDevice};

use crate::core::config::TextureFilter;
use crate::core::error::DeviceError;
use crate::core::gpu::{BatchRenderMode, InterlacedRenderMode, TextureMode, TransparencyMode};
use bitflags::bitflags;

bitflags! {
    /// Optional device capabilities that change how the renderer works
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceFeatures: u32 {
        /// Second blend source for per-pixel blend weights
        const DUAL_SOURCE_BLEND          = 1 << 0;
        /// Fragment shaders can read the destination pixel
        const FRAMEBUFFER_FETCH          = 1 << 1;
        const PER_SAMPLE_SHADING         = 1 << 2;
        const NOPERSPECTIVE_INTERPOLATION = 1 << 3;
        const GEOMETRY_SHADERS           = 1 << 4;
        /// Multisampled textures can be resolved one region at a time
        const PARTIAL_MSAA_RESOLVE       = 1 << 5;
        /// A texture can be both source and destination of a copy
        const TEXTURE_COPY_TO_SELF       = 1 << 6;
    }
}

/// Capabilities reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub features: DeviceFeatures,
    pub max_texture_size: u32,
    pub max_multisamples: u32,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            features: DeviceFeatures::DUAL_SOURCE_BLEND
                | DeviceFeatures::PER_SAMPLE_SHADING
                | DeviceFeatures::NOPERSPECTIVE_INTERPOLATION
                | DeviceFeatures::GEOMETRY_SHADERS
                | DeviceFeatures::PARTIAL_MSAA_RESOLVE
                | DeviceFeatures::TEXTURE_COPY_TO_SELF,
            max_texture_size: 16384,
            max_multisamples: 8,
        }
    }
}

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            pub const fn id(self) -> u32 {
                self.0
            }
        }
    };
}

handle_type!(
    /// Opaque reference to a device texture
    TextureHandle
);
handle_type!(
    /// Opaque reference to a device sampler
    SamplerHandle
);
handle_type!(
    /// Opaque reference to a compiled pipeline
    PipelineHandle
);
handle_type!(
    /// Opaque reference to a texel buffer
    TextureBufferHandle
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
    R8,
    R16UI,
    D16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Sampled only
    Texture,
    RenderTarget,
    DepthStencil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub levels: u32,
    pub samples: u32,
    pub kind: TextureKind,
    pub format: TextureFormat,
}

impl TextureDesc {
    pub fn render_target(width: u32, height: u32, samples: u32) -> Self {
        Self {
            width,
            height,
            levels: 1,
            samples,
            kind: TextureKind::RenderTarget,
            format: TextureFormat::Rgba8,
        }
    }

    pub fn depth_stencil(width: u32, height: u32, samples: u32) -> Self {
        Self {
            width,
            height,
            levels: 1,
            samples,
            kind: TextureKind::DepthStencil,
            format: TextureFormat::D16,
        }
    }

    pub fn with_levels(mut self, levels: u32) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }
}

/// A texel position inside one mip level of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRegion {
    pub texture: TextureHandle,
    pub x: u32,
    pub y: u32,
    pub level: u32,
}

impl TextureRegion {
    pub fn new(texture: TextureHandle, x: u32, y: u32) -> Self {
        Self {
            texture,
            x,
            y,
            level: 0,
        }
    }

    pub fn at_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    ClampToEdge,
    ClampToBorder,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mip_filter: Filter,
    pub address_mode: AddressMode,
    pub min_lod: f32,
    pub max_lod: f32,
}

impl SamplerConfig {
    pub fn nearest() -> Self {
        Self {
            min_filter: Filter::Nearest,
            mag_filter: Filter::Nearest,
            mip_filter: Filter::Nearest,
            address_mode: AddressMode::ClampToEdge,
            min_lod: 0.0,
            max_lod: 0.0,
        }
    }

    pub fn linear() -> Self {
        Self {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            ..Self::nearest()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureBufferFormat {
    R16UI,
}

/// Region of the streaming vertex buffer handed out by `map_vertex_buffer`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferMapping {
    /// Index of the first vertex in the buffer
    pub base_vertex: u32,
    /// Vertices that fit before the buffer must wrap
    pub space: u32,
}

/// Shader selected for one pipeline stage
///
/// Only the selection key matters to the renderer; a backend owns the
/// shader source and generates it from the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKey {
    BatchVertex {
        textured: bool,
        uv_limits: bool,
    },
    BatchFragment(BatchShaderKey),
    WireframeGeometry,
    WireframeFragment,
    ScreenQuadVertex,
    VramFill {
        wrapped: bool,
        interlaced: bool,
        resolution_scale: u32,
    },
    VramCopy,
    VramWrite {
        resolution_scale: u32,
    },
    VramUpdateDepth,
    VramReadback {
        resolution_scale: u32,
    },
    Display {
        depth_24bit: bool,
        interlace: InterlacedRenderMode,
        chroma_smoothing: bool,
    },
    Copy,
    AdaptiveDownsampleVertex,
    AdaptiveDownsampleMip {
        first_pass: bool,
    },
    AdaptiveDownsampleBlur,
    AdaptiveDownsampleComposite,
    BoxDownsample {
        factor: u32,
    },
}

/// Everything that changes the generated batch fragment shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchShaderKey {
    pub render_mode: BatchRenderMode,
    pub texture_mode: TextureMode,
    pub transparency: TransparencyMode,
    pub dithering: bool,
    pub interlacing: bool,
    pub texture_filter: TextureFilter,
    pub resolution_scale: u32,
    pub multisamples: u32,
    pub per_sample_shading: bool,
    pub true_color: bool,
    pub scaled_dithering: bool,
    pub uv_limits: bool,
    pub write_mask_as_depth: bool,
    pub debanding: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineLayout {
    SingleTextureAndUbo,
    SingleTextureAndPushConstants,
    SingleTextureBufferAndPushConstants,
    MultiTextureAndPushConstants,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    Triangles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Float,
    UNorm8,
    UInt32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSemantic {
    Position,
    Color,
    TexCoord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub index: u32,
    pub semantic: AttributeSemantic,
    pub semantic_index: u32,
    pub kind: AttributeType,
    pub components: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthFunc {
    Never,
    Always,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
}

impl DepthFunc {
    pub fn passes(self, incoming: f32, stored: f32) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::Less => incoming < stored,
            Self::LessEqual => incoming <= stored,
            Self::Greater => incoming > stored,
            Self::GreaterEqual => incoming >= stored,
            Self::Equal => incoming == stored,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    pub func: DepthFunc,
    pub write: bool,
}

impl DepthState {
    pub fn disabled() -> Self {
        Self {
            func: DepthFunc::Always,
            write: false,
        }
    }

    pub fn always_write() -> Self {
        Self {
            func: DepthFunc::Always,
            write: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFunc {
    Zero,
    One,
    SrcAlpha,
    InvSrcAlpha,
    SrcAlpha1,
    InvSrcAlpha1,
    ConstantColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub enable: bool,
    pub src_blend: BlendFunc,
    pub dst_blend: BlendFunc,
    pub blend_op: BlendOp,
    pub src_alpha_blend: BlendFunc,
    pub dst_alpha_blend: BlendFunc,
    pub alpha_blend_op: BlendOp,
    /// Bit 0 = R, 1 = G, 2 = B, 3 = A
    pub write_mask: u8,
    /// Packed RGBA8 constant for `ConstantColor`
    pub constant: u32,
}

impl BlendState {
    pub fn no_blending() -> Self {
        Self {
            enable: false,
            src_blend: BlendFunc::One,
            dst_blend: BlendFunc::Zero,
            blend_op: BlendOp::Add,
            src_alpha_blend: BlendFunc::One,
            dst_alpha_blend: BlendFunc::Zero,
            alpha_blend_op: BlendOp::Add,
            write_mask: 0xF,
            constant: 0,
        }
    }

    pub fn alpha_blending() -> Self {
        Self {
            enable: true,
            src_blend: BlendFunc::SrcAlpha,
            dst_blend: BlendFunc::InvSrcAlpha,
            ..Self::no_blending()
        }
    }

    pub fn with_write_mask(mut self, write_mask: u8) -> Self {
        self.write_mask = write_mask;
        self
    }
}

/// Declarative description of a graphics pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub layout: PipelineLayout,
    pub topology: PrimitiveTopology,
    pub vertex_attributes: Vec<VertexAttribute>,
    pub vertex_stride: u32,
    pub depth: DepthState,
    pub blend: BlendState,
    pub vertex_shader: ShaderKey,
    pub geometry_shader: Option<ShaderKey>,
    pub fragment_shader: ShaderKey,
    pub color_format: Option<TextureFormat>,
    pub depth_format: Option<TextureFormat>,
    pub samples: u32,
    pub per_sample_shading: bool,
}

impl PipelineConfig {
    /// A full-screen pass with no vertex input, one color target
    pub fn screen_quad(fragment_shader: ShaderKey, layout: PipelineLayout) -> Self {
        Self {
            layout,
            topology: PrimitiveTopology::Triangles,
            vertex_attributes: Vec::new(),
            vertex_stride: 0,
            depth: DepthState::disabled(),
            blend: BlendState::no_blending(),
            vertex_shader: ShaderKey::ScreenQuadVertex,
            geometry_shader: None,
            fragment_shader,
            color_format: Some(TextureFormat::Rgba8),
            depth_format: None,
            samples: 1,
            per_sample_shading: false,
        }
    }
}

/// Abstract graphics device consumed by the hardware renderer
///
/// Draws are non-indexed and always use the pipeline, render targets,
/// viewport, scissor and bindings most recently set.
pub trait GpuDevice: Send {
    fn name(&self) -> &str;

    fn info(&self) -> DeviceInfo;

    fn features(&self) -> DeviceFeatures {
        self.info().features
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle, DeviceError>;
    fn destroy_texture(&mut self, texture: TextureHandle);
    fn texture_desc(&self, texture: TextureHandle) -> Option<TextureDesc>;

    fn create_sampler(&mut self, config: &SamplerConfig) -> Result<SamplerHandle, DeviceError>;
    fn destroy_sampler(&mut self, sampler: SamplerHandle);

    fn create_pipeline(&mut self, config: &PipelineConfig) -> Result<PipelineHandle, DeviceError>;
    fn destroy_pipeline(&mut self, pipeline: PipelineHandle);

    fn create_texture_buffer(
        &mut self,
        format: TextureBufferFormat,
        size_in_elements: u32,
    ) -> Result<TextureBufferHandle, DeviceError>;
    fn destroy_texture_buffer(&mut self, buffer: TextureBufferHandle);
    /// Stream data into a texel buffer, returning the element offset it landed at
    fn write_texture_buffer(
        &mut self,
        buffer: TextureBufferHandle,
        data: &[u16],
    ) -> Result<u32, DeviceError>;

    /// Reserve room for at least `min_count` vertices of `vertex_size` bytes
    fn map_vertex_buffer(&mut self, vertex_size: u32, min_count: u32) -> VertexBufferMapping;
    /// Commit `vertex_count` vertices written since the last map
    fn unmap_vertex_buffer(&mut self, data: &[u8], vertex_size: u32, vertex_count: u32);

    fn upload_uniform_buffer(&mut self, data: &[u8]);
    fn push_uniforms(&mut self, data: &[u8]);

    fn set_pipeline(&mut self, pipeline: PipelineHandle);
    fn set_texture_sampler(&mut self, slot: u32, texture: TextureHandle, sampler: SamplerHandle);
    fn set_texture_buffer(&mut self, slot: u32, buffer: TextureBufferHandle);
    fn set_render_targets(&mut self, color: Option<TextureHandle>, depth: Option<TextureHandle>);
    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32);
    fn set_scissor(&mut self, x: u32, y: u32, width: u32, height: u32);

    fn set_viewport_and_scissor(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.set_viewport(x, y, width, height);
        self.set_scissor(x, y, width, height);
    }

    fn draw(&mut self, vertex_count: u32, base_vertex: u32);

    fn clear_render_target(&mut self, texture: TextureHandle, color: u32);
    fn clear_depth(&mut self, texture: TextureHandle, depth: f32);
    /// Contents may be discarded before the next render into `texture`
    fn invalidate_render_target(&mut self, texture: TextureHandle);

    fn copy_texture_region(
        &mut self,
        dst: TextureRegion,
        src: TextureRegion,
        width: u32,
        height: u32,
    );
    fn resolve_texture_region(
        &mut self,
        dst: TextureRegion,
        src: TextureRegion,
        width: u32,
        height: u32,
    );

    /// Read packed texels into `out`, `stride` texels apart per row
    #[allow(clippy::too_many_arguments)]
    fn download_texture(
        &mut self,
        texture: TextureHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        out: &mut [u32],
        stride: u32,
    ) -> Result<(), DeviceError>;

    #[allow(clippy::too_many_arguments)]
    fn update_texture(
        &mut self,
        texture: TextureHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u32],
        stride: u32,
    ) -> Result<(), DeviceError>;
}
