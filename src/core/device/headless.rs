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

//! Headless reference device
//!
//! Keeps every texture in host memory. Clears, copies, resolves, uploads and
//! downloads operate on that memory, and the VRAM transfer passes (fill,
//! write, copy, readback, depth-from-mask and plain copy) are executed on the
//! CPU at internal resolution. Batch, display and downsample draws are
//! recorded but not rasterized.

use super::{
    DeviceFeatures, DeviceInfo, GpuDevice, PipelineConfig, PipelineHandle, SamplerConfig,
    SamplerHandle, ShaderKey, TextureBufferFormat, TextureBufferHandle, TextureDesc,
    TextureFormat, TextureHandle, TextureKind, TextureRegion, VertexBufferMapping,
};
use crate::core::error::DeviceError;
use crate::core::gpu::uniforms::{
    float_to_rgba8, VramCopyUniforms, VramFillUniforms, VramReadbackUniforms, VramWriteUniforms,
};
use crate::core::gpu::{rgba5551_to_rgba8888, rgba8888_to_rgba5551, VRAM_HEIGHT, VRAM_WIDTH};
use bytemuck::Pod;
use std::collections::HashMap;

/// Streaming vertex buffer size in bytes
const VERTEX_BUFFER_SIZE: u32 = 8 * 1024 * 1024;

/// One recorded device operation
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    Draw {
        pipeline: Option<PipelineHandle>,
        fragment_shader: Option<ShaderKey>,
        vertex_count: u32,
        base_vertex: u32,
    },
    ClearRenderTarget {
        texture: TextureHandle,
        color: u32,
    },
    ClearDepth {
        texture: TextureHandle,
        depth: f32,
    },
    InvalidateRenderTarget(TextureHandle),
    CopyTextureRegion {
        dst: TextureRegion,
        src: TextureRegion,
        width: u32,
        height: u32,
    },
    ResolveTextureRegion {
        dst: TextureRegion,
        src: TextureRegion,
        width: u32,
        height: u32,
    },
    DownloadTexture {
        texture: TextureHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    UpdateTexture {
        texture: TextureHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    UploadUniformBuffer(Vec<u8>),
    PushUniforms(Vec<u8>),
    SetRenderTargets {
        color: Option<TextureHandle>,
        depth: Option<TextureHandle>,
    },
    SetViewport {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    SetScissor {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

enum Texels {
    /// Packed texels per mip level
    Color(Vec<Vec<u32>>),
    Depth(Vec<f32>),
}

struct Texture {
    desc: TextureDesc,
    texels: Texels,
}

impl Texture {
    fn level_size(&self, level: u32) -> (u32, u32) {
        (
            (self.desc.width >> level).max(1),
            (self.desc.height >> level).max(1),
        )
    }

    fn color(&self, level: u32) -> Option<&[u32]> {
        match &self.texels {
            Texels::Color(levels) => levels.get(level as usize).map(Vec::as_slice),
            Texels::Depth(_) => None,
        }
    }

    fn color_mut(&mut self, level: u32) -> Option<&mut Vec<u32>> {
        match &mut self.texels {
            Texels::Color(levels) => levels.get_mut(level as usize),
            Texels::Depth(_) => None,
        }
    }
}

struct TexelBuffer {
    data: Vec<u16>,
    position: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Area {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Area {
    fn intersect(&self, other: &Area) -> Area {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        Area {
            x: left,
            y: top,
            width: right.saturating_sub(left),
            height: bottom.saturating_sub(top),
        }
    }
}

/// A fragment produced by a CPU-executed pass
struct Fragment {
    x: u32,
    y: u32,
    color: u32,
    depth: f32,
}

/// In-memory [`GpuDevice`] implementation
pub struct HeadlessDevice {
    info: DeviceInfo,
    next_id: u32,
    textures: HashMap<TextureHandle, Texture>,
    samplers: HashMap<SamplerHandle, SamplerConfig>,
    pipelines: HashMap<PipelineHandle, PipelineConfig>,
    texel_buffers: HashMap<TextureBufferHandle, TexelBuffer>,

    vertex_memory: Vec<u8>,
    vertex_position: u32,
    mapped_base_vertex: u32,

    pipeline: Option<PipelineHandle>,
    bound_textures: [Option<TextureHandle>; 4],
    bound_texel_buffer: Option<TextureBufferHandle>,
    color_target: Option<TextureHandle>,
    depth_target: Option<TextureHandle>,
    viewport: Area,
    scissor: Area,
    push_constants: Vec<u8>,

    commands: Vec<DeviceCommand>,
    fail_pipeline_creation: bool,
    texture_memory_limit: Option<u64>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(DeviceInfo::default())
    }
}

impl HeadlessDevice {
    pub fn new(info: DeviceInfo) -> Self {
        Self {
            info,
            next_id: 1,
            textures: HashMap::new(),
            samplers: HashMap::new(),
            pipelines: HashMap::new(),
            texel_buffers: HashMap::new(),
            vertex_memory: vec![0; VERTEX_BUFFER_SIZE as usize],
            vertex_position: 0,
            mapped_base_vertex: 0,
            pipeline: None,
            bound_textures: [None; 4],
            bound_texel_buffer: None,
            color_target: None,
            depth_target: None,
            viewport: Area::default(),
            scissor: Area::default(),
            push_constants: Vec::new(),
            commands: Vec::new(),
            fail_pipeline_creation: false,
            texture_memory_limit: None,
        }
    }

    /// A device advertising exactly `features`
    pub fn with_features(features: DeviceFeatures) -> Self {
        Self::new(DeviceInfo {
            features,
            ..DeviceInfo::default()
        })
    }

    /// Make every subsequent pipeline creation fail
    pub fn set_fail_pipeline_creation(&mut self, fail: bool) {
        self.fail_pipeline_creation = fail;
    }

    /// Fail texture creation once total texel memory would exceed `limit` bytes
    pub fn set_texture_memory_limit(&mut self, limit: Option<u64>) {
        self.texture_memory_limit = limit;
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Fragment shaders of every draw recorded so far, in order
    pub fn draw_calls(&self) -> Vec<(Option<ShaderKey>, u32, u32)> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                DeviceCommand::Draw {
                    fragment_shader,
                    vertex_count,
                    base_vertex,
                    ..
                } => Some((*fragment_shader, *vertex_count, *base_vertex)),
                _ => None,
            })
            .collect()
    }

    /// Number of draws whose fragment shader is a batch shader
    pub fn batch_draw_count(&self) -> usize {
        self.draw_calls()
            .iter()
            .filter(|(shader, _, _)| matches!(shader, Some(ShaderKey::BatchFragment(_))))
            .count()
    }

    /// Read back committed vertices
    pub fn vertices<T: Pod>(&self, base_vertex: u32, count: u32) -> Vec<T> {
        let size = std::mem::size_of::<T>();
        (0..count as usize)
            .filter_map(|i| {
                let start = (base_vertex as usize + i) * size;
                self.vertex_memory
                    .get(start..start + size)
                    .map(bytemuck::pod_read_unaligned)
            })
            .collect()
    }

    pub fn pipeline_config(&self, pipeline: PipelineHandle) -> Option<&PipelineConfig> {
        self.pipelines.get(&pipeline)
    }

    pub fn live_pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Level 0 texels of a color texture
    pub fn texels(&self, texture: TextureHandle) -> Option<&[u32]> {
        self.textures.get(&texture).and_then(|t| t.color(0))
    }

    pub fn level_texels(&self, texture: TextureHandle, level: u32) -> Option<&[u32]> {
        self.textures.get(&texture).and_then(|t| t.color(level))
    }

    pub fn depth_texels(&self, texture: TextureHandle) -> Option<&[f32]> {
        match self.textures.get(&texture).map(|t| &t.texels) {
            Some(Texels::Depth(depth)) => Some(depth),
            _ => None,
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn texture_memory(&self) -> u64 {
        self.textures
            .values()
            .map(|t| t.desc.width as u64 * t.desc.height as u64 * 4)
            .sum()
    }

    fn target_area(&self) -> Area {
        let Some(target) = self.color_target.or(self.depth_target) else {
            return Area::default();
        };
        let Some(texture) = self.textures.get(&target) else {
            return Area::default();
        };
        let full = Area {
            x: 0,
            y: 0,
            width: texture.desc.width,
            height: texture.desc.height,
        };
        full.intersect(&self.viewport).intersect(&self.scissor)
    }

    fn sample(&self, slot: usize, x: u32, y: u32) -> u32 {
        let Some(texture) = self.bound_textures[slot].and_then(|h| self.textures.get(&h)) else {
            return 0;
        };
        let (width, height) = texture.level_size(0);
        texture
            .color(0)
            .and_then(|texels| {
                texels
                    .get((y.min(height - 1) * width + x.min(width - 1)) as usize)
                    .copied()
            })
            .unwrap_or(0)
    }

    fn bound_texture_size(&self, slot: usize) -> (u32, u32) {
        self.bound_textures[slot]
            .and_then(|h| self.textures.get(&h))
            .map(|t| t.level_size(0))
            .unwrap_or((1, 1))
    }

    fn uniforms<T: Pod>(&self) -> Option<T> {
        bytemuck::try_pod_read_unaligned(&self.push_constants).ok()
    }

    fn execute(&mut self, config: &PipelineConfig) {
        let area = self.target_area();
        let fragments = match config.fragment_shader {
            ShaderKey::VramFill {
                wrapped,
                interlaced,
                resolution_scale,
            } => self.shade_fill(area, wrapped, interlaced, resolution_scale),
            ShaderKey::VramWrite { resolution_scale } => self.shade_write(area, resolution_scale),
            ShaderKey::VramCopy => self.shade_copy(area),
            ShaderKey::VramUpdateDepth => self.shade_update_depth(area),
            ShaderKey::VramReadback { resolution_scale } => {
                self.shade_readback(area, resolution_scale)
            }
            ShaderKey::Copy => self.shade_blit(area),
            _ => return,
        };
        self.output_fragments(config, fragments);
    }

    fn shade_fill(&self, area: Area, wrapped: bool, interlaced: bool, scale: u32) -> Vec<Fragment> {
        let Some(u) = self.uniforms::<VramFillUniforms>() else {
            return Vec::new();
        };
        let color = float_to_rgba8(u.fill_color);
        let depth = u.fill_color[3];
        let mut out = Vec::with_capacity((area.width * area.height) as usize);
        for y in area.y..area.y + area.height {
            if wrapped && y < u.dst_y && y >= u.end_y {
                continue;
            }
            if interlaced && ((y / scale.max(1)) & 1) == u.interlaced_displayed_field {
                continue;
            }
            for x in area.x..area.x + area.width {
                if wrapped && x < u.dst_x && x >= u.end_x {
                    continue;
                }
                out.push(Fragment { x, y, color, depth });
            }
        }
        out
    }

    fn shade_write(&self, area: Area, scale: u32) -> Vec<Fragment> {
        let Some(u) = self.uniforms::<VramWriteUniforms>() else {
            return Vec::new();
        };
        let Some(buffer) = self
            .bound_texel_buffer
            .and_then(|h| self.texel_buffers.get(&h))
        else {
            return Vec::new();
        };
        let scale = scale.max(1);
        let mut out = Vec::with_capacity((area.width * area.height) as usize);
        for y in area.y..area.y + area.height {
            let cy = y / scale;
            if cy < u.dst_y && cy >= u.end_y {
                continue;
            }
            let offset_y = if cy < u.dst_y {
                VRAM_HEIGHT - u.dst_y + cy
            } else {
                cy - u.dst_y
            };
            if offset_y >= u.height {
                continue;
            }
            for x in area.x..area.x + area.width {
                let cx = x / scale;
                if cx < u.dst_x && cx >= u.end_x {
                    continue;
                }
                let offset_x = if cx < u.dst_x {
                    VRAM_WIDTH - u.dst_x + cx
                } else {
                    cx - u.dst_x
                };
                if offset_x >= u.width {
                    continue;
                }
                let index = (u.buffer_base_offset + offset_y * u.width + offset_x) as usize;
                let Some(&value) = buffer.data.get(index) else {
                    continue;
                };
                let color = rgba5551_to_rgba8888(value | u.mask_or_bits as u16);
                let depth = if (color >> 24) != 0 { u.depth_value } else { 0.0 };
                out.push(Fragment { x, y, color, depth });
            }
        }
        out
    }

    fn shade_copy(&self, area: Area) -> Vec<Fragment> {
        let Some(u) = self.uniforms::<VramCopyUniforms>() else {
            return Vec::new();
        };
        let (tex_width, tex_height) = self.bound_texture_size(0);
        let mut out = Vec::with_capacity((area.width * area.height) as usize);
        for y in area.y..area.y + area.height {
            if y < u.dst_y && y >= u.end_y {
                continue;
            }
            let offset_y = if y < u.dst_y {
                tex_height - u.dst_y + y
            } else {
                y - u.dst_y
            };
            let src_y = (u.src_y + offset_y) % tex_height;
            for x in area.x..area.x + area.width {
                if x < u.dst_x && x >= u.end_x {
                    continue;
                }
                let offset_x = if x < u.dst_x {
                    tex_width - u.dst_x + x
                } else {
                    x - u.dst_x
                };
                let src_x = (u.src_x + offset_x) % tex_width;
                let mut color = self.sample(0, src_x, src_y);
                let depth = if u.set_mask_bit != 0 {
                    color |= 0xFF00_0000;
                    1.0
                } else if (color >> 24) == 0xFF {
                    u.depth_value
                } else {
                    0.0
                };
                out.push(Fragment { x, y, color, depth });
            }
        }
        out
    }

    fn shade_update_depth(&self, area: Area) -> Vec<Fragment> {
        let mut out = Vec::with_capacity((area.width * area.height) as usize);
        for y in area.y..area.y + area.height {
            for x in area.x..area.x + area.width {
                let depth = if (self.sample(0, x, y) >> 31) != 0 {
                    1.0
                } else {
                    0.0
                };
                out.push(Fragment {
                    x,
                    y,
                    color: 0,
                    depth,
                });
            }
        }
        out
    }

    fn shade_readback(&self, area: Area, scale: u32) -> Vec<Fragment> {
        let Some(u) = self.uniforms::<VramReadbackUniforms>() else {
            return Vec::new();
        };
        let scale = scale.max(1);
        let load = |x: u32, y: u32| -> u32 {
            let px = (x % VRAM_WIDTH) * scale;
            let py = (y % VRAM_HEIGHT) * scale;
            rgba8888_to_rgba5551(self.sample(0, px, py)) as u32
        };
        let mut out = Vec::with_capacity((area.width * area.height) as usize);
        for y in area.y..area.y + area.height {
            for x in area.x..area.x + area.width {
                let vx = u.left + x * 2;
                let vy = u.top + y;
                let color = load(vx, vy) | (load(vx + 1, vy) << 16);
                out.push(Fragment {
                    x,
                    y,
                    color,
                    depth: 0.0,
                });
            }
        }
        out
    }

    fn shade_blit(&self, area: Area) -> Vec<Fragment> {
        let (src_width, src_height) = self.bound_texture_size(0);
        let viewport = self.viewport;
        if viewport.width == 0 || viewport.height == 0 {
            return Vec::new();
        }
        let mut out = Vec::with_capacity((area.width * area.height) as usize);
        for y in area.y..area.y + area.height {
            let sy = (y - viewport.y) * src_height / viewport.height;
            for x in area.x..area.x + area.width {
                let sx = (x - viewport.x) * src_width / viewport.width;
                out.push(Fragment {
                    x,
                    y,
                    color: self.sample(0, sx, sy),
                    depth: 0.0,
                });
            }
        }
        out
    }

    fn output_fragments(&mut self, config: &PipelineConfig, fragments: Vec<Fragment>) {
        let write_mask = config.blend.write_mask;
        let color_target = self.color_target.filter(|_| config.color_format.is_some());
        let depth_target = self.depth_target.filter(|_| config.depth_format.is_some());

        for fragment in fragments {
            if let Some(depth) = depth_target.and_then(|h| self.textures.get_mut(&h)) {
                let width = depth.desc.width;
                if let Texels::Depth(values) = &mut depth.texels {
                    let index = (fragment.y * width + fragment.x) as usize;
                    let Some(stored) = values.get_mut(index) else {
                        continue;
                    };
                    if !config.depth.func.passes(fragment.depth, *stored) {
                        continue;
                    }
                    if config.depth.write {
                        *stored = fragment.depth;
                    }
                }
            }

            if write_mask == 0 {
                continue;
            }
            if let Some(color) = color_target.and_then(|h| self.textures.get_mut(&h)) {
                let width = color.desc.width;
                if let Some(texels) = color.color_mut(0) {
                    if let Some(texel) = texels.get_mut((fragment.y * width + fragment.x) as usize) {
                        let mut channel_mask = 0u32;
                        for channel in 0..4 {
                            if write_mask & (1 << channel) != 0 {
                                channel_mask |= 0xFF << (channel * 8);
                            }
                        }
                        *texel = (*texel & !channel_mask) | (fragment.color & channel_mask);
                    }
                }
            }
        }
    }

    fn copy_region(
        &mut self,
        dst: TextureRegion,
        src: TextureRegion,
        width: u32,
        height: u32,
    ) -> Option<()> {
        let source = self.textures.get(&src.texture)?;
        let (src_width, _) = source.level_size(src.level);
        let src_texels = source.color(src.level)?;
        let mut rows = Vec::with_capacity(height as usize);
        for row in 0..height {
            let start = ((src.y + row) * src_width + src.x) as usize;
            rows.push(src_texels.get(start..start + width as usize)?.to_vec());
        }

        let target = self.textures.get_mut(&dst.texture)?;
        let (dst_width, _) = target.level_size(dst.level);
        let dst_texels = target.color_mut(dst.level)?;
        for (row, data) in rows.iter().enumerate() {
            let start = ((dst.y + row as u32) * dst_width + dst.x) as usize;
            dst_texels
                .get_mut(start..start + width as usize)?
                .copy_from_slice(data);
        }
        Some(())
    }
}

impl GpuDevice for HeadlessDevice {
    fn name(&self) -> &str {
        "headless"
    }

    fn info(&self) -> DeviceInfo {
        self.info
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle, DeviceError> {
        if desc.width == 0
            || desc.height == 0
            || desc.width > self.info.max_texture_size
            || desc.height > self.info.max_texture_size
        {
            return Err(DeviceError::InvalidDimensions {
                width: desc.width,
                height: desc.height,
            });
        }
        let size = desc.width as u64 * desc.height as u64 * 4;
        if let Some(limit) = self.texture_memory_limit {
            if self.texture_memory() + size > limit {
                return Err(DeviceError::OutOfMemory {
                    width: desc.width,
                    height: desc.height,
                });
            }
        }

        let texels = if desc.kind == TextureKind::DepthStencil || desc.format == TextureFormat::D16
        {
            Texels::Depth(vec![0.0; (desc.width * desc.height) as usize])
        } else {
            Texels::Color(
                (0..desc.levels.max(1))
                    .map(|level| {
                        let w = (desc.width >> level).max(1);
                        let h = (desc.height >> level).max(1);
                        vec![0; (w * h) as usize]
                    })
                    .collect(),
            )
        };
        let handle = TextureHandle::new(self.allocate_id());
        self.textures.insert(handle, Texture { desc: *desc, texels });
        Ok(handle)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        if self.color_target == Some(texture) {
            self.color_target = None;
        }
        if self.depth_target == Some(texture) {
            self.depth_target = None;
        }
        for slot in self.bound_textures.iter_mut() {
            if *slot == Some(texture) {
                *slot = None;
            }
        }
    }

    fn texture_desc(&self, texture: TextureHandle) -> Option<TextureDesc> {
        self.textures.get(&texture).map(|t| t.desc)
    }

    fn create_sampler(&mut self, config: &SamplerConfig) -> Result<SamplerHandle, DeviceError> {
        let handle = SamplerHandle::new(self.allocate_id());
        self.samplers.insert(handle, *config);
        Ok(handle)
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) {
        self.samplers.remove(&sampler);
    }

    fn create_pipeline(&mut self, config: &PipelineConfig) -> Result<PipelineHandle, DeviceError> {
        if self.fail_pipeline_creation {
            return Err(DeviceError::ShaderCompilation(format!(
                "{:?}",
                config.fragment_shader
            )));
        }
        if config.geometry_shader.is_some()
            && !self.info.features.contains(DeviceFeatures::GEOMETRY_SHADERS)
        {
            return Err(DeviceError::Unsupported("geometry shaders".to_string()));
        }
        let handle = PipelineHandle::new(self.allocate_id());
        self.pipelines.insert(handle, config.clone());
        Ok(handle)
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        self.pipelines.remove(&pipeline);
        if self.pipeline == Some(pipeline) {
            self.pipeline = None;
        }
    }

    fn create_texture_buffer(
        &mut self,
        _format: TextureBufferFormat,
        size_in_elements: u32,
    ) -> Result<TextureBufferHandle, DeviceError> {
        let handle = TextureBufferHandle::new(self.allocate_id());
        self.texel_buffers.insert(
            handle,
            TexelBuffer {
                data: vec![0; size_in_elements as usize],
                position: 0,
            },
        );
        Ok(handle)
    }

    fn destroy_texture_buffer(&mut self, buffer: TextureBufferHandle) {
        self.texel_buffers.remove(&buffer);
    }

    fn write_texture_buffer(
        &mut self,
        buffer: TextureBufferHandle,
        data: &[u16],
    ) -> Result<u32, DeviceError> {
        let target = self
            .texel_buffers
            .get_mut(&buffer)
            .ok_or(DeviceError::InvalidHandle(buffer.id()))?;
        let capacity = target.data.len() as u32;
        let count = data.len() as u32;
        if count > capacity {
            return Err(DeviceError::Unsupported(format!(
                "texel buffer write of {} elements exceeds capacity {}",
                count, capacity
            )));
        }
        if target.position + count > capacity {
            target.position = 0;
        }
        let base = target.position;
        target.data[base as usize..(base + count) as usize].copy_from_slice(data);
        target.position += count;
        Ok(base)
    }

    fn map_vertex_buffer(&mut self, vertex_size: u32, min_count: u32) -> VertexBufferMapping {
        let capacity = VERTEX_BUFFER_SIZE / vertex_size;
        let mut base = self.vertex_position.div_ceil(vertex_size);
        if base + min_count > capacity {
            base = 0;
        }
        self.mapped_base_vertex = base;
        VertexBufferMapping {
            base_vertex: base,
            space: capacity - base,
        }
    }

    fn unmap_vertex_buffer(&mut self, data: &[u8], vertex_size: u32, vertex_count: u32) {
        let start = (self.mapped_base_vertex * vertex_size) as usize;
        let len = ((vertex_count * vertex_size) as usize).min(data.len());
        if let Some(dst) = self.vertex_memory.get_mut(start..start + len) {
            dst.copy_from_slice(&data[..len]);
        }
        self.vertex_position = (self.mapped_base_vertex + vertex_count) * vertex_size;
    }

    fn upload_uniform_buffer(&mut self, data: &[u8]) {
        self.commands
            .push(DeviceCommand::UploadUniformBuffer(data.to_vec()));
    }

    fn push_uniforms(&mut self, data: &[u8]) {
        self.push_constants = data.to_vec();
        self.commands.push(DeviceCommand::PushUniforms(data.to_vec()));
    }

    fn set_pipeline(&mut self, pipeline: PipelineHandle) {
        self.pipeline = Some(pipeline);
    }

    fn set_texture_sampler(&mut self, slot: u32, texture: TextureHandle, _sampler: SamplerHandle) {
        if let Some(entry) = self.bound_textures.get_mut(slot as usize) {
            *entry = Some(texture);
        }
    }

    fn set_texture_buffer(&mut self, _slot: u32, buffer: TextureBufferHandle) {
        self.bound_texel_buffer = Some(buffer);
    }

    fn set_render_targets(&mut self, color: Option<TextureHandle>, depth: Option<TextureHandle>) {
        self.color_target = color;
        self.depth_target = depth;
        self.commands
            .push(DeviceCommand::SetRenderTargets { color, depth });
    }

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.viewport = Area {
            x,
            y,
            width,
            height,
        };
        self.commands.push(DeviceCommand::SetViewport {
            x,
            y,
            width,
            height,
        });
    }

    fn set_scissor(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.scissor = Area {
            x,
            y,
            width,
            height,
        };
        self.commands.push(DeviceCommand::SetScissor {
            x,
            y,
            width,
            height,
        });
    }

    fn draw(&mut self, vertex_count: u32, base_vertex: u32) {
        let config = self.pipeline.and_then(|p| self.pipelines.get(&p)).cloned();
        self.commands.push(DeviceCommand::Draw {
            pipeline: self.pipeline,
            fragment_shader: config.as_ref().map(|c| c.fragment_shader),
            vertex_count,
            base_vertex,
        });
        if let Some(config) = config {
            self.execute(&config);
        }
    }

    fn clear_render_target(&mut self, texture: TextureHandle, color: u32) {
        if let Some(target) = self.textures.get_mut(&texture) {
            if let Some(texels) = target.color_mut(0) {
                texels.fill(color);
            }
        }
        self.commands
            .push(DeviceCommand::ClearRenderTarget { texture, color });
    }

    fn clear_depth(&mut self, texture: TextureHandle, depth: f32) {
        if let Some(Texture {
            texels: Texels::Depth(values),
            ..
        }) = self.textures.get_mut(&texture)
        {
            values.fill(depth);
        }
        self.commands
            .push(DeviceCommand::ClearDepth { texture, depth });
    }

    fn invalidate_render_target(&mut self, texture: TextureHandle) {
        self.commands
            .push(DeviceCommand::InvalidateRenderTarget(texture));
    }

    fn copy_texture_region(
        &mut self,
        dst: TextureRegion,
        src: TextureRegion,
        width: u32,
        height: u32,
    ) {
        if self.copy_region(dst, src, width, height).is_none() {
            log::warn!(
                "Headless copy {:?} -> {:?} ({}x{}) out of range",
                src,
                dst,
                width,
                height
            );
        }
        self.commands.push(DeviceCommand::CopyTextureRegion {
            dst,
            src,
            width,
            height,
        });
    }

    fn resolve_texture_region(
        &mut self,
        dst: TextureRegion,
        src: TextureRegion,
        width: u32,
        height: u32,
    ) {
        // Samples are stored once, so a resolve is a copy.
        let _ = self.copy_region(dst, src, width, height);
        self.commands.push(DeviceCommand::ResolveTextureRegion {
            dst,
            src,
            width,
            height,
        });
    }

    fn download_texture(
        &mut self,
        texture: TextureHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        out: &mut [u32],
        stride: u32,
    ) -> Result<(), DeviceError> {
        self.commands.push(DeviceCommand::DownloadTexture {
            texture,
            x,
            y,
            width,
            height,
        });
        let source = self
            .textures
            .get(&texture)
            .ok_or(DeviceError::InvalidHandle(texture.id()))?;
        let texels = source
            .color(0)
            .ok_or_else(|| DeviceError::Unsupported("download of depth texture".to_string()))?;
        let region = DeviceError::InvalidRegion {
            x,
            y,
            width,
            height,
        };
        if x + width > source.desc.width || y + height > source.desc.height {
            return Err(region);
        }
        for row in 0..height {
            let src_start = ((y + row) * source.desc.width + x) as usize;
            let dst_start = (row * stride) as usize;
            out.get_mut(dst_start..dst_start + width as usize)
                .ok_or_else(|| region.clone())?
                .copy_from_slice(&texels[src_start..src_start + width as usize]);
        }
        Ok(())
    }

    fn update_texture(
        &mut self,
        texture: TextureHandle,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u32],
        stride: u32,
    ) -> Result<(), DeviceError> {
        self.commands.push(DeviceCommand::UpdateTexture {
            texture,
            x,
            y,
            width,
            height,
        });
        let target = self
            .textures
            .get_mut(&texture)
            .ok_or(DeviceError::InvalidHandle(texture.id()))?;
        let (tex_width, tex_height) = (target.desc.width, target.desc.height);
        let region = DeviceError::InvalidRegion {
            x,
            y,
            width,
            height,
        };
        if x + width > tex_width || y + height > tex_height {
            return Err(region);
        }
        let texels = target
            .color_mut(0)
            .ok_or_else(|| DeviceError::Unsupported("upload to depth texture".to_string()))?;
        for row in 0..height {
            let src_start = (row * stride) as usize;
            let dst_start = ((y + row) * tex_width + x) as usize;
            let src = data
                .get(src_start..src_start + width as usize)
                .ok_or_else(|| region.clone())?;
            texels[dst_start..dst_start + width as usize].copy_from_slice(src);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::{DepthState, PipelineLayout};

    fn fill_pipeline(device: &mut HeadlessDevice) -> PipelineHandle {
        let mut config = PipelineConfig::screen_quad(
            ShaderKey::VramFill {
                wrapped: false,
                interlaced: false,
                resolution_scale: 1,
            },
            PipelineLayout::SingleTextureAndPushConstants,
        );
        config.depth = DepthState::always_write();
        config.depth_format = Some(TextureFormat::D16);
        device.create_pipeline(&config).unwrap()
    }

    #[test]
    fn test_create_and_destroy_texture() {
        let mut device = HeadlessDevice::default();
        let tex = device
            .create_texture(&TextureDesc::render_target(64, 32, 1))
            .unwrap();
        assert_eq!(device.texels(tex).unwrap().len(), 64 * 32);
        device.destroy_texture(tex);
        assert!(device.texture_desc(tex).is_none());
    }

    #[test]
    fn test_texture_memory_limit() {
        let mut device = HeadlessDevice::default();
        device.set_texture_memory_limit(Some(1024));
        assert!(matches!(
            device.create_texture(&TextureDesc::render_target(64, 64, 1)),
            Err(DeviceError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn test_fill_pass_respects_scissor() {
        let mut device = HeadlessDevice::default();
        let rt = device
            .create_texture(&TextureDesc::render_target(16, 16, 1))
            .unwrap();
        let pipeline = fill_pipeline(&mut device);

        device.set_render_targets(Some(rt), None);
        device.set_viewport(0, 0, 16, 16);
        device.set_scissor(4, 4, 2, 2);
        device.set_pipeline(pipeline);
        let uniforms = VramFillUniforms {
            fill_color: [1.0, 0.0, 0.0, 0.0],
            ..Default::default()
        };
        device.push_uniforms(bytemuck::bytes_of(&uniforms));
        device.draw(3, 0);

        let texels = device.texels(rt).unwrap();
        assert_eq!(texels[4 * 16 + 4], 0x0000_00FF);
        assert_eq!(texels[5 * 16 + 5], 0x0000_00FF);
        assert_eq!(texels[6 * 16 + 6], 0);
        assert_eq!(device.draw_calls().len(), 1);
    }

    #[test]
    fn test_copy_and_download() {
        let mut device = HeadlessDevice::default();
        let a = device
            .create_texture(&TextureDesc::render_target(8, 8, 1))
            .unwrap();
        let b = device
            .create_texture(&TextureDesc::render_target(8, 8, 1))
            .unwrap();
        device.clear_render_target(a, 0x1122_3344);
        device.copy_texture_region(TextureRegion::new(b, 2, 2), TextureRegion::new(a, 0, 0), 2, 2);

        let mut out = vec![0u32; 4];
        device.download_texture(b, 2, 2, 2, 2, &mut out, 2).unwrap();
        assert_eq!(out, vec![0x1122_3344; 4]);

        device.download_texture(b, 0, 0, 2, 2, &mut out, 2).unwrap();
        assert_eq!(out, vec![0; 4]);
    }

    #[test]
    fn test_vertex_buffer_wraps() {
        let mut device = HeadlessDevice::default();
        let capacity = VERTEX_BUFFER_SIZE / 16;
        let mapping = device.map_vertex_buffer(16, 4);
        assert_eq!(mapping.base_vertex, 0);
        assert_eq!(mapping.space, capacity);

        device.unmap_vertex_buffer(&vec![0u8; 16 * 4], 16, capacity - 2);
        let mapping = device.map_vertex_buffer(16, 4);
        assert_eq!(mapping.base_vertex, 0);
    }

    #[test]
    fn test_texel_buffer_wraps() {
        let mut device = HeadlessDevice::default();
        let buffer = device
            .create_texture_buffer(TextureBufferFormat::R16UI, 8)
            .unwrap();
        assert_eq!(device.write_texture_buffer(buffer, &[1; 6]).unwrap(), 0);
        assert_eq!(device.write_texture_buffer(buffer, &[2; 4]).unwrap(), 0);
        assert_eq!(device.write_texture_buffer(buffer, &[3; 4]).unwrap(), 4);
        assert!(device.write_texture_buffer(buffer, &[0; 9]).is_err());
    }

    #[test]
    fn test_pipeline_failure_injection() {
        let mut device = HeadlessDevice::default();
        device.set_fail_pipeline_creation(true);
        let config =
            PipelineConfig::screen_quad(ShaderKey::Copy, PipelineLayout::SingleTextureAndPushConstants);
        assert!(device.create_pipeline(&config).is_err());
    }
}
