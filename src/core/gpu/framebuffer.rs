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

//! Device textures backing emulated VRAM
//!
//! The primary render target holds VRAM at the internal resolution. A
//! single-sampled copy of it (`vram_read`) is what primitives sample from and
//! what readbacks encode; the two are kept coherent through the dirty
//! rectangle tracked by the renderer.

use super::settings::ResolvedSettings;
use super::types::{VRAM_HEIGHT, VRAM_SIZE, VRAM_WIDTH};
use crate::core::config::DownsampleMode;
use crate::core::device::{
    GpuDevice, SamplerConfig, SamplerHandle, TextureBufferFormat, TextureBufferHandle,
    TextureDesc, TextureFormat, TextureHandle, TextureKind,
};
use crate::core::error::{RendererError, Result};

/// Elements in the texel buffer used to stream CPU VRAM writes
pub const VRAM_UPDATE_BUFFER_ELEMENTS: u32 = 2 * VRAM_SIZE as u32;

/// Width of the readback texture; two VRAM pixels pack into one texel
pub const VRAM_READBACK_WIDTH: u32 = VRAM_WIDTH / 2;

#[derive(Debug)]
pub struct Framebuffer {
    pub width: u32,
    pub height: u32,
    pub vram: TextureHandle,
    pub vram_depth: TextureHandle,
    pub vram_read: TextureHandle,
    pub vram_readback: TextureHandle,
    pub upload_buffer: TextureBufferHandle,
    pub nearest_sampler: SamplerHandle,
    pub linear_sampler: SamplerHandle,
    /// Output of display passes that reinterpret VRAM; created on demand
    pub display_private: Option<TextureHandle>,
    pub downsample_texture: Option<TextureHandle>,
    pub downsample_render: Option<TextureHandle>,
    pub downsample_weight: Option<TextureHandle>,
    /// Holds replacement art for VRAM writes; sized to the last replacement
    pub vram_replacement: Option<TextureHandle>,
}

/// Resources created so far, released again if a later creation fails
#[derive(Default)]
struct Created {
    textures: Vec<TextureHandle>,
    samplers: Vec<SamplerHandle>,
    buffers: Vec<TextureBufferHandle>,
}

impl Created {
    fn texture<D: GpuDevice>(
        &mut self,
        device: &mut D,
        desc: TextureDesc,
        what: &'static str,
    ) -> Result<TextureHandle> {
        let handle = device
            .create_texture(&desc)
            .map_err(|source| RendererError::ResourceCreation { what, source })?;
        self.textures.push(handle);
        Ok(handle)
    }

    fn sampler<D: GpuDevice>(
        &mut self,
        device: &mut D,
        config: SamplerConfig,
        what: &'static str,
    ) -> Result<SamplerHandle> {
        let handle = device
            .create_sampler(&config)
            .map_err(|source| RendererError::ResourceCreation { what, source })?;
        self.samplers.push(handle);
        Ok(handle)
    }

    fn release<D: GpuDevice>(self, device: &mut D) {
        for texture in self.textures {
            device.destroy_texture(texture);
        }
        for sampler in self.samplers {
            device.destroy_sampler(sampler);
        }
        for buffer in self.buffers {
            device.destroy_texture_buffer(buffer);
        }
    }
}

impl Framebuffer {
    /// Create every VRAM texture for `resolved`
    ///
    /// Nothing is leaked on failure; textures created before the failing
    /// one are destroyed again.
    pub fn create<D: GpuDevice>(device: &mut D, resolved: &ResolvedSettings) -> Result<Self> {
        let mut created = Created::default();
        match Self::create_inner(device, resolved, &mut created) {
            Ok(framebuffer) => Ok(framebuffer),
            Err(e) => {
                created.release(device);
                Err(e)
            }
        }
    }

    fn create_inner<D: GpuDevice>(
        device: &mut D,
        resolved: &ResolvedSettings,
        created: &mut Created,
    ) -> Result<Self> {
        let scale = resolved.resolution_scale;
        let samples = resolved.multisamples;
        let width = VRAM_WIDTH * scale;
        let height = VRAM_HEIGHT * scale;

        let vram = created.texture(
            device,
            TextureDesc::render_target(width, height, samples),
            "VRAM render target",
        )?;
        let vram_depth = created.texture(
            device,
            TextureDesc::depth_stencil(width, height, samples),
            "VRAM depth buffer",
        )?;
        let vram_read = created.texture(
            device,
            TextureDesc {
                kind: TextureKind::Texture,
                ..TextureDesc::render_target(width, height, 1)
            },
            "VRAM read texture",
        )?;
        let vram_readback = created.texture(
            device,
            TextureDesc::render_target(VRAM_READBACK_WIDTH, VRAM_HEIGHT, 1),
            "VRAM readback texture",
        )?;

        let upload_buffer = device
            .create_texture_buffer(TextureBufferFormat::R16UI, VRAM_UPDATE_BUFFER_ELEMENTS)
            .map_err(|source| RendererError::ResourceCreation {
                what: "VRAM upload buffer",
                source,
            })?;
        created.buffers.push(upload_buffer);

        let nearest_sampler = created.sampler(device, SamplerConfig::nearest(), "point sampler")?;
        let linear_sampler = created.sampler(device, SamplerConfig::linear(), "linear sampler")?;

        log::info!(
            "Created HW framebuffer of {}x{} ({}x MSAA)",
            width,
            height,
            samples
        );

        let mut framebuffer = Self {
            width,
            height,
            vram,
            vram_depth,
            vram_read,
            vram_readback,
            upload_buffer,
            nearest_sampler,
            linear_sampler,
            display_private: None,
            downsample_texture: None,
            downsample_render: None,
            downsample_weight: None,
            vram_replacement: None,
        };

        match resolved.downsample_mode {
            DownsampleMode::Adaptive => {
                let levels = resolved.adaptive_downsample_mip_levels();
                framebuffer.downsample_texture = Some(created.texture(
                    device,
                    TextureDesc::render_target(width, height, 1).with_levels(levels),
                    "downsample texture",
                )?);
                framebuffer.downsample_render = Some(created.texture(
                    device,
                    TextureDesc::render_target(width, height, 1),
                    "downsample render texture",
                )?);
                framebuffer.downsample_weight = Some(created.texture(
                    device,
                    TextureDesc::render_target(
                        (width >> (levels - 1)).max(1),
                        (height >> (levels - 1)).max(1),
                        1,
                    )
                    .with_format(TextureFormat::R8),
                    "downsample weight texture",
                )?);
            }
            DownsampleMode::Box => {
                let box_scale = resolved.box_downsample_scale;
                framebuffer.downsample_render = Some(created.texture(
                    device,
                    TextureDesc::render_target(VRAM_WIDTH * box_scale, VRAM_HEIGHT * box_scale, 1),
                    "box downsample texture",
                )?);
            }
            DownsampleMode::Disabled => {}
        }

        Ok(framebuffer)
    }

    /// Release every texture, sampler and buffer
    pub fn destroy<D: GpuDevice>(&self, device: &mut D) {
        for texture in [
            Some(self.vram),
            Some(self.vram_depth),
            Some(self.vram_read),
            Some(self.vram_readback),
            self.display_private,
            self.downsample_texture,
            self.downsample_render,
            self.downsample_weight,
            self.vram_replacement,
        ]
        .into_iter()
        .flatten()
        {
            device.destroy_texture(texture);
        }
        device.destroy_sampler(self.nearest_sampler);
        device.destroy_sampler(self.linear_sampler);
        device.destroy_texture_buffer(self.upload_buffer);
    }

    /// Whether `texture` exists and has exactly this size
    pub fn texture_matches<D: GpuDevice>(
        device: &D,
        texture: Option<TextureHandle>,
        width: u32,
        height: u32,
    ) -> bool {
        texture
            .and_then(|t| device.texture_desc(t))
            .is_some_and(|desc| desc.width == width && desc.height == height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RendererSettings;
    use crate::core::device::{DeviceInfo, HeadlessDevice};

    fn resolved(settings: RendererSettings) -> ResolvedSettings {
        ResolvedSettings::resolve(&settings, &DeviceInfo::default()).0
    }

    #[test]
    fn test_create_scaled_framebuffer() {
        let mut device = HeadlessDevice::default();
        let fb = Framebuffer::create(
            &mut device,
            &resolved(RendererSettings {
                resolution_scale: 2,
                ..Default::default()
            }),
        )
        .unwrap();
        assert_eq!((fb.width, fb.height), (2048, 1024));
        assert_eq!(device.texture_desc(fb.vram_read).unwrap().width, 2048);
        assert_eq!(device.texture_desc(fb.vram_readback).unwrap().width, 512);
        assert_eq!(device.live_texture_count(), 4);

        fb.destroy(&mut device);
        assert_eq!(device.live_texture_count(), 0);
    }

    #[test]
    fn test_adaptive_textures() {
        let mut device = HeadlessDevice::default();
        let fb = Framebuffer::create(
            &mut device,
            &resolved(RendererSettings {
                resolution_scale: 4,
                downsample_mode: DownsampleMode::Adaptive,
                ..Default::default()
            }),
        )
        .unwrap();
        let mip = device.texture_desc(fb.downsample_texture.unwrap()).unwrap();
        assert_eq!(mip.levels, 3);
        let weight = device.texture_desc(fb.downsample_weight.unwrap()).unwrap();
        assert_eq!((weight.width, weight.height), (1024, 512));
        assert_eq!(weight.format, TextureFormat::R8);
    }

    #[test]
    fn test_failure_releases_partial_resources() {
        let mut device = HeadlessDevice::default();
        // Room for the render target but not the depth buffer.
        device.set_texture_memory_limit(Some(4 * 1024 * 512 * 4 + 16));
        let result = Framebuffer::create(
            &mut device,
            &resolved(RendererSettings {
                resolution_scale: 2,
                ..Default::default()
            }),
        );
        assert!(matches!(
            result,
            Err(RendererError::ResourceCreation {
                what: "VRAM depth buffer",
                ..
            })
        ));
        assert_eq!(device.live_texture_count(), 0);
    }
}
