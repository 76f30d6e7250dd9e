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

//! Settings resolution and live updates
//!
//! Requested [`RendererSettings`] are resolved against what the device can
//! actually do. Anything the device cannot honor is downgraded and reported
//! once through a [`RendererNotice`]; none of these shortfalls are errors.

use super::framebuffer::Framebuffer;
use super::types::{VRAM_HEIGHT, VRAM_WIDTH};
use super::HardwareRenderer;
use crate::core::config::{DownsampleMode, RendererSettings, TextureFilter, WireframeMode};
use crate::core::device::{DeviceFeatures, DeviceInfo, GpuDevice};
use crate::core::error::Result;
use crate::core::software::SoftwareRenderer;
use std::fmt;

/// A one-time, user-visible notice about a downgraded setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererNotice {
    MultisamplingUnsupported { requested: u32, used: u32 },
    PerSampleShadingUnsupported,
    TextureFilterUnsupported(TextureFilter),
    WireframeUnsupported,
    ResolutionScaleNotPowerOfTwo { requested: u32, used: u32 },
    BoxDownsampleScaleUnsupported {
        resolution_scale: u32,
        requested: u32,
        used: u32,
    },
}

impl fmt::Display for RendererNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultisamplingUnsupported { requested, used } => {
                write!(f, "{}x MSAA is not supported, using {}x instead", requested, used)
            }
            Self::PerSampleShadingUnsupported => {
                write!(f, "SSAA is not supported, using MSAA instead")
            }
            Self::TextureFilterUnsupported(filter) => {
                write!(f, "Texture filter {:?} is not supported by this device", filter)
            }
            Self::WireframeUnsupported => write!(
                f,
                "Geometry shaders are not supported, wireframe rendering is disabled"
            ),
            Self::ResolutionScaleNotPowerOfTwo { requested, used } => write!(
                f,
                "Resolution scale {}x not supported for adaptive downsampling, using {}x",
                requested, used
            ),
            Self::BoxDownsampleScaleUnsupported {
                resolution_scale,
                requested,
                used,
            } => write!(
                f,
                "Resolution scale {}x is not divisible by downsample scale {}x, using {}x instead",
                resolution_scale, requested, used
            ),
        }
    }
}

/// Largest resolution scale whose VRAM texture still fits on the device
pub fn max_resolution_scale(info: &DeviceInfo) -> u32 {
    (info.max_texture_size / VRAM_WIDTH).max(1)
}

/// Largest divisor of `resolution_scale` not above `requested`
pub fn box_downsample_scale(resolution_scale: u32, requested: u32) -> u32 {
    let limit = requested.clamp(1, resolution_scale.max(1));
    (1..=limit)
        .rev()
        .find(|candidate| resolution_scale % candidate == 0)
        .unwrap_or(1)
}

/// Settings after clamping to device capabilities
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedSettings {
    pub resolution_scale: u32,
    pub multisamples: u32,
    pub per_sample_shading: bool,
    pub true_color: bool,
    pub scaled_dithering: bool,
    pub texture_filtering: TextureFilter,
    pub clamp_uvs: bool,
    pub pgxp_enable: bool,
    pub pgxp_texture_correction: bool,
    pub pgxp_depth_buffer: bool,
    pub pgxp_depth_clear_threshold: f32,
    pub chroma_smoothing: bool,
    pub debanding: bool,
    pub disable_interlacing: bool,
    pub use_software_renderer: bool,
    pub wireframe_mode: WireframeMode,
    pub downsample_mode: DownsampleMode,
    /// Target scale of the box filter; only meaningful with `DownsampleMode::Box`
    pub box_downsample_scale: u32,
}

impl ResolvedSettings {
    /// Resolve `settings` against `info`, collecting downgrade notices
    pub fn resolve(settings: &RendererSettings, info: &DeviceInfo) -> (Self, Vec<RendererNotice>) {
        let features = info.features;
        let mut notices = Vec::new();

        let resolution_scale = Self::calculate_resolution_scale(settings, info, &mut notices);

        let multisamples = settings
            .multisamples
            .clamp(1, info.max_multisamples.max(1));
        if multisamples != settings.multisamples {
            notices.push(RendererNotice::MultisamplingUnsupported {
                requested: settings.multisamples,
                used: multisamples,
            });
        }

        let per_sample_shading = settings.per_sample_shading
            && features.contains(DeviceFeatures::PER_SAMPLE_SHADING);
        if settings.per_sample_shading && !per_sample_shading {
            notices.push(RendererNotice::PerSampleShadingUnsupported);
        }

        let mut texture_filtering = settings.texture_filter;
        if !features.intersects(DeviceFeatures::DUAL_SOURCE_BLEND | DeviceFeatures::FRAMEBUFFER_FETCH)
            && texture_filtering.is_blended()
        {
            notices.push(RendererNotice::TextureFilterUnsupported(texture_filtering));
            texture_filtering = TextureFilter::Nearest;
        }

        let mut wireframe_mode = settings.wireframe_mode;
        if wireframe_mode != WireframeMode::Disabled
            && !features.contains(DeviceFeatures::GEOMETRY_SHADERS)
        {
            notices.push(RendererNotice::WireframeUnsupported);
            wireframe_mode = WireframeMode::Disabled;
        }

        let mut downsample_mode = if resolution_scale == 1 {
            DownsampleMode::Disabled
        } else {
            settings.downsample_mode
        };
        let mut box_scale = 1;
        if downsample_mode == DownsampleMode::Box {
            box_scale = box_downsample_scale(resolution_scale, settings.downsample_scale);
            if box_scale != settings.downsample_scale || box_scale == resolution_scale {
                notices.push(RendererNotice::BoxDownsampleScaleUnsupported {
                    resolution_scale,
                    requested: settings.downsample_scale,
                    used: box_scale,
                });
            }
            if box_scale == resolution_scale {
                downsample_mode = DownsampleMode::Disabled;
                box_scale = 1;
            }
        }

        let resolved = Self {
            resolution_scale,
            multisamples,
            per_sample_shading,
            true_color: settings.true_color,
            scaled_dithering: settings.scaled_dithering,
            texture_filtering,
            clamp_uvs: settings.clamp_uvs(),
            pgxp_enable: settings.pgxp_enable,
            pgxp_texture_correction: settings.pgxp_texture_correction,
            pgxp_depth_buffer: settings.uses_pgxp_depth_buffer(),
            pgxp_depth_clear_threshold: settings.pgxp_depth_clear_threshold,
            chroma_smoothing: settings.chroma_smoothing_24bit,
            debanding: settings.debanding,
            disable_interlacing: settings.disable_interlacing,
            use_software_renderer: settings.use_software_renderer_for_readbacks,
            wireframe_mode,
            downsample_mode,
            box_downsample_scale: box_scale,
        };
        (resolved, notices)
    }

    fn calculate_resolution_scale(
        settings: &RendererSettings,
        info: &DeviceInfo,
        notices: &mut Vec<RendererNotice>,
    ) -> u32 {
        // Automatic scaling needs a host window size, which the core never sees.
        let scale = settings
            .resolution_scale
            .clamp(1, max_resolution_scale(info));

        if settings.downsample_mode == DownsampleMode::Adaptive && scale > 1 && !scale.is_power_of_two()
        {
            let new_scale = 1 << scale.ilog2();
            log::warn!(
                "Resolution scale {}x not supported for adaptive downsampling, using {}x",
                scale,
                new_scale
            );
            if settings.resolution_scale != 0 {
                notices.push(RendererNotice::ResolutionScaleNotPowerOfTwo {
                    requested: scale,
                    used: new_scale,
                });
            }
            return new_scale;
        }
        scale
    }

    pub fn is_using_multisampling(&self) -> bool {
        self.multisamples > 1
    }

    /// Mip levels generated by adaptive downsampling, down to native width
    pub fn adaptive_downsample_mip_levels(&self) -> u32 {
        let mut levels = 0;
        let mut current_width = VRAM_WIDTH * self.resolution_scale;
        while current_width >= VRAM_WIDTH {
            levels += 1;
            current_width /= 2;
        }
        levels
    }

    /// Whether a change from `self` to `other` needs new framebuffer textures
    pub fn framebuffer_changed(&self, other: &Self) -> bool {
        self.resolution_scale != other.resolution_scale
            || self.multisamples != other.multisamples
            || self.downsample_mode != other.downsample_mode
            || self.box_downsample_scale != other.box_downsample_scale
    }

    /// Whether a change from `self` to `other` needs a new pipeline cache
    pub fn shaders_changed(&self, other: &Self) -> bool {
        self.framebuffer_changed(other)
            || self.true_color != other.true_color
            || self.per_sample_shading != other.per_sample_shading
            || self.scaled_dithering != other.scaled_dithering
            || self.texture_filtering != other.texture_filtering
            || self.clamp_uvs != other.clamp_uvs
            || self.chroma_smoothing != other.chroma_smoothing
            || self.debanding != other.debanding
            || self.wireframe_mode != other.wireframe_mode
            || self.pgxp_depth_buffer != other.pgxp_depth_buffer
    }
}

impl<D: GpuDevice> HardwareRenderer<D> {
    pub(in crate::core::gpu) fn raise_notice(&mut self, notice: RendererNotice) {
        if self.raised_notices.insert(notice) {
            log::warn!("{}", notice);
            self.notices.push(notice);
        }
    }

    /// Drain notices raised since the last call
    pub fn take_notices(&mut self) -> Vec<RendererNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn resolved_settings(&self) -> &ResolvedSettings {
        &self.resolved
    }

    pub fn resolution_scale(&self) -> u32 {
        self.resolved.resolution_scale
    }

    /// Whether the display goes through a downsample pass
    pub fn is_using_downsampling(&self) -> bool {
        self.resolved.downsample_mode != DownsampleMode::Disabled && !self.display.is_24bit()
    }

    pub(in crate::core::gpu) fn print_settings_to_log(&self) {
        let scale = self.resolved.resolution_scale;
        log::info!(
            "Resolution Scale: {} ({}x{}), maximum {}",
            scale,
            VRAM_WIDTH * scale,
            VRAM_HEIGHT * scale,
            max_resolution_scale(&self.device.info())
        );
        log::info!(
            "Multisampling: {}x{}",
            self.resolved.multisamples,
            if self.resolved.per_sample_shading {
                " (per sample shading)"
            } else {
                ""
            }
        );
        log::info!(
            "Dithering: {}{}",
            if self.resolved.true_color {
                "Disabled"
            } else {
                "Enabled"
            },
            if !self.resolved.true_color && self.resolved.scaled_dithering {
                " (Scaled)"
            } else {
                ""
            }
        );
        log::info!("Texture Filtering: {:?}", self.resolved.texture_filtering);
        log::info!(
            "Dual-source blending: {}",
            if self.supports_dual_source_blend {
                "Supported"
            } else {
                "Not supported"
            }
        );
        log::info!("Clamping UVs: {}", self.resolved.clamp_uvs);
        log::info!("Depth buffer: {}", self.resolved.pgxp_depth_buffer);
        log::info!("Downsampling: {:?}", self.resolved.downsample_mode);
        log::info!("Wireframe rendering: {:?}", self.resolved.wireframe_mode);
        log::info!(
            "Using software renderer for readbacks: {}",
            self.sw_renderer.is_some()
        );
    }

    /// Apply new settings to a live renderer
    ///
    /// Framebuffer-affecting changes preserve VRAM contents through the CPU
    /// shadow. A pipeline or framebuffer rebuild failure is returned as an
    /// error and leaves the renderer unusable.
    pub fn update_settings(&mut self, settings: RendererSettings) -> Result<()> {
        let (resolved, notices) = ResolvedSettings::resolve(&settings, &self.device.info());
        let old = self.resolved;
        let framebuffer_changed = old.framebuffer_changed(&resolved);
        let shaders_changed = old.shaders_changed(&resolved);

        if old.resolution_scale != resolved.resolution_scale {
            log::info!(
                "Resolution scale set to {}x (VRAM {}x{})",
                resolved.resolution_scale,
                VRAM_WIDTH * resolved.resolution_scale,
                VRAM_HEIGHT * resolved.resolution_scale
            );
        }
        if old.multisamples != resolved.multisamples
            || old.per_sample_shading != resolved.per_sample_shading
        {
            log::info!(
                "Multisample anti-aliasing set to {}x{}",
                resolved.multisamples,
                if resolved.per_sample_shading {
                    " (SSAA)"
                } else {
                    ""
                }
            );
        }

        // Back up VRAM if the framebuffer is about to be recreated.
        if framebuffer_changed {
            self.flush_render();
            self.restore_device_context();
            self.read_vram(0, 0, VRAM_WIDTH, VRAM_HEIGHT)?;
            self.destroy_buffers();
        }

        self.settings = settings;
        self.resolved = resolved;
        self.compute_uv_range = resolved.clamp_uvs;
        for notice in notices {
            self.raise_notice(notice);
        }

        if old.pgxp_depth_buffer != resolved.pgxp_depth_buffer {
            self.batch.use_depth_buffer = false;
            if resolved.pgxp_depth_buffer && !framebuffer_changed {
                self.clear_depth_buffer();
            }
        }

        self.update_software_renderer(!framebuffer_changed)?;
        self.print_settings_to_log();

        if shaders_changed {
            self.destroy_pipelines();
            self.compile_pipelines()?;
        }

        if framebuffer_changed {
            self.framebuffer = Framebuffer::create(&mut self.device, &self.resolved)?;
            self.on_buffers_created();
            self.restore_device_context();
            let vram = self.vram_contents_unsynced();
            self.upload_vram(0, 0, VRAM_WIDTH, VRAM_HEIGHT, &vram, false, false)?;
            self.update_depth_buffer_from_mask_bit();
            self.update_display();
        }

        Ok(())
    }

    /// Start or stop the software readback renderer to match the settings
    ///
    /// The worker is seeded from the CPU shadow, refreshed from the device
    /// first when `copy_vram_from_hw` is set.
    pub(in crate::core::gpu) fn update_software_renderer(&mut self, copy_vram_from_hw: bool) -> Result<()> {
        let enabled = self.sw_renderer.is_some();
        let wanted = self.resolved.use_software_renderer;
        if enabled == wanted {
            return Ok(());
        }

        if !wanted {
            if let Some(sw) = self.sw_renderer.take() {
                // The shadow becomes authoritative again.
                sw.sync()?;
                sw.with_vram(|vram| self.vram_shadow.copy_from_slice(vram));
            }
            return Ok(());
        }

        if copy_vram_from_hw {
            self.flush_render();
            self.read_vram(0, 0, VRAM_WIDTH, VRAM_HEIGHT)?;
        }
        let sw = SoftwareRenderer::new()?;
        sw.load_vram(&self.vram_shadow)?;
        sw.set_drawing_area(self.drawing_area)?;
        self.sw_renderer = Some(sw);
        Ok(())
    }
}
