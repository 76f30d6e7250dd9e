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

//! Renderer configuration
//!
//! User-facing settings for the hardware renderer, loaded from and saved to
//! TOML. The renderer resolves these against device capabilities (see
//! `gpu::settings`), so values here are requests, not guarantees.
//!
//! # Example
//!
//! ```
//! use psrx_hw::core::config::{DownsampleMode, RendererSettings};
//!
//! let settings: RendererSettings = toml::from_str(
//!     r#"
//!     resolution_scale = 4
//!     downsample_mode = "Adaptive"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(settings.resolution_scale, 4);
//! assert_eq!(settings.downsample_mode, DownsampleMode::Adaptive);
//! assert_eq!(settings.multisamples, 1);
//! ```

use crate::core::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Texture filtering applied when sampling textured primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureFilter {
    #[default]
    Nearest,
    Bilinear,
    BilinearBinAlpha,
    Jinc2,
    Jinc2BinAlpha,
    Xbr,
    XbrBinAlpha,
}

impl TextureFilter {
    /// Whether the filter produces partially transparent texels at edges
    ///
    /// Blended filters need either dual-source blending or framebuffer
    /// fetch to combine with semi-transparency.
    pub fn is_blended(self) -> bool {
        matches!(self, Self::Bilinear | Self::Jinc2 | Self::Xbr)
    }
}

/// Downsampling applied to the upscaled framebuffer before display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DownsampleMode {
    #[default]
    Disabled,
    Box,
    Adaptive,
}

/// Wireframe debug rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WireframeMode {
    #[default]
    Disabled,
    OverlayWireframe,
    OnlyWireframe,
}

/// Hardware renderer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Internal resolution multiplier (0 = automatic)
    pub resolution_scale: u32,
    /// MSAA sample count
    pub multisamples: u32,
    /// Shade every sample instead of every pixel when multisampling
    pub per_sample_shading: bool,
    /// Skip 16-bit color quantization
    pub true_color: bool,
    /// Apply dithering at internal resolution instead of native
    pub scaled_dithering: bool,
    pub texture_filter: TextureFilter,
    pub downsample_mode: DownsampleMode,
    /// Target factor for box downsampling
    pub downsample_scale: u32,
    pub wireframe_mode: WireframeMode,
    pub pgxp_enable: bool,
    pub pgxp_texture_correction: bool,
    pub pgxp_depth_buffer: bool,
    /// Average depth jump that triggers a depth buffer clear
    pub pgxp_depth_clear_threshold: f32,
    /// Mirror every command into the software renderer for exact readbacks
    pub use_software_renderer_for_readbacks: bool,
    pub chroma_smoothing_24bit: bool,
    /// Render both fields every frame instead of the displayed one
    pub disable_interlacing: bool,
    pub debanding: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            resolution_scale: 1,
            multisamples: 1,
            per_sample_shading: false,
            true_color: true,
            scaled_dithering: true,
            texture_filter: TextureFilter::Nearest,
            downsample_mode: DownsampleMode::Disabled,
            downsample_scale: 1,
            wireframe_mode: WireframeMode::Disabled,
            pgxp_enable: false,
            pgxp_texture_correction: true,
            pgxp_depth_buffer: false,
            pgxp_depth_clear_threshold: 300.0 / 4096.0,
            use_software_renderer_for_readbacks: false,
            chroma_smoothing_24bit: false,
            disable_interlacing: true,
            debanding: false,
        }
    }
}

impl RendererSettings {
    /// Load settings from a TOML file
    ///
    /// Missing keys take their default values.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Save settings to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Whether primitives need per-vertex UV limits
    ///
    /// Sub-pixel vertex positions and filtering can both sample outside the
    /// texels a primitive addresses at native resolution.
    pub fn clamp_uvs(&self) -> bool {
        self.pgxp_enable || self.texture_filter != TextureFilter::Nearest
    }

    /// Whether PGXP depth ordering replaces synthetic depth
    pub fn uses_pgxp_depth_buffer(&self) -> bool {
        self.pgxp_enable && self.pgxp_depth_buffer
    }
}
