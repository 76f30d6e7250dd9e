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

//! Pipeline permutation cache
//!
//! Every batch pipeline is compiled up front, indexed by
//! `[depth test][render mode][texture mode][transparency][dithering][interlacing]`,
//! alongside the fixed set of full-screen passes (VRAM fill/copy/write,
//! depth-from-mask, readback, display, downsampling).
//!
//! Entries are never replaced individually. A settings change that affects
//! shader generation tears the whole cache down before building a new one,
//! and a failed build leaves the cache empty.

use super::types::{
    BatchDepthTest, BatchRenderMode, BatchVertex, InterlacedRenderMode, TextureMode,
    TransparencyMode,
};
use super::HardwareRenderer;
use crate::core::config::{DownsampleMode, WireframeMode};
use crate::core::device::{
    AttributeSemantic, AttributeType, BatchShaderKey, BlendFunc, BlendOp, BlendState, DepthFunc,
    DepthState, GpuDevice, PipelineConfig, PipelineHandle, PipelineLayout, PrimitiveTopology,
    SamplerConfig, SamplerHandle, ShaderKey, TextureFormat, VertexAttribute,
};
use crate::core::error::{RendererError, Result};
use std::mem::offset_of;

const BATCH_PIPELINE_COUNT: usize = BatchDepthTest::COUNT
    * BatchRenderMode::COUNT
    * TextureMode::COUNT
    * TransparencyMode::COUNT
    * 2
    * 2;

/// Position + color
const NUM_BATCH_VERTEX_ATTRIBUTES: usize = 2;
/// ... + texcoord + texpage
const NUM_BATCH_TEXTURED_VERTEX_ATTRIBUTES: usize = 4;
/// ... + UV limits
const NUM_BATCH_TEXTURED_LIMITS_VERTEX_ATTRIBUTES: usize = 5;

fn batch_vertex_attributes() -> [VertexAttribute; 5] {
    let attr = |index, semantic, semantic_index, kind, components, offset: usize| VertexAttribute {
        index,
        semantic,
        semantic_index,
        kind,
        components,
        offset: offset as u32,
    };
    [
        attr(0, AttributeSemantic::Position, 0, AttributeType::Float, 4, offset_of!(BatchVertex, x)),
        attr(1, AttributeSemantic::Color, 0, AttributeType::UNorm8, 4, offset_of!(BatchVertex, color)),
        attr(2, AttributeSemantic::TexCoord, 0, AttributeType::UInt32, 1, offset_of!(BatchVertex, u)),
        attr(3, AttributeSemantic::TexCoord, 1, AttributeType::UInt32, 1, offset_of!(BatchVertex, texpage)),
        attr(4, AttributeSemantic::TexCoord, 2, AttributeType::UNorm8, 4, offset_of!(BatchVertex, uv_limits)),
    ]
}

fn batch_index(
    depth_test: BatchDepthTest,
    render_mode: BatchRenderMode,
    texture_mode: TextureMode,
    transparency: TransparencyMode,
    dithering: bool,
    interlacing: bool,
) -> usize {
    let mut index = depth_test.index();
    index = index * BatchRenderMode::COUNT + render_mode.index();
    index = index * TextureMode::COUNT + texture_mode.index();
    index = index * TransparencyMode::COUNT + transparency.index();
    index = index * 2 + dithering as usize;
    index * 2 + interlacing as usize
}

/// Compiled pipelines and the samplers that belong to them
pub struct PipelineCache {
    batch: Vec<Option<PipelineHandle>>,
    pub(in crate::core::gpu) wireframe: Option<PipelineHandle>,
    /// `[wrapped][interlaced]`
    pub(in crate::core::gpu) vram_fill: [[Option<PipelineHandle>; 2]; 2],
    /// `[depth test]`
    pub(in crate::core::gpu) vram_copy: [Option<PipelineHandle>; 2],
    /// `[depth test]`
    pub(in crate::core::gpu) vram_write: [Option<PipelineHandle>; 2],
    pub(in crate::core::gpu) vram_update_depth: Option<PipelineHandle>,
    pub(in crate::core::gpu) vram_readback: Option<PipelineHandle>,
    /// `[24-bit][interlace mode]`
    pub(in crate::core::gpu) display: [[Option<PipelineHandle>; InterlacedRenderMode::COUNT]; 2],
    pub(in crate::core::gpu) copy: Option<PipelineHandle>,
    pub(in crate::core::gpu) downsample_first_pass: Option<PipelineHandle>,
    pub(in crate::core::gpu) downsample_mid_pass: Option<PipelineHandle>,
    pub(in crate::core::gpu) downsample_blur_pass: Option<PipelineHandle>,
    pub(in crate::core::gpu) downsample_composite_pass: Option<PipelineHandle>,
    pub(in crate::core::gpu) downsample_lod_sampler: Option<SamplerHandle>,
    pub(in crate::core::gpu) downsample_composite_sampler: Option<SamplerHandle>,
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self {
            batch: vec![None; BATCH_PIPELINE_COUNT],
            wireframe: None,
            vram_fill: [[None; 2]; 2],
            vram_copy: [None; 2],
            vram_write: [None; 2],
            vram_update_depth: None,
            vram_readback: None,
            display: [[None; InterlacedRenderMode::COUNT]; 2],
            copy: None,
            downsample_first_pass: None,
            downsample_mid_pass: None,
            downsample_blur_pass: None,
            downsample_composite_pass: None,
            downsample_lod_sampler: None,
            downsample_composite_sampler: None,
        }
    }
}

impl PipelineCache {
    pub fn batch(
        &self,
        depth_test: BatchDepthTest,
        render_mode: BatchRenderMode,
        texture_mode: TextureMode,
        transparency: TransparencyMode,
        dithering: bool,
        interlacing: bool,
    ) -> Option<PipelineHandle> {
        self.batch[batch_index(
            depth_test,
            render_mode,
            texture_mode,
            transparency,
            dithering,
            interlacing,
        )]
    }

    /// Number of compiled pipelines, batch and otherwise
    pub fn len(&self) -> usize {
        self.pipelines().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pipelines(&self) -> impl Iterator<Item = PipelineHandle> + '_ {
        self.batch
            .iter()
            .chain(std::iter::once(&self.wireframe))
            .chain(self.vram_fill.iter().flatten())
            .chain(self.vram_copy.iter())
            .chain(self.vram_write.iter())
            .chain(std::iter::once(&self.vram_update_depth))
            .chain(std::iter::once(&self.vram_readback))
            .chain(self.display.iter().flatten())
            .chain(std::iter::once(&self.copy))
            .chain(std::iter::once(&self.downsample_first_pass))
            .chain(std::iter::once(&self.downsample_mid_pass))
            .chain(std::iter::once(&self.downsample_blur_pass))
            .chain(std::iter::once(&self.downsample_composite_pass))
            .flatten()
            .copied()
    }

    /// Release every pipeline and sampler, leaving an empty cache
    pub fn destroy<D: GpuDevice>(&mut self, device: &mut D) {
        for pipeline in self.pipelines().collect::<Vec<_>>() {
            device.destroy_pipeline(pipeline);
        }
        for sampler in [
            self.downsample_lod_sampler,
            self.downsample_composite_sampler,
        ]
        .into_iter()
        .flatten()
        {
            device.destroy_sampler(sampler);
        }
        *self = Self::default();
    }
}

fn compile(
    device: &mut impl GpuDevice,
    name: &str,
    config: &PipelineConfig,
) -> Result<PipelineHandle> {
    device
        .create_pipeline(config)
        .map_err(|source| RendererError::PipelineCompilation {
            name: name.to_string(),
            source,
        })
}

impl<D: GpuDevice> HardwareRenderer<D> {
    /// Whether a transparency mode must be blended in the fragment shader
    pub(in crate::core::gpu) fn needs_shader_blending(&self, transparency: TransparencyMode) -> bool {
        self.supports_framebuffer_fetch
            && (transparency == TransparencyMode::BackgroundMinusForeground
                || (!self.supports_dual_source_blend
                    && (transparency != TransparencyMode::Disabled
                        || self.resolved.texture_filtering.is_blended())))
    }

    /// Whether the current batch draws opaque and transparent pixels separately
    ///
    /// Textured primitives can mix opaque and semi-transparent texels, and
    /// without per-pixel blend control those need different blend states.
    pub(in crate::core::gpu) fn needs_two_pass_rendering(&self) -> bool {
        self.batch.texture_mode != TextureMode::Disabled
            && !self.supports_framebuffer_fetch
            && (self.batch.transparency_mode == TransparencyMode::BackgroundMinusForeground
                || (!self.supports_dual_source_blend
                    && self.batch.transparency_mode != TransparencyMode::Disabled))
    }

    fn batch_shader_key(
        &self,
        render_mode: BatchRenderMode,
        texture_mode: TextureMode,
        transparency: TransparencyMode,
        dithering: bool,
        interlacing: bool,
    ) -> BatchShaderKey {
        BatchShaderKey {
            render_mode,
            texture_mode,
            transparency,
            dithering,
            interlacing,
            texture_filter: self.resolved.texture_filtering,
            resolution_scale: self.resolved.resolution_scale,
            multisamples: self.resolved.multisamples,
            per_sample_shading: self.resolved.per_sample_shading,
            true_color: self.resolved.true_color,
            scaled_dithering: self.resolved.scaled_dithering,
            uv_limits: self.resolved.clamp_uvs,
            write_mask_as_depth: !self.resolved.pgxp_depth_buffer,
            debanding: self.resolved.debanding,
        }
    }

    fn batch_blend_state(
        &self,
        render_mode: BatchRenderMode,
        transparency: TransparencyMode,
        textured: bool,
        use_shader_blending: bool,
    ) -> BlendState {
        let mut blend = BlendState::no_blending();
        let blends_transparency = transparency != TransparencyMode::Disabled
            && render_mode != BatchRenderMode::TransparencyDisabled
            && render_mode != BatchRenderMode::OnlyOpaque;
        if use_shader_blending
            || !(blends_transparency || (textured && self.resolved.texture_filtering.is_blended()))
        {
            return blend;
        }

        blend.enable = true;
        blend.src_alpha_blend = BlendFunc::One;
        blend.dst_alpha_blend = BlendFunc::Zero;
        blend.alpha_blend_op = BlendOp::Add;
        blend.src_blend = BlendFunc::One;
        if self.supports_dual_source_blend {
            blend.dst_blend = BlendFunc::SrcAlpha1;
        } else {
            blend.dst_blend = BlendFunc::One;
            if transparency == TransparencyMode::HalfBackgroundPlusHalfForeground {
                blend.dst_blend = BlendFunc::ConstantColor;
                blend.dst_alpha_blend = BlendFunc::ConstantColor;
                blend.constant = 0x0080_8080;
            }
        }
        blend.blend_op = if blends_transparency
            && transparency == TransparencyMode::BackgroundMinusForeground
        {
            BlendOp::ReverseSubtract
        } else {
            BlendOp::Add
        };
        blend
    }

    /// Build every pipeline for the current settings
    ///
    /// On failure the partially built cache is released and the error is
    /// returned; callers treat it as fatal.
    pub(in crate::core::gpu) fn compile_pipelines(&mut self) -> Result<()> {
        let mut cache = PipelineCache::default();
        match self.build_pipeline_cache(&mut cache) {
            Ok(()) => {
                log::info!("Compiled {} pipelines", cache.len());
                self.pipelines = cache;
                Ok(())
            }
            Err(e) => {
                cache.destroy(&mut self.device);
                Err(e)
            }
        }
    }

    pub(in crate::core::gpu) fn destroy_pipelines(&mut self) {
        self.pipelines.destroy(&mut self.device);
    }

    fn build_pipeline_cache(&mut self, cache: &mut PipelineCache) -> Result<()> {
        let attributes = batch_vertex_attributes();
        let mut plconfig = PipelineConfig {
            layout: PipelineLayout::SingleTextureAndUbo,
            topology: PrimitiveTopology::Triangles,
            vertex_attributes: Vec::new(),
            vertex_stride: std::mem::size_of::<BatchVertex>() as u32,
            depth: DepthState::disabled(),
            blend: BlendState::no_blending(),
            vertex_shader: ShaderKey::BatchVertex {
                textured: false,
                uv_limits: false,
            },
            geometry_shader: None,
            fragment_shader: ShaderKey::Copy,
            color_format: Some(TextureFormat::Rgba8),
            depth_format: Some(TextureFormat::D16),
            samples: self.resolved.multisamples,
            per_sample_shading: self.resolved.per_sample_shading,
        };

        for depth_test in BatchDepthTest::ALL {
            for render_mode in BatchRenderMode::ALL {
                // Framebuffer fetch blends in one pass, so the split modes never run.
                if self.supports_framebuffer_fetch
                    && render_mode != BatchRenderMode::TransparencyDisabled
                    && render_mode != BatchRenderMode::TransparentAndOpaque
                {
                    continue;
                }

                for texture_mode in TextureMode::ALL {
                    for transparency in TransparencyMode::ALL {
                        for dithering in [false, true] {
                            for interlacing in [false, true] {
                                let textured = texture_mode != TextureMode::Disabled;
                                let use_shader_blending =
                                    textured && self.needs_shader_blending(transparency);
                                let num_attributes = match (textured, self.resolved.clamp_uvs) {
                                    (false, _) => NUM_BATCH_VERTEX_ATTRIBUTES,
                                    (true, false) => NUM_BATCH_TEXTURED_VERTEX_ATTRIBUTES,
                                    (true, true) => NUM_BATCH_TEXTURED_LIMITS_VERTEX_ATTRIBUTES,
                                };
                                plconfig.vertex_attributes = attributes[..num_attributes].to_vec();
                                plconfig.vertex_shader = ShaderKey::BatchVertex {
                                    textured,
                                    uv_limits: textured && self.resolved.clamp_uvs,
                                };
                                plconfig.fragment_shader =
                                    ShaderKey::BatchFragment(self.batch_shader_key(
                                        render_mode,
                                        texture_mode,
                                        if use_shader_blending {
                                            transparency
                                        } else {
                                            TransparencyMode::Disabled
                                        },
                                        dithering,
                                        interlacing,
                                    ));
                                plconfig.depth = DepthState {
                                    func: match depth_test {
                                        BatchDepthTest::Always => DepthFunc::Always,
                                        BatchDepthTest::GreaterEqual => DepthFunc::GreaterEqual,
                                        BatchDepthTest::LessEqual => DepthFunc::LessEqual,
                                    },
                                    write: !self.resolved.pgxp_depth_buffer
                                        || depth_test != BatchDepthTest::Always,
                                };
                                plconfig.blend = self.batch_blend_state(
                                    render_mode,
                                    transparency,
                                    textured,
                                    use_shader_blending,
                                );

                                cache.batch[batch_index(
                                    depth_test,
                                    render_mode,
                                    texture_mode,
                                    transparency,
                                    dithering,
                                    interlacing,
                                )] = Some(compile(&mut self.device, "batch", &plconfig)?);
                            }
                        }
                    }
                }
            }
        }

        if self.resolved.wireframe_mode != WireframeMode::Disabled {
            plconfig.vertex_attributes = attributes[..NUM_BATCH_VERTEX_ATTRIBUTES].to_vec();
            plconfig.vertex_shader = ShaderKey::BatchVertex {
                textured: false,
                uv_limits: false,
            };
            plconfig.geometry_shader = Some(ShaderKey::WireframeGeometry);
            plconfig.fragment_shader = ShaderKey::WireframeFragment;
            plconfig.blend = if self.resolved.wireframe_mode == WireframeMode::OverlayWireframe {
                BlendState::alpha_blending()
            } else {
                BlendState::no_blending()
            }
            .with_write_mask(0x7);
            plconfig.depth = DepthState::disabled();
            cache.wireframe = Some(compile(&mut self.device, "wireframe", &plconfig)?);
            plconfig.geometry_shader = None;
        }

        // Full-screen passes.
        let scale = self.resolved.resolution_scale;
        plconfig.vertex_attributes = Vec::new();
        plconfig.vertex_stride = 0;
        plconfig.layout = PipelineLayout::SingleTextureAndPushConstants;
        plconfig.per_sample_shading = false;
        plconfig.blend = BlendState::no_blending();
        plconfig.vertex_shader = ShaderKey::ScreenQuadVertex;

        for wrapped in [false, true] {
            for interlaced in [false, true] {
                plconfig.fragment_shader = ShaderKey::VramFill {
                    wrapped,
                    interlaced,
                    resolution_scale: scale,
                };
                plconfig.depth = DepthState::always_write();
                cache.vram_fill[wrapped as usize][interlaced as usize] =
                    Some(compile(&mut self.device, "VRAM fill", &plconfig)?);
            }
        }

        plconfig.fragment_shader = ShaderKey::VramCopy;
        for depth_test in 0..2 {
            plconfig.depth = DepthState {
                func: if depth_test != 0 {
                    DepthFunc::GreaterEqual
                } else {
                    DepthFunc::Always
                },
                write: true,
            };
            cache.vram_copy[depth_test] = Some(compile(&mut self.device, "VRAM copy", &plconfig)?);
        }

        plconfig.layout = PipelineLayout::SingleTextureBufferAndPushConstants;
        plconfig.fragment_shader = ShaderKey::VramWrite {
            resolution_scale: scale,
        };
        for depth_test in 0..2 {
            plconfig.depth = DepthState {
                func: if depth_test != 0 {
                    DepthFunc::GreaterEqual
                } else {
                    DepthFunc::Always
                },
                write: true,
            };
            cache.vram_write[depth_test] =
                Some(compile(&mut self.device, "VRAM write", &plconfig)?);
        }

        plconfig.layout = PipelineLayout::SingleTextureAndPushConstants;
        plconfig.fragment_shader = ShaderKey::VramUpdateDepth;
        plconfig.color_format = None;
        plconfig.depth_format = Some(TextureFormat::D16);
        plconfig.depth = DepthState::always_write();
        plconfig.blend = BlendState::no_blending().with_write_mask(0);
        cache.vram_update_depth = Some(compile(&mut self.device, "VRAM update depth", &plconfig)?);

        plconfig.color_format = Some(TextureFormat::Rgba8);
        plconfig.depth_format = None;
        plconfig.depth = DepthState::disabled();
        plconfig.blend = BlendState::no_blending();
        plconfig.samples = 1;
        plconfig.per_sample_shading = false;

        plconfig.fragment_shader = ShaderKey::VramReadback {
            resolution_scale: scale,
        };
        cache.vram_readback = Some(compile(&mut self.device, "VRAM readback", &plconfig)?);

        for depth_24bit in [false, true] {
            for interlace in [
                InterlacedRenderMode::None,
                InterlacedRenderMode::InterleavedFields,
                InterlacedRenderMode::SeparateFields,
            ] {
                plconfig.fragment_shader = ShaderKey::Display {
                    depth_24bit,
                    interlace,
                    chroma_smoothing: self.resolved.chroma_smoothing,
                };
                cache.display[depth_24bit as usize][interlace.index()] =
                    Some(compile(&mut self.device, "display", &plconfig)?);
            }
        }

        plconfig.fragment_shader = ShaderKey::Copy;
        cache.copy = Some(compile(&mut self.device, "copy", &plconfig)?);

        match self.resolved.downsample_mode {
            DownsampleMode::Adaptive => {
                plconfig.vertex_shader = ShaderKey::AdaptiveDownsampleVertex;
                plconfig.fragment_shader = ShaderKey::AdaptiveDownsampleMip { first_pass: true };
                cache.downsample_first_pass =
                    Some(compile(&mut self.device, "downsample first pass", &plconfig)?);

                plconfig.fragment_shader = ShaderKey::AdaptiveDownsampleMip { first_pass: false };
                cache.downsample_mid_pass =
                    Some(compile(&mut self.device, "downsample mid pass", &plconfig)?);

                plconfig.fragment_shader = ShaderKey::AdaptiveDownsampleBlur;
                plconfig.color_format = Some(TextureFormat::R8);
                cache.downsample_blur_pass =
                    Some(compile(&mut self.device, "downsample blur pass", &plconfig)?);

                plconfig.layout = PipelineLayout::MultiTextureAndPushConstants;
                plconfig.fragment_shader = ShaderKey::AdaptiveDownsampleComposite;
                plconfig.color_format = Some(TextureFormat::Rgba8);
                cache.downsample_composite_pass =
                    Some(compile(&mut self.device, "downsample composite pass", &plconfig)?);

                let mut sampler = SamplerConfig::linear();
                sampler.min_lod = 0.0;
                sampler.max_lod = f32::MAX;
                cache.downsample_lod_sampler = Some(
                    self.device
                        .create_sampler(&sampler)
                        .map_err(|source| RendererError::ResourceCreation {
                            what: "downsample LOD sampler",
                            source,
                        })?,
                );
                sampler.mip_filter = crate::core::device::Filter::Linear;
                cache.downsample_composite_sampler = Some(
                    self.device
                        .create_sampler(&sampler)
                        .map_err(|source| RendererError::ResourceCreation {
                            what: "downsample composite sampler",
                            source,
                        })?,
                );
            }
            DownsampleMode::Box => {
                plconfig.fragment_shader = ShaderKey::BoxDownsample {
                    factor: self.resolved.resolution_scale / self.resolved.box_downsample_scale,
                };
                cache.downsample_first_pass =
                    Some(compile(&mut self.device, "box downsample", &plconfig)?);
            }
            DownsampleMode::Disabled => {}
        }

        Ok(())
    }
}
