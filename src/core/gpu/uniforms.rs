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

//! Shader uniform layouts
//!
//! Byte layouts shared between the renderer and device backends. Every
//! struct is uploaded verbatim with `bytemuck`.

use bytemuck::{Pod, Zeroable};

/// Per-batch uniform buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct BatchUboData {
    pub texture_window_and: [u32; 2],
    pub texture_window_or: [u32; 2],
    pub src_alpha_factor: f32,
    pub dst_alpha_factor: f32,
    pub interlaced_displayed_field: u32,
    pub set_mask_while_drawing: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct VramFillUniforms {
    pub dst_x: u32,
    pub dst_y: u32,
    pub end_x: u32,
    pub end_y: u32,
    pub fill_color: [f32; 4],
    pub interlaced_displayed_field: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct VramWriteUniforms {
    pub dst_x: u32,
    pub dst_y: u32,
    pub end_x: u32,
    pub end_y: u32,
    pub width: u32,
    pub height: u32,
    pub buffer_base_offset: u32,
    pub mask_or_bits: u32,
    pub depth_value: f32,
}

/// Copy uniforms, all in internal-resolution texels
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct VramCopyUniforms {
    pub src_x: u32,
    pub src_y: u32,
    pub dst_x: u32,
    pub dst_y: u32,
    pub end_x: u32,
    pub end_y: u32,
    pub width: u32,
    pub height: u32,
    pub set_mask_bit: u32,
    pub depth_value: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct VramReadbackUniforms {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct DisplayUniforms {
    pub vram_offset_x: u32,
    pub vram_offset_y: u32,
    pub crop_left: u32,
    pub field_offset: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct AdaptiveDownsampleUniforms {
    pub min_uv: [f32; 2],
    pub max_uv: [f32; 2],
    pub rcp_resolution: [f32; 2],
    pub lod: f32,
}

/// Convert packed RGBA8 to the float vector shaders consume
pub fn rgba8_to_float(color: u32) -> [f32; 4] {
    [
        (color & 0xFF) as f32 / 255.0,
        ((color >> 8) & 0xFF) as f32 / 255.0,
        ((color >> 16) & 0xFF) as f32 / 255.0,
        ((color >> 24) & 0xFF) as f32 / 255.0,
    ]
}

/// Inverse of [`rgba8_to_float`]
pub fn float_to_rgba8(color: [f32; 4]) -> u32 {
    color
        .iter()
        .enumerate()
        .fold(0, |acc, (i, c)| {
            acc | (((c.clamp(0.0, 1.0) * 255.0).round() as u32) << (i * 8))
        })
}
