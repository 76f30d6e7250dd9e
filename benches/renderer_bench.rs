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

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use psrx_hw::core::config::RendererSettings;
use psrx_hw::core::device::HeadlessDevice;
use psrx_hw::core::gpu::{
    DrawModeReg, DrawingArea, HardwareRenderer, PaletteReg, RenderCommand, TextureWindow, VRAM_SIZE,
};
use psrx_hw::core::software::{DrawParams, Rasterizer, SoftwareVertex};
use std::hint::black_box;

fn renderer(scale: u32) -> HardwareRenderer<HeadlessDevice> {
    let settings = RendererSettings {
        resolution_scale: scale,
        ..Default::default()
    };
    let mut renderer = HardwareRenderer::new(HeadlessDevice::default(), settings).unwrap();
    // Drawing area covering all of VRAM
    renderer.write_gp0(0xE300_0000);
    renderer.write_gp0(0xE407_FFFF);
    renderer
}

fn batch_assembly_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_assembly");

    group.bench_function("flat_triangles", |b| {
        let mut renderer = renderer(1);
        b.iter(|| {
            for i in 0..256u32 {
                renderer.write_gp0(0x2000_00FF | (i << 8));
                renderer.write_gp0(0x0000_0000);
                renderer.write_gp0(0x0000_0040);
                renderer.write_gp0(0x0040_0000);
            }
            renderer.flush_render();
            black_box(renderer.stats().num_batches);
        });
    });

    group.bench_function("textured_quads", |b| {
        let mut renderer = renderer(1);
        b.iter(|| {
            for _ in 0..256 {
                renderer.write_gp0(0x2C80_8080);
                renderer.write_gp0(0x0000_0000);
                renderer.write_gp0(0x7FC0_0000);
                renderer.write_gp0(0x0000_0020);
                renderer.write_gp0(0x0105_0020);
                renderer.write_gp0(0x0020_0000);
                renderer.write_gp0(0x0000_2000);
                renderer.write_gp0(0x0020_0020);
                renderer.write_gp0(0x0000_2020);
            }
            renderer.flush_render();
            black_box(renderer.pending_vertex_count());
        });
    });

    for size in [16u32, 256, 1000] {
        group.bench_with_input(BenchmarkId::new("textured_rectangle", size), &size, |b, &size| {
            let mut renderer = renderer(1);
            b.iter(|| {
                renderer.write_gp0(0x6480_8080);
                renderer.write_gp0(0x0000_0000);
                renderer.write_gp0(0x7FC0_0000);
                renderer.write_gp0((size.min(511) << 16) | size);
                renderer.flush_render();
            });
        });
    }

    group.finish();
}

fn transfer_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("vram_transfer");

    for scale in [1u32, 4] {
        group.bench_with_input(BenchmarkId::new("fill_read", scale), &scale, |b, &scale| {
            let mut renderer = renderer(scale);
            b.iter(|| {
                renderer.fill_vram(0, 0, 256, 256, 0x0000_FF00);
                renderer.read_vram(0, 0, 256, 256).unwrap();
            });
        });
    }

    group.finish();
}

fn software_rasterizer_benchmark(c: &mut Criterion) {
    let mut rasterizer = Rasterizer::new();
    rasterizer.set_drawing_area(DrawingArea {
        left: 0,
        top: 0,
        right: 1023,
        bottom: 511,
    });
    let params = DrawParams {
        rc: RenderCommand(0x3000_0000),
        draw_mode: DrawModeReg(0),
        palette: PaletteReg(0),
        texture_window: TextureWindow::default(),
        dithering: true,
        set_mask: false,
        check_mask: false,
        skip_field: None,
    };
    let vertices = [
        SoftwareVertex { x: 0, y: 0, color: 0x0000FF, texcoord: 0 },
        SoftwareVertex { x: 255, y: 0, color: 0x00FF00, texcoord: 0 },
        SoftwareVertex { x: 0, y: 255, color: 0xFF0000, texcoord: 0 },
    ];

    c.bench_function("software_gouraud_triangle", |b| {
        let mut vram = vec![0u16; VRAM_SIZE];
        b.iter(|| {
            rasterizer.draw_polygon(&mut vram, &params, black_box(&vertices));
        });
    });
}

criterion_group!(
    benches,
    batch_assembly_benchmark,
    transfer_benchmark,
    software_rasterizer_benchmark
);
criterion_main!(benches);
