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

//! Headless renderer driver
//!
//! Replays a recorded GPU command stream through the hardware renderer on the
//! in-memory reference device and reports what it did. The stream is a text
//! file with one command per line:
//!
//! ```text
//! # comment
//! gp0 02FF0000     fill command word
//! gp1 08000001     display mode
//! vsync            present the display and flip the interlaced field
//! ```

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use log::{error, info, warn};
use psrx_hw::core::config::RendererSettings;
use psrx_hw::core::device::HeadlessDevice;
use psrx_hw::core::gpu::{HardwareRenderer, RendererStats};
use serde::Serialize;

/// Hardware PlayStation GPU renderer, headless driver
#[derive(Parser)]
#[command(name = "psrx-hw")]
#[command(about = "Replay a PlayStation GPU command stream", long_about = None)]
struct Args {
    /// Command stream to replay
    stream: PathBuf,

    /// Renderer settings (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Override the internal resolution scale
    #[arg(short = 's', long)]
    scale: Option<u32>,

    /// Write a VRAM snapshot here once the stream is done
    #[arg(short = 'd', long)]
    dump_vram: Option<PathBuf>,

    /// Write the effective settings here
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Write a JSON replay report here
    #[arg(long)]
    stats: Option<PathBuf>,
}

/// Summary of a replay, written with `--stats`
#[derive(Debug, Serialize)]
struct ReplayReport {
    commands: usize,
    frames: u32,
    gpu_ticks: u32,
    resolution_scale: u32,
    stats: RendererStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamCommand {
    Gp0(u32),
    Gp1(u32),
    VSync,
}

fn parse_word(word: Option<&str>, line: usize) -> Result<u32, String> {
    let word = word.ok_or_else(|| format!("line {}: missing command word", line))?;
    let digits = word.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| format!("line {}: bad word '{}': {}", line, word, e))
}

fn parse_stream(text: &str) -> Result<Vec<StreamCommand>, String> {
    let mut commands = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let command = match fields.next().map(str::to_ascii_lowercase).as_deref() {
            Some("gp0") => StreamCommand::Gp0(parse_word(fields.next(), line_no)?),
            Some("gp1") => StreamCommand::Gp1(parse_word(fields.next(), line_no)?),
            Some("vsync") => StreamCommand::VSync,
            Some(other) => return Err(format!("line {}: unknown command '{}'", line_no, other)),
            None => continue,
        };
        commands.push(command);
    }
    Ok(commands)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("psrx-hw v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => {
            info!("Loading settings from: {}", path.display());
            RendererSettings::load_from_file(path)?
        }
        None => RendererSettings::default(),
    };
    if let Some(scale) = args.scale {
        settings.resolution_scale = scale;
    }
    if let Some(path) = &args.save_config {
        settings.save_to_file(path)?;
        info!("Settings written to {}", path.display());
    }

    let text = fs::read_to_string(&args.stream)?;
    let stream = parse_stream(&text)?;
    let num_commands = stream.len();
    info!("Replaying {} commands from {}", num_commands, args.stream.display());

    let mut renderer = HardwareRenderer::new(HeadlessDevice::default(), settings).map_err(|e| {
        error!("Failed to create renderer: {}", e);
        e
    })?;
    for notice in renderer.take_notices() {
        warn!("{}", notice);
    }

    let mut frames = 0u32;
    let mut odd_field = false;
    for command in stream {
        match command {
            StreamCommand::Gp0(word) => renderer.write_gp0(word),
            StreamCommand::Gp1(word) => renderer.write_gp1(word),
            StreamCommand::VSync => {
                renderer.update_display();
                odd_field = !odd_field;
                renderer.set_interlaced_field(odd_field);
                frames += 1;
            }
        }
    }
    renderer.flush_render();

    let stats = renderer.stats();
    let gpu_ticks = renderer.take_pending_ticks();
    info!("Frames presented: {}", frames);
    info!("Batches drawn: {}", stats.num_batches);
    info!("VRAM read texture updates: {}", stats.num_vram_read_texture_updates);
    info!("Uniform buffer updates: {}", stats.num_uniform_buffer_updates);
    info!("GPU ticks: {}", gpu_ticks);
    if let Some(frame) = renderer.presented_frame() {
        info!(
            "Last frame: {}x{} at ({}, {})",
            frame.width, frame.height, frame.x, frame.y
        );
    }

    if let Some(path) = &args.dump_vram {
        renderer.capture_state()?.save_to_file(path)?;
    }

    if let Some(path) = &args.stats {
        let report = ReplayReport {
            commands: num_commands,
            frames,
            gpu_ticks,
            resolution_scale: renderer.resolution_scale(),
            stats,
        };
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
        info!("Replay report written to {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stream() {
        let text = "# fill\ngp0 0x02FF0000\nGP1 08000001  # mode\n\nvsync\n";
        assert_eq!(
            parse_stream(text).unwrap(),
            vec![
                StreamCommand::Gp0(0x02FF_0000),
                StreamCommand::Gp1(0x0800_0001),
                StreamCommand::VSync
            ]
        );
    }

    #[test]
    fn test_report_serializes_stats() {
        let report = ReplayReport {
            commands: 3,
            frames: 1,
            gpu_ticks: 256,
            resolution_scale: 2,
            stats: RendererStats {
                num_batches: 4,
                ..Default::default()
            },
        };
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stats"]["num_batches"], 4);
        assert_eq!(json["gpu_ticks"], 256);
    }

    #[test]
    fn test_parse_stream_errors() {
        assert!(parse_stream("gp0").unwrap_err().contains("line 1"));
        assert!(parse_stream("gp0 zz").is_err());
        assert!(parse_stream("\nblit 0").unwrap_err().contains("line 2"));
    }
}
