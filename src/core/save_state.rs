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

//! VRAM snapshots for save states
//!
//! A snapshot holds the render target exactly as the device stored it, at
//! the internal resolution, plus the native 15-bit VRAM the CPU sees. The
//! surrounding save-state file of the emulator embeds the bytes produced by
//! [`VramSnapshot::to_bytes`]; [`save_to_file`](VramSnapshot::save_to_file)
//! is provided for standalone dumps.
//!
//! # Version Compatibility
//!
//! Snapshots carry a version number. Loading one with a different version
//! fails with [`RendererError::IncompatibleSaveState`].
//!
//! # Example
//!
//! ```no_run
//! use psrx_hw::core::save_state::VramSnapshot;
//!
//! let snapshot = VramSnapshot::load_from_file("vram.state").unwrap();
//! println!("{}x{}", snapshot.width, snapshot.height);
//! ```

use bincode::{config, Decode, Encode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::core::error::{RendererError, Result};
use crate::core::gpu::VRAM_SIZE;

/// Snapshot format version
///
/// Increment whenever the layout of [`VramSnapshot`] changes.
pub const SAVE_STATE_VERSION: u32 = 1;

/// Render target and CPU-visible VRAM at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
#[bincode(encode_bounds = "", decode_bounds = "")]
pub struct VramSnapshot {
    /// Version number for compatibility checking
    pub version: u32,

    #[bincode(with_serde)]
    pub created: DateTime<Utc>,

    /// Render target size at the internal resolution
    pub width: u32,
    pub height: u32,
    pub samples: u32,

    /// Render target texels, packed RGBA8, row-major
    pub pixels: Vec<u32>,

    /// Native 1024×512 VRAM in 15-bit format
    pub vram: Vec<u16>,
}

impl VramSnapshot {
    pub fn new(width: u32, height: u32, samples: u32, pixels: Vec<u32>, vram: Vec<u16>) -> Self {
        Self {
            version: SAVE_STATE_VERSION,
            created: Utc::now(),
            width,
            height,
            samples,
            pixels,
            vram,
        }
    }

    /// Check that the payload sizes agree with the header
    pub fn validate(&self) -> Result<()> {
        if self.version != SAVE_STATE_VERSION {
            return Err(RendererError::IncompatibleSaveState {
                expected: SAVE_STATE_VERSION,
                got: self.version,
            });
        }
        let expected_pixels = self.width as usize * self.height as usize;
        if self.pixels.len() != expected_pixels {
            return Err(RendererError::CorruptSaveState(format!(
                "{} render target texels for {}x{}",
                self.pixels.len(),
                self.width,
                self.height
            )));
        }
        if self.vram.len() != VRAM_SIZE {
            return Err(RendererError::CorruptSaveState(format!(
                "{} VRAM pixels, expected {}",
                self.vram.len(),
                VRAM_SIZE
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::encode_to_vec(self, config::standard())?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (snapshot, _): (VramSnapshot, usize) =
            bincode::decode_from_slice(bytes, config::standard())?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Write the snapshot to a binary file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let encoded = self.to_bytes()?;
        let mut file = File::create(path.as_ref())?;
        file.write_all(&encoded)?;

        log::info!(
            "VRAM snapshot saved to {} ({} bytes)",
            path.as_ref().display(),
            encoded.len()
        );
        Ok(())
    }

    /// Read a snapshot written by [`save_to_file`](Self::save_to_file)
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path.as_ref())?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;

        let snapshot = Self::from_bytes(&buffer)?;
        log::info!("VRAM snapshot loaded from {}", path.as_ref().display());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn snapshot() -> VramSnapshot {
        let mut vram = vec![0u16; VRAM_SIZE];
        vram[7] = 0x801F;
        VramSnapshot::new(2, 2, 1, vec![1, 2, 3, 0xFF00_00FF], vram)
    }

    #[test]
    fn test_save_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vram.state");
        let state = snapshot();

        state.save_to_file(&path).unwrap();
        let loaded = VramSnapshot::load_from_file(&path).unwrap();

        assert_eq!(loaded, state);
    }

    #[test]
    fn test_version_check() {
        let mut state = snapshot();
        state.version = SAVE_STATE_VERSION + 1;
        let bytes = state.to_bytes().unwrap();

        assert!(matches!(
            VramSnapshot::from_bytes(&bytes),
            Err(RendererError::IncompatibleSaveState { got, .. }) if got == SAVE_STATE_VERSION + 1
        ));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let mut state = snapshot();
        state.pixels.pop();

        assert!(matches!(state.validate(), Err(RendererError::CorruptSaveState(_))));
        let bytes = snapshot().to_bytes().unwrap();
        assert!(VramSnapshot::from_bytes(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            VramSnapshot::load_from_file(dir.path().join("missing.state")),
            Err(RendererError::Io(_))
        ));
    }
}
