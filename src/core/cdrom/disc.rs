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

//! Disc image loading and sector access.
//!
//! Supported inputs: a `.cue` sheet next to its `.bin` (raw 2352-byte
//! sectors), or a bare `.bin`/`.iso` whose sector size is probed from the
//! CD sync pattern. All reads are LBA-addressed; MSF conversion happens in
//! the controller.

use crate::core::error::CdRomError;

/// Raw sector size on a pressed CD.
pub const SECTOR_RAW: usize = 2352;
/// User data per sector in cooked (data-only) images.
pub const SECTOR_DATA: usize = 2048;

/// CD sync pattern at the start of every raw data sector.
const SYNC_PATTERN: [u8; 12] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];

/// Track type parsed from the cue sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    /// Data track, Mode 1, 2352 bytes per sector.
    Mode1Raw,
    /// Data track, Mode 2 (XA), 2352 bytes per sector.
    Mode2Raw,
    /// Data track, cooked 2048-byte sectors.
    Mode1Cooked,
    /// CD-DA audio.
    Audio,
}

/// One track of the disc.
#[derive(Debug, Clone)]
pub struct Track {
    pub number: u8,
    pub track_type: TrackType,
    /// Starting LBA of the track data.
    pub start_lba: u32,
    pub length_sectors: u32,
    /// Byte offset of the track in the image file.
    pub file_offset: u64,
}

/// A loaded disc image.
#[derive(Debug)]
pub struct DiscImage {
    tracks: Vec<Track>,
    data: Vec<u8>,
    /// Bytes per sector as stored in the image (2352 or 2048).
    sector_size: usize,
}

impl DiscImage {
    /// Load a disc image. `.cue` files are parsed as cue/bin pairs; any
    /// other extension is treated as a raw image with the sector size
    /// probed from its first bytes.
    pub fn load(path: &str) -> Result<Self, CdRomError> {
        if path.to_ascii_lowercase().ends_with(".cue") {
            Self::load_cue(path)
        } else {
            Self::load_raw(path)
        }
    }

    /// Load from a cue sheet.
    fn load_cue(cue_path: &str) -> Result<Self, CdRomError> {
        let cue_data = std::fs::read_to_string(cue_path)?;
        let bin_path = Self::bin_path_from_cue(cue_path, &cue_data)?;

        let data = std::fs::read(&bin_path).map_err(|e| {
            CdRomError::InvalidImage(format!("cannot read bin file '{}': {}", bin_path, e))
        })?;

        let mut tracks = Self::parse_cue(&cue_data)?;
        if tracks.is_empty() {
            return Err(CdRomError::InvalidImage(
                "cue sheet contains no tracks".to_string(),
            ));
        }
        Self::compute_track_lengths(&mut tracks, data.len(), SECTOR_RAW);

        Ok(Self {
            tracks,
            data,
            sector_size: SECTOR_RAW,
        })
    }

    /// Load a bare image, probing the sector size.
    fn load_raw(path: &str) -> Result<Self, CdRomError> {
        let data = std::fs::read(path)
            .map_err(|e| CdRomError::InvalidImage(format!("cannot read '{}': {}", path, e)))?;
        if data.is_empty() {
            return Err(CdRomError::InvalidImage(format!("'{}' is empty", path)));
        }

        // Ambiguous images default to raw when the sync pattern matches.
        let sector_size = if data.len() >= 12 && data[..12] == SYNC_PATTERN {
            SECTOR_RAW
        } else {
            SECTOR_DATA
        };

        let track_type = if sector_size == SECTOR_RAW {
            // Mode byte sits after the 12-byte sync + 3-byte address.
            if data.len() > 15 && data[15] == 2 {
                TrackType::Mode2Raw
            } else {
                TrackType::Mode1Raw
            }
        } else {
            TrackType::Mode1Cooked
        };

        let length_sectors = (data.len() / sector_size) as u32;
        let tracks = vec![Track {
            number: 1,
            track_type,
            start_lba: 0,
            length_sectors,
            file_offset: 0,
        }];

        Ok(Self {
            tracks,
            data,
            sector_size,
        })
    }

    /// Resolve the `FILE "...bin" BINARY` directive relative to the cue.
    fn bin_path_from_cue(cue_path: &str, cue_data: &str) -> Result<String, CdRomError> {
        for line in cue_data.lines() {
            let line = line.trim();
            if !line.starts_with("FILE") {
                continue;
            }
            if let Some(start) = line.find('"') {
                if let Some(end) = line[start + 1..].find('"') {
                    let bin_name = &line[start + 1..start + 1 + end];
                    let base = std::path::Path::new(cue_path);
                    let bin_path = match base.parent() {
                        Some(parent) => parent.join(bin_name),
                        None => std::path::PathBuf::from(bin_name),
                    };
                    return Ok(bin_path.to_string_lossy().into_owned());
                }
            }
        }
        Err(CdRomError::InvalidImage(
            "no FILE directive in cue sheet".to_string(),
        ))
    }

    /// Parse TRACK/INDEX 01 entries from a cue sheet.
    fn parse_cue(cue_data: &str) -> Result<Vec<Track>, CdRomError> {
        let mut tracks: Vec<Track> = Vec::new();
        let mut current: Option<Track> = None;

        for line in cue_data.lines() {
            let line = line.trim();

            if line.starts_with("TRACK") {
                if let Some(track) = current.take() {
                    tracks.push(track);
                }
                let mut parts = line.split_whitespace();
                let _ = parts.next();
                let number = parts.next().and_then(|s| s.parse().ok()).unwrap_or(1);
                let track_type = match parts.next().unwrap_or("MODE2/2352") {
                    "MODE1/2352" => TrackType::Mode1Raw,
                    "MODE1/2048" => TrackType::Mode1Cooked,
                    "AUDIO" => TrackType::Audio,
                    _ => TrackType::Mode2Raw,
                };
                current = Some(Track {
                    number,
                    track_type,
                    start_lba: 0,
                    length_sectors: 0,
                    file_offset: 0,
                });
            } else if line.starts_with("INDEX 01") {
                if let Some(track) = current.as_mut() {
                    let time = line
                        .split_whitespace()
                        .nth(2)
                        .ok_or_else(|| {
                            CdRomError::InvalidImage(format!("bad INDEX line: '{}'", line))
                        })?;
                    let lba = Self::parse_msf_to_lba(time)?;
                    track.start_lba = lba;
                    track.file_offset = lba as u64 * SECTOR_RAW as u64;
                }
            }
        }
        if let Some(track) = current {
            tracks.push(track);
        }
        Ok(tracks)
    }

    /// Parse an `MM:SS:FF` cue timestamp into a file LBA (no pregap bias —
    /// cue timestamps are file-relative).
    fn parse_msf_to_lba(msf: &str) -> Result<u32, CdRomError> {
        let parts: Vec<&str> = msf.split(':').collect();
        if parts.len() != 3 {
            return Err(CdRomError::InvalidImage(format!(
                "invalid MSF timestamp '{}'",
                msf
            )));
        }
        let field = |s: &str| -> Result<u32, CdRomError> {
            s.parse()
                .map_err(|_| CdRomError::InvalidImage(format!("invalid MSF field in '{}'", msf)))
        };
        let (m, s, f) = (field(parts[0])?, field(parts[1])?, field(parts[2])?);
        Ok((m * 60 + s) * 75 + f)
    }

    fn compute_track_lengths(tracks: &mut [Track], file_size: usize, sector_size: usize) {
        for i in 0..tracks.len() {
            let end_offset = if i + 1 < tracks.len() {
                tracks[i + 1].file_offset
            } else {
                file_size as u64
            };
            let span = end_offset.saturating_sub(tracks[i].file_offset);
            tracks[i].length_sectors = (span / sector_size as u64) as u32;
        }
    }

    /// Stored bytes per sector.
    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, number: u8) -> Option<&Track> {
        self.tracks.iter().find(|t| t.number == number)
    }

    /// Track covering the given LBA.
    pub fn track_at(&self, lba: u32) -> Option<&Track> {
        self.tracks
            .iter()
            .rev()
            .find(|t| lba >= t.start_lba && lba < t.start_lba + t.length_sectors)
    }

    /// Raw sector bytes at an LBA (whatever size the image stores).
    pub fn read_sector_raw(&self, lba: u32) -> Option<&[u8]> {
        let offset = lba as usize * self.sector_size;
        if offset + self.sector_size <= self.data.len() {
            Some(&self.data[offset..offset + self.sector_size])
        } else {
            None
        }
    }

    /// Read the 2048 user bytes of a data sector into `out`, zero-padding
    /// if the stored payload is short. This is the reader both the file
    /// system walk and ReadN share.
    pub fn read_sector_2048(&self, lba: u32, out: &mut [u8]) -> Result<(), CdRomError> {
        debug_assert!(out.len() >= SECTOR_DATA);
        let sector = self
            .read_sector_raw(lba)
            .ok_or_else(|| CdRomError::ReadError(format!("LBA {} out of range", lba)))?;

        let payload = if self.sector_size == SECTOR_DATA {
            sector
        } else {
            // Raw: skip sync/header; Mode 2 carries an 8-byte subheader.
            let mode = sector[15];
            let start = if mode == 2 { 24 } else { 16 };
            &sector[start..]
        };

        let n = payload.len().min(SECTOR_DATA);
        out[..n].copy_from_slice(&payload[..n]);
        for b in out[n..SECTOR_DATA].iter_mut() {
            *b = 0;
        }
        Ok(())
    }

    /// Total sectors stored in the image.
    pub fn sector_count(&self) -> u32 {
        (self.data.len() / self.sector_size) as u32
    }

    /// Build an in-memory image from raw sector data (tests and tooling).
    pub fn from_raw_sectors(data: Vec<u8>, sector_size: usize, track_type: TrackType) -> Self {
        let length_sectors = (data.len() / sector_size) as u32;
        Self {
            tracks: vec![Track {
                number: 1,
                track_type,
                start_lba: 0,
                length_sectors,
                file_offset: 0,
            }],
            data,
            sector_size,
        }
    }
}
