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

//! Minimal WAV writer: 16-bit stereo PCM at 44100 Hz. The RIFF and data
//! chunk sizes are placeholders until [`WavWriter::finalize`] patches
//! them on close.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

const SAMPLE_RATE: u32 = 44_100;
const CHANNELS: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;

pub struct WavWriter {
    writer: BufWriter<File>,
    data_bytes: u32,
    finalized: bool,
}

impl WavWriter {
    /// Create the file and write a header with zeroed sizes.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<WavWriter> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let byte_rate = SAMPLE_RATE * CHANNELS as u32 * (BITS_PER_SAMPLE / 8) as u32;
        let block_align = CHANNELS * (BITS_PER_SAMPLE / 8);

        writer.write_all(b"RIFF")?;
        writer.write_all(&0u32.to_le_bytes())?; // patched on finalize
        writer.write_all(b"WAVE")?;
        writer.write_all(b"fmt ")?;
        writer.write_all(&16u32.to_le_bytes())?;
        writer.write_all(&1u16.to_le_bytes())?; // PCM
        writer.write_all(&CHANNELS.to_le_bytes())?;
        writer.write_all(&SAMPLE_RATE.to_le_bytes())?;
        writer.write_all(&byte_rate.to_le_bytes())?;
        writer.write_all(&block_align.to_le_bytes())?;
        writer.write_all(&BITS_PER_SAMPLE.to_le_bytes())?;
        writer.write_all(b"data")?;
        writer.write_all(&0u32.to_le_bytes())?; // patched on finalize

        Ok(WavWriter {
            writer,
            data_bytes: 0,
            finalized: false,
        })
    }

    /// Append interleaved stereo samples.
    pub fn write_samples(&mut self, samples: &[i16]) -> io::Result<()> {
        for &s in samples {
            self.writer.write_all(&s.to_le_bytes())?;
        }
        self.data_bytes += samples.len() as u32 * 2;
        Ok(())
    }

    /// Patch the chunk sizes and flush. Idempotent.
    pub fn finalize(&mut self) -> io::Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;

        let riff_size = 36 + self.data_bytes;
        self.writer.flush()?;
        self.writer.seek(SeekFrom::Start(4))?;
        self.writer.write_all(&riff_size.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(40))?;
        self.writer.write_all(&self.data_bytes.to_le_bytes())?;
        self.writer.flush()
    }
}

impl Drop for WavWriter {
    fn drop(&mut self) {
        let _ = self.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_header_and_sizes_finalized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.wav");

        {
            let mut wav = WavWriter::create(&path).unwrap();
            wav.write_samples(&[0, 1, -1, 32767, -32768, 2, 3, 4]).unwrap();
            wav.finalize().unwrap();
        }

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(&bytes[36..40], b"data");

        let data_size = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]);
        assert_eq!(data_size, 16, "8 samples × 2 bytes");
        let riff_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        assert_eq!(riff_size, 36 + 16);
        assert_eq!(bytes.len() as u32, 8 + riff_size);

        // Sample payload in order, little-endian.
        assert_eq!(i16::from_le_bytes([bytes[44], bytes[45]]), 0);
        assert_eq!(i16::from_le_bytes([bytes[46], bytes[47]]), 1);
        assert_eq!(i16::from_le_bytes([bytes[48], bytes[49]]), -1);
    }

    #[test]
    fn test_finalize_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dropped.wav");
        {
            let mut wav = WavWriter::create(&path).unwrap();
            wav.write_samples(&[5, 6]).unwrap();
            // No explicit finalize.
        }
        let bytes = std::fs::read(&path).unwrap();
        let data_size = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]);
        assert_eq!(data_size, 4);
    }
}
