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

//! ISO-9660 directory walk.
//!
//! Just enough of the file system to boot a PlayStation disc: read the
//! Primary Volume Descriptor at LBA 16, then walk directory extents
//! matching path components case-insensitively with any `;1` version
//! suffix stripped. All reads go through the same 2048-byte sector
//! reader the CD-ROM data path uses.

use super::disc::{DiscImage, SECTOR_DATA};
use crate::core::error::CdRomError;

/// LBA of the Primary Volume Descriptor.
const PVD_LBA: u32 = 16;

/// Offset of the root directory record inside the PVD.
const PVD_ROOT_RECORD: usize = 156;

/// A resolved file: extent start and byte size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileExtent {
    pub lba: u32,
    pub size: u32,
}

/// Fields of one directory record we care about.
struct DirRecord {
    lba: u32,
    size: u32,
    is_dir: bool,
    name: String,
}

/// Resolve a file by path (components separated by `\` or `/`).
///
/// Returns the extent LBA and byte size. Matching ignores case and the
/// trailing `;1` version suffix on both sides.
pub fn find_file(disc: &DiscImage, path: &str) -> Result<FileExtent, CdRomError> {
    let mut sector = [0u8; SECTOR_DATA];

    disc.read_sector_2048(PVD_LBA, &mut sector)?;
    if &sector[1..6] != b"CD001" {
        return Err(CdRomError::InvalidImage(
            "missing CD001 volume descriptor".to_string(),
        ));
    }
    let root = parse_record(&sector[PVD_ROOT_RECORD..]).ok_or_else(|| {
        CdRomError::InvalidImage("malformed root directory record".to_string())
    })?;

    let mut dir = FileExtent {
        lba: root.lba,
        size: root.size,
    };

    let components: Vec<&str> = path
        .split(['\\', '/'])
        .filter(|c| !c.is_empty())
        .collect();
    if components.is_empty() {
        return Err(CdRomError::FileNotFound(path.to_string()));
    }

    for (i, component) in components.iter().enumerate() {
        let record = search_directory(disc, dir, component)?
            .ok_or_else(|| CdRomError::FileNotFound(path.to_string()))?;

        let last = i == components.len() - 1;
        if last {
            if record.is_dir {
                return Err(CdRomError::FileNotFound(path.to_string()));
            }
            return Ok(FileExtent {
                lba: record.lba,
                size: record.size,
            });
        }
        if !record.is_dir {
            return Err(CdRomError::FileNotFound(path.to_string()));
        }
        dir = FileExtent {
            lba: record.lba,
            size: record.size,
        };
    }
    unreachable!("loop returns on the last component");
}

/// Read a whole file resolved by [`find_file`].
pub fn read_file(disc: &DiscImage, path: &str) -> Result<Vec<u8>, CdRomError> {
    let extent = find_file(disc, path)?;
    let mut out = Vec::with_capacity(extent.size as usize);
    let mut sector = [0u8; SECTOR_DATA];

    let sectors = extent.size.div_ceil(SECTOR_DATA as u32);
    for i in 0..sectors {
        disc.read_sector_2048(extent.lba + i, &mut sector)?;
        let remaining = extent.size as usize - out.len();
        out.extend_from_slice(&sector[..remaining.min(SECTOR_DATA)]);
    }
    Ok(out)
}

/// Scan one directory extent for a name.
fn search_directory(
    disc: &DiscImage,
    dir: FileExtent,
    name: &str,
) -> Result<Option<DirRecord>, CdRomError> {
    let want = normalize(name);
    let mut sector = [0u8; SECTOR_DATA];

    let sectors = dir.size.div_ceil(SECTOR_DATA as u32);
    for i in 0..sectors {
        disc.read_sector_2048(dir.lba + i, &mut sector)?;

        let mut offset = 0usize;
        while offset < SECTOR_DATA {
            let len = sector[offset] as usize;
            if len == 0 {
                // Records never straddle sectors; a zero length ends this one.
                break;
            }
            if offset + len > SECTOR_DATA {
                break;
            }
            if let Some(record) = parse_record(&sector[offset..offset + len]) {
                if normalize(&record.name) == want {
                    return Ok(Some(record));
                }
            }
            offset += len;
        }
    }
    Ok(None)
}

/// Parse a directory record. The slice starts at the record's length byte.
fn parse_record(bytes: &[u8]) -> Option<DirRecord> {
    if bytes.len() < 34 {
        return None;
    }
    let len = bytes[0] as usize;
    if len < 34 || bytes.len() < len {
        return None;
    }

    let lba = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
    let size = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]);
    let flags = bytes[25];
    let name_len = bytes[32] as usize;
    if 33 + name_len > len {
        return None;
    }
    let name_bytes = &bytes[33..33 + name_len];

    // Self/parent entries encode as single bytes 0x00/0x01.
    let name = if name_len == 1 && name_bytes[0] <= 1 {
        String::new()
    } else {
        String::from_utf8_lossy(name_bytes).into_owned()
    };

    Some(DirRecord {
        lba,
        size,
        is_dir: flags & 0x02 != 0,
        name,
    })
}

/// Uppercase and strip the `;N` version suffix.
fn normalize(name: &str) -> String {
    let base = name.split(';').next().unwrap_or(name);
    base.to_ascii_uppercase()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::cdrom::disc::TrackType;

    /// Build a minimal ISO-9660 volume as a cooked 2048-byte image:
    /// PVD at LBA 16, root directory at LBA 20, files after it.
    pub(crate) fn build_test_iso(files: &[(&str, &[u8])]) -> DiscImage {
        const ROOT_LBA: u32 = 20;
        let file_base_lba = ROOT_LBA + 1;

        let mut sectors: Vec<[u8; SECTOR_DATA]> = vec![[0u8; SECTOR_DATA]; 64];

        // PVD
        {
            let pvd = &mut sectors[16];
            pvd[0] = 1; // type: primary
            pvd[1..6].copy_from_slice(b"CD001");
            pvd[6] = 1; // version
            let root = make_record(ROOT_LBA, SECTOR_DATA as u32, true, "\u{0}");
            pvd[PVD_ROOT_RECORD..PVD_ROOT_RECORD + root.len()].copy_from_slice(&root);
        }

        // Root directory records
        {
            let mut offset = 0usize;
            let dot = make_record(ROOT_LBA, SECTOR_DATA as u32, true, "\u{0}");
            sectors[ROOT_LBA as usize][offset..offset + dot.len()].copy_from_slice(&dot);
            offset += dot.len();
            let dotdot = make_record(ROOT_LBA, SECTOR_DATA as u32, true, "\u{1}");
            sectors[ROOT_LBA as usize][offset..offset + dotdot.len()].copy_from_slice(&dotdot);
            offset += dotdot.len();

            for (i, (name, content)) in files.iter().enumerate() {
                let lba = file_base_lba + (i as u32) * 8;
                let rec = make_record(lba, content.len() as u32, false, name);
                sectors[ROOT_LBA as usize][offset..offset + rec.len()].copy_from_slice(&rec);
                offset += rec.len();

                // File payload
                for (si, chunk) in content.chunks(SECTOR_DATA).enumerate() {
                    sectors[lba as usize + si][..chunk.len()].copy_from_slice(chunk);
                }
            }
        }

        let mut data = Vec::with_capacity(sectors.len() * SECTOR_DATA);
        for s in &sectors {
            data.extend_from_slice(s);
        }
        DiscImage::from_raw_sectors(data, SECTOR_DATA, TrackType::Mode1Cooked)
    }

    fn make_record(lba: u32, size: u32, is_dir: bool, name: &str) -> Vec<u8> {
        let name_bytes = name.as_bytes();
        let mut len = 33 + name_bytes.len();
        if len % 2 == 1 {
            len += 1; // records are padded to even length
        }
        let mut rec = vec![0u8; len];
        rec[0] = len as u8;
        rec[2..6].copy_from_slice(&lba.to_le_bytes());
        rec[6..10].copy_from_slice(&lba.to_be_bytes());
        rec[10..14].copy_from_slice(&size.to_le_bytes());
        rec[14..18].copy_from_slice(&size.to_be_bytes());
        rec[25] = if is_dir { 0x02 } else { 0x00 };
        rec[32] = name_bytes.len() as u8;
        rec[33..33 + name_bytes.len()].copy_from_slice(name_bytes);
        rec
    }

    #[test]
    fn test_find_file_in_root() {
        let content = b"BOOT = cdrom:\\MAIN.EXE;1\r\n";
        let disc = build_test_iso(&[("SYSTEM.CNF;1", content)]);

        let extent = find_file(&disc, "\\SYSTEM.CNF;1").unwrap();
        assert_eq!(extent.lba, 21);
        assert_eq!(extent.size, content.len() as u32);
    }

    #[test]
    fn test_find_file_case_insensitive_and_versionless() {
        let disc = build_test_iso(&[("SYSTEM.CNF;1", b"x")]);
        assert!(find_file(&disc, "system.cnf").is_ok());
        assert!(find_file(&disc, "SYSTEM.CNF").is_ok());
        assert!(find_file(&disc, "/System.Cnf;1").is_ok());
    }

    #[test]
    fn test_find_file_missing() {
        let disc = build_test_iso(&[("SYSTEM.CNF;1", b"x")]);
        let err = find_file(&disc, "\\NOPE.BIN;1").unwrap_err();
        assert!(matches!(err, CdRomError::FileNotFound(_)));
    }

    #[test]
    fn test_read_file_spans_sectors() {
        let content: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
        let disc = build_test_iso(&[("BIG.DAT;1", &content)]);

        let data = read_file(&disc, "BIG.DAT").unwrap();
        assert_eq!(data, content);
    }

    #[test]
    fn test_sector_reader_pads_with_zeros() {
        let content = b"short";
        let disc = build_test_iso(&[("S.TXT;1", content)]);
        let extent = find_file(&disc, "S.TXT").unwrap();

        let mut sector = [0xAAu8; SECTOR_DATA];
        disc.read_sector_2048(extent.lba, &mut sector).unwrap();
        assert_eq!(&sector[..5], b"short");
        assert!(sector[5..].iter().all(|&b| b == 0), "padded with zeros");
    }

    #[test]
    fn test_invalid_pvd_rejected() {
        let disc = DiscImage::from_raw_sectors(
            vec![0u8; 32 * SECTOR_DATA],
            SECTOR_DATA,
            TrackType::Mode1Cooked,
        );
        let err = find_file(&disc, "X").unwrap_err();
        assert!(matches!(err, CdRomError::InvalidImage(_)));
    }
}
