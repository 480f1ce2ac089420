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

//! Guest executable loaders: PS-X EXE and ELF32 (MIPS, little-endian).
//!
//! Both loaders copy segments into RAM through the bus with bounds
//! checking and report the entry point; the PS-X path also extracts the
//! initial GP and SP.

use crate::core::error::SetupError;
use crate::core::memory::Bus;
use crate::logging::{LogCategory, Logger};

/// Executable container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecFormat {
    /// Sniff the magic bytes.
    #[default]
    Auto,
    Elf,
    PsxExe,
}

impl ExecFormat {
    pub fn parse(s: &str) -> Option<ExecFormat> {
        match s {
            "auto" => Some(ExecFormat::Auto),
            "elf" => Some(ExecFormat::Elf),
            "psxexe" => Some(ExecFormat::PsxExe),
            _ => None,
        }
    }
}

/// Result of a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedImage {
    pub entry: u32,
    pub gp: Option<u32>,
    pub sp: Option<u32>,
}

const PSX_MAGIC: &[u8; 8] = b"PS-X EXE";
const ELF_MAGIC: &[u8; 4] = b"\x7FELF";

/// Header offset of the PS-X EXE payload.
const PSX_HEADER_SIZE: usize = 0x800;

/// Load an executable image into RAM.
pub fn load_image(
    bus: &mut Bus,
    bytes: &[u8],
    format: ExecFormat,
    log: &Logger,
) -> Result<LoadedImage, SetupError> {
    let format = match format {
        ExecFormat::Auto => {
            if bytes.len() >= 8 && &bytes[..8] == PSX_MAGIC {
                ExecFormat::PsxExe
            } else if bytes.len() >= 4 && &bytes[..4] == ELF_MAGIC {
                ExecFormat::Elf
            } else {
                return Err(SetupError::FormatInvalid(
                    "not a PS-X EXE or ELF image".to_string(),
                ));
            }
        }
        other => other,
    };

    match format {
        ExecFormat::PsxExe => load_psx_exe(bus, bytes, log),
        ExecFormat::Elf => load_elf(bus, bytes, log),
        ExecFormat::Auto => unreachable!("resolved above"),
    }
}

#[inline]
fn word_at(bytes: &[u8], offset: usize) -> Result<u32, SetupError> {
    if offset + 4 > bytes.len() {
        return Err(SetupError::FormatInvalid(format!(
            "truncated header (need 4 bytes at offset 0x{:X})",
            offset
        )));
    }
    Ok(u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]))
}

#[inline]
fn half_at(bytes: &[u8], offset: usize) -> Result<u16, SetupError> {
    if offset + 2 > bytes.len() {
        return Err(SetupError::FormatInvalid(format!(
            "truncated header (need 2 bytes at offset 0x{:X})",
            offset
        )));
    }
    Ok(u16::from_le_bytes([bytes[offset], bytes[offset + 1]]))
}

/// Parse and load a PS-X EXE: 0x800-byte header, text image after it.
pub fn load_psx_exe(
    bus: &mut Bus,
    bytes: &[u8],
    log: &Logger,
) -> Result<LoadedImage, SetupError> {
    if bytes.len() < PSX_HEADER_SIZE || &bytes[..8] != PSX_MAGIC {
        return Err(SetupError::FormatInvalid(
            "missing PS-X EXE magic".to_string(),
        ));
    }

    let pc0 = word_at(bytes, 0x10)?;
    let gp0 = word_at(bytes, 0x14)?;
    let t_addr = word_at(bytes, 0x18)?;
    let t_size = word_at(bytes, 0x1C)?;
    let b_addr = word_at(bytes, 0x28)?;
    let b_size = word_at(bytes, 0x2C)?;
    let s_addr = word_at(bytes, 0x30)?;
    let s_size = word_at(bytes, 0x34)?;

    if PSX_HEADER_SIZE + t_size as usize > bytes.len() {
        return Err(SetupError::FormatInvalid(format!(
            "text segment (0x{:X} bytes) exceeds the file",
            t_size
        )));
    }

    bus.write_ram_slice(
        t_addr,
        &bytes[PSX_HEADER_SIZE..PSX_HEADER_SIZE + t_size as usize],
    )?;

    if b_size > 0 {
        bus.zero_ram_range(b_addr, b_size)?;
    }

    let sp = if s_size != 0 {
        s_addr.wrapping_add(s_size)
    } else {
        s_addr
    };

    log.info(
        LogCategory::System,
        format_args!(
            "PS-X EXE: text 0x{:08X}+0x{:X}, entry 0x{:08X}, gp 0x{:08X}, sp 0x{:08X}",
            t_addr, t_size, pc0, gp0, sp
        ),
    );

    Ok(LoadedImage {
        entry: pc0,
        gp: Some(gp0),
        sp: if sp != 0 { Some(sp) } else { None },
    })
}

/// Parse and load an ELF32-MIPS-LE image: every PT_LOAD is copied and
/// zero-filled up to its memory size.
pub fn load_elf(bus: &mut Bus, bytes: &[u8], log: &Logger) -> Result<LoadedImage, SetupError> {
    if bytes.len() < 52 || &bytes[..4] != ELF_MAGIC {
        return Err(SetupError::FormatInvalid("missing ELF magic".to_string()));
    }
    if bytes[4] != 1 {
        return Err(SetupError::FormatInvalid(
            "only ELF32 (EI_CLASS=1) is supported".to_string(),
        ));
    }
    if bytes[5] != 1 {
        return Err(SetupError::FormatInvalid(
            "only little-endian ELF (EI_DATA=1) is supported".to_string(),
        ));
    }
    let machine = half_at(bytes, 18)?;
    if machine != 8 {
        return Err(SetupError::FormatInvalid(format!(
            "not a MIPS ELF (e_machine={})",
            machine
        )));
    }

    let entry = word_at(bytes, 24)?;
    let phoff = word_at(bytes, 28)? as usize;
    let phentsize = half_at(bytes, 42)? as usize;
    let phnum = half_at(bytes, 44)? as usize;

    if phentsize < 32 {
        return Err(SetupError::FormatInvalid(format!(
            "bad program header entry size {}",
            phentsize
        )));
    }

    const PT_LOAD: u32 = 1;
    let mut loaded = 0usize;

    for i in 0..phnum {
        let ph = phoff + i * phentsize;
        let p_type = word_at(bytes, ph)?;
        if p_type != PT_LOAD {
            continue;
        }
        let p_offset = word_at(bytes, ph + 4)? as usize;
        let p_vaddr = word_at(bytes, ph + 8)?;
        let p_paddr = word_at(bytes, ph + 12)?;
        let p_filesz = word_at(bytes, ph + 16)? as usize;
        let p_memsz = word_at(bytes, ph + 20)? as usize;

        if p_offset + p_filesz > bytes.len() {
            return Err(SetupError::FormatInvalid(format!(
                "PT_LOAD {} file range exceeds the image",
                i
            )));
        }

        let dest = if p_paddr != 0 { p_paddr } else { p_vaddr };
        bus.write_ram_slice(dest, &bytes[p_offset..p_offset + p_filesz])?;
        if p_memsz > p_filesz {
            bus.zero_ram_range(
                dest.wrapping_add(p_filesz as u32),
                (p_memsz - p_filesz) as u32,
            )?;
        }

        log.info(
            LogCategory::System,
            format_args!(
                "ELF PT_LOAD: 0x{:08X} file 0x{:X} mem 0x{:X}",
                dest, p_filesz, p_memsz
            ),
        );
        loaded += 1;
    }

    if loaded == 0 {
        return Err(SetupError::FormatInvalid(
            "ELF image has no PT_LOAD segments".to_string(),
        ));
    }

    Ok(LoadedImage {
        entry,
        gp: None,
        sp: None,
    })
}
