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

//! Physical address decoding.
//!
//! KUSEG/KSEG0/KSEG1 alias the same physical space; stripping the top
//! three address bits yields the 29-bit physical address this module
//! classifies. KSEG2 holds only the cache-control register.

/// Memory region classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemRegion {
    /// Main RAM, mirrored through the first 8 MiB.
    Ram,
    /// Expansion region 1 (reads 0xFF, writes dropped, debug port).
    Expansion1,
    /// 1 KiB scratchpad, mirrored through its 4 KiB window.
    Scratchpad,
    /// Device MMIO.
    Io,
    /// Expansion regions 2/3 (logged, otherwise inert).
    Expansion2,
    /// BIOS ROM.
    Bios,
    /// KSEG2 cache-control register.
    CacheControl,
    /// Nothing mapped.
    Unmapped,
}

/// RAM window: 2 MiB mirrored up to 8 MiB.
pub const RAM_WINDOW_END: u32 = 0x0080_0000;
pub const EXP1_START: u32 = 0x1F00_0000;
pub const EXP1_END: u32 = 0x1F80_0000;
pub const SCRATCHPAD_START: u32 = 0x1F80_0000;
pub const SCRATCHPAD_END: u32 = 0x1F80_1000;
pub const IO_START: u32 = 0x1F80_1000;
pub const IO_END: u32 = 0x1F80_2000;
pub const EXP2_START: u32 = 0x1F80_2000;
pub const EXP2_END: u32 = 0x1FC0_0000;
pub const BIOS_START: u32 = 0x1FC0_0000;
pub const BIOS_END: u32 = 0x1FC8_0000;
pub const CACHE_CONTROL: u32 = 0x1FFE_0130;

/// Debug print port at the base of expansion region 1.
pub const DEBUG_PRINT_PORT: u32 = 0x1F00_0000;

/// Strip the segment bits.
#[inline(always)]
pub fn physical(vaddr: u32) -> u32 {
    vaddr & 0x1FFF_FFFF
}

/// Classify a physical address.
#[inline(always)]
pub fn classify(paddr: u32) -> MemRegion {
    match paddr {
        _ if paddr < RAM_WINDOW_END => MemRegion::Ram,
        EXP1_START..=0x1F7F_FFFF => MemRegion::Expansion1,
        SCRATCHPAD_START..=0x1F80_0FFF => MemRegion::Scratchpad,
        IO_START..=0x1F80_1FFF => MemRegion::Io,
        EXP2_START..=0x1FBF_FFFF => MemRegion::Expansion2,
        BIOS_START..=0x1FC7_FFFF => MemRegion::Bios,
        CACHE_CONTROL => MemRegion::CacheControl,
        _ => MemRegion::Unmapped,
    }
}
