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

//! Memory bus.
//!
//! The bus owns every device — interrupt controller, DMA, GPU, SPU,
//! CD-ROM, timers — plus RAM, BIOS and the scratchpad, keeping ownership
//! a strict tree rooted at `Core`. Devices never see the bus; interrupt
//! raising passes `&mut InterruptController` into their tick methods, and
//! device-to-device pushes (CD-ROM XA audio to the SPU) are moved here.
//!
//! # Address map (physical)
//!
//! | Range                  | Region                    |
//! |------------------------|---------------------------|
//! | 0x00000000-0x007FFFFF  | RAM (2 MiB, mirrored)     |
//! | 0x1F000000-0x1F7FFFFF  | Expansion 1 + debug port  |
//! | 0x1F800000-0x1F800FFF  | Scratchpad (1 KiB)        |
//! | 0x1F801000-0x1F801FFF  | Device MMIO               |
//! | 0x1FC00000-0x1FC7FFFF  | BIOS ROM (512 KiB)        |
//!
//! `tick(cycles)` advances device time: DMA pumps first (so freshly armed
//! channels complete within the batch), then the GPU VBlank divider, the
//! CD-ROM scheduler, the SPU sample clock and the timers. Interrupts
//! raised here are observed by the CPU at the next step boundary.

use crate::core::cdrom::CdRom;
use crate::core::dma::Dma;
use crate::core::error::{MemFault, MemFaultKind, MemResult, SetupError};
use crate::core::gpu::Gpu;
use crate::core::interrupt::InterruptController;
use crate::core::spu::Spu;
use crate::core::timer::Timers;
use crate::logging::{LogCategory, Logger};

mod io_ports;
mod region;

pub use region::{classify, physical, MemRegion};

/// BIOS ROM size (512 KiB).
pub const BIOS_SIZE: usize = 512 * 1024;
/// Scratchpad size (1 KiB).
pub const SCRATCHPAD_SIZE: usize = 1024;

pub struct Bus {
    ram: Vec<u8>,
    scratchpad: [u8; SCRATCHPAD_SIZE],
    bios: Vec<u8>,
    cache_control: u32,
    /// Memory-control registers: accepted and stored.
    mem_ctrl: [u32; 9],
    ram_size_reg: u32,
    pub(crate) irq: InterruptController,
    pub(crate) dma: Dma,
    pub(crate) gpu: Gpu,
    pub(crate) spu: Spu,
    pub(crate) cdrom: CdRom,
    pub(crate) timers: Timers,
    log: Logger,
}

impl Bus {
    /// Build a bus with `ram_bytes` of main RAM (power of two, so the
    /// mirror masking stays cheap).
    pub fn new(ram_bytes: usize) -> Self {
        debug_assert!(ram_bytes.is_power_of_two());
        Self {
            ram: vec![0u8; ram_bytes],
            scratchpad: [0u8; SCRATCHPAD_SIZE],
            bios: vec![0u8; BIOS_SIZE],
            cache_control: 0,
            mem_ctrl: [0; 9],
            ram_size_reg: 0,
            irq: InterruptController::new(),
            dma: Dma::new(),
            gpu: Gpu::new(),
            spu: Spu::new(),
            cdrom: CdRom::new(),
            timers: Timers::new(),
            log: Logger::null(),
        }
    }

    /// Distribute a logger to the bus and every owned device.
    pub fn set_logger(&mut self, log: &Logger) {
        self.log = log.clone();
        self.irq.set_logger(log.clone());
        self.dma.set_logger(log.clone());
        self.gpu.set_logger(log.clone());
        self.spu.set_logger(log.clone());
        self.cdrom.set_logger(log.clone());
        self.timers.set_logger(log.clone());
    }

    /// Copy a BIOS image in. The source buffer is copied, not borrowed.
    pub fn set_bios_copy(&mut self, bytes: &[u8]) -> Result<(), SetupError> {
        if bytes.len() != BIOS_SIZE {
            return Err(SetupError::FormatInvalid(format!(
                "BIOS image must be {} bytes, got {}",
                BIOS_SIZE,
                bytes.len()
            )));
        }
        self.bios.copy_from_slice(bytes);
        Ok(())
    }

    pub fn ram_size(&self) -> usize {
        self.ram.len()
    }

    pub(crate) fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub(crate) fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }

    /// True when an unmasked interrupt is pending for the CPU.
    #[inline(always)]
    pub fn is_interrupt_pending(&self) -> bool {
        self.irq.is_pending()
    }

    pub fn irq_mut(&mut self) -> &mut InterruptController {
        &mut self.irq
    }

    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut Gpu {
        &mut self.gpu
    }

    pub fn spu_mut(&mut self) -> &mut Spu {
        &mut self.spu
    }

    pub fn cdrom(&self) -> &CdRom {
        &self.cdrom
    }

    pub fn cdrom_mut(&mut self) -> &mut CdRom {
        &mut self.cdrom
    }

    // --- Side-effect-free peeks (stop predicates, host syscalls) -----------

    /// Read a RAM word without side effects; None outside RAM.
    pub fn peek_ram32(&self, vaddr: u32) -> Option<u32> {
        let paddr = physical(vaddr);
        if classify(paddr) != MemRegion::Ram {
            return None;
        }
        let offset = (paddr as usize) & (self.ram.len() - 1) & !3;
        Some(u32::from_le_bytes([
            self.ram[offset],
            self.ram[offset + 1],
            self.ram[offset + 2],
            self.ram[offset + 3],
        ]))
    }

    /// Read a RAM byte without side effects.
    pub fn peek_ram8(&self, vaddr: u32) -> Option<u8> {
        let paddr = physical(vaddr);
        if classify(paddr) != MemRegion::Ram {
            return None;
        }
        Some(self.ram[(paddr as usize) & (self.ram.len() - 1)])
    }

    /// Bulk copy into RAM (loaders). Bounds-checked, fails with OutOfRam.
    pub fn write_ram_slice(&mut self, vaddr: u32, data: &[u8]) -> Result<(), SetupError> {
        let offset = (physical(vaddr) as usize) & (self.ram.len() - 1);
        if offset + data.len() > self.ram.len() {
            return Err(SetupError::OutOfRam {
                addr: vaddr,
                len: data.len() as u32,
            });
        }
        self.ram[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Zero a RAM range (bss clearing).
    pub fn zero_ram_range(&mut self, vaddr: u32, len: u32) -> Result<(), SetupError> {
        let offset = (physical(vaddr) as usize) & (self.ram.len() - 1);
        let len = len as usize;
        if offset + len > self.ram.len() {
            return Err(SetupError::OutOfRam { addr: vaddr, len: len as u32 });
        }
        self.ram[offset..offset + len].fill(0);
        Ok(())
    }

    // --- CPU-visible accessors ---------------------------------------------

    #[inline(always)]
    fn ram_offset(&self, paddr: u32) -> usize {
        (paddr as usize) & (self.ram.len() - 1)
    }

    #[inline(always)]
    fn scratch_offset(paddr: u32) -> usize {
        ((paddr - region::SCRATCHPAD_START) as usize) & (SCRATCHPAD_SIZE - 1)
    }

    /// Read a byte.
    pub fn read8(&mut self, vaddr: u32) -> MemResult<u8> {
        let paddr = physical(vaddr);
        match classify(paddr) {
            MemRegion::Ram => Ok(self.ram[self.ram_offset(paddr)]),
            MemRegion::Scratchpad => Ok(self.scratchpad[Self::scratch_offset(paddr)]),
            MemRegion::Bios => Ok(self.bios[(paddr - region::BIOS_START) as usize]),
            MemRegion::Io => Ok(self.read_io8(paddr)),
            MemRegion::Expansion1 => Ok(0xFF),
            MemRegion::Expansion2 => Ok(0xFF),
            MemRegion::CacheControl => Ok(0),
            MemRegion::Unmapped => Err(MemFault::unmapped(vaddr)),
        }
    }

    /// Read a halfword. Callers are expected to pre-check alignment; the
    /// bus still reports a fault for robustness.
    pub fn read16(&mut self, vaddr: u32) -> MemResult<u16> {
        if vaddr & 1 != 0 {
            return Err(MemFault {
                addr: vaddr,
                kind: MemFaultKind::UnalignedLoad,
            });
        }
        let paddr = physical(vaddr);
        match classify(paddr) {
            MemRegion::Ram => {
                let o = self.ram_offset(paddr);
                Ok(u16::from_le_bytes([self.ram[o], self.ram[o + 1]]))
            }
            MemRegion::Scratchpad => {
                let o = Self::scratch_offset(paddr);
                Ok(u16::from_le_bytes([
                    self.scratchpad[o],
                    self.scratchpad[(o + 1) & (SCRATCHPAD_SIZE - 1)],
                ]))
            }
            MemRegion::Bios => {
                let o = (paddr - region::BIOS_START) as usize;
                Ok(u16::from_le_bytes([self.bios[o], self.bios[o + 1]]))
            }
            MemRegion::Io => Ok(self.read_io16(paddr)),
            MemRegion::Expansion1 | MemRegion::Expansion2 => Ok(0xFFFF),
            MemRegion::CacheControl => Ok(0),
            MemRegion::Unmapped => Err(MemFault::unmapped(vaddr)),
        }
    }

    /// Read a word.
    pub fn read32(&mut self, vaddr: u32) -> MemResult<u32> {
        if vaddr & 3 != 0 {
            return Err(MemFault {
                addr: vaddr,
                kind: MemFaultKind::UnalignedLoad,
            });
        }
        let paddr = physical(vaddr);
        match classify(paddr) {
            MemRegion::Ram => {
                let o = self.ram_offset(paddr);
                Ok(u32::from_le_bytes([
                    self.ram[o],
                    self.ram[o + 1],
                    self.ram[o + 2],
                    self.ram[o + 3],
                ]))
            }
            MemRegion::Scratchpad => {
                let o = Self::scratch_offset(paddr);
                Ok(u32::from_le_bytes([
                    self.scratchpad[o],
                    self.scratchpad[(o + 1) & (SCRATCHPAD_SIZE - 1)],
                    self.scratchpad[(o + 2) & (SCRATCHPAD_SIZE - 1)],
                    self.scratchpad[(o + 3) & (SCRATCHPAD_SIZE - 1)],
                ]))
            }
            MemRegion::Bios => {
                let o = (paddr - region::BIOS_START) as usize;
                Ok(u32::from_le_bytes([
                    self.bios[o],
                    self.bios[o + 1],
                    self.bios[o + 2],
                    self.bios[o + 3],
                ]))
            }
            MemRegion::Io => Ok(self.read_io32(paddr)),
            MemRegion::Expansion1 => {
                // Expansion ROM header probes must see "no ROM here".
                if (region::EXP1_START..region::EXP1_START + 0x100).contains(&paddr) {
                    Ok(0)
                } else {
                    Ok(0xFFFF_FFFF)
                }
            }
            MemRegion::Expansion2 => Ok(0xFFFF_FFFF),
            MemRegion::CacheControl => Ok(self.cache_control),
            MemRegion::Unmapped => Err(MemFault::unmapped(vaddr)),
        }
    }

    /// Write a byte.
    pub fn write8(&mut self, vaddr: u32, value: u8) -> MemResult<()> {
        let paddr = physical(vaddr);
        match classify(paddr) {
            MemRegion::Ram => {
                let o = self.ram_offset(paddr);
                self.ram[o] = value;
                Ok(())
            }
            MemRegion::Scratchpad => {
                self.scratchpad[Self::scratch_offset(paddr)] = value;
                Ok(())
            }
            MemRegion::Bios => Ok(()), // ROM: writes dropped
            MemRegion::Io => {
                self.write_io8(paddr, value);
                Ok(())
            }
            MemRegion::Expansion1 | MemRegion::Expansion2 => Ok(()),
            MemRegion::CacheControl => Ok(()),
            MemRegion::Unmapped => Err(MemFault::unmapped(vaddr)),
        }
    }

    /// Write a halfword.
    pub fn write16(&mut self, vaddr: u32, value: u16) -> MemResult<()> {
        if vaddr & 1 != 0 {
            return Err(MemFault {
                addr: vaddr,
                kind: MemFaultKind::UnalignedStore,
            });
        }
        let paddr = physical(vaddr);
        match classify(paddr) {
            MemRegion::Ram => {
                let o = self.ram_offset(paddr);
                self.ram[o..o + 2].copy_from_slice(&value.to_le_bytes());
                Ok(())
            }
            MemRegion::Scratchpad => {
                let o = Self::scratch_offset(paddr);
                let bytes = value.to_le_bytes();
                self.scratchpad[o] = bytes[0];
                self.scratchpad[(o + 1) & (SCRATCHPAD_SIZE - 1)] = bytes[1];
                Ok(())
            }
            MemRegion::Bios => Ok(()),
            MemRegion::Io => {
                self.write_io16(paddr, value);
                Ok(())
            }
            MemRegion::Expansion1 | MemRegion::Expansion2 => Ok(()),
            MemRegion::CacheControl => Ok(()),
            MemRegion::Unmapped => Err(MemFault::unmapped(vaddr)),
        }
    }

    /// Write a word.
    pub fn write32(&mut self, vaddr: u32, value: u32) -> MemResult<()> {
        if vaddr & 3 != 0 {
            return Err(MemFault {
                addr: vaddr,
                kind: MemFaultKind::UnalignedStore,
            });
        }
        let paddr = physical(vaddr);
        match classify(paddr) {
            MemRegion::Ram => {
                let o = self.ram_offset(paddr);
                self.ram[o..o + 4].copy_from_slice(&value.to_le_bytes());
                Ok(())
            }
            MemRegion::Scratchpad => {
                let o = Self::scratch_offset(paddr);
                for (i, b) in value.to_le_bytes().iter().enumerate() {
                    self.scratchpad[(o + i) & (SCRATCHPAD_SIZE - 1)] = *b;
                }
                Ok(())
            }
            MemRegion::Bios => {
                self.log.trace(
                    LogCategory::Mem,
                    format_args!("write to BIOS ROM at 0x{:08X} dropped", vaddr),
                );
                Ok(())
            }
            MemRegion::Io => {
                self.write_io32(paddr, value);
                Ok(())
            }
            MemRegion::Expansion1 => {
                if paddr == region::DEBUG_PRINT_PORT {
                    // Debug print port: format the word as "%u\n".
                    self.log.text(&format!("{}\n", value));
                } else {
                    self.log.trace(
                        LogCategory::Io,
                        format_args!("expansion 1 write 0x{:08X} = 0x{:08X} dropped", vaddr, value),
                    );
                }
                Ok(())
            }
            MemRegion::Expansion2 => Ok(()),
            MemRegion::CacheControl => {
                self.cache_control = value;
                Ok(())
            }
            MemRegion::Unmapped => Err(MemFault::unmapped(vaddr)),
        }
    }

    // --- Device time -------------------------------------------------------

    /// Advance device-internal clocks by `cycles` CPU cycles. Called once
    /// per bus-tick batch; interrupts raised here are seen by the CPU at
    /// the next instruction boundary.
    pub fn tick(&mut self, cycles: u32) {
        // DMA first: channels armed during the batch complete before the
        // devices they feed are advanced.
        self.dma.tick(
            &mut self.ram,
            &mut self.gpu,
            &mut self.cdrom,
            &mut self.spu,
            &mut self.irq,
        );

        self.gpu.tick(cycles, &mut self.irq);
        self.cdrom.tick(cycles, &mut self.irq);

        // Route decoded XA audio from the CD-ROM into the SPU mixer.
        let xa = self.cdrom.take_xa_samples();
        if !xa.is_empty() {
            self.spu.push_cd_samples(&xa);
        }

        self.spu.tick(cycles);
        self.timers.tick(cycles, &mut self.irq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus() -> Bus {
        Bus::new(2 * 1024 * 1024)
    }

    #[test]
    fn test_ram_roundtrip_through_segments() {
        let mut bus = bus();
        bus.write32(0x8000_0000, 0x1234_5678).unwrap();
        assert_eq!(bus.read32(0x0000_0000).unwrap(), 0x1234_5678);
        assert_eq!(bus.read32(0xA000_0000).unwrap(), 0x1234_5678);
    }

    #[test]
    fn test_ram_mirror_window() {
        let mut bus = bus();
        bus.write32(0x0000_0100, 0xAABB_CCDD).unwrap();
        // 2 MiB RAM mirrors at +2 MiB inside the 8 MiB window.
        assert_eq!(bus.read32(0x0020_0100).unwrap(), 0xAABB_CCDD);
        assert_eq!(bus.read32(0x0060_0100).unwrap(), 0xAABB_CCDD);
    }

    #[test]
    fn test_byte_and_halfword_access() {
        let mut bus = bus();
        bus.write8(0x100, 0x42).unwrap();
        assert_eq!(bus.read8(0x100).unwrap(), 0x42);

        bus.write16(0x200, 0xBEEF).unwrap();
        assert_eq!(bus.read16(0x200).unwrap(), 0xBEEF);
        assert_eq!(bus.read8(0x200).unwrap(), 0xEF, "little endian");
        assert_eq!(bus.read8(0x201).unwrap(), 0xBE);
    }

    #[test]
    fn test_unaligned_access_faults() {
        let mut bus = bus();
        let err = bus.read32(0x101).unwrap_err();
        assert_eq!(err.kind, MemFaultKind::UnalignedLoad);
        assert_eq!(err.addr, 0x101);

        let err = bus.write16(0x201, 0).unwrap_err();
        assert_eq!(err.kind, MemFaultKind::UnalignedStore);
    }

    #[test]
    fn test_unmapped_access_faults() {
        let mut bus = bus();
        assert!(bus.read32(0x1000_0000).is_err());
        assert!(bus.write32(0x1F90_0000, 0).is_err());
    }

    #[test]
    fn test_scratchpad_isolated_from_ram() {
        let mut bus = bus();
        bus.write32(0x1F80_0000, 0x5555_AAAA).unwrap();
        assert_eq!(bus.read32(0x1F80_0000).unwrap(), 0x5555_AAAA);
        assert_ne!(bus.read32(0x0000_0000).unwrap(), 0x5555_AAAA);
    }

    #[test]
    fn test_bios_read_only() {
        let mut bus = bus();
        let mut image = vec![0u8; BIOS_SIZE];
        image[0] = 0x3C;
        image[1] = 0x08;
        bus.set_bios_copy(&image).unwrap();

        assert_eq!(bus.read32(0xBFC0_0000).unwrap() & 0xFFFF, 0x083C);
        bus.write32(0xBFC0_0000, 0xDEAD_BEEF).unwrap();
        assert_eq!(bus.read32(0xBFC0_0000).unwrap() & 0xFFFF, 0x083C);
    }

    #[test]
    fn test_bios_size_validation() {
        let mut bus = bus();
        assert!(bus.set_bios_copy(&[0u8; 1024]).is_err());
    }

    #[test]
    fn test_expansion1_reads_ff_and_header_zero() {
        let mut bus = bus();
        assert_eq!(bus.read8(0x1F10_0000).unwrap(), 0xFF);
        assert_eq!(bus.read32(0x1F00_0000).unwrap(), 0, "ROM header probe");
        assert_eq!(bus.read32(0x1F10_0000).unwrap(), 0xFFFF_FFFF);
        // Writes are dropped without faulting.
        bus.write32(0x1F10_0000, 0x1234).unwrap();
    }

    #[test]
    fn test_cache_control_accepted_and_ignored() {
        let mut bus = bus();
        bus.write32(0xFFFE_0130, 0x0001_E988).unwrap();
        assert_eq!(bus.read32(0xFFFE_0130).unwrap(), 0x0001_E988);
    }

    #[test]
    fn test_i_stat_i_mask_through_bus() {
        let mut bus = bus();
        bus.irq_mut().raise(crate::core::interrupt::irq::VBLANK);
        assert_eq!(bus.read32(0x1F80_1070).unwrap(), 1);

        bus.write32(0x1F80_1074, 1).unwrap();
        assert!(bus.is_interrupt_pending());

        // Acknowledge by writing 0 to the bit.
        bus.write32(0x1F80_1070, !1u32).unwrap();
        assert_eq!(bus.read32(0x1F80_1070).unwrap(), 0);
        assert!(!bus.is_interrupt_pending());
    }

    #[test]
    fn test_gpustat_read() {
        let mut bus = bus();
        let stat = bus.read32(0x1F80_1814).unwrap();
        assert_ne!(stat & (1 << 26), 0, "ready to receive commands");
    }

    #[test]
    fn test_unknown_mmio_is_benign() {
        let mut bus = bus();
        // Joypad registers are not implemented: logged, read as zero.
        assert_eq!(bus.read32(0x1F80_1040).unwrap(), 0);
        bus.write32(0x1F80_1040, 0x1234).unwrap();
    }

    #[test]
    fn test_debug_print_port() {
        use crate::logging::{LogCategory, LogLevel, Logger, LogSink, SinkSet};
        use std::sync::{Arc, Mutex};

        let captured = Arc::new(Mutex::new(String::new()));
        let sink = captured.clone();
        let sinks = SinkSet::new().route(
            &[LogCategory::Text],
            Arc::new(LogSink::Callback(Box::new(move |s: &str| {
                sink.lock().unwrap().push_str(s);
            }))),
        );
        let logger = Logger::new(LogLevel::Info, LogCategory::all_mask(), sinks);

        let mut bus = bus();
        bus.set_logger(&logger);

        for i in 1..=5u32 {
            bus.write32(0x1F00_0000, i).unwrap();
        }
        assert_eq!(&*captured.lock().unwrap(), "1\n2\n3\n4\n5\n");
    }

    #[test]
    fn test_tick_advances_gpu_vblank() {
        let mut bus = bus();
        bus.tick(crate::core::gpu::Gpu::VBLANK_PERIOD_NTSC as u32);
        assert_eq!(bus.gpu().frame_count(), 1);
        assert_eq!(
            bus.read32(0x1F80_1070).unwrap() & 1,
            1,
            "VBlank bit latched in I_STAT"
        );
    }

    #[test]
    fn test_spu_register_through_bus() {
        let mut bus = bus();
        bus.write16(0x1F80_1C04, 0x3000).unwrap(); // voice 0 pitch
        assert_eq!(bus.read16(0x1F80_1C04).unwrap(), 0x3000);
    }
}
