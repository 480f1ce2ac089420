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

//! CD-ROM controller.
//!
//! Four byte-wide registers at 0x1F801800-0x1F801803, banked by the index
//! register. Commands are written to the command register, consume bytes
//! from the parameter FIFO, and answer through the response FIFO plus one
//! of five interrupt causes:
//!
//! - INT1: sector data ready
//! - INT2: command completion (second response)
//! - INT3: command acknowledge (first response)
//! - INT4: end of track (unused here)
//! - INT5: error
//!
//! Interrupts queue: an entry's response bytes land in the response FIFO
//! when the entry is delivered, and the next entry waits until the guest
//! acknowledges the current one by writing the flag register. Command
//! acknowledge and completion times are modeled as cycle countdowns
//! advanced by `Bus::tick`.

use std::collections::VecDeque;

pub mod disc;
pub mod iso9660;
mod commands;
mod xa;

pub use disc::{DiscImage, Track, TrackType};
pub use iso9660::{find_file, read_file, FileExtent};
pub use xa::XaAdpcmDecoder;

use crate::core::error::CdRomError;
use crate::core::interrupt::{irq, InterruptController};
use crate::logging::{LogCategory, Logger};

/// Commands that send a delayed second response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SecondResponse {
    GetId,
    ReadToc,
    Init,
    Pause,
    Seek,
}

/// Mechanical drive activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriveState {
    Idle,
    Seeking,
    Reading,
}

/// Drive mode as set by Setmode.
#[derive(Debug, Clone, Copy, Default)]
struct DriveMode {
    double_speed: bool,
    xa_adpcm: bool,
    /// Whole-sector reads (2340 bytes) instead of 2048 data bytes.
    size_2340: bool,
    xa_filter: bool,
    ignore_bit: bool,
    report_all: bool,
    auto_pause: bool,
    cdda_report: bool,
}

/// Latched status flags reported in the stat byte.
#[derive(Debug, Clone, Copy, Default)]
struct DriveStatus {
    error: bool,
    motor_on: bool,
    seek_error: bool,
    id_error: bool,
    shell_open: bool,
    reading: bool,
    seeking: bool,
    playing: bool,
}

/// One queued interrupt with its response payload.
struct PendingIrq {
    kind: u8,
    response: Vec<u8>,
}

pub struct CdRom {
    /// Register bank select (bits 0-1 of 0x1F801800).
    index: u8,
    param_fifo: VecDeque<u8>,
    response_fifo: VecDeque<u8>,
    /// Current sector payload exposed through the data FIFO / DMA.
    data_buffer: Vec<u8>,
    data_index: usize,
    /// Interrupts not yet delivered; the head waits for the ack of
    /// `current_irq`.
    pending_irqs: VecDeque<PendingIrq>,
    /// Delivered interrupt cause awaiting acknowledge (0 = none).
    current_irq: u8,
    interrupt_enable: u8,
    state: DriveState,
    /// Current read position as an ISO LBA.
    lba: u32,
    seek_target: Option<u32>,
    mode: DriveMode,
    status: DriveStatus,
    disc: Option<DiscImage>,
    /// Command waiting out its acknowledge delay.
    pending_command: Option<(u8, u32)>,
    /// Second response waiting out its completion delay.
    second_response: Option<(SecondResponse, u32)>,
    read_countdown: u32,
    /// XA filter selectors (Setfilter).
    filter_file: u8,
    filter_channel: u8,
    xa_decoder: XaAdpcmDecoder,
    /// Decoded XA audio waiting to be moved to the SPU by the bus.
    xa_samples: Vec<(i16, i16)>,
    log: Logger,
}

impl CdRom {
    /// Register addresses.
    pub const REG_INDEX: u32 = 0x1F80_1800;
    pub const REG_CMD: u32 = 0x1F80_1801;
    pub const REG_PARAM: u32 = 0x1F80_1802;
    pub const REG_IRQ: u32 = 0x1F80_1803;

    const FIFO_SIZE: usize = 16;

    /// Sector cadence: 75 sectors/second at 1× on the 33.8688 MHz clock.
    const CYCLES_PER_SECTOR_1X: u32 = 451_584;
    const CYCLES_PER_SECTOR_2X: u32 = 225_792;

    /// Acknowledge delays by command class.
    const DEFAULT_ACK_DELAY: u32 = 5_000;
    const INIT_ACK_DELAY: u32 = 20_000;
    const READ_ACK_DELAY: u32 = 7_000;

    /// Second response delays.
    const GETID_COMPLETE_DELAY: u32 = 33_000;
    const READTOC_COMPLETE_DELAY: u32 = 500_000;
    const INIT_COMPLETE_DELAY: u32 = 70_000;
    const PAUSE_COMPLETE_DELAY: u32 = 10_000;
    const SEEK_COMPLETE_DELAY: u32 = 100_000;

    pub fn new() -> Self {
        Self {
            index: 0,
            param_fifo: VecDeque::new(),
            response_fifo: VecDeque::new(),
            data_buffer: Vec::new(),
            data_index: 0,
            pending_irqs: VecDeque::new(),
            current_irq: 0,
            interrupt_enable: 0,
            state: DriveState::Idle,
            lba: 0,
            seek_target: None,
            mode: DriveMode::default(),
            status: DriveStatus::default(),
            disc: None,
            pending_command: None,
            second_response: None,
            read_countdown: 0,
            filter_file: 0,
            filter_channel: 0,
            xa_decoder: XaAdpcmDecoder::new(),
            xa_samples: Vec::new(),
            log: Logger::null(),
        }
    }

    pub fn set_logger(&mut self, log: Logger) {
        self.log = log;
    }

    /// Insert a disc image. Replaces any previous disc.
    pub fn insert_disc(&mut self, disc: DiscImage) {
        self.status.shell_open = false;
        self.status.motor_on = true;
        self.xa_decoder.reset();
        self.disc = Some(disc);
        self.log
            .info(LogCategory::Cdrom, format_args!("disc inserted"));
    }

    pub fn has_disc(&self) -> bool {
        self.disc.is_some()
    }

    pub fn disc(&self) -> Option<&DiscImage> {
        self.disc.as_ref()
    }

    /// Load a disc image from a path.
    pub fn load_disc(&mut self, path: &str) -> Result<(), CdRomError> {
        let disc = DiscImage::load(path)?;
        self.insert_disc(disc);
        Ok(())
    }

    // --- Register interface ------------------------------------------------

    /// HSTS: index, FIFO levels, busy.
    fn read_hsts(&self) -> u8 {
        let mut v = self.index & 3;
        if !self.xa_samples.is_empty() {
            v |= 1 << 2; // ADPCM playing
        }
        if self.param_fifo.is_empty() {
            v |= 1 << 3;
        }
        if self.param_fifo.len() < Self::FIFO_SIZE {
            v |= 1 << 4;
        }
        if !self.response_fifo.is_empty() {
            v |= 1 << 5;
        }
        if self.data_index < self.data_buffer.len() {
            v |= 1 << 6;
        }
        if self.pending_command.is_some() {
            v |= 1 << 7; // busy
        }
        v
    }

    /// Stat byte included in most responses.
    fn stat_byte(&self) -> u8 {
        let mut v = 0u8;
        if self.status.error {
            v |= 1 << 0;
        }
        if self.status.motor_on {
            v |= 1 << 1;
        }
        if self.status.seek_error {
            v |= 1 << 2;
        }
        if self.status.id_error {
            v |= 1 << 3;
        }
        if self.status.shell_open {
            v |= 1 << 4;
        }
        if self.status.reading {
            v |= 1 << 5;
        }
        if self.status.seeking {
            v |= 1 << 6;
        }
        if self.status.playing {
            v |= 1 << 7;
        }
        v
    }

    /// 8-bit register read.
    pub fn read_register(&mut self, addr: u32) -> u8 {
        match (addr, self.index) {
            (Self::REG_INDEX, _) => self.read_hsts(),

            // Response FIFO on every bank.
            (Self::REG_CMD, _) => {
                let v = self.response_fifo.pop_front().unwrap_or(0);
                self.log.trace(
                    LogCategory::Cdrom,
                    format_args!("response pop 0x{:02X}", v),
                );
                v
            }

            // Data FIFO.
            (Self::REG_PARAM, 0) | (Self::REG_PARAM, 1) => self.pop_data_byte(),
            (Self::REG_PARAM, _) => self.interrupt_enable,

            (Self::REG_IRQ, 0) | (Self::REG_IRQ, 2) => 0xE0 | self.interrupt_enable,
            (Self::REG_IRQ, _) => 0xE0 | self.current_irq,

            _ => {
                self.log.warn(
                    LogCategory::Cdrom,
                    format_args!("invalid register read at 0x{:08X}", addr),
                );
                0
            }
        }
    }

    /// 8-bit register write.
    pub fn write_register(&mut self, addr: u32, value: u8) {
        match (addr, self.index) {
            (Self::REG_INDEX, _) => {
                self.index = value & 3;
            }

            // Command register.
            (Self::REG_CMD, 0) => self.queue_command(value),
            (Self::REG_CMD, _) => {
                self.log.trace(
                    LogCategory::Cdrom,
                    format_args!("sound map write 0x{:02X} ignored", value),
                );
            }

            // Parameter FIFO.
            (Self::REG_PARAM, 0) => {
                if self.param_fifo.len() < Self::FIFO_SIZE {
                    self.param_fifo.push_back(value);
                } else {
                    self.log.warn(
                        LogCategory::Cdrom,
                        format_args!("parameter FIFO overflow, byte 0x{:02X} dropped", value),
                    );
                }
            }
            // Interrupt enable.
            (Self::REG_PARAM, 1) => {
                self.interrupt_enable = value & 0x1F;
            }
            (Self::REG_PARAM, _) => {
                // Audio volume registers: accepted.
            }

            // Request register: bit 7 arms the data FIFO (already armed
            // whenever a sector lands; a 0 write drops the buffer).
            (Self::REG_IRQ, 0) => {
                if value & 0x80 == 0 {
                    self.data_buffer.clear();
                    self.data_index = 0;
                }
            }
            // Interrupt flag acknowledge.
            (Self::REG_IRQ, 1) => {
                self.current_irq &= !(value & 0x1F);
                if value & 0x40 != 0 {
                    self.param_fifo.clear();
                }
                if value & 0x10 != 0 {
                    self.status.error = false;
                    self.status.seek_error = false;
                    self.status.id_error = false;
                }
            }
            (Self::REG_IRQ, _) => {
                // Audio volume apply: accepted.
            }

            _ => {
                self.log.warn(
                    LogCategory::Cdrom,
                    format_args!("invalid register write 0x{:08X} = 0x{:02X}", addr, value),
                );
            }
        }
    }

    // --- Command / interrupt plumbing --------------------------------------

    /// Latch a command; it executes after its acknowledge delay. A command
    /// written while another is pending overwrites it (hardware behavior).
    fn queue_command(&mut self, cmd: u8) {
        if let Some((old, _)) = self.pending_command {
            self.log.warn(
                LogCategory::Cdrom,
                format_args!("command 0x{:02X} overwrites pending 0x{:02X}", cmd, old),
            );
        }
        let delay = match cmd {
            0x0A => Self::INIT_ACK_DELAY,
            0x06 | 0x1B | 0x09 => Self::READ_ACK_DELAY,
            _ => Self::DEFAULT_ACK_DELAY,
        };
        self.pending_command = Some((cmd, delay));
        self.log.debug(
            LogCategory::Cdrom,
            format_args!("command 0x{:02X} queued (ack in {} cycles)", cmd, delay),
        );
    }

    /// Queue an interrupt with its response payload.
    pub(self) fn push_irq(&mut self, kind: u8, response: Vec<u8>) {
        self.pending_irqs.push_back(PendingIrq { kind, response });
    }

    pub(self) fn schedule_second_response(&mut self, which: SecondResponse) {
        let delay = match which {
            SecondResponse::GetId => Self::GETID_COMPLETE_DELAY,
            SecondResponse::ReadToc => Self::READTOC_COMPLETE_DELAY,
            SecondResponse::Init => Self::INIT_COMPLETE_DELAY,
            SecondResponse::Pause => Self::PAUSE_COMPLETE_DELAY,
            SecondResponse::Seek => Self::SEEK_COMPLETE_DELAY,
        };
        self.second_response = Some((which, delay));
    }

    /// Error response: flush the parameter FIFO and queue INT5.
    pub(self) fn error_response(&mut self, code: u8) {
        self.status.error = true;
        self.param_fifo.clear();
        let stat = self.stat_byte() | 0x01;
        self.push_irq(5, vec![stat, code]);
    }

    /// Cycles between delivered sectors at the current speed.
    fn sector_cycles(&self) -> u32 {
        if self.mode.double_speed {
            Self::CYCLES_PER_SECTOR_2X
        } else {
            Self::CYCLES_PER_SECTOR_1X
        }
    }

    /// Advance controller time. Countdowns fire in order: command ack,
    /// second response, mechanical state; then the interrupt queue is
    /// drained into the flag register if the guest has acknowledged.
    pub fn tick(&mut self, cycles: u32, irq_ctl: &mut InterruptController) {
        // Command acknowledge.
        if let Some((cmd, countdown)) = self.pending_command {
            if countdown > cycles {
                self.pending_command = Some((cmd, countdown - cycles));
            } else {
                self.pending_command = None;
                self.execute_command(cmd);
            }
        }

        // Second response.
        if let Some((which, countdown)) = self.second_response {
            if countdown > cycles {
                self.second_response = Some((which, countdown - cycles));
            } else {
                self.second_response = None;
                self.complete_second_response(which);
            }
        }

        // Sector delivery.
        if self.state == DriveState::Reading {
            if self.read_countdown > cycles {
                self.read_countdown -= cycles;
            } else {
                self.read_countdown = self.sector_cycles();
                self.deliver_sector();
            }
        }

        // Interrupt delivery: one at a time, gated on acknowledge.
        if self.current_irq == 0 {
            if let Some(pending) = self.pending_irqs.pop_front() {
                self.response_fifo.extend(pending.response.iter());
                self.current_irq = pending.kind;
                self.log.trace(
                    LogCategory::Cdrom,
                    format_args!("INT{} delivered", pending.kind),
                );
                if self.interrupt_enable & (1 << (pending.kind - 1)) != 0 {
                    irq_ctl.raise(irq::CDROM);
                }
            }
        }
    }

    /// Read one sector at the current position and route it: XA audio
    /// sectors go to the SPU ring, data sectors to the data FIFO + INT1.
    fn deliver_sector(&mut self) {
        let Some(disc) = self.disc.as_ref() else {
            self.state = DriveState::Idle;
            self.status.reading = false;
            self.error_response(0x80);
            return;
        };

        let Some(raw) = disc.read_sector_raw(self.lba) else {
            self.log.warn(
                LogCategory::Cdrom,
                format_args!("read past end of disc at LBA {}", self.lba),
            );
            self.state = DriveState::Idle;
            self.status.reading = false;
            self.error_response(0x40);
            return;
        };

        let is_raw = disc.sector_size() == disc::SECTOR_RAW;

        // XA audio routing happens before the data FIFO is touched.
        if is_raw && self.mode.xa_adpcm && XaAdpcmDecoder::is_audio_sector(raw) {
            let pass = !self.mode.xa_filter
                || (XaAdpcmDecoder::file_number(raw) == self.filter_file
                    && XaAdpcmDecoder::channel_number(raw) == self.filter_channel);
            if pass {
                let raw = raw.to_vec();
                self.xa_decoder.decode_sector(&raw, &mut self.xa_samples);
                self.log.trace(
                    LogCategory::Cdrom,
                    format_args!("XA sector at LBA {} routed to SPU", self.lba),
                );
            }
            self.lba += 1;
            return;
        }

        // Data path: 2340-byte whole sectors or 2048 user bytes.
        if is_raw && self.mode.size_2340 {
            self.data_buffer = raw[12..].to_vec();
        } else {
            let mut payload = vec![0u8; disc::SECTOR_DATA];
            let lba = self.lba;
            // Reborrow immutably through the shared reader.
            if let Some(disc) = self.disc.as_ref() {
                if disc.read_sector_2048(lba, &mut payload).is_err() {
                    self.error_response(0x40);
                    return;
                }
            }
            self.data_buffer = payload;
        }
        self.data_index = 0;

        let stat = self.stat_byte();
        self.push_irq(1, vec![stat]);
        self.log.trace(
            LogCategory::Cdrom,
            format_args!("sector at LBA {} ready ({} bytes)", self.lba, self.data_buffer.len()),
        );
        self.lba += 1;
    }

    /// Pop one byte from the data FIFO (CPU or DMA side).
    pub fn pop_data_byte(&mut self) -> u8 {
        if self.data_index < self.data_buffer.len() {
            let b = self.data_buffer[self.data_index];
            self.data_index += 1;
            b
        } else {
            0
        }
    }

    /// Move decoded XA samples out (taken by the bus into the SPU).
    pub fn take_xa_samples(&mut self) -> Vec<(i16, i16)> {
        std::mem::take(&mut self.xa_samples)
    }

    /// True when the data FIFO still holds sector bytes.
    pub fn data_available(&self) -> bool {
        self.data_index < self.data_buffer.len()
    }

    // --- Test hooks --------------------------------------------------------

    #[cfg(test)]
    pub(crate) fn response_bytes(&self) -> Vec<u8> {
        self.response_fifo.iter().copied().collect()
    }

    #[cfg(test)]
    pub(crate) fn push_param(&mut self, value: u8) {
        self.param_fifo.push_back(value);
    }

    #[cfg(test)]
    pub(crate) fn current_irq_kind(&self) -> u8 {
        self.current_irq
    }

    #[cfg(test)]
    pub(crate) fn set_data_buffer(&mut self, data: Vec<u8>) {
        self.data_buffer = data;
        self.data_index = 0;
    }
}

impl Default for CdRom {
    fn default() -> Self {
        Self::new()
    }
}

/// BCD to binary.
#[inline]
pub fn bcd_to_dec(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0F)
}

/// Binary to BCD.
#[inline]
pub fn dec_to_bcd(dec: u8) -> u8 {
    ((dec / 10) << 4) | (dec % 10)
}

/// MSF triple to ISO LBA (the 2-second pregap is subtracted).
#[inline]
pub fn msf_to_lba(minute: u8, second: u8, frame: u8) -> u32 {
    let total = minute as u32 * 60 * 75 + second as u32 * 75 + frame as u32;
    total.saturating_sub(150)
}
