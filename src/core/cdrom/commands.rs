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

//! CD-ROM command implementations.
//!
//! Commands run when their acknowledge countdown fires. Each queues its
//! first response (INT3, or INT5 on error); multi-stage commands schedule
//! a second response that completes later.

use super::{bcd_to_dec, msf_to_lba, CdRom, DriveState, SecondResponse};
use crate::logging::LogCategory;

impl CdRom {
    /// Dispatch a command byte after its acknowledge delay.
    pub(super) fn execute_command(&mut self, cmd: u8) {
        self.log.debug(
            LogCategory::Cdrom,
            format_args!("executing command 0x{:02X}", cmd),
        );

        match cmd {
            0x01 => self.cmd_getstat(),
            0x02 => self.cmd_setloc(),
            0x06 => self.cmd_read(),
            0x09 => self.cmd_pause(),
            0x0A => self.cmd_init(),
            0x0D => self.cmd_setfilter(),
            0x0E => self.cmd_setmode(),
            0x15 | 0x16 => self.cmd_seek(),
            0x19 => self.cmd_test(),
            0x1A => self.cmd_getid(),
            0x1B => self.cmd_read(),
            0x1E => self.cmd_readtoc(),
            _ => {
                self.log.warn(
                    LogCategory::Cdrom,
                    format_args!("unknown command 0x{:02X}", cmd),
                );
                self.error_response(0x40);
            }
        }
    }

    /// 0x01 Getstat: status byte, INT3.
    fn cmd_getstat(&mut self) {
        let stat = self.stat_byte();
        self.push_irq(3, vec![stat]);
    }

    /// 0x02 Setloc(mm, ss, ff): latch the seek target.
    fn cmd_setloc(&mut self) {
        if self.param_fifo.len() < 3 {
            self.log.warn(
                LogCategory::Cdrom,
                format_args!("Setloc with {} parameter bytes", self.param_fifo.len()),
            );
            self.error_response(0x20);
            return;
        }
        let minute = bcd_to_dec(self.param_fifo.pop_front().unwrap_or(0));
        let second = bcd_to_dec(self.param_fifo.pop_front().unwrap_or(0));
        let frame = bcd_to_dec(self.param_fifo.pop_front().unwrap_or(0));

        let lba = msf_to_lba(minute, second, frame);
        self.seek_target = Some(lba);
        self.log.debug(
            LogCategory::Cdrom,
            format_args!("Setloc {:02}:{:02}:{:02} (LBA {})", minute, second, frame, lba),
        );

        let stat = self.stat_byte();
        self.push_irq(3, vec![stat]);
    }

    /// 0x06 ReadN / 0x1B ReadS: implicit seek, then periodic INT1 sectors.
    fn cmd_read(&mut self) {
        if self.disc.is_none() {
            self.error_response(0x80);
            return;
        }
        if let Some(target) = self.seek_target.take() {
            self.lba = target;
        }
        self.state = DriveState::Reading;
        self.status.reading = true;
        self.status.seeking = false;
        self.status.motor_on = true;
        self.read_countdown = self.sector_cycles();

        let stat = self.stat_byte();
        self.push_irq(3, vec![stat]);
        self.log.debug(
            LogCategory::Cdrom,
            format_args!("read started at LBA {}", self.lba),
        );
    }

    /// 0x09 Pause: stop the read loop; completion is the second response.
    fn cmd_pause(&mut self) {
        let stat = self.stat_byte();
        self.push_irq(3, vec![stat]);

        self.state = DriveState::Idle;
        self.status.reading = false;
        self.status.playing = false;
        self.schedule_second_response(SecondResponse::Pause);
    }

    /// 0x0A Init: reset mode and stop all activity.
    fn cmd_init(&mut self) {
        self.status.motor_on = true;
        self.state = DriveState::Idle;
        self.status.reading = false;
        self.status.seeking = false;
        self.status.playing = false;
        self.mode = Default::default();

        let stat = self.stat_byte();
        self.push_irq(3, vec![stat]);
        self.schedule_second_response(SecondResponse::Init);
    }

    /// 0x0D Setfilter(file, channel): XA stream selection.
    fn cmd_setfilter(&mut self) {
        if self.param_fifo.len() < 2 {
            self.error_response(0x20);
            return;
        }
        self.filter_file = self.param_fifo.pop_front().unwrap_or(0);
        self.filter_channel = self.param_fifo.pop_front().unwrap_or(0) & 0x1F;
        self.log.debug(
            LogCategory::Cdrom,
            format_args!(
                "Setfilter file={} channel={}",
                self.filter_file, self.filter_channel
            ),
        );

        let stat = self.stat_byte();
        self.push_irq(3, vec![stat]);
    }

    /// 0x0E Setmode(mode).
    fn cmd_setmode(&mut self) {
        let Some(mode_byte) = self.param_fifo.pop_front() else {
            self.error_response(0x20);
            return;
        };

        self.mode.cdda_report = mode_byte & 0x01 != 0;
        self.mode.auto_pause = mode_byte & 0x02 != 0;
        self.mode.report_all = mode_byte & 0x04 != 0;
        self.mode.xa_filter = mode_byte & 0x08 != 0;
        self.mode.ignore_bit = mode_byte & 0x10 != 0;
        self.mode.size_2340 = mode_byte & 0x20 != 0;
        self.mode.xa_adpcm = mode_byte & 0x40 != 0;
        self.mode.double_speed = mode_byte & 0x80 != 0;

        self.log.debug(
            LogCategory::Cdrom,
            format_args!(
                "Setmode 0x{:02X}: {}x, {} bytes/sector, xa={}",
                mode_byte,
                if self.mode.double_speed { 2 } else { 1 },
                if self.mode.size_2340 { 2340 } else { 2048 },
                self.mode.xa_adpcm
            ),
        );

        let stat = self.stat_byte();
        self.push_irq(3, vec![stat]);
    }

    /// 0x15 SeekL / 0x16 SeekP: seek to the latched target.
    fn cmd_seek(&mut self) {
        if self.seek_target.is_none() && self.disc.is_none() {
            self.error_response(0x80);
            return;
        }
        self.state = DriveState::Seeking;
        self.status.seeking = true;
        self.status.reading = false;

        let stat = self.stat_byte();
        self.push_irq(3, vec![stat]);
        self.schedule_second_response(SecondResponse::Seek);
    }

    /// 0x19 Test(sub): diagnostics. Sub 0x20 answers the controller
    /// firmware date.
    fn cmd_test(&mut self) {
        let Some(sub) = self.param_fifo.pop_front() else {
            self.error_response(0x20);
            return;
        };

        match sub {
            0x20 => {
                // Controller firmware date/version (1994-09-19, vC0).
                self.push_irq(3, vec![0x94, 0x09, 0x19, 0xC0]);
            }
            0x04 => {
                let stat = self.stat_byte();
                self.push_irq(3, vec![stat, 0x00, 0x00, 0x00, 0x00]);
            }
            _ => {
                self.log.warn(
                    LogCategory::Cdrom,
                    format_args!("Test sub-function 0x{:02X} unimplemented", sub),
                );
                self.error_response(0x10);
            }
        }
    }

    /// 0x1A GetID: license/region info in the second response.
    fn cmd_getid(&mut self) {
        let stat = self.stat_byte();
        self.push_irq(3, vec![stat]);
        self.schedule_second_response(SecondResponse::GetId);
    }

    /// 0x1E ReadTOC.
    fn cmd_readtoc(&mut self) {
        if self.disc.is_none() {
            self.status.id_error = true;
            self.error_response(0x80);
            return;
        }
        let stat = self.stat_byte();
        self.push_irq(3, vec![stat]);
        self.schedule_second_response(SecondResponse::ReadToc);
    }

    /// Run a second response when its countdown fires.
    pub(super) fn complete_second_response(&mut self, which: SecondResponse) {
        match which {
            SecondResponse::GetId => {
                if self.disc.is_some() {
                    let stat = self.stat_byte();
                    // stat, flags, disc type, ATIP, region string.
                    self.push_irq(2, vec![stat, 0x00, 0x20, 0x00, b'S', b'C', b'E', b'A']);
                } else {
                    self.status.id_error = true;
                    let stat = self.stat_byte() | 0x01;
                    self.push_irq(5, vec![stat, 0x80]);
                }
            }
            SecondResponse::ReadToc | SecondResponse::Init | SecondResponse::Pause => {
                let stat = self.stat_byte();
                self.push_irq(2, vec![stat]);
            }
            SecondResponse::Seek => {
                if let Some(target) = self.seek_target.take() {
                    self.lba = target;
                }
                self.state = DriveState::Idle;
                self.status.seeking = false;
                self.log.debug(
                    LogCategory::Cdrom,
                    format_args!("seek complete at LBA {}", self.lba),
                );
                let stat = self.stat_byte();
                self.push_irq(2, vec![stat]);
            }
        }
    }
}
