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

//! Root counters (timers 0-2), coarse model.
//!
//! All three channels count the system clock; the dotclock and hblank
//! sources of timers 0/1 are approximated by sysclock. Target match and
//! overflow set the mode status bits, optionally reset the counter and
//! raise IRQ 4/5/6. Finer source modeling can be added when a guest
//! needs it.

use crate::core::interrupt::{irq, InterruptController};
use crate::logging::{LogCategory, Logger};

/// One timer channel.
#[derive(Default)]
struct TimerChannel {
    counter: u32,
    mode: u16,
    target: u16,
    /// Fires once per arming (one-shot IRQ mode).
    irq_fired: bool,
}

impl TimerChannel {
    /// Mode bits.
    const RESET_AT_TARGET: u16 = 1 << 3;
    const IRQ_AT_TARGET: u16 = 1 << 4;
    const IRQ_AT_OVERFLOW: u16 = 1 << 5;
    const IRQ_REPEAT: u16 = 1 << 6;
    const REACHED_TARGET: u16 = 1 << 11;
    const REACHED_OVERFLOW: u16 = 1 << 12;

    /// Advance by `cycles` sysclock ticks; returns true when an IRQ fires.
    fn tick(&mut self, cycles: u32) -> bool {
        let mut raise = false;
        let target = if self.target == 0 { 0x10000 } else { self.target as u32 };
        let mut counter = self.counter + cycles;

        // Target match.
        if self.counter < target && counter >= target {
            self.mode |= Self::REACHED_TARGET;
            if self.mode & Self::IRQ_AT_TARGET != 0 {
                raise = true;
            }
            if self.mode & Self::RESET_AT_TARGET != 0 {
                counter %= target;
            }
        }

        // Overflow.
        if counter > 0xFFFF {
            self.mode |= Self::REACHED_OVERFLOW;
            if self.mode & Self::IRQ_AT_OVERFLOW != 0 {
                raise = true;
            }
            counter &= 0xFFFF;
        }

        self.counter = counter;

        if raise {
            if self.mode & Self::IRQ_REPEAT == 0 {
                if self.irq_fired {
                    return false;
                }
                self.irq_fired = true;
            }
            return true;
        }
        false
    }

    fn write_mode(&mut self, value: u16) {
        // Writing the mode register resets the counter and re-arms IRQs.
        self.mode = value & 0x3FF;
        self.counter = 0;
        self.irq_fired = false;
    }

    fn read_mode(&mut self) -> u16 {
        let value = self.mode;
        // The reached bits clear on read.
        self.mode &= !(Self::REACHED_TARGET | Self::REACHED_OVERFLOW);
        value
    }
}

/// The three root counters.
pub struct Timers {
    channels: [TimerChannel; 3],
    log: Logger,
}

impl Timers {
    const BASE: u32 = 0x1F80_1100;

    pub fn new() -> Self {
        Self {
            channels: Default::default(),
            log: Logger::null(),
        }
    }

    pub fn set_logger(&mut self, log: Logger) {
        self.log = log;
    }

    /// Advance all channels; raises timer IRQ lines as needed.
    pub fn tick(&mut self, cycles: u32, irq_ctl: &mut InterruptController) {
        const LINES: [u16; 3] = [irq::TIMER0, irq::TIMER1, irq::TIMER2];
        for (i, channel) in self.channels.iter_mut().enumerate() {
            if channel.tick(cycles) {
                irq_ctl.raise(LINES[i]);
            }
        }
    }

    /// 32-bit MMIO read (registers are 16 bits wide).
    pub fn read_register(&mut self, addr: u32) -> u32 {
        let channel = ((addr - Self::BASE) >> 4) as usize;
        if channel >= 3 {
            return 0;
        }
        match addr & 0xF {
            0x0 => self.channels[channel].counter & 0xFFFF,
            0x4 => self.channels[channel].read_mode() as u32,
            0x8 => self.channels[channel].target as u32,
            _ => {
                self.log.warn(
                    LogCategory::Io,
                    format_args!("timer read at unknown offset 0x{:08X}", addr),
                );
                0
            }
        }
    }

    /// 32-bit MMIO write.
    pub fn write_register(&mut self, addr: u32, value: u32) {
        let channel = ((addr - Self::BASE) >> 4) as usize;
        if channel >= 3 {
            return;
        }
        match addr & 0xF {
            0x0 => self.channels[channel].counter = value & 0xFFFF,
            0x4 => self.channels[channel].write_mode(value as u16),
            0x8 => self.channels[channel].target = value as u16,
            _ => {
                self.log.warn(
                    LogCategory::Io,
                    format_args!("timer write at unknown offset 0x{:08X}", addr),
                );
            }
        }
    }
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}
