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

//! ADSR envelope generator.
//!
//! Each phase drives the level through the shared rate machine: a 7-bit
//! rate decomposes into a step and a counter increment
//!
//! ```text
//!   step = ±(base), base = 7 - (rate & 3)  [8 - (rate & 3) when falling]
//!   rate < 44:  step <<= 11 - (rate >> 2), increment = 0x8000
//!   rate >= 44: increment = 0x8000 >> ((rate >> 2) - 11)
//! ```
//!
//! and the step applies every time the 16-bit counter overflows.
//! Exponential decrease scales the step by `level / 0x8000`; exponential
//! increase halves step and increment once the level passes 0x6000.

/// Envelope phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdsrPhase {
    Off,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Per-voice envelope state. The raw ADSR register words are kept
/// verbatim; rates are decoded on each tick.
#[derive(Debug, Clone)]
pub struct AdsrEnvelope {
    pub adsr1: u16,
    pub adsr2: u16,
    pub phase: AdsrPhase,
    /// Current level, clamped to 0..=0x7FFF on every tick.
    pub level: i32,
    counter: u32,
}

impl Default for AdsrEnvelope {
    fn default() -> Self {
        Self {
            adsr1: 0,
            adsr2: 0,
            phase: AdsrPhase::Off,
            level: 0,
            counter: 0,
        }
    }
}

impl AdsrEnvelope {
    /// Level at which Decay hands over to Sustain.
    pub fn sustain_target(&self) -> i32 {
        (((self.adsr1 & 0x0F) as i32 + 1) * 0x800).min(0x7FFF)
    }

    /// Start the attack phase (key on).
    pub fn key_on(&mut self) {
        self.phase = AdsrPhase::Attack;
        self.level = 0;
        self.counter = 0;
    }

    /// Enter the release phase (key off).
    pub fn key_off(&mut self) {
        self.phase = AdsrPhase::Release;
        self.counter = 0;
    }

    /// Advance one 44.1 kHz tick.
    pub fn tick(&mut self) {
        let (rate, decreasing, exponential) = match self.phase {
            AdsrPhase::Off => return,
            AdsrPhase::Attack => {
                let rate = ((self.adsr1 >> 8) & 0x7F) as u32;
                let exp = self.adsr1 & 0x8000 != 0;
                (rate, false, exp)
            }
            AdsrPhase::Decay => {
                // 4-bit decay rate scales up; decay always falls
                // exponentially.
                let rate = (((self.adsr1 >> 4) & 0x0F) as u32) << 2;
                (rate, true, true)
            }
            AdsrPhase::Sustain => {
                let rate = ((self.adsr2 >> 6) & 0x7F) as u32;
                let dec = self.adsr2 & 0x4000 != 0;
                let exp = self.adsr2 & 0x8000 != 0;
                (rate, dec, exp)
            }
            AdsrPhase::Release => {
                let rate = ((self.adsr2 & 0x1F) as u32) << 2;
                let exp = self.adsr2 & 0x20 != 0;
                (rate, true, exp)
            }
        };

        let mut step: i32 = if decreasing {
            -8 + (rate & 3) as i32
        } else {
            7 - (rate & 3) as i32
        };
        let mut increment: u32 = 0x8000;
        if rate < 44 {
            step <<= 11 - (rate >> 2);
        } else {
            increment >>= (rate >> 2) - 11;
        }

        if exponential {
            if !decreasing && self.level >= 0x6000 {
                // Slow down near the top of an exponential rise.
                step /= 2;
                increment >>= 1;
            } else if decreasing {
                step = ((step as i64 * self.level as i64) >> 15) as i32;
            }
        }

        self.counter += increment;
        if self.counter < 0x8000 {
            return;
        }
        self.counter -= 0x8000;

        self.level = (self.level + step).clamp(0, 0x7FFF);

        // Phase transitions.
        match self.phase {
            AdsrPhase::Attack => {
                if self.level >= 0x7FFF {
                    self.level = 0x7FFF;
                    self.phase = AdsrPhase::Decay;
                }
            }
            AdsrPhase::Decay => {
                if self.level <= self.sustain_target() {
                    self.level = self.sustain_target();
                    self.phase = AdsrPhase::Sustain;
                }
            }
            AdsrPhase::Sustain => {
                // Runs until key-off.
            }
            AdsrPhase::Release => {
                if self.level <= 0 {
                    self.level = 0;
                    self.phase = AdsrPhase::Off;
                }
            }
            AdsrPhase::Off => {}
        }
    }
}
