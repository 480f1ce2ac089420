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

//! VRAM-mutating GP0 commands: fill, CPU→VRAM, VRAM→CPU, VRAM→VRAM.
//! Each operation takes the GPU mutex once and bumps the VRAM write
//! sequence for host dirty tracking.

use super::{vram_index, Gp0Phase, Gpu, TransferRect};
use crate::logging::LogCategory;

impl Gpu {
    /// GP0(0x02): fill a rectangle with a solid color. Coordinates snap to
    /// 16-pixel steps horizontally, like the hardware.
    pub(super) fn gp0_fill_rect(&mut self) {
        let color = self.cmd_buf[0];
        let coords = self.cmd_buf[1];
        let size = self.cmd_buf[2];

        let x = (coords & 0x3F0) as u16;
        let y = ((coords >> 16) & 0x1FF) as u16;
        let w = ((((size & 0x3FF) + 0xF) & !0xF) as u16).min(0x400);
        let h = ((size >> 16) & 0x1FF) as u16;

        // 24-bit command color down to 15-bit VRAM.
        let r = ((color & 0xFF) >> 3) as u16;
        let g = (((color >> 8) & 0xFF) >> 3) as u16;
        let b = (((color >> 16) & 0xFF) >> 3) as u16;
        let pixel = r | (g << 5) | (b << 10);

        self.log.debug(
            LogCategory::Gpu,
            format_args!("fill ({}, {}) {}×{} = 0x{:04X}", x, y, w, h, pixel),
        );

        self.with_shared(|s| {
            for dy in 0..h {
                for dx in 0..w {
                    let idx = vram_index(x.wrapping_add(dx), y.wrapping_add(dy));
                    s.vram[idx] = pixel;
                }
            }
            s.write_seq += 1;
        });
    }

    /// GP0(0xA0): switch the parser into the pixel-data phase of a
    /// CPU→VRAM transfer. The transfer consumes `ceil(w*h/2)` words.
    pub(super) fn gp0_begin_cpu_to_vram(&mut self) {
        let rect = TransferRect::from_words(self.cmd_buf[1], self.cmd_buf[2]);
        self.log.debug(
            LogCategory::Gpu,
            format_args!(
                "CPU→VRAM transfer: ({}, {}) {}×{}",
                rect.x, rect.y, rect.width, rect.height
            ),
        );
        self.begin_cpu_to_vram_data(rect);
    }

    /// One data word of a CPU→VRAM transfer: two packed pixels.
    pub(super) fn consume_load_word(&mut self, word: u32) {
        let Some(mut rect) = self.load_rect.take() else {
            self.phase = Gp0Phase::Idle;
            return;
        };

        self.with_shared(|s| {
            let (x, y) = rect.position();
            s.vram[vram_index(x, y)] = word as u16;
            if rect.advance() {
                let (x, y) = rect.position();
                s.vram[vram_index(x, y)] = (word >> 16) as u16;
                rect.advance();
            }
            s.write_seq += 1;
        });

        self.load_words_remaining = self.load_words_remaining.saturating_sub(1);
        if self.load_words_remaining == 0 || rect.done() {
            self.log
                .debug(LogCategory::Gpu, format_args!("CPU→VRAM transfer complete"));
            self.phase = Gp0Phase::Idle;
        } else {
            self.load_rect = Some(rect);
        }
    }

    /// GP0(0xC0): arm a VRAM→CPU transfer; pixels drain through GPUREAD.
    pub(super) fn gp0_begin_vram_to_cpu(&mut self) {
        let rect = TransferRect::from_words(self.cmd_buf[1], self.cmd_buf[2]);
        self.log.debug(
            LogCategory::Gpu,
            format_args!(
                "VRAM→CPU transfer: ({}, {}) {}×{}",
                rect.x, rect.y, rect.width, rect.height
            ),
        );
        self.begin_vram_to_cpu_data(rect);
    }

    /// GP0(0x80): rectangle copy inside VRAM. Overlap-safe via a staging
    /// buffer.
    pub(super) fn gp0_vram_copy(&mut self) {
        let src = self.cmd_buf[1];
        let dst = self.cmd_buf[2];
        let size = self.cmd_buf[3];

        let src_x = (src & 0x3FF) as u16;
        let src_y = ((src >> 16) & 0x1FF) as u16;
        let dst_x = (dst & 0x3FF) as u16;
        let dst_y = ((dst >> 16) & 0x1FF) as u16;
        let w = ((size as u16).wrapping_sub(1) & 0x3FF).wrapping_add(1);
        let h = (((size >> 16) as u16).wrapping_sub(1) & 0x1FF).wrapping_add(1);

        self.log.debug(
            LogCategory::Gpu,
            format_args!(
                "VRAM→VRAM copy ({}, {}) → ({}, {}) {}×{}",
                src_x, src_y, dst_x, dst_y, w, h
            ),
        );

        self.with_shared(|s| {
            let mut staging = vec![0u16; w as usize * h as usize];
            for dy in 0..h {
                for dx in 0..w {
                    let idx = vram_index(src_x.wrapping_add(dx), src_y.wrapping_add(dy));
                    staging[dy as usize * w as usize + dx as usize] = s.vram[idx];
                }
            }
            for dy in 0..h {
                for dx in 0..w {
                    let idx = vram_index(dst_x.wrapping_add(dx), dst_y.wrapping_add(dy));
                    s.vram[idx] = staging[dy as usize * w as usize + dx as usize];
                }
            }
            s.write_seq += 1;
        });
    }
}
