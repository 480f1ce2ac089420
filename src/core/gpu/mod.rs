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

//! GPU: GP0 command pipeline, VRAM store and VBlank generator.
//!
//! This GPU is a command recorder, not a rasterizer. The GP0 port is a
//! stateful parser — commands carry between 0 and 11 parameter words, and
//! some switch the port into a data-streaming phase (CPU↔VRAM image
//! transfers, polylines). Every triangle, quad, rectangle or line that
//! makes it through the parser is captured as a [`DrawCmd`] on the
//! per-frame active list; at each VBlank the active and ready lists swap
//! under the GPU mutex, and a host can copy the ready list (and VRAM) at
//! any time from another thread.
//!
//! Fill and transfer commands mutate VRAM directly; every VRAM mutation
//! bumps a monotonically increasing sequence number for host dirty
//! tracking.
//!
//! # VRAM
//!
//! 1024×512 pixels of 16-bit storage (1 MiB), row-major, 5-5-5 RGB plus
//! the mask bit in bit 15.

use std::sync::{Arc, Mutex, PoisonError};

use crate::core::interrupt::{irq, InterruptController};
use crate::logging::{LogCategory, Logger};

mod commands;
mod registers;
mod transfer;

pub use registers::{
    DisplayConfig, DrawCmd, DrawEnv, DrawFlags, Gp0Phase, TransferRect, Vertex, VideoMode,
};

/// State shared with host threads, guarded by the GPU mutex.
pub struct GpuShared {
    /// VRAM as one flat row-major buffer.
    pub vram: Vec<u16>,
    /// Bumped on every VRAM mutation.
    pub write_seq: u64,
    /// Draw commands of the last completed frame.
    pub ready_list: Vec<DrawCmd>,
}

/// Polyline consumption state (GP0 0x48.. family).
struct PolylineState {
    shaded: bool,
    semi_transparent: bool,
    /// Color of the segment start point.
    color: u32,
    /// For shaded polylines: the color word arrives before each vertex.
    pending_color: Option<u32>,
    last_x: i16,
    last_y: i16,
}

pub struct Gpu {
    shared: Arc<Mutex<GpuShared>>,
    /// Draw commands accumulated for the frame in flight.
    active_list: Vec<DrawCmd>,
    pub(crate) env: DrawEnv,
    pub(crate) display: DisplayConfig,
    phase: Gp0Phase,
    /// Command word + collected parameters.
    cmd_buf: Vec<u32>,
    params_needed: usize,
    /// CPU→VRAM streaming state.
    load_rect: Option<TransferRect>,
    load_words_remaining: u32,
    /// VRAM→CPU streaming state (drained through GPUREAD).
    read_rect: Option<TransferRect>,
    polyline: Option<PolylineState>,
    /// GPUREAD latch for GP1(0x10) info queries.
    read_latch: u32,
    irq_request: bool,
    /// Cycle accumulator for the VBlank divider.
    vblank_div: u64,
    in_vblank: bool,
    odd_field: bool,
    frame_count: u64,
    /// Disable draw-area clipping of captured commands.
    no_clip: bool,
    /// Raw (port, value) capture for the harness GPU dump.
    port_capture: Option<Vec<(u32, u32)>>,
    pub(crate) log: Logger,
}

impl Gpu {
    pub const VRAM_WIDTH: usize = 1024;
    pub const VRAM_HEIGHT: usize = 512;
    pub const VRAM_PIXELS: usize = Self::VRAM_WIDTH * Self::VRAM_HEIGHT;

    /// VBlank cadence in CPU cycles.
    pub const VBLANK_PERIOD_PAL: u64 = 680_688;
    pub const VBLANK_DURATION_PAL: u64 = 43_370;
    pub const VBLANK_PERIOD_NTSC: u64 = 571_088;
    pub const VBLANK_DURATION_NTSC: u64 = 36_334;

    /// Polyline terminator pattern.
    const POLYLINE_TERMINATOR_MASK: u32 = 0xF000_F000;
    const POLYLINE_TERMINATOR: u32 = 0x5000_5000;

    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(GpuShared {
                vram: vec![0u16; Self::VRAM_PIXELS],
                write_seq: 0,
                ready_list: Vec::new(),
            })),
            active_list: Vec::new(),
            env: DrawEnv::default(),
            display: DisplayConfig::default(),
            phase: Gp0Phase::Idle,
            cmd_buf: Vec::with_capacity(16),
            params_needed: 0,
            load_rect: None,
            load_words_remaining: 0,
            read_rect: None,
            polyline: None,
            read_latch: 0,
            irq_request: false,
            vblank_div: 0,
            in_vblank: false,
            odd_field: false,
            frame_count: 0,
            no_clip: false,
            port_capture: None,
            log: Logger::null(),
        }
    }

    pub fn set_logger(&mut self, log: Logger) {
        self.log = log;
    }

    pub fn set_video_mode(&mut self, mode: VideoMode) {
        self.display.video_mode = mode;
    }

    /// Disable clipping of captured draw commands to the draw area.
    pub fn set_no_clip(&mut self, on: bool) {
        self.no_clip = on;
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_in_vblank(&self) -> bool {
        self.in_vblank
    }

    pub(crate) fn phase(&self) -> Gp0Phase {
        self.phase
    }

    // --- Shared-state access ----------------------------------------------

    #[inline]
    pub(crate) fn with_shared<R>(&self, f: impl FnOnce(&mut GpuShared) -> R) -> R {
        let mut guard = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Read one VRAM pixel (wrapping coordinates like the hardware).
    pub fn read_vram(&self, x: u16, y: u16) -> u16 {
        self.with_shared(|s| s.vram[vram_index(x, y)])
    }

    /// Write one VRAM pixel and bump the write sequence.
    pub fn write_vram(&mut self, x: u16, y: u16, value: u16) {
        self.with_shared(|s| {
            s.vram[vram_index(x, y)] = value;
            s.write_seq += 1;
        });
    }

    /// Copy the ready draw list into `out`.
    pub fn copy_ready_draw_list(&self, out: &mut Vec<DrawCmd>) {
        self.with_shared(|s| {
            out.clear();
            out.extend_from_slice(&s.ready_list);
        });
    }

    /// Copy VRAM into `out` (must hold 1024×512 pixels) and report the
    /// current write sequence.
    pub fn copy_vram(&self, out: &mut [u16], seq: &mut u64) {
        debug_assert_eq!(out.len(), Self::VRAM_PIXELS);
        self.with_shared(|s| {
            let n = out.len().min(s.vram.len());
            out[..n].copy_from_slice(&s.vram[..n]);
            *seq = s.write_seq;
        });
    }

    /// Current VRAM write sequence number.
    pub fn vram_write_seq(&self) -> u64 {
        self.with_shared(|s| s.write_seq)
    }

    pub(crate) fn push_draw_cmd(&mut self, cmd: DrawCmd) {
        self.active_list.push(cmd);
    }

    // --- Port capture (harness GPU dump) ----------------------------------

    pub fn enable_port_capture(&mut self) {
        if self.port_capture.is_none() {
            self.port_capture = Some(Vec::new());
        }
    }

    pub fn drain_port_capture(&mut self, out: &mut Vec<(u32, u32)>) {
        if let Some(cap) = &mut self.port_capture {
            out.append(cap);
        }
    }

    // --- GP0 ---------------------------------------------------------------

    /// Parameter-word count for a GP0 command, or None for unknown opcodes.
    fn gp0_params(op: u8) -> Option<usize> {
        match op {
            0x02 => Some(2),
            // NOP and cache clear; 0x03..0x1E are documented no-ops.
            0x00 | 0x01 | 0x03..=0x1E => Some(0),
            // IRQ request.
            0x1F => Some(0),
            // Polygons: count vertices, texture words and shading colors.
            0x20..=0x3F => {
                let quad = op & 0x08 != 0;
                let textured = op & 0x04 != 0;
                let shaded = op & 0x10 != 0;
                let verts: usize = if quad { 4 } else { 3 };
                let per_vertex = 1 + usize::from(textured);
                let extra_colors = if shaded { verts - 1 } else { 0 };
                Some(verts * per_vertex + extra_colors)
            }
            // Lines: the initial segment; polylines keep consuming after.
            0x40..=0x5F => {
                let shaded = op & 0x10 != 0;
                Some(if shaded { 3 } else { 2 })
            }
            // Rectangles: xy, optional size word, optional uv/clut word.
            0x60..=0x7F => {
                let variable_size = op & 0x18 == 0;
                let textured = op & 0x04 != 0;
                Some(1 + usize::from(variable_size) + usize::from(textured))
            }
            0x80 => Some(3),
            0xA0 => Some(2),
            0xC0 => Some(2),
            0xE1..=0xE6 => Some(0),
            _ => None,
        }
    }

    /// Feed one word to the GP0 port.
    pub fn write_gp0(&mut self, word: u32) {
        if let Some(cap) = &mut self.port_capture {
            cap.push((0, word));
        }

        match self.phase {
            Gp0Phase::CpuToVramData => self.consume_load_word(word),
            Gp0Phase::Polyline => self.consume_polyline_word(word),
            Gp0Phase::Collecting => {
                self.cmd_buf.push(word);
                if self.cmd_buf.len() == self.params_needed + 1 {
                    self.phase = Gp0Phase::Idle;
                    self.execute_gp0();
                }
            }
            Gp0Phase::Idle | Gp0Phase::VramToCpuActive => {
                if self.phase == Gp0Phase::VramToCpuActive {
                    // A fresh command abandons the read transfer.
                    self.log.debug(
                        LogCategory::Gpu,
                        format_args!("GP0 command cancels an active VRAM→CPU transfer"),
                    );
                    self.read_rect = None;
                    self.phase = Gp0Phase::Idle;
                }

                let op = (word >> 24) as u8;
                match Self::gp0_params(op) {
                    None => {
                        // Malformed command: log with context and recover by
                        // resetting the parser.
                        self.log.warn(
                            LogCategory::Gpu,
                            format_args!("malformed GP0 command 0x{:02X} (word 0x{:08X}), parser reset", op, word),
                        );
                        self.cmd_buf.clear();
                        self.phase = Gp0Phase::Idle;
                    }
                    Some(0) => {
                        self.cmd_buf.clear();
                        self.cmd_buf.push(word);
                        self.execute_gp0();
                    }
                    Some(n) => {
                        self.cmd_buf.clear();
                        self.cmd_buf.push(word);
                        self.params_needed = n;
                        self.phase = Gp0Phase::Collecting;
                    }
                }
            }
        }
    }

    /// Execute a fully collected GP0 command.
    fn execute_gp0(&mut self) {
        let op = (self.cmd_buf[0] >> 24) as u8;
        match op {
            0x00 | 0x01 | 0x03..=0x1E => {}
            0x1F => {
                self.irq_request = true;
            }
            0x02 => self.gp0_fill_rect(),
            0x20..=0x3F => self.gp0_polygon(),
            0x40..=0x5F => self.gp0_line(),
            0x60..=0x7F => self.gp0_rectangle(),
            0x80 => self.gp0_vram_copy(),
            0xA0 => self.gp0_begin_cpu_to_vram(),
            0xC0 => self.gp0_begin_vram_to_cpu(),
            0xE1 => self.gp0_draw_mode(),
            0xE2 => self.gp0_texture_window(),
            0xE3 => self.gp0_draw_area_top_left(),
            0xE4 => self.gp0_draw_area_bottom_right(),
            0xE5 => self.gp0_draw_offset(),
            0xE6 => self.gp0_mask_settings(),
            _ => {
                self.log.warn(
                    LogCategory::Gpu,
                    format_args!("unhandled GP0 command 0x{:02X}", op),
                );
            }
        }
        self.cmd_buf.clear();
    }

    /// Consume one polyline word: terminator, color (shaded) or vertex.
    fn consume_polyline_word(&mut self, word: u32) {
        if word & Self::POLYLINE_TERMINATOR_MASK == Self::POLYLINE_TERMINATOR {
            self.polyline = None;
            self.phase = Gp0Phase::Idle;
            return;
        }

        let Some(mut state) = self.polyline.take() else {
            self.phase = Gp0Phase::Idle;
            return;
        };

        if state.shaded && state.pending_color.is_none() {
            state.pending_color = Some(word & 0xFF_FFFF);
            self.polyline = Some(state);
            return;
        }

        let (x, y) = vertex_xy(word);
        let start_color = state.color;
        let end_color = state.pending_color.take().unwrap_or(start_color);
        let semi = state.semi_transparent;
        let (lx, ly) = (state.last_x, state.last_y);

        self.emit_line(lx, ly, start_color, x, y, end_color, semi);

        state.last_x = x;
        state.last_y = y;
        state.color = end_color;
        self.polyline = Some(state);
    }

    /// Enter polyline mode after the initial segment.
    pub(crate) fn begin_polyline(
        &mut self,
        shaded: bool,
        semi_transparent: bool,
        color: u32,
        last_x: i16,
        last_y: i16,
    ) {
        self.polyline = Some(PolylineState {
            shaded,
            semi_transparent,
            color,
            pending_color: None,
            last_x,
            last_y,
        });
        self.phase = Gp0Phase::Polyline;
    }

    pub(crate) fn begin_cpu_to_vram_data(&mut self, rect: TransferRect) {
        self.load_words_remaining = rect.word_count();
        self.load_rect = Some(rect);
        self.phase = Gp0Phase::CpuToVramData;
    }

    pub(crate) fn begin_vram_to_cpu_data(&mut self, rect: TransferRect) {
        self.read_rect = Some(rect);
        self.phase = Gp0Phase::VramToCpuActive;
    }

    /// Read the GPUREAD port: transfer pixels in raster order, else the
    /// GP1(0x10) info latch.
    pub fn read_gpuread(&mut self) -> u32 {
        let Some(mut rect) = self.read_rect.take() else {
            return self.read_latch;
        };

        let value = self.with_shared(|s| {
            let (x, y) = rect.position();
            let p1 = s.vram[vram_index(x, y)] as u32;
            let p2 = if rect.advance() {
                let (x, y) = rect.position();
                let p = s.vram[vram_index(x, y)] as u32;
                rect.advance();
                p
            } else {
                0
            };
            p1 | (p2 << 16)
        });

        if rect.done() {
            self.log.debug(
                LogCategory::Gpu,
                format_args!("VRAM→CPU transfer complete"),
            );
            self.phase = Gp0Phase::Idle;
        } else {
            self.read_rect = Some(rect);
        }
        self.read_latch = value;
        value
    }

    // --- GP1 ---------------------------------------------------------------

    /// Feed one word to the GP1 control port.
    pub fn write_gp1(&mut self, word: u32) {
        if let Some(cap) = &mut self.port_capture {
            cap.push((1, word));
        }

        let op = (word >> 24) & 0xFF;
        match op {
            0x00 => {
                // Reset GPU: state to defaults; VRAM is preserved.
                self.env = DrawEnv::default();
                let video_mode = self.display.video_mode;
                self.display = DisplayConfig {
                    video_mode,
                    ..DisplayConfig::default()
                };
                self.cmd_buf.clear();
                self.phase = Gp0Phase::Idle;
                self.load_rect = None;
                self.read_rect = None;
                self.polyline = None;
                self.irq_request = false;
            }
            0x01 => {
                // Reset command buffer / parser.
                self.cmd_buf.clear();
                self.phase = Gp0Phase::Idle;
                self.load_rect = None;
                self.polyline = None;
            }
            0x02 => {
                self.irq_request = false;
            }
            0x03 => {
                self.display.display_on = word & 1 == 0;
            }
            0x04 => {
                self.display.dma_direction = (word & 3) as u8;
            }
            0x05 => {
                self.display.start_x = (word & 0x3FE) as u16;
                self.display.start_y = ((word >> 10) & 0x1FF) as u16;
            }
            0x06 => {
                self.display.h_range = ((word & 0xFFF) as u16, ((word >> 12) & 0xFFF) as u16);
            }
            0x07 => {
                self.display.v_range = ((word & 0x3FF) as u16, ((word >> 10) & 0x3FF) as u16);
            }
            0x08 => {
                self.display.hres1 = (word & 3) as u8;
                self.display.vres_480 = word & (1 << 2) != 0;
                self.display.video_mode = if word & (1 << 3) != 0 {
                    VideoMode::Pal
                } else {
                    VideoMode::Ntsc
                };
                self.display.color24 = word & (1 << 4) != 0;
                self.display.interlace = word & (1 << 5) != 0;
                self.display.hres2 = word & (1 << 6) != 0;
                self.log.debug(
                    LogCategory::Gpu,
                    format_args!("display mode: 0x{:06X} ({:?})", word & 0xFF_FFFF, self.display.video_mode),
                );
            }
            0x10 => {
                // GPUINFO: latch a readback value into GPUREAD.
                self.read_latch = match word & 0xF {
                    0x2 => {
                        (self.env.tex_window_mask_x as u32)
                            | ((self.env.tex_window_mask_y as u32) << 5)
                            | ((self.env.tex_window_offset_x as u32) << 10)
                            | ((self.env.tex_window_offset_y as u32) << 15)
                    }
                    0x3 => (self.env.clip_x1 as u32) | ((self.env.clip_y1 as u32) << 10),
                    0x4 => (self.env.clip_x2 as u32) | ((self.env.clip_y2 as u32) << 10),
                    0x5 => {
                        ((self.env.offset_x as u32) & 0x7FF)
                            | (((self.env.offset_y as u32) & 0x7FF) << 11)
                    }
                    0x7 => 2, // GPU version
                    _ => self.read_latch,
                };
            }
            _ => {
                self.log.warn(
                    LogCategory::Gpu,
                    format_args!("unknown GP1 command 0x{:02X}", op),
                );
            }
        }
    }

    /// Compose the GPUSTAT word.
    pub fn status(&self) -> u32 {
        let mut status = 0u32;

        status |= (self.env.texpage_x as u32) & 0xF;
        status |= ((self.env.texpage_y as u32) & 1) << 4;
        status |= ((self.env.semi_mode as u32) & 3) << 5;
        status |= ((self.env.tex_depth as u32) & 3) << 7;
        status |= (self.env.dither as u32) << 9;
        status |= (self.env.draw_to_display as u32) << 10;
        status |= (self.env.mask_set as u32) << 11;
        status |= (self.env.mask_check as u32) << 12;
        status |= (self.odd_field as u32) << 13;
        status |= (self.env.texture_disable as u32) << 15;
        status |= ((self.display.hres2 as u32) & 1) << 16;
        status |= ((self.display.hres1 as u32) & 3) << 17;
        status |= (self.display.vres_480 as u32) << 19;
        status |= ((self.display.video_mode == VideoMode::Pal) as u32) << 20;
        status |= (self.display.color24 as u32) << 21;
        status |= (self.display.interlace as u32) << 22;
        status |= (!self.display.display_on as u32) << 23;
        status |= (self.irq_request as u32) << 24;

        // Ready bits: command word, VRAM→CPU data, DMA block.
        let ready_cmd = self.phase == Gp0Phase::Idle;
        let ready_vram = self.phase == Gp0Phase::VramToCpuActive;
        let ready_dma = self.phase != Gp0Phase::Collecting;
        status |= (ready_cmd as u32) << 26;
        status |= (ready_vram as u32) << 27;
        status |= (ready_dma as u32) << 28;

        // DMA request mirrors the selected readiness.
        let dma_request = match self.display.dma_direction {
            1 => true,
            2 => ready_dma,
            3 => ready_vram,
            _ => false,
        };
        status |= (dma_request as u32) << 25;
        status |= ((self.display.dma_direction as u32) & 3) << 29;

        // Drawing even/odd line flag; forced even during VBlank.
        if self.odd_field && !self.in_vblank {
            status |= 1 << 31;
        }

        status
    }

    // --- VBlank generator --------------------------------------------------

    fn vblank_timing(&self) -> (u64, u64) {
        match self.display.video_mode {
            VideoMode::Pal => (Self::VBLANK_PERIOD_PAL, Self::VBLANK_DURATION_PAL),
            VideoMode::Ntsc => (Self::VBLANK_PERIOD_NTSC, Self::VBLANK_DURATION_NTSC),
        }
    }

    /// Advance the VBlank divider. Handles several boundary crossings per
    /// call so the cadence is independent of the bus tick batch size.
    pub fn tick(&mut self, cycles: u32, irq_ctl: &mut InterruptController) {
        let (period, duration) = self.vblank_timing();
        let active = period - duration;

        self.vblank_div += cycles as u64;
        loop {
            if !self.in_vblank {
                if self.vblank_div < active {
                    break;
                }
                self.vblank_div -= active;
                self.in_vblank = true;
                irq_ctl.raise(irq::VBLANK);
                self.log.trace(LogCategory::Gpu, format_args!("vblank start"));
            } else {
                if self.vblank_div < duration {
                    break;
                }
                self.vblank_div -= duration;
                self.in_vblank = false;
                self.odd_field = !self.odd_field;
                self.frame_count += 1;
                self.swap_frame_lists();
            }
        }
    }

    /// Swap active/ready draw lists under the mutex; the new active list
    /// is cleared but keeps its allocation.
    fn swap_frame_lists(&mut self) {
        let active = &mut self.active_list;
        let mut guard = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::swap(active, &mut guard.ready_list);
        active.clear();
    }
}

impl Default for Gpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Flat VRAM index with hardware coordinate wrapping.
#[inline(always)]
pub(crate) fn vram_index(x: u16, y: u16) -> usize {
    let x = (x & 0x3FF) as usize;
    let y = (y & 0x1FF) as usize;
    y * Gpu::VRAM_WIDTH + x
}

/// Sign-extend the 11-bit vertex coordinates of a GP0 XY word.
#[inline(always)]
pub(crate) fn vertex_xy(word: u32) -> (i16, i16) {
    let x = ((word & 0x7FF) as i16) << 5 >> 5;
    let y = (((word >> 16) & 0x7FF) as i16) << 5 >> 5;
    (x, y)
}

#[cfg(test)]
mod tests;
