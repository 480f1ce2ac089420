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

//! GPU register and draw-command types.

use bitflags::bitflags;

/// Video standard; selects the VBlank cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMode {
    Ntsc,
    Pal,
}

bitflags! {
    /// Per-draw-command attribute flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DrawFlags: u8 {
        const TEXTURED = 1 << 0;
        const SEMI_TRANSPARENT = 1 << 1;
        /// Texture color is used unmodulated (no vertex color blend).
        const RAW_TEXTURE = 1 << 2;
    }
}

/// One captured vertex: position (draw offset already applied), color and
/// texture coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vertex {
    pub x: i16,
    pub y: i16,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub u: u8,
    pub v: u8,
}

/// One recorded draw command. Quads and rectangles are split into two
/// triangles before capture; lines duplicate their second vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawCmd {
    pub vertices: [Vertex; 3],
    /// CLUT cell coordinates in VRAM (16-pixel steps on x).
    pub clut_x: u16,
    pub clut_y: u16,
    /// Texture page selector as carried in textured primitives.
    pub texpage: u16,
    pub flags: DrawFlags,
    /// Semi-transparency blend equation (0-3).
    pub semi_mode: u8,
    /// Texture depth: 0 = 4-bit, 1 = 8-bit, 2 = 15-bit.
    pub tex_depth: u8,
}

/// Drawing environment set through GP0(0xE1..0xE6).
#[derive(Debug, Clone, Copy)]
pub struct DrawEnv {
    /// Texture page X base, in units of 64 pixels.
    pub texpage_x: u16,
    /// Texture page Y base: 0 or 256.
    pub texpage_y: u16,
    /// Default semi-transparency mode (0-3).
    pub semi_mode: u8,
    /// Texture depth (0=4bit, 1=8bit, 2=15bit).
    pub tex_depth: u8,
    pub dither: bool,
    pub draw_to_display: bool,
    pub texture_disable: bool,
    pub rect_x_flip: bool,
    pub rect_y_flip: bool,
    /// Texture window, in 8-pixel units.
    pub tex_window_mask_x: u8,
    pub tex_window_mask_y: u8,
    pub tex_window_offset_x: u8,
    pub tex_window_offset_y: u8,
    /// Drawing area clip rectangle, inclusive.
    pub clip_x1: u16,
    pub clip_y1: u16,
    pub clip_x2: u16,
    pub clip_y2: u16,
    /// Offset added to every vertex before clipping.
    pub offset_x: i16,
    pub offset_y: i16,
    /// Force the mask bit on written pixels.
    pub mask_set: bool,
    /// Skip pixels whose mask bit is set.
    pub mask_check: bool,
}

impl Default for DrawEnv {
    fn default() -> Self {
        Self {
            texpage_x: 0,
            texpage_y: 0,
            semi_mode: 0,
            tex_depth: 0,
            dither: false,
            draw_to_display: false,
            texture_disable: false,
            rect_x_flip: false,
            rect_y_flip: false,
            tex_window_mask_x: 0,
            tex_window_mask_y: 0,
            tex_window_offset_x: 0,
            tex_window_offset_y: 0,
            clip_x1: 0,
            clip_y1: 0,
            clip_x2: 1023,
            clip_y2: 511,
            offset_x: 0,
            offset_y: 0,
            mask_set: false,
            mask_check: false,
        }
    }
}

impl DrawEnv {
    /// Compose the 9-bit texpage selector currently in effect, in the
    /// layout textured primitives carry it.
    pub fn texpage_word(&self) -> u16 {
        (self.texpage_x & 0xF)
            | ((self.texpage_y & 1) << 4)
            | ((self.semi_mode as u16 & 3) << 5)
            | ((self.tex_depth as u16 & 3) << 7)
    }
}

/// Display configuration set through GP1.
#[derive(Debug, Clone, Copy)]
pub struct DisplayConfig {
    pub display_on: bool,
    /// DMA direction: 0=off, 1=FIFO, 2=CPU→GP0, 3=GPUREAD→CPU.
    pub dma_direction: u8,
    /// Display start in VRAM.
    pub start_x: u16,
    pub start_y: u16,
    /// Horizontal/vertical display ranges (raw GP1 values).
    pub h_range: (u16, u16),
    pub v_range: (u16, u16),
    /// Horizontal resolution bits: hr1 (0-3) and hr2 flag.
    pub hres1: u8,
    pub hres2: bool,
    pub vres_480: bool,
    pub video_mode: VideoMode,
    pub color24: bool,
    pub interlace: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            display_on: false,
            dma_direction: 0,
            start_x: 0,
            start_y: 0,
            h_range: (0x200, 0x200 + 2560),
            v_range: (0x10, 0x10 + 240),
            hres1: 0,
            hres2: false,
            vres_480: false,
            video_mode: VideoMode::Ntsc,
            color24: false,
            interlace: false,
        }
    }
}

/// GP0 parser phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gp0Phase {
    /// Waiting for a command word.
    Idle,
    /// Accumulating a fixed number of parameter words.
    Collecting,
    /// Consuming packed pixel data of a CPU→VRAM transfer.
    CpuToVramData,
    /// A VRAM→CPU transfer is draining through GPUREAD.
    VramToCpuActive,
    /// Consuming polyline vertices until the terminator word.
    Polyline,
}

/// Rectangle walk state shared by both VRAM transfer directions.
#[derive(Debug, Clone, Copy)]
pub struct TransferRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub cur_x: u16,
    pub cur_y: u16,
}

impl TransferRect {
    /// Build from the GP0 coordinate/size words, applying the hardware
    /// masking rules (wrap x to 1024, y to 512; size 0 means maximum).
    pub fn from_words(coords: u32, size: u32) -> Self {
        let x = (coords & 0x3FF) as u16;
        let y = ((coords >> 16) & 0x1FF) as u16;
        let width = ((size as u16).wrapping_sub(1) & 0x3FF).wrapping_add(1);
        let height = (((size >> 16) as u16).wrapping_sub(1) & 0x1FF).wrapping_add(1);
        Self {
            x,
            y,
            width,
            height,
            cur_x: 0,
            cur_y: 0,
        }
    }

    /// Number of 32-bit words the transfer moves (two pixels per word,
    /// rounded up).
    pub fn word_count(&self) -> u32 {
        let pixels = self.width as u32 * self.height as u32;
        (pixels + 1) / 2
    }

    /// Current VRAM position, wrapped like the hardware.
    #[inline(always)]
    pub fn position(&self) -> (u16, u16) {
        (
            (self.x + self.cur_x) & 0x3FF,
            (self.y + self.cur_y) & 0x1FF,
        )
    }

    /// Advance by one pixel in raster order. Returns false once the
    /// rectangle is exhausted.
    #[inline(always)]
    pub fn advance(&mut self) -> bool {
        self.cur_x += 1;
        if self.cur_x >= self.width {
            self.cur_x = 0;
            self.cur_y += 1;
        }
        self.cur_y < self.height
    }

    pub fn done(&self) -> bool {
        self.cur_y >= self.height
    }
}
