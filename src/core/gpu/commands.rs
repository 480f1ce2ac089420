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

//! GP0 drawing commands: polygons, lines, rectangles and the E1-E6
//! environment settings. Drawing here means capturing [`DrawCmd`] records;
//! rasterization is the host's business.

use super::{vertex_xy, DrawCmd, DrawFlags, Gpu, Vertex};
use crate::logging::LogCategory;

/// Split a BGR command/color word into bytes.
#[inline(always)]
fn color_rgb(word: u32) -> (u8, u8, u8) {
    (
        (word & 0xFF) as u8,
        ((word >> 8) & 0xFF) as u8,
        ((word >> 16) & 0xFF) as u8,
    )
}

impl Gpu {
    // --- Primitive capture -------------------------------------------------

    /// Append a triangle to the active list, applying the draw offset and
    /// the draw-area clip test.
    pub(super) fn emit_triangle(
        &mut self,
        mut vertices: [Vertex; 3],
        flags: DrawFlags,
        clut_word: u32,
        texpage: u16,
    ) {
        for v in &mut vertices {
            v.x = v.x.wrapping_add(self.env.offset_x);
            v.y = v.y.wrapping_add(self.env.offset_y);
        }

        if !self.no_clip && !self.triangle_visible(&vertices) {
            self.log.trace(
                LogCategory::Gpu,
                format_args!("triangle outside draw area, dropped"),
            );
            return;
        }

        let cmd = DrawCmd {
            vertices,
            clut_x: ((clut_word >> 16) & 0x3F) as u16 * 16,
            clut_y: ((clut_word >> 22) & 0x1FF) as u16,
            texpage,
            flags,
            semi_mode: if flags.contains(DrawFlags::TEXTURED) {
                ((texpage >> 5) & 3) as u8
            } else {
                self.env.semi_mode
            },
            tex_depth: if flags.contains(DrawFlags::TEXTURED) {
                ((texpage >> 7) & 3) as u8
            } else {
                self.env.tex_depth
            },
        };
        self.push_draw_cmd(cmd);
    }

    /// Bounding-box test against the draw area.
    fn triangle_visible(&self, vertices: &[Vertex; 3]) -> bool {
        let min_x = vertices.iter().map(|v| v.x).min().unwrap_or(0);
        let max_x = vertices.iter().map(|v| v.x).max().unwrap_or(0);
        let min_y = vertices.iter().map(|v| v.y).min().unwrap_or(0);
        let max_y = vertices.iter().map(|v| v.y).max().unwrap_or(0);

        (max_x as i32) >= self.env.clip_x1 as i32
            && (min_x as i32) <= self.env.clip_x2 as i32
            && (max_y as i32) >= self.env.clip_y1 as i32
            && (min_y as i32) <= self.env.clip_y2 as i32
    }

    /// Capture a line segment as a degenerate triangle (third vertex
    /// duplicates the second).
    #[allow(clippy::too_many_arguments)]
    pub(super) fn emit_line(
        &mut self,
        x0: i16,
        y0: i16,
        color0: u32,
        x1: i16,
        y1: i16,
        color1: u32,
        semi_transparent: bool,
    ) {
        let (r0, g0, b0) = color_rgb(color0);
        let (r1, g1, b1) = color_rgb(color1);
        let v0 = Vertex {
            x: x0,
            y: y0,
            r: r0,
            g: g0,
            b: b0,
            u: 0,
            v: 0,
        };
        let v1 = Vertex {
            x: x1,
            y: y1,
            r: r1,
            g: g1,
            b: b1,
            u: 0,
            v: 0,
        };
        let flags = if semi_transparent {
            DrawFlags::SEMI_TRANSPARENT
        } else {
            DrawFlags::empty()
        };
        self.emit_triangle([v0, v1, v1], flags, 0, 0);
    }

    // --- Polygons ----------------------------------------------------------

    /// GP0(0x20..0x3F): triangles and quads, flat/shaded × raw/textured ×
    /// opaque/semi-transparent. Word layout (per vertex): [color] xy [uvclut].
    pub(super) fn gp0_polygon(&mut self) {
        let cmd = self.cmd_buf[0];
        let op = (cmd >> 24) as u8;
        let quad = op & 0x08 != 0;
        let textured = op & 0x04 != 0;
        let shaded = op & 0x10 != 0;
        let semi_transparent = op & 0x02 != 0;
        // Bit 0 of textured polygons: raw texture (no color modulation).
        let raw_texture = textured && op & 0x01 != 0;

        let vert_count: usize = if quad { 4 } else { 3 };
        let mut vertices = [Vertex::default(); 4];
        let mut clut_word = 0u32;
        let mut texpage = self.env.texpage_word();

        let mut idx = 1usize; // word cursor; cmd_buf[0] is the command word

        for i in 0..vert_count {
            let color = if shaded && i > 0 {
                let c = self.cmd_buf[idx] & 0xFF_FFFF;
                idx += 1;
                c
            } else {
                cmd & 0xFF_FFFF
            };
            let (r, g, b) = color_rgb(color);

            let xy_word = self.cmd_buf[idx];
            idx += 1;
            let (x, y) = vertex_xy(xy_word);

            let (u, v) = if textured {
                let uv_word = self.cmd_buf[idx];
                idx += 1;
                // The first texture word carries the CLUT cell, the second
                // the texture page.
                match i {
                    0 => clut_word = uv_word,
                    1 => texpage = ((uv_word >> 16) & 0x3FFF) as u16,
                    _ => {}
                }
                ((uv_word & 0xFF) as u8, ((uv_word >> 8) & 0xFF) as u8)
            } else {
                (0, 0)
            };

            vertices[i] = Vertex { x, y, r, g, b, u, v };
        }

        let mut flags = DrawFlags::empty();
        if textured {
            flags |= DrawFlags::TEXTURED;
        }
        if semi_transparent {
            flags |= DrawFlags::SEMI_TRANSPARENT;
        }
        if raw_texture {
            flags |= DrawFlags::RAW_TEXTURE;
        }
        let texpage = if textured { texpage } else { 0 };

        self.emit_triangle(
            [vertices[0], vertices[1], vertices[2]],
            flags,
            clut_word,
            texpage,
        );
        if quad {
            self.emit_triangle(
                [vertices[1], vertices[2], vertices[3]],
                flags,
                clut_word,
                texpage,
            );
        }
    }

    // --- Lines -------------------------------------------------------------

    /// GP0(0x40..0x5F): single segments and polylines, flat or shaded.
    pub(super) fn gp0_line(&mut self) {
        let cmd = self.cmd_buf[0];
        let op = (cmd >> 24) as u8;
        let shaded = op & 0x10 != 0;
        let polyline = op & 0x08 != 0;
        let semi_transparent = op & 0x02 != 0;

        let color0 = cmd & 0xFF_FFFF;
        let (x0, y0) = vertex_xy(self.cmd_buf[1]);
        let (color1, xy1) = if shaded {
            (self.cmd_buf[2] & 0xFF_FFFF, self.cmd_buf[3])
        } else {
            (color0, self.cmd_buf[2])
        };
        let (x1, y1) = vertex_xy(xy1);

        self.emit_line(x0, y0, color0, x1, y1, color1, semi_transparent);

        if polyline {
            self.begin_polyline(shaded, semi_transparent, color1, x1, y1);
        }
    }

    // --- Rectangles --------------------------------------------------------

    /// GP0(0x60..0x7F): rectangles in four fixed sizes, optionally
    /// textured (sprites). Captured as two triangles.
    pub(super) fn gp0_rectangle(&mut self) {
        let cmd = self.cmd_buf[0];
        let op = (cmd >> 24) as u8;
        let textured = op & 0x04 != 0;
        let semi_transparent = op & 0x02 != 0;
        let raw_texture = textured && op & 0x01 != 0;

        let (r, g, b) = color_rgb(cmd);
        let (x, y) = vertex_xy(self.cmd_buf[1]);

        let mut idx = 2usize;
        let (clut_word, u0, v0) = if textured {
            let uv = self.cmd_buf[idx];
            idx += 1;
            (uv, (uv & 0xFF) as u8, ((uv >> 8) & 0xFF) as u8)
        } else {
            (0, 0, 0)
        };

        let (w, h) = match (op >> 3) & 3 {
            0 => {
                let size = self.cmd_buf[idx];
                ((size & 0x3FF) as i16, ((size >> 16) & 0x1FF) as i16)
            }
            1 => (1, 1),
            2 => (8, 8),
            _ => (16, 16),
        };
        if w == 0 || h == 0 {
            return;
        }

        // Texture coordinates walk the same span as the rectangle.
        let u1 = u0.wrapping_add((w - 1) as u8);
        let v1 = v0.wrapping_add((h - 1) as u8);

        let corner = |x: i16, y: i16, u: u8, v: u8| Vertex { x, y, r, g, b, u, v };
        let v_tl = corner(x, y, u0, v0);
        let v_tr = corner(x.wrapping_add(w), y, u1, v0);
        let v_bl = corner(x, y.wrapping_add(h), u0, v1);
        let v_br = corner(x.wrapping_add(w), y.wrapping_add(h), u1, v1);

        let mut flags = DrawFlags::empty();
        if textured {
            flags |= DrawFlags::TEXTURED;
        }
        if semi_transparent {
            flags |= DrawFlags::SEMI_TRANSPARENT;
        }
        if raw_texture {
            flags |= DrawFlags::RAW_TEXTURE;
        }
        // Rectangles always sample the current texture page.
        let texpage = if textured { self.env.texpage_word() } else { 0 };

        self.emit_triangle([v_tl, v_tr, v_bl], flags, clut_word, texpage);
        self.emit_triangle([v_tr, v_bl, v_br], flags, clut_word, texpage);
    }

    // --- Environment (E1-E6) ----------------------------------------------

    /// GP0(0xE1): draw mode / texture page.
    pub(super) fn gp0_draw_mode(&mut self) {
        let word = self.cmd_buf[0];
        self.env.texpage_x = (word & 0xF) as u16;
        self.env.texpage_y = ((word >> 4) & 1) as u16;
        self.env.semi_mode = ((word >> 5) & 3) as u8;
        self.env.tex_depth = ((word >> 7) & 3) as u8;
        self.env.dither = word & (1 << 9) != 0;
        self.env.draw_to_display = word & (1 << 10) != 0;
        self.env.texture_disable = word & (1 << 11) != 0;
        self.env.rect_x_flip = word & (1 << 12) != 0;
        self.env.rect_y_flip = word & (1 << 13) != 0;
    }

    /// GP0(0xE2): texture window.
    pub(super) fn gp0_texture_window(&mut self) {
        let word = self.cmd_buf[0];
        self.env.tex_window_mask_x = (word & 0x1F) as u8;
        self.env.tex_window_mask_y = ((word >> 5) & 0x1F) as u8;
        self.env.tex_window_offset_x = ((word >> 10) & 0x1F) as u8;
        self.env.tex_window_offset_y = ((word >> 15) & 0x1F) as u8;
    }

    /// GP0(0xE3): draw area top-left.
    pub(super) fn gp0_draw_area_top_left(&mut self) {
        let word = self.cmd_buf[0];
        self.env.clip_x1 = (word & 0x3FF) as u16;
        self.env.clip_y1 = ((word >> 10) & 0x3FF) as u16;
    }

    /// GP0(0xE4): draw area bottom-right.
    pub(super) fn gp0_draw_area_bottom_right(&mut self) {
        let word = self.cmd_buf[0];
        self.env.clip_x2 = (word & 0x3FF) as u16;
        self.env.clip_y2 = ((word >> 10) & 0x3FF) as u16;
    }

    /// GP0(0xE5): drawing offset, 11-bit signed.
    pub(super) fn gp0_draw_offset(&mut self) {
        let word = self.cmd_buf[0];
        self.env.offset_x = ((word & 0x7FF) as i16) << 5 >> 5;
        self.env.offset_y = (((word >> 11) & 0x7FF) as i16) << 5 >> 5;
    }

    /// GP0(0xE6): mask bit settings.
    pub(super) fn gp0_mask_settings(&mut self) {
        let word = self.cmd_buf[0];
        self.env.mask_set = word & 1 != 0;
        self.env.mask_check = word & 2 != 0;
    }
}
