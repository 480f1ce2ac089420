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

//! GPU parser, transfer and VBlank tests.

use super::*;
use crate::core::interrupt::{irq, InterruptController};

fn gpu_pal() -> Gpu {
    let mut gpu = Gpu::new();
    gpu.set_video_mode(VideoMode::Pal);
    gpu
}

#[test]
fn test_cpu_to_vram_transfer_writes_pixels() {
    let mut gpu = Gpu::new();

    gpu.write_gp0(0xA000_0000);
    gpu.write_gp0(0x0064_0064); // (100, 100)
    gpu.write_gp0(0x0002_0002); // 2×2

    gpu.write_gp0(0x7FFF_001F); // pixels 0x001F, 0x7FFF
    gpu.write_gp0(0x03E0_7C00); // pixels 0x7C00, 0x03E0

    assert_eq!(gpu.read_vram(100, 100), 0x001F);
    assert_eq!(gpu.read_vram(101, 100), 0x7FFF);
    assert_eq!(gpu.read_vram(100, 101), 0x7C00);
    assert_eq!(gpu.read_vram(101, 101), 0x03E0);
    assert_eq!(gpu.phase(), Gp0Phase::Idle, "parser returns to idle");
}

#[test]
fn test_vram_to_cpu_transfer_reads_raster_order() {
    let mut gpu = Gpu::new();
    gpu.write_vram(10, 0, 0x1111);
    gpu.write_vram(11, 0, 0x2222);
    gpu.write_vram(10, 1, 0x3333);
    gpu.write_vram(11, 1, 0x4444);

    gpu.write_gp0(0xC000_0000);
    gpu.write_gp0(0x0000_000A); // (10, 0)
    gpu.write_gp0(0x0002_0002); // 2×2

    assert_eq!(gpu.phase(), Gp0Phase::VramToCpuActive);
    assert_eq!(gpu.read_gpuread(), 0x2222_1111);
    assert_eq!(gpu.read_gpuread(), 0x4444_3333);
    assert_eq!(gpu.phase(), Gp0Phase::Idle);
}

#[test]
fn test_vram_write_seq_monotonic() {
    let mut gpu = Gpu::new();
    let s0 = gpu.vram_write_seq();
    gpu.write_vram(0, 0, 1);
    let s1 = gpu.vram_write_seq();
    assert!(s1 > s0);

    // Fill also bumps it.
    gpu.write_gp0(0x0200_0000);
    gpu.write_gp0(0);
    gpu.write_gp0(0x0001_0010);
    assert!(gpu.vram_write_seq() > s1);
}

#[test]
fn test_fill_rect() {
    let mut gpu = Gpu::new();
    // Fill (0,0) 16×1 with pure red (0x0000FF → 5-bit red).
    gpu.write_gp0(0x0200_00FF);
    gpu.write_gp0(0x0000_0000);
    gpu.write_gp0(0x0001_0010);

    assert_eq!(gpu.read_vram(0, 0), 0x001F);
    assert_eq!(gpu.read_vram(15, 0), 0x001F);
    assert_eq!(gpu.read_vram(16, 0), 0x0000, "outside the fill");
}

#[test]
fn test_flat_triangle_captured_with_offset() {
    let mut gpu = Gpu::new();
    // Draw offset (10, 20).
    gpu.write_gp0(0xE500_0000 | (20 << 11) | 10);
    // Flat opaque triangle, color 0x123456 (B G R).
    gpu.write_gp0(0x2012_3456);
    gpu.write_gp0(0x0000_0000); // (0,0)
    gpu.write_gp0(0x0000_0040); // (64,0)
    gpu.write_gp0(0x0040_0000); // (0,64)

    // Not visible until the vblank swap publishes the frame.
    let mut out = Vec::new();
    gpu.copy_ready_draw_list(&mut out);
    assert!(out.is_empty());

    let mut irq_ctl = InterruptController::new();
    let period = Gpu::VBLANK_PERIOD_NTSC;
    gpu.tick(period as u32, &mut irq_ctl);

    gpu.copy_ready_draw_list(&mut out);
    assert_eq!(out.len(), 1);
    let cmd = out[0];
    assert_eq!(cmd.vertices[0].x, 10, "offset baked into coordinates");
    assert_eq!(cmd.vertices[0].y, 20);
    assert_eq!(cmd.vertices[1].x, 74);
    assert_eq!(cmd.vertices[0].r, 0x56);
    assert_eq!(cmd.vertices[0].g, 0x34);
    assert_eq!(cmd.vertices[0].b, 0x12);
    assert!(!cmd.flags.contains(DrawFlags::TEXTURED));
}

#[test]
fn test_quad_splits_into_two_triangles() {
    let mut gpu = Gpu::new();
    gpu.write_gp0(0x2800_FFFF); // flat opaque quad
    gpu.write_gp0(0x0000_0000);
    gpu.write_gp0(0x0000_0010);
    gpu.write_gp0(0x0010_0000);
    gpu.write_gp0(0x0010_0010);

    assert_eq!(gpu.active_list.len(), 2);
    // Shared edge: second triangle starts at vertex 1.
    assert_eq!(gpu.active_list[0].vertices[1], gpu.active_list[1].vertices[0]);
}

#[test]
fn test_textured_triangle_captures_clut_and_page() {
    let mut gpu = Gpu::new();
    // Textured opaque triangle (0x24): color, then xy/uv pairs.
    gpu.write_gp0(0x2480_8080);
    gpu.write_gp0(0x0000_0000); // xy0
    gpu.write_gp0(0x7654_0000 | 0x0201); // uv0 + clut (clut word bits 16-31)
    gpu.write_gp0(0x0000_0020); // xy1
    gpu.write_gp0(0x000A_0403); // uv1 + texpage
    gpu.write_gp0(0x0020_0000); // xy2
    gpu.write_gp0(0x0000_0605); // uv2

    assert_eq!(gpu.active_list.len(), 1);
    let cmd = gpu.active_list[0];
    assert!(cmd.flags.contains(DrawFlags::TEXTURED));
    assert_eq!(cmd.vertices[0].u, 0x01);
    assert_eq!(cmd.vertices[0].v, 0x02);
    assert_eq!(cmd.clut_x, (0x7654 & 0x3F) * 16);
    assert_eq!(cmd.clut_y, (0x7654 >> 6) & 0x1FF);
    assert_eq!(cmd.texpage, 0x000A);
}

#[test]
fn test_shaded_triangle_per_vertex_colors() {
    let mut gpu = Gpu::new();
    // Shaded triangle 0x30: c0 xy0 c1 xy1 c2 xy2.
    gpu.write_gp0(0x3000_00FF); // red
    gpu.write_gp0(0x0000_0000);
    gpu.write_gp0(0x0000_FF00); // green
    gpu.write_gp0(0x0000_0040);
    gpu.write_gp0(0x00FF_0000); // blue
    gpu.write_gp0(0x0040_0000);

    let cmd = gpu.active_list[0];
    assert_eq!((cmd.vertices[0].r, cmd.vertices[0].g, cmd.vertices[0].b), (0xFF, 0, 0));
    assert_eq!((cmd.vertices[1].r, cmd.vertices[1].g, cmd.vertices[1].b), (0, 0xFF, 0));
    assert_eq!((cmd.vertices[2].r, cmd.vertices[2].g, cmd.vertices[2].b), (0, 0, 0xFF));
}

#[test]
fn test_rectangle_split_and_size_variants() {
    let mut gpu = Gpu::new();
    // 16×16 monochrome rect at (5, 5).
    gpu.write_gp0(0x7800_FFFF);
    gpu.write_gp0(0x0005_0005);
    assert_eq!(gpu.active_list.len(), 2);
    let tl = gpu.active_list[0].vertices[0];
    assert_eq!((tl.x, tl.y), (5, 5));

    // Variable-size rect needs the size word before executing.
    gpu.active_list.clear();
    gpu.write_gp0(0x6000_FFFF);
    gpu.write_gp0(0x0000_0000);
    assert_eq!(gpu.active_list.len(), 0, "still collecting");
    gpu.write_gp0(0x0008_0008); // 8×8
    assert_eq!(gpu.active_list.len(), 2);
}

#[test]
fn test_polyline_consumes_until_terminator() {
    let mut gpu = Gpu::new();
    // Flat opaque polyline 0x48: color, v0, v1, then more vertices.
    gpu.write_gp0(0x4800_FFFF);
    gpu.write_gp0(0x0000_0000);
    gpu.write_gp0(0x0000_0010);
    assert_eq!(gpu.phase(), Gp0Phase::Polyline);
    assert_eq!(gpu.active_list.len(), 1, "first segment captured");

    gpu.write_gp0(0x0010_0010); // second segment
    assert_eq!(gpu.active_list.len(), 2);

    gpu.write_gp0(0x5000_5000); // terminator
    assert_eq!(gpu.phase(), Gp0Phase::Idle);

    // Progress invariant: parser is reusable afterwards.
    gpu.write_gp0(0x0200_0000);
    gpu.write_gp0(0);
    gpu.write_gp0(0x0001_0010);
    assert_eq!(gpu.phase(), Gp0Phase::Idle);
}

#[test]
fn test_clip_drops_out_of_area_triangle() {
    let mut gpu = Gpu::new();
    // Restrict the draw area to 0..63².
    gpu.write_gp0(0xE300_0000);
    gpu.write_gp0(0xE400_0000 | (63 << 10) | 63);

    // Triangle fully outside (x ≥ 100).
    gpu.write_gp0(0x2000_FFFF);
    gpu.write_gp0(0x0000_0064);
    gpu.write_gp0(0x0000_0080);
    gpu.write_gp0(0x0040_0064);
    assert!(gpu.active_list.is_empty(), "clipped command dropped");

    // With no-clip set, the same command is captured.
    gpu.set_no_clip(true);
    gpu.write_gp0(0x2000_FFFF);
    gpu.write_gp0(0x0000_0064);
    gpu.write_gp0(0x0000_0080);
    gpu.write_gp0(0x0040_0064);
    assert_eq!(gpu.active_list.len(), 1);
}

#[test]
fn test_vblank_cadence_pal() {
    // 681000 cycles from reset raise VBlank exactly once, complete one
    // frame, and end outside VBlank.
    let mut gpu = gpu_pal();
    let mut irq_ctl = InterruptController::new();

    gpu.tick(681_000, &mut irq_ctl);

    assert_eq!(irq_ctl.read_status() & irq::VBLANK as u32, 1);
    assert_eq!(gpu.frame_count(), 1);
    assert!(!gpu.is_in_vblank());
}

#[test]
fn test_vblank_cadence_independent_of_batch_size() {
    for batch in [1u32, 7, 32, 128] {
        let mut gpu = gpu_pal();
        let mut irq_ctl = InterruptController::new();
        let mut raised = 0u32;

        let mut cycles_left = 681_000u32;
        while cycles_left > 0 {
            let n = batch.min(cycles_left);
            gpu.tick(n, &mut irq_ctl);
            if irq_ctl.read_status() & irq::VBLANK as u32 != 0 {
                raised += 1;
                irq_ctl.write_status(!(irq::VBLANK as u32));
            }
            cycles_left -= n;
        }

        assert_eq!(raised, 1, "batch={}", batch);
        assert_eq!(gpu.frame_count(), 1, "batch={}", batch);
        assert!(!gpu.is_in_vblank(), "batch={}", batch);
    }
}

#[test]
fn test_vblank_raised_after_active_period() {
    let mut gpu = gpu_pal();
    let mut irq_ctl = InterruptController::new();
    let active = (Gpu::VBLANK_PERIOD_PAL - Gpu::VBLANK_DURATION_PAL) as u32;

    gpu.tick(active - 1, &mut irq_ctl);
    assert!(!gpu.is_in_vblank());
    assert_eq!(irq_ctl.read_status(), 0);

    gpu.tick(1, &mut irq_ctl);
    assert!(gpu.is_in_vblank());
    assert_eq!(irq_ctl.read_status() & irq::VBLANK as u32, 1);
}

#[test]
fn test_gpustat_reflects_dma_direction_and_field() {
    let mut gpu = gpu_pal();
    gpu.write_gp1(0x0400_0002); // DMA direction 2 (CPU→GP0)
    let stat = gpu.status();
    assert_eq!((stat >> 29) & 3, 2);
    assert_ne!(stat & (1 << 26), 0, "ready for commands");

    // Field toggles per frame.
    let mut irq_ctl = InterruptController::new();
    gpu.tick(Gpu::VBLANK_PERIOD_PAL as u32, &mut irq_ctl);
    assert_ne!(gpu.status() & (1 << 13), 0);
    gpu.tick(Gpu::VBLANK_PERIOD_PAL as u32, &mut irq_ctl);
    assert_eq!(gpu.status() & (1 << 13), 0);
}

#[test]
fn test_gp1_reset_preserves_vram() {
    let mut gpu = Gpu::new();
    gpu.write_vram(1, 1, 0x7FFF);
    gpu.write_gp1(0x0000_0000);
    assert_eq!(gpu.read_vram(1, 1), 0x7FFF);
    assert_eq!(gpu.phase(), Gp0Phase::Idle);
}

#[test]
fn test_gp1_info_queries() {
    let mut gpu = Gpu::new();
    gpu.write_gp0(0xE300_0000 | (5 << 10) | 7); // draw area TL (7, 5)
    gpu.write_gp1(0x1000_0003);
    let v = gpu.read_gpuread();
    assert_eq!(v & 0x3FF, 7);
    assert_eq!((v >> 10) & 0x3FF, 5);

    gpu.write_gp1(0x1000_0007);
    assert_eq!(gpu.read_gpuread(), 2, "GPU version");
}

#[test]
fn test_port_capture_records_gp0_and_gp1() {
    let mut gpu = Gpu::new();
    gpu.enable_port_capture();
    gpu.write_gp0(0x0200_0000);
    gpu.write_gp1(0x0300_0001);

    let mut out = Vec::new();
    gpu.drain_port_capture(&mut out);
    assert_eq!(out[0], (0, 0x0200_0000));
    assert_eq!(out[1], (1, 0x0300_0001));

    // Draining empties the capture buffer.
    let mut again = Vec::new();
    gpu.drain_port_capture(&mut again);
    assert!(again.is_empty());
}

#[test]
fn test_malformed_command_resets_parser() {
    let mut gpu = Gpu::new();
    gpu.write_gp0(0xB000_0000); // unknown opcode
    assert_eq!(gpu.phase(), Gp0Phase::Idle, "parser recovered");

    // And still accepts valid work.
    gpu.write_gp0(0x0200_0000);
    gpu.write_gp0(0);
    gpu.write_gp0(0x0001_0010);
    assert_eq!(gpu.read_vram(0, 0) & 0x7FFF, 0);
}

#[test]
fn test_progress_all_commands_return_to_idle() {
    // Feed every opcode with enough parameter words; the parser must be
    // Idle (or in an explicitly armed data phase) afterwards.
    for op in 0u32..=0xFF {
        let mut gpu = Gpu::new();
        let word = op << 24;
        gpu.write_gp0(word);
        if let Some(n) = Gpu::gp0_params(op as u8) {
            for _ in 0..n {
                gpu.write_gp0(0x0000_0001);
            }
        }
        match gpu.phase() {
            Gp0Phase::Idle | Gp0Phase::CpuToVramData | Gp0Phase::VramToCpuActive
            | Gp0Phase::Polyline => {}
            other => panic!("op 0x{:02X} left parser in {:?}", op, other),
        }
        assert_ne!(gpu.phase(), Gp0Phase::Collecting, "op 0x{:02X} stuck", op);
    }
}
