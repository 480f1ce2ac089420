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

//! System integration: the [`Core`] handle a host embeds.
//!
//! A `Core` owns the CPU and the bus (which owns every device). One
//! `step()` executes one architectural instruction; every
//! `bus_tick_batch` instructions the bus advances device time by the
//! batched amount. Batching amortizes device bookkeeping — device time
//! still advances by exactly one cycle per instruction, in batches, so
//! interrupt cadences (VBlank in particular) are batch-size independent.

use crate::core::cdrom::{self, DiscImage};
use crate::core::cpu::{Cpu, StepResult};
use crate::core::error::{EmulatorError, Result, SetupError};
use crate::core::gpu::{DrawCmd, VideoMode};
use crate::core::interrupt::irq;
use crate::core::loader::{self, ExecFormat, LoadedImage};
use crate::core::memory::Bus;
use crate::core::snapshot::CoreSnapshot;
use crate::core::spu::AudioCallback;
use crate::logging::{LogCategory, Logger};

/// The emulator core.
pub struct Core {
    cpu: Cpu,
    bus: Bus,
    /// Instructions per bus tick (1 = cycle-approximate).
    tick_batch: u32,
    tick_accum: u32,
    steps: u64,
    log: Logger,
}

impl Core {
    /// Default main RAM size (2 MiB).
    pub const DEFAULT_RAM: usize = 2 * 1024 * 1024;

    /// Kernel seed locations used by fast boot.
    const PCB_ADDR: u32 = 0x0000_0200;
    const TCB_ADDR: u32 = 0x0000_0300;

    /// Build a core with `ram_bytes` of main RAM. The size must be a
    /// power of two (mirroring relies on mask arithmetic).
    pub fn new(ram_bytes: usize) -> Result<Self> {
        if !ram_bytes.is_power_of_two() || ram_bytes < 64 * 1024 {
            return Err(SetupError::InvalidArgs(format!(
                "RAM size must be a power of two ≥ 64 KiB, got {}",
                ram_bytes
            ))
            .into());
        }
        Ok(Self {
            cpu: Cpu::new(),
            bus: Bus::new(ram_bytes),
            tick_batch: 1,
            tick_accum: 0,
            steps: 0,
            log: Logger::null(),
        })
    }

    /// Install log sinks; distributed to the CPU and every device.
    pub fn set_log_sinks(&mut self, log: Logger) {
        self.cpu.set_logger(log.clone());
        self.bus.set_logger(&log);
        self.log = log;
    }

    // --- Configuration -----------------------------------------------------

    /// Device ticks are batched over N instructions (1..=128).
    pub fn set_bus_tick_batch(&mut self, batch: u32) {
        self.tick_batch = batch.clamp(1, 128);
    }

    pub fn set_hle_syscalls(&mut self, on: bool) {
        self.cpu.set_hle_syscalls(on);
    }

    pub fn set_break_halts(&mut self, on: bool) {
        self.cpu.set_break_halts(on);
    }

    pub fn set_stop_on_pc(&mut self, pc: Option<u32>) {
        self.cpu.set_stop_on_pc(pc);
    }

    pub fn set_stop_on_idle_nop(&mut self, on: bool) {
        self.cpu.set_stop_on_idle_nop(on);
    }

    pub fn set_stop_on_high_ram_fetch(&mut self, on: bool) {
        self.cpu.set_stop_on_high_ram_fetch(on);
    }

    pub fn set_video_mode(&mut self, mode: VideoMode) {
        self.bus.gpu_mut().set_video_mode(mode);
    }

    pub fn set_gpu_no_clip(&mut self, on: bool) {
        self.bus.gpu_mut().set_no_clip(on);
    }

    /// Record raw GPU port writes for the harness dump.
    pub fn enable_gpu_port_capture(&mut self) {
        self.bus.gpu_mut().enable_port_capture();
    }

    pub fn drain_gpu_port_capture(&mut self, out: &mut Vec<(u32, u32)>) {
        self.bus.gpu_mut().drain_port_capture(out);
    }

    // --- Setup -------------------------------------------------------------

    /// Copy a BIOS image into ROM.
    pub fn set_bios_copy(&mut self, bytes: &[u8]) -> Result<()> {
        self.bus.set_bios_copy(bytes)?;
        Ok(())
    }

    /// Load the BIOS from a file.
    pub fn load_bios_file(&mut self, path: &str) -> Result<()> {
        let bytes = std::fs::read(path).map_err(|e| SetupError::FileRead {
            path: path.to_string(),
            source: e,
        })?;
        self.set_bios_copy(&bytes)
    }

    /// Insert a disc image from a path (cue/bin or raw).
    pub fn insert_disc(&mut self, path: &str) -> Result<()> {
        self.bus.cdrom_mut().load_disc(path)?;
        Ok(())
    }

    /// Insert an already-loaded disc image.
    pub fn insert_disc_image(&mut self, disc: DiscImage) {
        self.bus.cdrom_mut().insert_disc(disc);
    }

    /// Load an executable into RAM and point the CPU at its entry.
    pub fn init_from_image(&mut self, bytes: &[u8], format: ExecFormat) -> Result<LoadedImage> {
        let image = loader::load_image(&mut self.bus, bytes, format, &self.log)?;
        self.apply_image(&image);
        Ok(image)
    }

    fn apply_image(&mut self, image: &LoadedImage) {
        self.cpu.set_pc(image.entry);
        if let Some(gp) = image.gp {
            self.cpu.set_reg(28, gp);
        }
        if let Some(sp) = image.sp {
            self.cpu.set_reg(29, sp);
            self.cpu.set_reg(30, sp);
        }
    }

    // --- Fast boot ---------------------------------------------------------

    /// Boot a disc without running the BIOS: resolve SYSTEM.CNF, load the
    /// boot executable, seed the minimal kernel structures the executable
    /// expects and unmask the usual interrupts.
    pub fn fast_boot_from_cd(&mut self) -> Result<()> {
        let (exe_bytes, boot_path) = {
            let disc = self
                .bus
                .cdrom()
                .disc()
                .ok_or(crate::core::error::CdRomError::NoDisc)?;

            let cnf = cdrom::read_file(disc, "SYSTEM.CNF;1")?;
            let cnf_text = String::from_utf8_lossy(&cnf);
            let boot_path = parse_system_cnf_boot(&cnf_text).ok_or_else(|| {
                EmulatorError::Setup(SetupError::FormatInvalid(
                    "SYSTEM.CNF has no BOOT line".to_string(),
                ))
            })?;
            let exe = cdrom::read_file(disc, &boot_path)?;
            (exe, boot_path)
        };

        self.log.info(
            LogCategory::System,
            format_args!("fast boot: {}", boot_path),
        );

        let image = loader::load_image(
            &mut self.bus,
            &exe_bytes,
            ExecFormat::PsxExe,
            &self.log,
        )?;

        // Minimal kernel seed: process block pointing at one active
        // thread block whose saved status has IM2 set.
        let _ = self.bus.write32(Self::PCB_ADDR, Self::TCB_ADDR);
        let _ = self.bus.write32(Self::TCB_ADDR, 0x0000_4000); // active
        let _ = self.bus.write32(Self::TCB_ADDR + 0x8C, 0x0000_0401); // saved SR

        // Unmask the interrupts a booted game expects.
        self.bus
            .irq_mut()
            .write_mask((irq::VBLANK | irq::CDROM | irq::DMA) as u32);

        // Interrupts on, IM2 enabled.
        self.cpu.op_mtc0(12, 0x0000_0501);
        self.cpu.set_hle_syscalls(true);

        self.apply_image(&image);
        Ok(())
    }

    // --- Execution ---------------------------------------------------------

    /// Execute one architectural instruction and advance batched device
    /// time. Device ticks run after the instruction and before the next
    /// step's interrupt check.
    pub fn step(&mut self) -> StepResult {
        let result = self.cpu.step(&mut self.bus);
        self.steps += 1;

        self.tick_accum += 1;
        if self.tick_accum >= self.tick_batch {
            self.bus.tick(self.tick_accum);
            self.tick_accum = 0;
        }

        result
    }

    /// Total instructions executed.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn pc(&self) -> u32 {
        self.cpu.pc()
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.cpu.set_pc(pc);
    }

    pub fn gpr(&self, index: u8) -> u32 {
        self.cpu.reg(index)
    }

    pub fn set_gpr(&mut self, index: u8, value: u32) {
        self.cpu.set_reg(index, value);
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    // --- Host snapshot interface -------------------------------------------

    /// Copy the last completed frame's draw commands.
    pub fn copy_ready_draw_list(&self, out: &mut Vec<DrawCmd>) {
        self.bus.gpu().copy_ready_draw_list(out);
    }

    /// Copy VRAM (1024×512 u16) and its write sequence number.
    pub fn copy_vram(&self, out: &mut [u16], seq: &mut u64) {
        self.bus.gpu().copy_vram(out, seq);
    }

    /// Install the audio sample callback (interleaved stereo i16).
    pub fn set_audio_callback(&mut self, callback: AudioCallback) {
        self.bus.spu_mut().set_audio_callback(callback);
    }

    /// Flush any buffered audio to the callback (end of run).
    pub fn drain_audio(&mut self) {
        self.bus.spu_mut().drain_output();
    }

    // --- Save states -------------------------------------------------------

    /// Serialize PC, GPRs, HI/LO, COP0 and RAM.
    pub fn save_state(&self) -> Result<Vec<u8>> {
        let (regs, pc, next_pc, hi, lo, cop0) = self.cpu.export_state();
        let snapshot = CoreSnapshot::new(regs, pc, next_pc, hi, lo, cop0, self.bus.ram().to_vec());
        snapshot.encode()
    }

    /// Restore a state produced by [`Core::save_state`].
    pub fn restore_state(&mut self, bytes: &[u8]) -> Result<()> {
        let snapshot = CoreSnapshot::decode(bytes)?;
        if snapshot.ram.len() != self.bus.ram_size() {
            return Err(EmulatorError::Snapshot(format!(
                "RAM size mismatch: snapshot {} vs core {}",
                snapshot.ram.len(),
                self.bus.ram_size()
            )));
        }
        self.bus.ram_mut().copy_from_slice(&snapshot.ram);
        self.cpu.import_state(
            snapshot.regs,
            snapshot.pc,
            snapshot.next_pc,
            snapshot.hi,
            snapshot.lo,
            snapshot.cop0,
        );
        Ok(())
    }
}

/// Extract the boot executable path from SYSTEM.CNF. Accepts the usual
/// `BOOT = cdrom:\DIR\GAME.EXE;1` shapes, tolerating whitespace and a
/// missing backslash after `cdrom:`.
fn parse_system_cnf_boot(text: &str) -> Option<String> {
    for line in text.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix("BOOT") else {
            continue;
        };
        let rest = rest.trim_start();
        let Some(value) = rest.strip_prefix('=') else {
            continue;
        };
        let value = value.trim();

        // Strip the device prefix up to and including ':'.
        let path = match value.find(':') {
            Some(idx) => &value[idx + 1..],
            None => value,
        };
        let path = path.trim_start_matches('\\').trim();
        // Drop anything after the path (some CNFs append arguments).
        let path = path.split_whitespace().next()?;
        if path.is_empty() {
            return None;
        }
        return Some(path.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cdrom::iso9660::tests::build_test_iso;

    const fn addiu(rs: u32, rt: u32, imm: u32) -> u32 {
        (0x09 << 26) | (rs << 21) | (rt << 16) | (imm & 0xFFFF)
    }

    fn core_with_program(program: &[u32]) -> Core {
        let mut core = Core::new(Core::DEFAULT_RAM).unwrap();
        for (i, word) in program.iter().enumerate() {
            core.bus_mut()
                .write32(0x8000_0000 + (i as u32) * 4, *word)
                .unwrap();
        }
        core.set_pc(0x8000_0000);
        core
    }

    #[test]
    fn test_ram_size_validation() {
        assert!(Core::new(Core::DEFAULT_RAM).is_ok());
        assert!(Core::new(3 * 1024 * 1024).is_err(), "non power of two");
        assert!(Core::new(1024).is_err(), "too small");
    }

    #[test]
    fn test_step_executes_and_counts() {
        let mut core = core_with_program(&[addiu(0, 1, 7), 0]);
        let result = core.step();
        assert!(matches!(result, StepResult::Ok { pc: 0x8000_0000, .. }));
        assert_eq!(core.gpr(1), 7);
        assert_eq!(core.steps(), 1);
    }

    #[test]
    fn test_parse_system_cnf_variants() {
        assert_eq!(
            parse_system_cnf_boot("BOOT = cdrom:\\SLUS_123.45;1\r\n"),
            Some("SLUS_123.45;1".to_string())
        );
        assert_eq!(
            parse_system_cnf_boot("BOOT=cdrom:MAIN.EXE;1"),
            Some("MAIN.EXE;1".to_string())
        );
        assert_eq!(
            parse_system_cnf_boot("TCB = 4\nEVENT = 10\nBOOT = cdrom:\\A\\B.EXE;1 arg"),
            Some("A\\B.EXE;1".to_string())
        );
        assert_eq!(parse_system_cnf_boot("TCB = 4"), None);
    }

    #[test]
    fn test_fast_boot_from_cd() {
        // Disc with SYSTEM.CNF pointing at MAIN.EXE, which is a valid
        // PS-X EXE whose first instruction is a BREAK.
        let mut exe = vec![0u8; 0x800 + 0x40];
        exe[..8].copy_from_slice(b"PS-X EXE");
        let put = |buf: &mut [u8], off: usize, v: u32| {
            buf[off..off + 4].copy_from_slice(&v.to_le_bytes())
        };
        put(&mut exe, 0x10, 0x8001_0000); // pc0
        put(&mut exe, 0x14, 0x8001_F000); // gp0
        put(&mut exe, 0x18, 0x8001_0000); // t_addr
        put(&mut exe, 0x1C, 0x40); // t_size
        put(&mut exe, 0x30, 0x801F_0000); // s_addr
        put(&mut exe, 0x34, 0x1000); // s_size
        exe[0x800..0x804].copy_from_slice(&0x0000_000Du32.to_le_bytes()); // break

        let disc = build_test_iso(&[
            ("SYSTEM.CNF;1", b"BOOT = cdrom:\\MAIN.EXE;1\r\n"),
            ("MAIN.EXE;1", &exe),
        ]);

        let mut core = Core::new(Core::DEFAULT_RAM).unwrap();
        core.set_break_halts(true);
        core.insert_disc_image(disc);
        core.fast_boot_from_cd().unwrap();

        assert_eq!(core.pc(), 0x8001_0000);
        assert_eq!(core.gpr(28), 0x8001_F000);
        assert_eq!(core.gpr(29), 0x801F_1000);
        // Kernel seed present.
        assert_eq!(core.bus_mut().read32(0x0000_0200).unwrap(), 0x300);
        assert_eq!(core.bus_mut().read32(0x0000_0300).unwrap(), 0x4000);
        // IRQ mask covers VBlank, CDROM and DMA.
        assert_eq!(core.bus_mut().read32(0x1F80_1074).unwrap(), 0xD);
        // SR enables interrupts with IM2.
        assert_eq!(core.cpu().cop0_reg(12), 0x501);

        // The loaded executable actually runs.
        assert_eq!(core.step(), StepResult::Halted { pc: 0x8001_0000 });
    }

    #[test]
    fn test_fast_boot_without_disc_fails() {
        let mut core = Core::new(Core::DEFAULT_RAM).unwrap();
        assert!(core.fast_boot_from_cd().is_err());
    }

    #[test]
    fn test_demo_counter_program_prints_and_halts() {
        use crate::logging::{LogCategory, LogLevel, Logger, LogSink, SinkSet};
        use std::sync::{Arc, Mutex};

        // Guest program: write 1..5 to the debug print port, then BREAK.
        //   lui r1, 0x1F00       ; port address
        //   addiu r2, r0, N      ; value
        //   sw r2, 0(r1)
        //   ... repeated ...
        //   break
        let lui = (0x0Fu32 << 26) | (1 << 16) | 0x1F00;
        let sw = (0x2Bu32 << 26) | (1 << 21) | (2 << 16);
        let mut program = vec![lui];
        for n in 1..=5u32 {
            program.push(addiu(0, 2, n));
            program.push(sw);
        }
        program.push(0x0000_000D); // break
        let break_pc = 0x8000_0000 + (program.len() as u32 - 1) * 4;

        let captured = Arc::new(Mutex::new(String::new()));
        let sink = captured.clone();
        let sinks = SinkSet::new().route(
            &[LogCategory::Text],
            Arc::new(LogSink::Callback(Box::new(move |s: &str| {
                sink.lock().unwrap().push_str(s);
            }))),
        );

        let mut core = core_with_program(&program);
        core.set_log_sinks(Logger::new(
            LogLevel::Warn,
            LogCategory::default_mask(),
            sinks,
        ));
        core.set_break_halts(true);

        let mut last = StepResult::Ok { pc: 0, instr: 0 };
        for _ in 0..100 {
            last = core.step();
            if matches!(last, StepResult::Halted { .. }) {
                break;
            }
        }

        assert_eq!(last, StepResult::Halted { pc: break_pc });
        assert_eq!(&*captured.lock().unwrap(), "1\n2\n3\n4\n5\n");
    }

    #[test]
    fn test_save_restore_replays_identically() {
        // A small program with arithmetic and a loop.
        let bne = |rs: u32, rt: u32, off: u32| {
            (0x05u32 << 26) | (rs << 21) | (rt << 16) | (off & 0xFFFF)
        };
        let program = [
            addiu(0, 1, 5),
            addiu(0, 2, 0),
            addiu(2, 2, 3),
            addiu(1, 1, 0xFFFF),
            bne(1, 0, 0xFFFD),
            0,
            addiu(0, 3, 99),
            0x0000_000D,
        ];

        let mut core = core_with_program(&program);
        core.set_break_halts(true);
        core.step();
        core.step();
        core.step();

        let state = core.save_state().unwrap();

        // Run the original to completion, recording results.
        let mut reference = Vec::new();
        for _ in 0..100 {
            let r = core.step();
            reference.push(r);
            if matches!(r, StepResult::Halted { .. }) {
                break;
            }
        }
        let ref_regs: Vec<u32> = (0..32).map(|i| core.gpr(i)).collect();

        // Restore and replay.
        let mut core2 = core_with_program(&program);
        core2.set_break_halts(true);
        core2.restore_state(&state).unwrap();
        let mut replay = Vec::new();
        for _ in 0..100 {
            let r = core2.step();
            replay.push(r);
            if matches!(r, StepResult::Halted { .. }) {
                break;
            }
        }
        let replay_regs: Vec<u32> = (0..32).map(|i| core2.gpr(i)).collect();

        assert_eq!(reference, replay, "step sequences must match");
        assert_eq!(ref_regs, replay_regs);
    }

    #[test]
    fn test_restore_rejects_mismatched_ram() {
        let core = Core::new(Core::DEFAULT_RAM).unwrap();
        let state = core.save_state().unwrap();
        let mut smaller = Core::new(1024 * 1024).unwrap();
        assert!(smaller.restore_state(&state).is_err());
    }

    #[test]
    fn test_vblank_cadence_with_batching() {
        // The VBlank IRQ cadence must not depend on the batch size.
        for batch in [1u32, 16, 128] {
            let mut core = core_with_program(&[0u32; 16]);
            core.set_bus_tick_batch(batch);
            core.set_video_mode(VideoMode::Pal);
            // Loop forever over nops.
            core.bus_mut()
                .write32(0x8000_0040, (0x02 << 26) | ((0x8000_0000u32 >> 2) & 0x03FF_FFFF))
                .unwrap();

            let mut frames_seen = 0u64;
            for _ in 0..700_000 {
                core.step();
                if core.bus().gpu().frame_count() > frames_seen {
                    frames_seen = core.bus().gpu().frame_count();
                }
            }
            assert_eq!(frames_seen, 1, "batch={}", batch);
        }
    }

    #[test]
    fn test_interrupt_from_device_reaches_cpu() {
        // Enable VBlank in I_MASK + CPU SR, run past one frame, and check
        // the CPU vectored.
        let mut core = core_with_program(&[0u32; 8]);
        core.set_video_mode(VideoMode::Ntsc);
        core.bus_mut().write32(0x1F80_1074, 1).unwrap(); // I_MASK: VBlank
        core.set_gpr(1, 0x0401);
        // mtc0 r1, sr ; infinite nop loop
        core.bus_mut()
            .write32(0x8000_0000, (0x10 << 26) | (0x04 << 21) | (1 << 16) | (12 << 11))
            .unwrap();

        let mut vectored = false;
        for _ in 0..600_000 {
            core.step();
            // An interrupt latches a nonzero EPC and the Interrupt cause.
            if core.cpu().cop0_reg(14) != 0 {
                assert_eq!((core.cpu().cop0_reg(13) >> 2) & 0x1F, 0);
                vectored = true;
                break;
            }
        }
        assert!(vectored, "VBlank interrupt must reach the CPU");
    }
}
