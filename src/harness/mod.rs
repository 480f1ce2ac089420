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

//! CLI harness: argument surface, log-sink wiring and the run loop.
//!
//! Exit status: 0 when the guest halts or the step/time budget runs out;
//! 1 on an illegal instruction, an unhandled memory fault, or any setup
//! failure.

pub mod wav;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::Parser;
use serde::Deserialize;

use epsx::core::gpu::VideoMode;
use epsx::core::loader::ExecFormat;
use epsx::core::{Core, StepResult};
use epsx::logging::{LogCategory, LogLevel, LogSink, Logger, SinkSet};

use wav::WavWriter;

/// Command-line surface.
#[derive(Parser, Debug)]
#[command(name = "epsx", about = "Educational PlayStation emulator core")]
pub struct Args {
    /// BIOS ROM image (512 KiB)
    #[arg(long)]
    pub bios: Option<PathBuf>,

    /// CD image (.cue sheet, or raw .bin/.iso)
    #[arg(long)]
    pub cd: Option<PathBuf>,

    /// Executable to load into RAM (PS-X EXE or ELF)
    #[arg(long)]
    pub load: Option<PathBuf>,

    /// Executable format
    #[arg(long, default_value = "auto")]
    pub format: String,

    /// Stop after N instructions
    #[arg(long)]
    pub max_steps: Option<u64>,

    /// Stop after N seconds of wall-clock time
    #[arg(long)]
    pub max_time: Option<u64>,

    /// Log the PC every N instructions
    #[arg(long)]
    pub pc_sample: Option<u64>,

    /// Halt when the PC reaches this address (hex accepted)
    #[arg(long)]
    pub stop_on_pc: Option<String>,

    /// Instructions per bus tick (1 = cycle-approximate)
    #[arg(long, default_value_t = 1)]
    pub bus_tick_batch: u32,

    /// Skip the BIOS: boot the disc's SYSTEM.CNF executable directly
    #[arg(long)]
    pub fast_boot: bool,

    /// Enable host-print syscalls (v0 = 0xFF00..0xFF03)
    #[arg(long)]
    pub hle: bool,

    /// PAL video timing instead of NTSC
    #[arg(long)]
    pub pal: bool,

    /// Pretty register dump when the run ends
    #[arg(long)]
    pub pretty: bool,

    /// Trace all MMIO traffic into the io log
    #[arg(long)]
    pub trace_io: bool,

    /// Write mixed audio to a 16-bit stereo 44.1 kHz WAV file
    #[arg(long)]
    pub wav_output: Option<PathBuf>,

    /// Dump raw (port, value) GPU writes, little-endian pairs
    #[arg(long)]
    pub gpu_dump: Option<PathBuf>,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log categories, comma separated (fetch,decode,exec,mem,exc,...,all)
    #[arg(long)]
    pub log_cats: Option<String>,

    /// Directory for the persisted log files
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// TOML config file supplying defaults for the options above
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Optional TOML defaults; any CLI-provided value wins.
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub bios: Option<PathBuf>,
    pub cd: Option<PathBuf>,
    pub load: Option<PathBuf>,
    pub format: Option<String>,
    pub max_steps: Option<u64>,
    pub max_time: Option<u64>,
    pub bus_tick_batch: Option<u32>,
    pub fast_boot: Option<bool>,
    pub hle: Option<bool>,
    pub pal: Option<bool>,
    pub wav_output: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_cats: Option<String>,
}

impl Args {
    /// Fold config-file defaults into unset options.
    fn merge_config(&mut self, config: ConfigFile) {
        if self.bios.is_none() {
            self.bios = config.bios;
        }
        if self.cd.is_none() {
            self.cd = config.cd;
        }
        if self.load.is_none() {
            self.load = config.load;
        }
        if let Some(format) = config.format {
            if self.format == "auto" {
                self.format = format;
            }
        }
        if self.max_steps.is_none() {
            self.max_steps = config.max_steps;
        }
        if self.max_time.is_none() {
            self.max_time = config.max_time;
        }
        if let Some(batch) = config.bus_tick_batch {
            if self.bus_tick_batch == 1 {
                self.bus_tick_batch = batch;
            }
        }
        self.fast_boot |= config.fast_boot.unwrap_or(false);
        self.hle |= config.hle.unwrap_or(false);
        self.pal |= config.pal.unwrap_or(false);
        if self.wav_output.is_none() {
            self.wav_output = config.wav_output;
        }
        if let Some(level) = config.log_level {
            if self.log_level == "info" {
                self.log_level = level;
            }
        }
        if self.log_cats.is_none() {
            self.log_cats = config.log_cats;
        }
    }
}

/// Parse a PC value: `0x`-prefixed hex or bare hex/decimal.
fn parse_addr(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        s.parse::<u32>()
            .ok()
            .or_else(|| u32::from_str_radix(s, 16).ok())
    }
}

/// Build the persisted-file sink set plus the stdout text mirror.
fn build_logger(args: &Args) -> std::io::Result<Logger> {
    let level = LogLevel::parse(&args.log_level).unwrap_or(LogLevel::Info);

    let mut cat_mask = match &args.log_cats {
        None => LogCategory::default_mask(),
        Some(list) => {
            let mut mask = 0u16;
            for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if name == "all" {
                    mask |= LogCategory::all_mask();
                } else if let Some(cat) = LogCategory::parse(name) {
                    mask |= cat.bit();
                } else {
                    log::warn!("unknown log category '{}', ignored", name);
                }
            }
            mask | LogCategory::Text.bit()
        }
    };
    let level = if args.trace_io {
        cat_mask |= LogCategory::Io.bit() | LogCategory::Dma.bit();
        LogLevel::Trace
    } else {
        level
    };

    let dir = &args.log_dir;
    let system = Arc::new(LogSink::file(dir.join("system.log"))?);
    let cdrom = Arc::new(LogSink::file(dir.join("cdrom.log"))?);
    let gpu = Arc::new(LogSink::file(dir.join("gpu.log"))?);
    let io = Arc::new(LogSink::file(dir.join("io.log"))?);
    let outtext = Arc::new(LogSink::file(dir.join("outtext.log"))?);

    let sinks = SinkSet::new()
        .route(
            &[
                LogCategory::System,
                LogCategory::Fetch,
                LogCategory::Decode,
                LogCategory::Exec,
                LogCategory::Mem,
                LogCategory::Exc,
                LogCategory::Spu,
            ],
            system,
        )
        .route(&[LogCategory::Cdrom], cdrom)
        .route(&[LogCategory::Gpu], gpu)
        .route(&[LogCategory::Io, LogCategory::Dma], io)
        .route(&[LogCategory::Text], outtext)
        .route(&[LogCategory::Text], Arc::new(LogSink::Stdout));

    Ok(Logger::new(level, cat_mask, sinks))
}

/// Assemble, run and tear down a core per the arguments. Returns the
/// process exit code.
pub fn run(mut args: Args) -> i32 {
    // Config file defaults.
    if let Some(path) = args.config.clone() {
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                log::error!("cannot read config '{}': {}", path.display(), e);
                return 1;
            }
        };
        match toml::from_str::<ConfigFile>(&text) {
            Ok(config) => args.merge_config(config),
            Err(e) => {
                log::error!("invalid config '{}': {}", path.display(), e);
                return 1;
            }
        }
    }

    if args.bios.is_none() && args.load.is_none() && !(args.cd.is_some() && args.fast_boot) {
        log::error!("nothing to run: pass --bios, --load, or --cd with --fast-boot");
        return 1;
    }

    let Some(format) = ExecFormat::parse(&args.format) else {
        log::error!("invalid --format '{}' (auto|elf|psxexe)", args.format);
        return 1;
    };

    let stop_on_pc = match &args.stop_on_pc {
        None => None,
        Some(s) => match parse_addr(s) {
            Some(addr) => Some(addr),
            None => {
                log::error!("invalid --stop-on-pc '{}'", s);
                return 1;
            }
        },
    };

    let logger = match build_logger(&args) {
        Ok(logger) => logger,
        Err(e) => {
            log::error!("cannot open log sinks under '{}': {}", args.log_dir.display(), e);
            return 1;
        }
    };

    // Core assembly.
    let mut core = match Core::new(Core::DEFAULT_RAM) {
        Ok(core) => core,
        Err(e) => {
            log::error!("core setup failed: {}", e);
            return 1;
        }
    };
    core.set_log_sinks(logger);
    core.set_bus_tick_batch(args.bus_tick_batch);
    core.set_break_halts(true);
    core.set_hle_syscalls(args.hle);
    core.set_stop_on_pc(stop_on_pc);
    core.set_video_mode(if args.pal { VideoMode::Pal } else { VideoMode::Ntsc });

    if let Some(path) = &args.bios {
        if let Err(e) = core.load_bios_file(&path.to_string_lossy()) {
            log::error!("BIOS load failed: {}", e);
            return 1;
        }
    }
    if let Some(path) = &args.cd {
        if let Err(e) = core.insert_disc(&path.to_string_lossy()) {
            log::error!("disc load failed: {}", e);
            return 1;
        }
    }
    if args.fast_boot {
        if let Err(e) = core.fast_boot_from_cd() {
            log::error!("fast boot failed: {}", e);
            return 1;
        }
    }
    if let Some(path) = &args.load {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("cannot read '{}': {}", path.display(), e);
                return 1;
            }
        };
        match core.init_from_image(&bytes, format) {
            Ok(image) => log::info!("loaded '{}', entry 0x{:08X}", path.display(), image.entry),
            Err(e) => {
                log::error!("executable load failed: {}", e);
                return 1;
            }
        }
    }

    // WAV capture rides the audio callback.
    let wav_writer: Option<Arc<Mutex<WavWriter>>> = match &args.wav_output {
        None => None,
        Some(path) => match WavWriter::create(path) {
            Ok(writer) => {
                let writer = Arc::new(Mutex::new(writer));
                let sink = writer.clone();
                core.set_audio_callback(Box::new(move |samples: &[i16]| {
                    if let Ok(mut w) = sink.lock() {
                        let _ = w.write_samples(samples);
                    }
                }));
                Some(writer)
            }
            Err(e) => {
                log::error!("cannot create '{}': {}", path.display(), e);
                return 1;
            }
        },
    };

    // GPU port dump.
    let mut gpu_dump = match &args.gpu_dump {
        None => None,
        Some(path) => match std::fs::File::create(path) {
            Ok(file) => {
                core.enable_gpu_port_capture();
                Some(std::io::BufWriter::new(file))
            }
            Err(e) => {
                log::error!("cannot create '{}': {}", path.display(), e);
                return 1;
            }
        },
    };
    let mut dump_scratch: Vec<(u32, u32)> = Vec::new();

    let max_steps = args.max_steps.unwrap_or(u64::MAX);
    let deadline = args.max_time.map(|secs| Instant::now() + Duration::from_secs(secs));

    // Run loop.
    let mut exit_code = 0i32;
    let mut stop_reason;
    loop {
        if core.steps() >= max_steps {
            stop_reason = format!("step budget ({}) reached", max_steps);
            break;
        }
        if let Some(deadline) = deadline {
            // Checking the clock every instruction would dominate the
            // loop; once per 64k steps is plenty.
            if core.steps() & 0xFFFF == 0 && Instant::now() >= deadline {
                stop_reason = format!("time budget ({}s) reached", args.max_time.unwrap_or(0));
                break;
            }
        }

        let result = core.step();

        if let Some(n) = args.pc_sample {
            if n > 0 && core.steps() % n == 0 {
                log::info!("pc sample: 0x{:08X} (step {})", core.pc(), core.steps());
            }
        }

        if gpu_dump.is_some() && core.steps() & 0xFFF == 0 {
            flush_gpu_dump(&mut core, &mut gpu_dump, &mut dump_scratch);
        }

        match result {
            StepResult::Ok { .. } => {}
            StepResult::Halted { pc } => {
                stop_reason = format!("halted at 0x{:08X}", pc);
                break;
            }
            StepResult::IllegalInstr { pc, instr } => {
                log::error!("illegal instruction 0x{:08X} at 0x{:08X}", instr, pc);
                stop_reason = format!("illegal instruction at 0x{:08X}", pc);
                exit_code = 1;
                break;
            }
            StepResult::MemFault { pc, addr, kind } => {
                log::error!("memory fault {:?} at 0x{:08X} (pc 0x{:08X})", kind, addr, pc);
                stop_reason = format!("memory fault at 0x{:08X}", addr);
                exit_code = 1;
                break;
            }
        }
    }

    // Teardown: flush audio and the GPU dump, finalize the WAV sizes.
    core.drain_audio();
    flush_gpu_dump(&mut core, &mut gpu_dump, &mut dump_scratch);
    if let Some(writer) = wav_writer {
        if let Ok(mut w) = writer.lock() {
            if let Err(e) = w.finalize() {
                log::warn!("WAV finalize failed: {}", e);
            }
        }
    }

    log::info!("run ended after {} steps: {}", core.steps(), stop_reason);
    if args.pretty {
        print_register_dump(&core);
    }
    exit_code
}

fn flush_gpu_dump(
    core: &mut Core,
    dump: &mut Option<std::io::BufWriter<std::fs::File>>,
    scratch: &mut Vec<(u32, u32)>,
) {
    use std::io::Write;
    let Some(writer) = dump.as_mut() else { return };
    core.drain_gpu_port_capture(scratch);
    for (port, value) in scratch.drain(..) {
        let _ = writer.write_all(&port.to_le_bytes());
        let _ = writer.write_all(&value.to_le_bytes());
    }
    let _ = writer.flush();
}

/// Human-readable end-of-run register dump.
fn print_register_dump(core: &Core) {
    println!("pc   0x{:08X}", core.pc());
    println!(
        "hi   0x{:08X}  lo 0x{:08X}",
        core.cpu().hi(),
        core.cpu().lo()
    );
    for row in 0..8 {
        let base = row * 4;
        println!(
            "r{:<2} 0x{:08X}  r{:<2} 0x{:08X}  r{:<2} 0x{:08X}  r{:<2} 0x{:08X}",
            base,
            core.gpr(base as u8),
            base + 1,
            core.gpr(base as u8 + 1),
            base + 2,
            core.gpr(base as u8 + 2),
            base + 3,
            core.gpr(base as u8 + 3),
        );
    }
    println!(
        "sr   0x{:08X}  cause 0x{:08X}  epc 0x{:08X}",
        core.cpu().cop0_reg(12),
        core.cpu().cop0_reg(13),
        core.cpu().cop0_reg(14)
    );
    println!("frames {}", core.bus().gpu().frame_count());
}
