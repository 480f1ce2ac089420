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

//! Injected, tagged, leveled logging for the emulator core.
//!
//! The core never talks to a global logger. Every component receives a
//! [`Logger`] handle (a cheap clone) at construction time or through
//! `Core::set_log_sinks`. A `Logger` routes lines by [`LogCategory`] to one
//! or more [`LogSink`]s, stamping each line with a monotonic timestamp and
//! a category tag:
//!
//! ```text
//!     3.141592 [GPU ] DEBUG CPU→VRAM transfer: (0, 0) 64×64
//! ```
//!
//! Sinks are a small closed set, so they are a tagged enum rather than a
//! trait object zoo: a buffered file, a host callback, stderr/stdout, or
//! nothing. The `log`/`env_logger` pair is still used by the binary for
//! bootstrap messages emitted before a core (and thus a sink set) exists.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Log severity, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Fixed-width tag used in log lines.
    pub fn tag(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN ",
            LogLevel::Info => "INFO ",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    /// Parse a CLI level name (`error|warn|info|debug|trace`).
    pub fn parse(s: &str) -> Option<LogLevel> {
        match s {
            "error" => Some(LogLevel::Error),
            "warn" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Source category of a log line.
///
/// Categories map onto the persisted log files: `System`/`Mem`/`Exc` and
/// the CPU trace categories go to the system log, device categories go to
/// their device logs, `Io` to the io log, and `Text` carries guest program
/// output (host-print syscalls and the debug MMIO port) verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    System,
    Fetch,
    Decode,
    Exec,
    Mem,
    Exc,
    Io,
    Dma,
    Gpu,
    Cdrom,
    Spu,
    Text,
}

impl LogCategory {
    /// All categories, for mask construction.
    pub const ALL: [LogCategory; 12] = [
        LogCategory::System,
        LogCategory::Fetch,
        LogCategory::Decode,
        LogCategory::Exec,
        LogCategory::Mem,
        LogCategory::Exc,
        LogCategory::Io,
        LogCategory::Dma,
        LogCategory::Gpu,
        LogCategory::Cdrom,
        LogCategory::Spu,
        LogCategory::Text,
    ];

    /// Fixed-width tag used in log lines.
    pub fn tag(self) -> &'static str {
        match self {
            LogCategory::System => "SYS ",
            LogCategory::Fetch => "FTCH",
            LogCategory::Decode => "DEC ",
            LogCategory::Exec => "EXEC",
            LogCategory::Mem => "MEM ",
            LogCategory::Exc => "EXC ",
            LogCategory::Io => "IO  ",
            LogCategory::Dma => "DMA ",
            LogCategory::Gpu => "GPU ",
            LogCategory::Cdrom => "CD  ",
            LogCategory::Spu => "SPU ",
            LogCategory::Text => "TEXT",
        }
    }

    /// Bit used in category masks.
    #[inline(always)]
    pub fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Parse a CLI category name as used by `--log-cats`.
    pub fn parse(s: &str) -> Option<LogCategory> {
        match s {
            "system" => Some(LogCategory::System),
            "fetch" => Some(LogCategory::Fetch),
            "decode" => Some(LogCategory::Decode),
            "exec" => Some(LogCategory::Exec),
            "mem" => Some(LogCategory::Mem),
            "exc" => Some(LogCategory::Exc),
            "io" => Some(LogCategory::Io),
            "dma" => Some(LogCategory::Dma),
            "gpu" => Some(LogCategory::Gpu),
            "cdrom" => Some(LogCategory::Cdrom),
            "spu" => Some(LogCategory::Spu),
            "text" => Some(LogCategory::Text),
            _ => None,
        }
    }

    /// Mask with every category enabled.
    pub fn all_mask() -> u16 {
        Self::ALL.iter().fold(0, |m, c| m | c.bit())
    }

    /// Default mask: everything except the per-instruction CPU trace
    /// categories, which drown the logs when left on.
    pub fn default_mask() -> u16 {
        Self::all_mask()
            & !(LogCategory::Fetch.bit() | LogCategory::Decode.bit() | LogCategory::Exec.bit())
    }
}

/// A destination for log lines.
///
/// The set of sinks is small and closed, so this is a tagged enum rather
/// than a trait object.
pub enum LogSink {
    /// Discard everything.
    Null,
    /// Buffered line-oriented file.
    File(Mutex<BufWriter<File>>),
    /// Host-provided callback; receives the formatted line without newline.
    Callback(Box<dyn Fn(&str) + Send + Sync>),
    /// Standard error.
    Stderr,
    /// Standard output (used to mirror guest text output).
    Stdout,
}

impl LogSink {
    /// Open a file sink, creating parent directories as needed, and write a
    /// wall-clock banner line so log files are self-dating.
    pub fn file<P: AsRef<Path>>(path: P) -> std::io::Result<LogSink> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        writeln!(
            writer,
            "# opened {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f %z")
        )?;
        Ok(LogSink::File(Mutex::new(writer)))
    }

    /// Write one formatted line (no trailing newline in `line`).
    fn write_line(&self, line: &str) {
        match self {
            LogSink::Null => {}
            LogSink::File(writer) => {
                let mut writer = writer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                let _ = writeln!(writer, "{}", line);
            }
            LogSink::Callback(cb) => cb(line),
            LogSink::Stderr => {
                eprintln!("{}", line);
            }
            LogSink::Stdout => {
                println!("{}", line);
            }
        }
    }

    /// Write raw text with no tags or timestamp (guest program output).
    fn write_text(&self, text: &str) {
        match self {
            LogSink::Null => {}
            LogSink::File(writer) => {
                let mut writer = writer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                let _ = write!(writer, "{}", text);
                let _ = writer.flush();
            }
            LogSink::Callback(cb) => cb(text),
            LogSink::Stderr => {
                eprint!("{}", text);
            }
            LogSink::Stdout => {
                print!("{}", text);
                let _ = std::io::stdout().flush();
            }
        }
    }
}

/// Category-to-sink routing table.
///
/// A sink may be shared between several category masks (e.g. `Text` routed
/// to both `outtext.log` and stdout).
#[derive(Default)]
pub struct SinkSet {
    routes: Vec<(u16, Arc<LogSink>)>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Route the given categories to a sink. Categories may appear in
    /// multiple routes; each matching sink receives the line.
    pub fn route(mut self, cats: &[LogCategory], sink: Arc<LogSink>) -> Self {
        let mask = cats.iter().fold(0u16, |m, c| m | c.bit());
        self.routes.push((mask, sink));
        self
    }

    /// Route every category to a single sink.
    pub fn route_all(self, sink: Arc<LogSink>) -> Self {
        let mask = LogCategory::all_mask();
        let mut s = self;
        s.routes.push((mask, sink));
        s
    }
}

struct LoggerShared {
    level: LogLevel,
    cat_mask: u16,
    sinks: SinkSet,
    epoch: Instant,
}

/// Cheap-to-clone logging handle held by every core component.
#[derive(Clone)]
pub struct Logger {
    shared: Arc<LoggerShared>,
}

impl Logger {
    /// A logger that discards everything. Components start with this until
    /// `Core::set_log_sinks` installs the real one.
    pub fn null() -> Logger {
        Logger {
            shared: Arc::new(LoggerShared {
                level: LogLevel::Error,
                cat_mask: 0,
                sinks: SinkSet::new(),
                epoch: Instant::now(),
            }),
        }
    }

    /// Build a logger from a level, category mask and sink routing.
    pub fn new(level: LogLevel, cat_mask: u16, sinks: SinkSet) -> Logger {
        Logger {
            shared: Arc::new(LoggerShared {
                level,
                cat_mask,
                sinks,
                epoch: Instant::now(),
            }),
        }
    }

    /// Whether a line at `level`/`cat` would be emitted. Callers building
    /// expensive messages should check this first.
    #[inline(always)]
    pub fn enabled(&self, level: LogLevel, cat: LogCategory) -> bool {
        level <= self.shared.level && (self.shared.cat_mask & cat.bit()) != 0
    }

    /// Emit one line.
    pub fn log(&self, level: LogLevel, cat: LogCategory, args: fmt::Arguments) {
        if !self.enabled(level, cat) {
            return;
        }
        let t = self.shared.epoch.elapsed();
        let line = format!(
            "{:5}.{:06} [{}] {} {}",
            t.as_secs(),
            t.subsec_micros(),
            cat.tag(),
            level.tag(),
            args
        );
        for (mask, sink) in &self.shared.sinks.routes {
            if mask & cat.bit() != 0 {
                sink.write_line(&line);
            }
        }
    }

    #[inline(always)]
    pub fn error(&self, cat: LogCategory, args: fmt::Arguments) {
        self.log(LogLevel::Error, cat, args);
    }

    #[inline(always)]
    pub fn warn(&self, cat: LogCategory, args: fmt::Arguments) {
        self.log(LogLevel::Warn, cat, args);
    }

    #[inline(always)]
    pub fn info(&self, cat: LogCategory, args: fmt::Arguments) {
        self.log(LogLevel::Info, cat, args);
    }

    #[inline(always)]
    pub fn debug(&self, cat: LogCategory, args: fmt::Arguments) {
        self.log(LogLevel::Debug, cat, args);
    }

    #[inline(always)]
    pub fn trace(&self, cat: LogCategory, args: fmt::Arguments) {
        self.log(LogLevel::Trace, cat, args);
    }

    /// Emit guest program text to the `Text`-routed sinks, untagged.
    /// Used by the debug-print MMIO port and the host-print syscalls.
    pub fn text(&self, text: &str) {
        for (mask, sink) in &self.shared.sinks.routes {
            if mask & LogCategory::Text.bit() != 0 {
                sink.write_text(text);
            }
        }
    }
}
