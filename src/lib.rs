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

//! epsx: an educational PlayStation (PSX) emulator core.
//!
//! The crate centers on [`core::system::Core`]: an R3000A interpreter
//! wired to a bus that owns the interrupt controller, DMA engine, GPU
//! command pipeline, SPU mixer, CD-ROM drive and timers. A host drives
//! it one instruction at a time and reads thread-safe snapshots of VRAM
//! and the per-frame draw-command list.
//!
//! ```no_run
//! use epsx::core::{Core, StepResult};
//!
//! let mut core = Core::new(2 * 1024 * 1024)?;
//! core.load_bios_file("SCPH1001.BIN")?;
//! loop {
//!     match core.step() {
//!         StepResult::Ok { .. } => {}
//!         other => break,
//!     }
//! }
//! # Ok::<(), epsx::core::EmulatorError>(())
//! ```
//!
//! Logging is injected: build a [`logging::Logger`] over a set of
//! [`logging::LogSink`]s and hand it to `Core::set_log_sinks`. Nothing in
//! the core talks to a global logger.

pub mod core;
pub mod logging;

// Re-export commonly used types.
pub use crate::core::{Core, EmulatorError, Result, StepResult};
