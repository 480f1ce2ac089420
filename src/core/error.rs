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

//! Error taxonomy for the emulator.
//!
//! Setup-time failures (bad arguments, unreadable files, malformed images)
//! return structured errors and mutate no persistent state. Runtime faults
//! never unwind: bus accessors return [`MemFault`] values, and the CPU step
//! loop maps them into `StepResult` variants so the caller can decide
//! whether to abort or inspect the machine.

use thiserror::Error;

/// Errors raised while assembling a core: loading a BIOS, opening a disc,
/// parsing an executable.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("out of memory allocating {what} ({bytes} bytes)")]
    OutOfMemory { what: &'static str, bytes: usize },

    #[error("cannot open '{path}': {source}")]
    FileOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid format: {0}")]
    FormatInvalid(String),

    #[error("segment at 0x{addr:08X} (+0x{len:X} bytes) does not fit in RAM")]
    OutOfRam { addr: u32, len: u32 },
}

/// CD-ROM and disc-image errors.
#[derive(Debug, Error)]
pub enum CdRomError {
    #[error("invalid disc image: {0}")]
    InvalidImage(String),

    #[error("file not found on disc: {0}")]
    FileNotFound(String),

    #[error("disc read error: {0}")]
    ReadError(String),

    #[error("no disc in drive")]
    NoDisc,
}

impl From<std::io::Error> for CdRomError {
    fn from(e: std::io::Error) -> Self {
        CdRomError::ReadError(e.to_string())
    }
}

/// Kind of a memory fault produced by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemFaultKind {
    /// Halfword/word access at an address that is not suitably aligned.
    UnalignedLoad,
    UnalignedStore,
    /// Access outside every mapped region.
    Unmapped,
}

/// A memory fault as a value. Unaligned faults become architectural
/// address exceptions inside the CPU; unmapped faults surface through
/// `StepResult::MemFault`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemFault {
    pub addr: u32,
    pub kind: MemFaultKind,
}

impl MemFault {
    pub fn unmapped(addr: u32) -> Self {
        Self {
            addr,
            kind: MemFaultKind::Unmapped,
        }
    }
}

/// Result alias for bus accessors.
pub type MemResult<T> = std::result::Result<T, MemFault>;

/// Top-level error type for fallible emulator operations.
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    CdRom(#[from] CdRomError),

    #[error("memory fault: {kind:?} at 0x{addr:08X}")]
    Mem { addr: u32, kind: MemFaultKind },

    #[error("save state error: {0}")]
    Snapshot(String),
}

impl From<MemFault> for EmulatorError {
    fn from(f: MemFault) -> Self {
        EmulatorError::Mem {
            addr: f.addr,
            kind: f.kind,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EmulatorError>;
