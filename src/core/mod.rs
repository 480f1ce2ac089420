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

//! Core emulation components.
//!
//! - [`cpu`]: MIPS R3000A interpreter
//! - [`memory`]: bus, address decoding and MMIO dispatch
//! - [`interrupt`]: I_STAT/I_MASK controller
//! - [`dma`]: 7-channel DMA engine
//! - [`gpu`]: GP0/GP1 command pipeline, VRAM, draw capture
//! - [`spu`]: 24-voice ADPCM mixer
//! - [`cdrom`]: drive controller, disc images, ISO-9660
//! - [`gte`]: COP2 geometry engine subset
//! - [`timer`]: root counters (coarse)
//! - [`loader`]: PS-X EXE and ELF loading
//! - [`system`]: the [`system::Core`] handle tying it all together

pub mod cdrom;
pub mod cpu;
pub mod dma;
pub mod error;
pub mod gpu;
pub mod gte;
pub mod interrupt;
pub mod loader;
pub mod memory;
pub mod snapshot;
pub mod spu;
pub mod system;
pub mod timer;

pub use cpu::StepResult;
pub use error::{EmulatorError, Result};
pub use system::Core;
