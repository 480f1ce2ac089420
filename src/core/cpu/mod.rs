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

//! MIPS R3000A interpreter.
//!
//! One call to [`Cpu::step`] executes exactly one architectural
//! instruction and returns a [`StepResult`]. Pending unmasked interrupts
//! are taken before the fetch; branch and load delay slots follow the
//! R3000 pipeline rules:
//!
//! * the instruction at `branch_pc + 4` executes exactly once before the
//!   branch lands, and `JAL`/`JALR` link to `branch_pc + 8`;
//! * a loaded value becomes visible one instruction later, and the
//!   queued write is squashed by a write to the same register from the
//!   intervening instruction.
//!
//! Memory faults never unwind through panics: bus accessors return
//! fault values, unaligned accesses become architectural address
//! exceptions (with `BadVAddr` set), and unmapped accesses surface as
//! `StepResult::MemFault`.

use crate::core::error::{MemFault, MemFaultKind};
use crate::core::gte::Gte;
use crate::core::memory::Bus;
use crate::logging::{LogCategory, LogLevel, Logger};

mod cop0;
mod decode;
mod disassembler;
mod instructions;

pub use cop0::ExceptionCause;
use cop0::Cop0;
pub use disassembler::disassemble;

/// Result of executing one architectural instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// The instruction at `pc` executed normally (including instructions
    /// that raised an architectural exception and vectored through COP0).
    Ok { pc: u32, instr: u32 },
    /// Execution halted: a BREAK under the harness convention, or a
    /// diagnostic stop predicate fired at `pc` before the fetch.
    Halted { pc: u32 },
    /// The word at `pc` does not decode to a known instruction.
    IllegalInstr { pc: u32, instr: u32 },
    /// A bus access faulted in a way the guest cannot handle.
    MemFault {
        pc: u32,
        addr: u32,
        kind: MemFaultKind,
    },
}

/// One queued load-delay write.
#[derive(Debug, Clone, Copy)]
struct LoadDelay {
    reg: u8,
    value: u32,
    /// PC of the load instruction, for trace output only.
    issued_at: u32,
}

/// Internal execution outcome of one instruction.
pub(crate) enum Flow {
    Normal,
    /// BREAK under the halt convention.
    Halt,
}

/// Internal failure channel for `execute`.
pub(crate) enum ExecError {
    /// Reserved/unknown encoding.
    Illegal,
    /// Unmapped bus access; surfaces as `StepResult::MemFault`.
    Mem(MemFault),
    /// An architectural exception was raised and the CPU has already
    /// vectored; the step itself still counts as `Ok`.
    Raised,
}

pub(crate) type ExecResult = std::result::Result<Flow, ExecError>;

/// MIPS R3000A CPU state.
pub struct Cpu {
    /// General purpose registers; index 0 reads as zero.
    regs: [u32; 32],
    pc: u32,
    next_pc: u32,
    /// Address of the instruction currently executing.
    current_pc: u32,
    hi: u32,
    lo: u32,
    cop0: Cop0,
    gte: Gte,
    /// Load queued by the previous instruction; applies after the current
    /// instruction executes (so the current instruction reads the
    /// pre-load value).
    delay_commit: Option<LoadDelay>,
    /// Load queued by the current instruction.
    load_queue: Option<LoadDelay>,
    /// True while the executing instruction sits in a branch delay slot.
    in_delay_slot: bool,
    /// Set by branch/jump instructions; promoted to `in_delay_slot` for
    /// the following instruction.
    branch_executed: bool,
    current_instruction: u32,
    // Options
    hle_syscalls: bool,
    break_halts: bool,
    stop_on_pc: Option<u32>,
    stop_on_idle_nop: bool,
    stop_on_high_ram_fetch: bool,
    log: Logger,
}

impl Cpu {
    /// Physical address mask (strip KUSEG/KSEG0/KSEG1 segment bits).
    const PHYS_MASK: u32 = 0x1FFF_FFFF;

    /// BIOS entry point after reset.
    const RESET_PC: u32 = 0xBFC0_0000;

    pub fn new() -> Self {
        Self {
            regs: [0u32; 32],
            pc: Self::RESET_PC,
            next_pc: Self::RESET_PC.wrapping_add(4),
            current_pc: Self::RESET_PC,
            hi: 0,
            lo: 0,
            cop0: Cop0::new(),
            gte: Gte::new(),
            delay_commit: None,
            load_queue: None,
            in_delay_slot: false,
            branch_executed: false,
            current_instruction: 0,
            hle_syscalls: false,
            break_halts: false,
            stop_on_pc: None,
            stop_on_idle_nop: false,
            stop_on_high_ram_fetch: false,
            log: Logger::null(),
        }
    }

    pub fn set_logger(&mut self, log: Logger) {
        self.log = log;
    }

    /// Reset to the power-on state (PC at the BIOS entry).
    pub fn reset(&mut self) {
        self.regs = [0u32; 32];
        self.pc = Self::RESET_PC;
        self.next_pc = Self::RESET_PC.wrapping_add(4);
        self.current_pc = Self::RESET_PC;
        self.hi = 0;
        self.lo = 0;
        self.cop0.reset();
        self.gte.reset();
        self.delay_commit = None;
        self.load_queue = None;
        self.in_delay_slot = false;
        self.branch_executed = false;
        self.current_instruction = 0;
    }

    // --- Options -----------------------------------------------------------

    /// Route SYSCALL with `v0` in `0xFF00..=0xFF03` to the host-print
    /// interface instead of the architectural exception.
    pub fn set_hle_syscalls(&mut self, on: bool) {
        self.hle_syscalls = on;
    }

    /// Make BREAK return `Halted` instead of raising the Break exception.
    pub fn set_break_halts(&mut self, on: bool) {
        self.break_halts = on;
    }

    /// Halt before executing the instruction at `pc`.
    pub fn set_stop_on_pc(&mut self, pc: Option<u32>) {
        self.stop_on_pc = pc;
    }

    /// Halt when about to execute a no-op in the low-RAM transition window
    /// (the BIOS-to-RAM handoff region).
    pub fn set_stop_on_idle_nop(&mut self, on: bool) {
        self.stop_on_idle_nop = on;
    }

    /// Halt when fetching from the top 64 KiB of RAM.
    pub fn set_stop_on_high_ram_fetch(&mut self, on: bool) {
        self.stop_on_high_ram_fetch = on;
    }

    // --- Register file -----------------------------------------------------

    /// Read a general purpose register. r0 always reads 0.
    #[inline(always)]
    pub fn reg(&self, index: u8) -> u32 {
        if index == 0 {
            0
        } else {
            self.regs[index as usize]
        }
    }

    /// Write a general purpose register. Writes to r0 are dropped. A write
    /// squashes any pending load-delay commit to the same register.
    #[inline(always)]
    pub fn set_reg(&mut self, index: u8, value: u32) {
        if index != 0 {
            if let Some(d) = self.delay_commit {
                if d.reg == index {
                    self.delay_commit = None;
                }
            }
            self.regs[index as usize] = value;
        }
    }

    /// Queue a load-delay write: the value becomes visible one instruction
    /// later. Back-to-back loads to the same register squash the earlier
    /// in-flight value.
    pub(crate) fn set_reg_delayed(&mut self, index: u8, value: u32) {
        if index == 0 {
            return;
        }
        if let Some(d) = self.delay_commit {
            if d.reg == index {
                self.delay_commit = None;
            }
        }
        self.load_queue = Some(LoadDelay {
            reg: index,
            value,
            issued_at: self.current_pc,
        });
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Set PC and next-PC, discarding any branch in flight. Used when
    /// loading executables.
    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
        self.next_pc = pc.wrapping_add(4);
        self.branch_executed = false;
        self.in_delay_slot = false;
    }

    pub fn hi(&self) -> u32 {
        self.hi
    }

    pub fn lo(&self) -> u32 {
        self.lo
    }

    /// Read a COP0 register (diagnostics / snapshots).
    pub fn cop0_reg(&self, index: usize) -> u32 {
        self.cop0.regs[index & 31]
    }

    pub(crate) fn gte_mut(&mut self) -> &mut Gte {
        &mut self.gte
    }

    // --- Snapshot plumbing -------------------------------------------------

    pub(crate) fn export_state(&self) -> ([u32; 32], u32, u32, u32, u32, [u32; 32]) {
        (self.regs, self.pc, self.next_pc, self.hi, self.lo, self.cop0.regs)
    }

    pub(crate) fn import_state(
        &mut self,
        regs: [u32; 32],
        pc: u32,
        next_pc: u32,
        hi: u32,
        lo: u32,
        cop0: [u32; 32],
    ) {
        self.regs = regs;
        self.pc = pc;
        self.next_pc = next_pc;
        self.hi = hi;
        self.lo = lo;
        self.cop0.regs = cop0;
        self.delay_commit = None;
        self.load_queue = None;
        self.branch_executed = false;
        self.in_delay_slot = false;
    }

    // --- Step --------------------------------------------------------------

    /// Execute exactly one architectural instruction.
    pub fn step(&mut self, bus: &mut Bus) -> StepResult {
        // Interrupts are sampled before the fetch.
        if self.interrupt_pending(bus) {
            self.take_interrupt();
        }

        let pc = self.pc;

        // Diagnostic stop predicates observe state but never change it.
        if self.stop_requested(bus, pc) {
            self.log
                .debug(LogCategory::System, format_args!("stop at 0x{:08X}", pc));
            return StepResult::Halted { pc };
        }

        // Fetch.
        if pc & 3 != 0 {
            self.cop0.regs[Cop0::BADV] = pc;
            self.current_pc = pc;
            self.in_delay_slot = self.branch_executed;
            self.enter_exception(ExceptionCause::AddressErrorLoad);
            return StepResult::Ok { pc, instr: 0 };
        }
        let instr = match bus.read32(pc) {
            Ok(word) => word,
            Err(fault) => {
                return StepResult::MemFault {
                    pc,
                    addr: fault.addr,
                    kind: fault.kind,
                }
            }
        };

        if self.log.enabled(LogLevel::Trace, LogCategory::Fetch) {
            self.log.trace(
                LogCategory::Fetch,
                format_args!("0x{:08X}: 0x{:08X}", pc, instr),
            );
        }
        if self.log.enabled(LogLevel::Debug, LogCategory::Exec) {
            self.log.debug(
                LogCategory::Exec,
                format_args!("0x{:08X}: {}", pc, disassemble(instr)),
            );
        }

        self.current_pc = pc;
        self.current_instruction = instr;
        self.in_delay_slot = self.branch_executed;
        self.branch_executed = false;

        // The load issued by the previous instruction commits after this
        // instruction executes, so its reads still see the old value.
        self.delay_commit = self.load_queue.take();

        // Advance PC through the delay-slot pipeline.
        self.pc = self.next_pc;
        self.next_pc = self.next_pc.wrapping_add(4);

        let outcome = self.execute(instr, bus);

        // Commit the delayed load unless the instruction squashed it.
        if let Some(d) = self.delay_commit.take() {
            self.regs[d.reg as usize] = d.value;
            if self.log.enabled(LogLevel::Trace, LogCategory::Exec) {
                self.log.trace(
                    LogCategory::Exec,
                    format_args!(
                        "load commit r{} = 0x{:08X} (issued at 0x{:08X})",
                        d.reg, d.value, d.issued_at
                    ),
                );
            }
        }

        match outcome {
            Ok(Flow::Normal) => StepResult::Ok { pc, instr },
            Ok(Flow::Halt) => StepResult::Halted { pc },
            Err(ExecError::Raised) => StepResult::Ok { pc, instr },
            Err(ExecError::Illegal) => StepResult::IllegalInstr { pc, instr },
            Err(ExecError::Mem(fault)) => StepResult::MemFault {
                pc,
                addr: fault.addr,
                kind: fault.kind,
            },
        }
    }

    /// Whether an unmasked external interrupt should be taken. Mirrors the
    /// pending state into `Cause.IP2` the way the hardware interrupt line
    /// drives it.
    fn interrupt_pending(&mut self, bus: &Bus) -> bool {
        let pending = bus.is_interrupt_pending();

        if pending {
            self.cop0.regs[Cop0::CAUSE] |= 1 << 10;
        } else {
            self.cop0.regs[Cop0::CAUSE] &= !(1 << 10);
        }

        let sr = self.cop0.regs[Cop0::SR];
        let iec = (sr & 1) != 0;
        // SR.IM bit 10 gates the external interrupt line.
        pending && iec && (sr & (1 << 10)) != 0
    }

    /// Take an Interrupt exception before the fetch. EPC points at the
    /// instruction that was about to execute (or the branch, when that
    /// instruction sits in a delay slot).
    fn take_interrupt(&mut self) {
        self.current_pc = self.pc;
        self.in_delay_slot = self.branch_executed;
        self.enter_exception(ExceptionCause::Interrupt);
        self.branch_executed = false;
    }

    /// Raise an architectural exception: push the SR interrupt/mode stack,
    /// record the cause and EPC, and vector.
    pub(crate) fn enter_exception(&mut self, cause: ExceptionCause) {
        let sr = self.cop0.regs[Cop0::SR];

        // Push the (IEc,KUc) stack: current→previous, previous→old.
        // The new current bits are zero: kernel mode, interrupts off.
        let mode = sr & 0x3F;
        self.cop0.regs[Cop0::SR] = (sr & !0x3F) | ((mode << 2) & 0x3F);

        let cause_reg = self.cop0.regs[Cop0::CAUSE];
        let mut new_cause = (cause_reg & !0x7C) | ((cause as u32) << 2);

        let epc = if self.in_delay_slot {
            new_cause |= 1 << 31;
            self.current_pc.wrapping_sub(4)
        } else {
            new_cause &= !(1 << 31);
            self.current_pc
        };
        self.cop0.regs[Cop0::CAUSE] = new_cause;
        self.cop0.regs[Cop0::EPC] = epc;

        let vector = if sr & Cop0::SR_BEV != 0 {
            0xBFC0_0180
        } else {
            0x8000_0080
        };

        self.log.debug(
            LogCategory::Exc,
            format_args!(
                "{:?} at 0x{:08X} (EPC=0x{:08X}, delay={}, vector=0x{:08X})",
                cause, self.current_pc, epc, self.in_delay_slot, vector
            ),
        );

        self.pc = vector;
        self.next_pc = vector.wrapping_add(4);
        self.branch_executed = false;
    }

    /// Raise an address exception with `BadVAddr` latched.
    pub(crate) fn address_exception(&mut self, addr: u32, store: bool) {
        self.cop0.regs[Cop0::BADV] = addr;
        let cause = if store {
            ExceptionCause::AddressErrorStore
        } else {
            ExceptionCause::AddressErrorLoad
        };
        self.log.debug(
            LogCategory::Mem,
            format_args!(
                "unaligned {} at 0x{:08X} (pc=0x{:08X})",
                if store { "store" } else { "load" },
                addr,
                self.current_pc
            ),
        );
        self.enter_exception(cause);
    }

    /// Diagnostic stop predicates (never mutate state).
    fn stop_requested(&self, bus: &Bus, pc: u32) -> bool {
        if self.stop_on_pc == Some(pc) {
            return true;
        }
        let phys = pc & Self::PHYS_MASK;
        if self.stop_on_high_ram_fetch && (0x001F_0000..0x0020_0000).contains(&phys) {
            return true;
        }
        if self.stop_on_idle_nop && phys < 0x0001_0000 {
            if bus.peek_ram32(phys) == Some(0) {
                return true;
            }
        }
        false
    }

    // --- Host-print syscalls ----------------------------------------------

    /// Handle a reserved host syscall id in v0. Returns true if consumed.
    pub(crate) fn hle_syscall(&mut self, bus: &Bus) -> bool {
        if !self.hle_syscalls {
            return false;
        }
        match self.reg(2) {
            0xFF00 => {
                self.log.text(&format!("{}\n", self.reg(4)));
                true
            }
            0xFF02 => {
                let byte = (self.reg(4) & 0xFF) as u8;
                self.log.text(&String::from_utf8_lossy(&[byte]));
                true
            }
            0xFF03 => {
                let mut addr = self.reg(4) & Self::PHYS_MASK;
                let mut out = Vec::new();
                // Bounded walk; a missing terminator must not hang the core.
                for _ in 0..4096 {
                    match bus.peek_ram8(addr) {
                        Some(0) | None => break,
                        Some(b) => out.push(b),
                    }
                    addr = addr.wrapping_add(1);
                }
                self.log.text(&String::from_utf8_lossy(&out));
                true
            }
            _ => false,
        }
    }

    // --- Bus access helpers (alignment checked here, so the bus only
    //     reports unmapped faults back) ------------------------------------

    pub(crate) fn load8(&mut self, bus: &mut Bus, addr: u32) -> Result<u8, ExecError> {
        bus.read8(addr).map_err(ExecError::Mem)
    }

    pub(crate) fn load16(&mut self, bus: &mut Bus, addr: u32) -> Result<u16, ExecError> {
        if addr & 1 != 0 {
            self.address_exception(addr, false);
            return Err(ExecError::Raised);
        }
        bus.read16(addr).map_err(ExecError::Mem)
    }

    pub(crate) fn load32(&mut self, bus: &mut Bus, addr: u32) -> Result<u32, ExecError> {
        if addr & 3 != 0 {
            self.address_exception(addr, false);
            return Err(ExecError::Raised);
        }
        bus.read32(addr).map_err(ExecError::Mem)
    }

    pub(crate) fn store8(&mut self, bus: &mut Bus, addr: u32, value: u8) -> Result<(), ExecError> {
        bus.write8(addr, value).map_err(ExecError::Mem)
    }

    pub(crate) fn store16(
        &mut self,
        bus: &mut Bus,
        addr: u32,
        value: u16,
    ) -> Result<(), ExecError> {
        if addr & 1 != 0 {
            self.address_exception(addr, true);
            return Err(ExecError::Raised);
        }
        bus.write16(addr, value).map_err(ExecError::Mem)
    }

    pub(crate) fn store32(
        &mut self,
        bus: &mut Bus,
        addr: u32,
        value: u32,
    ) -> Result<(), ExecError> {
        if addr & 3 != 0 {
            self.address_exception(addr, true);
            return Err(ExecError::Raised);
        }
        bus.write32(addr, value).map_err(ExecError::Mem)
    }

    /// Cache-isolated stores are dropped while SR.IsC is set; the BIOS
    /// uses this to clear the instruction cache without touching RAM.
    #[inline(always)]
    pub(crate) fn cache_isolated(&self) -> bool {
        self.cop0.regs[Cop0::SR] & (1 << 16) != 0
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
