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

//! COP0 moves, RFE, SYSCALL and BREAK.

use super::super::cop0::Cop0;
use super::super::decode::decode_r_type;
use super::super::{Cpu, ExceptionCause, ExecError, ExecResult, Flow};
use crate::core::memory::Bus;
use crate::logging::LogCategory;

impl Cpu {
    /// COP0 opcode group (op = 0x10), selected by the rs field.
    pub(crate) fn op_cop0(&mut self, instr: u32, _bus: &mut Bus) -> ExecResult {
        let (cop_op, rt, rd, _, funct) = decode_r_type(instr);

        match cop_op {
            // MFC0: COP0 → GPR, through the load delay slot.
            0x00 => {
                let value = self.cop0.regs[rd as usize];
                self.set_reg_delayed(rt, value);
                Ok(Flow::Normal)
            }
            // MTC0: GPR → COP0.
            0x04 => {
                let value = self.reg(rt);
                self.op_mtc0(rd, value);
                Ok(Flow::Normal)
            }
            // CO subgroup: RFE is the only one the R3000 implements.
            0x10..=0x1F => {
                if funct == 0x10 {
                    self.op_rfe();
                    Ok(Flow::Normal)
                } else {
                    Err(ExecError::Illegal)
                }
            }
            _ => Err(ExecError::Illegal),
        }
    }

    /// MTC0 write with per-register semantics.
    pub(crate) fn op_mtc0(&mut self, rd: u8, value: u32) {
        match rd as usize {
            Cop0::SR => {
                self.cop0.regs[Cop0::SR] = value;
            }
            Cop0::CAUSE => {
                // Only the software interrupt bits are writable.
                let cause = self.cop0.regs[Cop0::CAUSE];
                self.cop0.regs[Cop0::CAUSE] = (cause & !0x300) | (value & 0x300);
            }
            Cop0::PRID => {
                // Read-only; drop silently like hardware.
            }
            other => {
                self.cop0.regs[other] = value;
            }
        }
    }

    /// RFE: pop the SR interrupt/mode stack (previous→current, old→previous;
    /// the old bits keep their value).
    pub(crate) fn op_rfe(&mut self) {
        let sr = self.cop0.regs[Cop0::SR];
        let mode = sr & 0x3F;
        self.cop0.regs[Cop0::SR] = (sr & !0xF) | ((mode >> 2) & 0xF);
    }

    /// SYSCALL. With HLE syscalls enabled and v0 in the reserved host
    /// range, the call is serviced by the host-print interface instead of
    /// the architectural exception.
    pub(crate) fn op_syscall(&mut self, bus: &mut Bus) -> ExecResult {
        if self.hle_syscall(bus) {
            return Ok(Flow::Normal);
        }
        self.enter_exception(ExceptionCause::Syscall);
        Err(ExecError::Raised)
    }

    /// BREAK. Under the harness halt convention this stops the run;
    /// otherwise it raises the architectural Break exception.
    pub(crate) fn op_break(&mut self) -> ExecResult {
        if self.break_halts {
            self.log.debug(
                LogCategory::System,
                format_args!("BREAK at 0x{:08X}, halting", self.current_pc),
            );
            return Ok(Flow::Halt);
        }
        self.enter_exception(ExceptionCause::Breakpoint);
        Err(ExecError::Raised)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StepResult;

    fn setup(program: &[u32]) -> (Cpu, Bus) {
        let mut bus = Bus::new(2 * 1024 * 1024);
        for (i, word) in program.iter().enumerate() {
            bus.write32(0x8000_0000 + (i as u32) * 4, *word).unwrap();
        }
        let mut cpu = Cpu::new();
        cpu.set_pc(0x8000_0000);
        (cpu, bus)
    }

    #[test]
    fn test_mtc0_mfc0_roundtrip_sr() {
        // MTC0 r1 → SR; MFC0 SR → r2; nop (load delay)
        let mtc0 = (0x10 << 26) | (0x04 << 21) | (1 << 16) | (12 << 11);
        let mfc0 = (0x10 << 26) | (2 << 16) | (12 << 11);
        let (mut cpu, mut bus) = setup(&[mtc0, mfc0, 0, 0]);
        cpu.set_reg(1, 0x1040_0401);

        cpu.step(&mut bus);
        cpu.step(&mut bus);
        cpu.step(&mut bus);
        assert_eq!(cpu.reg(2), 0x1040_0401);
    }

    #[test]
    fn test_mtc0_cause_masks_readonly_bits() {
        let mut cpu = Cpu::new();
        cpu.op_mtc0(13, 0xFFFF_FFFF);
        assert_eq!(cpu.cop0_reg(13) & !0x300, 0, "only SW interrupt bits stick");
    }

    #[test]
    fn test_syscall_exception_state() {
        let syscall = 0x0000_000C;
        let (mut cpu, mut bus) = setup(&[syscall, 0]);

        let result = cpu.step(&mut bus);
        assert!(matches!(result, StepResult::Ok { .. }));
        assert_eq!((cpu.cop0_reg(13) >> 2) & 0x1F, 8, "Cause = Syscall");
        assert_eq!(cpu.cop0_reg(14), 0x8000_0000, "EPC at the SYSCALL");
        assert_eq!(cpu.pc(), 0xBFC0_0180);
    }

    #[test]
    fn test_exception_pushes_sr_stack_and_rfe_pops_it() {
        let mut cpu = Cpu::new();
        // Start with IEc=1, KUc=0
        cpu.op_mtc0(12, cpu.cop0_reg(12) | 0x1);
        let sr_before = cpu.cop0_reg(12);

        cpu.enter_exception(ExceptionCause::Syscall);
        let sr_in_handler = cpu.cop0_reg(12);
        assert_eq!(sr_in_handler & 0x3, 0, "IEc/KUc cleared in handler");
        assert_eq!((sr_in_handler >> 2) & 0x3, sr_before & 0x3, "pushed");

        cpu.op_rfe();
        assert_eq!(cpu.cop0_reg(12) & 0x3F, sr_before & 0x3F, "RFE restores");
    }

    #[test]
    fn test_break_raises_exception_by_default() {
        let brk = 0x0000_000D;
        let (mut cpu, mut bus) = setup(&[brk, 0]);
        let result = cpu.step(&mut bus);
        assert!(matches!(result, StepResult::Ok { .. }));
        assert_eq!((cpu.cop0_reg(13) >> 2) & 0x1F, 9, "Cause = Breakpoint");
    }

    #[test]
    fn test_break_halts_under_harness_convention() {
        let brk = 0x0000_000D;
        let (mut cpu, mut bus) = setup(&[brk, 0]);
        cpu.set_break_halts(true);

        let result = cpu.step(&mut bus);
        assert_eq!(result, StepResult::Halted { pc: 0x8000_0000 });
    }

    #[test]
    fn test_exception_in_delay_slot_sets_bd_and_branch_epc() {
        // 0: beq r0, r0, +4
        // 4: syscall        (delay slot)
        let beq = (0x04 << 26) | 4;
        let syscall = 0x0000_000C;
        let (mut cpu, mut bus) = setup(&[beq, syscall, 0]);

        cpu.step(&mut bus); // beq
        cpu.step(&mut bus); // syscall in delay slot

        assert_ne!(cpu.cop0_reg(13) & (1 << 31), 0, "Cause.BD set");
        assert_eq!(cpu.cop0_reg(14), 0x8000_0000, "EPC points at the branch");
    }

    #[test]
    fn test_hle_syscall_print_skips_exception() {
        let syscall = 0x0000_000C;
        let (mut cpu, mut bus) = setup(&[syscall, 0]);
        cpu.set_hle_syscalls(true);
        cpu.set_reg(2, 0xFF00);
        cpu.set_reg(4, 42);

        let result = cpu.step(&mut bus);
        assert!(matches!(result, StepResult::Ok { .. }));
        assert_eq!(
            (cpu.cop0_reg(13) >> 2) & 0x1F,
            0,
            "no exception taken for host syscalls"
        );
        assert_eq!(cpu.pc(), 0x8000_0004, "execution continues in line");
    }
}
