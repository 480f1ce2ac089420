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

//! CPU pipeline tests: stepping, interrupts, stop predicates.

use super::*;
use crate::core::interrupt::irq;
use crate::core::memory::Bus;
use proptest::prelude::*;

fn setup(program: &[u32]) -> (Cpu, Bus) {
    let mut bus = Bus::new(2 * 1024 * 1024);
    for (i, word) in program.iter().enumerate() {
        bus.write32(0x8000_0000 + (i as u32) * 4, *word).unwrap();
    }
    let mut cpu = Cpu::new();
    cpu.set_pc(0x8000_0000);
    (cpu, bus)
}

const fn addiu(rs: u32, rt: u32, imm: u32) -> u32 {
    (0x09 << 26) | (rs << 21) | (rt << 16) | (imm & 0xFFFF)
}

#[test]
fn test_step_returns_pc_and_instr() {
    let (mut cpu, mut bus) = setup(&[addiu(0, 1, 5)]);
    let result = cpu.step(&mut bus);
    assert_eq!(
        result,
        StepResult::Ok {
            pc: 0x8000_0000,
            instr: addiu(0, 1, 5)
        }
    );
    assert_eq!(cpu.reg(1), 5);
    assert_eq!(cpu.pc(), 0x8000_0004);
}

#[test]
fn test_fetch_from_unmapped_region_is_memfault() {
    let mut bus = Bus::new(2 * 1024 * 1024);
    let mut cpu = Cpu::new();
    cpu.set_pc(0x5000_0000); // nothing mapped there

    match cpu.step(&mut bus) {
        StepResult::MemFault { pc, addr, .. } => {
            assert_eq!(pc, 0x5000_0000);
            assert_eq!(addr, 0x5000_0000);
        }
        other => panic!("expected MemFault, got {:?}", other),
    }
}

#[test]
fn test_interrupt_taken_at_step_boundary() {
    let (mut cpu, mut bus) = setup(&[addiu(0, 1, 1), addiu(0, 2, 2), 0, 0]);

    // Enable interrupts: SR.IEc=1, SR.IM bit 10 (external line).
    cpu.op_mtc0(12, cpu.cop0_reg(12) | 0x0401);

    // Raise and unmask VBlank on the controller.
    bus.irq_mut().write_mask(irq::VBLANK as u32);
    bus.irq_mut().raise(irq::VBLANK);

    let pc_before = cpu.pc();
    cpu.step(&mut bus);

    assert_eq!((cpu.cop0_reg(13) >> 2) & 0x1F, 0, "Cause = Interrupt");
    assert_eq!(cpu.cop0_reg(14), pc_before, "EPC = about-to-execute pc");
    assert_eq!(cpu.pc(), 0xBFC0_0184, "vectored, then executed one instr");
    assert_eq!(cpu.reg(1), 0, "interrupted instruction did not run");
}

#[test]
fn test_masked_interrupt_not_taken() {
    let (mut cpu, mut bus) = setup(&[addiu(0, 1, 1), 0]);
    cpu.op_mtc0(12, cpu.cop0_reg(12) | 0x0401);

    // Pending on the controller but masked by I_MASK.
    bus.irq_mut().raise(irq::VBLANK);

    cpu.step(&mut bus);
    assert_eq!(cpu.reg(1), 1, "execution continues uninterrupted");
}

#[test]
fn test_interrupt_disabled_by_iec() {
    let (mut cpu, mut bus) = setup(&[addiu(0, 1, 1), 0]);
    // IM bit set but IEc clear.
    cpu.op_mtc0(12, (cpu.cop0_reg(12) | 0x0400) & !1);

    bus.irq_mut().write_mask(irq::VBLANK as u32);
    bus.irq_mut().raise(irq::VBLANK);

    cpu.step(&mut bus);
    assert_eq!(cpu.reg(1), 1);
    // But Cause.IP2 still mirrors the pending line.
    assert_ne!(cpu.cop0_reg(13) & (1 << 10), 0);
}

#[test]
fn test_interrupt_in_delay_slot_epc_points_at_branch() {
    // 0: beq r0, r0, +4
    // 4: nop (delay slot — interrupt arrives here)
    let beq = (0x04u32 << 26) | 4;
    let (mut cpu, mut bus) = setup(&[beq, 0, 0, 0, 0, 0, 0]);
    cpu.op_mtc0(12, cpu.cop0_reg(12) | 0x0401);

    cpu.step(&mut bus); // beq executes

    bus.irq_mut().write_mask(irq::VBLANK as u32);
    bus.irq_mut().raise(irq::VBLANK);

    cpu.step(&mut bus); // interrupt taken instead of the delay slot

    assert_ne!(cpu.cop0_reg(13) & (1 << 31), 0, "Cause.BD");
    assert_eq!(cpu.cop0_reg(14), 0x8000_0000, "EPC at the branch");
}

#[test]
fn test_stop_on_pc_does_not_mutate_state() {
    let (mut cpu, mut bus) = setup(&[addiu(0, 1, 1), addiu(0, 2, 2), 0]);
    cpu.set_stop_on_pc(Some(0x8000_0004));

    assert!(matches!(cpu.step(&mut bus), StepResult::Ok { .. }));
    let result = cpu.step(&mut bus);
    assert_eq!(result, StepResult::Halted { pc: 0x8000_0004 });
    assert_eq!(cpu.reg(2), 0, "halt happens before execution");
    assert_eq!(cpu.pc(), 0x8000_0004, "pc unchanged by the stop");

    // Clearing the predicate resumes normally.
    cpu.set_stop_on_pc(None);
    cpu.step(&mut bus);
    assert_eq!(cpu.reg(2), 2);
}

#[test]
fn test_stop_on_high_ram_fetch() {
    let mut bus = Bus::new(2 * 1024 * 1024);
    bus.write32(0x801F_0000, addiu(0, 1, 1)).unwrap();
    let mut cpu = Cpu::new();
    cpu.set_pc(0x801F_0000);
    cpu.set_stop_on_high_ram_fetch(true);

    assert_eq!(
        cpu.step(&mut bus),
        StepResult::Halted { pc: 0x801F_0000 }
    );
}

#[test]
fn test_stop_on_idle_nop_in_low_ram() {
    let mut bus = Bus::new(2 * 1024 * 1024);
    // A nop sitting in the BIOS-to-RAM transition window.
    bus.write32(0x0000_0500, 0).unwrap();
    let mut cpu = Cpu::new();
    cpu.set_pc(0x0000_0500);
    cpu.set_stop_on_idle_nop(true);

    assert_eq!(cpu.step(&mut bus), StepResult::Halted { pc: 0x0000_0500 });
}

#[test]
fn test_illegal_instruction_reported() {
    let (mut cpu, mut bus) = setup(&[0xFC00_0000]);
    assert_eq!(
        cpu.step(&mut bus),
        StepResult::IllegalInstr {
            pc: 0x8000_0000,
            instr: 0xFC00_0000
        }
    );
}

#[test]
fn test_illegal_instruction_does_not_destroy_state() {
    let (mut cpu, mut bus) = setup(&[0xFC00_0000, addiu(0, 1, 9)]);
    cpu.set_reg(5, 77);

    let _ = cpu.step(&mut bus);
    assert_eq!(cpu.reg(5), 77);

    // The caller may elect to continue.
    cpu.step(&mut bus);
    assert_eq!(cpu.reg(1), 9);
}

proptest! {
    #[test]
    fn prop_register_zero_reads_zero(value in any::<u32>(), idx in 0u8..32) {
        let mut cpu = Cpu::new();
        cpu.set_reg(idx, value);
        if idx == 0 {
            prop_assert_eq!(cpu.reg(0), 0);
        } else {
            prop_assert_eq!(cpu.reg(idx), value);
        }
        // Writing r0 never sticks, even through the delay queue.
        cpu.set_reg_delayed(0, value);
        prop_assert!(cpu.load_queue.is_none());
        prop_assert_eq!(cpu.reg(0), 0);
    }

    #[test]
    fn prop_addu_matches_wrapping_add(a in any::<u32>(), b in any::<u32>()) {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, a);
        cpu.set_reg(2, b);
        cpu.op_addu(1, 2, 3).ok().unwrap();
        prop_assert_eq!(cpu.reg(3), a.wrapping_add(b));
    }

    #[test]
    fn prop_overflow_add_leaves_rd_untouched(a in any::<i32>(), b in any::<i32>()) {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, a as u32);
        cpu.set_reg(2, b as u32);
        cpu.set_reg(3, 0x5A5A_5A5A);
        let overflowed = a.checked_add(b).is_none();
        let result = cpu.op_add(1, 2, 3);
        if overflowed {
            prop_assert!(result.is_err());
            prop_assert_eq!(cpu.reg(3), 0x5A5A_5A5A);
        } else {
            prop_assert!(result.is_ok());
            prop_assert_eq!(cpu.reg(3), a.wrapping_add(b) as u32);
        }
    }
}
