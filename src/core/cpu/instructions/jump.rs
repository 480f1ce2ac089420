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

use super::super::decode::decode_j_type;
use super::super::{Cpu, ExecResult, Flow};

impl Cpu {
    /// J: jump within the current 256 MiB region. The target replaces the
    /// low 28 bits of the delay-slot address.
    pub(crate) fn op_j(&mut self, instr: u32) -> ExecResult {
        let target = decode_j_type(instr);
        self.branch_executed = true;
        self.next_pc = (self.pc & 0xF000_0000) | (target << 2);
        Ok(Flow::Normal)
    }

    /// JAL: jump and link. The return address is the instruction after the
    /// delay slot (`jump_pc + 8`).
    pub(crate) fn op_jal(&mut self, instr: u32) -> ExecResult {
        let ra = self.next_pc;
        self.set_reg(31, ra);
        self.op_j(instr)
    }

    /// JR: jump to register. Unaligned targets fault at the following
    /// fetch, with BadVAddr holding the bad PC.
    pub(crate) fn op_jr(&mut self, rs: u8) -> ExecResult {
        self.branch_executed = true;
        self.next_pc = self.reg(rs);
        Ok(Flow::Normal)
    }

    /// JALR: jump to register and link into rd (usually r31).
    pub(crate) fn op_jalr(&mut self, rs: u8, rd: u8) -> ExecResult {
        let target = self.reg(rs);
        let ra = self.next_pc;
        self.set_reg(rd, ra);
        self.branch_executed = true;
        self.next_pc = target;
        Ok(Flow::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::Bus;

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
    fn test_jal_links_past_delay_slot() {
        // 0: jal 0x8000_0020
        // 4: nop (delay slot)
        let jal = (0x03 << 26) | ((0x8000_0020u32 >> 2) & 0x03FF_FFFF);
        let (mut cpu, mut bus) = setup(&[jal, 0]);

        cpu.step(&mut bus); // jal
        cpu.step(&mut bus); // delay slot
        assert_eq!(cpu.reg(31), 0x8000_0008, "link past the delay slot");
        assert_eq!(cpu.pc(), 0x8000_0020);
    }

    #[test]
    fn test_jr_roundtrip() {
        // 0: jr r1 (r1 = 0x8000_0010)
        // 4: nop
        let jr = (1 << 21) | 0x08;
        let (mut cpu, mut bus) = setup(&[jr, 0, 0, 0, 0]);
        cpu.set_reg(1, 0x8000_0010);

        cpu.step(&mut bus);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc(), 0x8000_0010);
    }

    #[test]
    fn test_jalr_custom_link_register() {
        let mut cpu = Cpu::new();
        cpu.set_pc(0x8000_0000);
        cpu.set_reg(2, 0x8000_4000);
        // Simulate pipeline state at execute time.
        cpu.pc = 0x8000_0004;
        cpu.next_pc = 0x8000_0008;

        cpu.op_jalr(2, 5).ok().unwrap();
        assert_eq!(cpu.reg(5), 0x8000_0008);
        assert_eq!(cpu.next_pc, 0x8000_4000);
    }

    #[test]
    fn test_j_stays_in_segment() {
        let mut cpu = Cpu::new();
        cpu.pc = 0xBFC0_0004; // delay-slot address in KSEG1
        cpu.next_pc = 0xBFC0_0008;

        // J with word target 0x0010_0000 → byte 0x0040_0000 in the segment
        cpu.op_j(0x0810_0000).ok().unwrap();
        assert_eq!(cpu.next_pc, 0xB040_0000);
    }
}
