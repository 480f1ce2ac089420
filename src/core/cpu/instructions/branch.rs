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

//! Conditional branches. Every branch instruction — taken or not — marks
//! the following instruction as a delay slot so exception EPC/BD
//! bookkeeping stays correct.

use super::super::decode::decode_i_type;
use super::super::{Cpu, ExecResult, Flow};

impl Cpu {
    /// Redirect execution after the delay slot. At execute time `self.pc`
    /// already points at the delay slot, so the target is relative to it.
    #[inline(always)]
    fn branch_to(&mut self, offset: i16) {
        let offset = (offset as i32) << 2;
        self.next_pc = self.pc.wrapping_add(offset as u32);
    }

    /// BEQ
    pub(crate) fn op_beq(&mut self, instr: u32) -> ExecResult {
        let (rs, rt, imm) = decode_i_type(instr);
        self.branch_executed = true;
        if self.reg(rs) == self.reg(rt) {
            self.branch_to(imm as i16);
        }
        Ok(Flow::Normal)
    }

    /// BNE
    pub(crate) fn op_bne(&mut self, instr: u32) -> ExecResult {
        let (rs, rt, imm) = decode_i_type(instr);
        self.branch_executed = true;
        if self.reg(rs) != self.reg(rt) {
            self.branch_to(imm as i16);
        }
        Ok(Flow::Normal)
    }

    /// BLEZ
    pub(crate) fn op_blez(&mut self, instr: u32) -> ExecResult {
        let (rs, _, imm) = decode_i_type(instr);
        self.branch_executed = true;
        if (self.reg(rs) as i32) <= 0 {
            self.branch_to(imm as i16);
        }
        Ok(Flow::Normal)
    }

    /// BGTZ
    pub(crate) fn op_bgtz(&mut self, instr: u32) -> ExecResult {
        let (rs, _, imm) = decode_i_type(instr);
        self.branch_executed = true;
        if (self.reg(rs) as i32) > 0 {
            self.branch_to(imm as i16);
        }
        Ok(Flow::Normal)
    }

    /// BCOND group (op 0x01): BLTZ/BGEZ and the linking forms. The rt
    /// field is not a register: bit 0 selects >= 0, and rt[4:1] == 0x8
    /// selects the linking variant (which writes r31 unconditionally).
    pub(crate) fn op_bcond(&mut self, instr: u32) -> ExecResult {
        let (rs, rt, imm) = decode_i_type(instr);
        self.branch_executed = true;

        let value = self.reg(rs) as i32;
        let test_ge = rt & 1 != 0;
        let link = (rt & 0x1E) == 0x10;

        if link {
            let ra = self.next_pc;
            self.set_reg(31, ra);
        }

        let taken = if test_ge { value >= 0 } else { value < 0 };
        if taken {
            self.branch_to(imm as i16);
        }
        Ok(Flow::Normal)
    }
}
