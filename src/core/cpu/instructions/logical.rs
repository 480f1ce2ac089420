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

use super::super::decode::decode_i_type;
use super::super::{Cpu, ExecResult, Flow};

impl Cpu {
    /// AND
    pub(crate) fn op_and(&mut self, rs: u8, rt: u8, rd: u8) -> ExecResult {
        let result = self.reg(rs) & self.reg(rt);
        self.set_reg(rd, result);
        Ok(Flow::Normal)
    }

    /// OR
    pub(crate) fn op_or(&mut self, rs: u8, rt: u8, rd: u8) -> ExecResult {
        let result = self.reg(rs) | self.reg(rt);
        self.set_reg(rd, result);
        Ok(Flow::Normal)
    }

    /// XOR
    pub(crate) fn op_xor(&mut self, rs: u8, rt: u8, rd: u8) -> ExecResult {
        let result = self.reg(rs) ^ self.reg(rt);
        self.set_reg(rd, result);
        Ok(Flow::Normal)
    }

    /// NOR
    pub(crate) fn op_nor(&mut self, rs: u8, rt: u8, rd: u8) -> ExecResult {
        let result = !(self.reg(rs) | self.reg(rt));
        self.set_reg(rd, result);
        Ok(Flow::Normal)
    }

    /// ANDI: the immediate is zero-extended for the logical immediates.
    pub(crate) fn op_andi(&mut self, instr: u32) -> ExecResult {
        let (rs, rt, imm) = decode_i_type(instr);
        let result = self.reg(rs) & imm as u32;
        self.set_reg(rt, result);
        Ok(Flow::Normal)
    }

    /// ORI
    pub(crate) fn op_ori(&mut self, instr: u32) -> ExecResult {
        let (rs, rt, imm) = decode_i_type(instr);
        let result = self.reg(rs) | imm as u32;
        self.set_reg(rt, result);
        Ok(Flow::Normal)
    }

    /// XORI
    pub(crate) fn op_xori(&mut self, instr: u32) -> ExecResult {
        let (rs, rt, imm) = decode_i_type(instr);
        let result = self.reg(rs) ^ imm as u32;
        self.set_reg(rt, result);
        Ok(Flow::Normal)
    }

    /// LUI: load the immediate into the upper halfword, lower bits zero.
    pub(crate) fn op_lui(&mut self, instr: u32) -> ExecResult {
        let (_, rt, imm) = decode_i_type(instr);
        self.set_reg(rt, (imm as u32) << 16);
        Ok(Flow::Normal)
    }
}
