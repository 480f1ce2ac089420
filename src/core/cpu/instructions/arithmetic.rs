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
use super::super::{Cpu, ExceptionCause, ExecError, ExecResult, Flow};

impl Cpu {
    /// ADD: add with signed overflow trap. On overflow the destination is
    /// left unchanged and an Overflow exception is raised.
    pub(crate) fn op_add(&mut self, rs: u8, rt: u8, rd: u8) -> ExecResult {
        let a = self.reg(rs) as i32;
        let b = self.reg(rt) as i32;
        match a.checked_add(b) {
            Some(result) => {
                self.set_reg(rd, result as u32);
                Ok(Flow::Normal)
            }
            None => {
                self.enter_exception(ExceptionCause::Overflow);
                Err(ExecError::Raised)
            }
        }
    }

    /// ADDU: add, wrapping.
    pub(crate) fn op_addu(&mut self, rs: u8, rt: u8, rd: u8) -> ExecResult {
        let result = self.reg(rs).wrapping_add(self.reg(rt));
        self.set_reg(rd, result);
        Ok(Flow::Normal)
    }

    /// ADDI: add sign-extended immediate with overflow trap.
    pub(crate) fn op_addi(&mut self, instr: u32) -> ExecResult {
        let (rs, rt, imm) = decode_i_type(instr);
        let imm = (imm as i16) as i32;
        let a = self.reg(rs) as i32;
        match a.checked_add(imm) {
            Some(result) => {
                self.set_reg(rt, result as u32);
                Ok(Flow::Normal)
            }
            None => {
                self.enter_exception(ExceptionCause::Overflow);
                Err(ExecError::Raised)
            }
        }
    }

    /// ADDIU: add sign-extended immediate, wrapping. Despite the name the
    /// immediate is sign-extended, exactly like ADDI.
    pub(crate) fn op_addiu(&mut self, instr: u32) -> ExecResult {
        let (rs, rt, imm) = decode_i_type(instr);
        let imm = (imm as i16) as u32;
        let result = self.reg(rs).wrapping_add(imm);
        self.set_reg(rt, result);
        Ok(Flow::Normal)
    }

    /// SUB: subtract with signed overflow trap.
    pub(crate) fn op_sub(&mut self, rs: u8, rt: u8, rd: u8) -> ExecResult {
        let a = self.reg(rs) as i32;
        let b = self.reg(rt) as i32;
        match a.checked_sub(b) {
            Some(result) => {
                self.set_reg(rd, result as u32);
                Ok(Flow::Normal)
            }
            None => {
                self.enter_exception(ExceptionCause::Overflow);
                Err(ExecError::Raised)
            }
        }
    }

    /// SUBU: subtract, wrapping.
    pub(crate) fn op_subu(&mut self, rs: u8, rt: u8, rd: u8) -> ExecResult {
        let result = self.reg(rs).wrapping_sub(self.reg(rt));
        self.set_reg(rd, result);
        Ok(Flow::Normal)
    }

    /// SLT: set rd to 1 when rs < rt as signed integers.
    pub(crate) fn op_slt(&mut self, rs: u8, rt: u8, rd: u8) -> ExecResult {
        let result = ((self.reg(rs) as i32) < (self.reg(rt) as i32)) as u32;
        self.set_reg(rd, result);
        Ok(Flow::Normal)
    }

    /// SLTU: set rd to 1 when rs < rt as unsigned integers.
    pub(crate) fn op_sltu(&mut self, rs: u8, rt: u8, rd: u8) -> ExecResult {
        let result = (self.reg(rs) < self.reg(rt)) as u32;
        self.set_reg(rd, result);
        Ok(Flow::Normal)
    }

    /// SLTI: signed compare against a sign-extended immediate.
    pub(crate) fn op_slti(&mut self, instr: u32) -> ExecResult {
        let (rs, rt, imm) = decode_i_type(instr);
        let imm = (imm as i16) as i32;
        let result = ((self.reg(rs) as i32) < imm) as u32;
        self.set_reg(rt, result);
        Ok(Flow::Normal)
    }

    /// SLTIU: unsigned compare against a sign-extended immediate.
    pub(crate) fn op_sltiu(&mut self, instr: u32) -> ExecResult {
        let (rs, rt, imm) = decode_i_type(instr);
        let imm = (imm as i16) as u32;
        let result = (self.reg(rs) < imm) as u32;
        self.set_reg(rt, result);
        Ok(Flow::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_basic() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, 10);
        cpu.set_reg(2, 20);
        cpu.op_add(1, 2, 3).ok().unwrap();
        assert_eq!(cpu.reg(3), 30);
        assert_eq!(cpu.reg(1), 10, "source register must not change");
    }

    #[test]
    fn test_add_negative() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, (-10i32) as u32);
        cpu.set_reg(2, (-20i32) as u32);
        cpu.op_add(1, 2, 3).ok().unwrap();
        assert_eq!(cpu.reg(3) as i32, -30);
    }

    #[test]
    fn test_add_overflow_leaves_destination_unchanged() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, 0x7FFF_FFFF);
        cpu.set_reg(2, 1);
        cpu.set_reg(3, 0xDEAD_BEEF);

        assert!(cpu.op_add(1, 2, 3).is_err());
        assert_eq!(cpu.reg(3), 0xDEAD_BEEF, "rd must be unchanged on overflow");
        // Exception state recorded.
        assert_eq!((cpu.cop0_reg(13) >> 2) & 0x1F, 12, "Cause.ExcCode = Overflow");
    }

    #[test]
    fn test_add_negative_overflow() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, 0x8000_0000); // i32::MIN
        cpu.set_reg(2, (-1i32) as u32);
        assert!(cpu.op_add(1, 2, 3).is_err());
    }

    #[test]
    fn test_addu_wraps() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, 0xFFFF_FFFF);
        cpu.set_reg(2, 2);
        cpu.op_addu(1, 2, 3).ok().unwrap();
        assert_eq!(cpu.reg(3), 1);
    }

    #[test]
    fn test_addi_sign_extends() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, 100);
        // ADDI r2, r1, -4
        let instr = (0x08 << 26) | (1 << 21) | (2 << 16) | 0xFFFC;
        cpu.op_addi(instr).ok().unwrap();
        assert_eq!(cpu.reg(2), 96);
    }

    #[test]
    fn test_addiu_sign_extends_but_wraps() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, 0);
        // ADDIU r2, r1, -1
        let instr = (0x09 << 26) | (1 << 21) | (2 << 16) | 0xFFFF;
        cpu.op_addiu(instr).ok().unwrap();
        assert_eq!(cpu.reg(2), 0xFFFF_FFFF);
    }

    #[test]
    fn test_sub_overflow() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, 0x8000_0000);
        cpu.set_reg(2, 1);
        assert!(cpu.op_sub(1, 2, 3).is_err());
    }

    #[test]
    fn test_subu_wraps() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, 0);
        cpu.set_reg(2, 1);
        cpu.op_subu(1, 2, 3).ok().unwrap();
        assert_eq!(cpu.reg(3), 0xFFFF_FFFF);
    }

    #[test]
    fn test_slt_signed_comparison() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, (-1i32) as u32);
        cpu.set_reg(2, 1);
        cpu.op_slt(1, 2, 3).ok().unwrap();
        assert_eq!(cpu.reg(3), 1, "-1 < 1 signed");

        cpu.op_sltu(1, 2, 3).ok().unwrap();
        assert_eq!(cpu.reg(3), 0, "0xFFFFFFFF > 1 unsigned");
    }

    #[test]
    fn test_slti_sltiu() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, 5);
        // SLTI r2, r1, 10
        let instr = (0x0A << 26) | (1 << 21) | (2 << 16) | 10;
        cpu.op_slti(instr).ok().unwrap();
        assert_eq!(cpu.reg(2), 1);

        // SLTIU r2, r1, -1 (compares against 0xFFFFFFFF)
        let instr = (0x0B << 26) | (1 << 21) | (2 << 16) | 0xFFFF;
        cpu.op_sltiu(instr).ok().unwrap();
        assert_eq!(cpu.reg(2), 1);
    }
}
