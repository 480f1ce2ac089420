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

use super::super::{Cpu, ExecResult, Flow};

impl Cpu {
    /// MULT: signed 32×32→64 multiply into HI:LO.
    pub(crate) fn op_mult(&mut self, rs: u8, rt: u8) -> ExecResult {
        let a = (self.reg(rs) as i32) as i64;
        let b = (self.reg(rt) as i32) as i64;
        let product = (a * b) as u64;
        self.hi = (product >> 32) as u32;
        self.lo = product as u32;
        Ok(Flow::Normal)
    }

    /// MULTU: unsigned 32×32→64 multiply into HI:LO.
    pub(crate) fn op_multu(&mut self, rs: u8, rt: u8) -> ExecResult {
        let product = (self.reg(rs) as u64) * (self.reg(rt) as u64);
        self.hi = (product >> 32) as u32;
        self.lo = product as u32;
        Ok(Flow::Normal)
    }

    /// DIV: signed divide. LO = quotient, HI = remainder. Division by zero
    /// and the i32::MIN / −1 case follow the documented R3000 results
    /// rather than trapping.
    pub(crate) fn op_div(&mut self, rs: u8, rt: u8) -> ExecResult {
        let n = self.reg(rs) as i32;
        let d = self.reg(rt) as i32;

        if d == 0 {
            self.hi = n as u32;
            self.lo = if n >= 0 { 0xFFFF_FFFF } else { 1 };
        } else if n == i32::MIN && d == -1 {
            self.hi = 0;
            self.lo = 0x8000_0000;
        } else {
            self.hi = (n % d) as u32;
            self.lo = (n / d) as u32;
        }
        Ok(Flow::Normal)
    }

    /// DIVU: unsigned divide. LO = quotient, HI = remainder.
    pub(crate) fn op_divu(&mut self, rs: u8, rt: u8) -> ExecResult {
        let n = self.reg(rs);
        let d = self.reg(rt);

        if d == 0 {
            self.hi = n;
            self.lo = 0xFFFF_FFFF;
        } else {
            self.hi = n % d;
            self.lo = n / d;
        }
        Ok(Flow::Normal)
    }

    /// MFHI
    pub(crate) fn op_mfhi(&mut self, rd: u8) -> ExecResult {
        let hi = self.hi;
        self.set_reg(rd, hi);
        Ok(Flow::Normal)
    }

    /// MTHI
    pub(crate) fn op_mthi(&mut self, rs: u8) -> ExecResult {
        self.hi = self.reg(rs);
        Ok(Flow::Normal)
    }

    /// MFLO
    pub(crate) fn op_mflo(&mut self, rd: u8) -> ExecResult {
        let lo = self.lo;
        self.set_reg(rd, lo);
        Ok(Flow::Normal)
    }

    /// MTLO
    pub(crate) fn op_mtlo(&mut self, rs: u8) -> ExecResult {
        self.lo = self.reg(rs);
        Ok(Flow::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mult_signed() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, (-3i32) as u32);
        cpu.set_reg(2, 7);
        cpu.op_mult(1, 2).ok().unwrap();
        assert_eq!(cpu.lo() as i32, -21);
        assert_eq!(cpu.hi(), 0xFFFF_FFFF, "sign extension into HI");
    }

    #[test]
    fn test_multu_large() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, 0xFFFF_FFFF);
        cpu.set_reg(2, 0xFFFF_FFFF);
        cpu.op_multu(1, 2).ok().unwrap();
        // 0xFFFFFFFF² = 0xFFFFFFFE_00000001
        assert_eq!(cpu.hi(), 0xFFFF_FFFE);
        assert_eq!(cpu.lo(), 0x0000_0001);
    }

    #[test]
    fn test_div_basic() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, 17);
        cpu.set_reg(2, 5);
        cpu.op_div(1, 2).ok().unwrap();
        assert_eq!(cpu.lo(), 3);
        assert_eq!(cpu.hi(), 2);
    }

    #[test]
    fn test_div_by_zero_does_not_trap() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, 42);
        cpu.set_reg(2, 0);
        cpu.op_div(1, 2).ok().unwrap();
        assert_eq!(cpu.lo(), 0xFFFF_FFFF);
        assert_eq!(cpu.hi(), 42);

        cpu.set_reg(1, (-42i32) as u32);
        cpu.op_div(1, 2).ok().unwrap();
        assert_eq!(cpu.lo(), 1);
        assert_eq!(cpu.hi() as i32, -42);
    }

    #[test]
    fn test_div_min_by_minus_one() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, 0x8000_0000);
        cpu.set_reg(2, (-1i32) as u32);
        cpu.op_div(1, 2).ok().unwrap();
        assert_eq!(cpu.lo(), 0x8000_0000);
        assert_eq!(cpu.hi(), 0);
    }

    #[test]
    fn test_divu_by_zero() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, 42);
        cpu.set_reg(2, 0);
        cpu.op_divu(1, 2).ok().unwrap();
        assert_eq!(cpu.lo(), 0xFFFF_FFFF);
        assert_eq!(cpu.hi(), 42);
    }

    #[test]
    fn test_hi_lo_moves() {
        let mut cpu = Cpu::new();
        cpu.set_reg(1, 0x1234_5678);
        cpu.op_mthi(1).ok().unwrap();
        cpu.op_mtlo(1).ok().unwrap();
        cpu.op_mfhi(2).ok().unwrap();
        cpu.op_mflo(3).ok().unwrap();
        assert_eq!(cpu.reg(2), 0x1234_5678);
        assert_eq!(cpu.reg(3), 0x1234_5678);
    }
}
