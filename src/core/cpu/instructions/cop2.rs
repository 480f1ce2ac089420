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

//! COP2 (GTE) register moves and command dispatch.

use super::super::decode::{decode_i_type, decode_r_type};
use super::super::{Cpu, ExceptionCause, ExecError, ExecResult, Flow};
use crate::core::memory::Bus;

impl Cpu {
    /// COP2 usable? Gated by SR.CU2.
    #[inline(always)]
    fn cop2_usable(&self) -> bool {
        self.cop0.regs[super::super::cop0::Cop0::SR] & (1 << 30) != 0
    }

    /// COP2 opcode group (op = 0x12).
    pub(crate) fn op_cop2(&mut self, instr: u32) -> ExecResult {
        if !self.cop2_usable() {
            self.enter_exception(ExceptionCause::CoprocessorUnusable);
            return Err(ExecError::Raised);
        }

        let (cop_op, rt, rd, _, _) = decode_r_type(instr);

        // Bit 4 of the rs field marks a GTE command; the low 25 bits of
        // the instruction are the command word.
        if cop_op & 0x10 != 0 {
            self.gte.execute(instr & 0x01FF_FFFF);
            return Ok(Flow::Normal);
        }

        match cop_op {
            // MFC2: data register → GPR (load-delayed like MFC0).
            0x00 => {
                let value = self.gte.read_data(rd as usize);
                self.set_reg_delayed(rt, value);
                Ok(Flow::Normal)
            }
            // CFC2: control register → GPR.
            0x02 => {
                let value = self.gte.read_control(rd as usize);
                self.set_reg_delayed(rt, value);
                Ok(Flow::Normal)
            }
            // MTC2: GPR → data register.
            0x04 => {
                let value = self.reg(rt);
                self.gte.write_data(rd as usize, value);
                Ok(Flow::Normal)
            }
            // CTC2: GPR → control register.
            0x06 => {
                let value = self.reg(rt);
                self.gte.write_control(rd as usize, value);
                Ok(Flow::Normal)
            }
            _ => Err(ExecError::Illegal),
        }
    }

    /// LWC2: bus load straight into a GTE data register.
    pub(crate) fn op_lwc2(&mut self, instr: u32, bus: &mut Bus) -> ExecResult {
        if !self.cop2_usable() {
            self.enter_exception(ExceptionCause::CoprocessorUnusable);
            return Err(ExecError::Raised);
        }
        let (rs, rt, imm) = decode_i_type(instr);
        let addr = self.reg(rs).wrapping_add((imm as i16) as u32);
        let value = self.load32(bus, addr)?;
        self.gte.write_data(rt as usize, value);
        Ok(Flow::Normal)
    }

    /// SWC2: store a GTE data register through the bus.
    pub(crate) fn op_swc2(&mut self, instr: u32, bus: &mut Bus) -> ExecResult {
        if !self.cop2_usable() {
            self.enter_exception(ExceptionCause::CoprocessorUnusable);
            return Err(ExecError::Raised);
        }
        let (rs, rt, imm) = decode_i_type(instr);
        let addr = self.reg(rs).wrapping_add((imm as i16) as u32);
        let value = self.gte.read_data(rt as usize);
        self.store32(bus, addr, value)?;
        Ok(Flow::Normal)
    }
}
