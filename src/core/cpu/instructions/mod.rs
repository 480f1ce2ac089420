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

//! Instruction dispatch, split by family:
//!
//! - [`arithmetic`]: ADD/ADDU/ADDI/ADDIU/SUB/SUBU/SLT*
//! - [`logical`]: AND/OR/XOR/NOR and immediates, LUI
//! - [`shift`]: SLL/SRL/SRA and variable forms
//! - [`multiply`]: MULT/MULTU/DIV/DIVU, HI/LO moves
//! - [`branch`]: BEQ/BNE/BLEZ/BGTZ/BCOND
//! - [`jump`]: J/JAL/JR/JALR
//! - [`memory`]: loads/stores including the LWL/LWR/SWL/SWR merges
//! - [`cop0`]: MFC0/MTC0/RFE, SYSCALL, BREAK
//! - [`cop2`]: GTE register moves and command dispatch

mod arithmetic;
mod branch;
mod cop0;
mod cop2;
mod jump;
mod logical;
mod memory;
mod multiply;
mod shift;

use super::decode::decode_r_type;
use super::{Cpu, ExceptionCause, ExecError, ExecResult};
use crate::core::memory::Bus;

impl Cpu {
    /// Decode and execute one instruction word.
    pub(crate) fn execute(&mut self, instr: u32, bus: &mut Bus) -> ExecResult {
        let op = (instr >> 26) & 0x3F;

        match op {
            0x00 => self.execute_special(instr, bus),
            0x01 => self.op_bcond(instr),
            0x02 => self.op_j(instr),
            0x03 => self.op_jal(instr),
            0x04 => self.op_beq(instr),
            0x05 => self.op_bne(instr),
            0x06 => self.op_blez(instr),
            0x07 => self.op_bgtz(instr),
            0x08 => self.op_addi(instr),
            0x09 => self.op_addiu(instr),
            0x0A => self.op_slti(instr),
            0x0B => self.op_sltiu(instr),
            0x0C => self.op_andi(instr),
            0x0D => self.op_ori(instr),
            0x0E => self.op_xori(instr),
            0x0F => self.op_lui(instr),
            0x10 => self.op_cop0(instr, bus),
            0x12 => self.op_cop2(instr),
            // COP1 and COP3 do not exist on the PSX.
            0x11 | 0x13 => {
                self.enter_exception(ExceptionCause::CoprocessorUnusable);
                Err(ExecError::Raised)
            }
            0x20 => self.op_lb(instr, bus),
            0x21 => self.op_lh(instr, bus),
            0x22 => self.op_lwl(instr, bus),
            0x23 => self.op_lw(instr, bus),
            0x24 => self.op_lbu(instr, bus),
            0x25 => self.op_lhu(instr, bus),
            0x26 => self.op_lwr(instr, bus),
            0x28 => self.op_sb(instr, bus),
            0x29 => self.op_sh(instr, bus),
            0x2A => self.op_swl(instr, bus),
            0x2B => self.op_sw(instr, bus),
            0x2E => self.op_swr(instr, bus),
            0x32 => self.op_lwc2(instr, bus),
            0x3A => self.op_swc2(instr, bus),
            // LWC/SWC for nonexistent coprocessors.
            0x30 | 0x31 | 0x33 | 0x38 | 0x39 | 0x3B => {
                self.enter_exception(ExceptionCause::CoprocessorUnusable);
                Err(ExecError::Raised)
            }
            _ => Err(ExecError::Illegal),
        }
    }

    /// SPECIAL opcode group (op = 0x00), selected by the funct field.
    fn execute_special(&mut self, instr: u32, bus: &mut Bus) -> ExecResult {
        let (rs, rt, rd, shamt, funct) = decode_r_type(instr);

        match funct {
            0x00 => self.op_sll(rt, rd, shamt),
            0x02 => self.op_srl(rt, rd, shamt),
            0x03 => self.op_sra(rt, rd, shamt),
            0x04 => self.op_sllv(rs, rt, rd),
            0x06 => self.op_srlv(rs, rt, rd),
            0x07 => self.op_srav(rs, rt, rd),
            0x08 => self.op_jr(rs),
            0x09 => self.op_jalr(rs, rd),
            0x0C => self.op_syscall(bus),
            0x0D => self.op_break(),
            0x10 => self.op_mfhi(rd),
            0x11 => self.op_mthi(rs),
            0x12 => self.op_mflo(rd),
            0x13 => self.op_mtlo(rs),
            0x18 => self.op_mult(rs, rt),
            0x19 => self.op_multu(rs, rt),
            0x1A => self.op_div(rs, rt),
            0x1B => self.op_divu(rs, rt),
            0x20 => self.op_add(rs, rt, rd),
            0x21 => self.op_addu(rs, rt, rd),
            0x22 => self.op_sub(rs, rt, rd),
            0x23 => self.op_subu(rs, rt, rd),
            0x24 => self.op_and(rs, rt, rd),
            0x25 => self.op_or(rs, rt, rd),
            0x26 => self.op_xor(rs, rt, rd),
            0x27 => self.op_nor(rs, rt, rd),
            0x2A => self.op_slt(rs, rt, rd),
            0x2B => self.op_sltu(rs, rt, rd),
            _ => Err(ExecError::Illegal),
        }
    }
}
