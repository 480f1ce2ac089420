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

//! Compact one-line disassembler feeding the Decode/Exec log categories.
//! Diagnostic only; nothing in the interpreter depends on it.

/// Render an instruction word as a mnemonic line.
pub fn disassemble(instr: u32) -> String {
    if instr == 0 {
        return "nop".to_string();
    }

    let op = (instr >> 26) & 0x3F;
    let rs = (instr >> 21) & 0x1F;
    let rt = (instr >> 16) & 0x1F;
    let rd = (instr >> 11) & 0x1F;
    let shamt = (instr >> 6) & 0x1F;
    let funct = instr & 0x3F;
    let imm = instr & 0xFFFF;
    let simm = (imm as u16) as i16;
    let target = (instr & 0x03FF_FFFF) << 2;

    match op {
        0x00 => match funct {
            0x00 => format!("sll     r{}, r{}, {}", rd, rt, shamt),
            0x02 => format!("srl     r{}, r{}, {}", rd, rt, shamt),
            0x03 => format!("sra     r{}, r{}, {}", rd, rt, shamt),
            0x04 => format!("sllv    r{}, r{}, r{}", rd, rt, rs),
            0x06 => format!("srlv    r{}, r{}, r{}", rd, rt, rs),
            0x07 => format!("srav    r{}, r{}, r{}", rd, rt, rs),
            0x08 => format!("jr      r{}", rs),
            0x09 => format!("jalr    r{}, r{}", rd, rs),
            0x0C => "syscall".to_string(),
            0x0D => "break".to_string(),
            0x10 => format!("mfhi    r{}", rd),
            0x11 => format!("mthi    r{}", rs),
            0x12 => format!("mflo    r{}", rd),
            0x13 => format!("mtlo    r{}", rs),
            0x18 => format!("mult    r{}, r{}", rs, rt),
            0x19 => format!("multu   r{}, r{}", rs, rt),
            0x1A => format!("div     r{}, r{}", rs, rt),
            0x1B => format!("divu    r{}, r{}", rs, rt),
            0x20 => format!("add     r{}, r{}, r{}", rd, rs, rt),
            0x21 => format!("addu    r{}, r{}, r{}", rd, rs, rt),
            0x22 => format!("sub     r{}, r{}, r{}", rd, rs, rt),
            0x23 => format!("subu    r{}, r{}, r{}", rd, rs, rt),
            0x24 => format!("and     r{}, r{}, r{}", rd, rs, rt),
            0x25 => format!("or      r{}, r{}, r{}", rd, rs, rt),
            0x26 => format!("xor     r{}, r{}, r{}", rd, rs, rt),
            0x27 => format!("nor     r{}, r{}, r{}", rd, rs, rt),
            0x2A => format!("slt     r{}, r{}, r{}", rd, rs, rt),
            0x2B => format!("sltu    r{}, r{}, r{}", rd, rs, rt),
            _ => format!(".word   0x{:08X}", instr),
        },
        0x01 => {
            let name = match (rt & 0x1E == 0x10, rt & 1 != 0) {
                (true, false) => "bltzal",
                (true, true) => "bgezal",
                (false, false) => "bltz",
                (false, true) => "bgez",
            };
            format!("{:<7} r{}, {}", name, rs, simm)
        }
        0x02 => format!("j       0x{:07X}", target),
        0x03 => format!("jal     0x{:07X}", target),
        0x04 => format!("beq     r{}, r{}, {}", rs, rt, simm),
        0x05 => format!("bne     r{}, r{}, {}", rs, rt, simm),
        0x06 => format!("blez    r{}, {}", rs, simm),
        0x07 => format!("bgtz    r{}, {}", rs, simm),
        0x08 => format!("addi    r{}, r{}, {}", rt, rs, simm),
        0x09 => format!("addiu   r{}, r{}, {}", rt, rs, simm),
        0x0A => format!("slti    r{}, r{}, {}", rt, rs, simm),
        0x0B => format!("sltiu   r{}, r{}, {}", rt, rs, simm),
        0x0C => format!("andi    r{}, r{}, 0x{:04X}", rt, rs, imm),
        0x0D => format!("ori     r{}, r{}, 0x{:04X}", rt, rs, imm),
        0x0E => format!("xori    r{}, r{}, 0x{:04X}", rt, rs, imm),
        0x0F => format!("lui     r{}, 0x{:04X}", rt, imm),
        0x10 => match rs {
            0x00 => format!("mfc0    r{}, cop0r{}", rt, rd),
            0x04 => format!("mtc0    r{}, cop0r{}", rt, rd),
            0x10..=0x1F if funct == 0x10 => "rfe".to_string(),
            _ => format!(".word   0x{:08X}", instr),
        },
        0x12 => match rs {
            0x00 => format!("mfc2    r{}, gted{}", rt, rd),
            0x02 => format!("cfc2    r{}, gtec{}", rt, rd),
            0x04 => format!("mtc2    r{}, gted{}", rt, rd),
            0x06 => format!("ctc2    r{}, gtec{}", rt, rd),
            _ => format!("cop2    0x{:07X}", instr & 0x01FF_FFFF),
        },
        0x20 => format!("lb      r{}, {}(r{})", rt, simm, rs),
        0x21 => format!("lh      r{}, {}(r{})", rt, simm, rs),
        0x22 => format!("lwl     r{}, {}(r{})", rt, simm, rs),
        0x23 => format!("lw      r{}, {}(r{})", rt, simm, rs),
        0x24 => format!("lbu     r{}, {}(r{})", rt, simm, rs),
        0x25 => format!("lhu     r{}, {}(r{})", rt, simm, rs),
        0x26 => format!("lwr     r{}, {}(r{})", rt, simm, rs),
        0x28 => format!("sb      r{}, {}(r{})", rt, simm, rs),
        0x29 => format!("sh      r{}, {}(r{})", rt, simm, rs),
        0x2A => format!("swl     r{}, {}(r{})", rt, simm, rs),
        0x2B => format!("sw      r{}, {}(r{})", rt, simm, rs),
        0x2E => format!("swr     r{}, {}(r{})", rt, simm, rs),
        0x32 => format!("lwc2    gted{}, {}(r{})", rt, simm, rs),
        0x3A => format!("swc2    gted{}, {}(r{})", rt, simm, rs),
        _ => format!(".word   0x{:08X}", instr),
    }
}
