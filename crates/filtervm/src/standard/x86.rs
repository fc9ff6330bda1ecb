//! x86 call/jump address relocation (`E8`, `E8E9`).
//!
//! The compressor turns the relative displacement following each `CALL`
//! (and optionally `JMP`) opcode into an absolute address so that repeated
//! calls to the same target compress well. This undoes it.

use super::{NativeFilter, REG_FILE_OFFSET, REG_SIZE};
use crate::memory::{Arena, GLOBAL_ADDR};
use crate::operand::Registers;

/// Addresses are relocated modulo this size.
const FILE_SIZE: i32 = 0x100_0000;

/// x86 relocation filter; `e9` also handles near jumps.
#[derive(Debug, Clone, Copy)]
pub struct X86 {
    pub e9: bool,
}

impl NativeFilter for X86 {
    fn apply(&self, arena: &mut Arena, registers: &Registers) {
        let size = registers[REG_SIZE];
        let file_offset = registers[REG_FILE_OFFSET];
        if size >= GLOBAL_ADDR || size < 4 {
            return;
        }

        let limit = size - 4;
        let mut pos = 0u32;
        while pos < limit {
            let opcode = arena.read_u8(pos);
            pos += 1;
            if opcode != 0xE8 && !(self.e9 && opcode == 0xE9) {
                continue;
            }

            let offset = pos.wrapping_add(file_offset) as i32;
            let addr = arena.read_u32(pos) as i32;
            if addr < 0 {
                if addr.wrapping_add(offset) >= 0 {
                    arena.write_u32(pos, addr.wrapping_add(FILE_SIZE) as u32);
                }
            } else if addr < FILE_SIZE {
                arena.write_u32(pos, addr.wrapping_sub(offset) as u32);
            }
            pos += 4;
        }
    }
}

/// Forward transform: relative call targets to absolute addresses.
///
/// Used to build test input; [`X86`] inverts it for the same file offset as
/// long as the offset stays below 2^31.
pub fn encode(data: &mut [u8], file_offset: u32, e9: bool) {
    if data.len() < 4 || data.len() >= GLOBAL_ADDR as usize {
        return;
    }

    let limit = data.len() - 4;
    let mut pos = 0usize;
    while pos < limit {
        let opcode = data[pos];
        pos += 1;
        if opcode != 0xE8 && !(e9 && opcode == 0xE9) {
            continue;
        }

        let offset = (pos as u32).wrapping_add(file_offset) as i32;
        let mut word = [0u8; 4];
        word.copy_from_slice(&data[pos..pos + 4]);
        let rel = i32::from_le_bytes(word);
        let absolute = rel.wrapping_add(offset);
        let coded = if (0..FILE_SIZE).contains(&absolute) {
            Some(absolute)
        } else if absolute >= FILE_SIZE && rel < FILE_SIZE {
            Some(rel - FILE_SIZE)
        } else {
            None
        };
        if let Some(coded) = coded {
            data[pos..pos + 4].copy_from_slice(&coded.to_le_bytes());
        }
        pos += 4;
    }
}
