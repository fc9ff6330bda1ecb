//! IA-64 branch relocation.
//!
//! Itanium code comes in 16-byte bundles of three 41-bit instruction slots.
//! The bundle template (low five bits of the first byte) tells which slots may
//! hold branches; for those whose opcode type is 5 the 20-bit displacement is
//! turned back into a bundle-relative value.

use super::{NativeFilter, REG_FILE_OFFSET, REG_SIZE};
use crate::memory::{Arena, GLOBAL_ADDR};
use crate::operand::Registers;

/// Branch-capable slot mask per template (templates 0x10..0x1F).
const SLOT_MASKS: [u8; 16] = [4, 4, 6, 6, 0, 0, 7, 7, 4, 4, 0, 0, 4, 4, 0, 0];

const BUNDLE_SIZE: u32 = 16;
const BRANCH_OPCODE_TYPE: u32 = 5;

#[derive(Debug, Clone, Copy)]
pub struct Itanium;

/// Reads `count` bits starting `bit_pos` bits into the bundle at `base`.
pub(crate) fn get_bits(arena: &Arena, base: u32, bit_pos: u32, count: u32) -> u32 {
    let addr = base + bit_pos / 8;
    let shift = bit_pos & 7;
    let field = (0..4).fold(0u32, |acc, i| {
        acc | u32::from(arena.read_u8(addr + i)) << (8 * i)
    });
    (field >> shift) & (u32::MAX >> (32 - count))
}

/// Writes the low `count` bits of `value` at `bit_pos` bits into the bundle.
pub(crate) fn set_bits(arena: &mut Arena, base: u32, value: u32, bit_pos: u32, count: u32) {
    let addr = base + bit_pos / 8;
    let shift = bit_pos & 7;
    let mut keep = !((u32::MAX >> (32 - count)) << shift);
    let mut field = value << shift;
    for i in 0..4 {
        let byte = arena.read_u8(addr + i);
        arena.write_u8(addr + i, (byte & keep as u8) | field as u8);
        keep = (keep >> 8) | 0xFF00_0000;
        field >>= 8;
    }
}

impl NativeFilter for Itanium {
    fn apply(&self, arena: &mut Arena, registers: &Registers) {
        let size = registers[REG_SIZE];
        if size >= GLOBAL_ADDR || size < 21 {
            return;
        }

        let mut bundle_offset = (registers[REG_FILE_OFFSET] as i32) >> 4;
        let mut pos = 0u32;
        while pos < size - 21 {
            let template = i32::from(arena.read_u8(pos) & 0x1F) - 0x10;
            if template >= 0 {
                let mask = SLOT_MASKS[template as usize];
                for slot in 0..3 {
                    if mask & (1 << slot) == 0 {
                        continue;
                    }
                    let start = slot * 41 + 5;
                    if get_bits(arena, pos, start + 37, 4) == BRANCH_OPCODE_TYPE {
                        let disp = get_bits(arena, pos, start + 13, 20);
                        let fixed = disp.wrapping_sub(bundle_offset as u32) & 0xF_FFFF;
                        set_bits(arena, pos, fixed, start + 13, 20);
                    }
                }
            }
            pos += BUNDLE_SIZE;
            bundle_offset = bundle_offset.wrapping_add(1);
        }
    }
}
