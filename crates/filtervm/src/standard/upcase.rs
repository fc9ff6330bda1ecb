//! Upper-case reconstruction for text.
//!
//! The compressor lower-cases letters and marks each one with a `0x02`
//! escape; a literal `0x02` is written as `0x02 0x02`.

use super::{NativeFilter, REG_SIZE};
use crate::memory::{Arena, GLOBAL_ADDR};
use crate::operand::Registers;

const ESCAPE: u8 = 2;

#[derive(Debug, Clone, Copy)]
pub struct Upcase;

impl NativeFilter for Upcase {
    fn apply(&self, arena: &mut Arena, registers: &Registers) {
        let size = registers[REG_SIZE];
        if size >= GLOBAL_ADDR / 2 {
            return;
        }

        let mut src = 0u32;
        let mut dest = size;
        while src < size {
            let mut byte = arena.read_u8(src);
            src += 1;
            if byte == ESCAPE {
                byte = arena.read_u8(src);
                src += 1;
                if byte != ESCAPE {
                    byte = byte.wrapping_sub(32);
                }
            }
            arena.write_u8(dest, byte);
            dest += 1;
        }

        let mut control = arena.control_mut();
        control.set_block_size(dest - size);
        control.set_block_pos(size);
    }
}
