//! 24-bit image predictor.
//!
//! Each colour channel is predicted from the left, upper and upper-left
//! pixels with a Paeth-style selector, then the green channel is added back
//! into red and blue.

use super::{NativeFilter, REG_SIZE};
use crate::memory::{Arena, GLOBAL_ADDR};
use crate::operand::Registers;

/// Register holding the row stride plus 3.
const REG_WIDTH: usize = 0;
/// Register holding the position of the first red byte (0..=2).
const REG_RED_POS: usize = 1;

#[derive(Debug, Clone, Copy)]
pub struct Rgb;

/// Picks whichever neighbour is closest to `left + above - above_left`.
fn paeth(left: u32, above: u32, above_left: u32) -> u32 {
    let predicted = left.wrapping_add(above).wrapping_sub(above_left);
    let pa = (predicted.wrapping_sub(left) as i32).abs();
    let pb = (predicted.wrapping_sub(above) as i32).abs();
    let pc = (predicted.wrapping_sub(above_left) as i32).abs();
    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        above_left
    }
}

impl NativeFilter for Rgb {
    fn apply(&self, arena: &mut Arena, registers: &Registers) {
        let size = registers[REG_SIZE];
        let width = registers[REG_WIDTH].wrapping_sub(3);
        let red_pos = registers[REG_RED_POS];
        arena.control_mut().set_block_pos(size);
        if size >= GLOBAL_ADDR / 2 || size < 3 || width > size || red_pos > 2 {
            return;
        }

        let dest = size;
        let mut src = 0u32;
        for channel in 0..3 {
            let mut prev = 0u32;
            let mut i = channel;
            while i < size {
                let upper = i as i32 - width as i32;
                let predicted = if upper >= 3 {
                    let above_addr = dest + upper as u32;
                    let above = u32::from(arena.read_u8(above_addr));
                    let above_left = u32::from(arena.read_u8(above_addr - 3));
                    paeth(prev, above, above_left)
                } else {
                    prev
                };
                prev = predicted.wrapping_sub(u32::from(arena.read_u8(src))) & 0xFF;
                src += 1;
                arena.write_u8(dest + i, prev as u8);
                i += 3;
            }
        }

        let mut i = red_pos;
        while i < size - 2 {
            let green = arena.read_u8(dest + i + 1);
            let red = arena.read_u8(dest + i);
            let blue = arena.read_u8(dest + i + 2);
            arena.write_u8(dest + i, red.wrapping_add(green));
            arena.write_u8(dest + i + 2, blue.wrapping_add(green));
            i += 3;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paeth_prefers_left_on_ties() {
        assert_eq!(paeth(10, 10, 10), 10);
        // Flat row above: predicted == left.
        assert_eq!(paeth(50, 20, 20), 50);
        // Vertical gradient: predicted == above.
        assert_eq!(paeth(20, 80, 20), 80);
    }

    #[test]
    fn test_single_row_restores_green_difference() {
        // Width larger than the block: every pixel is predicted from the left.
        let mut arena = Arena::new();
        // Planar deltas: R channel, G channel, B channel (2 pixels each).
        let planar = [0u8.wrapping_sub(5), 0, 0u8.wrapping_sub(7), 0, 0u8.wrapping_sub(9), 0];
        arena.load(0, &planar);
        let mut registers = [0u32; 8];
        registers[REG_SIZE] = 6;
        registers[REG_WIDTH] = 6 + 3;
        registers[REG_RED_POS] = 0;
        Rgb.apply(&mut arena, &registers);

        // Channel values 5,5 / 7,7 / 9,9 then red and blue gain green.
        assert_eq!(arena.slice(6, 6), &[12, 7, 16, 12, 7, 16]);
    }

    #[test]
    fn test_invalid_parameters_skip() {
        let mut arena = Arena::new();
        arena.load(0, &[1, 2, 3, 4, 5, 6]);
        let mut registers = [0u32; 8];
        registers[REG_SIZE] = 6;
        registers[REG_WIDTH] = 6;
        registers[REG_RED_POS] = 3;
        Rgb.apply(&mut arena, &registers);
        assert_eq!(arena.slice(6, 6), &[0; 6]);
        assert_eq!(arena.control().block_pos(), 6);
    }
}
