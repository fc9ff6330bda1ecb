//! Interleaved byte-channel delta decoding.
//!
//! The source block holds each channel's deltas back to back; the decoded
//! bytes are interleaved into the area directly after the source block.

use super::{NativeFilter, REG_SIZE};
use crate::memory::{Arena, GLOBAL_ADDR};
use crate::operand::Registers;

const REG_CHANNELS: usize = 0;

#[derive(Debug, Clone, Copy)]
pub struct Delta;

/// Effective channel count: negative counts run nothing, and channels past
/// the block size have no bytes to decode.
pub(crate) fn channel_count(raw: u32, size: u32) -> u32 {
    (raw as i32).clamp(0, size as i32) as u32
}

impl NativeFilter for Delta {
    fn apply(&self, arena: &mut Arena, registers: &Registers) {
        let size = registers[REG_SIZE];
        arena.control_mut().set_block_pos(size);
        if size >= GLOBAL_ADDR / 2 {
            return;
        }

        let channels = channel_count(registers[REG_CHANNELS], size);
        let border = size * 2;
        let mut src = 0u32;
        for channel in 0..channels {
            let mut prev = 0u8;
            let mut dest = size + channel;
            while dest < border {
                prev = prev.wrapping_sub(arena.read_u8(src));
                src += 1;
                arena.write_u8(dest, prev);
                dest += channels;
            }
        }
    }
}

/// Forward transform: interleaved bytes to per-channel negated deltas.
///
/// Used to build test input; [`Delta`] inverts it exactly.
pub fn encode(data: &[u8], channels: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for channel in 0..channels.min(data.len()) {
        let mut prev = 0u8;
        for &byte in data.iter().skip(channel).step_by(channels) {
            out.push(prev.wrapping_sub(byte));
            prev = byte;
        }
    }
    out
}
