//! Reference bytecode for the standard filters.
//!
//! Each program here is the interpreted counterpart of a native filter in
//! [`crate::standard`], built with the [`Assembler`]. They take the same
//! register parameters as the native code (`R4` block size, `R6` file offset,
//! `R0`/`R1` filter specific), leave the same bytes behind in the data area and
//! the control block, and keep their own state in the scratch page at
//! [`SCRATCH`].
//!
//! Prepare them with standard recognition turned off, otherwise a program
//! that happens to match a signature would run natively and prove nothing.

use crate::asm::{addr, imm, mem, mem_at, reg, AsmError, Assembler, Label};
use crate::control::offsets;
use crate::memory::GLOBAL_ADDR;
use crate::opcode::Opcode::*;
use crate::standard::StandardFilter;

/// Scratch page used by the reference programs, above the global region.
pub const SCRATCH: u32 = 0x3F000;

/// Largest block the decoding filters accept (half the area below globals).
const HALF_GLOBAL: u32 = GLOBAL_ADDR / 2;

const BLOCK_SIZE: u32 = GLOBAL_ADDR + offsets::BLOCK_SIZE;
const BLOCK_POS: u32 = GLOBAL_ADDR + offsets::BLOCK_POS;

/// Assembles the reference program for `filter`.
pub fn bytecode(filter: StandardFilter) -> Result<Vec<u8>, AsmError> {
    let mut asm = Assembler::new();
    match filter {
        StandardFilter::E8 => x86(&mut asm, false),
        StandardFilter::E8E9 => x86(&mut asm, true),
        StandardFilter::Itanium => itanium(&mut asm),
        StandardFilter::Delta => delta(&mut asm),
        StandardFilter::Rgb => rgb(&mut asm),
        StandardFilter::Audio => audio(&mut asm),
        StandardFilter::Upcase => upcase(&mut asm),
    }
    asm.assemble()
}

/// `abs(R[n])` for values known to be small or two's complement.
fn abs(asm: &mut Assembler, n: u8) {
    let positive = asm.label();
    asm.emit(Test, &[reg(n), reg(n)]);
    asm.jump(Jns, positive);
    asm.emit(Neg, &[reg(n)]);
    asm.bind(positive);
}

/// Clamps the channel count in `R0` to `0..=R4`; jumps to `end` when negative.
fn clamp_channels(asm: &mut Assembler, end: Label) {
    let ok = asm.label();
    asm.emit(Test, &[reg(0), reg(0)]);
    asm.jump(Js, end);
    asm.emit(Cmp, &[reg(0), reg(4)]);
    asm.jump(Jbe, ok);
    asm.emit(Mov, &[reg(0), reg(4)]);
    asm.bind(ok);
}

fn x86(asm: &mut Assembler, e9: bool) {
    let (top, found, negative, next, end) =
        (asm.label(), asm.label(), asm.label(), asm.label(), asm.label());

    asm.emit(Cmp, &[reg(4), imm(4)]);
    asm.jump(Jb, end);
    asm.emit(Cmp, &[reg(4), imm(GLOBAL_ADDR)]);
    asm.jump(Jae, end);
    asm.emit(Mov, &[reg(1), reg(4)]);
    asm.emit(Sub, &[reg(1), imm(4)]);
    asm.emit(Mov, &[reg(0), imm(0)]);

    asm.bind(top);
    asm.emit(Cmp, &[reg(0), reg(1)]);
    asm.jump(Jae, end);
    asm.emit(Movzx, &[reg(2), mem(0)]);
    asm.emit(Inc, &[reg(0)]);
    asm.emit(Cmp, &[reg(2), imm(0xE8)]);
    asm.jump(Jz, found);
    if e9 {
        asm.emit(Cmp, &[reg(2), imm(0xE9)]);
        asm.jump(Jz, found);
    }
    asm.jump(Jmp, top);

    // R3 = position + file offset, R2 = stored address
    asm.bind(found);
    asm.emit(Mov, &[reg(3), reg(0)]);
    asm.emit(Add, &[reg(3), reg(6)]);
    asm.emit(Mov, &[reg(2), mem(0)]);
    asm.emit(Test, &[reg(2), reg(2)]);
    asm.jump(Js, negative);
    asm.emit(Cmp, &[reg(2), imm(0x100_0000)]);
    asm.jump(Jae, next);
    asm.emit(Sub, &[reg(2), reg(3)]);
    asm.emit(Mov, &[mem(0), reg(2)]);
    asm.jump(Jmp, next);

    asm.bind(negative);
    asm.emit(Mov, &[reg(5), reg(2)]);
    asm.emit(Add, &[reg(5), reg(3)]);
    asm.jump(Js, next);
    asm.emit(Add, &[reg(2), imm(0x100_0000)]);
    asm.emit(Mov, &[mem(0), reg(2)]);

    asm.bind(next);
    asm.emit(Add, &[reg(0), imm(4)]);
    asm.jump(Jmp, top);

    asm.bind(end);
    asm.emit(Ret, &[]);
}

fn itanium(asm: &mut Assembler) {
    const MASKS: u32 = SCRATCH + 0x100;
    const LIMIT: u32 = SCRATCH + 0x110;
    const BUNDLE: u32 = SCRATCH + 0x114;

    let (top, next, end, load_bits, store_bits) =
        (asm.label(), asm.label(), asm.label(), asm.label(), asm.label());

    asm.emit(Cmp, &[reg(4), imm(21)]);
    asm.jump(Jb, end);
    asm.emit(Cmp, &[reg(4), imm(GLOBAL_ADDR)]);
    asm.jump(Jae, end);

    // Branch slot masks for templates 0x10..=0x1F, one byte each.
    let masks = [0x0606_0404, 0x0707_0000, 0x0000_0404, 0x0000_0404];
    for (i, word) in masks.into_iter().enumerate() {
        asm.emit(Mov, &[addr(MASKS + 4 * i as u32), imm(word)]);
    }
    asm.emit(Mov, &[reg(1), reg(4)]);
    asm.emit(Sub, &[reg(1), imm(21)]);
    asm.emit(Mov, &[addr(LIMIT), reg(1)]);
    asm.emit(Mov, &[reg(1), reg(6)]);
    asm.emit(Sar, &[reg(1), imm(4)]);
    asm.emit(Mov, &[addr(BUNDLE), reg(1)]);
    asm.emit(Mov, &[reg(0), imm(0)]);

    asm.bind(top);
    asm.emit(Cmp, &[reg(0), addr(LIMIT)]);
    asm.jump(Jae, end);
    asm.emit(Movzx, &[reg(3), mem(0)]);
    asm.emit(And, &[reg(3), imm(0x1F)]);
    asm.emit(Sub, &[reg(3), imm(0x10)]);
    asm.jump(Js, next);
    asm.emit(Movzx, &[reg(3), mem_at(3, MASKS)]);

    for slot in 0..3u32 {
        let skip = asm.label();
        let start = slot * 41 + 5;
        asm.emit(Test, &[reg(3), imm(1 << slot)]);
        asm.jump(Jz, skip);

        asm.emit(Mov, &[reg(1), imm((start + 37) >> 3)]);
        asm.emit(Mov, &[reg(2), imm((start + 37) & 7)]);
        asm.jump(Call, load_bits);
        asm.emit(And, &[reg(6), imm(0xF)]);
        asm.emit(Cmp, &[reg(6), imm(5)]);
        asm.jump(Jnz, skip);

        asm.emit(Mov, &[reg(1), imm((start + 13) >> 3)]);
        asm.emit(Mov, &[reg(2), imm((start + 13) & 7)]);
        asm.jump(Call, load_bits);
        asm.emit(And, &[reg(6), imm(0xF_FFFF)]);
        asm.emit(Sub, &[reg(6), addr(BUNDLE)]);
        asm.emit(And, &[reg(6), imm(0xF_FFFF)]);
        asm.jump(Call, store_bits);
        asm.bind(skip);
    }

    asm.bind(next);
    asm.emit(Add, &[reg(0), imm(16)]);
    asm.emit(Inc, &[addr(BUNDLE)]);
    asm.jump(Jmp, top);

    asm.bind(end);
    asm.emit(Ret, &[]);

    // R6 = dword at bundle R0 + byte R1, shifted right by R2.
    asm.bind(load_bits);
    asm.emit(Mov, &[reg(5), reg(0)]);
    asm.emit(Add, &[reg(5), reg(1)]);
    asm.emit(Mov, &[reg(6), mem(5)]);
    asm.emit(Shr, &[reg(6), reg(2)]);
    asm.emit(Ret, &[]);

    // Stores the 20-bit field in R6 at bundle R0 + byte R1, bit R2.
    asm.bind(store_bits);
    asm.emit(Mov, &[reg(5), reg(0)]);
    asm.emit(Add, &[reg(5), reg(1)]);
    asm.emit(Mov, &[reg(4), imm(0xF_FFFF)]);
    asm.emit(Shl, &[reg(4), reg(2)]);
    asm.emit(Not, &[reg(4)]);
    asm.emit(And, &[mem(5), reg(4)]);
    asm.emit(Shl, &[reg(6), reg(2)]);
    asm.emit(Or, &[mem(5), reg(6)]);
    asm.emit(Ret, &[]);
}

fn delta(asm: &mut Assembler) {
    let (outer, inner, done, end) = (asm.label(), asm.label(), asm.label(), asm.label());

    asm.emit(Mov, &[addr(BLOCK_POS), reg(4)]);
    asm.emit(Cmp, &[reg(4), imm(HALF_GLOBAL)]);
    asm.jump(Jae, end);
    clamp_channels(asm, end);

    // R1 channel, R2 source, R3 destination, R5 previous byte, R6 border
    asm.emit(Mov, &[reg(1), imm(0)]);
    asm.emit(Mov, &[reg(2), imm(0)]);
    asm.emit(Mov, &[reg(6), reg(4)]);
    asm.emit(Add, &[reg(6), reg(4)]);

    asm.bind(outer);
    asm.emit(Cmp, &[reg(1), reg(0)]);
    asm.jump(Jae, end);
    asm.emit(Mov, &[reg(5), imm(0)]);
    asm.emit(Mov, &[reg(3), reg(4)]);
    asm.emit(Add, &[reg(3), reg(1)]);

    asm.bind(inner);
    asm.emit(Cmp, &[reg(3), reg(6)]);
    asm.jump(Jae, done);
    asm.emit_byte(Sub, &[reg(5), mem(2)]);
    asm.emit_byte(Mov, &[mem(3), reg(5)]);
    asm.emit(Inc, &[reg(2)]);
    asm.emit(Add, &[reg(3), reg(0)]);
    asm.jump(Jmp, inner);

    asm.bind(done);
    asm.emit(Inc, &[reg(1)]);
    asm.jump(Jmp, outer);

    asm.bind(end);
    asm.emit(Ret, &[]);
}

fn rgb(asm: &mut Assembler) {
    const WIDTH: u32 = SCRATCH;
    const RED_POS: u32 = SCRATCH + 4;
    const SRC: u32 = SCRATCH + 8;
    const CHANNEL: u32 = SCRATCH + 12;
    const PA: u32 = SCRATCH + 16;
    const PB: u32 = SCRATCH + 20;

    let channel = asm.label();
    let pixel = asm.label();
    let use_prev = asm.label();
    let not_left = asm.label();
    let use_upper_left = asm.label();
    let have = asm.label();
    let next_channel = asm.label();
    let green = asm.label();
    let green_loop = asm.label();
    let end = asm.label();

    asm.emit(Mov, &[addr(BLOCK_POS), reg(4)]);
    asm.emit(Cmp, &[reg(4), imm(HALF_GLOBAL)]);
    asm.jump(Jae, end);
    asm.emit(Cmp, &[reg(4), imm(3)]);
    asm.jump(Jb, end);
    asm.emit(Sub, &[reg(0), imm(3)]);
    asm.emit(Cmp, &[reg(4), reg(0)]);
    asm.jump(Jb, end);
    asm.emit(Cmp, &[reg(1), imm(2)]);
    asm.jump(Ja, end);
    asm.emit(Mov, &[addr(WIDTH), reg(0)]);
    asm.emit(Mov, &[addr(RED_POS), reg(1)]);
    asm.emit(Mov, &[addr(SRC), imm(0)]);
    asm.emit(Mov, &[addr(CHANNEL), imm(0)]);

    asm.bind(channel);
    asm.emit(Cmp, &[addr(CHANNEL), imm(3)]);
    asm.jump(Jae, green);
    asm.emit(Mov, &[reg(5), imm(0)]);
    asm.emit(Mov, &[reg(1), addr(CHANNEL)]);

    // R1 position, R5 previous output, R3 above, R6 above-left
    asm.bind(pixel);
    asm.emit(Cmp, &[reg(1), reg(4)]);
    asm.jump(Jae, next_channel);
    asm.emit(Mov, &[reg(2), reg(1)]);
    asm.emit(Sub, &[reg(2), addr(WIDTH)]);
    asm.emit(Cmp, &[reg(2), imm(3)]);
    asm.jump(Js, use_prev);
    asm.emit(Add, &[reg(2), reg(4)]);
    asm.emit(Movzx, &[reg(3), mem(2)]);
    asm.emit(Movzx, &[reg(6), mem_at(2, 0xFFFF_FFFD)]);

    asm.emit(Mov, &[reg(0), reg(5)]);
    asm.emit(Add, &[reg(0), reg(3)]);
    asm.emit(Sub, &[reg(0), reg(6)]);
    for (neighbour, slot) in [(5, Some(PA)), (3, Some(PB)), (6, None)] {
        asm.emit(Mov, &[reg(2), reg(0)]);
        asm.emit(Sub, &[reg(2), reg(neighbour)]);
        abs(asm, 2);
        if let Some(slot) = slot {
            asm.emit(Mov, &[addr(slot), reg(2)]);
        }
    }

    asm.emit(Mov, &[reg(0), addr(PA)]);
    asm.emit(Cmp, &[reg(0), addr(PB)]);
    asm.jump(Ja, not_left);
    asm.emit(Cmp, &[reg(0), reg(2)]);
    asm.jump(Ja, not_left);
    asm.emit(Mov, &[reg(0), reg(5)]);
    asm.jump(Jmp, have);

    asm.bind(not_left);
    asm.emit(Mov, &[reg(0), addr(PB)]);
    asm.emit(Cmp, &[reg(0), reg(2)]);
    asm.jump(Ja, use_upper_left);
    asm.emit(Mov, &[reg(0), reg(3)]);
    asm.jump(Jmp, have);

    asm.bind(use_upper_left);
    asm.emit(Mov, &[reg(0), reg(6)]);
    asm.jump(Jmp, have);

    asm.bind(use_prev);
    asm.emit(Mov, &[reg(0), reg(5)]);

    asm.bind(have);
    asm.emit(Mov, &[reg(2), addr(SRC)]);
    asm.emit(Movzx, &[reg(3), mem(2)]);
    asm.emit(Sub, &[reg(0), reg(3)]);
    asm.emit(And, &[reg(0), imm(0xFF)]);
    asm.emit(Mov, &[reg(5), reg(0)]);
    asm.emit(Inc, &[addr(SRC)]);
    asm.emit(Mov, &[reg(2), reg(1)]);
    asm.emit(Add, &[reg(2), reg(4)]);
    asm.emit_byte(Mov, &[mem(2), reg(5)]);
    asm.emit(Add, &[reg(1), imm(3)]);
    asm.jump(Jmp, pixel);

    asm.bind(next_channel);
    asm.emit(Inc, &[addr(CHANNEL)]);
    asm.jump(Jmp, channel);

    asm.bind(green);
    asm.emit(Mov, &[reg(1), addr(RED_POS)]);
    asm.emit(Mov, &[reg(6), reg(4)]);
    asm.emit(Sub, &[reg(6), imm(2)]);

    asm.bind(green_loop);
    asm.emit(Cmp, &[reg(1), reg(6)]);
    asm.jump(Jae, end);
    asm.emit(Mov, &[reg(2), reg(1)]);
    asm.emit(Add, &[reg(2), reg(4)]);
    asm.emit(Movzx, &[reg(3), mem_at(2, 1)]);
    asm.emit_byte(Add, &[mem(2), reg(3)]);
    asm.emit_byte(Add, &[mem_at(2, 2), reg(3)]);
    asm.emit(Add, &[reg(1), imm(3)]);
    asm.jump(Jmp, green_loop);

    asm.bind(end);
    asm.emit(Ret, &[]);
}

fn audio(asm: &mut Assembler) {
    const K: [u32; 3] = [SCRATCH, SCRATCH + 0x04, SCRATCH + 0x08];
    const D: [u32; 3] = [SCRATCH + 0x0C, SCRATCH + 0x10, SCRATCH + 0x14];
    const PREV_BYTE: u32 = SCRATCH + 0x18;
    const PREV_DELTA: u32 = SCRATCH + 0x1C;
    const DIF: u32 = SCRATCH + 0x20;
    const COUNT: u32 = SCRATCH + 0x3C;
    const STATE_END: u32 = SCRATCH + 0x40;
    const SRC: u32 = SCRATCH + 0x40;
    const CHANNEL: u32 = SCRATCH + 0x44;

    let dif = |j: u32| DIF + 4 * j;

    let channel = asm.label();
    let sample = asm.label();
    let no_adapt = asm.label();
    let next_channel = asm.label();
    let end = asm.label();

    asm.emit(Mov, &[addr(BLOCK_POS), reg(4)]);
    asm.emit(Cmp, &[reg(4), imm(HALF_GLOBAL)]);
    asm.jump(Jae, end);
    clamp_channels(asm, end);
    asm.emit(Mov, &[addr(SRC), imm(0)]);
    asm.emit(Mov, &[addr(CHANNEL), imm(0)]);

    asm.bind(channel);
    asm.emit(Cmp, &[addr(CHANNEL), reg(0)]);
    asm.jump(Jae, end);
    for var in (SCRATCH..STATE_END).step_by(4) {
        asm.emit(Mov, &[addr(var), imm(0)]);
    }
    asm.emit(Mov, &[reg(1), addr(CHANNEL)]);

    asm.bind(sample);
    asm.emit(Cmp, &[reg(1), reg(4)]);
    asm.jump(Jae, next_channel);

    asm.emit(Mov, &[reg(2), addr(D[1])]);
    asm.emit(Mov, &[addr(D[2]), reg(2)]);
    asm.emit(Mov, &[reg(2), addr(PREV_DELTA)]);
    asm.emit(Sub, &[reg(2), addr(D[0])]);
    asm.emit(Mov, &[addr(D[1]), reg(2)]);
    asm.emit(Mov, &[reg(2), addr(PREV_DELTA)]);
    asm.emit(Mov, &[addr(D[0]), reg(2)]);

    // R3 = predicted byte
    asm.emit(Mov, &[reg(3), addr(PREV_BYTE)]);
    asm.emit(Shl, &[reg(3), imm(3)]);
    for (k, d) in K.into_iter().zip(D) {
        asm.emit(Mov, &[reg(2), addr(k)]);
        asm.emit(Mul, &[reg(2), addr(d)]);
        asm.emit(Add, &[reg(3), reg(2)]);
    }
    asm.emit(Shr, &[reg(3), imm(3)]);
    asm.emit(And, &[reg(3), imm(0xFF)]);

    // R6 = coded byte, R5 = coded byte sign-extended
    asm.emit(Mov, &[reg(2), addr(SRC)]);
    asm.emit(Movzx, &[reg(6), mem(2)]);
    asm.emit(Movsx, &[reg(5), mem(2)]);
    asm.emit(Inc, &[addr(SRC)]);
    asm.emit(Sub, &[reg(3), reg(6)]);
    asm.emit(Mov, &[reg(2), reg(1)]);
    asm.emit(Add, &[reg(2), reg(4)]);
    asm.emit_byte(Mov, &[mem(2), reg(3)]);

    asm.emit(Mov, &[reg(2), reg(3)]);
    asm.emit(Sub, &[reg(2), addr(PREV_BYTE)]);
    asm.emit(Movsx, &[reg(2), reg(2)]);
    asm.emit(Mov, &[addr(PREV_DELTA), reg(2)]);
    asm.emit(Mov, &[addr(PREV_BYTE), reg(3)]);

    // Accumulate the error of every candidate weight nudge.
    asm.emit(Shl, &[reg(5), imm(3)]);
    asm.emit(Mov, &[reg(2), reg(5)]);
    abs(asm, 2);
    asm.emit(Add, &[addr(dif(0)), reg(2)]);
    for j in 1..7u32 {
        let op = if j % 2 == 1 { Sub } else { Add };
        asm.emit(Mov, &[reg(2), reg(5)]);
        asm.emit(op, &[reg(2), addr(D[(j as usize - 1) / 2])]);
        abs(asm, 2);
        asm.emit(Add, &[addr(dif(j)), reg(2)]);
    }

    asm.emit(Mov, &[reg(2), addr(COUNT)]);
    asm.emit(And, &[reg(2), imm(0x1F)]);
    asm.jump(Jnz, no_adapt);

    // R3 = smallest error, R6 = its index
    asm.emit(Mov, &[reg(3), addr(dif(0))]);
    asm.emit(Mov, &[reg(6), imm(0)]);
    for j in 1..7u32 {
        let skip = asm.label();
        asm.emit(Cmp, &[addr(dif(j)), reg(3)]);
        asm.jump(Jae, skip);
        asm.emit(Mov, &[reg(3), addr(dif(j))]);
        asm.emit(Mov, &[reg(6), imm(j)]);
        asm.bind(skip);
    }
    for j in 0..7u32 {
        asm.emit(Mov, &[addr(dif(j)), imm(0)]);
    }

    let cases: Vec<Label> = (1..7).map(|_| asm.label()).collect();
    for (j, case) in (1..7u32).zip(&cases) {
        asm.emit(Cmp, &[reg(6), imm(j)]);
        asm.jump(Jz, *case);
    }
    asm.jump(Jmp, no_adapt);
    for (j, case) in (1..7u32).zip(cases) {
        let k = K[(j as usize - 1) / 2];
        asm.bind(case);
        if j % 2 == 1 {
            asm.emit(Mov, &[reg(2), addr(k)]);
            asm.emit(Add, &[reg(2), imm(16)]);
            asm.jump(Js, no_adapt);
            asm.emit(Dec, &[addr(k)]);
        } else {
            asm.emit(Cmp, &[addr(k), imm(16)]);
            asm.jump(Jns, no_adapt);
            asm.emit(Inc, &[addr(k)]);
        }
        asm.jump(Jmp, no_adapt);
    }

    asm.bind(no_adapt);
    asm.emit(Inc, &[addr(COUNT)]);
    asm.emit(Add, &[reg(1), reg(0)]);
    asm.jump(Jmp, sample);

    asm.bind(next_channel);
    asm.emit(Inc, &[addr(CHANNEL)]);
    asm.jump(Jmp, channel);

    asm.bind(end);
    asm.emit(Ret, &[]);
}

fn upcase(asm: &mut Assembler) {
    let (top, store, finish, end) = (asm.label(), asm.label(), asm.label(), asm.label());

    asm.emit(Cmp, &[reg(4), imm(HALF_GLOBAL)]);
    asm.jump(Jae, end);
    asm.emit(Mov, &[reg(0), imm(0)]);
    asm.emit(Mov, &[reg(1), reg(4)]);

    asm.bind(top);
    asm.emit(Cmp, &[reg(0), reg(4)]);
    asm.jump(Jae, finish);
    asm.emit(Movzx, &[reg(2), mem(0)]);
    asm.emit(Inc, &[reg(0)]);
    asm.emit(Cmp, &[reg(2), imm(2)]);
    asm.jump(Jnz, store);
    asm.emit(Movzx, &[reg(2), mem(0)]);
    asm.emit(Inc, &[reg(0)]);
    asm.emit(Cmp, &[reg(2), imm(2)]);
    asm.jump(Jz, store);
    asm.emit(Sub, &[reg(2), imm(32)]);

    asm.bind(store);
    asm.emit_byte(Mov, &[mem(1), reg(2)]);
    asm.emit(Inc, &[reg(1)]);
    asm.jump(Jmp, top);

    asm.bind(finish);
    asm.emit(Sub, &[reg(1), reg(4)]);
    asm.emit(Mov, &[addr(BLOCK_SIZE), reg(1)]);
    asm.emit(Mov, &[addr(BLOCK_POS), reg(4)]);

    asm.bind(end);
    asm.emit(Ret, &[]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prepare::{prepare_with, PrepareOptions};
    use crate::program::ProgramOrigin;

    const PLAIN: PrepareOptions = PrepareOptions {
        recognize_standard: false,
        optimize: false,
    };

    #[test]
    fn test_every_reference_assembles() {
        for filter in StandardFilter::ALL {
            let code = bytecode(filter).unwrap_or_else(|err| panic!("{filter}: {err}"));
            let program = prepare_with(&code, &PLAIN);
            assert_eq!(program.origin(), ProgramOrigin::Decoded, "{filter}");
            assert!(program.len() > 5, "{filter}");
        }
    }

    #[test]
    fn test_references_are_not_recognized() {
        for filter in StandardFilter::ALL {
            let code = bytecode(filter).expect("assembles");
            assert_eq!(crate::standard::recognize(&code), None, "{filter}");
        }
    }
}
