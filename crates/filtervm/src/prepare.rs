//! Bytecode decoder.
//!
//! Turns a raw filter blob into a [`Program`]. Preparation is total: any
//! byte sequence yields a runnable program.
//!
//! # Blob Layout
//!
//! ```text
//! byte 0        XOR of all following bytes
//! 1 bit         static data present
//!   read_data   static data length - 1
//!   n x 8 bits  static data
//! ...           commands until the byte cursor reaches the end
//! ```
//!
//! Each command is an opcode (`0ooo` or `1ooooo`), a byte-mode bit for
//! width-polymorphic opcodes, then its operands. Bits past the end of the blob
//! read as zero, so padding in the final byte decodes as `mov #0, #0`.

use tracing::{debug, instrument, warn};

use crate::bits::BitReader;
use crate::opcode::Opcode;
use crate::operand::Operand;
use crate::optimize::optimize;
use crate::program::{Command, Program, ProgramOrigin};
use crate::standard;

/// Knobs for [`prepare_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Replace known filter programs by their native implementation.
    pub recognize_standard: bool,
    /// Run the peephole optimizer over decoded programs.
    pub optimize: bool,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            recognize_standard: true,
            optimize: true,
        }
    }
}

/// Prepares a blob with default options.
pub fn prepare(code: &[u8]) -> Program {
    prepare_with(code, &PrepareOptions::default())
}

/// Prepares a blob.
///
/// An empty blob or a checksum mismatch yields a lone `RET`; the
/// [`ProgramOrigin`] records which.
#[instrument(skip_all, name = "prepare", fields(len = code.len()))]
pub fn prepare_with(code: &[u8], options: &PrepareOptions) -> Program {
    let Some((&expected, body)) = code.split_first() else {
        debug!("empty program");
        return Program::trivial(ProgramOrigin::Empty);
    };

    let checksum = body.iter().fold(0u8, |acc, byte| acc ^ byte);
    if checksum != expected {
        warn!(expected, checksum, "checksum mismatch, program replaced by ret");
        return Program::trivial(ProgramOrigin::ChecksumMismatch);
    }

    if options.recognize_standard {
        if let Some(filter) = standard::recognize(code) {
            debug!(filter = %filter, "recognized standard filter");
            return Program::standard(filter);
        }
    }

    let mut reader = BitReader::new(code);
    reader.skip(8);
    let static_data = read_static_data(&mut reader, code.len());

    let mut commands = Vec::new();
    while reader.has_more() {
        let index = commands.len() as u32;
        commands.push(decode_command(&mut reader, index));
    }
    commands.push(Command::ret());

    debug!(
        commands = commands.len(),
        static_data = static_data.len(),
        "decoded program"
    );
    let program = Program::new(commands, static_data, ProgramOrigin::Decoded);
    if options.optimize {
        optimize(&program)
    } else {
        program
    }
}

/// Reads a variable-width integer.
///
/// The top two bits select the class: `00` 4-bit value, `01` 8-bit value
/// (`01 0000` marks a negative byte), `10` 16-bit value, `11` 32-bit value.
pub fn read_data(reader: &mut BitReader<'_>) -> u32 {
    let data = reader.peek16();
    match data & 0xC000 {
        0 => {
            reader.skip(6);
            (data >> 10) & 0xF
        }
        0x4000 => {
            if data & 0x3C00 == 0 {
                reader.skip(14);
                0xFFFF_FF00 | ((data >> 2) & 0xFF)
            } else {
                reader.skip(10);
                (data >> 6) & 0xFF
            }
        }
        0x8000 => {
            reader.skip(2);
            reader.read(16)
        }
        _ => {
            reader.skip(2);
            let high = reader.read(16);
            let low = reader.read(16);
            (high << 16) | low
        }
    }
}

fn read_static_data(reader: &mut BitReader<'_>, len: usize) -> Vec<u8> {
    if reader.read(1) == 0 {
        return Vec::new();
    }
    let size = read_data(reader).wrapping_add(1) as usize;
    let mut data = Vec::new();
    while reader.byte_pos() < len && data.len() < size {
        data.push(reader.read(8) as u8);
    }
    data
}

fn decode_operand(reader: &mut BitReader<'_>, byte_mode: bool) -> Operand {
    let data = reader.peek16();
    if data & 0x8000 != 0 {
        reader.skip(4);
        Operand::Register(((data >> 12) & 7) as u8)
    } else if data & 0xC000 == 0 {
        reader.skip(2);
        let value = if byte_mode {
            reader.read(8)
        } else {
            read_data(reader)
        };
        Operand::Immediate(value)
    } else if data & 0x2000 == 0 {
        reader.skip(6);
        Operand::Memory {
            base: Some(((data >> 10) & 7) as u8),
            disp: 0,
        }
    } else if data & 0x1000 == 0 {
        reader.skip(7);
        let base = Some(((data >> 9) & 7) as u8);
        Operand::Memory {
            base,
            disp: read_data(reader),
        }
    } else {
        reader.skip(4);
        Operand::Memory {
            base: None,
            disp: read_data(reader),
        }
    }
}

/// Turns an encoded jump distance into an absolute command index.
///
/// Values from 256 up are absolute (`d - 256`); smaller values are relative
/// to the current command: `136..=255` backwards by up to 128, `16..=135`
/// forwards by 8 to 127, `8..=15` backwards by 1 to 8, and anything below 8
/// (including negative words) is added as is.
pub fn resolve_jump(distance: u32, index: u32) -> u32 {
    let distance = distance as i32;
    if distance >= 256 {
        return (distance - 256) as u32;
    }
    let relative = match distance {
        136.. => distance - 264,
        16.. => distance - 8,
        8.. => distance - 16,
        _ => distance,
    };
    (index as i32).wrapping_add(relative) as u32
}

fn decode_command(reader: &mut BitReader<'_>, index: u32) -> Command {
    let data = reader.peek16();
    let code = if data & 0x8000 == 0 {
        reader.skip(4);
        data >> 12
    } else {
        reader.skip(6);
        (data >> 10) - 24
    };
    // Every 4-bit and 6-bit code maps to an opcode.
    let opcode = Opcode::from_code(code).unwrap_or(Opcode::Print);
    let meta = opcode.metadata();

    let byte_mode = meta.byte_mode && reader.read(1) != 0;
    let (op1, op2) = match meta.operands {
        0 => (Operand::None, Operand::None),
        1 => {
            let op1 = match decode_operand(reader, byte_mode) {
                Operand::Immediate(distance) if meta.jump || meta.procedure => {
                    Operand::Immediate(resolve_jump(distance, index))
                }
                other => other,
            };
            (op1, Operand::None)
        }
        _ => {
            let op1 = decode_operand(reader, byte_mode);
            let op2 = decode_operand(reader, byte_mode);
            (op1, op2)
        }
    };
    Command::new(opcode, byte_mode, op1, op2)
}

#[cfg(test)]
mod tests;
