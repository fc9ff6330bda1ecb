//! Bytecode assembler.
//!
//! Produces blobs the decoder in [`crate::prepare`] accepts: checksum byte,
//! optional static data, compact immediates and folded jump distances. Jump
//! and call targets can be given as [`Label`]s and are resolved when the
//! program is assembled.
//!
//! ```
//! use filtervm::asm::{imm, reg, Assembler};
//! use filtervm::Opcode;
//!
//! let mut asm = Assembler::new();
//! let done = asm.label();
//! asm.emit(Opcode::Cmp, &[reg(4), imm(0)]);
//! asm.jump(Opcode::Jz, done);
//! asm.emit(Opcode::Dec, &[reg(4)]);
//! asm.bind(done);
//! asm.emit(Opcode::Ret, &[]);
//! let blob = asm.assemble().unwrap();
//! assert_eq!(blob[0], blob[1..].iter().fold(0, |a, b| a ^ b));
//! ```

use thiserror::Error;

use crate::bits::BitWriter;
use crate::opcode::Opcode;
use crate::operand::{Operand, REGISTER_COUNT};

/// Errors detected while assembling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    /// A label was used as a target but never bound.
    #[error("label {0} is never bound")]
    UnboundLabel(usize),

    /// A label was bound more than once.
    #[error("label {0} is bound twice")]
    LabelRebound(usize),

    /// Register index out of range.
    #[error("register r{0} does not exist")]
    InvalidRegister(u8),

    /// Wrong number of operands for the opcode.
    #[error("{opcode} takes {expected} operand(s), got {found}")]
    OperandCount {
        opcode: Opcode,
        expected: u8,
        found: usize,
    },

    /// Optimizer-only and pseudo opcodes have no wire code.
    #[error("{0} has no wire encoding")]
    NotEncodable(Opcode),

    /// Byte mode requested for an opcode without a byte-mode bit.
    #[error("{0} has no byte mode")]
    NoByteMode(Opcode),

    /// Byte-mode immediates are encoded in 8 bits.
    #[error("immediate {0:#x} does not fit a byte operand")]
    ByteImmediate(u32),

    /// Labels can only be the single operand of a jump or call.
    #[error("label used as an operand of {0}")]
    MisplacedLabel(Opcode),

    /// The jump target cannot be expressed from this command.
    #[error("jump target {target:#x} cannot be encoded at command {index}")]
    JumpOutOfReach { target: u32, index: u32 },
}

/// Jump or call target, bound to a command index with [`Assembler::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Assembler operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    Operand(Operand),
    Label(Label),
}

impl From<Operand> for Arg {
    fn from(operand: Operand) -> Self {
        Arg::Operand(operand)
    }
}

impl From<Label> for Arg {
    fn from(label: Label) -> Self {
        Arg::Label(label)
    }
}

/// Register `R[n]`.
pub fn reg(n: u8) -> Arg {
    Arg::Operand(Operand::Register(n))
}

/// Immediate value.
pub fn imm(value: u32) -> Arg {
    Arg::Operand(Operand::Immediate(value))
}

/// Memory at `R[n]`.
pub fn mem(n: u8) -> Arg {
    mem_at(n, 0)
}

/// Memory at `R[n] + disp`.
pub fn mem_at(n: u8, disp: u32) -> Arg {
    Arg::Operand(Operand::Memory {
        base: Some(n),
        disp,
    })
}

/// Memory at a fixed address.
pub fn addr(disp: u32) -> Arg {
    Arg::Operand(Operand::Memory { base: None, disp })
}

#[derive(Debug, Clone)]
struct Item {
    opcode: Opcode,
    byte_mode: bool,
    args: Vec<Arg>,
}

/// Builds bytecode blobs command by command.
#[derive(Debug, Clone, Default)]
pub struct Assembler {
    items: Vec<Item>,
    labels: Vec<Option<u32>>,
    static_data: Vec<u8>,
    error: Option<AsmError>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unbound label.
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Binds `label` to the next command emitted.
    pub fn bind(&mut self, label: Label) -> &mut Self {
        let here = self.items.len() as u32;
        if self.labels.get(label.0) == Some(&None) {
            self.labels[label.0] = Some(here);
        } else {
            self.fail(AsmError::LabelRebound(label.0));
        }
        self
    }

    /// Number of commands emitted so far.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sets the static data block shipped with the program.
    pub fn static_data(&mut self, data: &[u8]) -> &mut Self {
        self.static_data = data.to_vec();
        self
    }

    /// Emits a word-mode command.
    pub fn emit(&mut self, opcode: Opcode, args: &[Arg]) -> &mut Self {
        self.push(opcode, false, args)
    }

    /// Emits a byte-mode command.
    pub fn emit_byte(&mut self, opcode: Opcode, args: &[Arg]) -> &mut Self {
        self.push(opcode, true, args)
    }

    /// Emits a jump or call to `label`.
    pub fn jump(&mut self, opcode: Opcode, label: Label) -> &mut Self {
        self.push(opcode, false, &[Arg::Label(label)])
    }

    fn push(&mut self, opcode: Opcode, byte_mode: bool, args: &[Arg]) -> &mut Self {
        self.items.push(Item {
            opcode,
            byte_mode,
            args: args.to_vec(),
        });
        self
    }

    fn fail(&mut self, error: AsmError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Encodes the program.
    pub fn assemble(&self) -> Result<Vec<u8>, AsmError> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }

        let mut writer = BitWriter::new();
        if self.static_data.is_empty() {
            writer.write(0, 1);
        } else {
            writer.write(1, 1);
            write_data(&mut writer, self.static_data.len() as u32 - 1);
            for byte in &self.static_data {
                writer.write(u32::from(*byte), 8);
            }
        }

        for (index, item) in self.items.iter().enumerate() {
            self.encode_item(&mut writer, item, index as u32)?;
        }

        let body = writer.into_bytes();
        let checksum = body.iter().fold(0u8, |acc, byte| acc ^ byte);
        let mut blob = Vec::with_capacity(body.len() + 1);
        blob.push(checksum);
        blob.extend_from_slice(&body);
        Ok(blob)
    }

    fn encode_item(&self, writer: &mut BitWriter, item: &Item, index: u32) -> Result<(), AsmError> {
        let opcode = item.opcode;
        let code = opcode.code().ok_or(AsmError::NotEncodable(opcode))?;
        let meta = opcode.metadata();
        if item.args.len() != usize::from(meta.operands) {
            return Err(AsmError::OperandCount {
                opcode,
                expected: meta.operands,
                found: item.args.len(),
            });
        }
        if item.byte_mode && !meta.byte_mode {
            return Err(AsmError::NoByteMode(opcode));
        }

        if code < 8 {
            writer.write(code, 4);
        } else {
            writer.write(1, 1);
            writer.write(code - 8, 5);
        }
        if meta.byte_mode {
            writer.write(u32::from(item.byte_mode), 1);
        }

        let branch = meta.operands == 1 && (meta.jump || meta.procedure);
        for arg in &item.args {
            let operand = match *arg {
                Arg::Label(label) if branch => {
                    let target = self
                        .labels
                        .get(label.0)
                        .copied()
                        .flatten()
                        .ok_or(AsmError::UnboundLabel(label.0))?;
                    Operand::Immediate(target)
                }
                Arg::Label(_) => return Err(AsmError::MisplacedLabel(opcode)),
                Arg::Operand(operand) => operand,
            };
            let operand = match operand {
                Operand::Immediate(target) if branch => {
                    let folded = fold_jump(target, index)
                        .ok_or(AsmError::JumpOutOfReach { target, index })?;
                    Operand::Immediate(folded)
                }
                other => other,
            };
            write_operand(writer, operand, item.byte_mode, opcode)?;
        }
        Ok(())
    }
}

/// Encodes a variable-width integer in the smallest class that holds it.
pub fn write_data(writer: &mut BitWriter, value: u32) {
    if value < 16 {
        writer.write(0b00, 2);
        writer.write(value, 4);
    } else if value < 256 {
        writer.write(0b01, 2);
        writer.write(value, 8);
    } else if value >= 0xFFFF_FF00 {
        writer.write(0b01, 2);
        writer.write(0, 4);
        writer.write(value & 0xFF, 8);
    } else if value <= 0xFFFF {
        writer.write(0b10, 2);
        writer.write(value, 16);
    } else {
        writer.write(0b11, 2);
        writer.write(value >> 16, 16);
        writer.write(value & 0xFFFF, 16);
    }
}

fn write_operand(
    writer: &mut BitWriter,
    operand: Operand,
    byte_mode: bool,
    opcode: Opcode,
) -> Result<(), AsmError> {
    let check = |reg: u8| {
        if usize::from(reg) < REGISTER_COUNT {
            Ok(u32::from(reg))
        } else {
            Err(AsmError::InvalidRegister(reg))
        }
    };
    match operand {
        Operand::None => {
            return Err(AsmError::OperandCount {
                opcode,
                expected: opcode.operand_count(),
                found: 0,
            })
        }
        Operand::Register(reg) => {
            writer.write(1, 1);
            writer.write(check(reg)?, 3);
        }
        Operand::Immediate(value) => {
            writer.write(0b00, 2);
            if byte_mode {
                if value > 0xFF {
                    return Err(AsmError::ByteImmediate(value));
                }
                writer.write(value, 8);
            } else {
                write_data(writer, value);
            }
        }
        Operand::Memory {
            base: Some(reg),
            disp: 0,
        } => {
            writer.write(0b010, 3);
            writer.write(check(reg)?, 3);
        }
        Operand::Memory {
            base: Some(reg),
            disp,
        } => {
            writer.write(0b0110, 4);
            writer.write(check(reg)?, 3);
            write_data(writer, disp);
        }
        Operand::Memory { base: None, disp } => {
            writer.write(0b0111, 4);
            write_data(writer, disp);
        }
    }
    Ok(())
}

/// Inverse of [`crate::prepare::resolve_jump`]: the shortest encoding of an
/// absolute `target` as seen from command `index`.
pub fn fold_jump(target: u32, index: u32) -> Option<u32> {
    let delta = i64::from(target) - i64::from(index);
    let folded = match delta {
        0..=7 => delta,
        -8..=-1 => delta + 16,
        8..=127 => delta + 8,
        -128..=-9 => delta + 264,
        _ => {
            let absolute = i64::from(target) + 256;
            if absolute <= i64::from(i32::MAX) {
                absolute
            } else {
                let raw = target.wrapping_sub(index);
                return ((raw as i32) < 8).then_some(raw);
            }
        }
    };
    Some(folded as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prepare::resolve_jump;

    #[test]
    fn test_fold_inverts_resolve() {
        for index in [0u32, 5, 100, 300, 5000] {
            for target in [0u32, 1, 7, 50, 99, 100, 101, 107, 108, 227, 228, 4000, 70_000] {
                let folded = fold_jump(target, index).expect("encodable");
                assert_eq!(resolve_jump(folded, index), target, "{target} from {index}");
            }
        }
    }

    #[test]
    fn test_fold_far_targets() {
        for target in [u32::MAX, 0x8000_0000, 0x7FFF_FF00] {
            if let Some(folded) = fold_jump(target, 10) {
                assert_eq!(resolve_jump(folded, 10), target);
            }
        }
        assert!(fold_jump(u32::MAX, 10).is_some());
    }

    #[test]
    fn test_unbound_label() {
        let mut asm = Assembler::new();
        let nowhere = asm.label();
        asm.jump(Opcode::Jmp, nowhere);
        assert_eq!(asm.assemble(), Err(AsmError::UnboundLabel(0)));
    }

    #[test]
    fn test_label_rebound() {
        let mut asm = Assembler::new();
        let label = asm.label();
        asm.bind(label).emit(Opcode::Ret, &[]).bind(label);
        assert_eq!(asm.assemble(), Err(AsmError::LabelRebound(0)));
    }

    #[test]
    fn test_operand_validation() {
        let mut asm = Assembler::new();
        asm.emit(Opcode::Mov, &[reg(9), imm(1)]);
        assert_eq!(asm.assemble(), Err(AsmError::InvalidRegister(9)));

        let mut asm = Assembler::new();
        asm.emit(Opcode::Add, &[reg(1)]);
        assert!(matches!(
            asm.assemble(),
            Err(AsmError::OperandCount { found: 1, .. })
        ));

        let mut asm = Assembler::new();
        asm.emit_byte(Opcode::Movzx, &[reg(1), reg(2)]);
        assert_eq!(asm.assemble(), Err(AsmError::NoByteMode(Opcode::Movzx)));

        let mut asm = Assembler::new();
        asm.emit_byte(Opcode::Mov, &[reg(1), imm(0x100)]);
        assert_eq!(asm.assemble(), Err(AsmError::ByteImmediate(0x100)));

        let mut asm = Assembler::new();
        asm.emit(Opcode::AddD, &[reg(1), reg(2)]);
        assert_eq!(asm.assemble(), Err(AsmError::NotEncodable(Opcode::AddD)));

        let mut asm = Assembler::new();
        let label = asm.label();
        asm.bind(label).emit(Opcode::Mov, &[reg(1), Arg::Label(label)]);
        assert_eq!(asm.assemble(), Err(AsmError::MisplacedLabel(Opcode::Mov)));
    }

    #[test]
    fn test_checksum_byte() {
        let mut asm = Assembler::new();
        asm.emit(Opcode::Mov, &[reg(0), imm(0x1234_5678)])
            .emit(Opcode::Ret, &[]);
        let blob = asm.assemble().expect("valid program");
        let xor = blob[1..].iter().fold(0u8, |acc, byte| acc ^ byte);
        assert_eq!(blob[0], xor);
    }
}
