//! Instruction operands and the register file.

use std::fmt;

/// Number of general-purpose registers.
pub const REGISTER_COUNT: usize = 8;

/// Index of the stack pointer register.
pub const STACK_POINTER: usize = 7;

/// The VM register file.
pub type Registers = [u32; REGISTER_COUNT];

/// A decoded instruction operand.
///
/// Memory operands are stored unresolved; the executor adds the base register
/// and masks the sum into the arena on every access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operand {
    /// Absent operand. Resolves to the command's own (zero) immediate slot.
    #[default]
    None,
    /// Register `R[n]`, `n < 8`.
    Register(u8),
    /// Immediate value. Jump and call targets hold the absolute command index.
    Immediate(u32),
    /// Memory at `R[base] + disp`, or at `disp` when there is no base register.
    Memory { base: Option<u8>, disp: u32 },
}

impl Operand {
    /// Immediate value stored in the operand's own slot.
    pub fn immediate(&self) -> u32 {
        match self {
            Operand::Immediate(value) => *value,
            _ => 0,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Operand::None)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Register(reg) => write!(f, "r{reg}"),
            Operand::Immediate(value) => write!(f, "#{value:#x}"),
            Operand::Memory { base: None, disp } => write!(f, "[{disp:#x}]"),
            Operand::Memory {
                base: Some(reg),
                disp: 0,
            } => write!(f, "[r{reg}]"),
            Operand::Memory {
                base: Some(reg),
                disp,
            } => write!(f, "[r{reg}+{disp:#x}]"),
        }
    }
}
