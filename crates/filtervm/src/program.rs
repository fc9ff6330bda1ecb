//! Prepared programs.
//!
//! A [`Program`] is the validated, resolved form of a bytecode blob: a command
//! list ending in `RET`, the static data block shipped with the code, and a
//! record of how the program came to be. Programs are immutable once
//! prepared; the executor only ever borrows them.

use std::fmt;

use crate::opcode::Opcode;
use crate::operand::Operand;
use crate::standard::StandardFilter;

/// A single prepared instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub opcode: Opcode,
    /// Operate on the low byte of each operand instead of the full word.
    pub byte_mode: bool,
    pub op1: Operand,
    pub op2: Operand,
}

impl Command {
    pub fn new(opcode: Opcode, byte_mode: bool, op1: Operand, op2: Operand) -> Self {
        Self {
            opcode,
            byte_mode,
            op1,
            op2,
        }
    }

    /// Command without operands.
    pub fn bare(opcode: Opcode) -> Self {
        Self::new(opcode, false, Operand::None, Operand::None)
    }

    pub fn ret() -> Self {
        Self::bare(Opcode::Ret)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        if self.byte_mode {
            f.write_str(".b")?;
        }
        match (self.op1.is_none(), self.op2.is_none()) {
            (true, _) => Ok(()),
            (false, true) => write!(f, " {}", self.op1),
            (false, false) => write!(f, " {}, {}", self.op1, self.op2),
        }
    }
}

/// How a program was produced by the preparer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramOrigin {
    /// Decoded from bytecode.
    Decoded,
    /// Recognized as a standard filter; runs natively.
    Standard(StandardFilter),
    /// Checksum did not match; replaced by a lone `RET`.
    ChecksumMismatch,
    /// Empty blob (or a program replaced after a failed run); a lone `RET`.
    Empty,
}

/// A prepared, immutable filter program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    commands: Vec<Command>,
    static_data: Vec<u8>,
    origin: ProgramOrigin,
}

impl Program {
    /// Builds a program from already-resolved parts.
    ///
    /// No trailing `RET` is added; a command list without one completes by
    /// running off its end.
    pub fn new(commands: Vec<Command>, static_data: Vec<u8>, origin: ProgramOrigin) -> Self {
        Self {
            commands,
            static_data,
            origin,
        }
    }

    /// A program that does nothing.
    pub fn trivial(origin: ProgramOrigin) -> Self {
        Self::new(vec![Command::ret()], Vec::new(), origin)
    }

    /// The native fast path for `filter`.
    pub fn standard(filter: StandardFilter) -> Self {
        Self::new(
            vec![Command::bare(Opcode::Standard(filter)), Command::ret()],
            Vec::new(),
            ProgramOrigin::Standard(filter),
        )
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn static_data(&self) -> &[u8] {
        &self.static_data
    }

    pub fn origin(&self) -> ProgramOrigin {
        self.origin
    }

    /// The recognized standard filter, if any.
    pub fn standard_filter(&self) -> Option<StandardFilter> {
        match self.origin {
            ProgramOrigin::Standard(filter) => Some(filter),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Returns a copy of this program with a different command list.
    pub fn with_commands(&self, commands: Vec<Command>) -> Self {
        Self {
            commands,
            static_data: self.static_data.clone(),
            origin: self.origin,
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            ProgramOrigin::Decoded => {}
            ProgramOrigin::Standard(filter) => writeln!(f, "; standard filter {filter}")?,
            ProgramOrigin::ChecksumMismatch => writeln!(f, "; checksum mismatch")?,
            ProgramOrigin::Empty => writeln!(f, "; empty program")?,
        }
        if !self.static_data.is_empty() {
            writeln!(f, "; {} bytes of static data", self.static_data.len())?;
        }
        for (index, command) in self.commands.iter().enumerate() {
            writeln!(f, "{index:4}: {command}")?;
        }
        Ok(())
    }
}
