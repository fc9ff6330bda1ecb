//! Instruction set of the filter VM.
//!
//! Opcodes fall into three groups:
//!
//! - **Wire opcodes** - the 40 instructions that can appear in bytecode,
//!   numbered by their wire code (see [`Opcode::from_code`])
//! - **Specialized opcodes** - fixed-width variants produced by the optimizer
//!   (`MovB`, `AddD`, ...); the `Add`/`Sub`/`Inc`/`Dec`/`Neg` variants skip flag
//!   computation, `CmpB`/`CmpD` still set flags
//! - **Standard** - pseudo-instruction running a native standard filter
//!
//! Decoding, optimization and disassembly are driven by [`OpcodeMetadata`];
//! only the executor matches on individual opcodes.

use std::fmt;

use crate::standard::StandardFilter;

/// VM instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Mov,
    Cmp,
    Add,
    Sub,
    Jz,
    Jnz,
    Inc,
    Dec,
    Jmp,
    Xor,
    And,
    Or,
    Test,
    Js,
    Jns,
    Jb,
    Jbe,
    Ja,
    Jae,
    Push,
    Pop,
    Call,
    Ret,
    Not,
    Shl,
    Shr,
    Sar,
    Neg,
    Pusha,
    Popa,
    Pushf,
    Popf,
    Movzx,
    Movsx,
    Xchg,
    Mul,
    Div,
    Adc,
    Sbb,
    /// Debug print; executes as a no-op.
    Print,

    // === Optimizer output ===
    MovB,
    MovD,
    CmpB,
    CmpD,
    AddB,
    AddD,
    SubB,
    SubD,
    IncB,
    IncD,
    DecB,
    DecD,
    NegB,
    NegD,

    /// Runs the named standard filter natively.
    Standard(StandardFilter),
}

/// Static properties of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeMetadata {
    /// Number of operands (0, 1 or 2).
    pub operands: u8,
    /// Whether the wire encoding carries a byte-mode bit.
    pub byte_mode: bool,
    /// Unconditional or conditional jump.
    pub jump: bool,
    /// CALL or RET.
    pub procedure: bool,
    /// Reads the flags register.
    pub reads_flags: bool,
    /// Overwrites the flags register.
    pub writes_flags: bool,
}

impl OpcodeMetadata {
    const fn new(operands: u8) -> Self {
        Self {
            operands,
            byte_mode: false,
            jump: false,
            procedure: false,
            reads_flags: false,
            writes_flags: false,
        }
    }

    const fn byte_mode(mut self) -> Self {
        self.byte_mode = true;
        self
    }

    const fn jump(mut self) -> Self {
        self.jump = true;
        self
    }

    const fn procedure(mut self) -> Self {
        self.procedure = true;
        self
    }

    const fn reads_flags(mut self) -> Self {
        self.reads_flags = true;
        self
    }

    const fn writes_flags(mut self) -> Self {
        self.writes_flags = true;
        self
    }
}

/// Opcodes in wire-code order.
const WIRE_OPCODES: [Opcode; 40] = [
    Opcode::Mov,
    Opcode::Cmp,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Jz,
    Opcode::Jnz,
    Opcode::Inc,
    Opcode::Dec,
    Opcode::Jmp,
    Opcode::Xor,
    Opcode::And,
    Opcode::Or,
    Opcode::Test,
    Opcode::Js,
    Opcode::Jns,
    Opcode::Jb,
    Opcode::Jbe,
    Opcode::Ja,
    Opcode::Jae,
    Opcode::Push,
    Opcode::Pop,
    Opcode::Call,
    Opcode::Ret,
    Opcode::Not,
    Opcode::Shl,
    Opcode::Shr,
    Opcode::Sar,
    Opcode::Neg,
    Opcode::Pusha,
    Opcode::Popa,
    Opcode::Pushf,
    Opcode::Popf,
    Opcode::Movzx,
    Opcode::Movsx,
    Opcode::Xchg,
    Opcode::Mul,
    Opcode::Div,
    Opcode::Adc,
    Opcode::Sbb,
    Opcode::Print,
];

impl Opcode {
    /// Maps a wire code to its opcode.
    pub fn from_code(code: u32) -> Option<Opcode> {
        WIRE_OPCODES.get(code as usize).copied()
    }

    /// Wire code, or `None` for opcodes that never appear in bytecode.
    pub fn code(self) -> Option<u32> {
        WIRE_OPCODES
            .iter()
            .position(|op| *op == self)
            .map(|index| index as u32)
    }

    /// Static properties of this opcode.
    pub const fn metadata(self) -> OpcodeMetadata {
        use Opcode::*;
        let op0 = OpcodeMetadata::new(0);
        let op1 = OpcodeMetadata::new(1);
        let op2 = OpcodeMetadata::new(2);
        match self {
            Mov => op2.byte_mode(),
            Cmp | Add | Sub | Xor | And | Or | Test | Shl | Shr | Sar => {
                op2.byte_mode().writes_flags()
            }
            Inc | Dec | Neg => op1.byte_mode().writes_flags(),
            Jmp => op1.jump(),
            Jz | Jnz | Js | Jns | Jb | Jbe | Ja | Jae => op1.jump().reads_flags(),
            Push | Pop => op1,
            Call => op1.procedure(),
            Ret => op0.procedure(),
            Not => op1.byte_mode(),
            Pusha | Popa | Print => op0,
            Pushf => op0.reads_flags(),
            Popf => op0.writes_flags(),
            Movzx | Movsx => op2,
            Xchg | Mul | Div => op2.byte_mode(),
            Adc | Sbb => op2.byte_mode().reads_flags().writes_flags(),
            MovB | MovD | AddB | AddD | SubB | SubD => op2,
            CmpB | CmpD => op2.writes_flags(),
            IncB | IncD | DecB | DecD | NegB | NegD => op1,
            Standard(_) => op0,
        }
    }

    /// Number of operands.
    pub const fn operand_count(self) -> u8 {
        self.metadata().operands
    }

    /// Whether the instruction transfers control (jump, call or return).
    pub const fn is_control_flow(self) -> bool {
        let meta = self.metadata();
        meta.jump || meta.procedure
    }

    /// Mnemonic used by the disassembler and the assembler.
    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Mov => "mov",
            Cmp => "cmp",
            Add => "add",
            Sub => "sub",
            Jz => "jz",
            Jnz => "jnz",
            Inc => "inc",
            Dec => "dec",
            Jmp => "jmp",
            Xor => "xor",
            And => "and",
            Or => "or",
            Test => "test",
            Js => "js",
            Jns => "jns",
            Jb => "jb",
            Jbe => "jbe",
            Ja => "ja",
            Jae => "jae",
            Push => "push",
            Pop => "pop",
            Call => "call",
            Ret => "ret",
            Not => "not",
            Shl => "shl",
            Shr => "shr",
            Sar => "sar",
            Neg => "neg",
            Pusha => "pusha",
            Popa => "popa",
            Pushf => "pushf",
            Popf => "popf",
            Movzx => "movzx",
            Movsx => "movsx",
            Xchg => "xchg",
            Mul => "mul",
            Div => "div",
            Adc => "adc",
            Sbb => "sbb",
            Print => "print",
            MovB => "movb",
            MovD => "movd",
            CmpB => "cmpb",
            CmpD => "cmpd",
            AddB => "addb",
            AddD => "addd",
            SubB => "subb",
            SubD => "subd",
            IncB => "incb",
            IncD => "incd",
            DecB => "decb",
            DecD => "decd",
            NegB => "negb",
            NegD => "negd",
            Standard(_) => "standard",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Standard(filter) => write!(f, "standard {filter}"),
            other => f.write_str(other.mnemonic()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes_round_trip() {
        for code in 0..40 {
            let op = Opcode::from_code(code).expect("wire code in range");
            assert_eq!(op.code(), Some(code));
        }
        assert_eq!(Opcode::from_code(40), None);
        assert_eq!(Opcode::AddD.code(), None);
        assert_eq!(Opcode::Standard(StandardFilter::Delta).code(), None);
    }

    #[test]
    fn test_known_codes() {
        assert_eq!(Opcode::from_code(0), Some(Opcode::Mov));
        assert_eq!(Opcode::from_code(8), Some(Opcode::Jmp));
        assert_eq!(Opcode::from_code(22), Some(Opcode::Ret));
        assert_eq!(Opcode::from_code(33), Some(Opcode::Movsx));
        assert_eq!(Opcode::from_code(39), Some(Opcode::Print));
    }

    #[test]
    fn test_flag_metadata() {
        assert!(Opcode::Adc.metadata().reads_flags);
        assert!(Opcode::Adc.metadata().writes_flags);
        assert!(Opcode::Pushf.metadata().reads_flags);
        assert!(Opcode::Popf.metadata().writes_flags);
        assert!(!Opcode::Mul.metadata().writes_flags);
        assert!(Opcode::Mul.metadata().byte_mode);
        assert!(!Opcode::Movzx.metadata().byte_mode);
        assert!(Opcode::CmpD.metadata().writes_flags);
        assert!(!Opcode::AddD.metadata().writes_flags);
    }

    #[test]
    fn test_control_flow_classification() {
        assert!(Opcode::Jmp.is_control_flow());
        assert!(Opcode::Call.is_control_flow());
        assert!(Opcode::Ret.is_control_flow());
        assert!(!Opcode::Push.is_control_flow());
        assert_eq!(Opcode::Ret.operand_count(), 0);
        assert_eq!(Opcode::Call.operand_count(), 1);
        assert_eq!(Opcode::Xchg.operand_count(), 2);
    }
}
