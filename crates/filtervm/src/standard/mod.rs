//! Standard filters.
//!
//! Compressors emit the same handful of filter programs over and over. Those
//! programs are recognized by length and CRC-32 when a blob is prepared and
//! replaced by a single [`Opcode::Standard`](crate::opcode::Opcode::Standard)
//! command that runs a native implementation.
//!
//! Each native implementation is a [`NativeFilter`] strategy. The interpreter
//! stays the reference: [`crate::reference`] carries bytecode for every filter
//! here, and the two are property-tested against each other.

mod audio;
mod delta;
mod itanium;
mod rgb;
mod upcase;
mod x86;

use std::fmt;
use std::str::FromStr;

use tracing::trace;

use crate::memory::Arena;
use crate::operand::Registers;

pub use audio::{Audio, AudioPredictor, COEFFICIENT_MAX, COEFFICIENT_MIN};
pub use delta::{encode as encode_delta, Delta};
pub use itanium::Itanium;
pub use rgb::Rgb;
pub use upcase::Upcase;
pub use x86::{encode as encode_x86, X86};

/// Register holding the block length.
pub(crate) const REG_SIZE: usize = 4;
/// Register holding the low 32 bits of the file offset.
pub(crate) const REG_FILE_OFFSET: usize = 6;

/// Identifier of a well-known filter program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFilter {
    /// x86 CALL (`E8`) address relocation.
    E8,
    /// x86 CALL and JMP (`E8`/`E9`) address relocation.
    E8E9,
    /// IA-64 branch bundle relocation.
    Itanium,
    /// Interleaved byte-channel delta coding.
    Delta,
    /// 24-bit image predictor with green decorrelation.
    Rgb,
    /// Adaptive audio sample predictor.
    Audio,
    /// Escaped upper-case reconstruction for text.
    Upcase,
}

impl StandardFilter {
    pub const ALL: [StandardFilter; 7] = [
        StandardFilter::E8,
        StandardFilter::E8E9,
        StandardFilter::Itanium,
        StandardFilter::Delta,
        StandardFilter::Rgb,
        StandardFilter::Audio,
        StandardFilter::Upcase,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StandardFilter::E8 => "E8",
            StandardFilter::E8E9 => "E8E9",
            StandardFilter::Itanium => "ITANIUM",
            StandardFilter::Delta => "DELTA",
            StandardFilter::Rgb => "RGB",
            StandardFilter::Audio => "AUDIO",
            StandardFilter::Upcase => "UPCASE",
        }
    }

    /// Native implementation of this filter.
    pub fn native(self) -> &'static dyn NativeFilter {
        match self {
            StandardFilter::E8 => &X86 { e9: false },
            StandardFilter::E8E9 => &X86 { e9: true },
            StandardFilter::Itanium => &Itanium,
            StandardFilter::Delta => &Delta,
            StandardFilter::Rgb => &Rgb,
            StandardFilter::Audio => &Audio,
            StandardFilter::Upcase => &Upcase,
        }
    }

    /// Runs the native implementation over the arena.
    pub fn apply(self, arena: &mut Arena, registers: &Registers) {
        trace!(
            filter = %self,
            size = registers[REG_SIZE],
            "running native filter"
        );
        self.native().apply(arena, registers);
    }
}

impl fmt::Display for StandardFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown filter name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown standard filter '{0}'")]
pub struct UnknownFilter(pub String);

impl FromStr for StandardFilter {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StandardFilter::ALL
            .into_iter()
            .find(|filter| filter.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownFilter(s.to_string()))
    }
}

/// Native implementation of a standard filter.
///
/// Implementations read their parameters from the registers the program
/// would see on entry and must leave the arena exactly as the interpreted
/// program would.
pub trait NativeFilter: Sync {
    fn apply(&self, arena: &mut Arena, registers: &Registers);
}

struct Signature {
    length: usize,
    crc: u32,
    filter: StandardFilter,
}

const SIGNATURES: [Signature; 7] = [
    Signature {
        length: 53,
        crc: 0xAD57_6887,
        filter: StandardFilter::E8,
    },
    Signature {
        length: 57,
        crc: 0x3CD7_E57E,
        filter: StandardFilter::E8E9,
    },
    Signature {
        length: 120,
        crc: 0x3769_893F,
        filter: StandardFilter::Itanium,
    },
    Signature {
        length: 29,
        crc: 0x0E06_077D,
        filter: StandardFilter::Delta,
    },
    Signature {
        length: 149,
        crc: 0x1C2C_5DC8,
        filter: StandardFilter::Rgb,
    },
    Signature {
        length: 216,
        crc: 0xBC85_E701,
        filter: StandardFilter::Audio,
    },
    Signature {
        length: 40,
        crc: 0x46B9_C560,
        filter: StandardFilter::Upcase,
    },
];

/// Matches a bytecode blob against the known standard filter programs.
pub fn recognize(code: &[u8]) -> Option<StandardFilter> {
    if !SIGNATURES.iter().any(|sig| sig.length == code.len()) {
        return None;
    }
    let crc = crc32fast::hash(code);
    SIGNATURES
        .iter()
        .find(|sig| sig.length == code.len() && sig.crc == crc)
        .map(|sig| sig.filter)
}

/// The `(length, crc)` signature of `filter`.
pub fn signature(filter: StandardFilter) -> (usize, u32) {
    SIGNATURES
        .iter()
        .find(|sig| sig.filter == filter)
        .map_or((0, 0), |sig| (sig.length, sig.crc))
}
