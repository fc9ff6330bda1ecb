//! filtervm - Sandboxed bytecode VM for archive filter programs
//!
//! Archive compressors transform data before entropy coding (address
//! relocation, delta coding, colour decorrelation, case folding) and ship the
//! inverse transform as a small bytecode program inside the archive. This
//! crate prepares those programs, runs them over a flat masked memory arena
//! under a fixed instruction budget, and recognizes the well-known programs
//! so they can run as native code instead.
//!
//! # Architecture
//!
//! - [`memory`] - Fixed-size arena; every access is masked into range
//! - [`control`] - Typed view of the control block at the start of the global region
//! - [`bits`] - MSB-first bit reader/writer used by the decoder and assembler
//! - [`opcode`] / [`operand`] / [`program`] - Instruction set and prepared programs
//! - [`prepare`] - Bytecode decoder, checksum check and signature matching
//! - [`optimize`] - Peephole pass (width specialization, flag elision)
//! - [`executor`] - Fetch/dispatch loop with the execution budget
//! - [`standard`] - Native implementations of the seven standard filters
//! - [`asm`] / [`reference`] - Assembler and reference bytecode for the standard filters
//! - [`vm`] / [`session`] - VM instance and per-filter-slot carry-over state
//!
//! # Execution Model
//!
//! Programs are untrusted. Decoding never fails (a corrupt program degrades to
//! a single `RET`), memory addressing can never escape the arena, and the only
//! reportable failure is running out of the step budget.

pub mod asm;
pub mod bits;
pub mod config;
pub mod control;
pub mod executor;
pub mod memory;
pub mod opcode;
pub mod operand;
pub mod optimize;
pub mod prepare;
pub mod program;
pub mod reference;
pub mod session;
pub mod standard;
pub mod vm;

pub use asm::{Arg, AsmError, Assembler, Label};
pub use config::{ConfigError, VmConfig};
pub use control::{ControlBlock, ControlBlockImage, ControlBlockMut};
pub use executor::{Completion, ExecutionError};
pub use memory::{Arena, ARENA_MASK, ARENA_SIZE, FIXED_GLOBAL_SIZE, GLOBAL_ADDR, GLOBAL_SIZE};
pub use opcode::{Opcode, OpcodeMetadata};
pub use operand::{Operand, Registers, REGISTER_COUNT, STACK_POINTER};
pub use optimize::optimize;
pub use prepare::{prepare, prepare_with, PrepareOptions};
pub use program::{Command, Program, ProgramOrigin};
pub use session::{FilterBlock, FilterSlot};
pub use standard::StandardFilter;
pub use vm::{ExecutionReport, Invocation, OutputView, Vm};
