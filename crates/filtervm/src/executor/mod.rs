//! Fetch/dispatch loop.
//!
//! The executor interprets a prepared [`Program`] against an [`Arena`] and a
//! register file. Every operand is resolved to a [`Location`] first; memory
//! locations are masked into the arena at resolution time, so no instruction
//! can address memory outside it.
//!
//! # Termination
//!
//! A run ends successfully when:
//! - `RET` executes with an empty call stack (`R[7]` at or above the arena top)
//! - a jump, call or return targets a command index past the program end
//! - execution falls off the end of the command list
//!
//! The only failure is exhausting the step budget, which bounds every run
//! regardless of program content.

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::memory::{Arena, ARENA_SIZE, GLOBAL_ADDR, GLOBAL_SIZE};
use crate::opcode::Opcode;
use crate::operand::{Operand, Registers, STACK_POINTER};
use crate::program::{Command, Program};
use crate::vm::{ExecutionReport, Invocation, OutputView};

/// Default number of commands a single run may execute.
pub const DEFAULT_BUDGET: u64 = 25_000_000;

/// Flag bits.
pub mod flags {
    /// Carry / borrow.
    pub const C: u32 = 0x1;
    /// Zero result.
    pub const Z: u32 = 0x2;
    /// Sign of the result, stored in place.
    pub const S: u32 = 0x8000_0000;
}

/// Errors surfaced by a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The program did not complete within its step budget.
    ///
    /// Filter programs are deterministic, so the block this run was meant
    /// to produce must be treated as unusable rather than retried.
    #[error("program did not complete within {budget} steps")]
    BudgetExhausted { budget: u64 },
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// `RET` with an empty call stack.
    Returned,
    /// Control transferred to a command index outside the program.
    JumpedOut { target: u32 },
    /// Ran past the last command.
    EndOfProgram,
}

/// Result of [`run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub completion: Completion,
    /// Commands executed, including the last one.
    pub steps: u64,
}

/// Resolved storage cell of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Register(usize),
    /// Masked arena address.
    Memory(u32),
    /// Immediate slot `(command index, operand index)` in the run's scratch copy.
    Immediate(usize, usize),
}

/// Arena address a memory operand refers to, or `None` for other operands.
///
/// The result is always inside the arena.
pub fn effective_address(operand: &Operand, registers: &Registers) -> Option<u32> {
    match *operand {
        Operand::Memory { base, disp } => {
            let base = base.map_or(0, |reg| registers[usize::from(reg) & 7]);
            Some(Arena::mask(base.wrapping_add(disp)))
        }
        _ => None,
    }
}

enum Flow {
    Next,
    Jump(u32),
    Return,
}

/// Interpreter state for a single run.
pub struct Machine<'a> {
    arena: &'a mut Arena,
    registers: &'a mut Registers,
    flags: u32,
    immediates: Vec<[u32; 2]>,
}

impl<'a> Machine<'a> {
    /// Creates a machine with cleared flags and a fresh copy of the
    /// program's immediates.
    pub fn new(arena: &'a mut Arena, registers: &'a mut Registers, program: &Program) -> Self {
        let immediates = program
            .commands()
            .iter()
            .map(|command| [command.op1.immediate(), command.op2.immediate()])
            .collect();
        Self {
            arena,
            registers,
            flags: 0,
            immediates,
        }
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Runs `commands` from index 0 until completion or until `budget`
    /// commands have executed.
    pub fn run(&mut self, commands: &[Command], budget: u64) -> Result<RunOutcome, ExecutionError> {
        let mut ip = 0usize;
        let mut steps = 0u64;
        loop {
            let Some(command) = commands.get(ip) else {
                return Ok(RunOutcome {
                    completion: Completion::EndOfProgram,
                    steps,
                });
            };
            if steps >= budget {
                warn!(budget, ip, "execution budget exhausted");
                return Err(ExecutionError::BudgetExhausted { budget });
            }
            steps += 1;

            match self.step(ip, command) {
                Flow::Next => ip += 1,
                Flow::Jump(target) if target as usize >= commands.len() => {
                    return Ok(RunOutcome {
                        completion: Completion::JumpedOut { target },
                        steps,
                    });
                }
                Flow::Jump(target) => ip = target as usize,
                Flow::Return => {
                    return Ok(RunOutcome {
                        completion: Completion::Returned,
                        steps,
                    });
                }
            }
        }
    }

    fn locate(&self, index: usize, slot: usize, operand: &Operand) -> Location {
        match *operand {
            Operand::Register(reg) => Location::Register(usize::from(reg) & 7),
            Operand::Memory { .. } => match effective_address(operand, self.registers) {
                Some(addr) => Location::Memory(addr),
                None => Location::Immediate(index, slot),
            },
            Operand::Immediate(_) | Operand::None => Location::Immediate(index, slot),
        }
    }

    fn read(&self, location: Location, byte: bool) -> u32 {
        match location {
            Location::Register(reg) => low(self.registers[reg], byte),
            Location::Memory(addr) if byte => u32::from(self.arena.read_u8(addr)),
            Location::Memory(addr) => self.arena.read_u32(addr),
            Location::Immediate(index, slot) => low(self.immediates[index][slot], byte),
        }
    }

    fn write(&mut self, location: Location, byte: bool, value: u32) {
        match location {
            Location::Register(reg) => merge(&mut self.registers[reg], byte, value),
            Location::Memory(addr) if byte => self.arena.write_u8(addr, value as u8),
            Location::Memory(addr) => self.arena.write_u32(addr, value),
            Location::Immediate(index, slot) => {
                merge(&mut self.immediates[index][slot], byte, value)
            }
        }
    }

    fn sp(&self) -> u32 {
        self.registers[STACK_POINTER]
    }

    fn set_sp(&mut self, value: u32) {
        self.registers[STACK_POINTER] = value;
    }

    fn push(&mut self, value: u32) {
        let sp = self.sp().wrapping_sub(4);
        self.set_sp(sp);
        self.arena.write_u32(sp, value);
    }

    fn step(&mut self, index: usize, command: &Command) -> Flow {
        use Opcode::*;

        let byte = command.byte_mode;
        let op1 = self.locate(index, 0, &command.op1);
        let op2 = self.locate(index, 1, &command.op2);

        match command.opcode {
            Mov => self.mov(op1, op2, byte),
            MovB => self.mov(op1, op2, true),
            MovD => self.mov(op1, op2, false),
            Cmp => self.cmp(op1, op2, byte),
            CmpB => self.cmp(op1, op2, true),
            CmpD => self.cmp(op1, op2, false),
            Add => {
                let a = self.read(op1, byte);
                let mut result = a.wrapping_add(self.read(op2, byte));
                if byte {
                    result &= 0xFF;
                    let sign = if result & 0x80 != 0 { flags::S } else { 0 };
                    self.flags = carry(result < a) | if result == 0 { flags::Z } else { sign };
                } else {
                    self.flags = carry(result < a) | zero_sign(result);
                }
                self.write(op1, byte, result);
            }
            AddB => self.arith(op1, op2, true, u32::wrapping_add),
            AddD => self.arith(op1, op2, false, u32::wrapping_add),
            Sub => {
                let a = self.read(op1, byte);
                let result = a.wrapping_sub(self.read(op2, byte));
                self.flags = sub_flags(a, result);
                self.write(op1, byte, result);
            }
            SubB => self.arith(op1, op2, true, u32::wrapping_sub),
            SubD => self.arith(op1, op2, false, u32::wrapping_sub),
            Inc => {
                let mut result = self.read(op1, byte).wrapping_add(1);
                if byte {
                    result &= 0xFF;
                }
                self.write(op1, byte, result);
                self.flags = zero_sign(result);
            }
            IncB => self.unary(op1, true, |v| v.wrapping_add(1)),
            IncD => self.unary(op1, false, |v| v.wrapping_add(1)),
            Dec => {
                let result = self.read(op1, byte).wrapping_sub(1);
                self.write(op1, byte, result);
                self.flags = zero_sign(result);
            }
            DecB => self.unary(op1, true, |v| v.wrapping_sub(1)),
            DecD => self.unary(op1, false, |v| v.wrapping_sub(1)),
            Xor => self.logic(op1, op2, byte, |a, b| a ^ b),
            And => self.logic(op1, op2, byte, |a, b| a & b),
            Or => self.logic(op1, op2, byte, |a, b| a | b),
            Test => {
                let result = self.read(op1, byte) & self.read(op2, byte);
                self.flags = zero_sign(result);
            }
            Jmp => return Flow::Jump(self.read(op1, false)),
            Jz | Jnz | Js | Jns | Jb | Jbe | Ja | Jae => {
                let f = self.flags;
                let taken = match command.opcode {
                    Jz => f & flags::Z != 0,
                    Jnz => f & flags::Z == 0,
                    Js => f & flags::S != 0,
                    Jns => f & flags::S == 0,
                    Jb => f & flags::C != 0,
                    Jbe => f & (flags::C | flags::Z) != 0,
                    Ja => f & (flags::C | flags::Z) == 0,
                    _ => f & flags::C == 0,
                };
                if taken {
                    return Flow::Jump(self.read(op1, false));
                }
            }
            Push => {
                let sp = self.sp().wrapping_sub(4);
                self.set_sp(sp);
                let value = self.read(op1, false);
                self.arena.write_u32(sp, value);
            }
            Pop => {
                let value = self.arena.read_u32(self.sp());
                self.write(op1, false, value);
                self.set_sp(self.sp().wrapping_add(4));
            }
            Call => {
                self.push(index as u32 + 1);
                return Flow::Jump(self.read(op1, false));
            }
            Ret => {
                if self.sp() as usize >= ARENA_SIZE {
                    return Flow::Return;
                }
                let target = self.arena.read_u32(self.sp());
                self.set_sp(self.sp().wrapping_add(4));
                return Flow::Jump(target);
            }
            Not => self.unary(op1, byte, |v| !v),
            Shl => {
                let (a, n) = (self.read(op1, byte), self.read(op2, byte));
                let result = a.wrapping_shl(n);
                let out = a.wrapping_shl(n.wrapping_sub(1)) & flags::S != 0;
                self.flags = zero_sign(result) | carry(out);
                self.write(op1, byte, result);
            }
            Shr | Sar => {
                let (a, n) = (self.read(op1, byte), self.read(op2, byte));
                let result = if command.opcode == Shr {
                    a.wrapping_shr(n)
                } else {
                    (a as i32).wrapping_shr(n) as u32
                };
                let out = a.wrapping_shr(n.wrapping_sub(1)) & 1 != 0;
                self.flags = zero_sign(result) | carry(out);
                self.write(op1, byte, result);
            }
            Neg => {
                let result = self.read(op1, byte).wrapping_neg();
                self.flags = if result == 0 {
                    flags::Z
                } else {
                    flags::C | (result & flags::S)
                };
                self.write(op1, byte, result);
            }
            NegB => self.unary(op1, true, u32::wrapping_neg),
            NegD => self.unary(op1, false, u32::wrapping_neg),
            Pusha => {
                let sp = self.sp();
                for (i, value) in self.registers.iter().enumerate() {
                    let addr = sp.wrapping_sub(4 * (i as u32 + 1));
                    self.arena.write_u32(addr, *value);
                }
                self.set_sp(sp.wrapping_sub(32));
            }
            Popa => {
                let sp = self.sp();
                for i in 0..8u32 {
                    let value = self.arena.read_u32(sp.wrapping_add(4 * i));
                    self.registers[7 - i as usize] = value;
                }
            }
            Pushf => self.push(self.flags),
            Popf => {
                self.flags = self.arena.read_u32(self.sp());
                self.set_sp(self.sp().wrapping_add(4));
            }
            Movzx => {
                let value = self.read(op2, true);
                self.write(op1, false, value);
            }
            Movsx => {
                let value = self.read(op2, true) as u8 as i8 as i32 as u32;
                self.write(op1, false, value);
            }
            Xchg => {
                let a = self.read(op1, byte);
                let b = self.read(op2, byte);
                self.write(op1, byte, b);
                self.write(op2, byte, a);
            }
            Mul => self.arith(op1, op2, byte, u32::wrapping_mul),
            Div => {
                let divisor = self.read(op2, byte);
                if divisor != 0 {
                    let quotient = self.read(op1, byte) / divisor;
                    self.write(op1, byte, quotient);
                }
            }
            Adc => {
                let a = self.read(op1, byte);
                let carry_in = self.flags & flags::C;
                let mut result = a.wrapping_add(self.read(op2, byte)).wrapping_add(carry_in);
                if byte {
                    result &= 0xFF;
                }
                let out = result < a || (result == a && carry_in != 0);
                self.flags = carry(out) | zero_sign(result);
                self.write(op1, byte, result);
            }
            Sbb => {
                let a = self.read(op1, byte);
                let carry_in = self.flags & flags::C;
                let result = a.wrapping_sub(self.read(op2, byte)).wrapping_sub(carry_in);
                let out = result > a || (result == a && carry_in != 0);
                self.flags = carry(out) | zero_sign(result);
                self.write(op1, byte, result);
            }
            Print => {}
            Standard(filter) => filter.apply(self.arena, self.registers),
        }
        Flow::Next
    }

    fn mov(&mut self, dst: Location, src: Location, byte: bool) {
        let value = self.read(src, byte);
        self.write(dst, byte, value);
    }

    fn cmp(&mut self, a: Location, b: Location, byte: bool) {
        let value = self.read(a, byte);
        let result = value.wrapping_sub(self.read(b, byte));
        self.flags = sub_flags(value, result);
    }

    /// Binary operation that leaves the flags alone.
    fn arith(&mut self, dst: Location, src: Location, byte: bool, op: fn(u32, u32) -> u32) {
        let result = op(self.read(dst, byte), self.read(src, byte));
        self.write(dst, byte, result);
    }

    fn unary(&mut self, dst: Location, byte: bool, op: fn(u32) -> u32) {
        let result = op(self.read(dst, byte));
        self.write(dst, byte, result);
    }

    fn logic(&mut self, dst: Location, src: Location, byte: bool, op: fn(u32, u32) -> u32) {
        let result = op(self.read(dst, byte), self.read(src, byte));
        self.flags = zero_sign(result);
        self.write(dst, byte, result);
    }
}

fn low(value: u32, byte: bool) -> u32 {
    if byte {
        value & 0xFF
    } else {
        value
    }
}

/// Stores `value` into a register-like cell; byte writes keep the upper bits.
fn merge(cell: &mut u32, byte: bool, value: u32) {
    *cell = if byte {
        (*cell & !0xFF) | (value & 0xFF)
    } else {
        value
    };
}

fn carry(set: bool) -> u32 {
    if set {
        flags::C
    } else {
        0
    }
}

fn zero_sign(result: u32) -> u32 {
    if result == 0 {
        flags::Z
    } else {
        result & flags::S
    }
}

fn sub_flags(a: u32, result: u32) -> u32 {
    if result == 0 {
        flags::Z
    } else {
        carry(result > a) | (result & flags::S)
    }
}

/// Runs `program` from its first command with cleared flags.
pub fn run(
    program: &Program,
    arena: &mut Arena,
    registers: &mut Registers,
    budget: u64,
) -> Result<RunOutcome, ExecutionError> {
    Machine::new(arena, registers, program).run(program.commands(), budget)
}

/// Full invocation: loads the control block and static data, runs the
/// program and reads back the output view and carry-over data.
///
/// On budget exhaustion nothing is read back; the error is returned as is.
#[instrument(skip_all, name = "execute", fields(commands = program.len(), origin = ?program.origin()))]
pub fn execute(
    program: &Program,
    arena: &mut Arena,
    registers: &mut Registers,
    invocation: &Invocation,
    budget: u64,
) -> Result<ExecutionReport, ExecutionError> {
    registers[..7].copy_from_slice(&invocation.registers);

    let global = &invocation.global_data[..invocation.global_data.len().min(GLOBAL_SIZE)];
    arena.load(GLOBAL_ADDR, global);
    let statics = program.static_data();
    let statics = &statics[..statics.len().min(GLOBAL_SIZE - global.len())];
    arena.load(GLOBAL_ADDR + global.len() as u32, statics);

    registers[STACK_POINTER] = ARENA_SIZE as u32;

    let outcome = run(program, arena, registers, budget)?;

    let control = arena.control();
    let (offset, len) = control.output_view();
    let global_data = control.carry_over();
    debug!(
        completion = ?outcome.completion,
        steps = outcome.steps,
        offset,
        len,
        carried = global_data.len(),
        "program completed"
    );
    Ok(ExecutionReport {
        completion: outcome.completion,
        steps: outcome.steps,
        output: OutputView { offset, len },
        global_data,
    })
}
