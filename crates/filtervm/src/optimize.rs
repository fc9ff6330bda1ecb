//! Peephole optimizer.
//!
//! A pure pass over a prepared program:
//!
//! - `MOV` and `CMP` become their fixed-width variants.
//! - `ADD`, `SUB`, `INC`, `DEC` and `NEG` become fixed-width variants that skip
//!   flag computation when their flags are dead: scanning forward, another
//!   flag-writing command comes before any jump, call, return or flag reader.
//!
//! Jumps end the scan, so a command whose flags could be observed on any
//! path is never rewritten.

use tracing::trace;

use crate::opcode::Opcode;
use crate::program::{Command, Program};

/// Returns an optimized copy of `program`.
pub fn optimize(program: &Program) -> Program {
    let commands = program.commands();
    let optimized = commands
        .iter()
        .enumerate()
        .map(|(index, command)| specialize(index, command, &commands[index + 1..]))
        .collect();
    program.with_commands(optimized)
}

/// Whether any command in `rest` may observe the current flags.
fn flags_needed(rest: &[Command]) -> bool {
    for next in rest {
        let meta = next.opcode.metadata();
        if next.opcode.is_control_flow() || meta.reads_flags {
            return true;
        }
        if meta.writes_flags {
            return false;
        }
    }
    false
}

fn specialize(index: usize, command: &Command, rest: &[Command]) -> Command {
    use Opcode::*;

    let width = |byte, dword| if command.byte_mode { byte } else { dword };
    let opcode = match command.opcode {
        Mov => width(MovB, MovD),
        Cmp => width(CmpB, CmpD),
        Add | Sub | Inc | Dec | Neg if !flags_needed(rest) => match command.opcode {
            Add => width(AddB, AddD),
            Sub => width(SubB, SubD),
            Inc => width(IncB, IncD),
            Dec => width(DecB, DecD),
            _ => width(NegB, NegD),
        },
        other => return Command { opcode: other, ..*command },
    };

    trace!(index, from = %command.opcode, to = %opcode, "specialized");
    Command {
        opcode,
        byte_mode: false,
        ..*command
    }
}
