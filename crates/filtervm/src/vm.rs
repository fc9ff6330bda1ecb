//! VM instance.
//!
//! A [`Vm`] owns the arena and register file and is reused across runs. The
//! arena is never cleared between runs: whatever a program leaves outside the
//! control block is still there for the next one.

use crate::config::VmConfig;
use crate::executor::{self, Completion, ExecutionError};
use crate::memory::Arena;
use crate::operand::{Registers, REGISTER_COUNT};
use crate::prepare::prepare_with;
use crate::program::Program;

/// Inputs of a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Initial `R[0]..R[6]`; `R[7]` is always the arena top.
    pub registers: [u32; 7],
    /// Control block image plus user data, placed at the global region.
    pub global_data: Vec<u8>,
}

impl Invocation {
    pub fn new(registers: [u32; 7]) -> Self {
        Self {
            registers,
            global_data: Vec::new(),
        }
    }

    pub fn with_global_data(mut self, global_data: Vec<u8>) -> Self {
        self.global_data = global_data;
        self
    }
}

/// Filtered output location inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputView {
    pub offset: u32,
    pub len: u32,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub completion: Completion,
    /// Commands executed.
    pub steps: u64,
    pub output: OutputView,
    /// Global data to carry into the next run of the same filter; empty
    /// unless the program asked for its user data to be kept.
    pub global_data: Vec<u8>,
}

/// Reusable virtual machine.
#[derive(Debug)]
pub struct Vm {
    arena: Arena,
    registers: Registers,
    config: VmConfig,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self {
            arena: Arena::new(),
            registers: [0; REGISTER_COUNT],
            config,
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Registers as the last run left them.
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Prepares a blob with this VM's settings.
    pub fn prepare(&self, code: &[u8]) -> Program {
        prepare_with(code, &self.config.prepare_options())
    }

    /// Copies `data` into the arena at `offset`; returns the bytes placed.
    pub fn load(&mut self, offset: u32, data: &[u8]) -> usize {
        self.arena.load(offset, data)
    }

    /// Runs `program` with this VM's budget.
    pub fn execute(
        &mut self,
        program: &Program,
        invocation: &Invocation,
    ) -> Result<ExecutionReport, ExecutionError> {
        executor::execute(
            program,
            &mut self.arena,
            &mut self.registers,
            invocation,
            self.config.budget,
        )
    }

    /// Bytes of an output view.
    pub fn output(&self, view: OutputView) -> &[u8] {
        self.arena.slice(view.offset, view.len as usize)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::{addr, imm, reg, Assembler};
    use crate::memory::GLOBAL_ADDR;
    use crate::opcode::Opcode;

    #[test]
    fn test_execute_and_read_output() {
        let mut asm = Assembler::new();
        asm.emit(Opcode::Mov, &[addr(GLOBAL_ADDR + 0x1C), reg(4)])
            .emit(Opcode::Mov, &[addr(GLOBAL_ADDR + 0x20), imm(0)])
            .emit(Opcode::Ret, &[]);
        let code = asm.assemble().unwrap();

        let mut vm = Vm::new();
        let program = vm.prepare(&code);
        vm.load(0, b"hello");
        let report = vm
            .execute(&program, &Invocation::new([0, 0, 0, 0, 5, 0, 0]))
            .unwrap();
        assert_eq!(report.output, OutputView { offset: 0, len: 5 });
        assert_eq!(vm.output(report.output), b"hello");
    }

    #[test]
    fn test_budget_from_config() {
        let mut asm = Assembler::new();
        let top = asm.label();
        asm.bind(top).jump(Opcode::Jmp, top);
        let code = asm.assemble().unwrap();

        let mut vm = Vm::with_config(VmConfig::default().with_budget(100));
        let program = vm.prepare(&code);
        assert_eq!(
            vm.execute(&program, &Invocation::default()),
            Err(ExecutionError::BudgetExhausted { budget: 100 })
        );
    }

    #[test]
    fn test_arena_persists_between_runs() {
        let mut asm = Assembler::new();
        asm.emit(Opcode::Inc, &[addr(0x100)]).emit(Opcode::Ret, &[]);
        let code = asm.assemble().unwrap();

        let mut vm = Vm::new();
        let program = vm.prepare(&code);
        for _ in 0..3 {
            vm.execute(&program, &Invocation::default()).unwrap();
        }
        assert_eq!(vm.arena().read_u32(0x100), 3);
    }
}
