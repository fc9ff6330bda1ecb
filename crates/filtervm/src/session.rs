//! Filter slots.
//!
//! An archive stream refers to each filter program by slot and runs it over
//! many blocks. A [`FilterSlot`] keeps what has to survive between those runs:
//! the prepared program, how often it has run and the user data it asked to
//! keep. [`Vm::apply_filter`] builds each invocation the way an extraction
//! pipeline does and updates the slot afterwards.

use tracing::{debug, warn};

use crate::control::ControlBlockImage;
use crate::executor::ExecutionError;
use crate::memory::{FIXED_GLOBAL_SIZE, GLOBAL_ADDR};
use crate::program::{Program, ProgramOrigin};
use crate::vm::{Invocation, Vm};

/// A block of data to filter, plus the per-block parameters of the filter
/// record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterBlock {
    pub data: Vec<u8>,
    /// Position of the block in the unpacked stream.
    pub file_offset: u64,
    /// Registers set explicitly by the filter record.
    pub registers: [Option<u32>; 7],
    /// Fresh user data; replaces anything carried over.
    pub user_data: Option<Vec<u8>>,
}

impl FilterBlock {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn at_offset(mut self, file_offset: u64) -> Self {
        self.file_offset = file_offset;
        self
    }

    /// Sets `R[index]` for this block; indices past 6 are ignored.
    pub fn with_register(mut self, index: usize, value: u32) -> Self {
        if let Some(slot) = self.registers.get_mut(index) {
            *slot = Some(value);
        }
        self
    }

    pub fn with_user_data(mut self, user_data: Vec<u8>) -> Self {
        self.user_data = Some(user_data);
        self
    }
}

/// Per-filter state kept across blocks.
#[derive(Debug, Clone)]
pub struct FilterSlot {
    program: Program,
    exec_count: u32,
    carried: Vec<u8>,
}

impl FilterSlot {
    pub fn new(program: Program) -> Self {
        Self {
            program,
            exec_count: 0,
            carried: Vec::new(),
        }
    }

    /// Resumes a slot that has already run `exec_count` times.
    pub fn with_exec_count(mut self, exec_count: u32) -> Self {
        self.exec_count = exec_count;
        self
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Successful runs so far.
    pub fn exec_count(&self) -> u32 {
        self.exec_count
    }

    /// User data kept by the last run.
    pub fn carried(&self) -> &[u8] {
        &self.carried
    }

    /// Builds the invocation for a block of `block_len` bytes.
    pub fn invocation(&self, block: &FilterBlock, block_len: u32) -> Invocation {
        let mut registers = [0u32; 7];
        registers[3] = GLOBAL_ADDR;
        registers[4] = block_len;
        registers[5] = self.exec_count;
        for (register, value) in registers.iter_mut().zip(block.registers) {
            if let Some(value) = value {
                *register = value;
            }
        }
        registers[6] = block.file_offset as u32;

        let image = ControlBlockImage {
            init_registers: registers,
            block_size: block_len,
            block_pos: 0,
            file_offset: block.file_offset,
            exec_count: self.exec_count,
            user_data: block
                .user_data
                .clone()
                .unwrap_or_else(|| self.carried.clone()),
        };
        Invocation::new(registers).with_global_data(image.to_bytes())
    }
}

impl Vm {
    /// Runs `slot`'s program over `block` and returns the filtered bytes.
    ///
    /// On budget exhaustion the slot's program is replaced by a trivial one,
    /// so later blocks pass through unchanged, and the error is returned.
    pub fn apply_filter(
        &mut self,
        slot: &mut FilterSlot,
        block: &FilterBlock,
    ) -> Result<Vec<u8>, ExecutionError> {
        let block_len = self.load(0, &block.data) as u32;
        let invocation = slot.invocation(block, block_len);

        match self.execute(&slot.program, &invocation) {
            Ok(report) => {
                let output = self.output(report.output).to_vec();
                slot.carried = report
                    .global_data
                    .get(FIXED_GLOBAL_SIZE..)
                    .map(<[u8]>::to_vec)
                    .unwrap_or_default();
                slot.exec_count = slot.exec_count.wrapping_add(1);
                debug!(
                    exec_count = slot.exec_count,
                    output = output.len(),
                    carried = slot.carried.len(),
                    "filter applied"
                );
                Ok(output)
            }
            Err(err) => {
                warn!(%err, "filter disabled for the rest of the stream");
                slot.program = Program::trivial(ProgramOrigin::Empty);
                Err(err)
            }
        }
    }
}
