//! Control block at the start of the global region.
//!
//! The caller and the filter program communicate through the first
//! [`FIXED_GLOBAL_SIZE`] bytes of the global region: initial register values
//! and block parameters go in, the output block position and size (and the
//! amount of user data to keep for the next run) come back out. All field
//! access goes through the named accessors below.

use crate::memory::{Arena, ARENA_SIZE, FIXED_GLOBAL_SIZE, GLOBAL_ADDR, GLOBAL_SIZE};

/// Field offsets relative to [`GLOBAL_ADDR`].
pub mod offsets {
    /// Seven little-endian words holding the initial `R[0]..R[6]`.
    pub const INIT_REGISTERS: u32 = 0x00;
    /// Output block size; the input block length on entry.
    pub const BLOCK_SIZE: u32 = 0x1C;
    /// Output block position; zero on entry.
    pub const BLOCK_POS: u32 = 0x20;
    pub const FILE_OFFSET_LOW: u32 = 0x24;
    pub const FILE_OFFSET_HIGH: u32 = 0x28;
    /// Number of earlier runs of the same filter slot.
    pub const EXEC_COUNT: u32 = 0x2C;
    /// Bytes of user data (following the control block) to carry over.
    pub const USER_DATA_SIZE: u32 = 0x30;
    /// First byte of the user data.
    pub const USER_DATA: u32 = 0x40;
}

/// Read-only typed view over the control block.
#[derive(Debug, Clone, Copy)]
pub struct ControlBlock<'a> {
    arena: &'a Arena,
}

impl<'a> ControlBlock<'a> {
    pub fn new(arena: &'a Arena) -> Self {
        Self { arena }
    }

    fn word(&self, offset: u32) -> u32 {
        self.arena.read_u32(GLOBAL_ADDR + offset)
    }

    pub fn block_size(&self) -> u32 {
        self.word(offsets::BLOCK_SIZE)
    }

    pub fn block_pos(&self) -> u32 {
        self.word(offsets::BLOCK_POS)
    }

    pub fn file_offset(&self) -> u64 {
        u64::from(self.word(offsets::FILE_OFFSET_LOW))
            | (u64::from(self.word(offsets::FILE_OFFSET_HIGH)) << 32)
    }

    pub fn exec_count(&self) -> u32 {
        self.word(offsets::EXEC_COUNT)
    }

    pub fn user_data_size(&self) -> u32 {
        self.word(offsets::USER_DATA_SIZE)
    }

    /// Output view left behind by the program, as `(position, length)`.
    ///
    /// Both fields are masked into the arena; if the resulting block would
    /// reach the end of the arena the view collapses to `(0, 0)`.
    pub fn output_view(&self) -> (u32, u32) {
        let pos = Arena::mask(self.block_pos());
        let size = Arena::mask(self.block_size());
        if pos as usize + size as usize >= ARENA_SIZE {
            (0, 0)
        } else {
            (pos, size)
        }
    }

    /// Global data to hand to the next run of the same filter slot.
    ///
    /// Empty unless the program asked for user data to be kept; otherwise the
    /// control block followed by the requested user data bytes.
    pub fn carry_over(&self) -> Vec<u8> {
        let requested = self.user_data_size() as usize;
        let kept = requested.min(GLOBAL_SIZE - FIXED_GLOBAL_SIZE);
        if kept == 0 {
            return Vec::new();
        }
        self.arena
            .slice(GLOBAL_ADDR, FIXED_GLOBAL_SIZE + kept)
            .to_vec()
    }
}

/// Mutable view over the control block, used by the native filters.
#[derive(Debug)]
pub struct ControlBlockMut<'a> {
    arena: &'a mut Arena,
}

impl<'a> ControlBlockMut<'a> {
    pub fn new(arena: &'a mut Arena) -> Self {
        Self { arena }
    }

    pub fn set_block_size(&mut self, size: u32) {
        self.arena.write_u32(GLOBAL_ADDR + offsets::BLOCK_SIZE, size);
    }

    pub fn set_block_pos(&mut self, pos: u32) {
        self.arena.write_u32(GLOBAL_ADDR + offsets::BLOCK_POS, pos);
    }

    pub fn set_user_data_size(&mut self, size: u32) {
        self.arena
            .write_u32(GLOBAL_ADDR + offsets::USER_DATA_SIZE, size);
    }
}

/// Builder for the global data blob placed in the arena before a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlBlockImage {
    pub init_registers: [u32; 7],
    pub block_size: u32,
    pub block_pos: u32,
    pub file_offset: u64,
    pub exec_count: u32,
    /// Persistent user data stored after the fixed fields.
    pub user_data: Vec<u8>,
}

impl ControlBlockImage {
    /// Serializes the control block plus user data.
    ///
    /// The carry-over size field is always written as zero; a program that
    /// wants to keep its user data must set it again on every run.
    pub fn to_bytes(&self) -> Vec<u8> {
        let user_len = self.user_data.len().min(GLOBAL_SIZE - FIXED_GLOBAL_SIZE);
        let mut bytes = vec![0u8; FIXED_GLOBAL_SIZE + user_len];
        let mut put = |offset: u32, value: u32| {
            let at = offset as usize;
            bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
        };
        for (index, value) in self.init_registers.iter().enumerate() {
            put(offsets::INIT_REGISTERS + index as u32 * 4, *value);
        }
        put(offsets::BLOCK_SIZE, self.block_size);
        put(offsets::BLOCK_POS, self.block_pos);
        put(offsets::FILE_OFFSET_LOW, self.file_offset as u32);
        put(offsets::FILE_OFFSET_HIGH, (self.file_offset >> 32) as u32);
        put(offsets::EXEC_COUNT, self.exec_count);
        bytes[FIXED_GLOBAL_SIZE..].copy_from_slice(&self.user_data[..user_len]);
        bytes
    }
}

impl Arena {
    /// Typed view of the control block.
    pub fn control(&self) -> ControlBlock<'_> {
        ControlBlock::new(self)
    }

    /// Mutable typed view of the control block.
    pub fn control_mut(&mut self) -> ControlBlockMut<'_> {
        ControlBlockMut::new(self)
    }
}
