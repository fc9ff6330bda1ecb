//! Shared helpers for the integration tests.

#![allow(dead_code)]

use filtervm::memory::{GLOBAL_ADDR, GLOBAL_SIZE};
use filtervm::{reference, FilterBlock, FilterSlot, PrepareOptions, Program, StandardFilter, Vm};

/// Arena bytes compared between runs: everything below the scratch page and
/// the stack.
pub const COMPARED: usize = GLOBAL_ADDR as usize + GLOBAL_SIZE;

/// Everything observable after a filter run.
#[derive(Debug, PartialEq, Eq)]
pub struct Outcome {
    pub output: Vec<u8>,
    pub arena: Vec<u8>,
    pub carried: Vec<u8>,
}

/// Runs `program` over `block` on a fresh VM.
pub fn apply(program: Program, block: &FilterBlock) -> Outcome {
    let mut vm = Vm::new();
    let mut slot = FilterSlot::new(program);
    let output = vm
        .apply_filter(&mut slot, block)
        .expect("filter completes within budget");
    Outcome {
        output,
        arena: vm.arena().slice(0, COMPARED).to_vec(),
        carried: slot.carried().to_vec(),
    }
}

/// The interpreted reference program for `filter`.
pub fn interpreted(filter: StandardFilter, optimize: bool) -> Program {
    let code = reference::bytecode(filter).expect("reference program assembles");
    let options = PrepareOptions {
        recognize_standard: false,
        optimize,
    };
    filtervm::prepare_with(&code, &options)
}

fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    for (n, entry) in table.iter_mut().enumerate() {
        let mut c = n as u32;
        for _ in 0..8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
        }
        *entry = c;
    }
    table
}

/// Builds a blob of `len` bytes with a valid checksum byte and the given
/// CRC-32, by patching its last four bytes.
pub fn forge(len: usize, crc: u32) -> Vec<u8> {
    assert!(len > 5);
    let table = crc_table();
    let mut inverse = [0u8; 256];
    for (i, entry) in table.iter().enumerate() {
        inverse[(entry >> 24) as usize] = i as u8;
    }

    // Register value before the patch that yields `crc` after it.
    let mut wanted = crc ^ 0xFFFF_FFFF;
    for _ in 0..4 {
        let index = inverse[(wanted >> 24) as usize];
        wanted = ((wanted ^ table[usize::from(index)]) << 8) | u32::from(index);
    }

    for first in 0..=255u8 {
        for filler in 0..=255u8 {
            let mut blob = vec![filler; len];
            blob[0] = first;
            let state = blob[..len - 4].iter().fold(0xFFFF_FFFFu32, |reg, &byte| {
                (reg >> 8) ^ table[((reg ^ u32::from(byte)) & 0xFF) as usize]
            });
            blob[len - 4..].copy_from_slice(&(wanted ^ state).to_le_bytes());
            if blob[0] == blob[1..].iter().fold(0, |acc, byte| acc ^ byte) {
                return blob;
            }
        }
    }
    panic!("no blob of {len} bytes matches crc {crc:#010x}");
}
