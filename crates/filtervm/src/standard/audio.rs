//! Adaptive audio predictor.
//!
//! Every channel runs a three-tap linear predictor over its previous sample
//! deltas. The tap weights adapt every 32 samples: seven candidate nudges are
//! scored by accumulated absolute error and the best one is applied.

use super::delta::channel_count;
use super::{NativeFilter, REG_SIZE};
use crate::memory::{Arena, GLOBAL_ADDR};
use crate::operand::Registers;

const REG_CHANNELS: usize = 0;

/// Smallest value a predictor coefficient can reach.
pub const COEFFICIENT_MIN: i32 = -17;
/// Largest value a predictor coefficient can reach.
pub const COEFFICIENT_MAX: i32 = 16;

/// Samples between coefficient updates.
const ADAPT_PERIOD_MASK: u32 = 0x1F;

#[derive(Debug, Clone, Copy)]
pub struct Audio;

/// Per-channel predictor state.
#[derive(Debug, Clone, Default)]
pub struct AudioPredictor {
    k: [i32; 3],
    d: [i32; 3],
    prev_byte: u32,
    prev_delta: u32,
    dif: [u32; 7],
    count: u32,
}

impl AudioPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tap weights.
    pub fn coefficients(&self) -> [i32; 3] {
        self.k
    }

    /// Number of samples decoded so far.
    pub fn samples(&self) -> u32 {
        self.count
    }

    /// Decodes one coded byte into a sample.
    pub fn decode(&mut self, coded: u8) -> u8 {
        self.d[2] = self.d[1];
        self.d[1] = (self.prev_delta as i32).wrapping_sub(self.d[0]);
        self.d[0] = self.prev_delta as i32;

        let mut predicted = self.prev_byte.wrapping_mul(8);
        for (k, d) in self.k.iter().zip(self.d) {
            predicted = predicted.wrapping_add(k.wrapping_mul(d) as u32);
        }
        let predicted = (predicted >> 3) & 0xFF;
        let sample = predicted.wrapping_sub(u32::from(coded));
        self.prev_delta = sample.wrapping_sub(self.prev_byte) as u8 as i8 as i32 as u32;
        self.prev_byte = sample;

        let err = i32::from(coded as i8) << 3;
        let [d1, d2, d3] = self.d;
        let candidates = [
            err,
            err - d1,
            err + d1,
            err - d2,
            err + d2,
            err - d3,
            err + d3,
        ];
        for (dif, candidate) in self.dif.iter_mut().zip(candidates) {
            *dif = dif.wrapping_add(candidate.unsigned_abs());
        }

        if self.count & ADAPT_PERIOD_MASK == 0 {
            self.adapt();
        }
        self.count = self.count.wrapping_add(1);
        sample as u8
    }

    fn adapt(&mut self) {
        let mut min = self.dif[0];
        let mut best = 0;
        for (index, &dif) in self.dif.iter().enumerate().skip(1) {
            if dif < min {
                min = dif;
                best = index;
            }
        }
        self.dif = [0; 7];

        if best == 0 {
            return;
        }
        let tap = (best - 1) / 2;
        let k = &mut self.k[tap];
        if best % 2 == 1 {
            if *k > COEFFICIENT_MIN {
                *k -= 1;
            }
        } else if *k < COEFFICIENT_MAX {
            *k += 1;
        }
    }
}

impl NativeFilter for Audio {
    fn apply(&self, arena: &mut Arena, registers: &Registers) {
        let size = registers[REG_SIZE];
        arena.control_mut().set_block_pos(size);
        if size >= GLOBAL_ADDR / 2 {
            return;
        }

        let channels = channel_count(registers[REG_CHANNELS], size);
        let mut src = 0u32;
        for channel in 0..channels {
            let mut predictor = AudioPredictor::new();
            let mut i = channel;
            while i < size {
                let sample = predictor.decode(arena.read_u8(src));
                src += 1;
                arena.write_u8(size + i, sample);
                i += channels;
            }
        }
    }
}
