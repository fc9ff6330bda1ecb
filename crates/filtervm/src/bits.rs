//! MSB-first bit stream over a byte slice.
//!
//! The reader never fails: bytes past the end of the input read as zero, which
//! is what makes decoding of truncated or padded programs total.

/// Bit-level cursor over a bytecode blob.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u32,
}

impl<'a> BitReader<'a> {
    /// Creates a reader positioned at the first bit of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    fn byte_at(&self, index: usize) -> u32 {
        self.data.get(index).copied().map_or(0, u32::from)
    }

    /// Returns the next 16 bits without consuming them.
    pub fn peek16(&self) -> u32 {
        let window = (self.byte_at(self.byte_pos) << 16)
            | (self.byte_at(self.byte_pos + 1) << 8)
            | self.byte_at(self.byte_pos + 2);
        (window >> (8 - self.bit_pos)) & 0xFFFF
    }

    /// Advances the cursor by `count` bits.
    pub fn skip(&mut self, count: u32) {
        let total = self.bit_pos + count;
        self.byte_pos += (total >> 3) as usize;
        self.bit_pos = total & 7;
    }

    /// Reads `count` bits (at most 16) as an unsigned value.
    pub fn read(&mut self, count: u32) -> u32 {
        debug_assert!(count <= 16);
        let value = self.peek16() >> (16 - count);
        self.skip(count);
        value
    }

    /// Index of the byte holding the next unread bit.
    pub fn byte_pos(&self) -> usize {
        self.byte_pos
    }

    /// True while the cursor still points inside the input.
    pub fn has_more(&self) -> bool {
        self.byte_pos < self.data.len()
    }
}

/// MSB-first bit sink, the inverse of [`BitReader`].
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the low `count` bits of `value`, most significant first.
    pub fn write(&mut self, value: u32, count: u32) {
        for shift in (0..count).rev() {
            let bit = (value >> shift) & 1;
            if self.bit_len % 8 == 0 {
                self.bytes.push(0);
            }
            if bit != 0 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 0x80 >> (self.bit_len % 8);
            }
            self.bit_len += 1;
        }
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Returns the written bytes; the final byte is zero-padded.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
