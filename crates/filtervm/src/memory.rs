//! Flat VM memory arena.
//!
//! The arena simulates the VM's entire address space. It has a power-of-two
//! size so that any 32-bit address can be folded into range with a mask, plus
//! a few guard bytes so a 4-byte access starting at the last valid address
//! stays inside the allocation.
//!
//! There is no way to index the backing buffer with an unmasked
//! address: every read and write goes through [`Arena::mask`].

/// Size of the addressable arena in bytes.
pub const ARENA_SIZE: usize = 0x40000;

/// Mask applied to every computed address.
pub const ARENA_MASK: u32 = (ARENA_SIZE - 1) as u32;

/// Start of the global region (control block followed by global/static data).
pub const GLOBAL_ADDR: u32 = 0x3C000;

/// Capacity of the global region.
pub const GLOBAL_SIZE: usize = 0x2000;

/// Size of the fixed control block at the start of the global region.
pub const FIXED_GLOBAL_SIZE: usize = 0x40;

/// Extra bytes after the arena absorbing 4-byte accesses at the top edge.
const GUARD_BYTES: usize = 4;

/// Fixed-capacity VM memory.
#[derive(Clone)]
pub struct Arena {
    bytes: Box<[u8]>,
}

impl Arena {
    /// Creates a zero-filled arena.
    pub fn new() -> Self {
        Self {
            bytes: vec![0u8; ARENA_SIZE + GUARD_BYTES].into_boxed_slice(),
        }
    }

    /// Folds an arbitrary address into the arena.
    #[inline]
    pub fn mask(addr: u32) -> u32 {
        addr & ARENA_MASK
    }

    /// Reads one byte.
    #[inline]
    pub fn read_u8(&self, addr: u32) -> u8 {
        self.bytes[Self::mask(addr) as usize]
    }

    /// Writes one byte.
    #[inline]
    pub fn write_u8(&mut self, addr: u32, value: u8) {
        self.bytes[Self::mask(addr) as usize] = value;
    }

    /// Reads a little-endian 32-bit value starting at the masked address.
    ///
    /// The bytes following the start address are not masked again; a read at
    /// the last three addresses spills into the guard bytes.
    #[inline]
    pub fn read_u32(&self, addr: u32) -> u32 {
        let start = Self::mask(addr) as usize;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[start..start + 4]);
        u32::from_le_bytes(word)
    }

    /// Writes a little-endian 32-bit value starting at the masked address.
    #[inline]
    pub fn write_u32(&mut self, addr: u32, value: u32) {
        let start = Self::mask(addr) as usize;
        self.bytes[start..start + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Copies `data` into the arena at `offset`, truncating at the arena end.
    ///
    /// Returns the number of bytes copied.
    pub fn load(&mut self, offset: u32, data: &[u8]) -> usize {
        let start = Self::mask(offset) as usize;
        let len = data.len().min(ARENA_SIZE - start);
        self.bytes[start..start + len].copy_from_slice(&data[..len]);
        len
    }

    /// Returns a view of `len` bytes at `offset`, clamped to the arena.
    pub fn slice(&self, offset: u32, len: usize) -> &[u8] {
        let start = Self::mask(offset) as usize;
        let len = len.min(ARENA_SIZE - start);
        &self.bytes[start..start + len]
    }

    /// Returns the whole addressable arena (without guard bytes).
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..ARENA_SIZE]
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena").field("size", &ARENA_SIZE).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_folds_addresses() {
        assert_eq!(Arena::mask(0), 0);
        assert_eq!(Arena::mask(ARENA_SIZE as u32), 0);
        assert_eq!(Arena::mask(0xFFFF_FFFF), ARENA_MASK);
        assert_eq!(Arena::mask(GLOBAL_ADDR + ARENA_SIZE as u32), GLOBAL_ADDR);
    }

    #[test]
    fn test_u32_little_endian() {
        let mut arena = Arena::new();
        arena.write_u32(0x100, 0x1122_3344);
        assert_eq!(arena.read_u8(0x100), 0x44);
        assert_eq!(arena.read_u8(0x103), 0x11);
        assert_eq!(arena.read_u32(0x100), 0x1122_3344);
    }

    #[test]
    fn test_top_edge_access_uses_guard_bytes() {
        let mut arena = Arena::new();
        arena.write_u32(ARENA_MASK, 0xAABB_CCDD);
        assert_eq!(arena.read_u8(ARENA_MASK), 0xDD);
        // The spill goes to the guard bytes, not to address 0.
        assert_eq!(arena.read_u8(0), 0);
        assert_eq!(arena.read_u32(ARENA_MASK), 0xAABB_CCDD);
    }

    #[test]
    fn test_wrapped_address_aliases() {
        let mut arena = Arena::new();
        arena.write_u8(0x0404_0010, 7);
        assert_eq!(arena.read_u8(0x10), 7);
    }

    #[test]
    fn test_load_and_slice_clamp() {
        let mut arena = Arena::new();
        let copied = arena.load(ARENA_MASK - 1, &[1, 2, 3, 4]);
        assert_eq!(copied, 2);
        assert_eq!(arena.slice(ARENA_MASK - 1, 10), &[1, 2]);
    }
}
