//! The expandable, byte-addressed memory of a call frame.
//!
//! Growth is always pre-paid: the interpreter computes the required
//! word-aligned size from the stack operands, charges the quadratic
//! expansion cost, and calls [`Memory::resize`] before the opcode body
//! runs. Reads past the current length never happen.

/// The [`Memory`] struct represents a frame's memory space.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    store: Vec<u8>,
}

impl Memory {
    /// Creates a new, empty [`Memory`].
    ///
    /// ```
    /// use kunlun_vm::core::memory::Memory;
    ///
    /// let memory = Memory::new();
    /// assert_eq!(memory.len(), 0);
    /// ```
    pub fn new() -> Memory {
        Memory { store: Vec::new() }
    }

    /// Grows the memory to the given size. The interpreter has already
    /// charged for the expansion, and `size` is a multiple of 32.
    pub fn resize(&mut self, size: u64) {
        if size as usize > self.store.len() {
            self.store.resize(size as usize, 0u8);
        }
    }

    /// Sets `value.len()` bytes starting at the given offset. The region
    /// must have been allocated by a prior [`Memory::resize`].
    pub fn set(&mut self, offset: u64, size: u64, value: &[u8]) {
        if size == 0 {
            return;
        }
        // The interpreter expands memory before execution; a store past the
        // current length is an invariant violation, not a user error.
        assert!(
            offset.saturating_add(size) as usize <= self.store.len(),
            "invalid memory access: store"
        );
        self.store[offset as usize..(offset + size) as usize].copy_from_slice(&value[..size as usize]);
    }

    /// Sets a single byte at the given offset.
    pub fn set8(&mut self, offset: u64, value: u8) {
        assert!((offset as usize) < self.store.len(), "invalid memory access: store8");
        self.store[offset as usize] = value;
    }

    /// Sets 32 bytes at the given offset to the big-endian encoding of a
    /// 256-bit word.
    pub fn set32(&mut self, offset: u64, value: &alloy_primitives::U256) {
        self.set(offset, 32, &value.to_be_bytes::<32>());
    }

    /// Returns a copy of `size` bytes starting at the given offset.
    pub fn get(&self, offset: u64, size: u64) -> Vec<u8> {
        self.get_ptr(offset, size).to_vec()
    }

    /// Borrows `size` bytes starting at the given offset.
    pub fn get_ptr(&self, offset: u64, size: u64) -> &[u8] {
        if size == 0 {
            return &[];
        }
        &self.store[offset as usize..(offset + size) as usize]
    }

    /// Current length of the memory, always a multiple of 32.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the memory has not been touched yet.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{hex, U256};

    #[test]
    fn test_set_simple() {
        let mut memory = Memory::new();
        memory.resize(32);
        memory.set(
            0,
            32,
            &hex::decode("00000000000000000000000000000000000000000000000000000000000000ff")
                .expect("failed to decode hex"),
        );
        assert_eq!(memory.get(0, 32)[31], 0xff);
        assert_eq!(memory.len(), 32);
    }

    #[test]
    fn test_set32_word() {
        let mut memory = Memory::new();
        memory.resize(64);
        memory.set32(32, &U256::from(0xdeadbeefu64));
        let word = memory.get(32, 32);
        assert_eq!(&word[28..], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(&word[..28], &[0u8; 28]);
    }

    #[test]
    fn test_set8() {
        let mut memory = Memory::new();
        memory.resize(32);
        memory.set8(31, 0x42);
        assert_eq!(memory.get(0, 32)[31], 0x42);
    }

    #[test]
    fn test_resize_is_monotonic() {
        let mut memory = Memory::new();
        memory.resize(64);
        assert_eq!(memory.len(), 64);
        memory.resize(32);
        assert_eq!(memory.len(), 64);
    }

    #[test]
    fn test_zero_size_get_is_empty() {
        let memory = Memory::new();
        assert!(memory.get(1024, 0).is_empty());
    }

    #[test]
    #[should_panic(expected = "invalid memory access")]
    fn test_store_past_length_panics() {
        let mut memory = Memory::new();
        memory.set(0, 32, &[0u8; 32]);
    }
}
