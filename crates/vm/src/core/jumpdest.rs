//! Valid jump destination analysis.
//!
//! A byte offset is a legal target of JUMP/JUMPI/JUMPSUB when the opcode
//! at that offset is JUMPDEST and the offset is not inside the immediate
//! data of a PUSHn. The analysis walks the code once and produces a
//! bitmap; results are memoised process-wide, keyed by the Keccak-256 of
//! the code, so concurrent transactions over the same contract share one
//! analysis.

use std::sync::{Arc, Mutex};

use alloy_primitives::{B256, U256};
use hashbrown::HashMap;
use lazy_static::lazy_static;

use super::opcodes::{JUMPDEST, PUSH1, PUSH32};

lazy_static! {
    /// Process-wide analysis cache. Read-mostly; the lock is held only for
    /// the map lookup/insert, never during analysis.
    static ref ANALYSIS_CACHE: Mutex<HashMap<B256, Arc<Bitmap>>> = Mutex::new(HashMap::new());
}

/// One bit per code offset; set bits are valid jump destinations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    bits: Vec<u64>,
}

impl Bitmap {
    fn with_capacity(len: usize) -> Bitmap {
        Bitmap { bits: vec![0u64; (len + 63) / 64] }
    }

    fn mark(&mut self, pos: usize) {
        self.bits[pos / 64] |= 1 << (pos % 64);
    }

    /// Whether the given code offset is a valid destination.
    pub fn has(&self, pos: usize) -> bool {
        match self.bits.get(pos / 64) {
            Some(word) => word & (1 << (pos % 64)) != 0,
            None => false,
        }
    }
}

/// Walks the code once, marking JUMPDEST bytes and skipping push
/// immediates.
pub fn analyze(code: &[u8]) -> Bitmap {
    let mut bitmap = Bitmap::with_capacity(code.len());
    let mut pc = 0usize;
    while pc < code.len() {
        let op = code[pc];
        if op == JUMPDEST {
            bitmap.mark(pc);
        } else if (PUSH1..=PUSH32).contains(&op) {
            pc += (op - PUSH1) as usize + 1;
        }
        pc += 1;
    }
    bitmap
}

/// Returns the memoised analysis for the given code, computing and
/// caching it on first use. A zero code hash (an initcode frame whose
/// hash is not yet known) is analysed ad hoc and not cached.
pub fn shared_analysis(code_hash: B256, code: &[u8]) -> Arc<Bitmap> {
    if code_hash == B256::ZERO {
        return Arc::new(analyze(code));
    }
    let mut cache = ANALYSIS_CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    cache.entry(code_hash).or_insert_with(|| Arc::new(analyze(code))).clone()
}

/// Whether `dest` is a valid jump destination within `code`.
pub fn has(code_hash: B256, code: &[u8], dest: &U256) -> bool {
    // Destinations must fit the program counter and land inside the code.
    if dest.bit_len() > 63 {
        return false;
    }
    let udest = dest.as_limbs()[0] as usize;
    if udest >= code.len() {
        return false;
    }
    shared_analysis(code_hash, code).has(udest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;

    use crate::core::opcodes::{PUSH2, STOP};

    #[test]
    fn test_plain_jumpdest() {
        // JUMPDEST STOP JUMPDEST
        let code = [JUMPDEST, STOP, JUMPDEST];
        let bitmap = analyze(&code);
        assert!(bitmap.has(0));
        assert!(!bitmap.has(1));
        assert!(bitmap.has(2));
    }

    #[test]
    fn test_jumpdest_inside_push_data() {
        // PUSH1 0x5b JUMPDEST
        let code = [PUSH1, JUMPDEST, JUMPDEST];
        let bitmap = analyze(&code);
        assert!(!bitmap.has(1));
        assert!(bitmap.has(2));
    }

    #[test]
    fn test_push_at_code_end() {
        // PUSH2 with truncated immediate; must not scan past the end
        let code = [PUSH2, JUMPDEST];
        let bitmap = analyze(&code);
        assert!(!bitmap.has(1));
    }

    #[test]
    fn test_has_bounds() {
        let code = [JUMPDEST];
        let hash = keccak256(code);
        assert!(has(hash, &code, &U256::from(0)));
        assert!(!has(hash, &code, &U256::from(1)));
        assert!(!has(hash, &code, &U256::MAX));
    }

    #[test]
    fn test_cache_is_shared() {
        let code = [JUMPDEST, STOP];
        let hash = keccak256(code);
        let a = shared_analysis(hash, &code);
        let b = shared_analysis(hash, &code);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
