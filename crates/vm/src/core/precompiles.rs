//! Precompiled contracts at fixed addresses.
//!
//! Precompiles short-circuit the code-execution path: they are resolved
//! by address, charge a flat plus per-word price, and return a computed
//! result. The active set is selected from the chain rules at EVM
//! construction.

use alloy_primitives::{keccak256, Address};
use hashbrown::HashMap;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use kunlun_params::protocol::{
    ECRECOVER_GAS, IDENTITY_BASE_GAS, IDENTITY_PER_WORD_GAS, MOD_EXP_QUAD_COEFF_DIV,
    RIPEMD160_BASE_GAS, RIPEMD160_PER_WORD_GAS, SHA256_BASE_GAS, SHA256_PER_WORD_GAS,
};
use lazy_static::lazy_static;
use num_bigint::BigUint;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use super::errors::VmError;
use super::gas::to_word_size;

/// A fixed-address contract whose behavior is built in.
pub trait Precompile: Send + Sync {
    /// The gas the call must carry; charged in full before `run`.
    fn required_gas(&self, input: &[u8]) -> u64;
    /// Computes the precompile's output.
    fn run(&self, input: &[u8]) -> Result<Vec<u8>, VmError>;
}

/// The set of precompiles active under one rule set, keyed by address.
pub type PrecompiledContracts = HashMap<Address, Box<dyn Precompile>>;

lazy_static! {
    /// The precompiled contracts of the Pangu rule set.
    pub static ref PRECOMPILED_PANGU: PrecompiledContracts = {
        let mut contracts: PrecompiledContracts = HashMap::new();
        contracts.insert(Address::with_last_byte(0x01), Box::new(Ecrecover));
        contracts.insert(Address::with_last_byte(0x02), Box::new(Sha256Hash));
        contracts.insert(Address::with_last_byte(0x03), Box::new(Ripemd160Hash));
        contracts.insert(Address::with_last_byte(0x04), Box::new(DataCopy));
        contracts
    };

    /// The Pangu set plus the contracts enabled by the Fuxi precompile
    /// switch.
    pub static ref PRECOMPILED_FUXI: PrecompiledContracts = {
        let mut contracts: PrecompiledContracts = HashMap::new();
        contracts.insert(Address::with_last_byte(0x01), Box::new(Ecrecover));
        contracts.insert(Address::with_last_byte(0x02), Box::new(Sha256Hash));
        contracts.insert(Address::with_last_byte(0x03), Box::new(Ripemd160Hash));
        contracts.insert(Address::with_last_byte(0x04), Box::new(DataCopy));
        contracts.insert(Address::with_last_byte(0x05), Box::new(BigModExp));
        contracts
    };
}

/// Zero-pads or truncates the input to a fixed length.
fn right_pad(input: &[u8], len: usize) -> Vec<u8> {
    let mut padded = vec![0u8; len];
    let n = input.len().min(len);
    padded[..n].copy_from_slice(&input[..n]);
    padded
}

/// ECDSA public key recovery.
pub struct Ecrecover;

impl Precompile for Ecrecover {
    fn required_gas(&self, _input: &[u8]) -> u64 {
        ECRECOVER_GAS
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, VmError> {
        let input = right_pad(input, 128);

        // v is a 32-byte big-endian 27 or 28; anything else recovers
        // nothing rather than erroring
        if input[32..63].iter().any(|b| *b != 0) {
            return Ok(Vec::new());
        }
        let v = input[63];
        if v != 27 && v != 28 {
            return Ok(Vec::new());
        }
        let Some(recovery_id) = RecoveryId::from_byte(v - 27) else {
            return Ok(Vec::new());
        };
        let Ok(signature) = Signature::from_slice(&input[64..128]) else {
            return Ok(Vec::new());
        };
        let Ok(key) = VerifyingKey::recover_from_prehash(&input[..32], &signature, recovery_id)
        else {
            return Ok(Vec::new());
        };

        // address = last 20 bytes of Keccak256(uncompressed pubkey)
        let encoded = key.to_encoded_point(false);
        let hash = keccak256(&encoded.as_bytes()[1..]);
        let mut out = vec![0u8; 32];
        out[12..].copy_from_slice(&hash[12..]);
        Ok(out)
    }
}

/// SHA-256 digest.
pub struct Sha256Hash;

impl Precompile for Sha256Hash {
    fn required_gas(&self, input: &[u8]) -> u64 {
        SHA256_BASE_GAS + SHA256_PER_WORD_GAS * to_word_size(input.len() as u64)
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, VmError> {
        Ok(Sha256::digest(input).to_vec())
    }
}

/// RIPEMD-160 digest, left-padded to 32 bytes.
pub struct Ripemd160Hash;

impl Precompile for Ripemd160Hash {
    fn required_gas(&self, input: &[u8]) -> u64 {
        RIPEMD160_BASE_GAS + RIPEMD160_PER_WORD_GAS * to_word_size(input.len() as u64)
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, VmError> {
        let digest = Ripemd160::digest(input);
        let mut out = vec![0u8; 32];
        out[12..].copy_from_slice(&digest);
        Ok(out)
    }
}

/// The identity function.
pub struct DataCopy;

impl Precompile for DataCopy {
    fn required_gas(&self, input: &[u8]) -> u64 {
        IDENTITY_BASE_GAS + IDENTITY_PER_WORD_GAS * to_word_size(input.len() as u64)
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, VmError> {
        Ok(input.to_vec())
    }
}

/// Big-integer modular exponentiation.
pub struct BigModExp;

/// Reads a 32-byte big-endian length field, saturating at u64.
fn read_length(input: &[u8], word: usize) -> u64 {
    let field = right_pad(&input[input.len().min(word * 32)..], 32);
    let field = &field[..32];
    if field[..24].iter().any(|b| *b != 0) {
        return u64::MAX;
    }
    u64::from_be_bytes(field[24..32].try_into().unwrap_or([0u8; 8]))
}

fn mult_complexity(x: u64) -> u64 {
    if x <= 64 {
        x.saturating_mul(x)
    } else if x <= 1024 {
        (x.saturating_mul(x) / 4).saturating_add(96 * x).saturating_sub(3072)
    } else {
        (x.saturating_mul(x) / 16).saturating_add(480 * x).saturating_sub(199_680)
    }
}

impl BigModExp {
    fn lengths(input: &[u8]) -> (u64, u64, u64) {
        (read_length(input, 0), read_length(input, 1), read_length(input, 2))
    }
}

impl Precompile for BigModExp {
    fn required_gas(&self, input: &[u8]) -> u64 {
        let (base_len, exp_len, mod_len) = Self::lengths(input);

        // the exponent's high bits scale the price
        let data: &[u8] = if input.len() > 96 { &input[96..] } else { &[] };
        let exp_head_len = exp_len.min(32);
        let exp_head_start = (base_len as usize).min(data.len());
        let exp_head = right_pad(&data[exp_head_start..], exp_head_len.min(32) as usize);
        let head_bits = BigUint::from_bytes_be(&exp_head).bits();
        let adj_exp_len = if exp_len > 32 {
            (exp_len - 32)
                .saturating_mul(8)
                .saturating_add(head_bits.saturating_sub(1))
        } else {
            head_bits.saturating_sub(1)
        };

        mult_complexity(base_len.max(mod_len))
            .saturating_mul(adj_exp_len.max(1))
            / MOD_EXP_QUAD_COEFF_DIV
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, VmError> {
        let (base_len, exp_len, mod_len) = Self::lengths(input);
        let (base_len, exp_len, mod_len) =
            (base_len as usize, exp_len as usize, mod_len as usize);
        if base_len == 0 && mod_len == 0 {
            return Ok(Vec::new());
        }

        let data = if input.len() > 96 { input[96..].to_vec() } else { Vec::new() };
        let data = right_pad(&data, base_len + exp_len + mod_len);
        let base = BigUint::from_bytes_be(&data[..base_len]);
        let exp = BigUint::from_bytes_be(&data[base_len..base_len + exp_len]);
        let modulus = BigUint::from_bytes_be(&data[base_len + exp_len..]);

        if modulus == BigUint::from(0u8) {
            return Ok(vec![0u8; mod_len]);
        }
        let result = base.modpow(&exp, &modulus).to_bytes_be();

        // left-pad to the modulus length
        let mut out = vec![0u8; mod_len - result.len().min(mod_len)];
        out.extend_from_slice(&result[result.len().saturating_sub(mod_len)..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::hex;
    use k256::ecdsa::SigningKey;

    #[test]
    fn test_identity() {
        let p = DataCopy;
        assert_eq!(p.run(b"hello").unwrap(), b"hello");
        assert_eq!(p.required_gas(&[0u8; 33]), IDENTITY_BASE_GAS + 2 * IDENTITY_PER_WORD_GAS);
    }

    #[test]
    fn test_sha256_vector() {
        let p = Sha256Hash;
        let out = p.run(b"").unwrap();
        assert_eq!(
            out,
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap()
        );
    }

    #[test]
    fn test_ripemd160_vector() {
        let p = Ripemd160Hash;
        let out = p.run(b"").unwrap();
        assert_eq!(out.len(), 32);
        assert_eq!(&out[..12], &[0u8; 12]);
        assert_eq!(
            &out[12..],
            hex::decode("9c1185a5c5e9fc54612808977ee8f548b2258d31").unwrap().as_slice()
        );
    }

    #[test]
    fn test_modexp_small() {
        let p = BigModExp;
        // 3^2 mod 5 == 4, all operands one byte
        let mut input = Vec::new();
        input.extend_from_slice(&{
            let mut w = [0u8; 32];
            w[31] = 1;
            w
        });
        input.extend_from_slice(&{
            let mut w = [0u8; 32];
            w[31] = 1;
            w
        });
        input.extend_from_slice(&{
            let mut w = [0u8; 32];
            w[31] = 1;
            w
        });
        input.extend_from_slice(&[3, 2, 5]);
        assert_eq!(p.run(&input).unwrap(), vec![4]);
    }

    #[test]
    fn test_modexp_zero_modulus() {
        let p = BigModExp;
        let mut input = Vec::new();
        input.extend_from_slice(&[0u8; 31]);
        input.push(1); // base_len = 1
        input.extend_from_slice(&[0u8; 31]);
        input.push(1); // exp_len = 1
        input.extend_from_slice(&[0u8; 31]);
        input.push(1); // mod_len = 1
        input.extend_from_slice(&[7, 3, 0]);
        assert_eq!(p.run(&input).unwrap(), vec![0]);
    }

    #[test]
    fn test_ecrecover_round_trip() {
        let key = SigningKey::from_slice(&[0x42u8; 32]).expect("valid key");
        let prehash = keccak256(b"kunlun");
        let (signature, recovery_id) =
            key.sign_prehash_recoverable(prehash.as_slice()).expect("sign");

        let verifying = key.verifying_key();
        let encoded = verifying.to_encoded_point(false);
        let expected = keccak256(&encoded.as_bytes()[1..]);

        let mut input = Vec::new();
        input.extend_from_slice(prehash.as_slice());
        let mut v = [0u8; 32];
        v[31] = 27 + recovery_id.to_byte();
        input.extend_from_slice(&v);
        input.extend_from_slice(&signature.to_bytes());

        let out = Ecrecover.run(&input).unwrap();
        assert_eq!(out.len(), 32);
        assert_eq!(&out[12..], &expected[12..]);
    }

    #[test]
    fn test_ecrecover_bad_v() {
        let input = right_pad(&[0xab; 128], 128);
        assert!(Ecrecover.run(&input).unwrap().is_empty());
    }

    #[test]
    fn test_sets() {
        assert!(PRECOMPILED_PANGU.contains_key(&Address::with_last_byte(1)));
        assert!(!PRECOMPILED_PANGU.contains_key(&Address::with_last_byte(5)));
        assert!(PRECOMPILED_FUXI.contains_key(&Address::with_last_byte(5)));
    }
}
