//! Semantic implementations of each opcode.
//!
//! Every function has the same shape: it receives the program counter,
//! the EVM facade, the executing frame, and the frame's memory, operand
//! stack, and return stack. Gas has already been charged and memory
//! already expanded when a body runs; bodies only perform the visible
//! effect of the opcode.

use alloy_primitives::{keccak256, Address, B256, I256, U256};
use kunlun_params::protocol::CALL_STIPEND;
use tracing::trace;

use super::contract::Contract;
use super::errors::VmError;
use super::evm::Evm;
use super::log::Log;
use super::memory::Memory;
use super::stack::{ReturnStack, Stack};

/// Bytes produced by an opcode body. Only opcodes flagged `returns` in
/// the jump table produce anything.
pub type InstructionResult = Result<Vec<u8>, VmError>;

/// Interprets the low 20 bytes of a 256-bit word as an address.
pub fn u256_to_address(value: &U256) -> Address {
    Address::from_word(B256::from(*value))
}

/// Widens an address into a 256-bit word.
pub fn address_to_u256(addr: Address) -> U256 {
    U256::from_be_bytes(addr.into_word().0)
}

/// One for true, zero for false.
fn bool_to_u256(cond: bool) -> U256 {
    if cond {
        U256::from(1)
    } else {
        U256::ZERO
    }
}

/// Returns `(value as u64, overflowed)`.
fn u64_with_overflow(value: &U256) -> (u64, bool) {
    (value.as_limbs()[0], value.bit_len() > 64)
}

/// Extracts `size` bytes at `offset` from `data`, zero-padded on the
/// right when the region runs past the end.
fn get_data(data: &[u8], offset: &U256, size: &U256) -> Vec<u8> {
    let len = data.len() as u64;
    let (size64, size_overflow) = u64_with_overflow(size);
    if size64 == 0 {
        return Vec::new();
    }
    let offset64 = if offset.bit_len() > 64 { len } else { offset.as_limbs()[0].min(len) };
    let end = if size_overflow { len } else { offset64.saturating_add(size64).min(len) };

    let mut out = data[offset64 as usize..end as usize].to_vec();
    out.resize(size64 as usize, 0u8);
    out
}

// --- arithmetic ---

pub fn op_add(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.peek()?;
    *y = x.overflowing_add(*y).0;
    Ok(Vec::new())
}

pub fn op_sub(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.peek()?;
    *y = x.overflowing_sub(*y).0;
    Ok(Vec::new())
}

pub fn op_mul(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.peek()?;
    *y = x.overflowing_mul(*y).0;
    Ok(Vec::new())
}

pub fn op_div(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.peek()?;
    *y = x.checked_div(*y).unwrap_or_default();
    Ok(Vec::new())
}

pub fn op_sdiv(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.peek()?;
    *y = if y.is_zero() {
        U256::ZERO
    } else {
        // MIN / -1 overflows back to MIN
        I256::from_raw(x)
            .checked_div(I256::from_raw(*y))
            .unwrap_or(I256::MIN)
            .into_raw()
    };
    Ok(Vec::new())
}

pub fn op_mod(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.peek()?;
    *y = x.checked_rem(*y).unwrap_or_default();
    Ok(Vec::new())
}

pub fn op_smod(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.peek()?;
    *y = if y.is_zero() {
        U256::ZERO
    } else {
        I256::from_raw(x)
            .checked_rem(I256::from_raw(*y))
            .unwrap_or(I256::ZERO)
            .into_raw()
    };
    Ok(Vec::new())
}

pub fn op_addmod(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.pop()?;
    let z = stack.peek()?;
    *z = if z.is_zero() { U256::ZERO } else { x.add_mod(y, *z) };
    Ok(Vec::new())
}

pub fn op_mulmod(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.pop()?;
    let z = stack.peek()?;
    *z = if z.is_zero() { U256::ZERO } else { x.mul_mod(y, *z) };
    Ok(Vec::new())
}

pub fn op_exp(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let base = stack.pop()?;
    let exponent = stack.peek()?;
    *exponent = base.pow(*exponent);
    Ok(Vec::new())
}

pub fn op_sign_extend(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let back = stack.pop()?;
    let num = stack.peek()?;
    if back < U256::from(31) {
        let bit = back.as_limbs()[0] as usize * 8 + 7;
        let mask = (U256::from(1) << bit) - U256::from(1);
        *num = if num.bit(bit) {
            // extend ones
            *num | !mask
        } else {
            *num & mask
        };
    }
    Ok(Vec::new())
}

// --- comparison & bitwise ---

pub fn op_lt(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.peek()?;
    *y = bool_to_u256(x < *y);
    Ok(Vec::new())
}

pub fn op_gt(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.peek()?;
    *y = bool_to_u256(x > *y);
    Ok(Vec::new())
}

pub fn op_slt(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.peek()?;
    *y = bool_to_u256(I256::from_raw(x) < I256::from_raw(*y));
    Ok(Vec::new())
}

pub fn op_sgt(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.peek()?;
    *y = bool_to_u256(I256::from_raw(x) > I256::from_raw(*y));
    Ok(Vec::new())
}

pub fn op_eq(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.peek()?;
    *y = bool_to_u256(x == *y);
    Ok(Vec::new())
}

pub fn op_iszero(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.peek()?;
    *x = bool_to_u256(x.is_zero());
    Ok(Vec::new())
}

pub fn op_and(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.peek()?;
    *y = x & *y;
    Ok(Vec::new())
}

pub fn op_or(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.peek()?;
    *y = x | *y;
    Ok(Vec::new())
}

pub fn op_xor(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.pop()?;
    let y = stack.peek()?;
    *y = x ^ *y;
    Ok(Vec::new())
}

pub fn op_not(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let x = stack.peek()?;
    *x = !*x;
    Ok(Vec::new())
}

pub fn op_byte(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let th = stack.pop()?;
    let val = stack.peek()?;
    *val = if th < U256::from(32) {
        U256::from(val.to_be_bytes::<32>()[th.as_limbs()[0] as usize])
    } else {
        U256::ZERO
    };
    Ok(Vec::new())
}

/// SHL pops the shift amount and shifts the next operand left; amounts of
/// 256 or more saturate to zero.
pub fn op_shl(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let shift = stack.pop()?;
    let value = stack.peek()?;
    *value = if shift < U256::from(256) {
        *value << (shift.as_limbs()[0] as usize)
    } else {
        U256::ZERO
    };
    Ok(Vec::new())
}

/// SHR: logical shift right with zero fill.
pub fn op_shr(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let shift = stack.pop()?;
    let value = stack.peek()?;
    *value = if shift < U256::from(256) {
        *value >> (shift.as_limbs()[0] as usize)
    } else {
        U256::ZERO
    };
    Ok(Vec::new())
}

/// SAR: arithmetic shift right with sign extension; saturates to zero or
/// all-ones depending on the sign.
pub fn op_sar(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let shift = stack.pop()?;
    let value = stack.peek()?;
    if shift >= U256::from(256) {
        *value = if I256::from_raw(*value).is_negative() { U256::MAX } else { U256::ZERO };
    } else {
        *value = value.arithmetic_shr(shift.as_limbs()[0] as usize);
    }
    Ok(Vec::new())
}

// --- hashing & environment ---

pub fn op_sha3(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let offset = stack.pop()?;
    let size = stack.pop()?;
    let data = memory.get(offset.as_limbs()[0], size.as_limbs()[0]);
    let hash = keccak256(&data);

    if evm.vm_config.enable_preimage_recording {
        evm.state.add_preimage(hash, data);
    }

    stack.push(U256::from_be_bytes(hash.0));
    Ok(Vec::new())
}

pub fn op_address(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(address_to_u256(contract.address()));
    Ok(Vec::new())
}

pub fn op_balance(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let slot = stack.peek()?;
    let address = u256_to_address(slot);
    *slot = evm.state.get_balance(address);
    Ok(Vec::new())
}

pub fn op_origin(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(address_to_u256(evm.context.origin));
    Ok(Vec::new())
}

pub fn op_caller(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(address_to_u256(contract.caller()));
    Ok(Vec::new())
}

pub fn op_call_value(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(contract.value);
    Ok(Vec::new())
}

pub fn op_call_data_load(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let offset = stack.pop()?;
    let word = get_data(&contract.input, &offset, &U256::from(32));
    stack.push(U256::from_be_slice(&word));
    Ok(Vec::new())
}

pub fn op_call_data_size(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(U256::from(contract.input.len()));
    Ok(Vec::new())
}

pub fn op_call_data_copy(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let mem_offset = stack.pop()?;
    let data_offset = stack.pop()?;
    let length = stack.pop()?;
    let data = get_data(&contract.input, &data_offset, &length);
    memory.set(mem_offset.as_limbs()[0], length.as_limbs()[0], &data);
    Ok(Vec::new())
}

pub fn op_code_size(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(U256::from(contract.code.len()));
    Ok(Vec::new())
}

pub fn op_code_copy(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let mem_offset = stack.pop()?;
    let code_offset = stack.pop()?;
    let length = stack.pop()?;
    let code = get_data(&contract.code, &code_offset, &length);
    memory.set(mem_offset.as_limbs()[0], length.as_limbs()[0], &code);
    Ok(Vec::new())
}

pub fn op_gasprice(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(evm.context.gas_price);
    Ok(Vec::new())
}

pub fn op_ext_code_size(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let slot = stack.peek()?;
    let addr = u256_to_address(slot);
    *slot = U256::from(evm.state.get_code_size(addr));
    trace!(address = %addr, "extcodesize");
    Ok(Vec::new())
}

pub fn op_ext_code_copy(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let addr = stack.pop()?;
    let mem_offset = stack.pop()?;
    let code_offset = stack.pop()?;
    let length = stack.pop()?;
    let code = evm.state.get_code(u256_to_address(&addr));
    let copy = get_data(&code, &code_offset, &length);
    memory.set(mem_offset.as_limbs()[0], length.as_limbs()[0], &copy);
    Ok(Vec::new())
}

/// EXTCODEHASH pushes zero for accounts that do not exist or are empty,
/// and the code hash otherwise; everything else is relayed to the state
/// store so suicided and deleted accounts resolve consistently.
pub fn op_ext_code_hash(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let slot = stack.peek()?;
    let address = u256_to_address(slot);
    *slot = if evm.state.empty(address) {
        U256::ZERO
    } else {
        U256::from_be_bytes(evm.state.get_code_hash(address).0)
    };
    Ok(Vec::new())
}

pub fn op_return_data_size(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(U256::from(evm.return_data.len()));
    Ok(Vec::new())
}

pub fn op_return_data_copy(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let mem_offset = stack.pop()?;
    let data_offset = stack.pop()?;
    let length = stack.pop()?;

    let (offset64, overflow) = u64_with_overflow(&data_offset);
    if overflow {
        return Err(VmError::ReturnDataOutOfBounds);
    }
    let end = data_offset.checked_add(length).ok_or(VmError::ReturnDataOutOfBounds)?;
    let (end64, overflow) = u64_with_overflow(&end);
    if overflow || (evm.return_data.len() as u64) < end64 {
        return Err(VmError::ReturnDataOutOfBounds);
    }
    let data = evm.return_data[offset64 as usize..end64 as usize].to_vec();
    memory.set(mem_offset.as_limbs()[0], length.as_limbs()[0], &data);
    Ok(Vec::new())
}

// --- block context ---

pub fn op_blockhash(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let num = stack.peek()?;
    let (num64, overflow) = u64_with_overflow(num);
    if overflow {
        *num = U256::ZERO;
        return Ok(Vec::new());
    }
    let upper: u64 = evm.context.block_number.saturating_to();
    let lower = if upper < 257 { 0 } else { upper - 256 };
    *num = if num64 >= lower && num64 < upper {
        U256::from_be_bytes((evm.context.get_hash)(num64).0)
    } else {
        U256::ZERO
    };
    Ok(Vec::new())
}

pub fn op_coinbase(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(address_to_u256(evm.context.coinbase));
    Ok(Vec::new())
}

pub fn op_timestamp(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(evm.context.time);
    Ok(Vec::new())
}

pub fn op_number(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(evm.context.block_number);
    Ok(Vec::new())
}

pub fn op_difficulty(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(evm.context.difficulty);
    Ok(Vec::new())
}

pub fn op_gas_limit(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(evm.context.gas_limit);
    Ok(Vec::new())
}

pub fn op_chain_id(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(U256::from(evm.chain_rules.chain_id));
    Ok(Vec::new())
}

pub fn op_self_balance(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(evm.state.get_balance(contract.address()));
    Ok(Vec::new())
}

// --- stack, memory, flow ---

pub fn op_pop(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.pop()?;
    Ok(Vec::new())
}

pub fn op_mload(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let offset = stack.pop()?;
    let value = U256::from_be_slice(memory.get_ptr(offset.as_limbs()[0], 32));
    stack.push(value);
    Ok(Vec::new())
}

pub fn op_mstore(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let offset = stack.pop()?;
    let value = stack.pop()?;
    memory.set32(offset.as_limbs()[0], &value);
    Ok(Vec::new())
}

pub fn op_mstore8(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let offset = stack.pop()?;
    let value = stack.pop()?;
    memory.set8(offset.as_limbs()[0], value.as_limbs()[0] as u8);
    Ok(Vec::new())
}

pub fn op_sload(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let loc = stack.peek()?;
    let value = evm.state.get_state(contract.address(), B256::from(*loc));
    *loc = U256::from_be_bytes(value.0);
    Ok(Vec::new())
}

pub fn op_sstore(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let loc = stack.pop()?;
    let val = stack.pop()?;
    evm.state.set_state(contract.address(), B256::from(loc), B256::from(val));
    Ok(Vec::new())
}

pub fn op_jump(
    pc: &mut u64,
    _evm: &mut Evm<'_>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let pos = stack.pop()?;
    if !contract.valid_jumpdest(&pos) {
        return Err(VmError::InvalidJump { dest: pos.saturating_to() });
    }
    *pc = pos.as_limbs()[0];
    Ok(Vec::new())
}

pub fn op_jumpi(
    pc: &mut u64,
    _evm: &mut Evm<'_>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let pos = stack.pop()?;
    let cond = stack.pop()?;
    if !cond.is_zero() {
        if !contract.valid_jumpdest(&pos) {
            return Err(VmError::InvalidJump { dest: pos.saturating_to() });
        }
        *pc = pos.as_limbs()[0];
    } else {
        *pc += 1;
    }
    Ok(Vec::new())
}

pub fn op_jumpdest(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    _stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    Ok(Vec::new())
}

/// A BEGINSUB reached by sequential execution is illegal; subroutines are
/// only entered through JUMPSUB.
pub fn op_begin_sub(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    _stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    Err(VmError::InvalidSubroutineEntry)
}

pub fn op_jump_sub(
    pc: &mut u64,
    _evm: &mut Evm<'_>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    rstack: &mut ReturnStack,
) -> InstructionResult {
    if rstack.is_full() {
        return Err(VmError::ReturnStackExceeded);
    }
    let pos = stack.pop()?;
    if !contract.valid_jumpdest(&pos) {
        return Err(VmError::InvalidJump { dest: pos.saturating_to() });
    }
    rstack.push(*pc as u32);
    *pc = pos.as_limbs()[0] + 1;
    Ok(Vec::new())
}

pub fn op_return_sub(
    pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    _stack: &mut Stack,
    rstack: &mut ReturnStack,
) -> InstructionResult {
    // Only the emptiness check is needed; jumpsub never pushes an invalid
    // return address.
    let ret = rstack.pop().ok_or(VmError::InvalidRetsub)?;
    *pc = ret as u64 + 1;
    Ok(Vec::new())
}

pub fn op_pc(
    pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(U256::from(*pc));
    Ok(Vec::new())
}

pub fn op_msize(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(U256::from(memory.len()));
    Ok(Vec::new())
}

pub fn op_gas(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.push(U256::from(contract.gas_remaining));
    Ok(Vec::new())
}

// --- create & call family ---

pub fn op_create(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let value = stack.pop()?;
    let offset = stack.pop()?;
    let size = stack.pop()?;
    let input = memory.get(offset.as_limbs()[0], size.as_limbs()[0]);

    let mut gas = contract.gas_remaining;
    gas -= gas / 64;
    contract.use_gas(gas);

    let (res, addr, return_gas, suberr) = evm.create(contract.address(), &input, gas, value);

    // Under Pangu rules a code-store failure is a failed create; earlier
    // rule sets pretend the create succeeded with empty code.
    if evm.chain_rules.is_pangu && suberr == Some(VmError::CodeStoreOutOfGas) {
        stack.push(U256::ZERO);
    } else if suberr.is_some() && suberr != Some(VmError::CodeStoreOutOfGas) {
        stack.push(U256::ZERO);
    } else {
        stack.push(address_to_u256(addr));
    }
    contract.refund_gas(return_gas);

    if suberr == Some(VmError::ExecutionReverted) {
        return Ok(res);
    }
    Ok(Vec::new())
}

pub fn op_create2(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let endowment = stack.pop()?;
    let offset = stack.pop()?;
    let size = stack.pop()?;
    let salt = stack.pop()?;
    let input = memory.get(offset.as_limbs()[0], size.as_limbs()[0]);

    let mut gas = contract.gas_remaining;
    gas -= gas / 64;
    contract.use_gas(gas);

    let (res, addr, return_gas, suberr) =
        evm.create2(contract.address(), &input, gas, endowment, salt);

    if suberr.is_some() {
        stack.push(U256::ZERO);
    } else {
        stack.push(address_to_u256(addr));
    }
    contract.refund_gas(return_gas);

    if suberr == Some(VmError::ExecutionReverted) {
        return Ok(res);
    }
    Ok(Vec::new())
}

pub fn op_call(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    // The requested gas was folded into the charge for this opcode; the
    // forwarded amount is the 63/64-capped value recorded there.
    stack.pop()?;
    let addr = stack.pop()?;
    let value = stack.pop()?;
    let in_offset = stack.pop()?;
    let in_size = stack.pop()?;
    let ret_offset = stack.pop()?;
    let ret_size = stack.pop()?;

    let address = u256_to_address(&addr);
    let args = memory.get(in_offset.as_limbs()[0], in_size.as_limbs()[0]);

    let mut gas = evm.call_gas_temp;
    if !value.is_zero() {
        gas += CALL_STIPEND;
    }

    let (ret, return_gas, err) =
        evm.call(contract.address(), address, &args, gas, value, false);
    stack.push(bool_to_u256(err.is_none()));
    if err.is_none() || err == Some(VmError::ExecutionReverted) {
        memory.set(ret_offset.as_limbs()[0], ret_size.as_limbs()[0].min(ret.len() as u64), &ret);
    }
    contract.refund_gas(return_gas);

    Ok(ret)
}

pub fn op_call_code(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.pop()?;
    let addr = stack.pop()?;
    let value = stack.pop()?;
    let in_offset = stack.pop()?;
    let in_size = stack.pop()?;
    let ret_offset = stack.pop()?;
    let ret_size = stack.pop()?;

    let address = u256_to_address(&addr);
    let args = memory.get(in_offset.as_limbs()[0], in_size.as_limbs()[0]);

    let mut gas = evm.call_gas_temp;
    if !value.is_zero() {
        gas += CALL_STIPEND;
    }

    let (ret, return_gas, err) =
        evm.call_code(contract.address(), address, &args, gas, value);
    stack.push(bool_to_u256(err.is_none()));
    if err.is_none() || err == Some(VmError::ExecutionReverted) {
        memory.set(ret_offset.as_limbs()[0], ret_size.as_limbs()[0].min(ret.len() as u64), &ret);
    }
    contract.refund_gas(return_gas);

    Ok(ret)
}

pub fn op_delegate_call(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.pop()?;
    let to = stack.pop()?;
    let in_offset = stack.pop()?;
    let in_size = stack.pop()?;
    let out_offset = stack.pop()?;
    let out_size = stack.pop()?;

    let to_addr = u256_to_address(&to);
    let args = memory.get(in_offset.as_limbs()[0], in_size.as_limbs()[0]);
    let gas = evm.call_gas_temp;

    let (ret, return_gas, err) = evm.delegate_call(
        contract.caller(),
        contract.address(),
        contract.value,
        to_addr,
        &args,
        gas,
    );
    stack.push(bool_to_u256(err.is_none()));
    if err.is_none() || err == Some(VmError::ExecutionReverted) {
        memory.set(out_offset.as_limbs()[0], out_size.as_limbs()[0].min(ret.len() as u64), &ret);
    }
    contract.refund_gas(return_gas);

    Ok(ret)
}

pub fn op_static_call(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.pop()?;
    let addr = stack.pop()?;
    let in_offset = stack.pop()?;
    let in_size = stack.pop()?;
    let ret_offset = stack.pop()?;
    let ret_size = stack.pop()?;

    let address = u256_to_address(&addr);
    let args = memory.get(in_offset.as_limbs()[0], in_size.as_limbs()[0]);
    let gas = evm.call_gas_temp;

    let (ret, return_gas, err) = evm.static_call(contract.address(), address, &args, gas);
    stack.push(bool_to_u256(err.is_none()));
    if err.is_none() || err == Some(VmError::ExecutionReverted) {
        memory.set(ret_offset.as_limbs()[0], ret_size.as_limbs()[0].min(ret.len() as u64), &ret);
    }
    contract.refund_gas(return_gas);

    Ok(ret)
}

pub fn op_return(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let offset = stack.pop()?;
    let size = stack.pop()?;
    Ok(memory.get_ptr(offset.as_limbs()[0], size.as_limbs()[0]).to_vec())
}

pub fn op_revert(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let offset = stack.pop()?;
    let size = stack.pop()?;
    Ok(memory.get_ptr(offset.as_limbs()[0], size.as_limbs()[0]).to_vec())
}

pub fn op_stop(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    _stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    Ok(Vec::new())
}

pub fn op_suicide(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let balance = evm.state.get_balance(contract.address());
    let beneficiary = stack.pop()?;
    evm.state.add_balance(u256_to_address(&beneficiary), balance);
    evm.state.suicide(contract.address());
    Ok(Vec::new())
}

// --- instruction families built from a single shape ---

/// LOGn: pops the data window and n topics, then records the log against
/// the executing address.
pub fn op_log<const N: usize>(
    _pc: &mut u64,
    evm: &mut Evm<'_>,
    contract: &mut Contract,
    memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let m_start = stack.pop()?;
    let m_size = stack.pop()?;
    let mut topics = Vec::with_capacity(N);
    for _ in 0..N {
        topics.push(B256::from(stack.pop()?));
    }

    let data = memory.get(m_start.as_limbs()[0], m_size.as_limbs()[0]);
    evm.state.add_log(Log {
        address: contract.address(),
        topics,
        data,
        // Non-consensus field; the state store doesn't know the block.
        block_number: evm.context.block_number.saturating_to(),
    });
    Ok(Vec::new())
}

/// PUSHn: reads n immediate bytes (zero-extended past the end of code)
/// and advances the pc over them.
pub fn op_push<const N: usize>(
    pc: &mut u64,
    _evm: &mut Evm<'_>,
    contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    let code_len = contract.code.len();
    let start = ((*pc + 1) as usize).min(code_len);
    let end = (start + N).min(code_len);

    let mut bytes = [0u8; 32];
    bytes[..end - start].copy_from_slice(&contract.code[start..end]);
    stack.push(U256::from_be_slice(&bytes[..N]));

    *pc += N as u64;
    Ok(Vec::new())
}

/// DUPn duplicates the n'th stack item onto the top.
pub fn op_dup<const N: usize>(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.dup(N);
    Ok(Vec::new())
}

/// SWAPn swaps the top with the item n positions below it.
pub fn op_swap<const N: usize>(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> InstructionResult {
    stack.swap(N);
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::hex;
    use kunlun_params::config::ALL_PROTOCOL_CHANGES;

    use crate::core::evm::Context;
    use crate::core::interpreter::Config;
    use crate::core::state::MemoryState;

    fn u256(hex_str: &str) -> U256 {
        U256::from_be_slice(&hex::decode(hex_str).expect("valid hex"))
    }

    /// Runs a two-operand instruction and returns the value left on top.
    fn run_binop(
        op: fn(
            &mut u64,
            &mut Evm<'_>,
            &mut Contract,
            &mut Memory,
            &mut Stack,
            &mut ReturnStack,
        ) -> InstructionResult,
        x: U256,
        y: U256,
    ) -> U256 {
        let mut state = MemoryState::new();
        let mut evm =
            Evm::new(Context::default(), &mut state, &ALL_PROTOCOL_CHANGES, Config::default());
        let mut contract = Contract::new(Address::ZERO, Address::ZERO, U256::ZERO, 0);
        let mut memory = Memory::new();
        let mut stack = Stack::new();
        let mut rstack = ReturnStack::new();
        let mut pc = 0u64;

        // operands pushed in reverse: `x` ends up on top
        stack.push(y);
        stack.push(x);
        op(&mut pc, &mut evm, &mut contract, &mut memory, &mut stack, &mut rstack)
            .expect("instruction failed");
        stack.pop().expect("no result on stack")
    }

    #[test]
    fn test_byte() {
        // byte 31 of 0x..102030 is 0x30, byte 29 is 0x10
        let v = u256("102030");
        assert_eq!(run_binop(op_byte, U256::from(31), v), U256::from(0x30));
        assert_eq!(run_binop(op_byte, U256::from(29), v), U256::from(0x10));
        assert_eq!(run_binop(op_byte, U256::from(32), v), U256::ZERO);
    }

    #[test]
    fn test_shl() {
        assert_eq!(run_binop(op_shl, U256::from(1), U256::from(1)), U256::from(2));
        assert_eq!(run_binop(op_shl, U256::from(255), U256::from(1)), U256::from(1) << 255);
        assert_eq!(run_binop(op_shl, U256::from(256), U256::from(1)), U256::ZERO);
        assert_eq!(run_binop(op_shl, U256::MAX, U256::from(1)), U256::ZERO);
    }

    #[test]
    fn test_shr() {
        assert_eq!(run_binop(op_shr, U256::from(1), U256::from(4)), U256::from(2));
        assert_eq!(run_binop(op_shr, U256::from(255), U256::MAX), U256::from(1));
        assert_eq!(run_binop(op_shr, U256::from(256), U256::MAX), U256::ZERO);
    }

    #[test]
    fn test_sar() {
        // -1 >> anything stays -1
        assert_eq!(run_binop(op_sar, U256::from(1), U256::MAX), U256::MAX);
        assert_eq!(run_binop(op_sar, U256::from(257), U256::MAX), U256::MAX);
        // positive values shift in zeros
        assert_eq!(run_binop(op_sar, U256::from(1), U256::from(4)), U256::from(2));
        assert_eq!(run_binop(op_sar, U256::from(300), U256::from(4)), U256::ZERO);
    }

    #[test]
    fn test_sdiv_edges() {
        let minus_one = U256::MAX;
        let min = U256::from(1) << 255;
        // MIN / -1 == MIN (overflow wraps)
        assert_eq!(run_binop(op_sdiv, min, minus_one), min);
        // x / 0 == 0
        assert_eq!(run_binop(op_sdiv, U256::from(7), U256::ZERO), U256::ZERO);
        // -8 / 2 == -4
        let minus_eight = U256::ZERO.overflowing_sub(U256::from(8)).0;
        let minus_four = U256::ZERO.overflowing_sub(U256::from(4)).0;
        assert_eq!(run_binop(op_sdiv, minus_eight, U256::from(2)), minus_four);
    }

    #[test]
    fn test_smod_edges() {
        let minus_one = U256::MAX;
        let min = U256::from(1) << 255;
        // MIN % -1 == 0
        assert_eq!(run_binop(op_smod, min, minus_one), U256::ZERO);
        // -8 % 3 == -2
        let minus_eight = U256::ZERO.overflowing_sub(U256::from(8)).0;
        let minus_two = U256::ZERO.overflowing_sub(U256::from(2)).0;
        assert_eq!(run_binop(op_smod, minus_eight, U256::from(3)), minus_two);
    }

    #[test]
    fn test_sign_extend() {
        // extending 0xff from byte 0 gives -1
        assert_eq!(run_binop(op_sign_extend, U256::from(0), U256::from(0xff)), U256::MAX);
        // extending 0x7f from byte 0 keeps it positive
        assert_eq!(run_binop(op_sign_extend, U256::from(0), U256::from(0x7f)), U256::from(0x7f));
        // width 31 and beyond leaves the value untouched
        let v = u256("8000000000000000000000000000000000000000000000000000000000000001");
        assert_eq!(run_binop(op_sign_extend, U256::from(31), v), v);
    }

    #[test]
    fn test_addmod_mulmod_zero_modulus() {
        let mut state = MemoryState::new();
        let mut evm =
            Evm::new(Context::default(), &mut state, &ALL_PROTOCOL_CHANGES, Config::default());
        let mut contract = Contract::new(Address::ZERO, Address::ZERO, U256::ZERO, 0);
        let mut memory = Memory::new();
        let mut rstack = ReturnStack::new();
        let mut pc = 0u64;

        let mut stack = Stack::new();
        stack.push(U256::ZERO); // modulus
        stack.push(U256::from(2));
        stack.push(U256::from(3));
        op_addmod(&mut pc, &mut evm, &mut contract, &mut memory, &mut stack, &mut rstack)
            .expect("addmod");
        assert_eq!(stack.pop().unwrap(), U256::ZERO);

        let mut stack = Stack::new();
        stack.push(U256::from(8)); // modulus
        stack.push(U256::MAX);
        stack.push(U256::MAX);
        op_mulmod(&mut pc, &mut evm, &mut contract, &mut memory, &mut stack, &mut rstack)
            .expect("mulmod");
        assert_eq!(stack.pop().unwrap(), U256::from(1));
    }

    #[test]
    fn test_get_data_padding() {
        let data = [1u8, 2, 3];
        assert_eq!(get_data(&data, &U256::from(1), &U256::from(4)), vec![2, 3, 0, 0]);
        assert_eq!(get_data(&data, &U256::from(10), &U256::from(2)), vec![0, 0]);
        assert_eq!(get_data(&data, &U256::MAX, &U256::from(2)), vec![0, 0]);
        assert!(get_data(&data, &U256::ZERO, &U256::ZERO).is_empty());
    }

    #[test]
    fn test_address_round_trip() {
        let addr = Address::with_last_byte(0xbe);
        assert_eq!(u256_to_address(&address_to_u256(addr)), addr);
    }
}
