//! Per-opcode gas cost calculators.
//!
//! Dynamic costs are pure functions of the visible stack operands and the
//! current memory size, so the interpreter can charge the full price of an
//! opcode before executing it. The only mutation allowed here is refund
//! bookkeeping on the state store, which is not observable by the frame.

use alloy_primitives::U256;
use kunlun_params::protocol::{
    CALL_NEW_ACCOUNT_GAS, CALL_VALUE_TRANSFER_GAS, COPY_GAS, EXP_GAS, LOG_DATA_GAS, LOG_GAS,
    LOG_TOPIC_GAS, MEMORY_GAS, QUAD_COEFF_DIV, SHA3_GAS, SHA3_WORD_GAS, SSTORE_CLEAR_GAS,
    SSTORE_REFUND_GAS, SSTORE_RESET_GAS, SSTORE_SET_GAS, SUICIDE_REFUND_GAS,
};
use kunlun_params::GasTable;

use super::contract::Contract;
use super::errors::VmError;
use super::evm::Evm;
use super::memory::Memory;
use super::stack::Stack;

// Constant cost tiers shared by most opcodes.
pub const GAS_QUICK_STEP: u64 = 2;
pub const GAS_FASTEST_STEP: u64 = 3;
pub const GAS_FAST_STEP: u64 = 5;
pub const GAS_MID_STEP: u64 = 8;
pub const GAS_SLOW_STEP: u64 = 10;
pub const GAS_EXT_STEP: u64 = 20;

// Subroutine opcode costs.
pub const GAS_BEGIN_SUB: u64 = 2;
pub const GAS_RETURN_SUB: u64 = 5;
pub const GAS_JUMP_SUB: u64 = 10;

/// The ceiling on a memory expansion request that can still be priced in
/// a u64. Anything above this overflows the cost equation.
const MAX_EXPANDABLE_MEMORY: u64 = 0x1FFFFFFFE0;

/// Dynamic gas: a function of the gas table, the EVM, the frame, and the
/// visible operands. `memory_size` is the word-aligned byte size the
/// interpreter will expand memory to before execution.
pub type GasFunc =
    fn(&GasTable, &mut Evm<'_>, &Contract, &Stack, &Memory, u64) -> Result<u64, VmError>;

/// The highest memory byte offset an opcode will access, derived from its
/// stack operands.
pub type MemorySizeFunc = fn(&Stack) -> Result<u64, VmError>;

/// Rounds a byte size up to the number of 32-byte words.
pub fn to_word_size(size: u64) -> u64 {
    if size > u64::MAX - 31 {
        return u64::MAX / 32 + 1;
    }
    (size + 31) / 32
}

fn safe_add(a: u64, b: u64) -> Result<u64, VmError> {
    a.checked_add(b).ok_or(VmError::GasUintOverflow)
}

fn safe_mul(a: u64, b: u64) -> Result<u64, VmError> {
    a.checked_mul(b).ok_or(VmError::GasUintOverflow)
}

/// Computes `offset + len` as the required memory size, rejecting values
/// that cannot be priced.
pub fn calc_mem_size(offset: &U256, len: &U256) -> Result<u64, VmError> {
    if len.is_zero() {
        return Ok(0);
    }
    let end = offset.checked_add(*len).ok_or(VmError::GasUintOverflow)?;
    if end.bit_len() > 64 {
        return Err(VmError::GasUintOverflow);
    }
    Ok(end.as_limbs()[0])
}

fn quadratic_cost(words: u64) -> u64 {
    MEMORY_GAS * words + words * words / QUAD_COEFF_DIV
}

/// The cost of expanding memory to `new_size` bytes: the quadratic total
/// at the new size minus the quadratic total already paid.
pub fn memory_gas_cost(mem: &Memory, new_size: u64) -> Result<u64, VmError> {
    if new_size == 0 {
        return Ok(0);
    }
    if new_size > MAX_EXPANDABLE_MEMORY {
        return Err(VmError::GasUintOverflow);
    }
    let new_cost = quadratic_cost(to_word_size(new_size));
    let current_cost = quadratic_cost(to_word_size(mem.len() as u64));
    Ok(new_cost.saturating_sub(current_cost))
}

/// The gas granted to an outbound call: all but one 64th of what remains
/// after the call's own cost, capped by the requested amount.
pub fn call_gas(available: u64, base: u64, requested: &U256) -> Result<u64, VmError> {
    let available = available.saturating_sub(base);
    let gas = available - available / 64;
    if requested.bit_len() > 64 || U256::from(gas) < *requested {
        return Ok(gas);
    }
    Ok(requested.as_limbs()[0])
}

// --- dynamic gas functions, one per table-priced or operand-priced opcode ---

pub fn gas_balance(
    gt: &GasTable,
    _evm: &mut Evm<'_>,
    _contract: &Contract,
    _stack: &Stack,
    _mem: &Memory,
    _memory_size: u64,
) -> Result<u64, VmError> {
    Ok(gt.balance)
}

pub fn gas_sload(
    gt: &GasTable,
    _evm: &mut Evm<'_>,
    _contract: &Contract,
    _stack: &Stack,
    _mem: &Memory,
    _memory_size: u64,
) -> Result<u64, VmError> {
    Ok(gt.sload)
}

pub fn gas_ext_code_size(
    gt: &GasTable,
    _evm: &mut Evm<'_>,
    _contract: &Contract,
    _stack: &Stack,
    _mem: &Memory,
    _memory_size: u64,
) -> Result<u64, VmError> {
    Ok(gt.ext_code_size)
}

pub fn gas_ext_code_hash(
    gt: &GasTable,
    _evm: &mut Evm<'_>,
    _contract: &Contract,
    _stack: &Stack,
    _mem: &Memory,
    _memory_size: u64,
) -> Result<u64, VmError> {
    Ok(gt.ext_code_hash)
}

pub fn gas_exp(
    gt: &GasTable,
    _evm: &mut Evm<'_>,
    _contract: &Contract,
    stack: &Stack,
    _mem: &Memory,
    _memory_size: u64,
) -> Result<u64, VmError> {
    let exp_byte_len = (stack.back(1)?.bit_len() as u64 + 7) / 8;
    safe_add(EXP_GAS, safe_mul(gt.exp_byte, exp_byte_len)?)
}

/// Memory expansion only; used by MLOAD/MSTORE/MSTORE8/RETURN/REVERT and
/// the CREATE family.
pub fn gas_mem(
    _gt: &GasTable,
    _evm: &mut Evm<'_>,
    _contract: &Contract,
    _stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> Result<u64, VmError> {
    memory_gas_cost(mem, memory_size)
}

pub fn gas_sha3(
    _gt: &GasTable,
    _evm: &mut Evm<'_>,
    _contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> Result<u64, VmError> {
    let gas = memory_gas_cost(mem, memory_size)?;
    let len = stack.back(1)?;
    if len.bit_len() > 64 {
        return Err(VmError::GasUintOverflow);
    }
    let word_gas = safe_mul(SHA3_WORD_GAS, to_word_size(len.as_limbs()[0]))?;
    safe_add(gas, safe_add(SHA3_GAS, word_gas)?)
}

pub fn gas_create2(
    _gt: &GasTable,
    _evm: &mut Evm<'_>,
    _contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> Result<u64, VmError> {
    let gas = memory_gas_cost(mem, memory_size)?;
    let len = stack.back(2)?;
    if len.bit_len() > 64 {
        return Err(VmError::GasUintOverflow);
    }
    safe_add(gas, safe_mul(SHA3_WORD_GAS, to_word_size(len.as_limbs()[0]))?)
}

fn copier_gas(
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
    len_slot: usize,
) -> Result<u64, VmError> {
    let gas = memory_gas_cost(mem, memory_size)?;
    let len = stack.back(len_slot)?;
    if len.bit_len() > 64 {
        return Err(VmError::GasUintOverflow);
    }
    safe_add(gas, safe_mul(COPY_GAS, to_word_size(len.as_limbs()[0]))?)
}

pub fn gas_calldata_copy(
    _gt: &GasTable,
    _evm: &mut Evm<'_>,
    _contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> Result<u64, VmError> {
    copier_gas(stack, mem, memory_size, 2)
}

pub fn gas_code_copy(
    _gt: &GasTable,
    _evm: &mut Evm<'_>,
    _contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> Result<u64, VmError> {
    copier_gas(stack, mem, memory_size, 2)
}

pub fn gas_return_data_copy(
    _gt: &GasTable,
    _evm: &mut Evm<'_>,
    _contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> Result<u64, VmError> {
    copier_gas(stack, mem, memory_size, 2)
}

pub fn gas_ext_code_copy(
    gt: &GasTable,
    _evm: &mut Evm<'_>,
    _contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> Result<u64, VmError> {
    let gas = memory_gas_cost(mem, memory_size)?;
    let len = stack.back(3)?;
    if len.bit_len() > 64 {
        return Err(VmError::GasUintOverflow);
    }
    let copy = safe_mul(COPY_GAS, to_word_size(len.as_limbs()[0]))?;
    safe_add(gas, safe_add(gt.ext_code_copy, copy)?)
}

/// Builds the LOGn cost: base, per-topic, per-byte, and memory expansion.
pub fn gas_log<const N: u64>(
    _gt: &GasTable,
    _evm: &mut Evm<'_>,
    _contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> Result<u64, VmError> {
    let len = stack.back(1)?;
    if len.bit_len() > 64 {
        return Err(VmError::GasUintOverflow);
    }
    let mut gas = memory_gas_cost(mem, memory_size)?;
    gas = safe_add(gas, LOG_GAS)?;
    gas = safe_add(gas, safe_mul(LOG_TOPIC_GAS, N)?)?;
    safe_add(gas, safe_mul(LOG_DATA_GAS, len.as_limbs()[0])?)
}

pub fn gas_sstore(
    _gt: &GasTable,
    evm: &mut Evm<'_>,
    contract: &Contract,
    stack: &Stack,
    _mem: &Memory,
    _memory_size: u64,
) -> Result<u64, VmError> {
    let key = alloy_primitives::B256::from(*stack.back(0)?);
    let value = stack.back(1)?;
    let current = evm.state.get_state(contract.address(), key);

    if current.is_zero() && !value.is_zero() {
        // fresh slot
        Ok(SSTORE_SET_GAS)
    } else if !current.is_zero() && value.is_zero() {
        // clearing a slot refunds
        evm.state.add_refund(SSTORE_REFUND_GAS);
        Ok(SSTORE_CLEAR_GAS)
    } else {
        Ok(SSTORE_RESET_GAS)
    }
}

pub fn gas_suicide(
    gt: &GasTable,
    evm: &mut Evm<'_>,
    contract: &Contract,
    stack: &Stack,
    _mem: &Memory,
    _memory_size: u64,
) -> Result<u64, VmError> {
    let beneficiary = super::instructions::u256_to_address(stack.back(0)?);
    let mut gas = gt.suicide;

    if evm.chain_rules.remove_empty_account {
        if evm.state.empty(beneficiary)
            && !evm.state.get_balance(contract.address()).is_zero()
        {
            gas = safe_add(gas, CALL_NEW_ACCOUNT_GAS)?;
        }
    } else if !evm.state.exist(beneficiary) {
        gas = safe_add(gas, CALL_NEW_ACCOUNT_GAS)?;
    }

    if !evm.state.has_suicided(contract.address()) {
        evm.state.add_refund(SUICIDE_REFUND_GAS);
    }
    Ok(gas)
}

pub fn gas_call(
    gt: &GasTable,
    evm: &mut Evm<'_>,
    contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> Result<u64, VmError> {
    let target = super::instructions::u256_to_address(stack.back(1)?);
    let value = stack.back(2)?;

    let mut gas = gt.calls;
    if evm.chain_rules.remove_empty_account {
        if evm.state.empty(target) && !value.is_zero() {
            gas = safe_add(gas, CALL_NEW_ACCOUNT_GAS)?;
        }
    } else if !evm.state.exist(target) {
        gas = safe_add(gas, CALL_NEW_ACCOUNT_GAS)?;
    }
    if !value.is_zero() {
        gas = safe_add(gas, CALL_VALUE_TRANSFER_GAS)?;
    }
    gas = safe_add(gas, memory_gas_cost(mem, memory_size)?)?;

    evm.call_gas_temp = call_gas(contract.gas_remaining, gas, stack.back(0)?)?;
    safe_add(gas, evm.call_gas_temp)
}

pub fn gas_call_code(
    gt: &GasTable,
    evm: &mut Evm<'_>,
    contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> Result<u64, VmError> {
    let value = stack.back(2)?;

    let mut gas = gt.calls;
    if !value.is_zero() {
        gas = safe_add(gas, CALL_VALUE_TRANSFER_GAS)?;
    }
    gas = safe_add(gas, memory_gas_cost(mem, memory_size)?)?;

    evm.call_gas_temp = call_gas(contract.gas_remaining, gas, stack.back(0)?)?;
    safe_add(gas, evm.call_gas_temp)
}

pub fn gas_delegate_call(
    gt: &GasTable,
    evm: &mut Evm<'_>,
    contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> Result<u64, VmError> {
    let gas = safe_add(gt.calls, memory_gas_cost(mem, memory_size)?)?;
    evm.call_gas_temp = call_gas(contract.gas_remaining, gas, stack.back(0)?)?;
    safe_add(gas, evm.call_gas_temp)
}

pub fn gas_static_call(
    gt: &GasTable,
    evm: &mut Evm<'_>,
    contract: &Contract,
    stack: &Stack,
    mem: &Memory,
    memory_size: u64,
) -> Result<u64, VmError> {
    let gas = safe_add(gt.calls, memory_gas_cost(mem, memory_size)?)?;
    evm.call_gas_temp = call_gas(contract.gas_remaining, gas, stack.back(0)?)?;
    safe_add(gas, evm.call_gas_temp)
}

// --- memory size functions ---

pub fn memory_sha3(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.back(0)?, stack.back(1)?)
}

pub fn memory_calldata_copy(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.back(0)?, stack.back(2)?)
}

pub fn memory_return_data_copy(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.back(0)?, stack.back(2)?)
}

pub fn memory_code_copy(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.back(0)?, stack.back(2)?)
}

pub fn memory_ext_code_copy(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.back(1)?, stack.back(3)?)
}

pub fn memory_mload(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.back(0)?, &U256::from(32))
}

pub fn memory_mstore(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.back(0)?, &U256::from(32))
}

pub fn memory_mstore8(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.back(0)?, &U256::from(1))
}

pub fn memory_create(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.back(1)?, stack.back(2)?)
}

pub fn memory_create2(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.back(1)?, stack.back(2)?)
}

pub fn memory_call(stack: &Stack) -> Result<u64, VmError> {
    let input = calc_mem_size(stack.back(3)?, stack.back(4)?)?;
    let ret = calc_mem_size(stack.back(5)?, stack.back(6)?)?;
    Ok(input.max(ret))
}

pub fn memory_delegate_call(stack: &Stack) -> Result<u64, VmError> {
    let input = calc_mem_size(stack.back(2)?, stack.back(3)?)?;
    let ret = calc_mem_size(stack.back(4)?, stack.back(5)?)?;
    Ok(input.max(ret))
}

pub fn memory_static_call(stack: &Stack) -> Result<u64, VmError> {
    let input = calc_mem_size(stack.back(2)?, stack.back(3)?)?;
    let ret = calc_mem_size(stack.back(4)?, stack.back(5)?)?;
    Ok(input.max(ret))
}

pub fn memory_return(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.back(0)?, stack.back(1)?)
}

pub fn memory_revert(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.back(0)?, stack.back(1)?)
}

pub fn memory_log(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.back(0)?, stack.back(1)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_word_size() {
        assert_eq!(to_word_size(0), 0);
        assert_eq!(to_word_size(1), 1);
        assert_eq!(to_word_size(32), 1);
        assert_eq!(to_word_size(33), 2);
        assert_eq!(to_word_size(u64::MAX), u64::MAX / 32 + 1);
    }

    #[test]
    fn test_memory_gas_first_word() {
        let mem = Memory::new();
        assert_eq!(memory_gas_cost(&mem, 32).unwrap(), 3);
        assert_eq!(memory_gas_cost(&mem, 0).unwrap(), 0);
    }

    #[test]
    fn test_memory_gas_is_delta() {
        let mut mem = Memory::new();
        mem.resize(32);
        // already paid for one word
        assert_eq!(memory_gas_cost(&mem, 32).unwrap(), 0);
        assert_eq!(memory_gas_cost(&mem, 64).unwrap(), 3);
    }

    #[test]
    fn test_memory_gas_quadratic_part() {
        let mem = Memory::new();
        // 1024 words: 3*1024 + 1024^2/512 = 3072 + 2048
        assert_eq!(memory_gas_cost(&mem, 1024 * 32).unwrap(), 5120);
    }

    #[test]
    fn test_memory_gas_overflow_guard() {
        let mem = Memory::new();
        assert_eq!(memory_gas_cost(&mem, u64::MAX), Err(VmError::GasUintOverflow));
    }

    #[test]
    fn test_calc_mem_size() {
        assert_eq!(calc_mem_size(&U256::from(64), &U256::ZERO).unwrap(), 0);
        assert_eq!(calc_mem_size(&U256::from(64), &U256::from(32)).unwrap(), 96);
        assert_eq!(
            calc_mem_size(&U256::MAX, &U256::from(1)),
            Err(VmError::GasUintOverflow)
        );
    }

    #[test]
    fn test_call_gas_cap() {
        // 64000 available: cap is 64000 - 1000 = 63000 - 63000/64
        let capped = call_gas(64000, 1000, &U256::MAX).unwrap();
        assert_eq!(capped, 63000 - 63000 / 64);
        // a modest request passes through untouched
        assert_eq!(call_gas(64000, 1000, &U256::from(5000)).unwrap(), 5000);
    }
}
