//! Script number arithmetic. Operands are limited to the maximum script
//! number length; results may be one byte longer and are only rejected if a
//! later operation consumes them.

use super::{flow, Environment};
use crate::{state::ProgramState, ScriptError};

fn pop_operand(state: &mut ProgramState, env: &Environment<'_>) -> Result<i64, ScriptError> {
    state.pop_number(env.requires_minimal(), env.number_length())
}

fn unary(
    state: &mut ProgramState,
    env: &Environment<'_>,
    f: impl FnOnce(i64) -> i64,
) -> Result<(), ScriptError> {
    let a = pop_operand(state, env)?;
    state.push_number(f(a));
    Ok(())
}

/// Pops `b` (the top) and then `a`, and pushes `f(a, b)`.
fn binary(
    state: &mut ProgramState,
    env: &Environment<'_>,
    f: impl FnOnce(i64, i64) -> Result<i64, ScriptError>,
) -> Result<(), ScriptError> {
    state.require_depth(2)?;
    let b = pop_operand(state, env)?;
    let a = pop_operand(state, env)?;
    let result = f(a, b)?;
    state.push_number(result);
    Ok(())
}

fn binary_bool(
    state: &mut ProgramState,
    env: &Environment<'_>,
    f: impl FnOnce(i64, i64) -> bool,
) -> Result<(), ScriptError> {
    binary(state, env, |a, b| Ok(i64::from(f(a, b))))
}

pub(crate) fn op_1add(state: &mut ProgramState, env: &Environment<'_>) -> Result<(), ScriptError> {
    unary(state, env, |a| a + 1)
}

pub(crate) fn op_1sub(state: &mut ProgramState, env: &Environment<'_>) -> Result<(), ScriptError> {
    unary(state, env, |a| a - 1)
}

pub(crate) fn op_negate(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    unary(state, env, |a| -a)
}

pub(crate) fn op_abs(state: &mut ProgramState, env: &Environment<'_>) -> Result<(), ScriptError> {
    unary(state, env, i64::abs)
}

pub(crate) fn op_not(state: &mut ProgramState, env: &Environment<'_>) -> Result<(), ScriptError> {
    unary(state, env, |a| i64::from(a == 0))
}

pub(crate) fn op_0notequal(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    unary(state, env, |a| i64::from(a != 0))
}

pub(crate) fn op_add(state: &mut ProgramState, env: &Environment<'_>) -> Result<(), ScriptError> {
    binary(state, env, |a, b| Ok(a + b))
}

pub(crate) fn op_sub(state: &mut ProgramState, env: &Environment<'_>) -> Result<(), ScriptError> {
    binary(state, env, |a, b| Ok(a - b))
}

/// Truncating division.
pub(crate) fn op_div(state: &mut ProgramState, env: &Environment<'_>) -> Result<(), ScriptError> {
    binary(state, env, |a, b| {
        a.checked_div(b).ok_or(ScriptError::DivisionByZero)
    })
}

/// Remainder with the sign of the dividend.
pub(crate) fn op_mod(state: &mut ProgramState, env: &Environment<'_>) -> Result<(), ScriptError> {
    binary(state, env, |a, b| {
        a.checked_rem(b).ok_or(ScriptError::DivisionByZero)
    })
}

pub(crate) fn op_booland(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    binary_bool(state, env, |a, b| a != 0 && b != 0)
}

pub(crate) fn op_boolor(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    binary_bool(state, env, |a, b| a != 0 || b != 0)
}

pub(crate) fn op_numequal(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    binary_bool(state, env, |a, b| a == b)
}

pub(crate) fn op_numequalverify(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    op_numequal(state, env)?;
    flow::op_verify(state, env)
}

pub(crate) fn op_numnotequal(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    binary_bool(state, env, |a, b| a != b)
}

pub(crate) fn op_lessthan(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    binary_bool(state, env, |a, b| a < b)
}

pub(crate) fn op_greaterthan(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    binary_bool(state, env, |a, b| a > b)
}

pub(crate) fn op_lessthanorequal(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    binary_bool(state, env, |a, b| a <= b)
}

pub(crate) fn op_greaterthanorequal(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    binary_bool(state, env, |a, b| a >= b)
}

pub(crate) fn op_min(state: &mut ProgramState, env: &Environment<'_>) -> Result<(), ScriptError> {
    binary(state, env, |a, b| Ok(a.min(b)))
}

pub(crate) fn op_max(state: &mut ProgramState, env: &Environment<'_>) -> Result<(), ScriptError> {
    binary(state, env, |a, b| Ok(a.max(b)))
}

/// `[x min max] -> [min <= x < max]`
pub(crate) fn op_within(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    state.require_depth(3)?;
    let max = pop_operand(state, env)?;
    let min = pop_operand(state, env)?;
    let x = pop_operand(state, env)?;
    state.push_bool(min <= x && x < max);
    Ok(())
}
