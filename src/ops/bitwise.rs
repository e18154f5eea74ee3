use super::{flow, Environment};
use crate::{state::ProgramState, ScriptError};

pub(crate) fn op_equal(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    state.require_depth(2)?;
    let b = state.pop()?;
    let a = state.pop()?;
    state.push_bool(a == b);
    Ok(())
}

pub(crate) fn op_equalverify(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    op_equal(state, env)?;
    flow::op_verify(state, env)
}

fn bitwise(state: &mut ProgramState, f: impl Fn(u8, u8) -> u8) -> Result<(), ScriptError> {
    state.require_depth(2)?;
    let b = state.pop()?;
    let a = state.pop()?;
    if a.len() != b.len() {
        return Err(ScriptError::MismatchedBitwiseOperandLength);
    }
    let result = a.iter().zip(&b).map(|(x, y)| f(*x, *y)).collect();
    state.stack.push(result);
    Ok(())
}

pub(crate) fn op_and(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    bitwise(state, |a, b| a & b)
}

pub(crate) fn op_or(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    bitwise(state, |a, b| a | b)
}

pub(crate) fn op_xor(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    bitwise(state, |a, b| a ^ b)
}
