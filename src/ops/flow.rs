use super::Environment;
use crate::{script_num::stack_item_is_truthy, state::ProgramState, ScriptError};

pub(crate) fn nop(_: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    Ok(())
}

pub(crate) fn reserved(_: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    Err(ScriptError::CalledReserved)
}

pub(crate) fn disabled(_: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    Err(ScriptError::DisabledOpcode)
}

pub(crate) fn unknown(_: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    Err(ScriptError::UnknownOpcode)
}

pub(crate) fn upgradable_nop(
    _: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    if env.flags.disallows_upgradable_nops() {
        Err(ScriptError::CalledUpgradableNop)
    } else {
        Ok(())
    }
}

fn open_branch(state: &mut ProgramState, negate: bool) -> Result<(), ScriptError> {
    let branch = if state.is_executing() {
        let condition = state.pop()?;
        stack_item_is_truthy(&condition) != negate
    } else {
        false
    };
    state.execution_stack.push(branch);
    Ok(())
}

pub(crate) fn op_if(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    open_branch(state, false)
}

pub(crate) fn op_notif(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    open_branch(state, true)
}

pub(crate) fn op_else(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    let top = state
        .execution_stack
        .last_mut()
        .ok_or(ScriptError::UnexpectedElse)?;
    *top = !*top;
    Ok(())
}

pub(crate) fn op_endif(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    state
        .execution_stack
        .pop()
        .map(|_| ())
        .ok_or(ScriptError::UnexpectedEndIf)
}

pub(crate) fn op_verify(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    let top = state.pop()?;
    if stack_item_is_truthy(&top) {
        Ok(())
    } else {
        Err(ScriptError::FailedVerify)
    }
}

pub(crate) fn op_return(_: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    Err(ScriptError::CalledReturn)
}
