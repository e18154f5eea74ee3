use super::Environment;
use crate::{
    instruction::{is_minimal_data_push, Instruction},
    state::ProgramState,
    ScriptError,
};

/// Pushes the data carried by the current instruction.
///
/// Oversized pushes fail even inside an unexecuted branch; the minimal
/// encoding rule only applies to executed pushes.
pub(crate) fn push_data(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    let Some(Instruction::Push { opcode, data }) = state.current_instruction() else {
        return Err(ScriptError::UnknownOpcode);
    };
    if data.len() > env.limits.maximum_stack_item_length {
        return Err(ScriptError::ExceedsMaximumPush);
    }
    if !state.is_executing() {
        return Ok(());
    }
    if env.requires_minimal() && !is_minimal_data_push(*opcode, data) {
        return Err(ScriptError::NonMinimalPush);
    }
    let data = data.clone();
    state.stack.push(data);
    Ok(())
}

/// `OP_1NEGATE` and `OP_1` through `OP_16`.
pub(crate) fn push_small_integer(
    state: &mut ProgramState,
    _: &Environment<'_>,
) -> Result<(), ScriptError> {
    let value = state
        .current_instruction()
        .and_then(|instruction| instruction.opcode().small_integer())
        .ok_or(ScriptError::UnknownOpcode)?;
    state.push_number(value);
    Ok(())
}
