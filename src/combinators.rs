//! The fixed pipeline every opcode runs through.
//!
//! Each table entry is plain data: an operation plus two switches. [`apply`]
//! runs the stages in order: conditional gate, operation, operation count,
//! limit check.

use crate::{config::ConsensusLimits, ops::Environment, state::ProgramState, ScriptError};

/// An opcode implementation. Returning an error records it on the state.
pub type Operation = fn(&mut ProgramState, &Environment<'_>) -> Result<(), ScriptError>;

#[derive(Clone, Copy)]
pub struct Entry {
    pub operation: Operation,
    /// Skipped while inside an unexecuted branch.
    pub conditional: bool,
    /// Adds one to the operation count, whether or not it was skipped.
    pub counted: bool,
}

impl Entry {
    /// A counted, conditionally evaluated operation.
    pub const fn new(operation: Operation) -> Self {
        Entry {
            operation,
            conditional: true,
            counted: true,
        }
    }

    /// Counted and run in every branch: conditionals and opcodes that must
    /// fail wherever they appear.
    pub const fn always(operation: Operation) -> Self {
        Entry {
            operation,
            conditional: false,
            counted: true,
        }
    }

    /// Conditionally evaluated but not counted (number pushes).
    pub const fn uncounted(operation: Operation) -> Self {
        Entry {
            operation,
            conditional: true,
            counted: false,
        }
    }

    /// Data pushes gate themselves so oversized pushes fail in any branch.
    pub const fn push(operation: Operation) -> Self {
        Entry {
            operation,
            conditional: false,
            counted: false,
        }
    }
}

/// Runs `entry` against `state`.
pub fn apply(entry: &Entry, mut state: ProgramState, env: &Environment<'_>) -> ProgramState {
    conditionally_evaluate(entry, &mut state, env);
    if entry.counted {
        state.operation_count += 1;
    }
    check_limits(&mut state, &env.limits);
    state
}

fn conditionally_evaluate(entry: &Entry, state: &mut ProgramState, env: &Environment<'_>) {
    if entry.conditional && !state.is_executing() {
        return;
    }
    if let Err(error) = (entry.operation)(state, env) {
        state.apply_error(error);
    }
}

/// Fails the state once the combined stack depth or the operation count
/// passes its ceiling.
pub fn check_limits(state: &mut ProgramState, limits: &ConsensusLimits) {
    if state.stack.len() + state.alternate_stack.len() > limits.maximum_stack_depth {
        state.apply_error(ScriptError::ExceededMaximumStackDepth);
    } else if state.operation_count > limits.maximum_operation_count {
        state.apply_error(ScriptError::ExceededMaximumOperationCount);
    }
}
