//! Stack manipulation. Diagrams list items deepest first; the last item is
//! the top of the stack.

use super::Environment;
use crate::{script_num::stack_item_is_truthy, state::ProgramState, ScriptError};

pub(crate) fn op_toaltstack(
    state: &mut ProgramState,
    _: &Environment<'_>,
) -> Result<(), ScriptError> {
    let item = state.pop()?;
    state.alternate_stack.push(item);
    Ok(())
}

pub(crate) fn op_fromaltstack(
    state: &mut ProgramState,
    _: &Environment<'_>,
) -> Result<(), ScriptError> {
    let item = state
        .alternate_stack
        .pop()
        .ok_or(ScriptError::EmptyAlternateStack)?;
    state.stack.push(item);
    Ok(())
}

/// `[a b] -> []`
pub(crate) fn op_2drop(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    state.pop_many(2).map(|_| ())
}

/// `[a b] -> [a b a b]`
pub(crate) fn op_2dup(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    copy_from_depth(state, 2, 2)
}

/// `[a b c] -> [a b c a b c]`
pub(crate) fn op_3dup(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    copy_from_depth(state, 3, 3)
}

/// `[a b c d] -> [a b c d a b]`
pub(crate) fn op_2over(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    copy_from_depth(state, 4, 2)
}

/// `[a b c d e f] -> [c d e f a b]`
pub(crate) fn op_2rot(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    state.require_depth(6)?;
    let start = state.stack.len() - 6;
    state.stack[start..].rotate_left(2);
    Ok(())
}

/// `[a b c d] -> [c d a b]`
pub(crate) fn op_2swap(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    state.require_depth(4)?;
    let start = state.stack.len() - 4;
    state.stack[start..].rotate_left(2);
    Ok(())
}

pub(crate) fn op_ifdup(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    let top = state.peek(0)?;
    if stack_item_is_truthy(top) {
        let copy = top.clone();
        state.stack.push(copy);
    }
    Ok(())
}

pub(crate) fn op_depth(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    state.push_number(state.stack.len() as i64);
    Ok(())
}

pub(crate) fn op_drop(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    state.pop().map(|_| ())
}

pub(crate) fn op_dup(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    copy_from_depth(state, 1, 1)
}

/// `[a b] -> [b]`
pub(crate) fn op_nip(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    state.require_depth(2)?;
    let index = state.stack.len() - 2;
    state.stack.remove(index);
    Ok(())
}

/// `[a b] -> [a b a]`
pub(crate) fn op_over(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    copy_from_depth(state, 2, 1)
}

pub(crate) fn op_pick(state: &mut ProgramState, env: &Environment<'_>) -> Result<(), ScriptError> {
    let index = stack_index(state, env)?;
    let item = state.stack[index].clone();
    state.stack.push(item);
    Ok(())
}

pub(crate) fn op_roll(state: &mut ProgramState, env: &Environment<'_>) -> Result<(), ScriptError> {
    let index = stack_index(state, env)?;
    let item = state.stack.remove(index);
    state.stack.push(item);
    Ok(())
}

/// `[a b c] -> [b c a]`
pub(crate) fn op_rot(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    state.require_depth(3)?;
    let start = state.stack.len() - 3;
    state.stack[start..].rotate_left(1);
    Ok(())
}

/// `[a b] -> [b a]`
pub(crate) fn op_swap(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    state.require_depth(2)?;
    let len = state.stack.len();
    state.stack.swap(len - 2, len - 1);
    Ok(())
}

/// `[a b] -> [b a b]`
pub(crate) fn op_tuck(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    state.require_depth(2)?;
    let len = state.stack.len();
    let top = state.stack[len - 1].clone();
    state.stack.insert(len - 2, top);
    Ok(())
}

/// Appends copies of `count` items starting `depth` items below the top.
fn copy_from_depth(
    state: &mut ProgramState,
    depth: usize,
    count: usize,
) -> Result<(), ScriptError> {
    state.require_depth(depth)?;
    let start = state.stack.len() - depth;
    let copies = state.stack[start..start + count].to_vec();
    state.stack.extend(copies);
    Ok(())
}

/// Pops `n` and returns the absolute index of the item `n` positions below
/// the (new) top.
fn stack_index(state: &mut ProgramState, env: &Environment<'_>) -> Result<usize, ScriptError> {
    let depth = state.pop_number(env.requires_minimal(), env.number_length())?;
    let len = state.stack.len() as i64;
    if depth < 0 || depth >= len {
        return Err(ScriptError::InvalidStackIndex);
    }
    Ok((len - 1 - depth) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ConsensusLimits, crypto::NativeCrypto, tx::SpendContext, ScriptFlags};

    type Op = fn(&mut ProgramState, &Environment<'_>) -> Result<(), ScriptError>;

    fn run(op: Op, stack: &[u8]) -> Result<Vec<u8>, ScriptError> {
        let crypto = NativeCrypto;
        let env = Environment {
            flags: ScriptFlags::default(),
            limits: ConsensusLimits::default(),
            crypto: &crypto,
        };
        let items = stack.iter().map(|byte| vec![*byte]).collect();
        let mut state = ProgramState::new(Vec::new(), items, SpendContext::default());
        op(&mut state, &env)?;
        Ok(state.stack.into_iter().map(|item| item.first().copied().unwrap_or(0)).collect())
    }

    #[test]
    fn positional_semantics() {
        assert_eq!(run(op_2dup, &[1, 2]), Ok(vec![1, 2, 1, 2]));
        assert_eq!(run(op_3dup, &[1, 2, 3]), Ok(vec![1, 2, 3, 1, 2, 3]));
        assert_eq!(run(op_2over, &[1, 2, 3, 4]), Ok(vec![1, 2, 3, 4, 1, 2]));
        assert_eq!(run(op_2rot, &[1, 2, 3, 4, 5, 6]), Ok(vec![3, 4, 5, 6, 1, 2]));
        assert_eq!(run(op_2swap, &[1, 2, 3, 4]), Ok(vec![3, 4, 1, 2]));
        assert_eq!(run(op_nip, &[1, 2]), Ok(vec![2]));
        assert_eq!(run(op_over, &[1, 2]), Ok(vec![1, 2, 1]));
        assert_eq!(run(op_rot, &[1, 2, 3]), Ok(vec![2, 3, 1]));
        assert_eq!(run(op_swap, &[1, 2]), Ok(vec![2, 1]));
        assert_eq!(run(op_tuck, &[1, 2]), Ok(vec![2, 1, 2]));
        assert_eq!(run(op_depth, &[7, 7, 7]), Ok(vec![7, 7, 7, 3]));
    }

    #[test]
    fn pick_and_roll_index_from_the_top() {
        assert_eq!(run(op_pick, &[1, 2, 3, 2]), Ok(vec![1, 2, 3, 1]));
        assert_eq!(run(op_roll, &[1, 2, 3, 2]), Ok(vec![2, 3, 1]));
        assert_eq!(run(op_pick, &[1, 2, 3]), Err(ScriptError::InvalidStackIndex));
        assert_eq!(run(op_roll, &[1, 0x81]), Err(ScriptError::InvalidStackIndex));
    }

    #[test]
    fn ifdup_only_copies_truthy_items() {
        assert_eq!(run(op_ifdup, &[5]), Ok(vec![5, 5]));
        assert_eq!(run(op_ifdup, &[0]), Ok(vec![0]));
    }

    #[test]
    fn underflow_reports_empty_stack() {
        assert_eq!(run(op_2rot, &[1, 2, 3, 4, 5]), Err(ScriptError::EmptyStack));
        assert_eq!(run(op_tuck, &[1]), Err(ScriptError::EmptyStack));
        assert_eq!(run(op_fromaltstack, &[1]), Err(ScriptError::EmptyAlternateStack));
    }
}
