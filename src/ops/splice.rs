use super::Environment;
use crate::{
    script_num::{self, MAXIMUM_SCRIPT_NUMBER_LENGTH},
    state::ProgramState,
    ScriptError,
};

pub(crate) fn op_cat(state: &mut ProgramState, env: &Environment<'_>) -> Result<(), ScriptError> {
    state.require_depth(2)?;
    let b = state.pop()?;
    let mut a = state.pop()?;
    if a.len() + b.len() > env.limits.maximum_stack_item_length {
        return Err(ScriptError::ExceededMaximumStackItemLength);
    }
    a.extend_from_slice(&b);
    state.stack.push(a);
    Ok(())
}

/// `[data n] -> [data[..n] data[n..]]`
pub(crate) fn op_split(state: &mut ProgramState, env: &Environment<'_>) -> Result<(), ScriptError> {
    state.require_depth(2)?;
    let index = state.pop_number(env.requires_minimal(), env.number_length())?;
    let mut data = state.pop()?;
    if index < 0 || index as usize > data.len() {
        return Err(ScriptError::InvalidSplitIndex);
    }
    let tail = data.split_off(index as usize);
    state.stack.push(data);
    state.stack.push(tail);
    Ok(())
}

/// Re-encodes a number at an exact byte length, padding with zeros and
/// keeping the sign in the final byte.
pub(crate) fn op_num2bin(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    state.require_depth(2)?;
    let size = state.pop_number(env.requires_minimal(), env.number_length())?;
    if size > env.limits.maximum_stack_item_length as i64 {
        return Err(ScriptError::ExceededMaximumStackItemLength);
    }
    let target = state.pop()?;
    let minimal = script_num::minimally_encode(&target);
    if minimal.len() as i64 > size {
        return Err(ScriptError::InsufficientLength);
    }
    state
        .stack
        .push(script_num::pad_to_length(&minimal, size as usize));
    Ok(())
}

/// Strips padding so the result is a valid script number operand.
pub(crate) fn op_bin2num(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    let item = state.pop()?;
    let minimal = script_num::minimally_encode(&item);
    if minimal.len() > MAXIMUM_SCRIPT_NUMBER_LENGTH {
        return Err(ScriptError::ExceededMaximumScriptNumberLength);
    }
    state.stack.push(minimal);
    Ok(())
}

/// Pushes the length of the top item without removing it.
pub(crate) fn op_size(state: &mut ProgramState, _: &Environment<'_>) -> Result<(), ScriptError> {
    let length = state.peek(0)?.len();
    state.push_number(length as i64);
    Ok(())
}

pub(crate) fn op_reversebytes(
    state: &mut ProgramState,
    _: &Environment<'_>,
) -> Result<(), ScriptError> {
    let mut item = state.pop()?;
    item.reverse();
    state.stack.push(item);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ConsensusLimits, crypto::NativeCrypto, tx::SpendContext, ScriptFlags};

    type Op = fn(&mut ProgramState, &Environment<'_>) -> Result<(), ScriptError>;

    fn run(op: Op, stack: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, ScriptError> {
        let crypto = NativeCrypto;
        let env = Environment {
            flags: ScriptFlags::default(),
            limits: ConsensusLimits::default(),
            crypto: &crypto,
        };
        let mut state = ProgramState::new(Vec::new(), stack, SpendContext::default());
        op(&mut state, &env)?;
        Ok(state.stack)
    }

    #[test]
    fn cat_respects_item_limit() {
        assert_eq!(
            run(op_cat, vec![vec![1, 2], vec![3]]),
            Ok(vec![vec![1, 2, 3]])
        );
        assert_eq!(
            run(op_cat, vec![vec![0; 300], vec![0; 221]]),
            Err(ScriptError::ExceededMaximumStackItemLength)
        );
        assert_eq!(
            run(op_cat, vec![vec![0; 300], vec![0; 220]]).map(|stack| stack[0].len()),
            Ok(520)
        );
    }

    #[test]
    fn split_bounds() {
        assert_eq!(
            run(op_split, vec![vec![1, 2, 3], vec![1]]),
            Ok(vec![vec![1], vec![2, 3]])
        );
        assert_eq!(
            run(op_split, vec![vec![1, 2, 3], vec![3]]),
            Ok(vec![vec![1, 2, 3], vec![]])
        );
        assert_eq!(
            run(op_split, vec![vec![1, 2, 3], vec![]]),
            Ok(vec![vec![], vec![1, 2, 3]])
        );
        assert_eq!(
            run(op_split, vec![vec![1, 2, 3], vec![4]]),
            Err(ScriptError::InvalidSplitIndex)
        );
        assert_eq!(
            run(op_split, vec![vec![1, 2, 3], vec![0x81]]),
            Err(ScriptError::InvalidSplitIndex)
        );
    }

    #[test]
    fn num2bin_pads_and_moves_sign() {
        assert_eq!(
            run(op_num2bin, vec![vec![0x85], vec![4]]),
            Ok(vec![vec![0x05, 0x00, 0x00, 0x80]])
        );
        assert_eq!(
            run(op_num2bin, vec![vec![0x01, 0x00, 0x00], vec![1]]),
            Ok(vec![vec![0x01]])
        );
        assert_eq!(
            run(op_num2bin, vec![vec![0x01, 0x02], vec![1]]),
            Err(ScriptError::InsufficientLength)
        );
        assert_eq!(
            run(op_num2bin, vec![vec![0x01], vec![0x09, 0x02]]),
            Err(ScriptError::ExceededMaximumStackItemLength)
        );
    }

    #[test]
    fn bin2num_minimizes() {
        assert_eq!(
            run(op_bin2num, vec![vec![0x05, 0x00, 0x00, 0x80]]),
            Ok(vec![vec![0x85]])
        );
        assert_eq!(run(op_bin2num, vec![vec![0x00, 0x80]]), Ok(vec![vec![]]));
        assert_eq!(
            run(op_bin2num, vec![vec![0x01, 0x02, 0x03, 0x04, 0x05]]),
            Err(ScriptError::ExceededMaximumScriptNumberLength)
        );
    }

    #[test]
    fn size_and_reverse() {
        assert_eq!(
            run(op_size, vec![vec![9, 9, 9]]),
            Ok(vec![vec![9, 9, 9], vec![3]])
        );
        assert_eq!(
            run(op_reversebytes, vec![vec![1, 2, 3]]),
            Ok(vec![vec![3, 2, 1]])
        );
    }
}
