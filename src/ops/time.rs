//! Relative and absolute time-lock checks. Both leave the stack untouched on
//! success.

use super::Environment;
use crate::{
    script_num::{self, MAXIMUM_LOCKTIME_NUMBER_LENGTH},
    state::ProgramState,
    ScriptError,
};

/// Locktimes below this are block heights, above it UNIX timestamps.
const LOCKTIME_THRESHOLD: i64 = 500_000_000;
const SEQUENCE_FINAL: u32 = 0xffff_ffff;
const SEQUENCE_LOCKTIME_DISABLE_FLAG: i64 = 1 << 31;
const SEQUENCE_LOCKTIME_TYPE_FLAG: i64 = 1 << 22;
const SEQUENCE_LOCKTIME_MASK: i64 = 0x0000_ffff;

/// Reads the top item as a (non-negative) 5-byte script number.
fn peek_locktime(state: &ProgramState, env: &Environment<'_>) -> Result<i64, ScriptError> {
    let item = state.peek(0)?;
    let value = script_num::decode(item, env.requires_minimal(), MAXIMUM_LOCKTIME_NUMBER_LENGTH)?;
    if value < 0 {
        return Err(ScriptError::NegativeLocktime);
    }
    Ok(value)
}

pub(crate) fn op_checklocktimeverify(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    let required = peek_locktime(state, env)?;
    let locktime = i64::from(state.context.locktime);
    if (required < LOCKTIME_THRESHOLD) != (locktime < LOCKTIME_THRESHOLD) {
        return Err(ScriptError::IncompatibleLocktimeType);
    }
    if required > locktime {
        return Err(ScriptError::UnsatisfiedLocktime);
    }
    if state.context.sequence == SEQUENCE_FINAL {
        return Err(ScriptError::LocktimeDisabled);
    }
    Ok(())
}

pub(crate) fn op_checksequenceverify(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    let required = peek_locktime(state, env)?;
    if required & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
        return Ok(());
    }
    if state.context.version < 2 {
        return Err(ScriptError::CheckSequenceUnavailable);
    }
    let sequence = i64::from(state.context.sequence);
    if sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
        return Err(ScriptError::UnmatchedSequenceDisable);
    }
    if required & SEQUENCE_LOCKTIME_TYPE_FLAG != sequence & SEQUENCE_LOCKTIME_TYPE_FLAG {
        return Err(ScriptError::IncompatibleSequenceType);
    }
    if required & SEQUENCE_LOCKTIME_MASK > sequence & SEQUENCE_LOCKTIME_MASK {
        return Err(ScriptError::UnsatisfiedSequenceNumber);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ConsensusLimits, crypto::NativeCrypto, tx::SpendContext, ScriptFlags};

    type Op = fn(&mut ProgramState, &Environment<'_>) -> Result<(), ScriptError>;

    fn check(op: Op, required: i64, context: SpendContext) -> Result<(), ScriptError> {
        let crypto = NativeCrypto;
        let env = Environment {
            flags: ScriptFlags::default(),
            limits: ConsensusLimits::default(),
            crypto: &crypto,
        };
        let item = script_num::encode(required);
        let mut state = ProgramState::new(Vec::new(), vec![item.clone()], context);
        op(&mut state, &env)?;
        assert_eq!(state.stack, vec![item]);
        Ok(())
    }

    fn context(version: u32, locktime: u32, sequence: u32) -> SpendContext {
        SpendContext {
            version,
            locktime,
            sequence,
            ..SpendContext::default()
        }
    }

    #[test]
    fn locktime_rules() {
        let op = op_checklocktimeverify;
        assert_eq!(check(op, 100, context(2, 100, 0)), Ok(()));
        assert_eq!(check(op, 101, context(2, 100, 0)), Err(ScriptError::UnsatisfiedLocktime));
        assert_eq!(
            check(op, 100, context(2, 600_000_000, 0)),
            Err(ScriptError::IncompatibleLocktimeType)
        );
        assert_eq!(check(op, 100, context(2, 100, u32::MAX)), Err(ScriptError::LocktimeDisabled));
        assert_eq!(check(op, -1, context(2, 100, 0)), Err(ScriptError::NegativeLocktime));
        // five-byte operands are accepted
        assert_eq!(
            check(op, 4_000_000_000, context(2, 4_000_000_000, 0)),
            Ok(())
        );
    }

    #[test]
    fn sequence_rules() {
        let op = op_checksequenceverify;
        assert_eq!(check(op, 10, context(2, 0, 10)), Ok(()));
        assert_eq!(check(op, 11, context(2, 0, 10)), Err(ScriptError::UnsatisfiedSequenceNumber));
        assert_eq!(check(op, 10, context(1, 0, 10)), Err(ScriptError::CheckSequenceUnavailable));
        assert_eq!(
            check(op, 10, context(2, 0, 1 << 31)),
            Err(ScriptError::UnmatchedSequenceDisable)
        );
        assert_eq!(
            check(op, 10 | (1 << 22), context(2, 0, 10)),
            Err(ScriptError::IncompatibleSequenceType)
        );
        // a disabled requirement always passes
        assert_eq!(check(op, 1 << 31, context(1, 0, 0)), Ok(()));
    }
}
