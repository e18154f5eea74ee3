//! Error taxonomy produced while evaluating authentication bytecode.
//!
//! Script errors are data: the first one raised is stored on the
//! [`ProgramState`](crate::ProgramState) and halts the evaluation pass. API
//! level failures (bad transaction bytes, out-of-range input index) are
//! reported separately through [`Error`](crate::Error).

use thiserror::Error;

/// Reasons an evaluation can fail.
///
/// The first group is shared by every instruction set; the second group
/// only arises under the Bitcoin Cash rules.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScriptError {
    #[error("program called an OP_RESERVED-style operation")]
    CalledReserved,
    #[error("program called OP_RETURN")]
    CalledReturn,
    #[error("program called an upgradable NOP while they are disallowed")]
    CalledUpgradableNop,
    #[error("OP_CHECKSEQUENCEVERIFY requires a transaction version of at least 2")]
    CheckSequenceUnavailable,
    #[error("program contains a disabled opcode")]
    DisabledOpcode,
    #[error("tried to read from an empty alternate stack")]
    EmptyAlternateStack,
    #[error("tried to read from an empty stack")]
    EmptyStack,
    #[error("locking bytecode exceeds the maximum bytecode length")]
    ExceededMaximumBytecodeLengthLocking,
    #[error("unlocking bytecode exceeds the maximum bytecode length")]
    ExceededMaximumBytecodeLengthUnlocking,
    #[error("combined stack and alternate stack depth exceeds the maximum")]
    ExceededMaximumStackDepth,
    #[error("stack item exceeds the maximum stack item length")]
    ExceededMaximumStackItemLength,
    #[error("program exceeds the maximum operation count")]
    ExceededMaximumOperationCount,
    #[error("OP_CHECKMULTISIG public key count exceeds the maximum")]
    ExceedsMaximumMultisigPublicKeyCount,
    #[error("push instruction exceeds the maximum push length")]
    ExceedsMaximumPush,
    #[error("program failed an OP_VERIFY-style check")]
    FailedVerify,
    #[error("OP_PICK or OP_ROLL referenced an invalid stack index")]
    InvalidStackIndex,
    #[error("locktime type does not match the transaction locktime type")]
    IncompatibleLocktimeType,
    #[error("sequence type does not match the input sequence type")]
    IncompatibleSequenceType,
    #[error("OP_CHECKMULTISIG requires more signatures than public keys")]
    InsufficientPublicKeys,
    #[error("expected a non-negative number")]
    InvalidNaturalNumber,
    #[error("OP_CHECKMULTISIG protocol bug value must be empty")]
    InvalidProtocolBugValue,
    #[error("invalid public key encoding")]
    InvalidPublicKeyEncoding,
    #[error("invalid script number encoding")]
    InvalidScriptNumber,
    #[error("invalid signature encoding")]
    InvalidSignatureEncoding,
    #[error("locktime is disabled for this input (sequence is final)")]
    LocktimeDisabled,
    #[error("locking bytecode is malformed")]
    MalformedLockingBytecode,
    #[error("unlocking bytecode is malformed")]
    MalformedUnlockingBytecode,
    #[error("locktime must not be negative")]
    NegativeLocktime,
    #[error("program ended with an unclosed conditional")]
    NonEmptyExecutionStack,
    #[error("push is not minimally encoded")]
    NonMinimalPush,
    #[error("failed signature checks require an empty signature")]
    NonNullSignatureFailure,
    #[error("program must end with exactly one stack item")]
    RequiresCleanStack,
    #[error("OP_CHECKMULTISIG does not accept Schnorr-sized signatures")]
    SchnorrSizedSignatureInCheckMultiSig,
    #[error("OP_ELSE without a matching OP_IF")]
    UnexpectedElse,
    #[error("OP_ENDIF without a matching OP_IF")]
    UnexpectedEndIf,
    #[error("program called an unknown opcode")]
    UnknownOpcode,
    #[error("required sequence is enabled but the input sequence is disabled")]
    UnmatchedSequenceDisable,
    #[error("transaction locktime is lower than the required locktime")]
    UnsatisfiedLocktime,
    #[error("input sequence number is lower than the required sequence number")]
    UnsatisfiedSequenceNumber,
    #[error("program ended with a non-truthy stack item")]
    UnsuccessfulEvaluation,

    #[error("division by zero")]
    DivisionByZero,
    #[error("number exceeds the maximum script number length")]
    ExceededMaximumScriptNumberLength,
    #[error("OP_NUM2BIN target length is too small for the number")]
    InsufficientLength,
    #[error("OP_SPLIT index is out of range")]
    InvalidSplitIndex,
    #[error("P2SH redeem bytecode is malformed")]
    MalformedP2shBytecode,
    #[error("bitwise operands must have equal lengths")]
    MismatchedBitwiseOperandLength,
    #[error("unlocking bytecode must contain only push operations")]
    RequiresPushOnly,
}

impl ScriptError {
    /// Whether the error was raised before any instruction executed.
    pub fn is_parse_error(self) -> bool {
        matches!(
            self,
            ScriptError::ExceededMaximumBytecodeLengthLocking
                | ScriptError::ExceededMaximumBytecodeLengthUnlocking
                | ScriptError::MalformedLockingBytecode
                | ScriptError::MalformedUnlockingBytecode
                | ScriptError::MalformedP2shBytecode
                | ScriptError::RequiresPushOnly
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_are_distinguished() {
        assert!(ScriptError::MalformedUnlockingBytecode.is_parse_error());
        assert!(ScriptError::RequiresPushOnly.is_parse_error());
        assert!(!ScriptError::EmptyStack.is_parse_error());
        assert!(!ScriptError::UnknownOpcode.is_parse_error());
    }

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(ScriptError::DivisionByZero.to_string(), "division by zero");
        assert_eq!(
            ScriptError::CalledReturn.to_string(),
            "program called OP_RETURN"
        );
    }
}
