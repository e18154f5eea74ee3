//! Pure-Rust Bitcoin Cash authentication virtual machine.
//!
//! The crate evaluates the unlocking and locking bytecode of a transaction
//! input (plus pay-to-script-hash redeem bytecode) under a selectable Bitcoin
//! Cash rule set. Byte-level entry points mirror the classic consensus
//! library API ([`verify`], [`verify_with_flags`]); [`VirtualMachine`] exposes
//! stepping, full evaluation and debugging traces for tooling.

pub mod config;
pub mod crypto;
pub mod encoding;
pub mod instruction;
pub mod opcodes;
pub mod script_num;
pub mod signing;

mod combinators;
mod error;
mod ops;
mod script;
mod state;
mod tx;
mod vm;

use core::fmt;
use std::sync::Arc;

use bitcoin::{Amount, ScriptBuf, TxOut};
use thiserror::Error;

pub use crate::{
    config::{
        activation_time_to_version, ConsensusLimits, InstructionSetVersion, ScriptFlags, VmConfig,
    },
    crypto::{Crypto, NativeCrypto},
    error::ScriptError,
    instruction::{Instruction, MalformedInstruction, ParsedInstruction},
    opcodes::Opcode,
    script::BchInstructionSet,
    signing::SigningSerializationType,
    state::ProgramState,
    tx::{AuthenticationProgram, PrecomputedTransactionData, SpendContext, TransactionContext},
    vm::{InstructionSet, VirtualMachine},
};

/// Require a single byte representation for data pushes and script numbers.
pub const VERIFY_MINIMALDATA: u32 = 1 << 6;
/// Fail on `OP_NOP1` and `OP_NOP4` through `OP_NOP10`.
pub const VERIFY_DISALLOW_UPGRADABLE_NOPS: u32 = 1 << 7;
/// Require the extra item consumed by `OP_CHECKMULTISIG` to be empty.
pub const VERIFY_BUG_VALUE_ZERO: u32 = 1 << 4;
/// Failed signature checks must use an empty signature.
pub const VERIFY_NULLFAIL: u32 = 1 << 14;
/// Enable `OP_REVERSEBYTES` (2020-05 upgrade).
pub const VERIFY_REVERSEBYTES: u32 = 1 << 23;

/// Verification failure carrying both the API-level error and, for failed
/// evaluations, the script error that ended it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScriptFailure {
    pub error: Error,
    pub script_error: Option<ScriptError>,
}

impl fmt::Display for ScriptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.script_error {
            Some(script_error) => write!(f, "{}: {}", self.error, script_error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for ScriptFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.script_error
            .as_ref()
            .map(|error| error as &(dyn std::error::Error + 'static))
    }
}

impl From<Error> for ScriptFailure {
    fn from(error: Error) -> Self {
        ScriptFailure {
            error,
            script_error: None,
        }
    }
}

impl From<ScriptError> for ScriptFailure {
    fn from(script_error: ScriptError) -> Self {
        ScriptFailure {
            error: Error::Script,
            script_error: Some(script_error),
        }
    }
}

/// Verifies one input of a serialized transaction under the current
/// consensus rule set.
pub fn verify(
    locking_bytecode: &[u8],
    amount: u64,
    spending_transaction: &[u8],
    input_index: usize,
) -> Result<(), Error> {
    verify_with_flags(
        locking_bytecode,
        amount,
        spending_transaction,
        input_index,
        InstructionSetVersion::default().flags().bits(),
    )
}

/// Same as [`verify`] but with explicit `VERIFY_*` flags.
pub fn verify_with_flags(
    locking_bytecode: &[u8],
    amount: u64,
    spending_transaction: &[u8],
    input_index: usize,
    flags: u32,
) -> Result<(), Error> {
    perform_verification(locking_bytecode, amount, spending_transaction, input_index, flags)
        .map_err(|failure| failure.error)
}

/// Same as [`verify_with_flags`] but also reports the [`ScriptError`].
pub fn verify_with_flags_detailed(
    locking_bytecode: &[u8],
    amount: u64,
    spending_transaction: &[u8],
    input_index: usize,
    flags: u32,
) -> Result<(), ScriptFailure> {
    perform_verification(locking_bytecode, amount, spending_transaction, input_index, flags)
}

/// Verifies every input of a serialized transaction. `source_outputs[i]` is
/// the output spent by input `i`.
pub fn verify_transaction_bytes(
    spending_transaction: &[u8],
    source_outputs: &[TxOut],
    flags: u32,
) -> Result<(), ScriptFailure> {
    let tx_ctx = TransactionContext::parse(spending_transaction)?;
    let flags = ScriptFlags::from_bits(flags)?;
    VirtualMachine::new(BchInstructionSet::new(flags))
        .verify_transaction(tx_ctx.tx(), source_outputs)
}

fn perform_verification(
    locking_bytecode: &[u8],
    amount: u64,
    spending_transaction: &[u8],
    input_index: usize,
    flags: u32,
) -> Result<(), ScriptFailure> {
    let tx_ctx = TransactionContext::parse(spending_transaction)?;
    tx_ctx.ensure_input_index(input_index)?;
    let flags = ScriptFlags::from_bits(flags)?;

    let source_output = TxOut {
        value: Amount::from_sat(amount),
        script_pubkey: ScriptBuf::from_bytes(locking_bytecode.to_vec()),
    };
    let precomputed = tx_ctx.build_precomputed();
    let program = AuthenticationProgram::for_input(
        Arc::new(tx_ctx.into_tx()),
        precomputed,
        input_index,
        source_output,
    );
    VirtualMachine::new(BchInstructionSet::new(flags)).verify_program(&program)
}

/// API-level errors. Script evaluation failures are reported as
/// [`Error::Script`], with details in [`ScriptFailure::script_error`].
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("script evaluation failed")]
    Script,
    #[error("input index is out of range for the spending transaction")]
    TxIndex,
    #[error("spending transaction is not canonically encoded")]
    TxSizeMismatch,
    #[error("could not deserialize the spending transaction")]
    TxDeserialize,
    #[error("script verification flags are invalid")]
    InvalidFlags,
    #[error("unknown instruction set identifier")]
    UnknownInstructionSet,
    #[error("number of source outputs does not match the number of inputs")]
    SourceOutputsMismatch,
    #[error("transaction has no inputs")]
    EmptyInputs,
    #[error("transaction has no outputs")]
    EmptyOutputs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::{
        absolute::LockTime, consensus, hashes::hash160, hashes::Hash, transaction::Version,
        OutPoint, Sequence, Transaction, TxIn, Witness,
    };

    fn spending_transaction(script_sig: Vec<u8>) -> Transaction {
        Transaction {
            version: Version(2),
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::from_bytes(script_sig),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(0),
                script_pubkey: ScriptBuf::new(),
            }],
        }
    }

    #[test]
    fn verify_simple_p2sh_redeem_bytecode() {
        let redeem = [opcodes::all::OP_1.to_u8()];
        let mut locking = vec![0xa9, 0x14];
        locking.extend_from_slice(hash160::Hash::hash(&redeem).as_byte_array());
        locking.push(0x87);

        let tx = consensus::serialize(&spending_transaction(vec![0x01, redeem[0]]));
        verify(&locking, 0, &tx, 0).expect("p2sh redeem should validate");
    }

    #[test]
    fn detailed_failure_reports_script_error() {
        let tx = consensus::serialize(&spending_transaction(vec![0x00]));
        let failure =
            verify_with_flags_detailed(&[0x6a], 0, &tx, 0, 0).expect_err("OP_RETURN fails");
        assert_eq!(failure.error, Error::Script);
        assert_eq!(failure.script_error, Some(ScriptError::CalledReturn));
        assert_eq!(verify_with_flags(&[0x6a], 0, &tx, 0, 0), Err(Error::Script));
    }

    #[test]
    fn api_errors_are_reported_before_evaluation() {
        let tx = consensus::serialize(&spending_transaction(vec![0x51]));
        assert_eq!(verify(&[0x51], 0, &tx, 1), Err(Error::TxIndex));
        assert_eq!(verify_with_flags(&[0x51], 0, &tx, 0, 1 << 31), Err(Error::InvalidFlags));
        assert_eq!(verify(&[0x51], 0, &tx[..tx.len() - 1], 0), Err(Error::TxDeserialize));

        let mut padded = tx.clone();
        padded.push(0x00);
        assert_eq!(verify(&[0x51], 0, &padded, 0), Err(Error::TxSizeMismatch));
    }

    #[test]
    fn transaction_level_checks() {
        let tx = spending_transaction(vec![0x51]);
        let bytes = consensus::serialize(&tx);
        let output = TxOut {
            value: Amount::from_sat(0),
            script_pubkey: ScriptBuf::from_bytes(vec![0x51, 0x87]),
        };
        assert_eq!(verify_transaction_bytes(&bytes, &[output.clone()], 0), Ok(()));
        assert_eq!(
            verify_transaction_bytes(&bytes, &[], 0),
            Err(ScriptFailure::from(Error::SourceOutputsMismatch))
        );

        let mut no_outputs = tx;
        no_outputs.output.clear();
        let vm = VirtualMachine::new(BchInstructionSet::default());
        assert_eq!(
            vm.verify_transaction(&no_outputs, &[output]),
            Err(ScriptFailure::from(Error::EmptyOutputs))
        );
    }

    #[test]
    fn failure_display_includes_script_error() {
        let failure = ScriptFailure::from(ScriptError::CalledReturn);
        assert_eq!(failure.to_string(), "script evaluation failed: program called OP_RETURN");
    }
}
