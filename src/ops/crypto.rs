//! Hashing and signature checking operations.

use super::{flow, Environment};
use crate::{
    crypto::{Ripemd160, Secp256k1Provider, Sha1, Sha256},
    encoding::{
        decode_transaction_signature, is_valid_data_signature_encoding,
        is_valid_public_key_encoding, is_valid_transaction_signature_encoding,
        SCHNORR_SIGNATURE_LENGTH,
    },
    signing::generate_signing_serialization,
    state::ProgramState,
    ScriptError,
};

fn hash_top(
    state: &mut ProgramState,
    hash: impl FnOnce(&[u8]) -> Vec<u8>,
) -> Result<(), ScriptError> {
    let item = state.pop()?;
    state.stack.push(hash(&item));
    Ok(())
}

pub(crate) fn op_ripemd160(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    hash_top(state, |data| env.crypto.ripemd160(data).to_vec())
}

pub(crate) fn op_sha1(state: &mut ProgramState, env: &Environment<'_>) -> Result<(), ScriptError> {
    hash_top(state, |data| env.crypto.sha1(data).to_vec())
}

pub(crate) fn op_sha256(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    hash_top(state, |data| env.crypto.sha256(data).to_vec())
}

pub(crate) fn op_hash160(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    hash_top(state, |data| env.crypto.ripemd160(&env.crypto.sha256(data)).to_vec())
}

pub(crate) fn op_hash256(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    hash_top(state, |data| env.crypto.hash256(data).to_vec())
}

pub(crate) fn op_codeseparator(
    state: &mut ProgramState,
    _: &Environment<'_>,
) -> Result<(), ScriptError> {
    state.last_code_separator = Some(state.ip);
    Ok(())
}

/// Builds the signing serialization for `signature`, records it and returns
/// the digest along with the signature body (type byte removed).
fn transaction_digest<'s>(
    state: &mut ProgramState,
    env: &Environment<'_>,
    covered_bytecode: &[u8],
    signature: &'s [u8],
) -> ([u8; 32], &'s [u8]) {
    let Some((body, sighash_type)) = decode_transaction_signature(signature) else {
        return ([0; 32], signature);
    };
    let serialization =
        generate_signing_serialization(&state.context, covered_bytecode, sighash_type);
    let digest = env.crypto.hash256(&serialization);
    state.signed_messages.push(serialization);
    (digest, body)
}

fn verify_any(
    env: &Environment<'_>,
    signature: &[u8],
    public_key: &[u8],
    digest: &[u8; 32],
) -> bool {
    if signature.len() == SCHNORR_SIGNATURE_LENGTH {
        env.crypto.verify_signature_schnorr(signature, public_key, digest)
    } else {
        env.crypto.verify_signature_der_low_s(signature, public_key, digest)
    }
}

/// Pushes the outcome of a single signature check, or fails outright when a
/// non-empty signature did not verify under `VERIFY_NULLFAIL`.
fn push_signature_result(
    state: &mut ProgramState,
    env: &Environment<'_>,
    success: bool,
    signature: &[u8],
) -> Result<(), ScriptError> {
    if !success && !signature.is_empty() && env.flags.requires_null_signature_failures() {
        return Err(ScriptError::NonNullSignatureFailure);
    }
    state.push_bool(success);
    Ok(())
}

/// `[signature public_key] -> [success]`
pub(crate) fn op_checksig(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    state.require_depth(2)?;
    let public_key = state.pop()?;
    let signature = state.pop()?;
    if !is_valid_public_key_encoding(&public_key) {
        return Err(ScriptError::InvalidPublicKeyEncoding);
    }
    if !is_valid_transaction_signature_encoding(&signature) {
        return Err(ScriptError::InvalidSignatureEncoding);
    }
    state.signature_operation_count += 1;

    let covered_bytecode = state.covered_bytecode();
    let (digest, body) = transaction_digest(state, env, &covered_bytecode, &signature);
    let success = !body.is_empty() && verify_any(env, body, &public_key, &digest);
    push_signature_result(state, env, success, &signature)
}

pub(crate) fn op_checksigverify(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    op_checksig(state, env)?;
    flow::op_verify(state, env)
}

/// `[bug_value sig_1..sig_m m key_1..key_n n] -> [success]`
///
/// Signatures are matched against keys in order, walking both lists from the
/// top; a key that fails to verify the current signature is skipped.
pub(crate) fn op_checkmultisig(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    let key_count = state.pop_number(env.requires_minimal(), env.number_length())?;
    if key_count < 0 {
        return Err(ScriptError::InvalidNaturalNumber);
    }
    if key_count as usize > env.limits.maximum_multisig_public_keys {
        return Err(ScriptError::ExceedsMaximumMultisigPublicKeyCount);
    }
    let key_count = key_count as usize;
    let public_keys = state.pop_many(key_count)?;

    state.operation_count += key_count;
    if state.operation_count > env.limits.maximum_operation_count {
        return Err(ScriptError::ExceededMaximumOperationCount);
    }

    let required = state.pop_number(env.requires_minimal(), env.number_length())?;
    if required < 0 {
        return Err(ScriptError::InvalidNaturalNumber);
    }
    if required as usize > key_count {
        return Err(ScriptError::InsufficientPublicKeys);
    }
    let required = required as usize;
    let signatures = state.pop_many(required)?;

    let bug_value = state.pop()?;
    if !bug_value.is_empty() && env.flags.requires_bug_value_zero() {
        return Err(ScriptError::InvalidProtocolBugValue);
    }
    state.signature_operation_count += key_count;

    let covered_bytecode = state.covered_bytecode();
    let mut approving = 0;
    let mut remaining_signatures = signatures.len();
    let mut remaining_keys = public_keys.len();
    while remaining_signatures > 0
        && remaining_keys > 0
        && approving + remaining_keys >= remaining_signatures
        && approving != required
    {
        let public_key = &public_keys[remaining_keys - 1];
        let signature = &signatures[remaining_signatures - 1];
        if !is_valid_public_key_encoding(public_key) {
            return Err(ScriptError::InvalidPublicKeyEncoding);
        }
        if !is_valid_transaction_signature_encoding(signature) {
            return Err(ScriptError::InvalidSignatureEncoding);
        }

        let (digest, body) = transaction_digest(state, env, &covered_bytecode, signature);
        if body.len() == SCHNORR_SIGNATURE_LENGTH {
            return Err(ScriptError::SchnorrSizedSignatureInCheckMultiSig);
        }
        if !body.is_empty() && env.crypto.verify_signature_der_low_s(body, public_key, &digest) {
            approving += 1;
            remaining_signatures -= 1;
        }
        remaining_keys -= 1;
    }

    let success = approving == required;
    if !success
        && env.flags.requires_null_signature_failures()
        && signatures.iter().any(|signature| !signature.is_empty())
    {
        return Err(ScriptError::NonNullSignatureFailure);
    }
    state.push_bool(success);
    Ok(())
}

pub(crate) fn op_checkmultisigverify(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    op_checkmultisig(state, env)?;
    flow::op_verify(state, env)
}

/// `[signature message public_key] -> [success]`, verifying against
/// `sha256(message)`.
pub(crate) fn op_checkdatasig(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    state.require_depth(3)?;
    let public_key = state.pop()?;
    let message = state.pop()?;
    let signature = state.pop()?;
    if !is_valid_data_signature_encoding(&signature) {
        return Err(ScriptError::InvalidSignatureEncoding);
    }
    if !is_valid_public_key_encoding(&public_key) {
        return Err(ScriptError::InvalidPublicKeyEncoding);
    }
    state.signature_operation_count += 1;

    let digest = env.crypto.sha256(&message);
    state.signed_messages.push(message);
    let success = !signature.is_empty() && verify_any(env, &signature, &public_key, &digest);
    push_signature_result(state, env, success, &signature)
}

pub(crate) fn op_checkdatasigverify(
    state: &mut ProgramState,
    env: &Environment<'_>,
) -> Result<(), ScriptError> {
    op_checkdatasig(state, env)?;
    flow::op_verify(state, env)
}
