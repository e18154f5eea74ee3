//! Bitcoin Cash signing serialization (the BIP143-style digest with a fork id).

use bitcoin::{
    consensus::{self, encode::VarInt},
    hashes::{sha256d, Hash},
};

use crate::tx::SpendContext;

/// The signing serialization type byte appended to transaction signatures.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SigningSerializationType(u8);

impl SigningSerializationType {
    pub const ALL: u8 = 0x01;
    pub const NONE: u8 = 0x02;
    pub const SINGLE: u8 = 0x03;
    pub const FORK_ID: u8 = 0x40;
    pub const ANYONE_CAN_PAY: u8 = 0x80;

    const BASE_MASK: u8 = 0x1f;

    pub const fn from_u8(byte: u8) -> Self {
        SigningSerializationType(byte)
    }

    pub const fn to_u8(self) -> u8 {
        self.0
    }

    /// `ALL | FORKID`, the usual choice when signing.
    pub const fn all_fork_id() -> Self {
        SigningSerializationType(Self::ALL | Self::FORK_ID)
    }

    pub fn is_anyone_can_pay(self) -> bool {
        self.0 & Self::ANYONE_CAN_PAY != 0
    }

    fn base(self) -> u8 {
        self.0 & Self::BASE_MASK
    }

    pub fn is_single(self) -> bool {
        self.base() == Self::SINGLE
    }

    pub fn is_none(self) -> bool {
        self.base() == Self::NONE
    }

    /// Whether the type is `ALL`, `NONE` or `SINGLE` once the `FORKID` and
    /// `ANYONECANPAY` bits are cleared.
    pub fn is_defined(self) -> bool {
        let base = self.0 & !(Self::FORK_ID | Self::ANYONE_CAN_PAY);
        (Self::ALL..=Self::SINGLE).contains(&base)
    }
}

/// Builds the preimage whose double SHA-256 a transaction signature commits to.
pub fn generate_signing_serialization(
    context: &SpendContext,
    covered_bytecode: &[u8],
    sighash_type: SigningSerializationType,
) -> Vec<u8> {
    let zero = sha256d::Hash::all_zeros();

    let hash_prevouts = if sighash_type.is_anyone_can_pay() {
        zero
    } else {
        context.hash_prevouts
    };
    let hash_sequence = if sighash_type.is_anyone_can_pay()
        || sighash_type.is_single()
        || sighash_type.is_none()
    {
        zero
    } else {
        context.hash_sequence
    };
    let hash_outputs = if sighash_type.is_single() {
        context.corresponding_output_hash.unwrap_or(zero)
    } else if sighash_type.is_none() {
        zero
    } else {
        context.hash_outputs
    };

    let mut out = Vec::with_capacity(156 + covered_bytecode.len() + 9);
    out.extend_from_slice(&context.version.to_le_bytes());
    out.extend_from_slice(hash_prevouts.as_byte_array());
    out.extend_from_slice(hash_sequence.as_byte_array());
    out.extend_from_slice(&consensus::serialize(&context.outpoint));
    out.extend_from_slice(&consensus::serialize(&VarInt(covered_bytecode.len() as u64)));
    out.extend_from_slice(covered_bytecode);
    out.extend_from_slice(&context.value.to_le_bytes());
    out.extend_from_slice(&context.sequence.to_le_bytes());
    out.extend_from_slice(hash_outputs.as_byte_array());
    out.extend_from_slice(&context.locktime.to_le_bytes());
    out.push(sighash_type.to_u8());
    out.extend_from_slice(&[0x00, 0x00, 0x00]);
    out
}

/// Double SHA-256 of the signing serialization.
pub fn signature_digest(
    context: &SpendContext,
    covered_bytecode: &[u8],
    sighash_type: SigningSerializationType,
) -> [u8; 32] {
    let serialization = generate_signing_serialization(context, covered_bytecode, sighash_type);
    sha256d::Hash::hash(&serialization).to_byte_array()
}
