//! Hash and signature providers consumed by the crypto operations.
//!
//! The virtual machine only depends on the narrow traits below. [`NativeCrypto`]
//! is the default provider: hashes come from `bitcoin::hashes`, ECDSA from
//! libsecp256k1 and the Bitcoin Cash Schnorr variant from `k256` arithmetic.

use std::sync::OnceLock;

use bitcoin::{
    hashes::{ripemd160, sha1, sha256, Hash},
    secp256k1::{self, ecdsa::Signature as EcdsaSignature, Message, Secp256k1},
};
use k256::{
    elliptic_curve::{
        group::Group,
        ops::Reduce,
        sec1::{FromEncodedPoint, ToEncodedPoint},
        Field, PrimeField,
    },
    AffinePoint, EncodedPoint, FieldBytes, FieldElement, ProjectivePoint, Scalar, U256,
};
use thiserror::Error;

/// Failures of the signing helpers.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("private key is not a valid secp256k1 scalar")]
    InvalidPrivateKey,
    #[error("nonce derivation produced an invalid scalar")]
    InvalidNonce,
}

pub trait Sha1 {
    fn sha1(&self, data: &[u8]) -> [u8; 20];
}

pub trait Sha256 {
    fn sha256(&self, data: &[u8]) -> [u8; 32];

    /// Double SHA-256, used for transaction digests.
    fn hash256(&self, data: &[u8]) -> [u8; 32] {
        self.sha256(&self.sha256(data))
    }
}

pub trait Ripemd160 {
    fn ripemd160(&self, data: &[u8]) -> [u8; 20];
}

/// secp256k1 operations. Keys and signatures are passed in their wire
/// encodings; verification never panics on malformed input.
pub trait Secp256k1Provider {
    /// Verifies a strict-DER, low-S ECDSA signature over `digest`.
    fn verify_signature_der_low_s(&self, signature: &[u8], public_key: &[u8], digest: &[u8; 32])
        -> bool;

    /// Verifies a 64-byte Bitcoin Cash Schnorr signature over `digest`.
    fn verify_signature_schnorr(&self, signature: &[u8], public_key: &[u8], digest: &[u8; 32])
        -> bool;

    /// Produces a low-S DER signature.
    fn sign_der(&self, private_key: &[u8; 32], digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError>;

    /// Produces a deterministic 64-byte Schnorr signature.
    fn sign_schnorr(&self, private_key: &[u8; 32], digest: &[u8; 32])
        -> Result<[u8; 64], CryptoError>;

    fn derive_public_key_compressed(&self, private_key: &[u8; 32])
        -> Result<[u8; 33], CryptoError>;
}

/// Everything the instruction set needs from a crypto backend.
pub trait Crypto: Sha1 + Sha256 + Ripemd160 + Secp256k1Provider + Send + Sync {}

impl<T> Crypto for T where T: Sha1 + Sha256 + Ripemd160 + Secp256k1Provider + Send + Sync {}

/// Default provider backed by `bitcoin::hashes`, libsecp256k1 and `k256`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeCrypto;

static SECP256K1: OnceLock<Secp256k1<secp256k1::All>> = OnceLock::new();

fn with_secp256k1_ctx<R>(f: impl FnOnce(&Secp256k1<secp256k1::All>) -> R) -> R {
    f(SECP256K1.get_or_init(Secp256k1::new))
}

impl Sha1 for NativeCrypto {
    fn sha1(&self, data: &[u8]) -> [u8; 20] {
        sha1::Hash::hash(data).to_byte_array()
    }
}

impl Sha256 for NativeCrypto {
    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        sha256::Hash::hash(data).to_byte_array()
    }
}

impl Ripemd160 for NativeCrypto {
    fn ripemd160(&self, data: &[u8]) -> [u8; 20] {
        ripemd160::Hash::hash(data).to_byte_array()
    }
}

impl Secp256k1Provider for NativeCrypto {
    fn verify_signature_der_low_s(
        &self,
        signature: &[u8],
        public_key: &[u8],
        digest: &[u8; 32],
    ) -> bool {
        let Ok(signature) = EcdsaSignature::from_der(signature) else {
            return false;
        };
        let mut normalized = signature;
        normalized.normalize_s();
        if normalized != signature {
            return false;
        }
        let Ok(public_key) = secp256k1::PublicKey::from_slice(public_key) else {
            return false;
        };
        let message = Message::from_digest(*digest);
        with_secp256k1_ctx(|ctx| ctx.verify_ecdsa(&message, &signature, &public_key).is_ok())
    }

    fn verify_signature_schnorr(
        &self,
        signature: &[u8],
        public_key: &[u8],
        digest: &[u8; 32],
    ) -> bool {
        if signature.len() != 64 {
            return false;
        }
        let Some(public_key) = parse_point(public_key) else {
            return false;
        };
        let (r, s) = signature.split_at(32);
        let r_bytes = FieldBytes::clone_from_slice(r);
        if bool::from(FieldElement::from_bytes(&r_bytes).is_none()) {
            return false;
        }
        let Some(s) = Option::<Scalar>::from(Scalar::from_repr(FieldBytes::clone_from_slice(s)))
        else {
            return false;
        };

        let e = challenge(r, &public_key, digest);
        let nonce_point = ProjectivePoint::GENERATOR * s - public_key * e;
        if bool::from(nonce_point.is_identity()) {
            return false;
        }
        match affine_coordinates(&nonce_point) {
            Some((x, y)) => x == r_bytes && has_square_y(&y),
            None => false,
        }
    }

    fn sign_der(&self, private_key: &[u8; 32], digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        let secret = secp256k1::SecretKey::from_slice(private_key)
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        let message = Message::from_digest(*digest);
        let signature = with_secp256k1_ctx(|ctx| ctx.sign_ecdsa(&message, &secret));
        Ok(signature.serialize_der().to_vec())
    }

    fn sign_schnorr(
        &self,
        private_key: &[u8; 32],
        digest: &[u8; 32],
    ) -> Result<[u8; 64], CryptoError> {
        let d = secret_scalar(private_key)?;
        let public_key = ProjectivePoint::GENERATOR * d;

        let mut nonce_input = Vec::with_capacity(80);
        nonce_input.extend_from_slice(private_key);
        nonce_input.extend_from_slice(digest);
        nonce_input.extend_from_slice(b"Schnorr+SHA256  ");
        let mut k = reduce(&sha256::Hash::hash(&nonce_input).to_byte_array());
        if bool::from(k.is_zero()) {
            return Err(CryptoError::InvalidNonce);
        }

        let nonce_point = ProjectivePoint::GENERATOR * k;
        let (r, y) = affine_coordinates(&nonce_point).ok_or(CryptoError::InvalidNonce)?;
        if !has_square_y(&y) {
            k = -k;
        }

        let e = challenge(&r, &public_key, digest);
        let s = k + e * d;

        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(&r);
        signature[32..].copy_from_slice(&s.to_repr());
        Ok(signature)
    }

    fn derive_public_key_compressed(
        &self,
        private_key: &[u8; 32],
    ) -> Result<[u8; 33], CryptoError> {
        let secret = secp256k1::SecretKey::from_slice(private_key)
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(with_secp256k1_ctx(|ctx| {
            secp256k1::PublicKey::from_secret_key(ctx, &secret).serialize()
        }))
    }
}

fn secret_scalar(private_key: &[u8; 32]) -> Result<Scalar, CryptoError> {
    let scalar = Option::<Scalar>::from(Scalar::from_repr(FieldBytes::clone_from_slice(
        private_key,
    )))
    .ok_or(CryptoError::InvalidPrivateKey)?;
    if bool::from(scalar.is_zero()) {
        return Err(CryptoError::InvalidPrivateKey);
    }
    Ok(scalar)
}

fn parse_point(bytes: &[u8]) -> Option<ProjectivePoint> {
    let encoded = EncodedPoint::from_bytes(bytes).ok()?;
    let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))?;
    Some(ProjectivePoint::from(affine))
}

fn affine_coordinates(point: &ProjectivePoint) -> Option<(FieldBytes, FieldBytes)> {
    let encoded = point.to_affine().to_encoded_point(false);
    Some((encoded.x()?.clone(), encoded.y()?.clone()))
}

fn has_square_y(y: &FieldBytes) -> bool {
    Option::<FieldElement>::from(FieldElement::from_bytes(y))
        .map(|y| bool::from(y.sqrt().is_some()))
        .unwrap_or(false)
}

/// `e = H(R.x || compressed(P) || m) mod n`.
fn challenge(r: &[u8], public_key: &ProjectivePoint, digest: &[u8; 32]) -> Scalar {
    let compressed = public_key.to_affine().to_encoded_point(true);
    let mut input = Vec::with_capacity(32 + 33 + 32);
    input.extend_from_slice(r);
    input.extend_from_slice(compressed.as_bytes());
    input.extend_from_slice(digest);
    reduce(&sha256::Hash::hash(&input).to_byte_array())
}

fn reduce(bytes: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::clone_from_slice(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hex::FromHex;

    const KEY: [u8; 32] = [0x11; 32];

    #[test]
    fn hashes_match_known_digests() {
        let crypto = NativeCrypto;
        assert_eq!(
            crypto.sha256(b"abc").to_vec(),
            Vec::from_hex("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
                .unwrap()
        );
        assert_eq!(
            crypto.ripemd160(b"").to_vec(),
            Vec::from_hex("9c1185a5c5e9fc54612808977ee8f548b2258d31").unwrap()
        );
        assert_eq!(
            crypto.sha1(b"").to_vec(),
            Vec::from_hex("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap()
        );
    }

    #[test]
    fn ecdsa_sign_then_verify() {
        let crypto = NativeCrypto;
        let digest = crypto.hash256(b"message");
        let public_key = crypto.derive_public_key_compressed(&KEY).expect("public key");
        let signature = crypto.sign_der(&KEY, &digest).expect("signature");

        assert!(crypto.verify_signature_der_low_s(&signature, &public_key, &digest));
        let other = crypto.hash256(b"other message");
        assert!(!crypto.verify_signature_der_low_s(&signature, &public_key, &other));
    }

    #[test]
    fn schnorr_sign_then_verify() {
        let crypto = NativeCrypto;
        let digest = crypto.hash256(b"message");
        let public_key = crypto.derive_public_key_compressed(&KEY).expect("public key");
        let signature = crypto.sign_schnorr(&KEY, &digest).expect("signature");

        assert!(crypto.verify_signature_schnorr(&signature, &public_key, &digest));

        let mut tampered = signature;
        tampered[63] ^= 0x01;
        assert!(!crypto.verify_signature_schnorr(&tampered, &public_key, &digest));
        assert!(!crypto.verify_signature_schnorr(&signature[..63], &public_key, &digest));
    }

    #[test]
    fn schnorr_accepts_uncompressed_keys() {
        let crypto = NativeCrypto;
        let digest = crypto.sha256(b"data");
        let compressed = crypto.derive_public_key_compressed(&KEY).expect("public key");
        let uncompressed = secp256k1::PublicKey::from_slice(&compressed)
            .expect("valid key")
            .serialize_uncompressed();
        let signature = crypto.sign_schnorr(&KEY, &digest).expect("signature");
        assert!(crypto.verify_signature_schnorr(&signature, &uncompressed, &digest));
    }

    #[test]
    fn zero_private_key_is_rejected() {
        let crypto = NativeCrypto;
        assert_eq!(
            crypto.derive_public_key_compressed(&[0u8; 32]),
            Err(CryptoError::InvalidPrivateKey)
        );
        assert_eq!(
            crypto.sign_schnorr(&[0u8; 32], &[1u8; 32]),
            Err(CryptoError::InvalidPrivateKey)
        );
    }
}
