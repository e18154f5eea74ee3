//! Public key and signature encoding rules.

use crate::signing::SigningSerializationType;

/// Length of a Schnorr signature body.
pub const SCHNORR_SIGNATURE_LENGTH: usize = 64;

/// Accepts compressed (33 bytes, `02`/`03` prefix) and uncompressed (65 bytes,
/// `04` prefix) public keys.
pub fn is_valid_public_key_encoding(public_key: &[u8]) -> bool {
    match public_key.len() {
        33 => matches!(public_key[0], 0x02 | 0x03),
        65 => public_key[0] == 0x04,
        _ => false,
    }
}

/// Strict DER encoding of an ECDSA signature with no trailing type byte.
///
/// Layout: `30 <len> 02 <len R> <R> 02 <len S> <S>`, where both integers are
/// positive and carry no unnecessary leading zero.
pub fn is_valid_der_signature_encoding(signature: &[u8]) -> bool {
    if signature.len() < 9 || signature.len() > 71 {
        return false;
    }
    if signature[0] != 0x30 {
        return false;
    }
    if signature[1] as usize != signature.len() - 2 {
        return false;
    }

    let len_r = signature[3] as usize;
    if 5 + len_r >= signature.len() {
        return false;
    }
    let len_s = signature[5 + len_r] as usize;
    if len_r + len_s + 6 != signature.len() {
        return false;
    }

    if signature[2] != 0x02 || len_r == 0 {
        return false;
    }
    if signature[4] & 0x80 != 0 {
        return false;
    }
    if len_r > 1 && signature[4] == 0x00 && signature[5] & 0x80 == 0 {
        return false;
    }

    if signature[len_r + 4] != 0x02 || len_s == 0 {
        return false;
    }
    if signature[len_r + 6] & 0x80 != 0 {
        return false;
    }
    if len_s > 1 && signature[len_r + 6] == 0x00 && signature[len_r + 7] & 0x80 == 0 {
        return false;
    }
    true
}

/// Splits a transaction signature into its body and signing serialization type.
pub fn decode_transaction_signature(signature: &[u8]) -> Option<(&[u8], SigningSerializationType)> {
    let (&type_byte, body) = signature.split_last()?;
    Some((body, SigningSerializationType::from_u8(type_byte)))
}

/// Transaction signatures are empty, a Schnorr signature plus type byte, or a
/// strict DER signature plus a defined type byte.
pub fn is_valid_transaction_signature_encoding(signature: &[u8]) -> bool {
    let Some((body, sighash_type)) = decode_transaction_signature(signature) else {
        return true;
    };
    if body.len() == SCHNORR_SIGNATURE_LENGTH {
        return true;
    }
    sighash_type.is_defined() && is_valid_der_signature_encoding(body)
}

/// Data signatures carry no type byte: empty, Schnorr or strict DER.
pub fn is_valid_data_signature_encoding(signature: &[u8]) -> bool {
    signature.is_empty()
        || signature.len() == SCHNORR_SIGNATURE_LENGTH
        || is_valid_der_signature_encoding(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hex::FromHex;

    // 70-byte DER signature with a low S value.
    const DER: &str = "3044022057fd16bd4aa41d6b1a1e8c4b5a9e42b5d3a1b1c2d3e4f50617283940a1b2c3d40220\
                       1a2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c4d5e6f708192a3b4c5d6e7f809";

    #[test]
    fn public_key_prefixes() {
        let mut compressed = [0x11u8; 33];
        compressed[0] = 0x02;
        assert!(is_valid_public_key_encoding(&compressed));
        compressed[0] = 0x04;
        assert!(!is_valid_public_key_encoding(&compressed));

        let mut uncompressed = [0x11u8; 65];
        uncompressed[0] = 0x04;
        assert!(is_valid_public_key_encoding(&uncompressed));
        uncompressed[0] = 0x06;
        assert!(!is_valid_public_key_encoding(&uncompressed));
        assert!(!is_valid_public_key_encoding(&[]));
    }

    #[test]
    fn der_structure_is_enforced() {
        let der = Vec::from_hex(DER).unwrap();
        assert!(is_valid_der_signature_encoding(&der));

        let mut wrong_tag = der.clone();
        wrong_tag[0] = 0x31;
        assert!(!is_valid_der_signature_encoding(&wrong_tag));

        let mut wrong_length = der.clone();
        wrong_length[1] += 1;
        assert!(!is_valid_der_signature_encoding(&wrong_length));

        let mut negative_r = der.clone();
        negative_r[4] = 0x80;
        assert!(!is_valid_der_signature_encoding(&negative_r));

        assert!(!is_valid_der_signature_encoding(&der[..8]));
    }

    #[test]
    fn transaction_signatures_need_a_defined_type() {
        let mut signature = Vec::from_hex(DER).unwrap();
        signature.push(0x41);
        assert!(is_valid_transaction_signature_encoding(&signature));

        *signature.last_mut().unwrap() = 0x04;
        assert!(!is_valid_transaction_signature_encoding(&signature));

        *signature.last_mut().unwrap() = 0xc3;
        assert!(is_valid_transaction_signature_encoding(&signature));

        assert!(is_valid_transaction_signature_encoding(&[]));
        assert!(is_valid_transaction_signature_encoding(&[0u8; 65]));
        assert!(!is_valid_transaction_signature_encoding(&[0u8; 64]));
    }

    #[test]
    fn data_signatures_have_no_type_byte() {
        let der = Vec::from_hex(DER).unwrap();
        assert!(is_valid_data_signature_encoding(&der));
        assert!(is_valid_data_signature_encoding(&[0u8; 64]));
        assert!(is_valid_data_signature_encoding(&[]));
        assert!(!is_valid_data_signature_encoding(&[0u8; 65]));
    }
}
