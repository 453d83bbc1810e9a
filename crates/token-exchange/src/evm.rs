//! EVM message-signature verification.
//!
//! Implements the personal-sign scheme: the signed digest is the keccak-256
//! of `"\x19Ethereum Signed Message:\n" + len(message) + message`, and the
//! signer's address is recovered from the 65-byte recoverable signature.

use crate::error::{ExchangeError, ExchangeResult};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

/// Normalize an EVM address to its canonical checksum form.
///
/// Returns `None` when the input is not a `0x`-prefixed 20-byte hex string.
pub fn checksum_address(address: &str) -> Option<String> {
    let trimmed = address.trim();
    let hex_part = trimmed.strip_prefix("0x")?;
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let lower = hex_part.to_ascii_lowercase();
    let digest = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (digest[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Recover the signer address (lowercase hex, `0x`-prefixed) of a
/// personal-sign signature over `message`.
pub fn recover_personal_signer(message: &str, signature: &str) -> ExchangeResult<String> {
    let bytes = decode_signature_hex(signature)?;

    let sig = Signature::try_from(&bytes[..64])
        .map_err(|e| ExchangeError::InvalidSignature(format!("bad signature bytes: {e}")))?;
    let recovery_id = normalize_recovery_id(bytes[64])?;
    let prehash = personal_sign_hash(message);

    let key = VerifyingKey::recover_from_prehash(&prehash, &sig, recovery_id)
        .map_err(|e| ExchangeError::InvalidSignature(format!("recovery failed: {e}")))?;

    address_from_verifying_key(&key)
}

/// Keccak-256 digest of the EIP-191 personal-sign envelope.
fn personal_sign_hash(message: &str) -> [u8; 32] {
    let bytes = message.as_bytes();
    let prefix = format!("\x19Ethereum Signed Message:\n{}", bytes.len());

    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(bytes);
    hasher.finalize().into()
}

fn decode_signature_hex(signature: &str) -> ExchangeResult<Vec<u8>> {
    let trimmed = signature.trim();
    let hex_part = trimmed.strip_prefix("0x").ok_or_else(|| {
        ExchangeError::InvalidSignature("signature must be 0x-prefixed hex".to_string())
    })?;
    let bytes = hex::decode(hex_part)
        .map_err(|e| ExchangeError::InvalidSignature(format!("bad hex: {e}")))?;
    if bytes.len() != 65 {
        return Err(ExchangeError::InvalidSignature(
            "signature must decode to 65 bytes".to_string(),
        ));
    }
    Ok(bytes)
}

fn normalize_recovery_id(raw: u8) -> ExchangeResult<RecoveryId> {
    let id = match raw {
        27 | 28 => raw - 27,
        0 | 1 => raw,
        _ => {
            return Err(ExchangeError::InvalidSignature(
                "recovery id must be 0/1 or 27/28".to_string(),
            ))
        }
    };
    RecoveryId::try_from(id)
        .map_err(|_| ExchangeError::InvalidSignature("invalid recovery id".to_string()))
}

fn address_from_verifying_key(key: &VerifyingKey) -> ExchangeResult<String> {
    let encoded = key.to_encoded_point(false);
    let pubkey = encoded.as_bytes();
    if pubkey.len() != 65 || pubkey[0] != 0x04 {
        return Err(ExchangeError::InvalidSignature(
            "unexpected recovered public key format".to_string(),
        ));
    }

    let digest = Keccak256::digest(&pubkey[1..]);
    Ok(format!("0x{}", hex::encode(&digest[12..])))
}
