//! Input validators for job-creation and webhook-subscription requests.
//!
//! All validators return [`CoreError::Validation`] with a message safe to
//! surface to callers. Viewing keys are secret material and are never
//! echoed back in error messages.

use crate::error::CoreError;

/// Length of a `0x`-prefixed 20-byte hex address.
pub const ADDRESS_LENGTH: usize = 42;

/// Length of a `0x`-prefixed 32-byte hex proof hash.
pub const PROOF_HASH_LENGTH: usize = 66;

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Validate an account address (`0x` + 40 hex chars).
pub fn validate_address(address: &str) -> Result<(), CoreError> {
    let hex_part = address.strip_prefix("0x");
    if address.len() != ADDRESS_LENGTH || !hex_part.is_some_and(is_hex) {
        return Err(CoreError::Validation(format!(
            "Invalid address '{address}'. Expected a 0x-prefixed 20-byte hex string"
        )));
    }
    Ok(())
}

/// Validate a proof hash (`0x` + 64 hex chars).
pub fn validate_proof_hash(proof_hash: &str) -> Result<(), CoreError> {
    let hex_part = proof_hash.strip_prefix("0x");
    if proof_hash.len() != PROOF_HASH_LENGTH || !hex_part.is_some_and(is_hex) {
        return Err(CoreError::Validation(format!(
            "Invalid proof hash '{proof_hash}'. Expected a 0x-prefixed 32-byte hex string"
        )));
    }
    Ok(())
}

/// Validate a viewing key. The key is opaque credential material, so the
/// error message never includes its value.
pub fn validate_viewing_key(viewing_key: &str) -> Result<(), CoreError> {
    if viewing_key.trim().is_empty() {
        return Err(CoreError::Validation(
            "viewing_key must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validate a webhook callback URL. Only absolute http(s) URLs are accepted.
pub fn validate_callback_url(url: &str) -> Result<(), CoreError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(CoreError::Validation(format!(
            "Invalid callback URL '{url}'. Expected an absolute http(s) URL"
        )));
    }
    Ok(())
}
