//! Signed license payload construction.
//!
//! [`LicenseData`] is the payload a verifier ultimately checks: the machine
//! binding and the expiry instant, nothing else. It is serialized with
//! serde_json in declared field order, which keeps the byte encoding
//! canonical: `License.data` must hold base64 of the *exact* bytes that
//! were digested, or independent verifiers can never re-derive the digest.
//!
//! The digest is SHA-256 and the signature is RSA-PSS. PSS salts every
//! signature with fresh randomness from a secure RNG, so signing the same
//! payload twice yields identical payload bytes but different signatures.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use rsa::{Pss, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{LicenseError, LicenseResult};

/// The signed payload of a license.
///
/// Field order is the wire order; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseData {
    /// Customer machine identifier the license is bound to.
    pub machine_id: String,
    /// Expiry instant in seconds since the Unix epoch (UTC).
    pub expiry_utc: i64,
}

/// A signed license: the payload and a detached signature over its digest.
///
/// Pure value, produced once per issuance, never mutated, and holding no
/// reference back to the private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    /// Base64 of the serialized [`LicenseData`] bytes that were digested.
    pub data: String,
    /// Base64 of the RSA-PSS signature over the SHA-256 digest of `data`.
    pub signature: String,
}

impl License {
    /// Decode and parse the embedded payload.
    pub fn license_data(&self) -> LicenseResult<LicenseData> {
        let bytes = BASE64
            .decode(&self.data)
            .map_err(|e| LicenseError::TokenDecode(format!("license data is not base64: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| LicenseError::TokenDecode(format!("license data is not valid JSON: {e}")))
    }
}

/// Canonical serialized bytes for a payload. Exposed so verifying tests can
/// re-derive the exact digest input.
pub fn payload_bytes(data: &LicenseData) -> LicenseResult<Vec<u8>> {
    serde_json::to_vec(data).map_err(|e| LicenseError::Serialization(e.to_string()))
}

/// Build and sign a license payload.
///
/// Preconditions (enforced upstream by the engine): `machine_id` is
/// non-empty and `expiry_utc` came out of expiry validation.
pub fn sign(
    machine_id: &str,
    expiry_utc: DateTime<Utc>,
    key: &RsaPrivateKey,
) -> LicenseResult<License> {
    let data = LicenseData {
        machine_id: machine_id.to_string(),
        expiry_utc: expiry_utc.timestamp(),
    };
    let payload = payload_bytes(&data)?;

    let digest = Sha256::digest(&payload);
    let signature = key
        .sign_with_rng(&mut rand::thread_rng(), Pss::new::<Sha256>(), &digest)
        .map_err(|e| LicenseError::Signing(e.to_string()))?;

    Ok(License {
        data: BASE64.encode(&payload),
        signature: BASE64.encode(&signature),
    })
}
