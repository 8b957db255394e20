//! Token encoding: the serialize → compress → base64 pipeline.
//!
//! A signed [`License`] becomes a transportable string in three fixed steps:
//! serde_json serialization, gzip at the default level, then padded standard
//! base64. The order is part of the external contract; any verifier, in any
//! language, runs the same steps in reverse. The pipeline is lossless and
//! deterministic modulo compressor version.
//!
//! Tokens are opaque to every caller, ASCII-safe with no embedded newlines,
//! and expected to run to hundreds of characters. No length cap is enforced.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::errors::{LicenseError, LicenseResult};
use crate::signer::License;

/// Encode a signed license into its transport string.
pub fn encode(license: &License) -> LicenseResult<String> {
    let json =
        serde_json::to_vec(license).map_err(|e| LicenseError::Serialization(e.to_string()))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| LicenseError::Serialization(format!("compression failed: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| LicenseError::Serialization(format!("compression failed: {e}")))?;

    Ok(BASE64.encode(compressed))
}

/// Decode a transport string back into the signed license.
///
/// This is the inverse pipeline only; it performs no signature verification.
pub fn decode(token: &str) -> LicenseResult<License> {
    let compressed = BASE64
        .decode(token.trim().as_bytes())
        .map_err(|e| LicenseError::TokenDecode(format!("not valid base64: {e}")))?;

    let mut json = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| LicenseError::TokenDecode(format!("not a gzip stream: {e}")))?;

    serde_json::from_slice(&json)
        .map_err(|e| LicenseError::TokenDecode(format!("not a license document: {e}")))
}
