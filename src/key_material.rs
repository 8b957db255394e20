//! Private key normalization, parsing, and caching.
//!
//! Key material arrives as raw bytes from a [`KeySource`] and leaves as a
//! parsed [`RsaPrivateKey`]. The rules depend on provenance:
//!
//! - **File** keys must already be well-formed PEM. Malformed content is a
//!   hard [`LicenseError::KeyFormat`] with no recovery; a corrupted on-disk
//!   key indicates operator error that should not be silently repaired.
//! - **Environment** keys are treated as possibly mangled in transit
//!   (newlines stripped, header spacing lost). They get a one-shot
//!   reconstruction: scrub to the base64 alphabet, drop residual
//!   `BEGIN/END [RSA] PRIVATE KEY` tokens, and re-wrap the payload inside
//!   standard PEM framing. If parsing still fails the error is
//!   [`LicenseError::KeyParse`]; reconstruction is a heuristic, not a loop.
//!
//! The decoded DER is tried as PKCS#1 first and PKCS#8 second; a PKCS#8
//! document carrying a non-RSA algorithm OID is rejected as
//! [`LicenseError::UnsupportedKeyType`].
//!
//! Key bytes never appear in log events or error messages.

use std::sync::{Arc, OnceLock, RwLock};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, PrivateKeyInfo};
use rsa::RsaPrivateKey;
use tracing::debug;

use crate::errors::{LicenseError, LicenseResult};
use crate::key_source::{KeyMaterial, KeySource, Provenance};

/// PEM labels the loader accepts without further inspection.
const PKCS1_LABEL: &str = "RSA PRIVATE KEY";
const PKCS8_LABEL: &str = "PRIVATE KEY";

/// Line width for re-wrapped PEM bodies, per RFC 7468 convention.
const PEM_LINE_WIDTH: usize = 64;

/// Parse raw key material into an RSA private key, applying the
/// provenance-appropriate recovery strategy.
pub fn parse_signing_key(material: &KeyMaterial) -> LicenseResult<RsaPrivateKey> {
    let text = std::str::from_utf8(&material.bytes)
        .map_err(|_| hard_failure(material.provenance, "key material is not valid UTF-8"))?;

    match material.provenance {
        Provenance::File => {
            let (label, der) = decode_pem(text)
                .map_err(|e| LicenseError::KeyFormat(format!("invalid PEM encoding: {e}")))?;
            parse_der(&label, &der, Provenance::File)
        }
        Provenance::Environment => {
            // A clean PEM string needs no surgery.
            if let Ok((label, der)) = decode_pem(text) {
                return parse_der(&label, &der, Provenance::Environment);
            }

            debug!("environment key material is not well-formed PEM, attempting reconstruction");
            let rebuilt = reconstruct_pem(text);
            let (label, der) = decode_pem(&rebuilt).map_err(|e| {
                LicenseError::KeyParse(format!(
                    "environment key unreadable even after PEM reconstruction: {e}"
                ))
            })?;
            parse_der(&label, &der, Provenance::Environment)
        }
    }
}

/// Load from a source and parse, in one step.
pub fn load_signing_key(source: &dyn KeySource) -> LicenseResult<RsaPrivateKey> {
    let material = source.load()?;
    parse_signing_key(&material)
}

fn hard_failure(provenance: Provenance, msg: &str) -> LicenseError {
    match provenance {
        Provenance::File => LicenseError::KeyFormat(msg.to_string()),
        Provenance::Environment => LicenseError::KeyParse(msg.to_string()),
    }
}

/// Decode a strict PEM block into its label and DER bytes.
///
/// Strict means: a `-----BEGIN <label>-----` line, base64 body, and a
/// matching `-----END <label>-----` line. Whitespace inside the body is
/// tolerated (encoders differ on trailing newlines), missing framing is not.
fn decode_pem(text: &str) -> Result<(String, Vec<u8>), String> {
    let mut label: Option<String> = None;
    let mut body = String::new();
    let mut ended = false;

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("-----BEGIN ") {
            let l = rest
                .strip_suffix("-----")
                .ok_or_else(|| "unterminated BEGIN marker".to_string())?;
            if label.is_some() {
                return Err("multiple BEGIN markers".to_string());
            }
            label = Some(l.to_string());
        } else if let Some(rest) = line.strip_prefix("-----END ") {
            let l = rest
                .strip_suffix("-----")
                .ok_or_else(|| "unterminated END marker".to_string())?;
            match &label {
                Some(begin) if begin == l => {
                    ended = true;
                    break;
                }
                Some(_) => return Err("BEGIN/END label mismatch".to_string()),
                None => return Err("END marker before BEGIN".to_string()),
            }
        } else if label.is_some() {
            body.push_str(line);
        }
        // Content before the BEGIN marker is ignored (explanatory text is
        // legal in PEM files).
    }

    let label = label.ok_or_else(|| "no BEGIN marker found".to_string())?;
    if !ended {
        return Err("no END marker found".to_string());
    }

    let der = BASE64
        .decode(body.as_bytes())
        .map_err(|e| format!("base64 body: {e}"))?;
    if der.is_empty() {
        return Err("empty PEM body".to_string());
    }
    Ok((label, der))
}

/// Re-wrap a base64 payload into PEM framing at the standard line width.
pub(crate) fn wrap_pem(label: &str, base64_body: &str) -> String {
    let mut out = format!("-----BEGIN {label}-----\n");
    let bytes = base64_body.as_bytes();
    for chunk in bytes.chunks(PEM_LINE_WIDTH) {
        // The payload is base64 text, so chunk boundaries are char boundaries.
        out.push_str(std::str::from_utf8(chunk).unwrap_or(""));
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}

fn header_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // After scrubbing, spaces are gone, so "BEGIN RSA PRIVATE KEY"
        // appears as "BEGINRSAPRIVATEKEY" (hyphens may or may not survive).
        Regex::new(r"-*(?:BEGIN|END)(?:RSA)?PRIVATEKEY-*").unwrap()
    })
}

/// Best-effort reconstruction of a PEM string whose framing was damaged in
/// transit. Assumes the payload is PKCS#1 or PKCS#8 DER and only the framing
/// (newlines, header spacing) was lost.
fn reconstruct_pem(raw: &str) -> String {
    // Keep only the base64 alphabet plus '-', so header fragments stay
    // recognizable for the token pass below.
    let scrubbed: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '-'))
        .collect();

    let without_headers = header_token_regex().replace_all(&scrubbed, "");
    let payload: String = without_headers.chars().filter(|c| *c != '-').collect();

    wrap_pem(PKCS1_LABEL, &payload)
}

/// Parse DER bytes as PKCS#1, falling back to PKCS#8 with an RSA OID check.
fn parse_der(label: &str, der: &[u8], provenance: Provenance) -> LicenseResult<RsaPrivateKey> {
    if label != PKCS1_LABEL && label != PKCS8_LABEL {
        return Err(LicenseError::UnsupportedKeyType(format!(
            "unexpected PEM label '{label}'"
        )));
    }

    if let Ok(key) = RsaPrivateKey::from_pkcs1_der(der) {
        return Ok(key);
    }

    // Not PKCS#1; check whether it is a PKCS#8 wrapper and, if so, that the
    // wrapped algorithm really is RSA before blaming the encoding.
    match PrivateKeyInfo::try_from(der) {
        Ok(info) => {
            if info.algorithm.oid != rsa::pkcs1::ALGORITHM_OID {
                return Err(LicenseError::UnsupportedKeyType(format!(
                    "expected an RSA key, found algorithm OID {}",
                    info.algorithm.oid
                )));
            }
            RsaPrivateKey::from_pkcs8_der(der)
                .map_err(|e| hard_failure(provenance, &format!("PKCS#8 RSA key rejected: {e}")))
        }
        Err(e) => Err(hard_failure(
            provenance,
            &format!("not a PKCS#1 or PKCS#8 private key: {e}"),
        )),
    }
}

/// Supplies a ready-to-use signing key to the issuance engine.
///
/// The engine itself is stateless; whether the key is re-loaded per call or
/// cached is the provider's concern.
pub trait KeyProvider: Send + Sync {
    fn signing_key(&self) -> LicenseResult<Arc<RsaPrivateKey>>;
}

impl KeyProvider for Box<dyn KeyProvider> {
    fn signing_key(&self) -> LicenseResult<Arc<RsaPrivateKey>> {
        (**self).signing_key()
    }
}

/// Loads and parses the key on every call (the reference behavior).
pub struct DirectProvider<S: KeySource> {
    source: S,
}

impl<S: KeySource> DirectProvider<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: KeySource> KeyProvider for DirectProvider<S> {
    fn signing_key(&self) -> LicenseResult<Arc<RsaPrivateKey>> {
        Ok(Arc::new(load_signing_key(&self.source)?))
    }
}

/// Caches the parsed key behind a read-mostly lock.
///
/// Many issuance calls can read concurrently; the write lock is held only
/// while (re)loading after a cache miss or an explicit [`invalidate`].
///
/// [`invalidate`]: CachedProvider::invalidate
pub struct CachedProvider<S: KeySource> {
    source: S,
    cached: RwLock<Option<Arc<RsaPrivateKey>>>,
}

impl<S: KeySource> CachedProvider<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    /// Drop the cached key; the next call re-loads from the source.
    pub fn invalidate(&self) {
        // A poisoned lock means another thread panicked mid-load; the Option
        // inside is still structurally valid, so recover the guard.
        let mut guard = self.cached.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}

impl<S: KeySource> KeyProvider for CachedProvider<S> {
    fn signing_key(&self) -> LicenseResult<Arc<RsaPrivateKey>> {
        {
            let guard = self.cached.read().unwrap_or_else(|e| e.into_inner());
            if let Some(key) = guard.as_ref() {
                return Ok(Arc::clone(key));
            }
        }

        let mut guard = self.cached.write().unwrap_or_else(|e| e.into_inner());
        // Another thread may have loaded while we waited for the write lock.
        if let Some(key) = guard.as_ref() {
            return Ok(Arc::clone(key));
        }
        let key = Arc::new(load_signing_key(&self.source)?);
        *guard = Some(Arc::clone(&key));
        Ok(key)
    }
}
