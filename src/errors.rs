//! Error types for the keyforge issuance engine.
//!
//! Every failure in the engine maps to exactly one [`LicenseError`] variant so
//! that callers (the CLI, the HTTP adapter, or embedding applications) can
//! branch on the kind without parsing messages. Nothing in the engine retries
//! or swallows an error; each one is terminal for the call that produced it.
//!
//! Messages are safe to show an operator: key material never appears in them.

use thiserror::Error;

/// Result type used throughout the issuance engine.
pub type LicenseResult<T> = Result<T, LicenseError>;

/// Errors produced by the license issuance engine.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// No private key could be located from any configured source.
    #[error("no key material available: {0}")]
    KeyMaterialMissing(String),

    /// A file-sourced key was malformed. File keys are expected to be
    /// well-formed PEM; a corrupted on-disk key indicates operator error, so
    /// no recovery is attempted.
    #[error("private key file is malformed: {0}")]
    KeyFormat(String),

    /// An environment-sourced key could not be parsed even after the PEM
    /// reconstruction heuristic was applied.
    #[error("private key could not be parsed: {0}")]
    KeyParse(String),

    /// The key material decoded cleanly but is not an RSA private key.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The machine identifier failed validation (empty or blank).
    #[error("invalid machine id: {0}")]
    InvalidMachineId(String),

    /// The expiry date string did not match the strict `YYYY-MM-DD` format
    /// or named an impossible calendar date.
    #[error("invalid expiry date: {0}")]
    DateFormat(String),

    /// The computed expiry instant violates the issuance policy (already in
    /// the past, or beyond the configured horizon).
    #[error("expiry date out of range: {0}")]
    ExpiryOutOfRange(String),

    /// The signature operation itself failed. Never retried; retrying a
    /// signing operation has no corrective value.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Payload or license serialization / compression failed.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A token string could not be decoded back into a license.
    #[error("token decode failed: {0}")]
    TokenDecode(String),

    /// RSA key pair generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem I/O failure outside of key parsing (key pair persistence).
    #[error("i/o error: {0}")]
    Io(String),
}

impl LicenseError {
    /// Stable machine-readable code for this error kind.
    ///
    /// These strings are part of the API surface (they appear in HTTP error
    /// bodies) and must not change between releases.
    pub fn code(&self) -> &'static str {
        match self {
            LicenseError::KeyMaterialMissing(_) => "KEY_MATERIAL_MISSING",
            LicenseError::KeyFormat(_) => "KEY_FORMAT_ERROR",
            LicenseError::KeyParse(_) => "KEY_PARSE_ERROR",
            LicenseError::UnsupportedKeyType(_) => "UNSUPPORTED_KEY_TYPE",
            LicenseError::InvalidMachineId(_) => "INVALID_MACHINE_ID",
            LicenseError::DateFormat(_) => "DATE_FORMAT_ERROR",
            LicenseError::ExpiryOutOfRange(_) => "EXPIRY_OUT_OF_RANGE",
            LicenseError::Signing(_) => "SIGNING_ERROR",
            LicenseError::Serialization(_) => "SERIALIZATION_ERROR",
            LicenseError::TokenDecode(_) => "TOKEN_DECODE_ERROR",
            LicenseError::KeyGeneration(_) => "KEY_GENERATION_ERROR",
            LicenseError::Config(_) => "CONFIG_ERROR",
            LicenseError::Io(_) => "IO_ERROR",
        }
    }

    /// True when the error was caused by caller-supplied input rather than
    /// server-side state. Used by the HTTP adapter for status mapping.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LicenseError::InvalidMachineId(_)
                | LicenseError::DateFormat(_)
                | LicenseError::ExpiryOutOfRange(_)
                | LicenseError::TokenDecode(_)
        )
    }
}
