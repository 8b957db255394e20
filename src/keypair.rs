//! RSA key pair generation and persistence.
//!
//! Backs the CLI `generate` command: produce a 2048-bit key pair, write the
//! private half as PKCS#1 PEM with owner-only permissions, and the public
//! half as SPKI PEM for distribution to verifiers.

use std::fs;
use std::path::Path;

use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use tracing::info;

use crate::errors::{LicenseError, LicenseResult};

/// Key size used for newly generated signing keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Generate a fresh RSA private key.
pub fn generate_private_key(bits: usize) -> LicenseResult<RsaPrivateKey> {
    RsaPrivateKey::new(&mut rand::thread_rng(), bits)
        .map_err(|e| LicenseError::KeyGeneration(e.to_string()))
}

/// Write a key pair to disk: PKCS#1 private PEM and SPKI public PEM.
///
/// Parent directories are created as needed. On unix the private key file is
/// chmodded to 0600. Existing files are overwritten; the overwrite
/// confirmation is the CLI adapter's concern.
pub fn write_key_pair(
    key: &RsaPrivateKey,
    private_path: impl AsRef<Path>,
    public_path: impl AsRef<Path>,
) -> LicenseResult<()> {
    let private_path = private_path.as_ref();
    let public_path = public_path.as_ref();

    let private_pem = key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| LicenseError::KeyGeneration(format!("PEM encoding failed: {e}")))?;
    let public_pem = key
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| LicenseError::KeyGeneration(format!("public PEM encoding failed: {e}")))?;

    write_with_parents(private_path, private_pem.as_bytes())?;
    restrict_permissions(private_path)?;
    write_with_parents(public_path, public_pem.as_bytes())?;

    info!(
        private = %private_path.display(),
        public = %public_path.display(),
        "key pair written"
    );
    Ok(())
}

fn write_with_parents(path: &Path, bytes: &[u8]) -> LicenseResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                LicenseError::Io(format!("cannot create directory '{}': {e}", parent.display()))
            })?;
        }
    }
    fs::write(path, bytes)
        .map_err(|e| LicenseError::Io(format!("cannot write '{}': {e}", path.display())))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> LicenseResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| LicenseError::Io(format!("cannot chmod '{}': {e}", path.display())))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> LicenseResult<()> {
    Ok(())
}
