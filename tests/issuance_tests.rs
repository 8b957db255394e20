//! End-to-end tests for the issuance pipeline: key acquisition through
//! token encoding, including the offline verification a client would do.

use std::sync::{Arc, OnceLock};
use std::thread;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::LineEnding;
use rsa::{Pss, RsaPrivateKey};
use sha2::{Digest, Sha256};

use keyforge::engine::Issuer;
use keyforge::errors::LicenseError;
use keyforge::expiry::{ExpiryCalculator, ExpiryPolicy};
use keyforge::key_material::{CachedProvider, DirectProvider};
use keyforge::key_source::{FileSource, MemorySource, Provenance};
use keyforge::keypair;
use keyforge::signer::LicenseData;
use keyforge::token;

fn test_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate test key")
    })
}

fn test_pem() -> String {
    test_key().to_pkcs1_pem(LineEnding::LF).unwrap().to_string()
}

fn now() -> DateTime<Utc> {
    "2025-06-01T00:00:00Z".parse().unwrap()
}

fn file_issuer() -> Issuer<DirectProvider<MemorySource>> {
    Issuer::new(DirectProvider::new(MemorySource::new(
        test_pem().into_bytes(),
        Provenance::File,
    )))
}

/// Verify a token offline the way a client application would: decode,
/// decompress, parse, re-digest the payload, check the signature.
fn verify_token(token: &str) -> LicenseData {
    let license = token::decode(token).expect("token must decode");
    let payload = BASE64.decode(&license.data).unwrap();
    let signature = BASE64.decode(&license.signature).unwrap();

    let digest = Sha256::digest(&payload);
    test_key()
        .to_public_key()
        .verify(Pss::new::<Sha256>(), &digest, &signature)
        .expect("signature must verify under the public key");

    serde_json::from_slice(&payload).expect("payload must be LicenseData JSON")
}

#[test]
fn full_round_trip_reproduces_license_data() {
    let token = file_issuer()
        .issue("machine-0011223344", "2025-06-15", now())
        .unwrap();

    let data = verify_token(&token);
    assert_eq!(data.machine_id, "machine-0011223344");
    // 2025-06-15T23:59:59+08:00
    let expected: DateTime<Utc> = "2025-06-15T15:59:59Z".parse().unwrap();
    assert_eq!(data.expiry_utc, expected.timestamp());
}

#[test]
fn token_is_opaque_transport_safe_text() {
    let token = file_issuer()
        .issue("machine-0011223344", "2025-06-15", now())
        .unwrap();
    assert!(token.is_ascii());
    assert!(!token.contains('\n'));
    // serialize → gzip → base64 of a signed document is long by nature
    assert!(token.len() > 100);
}

#[test]
fn issuance_works_from_a_key_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let private = dir.path().join("private.pem");
    let public = dir.path().join("public.pem");
    keypair::write_key_pair(test_key(), &private, &public).unwrap();

    let issuer = Issuer::new(CachedProvider::new(FileSource::new(&private)));
    let token = issuer.issue("machine-0011223344", "2025-06-15", now()).unwrap();
    verify_token(&token);
}

#[test]
fn mangled_environment_key_still_issues() {
    // Simulates a PEM pasted into an env var: newlines and header spacing lost.
    let mangled = test_pem().replace('\n', "").replace(' ', "");
    let issuer = Issuer::new(DirectProvider::new(MemorySource::new(
        mangled.into_bytes(),
        Provenance::Environment,
    )));

    let token = issuer.issue("machine-0011223344", "2025-06-15", now()).unwrap();
    verify_token(&token);
}

#[test]
fn corrupted_environment_key_fails_cleanly() {
    let pem = test_pem().replace('\n', "");
    let truncated = pem[..pem.len() / 2].to_string();
    let issuer = Issuer::new(DirectProvider::new(MemorySource::new(
        truncated.into_bytes(),
        Provenance::Environment,
    )));

    let err = issuer
        .issue("machine-0011223344", "2025-06-15", now())
        .unwrap_err();
    assert!(matches!(err, LicenseError::KeyParse(_)), "got {err:?}");
}

#[test]
fn horizon_policy_applies_end_to_end() {
    let issuer = file_issuer();
    let now: DateTime<Utc> = "2025-01-01T00:00:00Z".parse().unwrap();

    assert!(issuer.issue("machine-0011223344", "2025-02-02", now).is_ok());
    let err = issuer
        .issue("machine-0011223344", "2025-02-03", now)
        .unwrap_err();
    assert!(matches!(err, LicenseError::ExpiryOutOfRange(_)));
}

#[test]
fn relaxed_policy_only_rejects_the_past() {
    let issuer = file_issuer().with_policy(ExpiryPolicy::not_in_past());
    let now: DateTime<Utc> = "2025-01-01T00:00:00Z".parse().unwrap();

    // Far beyond the standard horizon, fine without one.
    assert!(issuer.issue("machine-0011223344", "2030-01-01", now).is_ok());
    assert!(issuer.issue("machine-0011223344", "2024-12-30", now).is_err());
}

#[test]
fn custom_offset_moves_the_expiry_boundary() {
    let issuer = file_issuer().with_calculator(ExpiryCalculator::from_offset_hours(0).unwrap());
    let token = issuer.issue("machine-0011223344", "2025-06-15", now()).unwrap();

    let data = verify_token(&token);
    let expected: DateTime<Utc> = "2025-06-15T23:59:59Z".parse().unwrap();
    assert_eq!(data.expiry_utc, expected.timestamp());
}

#[test]
fn concurrent_issuances_do_not_interfere() {
    let issuer = Arc::new(Issuer::new(CachedProvider::new(MemorySource::new(
        test_pem().into_bytes(),
        Provenance::File,
    ))));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let issuer = Arc::clone(&issuer);
            thread::spawn(move || {
                let machine_id = format!("machine-{i:04}-concurrent");
                let token = issuer.issue(&machine_id, "2025-06-15", now()).unwrap();
                (machine_id, token)
            })
        })
        .collect();

    let mut signatures = Vec::new();
    for handle in handles {
        let (machine_id, token) = handle.join().unwrap();
        let data = verify_token(&token);
        // Each call sees its own payload, never another thread's.
        assert_eq!(data.machine_id, machine_id);
        signatures.push(token::decode(&token).unwrap().signature);
    }

    // Randomized PSS salts: no two signatures collide, even for calls that
    // shared the cached key.
    signatures.sort();
    signatures.dedup();
    assert_eq!(signatures.len(), 8);
}
