//! The issuance engine.
//!
//! [`Issuer`] is the single pipeline behind every entry point (CLI, HTTP, or
//! an embedding application): validate inputs, obtain the signing key, build
//! and sign the payload, encode the token. Both adapters used to carry their
//! own copy of this sequence; they are now thin shells over this module, so
//! their behavior cannot drift apart.
//!
//! The engine is stateless per call and holds no mutable shared state, so a
//! single `Issuer` may be used from many threads without locking. Nothing is
//! retried internally and no call is cancellable; callers wanting bounded
//! latency impose their own deadline around `issue`.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::errors::{LicenseError, LicenseResult};
use crate::expiry::{ExpiryCalculator, ExpiryPolicy};
use crate::key_material::KeyProvider;
use crate::signer;
use crate::token;

/// Issues machine-bound license tokens.
pub struct Issuer<P: KeyProvider> {
    provider: P,
    calculator: ExpiryCalculator,
    policy: ExpiryPolicy,
}

impl<P: KeyProvider> Issuer<P> {
    /// Issuer with the default calculator (UTC+8) and standard policy
    /// (one month plus one day horizon).
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            calculator: ExpiryCalculator::default(),
            policy: ExpiryPolicy::default(),
        }
    }

    pub fn with_calculator(mut self, calculator: ExpiryCalculator) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn with_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Issue a license token for a machine and expiry date, relative to an
    /// injected `now`.
    ///
    /// Every failure is terminal for this call and reported as-is; see
    /// [`LicenseError`] for the kinds.
    pub fn issue(
        &self,
        machine_id: &str,
        expiry_date: &str,
        now: DateTime<Utc>,
    ) -> LicenseResult<String> {
        // Cheap input validation happens before any key material is touched.
        let machine_id = machine_id.trim();
        if machine_id.is_empty() {
            return Err(LicenseError::InvalidMachineId(
                "machine id must not be empty".to_string(),
            ));
        }

        debug!(machine_id, expiry_date, "issuing license");

        let key = self.provider.signing_key()?;
        let expiry = self.calculator.validate(expiry_date, now, &self.policy)?;
        let license = signer::sign(machine_id, expiry, &key)?;
        let token = token::encode(&license)?;

        info!(machine_id, %expiry, "license issued");
        Ok(token)
    }

    /// [`issue`](Self::issue) with the current wall-clock time.
    pub fn issue_now(&self, machine_id: &str, expiry_date: &str) -> LicenseResult<String> {
        self.issue(machine_id, expiry_date, Utc::now())
    }
}
