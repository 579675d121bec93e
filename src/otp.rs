//! Email one-time-password registry.
//!
//! Codes are keyed by the requesting email address, so concurrent sign-ins
//! never clobber each other. Each entry carries its own expiry; issuing a
//! new code replaces whatever was pending for that address, and a
//! successful verification consumes the code. Everything lives in process
//! memory; a restart simply forces users to request a fresh code.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand_core::{OsRng, RngCore};

/// How long an issued code stays valid.
const CODE_TTL_MINUTES: i64 = 5;

/// Wrong guesses tolerated before the pending code is thrown away.
const MAX_FAILED_ATTEMPTS: u32 = 5;

/// Delivery seam for issued codes. The backend wires in an SMTP-backed or
/// log-backed implementation; tests record the calls.
pub trait Mailer: Send + Sync {
    fn send_code(&self, email: &str, code: &str) -> Result<()>;
}

/// Mailer that prints the code on stderr. Useful for development setups
/// without a mail relay.
pub struct StderrMailer;

impl Mailer for StderrMailer {
    fn send_code(&self, email: &str, code: &str) -> Result<()> {
        eprintln!("one-time code for {email}: {code}");
        Ok(())
    }
}

struct PendingCode {
    code: String,
    expires_at: DateTime<Utc>,
    failed_attempts: u32,
}

/// Outcome of a verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Code matched and was consumed.
    Accepted,
    /// No pending code for this address, or it was already consumed.
    NotRequested,
    /// A code was pending but its TTL elapsed; the entry is purged.
    Expired,
    /// A code is pending but the submitted value does not match. The
    /// pending code stays usable until the wrong-guess budget runs out,
    /// after which the entry is purged.
    Mismatch,
}

/// In-memory store of pending codes, one slot per email address.
pub struct OtpRegistry {
    pending: Mutex<HashMap<String, PendingCode>>,
}

impl Default for OtpRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OtpRegistry {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Issues a fresh six-digit code for `email`, replacing any pending
    /// one, and hands it to the mailer. The code is never returned to the
    /// caller; delivery is the only way out.
    pub fn issue(&self, email: &str, mailer: &dyn Mailer) -> Result<()> {
        self.issue_at(email, mailer, Utc::now())
    }

    fn issue_at(&self, email: &str, mailer: &dyn Mailer, now: DateTime<Utc>) -> Result<()> {
        let code = six_digit_code();
        mailer.send_code(email, &code)?;
        self.pending.lock().insert(
            normalize_email(email),
            PendingCode {
                code,
                expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
                failed_attempts: 0,
            },
        );
        Ok(())
    }

    /// Checks `code` against the pending entry for `email`. Acceptance and
    /// expiry both remove the entry; a mismatch leaves it in place so the
    /// user can retry from the same mail.
    pub fn verify(&self, email: &str, code: &str) -> VerifyOutcome {
        self.verify_at(email, code, Utc::now())
    }

    fn verify_at(&self, email: &str, code: &str, now: DateTime<Utc>) -> VerifyOutcome {
        let key = normalize_email(email);
        let mut pending = self.pending.lock();
        let Some(entry) = pending.get_mut(&key) else {
            return VerifyOutcome::NotRequested;
        };
        if now > entry.expires_at {
            pending.remove(&key);
            return VerifyOutcome::Expired;
        }
        if entry.code != code.trim() {
            entry.failed_attempts += 1;
            if entry.failed_attempts >= MAX_FAILED_ATTEMPTS {
                pending.remove(&key);
            }
            return VerifyOutcome::Mismatch;
        }
        pending.remove(&key);
        VerifyOutcome::Accepted
    }
}

/// Addresses differing only in case share one slot.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn six_digit_code() -> String {
    let value = OsRng.next_u32() % 1_000_000;
    format!("{value:06}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;

    /// Mailer that captures every (email, code) pair it is asked to send.
    #[derive(Default)]
    struct RecordingMailer {
        sent: SyncMutex<Vec<(String, String)>>,
    }

    impl RecordingMailer {
        fn last_code_for(&self, email: &str) -> String {
            self.sent
                .lock()
                .iter()
                .rev()
                .find(|(to, _)| to == email)
                .map(|(_, code)| code.clone())
                .unwrap()
        }
    }

    impl Mailer for RecordingMailer {
        fn send_code(&self, email: &str, code: &str) -> Result<()> {
            self.sent
                .lock()
                .push((email.to_string(), code.to_string()));
            Ok(())
        }
    }

    #[test]
    fn issued_code_is_six_digits_and_verifies_once() {
        let registry = OtpRegistry::new();
        let mailer = RecordingMailer::default();
        registry.issue("user@example.com", &mailer).unwrap();

        let code = mailer.last_code_for("user@example.com");
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        assert_eq!(
            registry.verify("user@example.com", &code),
            VerifyOutcome::Accepted
        );
        // Consumed on success.
        assert_eq!(
            registry.verify("user@example.com", &code),
            VerifyOutcome::NotRequested
        );
    }

    /// Two addresses requesting codes around the same time each verify with
    /// their own code; neither overwrites the other.
    #[test]
    fn concurrent_requests_are_isolated_per_email() {
        let registry = OtpRegistry::new();
        let mailer = RecordingMailer::default();
        registry.issue("a@example.com", &mailer).unwrap();
        registry.issue("b@example.com", &mailer).unwrap();

        let code_a = mailer.last_code_for("a@example.com");
        let code_b = mailer.last_code_for("b@example.com");

        assert_eq!(
            registry.verify("b@example.com", &code_b),
            VerifyOutcome::Accepted
        );
        assert_eq!(
            registry.verify("a@example.com", &code_a),
            VerifyOutcome::Accepted
        );
    }

    #[test]
    fn reissue_replaces_the_pending_code() {
        let registry = OtpRegistry::new();
        let mailer = RecordingMailer::default();
        registry.issue("user@example.com", &mailer).unwrap();
        let first = mailer.last_code_for("user@example.com");
        registry.issue("user@example.com", &mailer).unwrap();
        let second = mailer.last_code_for("user@example.com");

        if first != second {
            assert_eq!(
                registry.verify("user@example.com", &first),
                VerifyOutcome::Mismatch
            );
        }
        assert_eq!(
            registry.verify("user@example.com", &second),
            VerifyOutcome::Accepted
        );
    }

    #[test]
    fn expired_codes_are_rejected_and_purged() {
        let registry = OtpRegistry::new();
        let mailer = RecordingMailer::default();
        let issued_at = Utc::now();
        registry
            .issue_at("user@example.com", &mailer, issued_at)
            .unwrap();
        let code = mailer.last_code_for("user@example.com");

        let after_ttl = issued_at + Duration::minutes(CODE_TTL_MINUTES) + Duration::seconds(1);
        assert_eq!(
            registry.verify_at("user@example.com", &code, after_ttl),
            VerifyOutcome::Expired
        );
        assert_eq!(
            registry.verify_at("user@example.com", &code, after_ttl),
            VerifyOutcome::NotRequested
        );
    }

    #[test]
    fn mismatch_leaves_the_code_pending() {
        let registry = OtpRegistry::new();
        let mailer = RecordingMailer::default();
        registry.issue("user@example.com", &mailer).unwrap();
        let code = mailer.last_code_for("user@example.com");

        assert_eq!(
            registry.verify("user@example.com", "000000x"),
            VerifyOutcome::Mismatch
        );
        assert_eq!(
            registry.verify("user@example.com", &code),
            VerifyOutcome::Accepted
        );
    }

    #[test]
    fn repeated_wrong_guesses_exhaust_the_code() {
        let registry = OtpRegistry::new();
        let mailer = RecordingMailer::default();
        registry.issue("user@example.com", &mailer).unwrap();
        let code = mailer.last_code_for("user@example.com");

        for _ in 0..MAX_FAILED_ATTEMPTS {
            assert_eq!(
                registry.verify("user@example.com", "wrong!"),
                VerifyOutcome::Mismatch
            );
        }
        // The real code no longer works; a fresh one must be requested.
        assert_eq!(
            registry.verify("user@example.com", &code),
            VerifyOutcome::NotRequested
        );
    }

    #[test]
    fn email_keys_are_case_insensitive() {
        let registry = OtpRegistry::new();
        let mailer = RecordingMailer::default();
        registry.issue("User@Example.COM", &mailer).unwrap();
        let code = mailer.last_code_for("User@Example.COM");
        assert_eq!(
            registry.verify("user@example.com", &code),
            VerifyOutcome::Accepted
        );
    }

    #[test]
    fn verify_without_request_is_rejected() {
        let registry = OtpRegistry::new();
        assert_eq!(
            registry.verify("nobody@example.com", "123456"),
            VerifyOutcome::NotRequested
        );
    }
}
