use chrono::{DateTime, Utc};

/// Verified caller context derived from a bearer token.
///
/// Only [`super::CredentialVerifier`] can construct one, so holding an
/// `Identity` proves the request passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    subject: String,
    issuer: String,
    expires_at: DateTime<Utc>,
}

impl Identity {
    pub(crate) fn new(subject: String, issuer: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            subject,
            issuer,
            expires_at,
        }
    }

    /// The token's `sub` claim.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[cfg(test)]
impl Identity {
    /// Identity for unit tests that exercise code downstream of verification.
    pub(crate) fn for_tests(subject: &str) -> Self {
        Self::new(
            subject.to_string(),
            "https://auth.emu-test.local".to_string(),
            Utc::now() + chrono::Duration::hours(1),
        )
    }
}
