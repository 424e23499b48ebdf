//! Credential store seam.
//!
//! The bearer credential for the remote gateway is resolved through this
//! trait. Absence is a valid, expected state: `enter_active_mode` consults
//! it and short-circuits before any network call when no credential is
//! configured. The resolution chain (environment variable, then config
//! file) lives in `visor-infra`.

use secrecy::SecretString;

/// Read-only access to the configured bearer credential.
pub trait CredentialStore: Send + Sync {
    /// The bearer token, or `None` when nothing is configured.
    fn bearer_token(&self) -> Option<SecretString>;
}

/// A fixed credential, mainly for tests and one-off tooling.
pub struct StaticCredential(Option<SecretString>);

impl StaticCredential {
    pub fn present(token: impl Into<String>) -> Self {
        Self(Some(SecretString::from(token.into())))
    }

    pub fn absent() -> Self {
        Self(None)
    }
}

impl CredentialStore for StaticCredential {
    fn bearer_token(&self) -> Option<SecretString> {
        self.0.clone()
    }
}
