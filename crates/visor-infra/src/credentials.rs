//! Credential resolution chain.
//!
//! Resolves the gateway bearer credential in priority order: environment
//! variable first, then a plain credential file in the data directory.
//! First match wins; absence everywhere is a valid state the orchestrator
//! handles by refusing to start a session.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use visor_core::credentials::CredentialStore;
use visor_types::config::GatewaySection;

/// Name of the credential file inside the data directory.
const CREDENTIAL_FILE: &str = "credential";

/// Reads the credential from a configured environment variable.
///
/// Highest priority in the chain: an env var overrides the file.
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialStore for EnvCredential {
    fn bearer_token(&self) -> Option<SecretString> {
        std::env::var(&self.var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(SecretString::from)
    }
}

/// Reads the credential from `{data_dir}/credential` (trimmed).
pub struct FileCredential {
    path: PathBuf,
}

impl FileCredential {
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CREDENTIAL_FILE),
        }
    }
}

impl CredentialStore for FileCredential {
    fn bearer_token(&self) -> Option<SecretString> {
        std::fs::read_to_string(&self.path)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(SecretString::from)
    }
}

/// Ordered chain of credential providers; first `Some` wins.
pub struct CredentialChain {
    providers: Vec<Box<dyn CredentialStore>>,
}

impl CredentialChain {
    pub fn new(providers: Vec<Box<dyn CredentialStore>>) -> Self {
        Self { providers }
    }
}

impl CredentialStore for CredentialChain {
    fn bearer_token(&self) -> Option<SecretString> {
        self.providers.iter().find_map(|p| p.bearer_token())
    }
}

/// The default chain: `$api_key_env`, then the credential file.
pub fn default_credential_chain(gateway: &GatewaySection, data_dir: &Path) -> CredentialChain {
    CredentialChain::new(vec![
        Box::new(EnvCredential::new(gateway.api_key_env.clone())),
        Box::new(FileCredential::in_data_dir(data_dir)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    #[test]
    fn env_credential_trims_and_rejects_empty() {
        // Unique var names keep parallel tests from interfering.
        unsafe { std::env::set_var("VISOR_TEST_CRED_A", "  sk-from-env  ") };
        let cred = EnvCredential::new("VISOR_TEST_CRED_A");
        assert_eq!(cred.bearer_token().unwrap().expose_secret(), "sk-from-env");

        unsafe { std::env::set_var("VISOR_TEST_CRED_B", "   ") };
        assert!(EnvCredential::new("VISOR_TEST_CRED_B").bearer_token().is_none());
        assert!(EnvCredential::new("VISOR_TEST_CRED_UNSET").bearer_token().is_none());
    }

    #[test]
    fn file_credential_reads_trimmed_token() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("credential"), "sk-from-file\n").unwrap();

        let cred = FileCredential::in_data_dir(tmp.path());
        assert_eq!(cred.bearer_token().unwrap().expose_secret(), "sk-from-file");
    }

    #[test]
    fn missing_file_yields_none() {
        let tmp = TempDir::new().unwrap();
        assert!(FileCredential::in_data_dir(tmp.path()).bearer_token().is_none());
    }

    #[test]
    fn chain_prefers_the_environment_over_the_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("credential"), "sk-from-file").unwrap();
        unsafe { std::env::set_var("VISOR_TEST_CRED_CHAIN", "sk-from-env") };

        let gateway = GatewaySection {
            api_key_env: "VISOR_TEST_CRED_CHAIN".to_string(),
            ..GatewaySection::default()
        };
        let chain = default_credential_chain(&gateway, tmp.path());
        assert_eq!(chain.bearer_token().unwrap().expose_secret(), "sk-from-env");
    }

    #[test]
    fn chain_falls_back_to_the_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("credential"), "sk-from-file").unwrap();

        let gateway = GatewaySection {
            api_key_env: "VISOR_TEST_CRED_FALLBACK_UNSET".to_string(),
            ..GatewaySection::default()
        };
        let chain = default_credential_chain(&gateway, tmp.path());
        assert_eq!(chain.bearer_token().unwrap().expose_secret(), "sk-from-file");
    }
}
