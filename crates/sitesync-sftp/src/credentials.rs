//! Secret reference resolution
//!
//! References take the form `scheme:value`:
//!
//! - `env:NAME` reads the environment variable `NAME`
//! - `plain:VALUE` is the secret itself (tests and throwaway setups)

use sitesync_core::{CredentialError, CredentialProvider, Secret};

/// Resolves `env:` and `plain:` secret references
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialProvider;

impl CredentialProvider for EnvCredentialProvider {
    fn decrypt(&self, reference: &str) -> Result<Secret, CredentialError> {
        let Some((scheme, value)) = reference.split_once(':') else {
            return Err(CredentialError(
                "Secret reference must look like env:NAME or plain:VALUE".to_string(),
            ));
        };

        match scheme {
            "env" => std::env::var(value)
                .map(Secret::new)
                .map_err(|e| CredentialError(format!("Environment variable {value}: {e}"))),
            "plain" => Ok(Secret::new(value)),
            other => Err(CredentialError(format!(
                "Unsupported secret reference scheme {other:?}"
            ))),
        }
    }
}
