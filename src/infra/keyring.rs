//! Credential storage
//!
//! Per-organization personal access tokens. Resolution order:
//! 1. `AZDO_TOKEN` environment variable
//! 2. System keyring (when the `keyring` feature is enabled)
//! 3. Plaintext `credentials.yml` (written only when the keyring is
//!    unavailable or `--insecure-storage` was requested)
//!
//! Lookups always use the exact organization name; a token stored for a
//! differently named organization is never used as a fallback.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::store::{ConfigError, ConfigStore};

/// Keyring entries use service `azdo:<organization>` and this user name
const KEYRING_USER: &str = "pat";

/// Credential errors
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The platform keyring cannot be used
    #[error("keyring unavailable: {0}")]
    Unavailable(String),

    /// The keyring rejected an operation
    #[error("keyring error: {0}")]
    Keyring(String),

    /// The plaintext store failed
    #[error(transparent)]
    File(#[from] ConfigError),
}

/// Where a token was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// `AZDO_TOKEN`
    Env,
    /// OS keyring
    Keyring,
    /// Plaintext credentials file
    File,
}

impl std::fmt::Display for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env => write!(f, "AZDO_TOKEN"),
            Self::Keyring => write!(f, "keyring"),
            Self::File => write!(f, "credentials.yml"),
        }
    }
}

/// A token together with its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    /// The token value
    pub value: String,
    /// Where it came from
    pub source: TokenSource,
}

/// Where `store` put a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOutcome {
    /// Stored in the OS keyring
    Keyring,
    /// Stored in plaintext; `reason` explains why the keyring was skipped
    Plaintext { reason: String },
}

/// Secret backend keyed by organization
pub trait SecretStore: Send + Sync {
    /// Read a secret
    fn get(&self, organization: &str) -> Result<Option<String>, CredentialError>;
    /// Write a secret
    fn set(&self, organization: &str, secret: &str) -> Result<(), CredentialError>;
    /// Delete a secret; missing entries are not an error
    fn delete(&self, organization: &str) -> Result<(), CredentialError>;
}

/// OS keyring backend
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemKeyring;

fn service_name(organization: &str) -> String {
    format!("azdo:{organization}")
}

#[cfg(feature = "keyring")]
impl SecretStore for SystemKeyring {
    fn get(&self, organization: &str) -> Result<Option<String>, CredentialError> {
        let entry = keyring::Entry::new(&service_name(organization), KEYRING_USER)
            .map_err(|e| CredentialError::Unavailable(e.to_string()))?;
        match entry.get_password() {
            Ok(value) if value.is_empty() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e @ (keyring::Error::NoStorageAccess(_) | keyring::Error::PlatformFailure(_))) => {
                Err(CredentialError::Unavailable(e.to_string()))
            }
            Err(e) => Err(CredentialError::Keyring(e.to_string())),
        }
    }

    fn set(&self, organization: &str, secret: &str) -> Result<(), CredentialError> {
        let entry = keyring::Entry::new(&service_name(organization), KEYRING_USER)
            .map_err(|e| CredentialError::Unavailable(e.to_string()))?;
        entry.set_password(secret).map_err(|e| match e {
            keyring::Error::NoStorageAccess(_) | keyring::Error::PlatformFailure(_) => {
                CredentialError::Unavailable(e.to_string())
            }
            other => CredentialError::Keyring(other.to_string()),
        })
    }

    fn delete(&self, organization: &str) -> Result<(), CredentialError> {
        let entry = keyring::Entry::new(&service_name(organization), KEYRING_USER)
            .map_err(|e| CredentialError::Unavailable(e.to_string()))?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CredentialError::Keyring(e.to_string())),
        }
    }
}

#[cfg(not(feature = "keyring"))]
impl SecretStore for SystemKeyring {
    fn get(&self, _organization: &str) -> Result<Option<String>, CredentialError> {
        Ok(None)
    }

    fn set(&self, _organization: &str, _secret: &str) -> Result<(), CredentialError> {
        Err(CredentialError::Unavailable(
            "keyring support not compiled in (enable the 'keyring' feature)".to_string(),
        ))
    }

    fn delete(&self, _organization: &str) -> Result<(), CredentialError> {
        Ok(())
    }
}

/// In-memory secrets, for tests and for hosts without a keyring
#[derive(Debug, Default)]
pub struct MemorySecrets {
    secrets: Mutex<HashMap<String, String>>,
    unavailable: bool,
}

impl MemorySecrets {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that behaves like a missing keyring
    pub fn unavailable() -> Self {
        Self {
            secrets: Mutex::new(HashMap::new()),
            unavailable: true,
        }
    }
}

impl SecretStore for MemorySecrets {
    fn get(&self, organization: &str) -> Result<Option<String>, CredentialError> {
        if self.unavailable {
            return Err(CredentialError::Unavailable("no keyring".into()));
        }
        Ok(self.secrets.lock().get(organization).cloned())
    }

    fn set(&self, organization: &str, secret: &str) -> Result<(), CredentialError> {
        if self.unavailable {
            return Err(CredentialError::Unavailable("no keyring".into()));
        }
        self.secrets
            .lock()
            .insert(organization.to_string(), secret.to_string());
        Ok(())
    }

    fn delete(&self, organization: &str) -> Result<(), CredentialError> {
        self.secrets.lock().remove(organization);
        Ok(())
    }
}

/// Per-organization token storage
pub struct CredentialStore {
    env_token: Option<String>,
    keyring: Arc<dyn SecretStore>,
    file: ConfigStore,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("env_token", &self.env_token.as_ref().map(|_| "<redacted>"))
            .field("file", &self.file)
            .finish()
    }
}

impl CredentialStore {
    /// Create a store; `file` is the plaintext fallback
    pub fn new(env_token: Option<String>, keyring: Arc<dyn SecretStore>, file: ConfigStore) -> Self {
        Self {
            env_token,
            keyring,
            file,
        }
    }

    /// Whether `AZDO_TOKEN` is set
    pub fn has_env_token(&self) -> bool {
        self.env_token.is_some()
    }

    /// Resolve the token for an organization
    pub fn token(&self, organization: &str) -> Result<Option<ResolvedToken>, CredentialError> {
        if let Some(value) = &self.env_token {
            return Ok(Some(ResolvedToken {
                value: value.clone(),
                source: TokenSource::Env,
            }));
        }
        match self.keyring.get(organization) {
            Ok(Some(value)) => {
                return Ok(Some(ResolvedToken {
                    value,
                    source: TokenSource::Keyring,
                }))
            }
            Ok(None) => {}
            Err(e) => tracing::debug!("keyring lookup for '{}' failed: {}", organization, e),
        }
        Ok(self
            .file
            .get(&["organizations", organization, "pat"])?
            .map(|value| ResolvedToken {
                value,
                source: TokenSource::File,
            }))
    }

    /// Store a token, preferring the keyring unless `insecure` is set
    pub fn store(
        &self,
        organization: &str,
        token: &str,
        insecure: bool,
    ) -> Result<StorageOutcome, CredentialError> {
        let reason = if insecure {
            "--insecure-storage was specified".to_string()
        } else {
            match self.keyring.set(organization, token) {
                Ok(()) => {
                    // A stale plaintext copy would shadow nothing but still leak
                    self.file.remove(&["organizations", organization, "pat"])?;
                    return Ok(StorageOutcome::Keyring);
                }
                Err(CredentialError::Unavailable(reason)) => reason,
                Err(e) => return Err(e),
            }
        };
        self.file.set(&["organizations", organization, "pat"], token)?;
        Ok(StorageOutcome::Plaintext { reason })
    }

    /// Remove a token from every store
    pub fn remove(&self, organization: &str) -> Result<(), CredentialError> {
        if let Err(e) = self.keyring.delete(organization) {
            tracing::debug!("keyring delete for '{}' failed: {}", organization, e);
        }
        self.file.remove(&["organizations", organization])?;
        Ok(())
    }
}
