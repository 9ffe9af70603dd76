//! Config store
//!
//! A tree of nested string maps persisted as YAML in `config.yml`. The
//! store reads its backend lazily on first access and writes through on
//! every mutation. Backends are pluggable so tests and one-off invocations
//! can run against a string literal or an in-memory buffer.

use parking_lot::{Mutex, RwLock};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::defaults;
use crate::infra::filesystem;

/// Config error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config
    #[error("Failed to read config '{path}': {error}")]
    Read { path: String, error: String },

    /// Failed to parse config
    #[error("Failed to parse config '{path}': {error}")]
    Parse { path: String, error: String },

    /// Failed to write config
    #[error("Failed to write config '{path}': {error}")]
    Write { path: String, error: String },

    /// Value outside the allowed set of a known key
    #[error("invalid value {value:?} for {key}: valid values are {}", allowed.join(", "))]
    InvalidValue {
        key: String,
        value: String,
        allowed: Vec<String>,
    },

    /// A path segment points into a scalar
    #[error("config key '{0}' is not a map")]
    NotAMap(String),
}

/// Where the config tree is read from and written to
pub trait ConfigBackend: Send + Sync {
    /// Read the raw document; `None` when nothing has been stored yet
    fn load(&self) -> Result<Option<String>, ConfigError>;

    /// Persist the raw document
    fn save(&self, content: &str) -> Result<(), ConfigError>;

    /// Human-readable location for error messages
    fn location(&self) -> String;
}

/// Config persisted in a file with owner-only permissions
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create a file backend
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigBackend for FileBackend {
    fn load(&self) -> Result<Option<String>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }
        filesystem::read_file(&self.path)
            .map(Some)
            .map_err(|e| ConfigError::Read {
                path: self.location(),
                error: e.to_string(),
            })
    }

    fn save(&self, content: &str) -> Result<(), ConfigError> {
        filesystem::write_private(&self.path, content).map_err(|e| ConfigError::Write {
            path: self.location(),
            error: e.to_string(),
        })
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Read-only literal; writes are kept in memory for the process lifetime
#[derive(Debug)]
pub struct StringBackend {
    content: String,
    written: Mutex<Option<String>>,
}

impl StringBackend {
    /// Create a backend from a YAML literal
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            written: Mutex::new(None),
        }
    }
}

impl ConfigBackend for StringBackend {
    fn load(&self) -> Result<Option<String>, ConfigError> {
        Ok(Some(
            self.written
                .lock()
                .clone()
                .unwrap_or_else(|| self.content.clone()),
        ))
    }

    fn save(&self, content: &str) -> Result<(), ConfigError> {
        *self.written.lock() = Some(content.to_string());
        Ok(())
    }

    fn location(&self) -> String {
        "<string>".to_string()
    }
}

/// In-memory backend whose contents can be inspected
#[derive(Debug, Default)]
pub struct MemoryBackend {
    content: Mutex<Option<String>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Last persisted document
    pub fn contents(&self) -> Option<String> {
        self.content.lock().clone()
    }
}

impl ConfigBackend for MemoryBackend {
    fn load(&self) -> Result<Option<String>, ConfigError> {
        Ok(self.content.lock().clone())
    }

    fn save(&self, content: &str) -> Result<(), ConfigError> {
        *self.content.lock() = Some(content.to_string());
        Ok(())
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}

/// A known config option
#[derive(Debug, Clone, Copy)]
pub struct ConfigOption {
    /// Key name
    pub key: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Built-in default
    pub default: &'static str,
    /// Allowed values; empty means free-form
    pub allowed: &'static [&'static str],
}

/// Options understood by `config get/set/list`
pub const KNOWN_OPTIONS: &[ConfigOption] = &[
    ConfigOption {
        key: "git_protocol",
        description: "the protocol to use for git clone and push operations",
        default: defaults::GIT_PROTOCOL,
        allowed: &["https", "ssh"],
    },
    ConfigOption {
        key: "editor",
        description: "the text editor program to use for authoring text",
        default: "",
        allowed: &[],
    },
    ConfigOption {
        key: "prompt",
        description: "toggle interactive prompting in the terminal",
        default: "enabled",
        allowed: &["enabled", "disabled"],
    },
    ConfigOption {
        key: "pager",
        description: "the terminal pager program to send standard output to",
        default: "",
        allowed: &[],
    },
    ConfigOption {
        key: "browser",
        description: "the web browser to use for opening URLs",
        default: "",
        allowed: &[],
    },
    ConfigOption {
        key: "timeout",
        description: "global deadline for a single invocation, e.g. 5m",
        default: "",
        allowed: &[],
    },
];

/// Look up a known option
pub fn known_option(key: &str) -> Option<&'static ConfigOption> {
    KNOWN_OPTIONS.iter().find(|o| o.key == key)
}

/// Organization entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationConfig {
    /// Short name
    pub name: String,
    /// Base URL
    pub url: String,
    /// Preferred git protocol, if set
    pub git_protocol: Option<String>,
}

const KEY_DEFAULT_ORG: &str = "default_organization";
const KEY_ORGANIZATIONS: &str = "organizations";
const KEY_ALIASES: &str = "aliases";

/// Hierarchical config store
pub struct ConfigStore {
    backend: Box<dyn ConfigBackend>,
    root: RwLock<Option<Mapping>>,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("backend", &self.backend.location())
            .finish()
    }
}

impl ConfigStore {
    /// Create a store over a backend
    pub fn new(backend: Box<dyn ConfigBackend>) -> Self {
        Self {
            backend,
            root: RwLock::new(None),
        }
    }

    /// Store backed by a file
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(FileBackend::new(path)))
    }

    /// Store backed by a YAML literal
    pub fn from_yaml(content: &str) -> Self {
        Self::new(Box::new(StringBackend::new(content)))
    }

    /// Empty in-memory store
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    fn ensure_loaded(&self) -> Result<(), ConfigError> {
        if self.root.read().is_some() {
            return Ok(());
        }
        let parsed = match self.backend.load()? {
            Some(text) if !text.trim().is_empty() => {
                let value: Value =
                    serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
                        path: self.backend.location(),
                        error: e.to_string(),
                    })?;
                match value {
                    Value::Mapping(m) => m,
                    Value::Null => Mapping::new(),
                    _ => {
                        return Err(ConfigError::Parse {
                            path: self.backend.location(),
                            error: "top level must be a map".to_string(),
                        })
                    }
                }
            }
            _ => Mapping::new(),
        };
        let mut root = self.root.write();
        if root.is_none() {
            *root = Some(parsed);
        }
        Ok(())
    }

    fn read<R>(&self, f: impl FnOnce(&Mapping) -> R) -> Result<R, ConfigError> {
        self.ensure_loaded()?;
        let root = self.root.read();
        let empty = Mapping::new();
        Ok(f(root.as_ref().unwrap_or(&empty)))
    }

    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Mapping) -> Result<R, ConfigError>,
    ) -> Result<R, ConfigError> {
        self.ensure_loaded()?;
        let mut guard = self.root.write();
        let root = guard.get_or_insert_with(Mapping::new);
        let result = f(root)?;
        let text = serde_yaml::to_string(&Value::Mapping(root.clone())).map_err(|e| {
            ConfigError::Write {
                path: self.backend.location(),
                error: e.to_string(),
            }
        })?;
        self.backend.save(&text)?;
        Ok(result)
    }

    /// Value at a key path
    pub fn get(&self, path: &[&str]) -> Result<Option<String>, ConfigError> {
        self.read(|root| lookup(root, path).and_then(scalar_to_string))
    }

    /// Child keys of the map at a key path, sorted
    pub fn keys(&self, path: &[&str]) -> Result<Vec<String>, ConfigError> {
        self.read(|root| {
            let node = if path.is_empty() {
                Some(root)
            } else {
                lookup(root, path).and_then(Value::as_mapping)
            };
            let mut keys: Vec<String> = node
                .map(|m| m.keys().filter_map(scalar_to_string).collect())
                .unwrap_or_default();
            keys.sort();
            keys
        })
    }

    /// Set a value at a key path, creating intermediate maps
    pub fn set(&self, path: &[&str], value: &str) -> Result<(), ConfigError> {
        self.mutate(|root| {
            let (last, parents) = match path.split_last() {
                Some(split) => split,
                None => return Ok(()),
            };
            let mut node = root;
            for (i, segment) in parents.iter().enumerate() {
                let key = Value::String((*segment).to_string());
                let child = node
                    .entry(key)
                    .or_insert_with(|| Value::Mapping(Mapping::new()));
                if child.is_null() {
                    *child = Value::Mapping(Mapping::new());
                }
                node = child
                    .as_mapping_mut()
                    .ok_or_else(|| ConfigError::NotAMap(path[..=i].join(".")))?;
            }
            node.insert(
                Value::String((*last).to_string()),
                Value::String(value.to_string()),
            );
            Ok(())
        })
    }

    /// Remove the value at a key path; returns whether anything was removed
    pub fn remove(&self, path: &[&str]) -> Result<bool, ConfigError> {
        self.mutate(|root| {
            let (last, parents) = match path.split_last() {
                Some(split) => split,
                None => return Ok(false),
            };
            let mut node = root;
            for segment in parents {
                match node
                    .get_mut(Value::String((*segment).to_string()))
                    .and_then(Value::as_mapping_mut)
                {
                    Some(child) => node = child,
                    None => return Ok(false),
                }
            }
            Ok(node.remove(Value::String((*last).to_string())).is_some())
        })
    }

    /// Value of a key scoped to an organization, falling back to the root
    /// and then to the built-in default of a known option
    pub fn get_scoped(&self, organization: Option<&str>, key: &str) -> Result<String, ConfigError> {
        if let Some(org) = organization {
            if let Some(v) = self.get(&[KEY_ORGANIZATIONS, org, key])? {
                return Ok(v);
            }
        }
        if let Some(v) = self.get(&[key])? {
            return Ok(v);
        }
        Ok(known_option(key).map(|o| o.default).unwrap_or("").to_string())
    }

    /// Set a key, scoped to an organization when given
    pub fn set_scoped(
        &self,
        organization: Option<&str>,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        if let Some(option) = known_option(key) {
            if !option.allowed.is_empty() && !option.allowed.contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    allowed: option.allowed.iter().map(|s| (*s).to_string()).collect(),
                });
            }
        }
        match organization {
            Some(org) => self.set(&[KEY_ORGANIZATIONS, org, key], value),
            None => self.set(&[key], value),
        }
    }

    /// Configured default organization
    pub fn default_organization(&self) -> Result<Option<String>, ConfigError> {
        self.get(&[KEY_DEFAULT_ORG])
    }

    /// Set the default organization
    pub fn set_default_organization(&self, name: &str) -> Result<(), ConfigError> {
        self.set(&[KEY_DEFAULT_ORG], name)
    }

    /// Names of configured organizations, sorted
    pub fn organizations(&self) -> Result<Vec<String>, ConfigError> {
        self.keys(&[KEY_ORGANIZATIONS])
    }

    /// A configured organization
    pub fn organization(&self, name: &str) -> Result<Option<OrganizationConfig>, ConfigError> {
        let url = self.get(&[KEY_ORGANIZATIONS, name, "url"])?;
        let git_protocol = self.get(&[KEY_ORGANIZATIONS, name, "git_protocol"])?;
        Ok(url.map(|url| OrganizationConfig {
            name: name.to_string(),
            url,
            git_protocol,
        }))
    }

    /// Register or update an organization
    pub fn add_organization(&self, org: &OrganizationConfig) -> Result<(), ConfigError> {
        self.set(&[KEY_ORGANIZATIONS, &org.name, "url"], &org.url)?;
        if let Some(protocol) = &org.git_protocol {
            self.set_scoped(Some(&org.name), "git_protocol", protocol)?;
        }
        Ok(())
    }

    /// Forget an organization; clears the default when it pointed at it
    pub fn remove_organization(&self, name: &str) -> Result<bool, ConfigError> {
        let removed = self.remove(&[KEY_ORGANIZATIONS, name])?;
        if self.default_organization()?.as_deref() == Some(name) {
            self.remove(&[KEY_DEFAULT_ORG])?;
        }
        Ok(removed)
    }

    /// All aliases
    pub fn aliases(&self) -> Result<BTreeMap<String, String>, ConfigError> {
        self.read(|root| {
            lookup(root, &[KEY_ALIASES])
                .and_then(Value::as_mapping)
                .map(|m| {
                    m.iter()
                        .filter_map(|(k, v)| Some((scalar_to_string(k)?, scalar_to_string(v)?)))
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    /// Expansion of a single alias
    pub fn alias(&self, name: &str) -> Result<Option<String>, ConfigError> {
        self.get(&[KEY_ALIASES, name])
    }

    /// Define or replace an alias
    pub fn set_alias(&self, name: &str, expansion: &str) -> Result<(), ConfigError> {
        self.set(&[KEY_ALIASES, name], expansion)
    }

    /// Delete an alias
    pub fn delete_alias(&self, name: &str) -> Result<bool, ConfigError> {
        self.remove(&[KEY_ALIASES, name])
    }
}

fn lookup<'a>(root: &'a Mapping, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut value = root.get(Value::String((*first).to_string()))?;
    for segment in rest {
        value = value
            .as_mapping()?
            .get(Value::String((*segment).to_string()))?;
    }
    Some(value)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_organization: contoso
git_protocol: ssh
organizations:
  contoso:
    url: https://dev.azure.com/contoso
    git_protocol: https
  fabrikam:
    url: https://dev.azure.com/fabrikam
aliases:
  prls: pr list --state=all
"#;

    #[test]
    fn test_reads_nested_values() {
        let store = ConfigStore::from_yaml(SAMPLE);
        assert_eq!(
            store.default_organization().unwrap().as_deref(),
            Some("contoso")
        );
        assert_eq!(store.organizations().unwrap(), vec!["contoso", "fabrikam"]);
        let org = store.organization("contoso").unwrap().unwrap();
        assert_eq!(org.url, "https://dev.azure.com/contoso");
    }

    #[test]
    fn test_scoped_lookup_falls_back_to_root_then_default() {
        let store = ConfigStore::from_yaml(SAMPLE);
        assert_eq!(store.get_scoped(Some("contoso"), "git_protocol").unwrap(), "https");
        assert_eq!(store.get_scoped(Some("fabrikam"), "git_protocol").unwrap(), "ssh");
        assert_eq!(store.get_scoped(None, "prompt").unwrap(), "enabled");
        assert_eq!(store.get_scoped(None, "unknown").unwrap(), "");
    }

    #[test]
    fn test_set_validates_known_values() {
        let store = ConfigStore::in_memory();
        let err = store.set_scoped(None, "git_protocol", "ftp").unwrap_err();
        assert!(err.to_string().contains("valid values are https, ssh"));
        store.set_scoped(None, "git_protocol", "ssh").unwrap();
        assert_eq!(store.get(&["git_protocol"]).unwrap().as_deref(), Some("ssh"));
    }

    #[test]
    fn test_mutations_write_through() {
        let backend = std::sync::Arc::new(MemoryBackend::new());
        struct Shared(std::sync::Arc<MemoryBackend>);
        impl ConfigBackend for Shared {
            fn load(&self) -> Result<Option<String>, ConfigError> {
                self.0.load()
            }
            fn save(&self, content: &str) -> Result<(), ConfigError> {
                self.0.save(content)
            }
            fn location(&self) -> String {
                self.0.location()
            }
        }
        let store = ConfigStore::new(Box::new(Shared(backend.clone())));
        store.set_alias("co", "pr checkout").unwrap();
        let written = backend.contents().unwrap();
        assert!(written.contains("co: pr checkout"));
        let reloaded = ConfigStore::from_yaml(&written);
        assert_eq!(reloaded.alias("co").unwrap().as_deref(), Some("pr checkout"));
    }

    #[test]
    fn test_remove_organization_clears_default() {
        let store = ConfigStore::from_yaml(SAMPLE);
        assert!(store.remove_organization("contoso").unwrap());
        assert_eq!(store.default_organization().unwrap(), None);
        assert_eq!(store.organizations().unwrap(), vec!["fabrikam"]);
    }

    #[test]
    fn test_set_into_scalar_fails() {
        let store = ConfigStore::from_yaml("editor: vim\n");
        let err = store.set(&["editor", "nested"], "x").unwrap_err();
        assert!(matches!(err, ConfigError::NotAMap(_)));
    }

    #[test]
    fn test_file_backend_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        let store = ConfigStore::from_file(&path);
        store.set_default_organization("contoso").unwrap();
        let reloaded = ConfigStore::from_file(&path);
        assert_eq!(
            reloaded.default_organization().unwrap().as_deref(),
            Some("contoso")
        );
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        let store = ConfigStore::from_yaml("- just\n- a list\n");
        assert!(matches!(store.get(&["x"]), Err(ConfigError::Parse { .. })));
    }
}
