//! Configuration and constants
//!
//! - [`defaults`] - Built-in default values
//! - [`urls`] - Service base URLs
//! - [`env`] - Environment variable names and snapshot
//! - [`store`] - Hierarchical key/value config persisted as YAML

pub mod defaults;
pub mod env;
pub mod store;
pub mod urls;

pub use env::EnvVars;
pub use store::{ConfigBackend, ConfigError, ConfigStore};
