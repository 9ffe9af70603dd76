//! azdo - Azure DevOps on the command line
//!
//! This library provides the command tree and the service client behind the
//! `azdo` binary.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command tree, dispatch and output rendering
//! - [`client`] - Azure DevOps REST client
//! - [`core`] - Pure parsing and decision logic (no I/O)
//! - [`infra`] - Infrastructure layer (terminal, git, keyring, processes)
//! - [`config`] - Configuration store, environment and constants
//! - [`error`] - Error types and exit codes

pub mod cli;
pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;
