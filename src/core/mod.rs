//! Core logic module
//!
//! Pure logic shared by commands. It has NO I/O operations - those belong
//! in [`crate::infra`] and [`crate::client`].
//!
//! # Submodules
//!
//! - [`scope`] - `[ORG/]PROJECT[/TARGET]` parsing and default organization
//! - [`alias`] - Alias template expansion
//! - [`poll`] - Retrying asynchronous operations
//! - [`duration`] - Duration strings
//! - [`permissions`] - Security namespace bit resolution
//! - [`pr_filter`] - Client-side pull request filters
//! - [`timeago`] - Relative time strings
//! - [`suggest`] - Command suggestions

pub mod alias;
pub mod duration;
pub mod permissions;
pub mod poll;
pub mod pr_filter;
pub mod scope;
pub mod suggest;
pub mod timeago;
