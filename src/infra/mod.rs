//! Infrastructure layer
//!
//! Handles all I/O operations: terminal streams, filesystem, credentials,
//! prompts and external processes. This module is the only place where
//! side effects occur, apart from the REST client.

pub mod dirs;
pub mod filesystem;
pub mod git;
pub mod iostreams;
pub mod keyring;
pub mod process;
pub mod prompter;

pub use iostreams::IoStreams;
