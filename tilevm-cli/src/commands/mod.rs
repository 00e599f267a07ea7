//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`bench`] - Compare exchange strategies on one image
//! - [`common`] - Pipeline flags shared by `run` and `bench`
//! - [`config`] - Configuration management (path, show, init)
//! - [`run`] - Process the input directory

pub mod bench;
pub mod common;
pub mod config;
pub mod run;
