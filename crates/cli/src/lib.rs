//! SuMsy CLI - operator and client orchestration
//!
//! This crate provides the `sumsy` binary and its commands.

pub mod commands;
pub mod context;
pub mod keyfile;

pub use context::AppContext;
