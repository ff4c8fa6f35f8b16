//! SuMsy Core - Domain types
//!
//! This crate contains the fundamental value type used across SuMsy:
//! - `Mani`: fixed-point currency amount with a 0.05 increment

pub mod mani;

pub use mani::{Mani, ManiError, INCREMENT, SYMBOL};
