//! Shared types, error taxonomy, capability traits and configuration for the
//! hsrec recommendation engine.
//!
//! Every other crate in the workspace depends on this one; it depends on none
//! of them.

pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
