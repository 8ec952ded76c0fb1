//! Core domain types for the migration orchestration kernel: entities,
//! typed query filters, configuration, and the shared error taxonomy.
//!
//! Every other crate in the workspace depends on this one and converts its
//! local errors into [`error::Error`] at its boundary.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod config;
pub mod entities;
pub mod error;
pub mod filter;

pub use config::Config;
pub use error::{Error, Result, ResultExt};
