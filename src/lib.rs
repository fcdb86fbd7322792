//! tmcloud: sign in to a threat model catalog and keep local documents in sync with it.
//!
//! - `auth`: device-flow login and the per-organization credential store
//! - `document`: reading, fingerprinting and rewriting local documents
//! - `sync`: validate and push against the remote catalog
//! - `api`: transport and endpoint wrappers

pub mod api;
pub mod auth;
pub mod config;
pub mod document;
pub mod error;
pub mod fs;
pub mod sync;

#[cfg(test)]
mod testing;

pub use error::{DocumentIssue, Error, Result};
