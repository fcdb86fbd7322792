//! Local threat model documents: reading, fingerprinting and backend-block edits.

pub mod checksum;
pub mod local;
pub mod parser;
pub mod rewrite;

pub use checksum::{fingerprint, fingerprints_match};
pub use local::{validate_backend, LocalDocument, BACKEND_NAME};
pub use parser::{BackendBlock, DocumentParser, HclParser, ParsedDocument};
pub use rewrite::BackendRewriter;
