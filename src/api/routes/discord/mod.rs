pub mod public;
mod router;
mod signature;

pub use router::router;
pub use signature::{InteractionVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};
