//! Event envelope and the pure subject-derivation router.
//!
//! Every payload variant lives on one `#[serde(tag = "type")]` sum type so
//! (de)serialization dispatches on the discriminant instead of runtime
//! probing.

pub mod envelope;
pub mod payload;
pub mod router;

pub use envelope::EventEnvelope;
pub use payload::EventPayload;
pub use router::{mirror_subjects_for, subject_for};
