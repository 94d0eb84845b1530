//! Request-scoped services: identity, profile resolution, answer writing

pub mod actor;
pub mod answer;
pub mod identity;
pub mod profile;

pub use actor::ActorHints;
pub use answer::{write_answer, AnswerInput, AnswerWritten, LookupKey};
pub use identity::{resolve_subject, ResolvedSubject, SUBJECT_TOKEN_LEN};
pub use profile::{resolve_profile, ProfileOutcome, ProfileParams, ProfileResolution};
