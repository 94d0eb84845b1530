//! HTTP routes for the gateway

pub mod actor;
pub mod answer;
pub mod health;
pub mod profile;

pub use actor::{handle_actor_exception, handle_encrypt_actor};
pub use answer::handle_answer;
pub use health::{health_check, readiness_check, version_info};
pub use profile::handle_profile;
