//! Database schemas
//!
//! Defines MongoDB document structures for projects, accounts, subjects,
//! actor links, history entries, locales, and the global config. Every
//! document embeds [`Metadata`] for creation/update/soft-delete tracking.

mod account;
mod actor_link;
mod backpack;
mod config;
mod history;
mod locale;
mod project;

pub use account::{AccountDoc, ACCOUNT_COLLECTION};
pub use actor_link::{ActorLinkDoc, ACTOR_EXCEPTION_SENTINEL, ACTOR_LINK_COLLECTION};
pub use backpack::{BackpackDoc, BACKPACK_COLLECTION};
pub use config::{GlobalConfigDoc, CONFIG_COLLECTION, GLOBAL_CONFIG_NAME};
pub use history::{HistoryDoc, HISTORY_COLLECTION};
pub use locale::{LocaleDoc, LOCALE_COLLECTION};
pub use project::{Activity, ProjectDoc, ProjectProfile, PROJECT_COLLECTION};

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Timestamps and soft-delete flag embedded in every document
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    /// Soft-delete marker; reads filter these out
    #[serde(default)]
    pub is_deleted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

