//! Subject ("backpack") schema
//!
//! A pseudonymous end-user identity. The cleartext token is what store
//! queries compare; its encrypted form is what travels in the cookie.
//! Subjects are created lazily on first contact and never deleted by this
//! core.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for subjects
pub const BACKPACK_COLLECTION: &str = "backpacks";

/// Subject document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct BackpackDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Cleartext subject token (fixed length, random hex)
    pub token: String,

    /// Display name from the embedding player, or the anonymous placeholder
    #[serde(default)]
    pub name: String,

    /// Mailbox-like contact identifier, or the anonymous placeholder
    #[serde(default)]
    pub email: String,

    /// When the subject was first seen
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime>,

    /// Collection epoch tag from the global config at creation time
    #[serde(default)]
    pub collection: String,
}

impl IntoIndexes for BackpackDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "token": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("backpack_token_unique".to_string())
                        .build(),
                ),
            ),
            // Cross-device re-identification by player-supplied identity
            (
                doc! { "name": 1, "email": 1 },
                Some(
                    IndexOptions::builder()
                        .name("backpack_identity_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for BackpackDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
