//! History (answer) schema
//!
//! At most one logically current entry exists per (subject, project,
//! activity) triple: writes update the existing entry in place or insert.
//! The answer content is stored encrypted; it is sanitized before encryption
//! and again after decryption on read.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for history entries
pub const HISTORY_COLLECTION: &str = "history";

/// History document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct HistoryDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Cleartext subject token of the answering end user
    #[serde(default)]
    pub backpack_id: String,

    /// Raw actor blob, kept when supplied so the raw-actor lookup strategy
    /// can find the entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    /// Owning project id
    pub course_id: String,

    /// Activity id within the project
    pub activity_id: String,

    /// Encrypted, pre-sanitized rich-text answer
    pub answer: String,

    /// Server-assigned timestamp of the latest write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime>,

    /// Client-measured editing time in seconds
    #[serde(default)]
    pub time_elapsed: i64,

    /// Correlation tag supplied by the embedding player
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<String>,

    /// Denormalized reference to the owning project
    #[serde(default)]
    pub project: String,
}

impl IntoIndexes for HistoryDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Primary lookup: latest entry for a (subject, project, activity) triple
            (
                doc! { "backpack_id": 1, "course_id": 1, "activity_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("history_triple_index".to_string())
                        .build(),
                ),
            ),
            // Raw-actor lookup strategy
            (
                doc! { "actor": 1, "course_id": 1, "activity_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("history_actor_index".to_string())
                        .build(),
                ),
            ),
            // Project-wide entry cap
            (
                doc! { "course_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("history_course_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for HistoryDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
