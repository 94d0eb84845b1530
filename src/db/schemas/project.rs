//! Project document schema
//!
//! A project is authored from an uploaded PDF form: each fillable field
//! becomes one activity in the profile's activity map. This core never
//! mutates projects; the authoring flow owns them.

use std::collections::HashMap;

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for projects
pub const PROJECT_COLLECTION: &str = "projects";

/// Project document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ProjectDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Stable project id carried inside activity tokens
    pub project_id: String,

    /// Author's user id (joins to the accounts collection)
    pub author: String,

    /// Authored profile blob
    pub profile: ProjectProfile,
}

/// The authored profile: activity map plus publication settings
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectProfile {
    /// Display name of the project
    #[serde(default)]
    pub name: String,

    /// Localization language for end-user strings
    #[serde(default)]
    pub lang: String,

    /// Whether end users may access the project at all
    #[serde(default)]
    pub published: bool,

    /// Whether the expiration date applies
    #[serde(default)]
    pub use_expiration_date: bool,

    /// Access cutoff, meaningful only when `use_expiration_date` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime>,

    /// Per-project maintenance flag mirrored from the global config by the
    /// authoring flow; resolution reads the global flag, not this one
    #[serde(default)]
    pub maintenance_mode: bool,

    /// Activity definitions keyed by PDF field name
    #[serde(default)]
    pub activities: HashMap<String, Activity>,
}

/// One response unit, derived from a single fillable PDF field
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Title shown above the editor
    #[serde(default)]
    pub activity_title: String,

    /// Author-provided context markup
    #[serde(default)]
    pub context_text: String,

    /// Markup pre-filling the editor when no history exists
    #[serde(default)]
    pub default_text: String,

    /// Placeholder shown in an empty editor
    #[serde(default)]
    pub custom_placeholder: String,

    /// Terminal activity: the client offers the PDF download instead of
    /// further editing. Exactly one per project by authoring convention;
    /// resolution only reads the flag.
    #[serde(default)]
    pub is_endpoint: bool,

    /// Whether `max_characters_allowed` is enforced client-side
    #[serde(default)]
    pub use_characters_limit: bool,

    /// Character budget for the response
    #[serde(default)]
    pub max_characters_allowed: i64,

    /// Whether `custom_placeholder` replaces the built-in one
    #[serde(default)]
    pub use_custom_placeholder: bool,

    /// The activity's own access token, embedded at export time
    #[serde(default)]
    pub token: String,
}

impl IntoIndexes for ProjectDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "project_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("project_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "author": 1 },
                Some(
                    IndexOptions::builder()
                        .name("project_author_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ProjectDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
