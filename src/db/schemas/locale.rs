//! Locale dictionary schema
//!
//! Display strings keyed by language. The dictionary is an open-ended
//! document (the authoring flow owns its keys); resolution only selects by
//! `dict.lang` and returns it verbatim. A missing locale never blocks
//! resolution — it degrades to an empty dictionary.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for locales
pub const LOCALE_COLLECTION: &str = "locales";

/// Locale document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LocaleDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Display strings; carries a `lang` key identifying the language
    #[serde(default)]
    pub dict: Document,
}

impl IntoIndexes for LocaleDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "dict.lang": 1 },
            Some(
                IndexOptions::builder()
                    .name("locale_lang_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for LocaleDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
