//! Global configuration document
//!
//! A singleton record (`name = "global"`) read at the top of every
//! resolution. The maintenance flag short-circuits all activity serving; the
//! collection epoch tags newly created subjects.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for global configs
pub const CONFIG_COLLECTION: &str = "configs";

/// Name of the singleton config record
pub const GLOBAL_CONFIG_NAME: &str = "global";

/// Global config document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct GlobalConfigDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Config record name (always "global" for the singleton)
    pub name: String,

    /// When true, every profile resolution returns the maintenance notice
    #[serde(default)]
    pub maintenance_mode: bool,

    /// Epoch tag stamped onto newly created subjects
    #[serde(default)]
    pub current_collection: String,
}

impl IntoIndexes for GlobalConfigDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "name": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("config_name_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for GlobalConfigDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
