//! Actor-link schema
//!
//! Binds a raw actor blob (as supplied by the embedding player) to an
//! exception flag. When the flag carries the sentinel value, the answer
//! writer keys history off the raw actor instead of the resolved subject
//! token — a compatibility strategy for players whose cookie correlation is
//! unreliable.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for actor links
pub const ACTOR_LINK_COLLECTION: &str = "actor_links";

/// Exception flag value that switches history writes to the raw-actor key
pub const ACTOR_EXCEPTION_SENTINEL: i32 = 1;

/// Actor link document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ActorLinkDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Raw actor blob exactly as received (the lookup key)
    pub actor: String,

    /// Display name decoded from the actor blob
    #[serde(default)]
    pub name: String,

    /// Mailbox-like identifier decoded from the actor blob
    #[serde(default)]
    pub mbox: String,

    /// 0 = normal; ACTOR_EXCEPTION_SENTINEL = key history off the raw actor
    #[serde(default)]
    pub exception: i32,
}

impl IntoIndexes for ActorLinkDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "actor": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("actor_link_actor_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for ActorLinkDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
