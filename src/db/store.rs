//! Typed collection bundle
//!
//! One explicit handle over every collection the gateway touches,
//! constructed once at startup and passed by `Arc` into request handling.
//! The narrow query methods here are the only store access the services use.

use bson::{doc, DateTime};

use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{
    AccountDoc, ActorLinkDoc, BackpackDoc, GlobalConfigDoc, HistoryDoc, LocaleDoc, ProjectDoc,
    ACCOUNT_COLLECTION, ACTOR_LINK_COLLECTION, BACKPACK_COLLECTION, CONFIG_COLLECTION,
    GLOBAL_CONFIG_NAME, HISTORY_COLLECTION, LOCALE_COLLECTION, PROJECT_COLLECTION,
};
use crate::types::Result;

/// All gateway collections behind one handle
#[derive(Clone)]
pub struct Store {
    pub configs: MongoCollection<GlobalConfigDoc>,
    pub projects: MongoCollection<ProjectDoc>,
    pub accounts: MongoCollection<AccountDoc>,
    pub backpacks: MongoCollection<BackpackDoc>,
    pub actor_links: MongoCollection<ActorLinkDoc>,
    pub history: MongoCollection<HistoryDoc>,
    pub locales: MongoCollection<LocaleDoc>,
}

impl Store {
    /// Open every collection (applying schema indexes) on the given client
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            configs: client.collection(CONFIG_COLLECTION).await?,
            projects: client.collection(PROJECT_COLLECTION).await?,
            accounts: client.collection(ACCOUNT_COLLECTION).await?,
            backpacks: client.collection(BACKPACK_COLLECTION).await?,
            actor_links: client.collection(ACTOR_LINK_COLLECTION).await?,
            history: client.collection(HISTORY_COLLECTION).await?,
            locales: client.collection(LOCALE_COLLECTION).await?,
        })
    }

    /// Fetch the singleton global config record
    pub async fn global_config(&self) -> Result<Option<GlobalConfigDoc>> {
        self.configs
            .find_one(doc! { "name": GLOBAL_CONFIG_NAME })
            .await
    }

    /// Fetch a project by its stable id
    pub async fn project_by_id(&self, project_id: &str) -> Result<Option<ProjectDoc>> {
        self.projects
            .find_one(doc! { "project_id": project_id })
            .await
    }

    /// Fetch the account of a project author
    pub async fn account_by_user(&self, user_id: &str) -> Result<Option<AccountDoc>> {
        self.accounts.find_one(doc! { "user_id": user_id }).await
    }

    /// Fetch the locale dictionary for a language
    pub async fn locale_by_lang(&self, lang: &str) -> Result<Option<LocaleDoc>> {
        self.locales.find_one(doc! { "dict.lang": lang }).await
    }

    /// Fetch a subject by its cleartext token
    pub async fn backpack_by_token(&self, token: &str) -> Result<Option<BackpackDoc>> {
        self.backpacks.find_one(doc! { "token": token }).await
    }

    /// Fetch a subject by player-supplied identity (exact match)
    pub async fn backpack_by_identity(&self, name: &str, email: &str) -> Result<Option<BackpackDoc>> {
        self.backpacks
            .find_one(doc! { "name": name, "email": email })
            .await
    }

    /// Fetch an actor link by the raw actor blob
    pub async fn actor_link_by_actor(&self, actor: &str) -> Result<Option<ActorLinkDoc>> {
        self.actor_links.find_one(doc! { "actor": actor }).await
    }

    /// Find-or-create an actor link without touching the exception flag of
    /// an existing record.
    pub async fn ensure_actor_link(
        &self,
        actor: &str,
        name: &str,
        mbox: &str,
    ) -> Result<ActorLinkDoc> {
        if let Some(existing) = self.actor_link_by_actor(actor).await? {
            return Ok(existing);
        }

        let mut link = ActorLinkDoc {
            actor: actor.to_string(),
            name: name.to_string(),
            mbox: mbox.to_string(),
            exception: 0,
            ..Default::default()
        };
        let id = self.actor_links.insert_one(link.clone()).await?;
        link._id = Some(id);
        Ok(link)
    }

    /// Find-or-create an actor link, updating the exception flag when it
    /// already exists. Returns the resulting record.
    pub async fn upsert_actor_link(
        &self,
        actor: &str,
        name: &str,
        mbox: &str,
        exception: i32,
    ) -> Result<ActorLinkDoc> {
        if let Some(existing) = self.actor_link_by_actor(actor).await? {
            if let Some(id) = existing._id {
                self.actor_links
                    .update_by_id(
                        id,
                        doc! { "$set": {
                            "exception": exception,
                            "metadata.updated_at": DateTime::now(),
                        }},
                    )
                    .await?;
            }
            return Ok(ActorLinkDoc {
                exception,
                ..existing
            });
        }

        let mut link = ActorLinkDoc {
            actor: actor.to_string(),
            name: name.to_string(),
            mbox: mbox.to_string(),
            exception,
            ..Default::default()
        };
        let id = self.actor_links.insert_one(link.clone()).await?;
        link._id = Some(id);
        Ok(link)
    }

    /// Latest history entry matching the given lookup filter
    pub async fn latest_history(&self, filter: bson::Document) -> Result<Option<HistoryDoc>> {
        self.history.find_one_sorted(filter, doc! { "date": -1 }).await
    }

    /// Number of history entries across a whole project
    pub async fn count_project_history(&self, project_id: &str) -> Result<u64> {
        self.history.count(doc! { "course_id": project_id }).await
    }
}
