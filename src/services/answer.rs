//! Answer writing
//!
//! Persists a learner's answer for one activity, keeping at most one current
//! entry per lookup key: the existing entry is updated in place, else a new
//! one is inserted. Content is sanitized before encryption so stored
//! ciphertext always decrypts to renderable markup.
//!
//! History is normally keyed by the resolved subject token. When the
//! caller's actor link carries the exception sentinel, lookups and writes
//! key off the raw actor blob instead — and such updates must not overwrite
//! the stored subject token, since the cookie correlation of those clients
//! is exactly what cannot be trusted.

use bson::{doc, DateTime, Document};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Args;
use crate::crypto::Cipher;
use crate::db::schemas::{HistoryDoc, ACTOR_EXCEPTION_SENTINEL};
use crate::db::Store;
use crate::sanitize::Sanitizer;
use crate::services::actor::ActorHints;
use crate::services::identity::{resolve_subject, ResolvedSubject};
use crate::token::TokenCodec;
use crate::types::{LogbookError, Result};

/// Which field history entries are looked up and written by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    /// Normal path: the resolved subject token
    ByResolvedSubject(String),
    /// Exception path: the raw actor blob from the embedding player
    ByRawActor(String),
}

/// Answer submission body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    pub token: String,
    #[serde(default)]
    pub data: String,
    /// Client-side timestamp; accepted for wire compatibility, the stored
    /// timestamp is server-assigned
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time_elapsed: i64,
    #[serde(default)]
    pub registration: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

/// Result of a successful write
#[derive(Debug)]
pub struct AnswerWritten {
    /// Rotated subject cookie to set, when it changed
    pub cookie: Option<String>,
}

/// Pick the history lookup key for this caller.
///
/// The exception flag lives on the actor link; a failed flag lookup
/// degrades to the normal subject key.
pub async fn select_lookup_key(
    store: &Store,
    subject_token: &str,
    hints: Option<&ActorHints>,
) -> LookupKey {
    if let Some(h) = hints {
        match store.actor_link_by_actor(&h.raw).await {
            Ok(Some(link)) if link.exception == ACTOR_EXCEPTION_SENTINEL => {
                debug!("Actor exception set, keying history off the raw actor");
                return LookupKey::ByRawActor(h.raw.clone());
            }
            Ok(_) => {}
            Err(e) => warn!("Actor link lookup failed, using subject key: {}", e),
        }
    }
    LookupKey::ByResolvedSubject(subject_token.to_string())
}

/// Build the history filter for a lookup key and activity coordinates
pub fn history_filter(key: &LookupKey, project_id: &str, activity_id: &str) -> Document {
    match key {
        LookupKey::ByResolvedSubject(token) => doc! {
            "backpack_id": token.as_str(),
            "course_id": project_id,
            "activity_id": activity_id,
        },
        LookupKey::ByRawActor(actor) => doc! {
            "actor": actor.as_str(),
            "course_id": project_id,
            "activity_id": activity_id,
        },
    }
}

/// Validate, sanitize, encrypt, and upsert an answer.
///
/// Any failure is reported as-is to the route layer, which flattens it into
/// one generic write-failure response. A rotated cookie that was already
/// sent alongside a failed write is an accepted inconsistency.
pub async fn write_answer(
    store: &Store,
    cipher: &Cipher,
    codec: &TokenCodec,
    sanitizer: &Sanitizer,
    args: &Args,
    cookie_in: Option<&str>,
    input: &AnswerInput,
) -> Result<AnswerWritten> {
    let hints = input
        .actor
        .as_deref()
        .and_then(|raw| ActorHints::parse(raw, cipher));

    // 1. Identity (rotating the cookie if needed)
    let subject: ResolvedSubject =
        resolve_subject(store, cipher, cookie_in, hints.as_ref(), args.dev_mode).await?;

    // 2. The token authorizes exactly one (source, project, activity)
    let payload = codec
        .decode(&input.token)
        .map_err(|_| LogbookError::Crypto("Activity token rejected".into()))?;

    if !payload.authorizes(&args.allowed_source) {
        return Err(LogbookError::Crypto("Activity token rejected".into()));
    }

    let project = store
        .project_by_id(&payload.project)
        .await?
        .ok_or_else(|| LogbookError::Internal(format!("Unknown project '{}'", payload.project)))?;

    // 3. Sanitize, then encrypt
    let sanitized = sanitizer.clean(&input.data);
    let encrypted = cipher.encrypt(&sanitized)?;

    // 4. Update in place or insert; never a second entry for the same key
    let key = select_lookup_key(store, &subject.token, hints.as_ref()).await;
    let filter = history_filter(&key, &payload.project, &payload.activity);
    let existing = store.latest_history(filter).await?;

    let now = DateTime::now();

    match existing.and_then(|entry| entry._id) {
        Some(id) => {
            let mut set = doc! {
                "answer": encrypted.as_str(),
                "date": now,
                "time_elapsed": input.time_elapsed,
                "registration": input.registration.as_deref().unwrap_or_default(),
                "project": project.project_id.as_str(),
                "metadata.updated_at": now,
            };
            if let Some(ref h) = hints {
                set.insert("actor", h.raw.as_str());
            }
            // The raw-actor strategy exists because these clients' subject
            // correlation is unreliable: leave their stored token alone.
            if matches!(key, LookupKey::ByResolvedSubject(_)) {
                set.insert("backpack_id", subject.token.as_str());
            }

            store.history.update_by_id(id, doc! { "$set": set }).await?;
            debug!("Answer updated in place");
        }
        None => {
            store
                .history
                .insert_one(HistoryDoc {
                    backpack_id: subject.token.clone(),
                    actor: hints.as_ref().map(|h| h.raw.clone()),
                    course_id: payload.project.clone(),
                    activity_id: payload.activity.clone(),
                    answer: encrypted,
                    date: Some(now),
                    time_elapsed: input.time_elapsed,
                    registration: input.registration.clone(),
                    project: project.project_id.clone(),
                    ..Default::default()
                })
                .await?;
            debug!("Answer inserted");
        }
    }

    let rotated = (cookie_in != Some(subject.cookie_value.as_str()))
        .then_some(subject.cookie_value);

    Ok(AnswerWritten { cookie: rotated })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_filter_shape() {
        let key = LookupKey::ByResolvedSubject("tok123".to_string());
        let filter = history_filter(&key, "p1", "a1");
        assert_eq!(filter.get_str("backpack_id").unwrap(), "tok123");
        assert_eq!(filter.get_str("course_id").unwrap(), "p1");
        assert_eq!(filter.get_str("activity_id").unwrap(), "a1");
        assert!(filter.get("actor").is_none());
    }

    #[test]
    fn test_raw_actor_filter_shape() {
        let key = LookupKey::ByRawActor("blob==".to_string());
        let filter = history_filter(&key, "p1", "a1");
        assert_eq!(filter.get_str("actor").unwrap(), "blob==");
        assert_eq!(filter.get_str("course_id").unwrap(), "p1");
        assert!(filter.get("backpack_id").is_none());
    }

    #[test]
    fn test_answer_input_wire_names() {
        let input: AnswerInput = serde_json::from_str(
            r#"{
                "token": "t",
                "data": "<p>a</p>",
                "date": "2026-01-01T00:00:00Z",
                "timeElapsed": 42,
                "registration": "reg-1",
                "actor": "blob"
            }"#,
        )
        .unwrap();
        assert_eq!(input.time_elapsed, 42);
        assert_eq!(input.registration.as_deref(), Some("reg-1"));
    }

    #[test]
    fn test_stored_answer_roundtrip() {
        // The write path sanitizes then encrypts; the read path decrypts
        // then sanitizes again. Allow-listed content survives both
        // directions unchanged.
        let cipher = Cipher::new("test-secret");
        let sanitizer = Sanitizer::new();

        let submitted = "<p>a</p>";
        let stored = cipher.encrypt(&sanitizer.clean(submitted)).unwrap();
        let read_back = sanitizer.clean(&cipher.decrypt(&stored).unwrap());
        assert_eq!(read_back, submitted);

        // Disallowed markup is gone before it ever reaches the store
        let hostile = r#"<p>ok</p><script>alert(1)</script>"#;
        let stored = cipher.encrypt(&sanitizer.clean(hostile)).unwrap();
        let read_back = sanitizer.clean(&cipher.decrypt(&stored).unwrap());
        assert_eq!(read_back, "<p>ok</p>");
    }

    #[test]
    fn test_answer_input_optionals_default() {
        let input: AnswerInput = serde_json::from_str(r#"{"token": "t"}"#).unwrap();
        assert_eq!(input.data, "");
        assert_eq!(input.time_elapsed, 0);
        assert!(input.registration.is_none());
        assert!(input.actor.is_none());
    }
}
