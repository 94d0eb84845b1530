//! Activity profile resolution
//!
//! Assembles the read-only bundle a client needs to render one activity:
//! project metadata, the requested activity definition, the locale
//! dictionary, and the learner's prior answer. Preconditions are checked in
//! a fixed order and the first failure becomes the outcome; every outcome
//! is delivered as a normal JSON response whose `message` field tells the
//! client which fallback UI to render.
//!
//! Locale and actor-link enrichment never abort resolution; only the
//! numbered preconditions do.

use bson::Document;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Args;
use crate::crypto::Cipher;
use crate::db::schemas::{AccountDoc, Activity, GlobalConfigDoc, ProjectDoc, ProjectProfile};
use crate::db::Store;
use crate::sanitize::Sanitizer;
use crate::services::actor::ActorHints;
use crate::services::answer::{history_filter, select_lookup_key};
use crate::services::identity::resolve_subject;
use crate::token::TokenCodec;

/// Global config fields exposed to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigsView {
    pub maintenance_mode: bool,
    pub current_collection: String,
}

impl From<&GlobalConfigDoc> for ConfigsView {
    fn from(doc: &GlobalConfigDoc) -> Self {
        Self {
            maintenance_mode: doc.maintenance_mode,
            current_collection: doc.current_collection.clone(),
        }
    }
}

/// Project as served to end users: the activity map is stripped so sibling
/// activities' definitions never leak
#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    pub id: String,
    pub author: String,
    pub profile: ProfileView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub name: String,
    pub lang: String,
    pub published: bool,
    pub use_expiration_date: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    pub maintenance_mode: bool,
}

impl From<&ProjectDoc> for ProjectView {
    fn from(doc: &ProjectDoc) -> Self {
        Self {
            id: doc.project_id.clone(),
            author: doc.author.clone(),
            profile: ProfileView {
                name: doc.profile.name.clone(),
                lang: doc.profile.lang.clone(),
                published: doc.profile.published,
                use_expiration_date: doc.profile.use_expiration_date,
                expiration_date: doc
                    .profile
                    .expiration_date
                    .map(|d| d.to_chrono().to_rfc3339()),
                maintenance_mode: doc.profile.maintenance_mode,
            },
        }
    }
}

/// The requested activity plus the derived editor-prefill flag
#[derive(Debug, Clone, Serialize)]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: Activity,
    #[serde(rename = "useDefaultText")]
    pub use_default_text: bool,
}

/// Endpoint activities render the download step, not the prefilled editor
pub fn derive_use_default_text(activity: &Activity) -> bool {
    !activity.is_endpoint
}

/// Every way a profile request can resolve.
///
/// One variant per precondition keeps the client-facing mapping exhaustive:
/// adding a precondition without mapping its message is a compile error.
#[derive(Debug)]
pub enum ProfileOutcome {
    /// The record store (or its config singleton) is unreachable
    StoreUnavailable,
    /// Global maintenance flag is set; locale is still resolved so the
    /// client can render a localized notice
    Maintenance { configs: ConfigsView, locale: Document },
    /// Identity resolution exhausted every fallback
    IdentityInvalid,
    /// Token undecodable, malformed, or minted for another deployment
    TokenInvalid,
    /// Token references a project that does not exist
    ProjectNotFound,
    /// Token references an activity id absent from the project's map
    ActivityNotFound,
    /// The project author has no account record
    AuthorNotFound,
    /// The author's account is not subscribed
    SubscriptionRequired,
    /// The project is not marked published
    NotPublished,
    /// The project's expiration date has passed
    Expired,
    /// The project accumulated more history entries than the cap allows
    HistoryLimit,
    Success {
        configs: ConfigsView,
        project: ProjectView,
        activity: ActivityView,
        locale: Document,
        history: Option<String>,
        registration: Option<String>,
    },
}

impl ProfileOutcome {
    /// Stable message code, None on success. Clients switch on this.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            ProfileOutcome::StoreUnavailable => Some("store-unavailable"),
            ProfileOutcome::Maintenance { .. } => Some("maintenance"),
            ProfileOutcome::IdentityInvalid => Some("identity-invalid"),
            ProfileOutcome::TokenInvalid => Some("token-invalid"),
            ProfileOutcome::ProjectNotFound => Some("project-not-found"),
            ProfileOutcome::ActivityNotFound => Some("activity-not-found"),
            ProfileOutcome::AuthorNotFound => Some("author-not-found"),
            ProfileOutcome::SubscriptionRequired => Some("subscription-required"),
            ProfileOutcome::NotPublished => Some("not-published"),
            ProfileOutcome::Expired => Some("expired"),
            ProfileOutcome::HistoryLimit => Some("history-limit"),
            ProfileOutcome::Success { .. } => None,
        }
    }

    /// Flatten into the response body
    pub fn into_body(self) -> Value {
        let message = self.message();
        match self {
            ProfileOutcome::Maintenance { configs, locale } => json!({
                "message": message,
                "configs": configs,
                "locale": locale,
            }),
            ProfileOutcome::Success {
                configs,
                project,
                activity,
                locale,
                history,
                registration,
            } => json!({
                "message": Value::Null,
                "configs": configs,
                "project": project,
                "activity": activity,
                "locale": locale,
                "history": history,
                "registration": registration,
            }),
            _ => json!({ "message": message }),
        }
    }
}

/// Inputs already extracted from the HTTP request
#[derive(Debug)]
pub struct ProfileParams<'a> {
    pub token: &'a str,
    /// Normalized request language (used for the maintenance notice)
    pub lang: &'a str,
    pub cookie: Option<&'a str>,
    pub hints: Option<ActorHints>,
}

/// A resolved profile plus the cookie to set when it rotated
#[derive(Debug)]
pub struct ProfileResolution {
    pub outcome: ProfileOutcome,
    pub cookie: Option<String>,
}

impl ProfileResolution {
    fn bare(outcome: ProfileOutcome) -> Self {
        Self { outcome, cookie: None }
    }
}

/// The account/publication/expiration gate, in contract order.
///
/// Returns the first blocking outcome, or None when the project is
/// servable. Pure so the ordering is testable without a store.
pub(crate) fn gate_project(
    account: Option<&AccountDoc>,
    profile: &ProjectProfile,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<ProfileOutcome> {
    let account = match account {
        None => return Some(ProfileOutcome::AuthorNotFound),
        Some(a) => a,
    };

    if !account.is_subscribed {
        return Some(ProfileOutcome::SubscriptionRequired);
    }

    if !profile.published {
        return Some(ProfileOutcome::NotPublished);
    }

    if profile.use_expiration_date {
        if let Some(expiration) = profile.expiration_date {
            if expiration.to_chrono() < now {
                return Some(ProfileOutcome::Expired);
            }
        }
    }

    None
}

/// Resolve a profile request end to end.
pub async fn resolve_profile(
    store: Option<&Store>,
    cipher: &Cipher,
    codec: &TokenCodec,
    sanitizer: &Sanitizer,
    args: &Args,
    params: ProfileParams<'_>,
) -> ProfileResolution {
    // 1. Store reachable: the config singleton doubles as the health probe
    let store = match store {
        Some(s) => s,
        None => return ProfileResolution::bare(ProfileOutcome::StoreUnavailable),
    };
    let global = match store.global_config().await {
        Ok(Some(config)) => config,
        Ok(None) => {
            warn!("Global config record missing");
            return ProfileResolution::bare(ProfileOutcome::StoreUnavailable);
        }
        Err(e) => {
            warn!("Global config fetch failed: {}", e);
            return ProfileResolution::bare(ProfileOutcome::StoreUnavailable);
        }
    };
    let configs = ConfigsView::from(&global);

    // 2. Maintenance short-circuits everything, but still localized
    if global.maintenance_mode {
        let locale = fetch_locale(store, params.lang).await;
        return ProfileResolution::bare(ProfileOutcome::Maintenance { configs, locale });
    }

    // 3. Identity
    let subject = match resolve_subject(
        store,
        cipher,
        params.cookie,
        params.hints.as_ref(),
        args.dev_mode,
    )
    .await
    {
        Ok(s) => s,
        Err(e) => {
            warn!("Identity resolution failed: {}", e);
            return ProfileResolution::bare(ProfileOutcome::IdentityInvalid);
        }
    };
    let cookie = (params.cookie != Some(subject.cookie_value.as_str()))
        .then(|| subject.cookie_value.clone());
    let fail = |outcome| ProfileResolution { outcome, cookie: cookie.clone() };

    // 4. Token: the sole authorization check binding a token to this
    //    deployment. Foreign-source tokens are rejected even if otherwise
    //    well formed.
    let payload = match codec.decode(params.token) {
        Ok(p) => p,
        Err(e) => {
            debug!("Token rejected: {}", e);
            return fail(ProfileOutcome::TokenInvalid);
        }
    };
    if !payload.authorizes(&args.allowed_source) {
        return fail(ProfileOutcome::TokenInvalid);
    }

    // 5. Project
    let project = match store.project_by_id(&payload.project).await {
        Ok(Some(p)) => p,
        Ok(None) => return fail(ProfileOutcome::ProjectNotFound),
        Err(e) => {
            warn!("Project lookup failed: {}", e);
            return fail(ProfileOutcome::ProjectNotFound);
        }
    };

    // 6. Activity: direct key lookup, no fuzzy matching
    let activity = match project.profile.activities.get(&payload.activity) {
        Some(a) => a.clone(),
        None => return fail(ProfileOutcome::ActivityNotFound),
    };

    // Opportunistic actor-link upsert; enrichment only, failures swallowed
    if let Some(ref h) = params.hints {
        if let Err(e) = store.ensure_actor_link(&h.raw, &h.name, &h.mbox).await {
            warn!("Actor link upsert failed: {}", e);
        }
    }

    // 7. Locale follows the project's configured language; missing locale
    //    degrades to an empty dictionary
    let locale = fetch_locale(store, &project.profile.lang).await;

    // 8-11. Author account, subscription, publication, expiration
    let account = match store.account_by_user(&project.author).await {
        Ok(a) => a,
        Err(e) => {
            warn!("Account lookup failed: {}", e);
            None
        }
    };
    if let Some(blocked) = gate_project(account.as_ref(), &project.profile, chrono::Utc::now()) {
        return fail(blocked);
    }

    // 12. Project-wide history cap
    match store.count_project_history(&payload.project).await {
        Ok(count) if count > args.history_project_limit => {
            return fail(ProfileOutcome::HistoryLimit);
        }
        Ok(_) => {}
        Err(e) => warn!("History count failed: {}", e),
    }

    // 13. Prior answer, decrypted and re-sanitized; uses the same lookup
    //     strategy as the writer so exception-flagged actors see theirs
    let key = select_lookup_key(store, &subject.token, params.hints.as_ref()).await;
    let filter = history_filter(&key, &payload.project, &payload.activity);
    let (history, registration) = match store.latest_history(filter).await {
        Ok(Some(entry)) => match cipher.decrypt(&entry.answer) {
            Ok(cleartext) => (Some(sanitizer.clean(&cleartext)), entry.registration),
            Err(e) => {
                warn!("Stored answer does not decrypt: {}", e);
                (None, None)
            }
        },
        Ok(None) => (None, None),
        Err(e) => {
            warn!("History lookup failed: {}", e);
            (None, None)
        }
    };

    let use_default_text = derive_use_default_text(&activity);
    ProfileResolution {
        outcome: ProfileOutcome::Success {
            configs,
            project: ProjectView::from(&project),
            activity: ActivityView {
                activity,
                use_default_text,
            },
            locale,
            history,
            registration,
        },
        cookie,
    }
}

/// Locale dictionary for a language, empty when missing or unreadable
async fn fetch_locale(store: &Store, lang: &str) -> Document {
    match store.locale_by_lang(lang).await {
        Ok(Some(locale)) => locale.dict,
        Ok(None) => {
            debug!(lang = %lang, "No locale record");
            Document::new()
        }
        Err(e) => {
            warn!("Locale lookup failed: {}", e);
            Document::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::DateTime;
    use chrono::{Duration, Utc};

    fn subscribed_account() -> AccountDoc {
        AccountDoc {
            user_id: "author-1".to_string(),
            is_subscribed: true,
            ..Default::default()
        }
    }

    fn published_profile() -> ProjectProfile {
        ProjectProfile {
            name: "Journal".to_string(),
            lang: "fr".to_string(),
            published: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_gate_passes_servable_project() {
        let account = subscribed_account();
        assert!(gate_project(Some(&account), &published_profile(), Utc::now()).is_none());
    }

    #[test]
    fn test_gate_missing_account() {
        let outcome = gate_project(None, &published_profile(), Utc::now()).unwrap();
        assert_eq!(outcome.message(), Some("author-not-found"));
    }

    #[test]
    fn test_gate_unsubscribed_blocks_before_publication() {
        let account = AccountDoc {
            is_subscribed: false,
            ..subscribed_account()
        };
        let mut profile = published_profile();
        profile.published = false;

        // Subscription is checked first even though publication would also fail
        let outcome = gate_project(Some(&account), &profile, Utc::now()).unwrap();
        assert_eq!(outcome.message(), Some("subscription-required"));
    }

    #[test]
    fn test_gate_unpublished_blocks_before_expiration() {
        let account = subscribed_account();
        let mut profile = published_profile();
        profile.published = false;
        profile.use_expiration_date = true;
        profile.expiration_date =
            Some(DateTime::from_chrono(Utc::now() - Duration::days(30)));

        let outcome = gate_project(Some(&account), &profile, Utc::now()).unwrap();
        assert_eq!(outcome.message(), Some("not-published"));
    }

    #[test]
    fn test_gate_expired() {
        let account = subscribed_account();
        let mut profile = published_profile();
        profile.use_expiration_date = true;
        profile.expiration_date =
            Some(DateTime::from_chrono(Utc::now() - Duration::days(1)));

        let outcome = gate_project(Some(&account), &profile, Utc::now()).unwrap();
        assert_eq!(outcome.message(), Some("expired"));
    }

    #[test]
    fn test_gate_future_expiration_passes() {
        let account = subscribed_account();
        let mut profile = published_profile();
        profile.use_expiration_date = true;
        profile.expiration_date =
            Some(DateTime::from_chrono(Utc::now() + Duration::days(1)));

        assert!(gate_project(Some(&account), &profile, Utc::now()).is_none());
    }

    #[test]
    fn test_gate_expiration_ignored_when_unused() {
        let account = subscribed_account();
        let mut profile = published_profile();
        profile.use_expiration_date = false;
        profile.expiration_date =
            Some(DateTime::from_chrono(Utc::now() - Duration::days(1)));

        assert!(gate_project(Some(&account), &profile, Utc::now()).is_none());
    }

    #[test]
    fn test_use_default_text_derivation() {
        let regular = Activity::default();
        assert!(derive_use_default_text(&regular));

        let endpoint = Activity {
            is_endpoint: true,
            ..Default::default()
        };
        assert!(!derive_use_default_text(&endpoint));
    }

    #[test]
    fn test_message_codes_are_stable() {
        assert_eq!(ProfileOutcome::StoreUnavailable.message(), Some("store-unavailable"));
        assert_eq!(ProfileOutcome::TokenInvalid.message(), Some("token-invalid"));
        assert_eq!(ProfileOutcome::ProjectNotFound.message(), Some("project-not-found"));
        assert_eq!(ProfileOutcome::NotPublished.message(), Some("not-published"));
        assert_eq!(ProfileOutcome::Expired.message(), Some("expired"));
        assert_eq!(ProfileOutcome::HistoryLimit.message(), Some("history-limit"));
    }

    #[test]
    fn test_maintenance_body_carries_locale() {
        let mut locale = Document::new();
        locale.insert("lang", "fr");
        locale.insert("maintenanceNotice", "Maintenance en cours");

        let body = ProfileOutcome::Maintenance {
            configs: ConfigsView {
                maintenance_mode: true,
                current_collection: "2026".to_string(),
            },
            locale,
        }
        .into_body();

        assert_eq!(body["message"], "maintenance");
        assert_eq!(body["locale"]["lang"], "fr");
        assert_eq!(body["configs"]["maintenanceMode"], true);
    }

    #[test]
    fn test_success_body_shape() {
        let project = ProjectDoc {
            project_id: "p1".to_string(),
            author: "author-1".to_string(),
            profile: published_profile(),
            ..Default::default()
        };
        let activity = Activity {
            activity_title: "Exercice 1".to_string(),
            ..Default::default()
        };
        let use_default_text = derive_use_default_text(&activity);

        let body = ProfileOutcome::Success {
            configs: ConfigsView {
                maintenance_mode: false,
                current_collection: "2026".to_string(),
            },
            project: ProjectView::from(&project),
            activity: ActivityView {
                activity,
                use_default_text,
            },
            locale: Document::new(),
            history: None,
            registration: None,
        }
        .into_body();

        assert!(body["message"].is_null());
        assert_eq!(body["project"]["id"], "p1");
        assert_eq!(body["activity"]["activityTitle"], "Exercice 1");
        assert_eq!(body["activity"]["useDefaultText"], true);
        assert!(body["history"].is_null());
        // Sibling activities never leak
        assert!(body["project"]["profile"].get("activities").is_none());
    }

    #[test]
    fn test_failure_bodies_carry_no_project() {
        let body = ProfileOutcome::TokenInvalid.into_body();
        assert_eq!(body["message"], "token-invalid");
        assert!(body.get("project").is_none());
        assert!(body.get("activity").is_none());
    }
}
