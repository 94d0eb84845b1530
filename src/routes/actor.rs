//! Actor endpoints for embedding players
//!
//! - `POST /api/actor/encrypt`: turn a base64 actor blob into its encrypted
//!   form so player-hosted pages never carry the cleartext identity.
//! - `POST /api/actor/exception`: upsert the actor link's exception flag,
//!   switching that actor's history writes to the raw-actor key.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

use crate::server::http::{json_response, resolve_cors_origin};
use crate::server::AppState;
use crate::services::actor::{ActorHints, DEFAULT_ACTOR_MBOX, DEFAULT_ACTOR_NAME};

#[derive(Debug, Deserialize)]
struct EncryptActorRequest {
    #[serde(default)]
    actor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActorExceptionRequest {
    #[serde(default)]
    actor: Option<String>,
    #[serde(default)]
    exception_value: Option<i32>,
}

fn status_response(
    status: StatusCode,
    body: serde_json::Value,
    origin: &str,
) -> Response<Full<Bytes>> {
    let mut response = json_response(body, origin);
    *response.status_mut() = status;
    response
}

/// Handle `POST /api/actor/encrypt`
pub async fn handle_encrypt_actor(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let origin = resolve_cors_origin(req.headers(), &state.args);

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Encrypt-actor body error: {}", e);
            return status_response(
                StatusCode::BAD_REQUEST,
                json!({ "message": "Invalid request body" }),
                &origin,
            );
        }
    };

    let request: EncryptActorRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(_) => {
            return status_response(
                StatusCode::BAD_REQUEST,
                json!({ "message": "Invalid request body" }),
                &origin,
            );
        }
    };

    let actor = match request.actor.filter(|a| !a.is_empty()) {
        Some(a) => a,
        None => {
            return status_response(
                StatusCode::BAD_REQUEST,
                json!({ "message": "Actor is required" }),
                &origin,
            );
        }
    };

    // The inbound blob must be base64 JSON; re-serialize before encrypting
    // so the ciphertext always wraps canonical JSON
    let decoded = STANDARD
        .decode(actor.as_bytes())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok());

    let payload = match decoded {
        Some(value) => value,
        None => {
            return status_response(
                StatusCode::BAD_REQUEST,
                json!({ "message": "Invalid actor encoding" }),
                &origin,
            );
        }
    };

    match state.cipher.encrypt(&payload.to_string()) {
        Ok(token) => json_response(json!({ "token": token }), &origin),
        Err(e) => {
            error!("Actor encryption failed: {}", e);
            status_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": "Encryption failed" }),
                &origin,
            )
        }
    }
}

/// Handle `POST /api/actor/exception`
pub async fn handle_actor_exception(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let origin = resolve_cors_origin(req.headers(), &state.args);

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Actor-exception body error: {}", e);
            return status_response(
                StatusCode::BAD_REQUEST,
                json!({ "message": "Invalid request body" }),
                &origin,
            );
        }
    };

    let request: ActorExceptionRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(_) => {
            return status_response(
                StatusCode::BAD_REQUEST,
                json!({ "message": "Invalid request body" }),
                &origin,
            );
        }
    };

    let actor = match request.actor.filter(|a| !a.is_empty() && a != "N/A") {
        Some(a) => a,
        None => {
            return status_response(
                StatusCode::BAD_REQUEST,
                json!({ "message": "Invalid actor value" }),
                &origin,
            );
        }
    };

    let store = match state.store.as_deref() {
        Some(store) => store,
        None => {
            return status_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": "Failed to update actor record" }),
                &origin,
            );
        }
    };

    // Undecodable blobs still get a link record, under placeholder identity
    let (name, mbox) = match ActorHints::parse(&actor, &state.cipher) {
        Some(hints) => (hints.name, hints.mbox),
        None => {
            warn!("Invalid actor encoding, using default values");
            (
                DEFAULT_ACTOR_NAME.to_string(),
                DEFAULT_ACTOR_MBOX.to_string(),
            )
        }
    };

    let exception = request.exception_value.unwrap_or(0);
    match store.upsert_actor_link(&actor, &name, &mbox, exception).await {
        Ok(link) => json_response(
            json!({
                "success": true,
                "message": "Actor record updated",
                "exception": link.exception,
            }),
            &origin,
        ),
        Err(e) => {
            error!("Actor link upsert failed: {}", e);
            status_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": "Failed to update actor record" }),
                &origin,
            )
        }
    }
}
