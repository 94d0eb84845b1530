//! Answer submission endpoint
//!
//! `POST /api/answer` with a JSON body. Success answers with the fixed
//! confirmation message; any failure collapses into one generic error so
//! callers cannot probe which precondition rejected the write.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, warn};

use crate::server::http::{
    build_set_cookie, get_cookie, json_response, rate_limited_response, resolve_cors_origin,
};
use crate::server::AppState;
use crate::services::answer::{write_answer, AnswerInput};

const SAVED_MESSAGE: &str = "Data saved successfully";
const FAILED_MESSAGE: &str = "Failed to save the answer";

fn failure_response(origin: &str) -> Response<Full<Bytes>> {
    let mut response = json_response(json!({ "message": FAILED_MESSAGE }), origin);
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// Handle `POST /api/answer`
pub async fn handle_answer(
    req: Request<Incoming>,
    state: Arc<AppState>,
    addr: SocketAddr,
) -> Response<Full<Bytes>> {
    let origin = resolve_cors_origin(req.headers(), &state.args);
    let cookie = get_cookie(req.headers(), &state.args.cookie_name);

    let limit_key = cookie
        .clone()
        .unwrap_or_else(|| addr.ip().to_string());
    if !state.limiter.check(&limit_key) {
        return rate_limited_response(&origin);
    }

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Answer request body error: {}", e);
            return failure_response(&origin);
        }
    };

    let input: AnswerInput = match serde_json::from_slice(&body) {
        Ok(input) => input,
        Err(e) => {
            warn!("Answer JSON parse error: {}", e);
            let mut response = json_response(json!({ "message": "Invalid request body" }), &origin);
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return response;
        }
    };

    let store = match state.store.as_deref() {
        Some(store) => store,
        None => {
            warn!("Answer rejected: record store unavailable");
            return failure_response(&origin);
        }
    };

    match write_answer(
        store,
        &state.cipher,
        &state.codec,
        &state.sanitizer,
        &state.args,
        cookie.as_deref(),
        &input,
    )
    .await
    {
        Ok(written) => {
            let mut response = json_response(json!({ "message": SAVED_MESSAGE }), &origin);
            if let Some(value) = written.cookie {
                if let Ok(header) = build_set_cookie(&state.args, &value).parse() {
                    response.headers_mut().insert("Set-Cookie", header);
                }
            }
            response
        }
        Err(e) => {
            error!("Answer write failed: {}", e);
            failure_response(&origin)
        }
    }
}
