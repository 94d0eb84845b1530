//! Profile resolution endpoint
//!
//! `GET /api/profile?token=&lang=&actor=` plus the subject cookie.
//! Every precondition failure is a 200 response carrying a `message` code;
//! the client renders the matching fallback UI. The subject cookie is set
//! whenever resolution rotated it.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Args;
use crate::server::http::{
    build_set_cookie, get_cookie, json_response, query_param, rate_limited_response,
    resolve_cors_origin,
};
use crate::server::AppState;
use crate::services::actor::ActorHints;
use crate::services::profile::{resolve_profile, ProfileParams};

/// Normalize the requested language to a supported value
pub(crate) fn normalize_lang(raw: Option<&str>, args: &Args) -> String {
    let supported = args.supported_lang_list();
    if let Some(raw) = raw {
        let lowered = raw.trim().to_lowercase();
        let short: String = lowered.chars().take(2).collect();
        if supported.contains(&short) {
            return short;
        }
    }
    args.default_lang.clone()
}

/// Handle `GET /api/profile`
pub async fn handle_profile(
    req: Request<Incoming>,
    state: Arc<AppState>,
    addr: SocketAddr,
) -> Response<Full<Bytes>> {
    let origin = resolve_cors_origin(req.headers(), &state.args);
    let cookie = get_cookie(req.headers(), &state.args.cookie_name);

    // Rate limit by subject when known, else by IP
    let limit_key = cookie
        .clone()
        .unwrap_or_else(|| addr.ip().to_string());
    if !state.limiter.check(&limit_key) {
        return rate_limited_response(&origin);
    }

    let query = req.uri().query();
    let token = query_param(query, "token").unwrap_or_default();
    let lang = normalize_lang(query_param(query, "lang").as_deref(), &state.args);
    let hints = query_param(query, "actor")
        .and_then(|raw| ActorHints::parse(&raw, &state.cipher));

    let resolution = resolve_profile(
        state.store.as_deref(),
        &state.cipher,
        &state.codec,
        &state.sanitizer,
        &state.args,
        ProfileParams {
            token: &token,
            lang: &lang,
            cookie: cookie.as_deref(),
            hints,
        },
    )
    .await;

    let set_cookie = resolution
        .cookie
        .map(|value| build_set_cookie(&state.args, &value));

    let mut response = json_response(resolution.outcome.into_body(), &origin);
    if let Some(cookie_header) = set_cookie {
        if let Ok(value) = cookie_header.parse() {
            response.headers_mut().insert("Set-Cookie", value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args() -> Args {
        Args::parse_from(["logbook", "--dev-mode"])
    }

    #[test]
    fn test_normalize_supported_lang() {
        let args = args();
        assert_eq!(normalize_lang(Some("en"), &args), "en");
        assert_eq!(normalize_lang(Some("FR"), &args), "fr");
        // Regional variants collapse to the base language
        assert_eq!(normalize_lang(Some("fr-CA"), &args), "fr");
    }

    #[test]
    fn test_normalize_unsupported_lang_falls_back() {
        let args = args();
        assert_eq!(normalize_lang(Some("de"), &args), "fr");
        assert_eq!(normalize_lang(Some(""), &args), "fr");
        assert_eq!(normalize_lang(None, &args), "fr");
    }
}
