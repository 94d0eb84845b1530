//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Requests are routed by
//! a `(Method, path)` match; shared helpers cover JSON responses, CORS
//! origin resolution, and subject-cookie handling.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::crypto::Cipher;
use crate::db::Store;
use crate::ratelimit::RateLimiter;
use crate::routes;
use crate::sanitize::Sanitizer;
use crate::token::TokenCodec;
use crate::types::LogbookError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Record store handle; None only in dev mode without MongoDB, in which
    /// case resolutions report store-unavailable
    pub store: Option<Arc<Store>>,
    /// Symmetric cipher for tokens, cookies, and stored answers
    pub cipher: Cipher,
    /// Activity token codec
    pub codec: TokenCodec,
    /// Allow-list rich-text filter
    pub sanitizer: Sanitizer,
    /// Fixed-window request limiter
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(args: Args, store: Option<Store>) -> Self {
        let cipher = Cipher::new(&args.secret_key());
        let codec = TokenCodec::new(cipher.clone());
        let limiter = Arc::new(RateLimiter::new(
            args.rate_limit_max,
            std::time::Duration::from_secs(args.rate_limit_window_secs),
        ));

        Self {
            args,
            store: store.map(Arc::new),
            cipher,
            codec,
            sanitizer: Sanitizer::new(),
            limiter,
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), LogbookError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "logbook listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - insecure defaults in effect");
    }

    // Keep the rate limiter map bounded
    crate::ratelimit::spawn_sweep_task(Arc::clone(&state.limiter));

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Liveness probe - returns 200 if the gateway is running
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        // Readiness probe - returns 200 only when the store is available
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            routes::readiness_check(Arc::clone(&state))
        }

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(req.headers(), &state.args),

        // Activity profile resolution
        (Method::GET, "/api/profile") => {
            routes::handle_profile(req, Arc::clone(&state), addr).await
        }

        // Answer submission
        (Method::POST, "/api/answer") => {
            routes::handle_answer(req, Arc::clone(&state), addr).await
        }

        // Actor blob encryption for embedding players
        (Method::POST, "/api/actor/encrypt") => {
            routes::handle_encrypt_actor(req, Arc::clone(&state)).await
        }

        // Actor exception flag upsert
        (Method::POST, "/api/actor/exception") => {
            routes::handle_actor_exception(req, Arc::clone(&state)).await
        }

        // Not found
        _ => not_found_response(&path),
    };

    Ok(response)
}

/// CORS preflight response
fn preflight_response(headers: &HeaderMap, args: &Args) -> Response<Full<Bytes>> {
    let origin = resolve_cors_origin(headers, args);
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", origin)
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Credentials", "true")
        .header("Access-Control-Max-Age", "86400")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// 200 JSON response with CORS and credential headers
pub(crate) fn json_response(body: serde_json::Value, origin: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", origin)
        .header("Access-Control-Allow-Credentials", "true")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// 429 response with the fixed error body clients test for
pub(crate) fn rate_limited_response(origin: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Rate limit exceeded. Try again later.",
    });

    Response::builder()
        .status(StatusCode::TOO_MANY_REQUESTS)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", origin)
        .header("Access-Control-Allow-Credentials", "true")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Pick the CORS origin to echo: the request's origin when allow-listed,
/// else the first configured origin. Falls back to the referer's origin
/// when no Origin header is present.
pub(crate) fn resolve_cors_origin(headers: &HeaderMap, args: &Args) -> String {
    let allowed = args.allowed_origin_list();

    let request_origin = headers
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| {
            headers
                .get("referer")
                .and_then(|v| v.to_str().ok())
                .and_then(origin_of)
        });

    match request_origin {
        Some(origin) if allowed.iter().any(|a| a == &origin) => origin,
        _ => allowed.first().cloned().unwrap_or_else(|| "*".to_string()),
    }
}

/// Scheme + authority of a URL, e.g. "https://host.test" from
/// "https://host.test/some/page"
fn origin_of(url: &str) -> Option<String> {
    let scheme_end = url.find("://")?;
    let rest = &url[scheme_end + 3..];
    let authority_end = rest.find('/').unwrap_or(rest.len());
    Some(format!("{}{}", &url[..scheme_end + 3], &rest[..authority_end]))
}

/// Read one cookie value from the Cookie header
pub(crate) fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get("cookie")?.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Build the Set-Cookie header for a rotated subject cookie.
///
/// HttpOnly + Secure + long-lived: the subject correlation is effectively
/// permanent and never readable from page scripts.
pub(crate) fn build_set_cookie(args: &Args, value: &str) -> String {
    format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; Secure; SameSite={}",
        args.cookie_name, value, args.cookie_max_age_secs, args.cookie_same_site
    )
}

/// Read one percent-decoded query parameter
pub(crate) fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    let query = query?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key != name {
            return None;
        }
        Some(
            urlencoding::decode(value)
                .map(|c| c.into_owned())
                .unwrap_or_else(|_| value.to_string()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args() -> Args {
        Args::parse_from(["logbook", "--dev-mode"])
    }

    fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (key, value) in pairs {
            headers.insert(
                hyper::header::HeaderName::from_bytes(key.as_bytes()).unwrap(),
                value.parse().unwrap(),
            );
        }
        headers
    }

    #[test]
    fn test_get_cookie() {
        let headers = header_map(&[("cookie", "a=1; backpackId=abc123; b=2")]);
        assert_eq!(get_cookie(&headers, "backpackId").as_deref(), Some("abc123"));
        assert_eq!(get_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_get_cookie_without_header() {
        let headers = HeaderMap::new();
        assert_eq!(get_cookie(&headers, "backpackId"), None);
    }

    #[test]
    fn test_query_param_decoding() {
        let query = Some("token=abc%3D%3D&lang=fr&actor=a%20b");
        assert_eq!(query_param(query, "token").as_deref(), Some("abc=="));
        assert_eq!(query_param(query, "lang").as_deref(), Some("fr"));
        assert_eq!(query_param(query, "actor").as_deref(), Some("a b"));
        assert_eq!(query_param(query, "missing"), None);
        assert_eq!(query_param(None, "token"), None);
    }

    #[test]
    fn test_build_set_cookie() {
        let cookie = build_set_cookie(&args(), "ciphertext");
        assert!(cookie.starts_with("backpackId=ciphertext;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
    }

    #[test]
    fn test_resolve_cors_origin_allowed() {
        let args = args();
        let headers = header_map(&[("origin", "https://www.monjournaldebord.ca")]);
        assert_eq!(
            resolve_cors_origin(&headers, &args),
            "https://www.monjournaldebord.ca"
        );
    }

    #[test]
    fn test_resolve_cors_origin_rejects_unknown() {
        let args = args();
        let headers = header_map(&[("origin", "https://evil.test")]);
        // Unknown origins get the first configured origin, not an echo
        assert_eq!(
            resolve_cors_origin(&headers, &args),
            "https://www.monjournaldebord.ca"
        );
    }

    #[test]
    fn test_resolve_cors_origin_from_referer() {
        let args = args();
        let headers = header_map(&[("referer", "https://www.monjournaldebord.ca/page?x=1")]);
        assert_eq!(
            resolve_cors_origin(&headers, &args),
            "https://www.monjournaldebord.ca"
        );
    }

    #[test]
    fn test_origin_of() {
        assert_eq!(
            origin_of("https://host.test/a/b").as_deref(),
            Some("https://host.test")
        );
        assert_eq!(
            origin_of("https://host.test").as_deref(),
            Some("https://host.test")
        );
        assert_eq!(origin_of("not a url"), None);
    }
}
