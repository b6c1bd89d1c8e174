// src/serve/proxy.rs

//! Reverse proxy to the upstream application.

use anyhow::{bail, Result};
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use super::RELOAD_PATH;
use super::reload::Reloader;

/// Largest request body forwarded upstream.
const MAX_BODY: usize = 64 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ProxyState {
    client: reqwest::Client,
    /// Upstream origin without a trailing slash.
    upstream: String,
    pub reloader: Reloader,
}

impl ProxyState {
    pub fn new(upstream: &str, reloader: Reloader) -> Result<Self> {
        let upstream = upstream.trim().trim_end_matches('/');
        if !(upstream.starts_with("http://") || upstream.starts_with("https://")) {
            bail!("serve proxy must be an http(s) URL, got '{upstream}'");
        }
        // Redirects go back to the browser so its URL and cookies follow them.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            upstream: upstream.to_string(),
            reloader,
        })
    }

    fn upstream_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.upstream, path_and_query)
    }
}

/// The client half of live reload.
pub fn reload_snippet() -> String {
    format!(
        "<script>(function(){{var s=new EventSource(\"{RELOAD_PATH}\");\
         s.onmessage=function(){{location.reload();}};}})();</script>"
    )
}

/// Insert the reload snippet before the last `</body>`, or append it.
pub fn inject_reload_snippet(html: &str) -> String {
    let snippet = reload_snippet();
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(at) => format!("{}{}{}", &html[..at], snippet, &html[at..]),
        None => format!("{html}{snippet}"),
    }
}

/// Hop-by-hop headers and the ones that no longer match a rewritten body.
fn is_skipped(name: &HeaderName) -> bool {
    name == header::CONNECTION
        || name == header::TRANSFER_ENCODING
        || name == header::CONTENT_LENGTH
        || name == header::HOST
}

fn copy_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from {
        if !is_skipped(name) {
            to.append(name.clone(), value.clone());
        }
    }
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

/// Fallback handler: forward the request and relay the response.
pub async fn forward(State(state): State<ProxyState>, req: Request) -> Response {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let url = state.upstream_url(&path_and_query);
    let method = req.method().clone();

    let mut headers = HeaderMap::new();
    copy_headers(req.headers(), &mut headers);
    // HTML must come back uncompressed so the snippet can be injected.
    headers.remove(header::ACCEPT_ENCODING);

    let body = match to_bytes(req.into_body(), MAX_BODY).await {
        Ok(b) => b,
        Err(err) => {
            return (StatusCode::BAD_REQUEST, format!("reading request body: {err}")).into_response();
        }
    };

    debug!(%method, %url, "proxying request");
    let upstream = match state
        .client
        .request(method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(r) => r,
        Err(err) => {
            warn!(%url, error = %err, "upstream unreachable");
            return (StatusCode::BAD_GATEWAY, format!("upstream unreachable: {err}")).into_response();
        }
    };

    let status = upstream.status();
    let mut out_headers = HeaderMap::new();
    copy_headers(upstream.headers(), &mut out_headers);
    let html = is_html(upstream.headers());

    let bytes = match upstream.bytes().await {
        Ok(b) => b,
        Err(err) => {
            warn!(%url, error = %err, "reading upstream body failed");
            return (StatusCode::BAD_GATEWAY, format!("reading upstream body: {err}")).into_response();
        }
    };

    let body = if html {
        let page = inject_reload_snippet(&String::from_utf8_lossy(&bytes));
        Body::from(page)
    } else {
        Body::from(bytes)
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = out_headers;
    if html {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    }
    response
}
