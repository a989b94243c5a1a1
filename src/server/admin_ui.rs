// src/server/admin_ui.rs

//! `GET /` and `GET /admin`. The web UI and the admin-authentication flow
//! are both external collaborators — this module wires just enough HTTP
//! framing (basic auth gate, signed cookie, a served page) without building
//! a real front-end.

use crate::admin::{self, ADMIN_COOKIE_NAME};
use crate::server::state::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};

const INDEX_HTML: &str = concat!(
    "<!doctype html><html><head><title>sparql-cache-proxy</title></head>",
    "<body><h1>sparql-cache-proxy</h1><p>SPARQL endpoint: <code>/sparql</code></p></body></html>",
);

const ADMIN_HTML: &str = concat!(
    "<!doctype html><html><head><title>sparql-cache-proxy admin</title></head>",
    "<body><h1>Queue</h1><p>Connect to <code>/admin/ws</code> for live state, ",
    "cache purge, and job cancellation.</p></body></html>",
);

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Basic-auth gated; on success, sets the signed admin cookie the live
/// channel requires at handshake.
pub async fn admin_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let auth = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    if !admin::verify_basic_auth(auth, &state.config.admin_user, &state.config.admin_password) {
        let mut response = StatusCode::UNAUTHORIZED.into_response();
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            "Basic realm=\"sparql-cache-proxy admin\"".parse().unwrap(),
        );
        return response;
    }

    let cookie_value = admin::sign_cookie(&state.config.admin_cookie_secret);
    let mut response = Html(ADMIN_HTML).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        format!("{ADMIN_COOKIE_NAME}={cookie_value}; HttpOnly; SameSite=Strict; Path=/")
            .parse()
            .expect("cookie value is a fixed-width hex/digit string with no control characters"),
    );
    response
}
