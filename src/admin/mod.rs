// src/admin/mod.rs

//! Admin authentication: HTTP basic auth gating `GET /admin`, and an
//! HMAC-signed, time-limited cookie that grants access to the live
//! channel's WebSocket handshake.

use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const ADMIN_COOKIE_NAME: &str = "sparql_proxy_admin";
const COOKIE_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Checks an `Authorization: Basic ...` header against the configured
/// admin credentials.
pub fn verify_basic_auth(header: Option<&str>, user: &str, password: &str) -> bool {
    let Some(header) = header else { return false };
    let Some(encoded) = header.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };
    let Some((candidate_user, candidate_password)) = decoded.split_once(':') else {
        return false;
    };
    candidate_user == user && candidate_password == password
}

/// Produces a cookie value `{expiry}.{hex hmac}` signing the expiry
/// timestamp with `secret`, so the cookie cannot be forged or extended
/// without knowledge of the server's secret.
pub fn sign_cookie(secret: &str) -> String {
    let expiry = Utc::now().timestamp() + COOKIE_TTL_SECONDS;
    format!("{expiry}.{}", mac_hex(secret, expiry))
}

/// Validates a cookie value produced by [`sign_cookie`]: the signature must
/// match and the expiry must not have passed.
pub fn verify_cookie(value: &str, secret: &str) -> bool {
    let Some((expiry_str, mac_str)) = value.split_once('.') else {
        return false;
    };
    let Ok(expiry) = expiry_str.parse::<i64>() else {
        return false;
    };
    if expiry < Utc::now().timestamp() {
        return false;
    }
    mac_hex(secret, expiry) == mac_str
}

fn mac_hex(secret: &str, expiry: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(expiry.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
