//! Key-based access control.
//!
//! Every FileDB request must carry an access key, either as `?key=<key>` (the
//! form legacy clients use) or as an `Authorization: Bearer <key>` header. The
//! key is looked up in the configured `[[permissions]]` table and the HTTP
//! method decides which right is required:
//!
//! | Method        | Right    |
//! |---------------|----------|
//! | `GET`, `HEAD` | `get`    |
//! | `POST`, `PUT` | `post`   |
//! | `DELETE`      | `delete` |

use axum::{
    extract::{Query, Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::Permission;
use crate::state::AppState;

#[derive(Deserialize)]
struct KeyQuery {
    key: Option<String>,
}

/// Axum middleware that rejects requests without a key permitted to use the
/// request's method.
///
/// # Error responses
///
/// - `401 Unauthorized`: no key supplied
/// - `403 Forbidden`: unknown key, or key lacks the right for this method
pub async fn require_permission(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(key) = extract_key(&request) else {
        return error(StatusCode::UNAUTHORIZED, "Not authenticated", "NOT_AUTHENTICATED");
    };

    let Some(permission) = state.config.permission(&key) else {
        debug!("Rejected unknown key");
        return error(StatusCode::FORBIDDEN, "Not authorized", "NOT_AUTHORIZED");
    };

    if !allows(permission, request.method()) {
        debug!(
            "Key {:?} may not {}",
            permission.annotation,
            request.method()
        );
        return error(StatusCode::FORBIDDEN, "Not authorized", "NOT_AUTHORIZED");
    }

    next.run(request).await
}

/// Whether `permission` grants the right `method` requires.
pub fn allows(permission: &Permission, method: &Method) -> bool {
    match *method {
        Method::GET | Method::HEAD => permission.get,
        Method::POST | Method::PUT => permission.post,
        Method::DELETE => permission.delete,
        _ => false,
    }
}

/// Query-string key first, then Bearer header.
fn extract_key(request: &Request) -> Option<String> {
    if let Ok(Query(KeyQuery { key: Some(key) })) = Query::<KeyQuery>::try_from_uri(request.uri())
    {
        if !key.is_empty() {
            return Some(key);
        }
    }

    request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

fn error(status: StatusCode, message: &str, code: &str) -> Response {
    (status, Json(json!({"error": message, "code": code}))).into_response()
}

/// Constant-time byte comparison to prevent timing side-channel attacks.
///
/// Always iterates over the full length of `expected` regardless of `provided`
/// length, so an attacker cannot determine the key length from response times.
pub fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    let mut diff = u8::from(expected.len() != provided.len());
    for i in 0..expected.len() {
        let p = if i < provided.len() {
            provided[i]
        } else {
            0xff
        };
        diff |= expected[i] ^ p;
    }
    diff == 0
}
