//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::web::state::AppState;

/// The authenticated user id, inserted into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

/// The user id when a session cookie happens to be present and valid,
/// inserted by [`optional_auth`]. Anonymous requests carry `None`.
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<Uuid>);

/// Extracts the opaque session id from the `Cookie` header, if any.
pub fn session_cookie_value(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|v| !v.is_empty())
}

/// Middleware that validates the auth session cookie and extracts the user
/// id. If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let session_id = session_cookie_value(req.headers())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let user_id = state
        .gateway
        .validate_auth_session(&session_id)
        .await
        .map_err(|e| {
            debug!("Auth session rejected: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(req).await)
}

/// Middleware for routes that work both signed-in and anonymous: reading a
/// chapter still works without a session, but saved progress and "my
/// rating" only appear for an identified user.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let user_id = match session_cookie_value(req.headers()) {
        Some(session_id) => state.gateway.validate_auth_session(session_id).await.ok(),
        None => None,
    };
    req.extensions_mut().insert(MaybeUser(user_id));
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookie: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        h
    }

    #[test]
    fn extracts_session_among_other_cookies() {
        let h = headers("theme=dark; session=abc-123; lang=vi");
        assert_eq!(session_cookie_value(&h), Some("abc-123"));
    }

    #[test]
    fn missing_or_empty_session_is_none() {
        assert_eq!(session_cookie_value(&HeaderMap::new()), None);
        assert_eq!(session_cookie_value(&headers("theme=dark")), None);
        assert_eq!(session_cookie_value(&headers("session=")), None);
    }
}
