use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use time::OffsetDateTime;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::session::SessionKeys;
use crate::state::AppState;

/// Account and session behind a valid bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub account_id: Uuid,
    pub session_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing Authorization header".into()))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or((StatusCode::UNAUTHORIZED, "invalid auth scheme".into()))?;

        let keys = SessionKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            (StatusCode::UNAUTHORIZED, "invalid or expired token".to_string())
        })?;

        let session = match state.sessions.find(claims.sid).await {
            Ok(Some(s)) => s,
            Ok(None) => {
                warn!(session_id = %claims.sid, "session not found");
                return Err((StatusCode::UNAUTHORIZED, "session expired".into()));
            }
            Err(e) => {
                error!(error = %e, "session lookup failed");
                return Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong".into(),
                ));
            }
        };

        if session.account_id != claims.sub || session.is_expired(OffsetDateTime::now_utc()) {
            warn!(session_id = %session.id, "session expired or mismatched");
            return Err((StatusCode::UNAUTHORIZED, "session expired".into()));
        }

        debug!(session_id = %session.id, email = %session.email, "session resumed");
        Ok(AuthUser {
            account_id: session.account_id,
            session_id: session.id,
        })
    }
}
