use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicAccount, RegisterRequest},
        extractors::AuthUser,
        session::{self, SessionKeys},
    },
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

/// Maps account errors onto HTTP. Unknown email and wrong password share
/// one response so callers cannot probe which emails exist.
pub(crate) fn reject(e: AuthError) -> (StatusCode, String) {
    match e {
        AuthError::Validation(v) => (StatusCode::BAD_REQUEST, v.to_string()),
        AuthError::Conflict => (StatusCode::CONFLICT, "Email already registered".into()),
        AuthError::NotFound | AuthError::InvalidCredential { .. } => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".into())
        }
        AuthError::Locked => (
            StatusCode::LOCKED,
            "Account locked. Contact support.".into(),
        ),
        AuthError::Infrastructure(e) => {
            error!(error = ?e, "account operation failed");
            internal()
        }
    }
}

pub(crate) fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Something went wrong".into(),
    )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicAccount>), (StatusCode, String)> {
    let account = state
        .accounts
        .register(&payload.email, &payload.password)
        .await
        .map_err(reject)?;

    Ok((StatusCode::CREATED, Json(PublicAccount::from(&account))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let account = state
        .accounts
        .authenticate(&payload.email, &payload.password)
        .await
        .map_err(reject)?;

    let keys = SessionKeys::from_ref(&state);
    let (token, session) = session::issue(state.sessions.as_ref(), &keys, &account)
        .await
        .map_err(|e| {
            error!(error = ?e, account_id = %account.id, "issue session failed");
            internal()
        })?;

    Ok(Json(AuthResponse {
        token,
        expires_at: session.expires_at,
        account: PublicAccount {
            id: account.id,
            email: account.email,
        },
    }))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<StatusCode, (StatusCode, String)> {
    session::revoke(state.sessions.as_ref(), user.session_id)
        .await
        .map_err(|e| {
            error!(error = ?e, session_id = %user.session_id, "revoke session failed");
            internal()
        })?;
    info!(account_id = %user.account_id, "logged out");
    Ok(StatusCode::NO_CONTENT)
}
