use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, put},
    Json, Router,
};
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use tracing::{error, instrument, warn};

use crate::{
    auth::{
        extractors::AuthUser,
        handlers::{internal, reject},
        repo_types::Account,
    },
    state::AppState,
};

use super::dto::{AvatarBase64Request, ProfileResponse};
use super::services::{self, AvatarError, UploadItem};

/// Multipart field names accepted for the image.
const AVATAR_FIELDS: &[&str] = &["profilePicture", "avatar"];

// base64 inflates by 4/3, plus multipart/JSON framing
fn body_limit(max_upload_bytes: usize) -> usize {
    (max_upload_bytes / 3)
        .saturating_mul(4)
        .saturating_add(4)
        .saturating_add(64 * 1024)
}

pub fn profile_routes(max_upload_bytes: usize) -> Router<AppState> {
    let body_limit = body_limit(max_upload_bytes);
    Router::new()
        .route("/profile", get(get_profile))
        .route(
            "/profile/avatar",
            get(get_avatar)
                .put(put_avatar_multipart)
                .delete(delete_avatar),
        )
        .route("/profile/avatar/base64", put(put_avatar_base64))
        .layer(DefaultBodyLimit::max(body_limit))
}

fn avatar_rejection(e: AvatarError) -> (StatusCode, String) {
    match e {
        AvatarError::UnsupportedType(_) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string()),
        AvatarError::Empty => (StatusCode::BAD_REQUEST, e.to_string()),
        AvatarError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()),
        AvatarError::Account(e) => reject(e),
        AvatarError::Storage(e) => {
            error!(error = ?e, "avatar storage failed");
            internal()
        }
    }
}

async fn to_profile(state: &AppState, account: Account) -> ProfileResponse {
    // A broken presign should not hide the rest of the profile.
    let avatar_url = match account.avatar_key.as_deref() {
        Some(key) => match services::presign_avatar(state, key).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, account_id = %account.id, "presign avatar failed");
                None
            }
        },
        None => None,
    };
    ProfileResponse {
        id: account.id,
        email: account.email,
        avatar_url,
        created_at: account.created_at,
    }
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
    let account = state
        .accounts
        .profile(user.account_id)
        .await
        .map_err(reject)?;
    Ok(Json(to_profile(&state, account).await))
}

/// PUT /profile/avatar (multipart, one file in `profilePicture`)
#[instrument(skip(state, mp))]
pub async fn put_avatar_multipart(
    State(state): State<AppState>,
    user: AuthUser,
    mut mp: Multipart,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
    let mut upload: Option<(Bytes, String)> = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if !field.name().is_some_and(|n| AVATAR_FIELDS.contains(&n)) {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let data = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        upload = Some((data, content_type));
        break;
    }
    let Some((body, content_type)) = upload else {
        return Err((StatusCode::BAD_REQUEST, "profilePicture is required".into()));
    };

    store_avatar(
        &state,
        user,
        UploadItem {
            body,
            content_type: &content_type,
        },
    )
    .await
}

#[instrument(skip(state, body))]
pub async fn put_avatar_base64(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<AvatarBase64Request>,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
    let bytes = Base64::decode_vec(body.image_b64.trim())
        .map_err(|_| (StatusCode::BAD_REQUEST, "invalid base64".into()))?;

    store_avatar(
        &state,
        user,
        UploadItem {
            body: Bytes::from(bytes),
            content_type: &body.content_type,
        },
    )
    .await
}

async fn store_avatar(
    state: &AppState,
    user: AuthUser,
    img: UploadItem<'_>,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
    services::upload_avatar(state, user.account_id, img)
        .await
        .map_err(avatar_rejection)?;
    let account = state
        .accounts
        .profile(user.account_id)
        .await
        .map_err(reject)?;
    Ok(Json(to_profile(state, account).await))
}

#[instrument(skip(state))]
pub async fn delete_avatar(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<StatusCode, (StatusCode, String)> {
    services::remove_avatar(&state, user.account_id)
        .await
        .map_err(avatar_rejection)?;
    Ok(StatusCode::NO_CONTENT)
}

/// 307 to a presigned URL of the current avatar.
#[instrument(skip(state))]
pub async fn get_avatar(State(state): State<AppState>, user: AuthUser) -> Response {
    let account = match state.accounts.profile(user.account_id).await {
        Ok(a) => a,
        Err(e) => return reject(e).into_response(),
    };
    let Some(key) = account.avatar_key else {
        return (StatusCode::NOT_FOUND, "Avatar not found").into_response();
    };
    match services::presign_avatar(&state, &key).await {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(e) => {
            error!(error = ?e, "presign avatar failed");
            internal().into_response()
        }
    }
}
