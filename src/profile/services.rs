use anyhow::Context;
use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AuthError;
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("image is empty")]
    Empty,

    #[error("image exceeds {max} bytes")]
    TooLarge { max: usize },

    #[error(transparent)]
    Account(#[from] AuthError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub struct UploadItem<'a> {
    pub body: Bytes,
    pub content_type: &'a str,
}

/// Media type without parameters, lowercased: `Image/PNG; q=1` -> `image/png`.
pub fn mime_essence(ct: &str) -> String {
    ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

/// Raster formats accepted as avatars.
pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match mime_essence(ct).as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Uploads the image, points the account at it and drops the object it
/// replaced. Returns the new storage key.
pub async fn upload_avatar(
    st: &AppState,
    account_id: Uuid,
    img: UploadItem<'_>,
) -> Result<String, AvatarError> {
    let content_type = mime_essence(img.content_type);
    let ext = ext_from_mime(&content_type)
        .ok_or_else(|| AvatarError::UnsupportedType(img.content_type.to_string()))?;
    if img.body.is_empty() {
        return Err(AvatarError::Empty);
    }
    let max = st.config.avatar.max_bytes;
    if img.body.len() > max {
        return Err(AvatarError::TooLarge { max });
    }

    // Fail before touching storage if the account is gone.
    st.accounts.profile(account_id).await?;

    let key = format!("avatars/{}/{}.{}", account_id, Uuid::new_v4(), ext);
    st.storage
        .put_object(&key, img.body, &content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    let previous = match st.accounts.update_avatar(account_id, key.clone()).await {
        Ok(p) => p,
        Err(e) => {
            discard_object(st, &key).await;
            return Err(e.into());
        }
    };
    if let Some(old) = previous {
        discard_object(st, &old).await;
    }

    info!(account_id = %account_id, key = %key, "avatar uploaded");
    Ok(key)
}

/// Clears the avatar. Succeeds without doing anything when there is none.
pub async fn remove_avatar(st: &AppState, account_id: Uuid) -> Result<(), AvatarError> {
    if let Some(old) = st.accounts.remove_avatar(account_id).await? {
        discard_object(st, &old).await;
        info!(account_id = %account_id, "avatar removed");
    }
    Ok(())
}

pub async fn presign_avatar(st: &AppState, key: &str) -> anyhow::Result<String> {
    st.storage
        .presign_get(key, st.config.avatar.url_ttl_secs)
        .await
        .with_context(|| format!("presign url for key {}", key))
}

// The account no longer references the object, so a failed delete only
// leaves an orphan behind.
async fn discard_object(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %e, key = %key, "failed to delete avatar object");
    }
}

#[cfg(test)]
mod avatar_tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::StorageClient;
    use crate::testing::MemoryStorage;

    async fn setup(storage: Arc<MemoryStorage>) -> (AppState, Uuid) {
        let mut state = AppState::fake();
        state.storage = storage as Arc<dyn StorageClient>;
        let account = state.accounts.register("a@b.com", "Passw0rd").await.unwrap();
        (state, account.id)
    }

    fn png(bytes: &'static [u8]) -> UploadItem<'static> {
        UploadItem {
            body: Bytes::from_static(bytes),
            content_type: "image/png",
        }
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/gif"), Some("gif"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/svg+xml"), None);
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn ext_from_mime_ignores_case_and_parameters() {
        assert_eq!(ext_from_mime("image/PNG"), Some("png"));
        assert_eq!(ext_from_mime("Image/Jpeg; charset=binary"), Some("jpg"));
        assert_eq!(ext_from_mime("  image/webp ;q=0.9"), Some("webp"));
        assert_eq!(ext_from_mime("image/svg+xml; charset=utf-8"), None);
        assert_eq!(ext_from_mime(""), None);
    }

    #[tokio::test]
    async fn upload_stores_object_and_reference() {
        let storage = Arc::new(MemoryStorage::default());
        let (state, id) = setup(storage.clone()).await;

        let key = upload_avatar(&state, id, png(b"\x89PNG")).await.unwrap();
        assert!(key.starts_with(&format!("avatars/{}/", id)));
        assert!(key.ends_with(".png"));
        assert_eq!(storage.keys(), vec![key.clone()]);
        assert_eq!(storage.content_type(&key).as_deref(), Some("image/png"));

        let account = state.accounts.profile(id).await.unwrap();
        assert_eq!(account.avatar_key, Some(key));
    }

    #[tokio::test]
    async fn upload_normalises_content_type() {
        let storage = Arc::new(MemoryStorage::default());
        let (state, id) = setup(storage.clone()).await;

        let img = UploadItem {
            body: Bytes::from_static(b"JPEGDATA"),
            content_type: "Image/JPEG; charset=binary",
        };
        let key = upload_avatar(&state, id, img).await.unwrap();
        assert!(key.ends_with(".jpg"));
        assert_eq!(storage.content_type(&key).as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn replacing_avatar_deletes_previous_object() {
        let storage = Arc::new(MemoryStorage::default());
        let (state, id) = setup(storage.clone()).await;

        let first = upload_avatar(&state, id, png(b"one")).await.unwrap();
        let second = upload_avatar(&state, id, png(b"two")).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(storage.keys(), vec![second]);
    }

    #[tokio::test]
    async fn rejects_bad_uploads_without_storing() {
        let storage = Arc::new(MemoryStorage::default());
        let (state, id) = setup(storage.clone()).await;

        let svg = UploadItem {
            body: Bytes::from_static(b"<svg/>"),
            content_type: "image/svg+xml",
        };
        assert!(matches!(
            upload_avatar(&state, id, svg).await,
            Err(AvatarError::UnsupportedType(_))
        ));
        assert!(matches!(
            upload_avatar(&state, id, png(b"")).await,
            Err(AvatarError::Empty)
        ));

        let big = UploadItem {
            body: Bytes::from(vec![0u8; state.config.avatar.max_bytes + 1]),
            content_type: "image/png",
        };
        assert!(matches!(
            upload_avatar(&state, id, big).await,
            Err(AvatarError::TooLarge { .. })
        ));

        assert!(storage.keys().is_empty());
        assert!(state.accounts.profile(id).await.unwrap().avatar_key.is_none());
    }

    #[tokio::test]
    async fn upload_for_unknown_account_stores_nothing() {
        let storage = Arc::new(MemoryStorage::default());
        let (state, _) = setup(storage.clone()).await;

        let err = upload_avatar(&state, Uuid::new_v4(), png(b"x")).await.unwrap_err();
        assert!(matches!(err, AvatarError::Account(AuthError::NotFound)));
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn remove_deletes_object_and_is_idempotent() {
        let storage = Arc::new(MemoryStorage::default());
        let (state, id) = setup(storage.clone()).await;
        upload_avatar(&state, id, png(b"x")).await.unwrap();

        remove_avatar(&state, id).await.unwrap();
        assert!(storage.keys().is_empty());
        assert!(state.accounts.profile(id).await.unwrap().avatar_key.is_none());

        remove_avatar(&state, id).await.unwrap();
    }

    #[tokio::test]
    async fn storage_delete_failure_is_not_surfaced() {
        let storage = Arc::new(MemoryStorage::failing_deletes());
        let (state, id) = setup(storage.clone()).await;
        upload_avatar(&state, id, png(b"x")).await.unwrap();

        remove_avatar(&state, id).await.unwrap();
        assert!(state.accounts.profile(id).await.unwrap().avatar_key.is_none());
    }

    #[tokio::test]
    async fn presign_uses_key() {
        let state = AppState::fake();
        let url = presign_avatar(&state, "avatars/q/w.webp").await.unwrap();
        assert!(url.contains("avatars/q/w.webp"));
    }
}
