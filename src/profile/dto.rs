use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub avatar_url: Option<String>, // presigned, short-lived
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// PUT /profile/avatar/base64 { image_b64: "...", content_type: "image/png" }
#[derive(Debug, Deserialize)]
pub struct AvatarBase64Request {
    pub image_b64: String,
    pub content_type: String,
}
