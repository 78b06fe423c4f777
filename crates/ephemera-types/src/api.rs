use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Attachment;

// -- JWT Claims --

/// Claims carried by tokens from the external identity provider.
/// `sub` is the owner id recorded on created messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
}

// -- Create --

/// Expiration given either as a number of minutes or a duration string
/// such as `"1d 5h 30m"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExpirationInput {
    Minutes(u32),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMessageRequest {
    pub body: String,
    #[serde(default)]
    pub expiration: Option<ExpirationInput>,
    #[serde(default)]
    pub view_limit: Option<u32>,
    #[serde(default)]
    pub self_destruct: bool,
    #[serde(default)]
    pub self_destruct_timer_seconds: Option<u32>,
    #[serde(default)]
    pub allowed_recipients: Vec<String>,
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMessageResponse {
    pub id: Uuid,
    pub share_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// -- Preview --

/// What a viewer may learn about a message before revealing it. Never
/// includes the body or attachments.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessagePreview {
    pub id: Uuid,
    pub available: bool,
    pub unavailable_reason: Option<String>,
    pub requires_email: bool,
    pub view_limit: u32,
    pub view_count: u32,
    pub self_destruct: bool,
    pub self_destruct_timer_seconds: Option<u32>,
    pub expires_at: DateTime<Utc>,
    pub destruct_deadline: Option<DateTime<Utc>>,
}

// -- Access / reveal --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewerRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessResponse {
    pub granted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevealResponse {
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub expiry_deadline: Option<DateTime<Utc>>,
    pub views_remaining: u32,
    pub destroyed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpireResponse {
    pub destroyed: bool,
    pub destruct_deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
