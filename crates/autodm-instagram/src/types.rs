// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph API request and response types.

use autodm_core::types::{DmButton, PlatformComment};
use serde::{Deserialize, Serialize};

/// Maximum quick-reply title length accepted by the platform.
pub const QUICK_REPLY_TITLE_MAX: usize = 20;

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub recipient: Recipient<'a>,
    pub message: OutgoingMessage<'a>,
}

#[derive(Debug, Serialize)]
pub struct Recipient<'a> {
    pub id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct OutgoingMessage<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<QuickReply>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickReply {
    pub content_type: &'static str,
    pub title: String,
    pub payload: String,
}

impl From<&DmButton> for QuickReply {
    fn from(button: &DmButton) -> Self {
        Self {
            content_type: "text",
            title: button.text.chars().take(QUICK_REPLY_TITLE_MAX).collect(),
            payload: button.url.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReplyRequest<'a> {
    pub message: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageResponse {
    pub message_id: String,
}

#[derive(Debug, Deserialize)]
pub struct IdResponse {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct FollowersResponse {
    #[serde(default)]
    pub followers: Option<Page<IdOnly>>,
}

#[derive(Debug, Deserialize)]
pub struct IdOnly {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct ApiComment {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub from: Option<CommentAuthor>,
}

#[derive(Debug, Deserialize)]
pub struct CommentAuthor {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl ApiComment {
    /// Converts to the domain type. Comments without an author id are dropped.
    pub fn into_platform_comment(self) -> Option<PlatformComment> {
        let from = self.from?;
        let username = from.username.or(self.username).unwrap_or_default();
        Some(PlatformComment {
            id: self.id,
            text: self.text,
            from_id: from.id,
            username,
        })
    }
}

/// Graph API error envelope: `{"error": {"message": ..., "type": ..., "code": ...}}`.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}
