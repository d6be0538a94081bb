// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword rule matching.

use autodm_core::types::{Automation, MatchMode};

/// Text used to match story mentions, which carry no text of their own.
pub const STORY_MENTION_TEXT: &str = "Story mention";

/// Whether `text` on `post_id` satisfies `automation`'s trigger condition.
///
/// Inactive automations never match. A non-empty target-post list rejects
/// events without a post id or on any other post. Comparison is
/// case-insensitive with no trimming.
pub fn matches(automation: &Automation, text: &str, post_id: Option<&str>) -> bool {
    if !automation.is_active {
        return false;
    }
    if !automation.target_posts.is_empty() {
        match post_id {
            Some(post) if automation.target_posts.iter().any(|p| p == post) => {}
            _ => return false,
        }
    }
    match automation.match_mode {
        MatchMode::Any => true,
        MatchMode::Exact => {
            let text = text.to_lowercase();
            automation
                .keywords
                .iter()
                .any(|k| k.to_lowercase() == text)
        }
        MatchMode::Contains => {
            let text = text.to_lowercase();
            automation
                .keywords
                .iter()
                .any(|k| text.contains(&k.to_lowercase()))
        }
    }
}
