// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Placeholder substituted with the event author's username.
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// Renders a reply or message template for `username`.
pub fn render(template: &str, username: &str) -> String {
    template.replace(USERNAME_PLACEHOLDER, username)
}
