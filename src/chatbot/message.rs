//! Platform-neutral message and conversation types.

use serde::{Deserialize, Serialize};

/// Placeholder for authors Telegram tells us nothing about.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// A chat message as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: i64,
    /// Chat ID where this message was sent (negative = group, positive = DM).
    pub chat_id: i64,
    pub user_id: i64,
    /// Display name: handle if the author has one, first name otherwise.
    pub username: String,
    pub text: String,
    /// ID of the message this one replies to, within the same chat.
    pub reply_to: Option<i64>,
    /// True iff the author is the bot account.
    pub is_bot: bool,
}

/// Telegram rejects messages longer than this many chars.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Cut `text` to at most `max` chars, marking the cut with `...`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

/// Split `text` into parts of at most `max` chars, breaking at the last
/// newline inside each window when there is one. The newline a part was
/// broken at is dropped.
pub fn split_message(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut parts = Vec::new();
    let mut rest = text;

    while let Some((end, _)) = rest.char_indices().nth(max) {
        let window = &rest[..end];
        match window.rfind('\n') {
            Some(nl) if nl > 0 => {
                parts.push(window[..nl].to_string());
                rest = &rest[nl + 1..];
            }
            _ => {
                parts.push(window.to_string());
                rest = &rest[end..];
            }
        }
    }
    parts.push(rest.to_string());
    parts
}

/// Pick the name shown for an author.
pub fn display_name(handle: Option<&str>, first_name: Option<&str>) -> String {
    handle
        .filter(|h| !h.is_empty())
        .or(first_name.filter(|n| !n.is_empty()))
        .unwrap_or(UNKNOWN_AUTHOR)
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of a reconstructed dialogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub name: String,
    pub content: String,
}

impl ConversationTurn {
    pub fn from_message(msg: &ChatMessage) -> Self {
        let role = if msg.is_bot { Role::Assistant } else { Role::User };
        let name = if msg.username.is_empty() {
            UNKNOWN_AUTHOR.to_string()
        } else {
            msg.username.clone()
        };
        Self {
            role,
            name,
            content: msg.text.clone(),
        }
    }

    /// Render as a transcript line: `role: content`.
    pub fn format(&self) -> String {
        format!("{}: {}", self.role.as_str(), self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_msg(is_bot: bool, username: &str) -> ChatMessage {
        ChatMessage {
            message_id: 1,
            chat_id: -100,
            user_id: 42,
            username: username.to_string(),
            text: "hello".to_string(),
            reply_to: None,
            is_bot,
        }
    }

    #[test]
    fn test_split_short_text_is_one_part() {
        assert_eq!(split_message("привет", MAX_MESSAGE_CHARS), vec!["привет"]);
    }

    #[test]
    fn test_split_long_text_counts_chars() {
        let text = "а".repeat(5000);
        let parts = split_message(&text, MAX_MESSAGE_CHARS);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn test_split_prefers_newlines() {
        let parts = split_message("abc\ndefgh\nij", 8);
        assert_eq!(parts, vec!["abc", "defgh\nij"]);
        assert!(parts.iter().all(|p| p.chars().count() <= 8));

        assert_eq!(split_message("\nabcdef", 3), vec!["\nab", "cde", "f"]);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("короткий", 100), "короткий");
        assert_eq!(truncate_chars("абвгд", 3), "абв...");
    }

    #[test]
    fn test_display_name_prefers_handle() {
        assert_eq!(display_name(Some("alice"), Some("Alice")), "alice");
        assert_eq!(display_name(None, Some("Alice")), "Alice");
        assert_eq!(display_name(Some(""), Some("Alice")), "Alice");
        assert_eq!(display_name(None, None), UNKNOWN_AUTHOR);
    }

    #[test]
    fn test_turn_role_follows_authorship() {
        assert_eq!(ConversationTurn::from_message(&make_msg(true, "bot")).role, Role::Assistant);
        assert_eq!(ConversationTurn::from_message(&make_msg(false, "bob")).role, Role::User);
    }

    #[test]
    fn test_turn_placeholder_name() {
        let turn = ConversationTurn::from_message(&make_msg(false, ""));
        assert_eq!(turn.name, UNKNOWN_AUTHOR);
    }

    #[test]
    fn test_turn_format() {
        let turn = ConversationTurn::from_message(&make_msg(true, "bot"));
        assert_eq!(turn.format(), "assistant: hello");
    }
}
