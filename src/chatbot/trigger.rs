//! Decides whether an incoming message should get a reply.

use crate::chatbot::message::ChatMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Not addressed to the bot.
    Ignore,
    /// Addressed to the bot, but nothing was asked. The caller may prompt
    /// the user for a question; no inference is run.
    MissingQuestion,
    /// Reply with the given question.
    Respond(String),
}

#[derive(Debug, Clone)]
pub struct TriggerEvaluator {
    trigger_word: String,
    bot_user_id: i64,
    /// Lowercased `@handle` of the bot, if mentions are enabled.
    mention: Option<String>,
    respond_in_private: bool,
}

impl TriggerEvaluator {
    pub fn new(trigger_word: &str, bot_user_id: i64) -> Self {
        Self {
            trigger_word: trigger_word.trim().to_string(),
            bot_user_id,
            mention: None,
            respond_in_private: false,
        }
    }

    /// Also answer messages that mention `@bot_username`.
    pub fn with_mentions(mut self, bot_username: &str) -> Self {
        let handle = bot_username.trim_start_matches('@').to_lowercase();
        if !handle.is_empty() {
            self.mention = Some(format!("@{handle}"));
        }
        self
    }

    /// Answer every text message in private chats.
    pub fn with_private_chats(mut self, enabled: bool) -> Self {
        self.respond_in_private = enabled;
        self
    }

    /// Message text as a question: trimmed, trigger word removed if present.
    pub fn question_text<'a>(&self, text: &'a str) -> &'a str {
        let text = text.trim();
        strip_prefix_ci(text, &self.trigger_word).map_or(text, str::trim)
    }

    pub fn evaluate(
        &self,
        msg: &ChatMessage,
        parent: Option<&ChatMessage>,
        is_private: bool,
    ) -> Decision {
        let text = msg.text.trim();

        if let Some(rest) = strip_prefix_ci(text, &self.trigger_word) {
            let question = rest.trim();
            return if question.is_empty() {
                Decision::MissingQuestion
            } else {
                Decision::Respond(question.to_string())
            };
        }

        let replies_to_bot = parent.is_some_and(|p| p.is_bot || p.user_id == self.bot_user_id);
        if replies_to_bot {
            // Stickers and uncaptioned media arrive with no text.
            return if text.is_empty() {
                Decision::Ignore
            } else {
                Decision::Respond(text.to_string())
            };
        }

        if let Some(ref mention) = self.mention
            && let Some(question) = after_last_mention(text, mention)
        {
            return if question.is_empty() {
                Decision::MissingQuestion
            } else {
                Decision::Respond(question.to_string())
            };
        }

        if is_private && self.respond_in_private && !text.is_empty() {
            return Decision::Respond(text.to_string());
        }

        Decision::Ignore
    }
}

/// Case-insensitive `strip_prefix`, comparing per char so multi-byte
/// lowercase mappings don't shift offsets.
fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    let mut chars = text.char_indices();
    for p in prefix.chars() {
        let (_, c) = chars.next()?;
        if !c.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
    }
    let end = chars.next().map(|(i, _)| i).unwrap_or(text.len());
    Some(&text[end..])
}

/// Text after the last case-insensitive occurrence of `mention`, trimmed.
fn after_last_mention<'a>(text: &'a str, mention: &str) -> Option<&'a str> {
    let mut found = None;
    for (i, _) in text.char_indices() {
        if let Some(rest) = strip_prefix_ci(&text[i..], mention) {
            found = Some(rest);
        }
    }
    found.map(str::trim)
}
