//! Telegram client using teloxide.

use teloxide::prelude::*;
use teloxide::types::{ChatAction, MessageId, ReplyParameters};
use tracing::{debug, warn};

use crate::chatbot::engine::Transport;
use crate::chatbot::message::{display_name, ChatMessage};

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl Transport for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to_message_id: Option<i64>,
    ) -> Result<i64, String> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);

        if let Some(msg_id) = reply_to_message_id {
            let reply_params = ReplyParameters::new(MessageId(msg_id as i32));
            request = request.reply_parameters(reply_params);
        }

        request.await.map(|msg| msg.id.0 as i64).map_err(|e| {
            let msg = format!("Failed to send: {e}");
            warn!("{}", msg);
            msg
        })
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), String> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send typing: {e}");
                warn!("{}", msg);
                msg
            })
    }
}

/// Convert a teloxide message. Captions count as text.
pub fn to_chat_message(msg: &Message, bot_user_id: i64) -> ChatMessage {
    let user = msg.from.as_ref();
    let user_id = user.map(|u| u.id.0 as i64).unwrap_or(0);
    let username = display_name(
        user.and_then(|u| u.username.as_deref()),
        user.map(|u| u.first_name.as_str()),
    );
    let text = msg.text().or(msg.caption()).unwrap_or("").to_string();

    ChatMessage {
        message_id: msg.id.0 as i64,
        chat_id: msg.chat.id.0,
        user_id,
        username,
        text,
        reply_to: msg.reply_to_message().map(|reply| reply.id.0 as i64),
        is_bot: user_id != 0 && user_id == bot_user_id,
    }
}

/// The embedded parent of a reply, if any.
pub fn parent_message(msg: &Message, bot_user_id: i64) -> Option<ChatMessage> {
    let parent = msg.reply_to_message()?;
    let converted = to_chat_message(parent, bot_user_id);
    debug!(
        "Reply to msg {} by {}{}",
        converted.message_id,
        converted.username,
        if converted.is_bot { " (bot)" } else { "" }
    );
    Some(converted)
}
