//! Chatbot engine - relays Telegram messages to Ollama.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::chatbot::chain::{ChainBuilder, MessageGraph};
use crate::chatbot::context::ContextBuffer;
use crate::chatbot::message::{split_message, ChatMessage, Role, MAX_MESSAGE_CHARS, UNKNOWN_AUTHOR};
use crate::chatbot::ollama::{OllamaClient, CONNECTION_ERROR_PREFIX, UNEXPECTED_ERROR_PREFIX};
use crate::chatbot::trigger::{Decision, TriggerEvaluator};

/// Sent when the trigger word arrives without a question.
pub const MISSING_QUESTION_REPLY: &str = "❌ Пожалуйста, задайте вопрос после обращения!";

/// Sent when an answer could not be delivered.
pub const REPLY_FAILED: &str = "⚠️ Произошла ошибка при обработке запроса.";

/// Outbound side of the chat platform.
pub trait Transport: Send + Sync {
    /// Send text, optionally as a reply. Returns the new message ID.
    fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to_message_id: Option<i64>,
    ) -> impl Future<Output = Result<i64, String>> + Send;

    /// Show the "typing…" indicator.
    fn send_typing(&self, chat_id: i64) -> impl Future<Output = Result<(), String>> + Send;
}

/// Chatbot configuration.
#[derive(Debug, Clone)]
pub struct ChatbotConfig {
    pub bot_user_id: i64,
    pub bot_username: Option<String>,
    pub trigger_word: String,
    pub max_chain_depth: usize,
    pub respond_in_private: bool,
    pub respond_to_mentions: bool,
    /// Messages kept in the reply index.
    pub context_capacity: usize,
}

impl Default for ChatbotConfig {
    fn default() -> Self {
        Self {
            bot_user_id: 0,
            bot_username: None,
            trigger_word: "хуба".to_string(),
            max_chain_depth: 10,
            respond_in_private: false,
            respond_to_mentions: false,
            context_capacity: 5000,
        }
    }
}

/// The chatbot engine.
pub struct ChatbotEngine<T> {
    config: ChatbotConfig,
    trigger: TriggerEvaluator,
    chains: ChainBuilder,
    ollama: OllamaClient,
    telegram: Arc<T>,
    context: Mutex<ContextBuffer>,
}

impl<T: Transport> ChatbotEngine<T> {
    pub fn new(config: ChatbotConfig, telegram: Arc<T>, ollama: OllamaClient) -> Self {
        let mut trigger = TriggerEvaluator::new(&config.trigger_word, config.bot_user_id)
            .with_private_chats(config.respond_in_private);
        if config.respond_to_mentions {
            match config.bot_username {
                Some(ref username) => trigger = trigger.with_mentions(username),
                None => warn!("Mentions enabled but bot username is unknown"),
            }
        }

        Self {
            chains: ChainBuilder::new(config.max_chain_depth),
            context: Mutex::new(ContextBuffer::new(config.context_capacity)),
            config,
            trigger,
            ollama,
            telegram,
        }
    }

    /// Handle an inbound message. `parent` is the replied-to message as
    /// embedded by the platform, if any.
    ///
    /// Never fails: every problem ends up either in the log or as a chat reply.
    pub async fn handle_message(&self, msg: ChatMessage, parent: Option<ChatMessage>, is_private: bool) {
        let parent = {
            let mut ctx = self.context.lock().await;
            if let Some(ref parent) = parent
                && !(parent.is_bot && is_notice(&parent.text))
            {
                ctx.add_if_absent(parent.clone());
            }
            let parent = parent.or_else(|| msg.reply_to.and_then(|id| ctx.message(msg.chat_id, id)));
            ctx.add_message(msg.clone());
            parent
        };

        let question = match self.trigger.evaluate(&msg, parent.as_ref(), is_private) {
            Decision::Ignore => {
                debug!("Ignoring msg {} in chat {}", msg.message_id, msg.chat_id);
                return;
            }
            Decision::MissingQuestion => {
                info!("Empty question from {} in chat {}", msg.username, msg.chat_id);
                self.send_reply(&msg, MISSING_QUESTION_REPLY).await;
                return;
            }
            Decision::Respond(question) => question,
        };

        let preview: String = question.chars().take(100).collect();
        info!("Question from {} in chat {}: \"{}\"", msg.username, msg.chat_id, preview);

        self.telegram.send_typing(msg.chat_id).await.ok();

        let mut turns = {
            let ctx = self.context.lock().await;
            self.chains.build(&*ctx, &msg)
        };
        for turn in turns.iter_mut().filter(|t| t.role == Role::User) {
            turn.content = self.trigger.question_text(&turn.content).to_string();
        }
        // The newest turn is the question itself.
        if let Some(last) = turns.last_mut() {
            last.content = question.clone();
        }
        let context = (turns.len() > 1).then_some(turns.as_slice());
        debug!("Context: {} turns", context.map_or(0, <[_]>::len));

        match self.ollama.generate(&question, context).await {
            Ok(answer) => self.answer(&msg, &answer).await,
            // Error texts stay out of the reply index so they never become context.
            Err(e) => {
                error!("Ollama request failed: {e}");
                self.send_reply(&msg, &e.user_message()).await;
            }
        }
    }

    /// Apply an edit to a message we may later walk through.
    pub async fn handle_edit(&self, chat_id: i64, message_id: i64, new_text: &str) {
        self.context.lock().await.edit_message(chat_id, message_id, new_text);
    }

    /// Deliver a model answer and remember every part as a bot message
    /// carrying the whole answer.
    async fn answer(&self, msg: &ChatMessage, text: &str) {
        let Some(sent_ids) = self.send_reply(msg, text).await else {
            return;
        };
        let username = self
            .config
            .bot_username
            .clone()
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        let mut ctx = self.context.lock().await;
        for sent_id in sent_ids {
            ctx.add_message(ChatMessage {
                message_id: sent_id,
                chat_id: msg.chat_id,
                user_id: self.config.bot_user_id,
                username: username.clone(),
                text: text.to_string(),
                reply_to: Some(msg.message_id),
                is_bot: true,
            });
        }
    }

    /// Send `text` as a reply to `msg`, split to the message size limit.
    ///
    /// Returns the IDs of the sent parts. If a part is rejected, the user gets
    /// [`REPLY_FAILED`] instead and `None` is returned.
    async fn send_reply(&self, msg: &ChatMessage, text: &str) -> Option<Vec<i64>> {
        let mut sent_ids = Vec::new();
        for part in split_message(text, MAX_MESSAGE_CHARS) {
            match self.telegram.send_message(msg.chat_id, &part, Some(msg.message_id)).await {
                Ok(id) => sent_ids.push(id),
                Err(e) => {
                    warn!("Reply to msg {} not delivered: {}", msg.message_id, e);
                    if let Err(e) = self
                        .telegram
                        .send_message(msg.chat_id, REPLY_FAILED, Some(msg.message_id))
                        .await
                    {
                        error!("Error notice for msg {} not delivered: {}", msg.message_id, e);
                    }
                    return None;
                }
            }
        }
        info!("Replied to msg {} in chat {} (msgs {:?})", msg.message_id, msg.chat_id, sent_ids);
        Some(sent_ids)
    }
}

/// Error and hint texts the engine sends on its own behalf.
fn is_notice(text: &str) -> bool {
    text == MISSING_QUESTION_REPLY
        || text == REPLY_FAILED
        || text.starts_with(CONNECTION_ERROR_PREFIX)
        || text.starts_with(UNEXPECTED_ERROR_PREFIX)
}
