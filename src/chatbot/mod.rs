//! Chatbot module - relays Telegram messages to a local Ollama model.

pub mod chain;
pub mod context;
pub mod engine;
pub mod message;
pub mod ollama;
pub mod telegram;
pub mod trigger;

#[cfg(test)]
mod testing;

pub use chain::{ChainBuilder, MessageGraph};
pub use engine::{ChatbotConfig, ChatbotEngine, Transport};
pub use message::{ChatMessage, ConversationTurn, Role};
pub use ollama::OllamaClient;
pub use telegram::TelegramClient;
pub use trigger::{Decision, TriggerEvaluator};
