//! Telegram bot that answers questions with a locally hosted Ollama model.

pub mod chatbot;
pub mod config;
pub mod telegram_log;
