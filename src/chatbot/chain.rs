//! Reconstructs the dialogue leading up to a message by following reply links.

use crate::chatbot::message::{ChatMessage, ConversationTurn};

/// Read-only view of the platform's reply graph.
pub trait MessageGraph {
    fn message(&self, chat_id: i64, message_id: i64) -> Option<ChatMessage>;
}

#[derive(Debug, Clone, Copy)]
pub struct ChainBuilder {
    max_depth: usize,
}

impl ChainBuilder {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Walk backwards from `start` and return the turns oldest-first.
    ///
    /// The walk follows a parent only while the link stays in the bot's
    /// thread (one side of it is bot-authored) and stops at `max_depth`
    /// messages or at the first parent the graph doesn't know.
    pub fn build(&self, graph: &impl MessageGraph, start: &ChatMessage) -> Vec<ConversationTurn> {
        let mut turns = Vec::new();
        let mut current = start.clone();

        while turns.len() < self.max_depth {
            turns.push(ConversationTurn::from_message(&current));

            let Some(parent_id) = current.reply_to else {
                break;
            };
            let Some(parent) = graph.message(current.chat_id, parent_id) else {
                break;
            };
            if !(parent.is_bot || current.is_bot) {
                break;
            }
            current = parent;
        }

        turns.reverse();
        turns
    }
}
