//! Reply index: recent messages kept for walking reply chains.
//!
//! Telegram embeds only the direct parent of a reply, so anything deeper
//! has to come from messages we have already seen. Memory only; the oldest
//! entries are evicted once the buffer is full.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::chatbot::chain::MessageGraph;
use crate::chatbot::message::ChatMessage;

type Key = (i64, i64);

/// Bounded buffer of recent messages, indexed by (chat, message) ID.
pub struct ContextBuffer {
    messages: HashMap<Key, ChatMessage>,
    order: VecDeque<Key>,
    capacity: usize,
}

impl ContextBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Add a message, replacing any earlier copy with the same ID.
    pub fn add_message(&mut self, msg: ChatMessage) {
        let key = (msg.chat_id, msg.message_id);
        if self.messages.insert(key, msg).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.messages.remove(&old);
                debug!("Evicted message {} in chat {}", old.1, old.0);
            }
        }
    }

    /// Add a message only if it isn't known yet.
    ///
    /// Used for parents embedded in replies, which Telegram sends without
    /// their own parent link.
    pub fn add_if_absent(&mut self, msg: ChatMessage) {
        if !self.messages.contains_key(&(msg.chat_id, msg.message_id)) {
            self.add_message(msg);
        }
    }

    /// Edit a message by ID.
    pub fn edit_message(&mut self, chat_id: i64, message_id: i64, new_text: &str) {
        if let Some(msg) = self.messages.get_mut(&(chat_id, message_id)) {
            msg.text = new_text.to_string();
        }
    }

    /// Get a message by ID.
    pub fn get_message(&self, chat_id: i64, message_id: i64) -> Option<&ChatMessage> {
        self.messages.get(&(chat_id, message_id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl MessageGraph for ContextBuffer {
    fn message(&self, chat_id: i64, message_id: i64) -> Option<ChatMessage> {
        self.get_message(chat_id, message_id).cloned()
    }
}
