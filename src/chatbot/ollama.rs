//! Ollama chat client.
//!
//! Sends one non-streaming `/api/chat` request per question and strips the
//! model's `<think>` blocks from the answer.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::chatbot::message::ConversationTurn;

/// Shown when the model produced nothing but reasoning.
pub const FALLBACK_REPLY: &str = "Извините, не удалось сгенерировать ответ.";

/// Prefix of the reply sent when Ollama can't be reached.
pub const CONNECTION_ERROR_PREFIX: &str = "❌ Ошибка соединения с Ollama";

/// Prefix of the reply sent for any other failure.
pub const UNEXPECTED_ERROR_PREFIX: &str = "❌ Неожиданная ошибка";

const CONTEXT_INSTRUCTION: &str = "Выше приведена переписка. Продолжи диалог: напиши следующее сообщение от лица assistant, отвечая на последнее сообщение user.";

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

pub struct OllamaClient {
    endpoint: String,
    model: String,
    system_prompt: String,
    http: reqwest::Client,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
    pub stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaClient {
    pub fn new(
        endpoint: &str,
        model: &str,
        system_prompt: &str,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        info!("Ollama client ready: {} (model {})", endpoint, model);
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
            http,
        })
    }

    /// Build the request body for a question, with optional dialogue context.
    pub fn build_request(&self, question: &str, context: Option<&[ConversationTurn]>) -> ChatRequest {
        let user_content = match context {
            Some(turns) if !turns.is_empty() => context_prompt(turns),
            _ => question.to_string(),
        };

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ApiMessage {
                    role: "system".to_string(),
                    content: self.system_prompt.clone(),
                },
                ApiMessage {
                    role: "user".to_string(),
                    content: user_content,
                },
            ],
            stream: false,
        }
    }

    /// Ask the model and return its sanitized answer.
    pub async fn generate(
        &self,
        question: &str,
        context: Option<&[ConversationTurn]>,
    ) -> Result<String, Error> {
        let request = self.build_request(question, context);
        let url = format!("{}/api/chat", self.endpoint);
        info!(
            "Sending request to {} (model {}, {} context turns)",
            url,
            self.model,
            context.map_or(0, <[_]>::len)
        );

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status(format!("{status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| Error::Parse(e.to_string()))?;

        Ok(sanitize(&parsed.message.content))
    }

    /// Like [`generate`](Self::generate), but never fails: errors become the
    /// text the user sees.
    pub async fn generate_response(
        &self,
        question: &str,
        context: Option<&[ConversationTurn]>,
    ) -> String {
        match self.generate(question, context).await {
            Ok(text) => text,
            Err(e) => {
                error!("Ollama request failed: {e}");
                e.user_message()
            }
        }
    }
}

fn context_prompt(turns: &[ConversationTurn]) -> String {
    let transcript = turns
        .iter()
        .map(ConversationTurn::format)
        .collect::<Vec<_>>()
        .join("\n");
    format!("<context>\n{transcript}\n</context>\n\n{CONTEXT_INSTRUCTION}")
}

/// Strip `<think>` blocks, collapse the blank lines they leave behind and
/// trim. Falls back to [`FALLBACK_REPLY`] when nothing is left.
pub fn sanitize(raw: &str) -> String {
    let mut text = raw.to_string();
    // Removing one block can splice a new one together from the leftovers.
    while THINK_BLOCK.is_match(&text) {
        text = THINK_BLOCK.replace_all(&text, "").into_owned();
    }
    let text = BLANK_LINES.replace_all(&text, "\n");
    let text = text.trim();
    if text.is_empty() {
        FALLBACK_REPLY.to_string()
    } else {
        text.to_string()
    }
}

#[derive(Debug)]
pub enum Error {
    /// Connection refused, DNS failure, timeout.
    Http(String),
    /// Non-2xx response.
    Status(String),
    /// Body didn't match `{message: {content}}`.
    Parse(String),
}

impl Error {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Status(_))
    }

    /// Short text for the chat.
    pub fn user_message(&self) -> String {
        match self {
            Error::Http(e) | Error::Status(e) => format!("{CONNECTION_ERROR_PREFIX}: {e}"),
            Error::Parse(e) => format!("{UNEXPECTED_ERROR_PREFIX}: {e}"),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Status(e) => write!(f, "API error: {e}"),
            Error::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for Error {}
