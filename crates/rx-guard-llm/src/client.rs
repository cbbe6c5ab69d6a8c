//! Chat-completions clients and the LLM-backed cross-reactivity oracle.

use rx_guard_core::oracle::{CrossReactivityOracle, CrossReactivityRequest, OracleError};

use crate::prompts::{make_cross_reactivity_prompt, CROSS_REACTIVITY_SYSTEM_PROMPT};
use crate::{ExtractionError, ExtractionResult};

pub const API_KEY_ENV: &str = "GROQ_API_KEY";
pub const BASE_URL_ENV: &str = "RX_GUARD_LLM_BASE_URL";
pub const MODEL_ENV: &str = "RX_GUARD_LLM_MODEL";

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Low temperature keeps clinical answers stable.
pub const TEMPERATURE: f32 = 0.1;
pub const MAX_TOKENS: u32 = 2048;

/// A single-turn chat completion: system prompt plus user prompt in, text out.
pub trait ChatCompletion: Send + Sync {
    fn complete(&self, system: &str, user: &str) -> ExtractionResult<String>;
}

/// Cross-reactivity oracle that asks a chat model.
///
/// Hands the raw reply to the engine, which does the parsing.
pub struct ChatOracle<C: ChatCompletion> {
    client: C,
}

impl<C: ChatCompletion> ChatOracle<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: ChatCompletion> CrossReactivityOracle for ChatOracle<C> {
    fn assess(&self, request: &CrossReactivityRequest) -> Result<String, OracleError> {
        let prompt = make_cross_reactivity_prompt(request);
        self.client
            .complete(CROSS_REACTIVITY_SYSTEM_PROMPT, &prompt)
            .map_err(|e| match e {
                ExtractionError::MissingApiKey(_) => OracleError::Unavailable(e.to_string()),
                other => OracleError::Transport(other.to_string()),
            })
    }
}

#[cfg(feature = "remote")]
pub use remote::GroqClient;

#[cfg(feature = "remote")]
mod remote {
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    use super::*;

    const REQUEST_TIMEOUT_SECS: u64 = 60;

    /// OpenAI-compatible chat-completions client (Groq by default).
    pub struct GroqClient {
        base_url: String,
        api_key: String,
        model: String,
        client: reqwest::blocking::Client,
    }

    impl GroqClient {
        pub fn new(base_url: &str, api_key: &str, model: &str) -> ExtractionResult<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .map_err(|e| ExtractionError::Inference(e.to_string()))?;

            Ok(Self {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: api_key.to_string(),
                model: model.to_string(),
                client,
            })
        }

        /// Configure from `GROQ_API_KEY`, `RX_GUARD_LLM_BASE_URL` and
        /// `RX_GUARD_LLM_MODEL` (a `.env` file is honored).
        pub fn from_env() -> ExtractionResult<Self> {
            dotenvy::dotenv().ok();

            let api_key = std::env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty())
                .ok_or(ExtractionError::MissingApiKey(API_KEY_ENV))?;
            let base_url =
                std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
            let model = std::env::var(MODEL_ENV).unwrap_or_else(|_| DEFAULT_MODEL.to_string());

            Self::new(&base_url, &api_key, &model)
        }

        pub fn model(&self) -> &str {
            &self.model
        }
    }

    #[derive(Serialize)]
    struct ChatRequest<'a> {
        model: &'a str,
        messages: [ChatMessage<'a>; 2],
        temperature: f32,
        max_tokens: u32,
    }

    #[derive(Serialize)]
    struct ChatMessage<'a> {
        role: &'a str,
        content: &'a str,
    }

    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Vec<ChatChoice>,
    }

    #[derive(Deserialize)]
    struct ChatChoice {
        message: ChatReply,
    }

    #[derive(Deserialize)]
    struct ChatReply {
        content: Option<String>,
    }

    impl ChatCompletion for GroqClient {
        fn complete(&self, system: &str, user: &str) -> ExtractionResult<String> {
            let url = format!("{}/chat/completions", self.base_url);
            let body = ChatRequest {
                model: &self.model,
                messages: [
                    ChatMessage { role: "system", content: system },
                    ChatMessage { role: "user", content: user },
                ],
                temperature: TEMPERATURE,
                max_tokens: MAX_TOKENS,
            };

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .map_err(|e| {
                    if e.is_timeout() {
                        ExtractionError::Inference(format!(
                            "Request timed out after {}s",
                            REQUEST_TIMEOUT_SECS
                        ))
                    } else {
                        ExtractionError::Inference(e.to_string())
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().unwrap_or_default();
                return Err(ExtractionError::Http {
                    status: status.as_u16(),
                    body,
                });
            }

            let parsed: ChatResponse = response
                .json()
                .map_err(|e| ExtractionError::InvalidFormat(e.to_string()))?;

            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| ExtractionError::InvalidFormat("No completion in response".into()))
        }
    }
}
