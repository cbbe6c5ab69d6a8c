//! LLM side of rx-guard.
//!
//! Prompts, tolerant parsing of model output, medicine-name extraction from
//! prescription text, and a chat-completions client that plugs into the
//! core engine as its cross-reactivity oracle.

pub mod client;
pub mod extraction;
pub mod prompts;

pub use client::*;
pub use extraction::*;
pub use prompts::*;

use thiserror::Error;

/// Errors of the LLM layer.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("LLM inference error: {0}")]
    Inference(String),

    #[error("LLM endpoint returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("{0} is not set")]
    MissingApiKey(&'static str),
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;
