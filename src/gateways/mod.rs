//! Clients for the third-party services the API delegates to.
pub mod genai;
pub mod mailer;

use thiserror::Error;

pub use genai::{GeminiClient, TextGenerator};
pub use mailer::{Mailer, SendGridMailer};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Failed to call {provider}: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned error status {status}: {body}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{provider} returned no usable content")]
    EmptyResponse { provider: &'static str },
}
