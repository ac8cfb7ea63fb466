//! Language-model provider implementations
//!
//! Concrete implementations of the AIProvider trait for the hosted
//! completion APIs the companion talks to.

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAIProvider;

use std::time::Duration;

use reqwest::{Client, Response};

use crate::ProviderError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

fn http_client() -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::Config(format!("failed to create HTTP client: {e}")))
}

fn join_endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

fn required_env(var: &str) -> Result<String, ProviderError> {
    std::env::var(var).map_err(|_| ProviderError::Config(format!("{var} must be set")))
}

/// Turn a non-2xx response into `HttpStatus`, passing successes through.
async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unable to read body>".to_string());
    Err(ProviderError::HttpStatus {
        status: status.as_u16(),
        body,
    })
}
