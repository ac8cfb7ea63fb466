use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sanctum_context::{
    cache_from_env, summarizer::default_summary_model, ContextManager, ContextWindow, Message,
    ProviderSummarizer,
};
use sanctum_runtime::{provider_from_env, AIProvider};
use thiserror::Error;

pub fn crate_name() -> &'static str {
    "sanctum-cli"
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "sanctum",
    version,
    about = "Sanctum conversation context tools",
    long_about = "Inspect and manage the conversation context the companion sends to the model: \
                  windowing, cached summaries, and cache clearing"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "SANCTUM_SUMMARY_PROVIDER",
        default_value = "anthropic",
        help = "Provider used for summaries (anthropic or openai)"
    )]
    pub provider: String,
    #[arg(
        long,
        global = true,
        env = "SANCTUM_SUMMARY_MODEL",
        help = "Small, fast model used for summaries [default: per provider]"
    )]
    pub summary_model: Option<String>,
    #[arg(long, global = true, help = "Token limit for generated summaries")]
    pub summary_max_tokens: Option<u32>,
    #[arg(long, global = true, help = "Sampling temperature for summaries")]
    pub summary_temperature: Option<f32>,
    #[arg(long, global = true, help = "Override the trailing window size")]
    pub window: Option<usize>,
    #[arg(long, global = true, help = "Override the summarization threshold")]
    pub threshold: Option<usize>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Print the context that would be sent for a session")]
    Context {
        #[arg(long, help = "Session ID")]
        session: String,
        #[arg(long, help = "JSON file with the session's messages, oldest first")]
        transcript: PathBuf,
    },
    #[command(about = "Clear a session's cached summary")]
    Clear {
        #[arg(long, help = "Session ID")]
        session: String,
    },
    #[command(about = "Summarize a whole transcript without touching the cache")]
    Summarize {
        #[arg(long, help = "JSON file with messages, oldest first")]
        transcript: PathBuf,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("failed to read transcript {}: {}", .path.display(), .source)]
    TranscriptRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("transcript {} is not a JSON message array: {}", .path.display(), .source)]
    TranscriptDecode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Read a JSON array of messages
pub fn load_transcript(path: &Path) -> Result<Vec<Message>, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::TranscriptRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CliError::TranscriptDecode {
        path: path.to_path_buf(),
        source,
    })
}

impl Cli {
    /// Environment policy with any flag overrides applied
    pub fn context_window(&self) -> anyhow::Result<ContextWindow> {
        let base = ContextWindow::from_env()?;
        if self.window.is_none() && self.threshold.is_none() {
            return Ok(base);
        }
        let window_size = self.window.unwrap_or(base.window_size);
        let threshold = self.threshold.unwrap_or(window_size.max(base.summary_threshold));
        Ok(ContextWindow::new(window_size, threshold)
            .map_err(|e| CliError::InvalidArgument(e.to_string()))?
            .with_ttl(base.ttl)
            .with_collaborator_timeout(base.collaborator_timeout))
    }

    /// The `--summary-model` flag, or the provider's small model
    pub fn summary_model(&self) -> String {
        self.summary_model
            .clone()
            .unwrap_or_else(|| default_summary_model(&self.provider).to_string())
    }

    pub fn summarizer(&self) -> anyhow::Result<ProviderSummarizer> {
        let provider = provider_from_env(&self.provider)?;
        Ok(self.summarizer_with(Arc::from(provider)))
    }

    pub fn summarizer_with(&self, provider: Arc<dyn AIProvider>) -> ProviderSummarizer {
        let mut summarizer = ProviderSummarizer::new(provider).with_model(self.summary_model());
        if let Some(max_tokens) = self.summary_max_tokens {
            summarizer = summarizer.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.summary_temperature {
            summarizer = summarizer.with_temperature(temperature);
        }
        summarizer
    }

    pub async fn manager(&self) -> anyhow::Result<ContextManager> {
        let cache = cache_from_env().await?;
        Ok(ContextManager::new(
            cache,
            Arc::new(self.summarizer()?),
            self.context_window()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use sanctum_context::{Summarizer, FALLBACK_SUMMARY};
    use sanctum_runtime::OpenAIProvider;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn parses_context_command_with_overrides() {
        let cli = Cli::try_parse_from([
            "sanctum",
            "--window",
            "10",
            "--provider",
            "openai",
            "context",
            "--session",
            "abc",
            "--transcript",
            "chat.json",
        ])
        .unwrap();

        assert_eq!(cli.provider, "openai");
        assert_eq!(cli.window, Some(10));
        match cli.command {
            Commands::Context {
                session,
                transcript,
            } => {
                assert_eq!(session, "abc");
                assert_eq!(transcript, PathBuf::from("chat.json"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    fn openai_summarize_cli(extra: &[&str]) -> Cli {
        let mut args = vec!["sanctum", "--provider", "openai"];
        args.extend_from_slice(extra);
        args.extend_from_slice(&["summarize", "--transcript", "chat.json"]);
        Cli::try_parse_from(args).unwrap()
    }

    fn transcript() -> Vec<Message> {
        vec![
            Message::user("I lit a candle for my grandmother."),
            Message::assistant("That is a tender way to remember her."),
        ]
    }

    #[test]
    fn summary_model_defaults_per_provider() {
        let anthropic = Cli::try_parse_from(["sanctum", "clear", "--session", "s"]).unwrap();
        assert_eq!(anthropic.summary_model(), "claude-3-5-haiku-20241022");

        assert_eq!(openai_summarize_cli(&[]).summary_model(), "gpt-4o-mini");

        let pinned = openai_summarize_cli(&["--summary-model", "gpt-4.1-nano"]);
        assert_eq!(pinned.summary_model(), "gpt-4.1-nano");
    }

    #[tokio::test]
    async fn openai_summary_requests_openai_model() {
        let server = MockServer::start_async().await;
        let completion = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .body_includes(r#""model":"gpt-4o-mini""#)
                    .body_includes(r#""max_tokens":80"#);
                then.status(200).json_body(json!({
                    "model": "gpt-4o-mini",
                    "choices": [{
                        "message": { "role": "assistant", "content": "The user honored a loss." },
                        "finish_reason": "stop"
                    }]
                }));
            })
            .await;
        let provider = OpenAIProvider::new("key", server.base_url(), "gpt-4o").unwrap();
        let cli = openai_summarize_cli(&[
            "--summary-max-tokens",
            "80",
            "--summary-temperature",
            "0.2",
        ]);

        let summary = cli
            .summarizer_with(Arc::new(provider))
            .summarize(&transcript())
            .await
            .unwrap();

        completion.assert_async().await;
        assert_eq!(summary, "The user honored a loss.");
    }

    #[tokio::test]
    async fn provider_failure_prints_fallback_summary() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(503).body("overloaded");
            })
            .await;
        let provider = OpenAIProvider::new("key", server.base_url(), "gpt-4o").unwrap();
        let cli = openai_summarize_cli(&[]);

        let summary = cli
            .summarizer_with(Arc::new(provider))
            .summarize_or_fallback(&transcript())
            .await;

        assert_eq!(summary, FALLBACK_SUMMARY);
    }

    #[test]
    fn clear_requires_session() {
        assert!(Cli::try_parse_from(["sanctum", "clear"]).is_err());
    }

    #[test]
    fn loads_transcript_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"role":"user","content":"Is Mercury retrograde?"}},
                {{"role":"assistant","content":"It is, until the 15th.",
                  "created_at":"2024-04-01T10:00:00Z"}}]"#
        )
        .unwrap();

        let messages = load_transcript(file.path()).unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::user("Is Mercury retrograde?"));
        assert_eq!(
            messages[1],
            Message::assistant("It is, until the 15th.")
                .with_created_at("2024-04-01T10:00:00Z".parse().unwrap())
        );
    }

    #[test]
    fn rejects_malformed_transcript() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"role":"user"}}"#).unwrap();

        let err = load_transcript(file.path()).unwrap_err();

        assert!(matches!(err, CliError::TranscriptDecode { .. }));
    }

    #[test]
    fn missing_transcript_is_read_error() {
        let err = load_transcript(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, CliError::TranscriptRead { .. }));
    }
}
