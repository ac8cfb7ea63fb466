//! Sanctum CLI entry point

use clap::Parser;
use sanctum_cli::{load_transcript, Cli, Commands};
use sanctum_context::summarizer::render_transcript;
use sanctum_context::Summarizer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "sanctum=info,sanctum_context=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    tracing::debug!(
        command = ?cli.command,
        "starting {} v{}",
        sanctum_cli::crate_name(),
        env!("CARGO_PKG_VERSION")
    );

    match &cli.command {
        Commands::Context {
            session,
            transcript,
        } => {
            let messages = load_transcript(transcript)?;
            let manager = cli.manager().await?;
            let resolved = manager.resolve_context(session, &messages).await;
            tracing::info!(
                session_id = %session,
                source = resolved.source.as_str(),
                window = manager.window().window_size,
                sent = resolved.messages.len(),
                of = messages.len(),
                "context resolved"
            );
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
        Commands::Clear { session } => {
            let manager = cli.manager().await?;
            manager.clear_context(session).await;
            println!("cleared context for session {session}");
        }
        Commands::Summarize { transcript } => {
            let messages = load_transcript(transcript)?;
            tracing::debug!(transcript = %render_transcript(&messages), "summarizing");
            let summary = cli.summarizer()?.summarize_or_fallback(&messages).await;
            println!("{summary}");
        }
    }

    Ok(())
}
