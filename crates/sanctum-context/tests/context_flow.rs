//! End-to-end flows through the context manager with real collaborators

use std::sync::{Arc, Once};
use std::time::Duration;

use sanctum_context::prelude::*;
use sanctum_context::{
    cache_key, CacheStore, InMemoryCache, NoCache, ProviderSummarizer, FALLBACK_SUMMARY,
};
use sanctum_runtime::{MockProvider, ProviderError};

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

fn journal_chat(len: usize) -> Vec<Message> {
    (0..len)
        .map(|i| match i % 2 {
            0 => Message::user(format!("Today's reflection #{i}")),
            _ => Message::assistant(format!("Thank you for sharing #{i}")),
        })
        .collect()
}

struct Harness {
    cache: Arc<InMemoryCache>,
    provider: Arc<MockProvider>,
    manager: ContextManager,
}

fn harness() -> Harness {
    init_tracing();
    let cache = Arc::new(InMemoryCache::new());
    let provider = Arc::new(MockProvider::new());
    let summarizer = Arc::new(ProviderSummarizer::new(provider.clone()));
    let manager = ContextManager::new(cache.clone(), summarizer, ContextWindow::default());
    Harness {
        cache,
        provider,
        manager,
    }
}

async fn stored(cache: &InMemoryCache, session: &str) -> Option<ConversationContext> {
    cache
        .get(&cache_key(session))
        .await
        .unwrap()
        .map(|raw| ConversationContext::decode(&raw).unwrap())
}

#[tokio::test]
async fn first_long_history_summarizes_and_caches() {
    let h = harness();
    h.provider.enqueue_text("The user has been journaling about gratitude.");
    let messages = journal_chat(25);

    let context = h.manager.get_optimized_context("moon-1", &messages).await;

    assert_eq!(context.len(), 21);
    assert_eq!(context[0].role, Role::Assistant);
    assert!(context[0]
        .content
        .starts_with("[Previous conversation summary]: "));
    assert_eq!(context[1..], messages[5..]);

    let record = stored(&h.cache, "moon-1").await.expect("record written");
    assert_eq!(record.message_count, 25);
    assert_eq!(record.messages, messages[5..]);
    assert_eq!(
        record.summary.as_deref(),
        Some("The user has been journaling about gratitude.")
    );

    let requests = h.provider.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].prompt.starts_with("User: Today's reflection #0"));
    assert!(requests[0].prompt.ends_with("User: Today's reflection #4"));
}

#[tokio::test]
async fn repeated_calls_reuse_cached_summary() {
    let h = harness();
    h.provider.enqueue_text("Summary A");
    let messages = journal_chat(25);

    let first = h.manager.resolve_context("s", &messages).await;
    let second = h.manager.resolve_context("s", &messages).await;
    let third = h.manager.resolve_context("s", &messages).await;

    assert_eq!(first.source, ContextSource::Summarized);
    assert_eq!(second.source, ContextSource::FromCache);
    assert_eq!(first.messages, second.messages);
    assert_eq!(second.messages, third.messages);
    assert_eq!(h.provider.requests().len(), 1);
}

#[tokio::test]
async fn cached_summary_lags_growing_conversation() {
    let h = harness();
    h.provider.enqueue_text("Early summary");

    h.manager
        .get_optimized_context("s", &journal_chat(21))
        .await;
    let grown = journal_chat(60);
    let context = h.manager.resolve_context("s", &grown).await;

    assert_eq!(context.source, ContextSource::FromCache);
    assert_eq!(context.summary(), Some("Early summary"));
    assert_eq!(context.messages[1..], grown[40..]);
    assert_eq!(h.provider.requests().len(), 1);
}

#[tokio::test]
async fn clear_forces_fresh_summary() {
    let h = harness();
    h.provider.enqueue_text("Before clear");
    h.provider.enqueue_text("After clear");
    let messages = journal_chat(30);

    h.manager.get_optimized_context("s", &messages).await;
    h.manager.clear_context("s").await;
    assert!(stored(&h.cache, "s").await.is_none());

    let context = h.manager.resolve_context("s", &messages).await;

    assert_eq!(context.source, ContextSource::Summarized);
    assert_eq!(context.summary(), Some("After clear"));
    assert_eq!(h.provider.requests().len(), 2);
}

#[tokio::test]
async fn clear_of_unknown_session_is_silent() {
    let h = harness();
    h.manager.clear_context("never-seen").await;
    assert!(h.cache.is_empty().await);
}

#[tokio::test]
async fn provider_outage_uses_fallback_summary() {
    let h = harness();
    h.provider
        .enqueue_generate(Err(ProviderError::HttpStatus {
            status: 529,
            body: "overloaded".into(),
        }));
    let messages = journal_chat(22);

    let context = h.manager.resolve_context("s", &messages).await;

    assert_eq!(context.source, ContextSource::Summarized);
    assert_eq!(context.summary(), Some(FALLBACK_SUMMARY));
    assert_eq!(context.messages.len(), 21);
    let record = stored(&h.cache, "s").await.unwrap();
    assert_eq!(record.summary.as_deref(), Some(FALLBACK_SUMMARY));
}

#[tokio::test(start_paused = true)]
async fn expired_summary_is_regenerated() {
    let h = harness();
    h.provider.enqueue_text("Day one");
    h.provider.enqueue_text("Day two");
    let messages = journal_chat(24);

    h.manager.get_optimized_context("s", &messages).await;
    tokio::time::advance(Duration::from_secs(24 * 60 * 60)).await;
    let context = h.manager.resolve_context("s", &messages).await;

    assert_eq!(context.source, ContextSource::Summarized);
    assert_eq!(context.summary(), Some("Day two"));
}

#[tokio::test]
async fn sessions_are_isolated() {
    let h = harness();
    h.provider.enqueue_text("Alpha summary");
    h.manager
        .get_optimized_context("alpha", &journal_chat(21))
        .await;

    let beta = journal_chat(12);
    let context = h.manager.resolve_context("beta", &beta).await;

    assert_eq!(context.source, ContextSource::Passthrough);
    assert_eq!(context.messages, beta);
}

#[tokio::test]
async fn concurrent_first_turns_leave_one_record() {
    let h = harness();
    h.provider.enqueue_text("Racer one");
    h.provider.enqueue_text("Racer two");
    let messages = journal_chat(26);

    let (a, b) = tokio::join!(
        h.manager.resolve_context("s", &messages),
        h.manager.resolve_context("s", &messages)
    );

    assert_eq!(a.messages[1..], b.messages[1..]);
    let record = stored(&h.cache, "s").await.unwrap();
    let winner = record.summary.unwrap();
    assert!(winner == "Racer one" || winner == "Racer two");
}

#[tokio::test]
async fn no_cache_never_summarizes() {
    init_tracing();
    let provider = Arc::new(MockProvider::new());
    let manager = ContextManager::new(
        Arc::new(NoCache),
        Arc::new(ProviderSummarizer::new(provider.clone())),
        ContextWindow::default(),
    );
    let messages = journal_chat(45);

    let context = manager.resolve_context("s", &messages).await;
    manager.clear_context("s").await;

    assert_eq!(context.source, ContextSource::Uncached);
    assert_eq!(context.messages, messages[25..]);
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn custom_window_is_respected() {
    init_tracing();
    let cache = Arc::new(InMemoryCache::new());
    let provider = Arc::new(MockProvider::new());
    provider.enqueue_text("Compact");
    let manager = ContextManager::new(
        cache,
        Arc::new(ProviderSummarizer::new(provider)),
        ContextWindow::new(4, 6).unwrap(),
    );
    let messages = journal_chat(7);

    let context = manager.resolve_context("s", &messages).await;

    assert_eq!(context.source, ContextSource::Summarized);
    assert_eq!(context.messages.len(), 5);
    assert_eq!(context.messages[1..], messages[3..]);
}
