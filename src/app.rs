use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::aggregate::{summarize, ThreadCounts, ThreadFilter, ThreadObserver};
use crate::classifier::{FsAssets, LogisticBackend, SpamClassifier};
use crate::cli::{Cli, Command};
use crate::config::AppDefaults;
use crate::notify::TracingNotifier;
use crate::scorer::{BatchScorer, RunReport, ScorerHandle};
use crate::storage::{Database, MessageStore};
use crate::types::{is_spam, Message, ScoreResult};

pub async fn run(cli: Cli) -> Result<()> {
    let defaults = AppDefaults::load()?;
    let db = Arc::new(match &cli.db {
        Some(path) => Database::open(path).await?,
        None => Database::new_default().await?,
    });
    info!(path = %db.path().display(), "Using SQLite store");

    let assets_dir = cli.assets.clone().unwrap_or_else(|| defaults.assets_dir.clone());
    let classifier = Arc::new(SpamClassifier::new(
        Arc::new(FsAssets::new(assets_dir)),
        Arc::new(LogisticBackend),
        defaults.max_sequence_length,
    ));
    let scorer = Arc::new(BatchScorer::new(
        db.clone(),
        classifier.clone(),
        Arc::new(TracingNotifier),
        defaults.scorer.clone(),
    ));

    match cli.command {
        Command::Import { file, no_notify } => import(&db, &scorer, &file, !no_notify).await,
        Command::Score => {
            print_report(scorer.run(false).await);
            Ok(())
        }
        Command::Threads { filter, limit } => print_threads(&db, filter.into(), limit).await,
        Command::Classify { text } => classify(&classifier, &text).await,
        Command::Show { conversation } => show(&db, conversation).await,
        Command::Delete { conversations } => {
            let removed = db.delete_conversations(&conversations).await?;
            println!("Deleted {} messages", removed);
            Ok(())
        }
        Command::Watch { interval } => watch(db, scorer, Duration::from_secs(interval.max(1))).await,
    }
}

async fn import(db: &Database, scorer: &BatchScorer, file: &Path, notify: bool) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let messages: Vec<Message> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing messages from {}", file.display()))?;

    let inserted = db.insert_messages(&messages).await?;
    info!(total = messages.len(), inserted, "Imported messages");

    if inserted > 0 {
        print_report(scorer.run(notify).await);
    }
    Ok(())
}

async fn classify(classifier: &SpamClassifier, text: &str) -> Result<()> {
    classifier
        .initialize()
        .await
        .context("loading spam classifier")?;

    match classifier.classify(text).await {
        ScoreResult::Scored(score) => {
            let verdict = if is_spam(Some(score)) { "spam" } else { "normal" };
            println!("{:.4} {}", score, verdict);
        }
        ScoreResult::NotReady => println!("classifier not ready"),
        ScoreResult::Failed(e) => println!("classification failed: {}", e),
    }
    Ok(())
}

async fn print_threads(db: &Database, filter: ThreadFilter, limit: usize) -> Result<()> {
    let messages = db.load_all().await?;
    let views = summarize(&messages);

    println!("\n{}", "=".repeat(80));
    println!("{}", format_counts(&views.counts()));
    println!("{}\n", "=".repeat(80));

    let threads = views.filtered(filter);
    if threads.is_empty() {
        println!("No conversations\n");
    }

    for thread in threads.into_iter().take(limit) {
        let marker = if thread.is_spam_conversation { "SPAM" } else { "    " };
        let unread = if thread.unread_count > 0 {
            format!(" ({} unread)", thread.unread_count)
        } else {
            String::new()
        };
        println!(
            "[{}] [{}] #{} {}{}",
            marker,
            format_timestamp(thread.last_message_timestamp),
            thread.conversation_id,
            thread.peer_address,
            unread
        );
        println!("   {} messages | {}", thread.message_count, preview(&thread.last_message_body));
        println!();
    }

    println!("{}", "=".repeat(80));
    Ok(())
}

async fn show(db: &Database, conversation_id: i64) -> Result<()> {
    let messages = db.conversation_messages(conversation_id).await?;
    if messages.is_empty() {
        println!("Conversation {} not found", conversation_id);
        return Ok(());
    }

    for message in &messages {
        let score = message
            .spam_score
            .map(|s| format!("{:.2}", s))
            .unwrap_or_else(|| "-".to_string());
        let status = if message.read { "R" } else { "U" };
        println!(
            "[{}] [{}] [{}] {}: {}",
            format_timestamp(message.timestamp),
            status,
            score,
            message.address,
            message.body
        );
    }

    db.mark_conversation_read(conversation_id).await?;
    Ok(())
}

async fn watch(db: Arc<Database>, scorer: Arc<BatchScorer>, interval: Duration) -> Result<()> {
    let handle = ScorerHandle::new(scorer);
    handle.request_startup();

    let observer = ThreadObserver::spawn(db.subscribe());
    let mut views = observer.subscribe();
    let mut last_counts = views.borrow_and_update().counts();
    println!("{}", format_counts(&last_counts));

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Stopping");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = db.refresh().await {
                    warn!(error = %e, "Refreshing message snapshot failed");
                    continue;
                }
                match db.unscored_count().await {
                    Ok(0) => {}
                    Ok(_) => {
                        handle.message_received(true);
                    }
                    Err(e) => warn!(error = %e, "Counting unscored messages failed"),
                }
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let counts = views.borrow_and_update().counts();
                if counts != last_counts {
                    println!("{}", format_counts(&counts));
                    last_counts = counts;
                }
            }
        }
    }
    Ok(())
}

fn print_report(report: Option<RunReport>) {
    match report {
        Some(report) => println!(
            "Scored {} messages ({} failed, {} batches): {:?}",
            report.scored, report.failed, report.batches, report.outcome
        ),
        None => println!("A scoring run is already in progress"),
    }
}

fn format_counts(counts: &ThreadCounts) -> String {
    format!(
        "All ({}) | Normal ({}) | Spam ({})",
        counts.all, counts.normal, counts.spam
    )
}

fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn preview(body: &str) -> String {
    let line = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.chars().count() > 100 {
        let truncated: String = line.chars().take(100).collect();
        format!("{}...", truncated)
    } else {
        line
    }
}
