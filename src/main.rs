use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;

use research_monitor::cli::{self, Commands, HistoryAction};
use research_monitor::config::{self, AppConfig};
use research_monitor::history::{FileMedium, HistoryQuery, HistoryStore, LoadState};
use research_monitor::report::analytics::format_duration;
use research_monitor::report::export::write_export;
use research_monitor::report::{Analytics, ExportFormat};
use research_monitor::task::types::TaskRequest;
use research_monitor::task::{
    HttpBackend, PollPolicy, PollerEvent, ResearchBackend, ResearchSession, TaskOutcome,
    TokioScheduler,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = cli::Cli::parse();

    let config = config::load_config(&cli)?;
    tracing::debug!(
        base_url = %config.base_url,
        history = %config.history_dir.display(),
        "Config loaded"
    );

    match cli.command {
        Commands::Run {
            query,
            max_agents,
            max_iterations,
            export_dir,
            ..
        } => {
            let request = TaskRequest::new(query, max_agents, max_iterations);
            run_task(&config, request, export_dir).await
        }
        Commands::History { action } => {
            let mut store = open_history(&config);
            history_command(&mut store, action)
        }
        Commands::Export {
            task_id,
            format,
            out,
        } => export_task(&config, &task_id, format, &out).await,
    }
}

fn open_history(config: &AppConfig) -> HistoryStore {
    let mut store = HistoryStore::new(Box::new(FileMedium::new(&config.history_dir)))
        .with_seed_examples(config.seed_examples);
    match store.init() {
        LoadState::Recovered => {
            eprintln!("Warning: stored history was unreadable and has been reset.")
        }
        LoadState::Unavailable => {
            eprintln!("Warning: history could not be read; changes are kept in memory.")
        }
        LoadState::Seeded(n) => tracing::info!(records = n, "Seeded example history"),
        state => tracing::debug!(?state, "History opened"),
    }
    store
}

fn backend(config: &AppConfig) -> anyhow::Result<HttpBackend> {
    HttpBackend::new(
        &config.base_url,
        Duration::from_secs(config.request_timeout_secs),
    )
    .context("Failed to build HTTP client")
}

async fn run_task(
    config: &AppConfig,
    request: TaskRequest,
    export_dir: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    let history = Arc::new(Mutex::new(open_history(config)));
    let session = ResearchSession::new(
        Arc::new(backend(config)?),
        Arc::new(TokioScheduler),
        PollPolicy::from_config(config),
        history,
    );

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let poller = session.poller().with_events(event_tx);
    let handle = poller.handle();

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            print_event(&event);
        }
    });

    let cancel_handle = handle.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && cancel_handle.cancel() {
            eprintln!("Cancelling...");
        }
    });

    let report = session.run(poller, &request).await;
    interrupt.abort();
    // The poller dropped its sender, so the printer drains and exits.
    let _ = printer.await;

    match report.outcome {
        TaskOutcome::Completed(payload) => {
            let analytics = report
                .analytics
                .unwrap_or_else(|| Analytics::from_payload(&payload));
            print_summary(&analytics);
            println!("\n{}", payload.report);
            if let Some(dir) = export_dir {
                if let Some(path) =
                    write_export(&dir, &payload, &analytics, &request.query, ExportFormat::Json)?
                {
                    println!("\nExported to {}", path.display());
                }
            }
            Ok(())
        }
        TaskOutcome::Failed(err) => Err(anyhow::Error::new(err).context("Research task failed")),
        TaskOutcome::Cancelled => {
            println!("Task cancelled.");
            Ok(())
        }
    }
}

fn print_event(event: &PollerEvent) {
    match event {
        PollerEvent::Started { task_id } => println!("Started task {task_id}"),
        PollerEvent::Progress(view) => {
            let agents = view.agent_count();
            if agents > 0 {
                println!(
                    "[{:>3}%] {:<12} {} ({agents} agents)",
                    view.progress_percent, view.stage, view.message
                );
            } else {
                println!(
                    "[{:>3}%] {:<12} {}",
                    view.progress_percent, view.stage, view.message
                );
            }
        }
        PollerEvent::Completed(payload) => println!("Completed task {}", payload.task_id),
        PollerEvent::Failed(err) => eprintln!("Failed: {err}"),
        PollerEvent::Cancelled => {}
    }
}

fn print_summary(analytics: &Analytics) {
    println!(
        "\nSources: {} (avg relevance {}%, {} high / {} medium / {} low)",
        analytics.source_count,
        analytics.average_relevance,
        analytics.quality.high,
        analytics.quality.medium,
        analytics.quality.low,
    );
    println!(
        "Citations: {} ({} unique)",
        analytics.citations.total, analytics.citations.unique
    );
    if let Some(top) = &analytics.citations.most_cited {
        println!("Most cited: [{}] {} ({}x)", top.index, top.title, top.times_cited);
    }
    println!(
        "Report: {} characters, {} tokens, {} with {} agents",
        analytics.report_length,
        analytics.total_tokens,
        analytics.execution_time,
        analytics.agent_count
    );
}

fn history_command(store: &mut HistoryStore, action: HistoryAction) -> anyhow::Result<()> {
    match action {
        HistoryAction::List {
            search,
            status,
            sort,
            order,
            favorites,
        } => {
            let records = store.query(&HistoryQuery {
                search,
                status,
                favorites_only: favorites,
                sort_key: sort,
                sort_order: order,
            });
            if records.is_empty() {
                println!("No matching records.");
            }
            for r in records {
                println!(
                    "{} {} {:<9} {:>3} sources {:>8}  {}{} [{}]",
                    r.id,
                    r.timestamp.format("%Y-%m-%d %H:%M"),
                    r.status.as_str(),
                    r.sources_count,
                    format_duration(r.duration_seconds),
                    if r.favorite { "* " } else { "" },
                    r.query,
                    r.tags.join(", "),
                );
            }
        }
        HistoryAction::Favorite { id } => match store.toggle_favorite(&id) {
            Some(true) => println!("Marked {id} as favorite."),
            Some(false) => println!("Removed {id} from favorites."),
            None => anyhow::bail!("No history record with id {id}"),
        },
        HistoryAction::Delete { ids } => {
            let ids: HashSet<String> = ids.into_iter().collect();
            let removed = store.bulk_delete(&ids);
            println!("Deleted {removed} of {} records.", ids.len());
        }
        HistoryAction::Stats => {
            let stats = store.stats();
            println!("Total:      {}", stats.total);
            println!("Completed:  {}", stats.completed);
            println!("Failed:     {}", stats.failed);
            println!("Running:    {}", stats.running);
            println!("Favorites:  {}", stats.favorites);
            println!("Sources:    {}", stats.total_sources);
            println!("Tokens:     {}", stats.total_tokens);
            println!(
                "Avg time:   {}",
                format_duration(stats.average_duration_seconds)
            );
        }
    }

    if store.is_dirty() {
        eprintln!(
            "Warning: history changes were not saved: {}",
            store.last_error().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn export_task(
    config: &AppConfig,
    task_id: &str,
    format: ExportFormat,
    out: &std::path::Path,
) -> anyhow::Result<()> {
    let backend = backend(config)?;
    let payload = backend
        .get_result(task_id)
        .await
        .with_context(|| format!("Failed to fetch result for {task_id}"))?;
    let analytics = Analytics::from_payload(&payload);
    let query = payload.query.clone();

    match write_export(out, &payload, &analytics, &query, format)? {
        Some(path) => println!("Exported to {}", path.display()),
        None => println!("Nothing to export: the result has no sources."),
    }
    Ok(())
}
