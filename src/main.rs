//! Replysmith CLI entry point.
//!
//! `draft` runs one scan over an HTML snapshot, `watch` keeps a snapshot
//! file under observation and drafts for every composer that appears. The
//! remaining subcommands manage stored categories, preferences, history
//! and the completion cache.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use notify::{RecursiveMode, Watcher as _};
use tracing::{debug, info, warn};

use replysmith::cache::CacheStore;
use replysmith::config::{AppConfig, ConfigProvider, LayeredConfigProvider, RuntimePaths};
use replysmith::credentials::{enforce_private_file_permissions, load_local_credentials};
use replysmith::dom::snapshot::SnapshotPage;
use replysmith::dom::HostPage;
use replysmith::history::HistoryLog;
use replysmith::orchestrator::{FieldReport, Orchestrator, RetryPolicy, Watcher};
use replysmith::pipeline::Backends;
use replysmith::settings::SettingsStore;
use replysmith::storage::{JsonFileStore, KeyValueStore};

/// URL reported for snapshots when none is given.
const DEFAULT_PAGE_URL: &str = "https://www.linkedin.com/messaging/";

/// Replysmith: reply drafts for web chat composers.
#[derive(Parser)]
#[command(name = "replysmith", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Draft replies for every composer in an HTML snapshot.
    Draft {
        /// Snapshot file.
        #[arg(long)]
        page: PathBuf,
        /// URL the snapshot was taken from.
        #[arg(long, default_value = DEFAULT_PAGE_URL)]
        url: String,
    },
    /// Watch a snapshot file and draft for composers as they appear.
    Watch {
        /// Snapshot file.
        #[arg(long)]
        page: PathBuf,
        /// URL the snapshot was taken from.
        #[arg(long, default_value = DEFAULT_PAGE_URL)]
        url: String,
    },
    /// Manage interaction categories.
    Categories {
        /// Category action.
        #[command(subcommand)]
        action: CategoriesAction,
    },
    /// Inspect drafting preferences.
    Prefs {
        /// Preferences action.
        #[command(subcommand)]
        action: PrefsAction,
    },
    /// Show recently generated drafts.
    History {
        /// Maximum number of entries to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Inspect or clear the completion cache.
    Cache {
        /// Cache action.
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Category subcommands.
#[derive(Subcommand)]
enum CategoriesAction {
    /// List categories in classification order.
    List,
    /// Append a category.
    Add {
        /// Category label.
        label: String,
    },
    /// Delete a category and its preferences.
    Delete {
        /// Category label.
        label: String,
    },
}

/// Preference subcommands.
#[derive(Subcommand)]
enum PrefsAction {
    /// Print the preferences for a category as JSON.
    Show {
        /// Category label.
        category: String,
    },
}

/// Cache subcommands.
#[derive(Subcommand)]
enum CacheAction {
    /// Print entry counts and age range.
    Stats,
    /// Remove every cached completion.
    Clear,
}

/// Loaded configuration and the shared store.
struct Runtime {
    config: AppConfig,
    paths: RuntimePaths,
    store: Arc<dyn KeyValueStore>,
}

impl Runtime {
    fn open() -> anyhow::Result<Self> {
        let config = AppConfig::load().context("failed to load configuration")?;
        let paths = config.paths.resolve()?;
        std::fs::create_dir_all(&paths.root)
            .with_context(|| format!("failed to create {}", paths.root.display()))?;
        let store = JsonFileStore::open(&paths.store_file)
            .with_context(|| format!("failed to open {}", paths.store_file.display()))?;
        if paths.store_file.exists() {
            enforce_private_file_permissions(&paths.store_file)?;
        }
        Ok(Self {
            config,
            paths,
            store: Arc::new(store),
        })
    }

    fn settings(&self) -> SettingsStore {
        SettingsStore::new(Arc::clone(&self.store))
    }

    /// Orchestrator over `page` with backends built from the resolved
    /// credentials.
    fn orchestrator(&self, page: Arc<dyn HostPage>) -> anyhow::Result<Orchestrator> {
        let local = load_local_credentials(&self.paths.env_file)
            .with_context(|| format!("failed to load {}", self.paths.env_file.display()))?;
        let provider = LayeredConfigProvider::new(
            local.clone(),
            self.config.profile.display_name.clone(),
            self.settings(),
        );
        let credentials = match provider.resolve() {
            Ok(run) => run.credentials,
            Err(e) => {
                warn!(error = %e, "stored settings unavailable, using local credentials");
                local
            }
        };
        let backends = Backends::from_config(&self.config, &credentials, Arc::clone(&self.store))
            .context("failed to configure backends")?;

        Ok(Orchestrator::new(
            page,
            backends,
            Arc::new(provider),
            HistoryLog::new(Arc::clone(&self.store)),
        )
        .with_retry_policy(RetryPolicy::from_millis(
            &self.config.orchestrator.retry_delays_ms,
        )))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Draft { page, url } => handle_draft(&page, url).await,
        Command::Watch { page, url } => handle_watch(page, url).await,
        Command::Categories { action } => handle_categories(action),
        Command::Prefs { action } => handle_prefs(action),
        Command::History { limit } => handle_history(limit),
        Command::Cache { action } => handle_cache(action),
    }
}

fn read_snapshot(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Run one scan over a snapshot and print a report per field.
async fn handle_draft(page_file: &Path, url: String) -> anyhow::Result<()> {
    replysmith::logging::init_cli();
    let runtime = Runtime::open()?;

    let page = Arc::new(SnapshotPage::new(url, read_snapshot(page_file)?));
    let orchestrator = runtime.orchestrator(page)?;
    let reports = orchestrator.scan().await;

    if reports.is_empty() {
        info!("no eligible composer fields found");
    }
    for report in &reports {
        print_report(report);
    }
    Ok(())
}

/// Watch a snapshot file until Ctrl-C, replacing the page on every change.
async fn handle_watch(page_file: PathBuf, url: String) -> anyhow::Result<()> {
    let runtime = Runtime::open()?;
    let logging_guard = replysmith::logging::init_production(&runtime.paths.logs_dir)?;

    let page = Arc::new(SnapshotPage::new(url, read_snapshot(&page_file)?));
    let orchestrator = runtime.orchestrator(Arc::clone(&page) as Arc<dyn HostPage>)?;

    let (tx, rx) = std::sync::mpsc::channel();
    let mut file_watcher =
        notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            if let Ok(evt) = event {
                if evt.kind.is_modify() || evt.kind.is_create() {
                    for path in evt.paths {
                        if let Err(e) = tx.send(path) {
                            warn!(error = %e, "failed to send watcher event");
                        }
                    }
                }
            }
        })?;

    // Watch the directory: editors often replace the file by renaming.
    let watch_dir = page_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    file_watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

    let file_name = page_file.file_name().map(ToOwned::to_owned);
    let page_for_thread = Arc::clone(&page);
    std::thread::spawn(move || {
        while let Ok(path) = rx.recv() {
            if path.file_name() != file_name.as_deref() {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(html) => {
                    debug!(path = %path.display(), "snapshot changed");
                    if let Err(e) = page_for_thread.replace_document(html) {
                        warn!(error = %e, "failed to replace snapshot");
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to read snapshot"),
            }
        }
    });

    info!(
        page = %page_file.display(),
        logs = %logging_guard.logs_dir().display(),
        "watching snapshot"
    );
    let debounce = Duration::from_millis(runtime.config.orchestrator.debounce_ms);
    let reports = Watcher::new(orchestrator, debounce)
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await;

    info!(runs = reports.len(), "watch finished");
    Ok(())
}

fn handle_categories(action: CategoriesAction) -> anyhow::Result<()> {
    replysmith::logging::init_cli();
    let settings = Runtime::open()?.settings();

    match action {
        CategoriesAction::List => {
            for category in settings.categories()? {
                println!("{category}");
            }
        }
        CategoriesAction::Add { label } => {
            let category = settings.add_category(&label)?;
            println!("added {category}");
        }
        CategoriesAction::Delete { label } => {
            settings.delete_category(&label)?;
            println!("deleted {}", label.trim());
        }
    }
    Ok(())
}

fn handle_prefs(action: PrefsAction) -> anyhow::Result<()> {
    replysmith::logging::init_cli();
    let settings = Runtime::open()?.settings();

    match action {
        PrefsAction::Show { category } => {
            let found = settings
                .categories()?
                .into_iter()
                .find(|c| c.as_str().eq_ignore_ascii_case(category.trim()))
                .ok_or_else(|| anyhow::anyhow!("unknown category '{}'", category.trim()))?;
            let prefs = settings.preferences_for(&found)?;
            let json =
                serde_json::to_string_pretty(&prefs).context("failed to serialize preferences")?;
            println!("{json}");
        }
    }
    Ok(())
}

fn handle_history(limit: usize) -> anyhow::Result<()> {
    replysmith::logging::init_cli();
    let runtime = Runtime::open()?;
    let history = HistoryLog::new(Arc::clone(&runtime.store));

    for entry in history.entries()?.into_iter().take(limit) {
        println!(
            "{}  {} [{}]",
            entry.timestamp.to_rfc3339(),
            entry.context.recipient.name,
            entry.context.category
        );
        println!("{}\n", entry.message);
    }
    Ok(())
}

fn handle_cache(action: CacheAction) -> anyhow::Result<()> {
    replysmith::logging::init_cli();
    let runtime = Runtime::open()?;
    let cache = CacheStore::with_capacity(Arc::clone(&runtime.store), runtime.config.cache.max_entries);

    match action {
        CacheAction::Stats => {
            let stats = cache.stats()?;
            println!("entries: {}", stats.entries);
            println!("with embedding: {}", stats.with_embedding);
            if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
                println!("oldest: {}", oldest.to_rfc3339());
                println!("newest: {}", newest.to_rfc3339());
            }
        }
        CacheAction::Clear => {
            cache.clear()?;
            println!("cache cleared");
        }
    }
    Ok(())
}

fn print_report(report: &FieldReport) {
    let recipient = report
        .recipient
        .as_ref()
        .map_or("-", |r| r.name.as_str());
    let category = report
        .category
        .as_ref()
        .map_or("-", |c| c.as_str());
    println!(
        "field {}: {:?} recipient={recipient} category={category} cached={}",
        report.field.index, report.state, report.cached
    );
    if let Some(draft) = &report.draft {
        println!("{draft}\n");
    }
    if let Some(error) = &report.error {
        println!("error: {error}\n");
    }
}
