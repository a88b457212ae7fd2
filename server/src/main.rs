//! `filedb` binary: the HTTP server plus offline maintenance commands.
//!
//! ## Subcommands
//!
//! - `filedb serve` (default): run the HTTP server
//! - `filedb list`: dump all records as JSON
//! - `filedb top`: list files by size, largest first
//! - `filedb check`: verify every blob against its checksum
//! - `filedb clean --references refs.json`: drop unreferenced files, fix counters
//! - `filedb purge --id N | --checksum SUM`: delete record and blob
//! - `filedb untrack --id N | --checksum SUM`: delete record, keep blob
//! - `filedb permissions`: show configured access keys
//!
//! Maintenance commands work on the data directory directly and must not run
//! while a server is using it.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use filedb::maintenance::{apply_clean, plan_clean, References};
use filedb::store::hasher::is_sha256_hex;
use filedb::store::Consistency;
use filedb::{application, AppState, Config, FileStore, Ident};

/// Content-addressed file database.
#[derive(Parser)]
#[command(name = "filedb", version)]
struct Cli {
    /// Path to TOML config file.
    #[arg(long, global = true)]
    config: Option<String>,
    /// Increase logging verbosity.
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default when no subcommand given).
    Serve,
    /// Print all records as JSON.
    List,
    /// List files by size, largest first.
    Top,
    /// Verify every blob against its recorded checksum.
    Check,
    /// Remove unreferenced files and correct reference counters.
    Clean(CleanArgs),
    /// Delete a file's record and blob.
    Purge(IdentArgs),
    /// Delete a file's record but keep its blob.
    Untrack(IdentArgs),
    /// List configured access keys.
    Permissions,
}

#[derive(Args)]
struct CleanArgs {
    /// JSON map of record id to reference count, e.g. `{"17": 2}`.
    #[arg(long)]
    references: PathBuf,
    /// Do not ask questions.
    #[arg(long)]
    non_interactive: bool,
    /// Apply changes instead of simulating.
    #[arg(long)]
    this_is_not_a_drill: bool,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct IdentArgs {
    /// Record id.
    #[arg(long)]
    id: Option<u64>,
    /// SHA-256 checksum of the content.
    #[arg(long)]
    checksum: Option<String>,
}

impl IdentArgs {
    fn ident(&self) -> Result<Ident, String> {
        if let Some(id) = self.id {
            return Ok(Ident::Id(id));
        }
        let Some(sum) = &self.checksum else {
            return Err("Either --id or --checksum is required".to_string());
        };
        let sum = sum.to_ascii_lowercase();
        if !is_sha256_hex(&sum) {
            return Err(format!("Not a SHA-256 checksum: {sum}"));
        }
        Ok(Ident::Checksum(sum))
    }
}

const CLEANUP_QUESTION: &str = "Type YES if you really want to clean up: ";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("filedb: configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.debug {
            "debug".to_string()
        } else {
            config.logging.level.clone()
        }
    });
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    if let Some(Commands::Permissions) = cli.command {
        for permission in &config.permissions {
            println!("{permission}");
        }
        return ExitCode::SUCCESS;
    }

    let mode = match config.storage.file_mode() {
        Ok(m) => m,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let store = match FileStore::open(
        Path::new(&config.storage.data_dir),
        mode,
        config.server.max_file_size,
    )
    .await
    {
        Ok(s) => s,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config, store).await,
        Commands::List => list(&store).await,
        Commands::Top => top(&store).await,
        Commands::Check => check(&store).await,
        Commands::Clean(args) => clean(&store, &args).await,
        Commands::Purge(args) => forget(&store, &args, true).await,
        Commands::Untrack(args) => forget(&store, &args, false).await,
        Commands::Permissions => ExitCode::SUCCESS,
    }
}

async fn run_server(config: Config, store: FileStore) -> ExitCode {
    info!("filedb v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", config.storage.data_dir);
    info!("Listening on {}", config.server.listen);

    if config.permissions.is_empty() {
        warn!("No [[permissions]] configured, every FileDB request will be rejected");
    }

    let state = AppState::new(config, store);
    let app = application(state.clone());

    // Periodic flush of download counters
    let store = state.store.clone();
    let period = Duration::from_secs(state.config.storage.access_flush_secs);
    let flush_task = tokio::spawn(flush_periodically(store, period));

    let listener = match TcpListener::bind(&state.config.server.listen).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {e}", state.config.server.listen);
            return ExitCode::FAILURE;
        }
    };

    info!("Server ready");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    flush_task.abort();
    if let Err(e) = state.store.flush().await {
        error!("Failed to write access counters: {e}");
    }

    if let Err(e) = served {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Goodbye");
    ExitCode::SUCCESS
}

async fn flush_periodically(store: Arc<FileStore>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        if let Err(e) = store.flush().await {
            warn!("Failed to write access counters: {e}");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Failed to register SIGTERM: {e}");
                ctrl_c.await.ok();
                info!("Received SIGINT");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received SIGINT");
    }
}

/// `purge` (record and blob) or `untrack` (record only).
async fn forget(store: &FileStore, args: &IdentArgs, purge: bool) -> ExitCode {
    let ident = match args.ident() {
        Ok(i) => i,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let result = if purge {
        store.purge(&ident).await
    } else {
        store.untrack(&ident).await
    };
    match result {
        Ok(record) => {
            let verb = if purge { "Purged" } else { "Untracked" };
            info!("{verb} #{} ({})", record.id, record.sha256sum);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn list(store: &FileStore) -> ExitCode {
    match serde_json::to_string_pretty(&store.list().await) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn top(store: &FileStore) -> ExitCode {
    let records = store.top().await;
    let mut out = std::io::stdout().lock();
    for record in records {
        // Stop quietly when piped into `head`.
        if writeln!(out, "{} -> {} bytes", record.id, record.size).is_err() {
            break;
        }
    }
    ExitCode::SUCCESS
}

async fn check(store: &FileStore) -> ExitCode {
    let report = match store.check().await {
        Ok(r) => r,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut problems = 0usize;
    for (record, state) in &report {
        match state {
            Consistency::Ok => debug!("#{} ok", record.id),
            Consistency::Missing => {
                problems += 1;
                warn!("#{} blob missing ({})", record.id, record.sha256sum);
            }
            Consistency::Corrupted { actual } => {
                problems += 1;
                warn!(
                    "#{} corrupted: expected {}, actual {actual}",
                    record.id, record.sha256sum
                );
            }
        }
    }
    info!("Checked {} files, {problems} problem(s)", report.len());

    if problems == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn clean(store: &FileStore, args: &CleanArgs) -> ExitCode {
    let references = match std::fs::read_to_string(&args.references)
        .map_err(|e| format!("Failed to read {}: {e}", args.references.display()))
        .and_then(|json| References::parse(&json))
    {
        Ok(r) => r,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let interactive = !args.non_interactive;
    let simulate = !args.this_is_not_a_drill;

    if simulate {
        info!("Don't worry. I'm just simulating.");
    } else {
        warn!("THIS IS NOT A DRILL.");
    }
    info!("Starting in three seconds...");

    tokio::select! {
        () = tokio::time::sleep(Duration::from_secs(3)) => {}
        _ = tokio::signal::ctrl_c() => return user_abort(),
    }

    if interactive && !ask(CLEANUP_QUESTION, &["YES"], false) {
        return user_abort();
    }

    let plan = plan_clean(&store.list().await, &references);
    let summary = apply_clean(store, &plan, simulate, |record| {
        !interactive || ask(&format!("Delete file <{}>? ", record.id), &["yes", "y"], true)
    })
    .await;

    if summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Ask a yes/no question on stdin. EOF counts as "no".
fn ask(question: &str, yes: &[&str], ignorecase: bool) -> bool {
    print!("{question}");
    let _ = std::io::stdout().flush();
    let mut reply = String::new();
    match std::io::stdin().lock().read_line(&mut reply) {
        Ok(0) | Err(_) => false,
        Ok(_) => {
            let reply = reply.trim();
            yes.iter().any(|y| {
                if ignorecase {
                    y.eq_ignore_ascii_case(reply)
                } else {
                    *y == reply
                }
            })
        }
    }
}

fn user_abort() -> ExitCode {
    println!();
    error!("Aborted by user.");
    ExitCode::FAILURE
}
