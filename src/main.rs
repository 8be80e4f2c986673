use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::bounded;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use vault_reconcile::catalog::{CatalogSource, JsonSnapshotCatalog, WebCatalog, DEFAULT_API_URL};
use vault_reconcile::config::{Schedule, Settings, DEFAULT_DUPLICATE_TAG, DEFAULT_STARTUP_DELAY_SECS};
use vault_reconcile::events::TracingSink;
use vault_reconcile::models::{EntryId, LocalEntry};
use vault_reconcile::progress::{create_spinner, format_duration, is_log_only, set_log_only};
use vault_reconcile::scheduler::Scheduler;
use vault_reconcile::store::SqliteVault;
use vault_reconcile::{Reconciler, RunOutcome};

#[derive(Parser)]
#[command(name = "vault-reconcile")]
#[command(about = "Tag vault entries that already exist in the external library or wishlist")]
struct Cli {
    /// SQLite vault file
    #[arg(long, env = "VAULT_DB", default_value = "vault.sqlite3", global = true)]
    vault: PathBuf,

    /// Rayon worker threads for matching (0 = one per core)
    #[arg(long, default_value = "0", global = true)]
    workers: usize,

    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the vault schema
    Init,

    /// Add an entry to the vault
    Add {
        id: String,

        title: Option<String>,

        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// External reference such as a store page URL (repeatable, order kept)
        #[arg(long = "ref")]
        refs: Vec<String>,
    },

    /// Run one reconciliation and print the report
    Run {
        #[command(flatten)]
        run: RunArgs,

        /// Write the run report as JSON
        #[arg(long)]
        stats_json: Option<PathBuf>,

        /// Hide the spinner; print the report as a JSON block on stderr
        #[arg(long)]
        log_only: bool,
    },

    /// Run reconciliation on a schedule
    Watch {
        #[command(flatten)]
        run: RunArgs,

        /// Minutes between runs (0 disables; negative or non-numeric uses 60)
        #[arg(long, env = "RECONCILE_INTERVAL_MINUTES", default_value = "60", allow_hyphen_values = true)]
        interval_minutes: String,

        /// Also run once shortly after start
        #[arg(long)]
        run_on_start: bool,

        #[arg(long, default_value_t = DEFAULT_STARTUP_DELAY_SECS)]
        startup_delay_secs: u64,

        /// Stop after this many runs
        #[arg(long)]
        max_runs: Option<usize>,
    },
}

#[derive(Args)]
struct CatalogArgs {
    #[arg(long, env = "CATALOG_API_URL", default_value = DEFAULT_API_URL)]
    catalog_url: String,

    #[arg(long, env = "CATALOG_API_KEY", hide_env_values = true)]
    catalog_key: Option<String>,

    /// Account whose library and wishlist are fetched
    #[arg(long, env = "CATALOG_ACCOUNT_ID")]
    catalog_account: Option<String>,

    /// Read the owned list from a JSON snapshot instead of the Web API
    #[arg(long)]
    owned_snapshot: Option<PathBuf>,

    /// Wishlist JSON snapshot (only with --owned-snapshot)
    #[arg(long, requires = "owned_snapshot")]
    wishlist_snapshot: Option<PathBuf>,

    /// Match against the library only
    #[arg(long)]
    no_wishlist: bool,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    catalog: CatalogArgs,

    /// Tag applied to entries found in a reference catalog
    #[arg(long, env = "DUPLICATE_TAG", default_value = DEFAULT_DUPLICATE_TAG)]
    duplicate_tag: String,

    /// Plan tag writes and report them without touching the vault
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_catalog(args: &CatalogArgs) -> Arc<dyn CatalogSource> {
    if let Some(owned) = &args.owned_snapshot {
        let wishlist = if args.no_wishlist {
            None
        } else {
            args.wishlist_snapshot.clone()
        };
        return Arc::new(JsonSnapshotCatalog::new(owned.clone(), wishlist));
    }

    let web = WebCatalog::new(
        args.catalog_url.clone(),
        args.catalog_key.clone(),
        args.catalog_account.clone(),
    );
    if args.no_wishlist {
        Arc::new(web.without_wishlist())
    } else {
        Arc::new(web)
    }
}

fn build_reconciler(vault: &Path, args: &RunArgs) -> Result<Reconciler> {
    let store = SqliteVault::open(vault)
        .with_context(|| format!("Failed to open vault {}", vault.display()))?;
    let settings = Settings {
        duplicate_tag: args.duplicate_tag.clone(),
        dry_run: args.dry_run,
    };
    Ok(Reconciler::new(
        settings,
        Arc::new(store),
        build_catalog(&args.catalog),
        Arc::new(TracingSink),
    ))
}

fn print_outcome(outcome: &RunOutcome) {
    let report = &outcome.report;

    if report.dry_run && !outcome.writes.is_empty() {
        println!("\nPlanned tag writes (dry run):");
        for write in &outcome.writes {
            println!("  {} -> [{}]", write.entry_id, write.tags.join(", "));
        }
    }

    println!("\n{:=<60}", "");
    println!("Reconciliation complete!");
    println!("  Entries scanned: {}", report.entries_scanned);
    println!(
        "  Library duplicates: {} ({} exact, {} fuzzy)",
        report.library_duplicates, report.library_exact, report.library_fuzzy
    );
    if report.wishlist_available {
        println!(
            "  Wishlist duplicates: {} ({} exact, {} fuzzy)",
            report.wishlist_duplicates, report.wishlist_exact, report.wishlist_fuzzy
        );
    } else {
        println!("  Wishlist: not available");
    }
    println!("  Entries matched: {}", report.entries_matched);
    println!(
        "  Tag writes: {} planned, {} applied, {} failed",
        report.writes_planned,
        report.writes_applied,
        report.write_failures.len()
    );
    for failure in &report.write_failures {
        println!("    {}: {}", failure.entry_id, failure.message);
    }
    println!("{:=<60}", "");
}

fn run_once(vault: &Path, args: &RunArgs, stats_json: Option<&Path>) -> Result<()> {
    let reconciler = build_reconciler(vault, args)?;

    let start = Instant::now();
    let spinner = create_spinner("Reconciling vault");
    let outcome = reconciler.run();
    spinner.finish_and_clear();
    let outcome = outcome.context("Reconciliation run aborted")?;

    if is_log_only() {
        outcome.report.log_phase("run");
    } else {
        print_outcome(&outcome);
        println!("Elapsed: {}", format_duration(start.elapsed()));
    }

    if let Some(path) = stats_json {
        outcome
            .report
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    match cli.command {
        Command::Init => {
            SqliteVault::open(&cli.vault)
                .with_context(|| format!("Failed to create vault {}", cli.vault.display()))?;
            println!("Vault ready: {:?}", cli.vault);
        }
        Command::Add {
            id,
            title,
            tags,
            refs,
        } => {
            let vault = SqliteVault::open(&cli.vault)
                .with_context(|| format!("Failed to open vault {}", cli.vault.display()))?;
            let entry = LocalEntry {
                id: EntryId::new(id),
                title,
                tags,
                external_refs: refs,
            };
            vault
                .insert_entry(&entry)
                .with_context(|| format!("Failed to add entry {}", entry.id))?;
            println!("Added {}", entry.id);
        }
        Command::Run {
            run,
            stats_json,
            log_only,
        } => {
            set_log_only(log_only);
            run_once(&cli.vault, &run, stats_json.as_deref())?;
        }
        Command::Watch {
            run,
            interval_minutes,
            run_on_start,
            startup_delay_secs,
            max_runs,
        } => {
            let reconciler = Arc::new(build_reconciler(&cli.vault, &run)?);
            let schedule = Schedule::from_settings(&interval_minutes, run_on_start, startup_delay_secs);

            let mut scheduler = Scheduler::new(reconciler, schedule);
            if let Some(max) = max_runs {
                scheduler = scheduler.with_max_runs(max);
            }

            // Sender stays alive for the lifetime of the process
            let (_shutdown_tx, shutdown_rx) = bounded::<()>(1);
            let summary = scheduler.start(&shutdown_rx);
            println!("Scheduler stopped after {} runs ({} failed)", summary.runs, summary.failures);
        }
    }

    Ok(())
}
