//! # CLI Module
//!
//! Command-line interface for the catalog indexer.
//!
//! ## Usage
//! ```bash
//! # List a render folder with sequences collapsed
//! catalog-index scan /jobs/show/shot010/renders --granularity sequence
//!
//! # Only exr and png files, largest first
//! catalog-index scan ./renders --extensions exr,png --sort size --descending
//!
//! # Keep descriptions and flags between runs, generate thumbnails
//! catalog-index scan ./renders --db ./catalog.db --thumbnails ./thumbs
//!
//! # JSON output
//! catalog-index scan ./renders --output json
//! ```

use catalog_indexer::core::filter::FilterFlag;
use catalog_indexer::core::persistence::{InMemoryStore, PersistenceStore, SqliteStore};
use catalog_indexer::core::scanner::{ScanConfig, ScanSummary};
use catalog_indexer::core::store::{byte_to_string, BucketKey, Granularity, RecordSnapshot, SortKey};
use catalog_indexer::core::thumbnails::{DiskThumbnailCache, ThumbnailCache};
use catalog_indexer::core::workers::Role;
use catalog_indexer::core::Catalog;
use catalog_indexer::error::{CatalogError, Result};
use catalog_indexer::events::{BucketEvent, Event, EventChannel, ScanEvent, WorkerEvent};
use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long to wait for background enrichment before printing anyway
const ENRICH_TIMEOUT: Duration = Duration::from_secs(600);

/// Catalog Indexer - list asset folders with sequences collapsed
#[derive(Parser, Debug)]
#[command(name = "catalog-index")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a collection root and list its items
    Scan {
        /// Collection root directory
        root: PathBuf,

        /// Collection name (defaults to the root's folder name)
        #[arg(short, long)]
        collection: Option<String>,

        /// List every file, or collapse frame sequences
        #[arg(short, long, default_value = "sequence")]
        granularity: GranularityArg,

        /// Sort order
        #[arg(short, long)]
        sort: Option<SortArg>,

        /// Reverse the sort order
        #[arg(long)]
        descending: bool,

        /// Filter text; `--token` or `--"quoted token"` excludes
        #[arg(short, long, allow_hyphen_values = true)]
        filter: Option<String>,

        /// Show archived items
        #[arg(long)]
        show_archived: bool,

        /// Show favourites only
        #[arg(long)]
        favourites_only: bool,

        /// Comma-separated extension allow-list
        #[arg(short, long, value_delimiter = ',')]
        extensions: Vec<String>,

        /// Include hidden files
        #[arg(long)]
        include_hidden: bool,

        /// Persistence database path (in-memory when omitted)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Thumbnail cache directory; enables thumbnail generation
        #[arg(long)]
        thumbnails: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,

        /// Verbose output (enables tracing via RUST_LOG)
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GranularityArg {
    /// One row per file
    File,
    /// Frame sequences collapsed into one row
    Sequence,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::File => Granularity::File,
            GranularityArg::Sequence => Granularity::Sequence,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    Size,
    Modified,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortKey::Name,
            SortArg::Size => SortKey::Size,
            SortArg::Modified => SortKey::Modified,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (paths only)
    Minimal,
}

/// Options of the scan command
struct ScanOptions {
    root: PathBuf,
    collection: Option<String>,
    granularity: Granularity,
    sort: Option<SortKey>,
    descending: bool,
    filter: Option<String>,
    show_archived: bool,
    favourites_only: bool,
    extensions: Vec<String>,
    include_hidden: bool,
    db: Option<PathBuf>,
    thumbnails: Option<PathBuf>,
    output: OutputFormat,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            root,
            collection,
            granularity,
            sort,
            descending,
            filter,
            show_archived,
            favourites_only,
            extensions,
            include_hidden,
            db,
            thumbnails,
            output,
            verbose,
        } => {
            if verbose {
                catalog_indexer::init_tracing();
            }
            run_scan(ScanOptions {
                root,
                collection,
                granularity: granularity.into(),
                sort: sort.map(Into::into),
                descending,
                filter,
                show_archived,
                favourites_only,
                extensions,
                include_hidden,
                db,
                thumbnails,
                output,
            })
        }
    }
}

fn collection_name(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "catalog".to_string())
}

fn run_scan(options: ScanOptions) -> Result<()> {
    let term = Term::stderr();
    let pretty = matches!(options.output, OutputFormat::Pretty);

    if pretty {
        term.write_line(&format!(
            "{} {}",
            style("Catalog Indexer").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let collection = options
        .collection
        .clone()
        .unwrap_or_else(|| collection_name(&options.root));

    let persistence: Arc<dyn PersistenceStore> = match &options.db {
        Some(path) => Arc::new(SqliteStore::open(path)?),
        None => Arc::new(InMemoryStore::new()),
    };
    let thumbnails: Option<Arc<dyn ThumbnailCache>> = options
        .thumbnails
        .as_ref()
        .map(|dir| Arc::new(DiskThumbnailCache::new(dir)) as Arc<dyn ThumbnailCache>);

    let mut scan_config = ScanConfig {
        include_hidden: options.include_hidden,
        ..ScanConfig::default()
    };
    if !options.extensions.is_empty() {
        scan_config = scan_config.with_extensions(&collection, options.extensions.clone());
    }

    let (sender, receiver) = EventChannel::new();
    let mut builder = Catalog::builder()
        .scan_config(scan_config)
        .persistence(persistence)
        .generate_thumbnails(thumbnails.is_some())
        .enrich_on_scan(false)
        .events(sender);
    if let Some(cache) = thumbnails {
        builder = builder.thumbnails(cache);
    }
    let mut catalog = builder.build();

    // Progress bar for pretty output
    let progress = if pretty {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .map_err(|e| CatalogError::Config(e.to_string()))?
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let done = Arc::new(AtomicBool::new(false));
    let progress_clone = progress.clone();
    let done_clone = Arc::clone(&done);

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || loop {
        let Some(event) = receiver.recv_timeout(Duration::from_millis(50)) else {
            if done_clone.load(Ordering::Acquire) {
                break;
            }
            continue;
        };
        let Some(pb) = progress_clone.as_ref() else {
            continue;
        };
        match event {
            Event::Scan(ScanEvent::Progress(p)) => {
                pb.set_message(format!("{} files found", p.files_found));
            }
            Event::Scan(ScanEvent::Completed { files, sequences, .. }) => {
                pb.set_message(format!("{} files, {} sequences", files, sequences));
            }
            Event::Bucket(BucketEvent::RowChanged { .. })
            | Event::Worker(WorkerEvent::Failed { .. }) => pb.inc(1),
            _ => {}
        }
    });

    let outcome = scan_and_enrich(&mut catalog, &collection, &options, progress.as_ref());

    done.store(true, Ordering::Release);
    event_thread.join().ok();
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    let (summary, key) = outcome?;
    let rows: Vec<RecordSnapshot> = catalog
        .visible_rows(&key)
        .into_iter()
        .filter_map(|row| catalog.bucket(&key).and_then(|bucket| bucket.get(row)))
        .map(|record| record.snapshot())
        .collect();

    match options.output {
        OutputFormat::Pretty => print_pretty_results(&term, &summary, &key, &rows),
        OutputFormat::Json => print_json_results(&summary, &key, &rows)?,
        OutputFormat::Minimal => print_minimal_results(&rows),
    }

    catalog.shutdown();
    Ok(())
}

fn scan_and_enrich(
    catalog: &mut Catalog,
    collection: &str,
    options: &ScanOptions,
    progress: Option<&ProgressBar>,
) -> Result<(ScanSummary, BucketKey)> {
    let summary = catalog.scan(collection, &options.root)?;
    let key = BucketKey::new(collection, options.granularity);

    if let Some(sort) = options.sort {
        catalog.set_sort_preference(collection, sort, options.descending)?;
    }

    // Info first, so archived items are known before thumbnails are queued.
    let rows = catalog.bucket(&key).map(|bucket| bucket.len()).unwrap_or(0);
    let mut queued = catalog.enqueue_visible(&key, 0..rows, Role::Info);
    if let Some(pb) = progress {
        pb.set_length(queued as u64);
    }
    catalog.wait_idle(ENRICH_TIMEOUT);

    for role in [Role::Thumbnail, Role::ThumbnailGenerate] {
        queued += catalog.enqueue_visible(&key, 0..rows, role);
        if let Some(pb) = progress {
            pb.set_length(queued as u64);
        }
        catalog.wait_idle(ENRICH_TIMEOUT);
    }

    // Re-sort now that size and modified time are known.
    if let Some(sort) = options.sort {
        catalog.set_sort_preference(collection, sort, options.descending)?;
    }

    if let Some(text) = &options.filter {
        catalog.set_filter_text(text);
    }
    catalog.set_filter_flag(FilterFlag::ShowArchived, options.show_archived);
    catalog.set_filter_flag(FilterFlag::FavouritesOnly, options.favourites_only);

    Ok((summary, key))
}

fn print_pretty_results(term: &Term, summary: &ScanSummary, key: &BucketKey, rows: &[RecordSnapshot]) {
    term.write_line(&format!("{} Scan Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} files, {} sequences in {:.1}s",
        style(summary.files).cyan(),
        style(summary.sequences).cyan(),
        summary.elapsed.as_secs_f64()
    ))
    .ok();
    if !summary.errors.is_empty() {
        term.write_line(&format!(
            "  {} entries could not be read",
            style(summary.errors.len()).yellow()
        ))
        .ok();
    }
    if summary.truncated {
        term.write_line(&format!("  {}", style("Listing truncated at the item limit").yellow()))
            .ok();
    }

    let total: u64 = rows.iter().map(|row| row.size).sum();
    term.write_line(&format!(
        "  {} visible in {} ({})",
        style(rows.len()).cyan(),
        key,
        style(byte_to_string(total)).yellow()
    ))
    .ok();
    term.write_line("").ok();

    for row in rows {
        let marker = if row.flags.active {
            style("●").green().to_string()
        } else if row.flags.favourite {
            style("★").yellow().to_string()
        } else {
            style("○").dim().to_string()
        };
        let name = if row.flags.archived {
            style(&row.name).dim().strikethrough().to_string()
        } else {
            style(&row.name).bold().to_string()
        };

        term.write_line(&format!("  {} {}  {}", marker, name, style(&row.detail).dim()))
            .ok();
        if !row.description.is_empty() {
            term.write_line(&format!("      {}", style(&row.description).italic()))
                .ok();
        }
    }
}

fn print_json_results(summary: &ScanSummary, key: &BucketKey, rows: &[RecordSnapshot]) -> Result<()> {
    let output = serde_json::json!({
        "collection": summary.collection,
        "granularity": key.granularity.to_string(),
        "files": summary.files,
        "sequences": summary.sequences,
        "errors": summary.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
        "truncated": summary.truncated,
        "duration_ms": summary.elapsed.as_millis() as u64,
        "rows": rows,
    });

    let text = serde_json::to_string_pretty(&output)
        .map_err(|e| CatalogError::Config(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn print_minimal_results(rows: &[RecordSnapshot]) {
    for row in rows {
        println!("{}", row.path);
    }
}
