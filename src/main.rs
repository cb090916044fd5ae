use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Instant;

use discography_sync::cache::{CollectionKey, SyncCache};
use discography_sync::catalog::{collect_audio_files, read_discographies};
use discography_sync::config::Config;
use discography_sync::duplicates::{find_multi_recordings, recording_stats, sorted_by_name};
use discography_sync::logging;
use discography_sync::matcher::{match_files_with_progress, MatchOptions};
use discography_sync::models::{Discography, MatchMode, TrackRecord};
use discography_sync::progress::{create_progress_bar, create_spinner, format_duration};
use discography_sync::query::{filter_by, sort_by, Filter, SortKeys, SortOrder};
use discography_sync::sync::{parse_pending_line, pending_line, plan_collection};

#[derive(Parser)]
#[command(name = "discsync")]
#[command(about = "Curate discographies, find multiple recordings, match local files, inspect the sync cache")]
struct Args {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Hide progress bars
    #[arg(long, global = true)]
    quiet: bool,

    /// Worker threads for matching (0 = all cores)
    #[arg(long, default_value = "0", global = true)]
    workers: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print catalog records, optionally sorted and filtered
    Tracks {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// One or two comma-separated fields: performer, year, name, genre, vocal
        #[arg(long)]
        sort_by: Option<SortKeys>,

        #[arg(long, default_value = "ascending")]
        sort_order: SortOrder,

        /// JSON object of field predicates, e.g. '{"year": "193.*"}'
        #[arg(long)]
        filter_by: Option<String>,

        #[arg(long)]
        json: bool,
    },
    /// Report tracks recorded more than once (different performer or year)
    Duplicates {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write the JSON report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Per-track recording statistics
    Stats {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        json: bool,
    },
    /// Pair audio files with catalog records for retagging
    Match {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        music_dir: PathBuf,

        #[arg(long, default_value = "strict")]
        mode: MatchMode,

        /// Fuzzy rank threshold (overrides config)
        #[arg(long)]
        threshold: Option<usize>,

        #[arg(long)]
        json: bool,
    },
    /// List records not yet in the playlist as `query<TAB>signature` lines for
    /// an uploader. The cache is only read; confirm uploads with `cache add`.
    Sync {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Playlist title, also the cache collection key (overrides config)
        #[arg(long)]
        title: Option<String>,

        /// Service name (overrides config)
        #[arg(long)]
        service: Option<String>,

        /// Append the release year to each query
        #[arg(long)]
        with_year: bool,
    },
    /// Inspect or update the synchronization cache
    Cache {
        /// Service name (overrides config)
        #[arg(long)]
        service: Option<String>,

        /// Playlist collection key (defaults to the configured title); lists
        /// collections when neither is set
        #[arg(long)]
        collection: Option<String>,

        #[command(subcommand)]
        action: Option<CacheAction>,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List the entries of the collection (default)
    List,
    /// Report whether a record is cached
    Check {
        #[command(flatten)]
        record: RecordArgs,
    },
    /// Record successful submissions. Reads `sync` output lines (or bare
    /// signatures) from stdin unless a record is given.
    Add {
        #[command(flatten)]
        record: RecordArgs,
    },
}

#[derive(clap::Args)]
struct RecordArgs {
    #[arg(long)]
    name: Option<String>,

    #[arg(long, default_value = "")]
    performer: String,

    #[arg(long, default_value = "")]
    year: String,

    #[arg(long)]
    vocal: Option<String>,
}

impl RecordArgs {
    fn record(&self) -> Option<TrackRecord> {
        let name = self.name.as_deref()?;
        let mut record = TrackRecord::new(&self.performer, &self.year, name);
        if let Some(vocal) = &self.vocal {
            record = record.with_vocal_credit(vocal);
        }
        Some(record)
    }
}

fn load_catalog(files: &[PathBuf], quiet: bool) -> Result<Discography> {
    let spinner = create_spinner("Reading discographies", quiet);
    let catalog = read_discographies(files)?;
    spinner.finish_and_clear();
    eprintln!("Collected {} tracks from {} files", catalog.tracks.len(), files.len());
    Ok(catalog)
}

fn print_records(records: &[TrackRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
    } else {
        for record in records {
            println!(
                "{} | {} | {} | {} | {}",
                record.performer,
                record.year,
                record.name,
                record.genre.as_deref().unwrap_or("-"),
                record.vocal_credit.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}

fn run_tracks(
    files: &[PathBuf],
    keys: Option<SortKeys>,
    order: SortOrder,
    filter_by_json: Option<&str>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let mut records = load_catalog(files, quiet)?.tracks;

    if let Some(raw) = filter_by_json {
        let filter = Filter::from_json(raw).with_context(|| format!("invalid --filter-by '{}'", raw))?;
        let unknown = filter.unknown_fields();
        if !unknown.is_empty() {
            bail!("unknown filter field(s): {}", unknown.join(", "));
        }
        records = filter_by(records, &filter);
    }
    if let Some(keys) = keys {
        records = sort_by(records, keys, order);
    }
    print_records(&records, json)
}

fn run_duplicates(files: &[PathBuf], output: Option<&Path>, quiet: bool) -> Result<()> {
    let catalog = load_catalog(files, quiet)?;
    let found = sorted_by_name(find_multi_recordings(&catalog.tracks));
    let report = serde_json::to_string_pretty(&found)?;

    match output {
        Some(path) => {
            if files.iter().any(|f| f == path) {
                bail!("output {} would overwrite an input catalog", path.display());
            }
            std::fs::write(path, report).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Wrote {} multi-recorded tracks to {}", found.len(), path.display());
        }
        None => println!("{}", report),
    }
    Ok(())
}

fn run_stats(files: &[PathBuf], json: bool, quiet: bool) -> Result<()> {
    let catalog = load_catalog(files, quiet)?;
    let stats = recording_stats(&catalog.tracks);
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    for track in &stats {
        match &track.genre {
            Some(genre) => println!("Track: {} ({})", track.name, genre),
            None => println!("Track: {}", track.name),
        }
        for p in &track.performers {
            println!(
                "  Recorded {} times by {} in years: {}",
                p.years.len(),
                p.performer,
                p.years.join(", ")
            );
        }
        println!("- total {} times", track.total);
    }
    Ok(())
}

fn run_match(
    files: &[PathBuf],
    music_dir: &Path,
    options: &MatchOptions,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let catalog = load_catalog(files, quiet)?;

    let spinner = create_spinner("Scanning music library", quiet);
    let audio = collect_audio_files(music_dir)?;
    spinner.finish_and_clear();
    eprintln!("Found {} audio files in {}", audio.len(), music_dir.display());

    let pb = create_progress_bar(audio.len() as u64, "Matching", quiet);
    let results = match_files_with_progress(&audio, &catalog.tracks, options, &pb);
    pb.finish_and_clear();
    eprintln!("Found {} matches ({:?} mode)", results.len(), options.mode);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for m in &results {
            println!("{} <-> {}", m.record.name, m.file_path.display());
        }
    }
    Ok(())
}

fn run_sync(
    config: &Config,
    files: &[PathBuf],
    title: &str,
    service: &str,
    with_year: bool,
    quiet: bool,
) -> Result<()> {
    let catalog = load_catalog(files, quiet)?;
    let collection = CollectionKey::new(title).with_context(|| format!("playlist title '{}'", title))?;
    let root = config.cache_root();
    let cache = SyncCache::open(&root, service)
        .with_context(|| format!("opening cache under {}", root.display()))?;

    let plan = plan_collection(&cache, &collection, &catalog, title)?;
    for record in &plan.pending {
        println!("{}", pending_line(record, with_year));
    }
    eprintln!(
        "{} pending for {}/{}, {} already cached, {} invalid",
        plan.pending.len(),
        service,
        collection,
        plan.skipped,
        plan.invalid
    );
    Ok(())
}

fn add_confirmed(cache: &SyncCache, collection: &CollectionKey) -> Result<()> {
    let (mut added, mut present, mut rejected) = (0usize, 0usize, 0usize);
    for (idx, line) in std::io::stdin().lock().lines().enumerate() {
        let line = line.context("reading confirmations from stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_pending_line(&line) {
            Some(record) if cache.add(collection, &record)? => added += 1,
            Some(_) => present += 1,
            None => {
                tracing::warn!(line = idx + 1, "ignoring malformed confirmation");
                rejected += 1;
            }
        }
    }
    eprintln!("Cached {}, already present {}, malformed {}", added, present, rejected);
    Ok(())
}

fn run_cache(config: &Config, service: &str, collection: Option<&str>, action: CacheAction) -> Result<()> {
    let root = config.cache_root();
    let cache = SyncCache::open(&root, service)
        .with_context(|| format!("opening cache under {}", root.display()))?;

    let Some(collection) = collection else {
        if !matches!(action, CacheAction::List) {
            bail!("no collection: pass --collection or set playlist_title in the config");
        }
        for key in cache.collections()? {
            println!("{}", key);
        }
        return Ok(());
    };
    let collection = CollectionKey::new(collection)?;

    match action {
        CacheAction::List => {
            for record in cache.load_all(&collection)? {
                println!("{}", record);
            }
        }
        CacheAction::Check { record } => {
            let record = record.record().context("check needs --name")?;
            let present = cache.exists(&collection, &record)?;
            println!("{}: {}", record, if present { "cached" } else { "not cached" });
        }
        CacheAction::Add { record } => match record.record() {
            Some(record) => {
                let added = cache.add(&collection, &record)?;
                println!("{}: {}", record, if added { "added" } else { "already cached" });
            }
            None => add_confirmed(&cache, &collection)?,
        },
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    logging::init(args.verbose.max(config.verbose));

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let start = Instant::now();
    match args.command {
        Command::Tracks {
            files,
            sort_by,
            sort_order,
            filter_by,
            json,
        } => run_tracks(&files, sort_by, sort_order, filter_by.as_deref(), json, args.quiet)?,
        Command::Duplicates { files, output } => run_duplicates(&files, output.as_deref(), args.quiet)?,
        Command::Stats { files, json } => run_stats(&files, json, args.quiet)?,
        Command::Match {
            files,
            music_dir,
            mode,
            threshold,
            json,
        } => {
            let options = MatchOptions {
                mode,
                rank_threshold: threshold.unwrap_or(config.fuzzy_rank_threshold),
                verbose: args.verbose.max(config.verbose) > 1,
            };
            run_match(&files, &music_dir, &options, json, args.quiet)?
        }
        Command::Sync {
            files,
            title,
            service,
            with_year,
        } => {
            let title = title
                .or_else(|| config.playlist_title.clone())
                .context("no playlist title: pass --title or set playlist_title in the config")?;
            let service = service.unwrap_or_else(|| config.service.clone());
            let with_year = with_year || config.include_year_in_query;
            run_sync(&config, &files, &title, &service, with_year, args.quiet)?
        }
        Command::Cache {
            service,
            collection,
            action,
        } => {
            let service = service.unwrap_or_else(|| config.service.clone());
            // A bare `cache` lists collections; actions fall back to the title.
            let collection = match (collection, &action) {
                (None, Some(_)) => config.playlist_title.clone(),
                (collection, _) => collection,
            };
            run_cache(&config, &service, collection.as_deref(), action.unwrap_or(CacheAction::List))?
        }
    }

    if !args.quiet {
        eprintln!("Done in {}", format_duration(start.elapsed()));
    }
    Ok(())
}
