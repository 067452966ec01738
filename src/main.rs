mod config;
mod error;
mod executor;
mod i18n;
mod key_codec;
mod keyword;
mod output;
mod query;
mod record;
mod store;
mod timerange;
mod value_codec;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use colored::*;
use log::{info, warn};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use config::Config;
use executor::CommandExecutor;
use i18n::I18n;
use query::{Query, ScanStats};
use store::HistoryStore;

#[derive(Parser)]
#[command(name = "timedb", version)]
#[command(about = "An alternative to `time` that saves its own history")]
struct Cli {
    /// Print help about search keywords and exit
    #[arg(long = "keyword-help", alias = "keywordhelp")]
    keyword_help: bool,
    /// Print license details and exit
    #[arg(long)]
    license: bool,
    /// Print additional info during run
    #[arg(long, short = 'v')]
    verbose: bool,
    /// Which time database to use [default: ~/.timedatabase]
    #[arg(long = "dbfile", value_name = "PATH")]
    dbfile: Option<PathBuf>,
    /// Print the whole database, oldest first
    #[arg(long, short = 'd', conflicts_with = "search")]
    dump: bool,
    /// Search the database: --search [TIMERANGE] [KEYWORD]...
    #[arg(long, short = 's')]
    search: bool,
    /// Print dump and search results as JSON lines
    #[arg(long)]
    json: bool,
    /// Command to measure, or the search arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "warn,timedb=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::new()?;
    let i18n = I18n::new(&config.get_effective_language());

    if cli.keyword_help {
        println!("{}", i18n.t("keyword_help"));
        return Ok(());
    }

    if cli.license {
        println!("{}", i18n.t("license"));
        return Ok(());
    }

    let db_path = config.resolve_db_path(cli.dbfile.clone());
    info!("version = {}", env!("CARGO_PKG_VERSION"));
    info!("{}", i18n.t_format("db_file", &[&db_path.display().to_string()]));

    if cli.dump {
        let stats = with_store(&db_path, &i18n, |store| {
            print_records(&Query::all(), store, &config, &i18n, cli.json)
        })?;
        info!("{}", scan_summary(&i18n, &stats));
        return Ok(());
    }

    if cli.search {
        let query = Query::from_args(cli.args.as_slice(), Local::now());
        let stats = with_store(&db_path, &i18n, |store| {
            print_records(&query, store, &config, &i18n, cli.json)
        })?;
        info!("{}", scan_summary(&i18n, &stats));
        // Records rejected only by a relational keyword count as unmatched too.
        if stats.emitted == 0 && stats.unmatched() > 0 && !query.keywords.is_empty() {
            info!("{}", i18n.t("no_match"));
        }
        return Ok(());
    }

    if cli.args.is_empty() {
        eprintln!("{}", i18n.t("no_command").yellow());
        eprintln!("{}", i18n.t("usage_hint").dimmed());
        return Ok(());
    }

    let record = CommandExecutor::execute(&cli.args).context(i18n.t("error_run"))?;
    println!("{}", output::format_durations(&record));

    with_store(&db_path, &i18n, |store| {
        store.append(&record).context(i18n.t("error_store_record"))
    })
}

/// Opens the store, runs `f` and closes the store again whatever `f` returned.
fn with_store<T>(
    db_path: &Path,
    i18n: &I18n,
    f: impl FnOnce(&HistoryStore) -> Result<T>,
) -> Result<T> {
    let store = HistoryStore::open(db_path).context(i18n.t("error_open_store"))?;
    let outcome = f(&store);
    let closed = store.close();
    let value = outcome?;
    closed.context(i18n.t("error_close_store"))?;
    Ok(value)
}

fn print_records(
    query: &Query,
    store: &HistoryStore,
    config: &Config,
    i18n: &I18n,
    json: bool,
) -> Result<ScanStats> {
    let color = config.display.color && io::stdout().is_terminal();
    let mut out = io::stdout().lock();
    let mut write_error: Option<io::Error> = None;

    let stats = query
        .run(store, |record| {
            if write_error.is_some() {
                return;
            }
            let line = if json {
                match output::format_json(&record) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("cannot serialize {:?}: {e}", record.grouping_key);
                        return;
                    }
                }
            } else {
                output::format_line(&record, &config.display.time_format, color)
            };
            if let Err(e) = writeln!(out, "{line}") {
                write_error = Some(e);
            }
        })
        .with_context(|| format!("{} ({})", i18n.t("error_scan"), store.path().display()))?;

    match write_error {
        // The reader went away (`| head`), nothing left to report to.
        Some(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(stats),
        Some(e) => Err(e.into()),
        None => {
            out.flush()?;
            Ok(stats)
        }
    }
}

fn scan_summary(i18n: &I18n, stats: &ScanStats) -> String {
    i18n.t_format(
        "scan_summary",
        &[
            &stats.scanned.to_string(),
            &stats.emitted.to_string(),
            &stats.unmatched().to_string(),
            &stats.malformed.to_string(),
        ],
    )
}
