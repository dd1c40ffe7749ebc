mod app;
mod cache;
mod config;
mod db;
mod error;
mod event;
mod provider;
#[cfg(test)]
mod test_support;
mod zooniverse;

use cache::files::FileMode;
use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gzm")]
#[command(about = "Local mirror and image cache for Galaxy Zoo subjects")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/galaxyzoo-mirror/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Do not touch the network
  #[arg(long, global = true)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print the next item waiting to be classified, fetching more if needed
  Next,
  /// Print stored items
  List {
    /// Only items that are neither done nor skipped
    #[arg(long)]
    pending: bool,
    /// Field to order by, e.g. `subjectId`
    #[arg(long)]
    sort: Option<String>,
    /// Reverse the sort order
    #[arg(long, requires = "sort")]
    desc: bool,
  },
  /// Query a resource path, e.g. `item/3` or `classification-answer`
  Show { path: String },
  /// Record a classification for an item
  Classify {
    item_id: i64,
    /// question=answer, in order
    #[arg(long = "answer", value_parser = parse_pair)]
    answers: Vec<(String, String)>,
    /// question=checkbox, in order
    #[arg(long = "checkbox", value_parser = parse_pair)]
    checkboxes: Vec<(String, String)>,
    /// Mark the item skipped instead
    #[arg(long, conflicts_with_all = ["answers", "checkboxes"])]
    skip: bool,
  },
  /// Insert a row, e.g. `insert item subjectId=S1 locationStandardUriRemote=https://...`
  Insert {
    path: String,
    /// field=value; `null` and integers are recognised
    #[arg(value_parser = parse_pair, required = true)]
    values: Vec<(String, String)>,
  },
  /// Delete rows under a resource path
  Delete {
    path: String,
    /// field=value filters, all of which must match
    #[arg(long = "where", value_parser = parse_pair)]
    filters: Vec<(String, String)>,
  },
  /// Fetch another page of subjects in the background
  RequestMore,
  /// Retry missing image downloads periodically
  Sync {
    /// Run a single sweep and exit
    #[arg(long)]
    once: bool,
  },
  /// Print the backing path of a cached file
  File {
    id: i64,
    /// Write the file's bytes to stdout instead (same as `--mode r`)
    #[arg(long, conflicts_with = "mode")]
    cat: bool,
    /// Open mode: `r` prints the bytes; `w`, `rw` and `wa` fill the file from stdin
    #[arg(long, value_parser = parse_file_mode)]
    mode: Option<FileMode>,
    /// Fail unless the file can be served as this mime type, e.g. `image/*`
    #[arg(long)]
    accept: Option<String>,
  },
}

fn parse_pair(s: &str) -> std::result::Result<(String, String), String> {
  match s.split_once('=') {
    Some((k, v)) if !k.is_empty() && !v.is_empty() => Ok((k.to_string(), v.to_string())),
    _ => Err(format!("expected key=value, got '{}'", s)),
  }
}

fn parse_file_mode(s: &str) -> std::result::Result<FileMode, String> {
  s.parse().map_err(|e: error::MirrorError| e.to_string())
}

/// Log to a daily file in the data directory; stdout is for command output.
fn init_logging(config: &config::Config) -> Result<WorkerGuard> {
  let appender = tracing_appender::rolling::daily(config.log_dir()?, "gzm.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_env("GZM_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();
  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let mut config = config::Config::load(args.config.as_deref())?;
  if args.offline {
    config.network.offline = true;
  }

  let _guard = init_logging(&config)?;
  tracing::info!(command = ?args.command, "Starting");

  let app = app::App::new(config)?;
  match args.command {
    Command::Next => app.next().await?,
    Command::List { pending, sort, desc } => app.list(pending, sort.as_deref(), desc).await?,
    Command::Show { path } => app.show(&path).await?,
    Command::Classify {
      item_id,
      answers,
      checkboxes,
      skip,
    } => app.classify(item_id, &answers, &checkboxes, skip)?,
    Command::Insert { path, values } => app.insert(&path, &values).await?,
    Command::Delete { path, filters } => app.delete(&path, &filters)?,
    Command::RequestMore => app.request_more().await?,
    Command::Sync { once } => app.sync(once).await?,
    Command::File {
      id,
      cat,
      mode,
      accept,
    } => {
      let mode = if cat { Some(FileMode::Read) } else { mode };
      app.file(id, mode, accept.as_deref())?
    }
  }

  Ok(())
}
