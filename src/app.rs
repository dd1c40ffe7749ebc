use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::files::{FileCache, FileMode};
use crate::cache::traits::NetworkSwitch;
use crate::config::Config;
use crate::db::{Database, Value, Values};
use crate::error::MirrorError;
use crate::provider::columns::item as fields;
use crate::provider::item::Item;
use crate::provider::route::{Resource, PART_ITEM};
use crate::provider::selection::{Selection, SortOrder};
use crate::provider::{DownloadMode, ItemsProvider};
use crate::zooniverse::{EnvCredentials, ZooniverseClient};

/// How often `sync --once` checks whether its downloads have finished.
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Wires the store, the cache and the remote client together and runs
/// one command against them.
pub struct App {
  config: Config,
  provider: ItemsProvider,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let db = Arc::new(Database::open(&config.database_path()?)?);
    let files = FileCache::new(config.cache_dir()?);
    let remote = Arc::new(ZooniverseClient::new(
      &config.zooniverse.subjects_url,
      Arc::new(EnvCredentials),
    )?);
    let network = Arc::new(NetworkSwitch::new(!config.network.offline));

    // The runtime ends with the command, so refreshes wait for their images.
    let provider = ItemsProvider::new(db, files, remote, network)
      .with_page_size(config.zooniverse.page_size)
      .with_download_mode(DownloadMode::Sync);

    Ok(Self { config, provider })
  }

  /// Print the next item that still needs classifying.
  pub async fn next(&self) -> Result<()> {
    match self.provider.next_item().await? {
      Some(item) => {
        if !item.all_downloaded() {
          warn!(item = item.id, "Some images are not cached yet");
        }
        print_json(&item)
      }
      None => {
        println!("No items available.");
        Ok(())
      }
    }
  }

  pub async fn list(&self, pending_only: bool, sort: Option<&str>, descending: bool) -> Result<()> {
    let selection = if pending_only {
      Selection::new().ne(fields::DONE, true).ne(fields::SKIPPED, true)
    } else {
      Selection::new()
    };
    let sort = sort.map(|field| {
      if descending {
        SortOrder::descending(field)
      } else {
        SortOrder::ascending(field)
      }
    });
    let rows = self
      .provider
      .query(PART_ITEM, &[], &selection, sort.as_ref())
      .await?;
    let items: Vec<Item> = rows.iter().filter_map(Item::from_row).collect();
    print_json(&items)
  }

  /// Query any resource path.
  pub async fn show(&self, path: &str) -> Result<()> {
    let kind = self.provider.content_kind(path)?;
    if matches!(path.parse::<Resource>()?, Resource::File(_)) {
      let types = self.provider.stream_types(path, None)?;
      println!("{}\t{}", types.join(","), self.provider.file_path(path)?.display());
      return Ok(());
    }
    info!(path, kind = kind.mime(), "Querying");
    let rows = self.provider.query(path, &[], &Selection::new(), None).await?;
    print_json(&rows)
  }

  pub fn classify(
    &self,
    item_id: i64,
    answers: &[(String, String)],
    checkboxes: &[(String, String)],
    skip: bool,
  ) -> Result<()> {
    if skip {
      let affected = self.provider.update(
        &Resource::Item(item_id).to_string(),
        &Values::new().with(fields::SKIPPED, true),
        &Selection::new(),
      )?;
      if affected == 0 {
        return Err(eyre!("No item {}", item_id));
      }
      println!("Skipped item {}.", item_id);
      return Ok(());
    }

    self
      .provider
      .save_classification(item_id, answers, checkboxes)?;
    println!(
      "Classified item {} ({} answers, {} checkboxes).",
      item_id,
      answers.len(),
      checkboxes.len()
    );
    Ok(())
  }

  /// Insert one row; item downloads finish before the command returns.
  pub async fn insert(&self, path: &str, pairs: &[(String, String)]) -> Result<()> {
    let inserted = self.provider.insert(path, &values_from(pairs))?;
    self.drain().await;
    println!("{}", inserted);
    Ok(())
  }

  pub fn delete(&self, path: &str, filters: &[(String, String)]) -> Result<()> {
    let selection = filters
      .iter()
      .fold(Selection::new(), |sel, (field, raw)| sel.eq(field.as_str(), parse_value(raw)));
    let affected = self.provider.delete(path, &selection)?;
    println!("Deleted {} rows.", affected);
    Ok(())
  }

  /// Refresh in the background and report what it added.
  pub async fn request_more(&self) -> Result<()> {
    let mut changes = self.provider.subscribe(PART_ITEM);
    self
      .provider
      .request_more_items()
      .await
      .map_err(|e| eyre!("Refresh task failed: {}", e))?;

    let mut touched = BTreeSet::new();
    while let Ok(change) = changes.try_recv() {
      touched.insert(change.resource);
    }
    println!("{} items changed.", touched.len());
    Ok(())
  }

  /// Keep retrying missing image downloads.
  pub async fn sync(&self, once: bool) -> Result<()> {
    loop {
      let remaining = match self.provider.download_missing_images() {
        Ok(remaining) => remaining,
        Err(MirrorError::NoNetwork) => {
          info!("No network connection, skipping download sweep");
          false
        }
        Err(e) if e.is_recoverable() => {
          info!(error = %e, "Download sweep interrupted");
          true
        }
        Err(e) => {
          warn!(error = %e, "Download sweep failed");
          true
        }
      };

      if once {
        self.drain().await;
        println!(
          "{}",
          if remaining {
            "Images were missing; downloads attempted."
          } else {
            "All images downloaded."
          }
        );
        return Ok(());
      }

      let wait = self.config.sync.interval(remaining);
      info!(remaining, wait_secs = wait.as_secs(), "Sweep finished");
      tokio::select! {
        _ = tokio::time::sleep(wait) => {}
        _ = tokio::signal::ctrl_c() => {
          info!("Interrupted, stopping sync");
          return Ok(());
        }
      }
    }
  }

  /// Wait until no download is running.
  async fn drain(&self) {
    while self.provider.downloads().in_flight_count() > 0 {
      tokio::time::sleep(DRAIN_POLL).await;
    }
  }

  /// Print the backing path of a cached file. With a mode, read modes copy
  /// the bytes to stdout and write modes fill the file from stdin.
  pub fn file(&self, id: i64, mode: Option<FileMode>, accept: Option<&str>) -> Result<()> {
    let resource = Resource::File(id).to_string();
    if let Some(filter) = accept {
      if self.provider.stream_types(&resource, Some(filter))?.is_empty() {
        return Err(eyre!("{} cannot be served as {}", resource, filter));
      }
    }

    match mode {
      None => println!("{}", self.provider.file_path(&resource)?.display()),
      Some(mode) if mode.writes() => {
        let mut file = self.provider.open_file(&resource, mode)?;
        let written = io::copy(&mut io::stdin().lock(), &mut file)?;
        file.sync_all()?;
        info!(resource = %resource, written, "Stored file contents");
      }
      Some(mode) => {
        let mut file = self.provider.open_file(&resource, mode)?;
        let mut stdout = io::stdout().lock();
        io::copy(&mut file, &mut stdout)?;
        stdout.flush()?;
      }
    }
    Ok(())
  }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn values_from(pairs: &[(String, String)]) -> Values {
  let mut values = Values::new();
  for (field, raw) in pairs {
    values.put(field.as_str(), parse_value(raw));
  }
  values
}

/// Command-line values: `null`, integers, otherwise text.
fn parse_value(raw: &str) -> Value {
  if raw == "null" {
    return Value::Null;
  }
  raw
    .parse::<i64>()
    .map(Value::Integer)
    .unwrap_or_else(|_| Value::from(raw))
}
