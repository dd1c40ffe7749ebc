//! Keeping the local queue stocked: fetching subjects, ingesting them and
//! sweeping for images that never finished downloading.

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::columns::{item as fields, ID, ITEMS};
use super::item::{ImageType, Item};
use super::route::Resource;
use super::selection::Selection;
use super::{projection, ItemsProvider};
use crate::cache::download::DownloadRequest;
use crate::db::{self, Clause, Row, Value, Values};
use crate::error::{MirrorError, Result};
use crate::zooniverse::types::SubjectDescriptor;

/// Whether ingestion waits for the image downloads it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
  Sync,
  Async,
}

impl ItemsProvider {
  /// The newest item that is neither done nor skipped, refreshing from the
  /// remote service once when none is left locally.
  pub async fn next_item(&self) -> Result<Option<Item>> {
    let rows = self.next_rows(&[], &Selection::new()).await?;
    Ok(rows.first().and_then(Item::from_row))
  }

  pub(super) async fn next_rows(&self, fields: &[&str], selection: &Selection) -> Result<Vec<Row>> {
    let rows = self.pending_rows(fields, selection)?;
    if !rows.is_empty() {
      return Ok(rows);
    }

    debug!("No pending items, requesting more");
    if let Err(e) = self.request_items().await {
      log_refresh_error(&e);
    }
    self.pending_rows(fields, selection)
  }

  fn pending_rows(&self, fields: &[&str], selection: &Selection) -> Result<Vec<Row>> {
    let pending = Clause::new("done != 1 AND skipped != 1", Vec::new());
    let clause = pending.and(selection.to_clause(&ITEMS)?);
    let columns = projection(&ITEMS, fields);
    self.db.with_conn(|conn| {
      db::select_rows(
        conn,
        ITEMS.name,
        &columns,
        &clause,
        Some(super::columns::DEFAULT_SORT_ORDER),
        Some(1),
      )
    })
  }

  /// Fetch one page of subjects and ingest them, downloading images per the
  /// provider's download mode. Returns how many new items were stored.
  pub async fn request_items(&self) -> Result<usize> {
    if !self.downloads.has_usable_network() {
      return Err(MirrorError::NoNetwork);
    }

    let subjects = self.remote.fetch_subjects(self.page_size).await?;
    info!(count = subjects.len(), "Fetched subjects");
    Ok(self.add_subjects(&subjects, self.download_mode).await)
  }

  /// Refresh in the background.
  pub fn request_more_items(&self) -> JoinHandle<()> {
    let this = self.clone();
    tokio::spawn(async move {
      if let Err(e) = this.request_items().await {
        log_refresh_error(&e);
      }
    })
  }

  /// Ingest each subject, skipping the ones that fail.
  pub async fn add_subjects(&self, subjects: &[SubjectDescriptor], mode: DownloadMode) -> usize {
    let mut added = 0;
    for subject in subjects {
      match self.add_subject(subject, mode).await {
        Ok(true) => added += 1,
        Ok(false) => {}
        Err(e) => warn!(subject = %subject.subject_id, error = %e, "Failed to store subject"),
      }
    }
    added
  }

  /// Store a subject unless an item for it already exists.
  ///
  /// Returns `Ok(false)` for duplicates, including one that lands between
  /// the existence check and the insert. Download failures are logged and do
  /// not fail the call.
  pub async fn add_subject(&self, subject: &SubjectDescriptor, mode: DownloadMode) -> Result<bool> {
    if self.subject_is_in_database(&subject.subject_id)? {
      debug!(subject = %subject.subject_id, "Subject already stored");
      return Ok(false);
    }

    let values = Values::new()
      .with(fields::SUBJECT_ID, subject.subject_id.as_str())
      .with(fields::ZOONIVERSE_ID, subject.zooniverse_id.as_str())
      .with(fields::DONE, false)
      .with(fields::SKIPPED, false)
      .with(fields::LOCATION_STANDARD_URI_REMOTE, subject.standard_uri.clone())
      .with(fields::LOCATION_THUMBNAIL_URI_REMOTE, subject.thumbnail_uri.clone())
      .with(fields::LOCATION_INVERTED_URI_REMOTE, subject.inverted_uri.clone());

    let requests = match self.persist_item(&values) {
      Ok((_, requests)) => requests,
      Err(MirrorError::ConstraintViolation(reason))
        if self.subject_is_in_database(&subject.subject_id)? =>
      {
        debug!(subject = %subject.subject_id, reason = %reason, "Subject stored concurrently");
        return Ok(false);
      }
      Err(e) => return Err(e),
    };

    match mode {
      DownloadMode::Sync => self.await_downloads(requests).await,
      DownloadMode::Async => self.spawn_downloads(requests),
    }
    Ok(true)
  }

  pub fn subject_is_in_database(&self, subject_id: &str) -> Result<bool> {
    self.db.with_conn(|conn| {
      Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM items WHERE subject_id = ?)",
        [subject_id],
        |row| row.get(0),
      )?)
    })
  }

  /// Restart downloads for every image slot that has a remote URI but no
  /// local copy yet. Returns whether any such slot was found.
  pub fn download_missing_images(&self) -> Result<bool> {
    if !self.downloads.has_usable_network() {
      return Err(MirrorError::NoNetwork);
    }

    let incomplete = Clause::new(
      ImageType::ALL
        .iter()
        .map(|image| format!("{} != 1", image.downloaded_column()))
        .collect::<Vec<_>>()
        .join(" OR "),
      Vec::new(),
    );
    let columns = ITEMS.projection(&[]);

    let requests = self.db.with_conn(|conn| {
      let rows = db::select_rows(conn, ITEMS.name, &columns, &incomplete, None, None)?;
      let mut requests = Vec::new();
      let mut pending = false;

      for item in rows.iter().filter_map(Item::from_row) {
        for image in ImageType::ALL {
          let asset = item.asset(image);
          let (Some(remote_uri), Some(local_uri), false) =
            (&asset.remote_uri, &asset.uri, asset.downloaded)
          else {
            continue;
          };
          pending = true;
          if self.downloads.is_in_progress(remote_uri) {
            continue;
          }
          match self.files.resolve_uri(conn, local_uri)? {
            Some(target) => requests.push(DownloadRequest {
              remote_uri: remote_uri.clone(),
              target,
              item_id: item.id,
              image,
            }),
            None => warn!(item = item.id, image = %image, "Cache record missing for image"),
          }
        }
      }
      Ok((pending, requests))
    });

    let (pending, requests) = requests?;
    if !requests.is_empty() {
      info!(count = requests.len(), "Restarting image downloads");
    }
    self.spawn_downloads(requests);
    Ok(pending)
  }

  /// Mark an item classified and store its answers in one transaction.
  pub fn save_classification(
    &self,
    item_id: i64,
    answers: &[(String, String)],
    checkboxes: &[(String, String)],
  ) -> Result<()> {
    use super::columns::{classification, CLASSIFICATION_ANSWERS, CLASSIFICATION_CHECKBOXES};

    self.db.transaction(|tx| {
      let affected = db::update_rows(
        tx,
        ITEMS.name,
        &[("done", Value::from(true))],
        &Clause::new(format!("{} = ?", ID), vec![Value::Integer(item_id)]),
      )?;
      if affected == 0 {
        return Err(MirrorError::ConstraintViolation(format!("no item {}", item_id)));
      }

      for (sequence, (question, answer)) in answers.iter().enumerate() {
        let row = CLASSIFICATION_ANSWERS.writable(
          &Values::new()
            .with(classification::ITEM_ID, item_id)
            .with(classification::SEQUENCE, sequence as i64)
            .with(classification::QUESTION_ID, question.as_str())
            .with(classification::ANSWER_ID, answer.as_str()),
          true,
        );
        db::insert_row(tx, CLASSIFICATION_ANSWERS.name, &row)?;
      }
      for (sequence, (question, checkbox)) in checkboxes.iter().enumerate() {
        let row = CLASSIFICATION_CHECKBOXES.writable(
          &Values::new()
            .with(classification::ITEM_ID, item_id)
            .with(classification::SEQUENCE, sequence as i64)
            .with(classification::QUESTION_ID, question.as_str())
            .with(classification::CHECKBOX_ID, checkbox.as_str()),
          true,
        );
        db::insert_row(tx, CLASSIFICATION_CHECKBOXES.name, &row)?;
      }
      Ok(())
    })?;

    self.notifier.notify(&Resource::Item(item_id).to_string());
    if !answers.is_empty() {
      self.notifier.notify(super::route::PART_CLASSIFICATION_ANSWER);
    }
    if !checkboxes.is_empty() {
      self.notifier.notify(super::route::PART_CLASSIFICATION_CHECKBOX);
    }
    Ok(())
  }
}

fn log_refresh_error(e: &MirrorError) {
  match e {
    MirrorError::NoNetwork => info!("No network connection, not requesting more items"),
    other => warn!(error = %other, "Failed to request more items"),
  }
}
