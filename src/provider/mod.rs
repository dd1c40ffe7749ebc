//! Resource router over the item store.
//!
//! Every operation takes a resource path (`item`, `item/3`, `item/next`,
//! `file/7`, `classification-answer[/id]`, `classification-checkbox[/id]`),
//! translates external field names through the fixed mappings in [`columns`]
//! and runs against the store. Successful mutations are announced through the
//! [`ChangeNotifier`] after they commit.

pub mod columns;
pub mod item;
pub mod route;
pub mod selection;
mod sync;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::download::{DownloadCoordinator, DownloadRequest};
use crate::cache::files::{FileCache, FileMode};
use crate::cache::traits::{NetworkMonitor, RemoteService};
use crate::db::{self, Clause, Database, Row, Value, Values};
use crate::error::{MirrorError, Result};
use crate::event::{Change, ChangeNotifier};

use columns::{Table, ID, ITEMS};
use item::ImageType;
use route::{mime_matches, ContentKind, Resource, FILE_MIME_TYPES};
use selection::{Selection, SortOrder};

pub use sync::DownloadMode;

/// Subjects requested from the remote service per refresh.
pub const DEFAULT_PAGE_SIZE: usize = 5;

#[derive(Clone)]
pub struct ItemsProvider {
  db: Arc<Database>,
  files: FileCache,
  downloads: DownloadCoordinator,
  remote: Arc<dyn RemoteService>,
  notifier: Arc<ChangeNotifier>,
  page_size: usize,
  /// How refreshes wait for the images of the subjects they store.
  download_mode: DownloadMode,
}

impl ItemsProvider {
  pub fn new(
    db: Arc<Database>,
    files: FileCache,
    remote: Arc<dyn RemoteService>,
    network: Arc<dyn NetworkMonitor>,
  ) -> Self {
    let notifier = Arc::new(ChangeNotifier::new());
    let downloads = DownloadCoordinator::new(
      Arc::clone(&remote),
      network,
      Arc::clone(&db),
      Arc::clone(&notifier),
    );
    Self {
      db,
      files,
      downloads,
      remote,
      notifier,
      page_size: DEFAULT_PAGE_SIZE,
      download_mode: DownloadMode::Async,
    }
  }

  pub fn with_page_size(mut self, page_size: usize) -> Self {
    self.page_size = page_size.max(1);
    self
  }

  /// Short-lived callers use `DownloadMode::Sync` so refreshed images are on
  /// disk before the runtime goes away.
  pub fn with_download_mode(mut self, mode: DownloadMode) -> Self {
    self.download_mode = mode;
    self
  }

  /// Receive change notifications for `path` and, for collections, its elements.
  pub fn subscribe(&self, path: &str) -> mpsc::UnboundedReceiver<Change> {
    self.notifier.subscribe(path)
  }

  pub fn downloads(&self) -> &DownloadCoordinator {
    &self.downloads
  }

  #[cfg(test)]
  pub fn files(&self) -> &FileCache {
    &self.files
  }

  pub fn content_kind(&self, path: &str) -> Result<ContentKind> {
    Ok(path.parse::<Resource>()?.content_kind())
  }

  /// Mime types a cached file can be streamed as, narrowed by `filter`.
  pub fn stream_types(&self, path: &str, filter: Option<&str>) -> Result<Vec<&'static str>> {
    match path.parse::<Resource>()? {
      Resource::File(_) => Ok(
        FILE_MIME_TYPES
          .iter()
          .copied()
          .filter(|mime| filter.map_or(true, |f| mime_matches(f, mime)))
          .collect(),
      ),
      _ => Err(MirrorError::UnsupportedResource(path.to_string())),
    }
  }

  /// Open the bytes behind a `file/{id}` resource.
  pub fn open_file(&self, path: &str, mode: FileMode) -> Result<File> {
    let location = self.file_path(path)?;
    self.files.open(&location, mode)
  }

  /// Backing path of a `file/{id}` resource.
  pub fn file_path(&self, path: &str) -> Result<PathBuf> {
    let Resource::File(id) = path.parse::<Resource>()? else {
      return Err(MirrorError::UnsupportedResource(path.to_string()));
    };
    self
      .db
      .with_conn(|conn| self.files.path_for(conn, id))?
      .ok_or_else(|| MirrorError::StorageUnavailable(format!("no cached file for {}", path)))
  }

  /// Read rows. `item/next` may suspend while more items are fetched.
  pub async fn query(
    &self,
    path: &str,
    fields: &[&str],
    selection: &Selection,
    sort: Option<&SortOrder>,
  ) -> Result<Vec<Row>> {
    match path.parse::<Resource>()? {
      Resource::NextItem => self.next_rows(fields, selection).await,
      resource => self.query_local(resource, fields, selection, sort),
    }
  }

  fn query_local(
    &self,
    resource: Resource,
    fields: &[&str],
    selection: &Selection,
    sort: Option<&SortOrder>,
  ) -> Result<Vec<Row>> {
    let table = resource.table();
    let clause = scoped_clause(resource, selection)?;
    let columns = projection(table, fields);
    let order = SortOrder::resolve(sort, table);

    self
      .db
      .with_conn(|conn| db::select_rows(conn, table.name, &columns, &clause, Some(&order), None))
  }

  /// Insert one row into a collection and return its element path.
  pub fn insert(&self, path: &str, values: &Values) -> Result<Resource> {
    let resource = path.parse::<Resource>()?;
    match resource {
      Resource::Items => {
        let (id, requests) = self.persist_item(values)?;
        self.spawn_downloads(requests);
        Ok(Resource::Item(id))
      }
      Resource::ClassificationAnswers | Resource::ClassificationCheckboxes => {
        let table = resource.table();
        let row = table.writable(values, true);
        let id = self
          .db
          .with_conn(|conn| db::insert_row(conn, table.name, &row))?;
        let inserted = resource.element(id);
        self.notifier.notify(&inserted.to_string());
        Ok(inserted)
      }
      _ => Err(MirrorError::UnsupportedResource(path.to_string())),
    }
  }

  /// Write an item row plus its three cache placeholders in one transaction.
  ///
  /// Remote URIs come from `location*UriRemote`, or from `location*Uri` when a
  /// caller hands the remote address in the local slot. Either way the local
  /// slot ends up holding the placeholder identifier. Returns the downloads to
  /// start once the row is visible.
  fn persist_item(&self, values: &Values) -> Result<(i64, Vec<DownloadRequest>)> {
    if values.get_str(columns::item::SUBJECT_ID).is_none() {
      return Err(MirrorError::ConstraintViolation(format!(
        "{} is required",
        columns::item::SUBJECT_ID
      )));
    }

    let mut caller = values.clone();
    let mut remotes = Vec::with_capacity(ImageType::ALL.len());
    for image in ImageType::ALL {
      let remote = values
        .get_str(image.remote_uri_field())
        .or_else(|| values.get_str(image.uri_field()))
        .map(String::from);
      caller.remove(image.remote_uri_field());
      remotes.push((image, remote));
    }

    let mut created: Vec<PathBuf> = Vec::new();
    let result = self.db.transaction(|tx| {
      let mut row = ITEMS.writable(&caller, true);
      let mut pending = Vec::new();
      for (image, remote) in &remotes {
        let placeholder = self.files.create_placeholder(tx)?;
        created.push(placeholder.path.clone());
        row.push((image.uri_column(), Value::from(placeholder.uri())));
        row.push((image.remote_uri_column(), Value::from(remote.clone())));
        if let Some(uri) = remote {
          pending.push((*image, uri.clone(), placeholder.path));
        }
      }

      let id = db::insert_row(tx, ITEMS.name, &row)?;
      let requests = pending
        .into_iter()
        .map(|(image, remote_uri, target)| DownloadRequest {
          remote_uri,
          target,
          item_id: id,
          image,
        })
        .collect::<Vec<_>>();
      Ok((id, requests))
    });

    match result {
      Ok((id, requests)) => {
        debug!(item = id, downloads = requests.len(), "Inserted item");
        self.notifier.notify(&Resource::Item(id).to_string());
        Ok((id, requests))
      }
      Err(e) => {
        for path in &created {
          self.files.remove(path);
        }
        Err(e)
      }
    }
  }

  /// Update rows; single-element paths are scoped to that row.
  pub fn update(&self, path: &str, values: &Values, selection: &Selection) -> Result<usize> {
    let resource = path.parse::<Resource>()?;
    if matches!(resource, Resource::NextItem | Resource::File(_)) {
      return Err(MirrorError::UnsupportedResource(path.to_string()));
    }

    let table = resource.table();
    let sets = table.writable(values, false);
    let clause = scoped_clause(resource, selection)?;
    let affected = self
      .db
      .with_conn(|conn| db::update_rows(conn, table.name, &sets, &clause))?;

    if affected > 0 {
      self.notifier.notify(&resource.to_string());
    }
    Ok(affected)
  }

  /// Delete rows. Deleting items also removes their classifications and
  /// cached files.
  pub fn delete(&self, path: &str, selection: &Selection) -> Result<usize> {
    let resource = path.parse::<Resource>()?;
    match resource {
      Resource::Items | Resource::Item(_) => self.delete_items(resource, selection),
      Resource::ClassificationAnswers
      | Resource::ClassificationAnswer(_)
      | Resource::ClassificationCheckboxes
      | Resource::ClassificationCheckbox(_) => {
        let table = resource.table();
        let clause = scoped_clause(resource, selection)?;
        let affected = self
          .db
          .with_conn(|conn| db::delete_rows(conn, table.name, &clause))?;
        if affected > 0 {
          self.notifier.notify(&resource.to_string());
        }
        Ok(affected)
      }
      Resource::NextItem | Resource::File(_) => {
        Err(MirrorError::UnsupportedResource(path.to_string()))
      }
    }
  }

  fn delete_items(&self, resource: Resource, selection: &Selection) -> Result<usize> {
    let clause = scoped_clause(resource, selection)?;
    let mut fields = vec![ID];
    fields.extend(ImageType::ALL.iter().map(|i| i.uri_field()));
    let columns = ITEMS.projection(&fields);

    let (affected, paths, classifications) = self.db.transaction(|tx| {
      let rows = db::select_rows(tx, ITEMS.name, &columns, &clause, None, None)?;
      let mut paths = Vec::new();
      let mut classifications = 0;

      for row in &rows {
        let Some(item_id) = row.get(ID).and_then(Value::as_i64) else {
          continue;
        };
        classifications += tx.execute(
          "DELETE FROM classification_answers WHERE item_id = ?",
          [item_id],
        )?;
        classifications += tx.execute(
          "DELETE FROM classification_checkboxes WHERE item_id = ?",
          [item_id],
        )?;

        for image in ImageType::ALL {
          let uri = row.get(image.uri_field()).and_then(Value::as_str);
          if let Some(Ok(Resource::File(file_id))) = uri.map(str::parse::<Resource>) {
            if let Some(path) = self.files.path_for(tx, file_id)? {
              paths.push(path);
            }
            tx.execute("DELETE FROM files WHERE _id = ?", [file_id])?;
          }
        }
      }

      let affected = db::delete_rows(tx, ITEMS.name, &clause)?;
      Ok((affected, paths, classifications))
    })?;

    for path in &paths {
      self.files.remove(path);
    }

    if affected > 0 {
      info!(items = affected, files = paths.len(), "Deleted items");
      self.notifier.notify(&resource.to_string());
    }
    if classifications > 0 {
      self.notifier.notify(route::PART_CLASSIFICATION_ANSWER);
      self.notifier.notify(route::PART_CLASSIFICATION_CHECKBOX);
    }
    if !paths.is_empty() {
      self.notifier.notify(route::PART_FILE);
    }
    Ok(affected)
  }

  /// Start background downloads; failures only leave the flags unset.
  ///
  /// Without a tokio runtime nothing is started and the next sweep picks the
  /// images up.
  fn spawn_downloads(&self, requests: Vec<DownloadRequest>) {
    if requests.is_empty() {
      return;
    }
    if tokio::runtime::Handle::try_current().is_err() {
      info!(count = requests.len(), "No async runtime, deferring downloads to the next sweep");
      return;
    }
    for request in requests {
      let uri = request.remote_uri.clone();
      match self.downloads.spawn(request) {
        Ok(Some(_)) | Ok(None) => {}
        Err(MirrorError::NoNetwork) => {
          // Normal when offline; the next sweep picks it up.
          info!(uri = %uri, "No network connection, deferring download");
        }
        Err(e) => warn!(uri = %uri, error = %e, "Could not start download"),
      }
    }
  }

  /// Run downloads to completion, concurrently.
  async fn await_downloads(&self, requests: Vec<DownloadRequest>) {
    let fetches = requests.into_iter().map(|request| {
      let uri = request.remote_uri.clone();
      async move { (uri, self.downloads.fetch(request).await) }
    });

    for (uri, result) in futures::future::join_all(fetches).await {
      match result {
        Ok(_) => {}
        Err(MirrorError::NoNetwork) => {
          info!(uri = %uri, "No network connection, deferring download")
        }
        Err(e) => warn!(uri = %uri, error = %e, "Image download failed"),
      }
    }
  }
}

/// Prepend `_id = ?` for single-element resources.
fn scoped_clause(resource: Resource, selection: &Selection) -> Result<Clause> {
  let caller = selection.to_clause(resource.table())?;
  Ok(match resource.id() {
    Some(id) => Clause::new(format!("{} = ?", ID), vec![Value::Integer(id)]).and(caller),
    None => caller,
  })
}

/// A projection that always selects at least the id.
fn projection(table: &Table, fields: &[&str]) -> Vec<(&'static str, &'static str)> {
  let columns = table.projection(fields);
  if columns.is_empty() {
    return table.projection(&[ID]);
  }
  columns
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::traits::NetworkSwitch;
  use crate::test_support::MockRemote;
  use columns::{classification, item as item_fields};
  use std::io::Read;

  pub(crate) struct Fixture {
    pub _dir: tempfile::TempDir,
    pub provider: ItemsProvider,
    pub remote: Arc<MockRemote>,
    pub network: Arc<NetworkSwitch>,
  }

  pub(crate) fn fixture(remote: MockRemote) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open_in_memory().unwrap());
    let remote = Arc::new(remote);
    let network = Arc::new(NetworkSwitch::new(true));
    let provider = ItemsProvider::new(
      db,
      FileCache::new(dir.path().join("files")),
      remote.clone(),
      network.clone(),
    );
    Fixture {
      _dir: dir,
      provider,
      remote,
      network,
    }
  }

  fn count(f: &Fixture, table: &str) -> i64 {
    f.provider
      .db
      .with_conn(|conn| {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
          row.get(0)
        })?)
      })
      .unwrap()
  }

  fn text<'a>(row: &'a Row, field: &str) -> &'a str {
    row[field].as_str().unwrap()
  }

  #[tokio::test]
  async fn test_insert_item_replaces_remote_uri_with_local_file() {
    let f = fixture(MockRemote::new());
    f.network.set_available(false);

    let values = Values::new()
      .with(item_fields::SUBJECT_ID, "S1")
      .with(item_fields::LOCATION_STANDARD_URI, "http://x/a.png");
    let inserted = f.provider.insert("item", &values).unwrap();
    assert!(matches!(inserted, Resource::Item(_)));

    let rows = f
      .provider
      .query("item", &[], &Selection::new(), None)
      .await
      .unwrap();
    assert_eq!(rows.len(), 1);
    let local = text(&rows[0], item_fields::LOCATION_STANDARD_URI);
    assert_ne!(local, "http://x/a.png");
    assert!(local.starts_with("file/"));
    assert_eq!(
      text(&rows[0], item_fields::LOCATION_STANDARD_URI_REMOTE),
      "http://x/a.png"
    );

    // Three placeholders, one per slot, all resolvable.
    assert_eq!(count(&f, "files"), 3);
    for image in ImageType::ALL {
      let uri = text(&rows[0], image.uri_field());
      assert!(f.provider.file_path(uri).unwrap().exists());
    }
  }

  #[tokio::test]
  async fn test_insert_item_starts_background_downloads() {
    let f = fixture(MockRemote::new());
    let mut changes = f.provider.subscribe("item");

    let values = Values::new()
      .with(item_fields::SUBJECT_ID, "S1")
      .with(item_fields::LOCATION_THUMBNAIL_URI_REMOTE, "http://x/t.jpg");
    let inserted = f.provider.insert("item", &values).unwrap();

    // insert notification, then the download completion
    assert_eq!(changes.recv().await.unwrap().resource, inserted.to_string());
    assert_eq!(changes.recv().await.unwrap().resource, inserted.to_string());

    let rows = f
      .provider
      .query(&inserted.to_string(), &[], &Selection::new(), None)
      .await
      .unwrap();
    assert!(rows[0][item_fields::LOCATION_THUMBNAIL_DOWNLOADED].as_bool());
    assert!(!rows[0][item_fields::LOCATION_STANDARD_DOWNLOADED].as_bool());

    let mut bytes = Vec::new();
    f.provider
      .open_file(text(&rows[0], item_fields::LOCATION_THUMBNAIL_URI), FileMode::Read)
      .unwrap()
      .read_to_end(&mut bytes)
      .unwrap();
    assert_eq!(bytes, MockRemote::bytes_for("http://x/t.jpg"));
    assert_eq!(f.remote.byte_calls(), 1);
  }

  #[tokio::test]
  async fn test_insert_without_subject_writes_nothing() {
    let f = fixture(MockRemote::new());
    let err = f
      .provider
      .insert("item", &Values::new().with(item_fields::ZOONIVERSE_ID, "AGZ1"))
      .unwrap_err();
    assert!(matches!(err, MirrorError::ConstraintViolation(_)));
    assert_eq!(count(&f, "items"), 0);
    assert_eq!(count(&f, "files"), 0);
  }

  #[tokio::test]
  async fn test_duplicate_subject_rolls_back_placeholders() {
    let f = fixture(MockRemote::new());
    f.network.set_available(false);
    let values = Values::new().with(item_fields::SUBJECT_ID, "S1");
    f.provider.insert("item", &values).unwrap();

    let err = f.provider.insert("item", &values).unwrap_err();
    assert!(matches!(err, MirrorError::ConstraintViolation(_)));
    assert_eq!(count(&f, "items"), 1);
    assert_eq!(count(&f, "files"), 3);
    let leftover = std::fs::read_dir(f.provider.files().root()).unwrap().count();
    assert_eq!(leftover, 3);
  }

  #[tokio::test]
  async fn test_update_ignores_unknown_and_protected_fields() {
    let f = fixture(MockRemote::new());
    f.network.set_available(false);
    let item = f
      .provider
      .insert("item", &Values::new().with(item_fields::SUBJECT_ID, "S1"))
      .unwrap();

    let affected = f
      .provider
      .update(
        &item.to_string(),
        &Values::new().with("favouriteColour", "green"),
        &Selection::new(),
      )
      .unwrap();
    assert_eq!(affected, 0);

    let affected = f
      .provider
      .update(
        &item.to_string(),
        &Values::new()
          .with(item_fields::DONE, true)
          .with(item_fields::LOCATION_STANDARD_DOWNLOADED, true)
          .with(item_fields::SUBJECT_ID, "hijacked"),
        &Selection::new(),
      )
      .unwrap();
    assert_eq!(affected, 1);

    let rows = f
      .provider
      .query(&item.to_string(), &[], &Selection::new(), None)
      .await
      .unwrap();
    assert!(rows[0][item_fields::DONE].as_bool());
    assert!(!rows[0][item_fields::LOCATION_STANDARD_DOWNLOADED].as_bool());
    assert_eq!(text(&rows[0], item_fields::SUBJECT_ID), "S1");
  }

  #[tokio::test]
  async fn test_single_element_scope_and_caller_selection() {
    let f = fixture(MockRemote::new());
    f.network.set_available(false);
    let a = f
      .provider
      .insert("item", &Values::new().with(item_fields::SUBJECT_ID, "A"))
      .unwrap();
    f.provider
      .insert("item", &Values::new().with(item_fields::SUBJECT_ID, "B"))
      .unwrap();

    // id predicate wins even if the caller's selection matches other rows
    let affected = f
      .provider
      .update(
        &a.to_string(),
        &Values::new().with(item_fields::SKIPPED, true),
        &Selection::new().eq(item_fields::DONE, false),
      )
      .unwrap();
    assert_eq!(affected, 1);

    let skipped = f
      .provider
      .query(
        "item",
        &[item_fields::SUBJECT_ID],
        &Selection::new().eq(item_fields::SKIPPED, true),
        None,
      )
      .await
      .unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(text(&skipped[0], item_fields::SUBJECT_ID), "A");
    // projection only returns what was asked for
    assert_eq!(skipped[0].len(), 1);
  }

  #[tokio::test]
  async fn test_query_sort_orders() {
    let f = fixture(MockRemote::new());
    f.network.set_available(false);
    for s in ["B", "C", "A"] {
      f.provider
        .insert("item", &Values::new().with(item_fields::SUBJECT_ID, s))
        .unwrap();
    }

    let newest_first = f
      .provider
      .query("item", &[item_fields::SUBJECT_ID], &Selection::new(), None)
      .await
      .unwrap();
    let ids: Vec<&str> = newest_first.iter().map(|r| text(r, item_fields::SUBJECT_ID)).collect();
    assert_eq!(ids, vec!["A", "C", "B"]);

    let by_subject = f
      .provider
      .query(
        "item",
        &[item_fields::SUBJECT_ID],
        &Selection::new(),
        Some(&SortOrder::ascending(item_fields::SUBJECT_ID)),
      )
      .await
      .unwrap();
    let ids: Vec<&str> = by_subject.iter().map(|r| text(r, item_fields::SUBJECT_ID)).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
  }

  #[tokio::test]
  async fn test_classification_rows() {
    let f = fixture(MockRemote::new());
    let mut changes = f.provider.subscribe("classification-answer");

    for (sequence, answer) in ["a-1", "a-2"].iter().enumerate() {
      f.provider
        .insert(
          "classification-answer",
          &Values::new()
            .with(classification::ITEM_ID, 1i64)
            .with(classification::SEQUENCE, sequence as i64)
            .with(classification::QUESTION_ID, "sloan-0")
            .with(classification::ANSWER_ID, *answer),
        )
        .unwrap();
    }
    assert_eq!(changes.recv().await.unwrap().resource, "classification-answer/1");

    let rows = f
      .provider
      .query(
        "classification-answer",
        &[classification::ANSWER_ID],
        &Selection::new().eq(classification::ITEM_ID, 1i64),
        Some(&SortOrder::ascending(classification::SEQUENCE)),
      )
      .await
      .unwrap();
    let answers: Vec<&str> = rows.iter().map(|r| text(r, classification::ANSWER_ID)).collect();
    assert_eq!(answers, vec!["a-1", "a-2"]);

    let missing_question = f.provider.insert(
      "classification-checkbox",
      &Values::new().with(classification::ITEM_ID, 1i64),
    );
    assert!(matches!(missing_question, Err(MirrorError::ConstraintViolation(_))));

    assert_eq!(
      f.provider
        .delete("classification-answer/1", &Selection::new())
        .unwrap(),
      1
    );
    assert_eq!(count(&f, "classification_answers"), 1);
  }

  #[tokio::test]
  async fn test_delete_items_cascades() {
    let f = fixture(MockRemote::new());
    f.network.set_available(false);
    let item = f
      .provider
      .insert("item", &Values::new().with(item_fields::SUBJECT_ID, "S1"))
      .unwrap();
    let item_id = item.id().unwrap();
    f.provider
      .insert(
        "classification-checkbox",
        &Values::new()
          .with(classification::ITEM_ID, item_id)
          .with(classification::QUESTION_ID, "q")
          .with(classification::CHECKBOX_ID, "c"),
      )
      .unwrap();
    let mut file_changes = f.provider.subscribe("file");

    assert_eq!(f.provider.delete("item", &Selection::new()).unwrap(), 1);

    assert_eq!(count(&f, "items"), 0);
    assert_eq!(count(&f, "files"), 0);
    assert_eq!(count(&f, "classification_checkboxes"), 0);
    assert_eq!(std::fs::read_dir(f.provider.files().root()).unwrap().count(), 0);
    assert_eq!(file_changes.recv().await.unwrap().resource, "file");
  }

  #[tokio::test]
  async fn test_unsupported_operations() {
    let f = fixture(MockRemote::new());
    let unsupported = |r: Result<usize>| matches!(r, Err(MirrorError::UnsupportedResource(_)));

    assert!(unsupported(f.provider.update("file/1", &Values::new(), &Selection::new())));
    assert!(unsupported(f.provider.delete("item/next", &Selection::new())));
    assert!(unsupported(f.provider.delete("items", &Selection::new())));
    assert!(matches!(
      f.provider.insert("item/3", &Values::new()),
      Err(MirrorError::UnsupportedResource(_))
    ));
    assert!(matches!(
      f.provider.query("bogus/1", &[], &Selection::new(), None).await,
      Err(MirrorError::UnsupportedResource(_))
    ));
  }

  #[tokio::test]
  async fn test_content_kinds_and_stream_types() {
    let f = fixture(MockRemote::new());
    assert_eq!(f.provider.content_kind("item").unwrap(), ContentKind::ItemList);
    assert_eq!(f.provider.content_kind("item/next").unwrap(), ContentKind::Item);
    assert_eq!(
      f.provider.content_kind("classification-checkbox/2").unwrap().mime(),
      "vnd.galaxyzoo.entry/classification-checkbox"
    );
    assert_eq!(f.provider.stream_types("file/1", Some("image/*")).unwrap(), vec!["image/jpeg"]);
    assert!(f.provider.stream_types("file/1", Some("text/*")).unwrap().is_empty());
    assert!(f.provider.stream_types("item/1", None).is_err());
  }

  #[test]
  fn test_insert_outside_runtime_defers_downloads() {
    let f = fixture(MockRemote::new());

    let values = Values::new()
      .with(item_fields::SUBJECT_ID, "S1")
      .with(item_fields::LOCATION_STANDARD_URI_REMOTE, "http://x/a.jpg");
    let inserted = f.provider.insert("item", &values).unwrap();

    assert!(!f.provider.downloads().is_in_progress("http://x/a.jpg"));
    assert_eq!(f.remote.byte_calls(), 0);
    let rows = f
      .provider
      .query_local(inserted, &[], &Selection::new(), None)
      .unwrap();
    assert!(!rows[0][item_fields::LOCATION_STANDARD_DOWNLOADED].as_bool());
    assert_eq!(
      text(&rows[0], item_fields::LOCATION_STANDARD_URI_REMOTE),
      "http://x/a.jpg"
    );
  }
}
