//! Download coordinator: fills cache placeholders from remote URIs.
//!
//! At most one download per remote URI is in flight across the process. The
//! in-flight marker is taken before any network traffic and released by a
//! guard, so it also goes away when a download fails, panics or is cancelled.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::traits::{NetworkMonitor, RemoteService};
use crate::db::Database;
use crate::error::{MirrorError, Result};
use crate::event::ChangeNotifier;
use crate::provider::item::ImageType;
use crate::provider::route::Resource;

type InFlight = Arc<Mutex<HashMap<String, DateTime<Utc>>>>;

/// `<target>.part`
fn staging_path(target: &Path) -> PathBuf {
  let mut name = target.as_os_str().to_owned();
  name.push(".part");
  PathBuf::from(name)
}

/// One image to fetch into one placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
  pub remote_uri: String,
  /// Backing file of the placeholder; overwritten in place.
  pub target: PathBuf,
  /// Item whose downloaded flag is set on success.
  pub item_id: i64,
  pub image: ImageType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
  Downloaded,
  /// Another download of the same URI is running and will satisfy this one.
  AlreadyInFlight,
}

/// Removes the in-flight marker when dropped.
struct InFlightGuard {
  in_flight: InFlight,
  uri: String,
}

impl Drop for InFlightGuard {
  fn drop(&mut self) {
    let mut map = self
      .in_flight
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    map.remove(&self.uri);
  }
}

#[derive(Clone)]
pub struct DownloadCoordinator {
  in_flight: InFlight,
  remote: Arc<dyn RemoteService>,
  network: Arc<dyn NetworkMonitor>,
  db: Arc<Database>,
  notifier: Arc<ChangeNotifier>,
}

impl DownloadCoordinator {
  pub fn new(
    remote: Arc<dyn RemoteService>,
    network: Arc<dyn NetworkMonitor>,
    db: Arc<Database>,
    notifier: Arc<ChangeNotifier>,
  ) -> Self {
    Self {
      in_flight: Arc::new(Mutex::new(HashMap::new())),
      remote,
      network,
      db,
      notifier,
    }
  }

  pub fn is_in_progress(&self, remote_uri: &str) -> bool {
    self.in_flight_since(remote_uri).is_some()
  }

  /// When the running download of `remote_uri` started.
  pub fn in_flight_since(&self, remote_uri: &str) -> Option<DateTime<Utc>> {
    self
      .in_flight
      .lock()
      .ok()
      .and_then(|map| map.get(remote_uri).copied())
  }

  /// Number of downloads currently running.
  pub fn in_flight_count(&self) -> usize {
    self.in_flight.lock().map(|map| map.len()).unwrap_or(0)
  }

  pub fn has_usable_network(&self) -> bool {
    self.network.has_usable_network()
  }

  /// Check-and-insert the in-flight marker.
  fn begin(&self, remote_uri: &str) -> Result<Option<InFlightGuard>> {
    let mut map = self.in_flight.lock()?;
    if map.contains_key(remote_uri) {
      debug!(uri = remote_uri, "Download already in progress");
      return Ok(None);
    }
    if !self.network.has_usable_network() {
      return Err(MirrorError::NoNetwork);
    }
    map.insert(remote_uri.to_string(), Utc::now());

    Ok(Some(InFlightGuard {
      in_flight: Arc::clone(&self.in_flight),
      uri: remote_uri.to_string(),
    }))
  }

  /// Download and wait for the result.
  pub async fn fetch(&self, request: DownloadRequest) -> Result<FetchStatus> {
    let Some(guard) = self.begin(&request.remote_uri)? else {
      return Ok(FetchStatus::AlreadyInFlight);
    };
    self.run(guard, &request).await?;
    Ok(FetchStatus::Downloaded)
  }

  /// Start a background download.
  ///
  /// The dedup check happens before the task is spawned. Returns `None` when
  /// the URI is already being fetched; otherwise the handle resolves to
  /// whether the download succeeded.
  pub fn spawn(&self, request: DownloadRequest) -> Result<Option<JoinHandle<bool>>> {
    let Some(guard) = self.begin(&request.remote_uri)? else {
      return Ok(None);
    };

    let this = self.clone();
    let handle = tokio::spawn(async move {
      match this.run(guard, &request).await {
        Ok(()) => true,
        Err(e) => {
          warn!(uri = %request.remote_uri, error = %e, "Image download failed");
          false
        }
      }
    });
    Ok(Some(handle))
  }

  async fn run(&self, guard: InFlightGuard, request: &DownloadRequest) -> Result<()> {
    info!(uri = %request.remote_uri, image = %request.image, item = request.item_id, "Downloading image");

    let bytes = self
      .remote
      .fetch_bytes(&request.remote_uri)
      .await
      .map_err(|e| match e {
        MirrorError::FetchFailure { .. } | MirrorError::NoNetwork => e,
        other => MirrorError::FetchFailure {
          uri: request.remote_uri.clone(),
          reason: other.to_string(),
        },
      })?;

    self.write_target(request, &bytes).await?;
    self.mark_downloaded(request.item_id, request.image)?;

    drop(guard);
    Ok(())
  }

  /// Stage the bytes next to the placeholder and rename them over it, so a
  /// failed write never leaves a partial image behind.
  async fn write_target(&self, request: &DownloadRequest, bytes: &[u8]) -> Result<()> {
    let storage_err = |e: std::io::Error| {
      MirrorError::StorageUnavailable(format!(
        "failed to write {}: {}",
        request.target.display(),
        e
      ))
    };
    // The placeholder must still exist; its item may have been deleted.
    tokio::fs::metadata(&request.target)
      .await
      .map_err(storage_err)?;

    let staging = staging_path(&request.target);
    let written = async {
      let mut file = tokio::fs::File::create(&staging).await?;
      file.write_all(bytes).await?;
      file.sync_all().await?;
      drop(file);
      tokio::fs::rename(&staging, &request.target).await
    }
    .await;

    if let Err(e) = written {
      let _ = tokio::fs::remove_file(&staging).await;
      return Err(storage_err(e));
    }
    Ok(())
  }

  /// Flip the item's flag to downloaded. Never sets it back to false.
  fn mark_downloaded(&self, item_id: i64, image: ImageType) -> Result<()> {
    let sql = format!(
      "UPDATE items SET {} = 1 WHERE _id = ?",
      image.downloaded_column()
    );
    let affected = self.db.with_conn(|conn| Ok(conn.execute(&sql, [item_id])?))?;
    if affected != 1 {
      warn!(item = item_id, image = %image, "Failed to mark image as downloaded");
      return Ok(());
    }
    self.notifier.notify(&Resource::Item(item_id).to_string());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::files::FileCache;
  use crate::cache::traits::NetworkSwitch;
  use crate::db::{self, Value};
  use crate::test_support::MockRemote;
  use std::time::Duration;

  struct Fixture {
    _dir: tempfile::TempDir,
    db: Arc<Database>,
    notifier: Arc<ChangeNotifier>,
    network: Arc<NetworkSwitch>,
    remote: Arc<MockRemote>,
    coordinator: DownloadCoordinator,
    request: DownloadRequest,
  }

  fn fixture(remote: MockRemote) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open_in_memory().unwrap());
    let notifier = Arc::new(ChangeNotifier::new());
    let network = Arc::new(NetworkSwitch::new(true));
    let remote = Arc::new(remote);
    let cache = FileCache::new(dir.path());

    let (item_id, placeholder) = db
      .with_conn(|conn| {
        let placeholder = cache.create_placeholder(conn)?;
        let id = db::insert_row(
          conn,
          "items",
          &[
            ("subject_id", Value::from("S1")),
            ("location_standard_uri", Value::from(placeholder.uri())),
          ],
        )?;
        Ok((id, placeholder))
      })
      .unwrap();

    let coordinator = DownloadCoordinator::new(
      remote.clone(),
      network.clone(),
      db.clone(),
      notifier.clone(),
    );
    let request = DownloadRequest {
      remote_uri: "http://example.com/a.jpg".into(),
      target: placeholder.path,
      item_id,
      image: ImageType::Standard,
    };

    Fixture {
      _dir: dir,
      db,
      notifier,
      network,
      remote,
      coordinator,
      request,
    }
  }

  fn standard_downloaded(f: &Fixture) -> bool {
    f.db
      .with_conn(|conn| {
        Ok(conn.query_row(
          "SELECT location_standard_downloaded FROM items WHERE _id = ?",
          [f.request.item_id],
          |row| row.get::<_, bool>(0),
        )?)
      })
      .unwrap()
  }

  #[tokio::test]
  async fn test_fetch_writes_bytes_and_marks_item() {
    let f = fixture(MockRemote::new());
    let mut changes = f.notifier.subscribe("item");

    let status = f.coordinator.fetch(f.request.clone()).await.unwrap();

    assert_eq!(status, FetchStatus::Downloaded);
    assert_eq!(
      std::fs::read(&f.request.target).unwrap(),
      MockRemote::bytes_for(&f.request.remote_uri)
    );
    assert!(standard_downloaded(&f));
    assert!(!f.coordinator.is_in_progress(&f.request.remote_uri));
    assert_eq!(
      changes.recv().await.unwrap().resource,
      format!("item/{}", f.request.item_id)
    );
  }

  #[tokio::test]
  async fn test_concurrent_fetches_share_one_download() {
    let f = fixture(MockRemote::new().with_delay(Duration::from_millis(50)));

    let (a, b) = tokio::join!(
      f.coordinator.fetch(f.request.clone()),
      f.coordinator.fetch(f.request.clone())
    );

    let mut statuses = vec![a.unwrap(), b.unwrap()];
    statuses.sort_by_key(|s| *s == FetchStatus::Downloaded);
    assert_eq!(
      statuses,
      vec![FetchStatus::AlreadyInFlight, FetchStatus::Downloaded]
    );
    assert_eq!(f.remote.byte_calls(), 1);
  }

  #[tokio::test]
  async fn test_spawn_dedups_before_dispatch() {
    let f = fixture(MockRemote::new().with_delay(Duration::from_millis(50)));

    let handle = f.coordinator.spawn(f.request.clone()).unwrap().unwrap();
    assert!(f.coordinator.is_in_progress(&f.request.remote_uri));
    assert!(f.coordinator.in_flight_since(&f.request.remote_uri).is_some());
    assert!(f.coordinator.spawn(f.request.clone()).unwrap().is_none());
    assert_eq!(f.coordinator.in_flight_count(), 1);

    assert!(handle.await.unwrap());
    assert!(!f.coordinator.is_in_progress(&f.request.remote_uri));
    assert_eq!(f.remote.byte_calls(), 1);
    assert!(standard_downloaded(&f));
  }

  #[tokio::test]
  async fn test_no_network_fails_fast() {
    let f = fixture(MockRemote::new());
    f.network.set_available(false);

    let err = f.coordinator.fetch(f.request.clone()).await.unwrap_err();
    assert!(matches!(err, MirrorError::NoNetwork));
    assert!(matches!(
      f.coordinator.spawn(f.request.clone()),
      Err(MirrorError::NoNetwork)
    ));
    assert!(!f.coordinator.is_in_progress(&f.request.remote_uri));
    assert_eq!(f.remote.byte_calls(), 0);
  }

  #[tokio::test]
  async fn test_failure_leaves_flag_false_and_clears_marker() {
    let f = fixture(MockRemote::new().failing("http://example.com/a.jpg"));

    let err = f.coordinator.fetch(f.request.clone()).await.unwrap_err();
    assert!(matches!(err, MirrorError::FetchFailure { .. }));
    assert!(!standard_downloaded(&f));
    assert!(!f.coordinator.is_in_progress(&f.request.remote_uri));
    assert!(std::fs::read(&f.request.target).unwrap().is_empty());

    let handle = f.coordinator.spawn(f.request.clone()).unwrap().unwrap();
    assert!(!handle.await.unwrap());
    assert!(!f.coordinator.is_in_progress(&f.request.remote_uri));
  }

  #[tokio::test]
  async fn test_failed_refetch_never_clears_flag() {
    let f = fixture(MockRemote::new());
    f.coordinator.fetch(f.request.clone()).await.unwrap();
    assert!(standard_downloaded(&f));

    f.remote.fail_uri(&f.request.remote_uri);
    assert!(f.coordinator.fetch(f.request.clone()).await.is_err());
    assert!(standard_downloaded(&f));
  }

  #[tokio::test]
  async fn test_cancelled_download_releases_marker() {
    let f = fixture(MockRemote::new().with_delay(Duration::from_secs(10)));

    let handle = f.coordinator.spawn(f.request.clone()).unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(f.coordinator.is_in_progress(&f.request.remote_uri));

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
    assert!(!f.coordinator.is_in_progress(&f.request.remote_uri));
    assert!(!standard_downloaded(&f));
  }

  #[tokio::test]
  async fn test_successful_write_leaves_no_staging_file() {
    let f = fixture(MockRemote::new());
    f.coordinator.fetch(f.request.clone()).await.unwrap();

    assert!(!staging_path(&f.request.target).exists());
    assert_eq!(
      staging_path(Path::new("/cache/7")),
      PathBuf::from("/cache/7.part")
    );
  }

  #[tokio::test]
  async fn test_removed_placeholder_is_not_recreated() {
    let f = fixture(MockRemote::new());
    std::fs::remove_file(&f.request.target).unwrap();

    let err = f.coordinator.fetch(f.request.clone()).await.unwrap_err();

    assert!(matches!(err, MirrorError::StorageUnavailable(_)));
    assert!(!f.request.target.exists());
    assert!(!staging_path(&f.request.target).exists());
    assert!(!standard_downloaded(&f));
    assert!(!f.coordinator.is_in_progress(&f.request.remote_uri));
  }

  #[tokio::test]
  async fn test_failed_write_keeps_previous_bytes() {
    let f = fixture(MockRemote::new());
    std::fs::write(&f.request.target, b"previous").unwrap();
    // A directory in the staging slot makes the staged write fail.
    std::fs::create_dir(staging_path(&f.request.target)).unwrap();

    let err = f.coordinator.fetch(f.request.clone()).await.unwrap_err();

    assert!(matches!(err, MirrorError::StorageUnavailable(_)));
    assert_eq!(std::fs::read(&f.request.target).unwrap(), b"previous");
    assert!(!standard_downloaded(&f));
  }
}
