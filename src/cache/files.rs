//! Local cache files backing item images.

use rusqlite::{params, Connection, OptionalExtension};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::db::{self, schema::TABLE_FILES, Value};
use crate::error::{MirrorError, Result};
use crate::provider::route::Resource;

/// How a cached file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
  Read,
  /// Truncate and write.
  Write,
  ReadWrite,
  Append,
}

impl FileMode {
  fn options(&self) -> OpenOptions {
    let mut options = OpenOptions::new();
    match self {
      Self::Read => options.read(true),
      Self::Write => options.write(true).truncate(true),
      Self::ReadWrite => options.read(true).write(true),
      Self::Append => options.append(true),
    };
    options
  }

  pub fn writes(&self) -> bool {
    !matches!(self, Self::Read)
  }
}

/// Accepts the short forms `r`, `w`, `rw` and `wa`.
impl FromStr for FileMode {
  type Err = MirrorError;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "r" => Ok(Self::Read),
      "w" | "wt" => Ok(Self::Write),
      "rw" => Ok(Self::ReadWrite),
      "wa" => Ok(Self::Append),
      other => Err(MirrorError::UnsupportedResource(format!(
        "unknown file mode '{}'",
        other
      ))),
    }
  }
}

/// A freshly allocated, still empty, cache slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
  pub id: i64,
  pub path: PathBuf,
}

impl Placeholder {
  /// Opaque local identifier stored in the owning item.
  pub fn uri(&self) -> String {
    Resource::File(self.id).to_string()
  }
}

/// Owns the mapping from file record ids to files under one root directory.
#[derive(Debug, Clone)]
pub struct FileCache {
  root: PathBuf,
}

impl FileCache {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  #[cfg(test)]
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Location for a record id. Stable for the lifetime of the record.
  pub fn location(&self, id: i64) -> PathBuf {
    self.root.join(id.to_string())
  }

  /// Allocate a file record and an empty file behind it.
  ///
  /// Runs on the caller's connection so it can share the caller's
  /// transaction. Never touches the network.
  pub fn create_placeholder(&self, conn: &Connection) -> Result<Placeholder> {
    let id = db::insert_row(conn, TABLE_FILES, &[("_data", Value::Null)])?;
    let path = self.location(id);

    fs::create_dir_all(&self.root).map_err(|e| {
      MirrorError::StorageUnavailable(format!(
        "failed to create cache directory {}: {}",
        self.root.display(),
        e
      ))
    })?;
    // Writers open without `create`, so the file has to exist already.
    File::create(&path).map_err(|e| {
      MirrorError::StorageUnavailable(format!("failed to create {}: {}", path.display(), e))
    })?;

    conn.execute(
      "UPDATE files SET _data = ? WHERE _id = ?",
      params![path.to_string_lossy(), id],
    )?;

    debug!(id, path = %path.display(), "Created cache placeholder");
    Ok(Placeholder { id, path })
  }

  /// Backing path recorded for a file id.
  pub fn path_for(&self, conn: &Connection, id: i64) -> Result<Option<PathBuf>> {
    let data: Option<Option<String>> = conn
      .query_row("SELECT _data FROM files WHERE _id = ?", [id], |row| row.get(0))
      .optional()?;
    Ok(data.flatten().map(PathBuf::from))
  }

  /// Resolve a local identifier (`file/{id}`) to its backing path.
  pub fn resolve_uri(&self, conn: &Connection, uri: &str) -> Result<Option<PathBuf>> {
    match uri.parse::<Resource>()? {
      Resource::File(id) => self.path_for(conn, id),
      _ => Err(MirrorError::UnsupportedResource(uri.to_string())),
    }
  }

  pub fn open(&self, path: &Path, mode: FileMode) -> Result<File> {
    mode.options().open(path).map_err(|e| {
      MirrorError::StorageUnavailable(format!("failed to open {}: {}", path.display(), e))
    })
  }

  /// Best-effort removal of a backing file.
  pub fn remove(&self, path: &Path) {
    if let Err(e) = fs::remove_file(path) {
      if e.kind() != std::io::ErrorKind::NotFound {
        warn!(path = %path.display(), error = %e, "Failed to remove cached file");
      }
    }
  }
}
