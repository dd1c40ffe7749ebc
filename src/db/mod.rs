pub mod schema;
mod values;

pub use values::{Row, Value, Values};

use rusqlite::{params_from_iter, Connection, Transaction};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{MirrorError, Result};
use schema::{ALL_TABLES, SCHEMA, SCHEMA_VERSION};

/// Database connection wrapper for the item store.
///
/// The mutex is the single-writer boundary: concurrent callers block on it
/// rather than interleave statements.
pub struct Database {
  conn: Mutex<Connection>,
}

impl Database {
  /// Open or create the database at the given path
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        MirrorError::StorageUnavailable(format!(
          "failed to create database directory {}: {}",
          parent.display(),
          e
        ))
      })?;
    }

    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;

    Self::from_connection(conn)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(mut conn: Connection) -> Result<Self> {
    Self::run_migrations(&mut conn)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Create the tables, discarding everything if the stored version differs.
  fn run_migrations(conn: &mut Connection) -> Result<()> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    let tx = conn.transaction()?;
    if version != SCHEMA_VERSION {
      if version != 0 {
        warn!(
          from = version,
          to = SCHEMA_VERSION,
          "Schema version changed, dropping cached items"
        );
      }
      for table in ALL_TABLES {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", table))?;
      }
    }
    tx.execute_batch(SCHEMA)?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;

    if version != SCHEMA_VERSION {
      info!(version = SCHEMA_VERSION, "Created item store schema");
    }
    Ok(())
  }

  /// Run `f` with the connection locked.
  pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
    let conn = self.conn.lock()?;
    f(&conn)
  }

  /// Run `f` inside a transaction; it commits only if `f` succeeds.
  pub fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
    let mut conn = self.conn.lock()?;
    let tx = conn.transaction()?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
  }
}

/// A WHERE clause with positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clause {
  pub sql: String,
  pub args: Vec<Value>,
}

impl Clause {
  pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
    Self {
      sql: sql.into(),
      args,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.sql.is_empty()
  }

  /// `self AND (other)`, keeping `self`'s parameters first.
  pub fn and(mut self, other: Clause) -> Self {
    if other.is_empty() {
      return self;
    }
    if self.is_empty() {
      return other;
    }
    self.sql = format!("{} AND ({})", self.sql, other.sql);
    self.args.extend(other.args);
    self
  }

  fn render(&self) -> String {
    if self.is_empty() {
      String::new()
    } else {
      format!(" WHERE {}", self.sql)
    }
  }
}

// The helpers below take table and column names from the fixed mappings in
// `provider::columns`; only values ever come from callers, and those are bound.

pub fn insert_row(conn: &Connection, table: &str, columns: &[(&str, Value)]) -> Result<i64> {
  if columns.is_empty() {
    conn.execute(&format!("INSERT INTO {} DEFAULT VALUES", table), [])?;
  } else {
    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
      "INSERT INTO {} ({}) VALUES ({})",
      table,
      names.join(", "),
      placeholders
    );
    conn.execute(&sql, params_from_iter(columns.iter().map(|(_, v)| v)))?;
  }
  Ok(conn.last_insert_rowid())
}

pub fn update_rows(
  conn: &Connection,
  table: &str,
  sets: &[(&str, Value)],
  clause: &Clause,
) -> Result<usize> {
  if sets.is_empty() {
    return Ok(0);
  }
  let assignments: Vec<String> = sets.iter().map(|(name, _)| format!("{} = ?", name)).collect();
  let sql = format!(
    "UPDATE {} SET {}{}",
    table,
    assignments.join(", "),
    clause.render()
  );
  let args = sets.iter().map(|(_, v)| v).chain(clause.args.iter());
  Ok(conn.execute(&sql, params_from_iter(args))?)
}

pub fn delete_rows(conn: &Connection, table: &str, clause: &Clause) -> Result<usize> {
  let sql = format!("DELETE FROM {}{}", table, clause.render());
  Ok(conn.execute(&sql, params_from_iter(clause.args.iter()))?)
}

/// Select `columns` (pairs of external name, internal column) into rows keyed
/// by the external names.
pub fn select_rows(
  conn: &Connection,
  table: &str,
  columns: &[(&str, &str)],
  clause: &Clause,
  order_by: Option<&str>,
  limit: Option<usize>,
) -> Result<Vec<Row>> {
  let names: Vec<&str> = columns.iter().map(|(_, internal)| *internal).collect();
  let mut sql = format!("SELECT {} FROM {}{}", names.join(", "), table, clause.render());
  if let Some(order) = order_by {
    sql.push_str(&format!(" ORDER BY {}", order));
  }
  if let Some(limit) = limit {
    sql.push_str(&format!(" LIMIT {}", limit));
  }

  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params_from_iter(clause.args.iter()), |row| {
      let mut out = Row::new();
      for (index, (external, _)) in columns.iter().enumerate() {
        out.insert(external.to_string(), row.get::<_, Value>(index)?);
      }
      Ok(out)
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  Ok(rows)
}
