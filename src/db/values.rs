//! Loosely typed column values passed through the router.

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;
use std::collections::BTreeMap;

/// A single column value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
}

impl Value {
  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Self::Integer(i) => Some(*i),
      Self::Text(s) => s.parse().ok(),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  /// SQLite has no boolean type; anything non-zero is true.
  pub fn as_bool(&self) -> bool {
    match self {
      Self::Integer(i) => *i != 0,
      Self::Real(r) => *r != 0.0,
      Self::Text(s) => s == "1" || s.eq_ignore_ascii_case("true"),
      Self::Null => false,
    }
  }

  pub fn is_null(&self) -> bool {
    matches!(self, Self::Null)
  }
}

impl From<bool> for Value {
  fn from(v: bool) -> Self {
    Self::Integer(v as i64)
  }
}

impl From<i64> for Value {
  fn from(v: i64) -> Self {
    Self::Integer(v)
  }
}

impl From<i32> for Value {
  fn from(v: i32) -> Self {
    Self::Integer(v.into())
  }
}

impl From<f64> for Value {
  fn from(v: f64) -> Self {
    Self::Real(v)
  }
}

impl From<&str> for Value {
  fn from(v: &str) -> Self {
    Self::Text(v.to_string())
  }
}

impl From<String> for Value {
  fn from(v: String) -> Self {
    Self::Text(v)
  }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(v: Option<T>) -> Self {
    v.map(Into::into).unwrap_or(Value::Null)
  }
}

impl ToSql for Value {
  fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
    Ok(match self {
      Self::Null => ToSqlOutput::Borrowed(ValueRef::Null),
      Self::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
      Self::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
      Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
    })
  }
}

impl FromSql for Value {
  fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
    Ok(match value {
      ValueRef::Null => Self::Null,
      ValueRef::Integer(i) => Self::Integer(i),
      ValueRef::Real(r) => Self::Real(r),
      ValueRef::Text(t) => Self::Text(String::from_utf8_lossy(t).into_owned()),
      // Nothing stores blobs; surface them as text rather than failing the row.
      ValueRef::Blob(b) => Self::Text(String::from_utf8_lossy(b).into_owned()),
    })
  }
}

/// Field name to value pairs supplied by callers for insert and update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
  entries: BTreeMap<String, Value>,
}

impl Values {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
    self.entries.insert(key.into(), value.into());
    self
  }

  /// Builder-style variant of [`Values::put`].
  pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.put(key, value);
    self
  }

  /// A non-empty text value for the key.
  pub fn get_str(&self, key: &str) -> Option<&str> {
    self
      .entries
      .get(key)
      .and_then(Value::as_str)
      .filter(|s| !s.is_empty())
  }

  pub fn remove(&mut self, key: &str) -> Option<Value> {
    self.entries.remove(key)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v))
  }
}

/// A result row keyed by external field name.
pub type Row = BTreeMap<String, Value>;
