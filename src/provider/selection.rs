//! Caller-supplied row filters and sort orders, in external field names.

use super::columns::{Table, DEFAULT_SORT_ORDER};
use crate::db::{Clause, Value};
use crate::error::{MirrorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
  Eq,
  Ne,
}

impl Op {
  fn sql(&self) -> &'static str {
    match self {
      Self::Eq => "=",
      Self::Ne => "!=",
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
  pub field: String,
  pub op: Op,
  pub value: Value,
}

/// A conjunction of field predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
  predicates: Vec<Predicate>,
}

impl Selection {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.predicates.push(Predicate {
      field: field.into(),
      op: Op::Eq,
      value: value.into(),
    });
    self
  }

  pub fn ne(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.predicates.push(Predicate {
      field: field.into(),
      op: Op::Ne,
      value: value.into(),
    });
    self
  }

  /// Translate into a bound clause against `table`.
  ///
  /// Unlike projections and written values, where unknown field names are
  /// dropped, a predicate on an unknown field fails with
  /// `ConstraintViolation`. Dropping it would widen an update or delete to
  /// rows the caller never named.
  pub fn to_clause(&self, table: &Table) -> Result<Clause> {
    let mut parts = Vec::with_capacity(self.predicates.len());
    let mut args = Vec::with_capacity(self.predicates.len());
    for p in &self.predicates {
      let column = table.column(&p.field).ok_or_else(|| {
        MirrorError::ConstraintViolation(format!("unknown field in selection: {}", p.field))
      })?;
      // NULL never compares equal; spell out the intended meaning.
      if p.value.is_null() {
        let test = if p.op == Op::Eq { "IS NULL" } else { "IS NOT NULL" };
        parts.push(format!("{} {}", column.internal, test));
      } else {
        parts.push(format!("{} {} ?", column.internal, p.op.sql()));
        args.push(p.value.clone());
      }
    }
    Ok(Clause::new(parts.join(" AND "), args))
  }
}

/// Requested ordering of query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
  pub field: String,
  pub descending: bool,
}

impl SortOrder {
  pub fn ascending(field: impl Into<String>) -> Self {
    Self {
      field: field.into(),
      descending: false,
    }
  }

  pub fn descending(field: impl Into<String>) -> Self {
    Self {
      field: field.into(),
      descending: true,
    }
  }

  /// ORDER BY text for `table`, falling back to the default for unknown fields.
  pub fn resolve(sort: Option<&SortOrder>, table: &Table) -> String {
    sort
      .and_then(|s| {
        table.column(&s.field).map(|c| {
          format!(
            "{} {}",
            c.internal,
            if s.descending { "DESC" } else { "ASC" }
          )
        })
      })
      .unwrap_or_else(|| DEFAULT_SORT_ORDER.to_string())
  }
}
