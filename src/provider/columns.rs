//! Fixed mappings from the externally visible field names to table columns.
//!
//! Callers never see or name internal columns. Anything not listed here is
//! dropped on the way in.

use crate::db::{schema, Value, Values};

/// Who may write a field through the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  ReadWrite,
  /// Accepted on insert, ignored on update.
  InsertOnly,
  /// Maintained by the store itself.
  ReadOnly,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
  pub external: &'static str,
  pub internal: &'static str,
  pub access: Access,
}

const fn col(external: &'static str, internal: &'static str, access: Access) -> Column {
  Column {
    external,
    internal,
    access,
  }
}

/// A table together with its field mapping.
#[derive(Debug)]
pub struct Table {
  pub name: &'static str,
  pub columns: &'static [Column],
}

impl Table {
  pub fn column(&self, external: &str) -> Option<&'static Column> {
    self.columns.iter().find(|c| c.external == external)
  }

  /// Resolve a projection; an empty request selects every mapped field.
  pub fn projection(&self, fields: &[&str]) -> Vec<(&'static str, &'static str)> {
    if fields.is_empty() {
      return self.columns.iter().map(|c| (c.external, c.internal)).collect();
    }
    fields
      .iter()
      .filter_map(|f| self.column(f))
      .map(|c| (c.external, c.internal))
      .collect()
  }

  /// Internal column/value pairs a caller may write. Unknown fields and
  /// fields the caller does not own are dropped.
  pub fn writable(&self, values: &Values, on_insert: bool) -> Vec<(&'static str, Value)> {
    values
      .iter()
      .filter_map(|(name, value)| {
        let column = self.column(name)?;
        let allowed = match column.access {
          Access::ReadWrite => true,
          Access::InsertOnly => on_insert,
          Access::ReadOnly => false,
        };
        allowed.then(|| (column.internal, value.clone()))
      })
      .collect()
  }
}

pub const ID: &str = "_id";

pub mod item {
  pub const DONE: &str = "done";
  pub const SKIPPED: &str = "skipped";
  pub const SUBJECT_ID: &str = "subjectId";
  pub const ZOONIVERSE_ID: &str = "zooniverseId";
  pub const LOCATION_STANDARD_URI: &str = "locationStandardUri";
  pub const LOCATION_STANDARD_URI_REMOTE: &str = "locationStandardUriRemote";
  pub const LOCATION_STANDARD_DOWNLOADED: &str = "locationStandardDownloaded";
  pub const LOCATION_THUMBNAIL_URI: &str = "locationThumbnailUri";
  pub const LOCATION_THUMBNAIL_URI_REMOTE: &str = "locationThumbnailUriRemote";
  pub const LOCATION_THUMBNAIL_DOWNLOADED: &str = "locationThumbnailDownloaded";
  pub const LOCATION_INVERTED_URI: &str = "locationInvertedUri";
  pub const LOCATION_INVERTED_URI_REMOTE: &str = "locationInvertedUriRemote";
  pub const LOCATION_INVERTED_DOWNLOADED: &str = "locationInvertedDownloaded";
}

pub mod classification {
  pub const ITEM_ID: &str = "itemId";
  pub const SEQUENCE: &str = "sequence";
  pub const QUESTION_ID: &str = "questionId";
  pub const ANSWER_ID: &str = "answerId";
  pub const CHECKBOX_ID: &str = "checkboxId";
}

pub mod file {
  pub const DATA: &str = "_data";
}

use Access::{InsertOnly, ReadOnly, ReadWrite};

pub static ITEMS: Table = Table {
  name: schema::TABLE_ITEMS,
  columns: &[
    col(ID, "_id", ReadOnly),
    col(item::DONE, "done", ReadWrite),
    col(item::SKIPPED, "skipped", ReadWrite),
    col(item::SUBJECT_ID, "subject_id", InsertOnly),
    col(item::ZOONIVERSE_ID, "zooniverse_id", InsertOnly),
    col(item::LOCATION_STANDARD_URI, "location_standard_uri", ReadOnly),
    col(item::LOCATION_STANDARD_URI_REMOTE, "location_standard_uri_remote", InsertOnly),
    col(item::LOCATION_STANDARD_DOWNLOADED, "location_standard_downloaded", ReadOnly),
    col(item::LOCATION_THUMBNAIL_URI, "location_thumbnail_uri", ReadOnly),
    col(item::LOCATION_THUMBNAIL_URI_REMOTE, "location_thumbnail_uri_remote", InsertOnly),
    col(item::LOCATION_THUMBNAIL_DOWNLOADED, "location_thumbnail_downloaded", ReadOnly),
    col(item::LOCATION_INVERTED_URI, "location_inverted_uri", ReadOnly),
    col(item::LOCATION_INVERTED_URI_REMOTE, "location_inverted_uri_remote", InsertOnly),
    col(item::LOCATION_INVERTED_DOWNLOADED, "location_inverted_downloaded", ReadOnly),
  ],
};

pub static FILES: Table = Table {
  name: schema::TABLE_FILES,
  columns: &[col(ID, "_id", ReadOnly), col(file::DATA, "_data", ReadOnly)],
};

pub static CLASSIFICATION_ANSWERS: Table = Table {
  name: schema::TABLE_CLASSIFICATION_ANSWERS,
  columns: &[
    col(ID, "_id", ReadOnly),
    col(classification::ITEM_ID, "item_id", ReadWrite),
    col(classification::SEQUENCE, "sequence", ReadWrite),
    col(classification::QUESTION_ID, "question_id", ReadWrite),
    col(classification::ANSWER_ID, "answer_id", ReadWrite),
  ],
};

pub static CLASSIFICATION_CHECKBOXES: Table = Table {
  name: schema::TABLE_CLASSIFICATION_CHECKBOXES,
  columns: &[
    col(ID, "_id", ReadOnly),
    col(classification::ITEM_ID, "item_id", ReadWrite),
    col(classification::SEQUENCE, "sequence", ReadWrite),
    col(classification::QUESTION_ID, "question_id", ReadWrite),
    col(classification::CHECKBOX_ID, "checkbox_id", ReadWrite),
  ],
};

/// Newest first.
pub const DEFAULT_SORT_ORDER: &str = "_id DESC";
