//! Typed view over item rows.

use serde::Serialize;
use std::fmt;

use super::columns::{item, ID};
use crate::db::{Row, Value};

/// The three image variants attached to every item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
  Standard,
  Thumbnail,
  Inverted,
}

impl ImageType {
  pub const ALL: [ImageType; 3] = [Self::Standard, Self::Thumbnail, Self::Inverted];

  /// External field holding the local file identifier.
  pub fn uri_field(&self) -> &'static str {
    match self {
      Self::Standard => item::LOCATION_STANDARD_URI,
      Self::Thumbnail => item::LOCATION_THUMBNAIL_URI,
      Self::Inverted => item::LOCATION_INVERTED_URI,
    }
  }

  pub fn remote_uri_field(&self) -> &'static str {
    match self {
      Self::Standard => item::LOCATION_STANDARD_URI_REMOTE,
      Self::Thumbnail => item::LOCATION_THUMBNAIL_URI_REMOTE,
      Self::Inverted => item::LOCATION_INVERTED_URI_REMOTE,
    }
  }

  pub fn downloaded_field(&self) -> &'static str {
    match self {
      Self::Standard => item::LOCATION_STANDARD_DOWNLOADED,
      Self::Thumbnail => item::LOCATION_THUMBNAIL_DOWNLOADED,
      Self::Inverted => item::LOCATION_INVERTED_DOWNLOADED,
    }
  }

  pub(crate) fn uri_column(&self) -> &'static str {
    match self {
      Self::Standard => "location_standard_uri",
      Self::Thumbnail => "location_thumbnail_uri",
      Self::Inverted => "location_inverted_uri",
    }
  }

  pub(crate) fn remote_uri_column(&self) -> &'static str {
    match self {
      Self::Standard => "location_standard_uri_remote",
      Self::Thumbnail => "location_thumbnail_uri_remote",
      Self::Inverted => "location_inverted_uri_remote",
    }
  }

  /// Internal column for the downloaded flag.
  pub(crate) fn downloaded_column(&self) -> &'static str {
    match self {
      Self::Standard => "location_standard_downloaded",
      Self::Thumbnail => "location_thumbnail_downloaded",
      Self::Inverted => "location_inverted_downloaded",
    }
  }
}

impl fmt::Display for ImageType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Standard => "standard",
      Self::Thumbnail => "thumbnail",
      Self::Inverted => "inverted",
    };
    f.write_str(name)
  }
}

/// One asset slot of an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Asset {
  /// Local file identifier, a `file/{id}` path.
  pub uri: Option<String>,
  pub remote_uri: Option<String>,
  pub downloaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
  pub id: i64,
  pub subject_id: String,
  pub zooniverse_id: Option<String>,
  pub done: bool,
  pub skipped: bool,
  pub standard: Asset,
  pub thumbnail: Asset,
  pub inverted: Asset,
}

impl Item {
  /// Build from a full item row. Returns `None` when the row lacks an id.
  pub fn from_row(row: &Row) -> Option<Self> {
    let text = |field: &str| row.get(field).and_then(Value::as_str).map(String::from);
    let flag = |field: &str| row.get(field).is_some_and(Value::as_bool);
    let asset = |image: ImageType| Asset {
      uri: text(image.uri_field()),
      remote_uri: text(image.remote_uri_field()),
      downloaded: flag(image.downloaded_field()),
    };

    Some(Self {
      id: row.get(ID)?.as_i64()?,
      subject_id: text(item::SUBJECT_ID).unwrap_or_default(),
      zooniverse_id: text(item::ZOONIVERSE_ID),
      done: flag(item::DONE),
      skipped: flag(item::SKIPPED),
      standard: asset(ImageType::Standard),
      thumbnail: asset(ImageType::Thumbnail),
      inverted: asset(ImageType::Inverted),
    })
  }

  pub fn asset(&self, image: ImageType) -> &Asset {
    match image {
      ImageType::Standard => &self.standard,
      ImageType::Thumbnail => &self.thumbnail,
      ImageType::Inverted => &self.inverted,
    }
  }

  pub fn all_downloaded(&self) -> bool {
    ImageType::ALL.iter().all(|i| self.asset(*i).downloaded)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_row() {
    let mut row = Row::new();
    row.insert(ID.into(), Value::Integer(5));
    row.insert(item::SUBJECT_ID.into(), "S5".into());
    row.insert(item::DONE.into(), Value::Integer(0));
    row.insert(item::LOCATION_THUMBNAIL_URI.into(), "file/2".into());
    row.insert(item::LOCATION_THUMBNAIL_DOWNLOADED.into(), Value::Integer(1));

    let it = Item::from_row(&row).unwrap();
    assert_eq!(it.id, 5);
    assert_eq!(it.subject_id, "S5");
    assert!(!it.done);
    assert_eq!(it.thumbnail.uri.as_deref(), Some("file/2"));
    assert!(it.thumbnail.downloaded);
    assert!(!it.standard.downloaded);
    assert!(!it.all_downloaded());
  }

  #[test]
  fn test_from_row_without_id() {
    assert!(Item::from_row(&Row::new()).is_none());
  }
}
