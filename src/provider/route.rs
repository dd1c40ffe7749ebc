//! Resource path routing.

use std::fmt;
use std::str::FromStr;

use super::columns::{self, Table};
use crate::error::MirrorError;

pub const PART_ITEM: &str = "item";
/// Used in place of an item id to ask for the next unclassified item.
pub const PART_ITEM_NEXT: &str = "next";
pub const PART_FILE: &str = "file";
pub const PART_CLASSIFICATION_ANSWER: &str = "classification-answer";
pub const PART_CLASSIFICATION_CHECKBOX: &str = "classification-checkbox";

/// Every resource path the router understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
  Items,
  Item(i64),
  NextItem,
  File(i64),
  ClassificationAnswers,
  ClassificationAnswer(i64),
  ClassificationCheckboxes,
  ClassificationCheckbox(i64),
}

impl Resource {
  /// The collection path this resource belongs to.
  pub fn collection(&self) -> &'static str {
    match self {
      Self::Items | Self::Item(_) | Self::NextItem => PART_ITEM,
      Self::File(_) => PART_FILE,
      Self::ClassificationAnswers | Self::ClassificationAnswer(_) => PART_CLASSIFICATION_ANSWER,
      Self::ClassificationCheckboxes | Self::ClassificationCheckbox(_) => {
        PART_CLASSIFICATION_CHECKBOX
      }
    }
  }

  /// The row id for single-element paths.
  pub fn id(&self) -> Option<i64> {
    match self {
      Self::Item(id)
      | Self::File(id)
      | Self::ClassificationAnswer(id)
      | Self::ClassificationCheckbox(id) => Some(*id),
      _ => None,
    }
  }

  pub fn table(&self) -> &'static Table {
    match self {
      Self::Items | Self::Item(_) | Self::NextItem => &columns::ITEMS,
      Self::File(_) => &columns::FILES,
      Self::ClassificationAnswers | Self::ClassificationAnswer(_) => {
        &columns::CLASSIFICATION_ANSWERS
      }
      Self::ClassificationCheckboxes | Self::ClassificationCheckbox(_) => {
        &columns::CLASSIFICATION_CHECKBOXES
      }
    }
  }

  /// The single-element path for a row of this resource's collection.
  pub fn element(&self, id: i64) -> Self {
    match self {
      Self::Items | Self::Item(_) | Self::NextItem => Self::Item(id),
      Self::File(_) => Self::File(id),
      Self::ClassificationAnswers | Self::ClassificationAnswer(_) => Self::ClassificationAnswer(id),
      Self::ClassificationCheckboxes | Self::ClassificationCheckbox(_) => {
        Self::ClassificationCheckbox(id)
      }
    }
  }

  pub fn content_kind(&self) -> ContentKind {
    match self {
      Self::Items => ContentKind::ItemList,
      Self::Item(_) | Self::NextItem => ContentKind::Item,
      Self::File(_) => ContentKind::File,
      Self::ClassificationAnswers => ContentKind::ClassificationAnswerList,
      Self::ClassificationAnswer(_) => ContentKind::ClassificationAnswer,
      Self::ClassificationCheckboxes => ContentKind::ClassificationCheckboxList,
      Self::ClassificationCheckbox(_) => ContentKind::ClassificationCheckbox,
    }
  }
}

impl FromStr for Resource {
  type Err = MirrorError;

  fn from_str(path: &str) -> Result<Self, Self::Err> {
    let unsupported = || MirrorError::UnsupportedResource(path.to_string());
    let parts: Vec<&str> = path.trim_matches('/').split('/').collect();

    let parse_id = |s: &str| -> Result<i64, MirrorError> {
      // Digits only: rejects "-1", "+3" and friends.
      if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(unsupported());
      }
      s.parse().map_err(|_| unsupported())
    };

    match parts.as_slice() {
      [PART_ITEM] => Ok(Self::Items),
      [PART_ITEM, PART_ITEM_NEXT] => Ok(Self::NextItem),
      [PART_ITEM, id] => Ok(Self::Item(parse_id(id)?)),
      [PART_FILE, id] => Ok(Self::File(parse_id(id)?)),
      [PART_CLASSIFICATION_ANSWER] => Ok(Self::ClassificationAnswers),
      [PART_CLASSIFICATION_ANSWER, id] => Ok(Self::ClassificationAnswer(parse_id(id)?)),
      [PART_CLASSIFICATION_CHECKBOX] => Ok(Self::ClassificationCheckboxes),
      [PART_CLASSIFICATION_CHECKBOX, id] => Ok(Self::ClassificationCheckbox(parse_id(id)?)),
      _ => Err(unsupported()),
    }
  }
}

impl fmt::Display for Resource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::NextItem => write!(f, "{}/{}", PART_ITEM, PART_ITEM_NEXT),
      other => match other.id() {
        Some(id) => write!(f, "{}/{}", other.collection(), id),
        None => f.write_str(other.collection()),
      },
    }
  }
}

/// Content kind of a resource, for consumers that dispatch on mime types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
  ItemList,
  Item,
  File,
  ClassificationAnswerList,
  ClassificationAnswer,
  ClassificationCheckboxList,
  ClassificationCheckbox,
}

/// Stream types offered for cached files.
pub const FILE_MIME_TYPES: &[&str] = &["image/jpeg"];

impl ContentKind {
  pub fn mime(&self) -> &'static str {
    match self {
      Self::ItemList => "vnd.galaxyzoo.dir/item",
      Self::Item => "vnd.galaxyzoo.entry/item",
      Self::File => FILE_MIME_TYPES[0],
      Self::ClassificationAnswerList => "vnd.galaxyzoo.dir/classification-answer",
      Self::ClassificationAnswer => "vnd.galaxyzoo.entry/classification-answer",
      Self::ClassificationCheckboxList => "vnd.galaxyzoo.dir/classification-checkbox",
      Self::ClassificationCheckbox => "vnd.galaxyzoo.entry/classification-checkbox",
    }
  }
}

/// Does `mime` satisfy `filter`? Supports `*/*` and `type/*` wildcards.
pub fn mime_matches(filter: &str, mime: &str) -> bool {
  match filter.split_once('/') {
    Some(("*", "*")) => true,
    Some((kind, "*")) => mime.split_once('/').is_some_and(|(k, _)| k == kind),
    _ => filter == mime,
  }
}
