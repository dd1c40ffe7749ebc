//! Serde-deserializable types matching the subjects endpoint.

use serde::Deserialize;

use super::types::SubjectDescriptor;

#[derive(Debug, Default, Deserialize)]
pub struct ApiLocation {
  pub standard: Option<String>,
  pub thumbnail: Option<String>,
  pub inverted: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiSubject {
  pub id: String,
  #[serde(default)]
  pub zooniverse_id: String,
  #[serde(default)]
  pub location: ApiLocation,
}

impl ApiSubject {
  pub fn into_descriptor(self) -> SubjectDescriptor {
    SubjectDescriptor {
      subject_id: self.id,
      zooniverse_id: self.zooniverse_id,
      standard_uri: non_empty(self.location.standard),
      thumbnail_uri: non_empty(self.location.thumbnail),
      inverted_uri: non_empty(self.location.inverted),
    }
  }
}

fn non_empty(uri: Option<String>) -> Option<String> {
  uri.filter(|u| !u.is_empty())
}
