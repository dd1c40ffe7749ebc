use serde::{Deserialize, Serialize};

/// One subject as described by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectDescriptor {
  pub subject_id: String,
  pub zooniverse_id: String,
  pub standard_uri: Option<String>,
  pub thumbnail_uri: Option<String>,
  pub inverted_uri: Option<String>,
}

/// Login identity used when talking to the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginDetails {
  pub name: String,
  pub api_key: String,
}
