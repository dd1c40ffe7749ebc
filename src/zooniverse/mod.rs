//! Zooniverse API access.

mod api_types;
mod auth;
mod client;
pub mod types;

pub use auth::EnvCredentials;
pub use client::ZooniverseClient;

/// Subjects of the Galaxy Zoo classification group.
pub const DEFAULT_SUBJECTS_URL: &str =
  "https://api.zooniverse.org/projects/galaxy_zoo/groups/50251c3b516bcb6ecb000002/subjects";
