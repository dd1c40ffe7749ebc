//! Local image cache: file placeholders, the download coordinator and the
//! collaborator traits it depends on.

pub mod download;
pub mod files;
pub mod traits;
