//! Collaborator interfaces the cache needs from the outside world.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;
use crate::zooniverse::types::SubjectDescriptor;

/// The remote service that items and their images come from.
#[async_trait]
pub trait RemoteService: Send + Sync {
  /// Fetch a page of new subject descriptors.
  async fn fetch_subjects(&self, limit: usize) -> Result<Vec<SubjectDescriptor>>;

  /// GET the bytes behind a remote asset URI.
  async fn fetch_bytes(&self, uri: &str) -> Result<Vec<u8>>;
}

/// Answers whether a download may be attempted right now.
pub trait NetworkMonitor: Send + Sync {
  fn has_usable_network(&self) -> bool;
}

/// Network availability flag, flipped by configuration or by the host.
#[derive(Debug)]
pub struct NetworkSwitch {
  available: AtomicBool,
}

impl NetworkSwitch {
  pub fn new(available: bool) -> Self {
    Self {
      available: AtomicBool::new(available),
    }
  }

  #[cfg(test)]
  pub fn set_available(&self, available: bool) {
    self.available.store(available, Ordering::SeqCst);
  }
}

impl Default for NetworkSwitch {
  fn default() -> Self {
    Self::new(true)
  }
}

impl NetworkMonitor for NetworkSwitch {
  fn has_usable_network(&self) -> bool {
    self.available.load(Ordering::SeqCst)
  }
}
