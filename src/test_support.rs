//! In-memory stand-ins for the remote service, shared by unit tests.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::cache::traits::RemoteService;
use crate::error::{MirrorError, Result};
use crate::zooniverse::types::SubjectDescriptor;

#[derive(Default)]
pub struct MockRemote {
  batches: Mutex<VecDeque<Vec<SubjectDescriptor>>>,
  failing: Mutex<HashSet<String>>,
  fail_subjects: bool,
  delay: Option<Duration>,
  subject_calls: AtomicUsize,
  byte_calls: AtomicUsize,
}

impl MockRemote {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  /// Queue a page for the next `fetch_subjects` call. Once the queue is
  /// empty, pages come back empty.
  pub fn with_batch(self, batch: Vec<SubjectDescriptor>) -> Self {
    self.batches.lock().unwrap().push_back(batch);
    self
  }

  pub fn failing(self, uri: &str) -> Self {
    self.fail_uri(uri);
    self
  }

  pub fn failing_subjects(mut self) -> Self {
    self.fail_subjects = true;
    self
  }

  pub fn fail_uri(&self, uri: &str) {
    self.failing.lock().unwrap().insert(uri.to_string());
  }

  pub fn subject_calls(&self) -> usize {
    self.subject_calls.load(Ordering::SeqCst)
  }

  pub fn byte_calls(&self) -> usize {
    self.byte_calls.load(Ordering::SeqCst)
  }

  /// Deterministic payload served for `uri`.
  pub fn bytes_for(uri: &str) -> Vec<u8> {
    format!("image:{}", uri).into_bytes()
  }
}

#[async_trait]
impl RemoteService for MockRemote {
  async fn fetch_subjects(&self, limit: usize) -> Result<Vec<SubjectDescriptor>> {
    self.subject_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_subjects {
      return Err(MirrorError::Remote("subjects endpoint down".into()));
    }
    let mut batch = self.batches.lock().unwrap().pop_front().unwrap_or_default();
    batch.truncate(limit);
    Ok(batch)
  }

  async fn fetch_bytes(&self, uri: &str) -> Result<Vec<u8>> {
    self.byte_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.failing.lock().unwrap().contains(uri) {
      return Err(MirrorError::FetchFailure {
        uri: uri.to_string(),
        reason: "404 Not Found".into(),
      });
    }
    Ok(Self::bytes_for(uri))
  }
}

/// A descriptor with three distinct image URIs derived from `subject_id`.
pub fn descriptor(subject_id: &str) -> SubjectDescriptor {
  SubjectDescriptor {
    subject_id: subject_id.to_string(),
    zooniverse_id: format!("AGZ{}", subject_id),
    standard_uri: Some(format!("http://example.com/{}/standard.jpg", subject_id)),
    thumbnail_uri: Some(format!("http://example.com/{}/thumbnail.jpg", subject_id)),
    inverted_uri: Some(format!("http://example.com/{}/inverted.jpg", subject_id)),
  }
}
