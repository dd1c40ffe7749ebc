use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// A resource changed and observers should re-read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
  /// The path that was mutated, e.g. `item` or `item/12`.
  pub resource: String,
}

struct Subscriber {
  path: String,
  tx: mpsc::UnboundedSender<Change>,
}

/// Publish/subscribe registry for store mutations.
///
/// A subscriber on a collection path (`item`) also hears about its elements
/// (`item/12`); a subscriber on an element path hears about that element and
/// about whole-collection changes.
#[derive(Default)]
pub struct ChangeNotifier {
  subscribers: Mutex<Vec<Subscriber>>,
}

impl ChangeNotifier {
  pub fn new() -> Self {
    Self::default()
  }

  /// Start receiving changes that affect `path`.
  pub fn subscribe(&self, path: &str) -> mpsc::UnboundedReceiver<Change> {
    let (tx, rx) = mpsc::unbounded_channel();
    let path = path.trim_matches('/').to_string();
    if let Ok(mut subs) = self.subscribers.lock() {
      subs.push(Subscriber { path, tx });
    }
    rx
  }

  /// Tell every interested subscriber that `resource` changed.
  /// Closed receivers are pruned.
  pub fn notify(&self, resource: &str) {
    let resource = resource.trim_matches('/');
    let Ok(mut subs) = self.subscribers.lock() else {
      return;
    };
    subs.retain(|sub| {
      if !affects(&sub.path, resource) {
        return !sub.tx.is_closed();
      }
      sub
        .tx
        .send(Change {
          resource: resource.to_string(),
        })
        .is_ok()
    });
    debug!(resource, subscribers = subs.len(), "Change notified");
  }

  #[cfg(test)]
  pub fn subscriber_count(&self) -> usize {
    self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
  }
}

fn affects(subscribed: &str, changed: &str) -> bool {
  fn collection(path: &str) -> &str {
    path.split('/').next().unwrap_or(path)
  }
  if subscribed == changed {
    return true;
  }
  if collection(subscribed) != collection(changed) {
    return false;
  }
  // One side is the bare collection.
  !subscribed.contains('/') || !changed.contains('/')
}
