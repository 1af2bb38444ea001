//! Shared online/offline state and the reconnect signal.
//!
//! There is no ambient global: whoever constructs the facade owns a
//! `Connectivity` handle and flips it when the platform reports a change.
//! Subscribers (the replay worker) observe the offline-to-online edge.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct Connectivity {
  tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
  pub fn new(online: bool) -> Self {
    let (tx, _rx) = watch::channel(online);
    Self { tx: Arc::new(tx) }
  }

  pub fn is_online(&self) -> bool {
    *self.tx.borrow()
  }

  /// Record a connectivity change. Subscribers are only woken when the
  /// value actually changes.
  pub fn set_online(&self, online: bool) {
    self.tx.send_if_modified(|current| {
      let changed = *current != online;
      *current = online;
      changed
    });
  }

  pub fn subscribe(&self) -> watch::Receiver<bool> {
    self.tx.subscribe()
  }
}

impl Default for Connectivity {
  fn default() -> Self {
    Self::new(true)
  }
}
