//! Online/offline state driven by host notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Connectivity notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityEvent {
  pub online: bool,
  /// False when the notification repeated the current state
  pub changed: bool,
}

impl ConnectivityEvent {
  /// An offline-to-online transition.
  pub fn is_reconnect(&self) -> bool {
    self.online && self.changed
  }
}

/// Passive connectivity monitor.
///
/// Never polls. The host calls `set_online` whenever its network signal
/// changes; readers take a point-in-time value or subscribe to events.
/// Clones share the same state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
  online: Arc<AtomicBool>,
  events: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityMonitor {
  pub fn new(online: bool) -> Self {
    let (events, _) = broadcast::channel(16);
    Self {
      online: Arc::new(AtomicBool::new(online)),
      events,
    }
  }

  pub fn is_online(&self) -> bool {
    self.online.load(Ordering::SeqCst)
  }

  /// Record a notification from the host.
  ///
  /// Always fires an event, even when the state is unchanged. Returns true
  /// if the state actually changed.
  pub fn set_online(&self, online: bool) -> bool {
    let previous = self.online.swap(online, Ordering::SeqCst);
    let changed = previous != online;
    let label = if online { "online" } else { "offline" };

    if changed {
      info!("Connectivity changed: {}", label);
    } else {
      debug!("Redundant connectivity notification: {}", label);
    }

    let event = ConnectivityEvent { online, changed };
    // No subscribers is fine
    let _ = self.events.send(event);
    changed
  }

  /// Subscribe to transition events fired after this call.
  pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
    self.events.subscribe()
  }
}

impl Default for ConnectivityMonitor {
  fn default() -> Self {
    Self::new(true)
  }
}
