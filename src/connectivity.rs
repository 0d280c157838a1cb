use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Last-reported network state, shared between whatever watches the network
/// and the search session. The session never polls; it reads the latest
/// reported value at dispatch time.
#[derive(Clone, Default)]
pub struct ConnectivityMonitor {
    online: Arc<AtomicBool>,
}

impl ConnectivityMonitor {
    /// Starts offline until the first report comes in.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::Relaxed);
        if previous != online {
            info!("Device has internet connection: {}", online);
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}
