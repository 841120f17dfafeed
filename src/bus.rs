use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Requests from the core to the host surface (terminal or window).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostEvent {
    Banner { title: String, body: String },
    Restore,
}

#[derive(Clone)]
pub struct HostBus {
    tx: mpsc::Sender<HostEvent>,
}

pub struct HostHandle {
    pub rx: Arc<Mutex<mpsc::Receiver<HostEvent>>>,
}

impl HostBus {
    pub fn new() -> (Self, HostHandle) {
        let (tx, rx) = mpsc::channel(100);
        let handle = HostHandle {
            rx: Arc::new(Mutex::new(rx)),
        };
        (HostBus { tx }, handle)
    }

    /// Fails only when the host side has gone away.
    pub async fn publish(&self, event: HostEvent) -> Result<(), HostEvent> {
        self.tx.send(event).await.map_err(|e| e.0)
    }
}

impl HostHandle {
    pub async fn recv(&self) -> Option<HostEvent> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}
