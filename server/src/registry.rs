use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

// A connection whose queue hits this depth has stopped draining; broadcast
// evicts it instead of queueing further lines for it.
const CHANNEL_DEPTH: usize = 64;

/// The set of currently connected clients eligible for broadcast.
///
/// Each connection owns a writer task draining an mpsc receiver; the
/// registry keeps the matching senders. Broadcast is best-effort: a closed
/// channel evicts that one client without affecting delivery to the rest.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    inner: Arc<Mutex<HashMap<Uuid, mpsc::Sender<String>>>>,
}

pub struct Registration {
    pub connection_id: Uuid,
    pub sender: mpsc::Sender<String>,
    pub receiver: mpsc::Receiver<String>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> Registration {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        let connection_id = Uuid::new_v4();
        self.inner.lock().insert(connection_id, tx.clone());
        Registration {
            connection_id,
            sender: tx,
            receiver: rx,
        }
    }

    pub fn unregister(&self, connection_id: Uuid) {
        self.inner.lock().remove(&connection_id);
    }

    /// Queues one line to every connected client. Returns the number of
    /// clients the line was delivered to. Clients whose channel has closed
    /// or filled up are dropped from the set; a full queue means the writer
    /// task is stuck on a peer that stopped reading.
    pub fn broadcast(&self, line: &str) -> usize {
        let targets: Vec<(Uuid, mpsc::Sender<String>)> = self
            .inner
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        for (connection_id, sender) in targets {
            match sender.try_send(line.to_string()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(%connection_id, "evicting stalled client: send queue full");
                    self.inner.lock().remove(&connection_id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(%connection_id, "evicting disconnected client");
                    self.inner.lock().remove(&connection_id);
                }
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_all_registered_clients() {
        let registry = ClientRegistry::new();
        let mut a = registry.register();
        let mut b = registry.register();

        assert_eq!(registry.broadcast("{\"type\":\"card_read\",\"uid\":\"X\"}"), 2);
        assert!(a.receiver.recv().await.unwrap().contains("card_read"));
        assert!(b.receiver.recv().await.is_some());
    }

    #[tokio::test]
    async fn closed_client_is_evicted_without_blocking_others() {
        let registry = ClientRegistry::new();
        let gone = registry.register();
        let mut alive = registry.register();
        drop(gone.receiver);
        drop(gone.sender);

        assert_eq!(registry.broadcast("line"), 1);
        assert_eq!(alive.receiver.recv().await.as_deref(), Some("line"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn stalled_client_with_full_queue_is_evicted() {
        let registry = ClientRegistry::new();
        let stuck = registry.register();
        let mut alive = registry.register();

        // Fill the stuck client's queue as if its writer stopped draining.
        for _ in 0..CHANNEL_DEPTH {
            stuck.sender.try_send("backlog".to_string()).unwrap();
        }

        assert_eq!(registry.broadcast("line"), 1);
        assert_eq!(alive.receiver.recv().await.as_deref(), Some("line"));
        assert_eq!(registry.len(), 1);

        // Once evicted it stays out.
        assert_eq!(registry.broadcast("again"), 1);
    }

    #[tokio::test]
    async fn unregister_removes_from_broadcast_set() {
        let registry = ClientRegistry::new();
        let reg = registry.register();
        registry.unregister(reg.connection_id);
        assert!(registry.is_empty());
        assert_eq!(registry.broadcast("line"), 0);
    }
}
