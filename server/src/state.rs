use std::sync::Arc;

use crate::auth::AdminDirectory;
use crate::registry::ClientRegistry;
use crate::session::SessionTable;
use crate::store::WorkerStore;

/// Shared state handed to every per-connection handler.
#[derive(Clone)]
pub struct BridgeState {
    pub store: Arc<dyn WorkerStore>,
    pub admins: Arc<AdminDirectory>,
    pub sessions: SessionTable,
    pub registry: ClientRegistry,
}

impl BridgeState {
    pub fn new(store: Arc<dyn WorkerStore>, admins: AdminDirectory) -> Self {
        Self {
            store,
            admins: Arc::new(admins),
            sessions: SessionTable::new(),
            registry: ClientRegistry::new(),
        }
    }
}
