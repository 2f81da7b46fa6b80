use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

/// In-memory map from opaque session token to admin identity.
///
/// Sessions are created on login and removed on logout; there is no
/// expiry. One admin may hold several concurrent sessions.
#[derive(Clone, Default)]
pub struct SessionTable {
    inner: Arc<Mutex<HashMap<String, i64>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a fresh random token bound to `admin_id`.
    pub fn insert(&self, admin_id: i64) -> String {
        let token = Uuid::new_v4().to_string();
        self.inner.lock().insert(token.clone(), admin_id);
        token
    }

    /// Removes the session if present. Idempotent.
    pub fn remove(&self, token: &str) {
        self.inner.lock().remove(token);
    }

    pub fn admin_for(&self, token: &str) -> Option<i64> {
        self.inner.lock().get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
