use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A badge-holding factory employee record, keyed by a unique card UID.
///
/// `admin_id` references the admin who registered the worker. `created_at`
/// travels as an RFC 3339 string on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: i64,
    pub admin_id: i64,
    pub name: String,
    pub card_uid: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
