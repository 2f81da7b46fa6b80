//! Client library for the badge bridge.
//!
//! Hides connection lifecycle, line framing, and request multiplexing
//! behind blocking-style async calls: one persistent TCP connection,
//! request/response correlation by id, and `card_read` pushes delivered
//! to a registered callback.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use badge_bridge_core::{
    actions, AdminIdResult, CreateWorkerBody, Envelope, ErrorCode, LoginResult, Request, Response,
    UpdateWorkerBody, Worker,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

mod config;
mod error;

pub use config::ClientConfig;
pub use error::ClientError;

type CardReadCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Handle to the bridge. Cheap to clone; all clones share one connection,
/// one pending-request table, and one session token.
#[derive(Clone)]
pub struct BridgeClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<Response>>>,
    conn: tokio::sync::Mutex<Option<Connection>>,
    auth_token: Mutex<Option<String>>,
    card_read: Mutex<Option<CardReadCallback>>,
}

struct Connection {
    writer: OwnedWriteHalf,
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl BridgeClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                next_id: AtomicU64::new(0),
                pending: Mutex::new(HashMap::new()),
                conn: tokio::sync::Mutex::new(None),
                auth_token: Mutex::new(None),
                card_read: Mutex::new(None),
            }),
        }
    }

    pub fn from_env() -> Self {
        Self::new(ClientConfig::from_env())
    }

    /// Registers (or replaces) the callback invoked for each `card_read`
    /// push. The callback runs on the reader task.
    pub fn on_card_read(&self, callback: impl Fn(String) + Send + Sync + 'static) {
        *self.inner.card_read.lock() = Some(Arc::new(callback));
    }

    pub fn clear_card_read_callback(&self) {
        *self.inner.card_read.lock() = None;
    }

    /// The session token currently attached to outgoing requests.
    pub fn auth_token(&self) -> Option<String> {
        self.inner.auth_token.lock().clone()
    }

    pub fn set_auth_token(&self, token: Option<String>) {
        *self.inner.auth_token.lock() = token;
    }

    /// Sends one request and waits for its matched response.
    ///
    /// Connects lazily, injects the held session token into every action
    /// except `admin_login`, and gives up after the configured timeout.
    /// A response arriving after the timeout is dropped by the reader.
    pub async fn request(
        &self,
        action: &str,
        body: Value,
    ) -> Result<Option<Value>, ClientError> {
        let body = self.with_auth_token(action, body);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(id, tx);

        let envelope = Envelope::Request(Request {
            id,
            action: action.to_string(),
            body,
        });
        let mut line = match envelope.to_line() {
            Ok(line) => line,
            Err(err) => {
                self.inner.pending.lock().remove(&id);
                return Err(ClientError::Protocol(err.to_string()));
            }
        };
        line.push('\n');

        {
            let mut conn = self.inner.conn.lock().await;
            let connection = match self.ensure_connected(&mut conn).await {
                Ok(connection) => connection,
                Err(err) => {
                    self.inner.pending.lock().remove(&id);
                    return Err(err);
                }
            };
            if let Err(err) = connection.writer.write_all(line.as_bytes()).await {
                connection.alive.store(false, Ordering::Release);
                self.inner.pending.lock().remove(&id);
                return Err(ClientError::Transport(err));
            }
        }

        match tokio::time::timeout(self.inner.config.request_timeout, rx).await {
            Ok(Ok(response)) => classify(response),
            Ok(Err(_)) | Err(_) => {
                self.inner.pending.lock().remove(&id);
                Err(ClientError::Timeout)
            }
        }
    }

    /// Logs in and stores the returned session token for subsequent calls.
    pub async fn admin_login(&self, password: &str) -> Result<LoginResult, ClientError> {
        let body = json!({ "password": password.trim() });
        let result = self.request(actions::ADMIN_LOGIN, body).await?;
        let login: LoginResult = parse_body(result)?;
        self.set_auth_token(Some(login.token.clone()));
        Ok(login)
    }

    /// Invalidates the server session (best effort) and always clears the
    /// local token.
    pub async fn admin_logout(&self) {
        let token = self.inner.auth_token.lock().take();
        if let Some(token) = token {
            if let Err(err) = self
                .request(actions::ADMIN_LOGOUT, json!({ "auth_token": token }))
                .await
            {
                debug!(error = %err, "logout request failed; local token cleared anyway");
            }
        }
    }

    /// The sole admin's identity, or `None` when unavailable for any
    /// reason (no admin, not logged in, server unreachable).
    pub async fn get_first_admin_id(&self) -> Option<i64> {
        match self.request(actions::GET_FIRST_ADMIN_ID, json!({})).await {
            Ok(Some(body)) => serde_json::from_value::<AdminIdResult>(body)
                .ok()
                .map(|result| result.admin_id),
            _ => None,
        }
    }

    /// All workers, ascending by id.
    pub async fn list_workers(&self) -> Result<Vec<Worker>, ClientError> {
        match self.request(actions::LIST_WORKERS, json!({})).await? {
            Some(body) => {
                serde_json::from_value(body).map_err(|err| ClientError::Protocol(err.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    /// Registers a worker. `ClientError::Conflict` when the card UID is
    /// already taken.
    pub async fn create_worker(
        &self,
        admin_id: i64,
        name: &str,
        card_uid: &str,
    ) -> Result<Worker, ClientError> {
        let body = to_body(&CreateWorkerBody {
            admin_id,
            name: name.trim().to_string(),
            card_uid: card_uid.trim().to_string(),
        })?;
        parse_body(self.request(actions::CREATE_WORKER, body).await?)
    }

    /// Partial update; absent fields are left unchanged.
    pub async fn update_worker(
        &self,
        worker_id: i64,
        name: Option<&str>,
        card_uid: Option<&str>,
    ) -> Result<Worker, ClientError> {
        let body = to_body(&UpdateWorkerBody {
            worker_id,
            name: name.map(|n| n.trim().to_string()),
            card_uid: card_uid.map(|u| u.trim().to_string()),
        })?;
        parse_body(self.request(actions::UPDATE_WORKER, body).await?)
    }

    pub async fn delete_worker(&self, worker_id: i64) -> Result<(), ClientError> {
        self.request(actions::DELETE_WORKER, json!({ "worker_id": worker_id }))
            .await?;
        Ok(())
    }

    fn with_auth_token(&self, action: &str, body: Value) -> Value {
        if action == actions::ADMIN_LOGIN {
            return body;
        }
        let token = self.inner.auth_token.lock().clone();
        let Some(token) = token else {
            return body;
        };
        let mut map = body.as_object().cloned().unwrap_or_default();
        map.entry("auth_token".to_string())
            .or_insert_with(|| Value::String(token));
        Value::Object(map)
    }

    /// Reuses the live connection or establishes a new one. The previous
    /// connection is discarded once its reader has marked it dead.
    async fn ensure_connected<'a>(
        &self,
        conn: &'a mut Option<Connection>,
    ) -> Result<&'a mut Connection, ClientError> {
        let reusable = conn
            .as_ref()
            .map(|c| c.alive.load(Ordering::Acquire))
            .unwrap_or(false);
        if !reusable {
            *conn = Some(self.connect().await?);
        }
        conn.as_mut().ok_or_else(|| {
            ClientError::Transport(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection unavailable",
            ))
        })
    }

    async fn connect(&self) -> Result<Connection, ClientError> {
        let config = &self.inner.config;
        let stream = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .map_err(|err| match err.kind() {
                io::ErrorKind::ConnectionRefused => ClientError::ConnectionRefused {
                    host: config.host.clone(),
                    port: config.port,
                },
                _ => ClientError::Transport(err),
            })?;
        let _ = stream.set_nodelay(true);
        let (read_half, writer) = stream.into_split();
        let alive = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_loop(
            Arc::downgrade(&self.inner),
            read_half,
            Arc::clone(&alive),
        ));
        debug!(host = %config.host, port = config.port, "connected to bridge");
        Ok(Connection {
            writer,
            alive,
            reader,
        })
    }
}

/// One reader per live connection: resolves pending requests and delivers
/// `card_read` pushes. On exit the connection is marked dead; in-flight
/// requests are left to time out rather than being proactively failed.
async fn read_loop(inner: Weak<ClientInner>, read_half: OwnedReadHalf, alive: Arc<AtomicBool>) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                debug!(error = %err, "bridge connection read failed");
                break;
            }
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match Envelope::parse_line(&line) {
            Some(Envelope::Response(response)) => {
                let slot = inner.pending.lock().remove(&response.id);
                match slot {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => debug!(id = response.id, "response for unknown or timed-out request"),
                }
            }
            Some(Envelope::CardRead(event)) => {
                if event.uid.is_empty() {
                    warn!("card_read ignored: empty uid");
                    continue;
                }
                let callback = inner.card_read.lock().clone();
                match callback {
                    Some(callback) => {
                        debug!(uid = %event.uid, "delivering card_read push");
                        callback(event.uid);
                    }
                    None => warn!(uid = %event.uid, "card_read ignored: no callback registered"),
                }
            }
            Some(Envelope::Request(_)) | None => {
                debug!("dropping unexpected line from server");
            }
        }
    }
    alive.store(false, Ordering::Release);
}

fn classify(response: Response) -> Result<Option<Value>, ClientError> {
    if response.ok {
        return Ok(response.body);
    }
    let message = response
        .error
        .unwrap_or_else(|| "request failed".to_string());
    match response.code {
        Some(ErrorCode::NotFound) => Err(ClientError::NotFound),
        Some(ErrorCode::Conflict) => Err(ClientError::Conflict(message)),
        Some(ErrorCode::Unauthorized) => Err(ClientError::Unauthorized(message)),
        Some(ErrorCode::BadRequest) | None => Err(ClientError::Server(message)),
    }
}

fn parse_body<T: DeserializeOwned>(body: Option<Value>) -> Result<T, ClientError> {
    let body = body.ok_or_else(|| ClientError::Protocol("response body missing".to_string()))?;
    serde_json::from_value(body).map_err(|err| ClientError::Protocol(err.to_string()))
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<Value, ClientError> {
    serde_json::to_value(value).map_err(|err| ClientError::Protocol(err.to_string()))
}
