//! Shared primitives for the badge bridge NDJSON protocol.
//!
//! One JSON object per line, UTF-8, LF-terminated. The server and the
//! client library both speak in terms of [`Envelope`]; the GUI-facing
//! worker model lives in [`worker`].

mod envelope;
mod worker;

pub use envelope::{
    actions, AdminIdResult, AdminLoginBody, CardRead, CreateWorkerBody, DeleteWorkerBody,
    Envelope, ErrorCode, LoginResult, Request, Response, UpdateWorkerBody,
};
pub use worker::Worker;
