//! Bridge server internals, exposed as a library so integration tests can
//! drive a real listener through [`connection::serve`].

pub mod auth;
pub mod connection;
pub mod dispatch;
pub mod registry;
pub mod serial;
pub mod session;
pub mod state;
pub mod store;
