//! `relay_server`
//!
//! Server-side systems:
//! - Roster state machine (connect/create/update/disconnect)
//! - Accept loop and per-connection reader/writer tasks
//! - Full-mapping broadcast on every mutation
//!
//! Networking model:
//! - One persistent TCP connection per client, length-prefixed JSON frames.
//! - A single event-loop task owns the roster; nothing else touches it.

pub mod roster;
pub mod server;

pub use server::RelayServer;
