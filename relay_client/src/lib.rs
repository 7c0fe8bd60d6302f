//! `relay_client`
//!
//! Client-side systems:
//! - Connection management (handshake over the persistent channel)
//! - Key input mapped to impulses on the local record
//! - Fixed-rate `update-box` sending
//! - Remote roster mirroring with interpolation for remote boxes
//!
//! This is the headless boundary of the system: rendering and physics
//! live elsewhere, the client only moves records around.

pub mod client;
pub mod input;
pub mod interp;

pub use client::RelayClient;
