//! `relay_shared`
//!
//! Shared libraries used by both the relay client and server.
//!
//! Design goals:
//! - One place for the wire protocol and the player record it carries.
//! - Keep serialization explicit and versionable.
//! - No `unsafe`.

pub mod config;
pub mod math;
pub mod net;
pub mod player;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::math::*;
    pub use crate::net::*;
    pub use crate::player::*;
}
