//! # localmighty-shared
//!
//! Wire contract shared by the LocalMighty server and its tests: event
//! names, room names, protocol limits, typed payloads and the inbound event
//! catalog for both the main namespace and the hub (`/share`) namespace.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
