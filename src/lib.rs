// src/lib.rs
//! GNSS Bridge Library
//!
//! Streams fixes from a serial GNSS receiver to one Bluetooth RFCOMM client,
//! projected to ETRS89 / UTM zone 33N, and starts an RTK correction relay on
//! the client's request.

pub mod config;
pub mod device;
pub mod error;
pub mod gps;
pub mod protocol;
pub mod rtk;
pub mod session;

#[cfg(target_os = "linux")]
pub mod bluetooth;

// Re-export main types for convenience
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use gps::{Fix, UtmProjection};
pub use session::{CloseReason, Session};
