// src/gps/mod.rs
//! GNSS data handling, parsing and projection

pub mod data;
pub mod nmea;
pub mod projection;

pub use data::{Fix, FixQuality, Hemisphere};
pub use projection::UtmProjection;
