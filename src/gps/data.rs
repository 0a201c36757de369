// src/gps/data.rs
//! GNSS fix structures

use chrono::{NaiveTime, Timelike};
use std::fmt;

/// GGA fix quality indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixQuality {
    NoFix,
    Gps,
    Dgps,
    Pps,
    RtkFixed,
    RtkFloat,
    Estimated,
    Manual,
    Simulation,
    Other(u8),
}

impl FixQuality {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => FixQuality::NoFix,
            1 => FixQuality::Gps,
            2 => FixQuality::Dgps,
            3 => FixQuality::Pps,
            4 => FixQuality::RtkFixed,
            5 => FixQuality::RtkFloat,
            6 => FixQuality::Estimated,
            7 => FixQuality::Manual,
            8 => FixQuality::Simulation,
            other => FixQuality::Other(other),
        }
    }

    /// Numeric code as it appears on the wire
    pub fn code(&self) -> u8 {
        match self {
            FixQuality::NoFix => 0,
            FixQuality::Gps => 1,
            FixQuality::Dgps => 2,
            FixQuality::Pps => 3,
            FixQuality::RtkFixed => 4,
            FixQuality::RtkFloat => 5,
            FixQuality::Estimated => 6,
            FixQuality::Manual => 7,
            FixQuality::Simulation => 8,
            FixQuality::Other(code) => *code,
        }
    }
}

/// Hemisphere indicator carried next to each coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    pub fn from_field(field: &str) -> Option<Self> {
        match field {
            "N" => Some(Hemisphere::North),
            "S" => Some(Hemisphere::South),
            "E" => Some(Hemisphere::East),
            "W" => Some(Hemisphere::West),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Hemisphere::North => 'N',
            Hemisphere::South => 'S',
            Hemisphere::East => 'E',
            Hemisphere::West => 'W',
        }
    }

    /// Sign applied to the unsigned NMEA magnitude
    pub fn sign(&self) -> f64 {
        match self {
            Hemisphere::South | Hemisphere::West => -1.0,
            Hemisphere::North | Hemisphere::East => 1.0,
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Number of decimals kept for geographic coordinates
pub const GEOGRAPHIC_DECIMALS: u32 = 8;
/// Number of decimals kept for projected coordinates
pub const PROJECTED_DECIMALS: u32 = 3;

/// Round half away from zero to a fixed number of decimals
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// One decoded positioning sample, native and projected.
///
/// Only the sentence parser builds these; there are no setters.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    timestamp: NaiveTime,
    /// Satellite count text as the receiver sent it
    satellites: String,
    quality: FixQuality,
    latitude: f64,
    lat_hemisphere: Hemisphere,
    longitude: f64,
    lon_hemisphere: Hemisphere,
    altitude: f64,
    /// HDOP text as the receiver sent it
    hdop: String,
    easting: f64,
    northing: f64,
}

impl Fix {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        timestamp: NaiveTime,
        satellites: String,
        quality: FixQuality,
        latitude: f64,
        lat_hemisphere: Hemisphere,
        longitude: f64,
        lon_hemisphere: Hemisphere,
        altitude: f64,
        hdop: String,
        easting: f64,
        northing: f64,
    ) -> Self {
        Self {
            timestamp,
            satellites,
            quality,
            latitude: round_to(latitude, GEOGRAPHIC_DECIMALS),
            lat_hemisphere,
            longitude: round_to(longitude, GEOGRAPHIC_DECIMALS),
            lon_hemisphere,
            altitude,
            hdop,
            easting: round_to(easting, PROJECTED_DECIMALS),
            northing: round_to(northing, PROJECTED_DECIMALS),
        }
    }

    /// Zero padding preserved, e.g. `08`
    pub fn satellites(&self) -> &str {
        &self.satellites
    }

    pub fn quality(&self) -> FixQuality {
        self.quality
    }

    /// Signed decimal degrees, 8 decimals
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn lat_hemisphere(&self) -> Hemisphere {
        self.lat_hemisphere
    }

    /// Signed decimal degrees, 8 decimals
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn lon_hemisphere(&self) -> Hemisphere {
        self.lon_hemisphere
    }

    /// Meters above mean sea level
    pub fn altitude(&self) -> f64 {
        self.altitude
    }

    pub fn hdop(&self) -> &str {
        &self.hdop
    }

    /// Projected easting in meters, 3 decimals
    pub fn easting(&self) -> f64 {
        self.easting
    }

    /// Projected northing in meters, 3 decimals
    pub fn northing(&self) -> f64 {
        self.northing
    }

    /// `HH:MM:SS`, with microseconds only when the receiver sent a fraction
    pub fn format_timestamp(&self) -> String {
        if self.timestamp.nanosecond() == 0 {
            self.timestamp.format("%H:%M:%S").to_string()
        } else {
            self.timestamp.format("%H:%M:%S%.6f").to_string()
        }
    }
}
