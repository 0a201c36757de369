// src/protocol.rs
//! Line protocol spoken with the Bluetooth client
//!
//! Every message is one text line. The exact strings below are what deployed
//! clients match on; do not change them.

use crate::gps::data::Fix;
use std::fmt;

/// Line terminator appended to every outbound message
pub const LINE_TERMINATOR: &str = "\n";

/// Marker between native and projected coordinates in a fix record
pub const PROJECTED_MARKER: &str = "UTM:";

/// The only command the client can send
pub const START_RTK: &str = "START_RTK";

/// Receiver readiness, pushed while the session acquires the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverStatus {
    NotConnected,
    Connected,
}

impl fmt::Display for ReceiverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverStatus::NotConnected => write!(f, "STATUS: Receiver not connected"),
            ReceiverStatus::Connected => write!(f, "STATUS: Receiver connected"),
        }
    }
}

/// Outcome of a correction-start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Started,
    ProcessError,
    NoConnectivity,
}

impl CommandResult {
    pub fn code(&self) -> &'static str {
        match self {
            CommandResult::Started => "01",
            CommandResult::ProcessError => "02",
            CommandResult::NoConnectivity => "03",
        }
    }

    fn text(&self) -> &'static str {
        match self {
            CommandResult::Started => "RTK started",
            CommandResult::ProcessError => "Error executing str2str command",
            CommandResult::NoConnectivity => "No internet connection",
        }
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.text())
    }
}

/// Commands understood from the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartRtk,
}

impl Command {
    /// Anything but the exact token is not a command
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            START_RTK => Some(Command::StartRtk),
            _ => None,
        }
    }
}

/// Split a received chunk into command candidates.
///
/// Clients may or may not terminate their commands, so every non-empty
/// piece between `\r`/`\n` counts.
pub fn split_commands(chunk: &str) -> impl Iterator<Item = &str> {
    chunk
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
}

/// Render a rounded value in shortest form, always with a fractional digit
pub fn format_decimal(value: f64) -> String {
    let text = format!("{}", value);
    if text.contains('.') || !value.is_finite() {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Serialize a fix as one telemetry record:
/// `time,nsat,qual,lat,N|S,lon,E|W,alt,hdop,UTM:,northing,easting`
pub fn format_fix(fix: &Fix) -> String {
    [
        fix.format_timestamp(),
        fix.satellites().to_string(),
        fix.quality().code().to_string(),
        format_decimal(fix.latitude()),
        fix.lat_hemisphere().to_string(),
        format_decimal(fix.longitude()),
        fix.lon_hemisphere().to_string(),
        format_decimal(fix.altitude()),
        fix.hdop().to_string(),
        PROJECTED_MARKER.to_string(),
        format_decimal(fix.northing()),
        format_decimal(fix.easting()),
    ]
    .join(",")
}
