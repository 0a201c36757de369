// src/gps/nmea.rs
//! NMEA GGA sentence parsing

use super::data::{Fix, FixQuality, Hemisphere};
use super::projection::UtmProjection;
use crate::error::{BridgeError, Result};
use chrono::NaiveTime;
use std::str::FromStr;

/// The one sentence type the bridge acts on
pub const POSITION_SENTENCE_TAG: &str = "$GNGGA";

const GGA_MIN_FIELDS: usize = 10;
const MAX_LATITUDE: f64 = 90.0;
const MAX_LONGITUDE: f64 = 180.0;

/// True if the line is a recognized positioning sentence
pub fn is_position_sentence(line: &str) -> bool {
    line.strip_prefix(POSITION_SENTENCE_TAG)
        .map_or(false, |rest| rest.starts_with(','))
}

/// Parse one device line.
///
/// Returns `Ok(None)` for any other sentence type. A tagged but malformed
/// sentence is an error that costs only this line.
pub fn parse_fix(line: &str, projection: &UtmProjection) -> Result<Option<Fix>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if !is_position_sentence(line) {
        return Ok(None);
    }

    let body = verify_checksum(line)?;
    let parts: Vec<&str> = body.split(',').collect();

    if parts.len() < GGA_MIN_FIELDS {
        return Err(BridgeError::Parse(format!(
            "GGA has {} fields, expected at least {}",
            parts.len(),
            GGA_MIN_FIELDS
        )));
    }

    if parts[2].is_empty() || parts[4].is_empty() {
        return Err(BridgeError::NoPosition);
    }

    let timestamp = parse_time(parts[1])?;

    let lat_hemisphere = hemisphere(parts[3], Hemisphere::North, Hemisphere::South)?;
    let latitude = parse_degrees(parts[2], MAX_LATITUDE)? * lat_hemisphere.sign();

    let lon_hemisphere = hemisphere(parts[5], Hemisphere::East, Hemisphere::West)?;
    let longitude = parse_degrees(parts[4], MAX_LONGITUDE)? * lon_hemisphere.sign();

    let quality = FixQuality::from_code(field::<u8>(parts[6], "fix quality")?);
    let satellites = verbatim(parts[7], "satellite count", |b| b.is_ascii_digit())?;
    field::<u8>(satellites, "satellite count")?;
    let hdop = verbatim(parts[8], "HDOP", |b| b.is_ascii_digit() || b == b'.')?;
    number(hdop, "HDOP")?;
    let altitude = number(parts[9], "altitude")?;

    let projected = projection.transform(longitude, latitude);
    if !projected.easting.is_finite() || !projected.northing.is_finite() {
        return Err(BridgeError::Parse(format!(
            "position {}, {} cannot be projected",
            latitude, longitude
        )));
    }

    Ok(Some(Fix::new(
        timestamp,
        satellites.to_string(),
        quality,
        latitude,
        lat_hemisphere,
        longitude,
        lon_hemisphere,
        altitude,
        hdop.to_string(),
        projected.easting,
        projected.northing,
    )))
}

/// Check the `*hh` suffix if present and return the sentence without it
fn verify_checksum(line: &str) -> Result<&str> {
    let Some((body, checksum)) = line.split_once('*') else {
        return Ok(line);
    };

    let expected = u8::from_str_radix(checksum.trim(), 16)
        .map_err(|_| BridgeError::Parse(format!("invalid checksum field '{}'", checksum)))?;
    let actual = body
        .trim_start_matches('$')
        .bytes()
        .fold(0u8, |acc, b| acc ^ b);

    if expected != actual {
        return Err(BridgeError::Checksum { expected, actual });
    }
    Ok(body)
}

fn field<T: FromStr>(value: &str, name: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| BridgeError::Parse(format!("invalid {} '{}'", name, value)))
}

/// A finite number; `NaN` and `inf` parse as `f64` but are never valid fields
fn number(value: &str, name: &str) -> Result<f64> {
    let parsed = field::<f64>(value, name)?;
    if !parsed.is_finite() {
        return Err(BridgeError::Parse(format!("invalid {} '{}'", name, value)));
    }
    Ok(parsed)
}

/// Field text forwarded to the client as the receiver wrote it
fn verbatim<'a>(value: &'a str, name: &str, allowed: impl Fn(u8) -> bool) -> Result<&'a str> {
    if value.is_empty() || !value.bytes().all(allowed) {
        return Err(BridgeError::Parse(format!("invalid {} '{}'", name, value)));
    }
    Ok(value)
}

fn hemisphere(value: &str, positive: Hemisphere, negative: Hemisphere) -> Result<Hemisphere> {
    match Hemisphere::from_field(value) {
        Some(h) if h == positive || h == negative => Ok(h),
        _ => Err(BridgeError::Parse(format!("invalid hemisphere '{}'", value))),
    }
}

/// `ddmm.mmmm` / `dddmm.mmmm` to unsigned decimal degrees, at most `max`
fn parse_degrees(value: &str, max: f64) -> Result<f64> {
    let raw = number(value, "coordinate")?;
    if raw < 0.0 {
        return Err(BridgeError::Parse(format!("negative coordinate '{}'", value)));
    }
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    if minutes >= 60.0 {
        return Err(BridgeError::Parse(format!("minutes out of range in '{}'", value)));
    }
    let decimal = degrees + minutes / 60.0;
    if decimal > max {
        return Err(BridgeError::Parse(format!("coordinate '{}' beyond {} degrees", value, max)));
    }
    Ok(decimal)
}

/// `hhmmss[.sss]`
fn parse_time(value: &str) -> Result<NaiveTime> {
    let invalid = || BridgeError::Parse(format!("invalid time '{}'", value));

    if value.len() < 6 || !value.is_ascii() {
        return Err(invalid());
    }
    let hour = value[0..2].parse::<u32>().map_err(|_| invalid())?;
    let minute = value[2..4].parse::<u32>().map_err(|_| invalid())?;
    let seconds = value[4..].parse::<f64>().map_err(|_| invalid())?;
    if !(0.0..60.0).contains(&seconds) {
        return Err(invalid());
    }
    let whole = seconds.trunc();
    let micros = ((seconds - whole) * 1_000_000.0).round() as u32;

    NaiveTime::from_hms_micro_opt(hour, minute, whole as u32, micros.min(999_999)).ok_or_else(invalid)
}
