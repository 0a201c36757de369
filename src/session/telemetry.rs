// src/session/telemetry.rs
//! Telemetry duty: receiver lines in, fix records out

use super::link::LinkSender;
use crate::{
    error::{BridgeError, Result},
    gps::{nmea, UtmProjection},
    protocol,
};
use log::{debug, trace, warn};
use std::io::ErrorKind;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// NMEA caps a sentence at 82 characters; anything far past that is noise
const MAX_LINE_BYTES: usize = 512;

/// Stream fixes until the device fails or the client goes away.
///
/// Never returns `Ok`; the caller stops it by dropping the future.
pub async fn run<D>(device: &mut D, link: &LinkSender, projection: &UtmProjection) -> Result<()>
where
    D: AsyncBufRead + Unpin,
{
    let mut raw = Vec::with_capacity(128);

    loop {
        raw.clear();
        match read_line_capped(device, &mut raw).await {
            Ok(Some(0)) => return Err(BridgeError::DeviceLost("end of stream".to_string())),
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!("Skipping receiver line longer than {} bytes", MAX_LINE_BYTES);
                continue;
            }
            Err(e) if is_transient(&e) => {
                debug!("Skipping unreadable receiver line: {}", e);
                continue;
            }
            Err(e) => return Err(BridgeError::DeviceLost(e.to_string())),
        }

        let line = match std::str::from_utf8(&raw) {
            Ok(line) => line.trim(),
            Err(e) => {
                debug!("Skipping non-UTF-8 receiver line: {}", e);
                continue;
            }
        };

        match nmea::parse_fix(line, projection) {
            Ok(Some(fix)) => link.send_line(protocol::format_fix(&fix)).await?,
            Ok(None) => trace!("Ignoring sentence: {}", line),
            Err(BridgeError::NoPosition) => debug!("No position yet: {}", line),
            Err(e) => warn!("Skipping malformed sentence ({}): {}", e, line),
        }
    }
}

/// Read one line of at most [`MAX_LINE_BYTES`].
///
/// A longer line is dropped up to and including its terminator and reported
/// as `None`; `raw` never grows past the cap.
async fn read_line_capped<D>(device: &mut D, raw: &mut Vec<u8>) -> std::io::Result<Option<usize>>
where
    D: AsyncBufRead + Unpin,
{
    let n = (&mut *device).take(MAX_LINE_BYTES as u64).read_until(b'\n', raw).await?;
    if n < MAX_LINE_BYTES || raw.last() == Some(&b'\n') {
        return Ok(Some(n));
    }

    loop {
        raw.clear();
        let n = (&mut *device).take(MAX_LINE_BYTES as u64).read_until(b'\n', raw).await?;
        if n == 0 {
            return Ok(Some(0));
        }
        if raw.last() == Some(&b'\n') {
            raw.clear();
            return Ok(None);
        }
    }
}

fn is_transient(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted | ErrorKind::InvalidData
    )
}
