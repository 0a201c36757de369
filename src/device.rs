// src/device.rs
//! Serial receiver acquisition

use crate::{
    config::BridgeConfig,
    error::{BridgeError, Result},
    protocol::ReceiverStatus,
    session::link::LinkSender,
};
use log::{info, warn};
use std::{path::Path, time::Duration};
use tokio::{io::AsyncRead, time::sleep};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};

/// Something that can hand out a readable receiver stream
pub trait DeviceOpener {
    type Device: AsyncRead + Unpin + Send;

    /// One attempt; never blocks waiting for the device to appear
    fn open(&self) -> Result<Self::Device>;
}

/// GNSS receiver on a local serial port, 8N1
#[derive(Debug, Clone)]
pub struct SerialDevice {
    port: String,
    baudrate: u32,
}

impl SerialDevice {
    pub fn new(port: impl Into<String>, baudrate: u32) -> Self {
        Self {
            port: port.into(),
            baudrate,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.serial_port.clone(), config.serial_baudrate)
    }
}

impl DeviceOpener for SerialDevice {
    type Device = SerialStream;

    fn open(&self) -> Result<SerialStream> {
        if !Path::new(&self.port).exists() {
            return Err(BridgeError::Connection(format!("{} not found", self.port)));
        }

        tokio_serial::new(&self.port, self.baudrate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(Duration::from_millis(1000))
            .open_native_async()
            .map_err(|e| BridgeError::Connection(format!("Failed to open serial port {}: {}", self.port, e)))
    }
}

/// Retry until the receiver opens, telling the client about every miss.
///
/// There is no attempt limit. Only a dead client link ends the wait early.
pub async fn acquire<O: DeviceOpener>(
    opener: &O,
    link: &LinkSender,
    retry_interval: Duration,
) -> Result<O::Device> {
    loop {
        match opener.open() {
            Ok(device) => {
                info!("Receiver opened");
                return Ok(device);
            }
            Err(e) => {
                warn!("GPS device not ready, waiting... ({})", e);
                link.send_line(ReceiverStatus::NotConnected.to_string()).await?;
                sleep(retry_interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::link;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream};

    struct FlakyOpener {
        failures: usize,
        attempts: AtomicUsize,
    }

    impl DeviceOpener for FlakyOpener {
        type Device = DuplexStream;

        fn open(&self) -> Result<DuplexStream> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                Err(BridgeError::Connection("not yet".to_string()))
            } else {
                Ok(tokio::io::duplex(64).0)
            }
        }
    }

    #[tokio::test]
    async fn test_missing_port_is_not_found() {
        let device = SerialDevice::new("/dev/does-not-exist-gnss", 38400);
        assert!(matches!(device.open(), Err(BridgeError::Connection(_))));
    }

    #[tokio::test]
    async fn test_status_pushed_per_failed_attempt() {
        let (client, server) = tokio::io::duplex(1024);
        let (sender, writer) = link::spawn_writer(server);
        let opener = FlakyOpener {
            failures: 3,
            attempts: AtomicUsize::new(0),
        };

        acquire(&opener, &sender, Duration::from_millis(5)).await.unwrap();
        assert_eq!(opener.attempts.load(Ordering::SeqCst), 4);

        drop(sender);
        writer.await.unwrap().unwrap();

        let mut lines = BufReader::new(client).lines();
        let mut received = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            received.push(line);
        }
        assert_eq!(received, vec!["STATUS: Receiver not connected"; 3]);
    }

    #[tokio::test]
    async fn test_dead_client_ends_wait() {
        let (client, server) = tokio::io::duplex(1024);
        let (sender, _writer) = link::spawn_writer(server);
        drop(client);
        let opener = FlakyOpener {
            failures: usize::MAX,
            attempts: AtomicUsize::new(0),
        };

        let result = acquire(&opener, &sender, Duration::from_millis(1)).await;
        assert!(matches!(result, Err(BridgeError::ClientDisconnected)));
    }
}
