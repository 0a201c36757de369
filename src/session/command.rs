// src/session/command.rs
//! Command duty: client commands in, RTK results out

use super::link::LinkSender;
use crate::{
    error::{BridgeError, Result},
    protocol::{self, Command, CommandResult},
    rtk::{ConnectivityProbe, CorrectionRelay},
};
use log::{debug, info};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    sync::watch,
};

const READ_CHUNK: usize = 1024;
const MAX_PENDING_BYTES: usize = 1024;

/// Handle client commands until told to stop or the client disconnects.
///
/// The read is raced against the stop signal, so stopping never waits for the
/// client to send another line. A running relay is stopped on the way out.
pub async fn run<R, P, C>(
    mut reader: R,
    link: LinkSender,
    probe: P,
    mut relay: C,
    mut stop: watch::Receiver<bool>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    P: ConnectivityProbe,
    C: CorrectionRelay,
{
    let result = serve(&mut reader, &link, &probe, &mut relay, &mut stop).await;
    relay.stop().await;
    result
}

async fn serve<R, P, C>(
    reader: &mut R,
    link: &LinkSender,
    probe: &P,
    relay: &mut C,
    stop: &mut watch::Receiver<bool>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    P: ConnectivityProbe,
    C: CorrectionRelay,
{
    let mut buf = [0u8; READ_CHUNK];
    // text after the last line break, waiting for the rest of its line
    let mut pending = String::new();

    loop {
        let read = tokio::select! {
            biased;
            _ = stopped(stop) => return Ok(()),
            read = reader.read(&mut buf) => read,
        };

        let n = match read {
            Ok(0) => return Err(BridgeError::ClientDisconnected),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Client read failed: {}", e);
                return Err(BridgeError::ClientDisconnected);
            }
        };

        pending.push_str(&String::from_utf8_lossy(&buf[..n]));
        let complete: String = match pending.rfind(['\r', '\n']) {
            Some(end) => pending.drain(..=end).collect(),
            None => String::new(),
        };
        for text in protocol::split_commands(&complete) {
            handle(text, link, probe, relay).await?;
        }

        // An unterminated tail that is already a whole command runs now
        if Command::parse(&pending).is_some() {
            let text = std::mem::take(&mut pending);
            handle(&text, link, probe, relay).await?;
        } else if pending.len() > MAX_PENDING_BYTES {
            debug!("Dropping {} bytes of unterminated client text", pending.len());
            pending.clear();
        }
    }
}

async fn handle<P, C>(text: &str, link: &LinkSender, probe: &P, relay: &mut C) -> Result<()>
where
    P: ConnectivityProbe,
    C: CorrectionRelay,
{
    match Command::parse(text) {
        Some(Command::StartRtk) => {
            info!("RTK start requested");
            let result = start_rtk(probe, relay).await;
            info!("{}", result);
            link.send_line(result.to_string()).await
        }
        None => {
            debug!("Ignoring client text '{}'", text.trim());
            Ok(())
        }
    }
}

/// Probe first; the relay is only launched when the caster is reachable
pub async fn start_rtk<P, C>(probe: &P, relay: &mut C) -> CommandResult
where
    P: ConnectivityProbe,
    C: CorrectionRelay,
{
    if probe.is_reachable().await {
        relay.start().await
    } else {
        CommandResult::NoConnectivity
    }
}

/// Resolves once stop is set or its sender is gone
async fn stopped(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::session::link;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[derive(Clone)]
    pub(crate) struct FixedProbe(pub bool);

    impl ConnectivityProbe for FixedProbe {
        async fn is_reachable(&self) -> bool {
            self.0
        }
    }

    #[derive(Clone, Default)]
    pub(crate) struct RecordingRelay {
        pub starts: Arc<AtomicUsize>,
        pub stops: Arc<AtomicUsize>,
        pub fail: bool,
    }

    impl CorrectionRelay for RecordingRelay {
        async fn start(&mut self) -> CommandResult {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                CommandResult::ProcessError
            } else {
                CommandResult::Started
            }
        }

        async fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        client: tokio::io::DuplexStream,
        responses: tokio::io::Lines<BufReader<tokio::io::DuplexStream>>,
        stop: watch::Sender<bool>,
        duty: tokio::task::JoinHandle<Result<()>>,
    }

    fn start_duty(probe: FixedProbe, relay: RecordingRelay) -> Harness {
        let (client, server_read) = tokio::io::duplex(1024);
        let (client_read, server_write) = tokio::io::duplex(1024);
        let (sender, _writer) = link::spawn_writer(server_write);
        let (stop, stop_rx) = watch::channel(false);
        let duty = tokio::spawn(run(server_read, sender, probe, relay, stop_rx));
        Harness {
            client,
            responses: BufReader::new(client_read).lines(),
            stop,
            duty,
        }
    }

    async fn next_response(h: &mut Harness) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(2), h.responses.next_line())
            .await
            .expect("response timed out")
            .unwrap()
    }

    #[tokio::test]
    async fn test_no_connectivity_skips_relay() {
        let relay = RecordingRelay::default();
        let mut h = start_duty(FixedProbe(false), relay.clone());

        h.client.write_all(b"START_RTK\n").await.unwrap();

        assert_eq!(next_response(&mut h).await.as_deref(), Some("03: No internet connection"));
        assert_eq!(relay.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_started_and_process_error() {
        let relay = RecordingRelay::default();
        let mut h = start_duty(FixedProbe(true), relay.clone());
        h.client.write_all(b"START_RTK").await.unwrap();
        assert_eq!(next_response(&mut h).await.as_deref(), Some("01: RTK started"));
        assert_eq!(relay.starts.load(Ordering::SeqCst), 1);

        let failing = RecordingRelay {
            fail: true,
            ..Default::default()
        };
        let mut h = start_duty(FixedProbe(true), failing);
        h.client.write_all(b"START_RTK\r\n").await.unwrap();
        assert_eq!(
            next_response(&mut h).await.as_deref(),
            Some("02: Error executing str2str command")
        );
    }

    #[tokio::test]
    async fn test_other_text_ignored() {
        let relay = RecordingRelay::default();
        let mut h = start_duty(FixedProbe(false), relay.clone());

        h.client.write_all(b"HELLO\nstart_rtk\n").await.unwrap();
        h.client.write_all(b"START_RTK\n").await.unwrap();

        // the first response belongs to START_RTK; nothing was sent for the rest
        assert_eq!(next_response(&mut h).await.as_deref(), Some("03: No internet connection"));
        assert_eq!(relay.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_command_split_across_reads() {
        let relay = RecordingRelay::default();
        let mut h = start_duty(FixedProbe(true), relay.clone());

        h.client.write_all(b"START_").await.unwrap();
        h.client.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(relay.starts.load(Ordering::SeqCst), 0);
        h.client.write_all(b"RTK\n").await.unwrap();

        assert_eq!(next_response(&mut h).await.as_deref(), Some("01: RTK started"));
        assert_eq!(relay.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_noise_before_command_in_same_read() {
        let relay = RecordingRelay::default();
        let mut h = start_duty(FixedProbe(false), relay.clone());

        h.client.write_all(b"HEL").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.client.write_all(b"LO\r\nSTART_R").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.client.write_all(b"TK\r\n").await.unwrap();

        assert_eq!(next_response(&mut h).await.as_deref(), Some("03: No internet connection"));
    }

    #[tokio::test]
    async fn test_stop_without_client_input() {
        let relay = RecordingRelay::default();
        let h = start_duty(FixedProbe(true), relay.clone());

        h.stop.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), h.duty)
            .await
            .expect("duty did not stop")
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(relay.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_client_disconnect_ends_duty() {
        let relay = RecordingRelay::default();
        let h = start_duty(FixedProbe(true), relay.clone());

        drop(h.client);

        let result = tokio::time::timeout(Duration::from_secs(2), h.duty)
            .await
            .expect("duty did not end")
            .unwrap();
        assert!(matches!(result, Err(BridgeError::ClientDisconnected)));
        assert_eq!(relay.stops.load(Ordering::SeqCst), 1);
    }
}
