// src/session/mod.rs
//! One client, one receiver: the bridge session
//!
//! `Accepted -> AcquiringDevice -> Streaming -> Closing -> Closed`
//!
//! Telemetry runs on the task driving [`Session::run`]; commands run on one
//! spawned task. Both write through the single link writer.

pub mod command;
pub mod link;
pub mod telemetry;

use crate::{
    config::BridgeConfig,
    device::{self, DeviceOpener},
    error::{BridgeError, Result},
    gps::UtmProjection,
    protocol::ReceiverStatus,
    rtk::{ConnectivityProbe, CorrectionRelay},
};
use link::LinkSender;
use log::{debug, error, info, warn};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncWrite, BufReader, ReadHalf},
    sync::watch,
    task::JoinHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    AcquiringDevice,
    Streaming,
    Closing,
    Closed,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    Interrupted,
    ClientDisconnected,
    DeviceLost(String),
}

impl CloseReason {
    fn from_error(error: BridgeError) -> Self {
        match error {
            BridgeError::ClientDisconnected => CloseReason::ClientDisconnected,
            BridgeError::DeviceLost(msg) => CloseReason::DeviceLost(msg),
            other => CloseReason::DeviceLost(other.to_string()),
        }
    }
}

pub struct Session<S> {
    peer: String,
    reader: Option<ReadHalf<S>>,
    link: LinkSender,
    writer: JoinHandle<Result<()>>,
    stop: watch::Sender<bool>,
    state: SessionState,
    retry_interval: Duration,
    projection: Arc<UtmProjection>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Take ownership of an accepted client connection
    pub fn new(
        stream: S,
        peer: impl Into<String>,
        retry_interval: Duration,
        projection: Arc<UtmProjection>,
    ) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let (link, writer) = link::spawn_writer(writer);
        let (stop, _) = watch::channel(false);
        let peer = peer.into();
        info!("Accepted connection from {}", peer);

        Self {
            peer,
            reader: Some(reader),
            link,
            writer,
            stop,
            state: SessionState::Accepted,
            retry_interval,
            projection,
        }
    }

    pub fn from_config(
        stream: S,
        peer: impl Into<String>,
        config: &BridgeConfig,
        projection: Arc<UtmProjection>,
    ) -> Self {
        Self::new(stream, peer, config.retry_interval(), projection)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {}: {:?} -> {:?}", self.peer, self.state, next);
        self.state = next;
    }

    /// Drive the session to `Closed`.
    ///
    /// `shutdown` resolving is the process interruption.
    pub async fn run<O, P, C, F>(mut self, opener: &O, probe: P, relay: C, shutdown: F) -> CloseReason
    where
        O: DeviceOpener,
        P: ConnectivityProbe + Send + Sync + 'static,
        C: CorrectionRelay + Send + 'static,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        self.transition(SessionState::AcquiringDevice);
        let acquired = tokio::select! {
            _ = &mut shutdown => Err(None),
            acquired = device::acquire(opener, &self.link, self.retry_interval) => acquired.map_err(Some),
        };
        let device = match acquired {
            Ok(device) => device,
            Err(None) => {
                info!("Interrupted while waiting for receiver");
                return self.close(CloseReason::Interrupted, None, None::<O::Device>).await;
            }
            Err(Some(e)) => return self.close(CloseReason::from_error(e), None, None::<O::Device>).await,
        };

        info!("Receiver connected");
        if let Err(e) = self.link.send_line(ReceiverStatus::Connected.to_string()).await {
            return self.close(CloseReason::from_error(e), None, Some(device)).await;
        }
        self.transition(SessionState::Streaming);

        let Some(reader) = self.reader.take() else {
            return self.close(CloseReason::ClientDisconnected, None, Some(device)).await;
        };
        let mut commands = tokio::spawn(command::run(
            reader,
            self.link.clone(),
            probe,
            relay,
            self.stop.subscribe(),
        ));

        let mut device = BufReader::new(device);
        let (reason, joined) = tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted");
                (CloseReason::Interrupted, None)
            }
            streamed = telemetry::run(&mut device, &self.link, &self.projection) => {
                let reason = match streamed {
                    Ok(()) => CloseReason::DeviceLost("telemetry ended".to_string()),
                    Err(e) => CloseReason::from_error(e),
                };
                (reason, None)
            }
            joined = &mut commands => (CloseReason::ClientDisconnected, Some(joined)),
        };

        let commands = match joined {
            Some(joined) => {
                log_command_exit(joined);
                None
            }
            None => Some(commands),
        };
        self.close(reason, commands, Some(device.into_inner())).await
    }

    /// Stop the command duty, then release the client, then the device
    async fn close<D>(
        mut self,
        reason: CloseReason,
        commands: Option<JoinHandle<Result<()>>>,
        device: Option<D>,
    ) -> CloseReason {
        self.transition(SessionState::Closing);
        match &reason {
            CloseReason::DeviceLost(msg) => error!("Receiver lost: {}", msg),
            other => info!("Closing session with {}: {:?}", self.peer, other),
        }

        self.stop.send_replace(true);
        if let Some(commands) = commands {
            log_command_exit(commands.await);
        }

        let Session { peer, link, writer, reader, .. } = self;
        drop(reader);
        drop(link);
        match writer.await {
            Ok(Ok(())) | Ok(Err(BridgeError::ClientDisconnected)) => {}
            Ok(Err(e)) => warn!("Client writer failed: {}", e),
            Err(e) => error!("Client writer panicked: {}", e),
        }

        drop(device);
        debug!("Session {}: Closing -> Closed", peer);
        info!("Session with {} closed", peer);
        reason
    }
}

fn log_command_exit(joined: std::result::Result<Result<()>, tokio::task::JoinError>) {
    match joined {
        Ok(Ok(())) => debug!("Command duty stopped"),
        Ok(Err(BridgeError::ClientDisconnected)) => info!("Client disconnected"),
        Ok(Err(e)) => warn!("Command duty failed: {}", e),
        Err(e) => error!("Command duty panicked: {}", e),
    }
}
