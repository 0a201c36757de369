// src/rtk.rs
//! RTK correction service: reachability probe and correction relay process

use crate::{config::BridgeConfig, protocol::CommandResult};
use log::{info, warn};
use std::{future::Future, process::Stdio, time::Duration};
use tokio::{
    net::TcpStream,
    process::{Child, Command},
    time::timeout,
};

/// Answers whether the correction caster can be reached at all
pub trait ConnectivityProbe {
    fn is_reachable(&self) -> impl Future<Output = bool> + Send;
}

/// Starts and stops the process feeding corrections to the receiver
pub trait CorrectionRelay {
    fn start(&mut self) -> impl Future<Output = CommandResult> + Send;

    /// Kill a running relay. No-op if none is running.
    fn stop(&mut self) -> impl Future<Output = ()> + Send;
}

/// TCP connect to a well-known host, bounded by a timeout
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.probe_address.clone(), config.probe_timeout())
    }
}

impl ConnectivityProbe for TcpProbe {
    async fn is_reachable(&self) -> bool {
        match timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_)) => {
                info!("Internet connection: true");
                true
            }
            Ok(Err(e)) => {
                warn!("Internet connection: false ({}: {})", self.address, e);
                false
            }
            Err(_) => {
                warn!("Internet connection: false ({} timed out)", self.address);
                false
            }
        }
    }
}

/// `str2str` (RTKLIB) relaying an NTRIP stream onto the receiver's port
#[derive(Debug)]
pub struct Str2StrRelay {
    program: String,
    args: Vec<String>,
    startup_grace: Duration,
    child: Option<Child>,
}

impl Str2StrRelay {
    pub fn new(program: impl Into<String>, args: Vec<String>, startup_grace: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            startup_grace,
            child: None,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.relay_program.clone(),
            config.relay_args.clone(),
            config.relay_startup_grace(),
        )
    }

    fn is_running(&mut self) -> bool {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(_) => {
                self.child = None;
                false
            }
            None => false,
        }
    }
}

impl CorrectionRelay for Str2StrRelay {
    async fn start(&mut self) -> CommandResult {
        if self.is_running() {
            info!("{} already running", self.program);
            return CommandResult::Started;
        }

        info!("starting {}...", self.program);
        let mut child = match Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn {}: {}", self.program, e);
                return CommandResult::ProcessError;
            }
        };

        // The relay normally runs until killed; an early exit decides the result
        let waited = timeout(self.startup_grace, child.wait()).await;
        match waited {
            Err(_) => {
                self.child = Some(child);
                CommandResult::Started
            }
            Ok(Ok(status)) if status.success() => CommandResult::Started,
            Ok(Ok(status)) => {
                warn!("{} exited with {}", self.program, status);
                CommandResult::ProcessError
            }
            Ok(Err(e)) => {
                warn!("Failed waiting for {}: {}", self.program, e);
                CommandResult::ProcessError
            }
        }
    }

    async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            info!("Stopping {}", self.program);
            if let Err(e) = child.kill().await {
                warn!("Failed to stop {}: {}", self.program, e);
            }
        }
    }
}
