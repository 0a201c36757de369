// src/main.rs
//! GNSS Bridge - serial GNSS receiver to Bluetooth RFCOMM client

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("Error: gnss-bridge requires BlueZ and only runs on Linux.");
    std::process::exit(1);
}

#[cfg(target_os = "linux")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use anyhow::Context;
    use clap::Parser;
    use gnss_bridge::{
        bluetooth::{RadioContext, ServiceIdentity},
        device::SerialDevice,
        rtk::{Str2StrRelay, TcpProbe},
        BridgeConfig, BridgeError, CloseReason, Session, UtmProjection,
    };
    use log::{error, info};
    use std::{path::PathBuf, sync::Arc};

    #[derive(Parser)]
    #[command(name = "gnss-bridge", version, about)]
    struct Args {
        /// JSON configuration file (defaults to ~/.config/gnss-bridge/config.json if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = BridgeConfig::load(args.config.as_deref()).context("loading configuration")?;
    let service = ServiceIdentity::from_config(&config)?;

    // Built once, shared by every fix
    let projection = Arc::new(UtmProjection::etrs89_zone33n());

    let radio = match RadioContext::bootstrap().await {
        Ok(radio) => radio,
        Err(BridgeError::NoAdapter) => {
            error!("USB dongle not found");
            anyhow::bail!(BridgeError::NoAdapter);
        }
        Err(e) => return Err(e).context("enabling Bluetooth adapter"),
    };

    let (stream, peer) = tokio::select! {
        accepted = radio.accept_one(&service) => accepted.context("accepting client")?,
        _ = shutdown_signal() => {
            info!("Interrupted before any client connected");
            return Ok(());
        }
    };

    let session = Session::from_config(stream, peer.to_string(), &config, projection);
    let reason = session
        .run(
            &SerialDevice::from_config(&config),
            TcpProbe::from_config(&config),
            Str2StrRelay::from_config(&config),
            shutdown_signal(),
        )
        .await;

    info!("Bridge stopped ({:?})", reason);
    match reason {
        CloseReason::DeviceLost(msg) => anyhow::bail!("receiver lost: {}", msg),
        CloseReason::Interrupted | CloseReason::ClientDisconnected => Ok(()),
    }
}

/// Ctrl-C, or SIGTERM from the service manager
#[cfg(target_os = "linux")]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}
