// src/bluetooth.rs
//! Bluetooth adapter bootstrap and RFCOMM listener (BlueZ)

use crate::{
    config::BridgeConfig,
    error::{BridgeError, Result},
};
use bluer::{
    rfcomm::{Profile, Role, Stream},
    Address, Uuid,
};
use futures::StreamExt;
use log::info;

/// Serial Port Profile service class, so generic SPP clients find the service
pub const SERIAL_PORT_CLASS: Uuid = Uuid::from_u128(0x0000_1101_0000_1000_8000_0080_5f9b_34fb);

/// Identity the RFCOMM service is advertised under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub uuid: Uuid,
    pub name: String,
}

impl ServiceIdentity {
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        let uuid = Uuid::parse_str(&config.service_uuid).map_err(|e| {
            BridgeError::Config(format!("invalid service_uuid '{}': {}", config.service_uuid, e))
        })?;

        Ok(Self {
            uuid,
            name: config.service_name.clone(),
        })
    }

    /// Server profile registered with BlueZ: the custom UUID, listed under
    /// the serial port class
    pub fn profile(&self) -> Profile {
        Profile {
            uuid: self.uuid,
            name: Some(self.name.clone()),
            service: Some(SERIAL_PORT_CLASS),
            role: Some(Role::Server),
            require_authentication: Some(false),
            require_authorization: Some(false),
            ..Default::default()
        }
    }
}

/// Process-lifetime handle on the BlueZ session and the adapter in use
pub struct RadioContext {
    session: bluer::Session,
    adapter: bluer::Adapter,
}

impl RadioContext {
    /// Power the default adapter on and make it discoverable.
    ///
    /// Safe to repeat. Returns [`BridgeError::NoAdapter`] when the host has
    /// no Bluetooth adapter at all.
    pub async fn bootstrap() -> Result<Self> {
        let session = bluer::Session::new().await?;

        if session.adapter_names().await?.is_empty() {
            return Err(BridgeError::NoAdapter);
        }
        let adapter = match session.default_adapter().await {
            Ok(adapter) => adapter,
            Err(e) if e.kind == bluer::ErrorKind::NotFound => return Err(BridgeError::NoAdapter),
            Err(e) => return Err(e.into()),
        };

        if !adapter.is_powered().await? {
            adapter.set_powered(true).await?;
        }
        adapter.set_discoverable_timeout(0).await?;
        if !adapter.is_discoverable().await? {
            adapter.set_discoverable(true).await?;
        }

        info!(
            "Adapter {} ({}) powered and discoverable",
            adapter.name(),
            adapter.address().await?
        );

        Ok(Self { session, adapter })
    }

    /// Advertise the service and accept exactly one client.
    ///
    /// The profile is unregistered as soon as the first client is accepted,
    /// so no further connections are taken.
    pub async fn accept_one(&self, service: &ServiceIdentity) -> Result<(Stream, Address)> {
        let mut handle = self.session.register_profile(service.profile()).await?;
        info!(
            "Advertising {} ({}) on {}, waiting for connection",
            service.name,
            service.uuid,
            self.adapter.name()
        );

        let request = handle
            .next()
            .await
            .ok_or_else(|| BridgeError::Connection("profile unregistered before any client connected".to_string()))?;
        let peer = request.device();
        let stream = request.accept()?;
        drop(handle);

        Ok((stream, peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_identity_from_default_config() {
        let service = ServiceIdentity::from_config(&BridgeConfig::default()).unwrap();
        assert_eq!(service.uuid.to_string(), "94f39d29-7d6d-437d-973b-fba39e49d4ee");
        assert_eq!(service.name, "GNSS_Server");
    }

    #[test]
    fn test_profile_listed_as_serial_port() {
        let service = ServiceIdentity::from_config(&BridgeConfig::default()).unwrap();
        let profile = service.profile();

        assert_eq!(profile.uuid, service.uuid);
        assert_eq!(profile.name.as_deref(), Some("GNSS_Server"));
        assert_eq!(profile.service, Some(SERIAL_PORT_CLASS));
        assert_eq!(SERIAL_PORT_CLASS.to_string(), "00001101-0000-1000-8000-00805f9b34fb");
        assert!(matches!(profile.role, Some(Role::Server)));
    }

    #[test]
    fn test_invalid_service_uuid() {
        let config = BridgeConfig {
            service_uuid: "not-a-uuid".to_string(),
            ..Default::default()
        };
        assert!(matches!(ServiceIdentity::from_config(&config), Err(BridgeError::Config(_))));
    }
}
