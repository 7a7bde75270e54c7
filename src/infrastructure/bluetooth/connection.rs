//! BLE Connection Module
//!
//! Connects to a discovered peripheral and exposes GATT reads, writes and
//! notifications.

use crate::domain::models::ScannedDevice;
use crate::error::BleError;
use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, ValueNotification, WriteType};
use btleplug::platform::Peripheral;
use futures::stream::BoxStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// GATT operations the LED loop needs
#[async_trait]
pub trait GattClient: Send + Sync {
    /// Whether service discovery produced at least one service
    fn has_services(&self) -> bool;
    async fn write(&self, characteristic: Uuid, value: &[u8]) -> Result<(), BleError>;
    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>, BleError>;
}

/// Notification side of a connected peripheral
#[async_trait]
pub trait NotifyClient: Send + Sync {
    /// Enable notifications on a characteristic
    async fn subscribe(&self, characteristic: Uuid) -> Result<(), BleError>;
    /// Disable notifications on a characteristic
    async fn unsubscribe(&self, characteristic: Uuid) -> Result<(), BleError>;
    /// Stream of every notification from the peripheral
    async fn notifications(&self) -> Result<BoxStream<'static, ValueNotification>, BleError>;
}

/// A connected peripheral with discovered services
pub struct BleConnection {
    peripheral: Peripheral,
    device: ScannedDevice,
}

impl BleConnection {
    /// Connect and discover services
    ///
    /// # Arguments
    /// * `services` - If non-empty, only these services are enumerated in the log
    pub async fn connect(
        peripheral: Peripheral,
        device: ScannedDevice,
        services: &[Uuid],
    ) -> Result<Self, BleError> {
        info!(
            "Connecting to {} ({})",
            device.name.as_deref().unwrap_or("Unknown"),
            device.address
        );

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        peripheral.discover_services().await?;
        info!("Connected");

        for service in peripheral.services() {
            if !services.is_empty() && !services.contains(&service.uuid) {
                continue;
            }
            debug!("Service {}", service.uuid);
            for c in &service.characteristics {
                debug!("  Characteristic {} {:?}", c.uuid, c.properties);
            }
        }

        Ok(Self { peripheral, device })
    }

    fn characteristic(&self, uuid: Uuid) -> Result<Characteristic, BleError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(BleError::CharacteristicNotFound(uuid))
    }

    pub async fn disconnect(&self) {
        match self.peripheral.disconnect().await {
            Ok(()) => info!(
                "Disconnected from {}",
                self.device.name.as_deref().unwrap_or(&self.device.address)
            ),
            Err(e) => warn!("Disconnect failed: {}", e),
        }
    }
}

#[async_trait]
impl NotifyClient for BleConnection {
    async fn subscribe(&self, characteristic: Uuid) -> Result<(), BleError> {
        let c = self.characteristic(characteristic)?;
        self.peripheral.subscribe(&c).await?;
        info!("Notifications enabled on {}", characteristic);
        Ok(())
    }

    async fn unsubscribe(&self, characteristic: Uuid) -> Result<(), BleError> {
        let c = self.characteristic(characteristic)?;
        self.peripheral.unsubscribe(&c).await?;
        debug!("Notifications disabled on {}", characteristic);
        Ok(())
    }

    async fn notifications(&self) -> Result<BoxStream<'static, ValueNotification>, BleError> {
        Ok(self.peripheral.notifications().await?)
    }
}

#[async_trait]
impl GattClient for BleConnection {
    fn has_services(&self) -> bool {
        !self.peripheral.services().is_empty()
    }

    async fn write(&self, characteristic: Uuid, value: &[u8]) -> Result<(), BleError> {
        let c = self.characteristic(characteristic)?;
        self.peripheral
            .write(&c, value, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>, BleError> {
        let c = self.characteristic(characteristic)?;
        Ok(self.peripheral.read(&c).await?)
    }
}
