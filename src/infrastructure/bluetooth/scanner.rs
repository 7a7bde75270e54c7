//! BLE Scanner Module
//!
//! Timed advertisement scan and exact-name lookup of the lab board.

use crate::domain::models::ScannedDevice;
use crate::error::BleError;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// BLE Scanner bound to the first available adapter
pub struct BleScanner {
    adapter: Adapter,
}

impl BleScanner {
    /// Create a scanner on the first Bluetooth adapter
    pub async fn new() -> Result<Self, BleError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(BleError::NoAdapter)?;

        debug!(adapter_info = ?adapter.adapter_info().await, "BLE adapter ready");
        Ok(Self { adapter })
    }

    /// Scan for `timeout` and return every peripheral seen
    ///
    /// # Arguments
    /// * `timeout` - How long to listen for advertisements
    /// * `services` - Only report peripherals advertising one of these (empty = all)
    pub async fn discover(
        &self,
        timeout: Duration,
        services: &[Uuid],
    ) -> Result<Vec<(Peripheral, ScannedDevice)>, BleError> {
        info!("Scanning for {:.1}s, please wait...", timeout.as_secs_f64());
        self.adapter
            .start_scan(ScanFilter {
                services: services.to_vec(),
            })
            .await?;
        tokio::time::sleep(timeout).await;
        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        let mut found = Vec::new();
        for peripheral in self.adapter.peripherals().await? {
            let props = match peripheral.properties().await {
                Ok(Some(props)) => props,
                Ok(None) => continue,
                Err(e) => {
                    debug!("Skipping peripheral without properties: {}", e);
                    continue;
                }
            };

            let device = ScannedDevice {
                name: props.local_name,
                address: props.address.to_string(),
                id: format!("{:?}", peripheral.id()),
                signal_strength: props.rssi,
            };
            found.push((peripheral, device));
        }

        info!("Scan complete, {} devices seen", found.len());
        Ok(found)
    }

    /// Scan and return the first peripheral whose advertised name equals `name`
    pub async fn find_by_name(
        &self,
        name: &str,
        timeout: Duration,
        services: &[Uuid],
    ) -> Result<Option<(Peripheral, ScannedDevice)>, BleError> {
        let mut found = self.discover(timeout, services).await?;
        match position_by_name(found.iter().map(|(_, d)| d), name) {
            Some(i) => Ok(Some(found.swap_remove(i))),
            None => {
                warn!("Device '{}' not found", name);
                Ok(None)
            }
        }
    }

    /// Scan and return the peripheral with the given address or platform id
    pub async fn find_by_address(
        &self,
        address: &str,
        timeout: Duration,
        services: &[Uuid],
    ) -> Result<Option<(Peripheral, ScannedDevice)>, BleError> {
        let mut found = self.discover(timeout, services).await?;
        match position_by_address(found.iter().map(|(_, d)| d), address) {
            Some(i) => Ok(Some(found.swap_remove(i))),
            None => {
                warn!("Device with address '{}' not found", address);
                Ok(None)
            }
        }
    }
}

/// Index of the first device whose advertised name matches exactly
pub fn position_by_name<'a, I>(devices: I, name: &str) -> Option<usize>
where
    I: IntoIterator<Item = &'a ScannedDevice>,
{
    devices
        .into_iter()
        .position(|d| d.name.as_deref() == Some(name))
}

/// Index of the first device whose BD address (case-insensitive) or platform id matches
pub fn position_by_address<'a, I>(devices: I, address: &str) -> Option<usize>
where
    I: IntoIterator<Item = &'a ScannedDevice>,
{
    devices
        .into_iter()
        .position(|d| d.address.eq_ignore_ascii_case(address) || d.id == address)
}
