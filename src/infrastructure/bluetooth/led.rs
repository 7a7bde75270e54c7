//! LED blink loop over the LED control characteristic.

use crate::error::BleError;
use crate::infrastructure::bluetooth::connection::GattClient;
use crate::infrastructure::bluetooth::protocol::{self, LED_OFF, LED_ON};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct LedConfig {
    pub characteristic: Uuid,
    pub iterations: u32,
    /// Sleep after each write/read pair
    pub interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedOutcome {
    Completed { cycles: u32 },
    NoServices,
}

pub struct LedController<'a, C: GattClient> {
    client: &'a C,
    config: LedConfig,
}

impl<'a, C: GattClient> LedController<'a, C> {
    pub fn new(client: &'a C, config: LedConfig) -> Self {
        Self { client, config }
    }

    /// Blink the LED `iterations` times: write on, read back, sleep, write
    /// off, read back, sleep. Read-back values are logged, never checked.
    pub async fn run(&self) -> Result<LedOutcome, BleError> {
        if !self.client.has_services() {
            warn!("No services found on the device.");
            return Ok(LedOutcome::NoServices);
        }

        let uuid = self.config.characteristic;
        for cycle in 1..=self.config.iterations {
            for (label, value) in [("on", LED_ON), ("off", LED_OFF)] {
                self.client.write(uuid, value).await?;
                let status = self.client.read(uuid).await?;
                info!(
                    "{} LED {} -> status {:?} ({:?})",
                    cycle,
                    label,
                    status,
                    protocol::led_state(&status)
                );
                tokio::time::sleep(self.config.interval).await;
            }
        }

        Ok(LedOutcome::Completed {
            cycles: self.config.iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn board_config() -> LedConfig {
        LedConfig {
            characteristic: protocol::LED_CHAR_UUID,
            iterations: 10,
            interval: Duration::from_secs(1),
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Write(Vec<u8>),
        Read,
    }

    struct FakeGatt {
        services: bool,
        read_value: Vec<u8>,
        ops: Mutex<Vec<Op>>,
    }

    impl FakeGatt {
        fn new(services: bool, read_value: &[u8]) -> Self {
            Self {
                services,
                read_value: read_value.to_vec(),
                ops: Mutex::new(Vec::new()),
            }
        }

        fn ops(&self) -> Vec<Op> {
            self.ops.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GattClient for FakeGatt {
        fn has_services(&self) -> bool {
            self.services
        }

        async fn write(&self, _characteristic: Uuid, value: &[u8]) -> Result<(), BleError> {
            self.ops.lock().unwrap().push(Op::Write(value.to_vec()));
            Ok(())
        }

        async fn read(&self, _characteristic: Uuid) -> Result<Vec<u8>, BleError> {
            self.ops.lock().unwrap().push(Op::Read);
            Ok(self.read_value.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn issues_ten_on_off_pairs_regardless_of_reads() {
        // The fake always reports 0xFF, which matches neither written value.
        let gatt = FakeGatt::new(true, &[0xFF]);
        let controller = LedController::new(&gatt, board_config());

        let started = tokio::time::Instant::now();
        let outcome = controller.run().await.unwrap();

        assert_eq!(outcome, LedOutcome::Completed { cycles: 10 });
        let ops = gatt.ops();
        assert_eq!(ops.len(), 40);
        for cycle in ops.chunks(4) {
            assert_eq!(
                cycle,
                &[
                    Op::Write(vec![0x01]),
                    Op::Read,
                    Op::Write(vec![0x00]),
                    Op::Read
                ]
            );
        }
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn no_services_means_no_writes() {
        let gatt = FakeGatt::new(false, &[0x00]);
        let controller = LedController::new(&gatt, board_config());

        assert_eq!(controller.run().await.unwrap(), LedOutcome::NoServices);
        assert!(gatt.ops().is_empty());
    }
}
