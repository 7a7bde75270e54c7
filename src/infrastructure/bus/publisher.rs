//! Sensor Publisher
//!
//! Repacks accelerometer and gyroscope notifications into bus frames and
//! publishes them fire-and-forget until cancelled.

use crate::domain::models::SensorFrame;
use crate::error::{BusError, FrameError};
use crate::infrastructure::bluetooth::protocol::{self, SensorCharacteristics};
use crate::infrastructure::bluetooth::NotifyClient;
use crate::infrastructure::bus::codec::{self, FrameLayout};
use async_trait::async_trait;
use btleplug::api::ValueNotification;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zeromq::{PubSocket, Socket, SocketSend, ZmqMessage};

/// Outgoing side of the bus.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_frames(&mut self, frames: Vec<Bytes>) -> Result<(), BusError>;
    fn close(&mut self);
}

/// ZeroMQ PUB socket bound to a local endpoint.
pub struct ZmqSink {
    socket: Option<PubSocket>,
}

impl ZmqSink {
    pub async fn bind(url: &str) -> Result<Self, BusError> {
        let mut socket = PubSocket::new();
        let endpoint = socket.bind(url).await?;
        info!("Publishing on {}", endpoint);
        Ok(Self {
            socket: Some(socket),
        })
    }
}

#[async_trait]
impl FrameSink for ZmqSink {
    async fn send_frames(&mut self, frames: Vec<Bytes>) -> Result<(), BusError> {
        let socket = self.socket.as_mut().ok_or(BusError::Closed)?;
        let mut iter = frames.into_iter();
        let Some(first) = iter.next() else {
            return Ok(());
        };
        let mut message = ZmqMessage::from(first);
        for frame in iter {
            message.push_back(frame);
        }
        socket.send(message).await?;
        Ok(())
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            info!("Publisher socket closed");
        }
    }
}

/// Why the publish loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    NotificationsEnded,
}

pub struct SensorPublisher<S: FrameSink> {
    sink: S,
    characteristics: SensorCharacteristics,
    layout: FrameLayout,
    sent: u64,
    heartbeat: Duration,
}

impl<S: FrameSink> SensorPublisher<S> {
    pub fn new(sink: S, characteristics: SensorCharacteristics, layout: FrameLayout) -> Self {
        Self {
            sink,
            characteristics,
            layout,
            sent: 0,
            heartbeat: Duration::from_secs(1),
        }
    }

    /// Map a raw notification to a frame. Unknown characteristics yield `None`.
    pub fn frame_for(
        &self,
        notification: &ValueNotification,
    ) -> Result<Option<SensorFrame>, FrameError> {
        let Some(topic) = self.characteristics.topic_for(notification.uuid) else {
            return Ok(None);
        };
        let values = protocol::parse_sensor_payload(&notification.value)?;
        Ok(Some(SensorFrame::new(topic, values)))
    }

    /// Publish one notification. Malformed payloads and send failures are
    /// logged and dropped.
    pub async fn publish(&mut self, notification: &ValueNotification) {
        let frame = match self.frame_for(notification) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Ignoring notification from {}", notification.uuid);
                return;
            }
            Err(e) => {
                warn!("Dropping notification from {}: {}", notification.uuid, e);
                return;
            }
        };

        let frames = match codec::encode_frame(&frame, self.layout) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("Failed to encode {} frame: {}", frame.topic, e);
                return;
            }
        };
        match self.sink.send_frames(frames).await {
            Ok(()) => self.sent += 1,
            Err(e) => warn!("Failed to publish {} frame: {}", frame.topic, e),
        }
    }

    /// Forward notifications until `token` is cancelled or the stream ends.
    pub async fn run<N>(&mut self, mut notifications: N, token: CancellationToken) -> StopReason
    where
        N: Stream<Item = ValueNotification> + Unpin,
    {
        let mut heartbeat = tokio::time::interval(self.heartbeat);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => return StopReason::Cancelled,
                _ = heartbeat.tick() => debug!("{} frames published", self.sent),
                next = notifications.next() => match next {
                    Some(notification) => self.publish(&notification).await,
                    None => {
                        warn!("Notification stream ended, device disconnected");
                        return StopReason::NotificationsEnded;
                    }
                },
            }
        }
    }

    /// Send the end-of-stream sentinel and close the socket.
    pub async fn finish(mut self) -> u64 {
        let sent = match codec::encode_end_of_stream() {
            Ok(frames) => self.sink.send_frames(frames).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = sent {
            warn!("Failed to send end-of-stream: {}", e);
        }
        self.sink.close();
        self.sent
    }
}

/// Full publisher session on a connected device: enable both notifications,
/// publish until cancelled, then unsubscribe, send the sentinel and close.
pub async fn run_session<C, S>(
    connection: &C,
    mut publisher: SensorPublisher<S>,
    token: CancellationToken,
) -> anyhow::Result<u64>
where
    C: NotifyClient + ?Sized,
    S: FrameSink,
{
    let characteristics = publisher.characteristics;
    for uuid in characteristics.all() {
        connection.subscribe(uuid).await?;
    }

    let notifications = connection.notifications().await?;
    info!("Streaming sensor data, type 'a' + Enter or press Ctrl-C to stop");
    let reason = publisher.run(notifications, token).await;
    info!("Stopping ({:?})", reason);

    if reason == StopReason::Cancelled {
        for uuid in characteristics.all() {
            if let Err(e) = connection.unsubscribe(uuid).await {
                warn!("Failed to stop notifications on {}: {}", uuid, e);
            }
        }
    }

    let sent = publisher.finish().await;
    info!("{} frames published", sent);
    Ok(sent)
}
