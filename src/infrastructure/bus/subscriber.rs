//! Sensor Subscriber
//!
//! Receives bus messages for the console printer and for the GUI worker
//! thread.

use crate::domain::models::{
    AppEvent, BusCommand, BusMessage, ConnectionStatus, MessageSeverity, Received, StatusMessage,
    Topic,
};
use crate::error::BusError;
use crate::infrastructure::bus::codec::{self, SENTINEL_PREFIX};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use zeromq::{Socket, SocketRecv, SubSocket};

/// Incoming side of the bus.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frames(&mut self) -> Result<Vec<Bytes>, BusError>;
}

/// ZeroMQ SUB socket connected to a publisher.
pub struct ZmqSource {
    socket: SubSocket,
}

impl ZmqSource {
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let mut socket = SubSocket::new();
        socket.connect(url).await?;
        info!("Connected to {}", url);
        Ok(Self { socket })
    }

    /// Subscribe to a topic prefix; `""` receives everything.
    pub async fn subscribe(&mut self, prefix: &str) -> Result<(), BusError> {
        self.socket.subscribe(prefix).await?;
        debug!("Subscribed to '{}'", prefix);
        Ok(())
    }

    pub async fn unsubscribe(&mut self, prefix: &str) -> Result<(), BusError> {
        self.socket.unsubscribe(prefix).await?;
        debug!("Unsubscribed from '{}'", prefix);
        Ok(())
    }
}

#[async_trait]
impl FrameSource for ZmqSource {
    async fn next_frames(&mut self) -> Result<Vec<Bytes>, BusError> {
        Ok(self.socket.recv().await?.into_vec())
    }
}

/// Receive and decode one message.
pub async fn recv_message<S: FrameSource + ?Sized>(source: &mut S) -> Result<BusMessage, BusError> {
    let frames = source.next_frames().await?;
    Ok(codec::decode_frames(&frames)?)
}

/// Receive until the end-of-stream sentinel, handing each sample to
/// `on_sample`. Undecodable messages are logged and skipped. Returns the
/// number of samples seen.
pub async fn run_console<S, F>(source: &mut S, mut on_sample: F) -> Result<u64, BusError>
where
    S: FrameSource + ?Sized,
    F: FnMut(&BusMessage),
{
    let mut samples = 0;
    loop {
        match recv_message(source).await {
            Ok(BusMessage::EndOfStream) => {
                info!("End of stream after {} samples", samples);
                return Ok(samples);
            }
            Ok(message) => {
                samples += 1;
                on_sample(&message);
            }
            Err(BusError::Frame(e)) => warn!("Skipping malformed message: {}", e),
            Err(e) => return Err(e),
        }
    }
}

/// Print a sample the way the console subscriber shows it.
pub fn print_sample(message: &BusMessage) {
    if let BusMessage::Sample { topic, array } = message {
        match topic {
            Some(topic) => println!("{:>5} {}", topic, array),
            None => println!("{}", array),
        }
    }
}

/// Handle to the GUI's background receive thread.
pub struct ReceiveWorker {
    pub commands: mpsc::UnboundedSender<BusCommand>,
    pub events: mpsc::UnboundedReceiver<AppEvent>,
}

/// Spawn a thread with its own runtime that owns the SUB socket, applies
/// subscription commands and forwards decoded messages as [`AppEvent`]s.
/// The thread exits when the command sender is dropped.
pub fn spawn_receive_worker(url: String, topics: Vec<Topic>) -> ReceiveWorker {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<BusCommand>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<AppEvent>();

    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                error!("Failed to create tokio runtime for bus worker: {}", e);
                let _ = event_tx.send(AppEvent::ConnectionStatus(ConnectionStatus::Error));
                return;
            }
        };

        rt.block_on(async move {
            let send_log = |message: String, severity: MessageSeverity| {
                let _ = event_tx.send(AppEvent::LogMessage(StatusMessage::new(message, severity)));
            };

            let _ = event_tx.send(AppEvent::ConnectionStatus(ConnectionStatus::Connecting));
            let mut source = match ZmqSource::connect(&url).await {
                Ok(source) => source,
                Err(e) => {
                    error!("Bus connect failed: {}", e);
                    send_log(format!("Bus connect failed: {}", e), MessageSeverity::Error);
                    let _ = event_tx.send(AppEvent::ConnectionStatus(ConnectionStatus::Error));
                    return;
                }
            };

            let mut prefixes: Vec<&str> = topics.iter().map(Topic::as_str).collect();
            prefixes.push(SENTINEL_PREFIX);
            for prefix in prefixes {
                if let Err(e) = source.subscribe(prefix).await {
                    warn!("Subscribe to '{}' failed: {}", prefix, e);
                }
            }
            let _ = event_tx.send(AppEvent::ConnectionStatus(ConnectionStatus::Connected));
            send_log(format!("Listening on {}", url), MessageSeverity::Success);

            loop {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        let result = match cmd {
                            Some(BusCommand::Subscribe(topic)) => source.subscribe(topic.as_str()).await,
                            Some(BusCommand::Unsubscribe(topic)) => source.unsubscribe(topic.as_str()).await,
                            None => break,
                        };
                        if let Err(e) = result {
                            warn!("Subscription change failed: {}", e);
                        }
                    }
                    received = recv_message(&mut source) => match received {
                        Ok(message) => {
                            let received = Received::new(message, Instant::now());
                            if event_tx.send(AppEvent::Bus(received)).is_err() {
                                break;
                            }
                        }
                        Err(BusError::Frame(e)) => warn!("Skipping malformed message: {}", e),
                        Err(e) => {
                            error!("Bus receive failed: {}", e);
                            send_log(format!("Bus receive failed: {}", e), MessageSeverity::Error);
                            let _ = event_tx.send(AppEvent::ConnectionStatus(ConnectionStatus::Error));
                            break;
                        }
                    },
                }
            }
            info!("Bus worker stopped");
        });
    });

    ReceiveWorker {
        commands: cmd_tx,
        events: event_rx,
    }
}
