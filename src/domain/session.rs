//! Plot session state behind the GUI subscriber.
//!
//! Owns the sample history, the start/stop toggle, the display pause index
//! and the optional auto-stop. Toolkit callbacks go through
//! [`SessionControls`] so the widgets stay a thin layer.

use crate::domain::history::SampleHistory;
use crate::domain::models::{
    AppEvent, BusCommand, BusMessage, ConnectionStatus, Received, StatusMessage, Topic,
};
use crate::error::ExportError;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const DEFAULT_WINDOW: usize = 20;

/// Actions a UI toolkit invokes on the session.
pub trait SessionControls {
    fn on_start(&mut self);
    fn on_stop(&mut self);
    fn on_export(&mut self, path: &Path) -> Result<usize, ExportError>;
    fn on_toggle_series(&mut self, topic: Topic, enabled: bool);
}

/// Where topic subscription changes are forwarded.
pub trait TopicSubscriptions {
    fn set_subscribed(&mut self, topic: Topic, subscribed: bool);
}

impl TopicSubscriptions for mpsc::UnboundedSender<BusCommand> {
    fn set_subscribed(&mut self, topic: Topic, subscribed: bool) {
        let cmd = if subscribed {
            BusCommand::Subscribe(topic)
        } else {
            BusCommand::Unsubscribe(topic)
        };
        if self.send(cmd).is_err() {
            warn!("Bus worker is gone, cannot change subscription for {}", topic);
        }
    }
}

/// Result of feeding one timer tick into the session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub recorded: usize,
    pub skipped: usize,
    pub end_of_stream: bool,
    pub auto_stopped: bool,
}

pub struct PlotSession<S: TopicSubscriptions> {
    history: SampleHistory,
    subscriptions: S,
    enabled: HashMap<Topic, bool>,
    running: bool,
    origin: Option<Instant>,
    run_started: Option<Instant>,
    pause_index: HashMap<Topic, usize>,
    window: usize,
    auto_stop: Option<Duration>,
}

impl<S: TopicSubscriptions> PlotSession<S> {
    pub fn new(subscriptions: S, window: usize) -> Self {
        Self {
            history: SampleHistory::new(),
            subscriptions,
            enabled: Topic::ALL.iter().map(|t| (*t, true)).collect(),
            running: false,
            origin: None,
            run_started: None,
            pause_index: HashMap::new(),
            window: window.max(1),
            auto_stop: None,
        }
    }

    pub fn history(&self) -> &SampleHistory {
        &self.history
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_enabled(&self, topic: Topic) -> bool {
        self.enabled.get(&topic).copied().unwrap_or(false)
    }

    /// `None` disables auto-stop.
    pub fn set_auto_stop(&mut self, limit: Option<Duration>) {
        self.auto_stop = limit;
    }

    pub fn start_at(&mut self, now: Instant) {
        if self.running {
            return;
        }
        self.origin.get_or_insert(now);
        self.run_started = Some(now);
        for topic in Topic::ALL {
            self.pause_index
                .insert(topic, self.history.series(topic).len());
        }
        self.running = true;
        info!("Plot session started");
    }

    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.run_started = None;
        info!("Plot session stopped");
    }

    /// Time since the current run was started.
    pub fn run_elapsed(&self, now: Instant) -> Option<Duration> {
        self.run_started.map(|start| now.saturating_duration_since(start))
    }

    /// Feeds the messages received since the previous timer tick. Each
    /// sample is stamped with its own receive time relative to the first
    /// start. Does nothing while stopped.
    pub fn tick<I>(&mut self, now: Instant, messages: I) -> TickOutcome
    where
        I: IntoIterator<Item = Received>,
    {
        let mut outcome = TickOutcome::default();
        if !self.running {
            return outcome;
        }
        let origin = self.origin.unwrap_or(now);

        for Received { message, at } in messages {
            if message == BusMessage::EndOfStream {
                info!("End of stream received");
                outcome.end_of_stream = true;
                self.stop();
                break;
            }

            match (message.topic(), &message) {
                (Some(topic), BusMessage::Sample { array, .. }) if self.is_enabled(topic) => {
                    match array.as_vector3() {
                        Some(values) => {
                            let elapsed = at.saturating_duration_since(origin).as_secs_f64();
                            self.history.record(topic, values, elapsed);
                            outcome.recorded += 1;
                        }
                        None => {
                            debug!("Skipping {} array with shape {:?}", topic, array.shape);
                            outcome.skipped += 1;
                        }
                    }
                }
                _ => outcome.skipped += 1,
            }
        }

        if let (Some(limit), Some(run)) = (self.auto_stop, self.run_elapsed(now)) {
            if self.running && run > limit {
                info!("Auto-stop after {:.1}s", run.as_secs_f64());
                outcome.auto_stopped = true;
                self.stop();
            }
        }

        outcome
    }

    /// Index range of `topic` samples shown in the plot: at most `window`
    /// of the newest samples, never anything before the pause index.
    pub fn visible_range(&self, topic: Topic) -> std::ops::Range<usize> {
        let len = self.history.series(topic).len();
        let pause = self.pause_index.get(&topic).copied().unwrap_or(0).min(len);
        let start = len.saturating_sub(self.window).max(pause);
        start..len
    }

    pub fn visible_points(&self, topic: Topic) -> [Vec<[f64; 2]>; 3] {
        self.history
            .series(topic)
            .points(self.visible_range(topic))
    }
}

impl<S: TopicSubscriptions> SessionControls for PlotSession<S> {
    fn on_start(&mut self) {
        self.start_at(Instant::now());
    }

    fn on_stop(&mut self) {
        self.stop();
    }

    fn on_export(&mut self, path: &Path) -> Result<usize, ExportError> {
        self.history.export_csv(path)
    }

    fn on_toggle_series(&mut self, topic: Topic, enabled: bool) {
        if self.is_enabled(topic) == enabled {
            return;
        }
        self.enabled.insert(topic, enabled);
        self.subscriptions.set_subscribed(topic, enabled);
    }
}

/// What one drain of the worker queue changed.
#[derive(Debug, Default)]
pub struct PollReport {
    pub tick: Option<TickOutcome>,
    pub end_of_stream: bool,
    pub discarded: usize,
    pub connection: Option<ConnectionStatus>,
    pub log: Option<StatusMessage>,
}

/// Timer gate between the worker's event queue and a [`PlotSession`].
#[derive(Debug, Default)]
pub struct BusPoller {
    last_tick: Option<Instant>,
}

impl BusPoller {
    /// Make the next poll tick immediately.
    pub fn reset(&mut self) {
        self.last_tick = None;
    }

    pub fn is_due(&self, now: Instant, interval: Duration) -> bool {
        self.last_tick
            .map_or(true, |last| now.saturating_duration_since(last) >= interval)
    }

    /// While running, drains `events` into the session once `interval` has
    /// passed since the previous tick and returns `None` otherwise, leaving
    /// `events` untouched. While stopped, drains on every call so the queue
    /// cannot grow; samples are discarded but the sentinel is still reported.
    pub fn poll<S, I>(
        &mut self,
        session: &mut PlotSession<S>,
        now: Instant,
        interval: Duration,
        events: I,
    ) -> Option<PollReport>
    where
        S: TopicSubscriptions,
        I: IntoIterator<Item = AppEvent>,
    {
        let running = session.is_running();
        if running && !self.is_due(now, interval) {
            return None;
        }

        let mut report = PollReport::default();
        let mut batch = Vec::new();
        for event in events {
            match event {
                AppEvent::Bus(received) if running => batch.push(received),
                AppEvent::Bus(Received {
                    message: BusMessage::EndOfStream,
                    ..
                }) => report.end_of_stream = true,
                AppEvent::Bus(_) => report.discarded += 1,
                AppEvent::ConnectionStatus(status) => report.connection = Some(status),
                AppEvent::LogMessage(msg) => report.log = Some(msg),
            }
        }

        if running {
            self.last_tick = Some(now);
            let outcome = session.tick(now, batch);
            if outcome.recorded + outcome.skipped > 0 {
                debug!(
                    "Tick recorded {} samples, skipped {}",
                    outcome.recorded, outcome.skipped
                );
            }
            report.end_of_stream |= outcome.end_of_stream;
            report.tick = Some(outcome);
        } else if report.discarded > 0 {
            debug!("Discarded {} samples while stopped", report.discarded);
        }

        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{DType, SensorArray};

    #[derive(Default)]
    struct Recorder(Vec<(Topic, bool)>);

    impl TopicSubscriptions for Recorder {
        fn set_subscribed(&mut self, topic: Topic, subscribed: bool) {
            self.0.push((topic, subscribed));
        }
    }

    fn sample(topic: &str, x: f64, at: Instant) -> Received {
        Received::new(
            BusMessage::Sample {
                topic: Some(topic.to_string()),
                array: SensorArray {
                    shape: vec![3],
                    dtype: DType::Float32,
                    values: vec![x, 0.0, 0.0],
                },
            },
            at,
        )
    }

    fn end_of_stream(at: Instant) -> Received {
        Received::new(BusMessage::EndOfStream, at)
    }

    fn accel_stamps<S: TopicSubscriptions>(session: &PlotSession<S>) -> Vec<f64> {
        let accel = session.history().accel();
        accel.points(0..accel.len())[0].iter().map(|p| p[0]).collect()
    }

    #[test]
    fn stopped_session_ignores_frames() {
        let mut session = PlotSession::new(Recorder::default(), DEFAULT_WINDOW);
        let t0 = Instant::now();
        let outcome = session.tick(t0, vec![sample("accel", 1.0, t0)]);
        assert_eq!(outcome, TickOutcome::default());
        assert!(session.history().accel().is_empty());
    }

    #[test]
    fn window_shows_newest_samples() {
        let mut session = PlotSession::new(Recorder::default(), 5);
        let t0 = Instant::now();
        session.start_at(t0);
        let frames: Vec<_> = (0..8).map(|i| sample("accel", i as f64, t0)).collect();
        session.tick(t0 + Duration::from_millis(100), frames);

        assert_eq!(session.visible_range(Topic::Accel), 3..8);
        let [x, _, _] = session.visible_points(Topic::Accel);
        assert_eq!(x.iter().map(|p| p[1]).collect::<Vec<_>>(), vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn samples_in_one_tick_keep_their_receive_times() {
        let mut session = PlotSession::new(Recorder::default(), DEFAULT_WINDOW);
        let t0 = Instant::now();
        session.start_at(t0);
        let frames: Vec<_> = (1..=5)
            .map(|i| sample("accel", i as f64, t0 + Duration::from_millis(20 * i)))
            .collect();
        session.tick(t0 + Duration::from_millis(100), frames);

        let stamps = accel_stamps(&session);
        assert_eq!(stamps.len(), 5);
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        assert!((stamps[0] - 0.02).abs() < 1e-9);
        assert!((stamps[4] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn restart_hides_previously_plotted_samples() {
        let mut session = PlotSession::new(Recorder::default(), DEFAULT_WINDOW);
        let t0 = Instant::now();
        session.start_at(t0);
        session.tick(t0, vec![sample("accel", 1.0, t0), sample("accel", 2.0, t0)]);
        session.on_stop();

        session.start_at(t0 + Duration::from_secs(1));
        assert!(session.visible_range(Topic::Accel).is_empty());

        let t2 = t0 + Duration::from_secs(2);
        session.tick(t2, vec![sample("accel", 3.0, t2)]);
        assert_eq!(session.visible_range(Topic::Accel), 2..3);
        assert_eq!(session.history().accel().len(), 3);
    }

    #[test]
    fn end_of_stream_stops_and_drops_the_rest() {
        let mut session = PlotSession::new(Recorder::default(), DEFAULT_WINDOW);
        let t0 = Instant::now();
        session.start_at(t0);
        let outcome = session.tick(
            t0,
            vec![sample("gyro", 1.0, t0), end_of_stream(t0), sample("gyro", 2.0, t0)],
        );
        assert!(outcome.end_of_stream);
        assert_eq!(outcome.recorded, 1);
        assert!(!session.is_running());
        assert_eq!(session.history().gyro().len(), 1);
    }

    #[test]
    fn auto_stop_after_threshold() {
        let mut session = PlotSession::new(Recorder::default(), DEFAULT_WINDOW);
        session.set_auto_stop(Some(Duration::from_secs(2)));
        let t0 = Instant::now();
        session.start_at(t0);

        let t1 = t0 + Duration::from_secs(1);
        let early = session.tick(t1, vec![sample("accel", 1.0, t1)]);
        assert!(!early.auto_stopped);
        assert!(session.is_running());

        let t3 = t0 + Duration::from_secs(3);
        let late = session.tick(t3, vec![sample("accel", 2.0, t3)]);
        assert!(late.auto_stopped);
        assert!(!session.is_running());
        assert_eq!(session.history().accel().len(), 2);
    }

    #[test]
    fn toggling_series_updates_subscription_and_filters_frames() {
        let mut session = PlotSession::new(Recorder::default(), DEFAULT_WINDOW);
        session.on_toggle_series(Topic::Gyro, false);
        session.on_toggle_series(Topic::Gyro, false);
        assert_eq!(session.subscriptions.0, vec![(Topic::Gyro, false)]);

        let t0 = Instant::now();
        session.start_at(t0);
        let outcome = session.tick(t0, vec![sample("gyro", 1.0, t0), sample("accel", 1.0, t0)]);
        assert_eq!(outcome.recorded, 1);
        assert_eq!(outcome.skipped, 1);
        assert!(session.history().gyro().is_empty());

        session.on_toggle_series(Topic::Gyro, true);
        assert_eq!(session.subscriptions.0.last(), Some(&(Topic::Gyro, true)));
    }

    #[test]
    fn timestamps_are_relative_to_first_start() {
        let mut session = PlotSession::new(Recorder::default(), DEFAULT_WINDOW);
        let t0 = Instant::now();
        session.start_at(t0);
        let t_half = t0 + Duration::from_millis(500);
        session.tick(t_half, vec![sample("accel", 1.0, t_half)]);
        session.stop();
        session.start_at(t0 + Duration::from_secs(10));
        let t11 = t0 + Duration::from_secs(11);
        session.tick(t11, vec![sample("accel", 1.0, t11)]);

        assert_eq!(accel_stamps(&session), vec![0.5, 11.0]);
    }

    #[test]
    fn poller_discards_samples_while_stopped() {
        let mut session = PlotSession::new(Recorder::default(), DEFAULT_WINDOW);
        let mut poller = BusPoller::default();
        let t0 = Instant::now();
        let events = vec![
            AppEvent::Bus(sample("accel", 1.0, t0)),
            AppEvent::ConnectionStatus(ConnectionStatus::Connected),
            AppEvent::Bus(sample("gyro", 1.0, t0)),
        ];

        let report = poller
            .poll(&mut session, t0, Duration::from_millis(100), events)
            .unwrap();
        assert_eq!(report.discarded, 2);
        assert!(report.tick.is_none());
        assert_eq!(report.connection, Some(ConnectionStatus::Connected));
        assert!(session.history().accel().is_empty());

        // Once started, only new samples are recorded.
        session.start_at(t0);
        let t1 = t0 + Duration::from_millis(10);
        let report = poller
            .poll(
                &mut session,
                t1,
                Duration::from_millis(100),
                vec![AppEvent::Bus(sample("accel", 2.0, t1))],
            )
            .unwrap();
        assert_eq!(report.tick.map(|t| t.recorded), Some(1));
        assert_eq!(session.history().accel().len(), 1);
    }

    #[test]
    fn poller_reports_sentinel_while_stopped() {
        let mut session = PlotSession::new(Recorder::default(), DEFAULT_WINDOW);
        let mut poller = BusPoller::default();
        let t0 = Instant::now();

        let report = poller
            .poll(
                &mut session,
                t0,
                Duration::from_millis(100),
                vec![AppEvent::Bus(end_of_stream(t0))],
            )
            .unwrap();
        assert!(report.end_of_stream);
        assert_eq!(report.discarded, 0);
        assert!(!session.is_running());
    }

    #[test]
    fn poller_waits_for_the_interval_while_running() {
        let mut session = PlotSession::new(Recorder::default(), DEFAULT_WINDOW);
        let mut poller = BusPoller::default();
        let interval = Duration::from_millis(100);
        let t0 = Instant::now();
        session.start_at(t0);

        let first = poller.poll(&mut session, t0, interval, vec![AppEvent::Bus(sample("accel", 1.0, t0))]);
        assert_eq!(first.and_then(|r| r.tick).map(|t| t.recorded), Some(1));

        // Too early: nothing is drained from the queue.
        let t_early = t0 + Duration::from_millis(50);
        let mut queue = vec![AppEvent::Bus(sample("accel", 2.0, t_early))].into_iter();
        assert!(poller.poll(&mut session, t_early, interval, &mut queue).is_none());
        assert_eq!(queue.len(), 1);
        assert_eq!(session.history().accel().len(), 1);

        let t_due = t0 + Duration::from_millis(100);
        let report = poller.poll(&mut session, t_due, interval, &mut queue).unwrap();
        assert_eq!(report.tick.map(|t| t.recorded), Some(1));
        assert_eq!(queue.len(), 0);

        poller.reset();
        assert!(poller.is_due(t_due, interval));
    }
}
