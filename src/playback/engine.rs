use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::core::{AircraftProfile, Frame, FrameEntry, PlaybackError, RegistrationBook, TrackLog};
use crate::output::FrameSink;
use crate::playback::clock::ClockState;
use crate::playback::lifecycle::LifecycleState;
use crate::playback::matcher;
use crate::playback::smoothing::PositionSmoother;
use crate::playback::{PlaybackConfig, PlaybackState};

/// What one tick produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Clock not running; nothing was read or mutated
    Idle,
    /// A frame was committed and handed to the sink (possibly empty)
    Frame { aircraft: usize },
    /// End of log: clock and lifecycle were reset, an empty frame emitted
    Wrapped,
    /// The tick failed; previous clock and lifecycle state are intact
    Failed,
}

/// Everything the tick path and the control surface contend over
///
/// One mutex serializes both: control operations mutate the clock, a tick
/// reads it and commits lifecycle state. `clock` is `None` exactly when
/// playback is stopped. `speed` outlives the clock so stop/start and wrap
/// keep the last multiplier.
struct EngineState {
    clock: Option<ClockState>,
    speed: f64,
    lifecycle: LifecycleState,
    smoother: Option<PositionSmoother>,
    registrations: RegistrationBook,
    consecutive_failures: u32,
}

/// Replays a track log against a virtual clock, emitting one frame per tick
///
/// Cheap to clone; clones share the same state and delivery queue, so one
/// clone can drive `run()` while another serves control calls.
///
/// A single long-lived task owns the sink and drains the queue, so frames
/// reach the sink in emission order; it exits once every engine clone is
/// dropped. `new` must be called from within a tokio runtime.
#[derive(Clone)]
pub struct PlaybackEngine {
    log: Arc<TrackLog>,
    config: PlaybackConfig,
    state: Arc<Mutex<EngineState>>,
    frame_tx: mpsc::Sender<Frame>,
}

impl PlaybackEngine {
    pub fn new(log: TrackLog, config: PlaybackConfig, mut sink: Box<dyn FrameSink>) -> Self {
        let smoother = config.smoothing_factor.map(PositionSmoother::new);
        let (frame_tx, mut frame_rx) = mpsc::channel::<Frame>(config.frame_queue_depth);

        tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                if let Err(e) = sink.deliver(&frame).await {
                    let err = PlaybackError::Sink(e.to_string());
                    warn!("{} ({})", err, sink.name());
                }
            }
        });

        Self {
            log: Arc::new(log),
            config,
            state: Arc::new(Mutex::new(EngineState {
                clock: None,
                speed: 1.0,
                lifecycle: LifecycleState::new(),
                smoother,
                registrations: RegistrationBook::new(),
                consecutive_failures: 0,
            })),
            frame_tx,
        }
    }

    /// Start (or restart) playback from the beginning of the log
    pub async fn start(&self) {
        self.start_at(Instant::now()).await
    }

    /// Start with an explicit wall instant (tests drive this)
    async fn start_at(&self, now: Instant) {
        let mut state = self.state.lock().await;
        let origin = self.origin();

        state.clock = Some(ClockState::start(origin, state.speed, now));
        state.lifecycle.clear();
        if let Some(smoother) = state.smoother.as_mut() {
            smoother.clear();
        }
        state.registrations.clear();
        state.consecutive_failures = 0;

        info!("Started playback at {}x from {}", state.speed, origin);
    }

    /// Stop playback; takes effect at the next tick boundary
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        state.clock = None;
        state.lifecycle.clear();
        if let Some(smoother) = state.smoother.as_mut() {
            smoother.clear();
        }
        info!("Stopped playback");
    }

    /// Freeze the simulated clock, keeping the speed multiplier
    pub async fn pause(&self) {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        if let Some(clock) = state.clock.as_mut() {
            if !clock.is_paused() {
                clock.pause(now);
                info!("Paused playback");
            }
        }
    }

    /// Resume a paused session at its previous speed
    pub async fn resume(&self) {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        if let Some(clock) = state.clock.as_mut() {
            if clock.is_paused() {
                clock.resume(now);
                info!("Resumed playback");
            }
        }
    }

    /// Change the speed multiplier; simulated time stays continuous
    ///
    /// Rejects non-positive factors and factors above the configured
    /// ceiling; nothing changes on rejection.
    pub async fn set_speed(&self, factor: f64) -> Result<(), PlaybackError> {
        self.config.validate_speed(factor)?;

        let now = Instant::now();
        let mut state = self.state.lock().await;
        if let Some(clock) = state.clock.as_mut() {
            clock.set_speed(factor, now);
        }
        state.speed = factor;
        info!("Playback speed changed to {}x", factor);
        Ok(())
    }

    pub async fn speed(&self) -> f64 {
        self.state.lock().await.speed
    }

    pub async fn status(&self) -> PlaybackState {
        match &self.state.lock().await.clock {
            None => PlaybackState::Stopped,
            Some(clock) if clock.is_paused() => PlaybackState::Paused,
            Some(_) => PlaybackState::Playing,
        }
    }

    /// Callsigns currently spawned, ordered
    pub async fn spawned(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .lifecycle
            .spawned()
            .iter()
            .cloned()
            .collect()
    }

    /// Drive ticks at the configured interval until the task is dropped
    ///
    /// Ticks run sequentially on this task, so they never overlap; a slow
    /// tick delays the next frame but never skews the simulated clock.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    /// Execute one tick of the pipeline
    pub async fn tick(&self) -> TickOutcome {
        self.tick_at(Instant::now()).await
    }

    /// One tick evaluated at an explicit wall instant (tests drive this)
    pub async fn tick_at(&self, now: Instant) -> TickOutcome {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let (sim_time, elapsed_ms, speed) = match state.clock.as_ref() {
            None => return TickOutcome::Idle,
            Some(clock) if clock.is_paused() => return TickOutcome::Idle,
            Some(clock) => (
                clock.simulated_at(now),
                clock.elapsed_sim_ms(now),
                clock.speed(),
            ),
        };

        let sim_time = match sim_time {
            Some(t) => t,
            None => {
                return self.register_failure(state, PlaybackError::SimTimeOverflow { elapsed_ms })
            }
        };

        // Steps 3-4 compute into fresh values; nothing is committed until
        // the whole tick has succeeded.
        let outcome = matcher::match_frame(&self.log, sim_time, speed, elapsed_ms, &self.config);
        let (next_lifecycle, delta) = state.lifecycle.advance(outcome.matched.keys().copied());

        if outcome.wrap {
            info!(
                "Log exhausted after {:.1}s simulated; restarting playback",
                elapsed_ms as f64 / 1000.0
            );
            state.clock = Some(ClockState::start(self.origin(), state.speed, now));
            state.lifecycle.clear();
            if let Some(smoother) = state.smoother.as_mut() {
                smoother.clear();
            }
            state.registrations.clear();
            state.consecutive_failures = 0;
            drop(guard);
            self.dispatch(Frame::empty(sim_time));
            return TickOutcome::Wrapped;
        }

        let mut entries = Vec::with_capacity(outcome.matched.len());
        for (callsign, sample) in &outcome.matched {
            let emitted = match state.smoother.as_mut() {
                Some(smoother) => smoother.apply(sample),
                None => (*sample).clone(),
            };
            let registration = state.registrations.registration_for(callsign);
            let profile = AircraftProfile::for_sample(&emitted, registration);
            entries.push(FrameEntry { sample: emitted, profile });
        }
        let frame = Frame { timestamp: sim_time, entries };

        if !delta.spawned.is_empty() {
            info!("Spawned {:?} at sim time {}", delta.spawned, sim_time);
        }
        if !delta.despawned.is_empty() {
            info!("Despawned {:?} at sim time {}", delta.despawned, sim_time);
        }

        state.lifecycle = next_lifecycle;
        if let Some(smoother) = state.smoother.as_mut() {
            smoother.retain(state.lifecycle.spawned());
        }
        state.consecutive_failures = 0;

        let aircraft = frame.len();
        debug!(
            "Tick: {} active at sim {} ({}x, {}ms elapsed)",
            aircraft, sim_time, speed, elapsed_ms
        );

        drop(guard);
        self.dispatch(frame);
        TickOutcome::Frame { aircraft }
    }

    fn origin(&self) -> chrono::DateTime<chrono::Utc> {
        match self.log.origin() {
            Some(origin) => origin,
            None => {
                warn!(
                    "Track log has no usable origin; falling back to {}",
                    self.config.fallback_origin
                );
                self.config.fallback_origin
            }
        }
    }

    /// Count a failed tick; past the threshold, stop playback outright
    fn register_failure(&self, state: &mut EngineState, err: PlaybackError) -> TickOutcome {
        state.consecutive_failures += 1;
        error!(
            "Tick failed ({}/{}): {}",
            state.consecutive_failures, self.config.max_consecutive_failures, err
        );

        if state.consecutive_failures >= self.config.max_consecutive_failures {
            let fatal = PlaybackError::TooManyFailures {
                failures: state.consecutive_failures,
            };
            error!("{}; an explicit start is required to resume", fatal);
            state.clock = None;
            state.lifecycle.clear();
            if let Some(smoother) = state.smoother.as_mut() {
                smoother.clear();
            }
            state.consecutive_failures = 0;
        }

        TickOutcome::Failed
    }

    /// Queue a frame for the delivery task without blocking the pipeline
    ///
    /// Sink latency or failure affects nothing but a warning in the log; a
    /// stalled sink fills the bounded queue, after which overflow frames
    /// are dropped rather than delaying the next tick.
    fn dispatch(&self, frame: Frame) {
        if self.frame_tx.try_send(frame).is_err() {
            warn!("Frame delivery queue full; dropping frame");
        }
    }

    #[cfg(test)]
    async fn clock_state(&self) -> Option<ClockState> {
        self.state.lock().await.clock.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use crate::core::test_support::sample_at;
    use crate::output::{MemorySink, SinkResult};

    /// Sink that always fails, for absorption tests
    struct FailingSink;

    #[async_trait]
    impl FrameSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn deliver(&mut self, _frame: &Frame) -> SinkResult<()> {
            Err("sink is down".into())
        }
    }

    /// Sink whose delivery suspends mid-way, to exercise queued ordering
    struct SlowSink {
        inner: MemorySink,
    }

    #[async_trait]
    impl FrameSink for SlowSink {
        fn name(&self) -> &str {
            "slow"
        }

        async fn deliver(&mut self, frame: &Frame) -> SinkResult<()> {
            tokio::task::yield_now().await;
            self.inner.deliver(frame).await
        }
    }

    /// Let the delivery task run on the current-thread runtime
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn aaa_log() -> TrackLog {
        // AAA at origin+0/100/200ms, latitude stepping 37.00 -> 37.02
        let mut s0 = sample_at("AAA", "2025-05-02T04:08:15.000Z");
        let mut s1 = sample_at("AAA", "2025-05-02T04:08:15.100Z");
        let mut s2 = sample_at("AAA", "2025-05-02T04:08:15.200Z");
        s0.lat = 37.00;
        s1.lat = 37.01;
        s2.lat = 37.02;
        TrackLog::new(vec![s0, s1, s2])
    }

    fn engine_with(log: TrackLog) -> (PlaybackEngine, MemorySink) {
        let sink = MemorySink::new();
        let engine = PlaybackEngine::new(log, PlaybackConfig::default(), Box::new(sink.clone()));
        (engine, sink)
    }

    #[tokio::test]
    async fn test_tick_while_stopped_is_idle() {
        let (engine, sink) = engine_with(aaa_log());
        assert_eq!(engine.tick_at(Instant::now()).await, TickOutcome::Idle);
        settle().await;
        assert_eq!(sink.frame_count(), 0);
        assert_eq!(engine.status().await, PlaybackState::Stopped);
    }

    #[tokio::test]
    async fn test_tick_while_paused_is_idle() {
        let (engine, sink) = engine_with(aaa_log());
        engine.start().await;
        engine.pause().await;
        assert_eq!(engine.status().await, PlaybackState::Paused);
        assert_eq!(engine.tick_at(Instant::now()).await, TickOutcome::Idle);
        settle().await;
        assert_eq!(sink.frame_count(), 0);
    }

    #[tokio::test]
    async fn test_spawn_track_and_despawn_scenario() {
        let (engine, sink) = engine_with(aaa_log());
        let t0 = Instant::now();
        engine.start_at(t0).await;

        // +130ms: nearest sample is t=100ms; AAA newly spawned this tick
        let outcome = engine.tick_at(t0 + StdDuration::from_millis(130)).await;
        assert_eq!(outcome, TickOutcome::Frame { aircraft: 1 });
        assert_eq!(engine.spawned().await, vec!["AAA".to_string()]);

        // +250ms: nearest sample is t=200ms; still spawned, count unchanged
        let outcome = engine.tick_at(t0 + StdDuration::from_millis(250)).await;
        assert_eq!(outcome, TickOutcome::Frame { aircraft: 1 });
        assert_eq!(engine.spawned().await.len(), 1);

        // +400ms: nothing within tolerance; despawned this same tick
        let outcome = engine.tick_at(t0 + StdDuration::from_millis(400)).await;
        assert_eq!(outcome, TickOutcome::Frame { aircraft: 0 });
        assert!(engine.spawned().await.is_empty());

        settle().await;
        let frames = sink.frames();
        assert_eq!(frames.len(), 3);
        assert!((frames[0].entries[0].sample.lat - 37.01).abs() < 1e-9);
        assert!((frames[1].entries[0].sample.lat - 37.02).abs() < 1e-9);
        assert!(frames[2].is_empty());
    }

    #[tokio::test]
    async fn test_exact_tie_matches_the_later_sample() {
        let (engine, sink) = engine_with(aaa_log());
        let t0 = Instant::now();
        engine.start_at(t0).await;

        // +150ms is equidistant from the 100ms and 200ms samples
        let outcome = engine.tick_at(t0 + StdDuration::from_millis(150)).await;
        assert_eq!(outcome, TickOutcome::Frame { aircraft: 1 });

        settle().await;
        assert!((sink.frames()[0].entries[0].sample.lat - 37.02).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_frame_entries_ordered_by_callsign() {
        let log = TrackLog::new(vec![
            sample_at("ZZZ", "2025-05-02T04:08:15.000Z"),
            sample_at("AAA", "2025-05-02T04:08:15.010Z"),
            sample_at("MMM", "2025-05-02T04:08:15.020Z"),
        ]);
        let (engine, sink) = engine_with(log);
        let t0 = Instant::now();
        engine.start_at(t0).await;
        let outcome = engine.tick_at(t0 + StdDuration::from_millis(10)).await;
        assert_eq!(outcome, TickOutcome::Frame { aircraft: 3 });

        settle().await;
        let callsigns: Vec<String> = sink.frames()[0]
            .callsigns()
            .map(str::to_string)
            .collect();
        assert_eq!(callsigns, vec!["AAA", "MMM", "ZZZ"]);
    }

    #[tokio::test]
    async fn test_set_speed_rejection_leaves_state_unchanged() {
        let (engine, _sink) = engine_with(aaa_log());
        engine.start().await;
        let before = engine.clock_state().await;

        assert!(matches!(
            engine.set_speed(0.0).await,
            Err(PlaybackError::InvalidSpeed { .. })
        ));
        assert!(matches!(
            engine.set_speed(-1.0).await,
            Err(PlaybackError::InvalidSpeed { .. })
        ));
        assert!(engine.set_speed(100.0).await.is_err());

        assert_eq!(engine.clock_state().await, before);
        assert_eq!(engine.speed().await, 1.0);
    }

    #[tokio::test]
    async fn test_speed_set_while_stopped_applies_on_start() {
        let (engine, _sink) = engine_with(aaa_log());
        engine.set_speed(2.0).await.unwrap();
        let t0 = Instant::now();
        engine.start_at(t0).await;

        // 100ms real at 2x = 200ms simulated: the t=200ms sample matches
        let outcome = engine.tick_at(t0 + StdDuration::from_millis(100)).await;
        assert_eq!(outcome, TickOutcome::Frame { aircraft: 1 });
        assert_eq!(engine.speed().await, 2.0);
    }

    #[tokio::test]
    async fn test_wrap_resets_clock_and_lifecycle() {
        let (engine, sink) = engine_with(aaa_log());
        let t0 = Instant::now();
        engine.start_at(t0).await;

        engine.tick_at(t0 + StdDuration::from_millis(50)).await;
        assert_eq!(engine.spawned().await.len(), 1);

        // Far past the 2h duration cap with nothing matched: wrap
        let past_cap = StdDuration::from_secs(2 * 60 * 60) + StdDuration::from_secs(1);
        let outcome = engine.tick_at(t0 + past_cap).await;
        assert_eq!(outcome, TickOutcome::Wrapped);
        assert!(engine.spawned().await.is_empty());
        assert_eq!(engine.status().await, PlaybackState::Playing);

        // Clock restarted from the origin: the first sample matches again
        let outcome = engine
            .tick_at(t0 + past_cap + StdDuration::from_millis(20))
            .await;
        assert_eq!(outcome, TickOutcome::Frame { aircraft: 1 });

        settle().await;
        // The wrap tick emitted an empty frame
        assert!(sink.frames().iter().any(|f| f.is_empty()));
    }

    #[tokio::test]
    async fn test_gap_without_exhaustion_does_not_wrap() {
        let (engine, _sink) = engine_with(aaa_log());
        let t0 = Instant::now();
        engine.start_at(t0).await;

        // Mid-log gap: empty frame, but no restart
        let outcome = engine.tick_at(t0 + StdDuration::from_secs(60)).await;
        assert_eq!(outcome, TickOutcome::Frame { aircraft: 0 });
        assert_eq!(engine.status().await, PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_empty_log_plays_empty_frames() {
        let (engine, sink) = engine_with(TrackLog::empty());
        let t0 = Instant::now();
        engine.start_at(t0).await;
        let outcome = engine.tick_at(t0 + StdDuration::from_millis(10)).await;
        assert_eq!(outcome, TickOutcome::Frame { aircraft: 0 });
        settle().await;
        assert_eq!(sink.frame_count(), 1);
    }

    #[tokio::test]
    async fn test_consecutive_failures_stop_playback() {
        // A log whose origin sits at the end of representable time makes
        // every simulated-timestamp derivation overflow
        let mut sample = sample_at("AAA", "2025-05-02T04:08:15Z");
        sample.timestamp = DateTime::<Utc>::MAX_UTC;
        let (engine, _sink) = engine_with(TrackLog::new(vec![sample]));
        let t0 = Instant::now();
        engine.start_at(t0).await;

        for i in 1..=4u64 {
            let outcome = engine.tick_at(t0 + StdDuration::from_millis(100 * i)).await;
            assert_eq!(outcome, TickOutcome::Failed);
            assert_eq!(engine.status().await, PlaybackState::Playing);
        }

        // Fifth consecutive failure crosses the threshold
        let outcome = engine.tick_at(t0 + StdDuration::from_millis(500)).await;
        assert_eq!(outcome, TickOutcome::Failed);
        assert_eq!(engine.status().await, PlaybackState::Stopped);

        // Stopped means subsequent ticks are no-ops until an explicit start
        assert_eq!(
            engine.tick_at(t0 + StdDuration::from_millis(600)).await,
            TickOutcome::Idle
        );
    }

    #[tokio::test]
    async fn test_frames_reach_sink_in_emission_order() {
        let sink = MemorySink::new();
        let engine = PlaybackEngine::new(
            aaa_log(),
            PlaybackConfig::default(),
            Box::new(SlowSink { inner: sink.clone() }),
        );
        let t0 = Instant::now();
        engine.start_at(t0).await;

        // Queue several frames faster than the sink drains them
        for i in 0..5u64 {
            engine.tick_at(t0 + StdDuration::from_millis(10 + 40 * i)).await;
        }
        for _ in 0..64 {
            tokio::task::yield_now().await;
        }

        let frames = sink.frames();
        assert_eq!(frames.len(), 5);
        assert!(frames.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_fail_ticks() {
        let engine = PlaybackEngine::new(
            aaa_log(),
            PlaybackConfig::default(),
            Box::new(FailingSink),
        );
        let t0 = Instant::now();
        engine.start_at(t0).await;

        let outcome = engine.tick_at(t0 + StdDuration::from_millis(50)).await;
        assert_eq!(outcome, TickOutcome::Frame { aircraft: 1 });
        settle().await;

        // The pipeline's own work completed; playback carries on
        let outcome = engine.tick_at(t0 + StdDuration::from_millis(150)).await;
        assert_eq!(outcome, TickOutcome::Frame { aircraft: 1 });
        assert_eq!(engine.status().await, PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_stop_clears_active_set() {
        let (engine, _sink) = engine_with(aaa_log());
        let t0 = Instant::now();
        engine.start_at(t0).await;
        engine.tick_at(t0 + StdDuration::from_millis(50)).await;
        assert_eq!(engine.spawned().await.len(), 1);

        engine.stop().await;
        assert_eq!(engine.status().await, PlaybackState::Stopped);
        assert!(engine.spawned().await.is_empty());
    }

    #[tokio::test]
    async fn test_pause_resume_roundtrip() {
        let (engine, _sink) = engine_with(aaa_log());
        engine.start().await;
        engine.pause().await;
        assert_eq!(engine.status().await, PlaybackState::Paused);
        engine.resume().await;
        assert_eq!(engine.status().await, PlaybackState::Playing);
        assert_eq!(engine.speed().await, 1.0);
    }
}
