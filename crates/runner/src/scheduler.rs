//! Periodic Scheduler - Bar and Timer drivers
//!
//! Each Bar/Timer registration gets its own [`ScheduleDriver`]: an
//! independent loop that sleeps for its period, then hands its bound
//! callback to the [`AsyncTaskRunner`]. Callback failures are caught there,
//! so a faulty handler never ends the loop.
//!
//! ```text
//!   STOPPED ──run()/start()──► RUNNING ──stop()──► STOPPED
//!                                 │  ▲
//!                        sleep ───┘  └─── fire bound callback
//! ```
//!
//! Aligned bar drivers compute each fire time from the clock so firings
//! land on wall-clock boundaries (top of the hour, Monday 00:00 UTC, ...)
//! whatever the process start time.

use crate::task_runner::AsyncTaskRunner;
use chrono::{DateTime, Utc};
use expert_clock::SystemClock;
use expert_core::{BarClose, EventKind, EventPayload, Timeframe, TimerFire, Timestamp};
use expert_ports::{Clock, ScheduleError, ScheduleResult, StopSignal};
use expert_strategy::{CallbackId, RegisteredCallback, ScheduleSpec};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Driver for '{0}' is already running")]
    AlreadyRunning(String),
}

/// When a driver fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Every `Duration`, measured from the previous fire
    Interval(Duration),
    /// On every boundary of the timeframe
    Aligned(Timeframe),
}

impl Schedule {
    /// Fixed interval in seconds; must be positive and finite
    pub fn interval_secs(secs: f64) -> ScheduleResult<Self> {
        if !secs.is_finite() {
            return Err(ScheduleError::NonFinitePeriod(secs));
        }
        if secs <= 0.0 {
            return Err(ScheduleError::NonPositivePeriod(secs));
        }
        let period =
            Duration::try_from_secs_f64(secs).map_err(|_| ScheduleError::NonFinitePeriod(secs))?;
        if period.is_zero() {
            return Err(ScheduleError::NonPositivePeriod(secs));
        }
        Ok(Schedule::Interval(period))
    }

    /// Bar schedule for a timeframe name such as `"1h"`
    pub fn bar(timeframe: &str, aligned: bool) -> ScheduleResult<Self> {
        let timeframe = Timeframe::parse(timeframe)
            .ok_or_else(|| ScheduleError::UnknownTimeframe(timeframe.to_string()))?;
        Ok(if aligned {
            Schedule::Aligned(timeframe)
        } else {
            Schedule::Interval(timeframe.duration())
        })
    }

    /// Nominal length of one period
    pub fn period(&self) -> Duration {
        match self {
            Schedule::Interval(period) => *period,
            Schedule::Aligned(timeframe) => timeframe.duration(),
        }
    }

    /// Next fire time after `now`
    pub fn next_fire(&self, now: Timestamp) -> Timestamp {
        match self {
            Schedule::Aligned(timeframe) => timeframe.next_aligned(now),
            Schedule::Interval(period) => chrono::Duration::from_std(*period)
                .ok()
                .and_then(|period| now.checked_add_signed(period))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Stopped,
    Running,
}

/// Drives one Bar or Timer callback
pub struct ScheduleDriver {
    kind: EventKind,
    callback: RegisteredCallback,
    schedule: Schedule,
    clock: Arc<dyn Clock>,
    running: AtomicBool,
    stop_tx: watch::Sender<bool>,
    elapsed_nanos: AtomicU64,
    fires: AtomicU64,
    last_fire: Mutex<Option<Timestamp>>,
}

impl ScheduleDriver {
    /// Create a driver over an already validated schedule
    pub fn new(kind: EventKind, callback: RegisteredCallback, schedule: Schedule) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            kind,
            callback,
            schedule,
            clock: Arc::new(SystemClock::new()),
            running: AtomicBool::new(false),
            stop_tx,
            elapsed_nanos: AtomicU64::new(0),
            fires: AtomicU64::new(0),
            last_fire: Mutex::new(None),
        }
    }

    /// Build the driver for a registered Bar/Timer callback
    pub fn from_callback(
        kind: EventKind,
        callback: RegisteredCallback,
        align_bars: bool,
    ) -> ScheduleResult<Self> {
        let schedule = match &callback.schedule {
            Some(ScheduleSpec::Bar(timeframe)) => Schedule::bar(timeframe, align_bars)?,
            Some(ScheduleSpec::Timer(secs)) => Schedule::interval_secs(*secs)?,
            None => return Err(ScheduleError::MissingSchedule(callback.id.to_string())),
        };
        Ok(Self::new(kind, callback, schedule))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn callback_id(&self) -> &CallbackId {
        &self.callback.id
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn state(&self) -> DriverState {
        if self.running.load(Ordering::Acquire) {
            DriverState::Running
        } else {
            DriverState::Stopped
        }
    }

    /// Total time spent waiting for fires
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::Relaxed))
    }

    /// Number of times the bound callback was fired
    pub fn fires(&self) -> u64 {
        self.fires.load(Ordering::Relaxed)
    }

    /// Next fire time as seen from `now`
    ///
    /// Aligned schedules never return a boundary at or before the last
    /// fire, so a clock lagging behind the sleep cannot fire a bar twice.
    pub fn next_fire_after(&self, now: Timestamp) -> Timestamp {
        match self.schedule {
            Schedule::Interval(_) => self.schedule.next_fire(now),
            Schedule::Aligned(_) => {
                let last = *self.last_fire.lock().unwrap_or_else(PoisonError::into_inner);
                let base = last.map_or(now, |last| last.max(now));
                self.schedule.next_fire(base)
            }
        }
    }

    /// Spawn the loop on the current tokio runtime
    pub fn start(
        self: &Arc<Self>,
        runner: AsyncTaskRunner,
        stop: StopSignal,
    ) -> Result<JoinHandle<()>, DriverError> {
        self.begin()?;
        let driver = Arc::clone(self);
        Ok(tokio::spawn(async move { driver.drive(&runner, stop).await }))
    }

    /// Run the loop on the current task until stopped
    pub async fn run(&self, runner: &AsyncTaskRunner, stop: StopSignal) -> Result<(), DriverError> {
        self.begin()?;
        self.drive(runner, stop).await;
        Ok(())
    }

    /// Ask the loop to exit; a no-op when already stopped.
    ///
    /// The current sleep is cut short, an in-flight callback is not.
    pub fn stop(&self) {
        if self.state() == DriverState::Stopped {
            log::trace!("[{}:{}] Stop on stopped driver ignored", self.kind, self.callback.id);
            return;
        }
        self.stop_tx.send_replace(true);
    }

    fn begin(&self) -> Result<(), DriverError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DriverError::AlreadyRunning(self.callback.id.to_string()))?;
        self.stop_tx.send_replace(false);
        Ok(())
    }

    async fn drive(&self, runner: &AsyncTaskRunner, mut stop: StopSignal) {
        let mut own_stop = StopSignal::new(self.stop_tx.subscribe());
        log::debug!(
            "[{}:{}] Driver started ({:?})",
            self.kind,
            self.callback.id,
            self.schedule
        );

        while !own_stop.is_stopped() && !stop.is_stopped() {
            let now = self.clock.now();
            let next = self.next_fire_after(now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                biased;
                _ = own_stop.stopped() => break,
                _ = stop.stopped() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            *self.last_fire.lock().unwrap_or_else(PoisonError::into_inner) = Some(next);
            let total = self.elapsed_nanos.fetch_add(duration_nanos(wait), Ordering::Relaxed);
            let elapsed = Duration::from_nanos(total).saturating_add(wait);
            self.fires.fetch_add(1, Ordering::Relaxed);

            let payload = self.payload(next, elapsed);
            runner.run_callback(self.kind, &self.callback, payload).await;
        }

        self.running.store(false, Ordering::Release);
        log::debug!(
            "[{}:{}] Driver stopped after {} fires, elapsed {:?}",
            self.kind,
            self.callback.id,
            self.fires(),
            self.elapsed()
        );
    }

    fn payload(&self, scheduled: Timestamp, elapsed: Duration) -> EventPayload {
        match self.schedule {
            Schedule::Aligned(timeframe) => EventPayload::Bar(BarClose {
                timeframe,
                closed_at: scheduled,
            }),
            Schedule::Interval(interval) => match self.bar_timeframe() {
                Some(timeframe) => EventPayload::Bar(BarClose {
                    timeframe,
                    closed_at: scheduled,
                }),
                None => EventPayload::Timer(TimerFire {
                    interval,
                    fired_at: self.clock.now(),
                    elapsed,
                }),
            },
        }
    }

    fn bar_timeframe(&self) -> Option<Timeframe> {
        match (&self.callback.schedule, self.kind) {
            (Some(ScheduleSpec::Bar(name)), EventKind::Bar) => Timeframe::parse(name),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ScheduleDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleDriver")
            .field("kind", &self.kind)
            .field("callback", &self.callback.id)
            .field("schedule", &self.schedule)
            .field("state", &self.state())
            .field("fires", &self.fires())
            .finish()
    }
}

fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use expert_clock::ManualClock;
    use expert_strategy::{EventRegistry, Handler};

    fn noop_timer(secs: f64) -> RegisteredCallback {
        RegisteredCallback::new("timer", Handler::async_fn(|_| async { Ok(()) }))
            .with_schedule(ScheduleSpec::Timer(secs))
    }

    #[test]
    fn test_invalid_periods_rejected() {
        for secs in [0.0, -5.0, f64::NAN, f64::INFINITY, 1e-12] {
            let result = ScheduleDriver::from_callback(EventKind::Timer, noop_timer(secs), true);
            assert!(result.is_err(), "period {secs} should be rejected");
        }
        assert!(matches!(
            Schedule::interval_secs(-5.0),
            Err(ScheduleError::NonPositivePeriod(_))
        ));
        assert!(matches!(
            Schedule::interval_secs(f64::NAN),
            Err(ScheduleError::NonFinitePeriod(_))
        ));
    }

    #[test]
    fn test_unknown_timeframe_and_missing_schedule() {
        let bar = RegisteredCallback::new("bar", Handler::async_fn(|_| async { Ok(()) }));
        assert!(matches!(
            ScheduleDriver::from_callback(EventKind::Bar, bar.clone(), true),
            Err(ScheduleError::MissingSchedule(_))
        ));

        let bar = bar.with_schedule(ScheduleSpec::Bar("7h".into()));
        assert!(matches!(
            ScheduleDriver::from_callback(EventKind::Bar, bar, true),
            Err(ScheduleError::UnknownTimeframe(_))
        ));
    }

    #[test]
    fn test_aligned_hour_at_top_of_hour_is_one_hour_later() {
        let top = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let schedule = Schedule::bar("1h", true).unwrap();
        assert_eq!(schedule.next_fire(top), top + chrono::Duration::hours(1));
    }

    #[test]
    fn test_unaligned_bar_uses_plain_period() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, 17, 3).unwrap();
        let schedule = Schedule::bar("15m", false).unwrap();
        assert_eq!(schedule, Schedule::Interval(Duration::from_secs(900)));
        assert_eq!(schedule.next_fire(now), now + chrono::Duration::minutes(15));
    }

    #[test]
    fn test_stop_on_stopped_driver_is_noop() {
        let driver = ScheduleDriver::from_callback(EventKind::Timer, noop_timer(1.0), true).unwrap();
        driver.stop();
        driver.stop();
        assert_eq!(driver.state(), DriverState::Stopped);
        assert_eq!(driver.fires(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_start_is_rejected() {
        let driver = Arc::new(
            ScheduleDriver::from_callback(EventKind::Timer, noop_timer(60.0), true).unwrap(),
        );
        let runner = AsyncTaskRunner::new(Arc::new(EventRegistry::new()));
        let (_tx, stop) = StopSignal::channel();

        let handle = driver.start(runner.clone(), stop.clone()).unwrap();
        assert_eq!(driver.state(), DriverState::Running);
        assert!(matches!(
            driver.start(runner, stop),
            Err(DriverError::AlreadyRunning(_))
        ));

        driver.stop();
        handle.await.unwrap();
        assert_eq!(driver.state(), DriverState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aligned_bar_fires_on_each_boundary() {
        let start = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let closes = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&closes);
        let ticking = Arc::clone(&clock);
        let callback = RegisteredCallback::new(
            "hourly",
            Handler::async_fn(move |payload| {
                let seen = Arc::clone(&seen);
                let clock = Arc::clone(&ticking);
                async move {
                    if let EventPayload::Bar(bar) = payload {
                        clock.set_time(bar.closed_at);
                        seen.lock().unwrap().push(bar.closed_at);
                    }
                    Ok(())
                }
            }),
        )
        .with_schedule(ScheduleSpec::Bar("1h".into()));

        let driver = Arc::new(
            ScheduleDriver::from_callback(EventKind::Bar, callback, true)
                .unwrap()
                .with_clock(clock),
        );
        let runner = AsyncTaskRunner::new(Arc::new(EventRegistry::new()));
        let (_tx, stop) = StopSignal::channel();
        let handle = driver.start(runner, stop).unwrap();

        tokio::time::sleep(Duration::from_secs(3 * 3600 + 60)).await;
        driver.stop();
        handle.await.unwrap();

        let closes = closes.lock().unwrap();
        assert_eq!(
            *closes,
            vec![
                start + chrono::Duration::hours(1),
                start + chrono::Duration::hours(2),
                start + chrono::Duration::hours(3),
            ]
        );
        assert_eq!(driver.elapsed(), Duration::from_secs(3 * 3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_frozen_clock_never_refires_same_boundary() {
        let start = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let driver = ScheduleDriver::new(
            EventKind::Bar,
            RegisteredCallback::new("bar", Handler::async_fn(|_| async { Ok(()) })),
            Schedule::Aligned(Timeframe::H1),
        )
        .with_clock(clock);

        assert_eq!(driver.next_fire_after(start), start + chrono::Duration::hours(1));
        *driver.last_fire.lock().unwrap() = Some(start + chrono::Duration::hours(1));
        assert_eq!(driver.next_fire_after(start), start + chrono::Duration::hours(2));
    }
}
