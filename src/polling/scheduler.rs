//! Adaptive polling state machine.
//!
//! ```text
//!            start() [in window or live games]
//!  Stopped ───────────────────────────────────▶ Active ◀─┐ tick: refresh if visible
//!     ▲  ▲                                       │  ▲    └─ (auto-stop when all final)
//!     │  │ stop() from any state                 │  │
//!     │  └───────────────────────────────────────┤  │ toggle_pause() [in window or live]
//!     │                                          ▼  │  + immediate refresh
//!     └──────── toggle_pause() [window closed] ─ Paused
//! ```
//!
//! The machine performs no IO. Timers are armed and cancelled through the
//! [`Timers`] trait and fire back in through [`PollingScheduler::on_timer`];
//! wall-clock time comes from a [`Clock`]. A refresh is requested by returning
//! a [`RefreshTicket`]; the caller runs the refresh and reports the outcome via
//! [`PollingScheduler::finish_refresh`]. At most one ticket is outstanding, and
//! tickets issued before a `stop()` are void.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::window::RefreshWindow;
use crate::error::RefreshError;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(60_000);
/// Period of the display ticker that advances `seconds_since_update`.
pub const DISPLAY_TICK: Duration = Duration::from_secs(1);

pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn new(id: u64) -> Self {
        TimerHandle(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Refresh,
    Display,
}

/// Repeating timers. A fired handle is delivered back to
/// [`PollingScheduler::on_timer`]; handles that were cancelled are ignored
/// there even if they still fire.
pub trait Timers: Send {
    fn arm(&mut self, kind: TimerKind, period: Duration) -> TimerHandle;
    fn cancel(&mut self, handle: TimerHandle);
}

/// Returns true when every tracked item is finished.
pub type LivenessCheck = Box<dyn Fn() -> bool + Send + Sync>;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub refresh_interval: Duration,
    pub window: RefreshWindow,
    /// Stop once the liveness check reports everything finished
    pub auto_stop_when_final: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            window: RefreshWindow::default(),
            auto_stop_when_final: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Stopped,
    Active,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
    Start,
    Tick,
    Resume,
    VisibilityRegained,
    Manual,
}

/// Permission to run one refresh. Hand it back to `finish_refresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    generation: u64,
    trigger: RefreshTrigger,
}

impl RefreshTicket {
    pub fn trigger(&self) -> RefreshTrigger {
        self.trigger
    }
}

#[derive(Debug, Clone)]
struct RefreshState {
    is_refreshing: bool,
    is_paused: bool,
    last_updated: Option<DateTime<Utc>>,
    seconds_since_update: u64,
    visible: bool,
}

impl Default for RefreshState {
    fn default() -> Self {
        RefreshState {
            is_refreshing: false,
            is_paused: false,
            last_updated: None,
            seconds_since_update: 0,
            visible: true,
        }
    }
}

/// Read-only view of the scheduler for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerSnapshot {
    pub state: SchedulerState,
    pub is_refreshing: bool,
    pub is_paused: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub seconds_since_update: u64,
    pub is_game_window: bool,
    pub is_visible: bool,
}

pub struct PollingScheduler<T: Timers, C: Clock> {
    config: SchedulerConfig,
    timers: T,
    clock: C,
    liveness: Option<LivenessCheck>,
    state: SchedulerState,
    refresh: RefreshState,
    refresh_timer: Option<TimerHandle>,
    display_timer: Option<TimerHandle>,
    /// Bumped on every stop(); tickets from older generations are void
    generation: u64,
}

impl<T: Timers, C: Clock> PollingScheduler<T, C> {
    pub fn new(config: SchedulerConfig, timers: T, clock: C) -> Self {
        PollingScheduler {
            config,
            timers,
            clock,
            liveness: None,
            state: SchedulerState::Stopped,
            refresh: RefreshState::default(),
            refresh_timer: None,
            display_timer: None,
            generation: 0,
        }
    }

    pub fn with_liveness_check(mut self, check: LivenessCheck) -> Self {
        self.liveness = Some(check);
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Changes whenever outstanding tickets are voided.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_game_window(&self) -> bool {
        self.config.window.contains(self.clock.now())
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            state: self.state,
            is_refreshing: self.refresh.is_refreshing,
            is_paused: self.refresh.is_paused,
            last_updated: self.refresh.last_updated,
            seconds_since_update: self.refresh.seconds_since_update,
            is_game_window: self.is_game_window(),
            is_visible: self.refresh.visible,
        }
    }

    /// Begin polling if inside the refresh window or any tracked game is
    /// unfinished. Otherwise a no-op.
    pub fn start(&mut self) -> Option<RefreshTicket> {
        if self.state != SchedulerState::Stopped {
            debug!("start() ignored, scheduler is {:?}", self.state);
            return None;
        }
        if !self.may_run() {
            info!("Outside refresh window and no live games; polling stays stopped");
            return None;
        }
        if self.refresh.is_paused {
            info!("Polling armed but paused");
            self.state = SchedulerState::Paused;
            return None;
        }
        info!(
            "Polling started (interval={:?}, window={})",
            self.config.refresh_interval,
            self.is_game_window()
        );
        self.state = SchedulerState::Active;
        self.arm_timers();
        self.begin_refresh(RefreshTrigger::Start)
    }

    /// Cancel all timers and void any outstanding ticket. Always succeeds.
    pub fn stop(&mut self) {
        self.cancel_timers();
        if self.refresh.is_refreshing {
            debug!("Abandoning in-flight refresh");
        }
        self.generation += 1;
        self.refresh.is_refreshing = false;
        self.refresh.is_paused = false;
        self.refresh.seconds_since_update = 0;
        if self.state != SchedulerState::Stopped {
            info!("Polling stopped");
        }
        self.state = SchedulerState::Stopped;
    }

    pub fn toggle_pause(&mut self) -> Option<RefreshTicket> {
        match self.state {
            SchedulerState::Active => {
                self.cancel_timers();
                self.refresh.is_paused = true;
                self.state = SchedulerState::Paused;
                info!("Polling paused");
                None
            }
            SchedulerState::Paused => {
                self.refresh.is_paused = false;
                if self.may_run() {
                    info!("Polling resumed");
                    self.state = SchedulerState::Active;
                    self.arm_timers();
                    self.begin_refresh(RefreshTrigger::Resume)
                } else {
                    info!("Refresh window closed while paused; stopping");
                    self.stop();
                    None
                }
            }
            SchedulerState::Stopped => {
                self.refresh.is_paused = !self.refresh.is_paused;
                None
            }
        }
    }

    /// Refresh now regardless of window or pause. Leaves the state alone.
    pub fn manual_refresh(&mut self) -> Option<RefreshTicket> {
        self.begin_refresh(RefreshTrigger::Manual)
    }

    /// Record surface visibility. Regaining visibility while Active triggers
    /// an immediate refresh.
    pub fn set_visible(&mut self, visible: bool) -> Option<RefreshTicket> {
        let regained = visible && !self.refresh.visible;
        self.refresh.visible = visible;
        if regained && self.state == SchedulerState::Active {
            self.begin_refresh(RefreshTrigger::VisibilityRegained)
        } else {
            None
        }
    }

    pub fn on_timer(&mut self, handle: TimerHandle) -> Option<RefreshTicket> {
        if self.display_timer == Some(handle) {
            self.refresh.seconds_since_update += 1;
            return None;
        }
        if self.refresh_timer != Some(handle) {
            debug!("Ignoring stale timer {:?}", handle);
            return None;
        }
        if self.state != SchedulerState::Active || self.refresh.is_paused {
            return None;
        }
        if !self.refresh.visible {
            debug!("Surface hidden; skipping scheduled refresh");
            return None;
        }
        self.begin_refresh(RefreshTrigger::Tick)
    }

    /// Report the outcome of a ticket's refresh. Results for void tickets are
    /// discarded without touching any state.
    pub fn finish_refresh(&mut self, ticket: RefreshTicket, result: Result<(), RefreshError>) {
        if ticket.generation != self.generation || !self.refresh.is_refreshing {
            debug!("Discarding {:?} refresh result issued before stop", ticket.trigger);
            return;
        }
        self.refresh.is_refreshing = false;

        match result {
            Ok(()) => {
                self.refresh.last_updated = Some(self.clock.now());
                self.refresh.seconds_since_update = 0;
                if ticket.trigger != RefreshTrigger::Manual
                    && self.state == SchedulerState::Active
                    && self.config.auto_stop_when_final
                    && self.all_finished() == Some(true)
                {
                    info!("All tracked games are final");
                    self.stop();
                }
            }
            Err(e) => {
                warn!("Refresh ({:?}) failed: {}", ticket.trigger, e);
            }
        }
    }

    fn may_run(&self) -> bool {
        self.is_game_window() || self.all_finished() == Some(false)
    }

    fn all_finished(&self) -> Option<bool> {
        self.liveness.as_ref().map(|check| check())
    }

    fn begin_refresh(&mut self, trigger: RefreshTrigger) -> Option<RefreshTicket> {
        if self.refresh.is_refreshing {
            debug!("Refresh already in flight; {:?} trigger dropped", trigger);
            return None;
        }
        self.refresh.is_refreshing = true;
        Some(RefreshTicket {
            generation: self.generation,
            trigger,
        })
    }

    fn arm_timers(&mut self) {
        if self.refresh_timer.is_none() {
            self.refresh_timer = Some(
                self.timers
                    .arm(TimerKind::Refresh, self.config.refresh_interval),
            );
        }
        if self.display_timer.is_none() {
            self.display_timer = Some(self.timers.arm(TimerKind::Display, DISPLAY_TICK));
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(h) = self.refresh_timer.take() {
            self.timers.cancel(h);
        }
        if let Some(h) = self.display_timer.take() {
            self.timers.cancel(h);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeTimers {
        next: u64,
        armed: Vec<(TimerHandle, TimerKind)>,
        cancelled: Vec<TimerHandle>,
    }

    impl FakeTimers {
        fn live(&self, kind: TimerKind) -> Option<TimerHandle> {
            self.armed
                .iter()
                .rev()
                .find(|(h, k)| *k == kind && !self.cancelled.contains(h))
                .map(|(h, _)| *h)
        }
    }

    impl Timers for Arc<Mutex<FakeTimers>> {
        fn arm(&mut self, kind: TimerKind, _period: Duration) -> TimerHandle {
            let mut t = self.lock().unwrap();
            t.next += 1;
            let h = TimerHandle::new(t.next);
            t.armed.push((h, kind));
            h
        }

        fn cancel(&mut self, handle: TimerHandle) {
            self.lock().unwrap().cancelled.push(handle);
        }
    }

    #[derive(Clone)]
    struct FakeClock(Arc<Mutex<DateTime<Utc>>>);

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    // 2024-09-08 is a Sunday
    fn sunday_afternoon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 8, 14, 0, 0).unwrap()
    }

    fn tuesday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 10, 9, 0, 0).unwrap()
    }

    struct Harness {
        scheduler: PollingScheduler<Arc<Mutex<FakeTimers>>, FakeClock>,
        timers: Arc<Mutex<FakeTimers>>,
        clock: FakeClock,
        all_final: Arc<AtomicBool>,
    }

    impl Harness {
        fn new(now: DateTime<Utc>, all_final: bool) -> Self {
            Self::with_config(now, all_final, SchedulerConfig::default())
        }

        fn with_config(now: DateTime<Utc>, all_final: bool, config: SchedulerConfig) -> Self {
            let timers = Arc::new(Mutex::new(FakeTimers::default()));
            let clock = FakeClock(Arc::new(Mutex::new(now)));
            let flag = Arc::new(AtomicBool::new(all_final));
            let check_flag = Arc::clone(&flag);
            let scheduler = PollingScheduler::new(config, Arc::clone(&timers), clock.clone())
                .with_liveness_check(Box::new(move || check_flag.load(Ordering::SeqCst)));
            Harness {
                scheduler,
                timers,
                clock,
                all_final: flag,
            }
        }

        fn refresh_timer(&self) -> Option<TimerHandle> {
            self.timers.lock().unwrap().live(TimerKind::Refresh)
        }

        fn display_timer(&self) -> Option<TimerHandle> {
            self.timers.lock().unwrap().live(TimerKind::Display)
        }

        fn tick(&mut self) -> Option<RefreshTicket> {
            let h = self.refresh_timer().expect("refresh timer armed");
            self.scheduler.on_timer(h)
        }

        fn advance(&self, secs: i64) {
            let mut now = self.clock.0.lock().unwrap();
            *now += chrono::Duration::seconds(secs);
        }
    }

    #[test]
    fn start_outside_window_with_all_final_stays_stopped() {
        let mut h = Harness::new(tuesday_morning(), true);
        assert!(h.scheduler.start().is_none());
        assert_eq!(h.scheduler.state(), SchedulerState::Stopped);
        assert!(h.timers.lock().unwrap().armed.is_empty());
        assert!(!h.scheduler.snapshot().is_game_window);
    }

    #[test]
    fn start_outside_window_with_live_game_runs() {
        let mut h = Harness::new(tuesday_morning(), false);
        let ticket = h.scheduler.start().expect("immediate refresh");
        assert_eq!(ticket.trigger(), RefreshTrigger::Start);
        assert_eq!(h.scheduler.state(), SchedulerState::Active);
    }

    #[test]
    fn start_without_liveness_check_relies_on_window() {
        let timers = Arc::new(Mutex::new(FakeTimers::default()));
        let clock = FakeClock(Arc::new(Mutex::new(tuesday_morning())));
        let mut s = PollingScheduler::new(SchedulerConfig::default(), timers, clock);
        assert!(s.start().is_none());
        assert_eq!(s.state(), SchedulerState::Stopped);
    }

    #[test]
    fn start_inside_window_refreshes_exactly_once() {
        let mut h = Harness::new(sunday_afternoon(), true);
        let first = h.scheduler.start();
        assert!(first.is_some());
        assert_eq!(h.scheduler.state(), SchedulerState::Active);
        assert!(h.refresh_timer().is_some());
        assert!(h.display_timer().is_some());
        // a second start is a no-op
        assert!(h.scheduler.start().is_none());
        assert!(h.scheduler.snapshot().is_refreshing);
    }

    #[test]
    fn ticks_while_refresh_outstanding_issue_one_refresh() {
        let mut h = Harness::new(sunday_afternoon(), false);
        let start = h.scheduler.start().unwrap();
        h.scheduler.finish_refresh(start, Ok(()));

        let issued: Vec<RefreshTicket> = (0..2).filter_map(|_| h.tick()).collect();
        assert_eq!(issued.len(), 1);
        assert_eq!(issued[0].trigger(), RefreshTrigger::Tick);
        // manual and visibility triggers are serialized behind it too
        assert!(h.scheduler.manual_refresh().is_none());
        h.scheduler.set_visible(false);
        assert!(h.scheduler.set_visible(true).is_none());
    }

    #[test]
    fn successful_refresh_updates_timestamp_and_resets_counter() {
        let mut h = Harness::new(sunday_afternoon(), false);
        let t = h.scheduler.start().unwrap();
        h.scheduler.finish_refresh(t, Ok(()));
        assert_eq!(h.scheduler.snapshot().last_updated, Some(sunday_afternoon()));

        let display = h.display_timer().unwrap();
        for _ in 0..5 {
            assert!(h.scheduler.on_timer(display).is_none());
        }
        assert_eq!(h.scheduler.snapshot().seconds_since_update, 5);

        h.advance(60);
        let t = h.tick().unwrap();
        h.scheduler.finish_refresh(t, Ok(()));
        let snap = h.scheduler.snapshot();
        assert_eq!(snap.seconds_since_update, 0);
        assert_eq!(snap.last_updated, Some(sunday_afternoon() + chrono::Duration::seconds(60)));
        assert!(!snap.is_refreshing);
    }

    #[test]
    fn failed_refresh_keeps_stale_timestamp_and_keeps_running() {
        let mut h = Harness::new(sunday_afternoon(), false);
        let t = h.scheduler.start().unwrap();
        h.scheduler.finish_refresh(t, Ok(()));
        h.advance(60);
        let t = h.tick().unwrap();
        h.scheduler.finish_refresh(t, Err(RefreshError::Upstream("503".into())));
        let snap = h.scheduler.snapshot();
        assert_eq!(snap.last_updated, Some(sunday_afternoon()));
        assert_eq!(snap.state, SchedulerState::Active);
        assert!(!snap.is_refreshing);
        assert!(h.tick().is_some());
    }

    #[test]
    fn stop_then_stale_timer_fire_changes_nothing() {
        let mut h = Harness::new(sunday_afternoon(), false);
        let t = h.scheduler.start().unwrap();
        h.scheduler.finish_refresh(t, Ok(()));
        let refresh = h.refresh_timer().unwrap();
        let display = h.display_timer().unwrap();

        h.scheduler.stop();
        let cancelled = h.timers.lock().unwrap().cancelled.clone();
        assert!(cancelled.contains(&refresh) && cancelled.contains(&display));

        let before = h.scheduler.snapshot();
        assert!(h.scheduler.on_timer(refresh).is_none());
        assert!(h.scheduler.on_timer(display).is_none());
        assert_eq!(h.scheduler.snapshot(), before);
        assert_eq!(before.state, SchedulerState::Stopped);
    }

    #[test]
    fn result_arriving_after_stop_is_discarded() {
        let mut h = Harness::new(sunday_afternoon(), false);
        let t = h.scheduler.start().unwrap();
        h.scheduler.stop();
        let before = h.scheduler.snapshot();
        h.scheduler.finish_refresh(t, Ok(()));
        assert_eq!(h.scheduler.snapshot(), before);
        assert_eq!(before.last_updated, None);

        // a restart issues a fresh ticket; the old one stays void
        let t2 = h.scheduler.start().unwrap();
        h.scheduler.finish_refresh(t, Ok(()));
        assert!(h.scheduler.snapshot().is_refreshing);
        h.scheduler.finish_refresh(t2, Ok(()));
        assert!(!h.scheduler.snapshot().is_refreshing);
    }

    #[test]
    fn pause_cancels_timers_and_resume_refreshes_immediately() {
        let mut h = Harness::new(sunday_afternoon(), false);
        let t = h.scheduler.start().unwrap();
        h.scheduler.finish_refresh(t, Ok(()));
        let old_refresh = h.refresh_timer().unwrap();

        assert!(h.scheduler.toggle_pause().is_none());
        let snap = h.scheduler.snapshot();
        assert_eq!(snap.state, SchedulerState::Paused);
        assert!(snap.is_paused);
        assert_eq!(snap.last_updated, Some(sunday_afternoon()));
        assert!(h.refresh_timer().is_none());
        assert!(h.scheduler.on_timer(old_refresh).is_none());

        let resumed = h.scheduler.toggle_pause().expect("immediate refresh on resume");
        assert_eq!(resumed.trigger(), RefreshTrigger::Resume);
        assert_eq!(h.scheduler.state(), SchedulerState::Active);
        assert!(h.refresh_timer().is_some());
    }

    #[test]
    fn resume_after_window_closes_stops() {
        let mut h = Harness::new(sunday_afternoon(), true);
        let t = h.scheduler.start().unwrap();
        // keep a game live so the first refresh doesn't auto-stop
        h.all_final.store(false, Ordering::SeqCst);
        h.scheduler.finish_refresh(t, Ok(()));
        h.scheduler.toggle_pause();

        *h.clock.0.lock().unwrap() = tuesday_morning();
        h.all_final.store(true, Ordering::SeqCst);
        assert!(h.scheduler.toggle_pause().is_none());
        assert_eq!(h.scheduler.state(), SchedulerState::Stopped);
        assert!(!h.scheduler.snapshot().is_paused);
    }

    #[test]
    fn hidden_surface_skips_ticks_and_regain_refreshes() {
        let mut h = Harness::new(sunday_afternoon(), false);
        let t = h.scheduler.start().unwrap();
        h.scheduler.finish_refresh(t, Ok(()));

        assert!(h.scheduler.set_visible(false).is_none());
        assert!(h.tick().is_none());
        assert!(!h.scheduler.snapshot().is_visible);

        let t = h.scheduler.set_visible(true).expect("refresh on regain");
        assert_eq!(t.trigger(), RefreshTrigger::VisibilityRegained);
        // already visible: no second refresh
        h.scheduler.finish_refresh(t, Ok(()));
        assert!(h.scheduler.set_visible(true).is_none());
    }

    #[test]
    fn visibility_regain_while_paused_does_nothing() {
        let mut h = Harness::new(sunday_afternoon(), false);
        let t = h.scheduler.start().unwrap();
        h.scheduler.finish_refresh(t, Ok(()));
        h.scheduler.toggle_pause();
        h.scheduler.set_visible(false);
        assert!(h.scheduler.set_visible(true).is_none());
    }

    #[test]
    fn manual_refresh_ignores_window_and_state() {
        let mut h = Harness::new(tuesday_morning(), true);
        let t = h.scheduler.manual_refresh().expect("manual always allowed when idle");
        assert_eq!(h.scheduler.state(), SchedulerState::Stopped);
        h.scheduler.finish_refresh(t, Ok(()));
        let snap = h.scheduler.snapshot();
        assert_eq!(snap.state, SchedulerState::Stopped);
        assert_eq!(snap.last_updated, Some(tuesday_morning()));
    }

    #[test]
    fn manual_refresh_while_paused_keeps_paused() {
        let mut h = Harness::new(sunday_afternoon(), false);
        let t = h.scheduler.start().unwrap();
        h.scheduler.finish_refresh(t, Ok(()));
        h.scheduler.toggle_pause();
        let t = h.scheduler.manual_refresh().unwrap();
        h.all_final.store(true, Ordering::SeqCst);
        h.scheduler.finish_refresh(t, Ok(()));
        assert_eq!(h.scheduler.state(), SchedulerState::Paused);
    }

    #[test]
    fn auto_stops_when_all_games_final() {
        let mut h = Harness::new(sunday_afternoon(), false);
        let t = h.scheduler.start().unwrap();
        h.scheduler.finish_refresh(t, Ok(()));
        assert_eq!(h.scheduler.state(), SchedulerState::Active);

        h.all_final.store(true, Ordering::SeqCst);
        let refresh = h.refresh_timer().unwrap();
        let t = h.tick().unwrap();
        h.scheduler.finish_refresh(t, Ok(()));
        assert_eq!(h.scheduler.state(), SchedulerState::Stopped);
        assert!(h.scheduler.on_timer(refresh).is_none());
        // the final refresh still counted
        assert!(h.scheduler.snapshot().last_updated.is_some());
    }

    #[test]
    fn auto_stop_can_be_disabled() {
        let config = SchedulerConfig {
            auto_stop_when_final: false,
            ..Default::default()
        };
        let mut h = Harness::with_config(sunday_afternoon(), true, config);
        let t = h.scheduler.start().unwrap();
        h.scheduler.finish_refresh(t, Ok(()));
        assert_eq!(h.scheduler.state(), SchedulerState::Active);
    }

    #[test]
    fn pause_toggled_while_stopped_starts_paused() {
        let mut h = Harness::new(sunday_afternoon(), false);
        h.scheduler.toggle_pause();
        assert!(h.scheduler.start().is_none());
        assert_eq!(h.scheduler.state(), SchedulerState::Paused);
        assert!(h.timers.lock().unwrap().armed.is_empty());
    }

    #[test]
    fn window_respects_configured_offset() {
        let est = FixedOffset::west_opt(5 * 3600).unwrap();
        let config = SchedulerConfig {
            window: RefreshWindow::parse("sun=20-24", est).unwrap(),
            ..Default::default()
        };
        // Monday 01:00 UTC = Sunday 20:00 at UTC-5
        let monday_utc = Utc.with_ymd_and_hms(2024, 9, 9, 1, 0, 0).unwrap();
        let mut h = Harness::with_config(monday_utc, true, config);
        assert!(h.scheduler.snapshot().is_game_window);
        assert!(h.scheduler.start().is_some());
    }
}
