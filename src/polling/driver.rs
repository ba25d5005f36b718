//! Tokio runtime for [`PollingScheduler`]: interval timers, a command channel
//! and a watch channel publishing snapshots after every event.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::scheduler::{
    Clock, LivenessCheck, PollingScheduler, RefreshTicket, SchedulerConfig, SchedulerSnapshot,
    TimerHandle, TimerKind, Timers,
};
use crate::error::RefreshError;

/// Whatever the scheduler keeps fresh.
#[async_trait]
pub trait RefreshSource: Send + Sync {
    async fn refresh(&self) -> Result<(), RefreshError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    Start,
    Stop,
    TogglePause,
    ManualRefresh,
    SetVisible(bool),
    Shutdown,
}

/// Repeating timers backed by spawned `tokio::time::interval` tasks. Fired
/// handles arrive on the receiver returned by [`TokioTimers::new`].
pub struct TokioTimers {
    fired: mpsc::UnboundedSender<TimerHandle>,
    next_id: u64,
    tasks: HashMap<TimerHandle, JoinHandle<()>>,
}

impl TokioTimers {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerHandle>) {
        let (fired, rx) = mpsc::unbounded_channel();
        (
            TokioTimers {
                fired,
                next_id: 0,
                tasks: HashMap::new(),
            },
            rx,
        )
    }
}

impl Timers for TokioTimers {
    fn arm(&mut self, kind: TimerKind, period: Duration) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle::new(self.next_id);
        let tx = self.fired.clone();
        let task = tokio::spawn(async move {
            // first tick one period out; the immediate refresh is the scheduler's job
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tx.send(handle).is_err() {
                    break;
                }
            }
        });
        debug!("Armed {:?} timer {:?} every {:?}", kind, handle, period);
        self.tasks.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

/// Cloneable handle to a running scheduler task.
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<SchedulerCommand>,
    snapshots: watch::Receiver<SchedulerSnapshot>,
}

impl SchedulerHandle {
    pub async fn send(&self, command: SchedulerCommand) -> anyhow::Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("scheduler task has exited"))
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        self.send(SchedulerCommand::Start).await
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(SchedulerCommand::Stop).await
    }

    pub async fn toggle_pause(&self) -> anyhow::Result<()> {
        self.send(SchedulerCommand::TogglePause).await
    }

    pub async fn manual_refresh(&self) -> anyhow::Result<()> {
        self.send(SchedulerCommand::ManualRefresh).await
    }

    pub async fn set_visible(&self, visible: bool) -> anyhow::Result<()> {
        self.send(SchedulerCommand::SetVisible(visible)).await
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.send(SchedulerCommand::Shutdown).await
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerSnapshot> {
        self.snapshots.clone()
    }
}

/// Spawn the scheduler loop. Refreshes run on the loop's task set, each bounded
/// by `refresh_timeout`; a timeout is reported as a failed refresh.
pub fn spawn_scheduler<C: Clock + 'static>(
    config: SchedulerConfig,
    clock: C,
    liveness: Option<LivenessCheck>,
    source: Arc<dyn RefreshSource>,
    refresh_timeout: Duration,
) -> (SchedulerHandle, JoinHandle<()>) {
    let (timers, fired) = TokioTimers::new();
    let mut scheduler = PollingScheduler::new(config, timers, clock);
    if let Some(check) = liveness {
        scheduler = scheduler.with_liveness_check(check);
    }

    let (command_tx, command_rx) = mpsc::channel(64);
    let (snapshot_tx, snapshot_rx) = watch::channel(scheduler.snapshot());

    let task = tokio::spawn(run_scheduler(
        scheduler,
        fired,
        command_rx,
        source,
        refresh_timeout,
        snapshot_tx,
    ));

    (
        SchedulerHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        },
        task,
    )
}

type RefreshOutcome = (RefreshTicket, Result<(), RefreshError>);

async fn run_scheduler<C: Clock>(
    mut scheduler: PollingScheduler<TokioTimers, C>,
    mut fired: mpsc::UnboundedReceiver<TimerHandle>,
    mut commands: mpsc::Receiver<SchedulerCommand>,
    source: Arc<dyn RefreshSource>,
    refresh_timeout: Duration,
    snapshots: watch::Sender<SchedulerSnapshot>,
) {
    info!("Scheduler running for source '{}'", source.name());
    let mut in_flight: FuturesUnordered<BoxFuture<'static, RefreshOutcome>> =
        FuturesUnordered::new();

    loop {
        let generation = scheduler.generation();
        let ticket = tokio::select! {
            command = commands.recv() => match command {
                None | Some(SchedulerCommand::Shutdown) => {
                    scheduler.stop();
                    in_flight.clear();
                    snapshots.send_replace(scheduler.snapshot());
                    break;
                }
                Some(command) => apply(&mut scheduler, command),
            },
            Some(handle) = fired.recv() => scheduler.on_timer(handle),
            Some((ticket, result)) = in_flight.next(), if !in_flight.is_empty() => {
                scheduler.finish_refresh(ticket, result);
                None
            }
        };

        // voided tickets: cancel their refreshes so a new one never overlaps them
        if scheduler.generation() != generation && !in_flight.is_empty() {
            debug!("Cancelling {} abandoned refresh(es)", in_flight.len());
            in_flight.clear();
        }
        if let Some(ticket) = ticket {
            in_flight.push(run_refresh(Arc::clone(&source), ticket, refresh_timeout));
        }
        snapshots.send_replace(scheduler.snapshot());
    }
    info!("Scheduler for '{}' shut down", source.name());
}

fn apply<T: Timers, C: Clock>(
    scheduler: &mut PollingScheduler<T, C>,
    command: SchedulerCommand,
) -> Option<RefreshTicket> {
    match command {
        SchedulerCommand::Start => scheduler.start(),
        SchedulerCommand::Stop => {
            scheduler.stop();
            None
        }
        SchedulerCommand::TogglePause => scheduler.toggle_pause(),
        SchedulerCommand::ManualRefresh => scheduler.manual_refresh(),
        SchedulerCommand::SetVisible(visible) => scheduler.set_visible(visible),
        SchedulerCommand::Shutdown => None,
    }
}

fn run_refresh(
    source: Arc<dyn RefreshSource>,
    ticket: RefreshTicket,
    timeout: Duration,
) -> BoxFuture<'static, RefreshOutcome> {
    async move {
        debug!("Refreshing '{}' ({:?})", source.name(), ticket.trigger());
        let result = match tokio::time::timeout(timeout, source.refresh()).await {
            Ok(result) => result,
            Err(_) => Err(RefreshError::Timeout(timeout)),
        };
        (ticket, result)
    }
    .boxed()
}
