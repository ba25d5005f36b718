pub mod driver;
pub mod scheduler;
pub mod window;

pub use driver::{spawn_scheduler, RefreshSource, SchedulerCommand, SchedulerHandle, TokioTimers};
pub use scheduler::{
    Clock, LivenessCheck, PollingScheduler, RefreshTicket, RefreshTrigger, SchedulerConfig,
    SchedulerSnapshot, SchedulerState, SystemClock, TimerHandle, TimerKind, Timers,
};
pub use window::{HourRange, RefreshWindow};
