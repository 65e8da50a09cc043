use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::attendance::service::{AttendanceService, PeriodAttendance};
use crate::errors::{ServiceError, ServiceResult};
use crate::live::timer::{HEARTBEAT, RefreshTimer, ResultSequencer, TimerAction};
use crate::model::class_period::{ClassPeriod, ClockTime};
use crate::model::student::Hour;
use crate::schedule::cadence::Cadence;
use crate::schedule::scheduler::{Activity, Mode, PeriodScheduler, PinError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiveResult {
    pub hour: Hour,
    #[schema(value_type = String, format = "date-time")]
    pub checked_at: DateTime<Local>,
    pub report: PeriodAttendance,
}

/// What the dashboard shows: current mode, cadence and the latest result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    pub mode: Mode,
    pub period: Option<ClassPeriod>,
    pub zone: Cadence,
    pub cadence_seconds: u64,
    pub manual_hour: Option<Hour>,
    pub checking: bool,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_update: Option<DateTime<Local>>,
    pub last_error: Option<String>,
    pub result: Option<LiveResult>,
}

impl Default for LiveSnapshot {
    fn default() -> Self {
        Self {
            mode: Mode::Idle,
            period: None,
            zone: Cadence::Idle,
            cadence_seconds: Cadence::Idle.interval().as_secs(),
            manual_hour: None,
            checking: false,
            last_update: None,
            last_error: None,
            result: None,
        }
    }
}

enum Command {
    Pin(Hour, oneshot::Sender<Result<(), PinError>>),
    Unpin,
}

struct CheckOutcome {
    seq: u64,
    hour: Hour,
    result: ServiceResult<PeriodAttendance>,
}

/// Cheap handle shared with request handlers.
#[derive(Clone)]
pub struct LiveHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<LiveSnapshot>,
}

impl LiveHandle {
    pub fn snapshot(&self) -> LiveSnapshot {
        self.snapshot.borrow().clone()
    }

    pub async fn pin(&self, hour: Hour) -> ServiceResult<()> {
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(Command::Pin(hour, reply))
            .await
            .map_err(|_| monitor_stopped())?;
        match answer.await.map_err(|_| monitor_stopped())? {
            Ok(()) => Ok(()),
            Err(PinError::PeriodActive(active)) => Err(ServiceError::Conflict(format!(
                "Period {active} is in session; manual selection is only available between periods"
            ))),
            Err(PinError::UnknownHour(hour)) => Err(ServiceError::Validation(format!(
                "No class period configured for hour {hour}"
            ))),
        }
    }

    pub async fn unpin(&self) -> ServiceResult<()> {
        self.commands
            .send(Command::Unpin)
            .await
            .map_err(|_| monitor_stopped())
    }
}

fn monitor_stopped() -> ServiceError {
    ServiceError::Configuration("Live monitor is not running (LIVE_MONITOR=false?)".into())
}

/// Source of local wall-clock time for period detection.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Background poller: re-evaluates the scheduler on a fixed heartbeat and
/// runs at most one attendance check at a time.
pub struct LiveMonitor {
    state: MonitorState,
    commands: mpsc::Receiver<Command>,
    outcomes: mpsc::UnboundedReceiver<CheckOutcome>,
}

struct MonitorState {
    scheduler: PeriodScheduler,
    service: AttendanceService,
    clock: Clock,
    timer: RefreshTimer,
    sequencer: ResultSequencer,
    in_flight: bool,
    /// A period or zone change arrived while a check was running.
    recheck_pending: bool,
    outcomes: mpsc::UnboundedSender<CheckOutcome>,
    snapshot: watch::Sender<LiveSnapshot>,
}

/// Why a check is being started. Out-of-band requests are deferred, not
/// dropped, when another check is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Tick,
    OutOfBand,
}

impl LiveMonitor {
    pub fn new(periods: Vec<ClassPeriod>, service: AttendanceService) -> (Self, LiveHandle) {
        Self::with_clock(periods, service, Arc::new(Local::now))
    }

    pub fn with_clock(
        periods: Vec<ClassPeriod>,
        service: AttendanceService,
        clock: Clock,
    ) -> (Self, LiveHandle) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(LiveSnapshot::default());

        let monitor = Self {
            state: MonitorState {
                scheduler: PeriodScheduler::new(periods),
                service,
                clock,
                timer: RefreshTimer::new(Instant::now()),
                sequencer: ResultSequencer::default(),
                in_flight: false,
                recheck_pending: false,
                outcomes: outcome_tx,
                snapshot: snapshot_tx,
            },
            commands: command_rx,
            outcomes: outcome_rx,
        };
        let handle = LiveHandle {
            commands: command_tx,
            snapshot: snapshot_rx,
        };
        (monitor, handle)
    }

    pub async fn run(self) {
        let LiveMonitor {
            mut state,
            mut commands,
            mut outcomes,
        } = self;

        let mut heartbeat = interval(HEARTBEAT);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Live monitor started");

        loop {
            let due = state.timer.due();
            tokio::select! {
                _ = heartbeat.tick() => state.on_heartbeat(),
                _ = sleep_until(due) => state.on_timer(),
                command = commands.recv() => match command {
                    Some(command) => state.on_command(command),
                    None => break,
                },
                Some(outcome) = outcomes.recv() => state.on_outcome(outcome),
            }
        }
        info!("Live monitor stopped");
    }
}

impl MonitorState {
    fn clock_now(&self) -> ClockTime {
        ClockTime::from_time((self.clock)().time())
    }

    fn evaluate(&mut self) -> Activity {
        let now = self.clock_now();
        self.scheduler.evaluate(now)
    }

    fn on_heartbeat(&mut self) {
        let activity = self.evaluate();
        if self.timer.reconcile(&activity, Instant::now()) == TimerAction::Restart {
            info!(mode = ?activity.mode, zone = ?activity.cadence, "Refresh cadence changed");
            self.publish(&activity);
            self.start_check(&activity, Trigger::OutOfBand);
        }
    }

    fn on_timer(&mut self) {
        let activity = self.evaluate();
        let now = Instant::now();
        let trigger = if self.timer.reconcile(&activity, now) == TimerAction::Keep {
            self.timer.rearm(activity.cadence, now);
            Trigger::Tick
        } else {
            self.publish(&activity);
            Trigger::OutOfBand
        };
        self.start_check(&activity, trigger);
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Pin(hour, reply) => {
                let outcome = self.scheduler.pin(hour, self.clock_now());
                let pinned = outcome.is_ok();
                let _ = reply.send(outcome);
                if pinned {
                    info!(%hour, "Period pinned manually");
                    let activity = self.evaluate();
                    self.timer.reconcile(&activity, Instant::now());
                    self.publish(&activity);
                    self.start_check(&activity, Trigger::OutOfBand);
                }
            }
            Command::Unpin => {
                self.scheduler.unpin();
                let activity = self.evaluate();
                if self.timer.reconcile(&activity, Instant::now()) == TimerAction::Restart {
                    self.publish(&activity);
                }
            }
        }
    }

    fn start_check(&mut self, activity: &Activity, trigger: Trigger) {
        let Some(period) = activity.period.clone() else {
            return;
        };
        if self.in_flight {
            if trigger == Trigger::OutOfBand {
                debug!(hour = %period.hour, "Check in flight; recheck deferred");
                self.recheck_pending = true;
            } else {
                debug!(hour = %period.hour, "Check still in flight; skipping tick");
            }
            return;
        }

        self.in_flight = true;
        self.snapshot.send_modify(|s| s.checking = true);

        let seq = self.sequencer.issue();
        let service = self.service.clone();
        let outcomes = self.outcomes.clone();
        let date = (self.clock)().date_naive();
        actix_web::rt::spawn(async move {
            let result = service.check_period(&period, date).await;
            let _ = outcomes.send(CheckOutcome {
                seq,
                hour: period.hour,
                result,
            });
        });
    }

    fn on_outcome(&mut self, outcome: CheckOutcome) {
        self.in_flight = false;
        self.apply(outcome);

        if std::mem::take(&mut self.recheck_pending) {
            let activity = self.evaluate();
            self.start_check(&activity, Trigger::OutOfBand);
        }
    }

    fn apply(&mut self, outcome: CheckOutcome) {
        if !self.sequencer.accept(outcome.seq) {
            debug!(seq = outcome.seq, "Discarding stale check result");
            self.snapshot.send_modify(|s| s.checking = false);
            return;
        }

        let now = (self.clock)();
        self.snapshot.send_modify(|s| {
            s.checking = false;
            match outcome.result {
                Ok(report) => {
                    s.last_update = Some(now);
                    s.last_error = None;
                    s.result = Some(LiveResult {
                        hour: outcome.hour,
                        checked_at: now,
                        report,
                    });
                }
                Err(e) => {
                    warn!(error = %e, hour = %outcome.hour, "Live attendance check failed");
                    s.last_error = Some(e.to_string());
                }
            }
        });
    }

    fn publish(&self, activity: &Activity) {
        let manual_hour = self.scheduler.manual();
        self.snapshot.send_modify(|s| {
            s.mode = activity.mode;
            s.period = activity.period.clone();
            s.zone = activity.cadence;
            s.cadence_seconds = activity.cadence.interval().as_secs();
            s.manual_hour = manual_hour;
        });
    }
}
