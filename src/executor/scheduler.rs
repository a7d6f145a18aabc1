//! Program execution.
//!
//! A run walks the program's blocks on one task: bounded blocks execute their
//! iterations in order, unbounded blocks are spawned as independent loops that
//! repeat until the run's cancellation token fires. Every step is preceded by a
//! cooperative cancellation check.
//!
//! Run states: `Idle -> Running -> Completed | Cancelled | Faulted`. A run reaches a
//! terminal state only after its sequential path has ended and every loop it
//! spawned has drained, so a program with an unbounded block only ends through
//! cancellation.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace, warn};

use super::resolver::Resolver;
use super::types::Value;
use crate::config::Config;
use crate::script::{Block, Program};

/// Lifecycle of one program run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum RunState {
    /// Spawned, not yet picked up by the runtime.
    Idle,
    Running,
    Completed,
    Cancelled,
    /// The sequential path hit an action failure.
    Faulted(String),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Cancelled | RunState::Faulted(_)
        )
    }
}

/// Result of one step, as reported to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Success(Option<Value>),
    Cancelled,
    Failed(String),
}

/// Emitted after every step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepEvent {
    pub run: u64,
    pub block: usize,
    pub iteration: u64,
    pub step: String,
    pub outcome: StepOutcome,
}

/// Tunables shared by every run of a scheduler.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Pause before each step. Zero still yields to the runtime.
    pub step_delay: Duration,
    /// Buffer of the step event broadcast channel.
    pub event_capacity: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            step_delay: Duration::ZERO,
            event_capacity: 256,
        }
    }
}

impl From<&Config> for RunOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            step_delay: Duration::from_millis(cfg.step_delay_ms),
            event_capacity: cfg.event_capacity,
        }
    }
}

/// Starts runs and keeps at most one of them active through [`Scheduler::start`].
pub struct Scheduler {
    resolver: Arc<Resolver>,
    options: RunOptions,
    events: broadcast::Sender<StepEvent>,
    active: Mutex<Option<RunHandle>>,
    next_id: AtomicU64,
}

impl Scheduler {
    pub fn new(resolver: Arc<Resolver>, options: RunOptions) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        Self {
            resolver,
            options,
            events,
            active: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// Receive a [`StepEvent`] for every step of every subsequent run.
    pub fn subscribe(&self) -> broadcast::Receiver<StepEvent> {
        self.events.subscribe()
    }

    /// Spawn a run of `program`. Does not touch any other run.
    pub fn run(&self, program: Program) -> RunHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(RunState::Idle);

        info!(
            target: "scriptbot::scheduler",
            run = id,
            blocks = program.blocks.len(),
            steps = program.step_count(),
            unbounded = program.has_unbounded(),
            "Run started"
        );

        let ctx = Arc::new(RunContext {
            id,
            program: Arc::new(program),
            resolver: self.resolver.clone(),
            token: token.clone(),
            events: self.events.clone(),
            step_delay: self.options.step_delay,
            loops: TaskTracker::new(),
        });
        tokio::spawn(drive(ctx, state_tx));

        RunHandle {
            inner: Arc::new(RunInner {
                id,
                token,
                state: state_rx,
            }),
        }
    }

    /// Cancel and drain the active run (if any), then start `program`.
    pub async fn start(&self, program: Program) -> RunHandle {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            let state = previous.cancel().await;
            debug!(
                target: "scriptbot::scheduler",
                run = previous.id(), ?state,
                "Previous run drained"
            );
        }
        let handle = self.run(program);
        *active = Some(handle.clone());
        handle
    }

    /// Cancel the active run and wait for it to drain.
    pub async fn stop(&self) -> Option<RunState> {
        let handle = self.active.lock().await.take()?;
        Some(handle.cancel().await)
    }

    pub async fn active(&self) -> Option<RunHandle> {
        self.active.lock().await.clone()
    }
}

/// Handle to a spawned run. Cloning shares the same run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    inner: Arc<RunInner>,
}

#[derive(Debug)]
struct RunInner {
    id: u64,
    token: CancellationToken,
    state: watch::Receiver<RunState>,
}

impl RunHandle {
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn state(&self) -> RunState {
        self.inner.state.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.inner.state.borrow().is_terminal()
    }

    /// The token steps and cancellable actions observe.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Wait until the run has fully drained.
    pub async fn wait(&self) -> RunState {
        let mut rx = self.inner.state.clone();
        let terminal = rx
            .wait_for(RunState::is_terminal)
            .await
            .map(|state| RunState::clone(&state));
        match terminal {
            Ok(state) => state,
            Err(_) => rx.borrow().clone(),
        }
    }

    /// Request cancellation and wait until every task of the run has stopped.
    pub async fn cancel(&self) -> RunState {
        if !self.inner.token.is_cancelled() {
            info!(target: "scriptbot::scheduler", run = self.inner.id, "Cancellation requested");
            self.inner.token.cancel();
        }
        self.wait().await
    }
}

struct RunContext {
    id: u64,
    program: Arc<Program>,
    resolver: Arc<Resolver>,
    token: CancellationToken,
    events: broadcast::Sender<StepEvent>,
    step_delay: Duration,
    loops: TaskTracker,
}

enum PathOutcome {
    Completed,
    Cancelled,
    Faulted(String),
}

async fn drive(ctx: Arc<RunContext>, state: watch::Sender<RunState>) {
    let _ = state.send(RunState::Running);
    let sequential = tokio::spawn(ctx.clone().walk());
    let (outcome, spawned) = match sequential.await {
        Ok(result) => result,
        Err(e) => {
            error!(target: "scriptbot::scheduler", run = ctx.id, error = %e, "Sequential path panicked");
            (PathOutcome::Faulted(format!("sequential path panicked: {e}")), 0)
        }
    };

    // Unbounded loops only end once the token fires.
    ctx.loops.close();
    ctx.loops.wait().await;

    let final_state = match outcome {
        PathOutcome::Faulted(message) => RunState::Faulted(message),
        PathOutcome::Cancelled => RunState::Cancelled,
        PathOutcome::Completed if spawned > 0 => RunState::Cancelled,
        PathOutcome::Completed => RunState::Completed,
    };
    info!(
        target: "scriptbot::scheduler",
        run = ctx.id, state = ?final_state, loops = spawned,
        "Run finished"
    );
    let _ = state.send(final_state);
}

impl RunContext {
    async fn walk(self: Arc<Self>) -> (PathOutcome, usize) {
        let mut spawned = 0;
        for (index, block) in self.program.blocks.iter().enumerate() {
            if block.unbounded {
                spawned += 1;
                debug!(target: "scriptbot::scheduler", run = self.id, block = index, "Spawning unbounded loop");
                self.loops.spawn(self.clone().run_unbounded(index));
                continue;
            }

            // Iterating an empty block would never reach a suspension point.
            if block.steps.is_empty() {
                trace!(target: "scriptbot::scheduler", run = self.id, block = index, "Skipping empty block");
                continue;
            }

            trace!(
                target: "scriptbot::scheduler",
                run = self.id, block = index, repeat = block.repeat_count,
                "Running bounded block"
            );
            for iteration in 0..u64::from(block.repeat_count) {
                if self.token.is_cancelled() {
                    return (PathOutcome::Cancelled, spawned);
                }
                match self.run_iteration(index, block, iteration).await {
                    IterationEnd::Done => {}
                    IterationEnd::Cancelled => return (PathOutcome::Cancelled, spawned),
                    IterationEnd::Faulted(message) => {
                        warn!(
                            target: "scriptbot::scheduler",
                            run = self.id, block = index, error = %message,
                            "Sequential path faulted; remaining steps skipped"
                        );
                        return (PathOutcome::Faulted(message), spawned);
                    }
                }
            }
        }
        (PathOutcome::Completed, spawned)
    }

    async fn run_unbounded(self: Arc<Self>, index: usize) {
        let block = &self.program.blocks[index];
        let mut iteration = 0u64;
        loop {
            match self.run_iteration(index, block, iteration).await {
                IterationEnd::Done => {}
                IterationEnd::Cancelled => break,
                IterationEnd::Faulted(message) => {
                    warn!(
                        target: "scriptbot::scheduler",
                        run = self.id, block = index, iteration, error = %message,
                        "Loop iteration faulted; continuing"
                    );
                }
            }
            iteration += 1;

            if block.steps.is_empty() {
                self.token.cancelled().await;
                break;
            }
        }
        debug!(
            target: "scriptbot::scheduler",
            run = self.id, block = index, iterations = iteration,
            "Unbounded loop drained"
        );
    }

    async fn run_iteration(&self, index: usize, block: &Block, iteration: u64) -> IterationEnd {
        for step in &block.steps {
            if !self.pause().await {
                return IterationEnd::Cancelled;
            }

            let result = self.resolver.invoke(step, &self.token).await;
            let (outcome, end) = match result {
                Ok(value) => {
                    debug!(
                        target: "scriptbot::scheduler",
                        run = self.id, step = %step.action, value = ?value,
                        "Step succeeded"
                    );
                    (StepOutcome::Success(value), None)
                }
                Err(e) if e.is_cancelled() => (StepOutcome::Cancelled, Some(IterationEnd::Cancelled)),
                Err(e) if e.is_unresolved() => {
                    // Only this step is skipped.
                    warn!(target: "scriptbot::scheduler", run = self.id, error = %e, "Step unresolved");
                    (StepOutcome::Failed(e.to_string()), None)
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(target: "scriptbot::scheduler", run = self.id, error = %message, "Step failed");
                    (
                        StepOutcome::Failed(message.clone()),
                        Some(IterationEnd::Faulted(message)),
                    )
                }
            };

            let _ = self.events.send(StepEvent {
                run: self.id,
                block: index,
                iteration,
                step: step.action.clone(),
                outcome,
            });

            if let Some(end) = end {
                return end;
            }
        }
        IterationEnd::Done
    }

    /// Inter-step suspension point. Returns false once cancellation is observed.
    async fn pause(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        if self.step_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::select! {
                _ = self.token.cancelled() => return false,
                _ = tokio::time::sleep(self.step_delay) => {}
            }
        }
        !self.token.is_cancelled()
    }
}

enum IterationEnd {
    Done,
    Cancelled,
    Faulted(String),
}
