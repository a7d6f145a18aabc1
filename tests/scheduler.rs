//! Scheduler behavior against a recording action surface.
//!
//! Verifies block ordering, loop concurrency, cancellation draining and the
//! terminal state a run settles in.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use parking_lot::Mutex;
use scriptbot::executor::{
    ActionError, ActionSurface, ActionTable, Registry, Resolver, RunOptions, RunState, Scheduler,
    SemanticType, StepOutcome, Value,
};
use scriptbot::script::parse;

#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, entry: impl Into<String>) {
        self.log.lock().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn count(&self, name: &str) -> usize {
        self.log.lock().iter().filter(|e| e.as_str() == name).count()
    }
}

impl ActionSurface for Recorder {
    fn expose(self: Arc<Self>, table: &mut ActionTable) {
        let me = self.clone();
        table
            .add("Foo")
            .param("a", SemanticType::Int32)
            .param("b", SemanticType::Int32)
            .handler(move |call| {
                let me = me.clone();
                async move {
                    me.push(format!("Foo({},{})", call.i32(0)?, call.i32(1)?));
                    Ok(None)
                }
            });

        let me = self.clone();
        table.add("Bar").handler(move |_| {
            let me = me.clone();
            async move {
                me.push("Bar");
                Ok(None)
            }
        });

        let me = self.clone();
        table.add("Fail").handler(move |_| {
            let me = me.clone();
            async move {
                me.push("Fail");
                Err(ActionError::Failed(anyhow!("boom")))
            }
        });

        let me = self.clone();
        table
            .add("Answer")
            .handler(move |_| {
                let me = me.clone();
                async move {
                    me.push("Answer");
                    Ok(Some(Value::Int32(42)))
                }
            });

        let me = self;
        table.add("Block").cancellable().handler(move |call| {
            let me = me.clone();
            async move {
                me.push("Block");
                call.cancel_token().cancelled().await;
                Err(ActionError::Cancelled)
            }
        });
    }
}

fn scheduler(recorder: &Arc<Recorder>) -> Scheduler {
    let registry = Registry::build(recorder.clone());
    let resolver = Arc::new(Resolver::new(Arc::new(registry)));
    Scheduler::new(resolver, RunOptions::default())
}

async fn wait_until(recorder: &Recorder, pred: impl Fn(&[String]) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if pred(&recorder.entries()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn sequential_block_runs_once_then_loop_until_cancelled() {
    let recorder = Arc::new(Recorder::default());
    let scheduler = scheduler(&recorder);

    let run = scheduler.run(parse("Foo=1,2\nWhile=true\nBar"));
    wait_until(&recorder, |log| log.iter().filter(|e| *e == "Bar").count() >= 3).await;
    assert_eq!(run.state(), RunState::Running);

    let state = run.cancel().await;
    assert_eq!(state, RunState::Cancelled);

    let log = recorder.entries();
    assert_eq!(log[0], "Foo(1,2)");
    assert_eq!(log.iter().filter(|e| *e == "Foo(1,2)").count(), 1);

    let settled = log.len();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(recorder.entries().len(), settled, "no invocation after drain");
}

#[tokio::test]
async fn bounded_program_completes_in_order() {
    let recorder = Arc::new(Recorder::default());
    let scheduler = scheduler(&recorder);

    let run = scheduler.run(parse("Foo=1,2\nWhile=3\nBar\nAnswer"));
    let state = tokio::time::timeout(Duration::from_secs(5), run.wait())
        .await
        .unwrap();

    assert_eq!(state, RunState::Completed);
    assert!(run.is_finished());
    assert_eq!(
        recorder.entries(),
        vec!["Foo(1,2)", "Bar", "Answer", "Bar", "Answer", "Bar", "Answer"]
    );
}

#[tokio::test]
async fn empty_program_completes() {
    let recorder = Arc::new(Recorder::default());
    let scheduler = scheduler(&recorder);

    let state = scheduler.run(parse("")).wait().await;
    assert_eq!(state, RunState::Completed);
    assert!(recorder.entries().is_empty());
}

#[tokio::test]
async fn zero_repeat_block_is_skipped() {
    let recorder = Arc::new(Recorder::default());
    let scheduler = scheduler(&recorder);

    let state = scheduler.run(parse("While=0\nBar\nWhile=false\nAnswer")).wait().await;
    assert_eq!(state, RunState::Completed);
    assert_eq!(recorder.entries(), vec!["Answer"]);
}

#[tokio::test]
async fn unresolved_step_is_skipped() {
    let recorder = Arc::new(Recorder::default());
    let scheduler = scheduler(&recorder);

    let state = scheduler
        .run(parse("Missing=1\nFoo=x,2\nFoo=3,4"))
        .wait()
        .await;
    assert_eq!(state, RunState::Completed);
    assert_eq!(recorder.entries(), vec!["Foo(3,4)"]);
}

#[tokio::test]
async fn fault_ends_sequential_path_but_not_loops() {
    let recorder = Arc::new(Recorder::default());
    let scheduler = scheduler(&recorder);

    let run = scheduler.run(parse("While=true\nBar\nWhile=1\nFail\nFoo=1,2"));
    wait_until(&recorder, |log| log.iter().any(|e| e == "Fail")).await;

    let bars_at_fault = recorder.count("Bar");
    wait_until(&recorder, |log| {
        log.iter().filter(|e| *e == "Bar").count() > bars_at_fault + 2
    })
    .await;
    assert_eq!(run.state(), RunState::Running, "loops keep the run alive");

    let state = run.cancel().await;
    assert!(matches!(state, RunState::Faulted(ref m) if m.contains("boom")));
    assert_eq!(recorder.count("Foo(1,2)"), 0);
}

#[tokio::test]
async fn loop_fault_continues_with_next_iteration() {
    let recorder = Arc::new(Recorder::default());
    let scheduler = scheduler(&recorder);

    let run = scheduler.run(parse("While=true\nFail\nBar"));
    wait_until(&recorder, |log| log.iter().filter(|e| *e == "Fail").count() >= 3).await;

    assert_eq!(run.cancel().await, RunState::Cancelled);
    assert_eq!(recorder.count("Bar"), 0);
}

#[tokio::test]
async fn cancellation_interrupts_cancellable_action() {
    let recorder = Arc::new(Recorder::default());
    let scheduler = scheduler(&recorder);

    let run = scheduler.run(parse("Block\nBar"));
    wait_until(&recorder, |log| log.iter().any(|e| e == "Block")).await;

    let state = tokio::time::timeout(Duration::from_secs(5), run.cancel())
        .await
        .unwrap();
    assert_eq!(state, RunState::Cancelled);
    assert_eq!(recorder.count("Bar"), 0);
}

#[tokio::test]
async fn start_drains_previous_run() {
    let recorder = Arc::new(Recorder::default());
    let scheduler = scheduler(&recorder);

    let first = scheduler.start(parse("While=true\nBar")).await;
    wait_until(&recorder, |log| !log.is_empty()).await;

    let second = scheduler.start(parse("Foo=5,6")).await;
    assert_eq!(first.state(), RunState::Cancelled);
    assert_ne!(first.id(), second.id());
    assert_eq!(second.wait().await, RunState::Completed);
    assert_eq!(recorder.entries().last().map(String::as_str), Some("Foo(5,6)"));

    assert_eq!(scheduler.stop().await, Some(RunState::Completed));
    assert_eq!(scheduler.stop().await, None);
}

#[tokio::test]
async fn steps_are_reported_to_subscribers() {
    let recorder = Arc::new(Recorder::default());
    let scheduler = scheduler(&recorder);
    let mut events = scheduler.subscribe();

    let run = scheduler.run(parse("Answer\nFail"));
    assert!(matches!(run.wait().await, RunState::Faulted(_)));

    let first = events.recv().await.unwrap();
    assert_eq!(first.run, run.id());
    assert_eq!(first.step, "Answer");
    assert_eq!(first.outcome, StepOutcome::Success(Some(Value::Int32(42))));

    let second = events.recv().await.unwrap();
    assert_eq!(second.step, "Fail");
    assert!(matches!(second.outcome, StepOutcome::Failed(_)));
}

#[tokio::test(start_paused = true)]
async fn step_delay_precedes_each_step() {
    let recorder = Arc::new(Recorder::default());
    let registry = Registry::build(recorder.clone());
    let scheduler = Scheduler::new(
        Arc::new(Resolver::new(Arc::new(registry))),
        RunOptions {
            step_delay: Duration::from_millis(100),
            ..RunOptions::default()
        },
    );

    let started = tokio::time::Instant::now();
    let state = scheduler.run(parse("While=3\nBar")).wait().await;
    assert_eq!(state, RunState::Completed);
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_bounded_block_neither_spins_nor_starves_loops() {
    let recorder = Arc::new(Recorder::default());
    let scheduler = scheduler(&recorder);

    let run = scheduler.run(parse("While=4000000000\nWhile=true\nBar"));
    wait_until(&recorder, |log| log.iter().any(|e| e == "Bar")).await;

    let state = tokio::time::timeout(Duration::from_secs(3), run.cancel())
        .await
        .expect("run drained in time");
    assert_eq!(state, RunState::Cancelled);
}

#[tokio::test]
async fn empty_bounded_block_is_skipped() {
    let recorder = Arc::new(Recorder::default());
    let scheduler = scheduler(&recorder);

    let run = scheduler.run(parse("While=4000000000\nWhile=1\nFoo=1,2"));
    let state = tokio::time::timeout(Duration::from_secs(3), run.wait())
        .await
        .unwrap();
    assert_eq!(state, RunState::Completed);
    assert_eq!(recorder.entries(), vec!["Foo(1,2)"]);
}

#[tokio::test]
async fn run_is_idle_until_polled_and_cancellable_through_its_token() {
    let recorder = Arc::new(Recorder::default());
    let scheduler = scheduler(&recorder);

    let run = scheduler.start(parse("While=true\nBar")).await;
    assert_eq!(run.state(), RunState::Idle);
    assert!(!run.is_finished());
    assert_eq!(scheduler.active().await.map(|h| h.id()), Some(run.id()));

    wait_until(&recorder, |log| !log.is_empty()).await;
    assert_eq!(run.state(), RunState::Running);

    run.cancellation_token().cancel();
    assert_eq!(run.wait().await, RunState::Cancelled);
}

#[tokio::test]
async fn buffered_events_survive_scheduler_drop() {
    let recorder = Arc::new(Recorder::default());
    let scheduler = scheduler(&recorder);
    let mut events = scheduler.subscribe();

    let run = scheduler.run(parse("Answer\nFail"));
    assert!(matches!(run.wait().await, RunState::Faulted(_)));
    drop(scheduler);

    let mut steps = Vec::new();
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) => steps.push(event.step),
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                Err(e) => panic!("unexpected receive error: {e}"),
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "channel closes once the run is dropped");
    assert_eq!(steps, vec!["Answer", "Fail"]);
}
