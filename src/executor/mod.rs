#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/*!
Executor module for scriptbot.

This module wires together:
- `types`: semantic parameter types and runtime values
- `coerce`: text -> typed value conversion
- `registry`: the action table exposed by a collaborator, cached by name and argument count
- `resolver`: nested-step expansion, overload selection and invocation
- `scheduler`: sequential blocks, concurrent unbounded loops and cancellation
- `actions`: low-level input simulation on a dedicated thread (Enigo)
- `catalog`: the built-in keyboard/mouse/window action surface

Typical usage:
```no_run
use std::sync::Arc;
use scriptbot::executor::{InputActuator, InputCatalog, Registry, Resolver, RunOptions, Scheduler};
use scriptbot::script;

# async fn demo() -> anyhow::Result<()> {
let actuator = InputActuator::spawn(true)?; // dry-run mode
let registry = Registry::build(Arc::new(InputCatalog::new(actuator)));
let scheduler = Scheduler::new(Arc::new(Resolver::new(Arc::new(registry))), RunOptions::default());

let run = scheduler.start(script::parse("MouseMove=10,20\nWhile=3\nClick")).await;
let state = run.wait().await;
# Ok(())
# }
```
*/

pub mod actions;
pub mod catalog;
pub mod coerce;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod types;

// Re-exports for convenient access from `scriptbot::executor::*`
pub use actions::{ActionExecutor, InputActuator};
pub use catalog::InputCatalog;
pub use coerce::{CoercionFailure, coerce};
pub use error::{ActionError, InvocationError};
pub use registry::{
    ActionCall, ActionDescriptor, ActionResult, ActionSurface, ActionTable, Param, Registry,
};
pub use resolver::Resolver;
pub use scheduler::{RunHandle, RunOptions, RunState, Scheduler, StepEvent, StepOutcome};
pub use types::{EnumSpec, SemanticType, Value};
