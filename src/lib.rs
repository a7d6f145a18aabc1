#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Scriptbot: a line-oriented automation script interpreter driving Enigo input actions.
//!
//! A script is a list of `Action[=arguments]` lines, optionally split into repeat blocks
//! with `While = <true|false|count>`. Bracket expressions (`Click‹GetHandle Notepad›`)
//! feed one action's result into another's arguments.
//!
//! Modules:
//! - `config`: Configuration models, loader, and schema helpers.
//! - `script`: Script model and the best-effort line parser.
//! - `executor`: Action registry, argument coercion, resolver, scheduler and the
//!   built-in input catalog.
//! - `sources`: Script sources (file, stdin).
//! - `utils`: Window helpers.
//!
//! Use `scriptbot::prelude::*` to bring commonly used items into scope quickly.

/// Public module: configuration (models, loader, schema helpers).
pub mod config;
/// Public module: execution engine (registry, resolver, scheduler, actions).
pub mod executor;
/// Public module: script model and parser.
pub mod script;
/// Public module: script sources (file, stdin).
pub mod sources;
/// Public module: utilities (window helpers).
pub mod utils;

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version (e.g., "0.1.0").
#[inline]
pub const fn version() -> &'static str {
    PKG_VERSION
}

/// Initialize tracing (logging) with a reasonable default.
/// - Honors the `RUST_LOG` environment variable if set.
/// - Falls back to `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| config::LogLevel::parse(&s))
        .map(tracing::Level::from)
        .unwrap_or(tracing::Level::INFO);
    init_tracing_with(level);
}

/// Initialize tracing at a fixed level. Later calls are no-ops.
pub fn init_tracing_with(level: tracing::Level) {
    // Ignore the error if the global subscriber was already set.
    let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use scriptbot::prelude::*;`
pub mod prelude {
    // Common result/error handling
    pub use anyhow::{Context, Error, Result, anyhow, bail, ensure};

    // Serialization
    pub use serde::{Deserialize, Serialize};

    // Tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    // Timing helpers
    pub use std::time::Duration;
    pub use tokio::time::sleep;

    // External crates (namespaced) if callers want direct access
    pub use crate as scriptbot;
    pub use enigo;

    // Frequently used items
    pub use crate::executor::{
        ActionSurface, ActionTable, InputActuator, InputCatalog, Registry, Resolver, RunHandle,
        RunOptions, RunState, Scheduler, SemanticType, Value,
    };
    pub use crate::script::{Program, parse};
    pub use crate::{config, executor, script, sources, utils};
}
