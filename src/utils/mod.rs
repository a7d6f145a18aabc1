//! Utilities for scriptbot.
//!
//! Submodules:
//! - `window`: OS-specific window lookup and focus helpers (no-op on unsupported platforms).

pub mod window;
