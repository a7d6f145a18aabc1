use anyhow::Result;
use tracing::{debug, warn};

/// Look up a top-level window whose title contains the given substring.
///
/// Returns:
/// - Ok(Some(handle)) for the first matching window.
/// - Ok(None) if nothing matches (or on unsupported platforms).
/// - Err(_) only for unexpected internal errors.
///
/// Only the interface is wired up; no platform backend is linked yet, so every
/// platform currently reports "not found".
pub fn find_window(title_contains: &str) -> Result<Option<isize>> {
    debug!(target: "scriptbot::window", %title_contains, "find_window requested");
    find_window_impl(title_contains)
}

/// Bring the window identified by `handle` to the foreground.
/// Returns Ok(false) when the window could not be focused.
pub fn focus_handle(handle: isize) -> Result<bool> {
    debug!(target: "scriptbot::window", handle, "focus_handle requested");
    if handle == 0 {
        return Ok(false);
    }
    focus_handle_impl(handle)
}

/// Focus the first window whose title contains `title_contains`.
pub fn focus_window(title_contains: &str) -> Result<bool> {
    match find_window(title_contains)? {
        Some(handle) => focus_handle(handle),
        None => Ok(false),
    }
}

#[cfg(windows)]
fn find_window_impl(title_contains: &str) -> Result<Option<isize>> {
    warn!(
        target: "scriptbot::window",
        %title_contains,
        "find_window has no Win32 backend yet; returning None"
    );
    Ok(None)
}

#[cfg(windows)]
fn focus_handle_impl(handle: isize) -> Result<bool> {
    warn!(
        target: "scriptbot::window",
        handle,
        "focus_handle has no Win32 backend yet; returning Ok(false)"
    );
    Ok(false)
}

#[cfg(not(windows))]
fn find_window_impl(_title_contains: &str) -> Result<Option<isize>> {
    warn!(
        target: "scriptbot::window",
        "find_window is not supported on this platform; returning None"
    );
    Ok(None)
}

#[cfg(not(windows))]
fn focus_handle_impl(_handle: isize) -> Result<bool> {
    warn!(
        target: "scriptbot::window",
        "focus_handle is not supported on this platform; returning Ok(false)"
    );
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle_is_never_focused() {
        assert!(!focus_handle(0).unwrap());
    }

    #[test]
    fn test_unknown_title_is_not_found() {
        assert!(!focus_window("no such window title").unwrap());
    }
}
