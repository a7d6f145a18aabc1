//! Stdin script source.
//!
//! Reads standard input to EOF and dispatches the whole text as one script,
//! e.g. `printf 'TypeText=hi\n' | scriptbot -`.
//!
//! A read error is logged and nothing is dispatched.

use tokio::{
    io::{self, AsyncReadExt},
    sync::mpsc::Sender,
    task::JoinHandle,
};
use tracing::{error, info, warn};

use super::ScriptSource;

/// Source that reads one script from stdin.
#[derive(Debug, Clone, Default)]
pub struct StdinSource;

impl StdinSource {
    /// Construct a new `StdinSource`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ScriptSource for StdinSource {
    fn name(&self) -> &'static str {
        "stdin"
    }

    fn start(&self, sender: Sender<String>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut text = String::new();
            match io::stdin().read_to_string(&mut text).await {
                Ok(bytes) => {
                    info!(target: "scriptbot::sources", bytes, "Read script from stdin");
                    if let Err(e) = sender.send(text).await {
                        error!(
                            target: "scriptbot::sources",
                            error = %e,
                            "Channel closed while sending stdin script"
                        );
                    }
                }
                Err(e) => {
                    warn!(target: "scriptbot::sources", error = %e, "Error reading script from stdin");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_new() {
        let s = StdinSource::new();
        assert_eq!(s.name(), "stdin");
    }
}
