/*!
Script sources.

A source produces complete script texts and pushes them into a channel. The
consumer parses each text and (re)starts the run, so a source that emits more
than once drives a restart per emission.

- `file.rs`         -> `FileSource`  (read a script file once, or poll it for changes)
- `stdin_source.rs` -> `StdinSource` (read one script from standard input until EOF)

Each source implementation is responsible for:
- Pushing texts via `Sender<String>` while respecting backpressure (`send().await`)
- Logging errors and continuing (never panicking inside tasks)
- Ending cleanly when the channel closes
*/

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::info;

pub mod file;
pub mod stdin_source;

pub use file::FileSource;
pub use stdin_source::StdinSource;

/// Trait implemented by all script sources.
pub trait ScriptSource: Send + Sync {
    /// Static human-readable identifier (used in logs).
    fn name(&self) -> &'static str;

    /// Start the source in the background.
    fn start(&self, sender: Sender<String>) -> JoinHandle<()>;
}

/// Spawn `source`, logging its start.
pub fn spawn_source(source: &dyn ScriptSource, sender: Sender<String>) -> JoinHandle<()> {
    info!(
        target: "scriptbot::sources",
        source = %source.name(),
        "Starting script source"
    );
    source.start(sender)
}
