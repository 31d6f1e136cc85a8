//! Mail drop watcher.
//!
//! The OS watcher runs its callback on its own thread; the callback only
//! forwards results into two channels (events, errors). A tokio task consumes
//! both and hands the path of every new entry to the caller's handler.
//!
//! The loop has no reconnect logic: if either channel closes, the loop ends
//! with [`LookoutError::WatcherClosed`] and the process is expected to exit.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, trace};

use crate::error::{LookoutError, Result};

/// A running watch on one directory. Dropping it stops the OS watcher.
pub struct MailDropWatcher {
    _watcher: RecommendedWatcher,
    events_loop: JoinHandle<Result<()>>,
}

impl MailDropWatcher {
    /// Start watching `dir` (non-recursively) and call `on_create` with the
    /// path of every created entry.
    ///
    /// Must be called from within a tokio runtime. Fails if the watcher cannot
    /// be created or `dir` cannot be registered.
    pub fn start<F>(dir: &Path, on_create: F) -> Result<Self>
    where
        F: Fn(PathBuf) + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
        let (error_tx, error_rx) = mpsc::unbounded_channel::<notify::Error>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // Send only fails once the loop is gone; nothing left to do then.
                let _ = match res {
                    Ok(event) => event_tx.send(event).map_err(drop),
                    Err(e) => error_tx.send(e).map_err(drop),
                };
            },
            notify::Config::default(),
        )
        .inspect_err(|e| {
            error!(tag = "watcher_creation_failed", error = %e, "failed to create watcher");
        })?;

        let events_loop = tokio::spawn(watch_loop(event_rx, error_rx, on_create));

        if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
            error!(
                tag = "watcher_add_failed",
                path = %dir.display(),
                error = %e,
                "failed to watch mail drop: is the directory mounted correctly?"
            );
            events_loop.abort();
            return Err(e.into());
        }
        info!(path = %dir.display(), "watching mail drop");

        Ok(Self {
            _watcher: watcher,
            events_loop,
        })
    }

    /// Wait for the watch loop. Only returns when the loop hit a fatal fault.
    pub async fn run(self) -> Result<()> {
        let Self {
            _watcher,
            events_loop,
        } = self;
        match events_loop.await {
            Ok(result) => result,
            Err(e) => {
                error!(tag = "watcher_closed", error = %e, "watch loop task failed");
                Err(LookoutError::WatcherClosed { channel: "task" })
            }
        }
    }
}

async fn watch_loop<F>(
    mut events: mpsc::UnboundedReceiver<Event>,
    mut errors: mpsc::UnboundedReceiver<notify::Error>,
    on_create: F,
) -> Result<()>
where
    F: Fn(PathBuf),
{
    loop {
        tokio::select! {
            err = errors.recv() => match err {
                Some(e) => error!(tag = "watcher_error", error = %e, "watcher error"),
                None => {
                    error!(tag = "watcher_closed", channel = "errors", "watcher closed unexpectedly");
                    return Err(LookoutError::WatcherClosed { channel: "errors" });
                }
            },
            event = events.recv() => match event {
                Some(event) => {
                    for path in &event.paths {
                        trace!(
                            tag = "watcher_event",
                            name = %path.display(),
                            kind = ?event.kind,
                            "watcher got new event"
                        );
                    }
                    if is_arrival(&event.kind) {
                        for path in event.paths {
                            on_create(path);
                        }
                    }
                }
                None => {
                    error!(tag = "watcher_closed", channel = "events", "watcher closed unexpectedly");
                    return Err(LookoutError::WatcherClosed { channel: "events" });
                }
            },
        }
    }
}

/// A new entry appeared: created in place, or renamed into the directory.
///
/// Every backend reports the destination of a rename as `RenameMode::To`;
/// inotify follows it with a `Both` event for the same move, which is skipped
/// so a file is handled once.
fn is_arrival(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    )
}
