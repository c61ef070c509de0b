pub mod event;

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use tracing::{debug, info, warn};

use crate::filter::IgnorePredicate;

use event::{WatchEvent, classify_event};

/// Debounce window used when none is given.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Watch `root` and call `on_change` with each debounced batch of relevant events.
///
/// Events inside ignored paths and on `outputs` are dropped before batching, so writing
/// the export never triggers another scan. Returns when the callback fails or the
/// underlying watcher shuts down.
pub fn watch<F>(
    root: &Path,
    debounce: Duration,
    predicate: &dyn IgnorePredicate,
    outputs: &[PathBuf],
    mut on_change: F,
) -> anyhow::Result<()>
where
    F: FnMut(&[WatchEvent]) -> anyhow::Result<()>,
{
    let (tx, rx) = mpsc::channel::<DebounceEventResult>();
    let mut debouncer = new_debouncer(debounce, move |res| {
        let _ = tx.send(res);
    })?;
    debouncer.watcher().watch(root, RecursiveMode::Recursive)?;
    info!(root = %root.display(), debounce_ms = debounce.as_millis() as u64, "watching");

    while let Ok(result) = rx.recv() {
        let events = match result {
            Ok(events) => events,
            Err(err) => {
                warn!("watcher error: {err}");
                continue;
            }
        };

        let mut batch: Vec<WatchEvent> = events
            .into_iter()
            .filter_map(|e| classify_event(&e.path, root, predicate, outputs))
            .collect();
        batch.sort_by(|a, b| a.path().cmp(b.path()));
        batch.dedup();
        if batch.is_empty() {
            continue;
        }

        for event in &batch {
            debug!(?event, "change detected");
        }
        on_change(&batch)?;
    }
    Ok(())
}
