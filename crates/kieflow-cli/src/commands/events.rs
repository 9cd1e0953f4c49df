//! `--events`: batch progress as JSON lines on stdout.

use std::sync::Arc;

use kieflow::kie::{BatchEvent, BroadcastProgress};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 256;

pub fn event_line(event: &BatchEvent) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

/// Creates the broadcast reporter and a task printing everything it sends.
///
/// The task ends once the reporter (and with it the sender) is dropped.
pub fn spawn_printer() -> (BroadcastProgress, JoinHandle<()>) {
    let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
    let reporter = BroadcastProgress::new(Arc::new(sender));
    let mut rx = reporter.subscribe();

    let handle = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match event_line(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => log::warn!("Failed to serialize batch event: {}", e),
                },
                Err(RecvError::Lagged(n)) => {
                    log::warn!("Event printer lagged, missed {} events", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    (reporter, handle)
}
