//! Shipyard Ops: poll-based container log tailing.

#![forbid(unsafe_code)]

use std::time::Duration;

use tokio::sync::oneshot;
use tracing::info;

pub mod line;
pub mod pod;
pub mod stream;

pub use line::{deduplicate, parse_line, Deduplicated, LogLine};
pub use pod::PodLogs;
pub use stream::{ContainerLogStream, StreamState, DEFAULT_LINE_LIMIT};

/// Cancellation handle for a running `follow`.
#[derive(Debug)]
pub struct CancelHandle {
    tx: Option<oneshot::Sender<()>>,
}

/// A handle and the receiver `follow` waits on.
pub fn cancel_pair() -> (CancelHandle, oneshot::Receiver<()>) {
    let (tx, rx) = oneshot::channel();
    (CancelHandle { tx: Some(tx) }, rx)
}

impl CancelHandle {
    pub fn cancel(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Sync and print new lines every `interval` until cancelled (or the handle is dropped).
pub async fn follow(logs: &mut PodLogs, interval: Duration, mut cancel_rx: oneshot::Receiver<()>) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = &mut cancel_rx => { info!(pod = %logs.pod(), "log follow cancelled"); break; }
            _ = tick.tick() => {
                logs.sync().await;
                logs.print_latest();
            }
        }
    }
}
