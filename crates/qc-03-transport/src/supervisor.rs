//! # Handler Supervision
//!
//! Each connection gets a handler task that sends the greeting and then
//! drains its received queue. A panic inside the handler restarts the task on
//! the same queue after [`HANDLER_RESTART_DELAY`]; the frame being processed
//! is lost. The pumps are never touched, so the connection outlives any
//! number of panics.

use crate::ports::FrameHandler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Pause before a panicked handler task is started again.
pub const HANDLER_RESTART_DELAY: Duration = Duration::from_millis(50);

type Inbox = Arc<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>;

pub(crate) async fn supervise(
    handler: Arc<dyn FrameHandler>,
    address: String,
    received: mpsc::UnboundedReceiver<Vec<u8>>,
    replies: mpsc::UnboundedSender<Vec<u8>>,
) {
    if let Some(greeting) = handler.greeting() {
        if replies.send(greeting).is_err() {
            debug!(peer = %address, "[qc-03] connection gone before greeting");
            return;
        }
    }

    let inbox: Inbox = Arc::new(Mutex::new(received));
    let mut restarts: u64 = 0;

    loop {
        let task = tokio::spawn(pump(
            Arc::clone(&handler),
            address.clone(),
            Arc::clone(&inbox),
            replies.clone(),
        ));

        match task.await {
            Ok(()) => break,
            Err(e) if e.is_panic() => {
                restarts += 1;
                warn!(peer = %address, restarts, "[qc-03] handler panicked, restarting");
                sleep(HANDLER_RESTART_DELAY).await;
            }
            Err(_) => break,
        }
    }

    debug!(peer = %address, restarts, "[qc-03] handler task stopped");
}

async fn pump(
    handler: Arc<dyn FrameHandler>,
    address: String,
    inbox: Inbox,
    replies: mpsc::UnboundedSender<Vec<u8>>,
) {
    let mut received = inbox.lock().await;
    while let Some(frame) = received.recv().await {
        for reply in handler.handle(&address, &frame) {
            if replies.send(reply).is_err() {
                return;
            }
        }
    }
}
