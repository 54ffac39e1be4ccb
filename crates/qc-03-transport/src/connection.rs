//! # Peer Connection
//!
//! Duplex pumps over one websocket. The read task forwards frames onto the
//! received queue; the write task drains the to-send queue with a bounded
//! per-write deadline. Whichever pump exits first stops the other, and the
//! read task always reports the departure.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, trace, warn};

/// Deadline for a single frame write.
pub const WRITE_WAIT: Duration = Duration::from_secs(30);

/// Rank assigned to fresh connections.
pub const DEFAULT_PEER_RANK: i32 = 100;

/// Registry-local connection id; distinguishes reconnects from the same address.
pub type ConnectionId = u64;

/// Diagnostic description of a live peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub address: String,
    pub rank: i32,
    /// Unix seconds at connect.
    pub last_seen: u64,
    /// Dialed by this node rather than accepted.
    pub outbound: bool,
}

/// The registry's side of a live connection.
///
/// Dropping it (or calling [`close`](Self::close)) stops both pumps.
#[derive(Debug)]
pub struct PeerConnection {
    id: ConnectionId,
    info: PeerInfo,
    to_send: mpsc::UnboundedSender<Vec<u8>>,
    closing: watch::Sender<bool>,
}

impl PeerConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn info(&self) -> &PeerInfo {
        &self.info
    }

    /// Queue a frame. Returns false once the write task has stopped.
    pub fn send(&self, frame: Vec<u8>) -> bool {
        self.to_send.send(frame).is_ok()
    }

    /// Sender for the to-send queue.
    pub fn outbox(&self) -> mpsc::UnboundedSender<Vec<u8>> {
        self.to_send.clone()
    }

    /// Ask both pumps to stop; the write task sends a close frame first.
    pub fn close(&self) {
        let _ = self.closing.send(true);
    }
}

/// Read-task notice that a connection is gone.
#[derive(Debug)]
pub(crate) struct Departure {
    pub id: ConnectionId,
    pub address: String,
}

/// A connection whose pumps are running but not yet admitted.
pub(crate) struct Opened {
    pub connection: PeerConnection,
    pub received: mpsc::UnboundedReceiver<Vec<u8>>,
    /// Fired by the registry once the peer is registered; reading starts then,
    /// so a departure can never overtake its own arrival.
    pub ready: oneshot::Sender<()>,
}

/// Split the socket and start both pumps.
pub(crate) fn open<S>(
    socket: WebSocketStream<S>,
    id: ConnectionId,
    address: String,
    outbound: bool,
    leave: mpsc::UnboundedSender<Departure>,
) -> Opened
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = socket.split();
    let (to_send_tx, to_send_rx) = mpsc::unbounded_channel();
    let (received_tx, received_rx) = mpsc::unbounded_channel();
    let (closing_tx, closing_rx) = watch::channel(false);
    let (ready_tx, ready_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel();
    let (writer_done_tx, writer_done_rx) = oneshot::channel();

    tokio::spawn(read_pump(
        stream,
        ReadContext {
            id,
            address: address.clone(),
            ready: ready_rx,
            received: received_tx,
            closing: closing_rx.clone(),
            stop_writer: stop_tx,
            writer_done: writer_done_rx,
            leave,
        },
    ));
    tokio::spawn(write_pump(
        sink,
        WriteContext {
            address: address.clone(),
            to_send: to_send_rx,
            stop: stop_rx,
            closing: closing_rx,
            done: writer_done_tx,
        },
    ));

    Opened {
        connection: PeerConnection {
            id,
            info: PeerInfo {
                address,
                rank: DEFAULT_PEER_RANK,
                last_seen: now(),
                outbound,
            },
            to_send: to_send_tx,
            closing: closing_tx,
        },
        received: received_rx,
        ready: ready_tx,
    }
}

struct ReadContext {
    id: ConnectionId,
    address: String,
    ready: oneshot::Receiver<()>,
    received: mpsc::UnboundedSender<Vec<u8>>,
    closing: watch::Receiver<bool>,
    stop_writer: oneshot::Sender<()>,
    writer_done: oneshot::Receiver<()>,
    leave: mpsc::UnboundedSender<Departure>,
}

struct WriteContext {
    address: String,
    to_send: mpsc::UnboundedReceiver<Vec<u8>>,
    stop: oneshot::Receiver<()>,
    closing: watch::Receiver<bool>,
    /// Fired (or dropped) when the write task ends.
    done: oneshot::Sender<()>,
}

async fn read_pump<S>(mut stream: SplitStream<WebSocketStream<S>>, ctx: ReadContext)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ReadContext {
        id,
        address,
        ready,
        received,
        mut closing,
        stop_writer,
        mut writer_done,
        leave,
    } = ctx;

    if ready.await.is_ok() {
        loop {
            tokio::select! {
                next = stream.next() => match next {
                    Some(Ok(Message::Text(text))) => {
                        trace!(peer = %address, bytes = text.len(), "[qc-03] frame received");
                        if received.send(text.as_bytes().to_vec()).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        trace!(peer = %address, bytes = data.len(), "[qc-03] frame received");
                        if received.send(data.to_vec()).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(peer = %address, "[qc-03] peer closed connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(peer = %address, error = %e, "[qc-03] read failed");
                        break;
                    }
                },
                _ = closing.changed() => break,
                _ = &mut writer_done => {
                    debug!(peer = %address, "[qc-03] write task gone, closing connection");
                    break;
                }
                _ = received.closed() => {
                    debug!(peer = %address, "[qc-03] handler gone, closing connection");
                    break;
                }
            }
        }
    }

    let _ = stop_writer.send(());
    let _ = leave.send(Departure { id, address });
}

async fn write_pump<S>(mut sink: SplitSink<WebSocketStream<S>, Message>, ctx: WriteContext)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let WriteContext {
        address,
        mut to_send,
        mut stop,
        mut closing,
        done,
    } = ctx;

    loop {
        tokio::select! {
            frame = to_send.recv() => match frame {
                Some(frame) => {
                    trace!(peer = %address, bytes = frame.len(), "[qc-03] writing frame");
                    match timeout(WRITE_WAIT, sink.send(to_message(frame))).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            debug!(peer = %address, error = %e, "[qc-03] write failed");
                            break;
                        }
                        Err(_) => {
                            warn!(peer = %address, "[qc-03] write deadline exceeded");
                            break;
                        }
                    }
                }
                None => break,
            },
            _ = &mut stop => break,
            _ = closing.changed() => break,
        }
    }

    let _ = done.send(());
    let _ = timeout(WRITE_WAIT, sink.close()).await;
    debug!(peer = %address, "[qc-03] write task stopped");
}

fn to_message(frame: Vec<u8>) -> Message {
    match String::from_utf8(frame) {
        Ok(text) => Message::Text(text.into()),
        Err(e) => Message::Binary(e.into_bytes().into()),
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
