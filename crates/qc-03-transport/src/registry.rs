//! # Peer Registry
//!
//! One task owns the address → connection map. Joins, departures, fan-out
//! and snapshots are all serialized through it, so no lock guards the map.

use crate::connection::{open, ConnectionId, Departure, Opened, PeerConnection, PeerInfo};
use crate::errors::TransportError;
use crate::ports::FrameHandler;
use crate::supervisor::supervise;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{accept_async, connect_async, WebSocketStream};
use tracing::{debug, info, warn};

/// Pause after a failed accept before trying again.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

type Fanout = (Option<String>, Vec<u8>);

/// Source of inbound TCP streams for [`RegistryHandle::serve`].
pub(crate) trait Incoming: Send {
    fn next_peer(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Incoming for TcpListener {
    fn next_peer(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        self.accept()
    }
}

enum Control {
    Peers(oneshot::Sender<Vec<PeerInfo>>),
    Shutdown,
}

/// Cloneable front door to the registry task.
#[derive(Clone)]
pub struct RegistryHandle {
    join: mpsc::UnboundedSender<Opened>,
    leave: mpsc::UnboundedSender<Departure>,
    fanout: mpsc::UnboundedSender<Fanout>,
    control: mpsc::UnboundedSender<Control>,
    next_id: Arc<AtomicU64>,
}

/// The registry task state.
pub struct Registry {
    handler: Arc<dyn FrameHandler>,
    connections: HashMap<String, PeerConnection>,
    join_rx: mpsc::UnboundedReceiver<Opened>,
    leave_rx: mpsc::UnboundedReceiver<Departure>,
    fanout_rx: mpsc::UnboundedReceiver<Fanout>,
    control_rx: mpsc::UnboundedReceiver<Control>,
}

impl Registry {
    /// Spawn the registry task.
    ///
    /// The task stops on [`RegistryHandle::shutdown`] or once every handle is
    /// dropped, closing all connections on the way out.
    pub fn start(handler: Arc<dyn FrameHandler>) -> (RegistryHandle, JoinHandle<()>) {
        let (join, join_rx) = mpsc::unbounded_channel();
        let (leave, leave_rx) = mpsc::unbounded_channel();
        let (fanout, fanout_rx) = mpsc::unbounded_channel();
        let (control, control_rx) = mpsc::unbounded_channel();

        let registry = Registry {
            handler,
            connections: HashMap::new(),
            join_rx,
            leave_rx,
            fanout_rx,
            control_rx,
        };
        let task = tokio::spawn(registry.run());

        let handle = RegistryHandle {
            join,
            leave,
            fanout,
            control,
            next_id: Arc::new(AtomicU64::new(1)),
        };
        (handle, task)
    }

    async fn run(mut self) {
        info!("[qc-03] peer registry started");

        loop {
            tokio::select! {
                Some(opened) = self.join_rx.recv() => self.on_join(opened),
                Some(departure) = self.leave_rx.recv() => self.on_leave(departure),
                Some((exclude, frame)) = self.fanout_rx.recv() => {
                    self.on_fanout(exclude.as_deref(), frame)
                }
                command = self.control_rx.recv() => match command {
                    Some(Control::Peers(reply)) => {
                        let _ = reply.send(self.snapshot());
                    }
                    Some(Control::Shutdown) | None => break,
                },
            }
        }

        for (_, connection) in self.connections.drain() {
            connection.close();
        }
        info!("[qc-03] peer registry stopped");
    }

    fn on_join(&mut self, opened: Opened) {
        let Opened {
            connection,
            received,
            ready,
        } = opened;
        let address = connection.info().address.clone();

        tokio::spawn(supervise(
            Arc::clone(&self.handler),
            address.clone(),
            received,
            connection.outbox(),
        ));

        if let Some(previous) = self.connections.insert(address.clone(), connection) {
            debug!(peer = %address, "[qc-03] replacing existing connection");
            previous.close();
        }
        let _ = ready.send(());

        info!(peer = %address, peers = self.connections.len(), "[qc-03] ✓ peer joined");
    }

    fn on_leave(&mut self, departure: Departure) {
        let Departure { id, address } = departure;
        if !self.is_current(&address, id) {
            return;
        }
        if let Some(connection) = self.connections.remove(&address) {
            connection.close();
        }
        info!(peer = %address, peers = self.connections.len(), "[qc-03] peer left");
    }

    fn on_fanout(&self, exclude: Option<&str>, frame: Vec<u8>) {
        for (address, connection) in &self.connections {
            if exclude == Some(address.as_str()) {
                continue;
            }
            if !connection.send(frame.clone()) {
                debug!(peer = %address, "[qc-03] fan-out to stopped connection");
            }
        }
    }

    fn is_current(&self, address: &str, id: ConnectionId) -> bool {
        self.connections.get(address).map(PeerConnection::id) == Some(id)
    }

    fn snapshot(&self) -> Vec<PeerInfo> {
        let mut peers: Vec<PeerInfo> = self
            .connections
            .values()
            .map(|c| c.info().clone())
            .collect();
        peers.sort_by(|a, b| a.address.cmp(&b.address));
        peers
    }
}

impl RegistryHandle {
    /// Dial a peer and register the connection under its URL.
    pub async fn connect(&self, url: &str) -> Result<PeerInfo, TransportError> {
        let (socket, _response) =
            connect_async(url)
                .await
                .map_err(|e| TransportError::Connect {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
        debug!(url, "[qc-03] dialed peer");
        self.admit(socket, url.to_string(), true)
    }

    /// Accept websocket peers until the registry stops.
    ///
    /// Inbound peers are registered under their remote socket address. Failed
    /// accepts are logged and retried after [`ACCEPT_RETRY_DELAY`].
    pub async fn serve(&self, listener: TcpListener) {
        if let Ok(local) = listener.local_addr() {
            info!(address = %local, "[qc-03] listening for peers");
        }
        self.accept_loop(listener).await;
    }

    pub(crate) async fn accept_loop<I: Incoming>(&self, mut incoming: I) {
        loop {
            let accepted = tokio::select! {
                accepted = incoming.next_peer() => accepted,
                _ = self.control.closed() => break,
            };
            let (stream, remote) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "[qc-03] accept failed, retrying");
                    sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
            };

            let handle = self.clone();
            tokio::spawn(async move {
                match accept_async(stream).await {
                    Ok(socket) => {
                        if let Err(e) = handle.admit(socket, remote.to_string(), false) {
                            debug!(peer = %remote, error = %e, "[qc-03] dropping inbound peer");
                        }
                    }
                    Err(e) => warn!(peer = %remote, error = %e, "[qc-03] websocket handshake failed"),
                }
            });
        }
        debug!("[qc-03] accept loop stopped");
    }

    /// Send a frame to every peer except `exclude`.
    pub fn fanout(&self, exclude: Option<&str>, frame: Vec<u8>) -> Result<(), TransportError> {
        self.fanout
            .send((exclude.map(str::to_string), frame))
            .map_err(|_| TransportError::RegistryClosed)
    }

    /// Live peers, sorted by address.
    pub async fn peers(&self) -> Result<Vec<PeerInfo>, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control::Peers(tx))
            .map_err(|_| TransportError::RegistryClosed)?;
        rx.await.map_err(|_| TransportError::RegistryClosed)
    }

    /// Stop the registry and close every connection.
    pub fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown);
    }

    pub(crate) fn admit<S>(
        &self,
        socket: WebSocketStream<S>,
        address: String,
        outbound: bool,
    ) -> Result<PeerInfo, TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let opened = open(socket, id, address, outbound, self.leave.clone());
        let info = opened.connection.info().clone();
        self.join
            .send(opened)
            .map_err(|_| TransportError::RegistryClosed)?;
        Ok(info)
    }
}
