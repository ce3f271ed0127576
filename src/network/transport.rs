//! Framed TCP Transport
//!
//! Async server and client over tokio. Each socket gets a receive loop that
//! reassembles frames from arbitrary read chunks and a send loop draining a
//! bounded outbound queue. All traffic reaches the tick loop as
//! [`TransportEvent`]s on one channel; the tick loop talks back through
//! handles. The server's connection table is owned by its accept loop.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tracing::{debug, error, info, instrument, warn};

use super::frame::{BinaryMessage, FrameDecoder, FrameError, DEFAULT_MAX_FRAME_LEN};

// =============================================================================
// IDS / CONFIG / ERRORS
// =============================================================================

/// Opaque per-connection identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

impl ClientId {
    fn next() -> Self {
        ClientId(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-connection transport limits.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Largest accepted payload
    pub max_frame_len: usize,
    /// Outbound frames buffered per connection
    pub queue_capacity: usize,
    /// Socket read buffer size
    pub read_chunk: usize,
    /// Disconnect a peer silent for this long
    pub idle_timeout: Duration,
    /// Inbound event channel capacity
    pub event_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            queue_capacity: 256,
            read_chunk: 4096,
            idle_timeout: Duration::from_secs(10),
            event_capacity: 1024,
        }
    }
}

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection's send side is gone.
    #[error("outbound queue closed")]
    QueueClosed,

    /// Queue full of frames that may not be dropped.
    #[error("outbound queue full")]
    QueueFull,

    /// The accept loop has stopped.
    #[error("server stopped")]
    ServerStopped,
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Peer closed the stream
    Closed,
    /// Socket error
    Io(String),
    /// Unrecoverable framing error
    Malformed(FrameError),
    /// Nothing received within the idle timeout
    IdleTimeout,
    /// Closed locally
    Stopped,
    /// Peer could not keep up with reliable traffic
    SlowPeer,
}

/// Everything the tick loop hears from the transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connected { client: ClientId, addr: SocketAddr },
    Message { client: ClientId, frame: BinaryMessage },
    Disconnected { client: ClientId, reason: DisconnectReason },
}

/// Receiving end of the event channel.
pub type EventReceiver = mpsc::Receiver<TransportEvent>;

// =============================================================================
// OUTBOUND QUEUE
// =============================================================================

/// Result of queueing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued without loss
    Queued,
    /// Queue was full; the oldest snapshot frame was dropped
    DroppedOldest,
    /// Queue was full of reliable frames; this snapshot was dropped
    DroppedIncoming,
}

#[derive(Debug, Default)]
struct QueueInner {
    frames: VecDeque<BinaryMessage>,
    closed: bool,
}

/// Bounded per-connection send queue.
///
/// Snapshot frames supersede each other, so when full the oldest snapshot
/// is evicted. A reliable frame that finds no snapshot to evict is refused.
#[derive(Debug)]
pub struct OutboundQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
}

impl OutboundQueue {
    /// Queue holding at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a frame for sending.
    pub fn push(&self, frame: BinaryMessage) -> Result<PushOutcome, TransportError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(TransportError::QueueClosed);
        }

        let mut outcome = PushOutcome::Queued;
        if inner.frames.len() >= self.capacity {
            let oldest_snapshot = inner
                .frames
                .iter()
                .position(|f| f.message_type.is_snapshot());
            match oldest_snapshot {
                Some(i) => {
                    inner.frames.remove(i);
                    outcome = PushOutcome::DroppedOldest;
                }
                None if frame.message_type.is_snapshot() => return Ok(PushOutcome::DroppedIncoming),
                None => return Err(TransportError::QueueFull),
            }
        }

        inner.frames.push_back(frame);
        drop(inner);
        self.notify.notify_one();
        Ok(outcome)
    }

    /// Wait for the next frame. `None` once closed and drained.
    pub async fn pop(&self) -> Option<BinaryMessage> {
        loop {
            {
                let mut inner = self.lock();
                if let Some(frame) = inner.frames.pop_front() {
                    return Some(frame);
                }
                if inner.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Refuse further frames and wake the sender.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    /// Frames waiting.
    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    /// True if nothing waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Fires the disconnect event exactly once per connection.
struct DisconnectGuard {
    client: ClientId,
    fired: AtomicBool,
    events: mpsc::Sender<TransportEvent>,
    closed: Option<mpsc::UnboundedSender<ClientId>>,
}

impl DisconnectGuard {
    async fn fire(&self, reason: DisconnectReason) {
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(client = %self.client, ?reason, "Connection closed");
        if let Some(closed) = &self.closed {
            let _ = closed.send(self.client);
        }
        let _ = self
            .events
            .send(TransportEvent::Disconnected {
                client: self.client,
                reason,
            })
            .await;
    }
}

/// Tick-loop side of one connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    client: ClientId,
    addr: SocketAddr,
    queue: Arc<OutboundQueue>,
    stop: Arc<watch::Sender<bool>>,
}

impl ConnectionHandle {
    /// Connection id.
    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Peer address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queue a frame (fire-and-forget).
    pub fn send(&self, frame: BinaryMessage) -> Result<PushOutcome, TransportError> {
        self.queue.push(frame)
    }

    /// Ask both loops to stop; the disconnect event follows.
    pub fn close(&self) {
        self.stop.send_replace(true);
        self.queue.close();
    }

    /// True until the connection is stopped.
    pub fn is_open(&self) -> bool {
        !*self.stop.borrow()
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("client", &self.client)
            .field("addr", &self.addr)
            .field("queued", &self.queue.len())
            .finish()
    }
}

/// Spawn the receive and send loops for an accepted or dialed socket.
fn spawn_connection(
    client: ClientId,
    stream: TcpStream,
    addr: SocketAddr,
    config: &TransportConfig,
    events: mpsc::Sender<TransportEvent>,
    closed: Option<mpsc::UnboundedSender<ClientId>>,
) -> ConnectionHandle {
    let _ = stream.set_nodelay(true);
    let (read_half, write_half) = stream.into_split();
    let queue = Arc::new(OutboundQueue::new(config.queue_capacity));
    let (stop_tx, stop_rx) = watch::channel(false);
    let stop = Arc::new(stop_tx);
    let guard = Arc::new(DisconnectGuard {
        client,
        fired: AtomicBool::new(false),
        events: events.clone(),
        closed,
    });

    let handle = ConnectionHandle {
        client,
        addr,
        queue: queue.clone(),
        stop: stop.clone(),
    };

    // Receive loop
    {
        let handle = handle.clone();
        let guard = guard.clone();
        let config = config.clone();
        let stop_rx = stop_rx.clone();
        tokio::spawn(async move {
            let reason = receive_loop(client, read_half, &config, &events, stop_rx).await;
            handle.close();
            guard.fire(reason).await;
        });
    }

    // Send loop
    {
        let handle = handle.clone();
        tokio::spawn(async move {
            let reason = send_loop(write_half, &queue, stop_rx).await;
            handle.close();
            if let Some(reason) = reason {
                guard.fire(reason).await;
            }
        });
    }

    handle
}

/// Read, reassemble and forward frames until stopped or broken.
async fn receive_loop(
    client: ClientId,
    mut socket: OwnedReadHalf,
    config: &TransportConfig,
    events: &mpsc::Sender<TransportEvent>,
    mut stop: watch::Receiver<bool>,
) -> DisconnectReason {
    let mut decoder = FrameDecoder::new(config.max_frame_len);
    let mut chunk = vec![0u8; config.read_chunk.max(64)];

    loop {
        let read = tokio::select! {
            _ = stop.changed() => return DisconnectReason::Stopped,
            read = tokio::time::timeout(config.idle_timeout, socket.read(&mut chunk)) => read,
        };

        let n = match read {
            Err(_) => return DisconnectReason::IdleTimeout,
            Ok(Ok(0)) => return DisconnectReason::Closed,
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return DisconnectReason::Io(e.to_string()),
        };

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(%client, bytes = %hex::encode(&chunk[..n]), "rx");

        decoder.extend(&chunk[..n]);
        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => {
                    if events.send(TransportEvent::Message { client, frame }).await.is_err() {
                        return DisconnectReason::Stopped;
                    }
                }
                Ok(None) => break,
                Err(e) if e.is_fatal() => {
                    warn!(%client, error = %e, "Dropping connection on malformed frame");
                    return DisconnectReason::Malformed(e);
                }
                Err(e) => {
                    warn!(%client, error = %e, "Discarded malformed frame");
                }
            }
        }
    }
}

/// Drain the outbound queue onto the socket. `None` on a local stop.
async fn send_loop(
    mut socket: OwnedWriteHalf,
    queue: &OutboundQueue,
    mut stop: watch::Receiver<bool>,
) -> Option<DisconnectReason> {
    let reason = loop {
        let frame = tokio::select! {
            _ = stop.changed() => break None,
            frame = queue.pop() => frame,
        };
        let frame = match frame {
            Some(f) => f,
            None => break None,
        };
        if let Err(e) = socket.write_all(&frame.encode()).await {
            break Some(DisconnectReason::Io(e.to_string()));
        }
    };
    let _ = socket.shutdown().await;
    reason
}

// =============================================================================
// SERVER
// =============================================================================

enum ServerCommand {
    Send { client: ClientId, frame: BinaryMessage },
    Broadcast { frame: BinaryMessage, except: Option<ClientId> },
    Disconnect { client: ClientId },
}

/// Tick-loop side of a running server.
#[derive(Clone, Debug)]
pub struct ServerHandle {
    commands: mpsc::UnboundedSender<ServerCommand>,
    shutdown: broadcast::Sender<()>,
    local_addr: SocketAddr,
}

impl fmt::Debug for ServerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerCommand::Send { client, frame } => write!(f, "Send({client}, {})", frame.message_type),
            ServerCommand::Broadcast { frame, .. } => write!(f, "Broadcast({})", frame.message_type),
            ServerCommand::Disconnect { client } => write!(f, "Disconnect({client})"),
        }
    }
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send one frame to one client.
    pub fn send(&self, client: ClientId, frame: BinaryMessage) -> Result<(), TransportError> {
        self.command(ServerCommand::Send { client, frame })
    }

    /// Send one frame to every client.
    pub fn broadcast(&self, frame: BinaryMessage) -> Result<(), TransportError> {
        self.command(ServerCommand::Broadcast { frame, except: None })
    }

    /// Send one frame to every client but one.
    pub fn broadcast_except(&self, frame: BinaryMessage, except: ClientId) -> Result<(), TransportError> {
        self.command(ServerCommand::Broadcast {
            frame,
            except: Some(except),
        })
    }

    /// Close a client's connection.
    pub fn disconnect(&self, client: ClientId) -> Result<(), TransportError> {
        self.command(ServerCommand::Disconnect { client })
    }

    /// Stop accepting and close every connection.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    fn command(&self, cmd: ServerCommand) -> Result<(), TransportError> {
        self.commands.send(cmd).map_err(|_| TransportError::ServerStopped)
    }
}

/// Framed TCP server.
pub struct TcpServer {
    listener: TcpListener,
    config: TransportConfig,
    max_connections: usize,
}

impl TcpServer {
    /// Bind the listener.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        config: TransportConfig,
        max_connections: usize,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            config,
            max_connections,
        })
    }

    /// Bound address.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Spawn the accept loop.
    pub fn start(self) -> Result<(ServerHandle, EventReceiver), TransportError> {
        let local_addr = self.listener.local_addr()?;
        let (event_tx, event_rx) = mpsc::channel(self.config.event_capacity.max(1));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);

        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(self.run(event_tx, command_rx, shutdown_rx));

        let handle = ServerHandle {
            commands: command_tx,
            shutdown: shutdown_tx,
            local_addr,
        };
        Ok((handle, event_rx))
    }

    /// Accept loop: owns the connection table.
    #[instrument(skip_all, fields(addr = ?self.listener.local_addr().ok()))]
    async fn run(
        self,
        events: mpsc::Sender<TransportEvent>,
        mut commands: mpsc::UnboundedReceiver<ServerCommand>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
        let mut connections: BTreeMap<ClientId, ConnectionHandle> = BTreeMap::new();
        info!("Server accepting connections");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if connections.len() >= self.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            let client = ClientId::next();
                            info!(%client, %addr, "New connection");
                            // Connected must be queued before the receive loop can emit anything
                            if events.send(TransportEvent::Connected { client, addr }).await.is_err() {
                                break;
                            }
                            let handle = spawn_connection(
                                client,
                                stream,
                                addr,
                                &self.config,
                                events.clone(),
                                Some(closed_tx.clone()),
                            );
                            connections.insert(client, handle);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                Some(client) = closed_rx.recv() => {
                    connections.remove(&client);
                }
                command = commands.recv() => {
                    match command {
                        Some(command) => Self::execute(&mut connections, command),
                        None => break,
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        for handle in connections.values() {
            handle.close();
        }
    }

    fn execute(connections: &mut BTreeMap<ClientId, ConnectionHandle>, command: ServerCommand) {
        match command {
            ServerCommand::Send { client, frame } => {
                if let Some(handle) = connections.get(&client) {
                    Self::deliver(handle, frame);
                } else {
                    debug!(%client, "Send to unknown client dropped");
                }
            }
            ServerCommand::Broadcast { frame, except } => {
                for (client, handle) in connections.iter() {
                    if Some(*client) != except {
                        Self::deliver(handle, frame.clone());
                    }
                }
            }
            ServerCommand::Disconnect { client } => {
                if let Some(handle) = connections.get(&client) {
                    handle.close();
                }
            }
        }
    }

    fn deliver(handle: &ConnectionHandle, frame: BinaryMessage) {
        match handle.send(frame) {
            Ok(PushOutcome::Queued) => {}
            Ok(outcome) => debug!(client = %handle.client(), ?outcome, "Dropped outbound snapshot"),
            Err(TransportError::QueueFull) => {
                warn!(client = %handle.client(), "Outbound queue full, disconnecting slow peer");
                handle.close();
            }
            Err(_) => {}
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// Framed TCP client.
pub struct TcpClient;

impl TcpClient {
    /// Dial a server and start the connection loops.
    ///
    /// The returned receiver yields `Connected` first.
    pub async fn connect(
        addr: impl ToSocketAddrs,
        config: TransportConfig,
    ) -> Result<(ConnectionHandle, EventReceiver), TransportError> {
        let stream = TcpStream::connect(addr).await?;
        let peer = stream.peer_addr()?;
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        let client = ClientId(0);

        event_tx
            .send(TransportEvent::Connected { client, addr: peer })
            .await
            .map_err(|_| TransportError::QueueClosed)?;
        let handle = spawn_connection(client, stream, peer, &config, event_tx, None);
        info!(%peer, "Connected to server");
        Ok((handle, event_rx))
    }
}

// =============================================================================
// TESTS
// =============================================================================
