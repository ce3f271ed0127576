//! Network Manager
//!
//! Sits between the tick loop and the transport. Outbound snapshots are
//! rate-limited; inbound snapshots are buffered and sampled a fixed delay
//! behind the newest so there is always a pair to interpolate between.
//! All times are local milliseconds supplied by the caller.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::game::input::{InputBuffer, PlayerInput};
use crate::game::object::ObjectId;
use crate::game::state::GameState;
use crate::network::message::Message;
use crate::network::transport::{
    ClientId, ConnectionHandle, EventReceiver, ServerHandle, TransportError, TransportEvent,
};

/// Default snapshot send rate (Hz).
pub const DEFAULT_SNAPSHOT_RATE: u32 = 20;

/// Default render delay behind the newest snapshot (ms).
pub const DEFAULT_INTERPOLATION_DELAY_MS: u64 = 100;

/// Default number of buffered snapshots.
pub const DEFAULT_SNAPSHOT_BUFFER: usize = 32;

/// Default heartbeat interval (ms).
pub const DEFAULT_HEARTBEAT_MS: u64 = 1_000;

// =============================================================================
// THROTTLE
// =============================================================================

/// Fixed-rate gate for outbound snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotThrottle {
    interval_ms: u64,
    last_sent: Option<u64>,
}

impl SnapshotThrottle {
    /// Gate allowing `rate_hz` sends per second. Zero disables throttling.
    pub fn new(rate_hz: u32) -> Self {
        Self {
            interval_ms: if rate_hz == 0 { 0 } else { 1_000 / rate_hz as u64 },
            last_sent: None,
        }
    }

    /// True (and the send is recorded) if enough time has passed.
    pub fn try_send(&mut self, now_ms: u64) -> bool {
        match self.last_sent {
            Some(last) if now_ms.saturating_sub(last) < self.interval_ms => false,
            _ => {
                self.last_sent = Some(now_ms);
                true
            }
        }
    }
}

// =============================================================================
// SNAPSHOT BUFFER
// =============================================================================

/// Received snapshots ordered by sequence, stamped with local receive time.
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    snapshots: VecDeque<(u64, Arc<GameState>)>,
    capacity: usize,
    delay_ms: u64,
}

impl SnapshotBuffer {
    /// Buffer keeping `capacity` snapshots, sampled `delay_ms` in the past.
    pub fn new(capacity: usize, delay_ms: u64) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(capacity.max(2)),
            capacity: capacity.max(2),
            delay_ms,
        }
    }

    /// Add a snapshot. Stale or duplicate sequences are ignored.
    pub fn push(&mut self, state: Arc<GameState>, received_ms: u64) -> bool {
        if let Some((_, newest)) = self.snapshots.back() {
            if state.sequence() <= newest.sequence() {
                debug!(
                    sequence = state.sequence(),
                    newest = newest.sequence(),
                    "Discarded stale snapshot"
                );
                return false;
            }
        }
        self.snapshots.push_back((received_ms, state));
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
        true
    }

    /// Newest snapshot.
    pub fn latest(&self) -> Option<&Arc<GameState>> {
        self.snapshots.back().map(|(_, s)| s)
    }

    /// Forget every buffered snapshot.
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Number buffered.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// State at `now_ms - delay`.
    ///
    /// Interpolates between the two snapshots bracketing the render time.
    /// Before the oldest or after the newest the nearest snapshot is
    /// returned as-is; there is no extrapolation.
    pub fn sample(&self, now_ms: u64) -> Option<GameState> {
        let render_ms = now_ms.saturating_sub(self.delay_ms);
        let (first_ms, first) = self.snapshots.front()?;
        if render_ms <= *first_ms {
            return Some(first.as_ref().clone());
        }

        for window in self.snapshots.iter().zip(self.snapshots.iter().skip(1)) {
            let ((a_ms, a), (b_ms, b)) = window;
            if render_ms <= *b_ms {
                let span = b_ms.saturating_sub(*a_ms);
                let t = if span == 0 {
                    1.0
                } else {
                    (render_ms - a_ms) as f32 / span as f32
                };
                return Some(GameState::interpolate(a, b, t));
            }
        }

        self.latest().map(|s| s.as_ref().clone())
    }
}

// =============================================================================
// MANAGER
// =============================================================================

/// Which end of the connection this process is.
#[derive(Debug, Clone)]
pub enum Link {
    Server(ServerHandle),
    Client(ConnectionHandle),
}

/// What `poll` hands back to the tick loop.
#[derive(Debug, Clone)]
pub enum Inbound {
    Connected { client: ClientId, addr: SocketAddr },
    Disconnected { client: ClientId },
    Message { client: ClientId, message: Message },
}

/// Network manager settings.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub snapshot_rate: u32,
    pub interpolation_delay_ms: u64,
    pub snapshot_buffer: usize,
    pub heartbeat_ms: u64,
    pub input_buffer: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            snapshot_rate: DEFAULT_SNAPSHOT_RATE,
            interpolation_delay_ms: DEFAULT_INTERPOLATION_DELAY_MS,
            snapshot_buffer: DEFAULT_SNAPSHOT_BUFFER,
            heartbeat_ms: DEFAULT_HEARTBEAT_MS,
            input_buffer: crate::game::input::DEFAULT_INPUT_BUFFER,
        }
    }
}

/// Tick-loop facade over one transport link.
pub struct NetworkManager {
    link: Link,
    events: EventReceiver,
    throttle: SnapshotThrottle,
    snapshots: SnapshotBuffer,
    inputs: InputBuffer,
    heartbeat_ms: u64,
    last_heartbeat: Option<u64>,
    local_tank: Option<ObjectId>,
    connected: bool,
}

impl NetworkManager {
    /// Wrap a started transport.
    pub fn new(link: Link, events: EventReceiver, config: &ManagerConfig) -> Self {
        Self {
            link,
            events,
            throttle: SnapshotThrottle::new(config.snapshot_rate),
            snapshots: SnapshotBuffer::new(config.snapshot_buffer, config.interpolation_delay_ms),
            inputs: InputBuffer::new(config.input_buffer),
            heartbeat_ms: config.heartbeat_ms,
            last_heartbeat: None,
            local_tank: None,
            connected: true,
        }
    }

    /// True on the authority side.
    pub fn is_server(&self) -> bool {
        matches!(self.link, Link::Server(_))
    }

    /// False once a client link has dropped.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Tank this client controls; used to acknowledge inputs.
    pub fn set_local_tank(&mut self, tank: Option<ObjectId>) {
        self.local_tank = tank;
    }

    /// Inputs sent but not yet reflected in a snapshot.
    pub fn pending_inputs(&self) -> impl Iterator<Item = &PlayerInput> {
        self.inputs.pending()
    }

    /// Drain transport events. Snapshots go to the buffer; everything
    /// else is returned in arrival order.
    pub fn poll(&mut self, now_ms: u64) -> Vec<Inbound> {
        let mut inbound = Vec::new();

        loop {
            let event = match self.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.connected = false;
                    break;
                }
            };

            match event {
                TransportEvent::Connected { client, addr } => {
                    inbound.push(Inbound::Connected { client, addr });
                }
                TransportEvent::Disconnected { client, reason } => {
                    debug!(%client, ?reason, "Peer gone");
                    if !self.is_server() {
                        self.connected = false;
                    }
                    inbound.push(Inbound::Disconnected { client });
                }
                TransportEvent::Message { client, frame } => match Message::decode(&frame) {
                    Ok(Message::PositionUpdate(state)) => self.receive_snapshot(state, now_ms),
                    Ok(message) => inbound.push(Inbound::Message { client, message }),
                    Err(e) => {
                        warn!(%client, message_type = %frame.message_type, error = %e, "Discarded malformed payload");
                    }
                },
            }
        }

        inbound
    }

    fn receive_snapshot(&mut self, state: Arc<GameState>, now_ms: u64) {
        if let Some(tank) = self.local_tank.and_then(|id| state.get(&id)) {
            self.inputs.acknowledge(tank.last_input_sequence);
        }
        self.snapshots.push(state, now_ms);
    }

    /// Broadcast a snapshot if the throttle allows. Returns true if sent.
    pub fn push_state(&mut self, state: Arc<GameState>, now_ms: u64) -> bool {
        if !self.throttle.try_send(now_ms) {
            return false;
        }
        match &self.link {
            Link::Server(server) => {
                self.report(server.broadcast(Message::PositionUpdate(state).encode()));
                true
            }
            Link::Client(_) => false,
        }
    }

    /// Client: record and send one input.
    pub fn send_input(&mut self, input: PlayerInput) -> Result<(), TransportError> {
        let message = Message::Movement(input.clone());
        self.inputs.push(input);
        self.send_to_server(message)
    }

    /// Client: send any message to the server.
    pub fn send_to_server(&self, message: Message) -> Result<(), TransportError> {
        match &self.link {
            Link::Client(conn) => conn.send(message.encode()).map(|_| ()),
            Link::Server(_) => Ok(()),
        }
    }

    /// Server: send to one client.
    pub fn send_to(&self, client: ClientId, message: &Message) {
        if let Link::Server(server) = &self.link {
            self.report(server.send(client, message.encode()));
        }
    }

    /// Server: send to every client, optionally skipping one.
    pub fn broadcast(&self, message: &Message, except: Option<ClientId>) {
        if let Link::Server(server) = &self.link {
            let frame = message.encode();
            let result = match except {
                Some(client) => server.broadcast_except(frame, client),
                None => server.broadcast(frame),
            };
            self.report(result);
        }
    }

    /// Send a heartbeat if one is due.
    pub fn heartbeat(&mut self, now_ms: u64) {
        let due = match self.last_heartbeat {
            Some(last) => now_ms.saturating_sub(last) >= self.heartbeat_ms,
            None => true,
        };
        if !due {
            return;
        }
        self.last_heartbeat = Some(now_ms);

        let beat = Message::HeartBeat { timestamp: now_ms };
        match &self.link {
            Link::Server(_) => self.broadcast(&beat, None),
            Link::Client(_) => {
                if let Err(e) = self.send_to_server(beat) {
                    debug!(error = %e, "Heartbeat not sent");
                }
            }
        }
    }

    /// Newest received snapshot.
    pub fn latest_state(&self) -> Option<&Arc<GameState>> {
        self.snapshots.latest()
    }

    /// Drop buffered snapshots that predate a full object list.
    pub fn clear_snapshots(&mut self) {
        self.snapshots.clear();
    }

    /// Snapshot sampled at the render delay.
    pub fn interpolated_state(&self, now_ms: u64) -> Option<GameState> {
        self.snapshots.sample(now_ms)
    }

    /// Server: drop a client.
    pub fn disconnect(&self, client: ClientId) {
        if let Link::Server(server) = &self.link {
            self.report(server.disconnect(client));
        }
    }

    /// Close the link.
    pub fn shutdown(&mut self) {
        match &self.link {
            Link::Server(server) => server.shutdown(),
            Link::Client(conn) => conn.close(),
        }
        self.connected = false;
        info!("Network link closed");
    }

    fn report(&self, result: Result<(), TransportError>) {
        if let Err(e) = result {
            warn!(error = %e, "Transport command failed");
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::props::PropertyMap;
    use crate::core::vec2::Vec2;
    use crate::game::object::{Controller, GameObject};
    use crate::network::transport::{TcpClient, TcpServer, TransportConfig};
    use std::time::Duration;

    fn snapshot(sequence: u32, tank: &GameObject, x: f32) -> Arc<GameState> {
        let mut state = tank.get_state(sequence as u64);
        state.position = Vec2::new(x, 0.0);
        Arc::new(GameState::new(
            sequence,
            sequence as u64 * 50,
            [(tank.id, state)].into_iter().collect(),
            PropertyMap::new(),
        ))
    }

    #[test]
    fn test_throttle_limits_rate() {
        let mut throttle = SnapshotThrottle::new(20);
        assert!(throttle.try_send(0));
        assert!(!throttle.try_send(10));
        assert!(!throttle.try_send(49));
        assert!(throttle.try_send(50));
        assert!(!throttle.try_send(60));
    }

    #[test]
    fn test_buffer_rejects_stale() {
        let tank = GameObject::tank(Vec2::ZERO, Controller::Input);
        let mut buffer = SnapshotBuffer::new(4, 100);
        assert!(buffer.push(snapshot(2, &tank, 0.0), 0));
        assert!(!buffer.push(snapshot(1, &tank, 0.0), 10));
        assert!(!buffer.push(snapshot(2, &tank, 0.0), 10));
        assert_eq!(buffer.len(), 1);

        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.push(snapshot(1, &tank, 0.0), 20));
    }

    #[test]
    fn test_buffer_capacity() {
        let tank = GameObject::tank(Vec2::ZERO, Controller::Input);
        let mut buffer = SnapshotBuffer::new(3, 0);
        for seq in 1..=5 {
            buffer.push(snapshot(seq, &tank, 0.0), seq as u64);
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.latest().unwrap().sequence(), 5);
    }

    #[test]
    fn test_sample_interpolates_at_render_delay() {
        let tank = GameObject::tank(Vec2::ZERO, Controller::Input);
        let mut buffer = SnapshotBuffer::new(8, 100);
        buffer.push(snapshot(1, &tank, 0.0), 1_000);
        buffer.push(snapshot(2, &tank, 10.0), 1_050);

        // render time 1_025 is halfway between the pair
        let mid = buffer.sample(1_125).unwrap();
        assert_eq!(mid.get(&tank.id).unwrap().position.x, 5.0);

        // before the oldest: oldest as-is
        let early = buffer.sample(1_000).unwrap();
        assert_eq!(early.get(&tank.id).unwrap().position.x, 0.0);

        // past the newest: newest, no extrapolation
        let late = buffer.sample(5_000).unwrap();
        assert_eq!(late.get(&tank.id).unwrap().position.x, 10.0);
    }

    #[test]
    fn test_sample_empty() {
        assert!(SnapshotBuffer::new(4, 100).sample(1_000).is_none());
    }

    async fn poll_until<F>(manager: &mut NetworkManager, now_ms: u64, mut done: F) -> Vec<Inbound>
    where
        F: FnMut(&NetworkManager, &[Inbound]) -> bool,
    {
        let mut seen = Vec::new();
        for _ in 0..200 {
            seen.extend(manager.poll(now_ms));
            if done(manager, &seen) {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached; saw {:?}", seen);
    }

    #[tokio::test]
    async fn test_snapshot_reaches_client_and_acknowledges_input() {
        let server = TcpServer::bind("127.0.0.1:0", TransportConfig::default(), 4)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let (server_handle, server_events) = server.start().unwrap();
        let mut server_net = NetworkManager::new(
            Link::Server(server_handle),
            server_events,
            &ManagerConfig::default(),
        );

        let (conn, client_events) = TcpClient::connect(addr, TransportConfig::default())
            .await
            .unwrap();
        let mut client_net = NetworkManager::new(
            Link::Client(conn),
            client_events,
            &ManagerConfig::default(),
        );

        poll_until(&mut server_net, 0, |_, seen| {
            seen.iter().any(|i| matches!(i, Inbound::Connected { .. }))
        })
        .await;

        let mut tank = GameObject::tank(Vec2::ZERO, Controller::Input);
        client_net.set_local_tank(Some(tank.id));
        client_net
            .send_input(PlayerInput::new(1, 0).with_movement(Vec2::RIGHT))
            .unwrap();
        client_net
            .send_input(PlayerInput::new(2, 0).with_movement(Vec2::RIGHT))
            .unwrap();
        assert_eq!(client_net.pending_inputs().count(), 2);

        let seen = poll_until(&mut server_net, 0, |_, seen| {
            seen.iter()
                .filter(|i| matches!(i, Inbound::Message { message: Message::Movement(_), .. }))
                .count()
                == 2
        })
        .await;
        assert!(!seen.is_empty());

        tank.last_input_sequence = 1;
        let state = Arc::new(GameState::new(
            1,
            0,
            [(tank.id, tank.get_state(0))].into_iter().collect(),
            PropertyMap::new(),
        ));
        assert!(server_net.push_state(state.clone(), 0));
        assert!(!server_net.push_state(state, 1));

        poll_until(&mut client_net, 0, |m, _| m.latest_state().is_some()).await;
        let pending: Vec<u32> = client_net.pending_inputs().map(|i| i.sequence).collect();
        assert_eq!(pending, vec![2]);

        server_net.shutdown();
    }
}
