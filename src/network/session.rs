//! Match Sessions
//!
//! Glue between a `GameInstance`, its `NetworkManager` and (on the server)
//! the `Lobby`. Each `step` is one tick of the fixed-rate loop: drain the
//! network, react, simulate, replicate.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::game::engine::{GameInstance, TickResult, PHASE_LOBBY, PHASE_ROUND};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::PlayerInput;
use crate::game::state::GameState;
use crate::network::lobby::{Lobby, LobbyEvent};
use crate::network::manager::{Inbound, NetworkManager};
use crate::network::message::{Message, UserEntry};
use crate::network::transport::{ClientId, TransportError};

// =============================================================================
// SERVER
// =============================================================================

/// Authoritative multiplayer session.
pub struct ServerSession {
    engine: GameInstance,
    net: NetworkManager,
    lobby: Lobby,
    dt: f32,
}

impl ServerSession {
    /// Wrap a loaded server-role engine.
    pub fn new(engine: GameInstance, net: NetworkManager, lobby: Lobby, dt: f32) -> Self {
        Self {
            engine,
            net,
            lobby,
            dt,
        }
    }

    /// Simulation.
    pub fn engine(&self) -> &GameInstance {
        &self.engine
    }

    /// Lobby state.
    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    /// One tick.
    pub fn step(&mut self) -> TickResult {
        let now = self.engine.clock_ms();

        for inbound in self.net.poll(now) {
            self.handle(inbound);
        }

        for event in self.lobby.tick(self.dt) {
            match event {
                LobbyEvent::Countdown(seconds) => {
                    self.net.broadcast(&Message::LobbyCountdown { seconds }, None);
                }
                LobbyEvent::Cancelled => {
                    self.net.broadcast(&Message::GameMode(PHASE_LOBBY.to_string()), None);
                }
                LobbyEvent::Start => {
                    info!(players = self.lobby.len(), "Round starting");
                    self.engine.set_phase(PHASE_ROUND);
                    self.net.broadcast(&Message::GameMode(PHASE_ROUND.to_string()), None);
                }
            }
        }

        let result = self.engine.tick(self.dt);

        for event in &result.events {
            if let GameEventData::ProjectileFired { tank, .. } = event.data {
                self.net.broadcast(&Message::Fire { owner: tank }, None);
            }
        }
        if let Some(snapshot) = &result.snapshot {
            self.net.push_state(Arc::clone(snapshot), now);
        }
        self.net.heartbeat(now);

        result
    }

    fn handle(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Connected { client, addr } => self.join(client, addr),
            Inbound::Disconnected { client } => self.leave(client),
            Inbound::Message { client, message } => self.receive(client, message),
        }
    }

    fn join(&mut self, client: ClientId, addr: std::net::SocketAddr) {
        self.lobby.join(client, addr);
        let tank = self.engine.spawn_player();
        self.lobby.assign_tank(client, tank);
        self.engine
            .record_event(GameEvent::player_joined(self.engine.current_tick(), client, tank));
        info!(%client, %addr, %tank, "Player joined");

        // Joiner gets its own tank last; everyone else just learns it exists
        self.net
            .send_to(client, &Message::GameObjects(self.engine.records_with_last(Some(tank))));
        self.net.broadcast(
            &Message::GameObjects(self.engine.records_with_last(None)),
            Some(client),
        );
        self.net
            .send_to(client, &Message::GameMode(self.engine.phase().to_string()));
        self.broadcast_users();
    }

    fn leave(&mut self, client: ClientId) {
        let tank = self.lobby.leave(client).and_then(|c| c.tank);
        if let Some(tank) = tank {
            self.engine.remove_object(&tank);
        }
        self.engine
            .record_event(GameEvent::player_left(self.engine.current_tick(), client, tank));
        info!(%client, "Player left");
        self.broadcast_users();
    }

    fn receive(&mut self, client: ClientId, message: Message) {
        let tank = self.lobby.get(client).and_then(|c| c.tank);

        match message {
            Message::HeartBeat { .. } => {}
            Message::Movement(input) => {
                if let Some(tank) = tank {
                    if let Err(e) = self.engine.apply_input(&tank, &input) {
                        warn!(%client, error = %e, "Input rejected");
                    }
                }
            }
            Message::Fire { owner } => {
                if tank == Some(owner) {
                    self.engine.try_fire(&owner);
                } else {
                    warn!(%client, %owner, "Fire request for a tank the client does not own");
                }
            }
            Message::Users(entries) => {
                let ready = entries.first().is_some_and(|e| e.ready);
                if self.lobby.set_ready(client, ready) {
                    debug!(%client, ready, "Ready flag changed");
                    self.broadcast_users();
                }
            }
            other => {
                debug!(%client, message_type = %other.message_type(), "Ignored client message");
            }
        }
    }

    fn broadcast_users(&self) {
        self.net.broadcast(&Message::Users(self.lobby.users()), None);
    }

    /// Stop accepting and close every connection.
    pub fn shutdown(&mut self) {
        self.net.shutdown();
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// Mirror of a remote authority.
pub struct ClientSession {
    engine: GameInstance,
    net: NetworkManager,
    dt: f32,
    next_sequence: u32,
    users: Vec<UserEntry>,
    countdown: Option<i32>,
    shots_heard: u64,
}

impl ClientSession {
    /// Wrap a client-role engine.
    pub fn new(engine: GameInstance, net: NetworkManager, dt: f32) -> Self {
        Self {
            engine,
            net,
            dt,
            next_sequence: 1,
            users: Vec::new(),
            countdown: None,
            shots_heard: 0,
        }
    }

    /// Local mirror.
    pub fn engine(&self) -> &GameInstance {
        &self.engine
    }

    /// Last roster received.
    pub fn users(&self) -> &[UserEntry] {
        &self.users
    }

    /// Last countdown value received.
    pub fn countdown(&self) -> Option<i32> {
        self.countdown
    }

    /// `Fire` broadcasts received.
    pub fn shots_heard(&self) -> u64 {
        self.shots_heard
    }

    /// False once the server is gone.
    pub fn is_connected(&self) -> bool {
        self.net.is_connected()
    }

    /// Declare readiness.
    pub fn set_ready(&mut self, ready: bool) -> Result<(), TransportError> {
        // The server keys readiness by connection, so the id is unused
        self.net.send_to_server(Message::Users(vec![UserEntry {
            client: ClientId(0),
            ready,
        }]))
    }

    /// Ask the server to fire our tank.
    pub fn fire(&mut self) -> Result<(), TransportError> {
        match self.engine.local_player() {
            Some(owner) => self.net.send_to_server(Message::Fire { owner }),
            None => Ok(()),
        }
    }

    /// One tick. `input` is stamped with the next sequence number and sent.
    pub fn step(&mut self, input: Option<PlayerInput>) -> TickResult {
        let now = self.engine.clock_ms();

        for inbound in self.net.poll(now) {
            match inbound {
                Inbound::Message { message, .. } => self.receive(message),
                Inbound::Disconnected { .. } => warn!("Disconnected from server"),
                Inbound::Connected { addr, .. } => info!(%addr, "Connected"),
            }
        }

        if let Some(state) = self.net.interpolated_state(now) {
            self.engine.apply_snapshot(&state);
        }

        if let Some(mut input) = input {
            input.sequence = self.next_sequence;
            input.timestamp = now;
            self.next_sequence = self.next_sequence.wrapping_add(1);
            if let Err(e) = self.net.send_input(input) {
                warn!(error = %e, "Input not sent");
            }
        }

        self.net.heartbeat(now);
        self.engine.tick(self.dt)
    }

    fn receive(&mut self, message: Message) {
        match message {
            Message::GameObjects(records) => match self.engine.apply_objects(&records) {
                Ok(()) => {
                    // Snapshots buffered before the list may not know our tank yet
                    self.net.clear_snapshots();
                    self.net.set_local_tank(self.engine.local_player());
                }
                Err(e) => warn!(error = %e, "Bad object list"),
            },
            Message::Users(users) => self.users = users,
            Message::GameMode(mode) => {
                if mode == PHASE_ROUND {
                    self.countdown = None;
                }
                self.engine.set_phase(&mode);
            }
            Message::LobbyCountdown { seconds } => self.countdown = Some(seconds),
            Message::Fire { owner } => {
                self.shots_heard += 1;
                debug!(%owner, "Shot fired");
            }
            Message::HeartBeat { .. } => {}
            other => debug!(message_type = %other.message_type(), "Ignored server message"),
        }
    }

    /// Newest authority snapshot received.
    pub fn latest_state(&self) -> Option<&Arc<GameState>> {
        self.net.latest_state()
    }

    /// Close the connection.
    pub fn shutdown(&mut self) {
        self.net.shutdown();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::engine::Role;
    use crate::game::input::Action;
    use crate::game::level::LevelData;
    use crate::game::object::{ObjectType, TANK_START_AMMO};
    use crate::network::manager::{Link, ManagerConfig};
    use crate::network::transport::{TcpClient, TcpServer, TransportConfig};
    use std::time::Duration;

    const ARENA: &str = r#"{
        "world": { "width": 1000, "height": 1000 },
        "walls": [{ "x": 0, "y": 0, "width": 1000, "height": 10 }],
        "pickups": [{ "kind": "ammo", "x": 200, "y": 520, "count": 5 }],
        "spawns": [{ "x": 100, "y": 500 }, { "x": 800, "y": 500 }]
    }"#;

    async fn start_server() -> (ServerSession, std::net::SocketAddr) {
        let server = TcpServer::bind("127.0.0.1:0", TransportConfig::default(), 4)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let (handle, events) = server.start().unwrap();
        let net = NetworkManager::new(Link::Server(handle), events, &ManagerConfig::default());

        let mut engine = GameInstance::new(Role::Server, 11);
        engine.load_level(&LevelData::parse(ARENA).unwrap()).unwrap();
        (ServerSession::new(engine, net, Lobby::new(1), 0.1), addr)
    }

    async fn connect(addr: std::net::SocketAddr) -> ClientSession {
        let (conn, events) = TcpClient::connect(addr, TransportConfig::default())
            .await
            .unwrap();
        let net = NetworkManager::new(Link::Client(conn), events, &ManagerConfig::default());
        ClientSession::new(GameInstance::new(Role::Client, 0), net, 0.1)
    }

    async fn run_until<F>(server: &mut ServerSession, client: &mut ClientSession, mut done: F)
    where
        F: FnMut(&ServerSession, &ClientSession) -> bool,
    {
        for _ in 0..300 {
            server.step();
            client.step(None);
            if done(server, client) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_join_ready_countdown_start() {
        let (mut server, addr) = start_server().await;
        let mut client = connect(addr).await;

        run_until(&mut server, &mut client, |_, c| c.engine().local_player().is_some()).await;
        let tank = client.engine().local_player().unwrap();
        assert_eq!(server.lobby().clients().next().unwrap().tank, Some(tank));
        assert!(client.engine().get(&tank).unwrap().is_input_driven());

        client.set_ready(true).unwrap();
        run_until(&mut server, &mut client, |_, c| c.countdown().is_some()).await;
        run_until(&mut server, &mut client, |_, c| c.engine().phase() == PHASE_ROUND).await;
        assert_eq!(server.engine().phase(), PHASE_ROUND);
        assert!(client.users().iter().all(|u| u.ready));
    }

    #[tokio::test]
    async fn test_input_and_fire_replicate() {
        let (mut server, addr) = start_server().await;
        let mut client = connect(addr).await;
        run_until(&mut server, &mut client, |_, c| c.engine().local_player().is_some()).await;
        let tank = client.engine().local_player().unwrap();

        let input = PlayerInput::default()
            .with_movement(Vec2::RIGHT)
            .with_action(Action::Fire);
        client.step(Some(input));

        run_until(&mut server, &mut client, |_, c| c.shots_heard() > 0).await;
        run_until(&mut server, &mut client, |_, c| {
            c.engine()
                .get(&tank)
                .is_some_and(|t| t.position().x > 100.0 && t.last_input_sequence == 1)
        })
        .await;
    }

    #[tokio::test]
    async fn test_client_follows_spawns_and_removals() {
        let (mut server, addr) = start_server().await;
        let mut client = connect(addr).await;
        run_until(&mut server, &mut client, |_, c| c.engine().local_player().is_some()).await;

        let count = |c: &ClientSession, kind: ObjectType| {
            c.engine()
                .objects()
                .iter()
                .filter(|o| o.object_type() == kind)
                .count()
        };
        assert_eq!(count(&client, ObjectType::AmmoPickup), 1);
        assert_eq!(count(&client, ObjectType::Projectile), 0);

        // Drive through the pickup while firing
        let input = PlayerInput::default()
            .with_movement(Vec2::RIGHT)
            .with_action(Action::Fire);
        client.step(Some(input));

        run_until(&mut server, &mut client, |_, c| count(c, ObjectType::Projectile) > 0).await;
        run_until(&mut server, &mut client, |s, c| {
            s.engine()
                .objects()
                .iter()
                .all(|o| o.object_type() != ObjectType::AmmoPickup)
                && count(c, ObjectType::AmmoPickup) == 0
        })
        .await;

        let tank = client.engine().local_player().unwrap();
        run_until(&mut server, &mut client, |_, c| {
            c.engine()
                .get(&tank)
                .and_then(|t| t.tank_state())
                .is_some_and(|t| t.ammo == TANK_START_AMMO - 1 + 5)
        })
        .await;
    }

    #[tokio::test]
    async fn test_disconnect_removes_tank() {
        let (mut server, addr) = start_server().await;
        let mut client = connect(addr).await;
        run_until(&mut server, &mut client, |_, c| c.engine().local_player().is_some()).await;
        let tank = client.engine().local_player().unwrap();

        client.shutdown();
        for _ in 0..300 {
            server.step();
            if server.engine().get(&tank).is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(server.engine().get(&tank).is_none());
        assert!(server.lobby().is_empty());
    }
}
