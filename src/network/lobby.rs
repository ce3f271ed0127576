//! Lobby
//!
//! Per-connection ready flags and the pre-round countdown. Owned by the
//! server tick loop; the transport only reports joins and leaves.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use crate::game::object::ObjectId;
use crate::network::message::UserEntry;
use crate::network::transport::ClientId;

/// Default countdown length (seconds).
pub const DEFAULT_COUNTDOWN_SECONDS: i32 = 3;

/// A connected player.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConnection {
    pub id: ClientId,
    pub addr: SocketAddr,
    pub ready: bool,
    /// Tank controlled by this client, once spawned
    pub tank: Option<ObjectId>,
}

/// Lobby lifecycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LobbyPhase {
    /// Waiting for everyone to ready up.
    Waiting,
    /// Counting down to the round.
    Counting {
        /// Whole seconds left
        remaining: i32,
        /// Time since the last announced second
        elapsed: f32,
    },
    /// Round in progress.
    Started,
}

/// Things the server should announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyEvent {
    /// Broadcast `LobbyCountdown` with the seconds left.
    Countdown(i32),
    /// Countdown was interrupted by a join, leave or unready.
    Cancelled,
    /// Broadcast `GameMode` with the round start.
    Start,
}

/// Ready tracking and countdown.
#[derive(Debug)]
pub struct Lobby {
    clients: BTreeMap<ClientId, ClientConnection>,
    countdown_seconds: i32,
    phase: LobbyPhase,
}

impl Lobby {
    /// Empty lobby with the given countdown length.
    pub fn new(countdown_seconds: i32) -> Self {
        Self {
            clients: BTreeMap::new(),
            countdown_seconds,
            phase: LobbyPhase::Waiting,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> LobbyPhase {
        self.phase
    }

    /// True once the round has started.
    pub fn is_started(&self) -> bool {
        self.phase == LobbyPhase::Started
    }

    /// Add a client, not ready. A running countdown is cancelled on the next tick.
    pub fn join(&mut self, id: ClientId, addr: SocketAddr) {
        self.clients.insert(
            id,
            ClientConnection {
                id,
                addr,
                ready: false,
                tank: None,
            },
        );
    }

    /// Remove a client. An empty lobby returns to waiting.
    pub fn leave(&mut self, id: ClientId) -> Option<ClientConnection> {
        let removed = self.clients.remove(&id);
        if self.clients.is_empty() {
            self.phase = LobbyPhase::Waiting;
        }
        removed
    }

    /// Set a client's ready flag. Returns true if it changed.
    pub fn set_ready(&mut self, id: ClientId, ready: bool) -> bool {
        match self.clients.get_mut(&id) {
            Some(client) if client.ready != ready => {
                client.ready = ready;
                true
            }
            _ => false,
        }
    }

    /// Record the tank spawned for a client.
    pub fn assign_tank(&mut self, id: ClientId, tank: ObjectId) {
        if let Some(client) = self.clients.get_mut(&id) {
            client.tank = Some(tank);
        }
    }

    /// Look up a client.
    pub fn get(&self, id: ClientId) -> Option<&ClientConnection> {
        self.clients.get(&id)
    }

    /// Connected clients in id order.
    pub fn clients(&self) -> impl Iterator<Item = &ClientConnection> {
        self.clients.values()
    }

    /// Number of connected clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// True if nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// True if at least one client is connected and all are ready.
    pub fn all_ready(&self) -> bool {
        !self.clients.is_empty() && self.clients.values().all(|c| c.ready)
    }

    /// Roster for a `Users` message.
    pub fn users(&self) -> Vec<UserEntry> {
        self.clients
            .values()
            .map(|c| UserEntry {
                client: c.id,
                ready: c.ready,
            })
            .collect()
    }

    /// Advance the countdown by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> Vec<LobbyEvent> {
        let mut events = Vec::new();

        match self.phase {
            LobbyPhase::Started => {}
            LobbyPhase::Waiting => {
                if self.all_ready() {
                    if self.countdown_seconds <= 0 {
                        self.phase = LobbyPhase::Started;
                        events.push(LobbyEvent::Start);
                    } else {
                        self.phase = LobbyPhase::Counting {
                            remaining: self.countdown_seconds,
                            elapsed: 0.0,
                        };
                        events.push(LobbyEvent::Countdown(self.countdown_seconds));
                    }
                }
            }
            LobbyPhase::Counting { mut remaining, mut elapsed } => {
                if !self.all_ready() {
                    self.phase = LobbyPhase::Waiting;
                    events.push(LobbyEvent::Cancelled);
                    return events;
                }

                elapsed += dt.max(0.0);
                while elapsed >= 1.0 {
                    elapsed -= 1.0;
                    remaining -= 1;
                    if remaining <= 0 {
                        self.phase = LobbyPhase::Started;
                        events.push(LobbyEvent::Start);
                        return events;
                    }
                    events.push(LobbyEvent::Countdown(remaining));
                }
                self.phase = LobbyPhase::Counting { remaining, elapsed };
            }
        }

        events
    }
}

impl Default for Lobby {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTDOWN_SECONDS)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn test_waits_until_all_ready() {
        let mut lobby = Lobby::new(3);
        lobby.join(ClientId(1), addr());
        lobby.join(ClientId(2), addr());
        assert!(lobby.set_ready(ClientId(1), true));
        assert!(!lobby.set_ready(ClientId(1), true));

        assert!(lobby.tick(1.0).is_empty());
        assert_eq!(lobby.phase(), LobbyPhase::Waiting);

        lobby.set_ready(ClientId(2), true);
        assert_eq!(lobby.tick(0.0), vec![LobbyEvent::Countdown(3)]);
    }

    #[test]
    fn test_countdown_announces_each_second_then_starts() {
        let mut lobby = Lobby::new(3);
        lobby.join(ClientId(1), addr());
        lobby.set_ready(ClientId(1), true);

        let mut events = lobby.tick(0.0);
        for _ in 0..70 {
            events.extend(lobby.tick(0.05));
        }
        assert_eq!(
            events,
            vec![
                LobbyEvent::Countdown(3),
                LobbyEvent::Countdown(2),
                LobbyEvent::Countdown(1),
                LobbyEvent::Start
            ]
        );
        assert!(lobby.is_started());
        assert!(lobby.tick(5.0).is_empty());
    }

    #[test]
    fn test_unready_cancels_countdown() {
        let mut lobby = Lobby::new(3);
        lobby.join(ClientId(1), addr());
        lobby.set_ready(ClientId(1), true);
        lobby.tick(0.0);

        lobby.join(ClientId(2), addr());
        assert_eq!(lobby.tick(0.5), vec![LobbyEvent::Cancelled]);
        assert_eq!(lobby.phase(), LobbyPhase::Waiting);
    }

    #[test]
    fn test_users_roster() {
        let mut lobby = Lobby::default();
        lobby.join(ClientId(4), addr());
        lobby.join(ClientId(2), addr());
        lobby.set_ready(ClientId(4), true);

        let users = lobby.users();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0], UserEntry { client: ClientId(2), ready: false });
        assert_eq!(users[1], UserEntry { client: ClientId(4), ready: true });
    }

    #[test]
    fn test_empty_lobby_resets() {
        let mut lobby = Lobby::new(0);
        lobby.join(ClientId(1), addr());
        lobby.set_ready(ClientId(1), true);
        assert_eq!(lobby.tick(0.0), vec![LobbyEvent::Start]);

        lobby.leave(ClientId(1));
        assert_eq!(lobby.phase(), LobbyPhase::Waiting);
        assert!(!lobby.all_ready());
    }
}
