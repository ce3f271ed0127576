//! Typed Messages
//!
//! One variant per `MessageType`, with the payload layout each frame
//! carries. Every payload must be consumed exactly; leftover bytes are an
//! error.
//!
//! | Type           | Payload                                               |
//! |----------------|-------------------------------------------------------|
//! | HeartBeat      | sender clock `u64` ms                                 |
//! | Movement       | seq `u32`, ts `u64`, movement, aim, actions, analog   |
//! | GameObjects    | object record array                                   |
//! | Users          | `i32` count of (`u64` client id, `bool` ready)        |
//! | Fire           | owner tank id                                         |
//! | GameMode       | mode string                                           |
//! | PositionUpdate | compressed `GameState`                                |
//! | LobbyCountdown | seconds remaining `i32`                               |

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::compress::{CompressionError, StateCompressor};
use crate::game::input::{Action, PlayerInput};
use crate::game::object::ObjectId;
use crate::game::state::GameState;
use crate::network::codec::{BinaryReader, BinaryWriter, ObjectRecord, WireError};
use crate::network::frame::{BinaryMessage, MessageType};
use crate::network::transport::ClientId;

/// Payload decode failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Compression(#[from] CompressionError),
}

/// One lobby member as listed in a `Users` message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub client: ClientId,
    pub ready: bool,
}

/// Decoded frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    HeartBeat { timestamp: u64 },
    Movement(PlayerInput),
    GameObjects(Vec<ObjectRecord>),
    Users(Vec<UserEntry>),
    Fire { owner: ObjectId },
    GameMode(String),
    PositionUpdate(Arc<GameState>),
    LobbyCountdown { seconds: i32 },
}

impl Message {
    /// Frame type this message travels as.
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::HeartBeat { .. } => MessageType::HeartBeat,
            Message::Movement(_) => MessageType::Movement,
            Message::GameObjects(_) => MessageType::GameObjects,
            Message::Users(_) => MessageType::Users,
            Message::Fire { .. } => MessageType::Fire,
            Message::GameMode(_) => MessageType::GameMode,
            Message::PositionUpdate(_) => MessageType::PositionUpdate,
            Message::LobbyCountdown { .. } => MessageType::LobbyCountdown,
        }
    }

    /// Serialize into a frame.
    pub fn encode(&self) -> BinaryMessage {
        let payload = match self {
            Message::PositionUpdate(state) => StateCompressor::new().compress(state),
            other => {
                let mut w = BinaryWriter::new();
                other.write_payload(&mut w);
                w.into_bytes()
            }
        };
        BinaryMessage::new(self.message_type(), payload)
    }

    fn write_payload(&self, w: &mut BinaryWriter) {
        match self {
            Message::HeartBeat { timestamp } => w.write_u64(*timestamp),
            Message::Movement(input) => write_input(w, input),
            Message::GameObjects(records) => w.write_object_array(records),
            Message::Users(users) => {
                w.write_len(users.len());
                for user in users {
                    w.write_u64(user.client.0);
                    w.write_bool(user.ready);
                }
            }
            Message::Fire { owner } => w.write_uuid(owner),
            Message::GameMode(mode) => w.write_string(mode),
            Message::LobbyCountdown { seconds } => w.write_i32(*seconds),
            Message::PositionUpdate(_) => {}
        }
    }

    /// Parse a frame's payload.
    pub fn decode(frame: &BinaryMessage) -> Result<Message, MessageError> {
        let mut r = BinaryReader::new(&frame.payload);
        let message = match frame.message_type {
            MessageType::PositionUpdate => {
                let state = StateCompressor::new().decompress(&frame.payload)?;
                return Ok(Message::PositionUpdate(Arc::new(state)));
            }
            MessageType::HeartBeat => Message::HeartBeat {
                timestamp: r.read_u64()?,
            },
            MessageType::Movement => Message::Movement(read_input(&mut r)?),
            MessageType::GameObjects => Message::GameObjects(r.read_object_array()?),
            MessageType::Users => {
                let count = r.read_len(9)?;
                let mut users = Vec::with_capacity(count);
                for _ in 0..count {
                    users.push(UserEntry {
                        client: ClientId(r.read_u64()?),
                        ready: r.read_bool()?,
                    });
                }
                Message::Users(users)
            }
            MessageType::Fire => Message::Fire {
                owner: r.read_uuid()?,
            },
            MessageType::GameMode => Message::GameMode(r.read_string()?),
            MessageType::LobbyCountdown => Message::LobbyCountdown {
                seconds: r.read_i32()?,
            },
        };
        r.finish()?;
        Ok(message)
    }
}

fn write_input(w: &mut BinaryWriter, input: &PlayerInput) {
    w.write_u32(input.sequence);
    w.write_u64(input.timestamp);
    w.write_vec2(input.movement);
    w.write_vec2(input.aim);
    w.write_len(input.actions.len());
    for action in &input.actions {
        w.write_u8(action.as_u8());
    }
    w.write_len(input.analog.len());
    for (action, intensity) in &input.analog {
        w.write_u8(action.as_u8());
        w.write_f32(*intensity);
    }
}

fn read_input(r: &mut BinaryReader<'_>) -> Result<PlayerInput, WireError> {
    let mut input = PlayerInput::new(r.read_u32()?, r.read_u64()?);
    input.movement = r.read_vec2()?;
    input.aim = r.read_vec2()?;

    let actions = r.read_len(1)?;
    for _ in 0..actions {
        input.actions.insert(read_action(r)?);
    }
    let analog = r.read_len(5)?;
    for _ in 0..analog {
        let action = read_action(r)?;
        input.analog.insert(action, r.read_f32()?);
    }
    Ok(input)
}

fn read_action(r: &mut BinaryReader<'_>) -> Result<Action, WireError> {
    let byte = r.read_u8()?;
    Action::from_u8(byte).ok_or(WireError::InvalidAction(byte))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::object::{Controller, GameObject};
    use bytes::Bytes;
    use uuid::Uuid;

    fn round_trip(message: Message) -> Message {
        Message::decode(&message.encode()).unwrap()
    }

    #[test]
    fn test_movement_round_trip() {
        let mut input = PlayerInput::new(17, 99_000)
            .with_movement(Vec2::new(0.0, -1.0))
            .with_action(Action::Fire);
        input.aim = Vec2::new(320.0, 240.0);
        input.analog.insert(Action::Boost, 0.5);

        let message = Message::Movement(input);
        assert_eq!(round_trip(message.clone()), message);
    }

    #[test]
    fn test_users_and_fire_round_trip() {
        let users = Message::Users(vec![
            UserEntry { client: ClientId(3), ready: true },
            UserEntry { client: ClientId(9), ready: false },
        ]);
        assert_eq!(round_trip(users.clone()), users);

        let fire = Message::Fire { owner: Uuid::from_bytes([5; 16]) };
        assert_eq!(round_trip(fire.clone()), fire);
    }

    #[test]
    fn test_game_objects_carries_records() {
        let tank = GameObject::tank(Vec2::new(10.0, 20.0), Controller::Input);
        let message = Message::GameObjects(vec![tank.to_record()]);
        match round_trip(message) {
            Message::GameObjects(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].id, tank.id);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_position_update_uses_compressor() {
        let tank = GameObject::tank(Vec2::new(1.5, 2.5), Controller::Input);
        let state = GameState::new(
            4,
            500,
            [(tank.id, tank.get_state(500))].into_iter().collect(),
            Default::default(),
        );
        let frame = Message::PositionUpdate(Arc::new(state)).encode();
        assert_eq!(frame.message_type, MessageType::PositionUpdate);
        assert_eq!(frame.payload[0], crate::game::compress::FORMAT_VERSION);

        match Message::decode(&frame).unwrap() {
            Message::PositionUpdate(decoded) => {
                assert_eq!(decoded.sequence(), 4);
                assert_eq!(decoded.get(&tank.id).unwrap().position, Vec2::new(1.5, 2.5));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let frame = BinaryMessage::new(MessageType::LobbyCountdown, Bytes::from_static(&[0, 0, 0, 3, 0xAA]));
        assert_eq!(
            Message::decode(&frame),
            Err(MessageError::Wire(WireError::TrailingBytes(1)))
        );
    }

    #[test]
    fn test_invalid_action_rejected() {
        let mut w = BinaryWriter::new();
        w.write_u32(1);
        w.write_u64(1);
        w.write_vec2(Vec2::ZERO);
        w.write_vec2(Vec2::ZERO);
        w.write_len(1);
        w.write_u8(200);
        w.write_len(0);
        let frame = BinaryMessage::new(MessageType::Movement, w.into_bytes());
        assert_eq!(
            Message::decode(&frame),
            Err(MessageError::Wire(WireError::InvalidAction(200)))
        );
    }
}
