//! Network Layer
//!
//! Binary codec, length-prefixed TCP framing and the replication glue on
//! top. Nothing here runs inside the simulation; sessions drive the
//! engine from the outside.

pub mod codec;
pub mod frame;
pub mod message;
pub mod transport;
pub mod lobby;
pub mod manager;
pub mod session;

pub use codec::{BinaryReader, BinaryWriter, ObjectRecord, WireError};
pub use frame::{BinaryMessage, FrameDecoder, FrameError, MessageType};
pub use message::{Message, MessageError, UserEntry};
pub use transport::{
    ClientId, ConnectionHandle, ServerHandle, TcpClient, TcpServer, TransportConfig,
    TransportError, TransportEvent,
};
pub use lobby::{Lobby, LobbyEvent};
pub use manager::{Inbound, Link, ManagerConfig, NetworkManager};
pub use session::{ClientSession, ServerSession};
