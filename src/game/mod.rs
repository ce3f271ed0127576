//! Game Logic Module
//!
//! Everything that runs inside a tick.
//!
//! ## Module Structure
//!
//! - `object`: Game objects (tanks, projectiles, walls, pickups)
//! - `ai`: Tank AI behaviours
//! - `response`: Collision responses between object kinds
//! - `events`: Game events emitted per tick
//! - `input`: Player input frames and the unacknowledged-input buffer
//! - `state`: Object snapshots and interpolation
//! - `compress`: Quantized snapshot encoding
//! - `level`: Level documents
//! - `engine`: The game instance and its tick pipeline

pub mod object;
pub mod ai;
pub mod response;
pub mod events;
pub mod input;
pub mod state;
pub mod compress;
pub mod level;
pub mod engine;

// Re-export key types
pub use object::{GameObject, ObjectId, ObjectType};
pub use input::{Action, InputBuffer, PlayerInput};
pub use state::{GameObjectState, GameState};
pub use compress::StateCompressor;
pub use level::LevelData;
pub use engine::{GameInstance, Role, TickResult};
pub use events::GameEvent;
