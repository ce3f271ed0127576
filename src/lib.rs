//! # Paper Tanks Server
//!
//! Authoritative top-down tank simulation with binary state sync.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PAPER TANKS SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Geometry and primitives                   │
//! │  ├── vec2.rs     - 2D vector and bounds                      │
//! │  ├── transform.rs- World-to-device affine transform          │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── props.rs    - Tagged property values                    │
//! │                                                              │
//! │  physics/        - Shapes, quadtree, collision pipeline      │
//! │                                                              │
//! │  game/           - Simulation                                │
//! │  ├── object.rs   - Tanks, projectiles, walls, pickups        │
//! │  ├── ai.rs       - Tank AI                                   │
//! │  ├── state.rs    - Snapshots and interpolation               │
//! │  ├── compress.rs - Quantized snapshot encoding               │
//! │  ├── level.rs    - Level documents                           │
//! │  └── engine.rs   - Tick pipeline                             │
//! │                                                              │
//! │  network/        - Replication (non-deterministic)           │
//! │  ├── codec.rs    - Big-endian binary codec                   │
//! │  ├── frame.rs    - Length-prefixed frames                    │
//! │  ├── message.rs  - Typed messages                            │
//! │  ├── transport.rs- Framed TCP server and client              │
//! │  ├── lobby.rs    - Ready flags and countdown                 │
//! │  ├── manager.rs  - Snapshot throttle and interpolation       │
//! │  └── session.rs  - Server and client tick glue               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! Given the same level, seed and inputs, `game/` produces the same
//! sequence of object states. Object order is insertion order and all AI
//! randomness comes from the instance's seeded RNG.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod physics;
pub mod game;
pub mod network;
pub mod assets;
pub mod config;

// Re-export commonly used types
pub use core::vec2::{Bounds, Vec2};
pub use core::rng::DeterministicRng;
pub use game::engine::{GameInstance, Role, TickResult};
pub use game::input::PlayerInput;
pub use game::state::GameState;
pub use network::message::Message;
pub use network::transport::ClientId;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
