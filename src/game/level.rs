//! Level Loading
//!
//! Levels are JSON documents fetched through an `AssetProvider`:
//!
//! ```json
//! {
//!   "world":   { "width": 1600, "height": 1200 },
//!   "walls":   [{ "x": 0, "y": 0, "width": 1600, "height": 32 }],
//!   "tanks":   [{ "x": 800, "y": 200, "ai": "chase_and_dodge" }],
//!   "pickups": [{ "kind": "ammo", "x": 400, "y": 400, "count": 5 }],
//!   "player":  { "x": 100, "y": 1000 },
//!   "spawns":  [{ "x": 100, "y": 1000 }, { "x": 1400, "y": 1000 }]
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assets::{AssetError, AssetProvider};
use crate::core::vec2::{Bounds, Vec2};
use crate::game::ai::{AiAgent, AiKind};
use crate::game::object::{Controller, GameObject};

/// Asset format of level files.
pub const LEVEL_FORMAT: &str = "json";

/// Level errors. The engine refuses to start on any of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LevelError {
    #[error("level has no objects")]
    EmptyLevel,

    #[error("level has no player spawn")]
    MissingPlayer,

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("malformed level: {0}")]
    Malformed(String),
}

/// World extent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldSize {
    pub width: f32,
    pub height: f32,
}

impl Default for WorldSize {
    fn default() -> Self {
        Self {
            width: 2048.0,
            height: 2048.0,
        }
    }
}

/// A point in a level file.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointData {
    pub x: f32,
    pub y: f32,
}

impl PointData {
    fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Wall rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WallData {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// AI tank spawn.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TankData {
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_ai")]
    pub ai: AiKind,
}

fn default_ai() -> AiKind {
    AiKind::Chase
}

/// Pickup spawn.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PickupData {
    Ammo { x: f32, y: f32, count: i32 },
    Health { x: f32, y: f32, amount: f32 },
}

/// Parsed level document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelData {
    #[serde(default)]
    pub world: WorldSize,
    #[serde(default)]
    pub walls: Vec<WallData>,
    #[serde(default)]
    pub tanks: Vec<TankData>,
    #[serde(default)]
    pub pickups: Vec<PickupData>,
    #[serde(default)]
    pub player: Option<PointData>,
    /// Multiplayer spawn points; the player spawn is used if empty
    #[serde(default)]
    pub spawns: Vec<PointData>,
}

impl LevelData {
    /// Parse JSON text.
    pub fn parse(text: &str) -> Result<Self, LevelError> {
        serde_json::from_str(text).map_err(|e| LevelError::Malformed(e.to_string()))
    }

    /// Fetch and parse a level by name.
    pub fn load(assets: &dyn AssetProvider, name: &str) -> Result<Self, LevelError> {
        let text = assets.load_text(LEVEL_FORMAT, name)?;
        Self::parse(&text)
    }

    /// World rectangle at the origin.
    pub fn world_bounds(&self) -> Bounds {
        Bounds::from_xywh(0.0, 0.0, self.world.width, self.world.height)
    }

    /// Check the level can start. Solo play needs a player spawn.
    pub fn validate(&self, require_player: bool) -> Result<(), LevelError> {
        if self.walls.is_empty() && self.tanks.is_empty() && self.pickups.is_empty() && self.player.is_none() {
            return Err(LevelError::EmptyLevel);
        }
        if require_player && self.player.is_none() {
            return Err(LevelError::MissingPlayer);
        }
        if !(self.world.width > 0.0 && self.world.height > 0.0) {
            return Err(LevelError::Malformed("world size must be positive".into()));
        }
        Ok(())
    }

    /// Walls, pickups and AI tanks, in file order.
    pub fn spawn_static_and_ai(&self) -> Vec<GameObject> {
        let walls = self
            .walls
            .iter()
            .map(|w| GameObject::wall(Bounds::from_xywh(w.x, w.y, w.width, w.height)));
        let pickups = self.pickups.iter().map(|p| match *p {
            PickupData::Ammo { x, y, count } => GameObject::ammo_pickup(Vec2::new(x, y), count),
            PickupData::Health { x, y, amount } => GameObject::health_pickup(Vec2::new(x, y), amount),
        });
        let tanks = self
            .tanks
            .iter()
            .map(|t| GameObject::tank(Vec2::new(t.x, t.y), Controller::Ai(AiAgent::new(t.ai))));

        walls.chain(pickups).chain(tanks).collect()
    }

    /// The player tank, if the level has a player spawn.
    pub fn spawn_player(&self) -> Option<GameObject> {
        self.player
            .map(|p| GameObject::tank(p.to_vec2(), Controller::Input))
    }

    /// Multiplayer spawn points.
    pub fn spawn_points(&self) -> Vec<Vec2> {
        if self.spawns.is_empty() {
            self.player.map(PointData::to_vec2).into_iter().collect()
        } else {
            self.spawns.iter().map(|p| p.to_vec2()).collect()
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssets;
    use crate::game::object::ObjectType;

    const LEVEL: &str = r#"{
        "world": { "width": 800, "height": 600 },
        "walls": [{ "x": 0, "y": 0, "width": 800, "height": 16 }],
        "tanks": [{ "x": 400, "y": 100, "ai": "chase_and_dodge" }, { "x": 600, "y": 100 }],
        "pickups": [
            { "kind": "ammo", "x": 200, "y": 300, "count": 5 },
            { "kind": "health", "x": 300, "y": 300, "amount": 25.0 }
        ],
        "player": { "x": 50, "y": 500 }
    }"#;

    #[test]
    fn test_parse_and_spawn() {
        let level = LevelData::parse(LEVEL).unwrap();
        level.validate(true).unwrap();
        assert_eq!(level.tanks[1].ai, AiKind::Chase);

        let objects = level.spawn_static_and_ai();
        let types: Vec<ObjectType> = objects.iter().map(|o| o.object_type()).collect();
        assert_eq!(
            types,
            vec![
                ObjectType::Wall,
                ObjectType::AmmoPickup,
                ObjectType::HealthPickup,
                ObjectType::Tank,
                ObjectType::Tank
            ]
        );
        assert!(objects[3..].iter().all(|o| !o.is_input_driven()));

        let player = level.spawn_player().unwrap();
        assert!(player.is_input_driven());
        assert_eq!(player.position(), Vec2::new(50.0, 500.0));
        assert_eq!(level.spawn_points(), vec![Vec2::new(50.0, 500.0)]);
    }

    #[test]
    fn test_empty_level_refused() {
        let level = LevelData::parse("{}").unwrap();
        assert_eq!(level.validate(false), Err(LevelError::EmptyLevel));
    }

    #[test]
    fn test_missing_player_refused_for_solo() {
        let level = LevelData::parse(r#"{ "walls": [{ "x": 0, "y": 0, "width": 10, "height": 10 }] }"#).unwrap();
        assert_eq!(level.validate(true), Err(LevelError::MissingPlayer));
        assert!(level.validate(false).is_ok());
    }

    #[test]
    fn test_malformed_and_missing_asset() {
        assert!(matches!(LevelData::parse("{ nope"), Err(LevelError::Malformed(_))));
        assert!(matches!(
            LevelData::parse(r#"{ "tanks": [{ "x": 1, "y": 1, "ai": "sleepy" }] }"#),
            Err(LevelError::Malformed(_))
        ));

        let assets = MemoryAssets::new().with(LEVEL_FORMAT, "one", LEVEL);
        assert!(LevelData::load(&assets, "one").is_ok());
        assert!(matches!(
            LevelData::load(&assets, "two"),
            Err(LevelError::Asset(AssetError::NotFound { .. }))
        ));
    }
}
