//! Asset and Render Seams
//!
//! The engine never touches files or pixels itself. Levels come through an
//! [`AssetProvider`]; drawing goes through a [`Renderer`].

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::vec2::Vec2;
use crate::game::object::GameObject;

/// Asset lookup failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// Nothing by that name; callers may fall back.
    #[error("asset not found: {name}.{format}")]
    NotFound { format: String, name: String },

    /// Present but unusable.
    #[error("malformed asset {name}: {reason}")]
    Malformed { name: String, reason: String },

    /// Storage failure; not worth retrying.
    #[error("asset storage failure: {0}")]
    Fatal(String),
}

/// "Give me this asset by format and name."
pub trait AssetProvider: Send + Sync {
    /// Raw bytes of an asset.
    fn load(&self, format: &str, name: &str) -> Result<Vec<u8>, AssetError>;

    /// Asset as UTF-8 text.
    fn load_text(&self, format: &str, name: &str) -> Result<String, AssetError> {
        let bytes = self.load(format, name)?;
        String::from_utf8(bytes).map_err(|_| AssetError::Malformed {
            name: name.to_string(),
            reason: "not valid UTF-8".to_string(),
        })
    }
}

/// Assets stored as `<root>/<name>.<format>`.
#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    /// Provider rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, format: &str, name: &str) -> Option<PathBuf> {
        // Names are flat; anything that could escape the root is refused.
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }
        Some(self.root.join(format!("{name}.{format}")))
    }
}

impl AssetProvider for DirectoryAssets {
    fn load(&self, format: &str, name: &str) -> Result<Vec<u8>, AssetError> {
        let not_found = || AssetError::NotFound {
            format: format.to_string(),
            name: name.to_string(),
        };
        let path = self.path_for(format, name).ok_or_else(not_found)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => not_found(),
            _ => AssetError::Fatal(format!("{}: {}", path.display(), e)),
        })
    }
}

/// In-memory assets, for tests and embedded levels.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    entries: BTreeMap<(String, String), Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an asset.
    pub fn insert(&mut self, format: &str, name: &str, bytes: impl Into<Vec<u8>>) {
        self.entries
            .insert((format.to_string(), name.to_string()), bytes.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, format: &str, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(format, name, bytes);
        self
    }
}

impl AssetProvider for MemoryAssets {
    fn load(&self, format: &str, name: &str) -> Result<Vec<u8>, AssetError> {
        self.entries
            .get(&(format.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| AssetError::NotFound {
                format: format.to_string(),
                name: name.to_string(),
            })
    }
}

/// "Draw this object at this device point."
pub trait Renderer {
    /// Called once per live object per frame, in table order.
    fn draw_object(&mut self, object: &GameObject, device_point: Vec2);

    /// Called before the first object of a frame.
    fn begin_frame(&mut self) {}

    /// Called after the last object of a frame.
    fn end_frame(&mut self) {}
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_assets() {
        let assets = MemoryAssets::new().with("json", "level1", b"{}".to_vec());
        assert_eq!(assets.load_text("json", "level1").unwrap(), "{}");
        assert!(matches!(
            assets.load("json", "level2"),
            Err(AssetError::NotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let assets = MemoryAssets::new().with("json", "bad", vec![0xFF, 0xFE]);
        assert!(matches!(
            assets.load_text("json", "bad"),
            Err(AssetError::Malformed { .. })
        ));
    }

    #[test]
    fn test_directory_assets() {
        let root = std::env::temp_dir().join(format!("paper-tanks-assets-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("arena.json"), b"{\"walls\":[]}").unwrap();

        let assets = DirectoryAssets::new(&root);
        assert_eq!(assets.load("json", "arena").unwrap(), b"{\"walls\":[]}".to_vec());
        assert!(matches!(
            assets.load("json", "missing"),
            Err(AssetError::NotFound { .. })
        ));
        assert!(matches!(
            assets.load("json", "../arena"),
            Err(AssetError::NotFound { .. })
        ));

        std::fs::remove_dir_all(&root).unwrap();
    }
}
