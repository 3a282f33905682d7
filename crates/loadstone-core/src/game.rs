//! The closed set of supported games and their structural quirks: the
//! game's own master file, the hardcoded early load order, and which plugin
//! flavours the engine understands.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Supported game titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameType {
    Oblivion,
    Skyrim,
    SkyrimSe,
    SkyrimVr,
    Fallout3,
    FalloutNv,
    Fallout4,
    Starfield,
}

impl GameType {
    /// The game's own master file, which precedes all other plugins.
    pub fn master_file(self) -> &'static str {
        match self {
            GameType::Oblivion => "Oblivion.esm",
            GameType::Skyrim | GameType::SkyrimSe | GameType::SkyrimVr => "Skyrim.esm",
            GameType::Fallout3 => "Fallout3.esm",
            GameType::FalloutNv => "FalloutNV.esm",
            GameType::Fallout4 => "Fallout4.esm",
            GameType::Starfield => "Starfield.esm",
        }
    }

    /// Whether the engine has a separate light/medium plugin address space.
    pub fn supports_light_plugins(self) -> bool {
        matches!(
            self,
            GameType::SkyrimSe | GameType::SkyrimVr | GameType::Fallout4 | GameType::Starfield
        )
    }

    /// Whether the engine understands blueprint masters.
    pub fn supports_blueprint_masters(self) -> bool {
        matches!(self, GameType::Starfield)
    }

    /// Plugins whose early positions the engine itself mandates, in their
    /// mandated order. Absent entries are simply not installed.
    pub fn hardcoded_plugins(self) -> Vec<String> {
        let names: &[&str] = match self {
            GameType::SkyrimSe => &[
                "Skyrim.esm",
                "Update.esm",
                "Dawnguard.esm",
                "HearthFires.esm",
                "Dragonborn.esm",
            ],
            GameType::SkyrimVr => &[
                "Skyrim.esm",
                "Update.esm",
                "Dawnguard.esm",
                "HearthFires.esm",
                "Dragonborn.esm",
                "SkyrimVR.esm",
            ],
            GameType::Starfield => &[
                "Starfield.esm",
                "Constellation.esm",
                "OldMars.esm",
                "ShatteredSpace.esm",
                "SFBGS003.esm",
                "SFBGS004.esm",
                "SFBGS006.esm",
                "SFBGS007.esm",
                "SFBGS008.esm",
                "BlueprintShips-Starfield.esm",
            ],
            other => return vec![other.master_file().to_string()],
        };
        names.iter().map(|name| name.to_string()).collect()
    }
}

/// A game installation the library is operating on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameContext {
    pub game_type: GameType,
    /// Root of the game installation.
    pub game_path: PathBuf,
    /// Per-user data directory holding the active-plugin state.
    pub local_data_path: PathBuf,
}

impl GameContext {
    pub fn new(
        game_type: GameType,
        game_path: impl Into<PathBuf>,
        local_data_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            game_type,
            game_path: game_path.into(),
            local_data_path: local_data_path.into(),
        }
    }

    /// Directory the game loads plugins from.
    pub fn plugins_dir(&self) -> PathBuf {
        self.game_path.join("Data")
    }

    pub fn plugin_path(&self, name: &str) -> PathBuf {
        self.plugins_dir().join(name)
    }
}
