//! Save-game records and the value types they carry.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Column clause shared by every record table: one row per record name holding an encoded blob.
pub const RECORD_TABLE_FIELDS: &str =
    "Name TEXT PRIMARY KEY NOT NULL, Data BLOB NOT NULL, SavedAt TEXT NOT NULL";

/// A save-game record persisted as a single encoded blob.
///
/// Each record type owns one table, registered under [`Record::TABLE_ID`], and is stored in the
/// row keyed by [`Record::NAME`].
pub trait Record: Serialize + DeserializeOwned {
    /// Row key of the record inside its table.
    const NAME: &'static str;
    /// Logical table id the record is stored under.
    const TABLE_ID: &'static str;
    /// Physical table name registered for [`Record::TABLE_ID`].
    const TABLE_NAME: &'static str;
}

/// World-space position.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Vector3 {
    /// Forward axis.
    #[serde(rename = "X")]
    pub x: f32,
    /// Right axis.
    #[serde(rename = "Y")]
    pub y: f32,
    /// Up axis.
    #[serde(rename = "Z")]
    pub z: f32,
}

impl PartialEq for Vector3 {
    fn eq(&self, other: &Self) -> bool {
        self.x.to_bits() == other.x.to_bits()
            && self.y.to_bits() == other.y.to_bits()
            && self.z.to_bits() == other.z.to_bits()
    }
}

impl Eq for Vector3 {}

/// Orientation in degrees.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Rotator {
    /// Rotation around the right axis.
    #[serde(rename = "Pitch")]
    pub pitch: f32,
    /// Rotation around the up axis.
    #[serde(rename = "Yaw")]
    pub yaw: f32,
    /// Rotation around the forward axis.
    #[serde(rename = "Roll")]
    pub roll: f32,
}

impl PartialEq for Rotator {
    fn eq(&self, other: &Self) -> bool {
        self.pitch.to_bits() == other.pitch.to_bits()
            && self.yaw.to_bits() == other.yaw.to_bits()
            && self.roll.to_bits() == other.roll.to_bits()
    }
}

impl Eq for Rotator {}

/// Progress snapshot of the running game.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameDataRecord {
    /// Map the player was on when the game was saved.
    pub level: String,
    /// Player position at save time.
    pub player_location: Vector3,
    /// Player facing at save time.
    pub player_rotation: Rotator,
}

impl Record for GameDataRecord {
    const NAME: &'static str = "GameData";
    const TABLE_ID: &'static str = "game_data";
    const TABLE_NAME: &'static str = "GameData";
}
