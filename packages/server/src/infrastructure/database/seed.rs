//! シードファイル
//!
//! インメモリストアの初期データ（ルーム、プレイリスト、ビートマップカタログ）を JSON で記述します。
//!
//! ```json
//! {
//!   "beatmaps": [{ "beatmap_id": 1, "checksum": "3c7e2d4a" }],
//!   "rooms": [{
//!     "room_id": 1,
//!     "name": "hiroba",
//!     "queue_mode": "host_only",
//!     "playlist": [{ "owner_id": 1, "beatmap_id": 1 }]
//!   }]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::{BeatmapId, DatabaseError, QueueMode, RoomId, UserId};

/// シードの読み込み・適用時のエラー
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse seed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Room {room_id} references unknown beatmap {beatmap_id}")]
    UnknownBeatmap {
        room_id: RoomId,
        beatmap_id: BeatmapId,
    },

    #[error("Room {0} is defined more than once")]
    DuplicateRoom(RoomId),

    #[error("Failed to apply seed: {0}")]
    Database(#[from] DatabaseError),
}

/// シードファイルの内容
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub beatmaps: Vec<SeedBeatmap>,
    #[serde(default)]
    pub rooms: Vec<SeedRoom>,
}

/// カタログに登録するビートマップ
#[derive(Debug, Clone, Deserialize)]
pub struct SeedBeatmap {
    pub beatmap_id: BeatmapId,
    pub checksum: String,
}

/// ルーム
#[derive(Debug, Clone, Deserialize)]
pub struct SeedRoom {
    pub room_id: RoomId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub queue_mode: QueueMode,
    #[serde(default)]
    pub ended: bool,
    /// 初期プレイリスト（記述順が `playlist_order` になる）
    #[serde(default)]
    pub playlist: Vec<SeedPlaylistItem>,
}

/// 初期プレイリストのアイテム（チェックサムはカタログから引く）
#[derive(Debug, Clone, Deserialize)]
pub struct SeedPlaylistItem {
    pub owner_id: UserId,
    pub beatmap_id: BeatmapId,
    #[serde(default)]
    pub ruleset_id: i32,
    #[serde(default)]
    pub expired: bool,
}

impl Seed {
    /// ファイルから読み込む
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let json = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(json)?)
    }
}
