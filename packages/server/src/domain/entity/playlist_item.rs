//! PlaylistItem エンティティ

use serde::{Deserialize, Serialize};

use crate::domain::{
    error::InvalidStateError,
    value_object::{BeatmapId, PlaylistItemId, RoomId, Timestamp, UserId},
};

/// 受け付ける ruleset ID の上限（0..=3 の標準 ruleset のみ）
pub const MAX_LEGACY_RULESET_ID: i32 = 3;

/// キューに積まれたビートマップと ruleset の組
///
/// 作成後に変化するのは `expired` フラグのみ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub id: PlaylistItemId,
    pub owner_id: UserId,
    pub beatmap_id: BeatmapId,
    pub beatmap_checksum: String,
    pub ruleset_id: i32,
    pub expired: bool,
    pub playlist_order: u32,
    pub created_at: Timestamp,
}

impl PlaylistItem {
    /// 永続化済みの `NewPlaylistItem` と採番された ID から作成
    pub fn from_new(id: PlaylistItemId, new_item: NewPlaylistItem) -> Self {
        Self {
            id,
            owner_id: new_item.owner_id,
            beatmap_id: new_item.beatmap_id,
            beatmap_checksum: new_item.beatmap_checksum,
            ruleset_id: new_item.ruleset_id,
            expired: false,
            playlist_order: new_item.playlist_order,
            created_at: new_item.created_at,
        }
    }
}

/// クライアントが追加を要求するアイテム
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistItemRequest {
    pub beatmap_id: BeatmapId,
    pub beatmap_checksum: String,
    #[serde(default)]
    pub ruleset_id: i32,
}

impl PlaylistItemRequest {
    /// ruleset ID が受け付け可能な範囲か検証
    pub fn validate_ruleset(&self) -> Result<(), InvalidStateError> {
        if !(0..=MAX_LEGACY_RULESET_ID).contains(&self.ruleset_id) {
            return Err(InvalidStateError::new(format!(
                "Invalid ruleset {}",
                self.ruleset_id
            )));
        }
        Ok(())
    }

    /// カタログに記録されたチェックサムと照合
    ///
    /// `catalog_checksum` が `None` の場合はビートマップが存在しない。
    pub fn validate_checksum(&self, catalog_checksum: Option<&str>) -> Result<(), InvalidStateError> {
        match catalog_checksum {
            None => Err(InvalidStateError::new(format!(
                "Attempted to add a beatmap which does not exist ({})",
                self.beatmap_id
            ))),
            Some(checksum) if checksum != self.beatmap_checksum => Err(InvalidStateError::new(
                format!(
                    "Attempted to add a beatmap which has been modified ({})",
                    self.beatmap_id
                ),
            )),
            Some(_) => Ok(()),
        }
    }
}

/// 永続化前のアイテム（ID は外部ストアが採番する）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlaylistItem {
    pub room_id: RoomId,
    pub owner_id: UserId,
    pub beatmap_id: BeatmapId,
    pub beatmap_checksum: String,
    pub ruleset_id: i32,
    pub playlist_order: u32,
    pub created_at: Timestamp,
}
