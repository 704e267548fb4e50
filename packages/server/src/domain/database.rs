//! 外部ストア（ルーム・プレイリストの永続化とビートマップカタログ）の trait 定義
//!
//! 具体的な実装は Infrastructure 層が提供します。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    entity::{NewPlaylistItem, PlaylistItem, QueueMode},
    error::DatabaseError,
    value_object::{BeatmapId, PlaylistItemId, RoomId},
};

/// ストアに保存されているルームの情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRoom {
    pub room_id: RoomId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub queue_mode: QueueMode,
    /// 終了済みのルームには参加できない
    #[serde(default)]
    pub ended: bool,
}

/// マルチプレイ用の外部ストア
///
/// UseCase 層はこの trait に依存し、具体的な実装には依存しない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MultiplayerDatabase: Send + Sync {
    /// ルームを取得（存在しなければ `None`）
    async fn get_room(&self, room_id: RoomId) -> Result<Option<DatabaseRoom>, DatabaseError>;

    /// ビートマップのチェックサムを取得（カタログに存在しなければ `None`）
    async fn get_beatmap_checksum(
        &self,
        beatmap_id: BeatmapId,
    ) -> Result<Option<String>, DatabaseError>;

    /// ルームのプレイリストアイテムをすべて取得（消化済みを含む）
    async fn get_all_playlist_items(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<PlaylistItem>, DatabaseError>;

    /// 最も早く作成された未消化アイテムを取得
    async fn get_candidate_playlist_item_by_expiry(
        &self,
        room_id: RoomId,
    ) -> Result<Option<PlaylistItem>, DatabaseError>;

    /// プレイリストアイテムを保存し、採番した ID を返す
    async fn add_playlist_item(
        &self,
        item: NewPlaylistItem,
    ) -> Result<PlaylistItemId, DatabaseError>;

    /// アイテムを消化済みにする
    async fn mark_playlist_item_as_played(
        &self,
        room_id: RoomId,
        item_id: PlaylistItemId,
    ) -> Result<(), DatabaseError>;
}
