//! インメモリの MultiplayerDatabase 実装
//!
//! ルーム、プレイリスト、ビートマップカタログをプロセス内のマップで保持します。
//! 再起動すると内容は失われます。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::seed::{Seed, SeedError};
use crate::domain::{
    BeatmapId, DatabaseError, DatabaseRoom, MultiplayerDatabase, NewPlaylistItem, PlaylistItem,
    PlaylistItemId, RoomId, Timestamp,
};

#[derive(Debug)]
struct DatabaseState {
    rooms: HashMap<RoomId, DatabaseRoom>,
    beatmaps: HashMap<BeatmapId, String>,
    playlist_items: HashMap<RoomId, Vec<PlaylistItem>>,
    next_item_id: i64,
}

impl Default for DatabaseState {
    fn default() -> Self {
        Self {
            rooms: HashMap::new(),
            beatmaps: HashMap::new(),
            playlist_items: HashMap::new(),
            next_item_id: 1,
        }
    }
}

impl DatabaseState {
    fn insert_playlist_item(
        &mut self,
        item: NewPlaylistItem,
    ) -> Result<PlaylistItemId, DatabaseError> {
        if !self.rooms.contains_key(&item.room_id) {
            return Err(DatabaseError::NotFound(format!("Room {}", item.room_id)));
        }

        let id = PlaylistItemId::new(self.next_item_id);
        self.next_item_id += 1;
        self.playlist_items
            .entry(item.room_id)
            .or_default()
            .push(PlaylistItem::from_new(id, item));
        Ok(id)
    }

    fn find_item_mut(
        &mut self,
        room_id: RoomId,
        item_id: PlaylistItemId,
    ) -> Result<&mut PlaylistItem, DatabaseError> {
        self.playlist_items
            .get_mut(&room_id)
            .and_then(|items| items.iter_mut().find(|item| item.id == item_id))
            .ok_or_else(|| {
                DatabaseError::NotFound(format!("Playlist item {} in room {}", item_id, room_id))
            })
    }
}

/// インメモリの外部ストア
#[derive(Debug, Default)]
pub struct InMemoryMultiplayerDatabase {
    state: Mutex<DatabaseState>,
}

impl InMemoryMultiplayerDatabase {
    /// 空のストアを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// シードからストアを作成
    ///
    /// # Arguments
    ///
    /// * `seed` - 初期データ
    /// * `created_at` - 初期プレイリストのアイテムに記録する作成時刻
    pub fn from_seed(seed: &Seed, created_at: Timestamp) -> Result<Self, SeedError> {
        let mut state = DatabaseState::default();

        for beatmap in &seed.beatmaps {
            state
                .beatmaps
                .insert(beatmap.beatmap_id, beatmap.checksum.clone());
        }

        for room in &seed.rooms {
            if state.rooms.contains_key(&room.room_id) {
                return Err(SeedError::DuplicateRoom(room.room_id));
            }
            state.rooms.insert(
                room.room_id,
                DatabaseRoom {
                    room_id: room.room_id,
                    name: room.name.clone(),
                    queue_mode: room.queue_mode,
                    ended: room.ended,
                },
            );

            for (order, entry) in room.playlist.iter().enumerate() {
                let checksum = state.beatmaps.get(&entry.beatmap_id).cloned().ok_or(
                    SeedError::UnknownBeatmap {
                        room_id: room.room_id,
                        beatmap_id: entry.beatmap_id,
                    },
                )?;
                let item = NewPlaylistItem {
                    room_id: room.room_id,
                    owner_id: entry.owner_id,
                    beatmap_id: entry.beatmap_id,
                    beatmap_checksum: checksum,
                    ruleset_id: entry.ruleset_id,
                    playlist_order: order as u32,
                    created_at,
                };
                let id = state.insert_playlist_item(item)?;
                if entry.expired {
                    state.find_item_mut(room.room_id, id)?.expired = true;
                }
            }
        }

        tracing::info!(
            "Seeded {} rooms and {} beatmaps",
            state.rooms.len(),
            state.beatmaps.len()
        );

        Ok(Self {
            state: Mutex::new(state),
        })
    }

    /// ルームを登録（既存のものは置き換える）
    pub async fn insert_room(&self, room: DatabaseRoom) {
        let mut state = self.state.lock().await;
        state.rooms.insert(room.room_id, room);
    }

    /// ビートマップをカタログに登録
    pub async fn insert_beatmap(&self, beatmap_id: BeatmapId, checksum: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.beatmaps.insert(beatmap_id, checksum.into());
    }
}

#[async_trait]
impl MultiplayerDatabase for InMemoryMultiplayerDatabase {
    async fn get_room(&self, room_id: RoomId) -> Result<Option<DatabaseRoom>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state.rooms.get(&room_id).cloned())
    }

    async fn get_beatmap_checksum(
        &self,
        beatmap_id: BeatmapId,
    ) -> Result<Option<String>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state.beatmaps.get(&beatmap_id).cloned())
    }

    async fn get_all_playlist_items(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<PlaylistItem>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state
            .playlist_items
            .get(&room_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_candidate_playlist_item_by_expiry(
        &self,
        room_id: RoomId,
    ) -> Result<Option<PlaylistItem>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state.playlist_items.get(&room_id).and_then(|items| {
            items
                .iter()
                .filter(|item| !item.expired)
                .min_by_key(|item| (item.created_at, item.id))
                .cloned()
        }))
    }

    async fn add_playlist_item(
        &self,
        item: NewPlaylistItem,
    ) -> Result<PlaylistItemId, DatabaseError> {
        let mut state = self.state.lock().await;
        let id = state.insert_playlist_item(item)?;
        tracing::debug!("Stored playlist item {}", id);
        Ok(id)
    }

    async fn mark_playlist_item_as_played(
        &self,
        room_id: RoomId,
        item_id: PlaylistItemId,
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().await;
        state.find_item_mut(room_id, item_id)?.expired = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QueueMode, UserId};

    const SEED: &str = r#"{
        "beatmaps": [
            {"beatmap_id": 10, "checksum": "ten"},
            {"beatmap_id": 20, "checksum": "twenty"}
        ],
        "rooms": [
            {
                "room_id": 1,
                "name": "first",
                "queue_mode": "all_players",
                "playlist": [
                    {"owner_id": 1, "beatmap_id": 10, "expired": true},
                    {"owner_id": 1, "beatmap_id": 20}
                ]
            },
            {"room_id": 2, "ended": true}
        ]
    }"#;

    fn create_test_database() -> InMemoryMultiplayerDatabase {
        let seed = Seed::from_json(SEED).unwrap();
        InMemoryMultiplayerDatabase::from_seed(&seed, Timestamp::new(1_000)).unwrap()
    }

    fn new_item(room_id: i64, created_at: i64) -> NewPlaylistItem {
        NewPlaylistItem {
            room_id: RoomId::new(room_id),
            owner_id: UserId::new(1),
            beatmap_id: BeatmapId::new(10),
            beatmap_checksum: "ten".to_string(),
            ruleset_id: 0,
            playlist_order: 5,
            created_at: Timestamp::new(created_at),
        }
    }

    #[tokio::test]
    async fn test_seeded_rooms_and_catalog() {
        // テスト項目: シードのルーム・カタログ・プレイリストが読み込まれる
        // given (前提条件):
        let database = create_test_database();

        // when (操作):
        let room = database.get_room(RoomId::new(1)).await.unwrap().unwrap();
        let ended = database.get_room(RoomId::new(2)).await.unwrap().unwrap();
        let items = database.get_all_playlist_items(RoomId::new(1)).await.unwrap();
        let checksum = database.get_beatmap_checksum(BeatmapId::new(20)).await.unwrap();

        // then (期待する結果):
        assert_eq!(room.name, "first");
        assert_eq!(room.queue_mode, QueueMode::AllPlayers);
        assert!(ended.ended);
        assert_eq!(items.len(), 2);
        assert!(items[0].expired);
        assert_eq!(items[1].playlist_order, 1);
        assert_eq!(checksum.as_deref(), Some("twenty"));
        assert_eq!(
            database.get_beatmap_checksum(BeatmapId::new(99)).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_candidate_skips_expired_items() {
        // テスト項目: 候補は未消化のうち最も早く作成されたアイテム
        // given (前提条件):
        let database = create_test_database();

        // when (操作):
        let candidate = database
            .get_candidate_playlist_item_by_expiry(RoomId::new(1))
            .await
            .unwrap()
            .unwrap();

        // then (期待する結果):
        assert_eq!(candidate.beatmap_id, BeatmapId::new(20));
    }

    #[tokio::test]
    async fn test_add_item_assigns_sequential_ids() {
        // テスト項目: 追加したアイテムには連番の ID が採番される
        // given (前提条件):
        let database = create_test_database();

        // when (操作):
        let first = database.add_playlist_item(new_item(1, 2_000)).await.unwrap();
        let second = database.add_playlist_item(new_item(1, 3_000)).await.unwrap();

        // then (期待する結果):
        assert_eq!(second.value(), first.value() + 1);
        assert_eq!(
            database.get_all_playlist_items(RoomId::new(1)).await.unwrap().len(),
            4
        );
    }

    #[tokio::test]
    async fn test_add_item_to_unknown_room_fails() {
        // テスト項目: 存在しないルームへのアイテム追加は NotFound
        // given (前提条件):
        let database = InMemoryMultiplayerDatabase::new();

        // when (操作):
        let result = database.add_playlist_item(new_item(42, 0)).await;

        // then (期待する結果):
        assert!(matches!(result, Err(DatabaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_mark_item_as_played() {
        // テスト項目: 消化済みにしたアイテムは候補から外れる
        // given (前提条件):
        let database = create_test_database();
        let candidate = database
            .get_candidate_playlist_item_by_expiry(RoomId::new(1))
            .await
            .unwrap()
            .unwrap();

        // when (操作):
        database
            .mark_playlist_item_as_played(RoomId::new(1), candidate.id)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(
            database
                .get_candidate_playlist_item_by_expiry(RoomId::new(1))
                .await
                .unwrap(),
            None
        );
        assert!(
            database
                .mark_playlist_item_as_played(RoomId::new(1), PlaylistItemId::new(99))
                .await
                .is_err()
        );
    }

    #[test]
    fn test_seed_with_unknown_beatmap_fails() {
        // テスト項目: カタログにないビートマップを含むシードはエラー
        // given (前提条件):
        let seed = Seed::from_json(
            r#"{"rooms": [{"room_id": 1, "playlist": [{"owner_id": 1, "beatmap_id": 5}]}]}"#,
        )
        .unwrap();

        // when (操作):
        let result = InMemoryMultiplayerDatabase::from_seed(&seed, Timestamp::new(0));

        // then (期待する結果):
        assert!(matches!(result, Err(SeedError::UnknownBeatmap { .. })));
    }

    #[test]
    fn test_seed_with_duplicate_room_fails() {
        // テスト項目: 同じルーム ID が 2 回定義されたシードはエラー
        // given (前提条件):
        let seed = Seed::from_json(r#"{"rooms": [{"room_id": 1}, {"room_id": 1}]}"#).unwrap();

        // when (操作):
        let result = InMemoryMultiplayerDatabase::from_seed(&seed, Timestamp::new(0));

        // then (期待する結果):
        assert!(matches!(result, Err(SeedError::DuplicateRoom(_))));
    }

    #[tokio::test]
    async fn test_seeded_expired_flags_apply_to_their_own_room() {
        // テスト項目: シードの消化済みフラグは各ルームのアイテムにだけ適用され、ID は通しで採番される
        // given (前提条件):
        let seed = Seed::from_json(
            r#"{
                "beatmaps": [{"beatmap_id": 10, "checksum": "ten"}],
                "rooms": [
                    {"room_id": 1, "playlist": [{"owner_id": 1, "beatmap_id": 10}]},
                    {"room_id": 2, "playlist": [
                        {"owner_id": 1, "beatmap_id": 10, "expired": true},
                        {"owner_id": 2, "beatmap_id": 10}
                    ]}
                ]
            }"#,
        )
        .unwrap();

        // when (操作):
        let database = InMemoryMultiplayerDatabase::from_seed(&seed, Timestamp::new(0)).unwrap();

        // then (期待する結果):
        let first = database.get_all_playlist_items(RoomId::new(1)).await.unwrap();
        let second = database.get_all_playlist_items(RoomId::new(2)).await.unwrap();
        assert_eq!(first[0].id, PlaylistItemId::new(1));
        assert!(!first[0].expired);
        assert_eq!(
            second.iter().map(|item| (item.id, item.expired)).collect::<Vec<_>>(),
            vec![(PlaylistItemId::new(2), true), (PlaylistItemId::new(3), false)]
        );
    }

    #[test]
    fn test_store_error_while_seeding_is_reported() {
        // テスト項目: シード適用中のストアのエラーは SeedError として返される
        // given (前提条件):
        let error = DatabaseError::NotFound("Room 1".to_string());

        // when (操作):
        let seed_error = SeedError::from(error);

        // then (期待する結果):
        assert!(matches!(seed_error, SeedError::Database(DatabaseError::NotFound(_))));
        assert_eq!(seed_error.to_string(), "Failed to apply seed: Record not found: Room 1");
    }
}
