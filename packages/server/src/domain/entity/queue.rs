//! RoomQueue: ルームのプレイリストと「現在のアイテム」の選択ポリシー

use serde::{Deserialize, Serialize};

use super::playlist_item::PlaylistItem;
use crate::domain::{error::InvalidStateError, value_object::PlaylistItemId};

/// キューの運用モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    /// ホストだけがアイテムを追加し、明示的に次へ進める
    #[default]
    HostOnly,
    /// 全員がアイテムを追加でき、試合後は最も古い未消化アイテムへ自動で進む
    AllPlayers,
}

/// 試合終了時のキュー更新結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueAdvance {
    /// 消化済みになったアイテム
    pub expired: PlaylistItemId,
    /// 新しく現在のアイテムになったもの（変化なしなら `None`）
    pub next: Option<PlaylistItemId>,
}

/// ルームのプレイリスト
///
/// 消化済みのアイテムも履歴として保持し、`expired` フラグで区別する。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoomQueue {
    items: Vec<PlaylistItem>,
}

impl RoomQueue {
    /// 既存のアイテムからキューを作成（`playlist_order` 順に並べる）
    pub fn new(mut items: Vec<PlaylistItem>) -> Self {
        items.sort_by_key(|item| (item.playlist_order, item.id));
        Self { items }
    }

    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }

    pub fn get(&self, id: PlaylistItemId) -> Option<&PlaylistItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// 未消化のアイテムとして存在するか
    pub fn is_playable(&self, id: PlaylistItemId) -> bool {
        self.get(id).is_some_and(|item| !item.expired)
    }

    /// 次に追加するアイテムの `playlist_order`
    pub fn next_playlist_order(&self) -> u32 {
        self.items
            .iter()
            .map(|item| item.playlist_order + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn add(&mut self, item: PlaylistItem) {
        self.items.push(item);
    }

    /// 最も早く作成された未消化アイテム（同時刻なら ID の小さい方）
    pub fn candidate(&self) -> Option<&PlaylistItem> {
        self.items
            .iter()
            .filter(|item| !item.expired)
            .min_by_key(|item| (item.created_at, item.id))
    }

    /// 現在のアイテムを差し替えるべきか判定する
    ///
    /// 現在のアイテムが未消化ならそのまま。そうでなければ、ホストのみモードでは
    /// 直前に追加されたアイテム、全員モードでは候補アイテムを返す。
    pub fn replacement_for(
        &self,
        mode: QueueMode,
        current: Option<PlaylistItemId>,
        just_added: Option<PlaylistItemId>,
    ) -> Option<PlaylistItemId> {
        if current.is_some_and(|id| self.is_playable(id)) {
            return None;
        }

        match mode {
            QueueMode::HostOnly => just_added.filter(|id| self.is_playable(*id)),
            QueueMode::AllPlayers => self.candidate().map(|item| item.id),
        }
    }

    /// 試合が終わったアイテムを消化済みにし、モードに応じて次のアイテムを選ぶ
    pub fn advance(
        &mut self,
        mode: QueueMode,
        current: PlaylistItemId,
    ) -> Result<QueueAdvance, InvalidStateError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == current)
            .ok_or_else(|| {
                InvalidStateError::new(format!("Playlist item {} is not in the queue", current))
            })?;
        item.expired = true;

        let next = match mode {
            QueueMode::HostOnly => None,
            QueueMode::AllPlayers => self.candidate().map(|item| item.id),
        };

        Ok(QueueAdvance {
            expired: current,
            next,
        })
    }
}
