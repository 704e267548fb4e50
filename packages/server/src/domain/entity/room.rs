//! Room エンティティ
//!
//! マルチプレイのルーム。メンバー、ホスト、設定、試合の進行状態と
//! プレイリスト（キュー）を所有します。
//!
//! ## 試合の流れ
//!
//! ```text
//! メンバー: Idle ⇄ Ready ─(StartMatch)→ WaitingForLoad → Loaded ─(全員ロード完了)→ Playing
//!             ↑                                                               │
//!             └──────────────── FinishedPlay ←────────────────────────────────┘
//!
//! ルーム:   Idle → WaitingForLoad → Playing → Idle（結果発表） … 空になると Closed
//! ```
//!
//! このモジュールの操作はすべて同期的な純粋ロジックです。ロックやブロードキャストは
//! UseCase 層（`MultiplayerHub`）が担当します。

use serde::{Deserialize, Serialize};

use super::{
    playlist_item::PlaylistItem,
    queue::{QueueAdvance, QueueMode, RoomQueue},
};
use crate::domain::{
    error::InvalidStateError,
    value_object::{ConnectionId, PlaylistItemId, RoomId, UserId},
};

/// ルームの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoomState {
    #[default]
    Idle,
    WaitingForLoad,
    Playing,
    Closed,
}

/// メンバーごとの試合状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MemberState {
    #[default]
    Idle,
    Ready,
    WaitingForLoad,
    Loaded,
    Playing,
    FinishedPlay,
}

/// ホストが抜けた時の後任の選び方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostFallback {
    /// 残っているメンバーのうち最も早く参加した人
    #[default]
    EarliestJoined,
    /// 残っているメンバーのうち最も遅く参加した人
    LatestJoined,
}

/// ルーム設定
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomSettings {
    #[serde(default)]
    pub name: String,
    /// 現在のプレイリストアイテム
    #[serde(default)]
    pub playlist_item_id: Option<PlaylistItemId>,
    #[serde(default)]
    pub queue_mode: QueueMode,
}

/// ルームのメンバー
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomMember {
    pub user_id: UserId,
    pub state: MemberState,
    /// 通知先の接続（クライアントには公開しない）
    #[serde(skip)]
    connection_id: ConnectionId,
}

impl RoomMember {
    pub fn new(user_id: UserId, connection_id: ConnectionId) -> Self {
        Self {
            user_id,
            state: MemberState::Idle,
            connection_id,
        }
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }
}

/// メンバー削除の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRemoval {
    pub member: RoomMember,
    /// ホストが変わったか（新しいホストは `Room::host()` で参照する）
    pub host_changed: bool,
}

/// 状態遷移後の試合の進行
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchProgress {
    Unchanged,
    /// 全員のロードが終わり、試合が始まった
    Started { players: Vec<UserId> },
    /// ロード待ちの全員が抜けたため、試合を取りやめた
    Aborted,
    /// 全員がプレイを終えた
    Completed,
}

/// マルチプレイのルーム
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    room_id: RoomId,
    host: Option<UserId>,
    state: RoomState,
    settings: RoomSettings,
    users: Vec<RoomMember>,
    playlist: RoomQueue,
}

impl Room {
    /// 新しいルームを作成（メンバーなし、Idle 状態）
    pub fn new(room_id: RoomId, settings: RoomSettings, playlist: RoomQueue) -> Self {
        Self {
            room_id,
            host: None,
            state: RoomState::Idle,
            settings,
            users: Vec::new(),
            playlist,
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn host(&self) -> Option<UserId> {
        self.host
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    pub fn users(&self) -> &[RoomMember] {
        &self.users
    }

    pub fn playlist(&self) -> &RoomQueue {
        &self.playlist
    }

    pub fn member(&self, user_id: UserId) -> Option<&RoomMember> {
        self.users.iter().find(|member| member.user_id == user_id)
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// 全メンバーの通知先
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.users
            .iter()
            .map(|member| member.connection_id.clone())
            .collect()
    }

    /// 現在のプレイリストアイテム
    pub fn current_playlist_item(&self) -> Option<&PlaylistItem> {
        self.settings
            .playlist_item_id
            .and_then(|id| self.playlist.get(id))
    }

    fn any_member_in(&self, state: MemberState) -> bool {
        self.users.iter().any(|member| member.state == state)
    }

    fn ensure_host(&self, user_id: UserId, action: &str) -> Result<(), InvalidStateError> {
        if self.host != Some(user_id) {
            return Err(InvalidStateError::new(format!(
                "Only the host can {}",
                action
            )));
        }
        Ok(())
    }

    /// メンバーを追加する。ホストがいなければ追加したメンバーがホストになる
    pub fn add_member(
        &mut self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Result<RoomMember, InvalidStateError> {
        if self.state == RoomState::Closed {
            return Err(InvalidStateError::new("Room is closed"));
        }
        if self.member(user_id).is_some() {
            return Err(InvalidStateError::new("User is already in the room"));
        }

        let member = RoomMember::new(user_id, connection_id);
        self.users.push(member.clone());
        if self.host.is_none() {
            self.host = Some(user_id);
        }
        Ok(member)
    }

    /// メンバーを削除する
    ///
    /// ホストが抜けた場合は `fallback` に従って後任を選ぶ。最後のメンバーが抜けると
    /// ルームは Closed になる。
    pub fn remove_member(
        &mut self,
        user_id: UserId,
        fallback: HostFallback,
    ) -> Result<MemberRemoval, InvalidStateError> {
        let index = self
            .users
            .iter()
            .position(|member| member.user_id == user_id)
            .ok_or_else(|| InvalidStateError::new("User is not in the room"))?;
        let member = self.users.remove(index);

        let host_changed = self.host == Some(user_id);
        if host_changed {
            let successor = match fallback {
                HostFallback::EarliestJoined => self.users.first(),
                HostFallback::LatestJoined => self.users.last(),
            };
            self.host = successor.map(|member| member.user_id);
        }

        if self.users.is_empty() {
            self.state = RoomState::Closed;
        }

        Ok(MemberRemoval {
            member,
            host_changed,
        })
    }

    /// ホストを別のメンバーに譲る
    pub fn transfer_host(&mut self, caller: UserId, target: UserId) -> Result<(), InvalidStateError> {
        self.ensure_host(caller, "transfer host")?;
        if self.member(target).is_none() {
            return Err(InvalidStateError::new(format!(
                "User {} is not in the room",
                target
            )));
        }
        self.host = Some(target);
        Ok(())
    }

    /// 設定を変更する（ホストのみ、Idle 中のみ）
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - 設定が変わった
    /// * `Ok(false)` - 変更なし
    pub fn change_settings(
        &mut self,
        caller: UserId,
        settings: RoomSettings,
    ) -> Result<bool, InvalidStateError> {
        self.ensure_host(caller, "change settings")?;
        if self.state != RoomState::Idle {
            return Err(InvalidStateError::new(
                "Cannot change settings while a match is in progress",
            ));
        }

        let mut next = settings;
        match next.playlist_item_id {
            Some(id) if Some(id) != self.settings.playlist_item_id => {
                if !self.playlist.is_playable(id) {
                    return Err(InvalidStateError::new(format!(
                        "Playlist item {} is not available",
                        id
                    )));
                }
            }
            Some(_) => {}
            None => next.playlist_item_id = self.settings.playlist_item_id,
        }

        if let Some(replacement) =
            self.playlist
                .replacement_for(next.queue_mode, next.playlist_item_id, None)
        {
            next.playlist_item_id = Some(replacement);
        }

        if next == self.settings {
            return Ok(false);
        }
        self.settings = next;
        Ok(true)
    }

    /// メンバーの試合状態を変更する（クライアントからの要求）
    ///
    /// 許可される遷移:
    ///
    /// - Idle → Ready（ルームが Idle の時）
    /// - Ready → Idle
    /// - WaitingForLoad → Loaded（ルームが WaitingForLoad の時）
    /// - Playing → FinishedPlay（ルームが Playing の時）
    /// - FinishedPlay → Idle
    ///
    /// 同じ状態への変更は何もしない（`Ok(false)`）。
    pub fn change_member_state(
        &mut self,
        user_id: UserId,
        new_state: MemberState,
    ) -> Result<bool, InvalidStateError> {
        let room_state = self.state;
        let member = self
            .users
            .iter_mut()
            .find(|member| member.user_id == user_id)
            .ok_or_else(|| InvalidStateError::new("User is not in the room"))?;

        let old_state = member.state;
        if old_state == new_state {
            return Ok(false);
        }

        let legal = match (old_state, new_state) {
            (MemberState::Idle, MemberState::Ready) => room_state == RoomState::Idle,
            (MemberState::Ready, MemberState::Idle) => true,
            (MemberState::WaitingForLoad, MemberState::Loaded) => {
                room_state == RoomState::WaitingForLoad
            }
            (MemberState::Playing, MemberState::FinishedPlay) => room_state == RoomState::Playing,
            (MemberState::FinishedPlay, MemberState::Idle) => true,
            _ => false,
        };
        if !legal {
            return Err(InvalidStateError::new(format!(
                "Cannot change user state from {:?} to {:?} while the room is {:?}",
                old_state, new_state, room_state
            )));
        }

        member.state = new_state;
        Ok(true)
    }

    /// 試合を開始する（ホストのみ）
    ///
    /// Ready のメンバーを WaitingForLoad にし、ロードを要求する対象を返す。
    pub fn start_match(&mut self, caller: UserId) -> Result<Vec<UserId>, InvalidStateError> {
        self.ensure_host(caller, "start the match")?;
        if self.state != RoomState::Idle {
            return Err(InvalidStateError::new(format!(
                "Cannot start a match while the room is {:?}",
                self.state
            )));
        }
        if !self
            .settings
            .playlist_item_id
            .is_some_and(|id| self.playlist.is_playable(id))
        {
            return Err(InvalidStateError::new("No playlist item is available to play"));
        }

        let ready: Vec<UserId> = self
            .users
            .iter()
            .filter(|member| member.state == MemberState::Ready)
            .map(|member| member.user_id)
            .collect();
        if ready.is_empty() {
            return Err(InvalidStateError::new("Can't start match when no users are ready"));
        }

        for member in self
            .users
            .iter_mut()
            .filter(|member| member.state == MemberState::Ready)
        {
            member.state = MemberState::WaitingForLoad;
        }
        self.state = RoomState::WaitingForLoad;

        Ok(ready)
    }

    /// メンバーの状態に応じてルームの状態を進める
    ///
    /// 状態変更やメンバーの離脱の後に呼び出す。
    pub fn update_match_progress(&mut self) -> MatchProgress {
        let still_loading = self.any_member_in(MemberState::WaitingForLoad);
        let still_playing = self.any_member_in(MemberState::Playing);

        match self.state {
            RoomState::WaitingForLoad if !still_loading => {
                let players: Vec<UserId> = self
                    .users
                    .iter()
                    .filter(|member| member.state == MemberState::Loaded)
                    .map(|member| member.user_id)
                    .collect();

                if players.is_empty() {
                    self.state = RoomState::Idle;
                    return MatchProgress::Aborted;
                }

                for member in self
                    .users
                    .iter_mut()
                    .filter(|member| member.state == MemberState::Loaded)
                {
                    member.state = MemberState::Playing;
                }
                self.state = RoomState::Playing;
                MatchProgress::Started { players }
            }
            RoomState::Playing if !still_playing => {
                self.state = RoomState::Idle;
                MatchProgress::Completed
            }
            _ => MatchProgress::Unchanged,
        }
    }

    /// 試合が終わった現在のアイテムを消化済みにし、キューを進める
    pub fn complete_current_item(&mut self) -> Result<QueueAdvance, InvalidStateError> {
        let current = self
            .settings
            .playlist_item_id
            .ok_or_else(|| InvalidStateError::new("Room has no current playlist item"))?;

        let advance = self.playlist.advance(self.settings.queue_mode, current)?;
        if let Some(next) = advance.next {
            self.settings.playlist_item_id = Some(next);
        }
        Ok(advance)
    }

    /// アイテムを追加できるか（ホストのみモードではホストだけ）
    pub fn ensure_can_add_items(&self, user_id: UserId) -> Result<(), InvalidStateError> {
        if self.member(user_id).is_none() {
            return Err(InvalidStateError::new("User is not in the room"));
        }
        if self.settings.queue_mode == QueueMode::HostOnly {
            self.ensure_host(user_id, "add items in host-only mode")?;
        }
        Ok(())
    }

    /// アイテムをキューに追加する
    ///
    /// 現在のアイテムがない（または消化済み）場合は差し替え、新しい現在のアイテムを返す。
    pub fn add_playlist_item(&mut self, item: PlaylistItem) -> Option<PlaylistItemId> {
        let added = item.id;
        self.playlist.add(item);

        let replacement = self.playlist.replacement_for(
            self.settings.queue_mode,
            self.settings.playlist_item_id,
            Some(added),
        );
        if let Some(id) = replacement {
            self.settings.playlist_item_id = Some(id);
        }
        replacement
    }
}
