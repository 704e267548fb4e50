//! MultiplayerHub: マルチプレイのルーム調整
//!
//! クライアントからの呼び出しを受け付け、ルームの状態を変更し、変更をルームのメンバーへ
//! 通知します。
//!
//! ## ロックの順序
//!
//! すべての操作は「呼び出し元の状態 → ルーム」の順で排他アクセスを取得します。
//! 通知はルームのロックを保持したまま、変更後のメンバーに対して行います。
//!
//! ## 変更の確定
//!
//! ルームはコピーに対して変更し、外部ストアの呼び出しがすべて成功してから書き戻します。
//! 途中で失敗した場合、ルームは変更前のまま残ります。

mod match_flow;
mod playlist;
mod room_membership;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use async_trait::async_trait;
use hiroba_shared::time::Clock;

use crate::domain::{
    ClientEvent, ConnectionId, EntityStore, HostFallback, ItemUsage, MatchProgress, MemberState,
    MessagePusher, MultiplayerClientState, MultiplayerDatabase, PusherChannel, QueueAdvance, Room, RoomId,
    ServerRequest, ServerResponse, UserId,
};

use super::{
    error::HubError,
    stateful_user_hub::{HubCallerContext, StateCleaner, StatefulUserHub},
};

/// Hub の動作設定
#[derive(Debug, Clone, Copy, Default)]
pub struct HubOptions {
    /// ホストが抜けた時の後任の選び方
    pub host_fallback: HostFallback,
}

/// マルチプレイのルームを調整する Hub
pub struct MultiplayerHub {
    users: StatefulUserHub<MultiplayerClientState>,
    rooms: EntityStore<RoomId, Room>,
    database: Arc<dyn MultiplayerDatabase>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
    options: HubOptions,
}

/// 呼び出し元の状態とルームの排他アクセス
///
/// `room` はルームのコピーで、`commit` するまでストアには反映されない。
struct CallerRoom {
    /// ルームを変更している間、呼び出し元の状態もロックしておく
    _state: ItemUsage<UserId, MultiplayerClientState>,
    usage: ItemUsage<RoomId, Room>,
    room: Room,
}

impl CallerRoom {
    fn commit(&mut self) {
        self.usage.set_item(self.room.clone());
    }
}

impl MultiplayerHub {
    pub fn new(
        database: Arc<dyn MultiplayerDatabase>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
        options: HubOptions,
    ) -> Self {
        Self {
            users: StatefulUserHub::new(),
            rooms: EntityStore::new(),
            database,
            message_pusher,
            clock,
            options,
        }
    }

    /// 接続時の処理
    ///
    /// 同じユーザーの古い接続が残した状態を後始末してから、送信チャンネルを登録する。
    /// 後始末に失敗した場合は登録しない。
    pub async fn on_connected(
        &self,
        ctx: &HubCallerContext,
        sender: PusherChannel,
    ) -> Result<(), HubError> {
        self.users.on_connected(ctx, self).await?;
        self.message_pusher
            .register_connection(ctx.connection_id.clone(), sender)
            .await;
        tracing::info!(
            "User {} connected (connection '{}')",
            ctx.user_id,
            ctx.connection_id
        );
        Ok(())
    }

    /// 切断時の処理
    ///
    /// この接続が参加していたルームから退出させ、送信チャンネルを削除する。
    pub async fn on_disconnected(&self, ctx: &HubCallerContext) -> Result<(), HubError> {
        let result = self.users.on_disconnected(ctx, self).await;
        self.message_pusher
            .unregister_connection(&ctx.connection_id)
            .await;
        tracing::info!(
            "User {} disconnected (connection '{}')",
            ctx.user_id,
            ctx.connection_id
        );
        result
    }

    /// クライアントからの呼び出しを対応する操作に振り分ける
    pub async fn invoke(
        &self,
        ctx: &HubCallerContext,
        request: ServerRequest,
    ) -> Result<ServerResponse, HubError> {
        tracing::debug!("User {} invoked {:?}", ctx.user_id, request);

        match request {
            ServerRequest::JoinRoom { room_id } => {
                self.join_room(ctx, room_id).await.map(ServerResponse::Room)
            }
            ServerRequest::LeaveRoom => self.leave_room(ctx).await.map(|_| ServerResponse::Unit),
            ServerRequest::TransferHost { user_id } => self
                .transfer_host(ctx, user_id)
                .await
                .map(|_| ServerResponse::Unit),
            ServerRequest::ChangeSettings { settings } => self
                .change_settings(ctx, settings)
                .await
                .map(|_| ServerResponse::Unit),
            ServerRequest::ChangeState { state } => self
                .change_state(ctx, state)
                .await
                .map(|_| ServerResponse::Unit),
            ServerRequest::StartMatch => self.start_match(ctx).await.map(|_| ServerResponse::Unit),
            ServerRequest::AddPlaylistItem { item } => self
                .add_playlist_item(ctx, item)
                .await
                .map(|_| ServerResponse::Unit),
        }
    }

    /// ルームのスナップショットを取得
    pub async fn get_room(&self, room_id: RoomId) -> Result<Room, HubError> {
        let usage = self.rooms.get_for_use(room_id, false).await?;
        usage
            .item()
            .cloned()
            .ok_or_else(|| HubError::NotFound(format!("Room {}", room_id)))
    }

    /// 全ルームのスナップショットを取得（ルーム ID 順）
    ///
    /// 操作中のルームのロックは待たず、直前に確定した内容を返す。
    pub fn get_all_rooms(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self
            .rooms
            .get_all_entities()
            .into_iter()
            .map(|(_, room)| room)
            .collect();
        rooms.sort_by_key(|room| room.room_id());
        rooms
    }

    /// ルームに参加中のユーザーの状態を取得
    pub async fn get_user_state(&self, user_id: UserId) -> Result<MultiplayerClientState, HubError> {
        let usage = self.users.get_state_from_user(user_id).await?;
        usage
            .item()
            .cloned()
            .ok_or_else(|| HubError::NotFound(format!("User {}", user_id)))
    }

    /// ルームに参加中のユーザー数
    pub fn count_active_users(&self) -> usize {
        self.users.get_all_states().len()
    }

    /// 全ルームと全ユーザーの状態を破棄する（テスト・起動処理用）
    pub fn reset(&self) {
        self.users.reset();
        self.rooms.clear();
    }

    /// 呼び出し元の状態と参加中のルームの排他アクセスを取得
    async fn acquire_caller_room(&self, ctx: &HubCallerContext) -> Result<CallerRoom, HubError> {
        let state = self.users.get_or_create_local_state(ctx).await?;
        let room_id = state
            .item()
            .map(|state| state.room_id)
            .ok_or_else(|| HubError::invalid_state("User is not in a room"))?;

        let usage = self.rooms.get_for_use(room_id, false).await?;
        let room = usage
            .item()
            .cloned()
            .ok_or_else(|| HubError::NotFound(format!("Room {}", room_id)))?;

        Ok(CallerRoom {
            _state: state,
            usage,
            room,
        })
    }

    /// 試合の終わったアイテムを消化済みにして永続化する
    ///
    /// `room` はコピーであること。ストアの呼び出しが失敗した場合は呼び出し元で破棄する。
    async fn complete_match(&self, room: &mut Room) -> Result<QueueAdvance, HubError> {
        let advance = room.complete_current_item()?;
        self.database
            .mark_playlist_item_as_played(room.room_id(), advance.expired)
            .await?;
        tracing::info!(
            "Room {}: playlist item {} finished",
            room.room_id(),
            advance.expired
        );
        Ok(advance)
    }

    /// ルームの全メンバーに通知
    async fn broadcast_to_room(&self, room: &Room, event: ClientEvent) {
        self.broadcast_to(room.connection_ids(), event).await;
    }

    /// 指定したユーザー以外のメンバーに通知
    async fn broadcast_to_others(&self, room: &Room, except: UserId, event: ClientEvent) {
        let targets = room
            .users()
            .iter()
            .filter(|member| member.user_id != except)
            .map(|member| member.connection_id().clone())
            .collect();
        self.broadcast_to(targets, event).await;
    }

    /// 特定のメンバーにだけ通知
    async fn push_to_member(&self, connection_id: &ConnectionId, event: ClientEvent) {
        if let Err(e) = self.message_pusher.push_to(connection_id, &event).await {
            tracing::warn!("Failed to push {:?} to '{}': {}", event, connection_id, e);
        }
    }

    async fn broadcast_to(&self, targets: Vec<ConnectionId>, event: ClientEvent) {
        if targets.is_empty() {
            return;
        }
        if let Err(e) = self.message_pusher.broadcast(targets, &event).await {
            tracing::warn!("Failed to broadcast {:?}: {}", event, e);
        }
    }

    /// 試合の進行に応じた通知
    async fn broadcast_match_progress(
        &self,
        room: &Room,
        progress: MatchProgress,
        advance: Option<QueueAdvance>,
    ) {
        match progress {
            MatchProgress::Unchanged => {}
            MatchProgress::Started { players } => {
                for user_id in players {
                    self.broadcast_to_room(
                        room,
                        ClientEvent::UserStateChanged {
                            user_id,
                            state: MemberState::Playing,
                        },
                    )
                    .await;
                }
                self.broadcast_to_room(room, ClientEvent::RoomStateChanged { state: room.state() })
                    .await;
                self.broadcast_to_room(room, ClientEvent::MatchStarted).await;
            }
            MatchProgress::Aborted => {
                self.broadcast_to_room(room, ClientEvent::RoomStateChanged { state: room.state() })
                    .await;
            }
            MatchProgress::Completed => {
                self.broadcast_to_room(room, ClientEvent::RoomStateChanged { state: room.state() })
                    .await;
                self.broadcast_to_room(room, ClientEvent::ResultsReady).await;
                if advance.is_some_and(|advance| advance.next.is_some()) {
                    self.broadcast_to_room(
                        room,
                        ClientEvent::SettingsChanged {
                            settings: room.settings().clone(),
                        },
                    )
                    .await;
                }
            }
        }
    }
}

#[async_trait]
impl StateCleaner<MultiplayerClientState> for MultiplayerHub {
    /// 古い接続の状態を破棄する前に、その接続をルームから退出させる
    async fn clean_up_state(&self, state: &MultiplayerClientState) -> Result<(), HubError> {
        self.remove_from_room(state).await
    }
}
