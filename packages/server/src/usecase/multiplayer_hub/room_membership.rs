//! ルームへの参加・退出とホストの移譲

use crate::{
    domain::{
        ClientEvent, MatchProgress, MultiplayerClientState, Room, RoomId, RoomQueue, RoomSettings,
        UserId,
    },
    usecase::{error::HubError, stateful_user_hub::HubCallerContext},
};

use super::MultiplayerHub;

impl MultiplayerHub {
    /// ルームに参加する
    ///
    /// ルームが Hub にまだ存在しなければ、外部ストアから読み込んで作成する。
    /// 参加時点のルームのスナップショットを返す。
    pub async fn join_room(&self, ctx: &HubCallerContext, room_id: RoomId) -> Result<Room, HubError> {
        let mut state = self.users.get_or_create_local_state(ctx).await?;
        if state.item().is_some() {
            return Err(HubError::invalid_state("User is already in a room"));
        }

        let mut usage = self.rooms.get_for_use(room_id, true).await?;
        let mut room = match usage.item() {
            Some(room) => room.clone(),
            None => self.load_room(room_id).await?,
        };

        let member = room.add_member(ctx.user_id, ctx.connection_id.clone())?;
        usage.set_item(room.clone());
        state.set_item(MultiplayerClientState::new(
            ctx.user_id,
            ctx.connection_id.clone(),
            room_id,
        ));
        tracing::info!("User {} joined room {}", ctx.user_id, room_id);

        self.broadcast_to_others(&room, ctx.user_id, ClientEvent::UserJoined { user: member })
            .await;

        Ok(room)
    }

    /// 外部ストアからルームを読み込む
    async fn load_room(&self, room_id: RoomId) -> Result<Room, HubError> {
        let stored = self
            .database
            .get_room(room_id)
            .await?
            .ok_or_else(|| HubError::invalid_state(format!("Room {} does not exist", room_id)))?;
        if stored.ended {
            return Err(HubError::invalid_state(format!(
                "Room {} has already ended",
                room_id
            )));
        }

        let items = self.database.get_all_playlist_items(room_id).await?;
        let current = self
            .database
            .get_candidate_playlist_item_by_expiry(room_id)
            .await?;

        tracing::info!("Loaded room {} ({} playlist items)", room_id, items.len());

        Ok(Room::new(
            room_id,
            RoomSettings {
                name: stored.name,
                playlist_item_id: current.map(|item| item.id),
                queue_mode: stored.queue_mode,
            },
            RoomQueue::new(items),
        ))
    }

    /// 参加中のルームから退出する
    pub async fn leave_room(&self, ctx: &HubCallerContext) -> Result<(), HubError> {
        let state = self.users.get_or_create_local_state(ctx).await?;
        let Some(current) = state.item().cloned() else {
            return Err(HubError::invalid_state("User is not in a room"));
        };

        self.remove_from_room(&current).await?;
        state.destroy();

        Ok(())
    }

    /// ユーザーをルームから削除する
    ///
    /// 退出と切断時の後始末で共通の処理。呼び出し元はユーザーの状態のロックを保持していること。
    pub(super) async fn remove_from_room(
        &self,
        state: &MultiplayerClientState,
    ) -> Result<(), HubError> {
        let mut usage = self.rooms.get_for_use(state.room_id, false).await?;
        let mut room = usage
            .item()
            .cloned()
            .ok_or_else(|| HubError::NotFound(format!("Room {}", state.room_id)))?;

        let removal = room.remove_member(state.user_id, self.options.host_fallback)?;
        tracing::info!("User {} left room {}", state.user_id, state.room_id);

        if room.is_empty() {
            usage.destroy();
            tracing::info!("Room {} closed", state.room_id);
            return Ok(());
        }

        // 抜けたユーザーが最後のロード待ち・プレイ中だった場合に試合を進める
        let progress = room.update_match_progress();
        let mut advance = None;
        if progress == MatchProgress::Completed {
            let mut completed = room.clone();
            match self.complete_match(&mut completed).await {
                Ok(result) => {
                    room = completed;
                    advance = Some(result);
                }
                Err(e) => tracing::warn!(
                    "Room {}: failed to finish playlist item after user left: {}",
                    state.room_id,
                    e
                ),
            }
        }
        usage.set_item(room.clone());

        self.broadcast_to_room(&room, ClientEvent::UserLeft { user: removal.member })
            .await;
        if removal.host_changed
            && let Some(host) = room.host()
        {
            self.broadcast_to_room(&room, ClientEvent::HostChanged { user_id: host })
                .await;
        }
        self.broadcast_match_progress(&room, progress, advance).await;

        Ok(())
    }

    /// ホストを別のメンバーに譲る
    pub async fn transfer_host(&self, ctx: &HubCallerContext, user_id: UserId) -> Result<(), HubError> {
        let mut caller = self.acquire_caller_room(ctx).await?;
        caller.room.transfer_host(ctx.user_id, user_id)?;
        caller.commit();

        self.broadcast_to_room(&caller.room, ClientEvent::HostChanged { user_id })
            .await;
        Ok(())
    }
}
