//! 試合の進行（メンバーの状態変更、試合開始、設定変更）

use crate::{
    domain::{ClientEvent, MatchProgress, MemberState, RoomSettings, RoomState},
    usecase::{error::HubError, stateful_user_hub::HubCallerContext},
};

use super::MultiplayerHub;

impl MultiplayerHub {
    /// 呼び出し元の試合状態を変更する
    ///
    /// 変更の結果、全員のロードが終わった・全員がプレイを終えた場合は試合を進める。
    pub async fn change_state(
        &self,
        ctx: &HubCallerContext,
        new_state: MemberState,
    ) -> Result<(), HubError> {
        let mut caller = self.acquire_caller_room(ctx).await?;
        if !caller.room.change_member_state(ctx.user_id, new_state)? {
            return Ok(());
        }

        let progress = caller.room.update_match_progress();
        let advance = match progress {
            MatchProgress::Completed => Some(self.complete_match(&mut caller.room).await?),
            _ => None,
        };
        caller.commit();

        self.broadcast_to_room(
            &caller.room,
            ClientEvent::UserStateChanged {
                user_id: ctx.user_id,
                state: new_state,
            },
        )
        .await;
        self.broadcast_match_progress(&caller.room, progress, advance)
            .await;

        Ok(())
    }

    /// 試合を開始する（ホストのみ）
    ///
    /// Ready のメンバーにだけロードを要求する。
    pub async fn start_match(&self, ctx: &HubCallerContext) -> Result<(), HubError> {
        let mut caller = self.acquire_caller_room(ctx).await?;
        let players = caller.room.start_match(ctx.user_id)?;
        caller.commit();
        tracing::info!(
            "Room {}: match started with {} players",
            caller.room.room_id(),
            players.len()
        );

        for user_id in &players {
            self.broadcast_to_room(
                &caller.room,
                ClientEvent::UserStateChanged {
                    user_id: *user_id,
                    state: MemberState::WaitingForLoad,
                },
            )
            .await;
        }
        self.broadcast_to_room(
            &caller.room,
            ClientEvent::RoomStateChanged {
                state: RoomState::WaitingForLoad,
            },
        )
        .await;

        for member in caller
            .room
            .users()
            .iter()
            .filter(|member| players.contains(&member.user_id))
        {
            self.push_to_member(member.connection_id(), ClientEvent::LoadRequested)
                .await;
        }

        Ok(())
    }

    /// ルームの設定を変更する（ホストのみ）
    pub async fn change_settings(
        &self,
        ctx: &HubCallerContext,
        settings: RoomSettings,
    ) -> Result<(), HubError> {
        let mut caller = self.acquire_caller_room(ctx).await?;
        if !caller.room.change_settings(ctx.user_id, settings)? {
            return Ok(());
        }
        caller.commit();

        self.broadcast_to_room(
            &caller.room,
            ClientEvent::SettingsChanged {
                settings: caller.room.settings().clone(),
            },
        )
        .await;

        Ok(())
    }
}
