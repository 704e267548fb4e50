//! プレイリストへのアイテム追加

use crate::{
    domain::{ClientEvent, NewPlaylistItem, PlaylistItem, PlaylistItemRequest, Timestamp},
    usecase::{error::HubError, stateful_user_hub::HubCallerContext},
};

use super::MultiplayerHub;

impl MultiplayerHub {
    /// プレイリストにアイテムを追加する
    ///
    /// ruleset とビートマップの検証はロックを取得する前に行う。アイテムは外部ストアに
    /// 保存して ID が採番されてから、ルームのキューに追加される。
    pub async fn add_playlist_item(
        &self,
        ctx: &HubCallerContext,
        request: PlaylistItemRequest,
    ) -> Result<(), HubError> {
        request.validate_ruleset()?;
        let checksum = self
            .database
            .get_beatmap_checksum(request.beatmap_id)
            .await?;
        request.validate_checksum(checksum.as_deref())?;

        let mut caller = self.acquire_caller_room(ctx).await?;
        caller.room.ensure_can_add_items(ctx.user_id)?;

        let new_item = NewPlaylistItem {
            room_id: caller.room.room_id(),
            owner_id: ctx.user_id,
            beatmap_id: request.beatmap_id,
            beatmap_checksum: request.beatmap_checksum,
            ruleset_id: request.ruleset_id,
            playlist_order: caller.room.playlist().next_playlist_order(),
            created_at: Timestamp::new(self.clock.now_millis()),
        };
        let id = self.database.add_playlist_item(new_item.clone()).await?;
        let item = PlaylistItem::from_new(id, new_item);

        let promoted = caller.room.add_playlist_item(item.clone());
        caller.commit();
        tracing::info!(
            "Room {}: user {} added playlist item {}",
            caller.room.room_id(),
            ctx.user_id,
            id
        );

        self.broadcast_to_room(&caller.room, ClientEvent::PlaylistItemAdded { item })
            .await;
        if promoted.is_some() {
            self.broadcast_to_room(
                &caller.room,
                ClientEvent::SettingsChanged {
                    settings: caller.room.settings().clone(),
                },
            )
            .await;
        }

        Ok(())
    }
}
