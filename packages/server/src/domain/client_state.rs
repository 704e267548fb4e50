//! 接続ごとのクライアント状態

use super::value_object::{ConnectionId, RoomId, UserId};

/// 接続に紐づくユーザーごとの状態
///
/// `StatefulUserHub` はこの trait を通して状態の持ち主（接続）を判定します。
pub trait ClientState: Clone + Send + Sync + 'static {
    fn user_id(&self) -> UserId;

    /// この状態を所有している接続
    fn connection_id(&self) -> &ConnectionId;
}

/// マルチプレイ中のユーザーの状態
///
/// ユーザーがルームに参加している間だけ存在します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiplayerClientState {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
    pub room_id: RoomId,
}

impl MultiplayerClientState {
    pub fn new(user_id: UserId, connection_id: ConnectionId, room_id: RoomId) -> Self {
        Self {
            user_id,
            connection_id,
            room_id,
        }
    }
}

impl ClientState for MultiplayerClientState {
    fn user_id(&self) -> UserId {
        self.user_id
    }

    fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }
}
