//! クライアントとサーバー間のメッセージ定義
//!
//! - `ServerRequest`: クライアントがサーバーに対して呼び出す操作
//! - `ClientEvent`: サーバーがクライアントに通知するイベント
//! - `ServerResponse`: 呼び出しの戻り値

use serde::{Deserialize, Serialize};

use super::{
    entity::{MemberState, PlaylistItem, PlaylistItemRequest, Room, RoomMember, RoomSettings, RoomState},
    value_object::{RoomId, UserId},
};

/// クライアントからの呼び出し
///
/// JSON では `{"method": "JoinRoom", "params": {"room_id": 1}}` の形になります。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum ServerRequest {
    JoinRoom { room_id: RoomId },
    LeaveRoom,
    TransferHost { user_id: UserId },
    ChangeSettings { settings: RoomSettings },
    ChangeState { state: MemberState },
    StartMatch,
    AddPlaylistItem { item: PlaylistItemRequest },
}

/// サーバーからクライアントへの通知
///
/// JSON では `{"name": "UserJoined", "args": {"user": {...}}}` の形になります。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "name", content = "args")]
pub enum ClientEvent {
    RoomStateChanged { state: RoomState },
    UserJoined { user: RoomMember },
    UserLeft { user: RoomMember },
    HostChanged { user_id: UserId },
    SettingsChanged { settings: RoomSettings },
    UserStateChanged { user_id: UserId, state: MemberState },
    /// ロードを開始するよう要求（試合に参加するメンバーのみ）
    LoadRequested,
    MatchStarted,
    ResultsReady,
    PlaylistItemAdded { item: PlaylistItem },
}

/// 呼び出しの戻り値
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServerResponse {
    /// JoinRoom の結果（参加時点のルームのスナップショット）
    Room(Room),
    /// 戻り値なし（`null`）
    Unit,
}
