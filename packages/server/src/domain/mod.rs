//! ドメイン層
//!
//! エンティティ、値オブジェクト、エンティティストアと、外部への依存を表す trait を定義します。
//! この層は UseCase / Infrastructure / UI のいずれにも依存しません。

pub mod client_state;
pub mod database;
pub mod entity;
pub mod entity_store;
pub mod error;
pub mod message_pusher;
pub mod protocol;
pub mod value_object;

pub use client_state::{ClientState, MultiplayerClientState};
pub use database::{DatabaseRoom, MultiplayerDatabase};
pub use entity::{
    HostFallback, MAX_LEGACY_RULESET_ID, MatchProgress, MemberRemoval, MemberState,
    NewPlaylistItem, PlaylistItem, PlaylistItemRequest, QueueAdvance, QueueMode, Room, RoomMember,
    RoomQueue, RoomSettings, RoomState,
};
pub use entity_store::{EntityStore, ItemUsage};
pub use error::{DatabaseError, InvalidStateError, MessagePushError, StoreError};
pub use message_pusher::{MessagePusher, PusherChannel};
pub use protocol::{ClientEvent, ServerRequest, ServerResponse};
pub use value_object::{BeatmapId, ConnectionId, PlaylistItemId, RoomId, Timestamp, UserId};

#[cfg(test)]
pub use database::MockMultiplayerDatabase;
