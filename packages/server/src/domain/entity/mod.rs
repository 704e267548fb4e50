//! ドメインエンティティ

pub mod playlist_item;
pub mod queue;
pub mod room;

pub use playlist_item::{MAX_LEGACY_RULESET_ID, NewPlaylistItem, PlaylistItem, PlaylistItemRequest};
pub use queue::{QueueAdvance, QueueMode, RoomQueue};
pub use room::{
    HostFallback, MatchProgress, MemberRemoval, MemberState, Room, RoomMember, RoomSettings,
    RoomState,
};
