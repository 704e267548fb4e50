//! HTTP API response DTOs.

use serde::Serialize;

use crate::domain::{MemberState, QueueMode, RoomState};

/// Response of `GET /api/health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthDto {
    pub status: String,
    pub rooms: usize,
    pub active_users: usize,
}

/// An entry of `GET /api/rooms`
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummaryDto {
    pub room_id: i64,
    pub name: String,
    pub state: RoomState,
    pub queue_mode: QueueMode,
    pub host: Option<i64>,
    pub users: Vec<i64>,
    pub current_playlist_item_id: Option<i64>,
}

/// Response of `GET /api/rooms/{room_id}`
#[derive(Debug, Clone, Serialize)]
pub struct RoomDetailDto {
    pub room_id: i64,
    pub name: String,
    pub state: RoomState,
    pub queue_mode: QueueMode,
    pub host: Option<i64>,
    pub users: Vec<MemberDetailDto>,
    pub current_playlist_item_id: Option<i64>,
    pub playlist: Vec<PlaylistItemDetailDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberDetailDto {
    pub user_id: i64,
    pub state: MemberState,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistItemDetailDto {
    pub id: i64,
    pub owner_id: i64,
    pub beatmap_id: i64,
    pub ruleset_id: i32,
    pub expired: bool,
    /// RFC 3339
    pub created_at: String,
}
