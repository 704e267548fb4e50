//! Conversion logic between DTOs and domain entities.

use crate::{
    domain::{ClientEvent, PlaylistItem, Room, RoomMember, ServerResponse},
    infrastructure::dto::{http, websocket as dto},
    usecase::HubError,
};
use hiroba_shared::time::timestamp_to_rfc3339;

// ========================================
// Domain Entity → WebSocket DTO
// ========================================

impl From<&HubError> for dto::ErrorDto {
    fn from(error: &HubError) -> Self {
        let kind = match error {
            HubError::NotFound(_) => dto::ErrorKind::NotFound,
            HubError::InvalidState(_) => dto::ErrorKind::InvalidState,
            HubError::Database(_) => dto::ErrorKind::Database,
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

impl<'a> dto::ServerMessage<'a> {
    /// Builds the completion of an invocation
    pub fn completion(invocation_id: u64, result: Result<ServerResponse, HubError>) -> Self {
        match result {
            Ok(response) => Self::Completion {
                invocation_id: Some(invocation_id),
                result: Some(response),
                error: None,
            },
            Err(error) => Self::Completion {
                invocation_id: Some(invocation_id),
                result: None,
                error: Some((&error).into()),
            },
        }
    }

    /// Builds the completion sent back for a message that could not be parsed
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::Completion {
            invocation_id: None,
            result: None,
            error: Some(dto::ErrorDto {
                kind: dto::ErrorKind::InvalidRequest,
                message: message.into(),
            }),
        }
    }

    pub fn event(event: &'a ClientEvent) -> Self {
        Self::Event { event }
    }
}

// ========================================
// Domain Entity → HTTP DTO
// ========================================

impl From<&Room> for http::RoomSummaryDto {
    fn from(room: &Room) -> Self {
        Self {
            room_id: room.room_id().value(),
            name: room.settings().name.clone(),
            state: room.state(),
            queue_mode: room.settings().queue_mode,
            host: room.host().map(|host| host.value()),
            users: room.users().iter().map(|member| member.user_id.value()).collect(),
            current_playlist_item_id: room.settings().playlist_item_id.map(|id| id.value()),
        }
    }
}

impl From<&Room> for http::RoomDetailDto {
    fn from(room: &Room) -> Self {
        Self {
            room_id: room.room_id().value(),
            name: room.settings().name.clone(),
            state: room.state(),
            queue_mode: room.settings().queue_mode,
            host: room.host().map(|host| host.value()),
            users: room.users().iter().map(Into::into).collect(),
            current_playlist_item_id: room.settings().playlist_item_id.map(|id| id.value()),
            playlist: room.playlist().items().iter().map(Into::into).collect(),
        }
    }
}

impl From<&RoomMember> for http::MemberDetailDto {
    fn from(member: &RoomMember) -> Self {
        Self {
            user_id: member.user_id.value(),
            state: member.state,
        }
    }
}

impl From<&PlaylistItem> for http::PlaylistItemDetailDto {
    fn from(item: &PlaylistItem) -> Self {
        Self {
            id: item.id.value(),
            owner_id: item.owner_id.value(),
            beatmap_id: item.beatmap_id.value(),
            ruleset_id: item.ruleset_id,
            expired: item.expired,
            created_at: timestamp_to_rfc3339(item.created_at.value()),
        }
    }
}
