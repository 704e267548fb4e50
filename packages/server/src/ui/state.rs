//! Shared application state.

use std::sync::Arc;

use crate::usecase::MultiplayerHub;

/// Shared application state
pub struct AppState {
    /// MultiplayerHub（ルーム調整のユースケース）
    pub hub: Arc<MultiplayerHub>,
}

impl AppState {
    pub fn new(hub: Arc<MultiplayerHub>) -> Self {
        Self { hub }
    }
}
