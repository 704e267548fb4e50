//! UseCase 層
//!
//! - `stateful_user_hub`: 接続ごとのユーザー状態の管理
//! - `multiplayer_hub`: ルームの参加・試合の進行・プレイリストの調整

pub mod error;
pub mod multiplayer_hub;
pub mod stateful_user_hub;

pub use error::HubError;
pub use multiplayer_hub::{HubOptions, MultiplayerHub};
pub use stateful_user_hub::{HubCallerContext, StateCleaner, StatefulUserHub};
