//! Infrastructure 層
//!
//! ドメイン層が定義する trait（`MultiplayerDatabase`, `MessagePusher`）の具体的な実装と、
//! 通信用の DTO を提供します。

pub mod database;
pub mod dto;
pub mod message_pusher;
