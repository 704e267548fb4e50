//! MessagePusher trait 定義
//!
//! クライアントへのイベント通知のインターフェース。
//! 具体的な実装（WebSocket 等）は Infrastructure 層が提供します。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{error::MessagePushError, protocol::ClientEvent, value_object::ConnectionId};

/// 接続ごとの送信チャンネル
///
/// UI 層が WebSocket 接続ごとに生成し、`register_connection` で登録します。
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// クライアントへの通知
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// 接続の送信チャンネルを登録
    async fn register_connection(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// 接続の送信チャンネルを削除
    async fn unregister_connection(&self, connection_id: &ConnectionId);

    /// 特定の接続にイベントを送信
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &ClientEvent,
    ) -> Result<(), MessagePushError>;

    /// 複数の接続にイベントを送信
    ///
    /// 一部の送信失敗はログに記録するだけで、エラーにはしない。
    async fn broadcast(
        &self,
        targets: Vec<ConnectionId>,
        event: &ClientEvent,
    ) -> Result<(), MessagePushError>;
}
