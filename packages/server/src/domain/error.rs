//! ドメイン層のエラー定義

use thiserror::Error;

/// EntityStore のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// 要求されたキーのエンティティが存在しない
    #[error("Entity '{0}' is not tracked")]
    NotFound(String),
}

/// 現在の状態では許可されない操作
///
/// メッセージはそのまま呼び出し元に返されます。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvalidStateError(pub String);

impl InvalidStateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// 外部ストア（ビートマップカタログ・プレイリスト永続化）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatabaseError {
    /// 問い合わせ先にレコードが存在しない
    #[error("Record not found: {0}")]
    NotFound(String),

    /// ストアへのアクセスに失敗
    #[error("Database unavailable: {0}")]
    Unavailable(String),
}

/// メッセージ送信（プッシュ通知）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    /// 接続が登録されていない
    #[error("Connection '{0}' not found")]
    ConnectionNotFound(String),

    /// 送信に失敗（接続が閉じている等）
    #[error("Failed to push message: {0}")]
    PushFailed(String),

    /// イベントのシリアライズに失敗
    #[error("Failed to serialize event: {0}")]
    Serialization(String),
}
