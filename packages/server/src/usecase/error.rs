//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::{DatabaseError, InvalidStateError, StoreError};

/// Hub の操作で発生するエラー
///
/// 呼び出し元（クライアント）にそのまま返されます。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// 対象のエンティティが存在しない
    #[error("Not found: {0}")]
    NotFound(String),

    /// 現在の状態では許可されない操作
    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),

    /// 外部ストアの呼び出しに失敗
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<StoreError> for HubError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(key) => HubError::NotFound(key),
        }
    }
}

impl HubError {
    /// `InvalidState` を作成するショートカット
    pub fn invalid_state(message: impl Into<String>) -> Self {
        HubError::InvalidState(InvalidStateError::new(message))
    }
}
