//! StatefulUserHub: 接続ごとのユーザー状態の管理
//!
//! ## 責務
//!
//! - ユーザーごとの状態（`ClientState`）を `EntityStore` で保持する
//! - 接続・切断時に、古い接続が残した状態を後始末する
//! - 呼び出し元の接続が状態の持ち主であることを保証する
//!
//! ## 再接続と切断の競合
//!
//! 同じユーザーが新しい接続で繋ぎ直した直後に、古い接続の切断通知が届くことがあります。
//! 状態の `connection_id` と切断した接続を比較し、一致する場合だけ破棄するため、
//! 新しい接続の状態が消されることはありません。

use async_trait::async_trait;

use crate::domain::{ClientState, ConnectionId, EntityStore, ItemUsage, StoreError, UserId};

use super::error::HubError;

/// 呼び出し元の情報（ユーザーと接続）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubCallerContext {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
}

impl HubCallerContext {
    pub fn new(user_id: UserId, connection_id: ConnectionId) -> Self {
        Self {
            user_id,
            connection_id,
        }
    }
}

/// 状態を破棄する前の後始末
///
/// 状態のロックを保持したまま呼び出されます。
#[async_trait]
pub trait StateCleaner<S>: Send + Sync {
    async fn clean_up_state(&self, state: &S) -> Result<(), HubError>;
}

/// ユーザーごとの状態を管理する Hub
pub struct StatefulUserHub<S> {
    states: EntityStore<UserId, S>,
}

impl<S: ClientState> Default for StatefulUserHub<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ClientState> StatefulUserHub<S> {
    pub fn new() -> Self {
        Self {
            states: EntityStore::new(),
        }
    }

    /// 接続時の処理
    ///
    /// 別の接続が所有している状態が残っていれば、後始末してから破棄する。
    pub async fn on_connected(
        &self,
        ctx: &HubCallerContext,
        cleaner: &dyn StateCleaner<S>,
    ) -> Result<(), HubError> {
        self.clean_up_where(ctx.user_id, cleaner, |owner| owner != &ctx.connection_id)
            .await
    }

    /// 切断時の処理
    ///
    /// 切断した接続が所有している状態だけを後始末して破棄する。状態がなければ何もしない。
    pub async fn on_disconnected(
        &self,
        ctx: &HubCallerContext,
        cleaner: &dyn StateCleaner<S>,
    ) -> Result<(), HubError> {
        self.clean_up_where(ctx.user_id, cleaner, |owner| owner == &ctx.connection_id)
            .await
    }

    async fn clean_up_where<F>(
        &self,
        user_id: UserId,
        cleaner: &dyn StateCleaner<S>,
        should_clean: F,
    ) -> Result<(), HubError>
    where
        F: Fn(&ConnectionId) -> bool + Send,
    {
        let usage = match self.states.get_for_use(user_id, false).await {
            Ok(usage) => usage,
            Err(StoreError::NotFound(_)) => return Ok(()),
        };

        let Some(state) = usage.item() else {
            return Ok(());
        };
        if !should_clean(state.connection_id()) {
            return Ok(());
        }

        if let Err(e) = cleaner.clean_up_state(state).await {
            tracing::warn!("Failed to clean up state of user {}: {}", user_id, e);
        }
        usage.destroy();
        tracing::debug!("Destroyed state of user {}", user_id);

        Ok(())
    }

    /// 呼び出し元の状態の排他アクセスを取得（なければ空のエントリを作成）
    ///
    /// 状態が別の接続のものであればエラーにする。
    pub async fn get_or_create_local_state(
        &self,
        ctx: &HubCallerContext,
    ) -> Result<ItemUsage<UserId, S>, HubError> {
        let usage = self.states.get_for_use(ctx.user_id, true).await?;

        if let Some(state) = usage.item()
            && state.connection_id() != &ctx.connection_id
        {
            return Err(HubError::invalid_state(
                "State is not valid for this connection",
            ));
        }

        Ok(usage)
    }

    /// 別のユーザーの状態の排他アクセスを取得
    pub async fn get_state_from_user(
        &self,
        user_id: UserId,
    ) -> Result<ItemUsage<UserId, S>, HubError> {
        Ok(self.states.get_for_use(user_id, false).await?)
    }

    /// 全ユーザーの状態のスナップショット
    ///
    /// 使用中のユーザーのロックは待たず、直前に確定した状態を返す。
    pub fn get_all_states(&self) -> Vec<S> {
        self.states
            .get_all_entities()
            .into_iter()
            .map(|(_, state)| state)
            .collect()
    }

    /// 全状態を破棄する（テスト・起動処理用）
    pub fn reset(&self) {
        self.states.clear();
    }
}
