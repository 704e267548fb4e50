//! EntityStore: キー単位の排他アクセス
//!
//! ユーザーの接続状態やルームなど、サーバーが保持するエンティティを
//! キーごとに「同時に 1 人だけ」が変更できるように管理します。
//!
//! ## 仕組み
//!
//! ```text
//! entries:   DashMap<K, Arc<Mutex<TrackedEntity<V>>>>
//!                │            └─ キーごとのロック（tokio::sync::Mutex、FIFO で公平）
//!                └─ 外側のマップ（取得・作成の一瞬だけロックされる）
//! snapshots: DashMap<K, V>
//!                └─ 確定済みの値の複製（スナップショット用、キーのロックは取らない）
//! ```
//!
//! - `get_for_use` はキーのロックを取得し、`ItemUsage` を返す
//! - `ItemUsage` が drop されるとロックが解放される（エラーやキャンセル時も同様）
//! - `ItemUsage::destroy` はロックを保持したままエントリをマップから削除する
//! - `ItemUsage::set_item` は値と同時にスナップショットも書き換える
//!
//! 破棄済みのスロットを待っていた呼び出しは、ロック取得後に破棄を検知して
//! マップから取り直します。

use std::{fmt::Debug, hash::Hash, sync::Arc};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::error::StoreError;

/// ストア内部で 1 キー分の状態を保持する
struct TrackedEntity<V> {
    item: Option<V>,
    destroyed: bool,
}

impl<V> TrackedEntity<V> {
    fn empty() -> Self {
        Self {
            item: None,
            destroyed: false,
        }
    }
}

type Slot<V> = Arc<Mutex<TrackedEntity<V>>>;

/// キー単位の排他アクセスを提供するインメモリストア
pub struct EntityStore<K, V> {
    entries: Arc<DashMap<K, Slot<V>>>,
    snapshots: Arc<DashMap<K, V>>,
}

impl<K, V> Default for EntityStore<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> EntityStore<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// 空のストアを作成
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            snapshots: Arc::new(DashMap::new()),
        }
    }

    /// キーに対応するエンティティの排他アクセスを取得
    ///
    /// # Arguments
    ///
    /// * `key` - エンティティのキー
    /// * `create_if_missing` - 存在しない場合に空のエントリを作成するか
    ///
    /// # Returns
    ///
    /// * `Ok(ItemUsage)` - ロック取得済みのハンドル（作成直後は `item()` が `None`）
    /// * `Err(StoreError::NotFound)` - エントリが存在せず、作成も要求されていない
    pub async fn get_for_use(
        &self,
        key: K,
        create_if_missing: bool,
    ) -> Result<ItemUsage<K, V>, StoreError> {
        loop {
            let slot = if create_if_missing {
                self.entries
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(TrackedEntity::empty())))
                    .clone()
            } else {
                match self.entries.get(&key) {
                    Some(slot) => slot.clone(),
                    None => return Err(StoreError::NotFound(format!("{:?}", key))),
                }
            };

            let guard = Arc::clone(&slot).lock_owned().await;
            if guard.destroyed {
                tracing::trace!("Entity {:?} was destroyed while waiting, retrying", key);
                continue;
            }

            return Ok(ItemUsage {
                key,
                slot,
                guard,
                entries: Arc::clone(&self.entries),
                snapshots: Arc::clone(&self.snapshots),
            });
        }
    }

    /// 全エンティティのスナップショットを取得
    ///
    /// キーのロックは一切取らず、確定済みの値の複製を返します。変更中のエンティティは
    /// 直前に確定した値で見えるため、結果は線形化可能ではなく最終的な整合性のみを保証します。
    pub fn get_all_entities(&self) -> Vec<(K, V)> {
        self.snapshots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// 全エントリを破棄する
    ///
    /// テストや起動処理でのみ使用すること。保持中の `ItemUsage` はマップから切り離されます。
    pub fn clear(&self) {
        self.entries.clear();
        self.snapshots.clear();
    }
}

/// 1 つのエンティティに対する排他アクセス
///
/// 生存している間はキーのロックを保持し続け、drop で必ず解放します。
/// エンティティを設定しないまま drop された場合、空のエントリはマップから削除されます。
pub struct ItemUsage<K, V>
where
    K: Eq + Hash,
{
    key: K,
    slot: Slot<V>,
    guard: OwnedMutexGuard<TrackedEntity<V>>,
    entries: Arc<DashMap<K, Slot<V>>>,
    snapshots: Arc<DashMap<K, V>>,
}

impl<K, V> ItemUsage<K, V>
where
    K: Eq + Hash,
{
    /// エンティティへの参照（未作成なら `None`）
    pub fn item(&self) -> Option<&V> {
        self.guard.item.as_ref()
    }

    /// ロックを保持したままエンティティをストアから削除する
    pub fn destroy(mut self) {
        self.mark_destroyed();
    }

    /// このハンドルのスロットがまだマップに登録されているか（`clear` 後は切り離される）
    fn is_attached(&self) -> bool {
        self.entries
            .get(&self.key)
            .is_some_and(|existing| Arc::ptr_eq(existing.value(), &self.slot))
    }

    fn mark_destroyed(&mut self) {
        self.guard.item = None;
        self.guard.destroyed = true;

        // ロックを保持している間はエントリを差し替えられないので、スナップショットを先に消す
        if self.is_attached() {
            self.snapshots.remove(&self.key);
            let slot = &self.slot;
            self.entries
                .remove_if(&self.key, |_, existing| Arc::ptr_eq(existing, slot));
        }
    }
}

impl<K, V> ItemUsage<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// エンティティを設定（既存の値は置き換えられる）
    pub fn set_item(&mut self, item: V) {
        if self.is_attached() {
            self.snapshots.insert(self.key.clone(), item.clone());
        }
        self.guard.item = Some(item);
    }
}

impl<K, V> Drop for ItemUsage<K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if !self.guard.destroyed && self.guard.item.is_none() {
            self.mark_destroyed();
        }
        // guard はこの後に drop され、ロックが解放される
    }
}
