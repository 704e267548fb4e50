//! 外部ストアの実装
//!
//! - `inmemory`: プロセス内のマップを使った実装（シードファイルから初期化）
//! - `seed`: シードファイルの読み込み

pub mod inmemory;
pub mod seed;

pub use inmemory::InMemoryMultiplayerDatabase;
pub use seed::{Seed, SeedError};
