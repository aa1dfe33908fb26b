//! Impls - ports のプロセス内実装（開発用・テスト用・単一ノード運用）
//!
//! # 含まれる実装
//! - **InMemoryEntityStore** / **InMemoryFlagStore**
//! - **LocalJobRuntime**: tokio タスクによる繰り返しジョブ
//! - **TokioTimer**: 単発タイマー
//! - **DeathRouter**: EntityType ごとの死亡処理ディスパッチ
//! - **TracingNotifier** / **ChannelNotifier**

pub mod death;
pub mod inmem_entity_store;
pub mod inmem_flags;
pub mod local_jobs;
pub mod notifiers;
pub mod tokio_timer;

pub use self::death::{DeathRouter, LoggingDeathHandler};
pub use self::inmem_entity_store::InMemoryEntityStore;
pub use self::inmem_flags::InMemoryFlagStore;
pub use self::local_jobs::LocalJobRuntime;
pub use self::notifiers::{ChannelNotifier, TracingNotifier};
pub use self::tokio_timer::TokioTimer;
