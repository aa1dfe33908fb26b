//! cadence-core
//!
//! Timed action scheduling for a multiplayer game server.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, actor, effect, notification, errors）
//! - **ports**: 抽象化レイヤー（EntityStore, FlagStore, JobRuntime, Timer, DeathHandler, Notifier, Clock）
//! - **impls**: ports のプロセス内実装（InMemoryEntityStore, LocalJobRuntime など）
//! - **app**: BattleCycles, EffectCycles, EffectReconciler, SchedulerBuilder

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{BattleCycles, EffectCycles, Scheduler, SchedulerBuilder, SchedulerConfig};
