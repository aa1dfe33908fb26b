//! App - アプリケーション層
//!
//! ports を組み合わせてスケジューラ本体を実装する。
//!
//! # 主要コンポーネント
//! - **BattleCycles**: actor ごとの繰り返し戦闘アクション（停止フラグ + ターゲット判定）
//! - **EffectCycles**: 状態異常の tick 状態機械（単発タイマーの連鎖）
//! - **EffectReconciler**: 駆動されていない効果エントリの回収
//! - **SchedulerBuilder** / **Scheduler**: ワイヤリングとステータス

pub mod battle_cycle;
pub mod builder;
pub mod config;
pub mod effect_cycle;
pub mod reconciler;
pub mod registry;
pub mod status;

pub use self::battle_cycle::{ActionError, BattleAction, BattleCycles};
pub use self::builder::{BuildError, Scheduler, SchedulerBuilder};
pub use self::config::{ConfigError, SchedulerConfig};
pub use self::effect_cycle::{EffectCycles, EffectTick, Termination, TickOutcome};
pub use self::reconciler::{EffectReconciler, ReconcileReport, ReconcilerHandle};
pub use self::registry::{BattleCycleRegistry, Registration};
pub use self::status::SchedulerStatus;
