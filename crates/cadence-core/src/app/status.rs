//! SchedulerStatus - スケジューラ全体のスナップショット
//!
//! CLI やヘルスチェックから JSON で出す想定。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Actors with a registered battle cycle.
    pub battle_cycles: usize,
    /// Repeating jobs the runtime still drives. Can briefly exceed
    /// `battle_cycles` while a teardown is in flight.
    pub live_jobs: usize,
    pub effect_chains: usize,
    pub effect_applications: u64,
}
