//! JobRuntime port - 繰り返しジョブ（キュー + ワーカー）の抽象化
//!
//! 本番では分散キュー（Redis など）で実装され、発火はどのプロセスの
//! ワーカーでも起こりうる。開発・テスト用には `impls::LocalJobRuntime`。
//!
//! # 設計原則
//! - 発火ごとに handler を呼ぶ。前の発火の完了は待たない（バックプレッシャーなし）
//! - handler は `JobFiring` を受け取るので、自分のスケジュールを自分で止められる
//! - cancel / close は冪等（既に止まっているものを止めても Ok）

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{JobError, JobId, WorkerId};

/// What to schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatSpec {
    pub name: String,
    pub every: Duration,
    /// Fire once right away instead of after the first full interval.
    pub immediately: bool,
}

impl RepeatSpec {
    pub fn new(name: impl Into<String>, every: Duration) -> Self {
        Self {
            name: name.into(),
            every,
            immediately: true,
        }
    }

    pub fn delayed(mut self) -> Self {
        self.immediately = false;
        self
    }
}

/// Handles for one live queue/worker pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepeatingJob {
    pub job: JobId,
    pub worker: WorkerId,
}

/// Context passed to the handler on each firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobFiring {
    pub job: JobId,
    pub worker: WorkerId,
    /// 0 for the first firing.
    pub sequence: u64,
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn on_fire(&self, firing: JobFiring);
}

#[async_trait]
pub trait JobRuntime: Send + Sync {
    async fn create_repeating_job(
        &self,
        spec: RepeatSpec,
        handler: Arc<dyn JobHandler>,
    ) -> Result<RepeatingJob, JobError>;

    /// Stop scheduling further firings. Firings already in flight finish.
    async fn cancel_repeating_job(&self, job: JobId) -> Result<(), JobError>;

    /// Release the worker. Its schedule will not fire again.
    async fn close_worker(&self, worker: WorkerId) -> Result<(), JobError>;

    /// Number of schedules still live.
    async fn live_jobs(&self) -> usize;
}
