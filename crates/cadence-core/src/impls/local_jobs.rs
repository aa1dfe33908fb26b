//! LocalJobRuntime - プロセス内で動く JobRuntime
//!
//! # 実装詳細
//! - 繰り返しジョブ 1 本につき tokio タスク 1 本（= ワーカー 1 本）
//! - `tokio::time::interval` で発火、発火ごとに handler を別タスクで spawn
//!   （前の発火を待たない。handler 内の panic もそのタスクに閉じる）
//! - 停止は watch channel。sender を drop してもループは抜ける
//!
//! 分散キューと違い、キュー（スケジュール）とワーカーは常に 1:1。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::domain::{JobError, JobId, WorkerId};
use crate::ports::{
    IdGenerator, JobFiring, JobHandler, JobRuntime, RepeatSpec, RepeatingJob, SystemClock,
    UlidGenerator,
};

struct JobEntry {
    name: String,
    worker: WorkerId,
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

#[derive(Default)]
struct RuntimeState {
    jobs: HashMap<JobId, JobEntry>,
    by_worker: HashMap<WorkerId, JobId>,
}

impl RuntimeState {
    fn take_job(&mut self, job: JobId) -> Option<JobEntry> {
        let entry = self.jobs.remove(&job)?;
        self.by_worker.remove(&entry.worker);
        Some(entry)
    }
}

pub struct LocalJobRuntime {
    ids: Arc<dyn IdGenerator>,
    state: Mutex<RuntimeState>,
    closed: AtomicBool,
}

impl LocalJobRuntime {
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(UlidGenerator::new(SystemClock)))
    }

    pub fn with_id_generator(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            ids,
            state: Mutex::new(RuntimeState::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// Names of the live schedules, for diagnostics.
    pub async fn job_names(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.jobs.values().map(|e| e.name.clone()).collect()
    }

    /// Stop every schedule and refuse new ones.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let entries: Vec<JobEntry> = {
            let mut state = self.state.lock().await;
            state.by_worker.clear();
            state.jobs.drain().map(|(_, e)| e).collect()
        };
        for entry in entries {
            // ignore send error: the loop may already have exited
            let _ = entry.shutdown_tx.send(true);
            let _ = entry.join.await;
        }
    }
}

impl Default for LocalJobRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobRuntime for LocalJobRuntime {
    async fn create_repeating_job(
        &self,
        spec: RepeatSpec,
        handler: Arc<dyn JobHandler>,
    ) -> Result<RepeatingJob, JobError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(JobError::RuntimeClosed);
        }
        if spec.every.is_zero() {
            return Err(JobError::ZeroInterval);
        }

        let job = self.ids.generate_job_id();
        let worker = self.ids.generate_worker_id();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // 最初の発火が自分を cancel しに来ても見つかるよう、登録が終わるまでロックを保持
        let mut state = self.state.lock().await;
        let name = spec.name.clone();
        let join = tokio::spawn(run_schedule(spec, handler, job, worker, shutdown_rx));
        state.jobs.insert(
            job,
            JobEntry {
                name,
                worker,
                shutdown_tx,
                join,
            },
        );
        state.by_worker.insert(worker, job);

        Ok(RepeatingJob { job, worker })
    }

    async fn cancel_repeating_job(&self, job: JobId) -> Result<(), JobError> {
        let entry = self.state.lock().await.take_job(job);
        if let Some(entry) = entry {
            let _ = entry.shutdown_tx.send(true);
            debug!(job = %job, name = %entry.name, "repeating_job_cancelled");
        }
        Ok(())
    }

    async fn close_worker(&self, worker: WorkerId) -> Result<(), JobError> {
        let entry = {
            let mut state = self.state.lock().await;
            match state.by_worker.get(&worker).copied() {
                Some(job) => state.take_job(job),
                None => None,
            }
        };
        let Some(entry) = entry else {
            return Ok(());
        };

        let _ = entry.shutdown_tx.send(true);
        entry.join.await.map_err(|e| {
            warn!(worker = %worker, error = %e, "worker_join_failed");
            JobError::CloseFailed(worker, e.to_string())
        })?;
        debug!(worker = %worker, name = %entry.name, "worker_closed");
        Ok(())
    }

    async fn live_jobs(&self) -> usize {
        self.state.lock().await.jobs.len()
    }
}

async fn run_schedule(
    spec: RepeatSpec,
    handler: Arc<dyn JobHandler>,
    job: JobId,
    worker: WorkerId,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let start = if spec.immediately {
        Instant::now()
    } else {
        Instant::now() + spec.every
    };
    let mut ticker = tokio::time::interval_at(start, spec.every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sequence = 0u64;
    loop {
        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if *shutdown_rx.borrow() {
                    break;
                }
                let firing = JobFiring { job, worker, sequence };
                sequence += 1;
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    handler.on_fire(firing).await;
                });
            }
        }
    }
    debug!(job = %job, name = %spec.name, firings = sequence, "schedule_stopped");
}
