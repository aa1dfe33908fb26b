//! BattleCycles - actor ごとの繰り返し戦闘アクション
//!
//! # フロー（1 発火ごと）
//! 1. 停止フラグを読む
//! 2. フラグが立っていたら、actor の現在のターゲットをストアから読み直す
//!    - ターゲットなし → スケジュールを cancel、ワーカーを close、登録を解除して終了
//!    - ターゲットあり → フラグはこの発火では無視（戦闘継続を優先）
//! 3. action を実行。失敗・panic はログに出すだけで、スケジュールは止めない
//!
//! # 停止
//! - `stop`: フラグを立てるだけ（次の発火で判断）。完了は待たない
//! - `clear`: ログアウト等での即時停止（フラグ判定を経由しない）

use std::error::Error;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::config::SchedulerConfig;
use super::registry::{BattleCycleRegistry, Registration};
use crate::domain::{ActorId, ActorRef, SchedulerError};
use crate::ports::{
    EntityStore, FlagStore, JobFiring, JobHandler, JobRuntime, RepeatSpec, RepeatingJob,
    is_truthy,
};

pub type ActionError = Box<dyn Error + Send + Sync>;

/// The work a battle cycle repeats. Firings may overlap if a run takes longer
/// than the interval, so implementations must tolerate concurrent calls.
#[async_trait]
pub trait BattleAction: Send + Sync {
    async fn run(&self) -> Result<(), ActionError>;
}

#[async_trait]
impl<F, Fut> BattleAction for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ActionError>> + Send,
{
    async fn run(&self) -> Result<(), ActionError> {
        (self)().await
    }
}

pub struct BattleCycles {
    config: Arc<SchedulerConfig>,
    store: Arc<dyn EntityStore>,
    flags: Arc<dyn FlagStore>,
    jobs: Arc<dyn JobRuntime>,
    registry: Arc<BattleCycleRegistry>,
}

impl BattleCycles {
    pub fn new(
        config: Arc<SchedulerConfig>,
        store: Arc<dyn EntityStore>,
        flags: Arc<dyn FlagStore>,
        jobs: Arc<dyn JobRuntime>,
        registry: Arc<BattleCycleRegistry>,
    ) -> Self {
        Self {
            config,
            store,
            flags,
            jobs,
            registry,
        }
    }

    /// Start (or restart) the battle cycle for `actor`.
    ///
    /// Any previous cycle for the same actor is torn down first, so at most one
    /// queue/worker pair is ever registered per actor.
    pub async fn start<A>(
        &self,
        actor: ActorRef,
        interval: Duration,
        action: A,
    ) -> Result<RepeatingJob, SchedulerError>
    where
        A: BattleAction + 'static,
    {
        self.start_shared(actor, interval, Arc::new(action)).await
    }

    pub async fn start_shared(
        &self,
        actor: ActorRef,
        interval: Duration,
        action: Arc<dyn BattleAction>,
    ) -> Result<RepeatingJob, SchedulerError> {
        self.flags
            .delete(&self.config.stop_flag_namespace, actor.id.as_str())
            .await?;

        let mut slot = self.registry.lock(&actor.id).await;
        let result = async {
            if let Some(previous) = slot.take() {
                self.teardown(&actor.id, previous).await?;
            }

            let handler = Arc::new(BattleTick {
                actor: actor.clone(),
                action,
                namespace: self.config.stop_flag_namespace.clone(),
                store: Arc::clone(&self.store),
                flags: Arc::clone(&self.flags),
                jobs: Arc::clone(&self.jobs),
                registry: Arc::clone(&self.registry),
            });
            let spec = RepeatSpec::new(self.config.job_name(actor.id.as_str()), interval);
            let job = self.jobs.create_repeating_job(spec, handler).await?;
            slot.replace(Registration { job, interval });
            Ok::<_, SchedulerError>(job)
        }
        .await;
        self.registry.unlock(slot).await;

        let job = result?;
        info!(
            actor = %actor,
            job = %job.job,
            interval_ms = interval.as_millis() as u64,
            "battle_cycle_started"
        );
        Ok(job)
    }

    /// Ask the cycle to stop at its next firing. Does not wait.
    pub async fn stop(&self, actor: &ActorId) -> Result<(), SchedulerError> {
        self.flags
            .set(&self.config.stop_flag_namespace, actor.as_str(), json!(true))
            .await?;
        debug!(actor = %actor, "battle_cycle_stop_requested");
        Ok(())
    }

    /// Tear the cycle down right now, regardless of target (logout, disconnect).
    /// Returns whether a cycle was registered.
    pub async fn clear(&self, actor: &ActorId) -> Result<bool, SchedulerError> {
        let mut slot = self.registry.lock(actor).await;
        let previous = slot.take();
        let result = match previous {
            Some(previous) => self.teardown(actor, previous).await,
            None => Ok(()),
        };
        self.registry.unlock(slot).await;
        result?;

        self.flags
            .delete(&self.config.stop_flag_namespace, actor.as_str())
            .await?;
        if previous.is_some() {
            info!(actor = %actor, "battle_cycle_cleared");
        }
        Ok(previous.is_some())
    }

    pub async fn is_running(&self, actor: &ActorId) -> bool {
        self.registry.get(actor).await.is_some()
    }

    pub async fn registration(&self, actor: &ActorId) -> Option<Registration> {
        self.registry.get(actor).await
    }

    pub async fn live(&self) -> usize {
        self.registry.len().await
    }

    async fn teardown(&self, actor: &ActorId, registration: Registration) -> Result<(), SchedulerError> {
        self.jobs.cancel_repeating_job(registration.job.job).await?;
        self.jobs.close_worker(registration.job.worker).await?;
        debug!(actor = %actor, job = %registration.job.job, "battle_cycle_torn_down");
        Ok(())
    }
}

/// Handler run by the job runtime on every firing.
struct BattleTick {
    actor: ActorRef,
    action: Arc<dyn BattleAction>,
    namespace: String,
    store: Arc<dyn EntityStore>,
    flags: Arc<dyn FlagStore>,
    jobs: Arc<dyn JobRuntime>,
    registry: Arc<BattleCycleRegistry>,
}

/// What one firing decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FireOutcome {
    Ran,
    Stopped,
}

impl BattleTick {
    async fn fire(&self, firing: JobFiring) -> Result<FireOutcome, SchedulerError> {
        let stop_requested = self
            .flags
            .get(&self.namespace, self.actor.id.as_str())
            .await?
            .is_some_and(|v| is_truthy(&v));

        if stop_requested {
            // the target read gates the stop: a fighting actor is never stopped on a stale flag
            let target = self
                .store
                .find_by_id(&self.actor)
                .await?
                .and_then(|actor| actor.target);

            if target.is_none() {
                self.jobs.cancel_repeating_job(firing.job).await?;
                self.registry.release(&self.actor.id, firing.job).await;
                self.jobs.close_worker(firing.worker).await?;
                return Ok(FireOutcome::Stopped);
            }
            debug!(actor = %self.actor, "stop_flag_ignored_target_present");
        }

        let action = Arc::clone(&self.action);
        match tokio::spawn(async move { action.run().await }).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(actor = %self.actor, error = %e, "battle_action_failed"),
            Err(e) => error!(actor = %self.actor, error = %e, "battle_action_panicked"),
        }
        Ok(FireOutcome::Ran)
    }
}

#[async_trait]
impl JobHandler for BattleTick {
    async fn on_fire(&self, firing: JobFiring) {
        match self.fire(firing).await {
            Ok(FireOutcome::Ran) => {}
            Ok(FireOutcome::Stopped) => {
                info!(actor = %self.actor, job = %firing.job, firings = firing.sequence, "battle_cycle_stopped");
            }
            Err(e) => warn!(actor = %self.actor, error = %e, "battle_tick_failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Actor, ErrorKind};
    use crate::impls::{InMemoryEntityStore, InMemoryFlagStore, LocalJobRuntime};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        store: Arc<InMemoryEntityStore>,
        flags: Arc<InMemoryFlagStore>,
        jobs: Arc<LocalJobRuntime>,
        cycles: BattleCycles,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryEntityStore::new());
        let flags = Arc::new(InMemoryFlagStore::new());
        let jobs = Arc::new(LocalJobRuntime::new());
        let cycles = BattleCycles::new(
            Arc::new(SchedulerConfig::default()),
            store.clone(),
            flags.clone(),
            jobs.clone(),
            Arc::new(BattleCycleRegistry::new()),
        );
        Fixture {
            store,
            flags,
            jobs,
            cycles,
        }
    }

    fn counting_action(counter: &Arc<AtomicUsize>) -> impl BattleAction + 'static {
        let counter = Arc::clone(counter);
        move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), ActionError>(())
            }
        }
    }

    async fn fighter(store: &InMemoryEntityStore, id: &str) -> ActorRef {
        let me = ActorRef::npc(id);
        store
            .save(Actor::new(me.clone(), 100).with_target(ActorRef::character("hero")))
            .await
            .unwrap();
        me
    }

    #[tokio::test(start_paused = true)]
    async fn restart_leaves_exactly_one_live_pair() {
        let f = fixture();
        let me = fighter(&f.store, "npc-1").await;
        let counter = Arc::new(AtomicUsize::new(0));

        let first = f
            .cycles
            .start(me.clone(), Duration::from_millis(500), counting_action(&counter))
            .await
            .unwrap();
        let second = f
            .cycles
            .start(me.clone(), Duration::from_millis(500), counting_action(&counter))
            .await
            .unwrap();

        assert_ne!(first.job, second.job);
        assert_eq!(f.jobs.live_jobs().await, 1);
        assert_eq!(f.cycles.live().await, 1);
        assert_eq!(
            f.cycles.registration(&me.id).await.map(|r| r.job),
            Some(second)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn start_clears_a_stale_stop_flag() {
        let f = fixture();
        let me = ActorRef::npc("idle");
        f.store.save(Actor::new(me.clone(), 10)).await.unwrap();
        f.cycles.stop(&me.id).await.unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        f.cycles
            .start(me.clone(), Duration::from_millis(100), counting_action(&counter))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;

        // no target, but the old flag was cleared, so the cycle keeps running
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(f.cycles.is_running(&me.id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_ignored_while_target_present() {
        let f = fixture();
        let me = fighter(&f.store, "npc-2").await;
        let counter = Arc::new(AtomicUsize::new(0));

        f.cycles
            .start(me.clone(), Duration::from_millis(500), counting_action(&counter))
            .await
            .unwrap();
        f.cycles.stop(&me.id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1250)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(f.cycles.is_running(&me.id).await);
        assert_eq!(f.jobs.live_jobs().await, 1);

        f.store.modify(&me, |a| a.target = None).await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        let after_stop = counter.load(Ordering::SeqCst);
        assert_eq!(after_stop, 3);
        assert!(!f.cycles.is_running(&me.id).await);
        assert_eq!(f.jobs.live_jobs().await, 0);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_actor_counts_as_no_target() {
        let f = fixture();
        let ghost = ActorRef::npc("ghost");
        let counter = Arc::new(AtomicUsize::new(0));

        f.cycles
            .start(ghost.clone(), Duration::from_millis(100), counting_action(&counter))
            .await
            .unwrap();
        f.cycles.stop(&ghost.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert!(!f.cycles.is_running(&ghost.id).await);
        assert!(counter.load(Ordering::SeqCst) <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_action_keeps_the_schedule() {
        let f = fixture();
        let me = fighter(&f.store, "npc-3").await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);

        f.cycles
            .start(me.clone(), Duration::from_millis(100), move || {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err::<(), ActionError>("target out of range".into())
                }
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(450)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
        assert!(f.cycles.is_running(&me.id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_action_keeps_the_schedule() {
        let f = fixture();
        let me = fighter(&f.store, "npc-4").await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);

        f.cycles
            .start(me.clone(), Duration::from_millis(100), move || {
                let seen = Arc::clone(&seen);
                async move {
                    if seen.fetch_add(1, Ordering::SeqCst) < usize::MAX {
                        panic!("boom");
                    }
                    Ok::<(), ActionError>(())
                }
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(f.cycles.is_running(&me.id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_tears_down_immediately() {
        let f = fixture();
        let me = fighter(&f.store, "npc-5").await;
        let counter = Arc::new(AtomicUsize::new(0));

        f.cycles
            .start(me.clone(), Duration::from_millis(100), counting_action(&counter))
            .await
            .unwrap();
        f.cycles.stop(&me.id).await.unwrap();

        assert!(f.cycles.clear(&me.id).await.unwrap());
        assert!(!f.cycles.clear(&me.id).await.unwrap());
        assert_eq!(f.jobs.live_jobs().await, 0);
        assert!(!f.flags.has("battle-cycle-stop-flags", "npc-5").await.unwrap());
    }

    #[tokio::test]
    async fn start_on_closed_runtime_fails() {
        let f = fixture();
        f.jobs.shutdown().await;

        let err = f
            .cycles
            .start(
                ActorRef::npc("late"),
                Duration::from_millis(100),
                counting_action(&Arc::new(AtomicUsize::new(0))),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permanent);
        assert_eq!(f.cycles.live().await, 0);
    }
}
