//! EffectCycles - 状態異常 1 件を 1 体のターゲットに繰り返し適用する
//!
//! # 状態遷移（1 tick）
//! ```text
//! Active(remaining) --tick--> Active(remaining - interval)   次の tick を 1 つだけ予約
//!                         \-> Terminated(DurationExhausted | TargetMissing | EffectRemoved
//!                                        | TargetDied | ComputeFailed | StoreFailed)
//! ```
//!
//! # 設計原則
//! - tick は毎回ストアから target / attacker を読み直す。チェーンは id しか持たない
//! - `applied_effects` に key が無い = 外部で解除された。残り時間より優先
//! - 次の tick は現在の tick が終わってから予約する（同じチェーンの tick は重ならない）
//! - 外部からの stop は無い。止めたければ effect を外すか target が死ぬ

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::domain::{
    Actor, ActorPatch, ActorRef, EffectDefinition, Notification, Remaining, SchedulerError,
};
use crate::ports::{Clock, Deferred, DeathHandler, EntityStore, Notifier, Timer};

/// Immutable input of one tick.
#[derive(Debug, Clone)]
pub struct EffectTick {
    pub definition: Arc<EffectDefinition>,
    pub target: ActorRef,
    pub attacker: ActorRef,
    pub remaining: Remaining,
}

impl EffectTick {
    pub fn new(definition: Arc<EffectDefinition>, target: ActorRef, attacker: ActorRef) -> Self {
        let remaining = definition.initial_remaining();
        Self {
            definition,
            target,
            attacker,
            remaining,
        }
    }

    pub fn with_remaining(mut self, remaining: Remaining) -> Self {
        self.remaining = remaining;
        self
    }

    fn chain_key(&self) -> ChainKey {
        (self.target.clone(), self.definition.key.clone())
    }
}

/// Why a chain stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    DurationExhausted,
    TargetMissing,
    EffectRemoved,
    TargetDied,
    ComputeFailed,
    StoreFailed,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Applied; the returned tick is the one to arm after `interval`.
    Continue(EffectTick),
    Terminated(Termination),
}

type ChainKey = (ActorRef, String);

struct Inner {
    store: Arc<dyn EntityStore>,
    timer: Arc<dyn Timer>,
    death: Arc<dyn DeathHandler>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    chains: Mutex<HashMap<ChainKey, usize>>,
    applications: AtomicU64,
}

/// Drives effect chains. Cheap to clone; clones share the chain table.
#[derive(Clone)]
pub struct EffectCycles {
    inner: Arc<Inner>,
}

impl EffectCycles {
    pub fn new(
        store: Arc<dyn EntityStore>,
        timer: Arc<dyn Timer>,
        death: Arc<dyn DeathHandler>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                timer,
                death,
                notifier,
                clock,
                chains: Mutex::new(HashMap::new()),
                applications: AtomicU64::new(0),
            }),
        }
    }

    /// Start a chain with the definition's full duration. The first tick runs
    /// on its own task; this returns immediately.
    pub fn start(&self, definition: Arc<EffectDefinition>, target: ActorRef, attacker: ActorRef) {
        self.spawn_chain(EffectTick::new(definition, target, attacker));
    }

    /// Restart a chain with an explicit remaining budget.
    pub fn resume(
        &self,
        definition: Arc<EffectDefinition>,
        target: ActorRef,
        attacker: ActorRef,
        remaining: Remaining,
    ) {
        self.spawn_chain(EffectTick::new(definition, target, attacker).with_remaining(remaining));
    }

    pub fn live_chains(&self) -> usize {
        self.chains().values().sum()
    }

    pub fn has_live_chain(&self, target: &ActorRef, key: &str) -> bool {
        self.chains()
            .get(&(target.clone(), key.to_string()))
            .is_some_and(|n| *n > 0)
    }

    /// Applications that reached the store since construction.
    pub fn applications(&self) -> u64 {
        self.inner.applications.load(Ordering::Relaxed)
    }

    /// Run one tick.
    pub async fn tick(&self, tick: EffectTick) -> TickOutcome {
        match self.apply(tick.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    target_actor = %tick.target,
                    effect = %tick.definition.key,
                    error = %e,
                    "effect_tick_store_failed"
                );
                TickOutcome::Terminated(Termination::StoreFailed)
            }
        }
    }

    fn spawn_chain(&self, tick: EffectTick) {
        // 登録は同期で行う: start 直後の reconcile が二重に resume しないように
        *self.chains().entry(tick.chain_key()).or_insert(0) += 1;
        debug!(
            target_actor = %tick.target,
            effect = %tick.definition.key,
            remaining_ms = tick.remaining.as_millis_or_negative(),
            "effect_chain_started"
        );
        tokio::spawn(self.clone().link(tick));
    }

    /// One link of the chain: run the tick, then either arm the next link or
    /// release the chain slot.
    fn link(self, tick: EffectTick) -> Deferred {
        Box::pin(async move {
            let key = tick.chain_key();
            match self.tick(tick).await {
                TickOutcome::Continue(next) => {
                    let delay = next.definition.interval;
                    let timer = Arc::clone(&self.inner.timer);
                    timer.after(delay, self.link(next));
                }
                TickOutcome::Terminated(reason) => {
                    self.release(&key);
                    debug!(
                        target_actor = %key.0,
                        effect = %key.1,
                        reason = ?reason,
                        "effect_chain_terminated"
                    );
                }
            }
        })
    }

    fn release(&self, key: &ChainKey) {
        let mut chains = self.chains();
        if let Some(n) = chains.get_mut(key) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                chains.remove(key);
            }
        }
    }

    fn chains(&self) -> MutexGuard<'_, HashMap<ChainKey, usize>> {
        self.inner
            .chains
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn apply(&self, tick: EffectTick) -> Result<TickOutcome, SchedulerError> {
        let inner = &self.inner;
        let def = &tick.definition;

        let Some(target) = inner.store.find_by_id(&tick.target).await? else {
            return Ok(TickOutcome::Terminated(Termination::TargetMissing));
        };
        if !target.is_alive {
            return Ok(TickOutcome::Terminated(Termination::TargetMissing));
        }
        let Some(index) = target.effect_index(&def.key) else {
            return Ok(TickOutcome::Terminated(Termination::EffectRemoved));
        };

        let attacker = inner.store.find_detailed(&tick.attacker).await?;
        let magnitude = match def.compute.compute(&target, attacker.as_ref()).await {
            Ok(m) => m,
            Err(e) => {
                warn!(
                    target_actor = %tick.target,
                    effect = %def.key,
                    error = %e,
                    "effect_compute_failed"
                );
                let mut effects = target.applied_effects;
                effects.remove(index);
                inner
                    .store
                    .update_attributes(&tick.target, ActorPatch::default().effects(effects))
                    .await?;
                return Ok(TickOutcome::Terminated(Termination::ComputeFailed));
            }
        };

        // zero interval: apply once, never re-arm
        let runs_again = !def.interval.is_zero() && tick.remaining.runs_again(def.interval);
        let health = next_health(&target, magnitude);
        let mut effects = target.applied_effects.clone();
        // a killing tick drops the entry too, so no sweep picks it up on a corpse
        if runs_again && health > 0 {
            effects[index].last_updated_ms = inner.clock.now_ms();
        } else {
            effects.remove(index);
        }

        let patch = ActorPatch::default().health(health).effects(effects);
        let Some(updated) = inner.store.update_attributes(&tick.target, patch).await? else {
            return Ok(TickOutcome::Terminated(Termination::TargetMissing));
        };
        inner.applications.fetch_add(1, Ordering::Relaxed);

        if updated.health <= 0 || !updated.is_alive {
            info!(
                target_actor = %tick.target,
                effect = %def.key,
                attacker = %tick.attacker,
                "effect_target_died"
            );
            inner.death.handle_death(&updated).await;
            return Ok(TickOutcome::Terminated(Termination::TargetDied));
        }

        self.notify(&tick, &updated, magnitude);

        if !runs_again {
            return Ok(TickOutcome::Terminated(Termination::DurationExhausted));
        }
        let remaining = tick.remaining.after(def.interval);
        Ok(TickOutcome::Continue(tick.with_remaining(remaining)))
    }

    fn notify(&self, tick: &EffectTick, updated: &Actor, magnitude: i32) {
        let notifier = &self.inner.notifier;
        notifier.dispatch(Notification::Animation {
            target: tick.target.clone(),
            animation_key: tick.definition.target_animation_key.clone(),
        });
        notifier.dispatch(Notification::AttributesChanged {
            target: tick.target.clone(),
            health: updated.health,
            mana: updated.mana,
        });
        notifier.dispatch(Notification::EffectValue {
            target: tick.target.clone(),
            value: magnitude,
        });
    }
}

/// Positive magnitude damages, negative heals. Healing never pushes health past
/// `max_health`, and health never drops below zero.
fn next_health(target: &Actor, magnitude: i32) -> i32 {
    let raw = target.health.saturating_sub(magnitude);
    let capped = if magnitude < 0 {
        raw.min(target.max_health.max(target.health))
    } else {
        raw
    };
    capped.max(0)
}
