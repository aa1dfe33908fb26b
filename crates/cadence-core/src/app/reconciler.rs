//! EffectReconciler - 駆動されていない効果エントリを拾い直す
//!
//! effect chain はプロセスローカルなタイマーで繋がっているので、プロセスが
//! 落ちると `applied_effects` にエントリだけが残る。sweep はそれを見つけて
//! 残り時間を計算し直し、チェーンを再開する。
//!
//! # 孤児の判定
//! - 死んでいる actor は対象外
//! - このプロセスにチェーンがあれば対象外
//! - `now - last_updated > interval + grace` のときだけ孤児。tick は毎回
//!   `last_updated` を更新するので、別プロセスが駆動中のエントリは新しいまま
//!
//! # 残り時間
//! - 有限: `total - (now - applied_at)`、0 未満は 0（最後の 1 回を適用してエントリを消す）
//! - 無期限: そのまま無期限
//! - カタログに無い key は触らない（ログのみ）

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::effect_cycle::EffectCycles;
use crate::domain::{AppliedEffect, EffectCatalog, EffectDefinition, Remaining, SchedulerError};
use crate::ports::{Clock, EntityStore};

/// What one sweep found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub scanned_actors: usize,
    pub dead_actors: usize,
    pub already_driven: usize,
    /// Touched recently, most likely driven by another process.
    pub recently_updated: usize,
    pub resumed: usize,
    pub unknown_keys: usize,
}

pub struct EffectReconciler {
    store: Arc<dyn EntityStore>,
    catalog: Arc<EffectCatalog>,
    effects: EffectCycles,
    clock: Arc<dyn Clock>,
    grace: Duration,
}

impl EffectReconciler {
    pub fn new(
        store: Arc<dyn EntityStore>,
        catalog: Arc<EffectCatalog>,
        effects: EffectCycles,
        clock: Arc<dyn Clock>,
        grace: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            effects,
            clock,
            grace,
        }
    }

    pub async fn sweep(&self) -> Result<ReconcileReport, SchedulerError> {
        let actors = self.store.list_with_effects().await?;
        let now_ms = self.clock.now_ms();
        let mut report = ReconcileReport {
            scanned_actors: actors.len(),
            ..ReconcileReport::default()
        };

        for actor in actors {
            if !actor.is_alive {
                report.dead_actors += 1;
                continue;
            }
            let target = actor.actor_ref();
            for entry in &actor.applied_effects {
                if self.effects.has_live_chain(&target, &entry.key) {
                    report.already_driven += 1;
                    continue;
                }
                let Some(definition) = self.catalog.get(&entry.key) else {
                    warn!(target_actor = %target, effect = %entry.key, "orphaned_effect_unknown_key");
                    report.unknown_keys += 1;
                    continue;
                };
                if !is_stale(&definition, entry, now_ms, self.grace) {
                    report.recently_updated += 1;
                    continue;
                }

                let remaining = remaining_for(&definition, entry, now_ms);
                // 攻撃者が記録されていなければ自分自身を attacker として扱う
                let attacker = entry.source.clone().unwrap_or_else(|| target.clone());
                info!(
                    target_actor = %target,
                    effect = %entry.key,
                    remaining_ms = remaining.as_millis_or_negative(),
                    "orphaned_effect_resumed"
                );
                self.effects
                    .resume(definition, target.clone(), attacker, remaining);
                report.resumed += 1;
            }
        }

        debug!(?report, "effect_sweep_done");
        Ok(report)
    }

    /// Run `sweep` every `every` until the handle is shut down. The first sweep
    /// runs immediately.
    pub fn spawn_periodic(self: Arc<Self>, every: Duration) -> ReconcilerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep().await {
                            warn!(error = %e, "effect_sweep_failed");
                        }
                    }
                }
            }
            debug!("effect_reconciler_stopped");
        });
        ReconcilerHandle { shutdown_tx, join }
    }
}

fn is_stale(definition: &EffectDefinition, entry: &AppliedEffect, now_ms: i64, grace: Duration) -> bool {
    let idle_ms = now_ms.saturating_sub(entry.last_updated_ms);
    let limit_ms = (definition.interval + grace).as_millis() as i64;
    idle_ms > limit_ms
}

fn remaining_for(definition: &EffectDefinition, entry: &AppliedEffect, now_ms: i64) -> Remaining {
    match definition.total_duration {
        None => Remaining::Indefinite,
        Some(total) => {
            let elapsed = now_ms.saturating_sub(entry.applied_at_ms).max(0) as u64;
            Remaining::Finite(total.saturating_sub(Duration::from_millis(elapsed)))
        }
    }
}

/// Stops a periodic reconciler.
pub struct ReconcilerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ReconcilerHandle {
    pub async fn shutdown(self) {
        // ignore send error: the loop already exited
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            warn!(error = %e, "effect_reconciler_join_failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Actor, ActorRef, FixedMagnitude};
    use crate::impls::{InMemoryEntityStore, LoggingDeathHandler, TokioTimer, TracingNotifier};
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn poison() -> EffectDefinition {
        EffectDefinition::new("poison", Duration::from_millis(1000), Arc::new(FixedMagnitude(1)))
            .with_total_duration(Duration::from_millis(3000))
    }

    #[rstest]
    #[case::fresh(0, Remaining::Finite(Duration::from_millis(3000)))]
    #[case::partly_elapsed(1200, Remaining::Finite(Duration::from_millis(1800)))]
    #[case::overdue(9000, Remaining::Finite(Duration::ZERO))]
    #[case::clock_skew(-500, Remaining::Finite(Duration::from_millis(3000)))]
    fn remaining_is_total_minus_elapsed(#[case] elapsed_ms: i64, #[case] expected: Remaining) {
        let entry = AppliedEffect::new("poison", 10_000);
        assert_eq!(remaining_for(&poison(), &entry, 10_000 + elapsed_ms), expected);
    }

    #[rstest]
    #[case::just_touched(0, false)]
    #[case::one_interval_late(1000, false)]
    #[case::at_the_limit(1500, false)]
    #[case::past_the_limit(1501, true)]
    #[case::touched_in_the_future(-300, false)]
    fn stale_after_interval_plus_grace(#[case] idle_ms: i64, #[case] expected: bool) {
        let entry = AppliedEffect::new("poison", 10_000);
        let grace = Duration::from_millis(500);
        assert_eq!(is_stale(&poison(), &entry, 10_000 + idle_ms, grace), expected);
    }

    #[test]
    fn indefinite_stays_indefinite() {
        let regen = EffectDefinition::new("regen", Duration::from_secs(1), Arc::new(FixedMagnitude(-1)));
        let entry = AppliedEffect::new("regen", 0);
        assert_eq!(remaining_for(&regen, &entry, 50_000), Remaining::Indefinite);
    }

    struct Fixture {
        store: Arc<InMemoryEntityStore>,
        clock: Arc<FixedClock>,
        effects: EffectCycles,
        reconciler: Arc<EffectReconciler>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryEntityStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        ));
        let effects = EffectCycles::new(
            store.clone(),
            Arc::new(TokioTimer),
            Arc::new(LoggingDeathHandler),
            Arc::new(TracingNotifier),
            clock.clone(),
        );
        let catalog = Arc::new(EffectCatalog::new().with(poison()));
        let reconciler = Arc::new(EffectReconciler::new(
            store.clone(),
            catalog,
            effects.clone(),
            clock.clone(),
            Duration::from_millis(500),
        ));
        Fixture {
            store,
            clock,
            effects,
            reconciler,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn orphaned_entry_is_resumed_once() {
        let f = fixture();
        let hero = ActorRef::character("hero");
        let applied_at = f.clock.now_ms();
        f.store
            .save(
                Actor::new(hero.clone(), 100).with_effect(
                    AppliedEffect::new("poison", applied_at).with_source(ActorRef::npc("spider")),
                ),
            )
            .await
            .unwrap();
        f.clock.advance_ms(1800);

        let first = f.reconciler.sweep().await.unwrap();
        assert_eq!(first.resumed, 1);
        assert!(f.effects.has_live_chain(&hero, "poison"));

        let second = f.reconciler.sweep().await.unwrap();
        assert_eq!(second.resumed, 0);
        assert_eq!(second.already_driven, 1);

        // 1200ms left: ticks at remaining 1200 and 200, then the entry is gone
        tokio::time::sleep(Duration::from_millis(5000)).await;
        let hero = f.store.find_by_id(&hero).await.unwrap().unwrap();
        assert_eq!(hero.health, 98);
        assert!(hero.applied_effects.is_empty());
        assert_eq!(f.effects.live_chains(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn chain_driven_elsewhere_is_not_resumed() {
        let f = fixture();
        // 同じストアを共有する別プロセス
        let elsewhere = EffectCycles::new(
            f.store.clone(),
            Arc::new(TokioTimer),
            Arc::new(LoggingDeathHandler),
            Arc::new(TracingNotifier),
            f.clock.clone(),
        );
        let hero = ActorRef::character("hero");
        let spider = ActorRef::npc("spider");
        f.store
            .save(
                Actor::new(hero.clone(), 100)
                    .with_effect(AppliedEffect::new("poison", f.clock.now_ms()).with_source(spider.clone())),
            )
            .await
            .unwrap();
        f.store.save(Actor::new(spider.clone(), 30)).await.unwrap();
        elsewhere.start(Arc::new(poison()), hero.clone(), spider);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let report = f.reconciler.sweep().await.unwrap();
        assert_eq!(report.resumed, 0);
        assert_eq!(report.recently_updated, 1);

        // 一周期ぶん遅れても grace の内側
        f.clock.advance_ms(1200);
        let report = f.reconciler.sweep().await.unwrap();
        assert_eq!(report.resumed, 0);
        assert_eq!(report.recently_updated, 1);

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(elsewhere.applications(), 4);
        assert_eq!(f.effects.applications(), 0);
        let hero = f.store.find_by_id(&hero).await.unwrap().unwrap();
        assert_eq!(hero.health, 96);
        assert!(hero.applied_effects.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dead_actors_are_never_resumed() {
        let f = fixture();
        let corpse = ActorRef::npc("corpse");
        f.store
            .save(Actor::new(corpse.clone(), 0).with_effect(AppliedEffect::new("poison", 0)))
            .await
            .unwrap();

        for _ in 0..3 {
            let report = f.reconciler.sweep().await.unwrap();
            assert_eq!(report.dead_actors, 1);
            assert_eq!(report.resumed, 0);
            tokio::time::sleep(Duration::from_millis(2000)).await;
        }
        assert_eq!(f.effects.applications(), 0);
        assert_eq!(f.effects.live_chains(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_keys_are_left_alone() {
        let f = fixture();
        let bat = ActorRef::npc("bat");
        f.store
            .save(Actor::new(bat.clone(), 10).with_effect(AppliedEffect::new("curse", 0)))
            .await
            .unwrap();

        let report = f.reconciler.sweep().await.unwrap();
        assert_eq!(report.scanned_actors, 1);
        assert_eq!(report.unknown_keys, 1);
        assert_eq!(report.resumed, 0);

        let bat = f.store.find_by_id(&bat).await.unwrap().unwrap();
        assert!(bat.has_effect("curse"));
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_sweep_stops_on_shutdown() {
        let f = fixture();
        let handle = Arc::clone(&f.reconciler).spawn_periodic(Duration::from_millis(1000));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.shutdown().await;

        f.store
            .save(
                Actor::new(ActorRef::character("late"), 100)
                    .with_effect(AppliedEffect::new("poison", f.clock.now_ms())),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(f.effects.applications(), 0);
    }

    #[tokio::test]
    async fn store_outage_is_an_error() {
        let f = fixture();
        f.store.set_offline(true);
        assert!(f.reconciler.sweep().await.is_err());
    }
}
