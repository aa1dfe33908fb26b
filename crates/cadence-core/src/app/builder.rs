//! SchedulerBuilder - ports を組み立てて Scheduler を作る
//!
//! # Fail-fast 設計
//! - 必須の port が 1 つでも欠けていたら build() が `BuildError::MissingPort` を返す
//! - 任意のもの（config / clock / catalog）はデフォルトで埋める

use std::sync::Arc;

use super::battle_cycle::BattleCycles;
use super::config::SchedulerConfig;
use super::effect_cycle::EffectCycles;
use super::reconciler::{EffectReconciler, ReconcilerHandle};
use super::registry::BattleCycleRegistry;
use super::status::SchedulerStatus;
use crate::domain::EffectCatalog;
use crate::ports::{
    Clock, DeathHandler, EntityStore, FlagStore, JobRuntime, Notifier, SystemClock, Timer,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing port: {0}. Call the matching builder method before build().")]
    MissingPort(&'static str),
}

#[derive(Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    store: Option<Arc<dyn EntityStore>>,
    flags: Option<Arc<dyn FlagStore>>,
    jobs: Option<Arc<dyn JobRuntime>>,
    timer: Option<Arc<dyn Timer>>,
    death: Option<Arc<dyn DeathHandler>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
    catalog: EffectCatalog,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn entity_store(mut self, store: Arc<dyn EntityStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn flag_store(mut self, flags: Arc<dyn FlagStore>) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn job_runtime(mut self, jobs: Arc<dyn JobRuntime>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn death_handler(mut self, death: Arc<dyn DeathHandler>) -> Self {
        self.death = Some(death);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Definitions the reconciler may resume.
    pub fn catalog(mut self, catalog: EffectCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn build(self) -> Result<Scheduler, BuildError> {
        let store = self.store.ok_or(BuildError::MissingPort("entity_store"))?;
        let flags = self.flags.ok_or(BuildError::MissingPort("flag_store"))?;
        let jobs = self.jobs.ok_or(BuildError::MissingPort("job_runtime"))?;
        let timer = self.timer.ok_or(BuildError::MissingPort("timer"))?;
        let death = self.death.ok_or(BuildError::MissingPort("death_handler"))?;
        let notifier = self.notifier.ok_or(BuildError::MissingPort("notifier"))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let config = Arc::new(self.config);

        let battle = BattleCycles::new(
            Arc::clone(&config),
            Arc::clone(&store),
            flags,
            Arc::clone(&jobs),
            Arc::new(BattleCycleRegistry::new()),
        );
        let effects = EffectCycles::new(
            Arc::clone(&store),
            timer,
            death,
            notifier,
            Arc::clone(&clock),
        );
        let reconciler = Arc::new(EffectReconciler::new(
            store,
            Arc::new(self.catalog),
            effects.clone(),
            clock,
            config.reconcile_grace(),
        ));

        Ok(Scheduler {
            config,
            jobs,
            battle,
            effects,
            reconciler,
        })
    }
}

/// Battle cycles, effect cycles and the orphan sweep, wired to one set of ports.
pub struct Scheduler {
    config: Arc<SchedulerConfig>,
    jobs: Arc<dyn JobRuntime>,
    battle: BattleCycles,
    effects: EffectCycles,
    reconciler: Arc<EffectReconciler>,
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn battle(&self) -> &BattleCycles {
        &self.battle
    }

    pub fn effects(&self) -> &EffectCycles {
        &self.effects
    }

    pub fn reconciler(&self) -> &Arc<EffectReconciler> {
        &self.reconciler
    }

    /// Start the periodic orphan sweep, unless disabled in config.
    pub fn spawn_reconciler(&self) -> Option<ReconcilerHandle> {
        let every = self.config.reconcile_interval()?;
        Some(Arc::clone(&self.reconciler).spawn_periodic(every))
    }

    pub async fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            battle_cycles: self.battle.live().await,
            live_jobs: self.jobs.live_jobs().await,
            effect_chains: self.effects.live_chains(),
            effect_applications: self.effects.applications(),
        }
    }
}
