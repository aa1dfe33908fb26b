//! BattleCycleRegistry - actor id ごとの「生きている」繰り返しジョブ
//!
//! # 設計
//! - プロセス全体の static map ではなく、サービスに注入するオブジェクト
//! - actor ごとにスロット（Mutex<Option<Registration>>）を持つ。
//!   同じ actor への start / clear / 自己停止はスロットのロックで直列化され、
//!   別の actor 同士はお互いを待たない
//! - 不変条件: 1 actor につき Registration は高々 1 つ

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{ActorId, JobId};
use crate::ports::RepeatingJob;

/// One live battle cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub job: RepeatingJob,
    pub interval: Duration,
}

type Slot = Arc<Mutex<Option<Registration>>>;

#[derive(Default)]
pub struct BattleCycleRegistry {
    slots: Mutex<HashMap<ActorId, Slot>>,
}

/// Exclusive access to one actor's slot. Hand it back with
/// [`BattleCycleRegistry::unlock`] so empty slots get pruned.
pub struct SlotGuard {
    actor: ActorId,
    guard: OwnedMutexGuard<Option<Registration>>,
}

impl SlotGuard {
    pub fn current(&self) -> Option<Registration> {
        *self.guard
    }

    pub fn take(&mut self) -> Option<Registration> {
        self.guard.take()
    }

    pub fn replace(&mut self, registration: Registration) -> Option<Registration> {
        self.guard.replace(registration)
    }
}

impl BattleCycleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, actor: &ActorId) -> Slot {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(actor.clone()).or_default())
    }

    async fn existing_slot(&self, actor: &ActorId) -> Option<Slot> {
        self.slots.lock().await.get(actor).cloned()
    }

    /// Lock the actor's slot, creating it if needed.
    pub async fn lock(&self, actor: &ActorId) -> SlotGuard {
        let slot = self.slot(actor).await;
        SlotGuard {
            actor: actor.clone(),
            guard: slot.lock_owned().await,
        }
    }

    pub async fn unlock(&self, guard: SlotGuard) {
        let actor = guard.actor.clone();
        drop(guard);
        self.prune(&actor).await;
    }

    pub async fn get(&self, actor: &ActorId) -> Option<Registration> {
        let slot = self.existing_slot(actor).await?;
        let current = *slot.lock().await;
        current
    }

    /// Drop the registration only if it still belongs to `job`.
    /// A newer cycle started for the same actor is left alone.
    pub async fn release(&self, actor: &ActorId, job: JobId) -> Option<Registration> {
        let slot = self.existing_slot(actor).await?;
        let released = {
            let mut current = slot.lock().await;
            match *current {
                Some(reg) if reg.job.job == job => current.take(),
                _ => None,
            }
        };
        drop(slot);
        self.prune(actor).await;
        released
    }

    pub async fn len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.lock().await.values().cloned().collect();
        let mut live = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                live += 1;
            }
        }
        live
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove an empty slot nobody else is holding.
    async fn prune(&self, actor: &ActorId) {
        let mut slots = self.slots.lock().await;
        let removable = slots.get(actor).is_some_and(|slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|reg| reg.is_none())
        });
        if removable {
            slots.remove(actor);
        }
    }
}
