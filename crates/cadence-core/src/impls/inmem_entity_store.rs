//! InMemoryEntityStore - 開発・テスト用のエンティティストア
//!
//! # 実装詳細
//! - HashMap<ActorRef, Actor> を tokio RwLock で保護
//! - find_by_id は detail を落として返す（詳細付きは find_detailed のみ）
//! - set_offline(true) で全操作が StoreError::Unavailable を返す（障害注入）
//! - id が空の actor の save は StoreError::Rejected

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Actor, ActorPatch, ActorRef, StoreError};
use crate::ports::EntityStore;

#[derive(Default)]
pub struct InMemoryEntityStore {
    actors: RwLock<HashMap<ActorRef, Actor>>,
    offline: AtomicBool,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }

    /// Direct mutation hook for callers outside the scheduler (cures, target changes).
    pub async fn modify<F>(&self, actor: &ActorRef, f: F) -> bool
    where
        F: FnOnce(&mut Actor),
    {
        let mut actors = self.actors.write().await;
        match actors.get_mut(actor) {
            Some(found) => {
                f(found);
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, actor: &ActorRef) -> Option<Actor> {
        self.actors.write().await.remove(actor)
    }

    pub async fn len(&self) -> usize {
        self.actors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.actors.read().await.is_empty()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn find_by_id(&self, actor: &ActorRef) -> Result<Option<Actor>, StoreError> {
        self.check_online()?;
        let actors = self.actors.read().await;
        Ok(actors.get(actor).map(|found| {
            let mut plain = found.clone();
            plain.detail = None;
            plain
        }))
    }

    async fn find_detailed(&self, actor: &ActorRef) -> Result<Option<Actor>, StoreError> {
        self.check_online()?;
        Ok(self.actors.read().await.get(actor).cloned())
    }

    async fn update_attributes(
        &self,
        actor: &ActorRef,
        patch: ActorPatch,
    ) -> Result<Option<Actor>, StoreError> {
        self.check_online()?;
        let mut actors = self.actors.write().await;
        let Some(found) = actors.get_mut(actor) else {
            return Ok(None);
        };
        found.apply(patch);
        Ok(Some(found.clone()))
    }

    async fn save(&self, actor: Actor) -> Result<(), StoreError> {
        self.check_online()?;
        if actor.id.as_str().trim().is_empty() {
            return Err(StoreError::Rejected("actor id must not be empty".to_string()));
        }
        let key = actor.actor_ref();
        self.actors.write().await.insert(key, actor);
        Ok(())
    }

    async fn list_with_effects(&self) -> Result<Vec<Actor>, StoreError> {
        self.check_online()?;
        let actors = self.actors.read().await;
        Ok(actors
            .values()
            .filter(|a| !a.applied_effects.is_empty())
            .cloned()
            .collect())
    }
}
