//! EntityStore port - キャラクター / NPC ドキュメントの正本
//!
//! # 設計原則
//! - スケジューラは Actor を長く保持しない。毎 tick ここから読み直す
//! - 更新は部分更新（ActorPatch）。同じ Actor への同時更新はストア側の
//!   セマンティクス（フィールド単位の last-write-wins）に任せる

use async_trait::async_trait;

use crate::domain::{Actor, ActorPatch, ActorRef, StoreError};

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Plain lookup. `detail` is not populated.
    async fn find_by_id(&self, actor: &ActorRef) -> Result<Option<Actor>, StoreError>;

    /// Lookup including combat detail (used for attackers).
    async fn find_detailed(&self, actor: &ActorRef) -> Result<Option<Actor>, StoreError> {
        self.find_by_id(actor).await
    }

    /// Atomically apply a partial update, returning the updated actor.
    /// `Ok(None)` when the actor no longer exists.
    async fn update_attributes(
        &self,
        actor: &ActorRef,
        patch: ActorPatch,
    ) -> Result<Option<Actor>, StoreError>;

    /// Insert or replace a whole document.
    async fn save(&self, actor: Actor) -> Result<(), StoreError>;

    /// Every actor whose `applied_effects` list is non-empty.
    async fn list_with_effects(&self) -> Result<Vec<Actor>, StoreError>;
}
