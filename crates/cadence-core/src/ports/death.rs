//! DeathHandler port - 死亡処理（ドロップ、リスポーン、経験値など）は外部

use async_trait::async_trait;

use crate::domain::Actor;

#[async_trait]
pub trait DeathHandler: Send + Sync {
    async fn handle_death(&self, target: &Actor);
}
