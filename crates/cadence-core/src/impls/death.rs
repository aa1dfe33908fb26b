//! DeathRouter - EntityType ごとに死亡処理を振り分ける
//!
//! Character と NPC で死亡処理はまったく別物（リスポーン vs ドロップ + 消滅）
//! なので、それぞれの handler を受け取ってディスパッチするだけ。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::{Actor, EntityType};
use crate::ports::DeathHandler;

pub struct DeathRouter {
    character: Arc<dyn DeathHandler>,
    npc: Arc<dyn DeathHandler>,
}

impl DeathRouter {
    pub fn new(character: Arc<dyn DeathHandler>, npc: Arc<dyn DeathHandler>) -> Self {
        Self { character, npc }
    }
}

#[async_trait]
impl DeathHandler for DeathRouter {
    async fn handle_death(&self, target: &Actor) {
        match target.kind {
            EntityType::Character => self.character.handle_death(target).await,
            EntityType::Npc => self.npc.handle_death(target).await,
        }
    }
}

/// Only logs the death. Stand-in until a real handler is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDeathHandler;

#[async_trait]
impl DeathHandler for LoggingDeathHandler {
    async fn handle_death(&self, target: &Actor) {
        match target.kind {
            EntityType::Character => info!(actor = %target.id, "character_died"),
            EntityType::Npc => info!(actor = %target.id, "npc_died"),
        }
        if target.health > 0 {
            warn!(actor = %target.id, health = target.health, "death_with_positive_health");
        }
    }
}
