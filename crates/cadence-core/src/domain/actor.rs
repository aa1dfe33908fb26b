//! Actor model as seen by the scheduler.
//!
//! The entity store owns these documents. The scheduler only ever works on a
//! freshly loaded copy and writes back through [`ActorPatch`].

use serde::{Deserialize, Serialize};

use super::ids::{ActorId, ActorRef, EntityType};

/// One entry of an actor's `applied_effects` list.
///
/// Membership in the list is the source of truth for "is this effect still
/// active": a cure or cleanse removes the entry and the effect chain notices on
/// its next tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedEffect {
    pub key: String,
    pub applied_at_ms: i64,
    pub last_updated_ms: i64,

    /// Who applied the effect. Used to re-attribute a resumed chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ActorRef>,
}

impl AppliedEffect {
    pub fn new(key: impl Into<String>, now_ms: i64) -> Self {
        Self {
            key: key.into(),
            applied_at_ms: now_ms,
            last_updated_ms: now_ms,
            source: None,
        }
    }

    pub fn with_source(mut self, source: ActorRef) -> Self {
        self.source = Some(source);
        self
    }
}

/// Combat-relevant sub-attributes, only populated by detailed lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatDetail {
    pub level: u32,
    pub strength: u32,
    pub magic: u32,
    pub resistance: u32,
}

/// A Character or NPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub kind: EntityType,
    pub is_alive: bool,
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,

    /// Current combat target, if any.
    #[serde(default)]
    pub target: Option<ActorRef>,

    #[serde(default)]
    pub applied_effects: Vec<AppliedEffect>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<CombatDetail>,
}

impl Actor {
    pub fn new(actor: ActorRef, health: i32) -> Self {
        Self {
            id: actor.id,
            kind: actor.kind,
            is_alive: health > 0,
            health,
            max_health: health,
            mana: 0,
            target: None,
            applied_effects: Vec::new(),
            detail: None,
        }
    }

    pub fn actor_ref(&self) -> ActorRef {
        ActorRef::new(self.id.clone(), self.kind)
    }

    pub fn with_mana(mut self, mana: i32) -> Self {
        self.mana = mana;
        self
    }

    pub fn with_target(mut self, target: ActorRef) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_effect(mut self, effect: AppliedEffect) -> Self {
        self.applied_effects.push(effect);
        self
    }

    pub fn with_detail(mut self, detail: CombatDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn effect_index(&self, key: &str) -> Option<usize> {
        self.applied_effects.iter().position(|e| e.key == key)
    }

    pub fn has_effect(&self, key: &str) -> bool {
        self.effect_index(key).is_some()
    }

    /// Apply a patch in place, keeping `is_alive` consistent with health.
    pub fn apply(&mut self, patch: ActorPatch) {
        if let Some(health) = patch.health {
            self.health = health;
            if health <= 0 {
                self.is_alive = false;
            }
        }
        if let Some(mana) = patch.mana {
            self.mana = mana;
        }
        if let Some(effects) = patch.applied_effects {
            self.applied_effects = effects;
        }
    }
}

/// Partial attribute update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mana: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_effects: Option<Vec<AppliedEffect>>,
}

impl ActorPatch {
    pub fn health(mut self, health: i32) -> Self {
        self.health = Some(health);
        self
    }

    pub fn effects(mut self, effects: Vec<AppliedEffect>) -> Self {
        self.applied_effects = Some(effects);
        self
    }
}
