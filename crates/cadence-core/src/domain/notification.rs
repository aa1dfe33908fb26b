//! Client-facing notifications emitted by effect ticks.
//!
//! Delivery (to the target and to observers nearby) is the notifier's job.

use serde::{Deserialize, Serialize};

use super::ids::ActorRef;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    /// Play an animation on the target.
    Animation { target: ActorRef, animation_key: String },

    /// Target's attributes changed.
    AttributesChanged {
        target: ActorRef,
        health: i32,
        mana: i32,
    },

    /// An effect tick landed on the target with this magnitude.
    EffectValue { target: ActorRef, value: i32 },
}

impl Notification {
    pub fn target(&self) -> &ActorRef {
        match self {
            Notification::Animation { target, .. }
            | Notification::AttributesChanged { target, .. }
            | Notification::EffectValue { target, .. } => target,
        }
    }
}
