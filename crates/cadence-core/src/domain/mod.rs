//! Domain model (IDs, actors, effect definitions, notifications, errors).

pub mod actor;
pub mod effect;
pub mod errors;
pub mod ids;
pub mod notification;

pub use actor::{Actor, ActorPatch, AppliedEffect, CombatDetail};
pub use effect::{EffectCatalog, EffectCompute, EffectDefinition, FixedMagnitude, Remaining};
pub use errors::{ComputeError, ErrorKind, FlagStoreError, JobError, SchedulerError, StoreError};
pub use ids::{ActorId, ActorRef, EntityType, Id, IdMarker, JobId, WorkerId};
pub use notification::Notification;
