//! Domain identifiers (strongly-typed IDs).
//!
//! # 2 種類の ID
//! - **ActorId / ActorRef**: エンティティストア側が払い出す ID。スケジューラは
//!   ID と型タグ（Character / NPC）だけを保持し、Actor 本体は毎 tick 読み直す。
//! - **JobId / WorkerId**: JobRuntime が払い出す ULID ベースの ID。
//!   Phantom type パターンで JobId と WorkerId を混同できないようにしている。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Identifier of a Character or NPC, as issued by the entity store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Type tag of an actor. Lookups, death handling and notifications branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Character,
    #[serde(rename = "NPC")]
    Npc,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Character => f.write_str("Character"),
            EntityType::Npc => f.write_str("NPC"),
        }
    }
}

/// ID + 型タグ。スケジューラが Actor について保持してよいのはこれだけ。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorRef {
    pub id: ActorId,
    pub kind: EntityType,
}

impl ActorRef {
    pub fn new(id: impl Into<ActorId>, kind: EntityType) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn character(id: impl Into<ActorId>) -> Self {
        Self::new(id, EntityType::Character)
    }

    pub fn npc(id: impl Into<ActorId>) -> Self {
        Self::new(id, EntityType::Npc)
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"job-", "worker-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ULID ベースのジェネリック ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// 繰り返しジョブ（スケジュール側）のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Job {}

impl IdMarker for Job {
    fn prefix() -> &'static str {
        "job-"
    }
}

/// ワーカー（実行側）のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Worker {}

impl IdMarker for Worker {
    fn prefix() -> &'static str {
        "worker-"
    }
}

/// Identifier of a repeating job schedule (the "queue handle").
pub type JobId = Id<Job>;

/// Identifier of the worker that executes a repeating job's firings.
pub type WorkerId = Id<Worker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let ulid1 = Ulid::new();
        let ulid2 = Ulid::new();

        let job = JobId::from_ulid(ulid1);
        let worker = WorkerId::from_ulid(ulid2);

        assert_eq!(job.as_ulid(), ulid1);
        assert_eq!(worker.as_ulid(), ulid2);

        assert!(job.to_string().starts_with("job-"));
        assert!(worker.to_string().starts_with("worker-"));
        // let _: JobId = worker; // <- does not compile
    }

    #[test]
    fn actor_ref_display_includes_type_tag() {
        assert_eq!(ActorRef::npc("npc-1").to_string(), "NPC:npc-1");
        assert_eq!(ActorRef::character("c-7").to_string(), "Character:c-7");
    }

    #[test]
    fn entity_type_uses_store_names_on_the_wire() {
        let s = serde_json::to_string(&EntityType::Npc).unwrap();
        assert_eq!(s, "\"NPC\"");

        let r: ActorRef = serde_json::from_str(r#"{"id":"abc","kind":"Character"}"#).unwrap();
        assert_eq!(r, ActorRef::character("abc"));
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<JobId>(), size_of::<Ulid>());
        assert_eq!(size_of::<WorkerId>(), size_of::<Ulid>());
    }
}
