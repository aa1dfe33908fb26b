//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部の協調者（エンティティストア、分散キュー、フラグストア、
//! 通知、死亡処理）へのインターフェース。スケジューラ本体（app）は
//! これらにしか依存しない。

pub mod clock;
pub mod death;
pub mod entity_store;
pub mod flag_store;
pub mod id_generator;
pub mod job_runtime;
pub mod notifier;
pub mod timer;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::death::DeathHandler;
pub use self::entity_store::EntityStore;
pub use self::flag_store::{FlagStore, is_truthy};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::job_runtime::{JobFiring, JobHandler, JobRuntime, RepeatSpec, RepeatingJob};
pub use self::notifier::Notifier;
pub use self::timer::{Deferred, Timer};
