//! Timer port - 単発の遅延呼び出し
//!
//! EffectCycle は repeating timer を使わず、tick の最後に次の 1 回だけを
//! 予約する。キャンセルは不要（次を予約しないことが停止）。

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A unit of deferred work.
pub type Deferred = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub trait Timer: Send + Sync {
    /// Run `task` once, `delay` from now.
    fn after(&self, delay: Duration, task: Deferred);
}
