//! TokioTimer - `tokio::spawn` + `sleep` による単発タイマー
//!
//! プロセスローカル。プロセスが落ちると予約済みの tick も消える
//! （取りこぼした効果は `app::EffectReconciler` が拾い直す）。

use std::time::Duration;

use crate::ports::{Deferred, Timer};

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn after(&self, delay: Duration, task: Deferred) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
    }
}
