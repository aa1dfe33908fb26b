//! Notifier port - クライアントへの通知（アニメーション、属性変化、効果値）
//!
//! # 設計原則
//! - `dispatch` は同期・非ブロッキング。配送が遅くても次の tick の予約を遅らせない
//! - 失敗は実装側で握りつぶす（tick の制御フローに投げ返さない）

use crate::domain::Notification;

pub trait Notifier: Send + Sync {
    fn dispatch(&self, notification: Notification);
}
