//! Errors - エラー型と分類
//!
//! # 分類
//! - Transient: 一時的なエラー（ストアの瞬断など。次の tick で回復しうる）
//! - Permanent: 恒久的なエラー（設定ミス、閉じたランタイムへの投入など）
//! - Infrastructure: インフラエラー（ストア・キューの障害）
//!
//! サイクル内部で起きたエラーはログに出すだけで呼び出し元には返さない。
//! 呼び出し元に返るのは start / clear / build の失敗のみ。

use thiserror::Error;

use super::ids::WorkerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Failure reported by an [`EntityStore`](crate::ports::EntityStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entity store unavailable: {0}")]
    Unavailable(String),

    #[error("entity store rejected update: {0}")]
    Rejected(String),
}

/// Failure reported by a [`FlagStore`](crate::ports::FlagStore).
#[derive(Debug, Error)]
#[error("flag store error: {0}")]
pub struct FlagStoreError(pub String);

/// Failure of an effect's magnitude computation.
#[derive(Debug, Error)]
#[error("effect computation failed: {0}")]
pub struct ComputeError(pub String);

/// Failure of a [`JobRuntime`](crate::ports::JobRuntime) operation.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job runtime is closed")]
    RuntimeClosed,

    #[error("repeat interval must be positive")]
    ZeroInterval,

    #[error("failed to close worker {0}: {1}")]
    CloseFailed(WorkerId, String),
}

/// SchedulerError はスケジューラ API の呼び出し元に返るエラー
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Flags(#[from] FlagStoreError),

    #[error(transparent)]
    Job(#[from] JobError),
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::Store(StoreError::Unavailable(_)) => ErrorKind::Transient,
            SchedulerError::Store(StoreError::Rejected(_)) => ErrorKind::Permanent,
            SchedulerError::Flags(_) => ErrorKind::Infrastructure,
            SchedulerError::Job(JobError::RuntimeClosed | JobError::ZeroInterval) => {
                ErrorKind::Permanent
            }
            SchedulerError::Job(_) => ErrorKind::Infrastructure,
        }
    }
}
