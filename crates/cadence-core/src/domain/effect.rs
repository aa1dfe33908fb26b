//! EffectDefinition - 状態異常・バフの静的定義
//!
//! # 構成
//! - key / interval / total_duration / target_animation_key
//! - compute: 1 tick あたりの効果量を計算する戦略（外部から注入）
//!
//! 効果量の符号: 正ならダメージ、負なら回復。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::actor::Actor;
use super::errors::ComputeError;

/// EffectCompute は (target, attacker) から効果量を計算する
///
/// attacker は詳細付きで読み直したもの。攻撃者が既に存在しない場合は `None`。
#[async_trait]
pub trait EffectCompute: Send + Sync {
    async fn compute(&self, target: &Actor, attacker: Option<&Actor>) -> Result<i32, ComputeError>;
}

/// 毎 tick 同じ値を返す compute（テスト・デモ用）
#[derive(Debug, Clone, Copy)]
pub struct FixedMagnitude(pub i32);

#[async_trait]
impl EffectCompute for FixedMagnitude {
    async fn compute(&self, _target: &Actor, _attacker: Option<&Actor>) -> Result<i32, ComputeError> {
        Ok(self.0)
    }
}

/// Static description of one status effect.
#[derive(Clone)]
pub struct EffectDefinition {
    pub key: String,
    pub interval: Duration,
    /// `None` = indefinite.
    pub total_duration: Option<Duration>,
    pub target_animation_key: String,
    pub compute: Arc<dyn EffectCompute>,
}

impl EffectDefinition {
    pub fn new(key: impl Into<String>, interval: Duration, compute: Arc<dyn EffectCompute>) -> Self {
        let key = key.into();
        Self {
            target_animation_key: key.clone(),
            key,
            interval,
            total_duration: None,
            compute,
        }
    }

    pub fn with_total_duration(mut self, total: Duration) -> Self {
        self.total_duration = Some(total);
        self
    }

    pub fn with_animation(mut self, key: impl Into<String>) -> Self {
        self.target_animation_key = key.into();
        self
    }

    /// Remaining budget for a freshly started chain.
    pub fn initial_remaining(&self) -> Remaining {
        match self.total_duration {
            Some(total) => Remaining::Finite(total),
            None => Remaining::Indefinite,
        }
    }
}

impl fmt::Debug for EffectDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectDefinition")
            .field("key", &self.key)
            .field("interval", &self.interval)
            .field("total_duration", &self.total_duration)
            .field("target_animation_key", &self.target_animation_key)
            .finish_non_exhaustive()
    }
}

/// Duration budget left on an effect chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Indefinite,
    Finite(Duration),
}

impl Remaining {
    /// Whether another tick should be armed after the current one.
    pub fn runs_again(self, interval: Duration) -> bool {
        match self {
            Remaining::Indefinite => true,
            Remaining::Finite(left) => left >= interval,
        }
    }

    /// Budget after one more interval has been consumed.
    pub fn after(self, interval: Duration) -> Self {
        match self {
            Remaining::Indefinite => Remaining::Indefinite,
            Remaining::Finite(left) => Remaining::Finite(left.saturating_sub(interval)),
        }
    }

    /// Legacy millisecond form: `-1` for indefinite.
    pub fn as_millis_or_negative(self) -> i64 {
        match self {
            Remaining::Indefinite => -1,
            Remaining::Finite(left) => left.as_millis() as i64,
        }
    }
}

/// Effect definitions by key, used to resume orphaned effect entries.
#[derive(Debug, Clone, Default)]
pub struct EffectCatalog {
    definitions: HashMap<String, Arc<EffectDefinition>>,
}

impl EffectCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last registration for a key wins.
    pub fn insert(&mut self, definition: EffectDefinition) {
        self.definitions
            .insert(definition.key.clone(), Arc::new(definition));
    }

    pub fn with(mut self, definition: EffectDefinition) -> Self {
        self.insert(definition);
        self
    }

    pub fn get(&self, key: &str) -> Option<Arc<EffectDefinition>> {
        self.definitions.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
