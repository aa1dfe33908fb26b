//! FlagStore port - namespace + key の共有フラグストア（Redis hash 相当）
//!
//! BattleCycle はここに停止フラグを置く。サイクル本体への参照を持たなくても
//! 「次の機会に止まって」と伝えられる。

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::FlagStoreError;

#[async_trait]
pub trait FlagStore: Send + Sync {
    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), FlagStoreError>;

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, FlagStoreError>;

    async fn has(&self, namespace: &str, key: &str) -> Result<bool, FlagStoreError> {
        Ok(self.get(namespace, key).await?.is_some())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), FlagStoreError>;
}

/// Truthiness of a stored flag value. `null`, `false`, `0` and `""` are unset.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
