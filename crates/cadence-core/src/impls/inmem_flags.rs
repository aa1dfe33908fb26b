//! InMemoryFlagStore - 開発用のフラグストア
//!
//! namespace ごとに HashMap を持つ。空になった namespace は消す。

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::FlagStoreError;
use crate::ports::FlagStore;

#[derive(Default)]
pub struct InMemoryFlagStore {
    namespaces: Mutex<HashMap<String, HashMap<String, Value>>>,
}

impl InMemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of namespaces holding at least one flag.
    pub async fn namespace_count(&self) -> usize {
        self.namespaces.lock().await.len()
    }
}

#[async_trait]
impl FlagStore for InMemoryFlagStore {
    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), FlagStoreError> {
        self.namespaces
            .lock()
            .await
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, FlagStoreError> {
        let namespaces = self.namespaces.lock().await;
        Ok(namespaces
            .get(namespace)
            .and_then(|values| values.get(key))
            .cloned())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), FlagStoreError> {
        let mut namespaces = self.namespaces.lock().await;
        if let Some(values) = namespaces.get_mut(namespace) {
            values.remove(key);
            if values.is_empty() {
                namespaces.remove(namespace);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_delete() {
        let flags = InMemoryFlagStore::new();
        flags.set("ns", "k", json!(true)).await.unwrap();
        assert_eq!(flags.get("ns", "k").await.unwrap(), Some(json!(true)));
        assert!(flags.has("ns", "k").await.unwrap());

        flags.delete("ns", "k").await.unwrap();
        assert_eq!(flags.get("ns", "k").await.unwrap(), None);
        assert_eq!(flags.namespace_count().await, 0);
    }

    #[tokio::test]
    async fn delete_missing_is_ok() {
        let flags = InMemoryFlagStore::new();
        flags.delete("nope", "nothing").await.unwrap();
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let flags = InMemoryFlagStore::new();
        flags.set("a", "k", json!(1)).await.unwrap();
        flags.set("b", "k", json!(2)).await.unwrap();

        flags.delete("a", "k").await.unwrap();
        assert_eq!(flags.get("a", "k").await.unwrap(), None);
        assert_eq!(flags.get("b", "k").await.unwrap(), Some(json!(2)));
        assert_eq!(flags.namespace_count().await, 1);
    }

    #[tokio::test]
    async fn set_overwrites() {
        let flags = InMemoryFlagStore::new();
        flags.set("ns", "k", json!(true)).await.unwrap();
        flags.set("ns", "k", json!(false)).await.unwrap();
        assert_eq!(flags.get("ns", "k").await.unwrap(), Some(json!(false)));
    }
}
