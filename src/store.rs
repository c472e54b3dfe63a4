use crate::model::SelectionRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Selection records keyed by conversation id.
///
/// Each conversation gets its own async lock; holding the guard returned by
/// [`SelectionStore::lock`] serializes every step for that conversation while
/// other conversations proceed independently.
#[derive(Debug, Clone, Default)]
pub struct SelectionStore {
    records: Arc<Mutex<HashMap<String, Arc<AsyncMutex<SelectionRecord>>>>>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, conversation: &str) -> OwnedMutexGuard<SelectionRecord> {
        self.slot(conversation).lock_owned().await
    }

    #[cfg(test)]
    pub async fn get(&self, conversation: &str) -> SelectionRecord {
        self.lock(conversation).await.clone()
    }

    pub async fn update<F, T>(&self, conversation: &str, mutator: F) -> T
    where
        F: FnOnce(&mut SelectionRecord) -> T,
    {
        let mut record = self.lock(conversation).await;
        mutator(&mut *record)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn slot(&self, conversation: &str) -> Arc<AsyncMutex<SelectionRecord>> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        records
            .entry(conversation.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::SelectionStore;
    use crate::model::SelectionRecord;
    use tokio::time::{Duration, sleep};

    #[tokio::test]
    async fn missing_conversation_reads_as_empty_record() {
        let store = SelectionStore::new();
        assert_eq!(store.get("C1").await, SelectionRecord::default());
    }

    #[tokio::test]
    async fn updates_are_scoped_to_their_conversation() {
        let store = SelectionStore::new();
        store.update("C1", |record| record.select_command("get")).await;
        store
            .update("C2", |record| record.select_command("logs"))
            .await;

        assert_eq!(store.get("C1").await.command.as_deref(), Some("get"));
        assert_eq!(store.get("C2").await.command.as_deref(), Some("logs"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_read_modify_write_does_not_lose_updates() {
        let store = SelectionStore::new();
        let mut handles = Vec::new();
        for index in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut record = store.lock("C1").await;
                let mut offered = record.offered_pods.clone();
                sleep(Duration::from_millis(1)).await;
                offered.push(format!("pod-{index}"));
                record.offered_pods = offered;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get("C1").await.offered_pods.len(), 32);
    }
}
