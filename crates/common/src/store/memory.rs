//! In-memory `AbstractStore`. All data is lost on restart.

use super::AbstractStore;
use crate::abstracts::{Abstract, AbstractSettings};
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Abstracts keyed by `(event_id, id)`
#[derive(Default)]
pub struct InMemoryStore {
    abstracts: RwLock<HashMap<(String, String), Abstract>>,
    settings: RwLock<HashMap<String, AbstractSettings>>,
    counters: RwLock<HashMap<String, u32>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed settings and records, e.g. for tests
    pub async fn with_event(self, event_id: &str, settings: AbstractSettings, records: Vec<Abstract>) -> Self {
        self.settings
            .write()
            .await
            .insert(event_id.to_string(), settings);
        {
            let mut abstracts = self.abstracts.write().await;
            for record in records {
                abstracts.insert((record.event_id.clone(), record.id.clone()), record);
            }
        }
        self
    }
}

fn key(event_id: &str, id: &str) -> (String, String) {
    (event_id.to_string(), id.to_string())
}

#[async_trait]
impl AbstractStore for InMemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_abstracts(&self, event_id: &str) -> Result<Vec<Abstract>> {
        let abstracts = self.abstracts.read().await;
        let mut records: Vec<Abstract> = abstracts
            .values()
            .filter(|record| record.event_id == event_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn find_abstract(&self, event_id: &str, id: &str) -> Result<Option<Abstract>> {
        let abstracts = self.abstracts.read().await;
        Ok(abstracts.get(&key(event_id, id)).cloned())
    }

    async fn save_abstract(&self, record: &Abstract) -> Result<()> {
        let mut abstracts = self.abstracts.write().await;
        abstracts.insert(key(&record.event_id, &record.id), record.clone());
        Ok(())
    }

    async fn delete_abstract(&self, event_id: &str, id: &str) -> Result<bool> {
        let mut abstracts = self.abstracts.write().await;
        Ok(abstracts.remove(&key(event_id, id)).is_some())
    }

    async fn next_abstract_number(&self, event_id: &str) -> Result<u32> {
        let mut counters = self.counters.write().await;
        let counter = counters.entry(event_id.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn find_settings(&self, event_id: &str) -> Result<Option<AbstractSettings>> {
        let settings = self.settings.read().await;
        Ok(settings.get(event_id).cloned())
    }

    async fn save_settings(&self, event_id: &str, settings: &AbstractSettings) -> Result<()> {
        let mut all = self.settings.write().await;
        all.insert(event_id.to_string(), settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstracts::model::fixtures::{at, sample};
    use crate::abstracts::AbstractStatus;

    #[tokio::test]
    async fn save_list_and_delete() {
        let store = InMemoryStore::new();
        let mut late = sample("a2", AbstractStatus::Submitted);
        late.created_at = at(5);
        store.save_abstract(&late).await.unwrap();
        store.save_abstract(&sample("a1", AbstractStatus::Draft)).await.unwrap();

        let mut other_event = sample("a3", AbstractStatus::Draft);
        other_event.event_id = "evt-2".into();
        store.save_abstract(&other_event).await.unwrap();

        let listed = store.list_abstracts("evt-1").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["a1", "a2"]);

        assert!(store.delete_abstract("evt-1", "a1").await.unwrap());
        assert!(!store.delete_abstract("evt-1", "a1").await.unwrap());
        assert!(store.find_abstract("evt-1", "a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn numbers_are_sequential_per_event() {
        let store = InMemoryStore::new();
        assert_eq!(store.next_abstract_number("evt-1").await.unwrap(), 1);
        assert_eq!(store.next_abstract_number("evt-1").await.unwrap(), 2);
        assert_eq!(store.next_abstract_number("evt-2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn settings_round_trip() {
        let store = InMemoryStore::new();
        assert!(store.find_settings("evt-1").await.unwrap().is_none());

        let settings = AbstractSettings {
            max_length: Some(300),
            ..AbstractSettings::default()
        };
        store.save_settings("evt-1", &settings).await.unwrap();
        assert_eq!(store.find_settings("evt-1").await.unwrap(), Some(settings));
    }
}
