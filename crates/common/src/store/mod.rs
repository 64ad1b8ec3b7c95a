//! Storage abstraction for abstracts and per-event settings
//!
//! The gateway talks to an [`AbstractStore`]; the sea-orm
//! [`Repository`](crate::db::Repository) backs it in production and
//! [`InMemoryStore`] in development and tests.

mod memory;

pub use memory::InMemoryStore;

use crate::abstracts::{Abstract, AbstractSettings};
use crate::errors::Result;
use async_trait::async_trait;

#[async_trait]
pub trait AbstractStore: Send + Sync {
    /// Readiness check
    async fn ping(&self) -> Result<()>;

    /// Every abstract of an event, oldest first
    async fn list_abstracts(&self, event_id: &str) -> Result<Vec<Abstract>>;

    async fn find_abstract(&self, event_id: &str, id: &str) -> Result<Option<Abstract>>;

    /// Insert or overwrite (last write wins)
    async fn save_abstract(&self, record: &Abstract) -> Result<()>;

    /// Returns false when nothing was deleted
    async fn delete_abstract(&self, event_id: &str, id: &str) -> Result<bool>;

    /// Next sequential abstract number for an event, starting at 1
    async fn next_abstract_number(&self, event_id: &str) -> Result<u32>;

    async fn find_settings(&self, event_id: &str) -> Result<Option<AbstractSettings>>;

    async fn save_settings(&self, event_id: &str, settings: &AbstractSettings) -> Result<()>;
}
