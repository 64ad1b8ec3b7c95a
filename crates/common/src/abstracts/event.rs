//! Event-owned context: abstract settings, category taxonomy, reviewer pools

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Word limit applied when an event does not set `maxLength`
pub const DEFAULT_MAX_WORDS: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTopic {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sub_topics: Vec<SubTopic>,
    /// Reviewer pool used by automatic assignment
    #[serde(default)]
    pub reviewer_ids: Vec<String>,
}

impl Category {
    pub fn sub_topic(&self, id: &str) -> Option<&SubTopic> {
        self.sub_topics.iter().find(|t| t.id == id)
    }

    pub fn requires_sub_topic(&self) -> bool {
        !self.sub_topics.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionWindow {
    #[serde(default)]
    pub opens_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closes_at: Option<DateTime<Utc>>,
}

impl SubmissionWindow {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.opens_at.map_or(true, |open| now >= open)
            && self.closes_at.map_or(true, |close| now <= close)
    }
}

/// Per-event switches that gate every abstract operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbstractSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub window: SubmissionWindow,
    #[serde(default)]
    pub categories: Vec<Category>,
    /// Maximum words in `content`
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub allow_file_upload: bool,
}

fn default_enabled() -> bool { true }

impl Default for AbstractSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            window: SubmissionWindow::default(),
            categories: Vec::new(),
            max_length: None,
            allow_file_upload: false,
        }
    }
}

impl AbstractSettings {
    pub fn max_words(&self) -> u32 {
        self.max_length.unwrap_or(DEFAULT_MAX_WORDS)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Reject submissions while abstracts are disabled or the window is shut
    pub fn ensure_accepting(&self, now: DateTime<Utc>) -> Result<()> {
        if !self.enabled {
            return Err(AppError::SubmissionClosed {
                message: "Abstract submission is not enabled for this event".to_string(),
            });
        }
        if !self.window.contains(now) {
            return Err(AppError::SubmissionClosed {
                message: "Abstract submission window is closed".to_string(),
            });
        }
        Ok(())
    }
}
