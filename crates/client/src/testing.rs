//! Shared test fixtures

use atlas_common::abstracts::{Abstract, AbstractStatus, Owner};
use chrono::{TimeZone, Utc};
use std::collections::BTreeSet;

pub fn abstract_with(id: &str, status: AbstractStatus) -> Abstract {
    let created = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    Abstract {
        id: id.to_string(),
        event_id: "evt-1".to_string(),
        abstract_number: None,
        title: format!("Abstract {}", id),
        authors: "A. Author, B. Author".to_string(),
        author_affiliations: "University of Somewhere".to_string(),
        content: "Background and methods of a fairly ordinary study.".to_string(),
        category: Some("cat-cardio".to_string()),
        sub_topic: None,
        file: None,
        owner: Owner::Registration("reg-1".to_string()),
        registrant: None,
        status,
        assigned_reviewers: BTreeSet::new(),
        reviews: Vec::new(),
        revision: None,
        decision_reason: None,
        registration_proof_url: None,
        registration_verified: false,
        final_file_url: None,
        created_at: created,
        updated_at: created,
    }
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
