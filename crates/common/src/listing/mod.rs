//! In-memory filtering and pagination of abstract lists
//!
//! The full event list is fetched once and narrowed here. A [`FilterSet`]
//! is an AND of predicates; with no predicates it returns its input
//! unchanged. [`paginate`] then cuts a 1-indexed page window.

use crate::abstracts::{Abstract, AbstractStatus, Category};
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Page sizes offered by the list views
pub const PAGE_SIZES: [usize; 4] = [10, 20, 50, 100];

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Status dropdown value; `all` means no constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StatusFilter {
    #[default]
    All,
    Only(AbstractStatus),
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Only(status) => write!(f, "{}", status),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "all" => Ok(StatusFilter::All),
            other => other.parse().map(StatusFilter::Only),
        }
    }
}

impl TryFrom<String> for StatusFilter {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<StatusFilter> for String {
    fn from(value: StatusFilter) -> Self {
        value.to_string()
    }
}

/// Query accepted by both list endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ListQuery {
    /// The "fetch everything for this event" query the list views use
    pub fn fetch_all(limit: usize) -> Self {
        Self {
            page: Some(1),
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn filters(&self) -> FilterSet {
        let mut filters = FilterSet::new();
        if let Some(search) = &self.search {
            filters = filters.search(search);
        }
        if let Some(category) = &self.category {
            filters = filters.category(category);
        }
        if let Some(status) = self.status {
            filters = filters.status(status);
        }
        if self.final_only == Some(true) {
            filters = filters.final_only();
        }
        filters
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    /// Lowercased needle
    Search(String),
    Category(String),
    Status(AbstractStatus),
    FinalOnly,
}

/// Conjunction of list predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    predicates: Vec<Predicate>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive substring search; blank text adds nothing
    pub fn search(mut self, text: &str) -> Self {
        let needle = text.trim().to_lowercase();
        if !needle.is_empty() {
            self.predicates.push(Predicate::Search(needle));
        }
        self
    }

    /// Empty or `all` adds nothing
    pub fn category(mut self, category_id: &str) -> Self {
        let id = category_id.trim();
        if !id.is_empty() && id != "all" {
            self.predicates.push(Predicate::Category(id.to_string()));
        }
        self
    }

    pub fn status(mut self, status: StatusFilter) -> Self {
        if let StatusFilter::Only(status) = status {
            self.predicates.push(Predicate::Status(status));
        }
        self
    }

    pub fn final_only(mut self) -> Self {
        self.predicates.push(Predicate::FinalOnly);
        self
    }

    pub fn is_unconstrained(&self) -> bool {
        self.predicates.is_empty()
    }

    /// `categories` resolves category and sub-topic names for search
    pub fn matches(&self, record: &Abstract, categories: &[Category]) -> bool {
        self.predicates.iter().all(|predicate| match predicate {
            Predicate::Search(needle) => search_matches(record, categories, needle),
            Predicate::Category(id) => record.category.as_deref() == Some(id.as_str()),
            Predicate::Status(status) => record.status == *status,
            Predicate::FinalOnly => record.has_final_file(),
        })
    }

    pub fn apply<'a>(&self, records: &'a [Abstract], categories: &[Category]) -> Vec<&'a Abstract> {
        records
            .iter()
            .filter(|record| self.matches(record, categories))
            .collect()
    }
}

fn search_matches(record: &Abstract, categories: &[Category], needle: &str) -> bool {
    let category = record
        .category
        .as_deref()
        .and_then(|id| categories.iter().find(|c| c.id == id));
    let sub_topic = category.zip(record.sub_topic.as_deref()).and_then(|(c, id)| c.sub_topic(id));
    let number = record.abstract_number.map(|n| n.to_string());

    let mut fields = vec![
        record.title.as_str(),
        record.authors.as_str(),
        record.author_affiliations.as_str(),
    ];
    fields.extend(category.map(|c| c.name.as_str()));
    fields.extend(sub_topic.map(|t| t.name.as_str()));
    fields.extend(number.as_deref());
    if let Some(registrant) = &record.registrant {
        fields.push(registrant.name.as_str());
        fields.push(registrant.email.as_str());
        fields.push(registrant.registration_id.as_str());
    }

    fields
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Validated list page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(usize);

impl PageSize {
    pub fn new(size: usize) -> Result<Self> {
        if PAGE_SIZES.contains(&size) {
            Ok(Self(size))
        } else {
            Err(AppError::Validation {
                message: format!("Page size must be one of {:?}", PAGE_SIZES),
                field: Some("limit".to_string()),
            })
        }
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(DEFAULT_PAGE_SIZE)
    }
}

/// One page of a filtered list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// `max(1, ceil(total / size))`
pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    total_items.div_ceil(page_size.max(1)).max(1)
}

/// Cut page `page` (1-indexed) out of `items`. A page outside
/// `1..=total_pages` falls back to page 1.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_pages(total_items, page_size);
    let page = if (1..=total_pages).contains(&page) { page } else { 1 };

    let items = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Page {
        items,
        page,
        page_size,
        total_items,
        total_pages,
    }
}
