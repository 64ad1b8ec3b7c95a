//! Submission validation shared by the portal client and the gateway
//!
//! Both sides run the same rules with the same messages so a payload the
//! client accepts is never silently dropped by the server.

use super::event::AbstractSettings;
use super::model::FileRef;
use crate::errors::FieldErrors;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

/// Content stored when the abstract body lives in the attached file
pub const FILE_PLACEHOLDER_CONTENT: &str = "Abstract content provided in the attached file.";

/// Fields a registrant or author edits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AbstractInput {
    #[validate(custom(function = "validate_title"))]
    pub title: String,

    #[validate(custom(function = "validate_authors"))]
    pub authors: String,

    #[serde(default)]
    pub author_affiliations: String,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub sub_topic: Option<String>,

    #[serde(default)]
    pub file: Option<FileRef>,
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    match title.trim().chars().count() {
        0 => Err(rule("required", "Title is required")),
        1..=2 => Err(rule("length", "Title must be at least 3 characters")),
        201.. => Err(rule("length", "Title must not exceed 200 characters")),
        _ => Ok(()),
    }
}

fn validate_authors(authors: &str) -> Result<(), ValidationError> {
    match authors.trim().chars().count() {
        0 => Err(rule("required", "Authors are required")),
        1 => Err(rule("length", "Authors must be at least 2 characters")),
        _ => Ok(()),
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Check `input` against the event's settings and return the normalized
/// payload to store. Every failing field is reported, not just the first.
pub fn prepare_submission(
    mut input: AbstractInput,
    settings: &AbstractSettings,
) -> Result<AbstractInput, FieldErrors> {
    let mut errors = match input.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => FieldErrors::from(e),
    };

    match non_blank(&input.category) {
        None => errors.add("category", "Category is required"),
        Some(category_id) => match settings.category(category_id) {
            None => errors.add("category", "Selected category is not offered for this event"),
            Some(category) => match non_blank(&input.sub_topic) {
                None if category.requires_sub_topic() => {
                    errors.add("sub_topic", "Sub-topic is required for the selected category")
                }
                Some(topic) if category.sub_topic(topic).is_none() => {
                    errors.add("sub_topic", "Sub-topic does not belong to the selected category")
                }
                _ => {}
            },
        },
    }

    let file_in_lieu = settings.allow_file_upload && input.file.is_some();
    let content_len = input.content.trim().chars().count();
    if content_len == 0 {
        if file_in_lieu {
            input.content = FILE_PLACEHOLDER_CONTENT.to_string();
        } else {
            errors.add("content", "Abstract content is required");
        }
    } else if content_len < 10 && !file_in_lieu {
        errors.add("content", "Abstract content must be at least 10 characters");
    }

    let max_words = settings.max_words() as usize;
    let words = word_count(&input.content);
    if words > max_words {
        errors.add(
            "content",
            format!("Abstract exceeds the maximum of {max_words} words ({words} words)"),
        );
    }

    if input.file.is_some() && !settings.allow_file_upload {
        errors.add("file", "File upload is not enabled for this event");
    }

    errors.into_result().map(|()| input)
}
