//! Export filters, artifact naming and the CSV rendering used by the
//! download endpoint

use crate::abstracts::{Abstract, AbstractStatus, Category};
use crate::errors::{AppError, Result};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportMode {
    /// One sheet with every selected abstract
    #[default]
    ExcelSingle,
    /// One sheet per category
    ExcelMulti,
    /// Archive of the uploaded files
    FilesOnly,
}

impl ExportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportMode::ExcelSingle => "excel-single",
            ExportMode::ExcelMulti => "excel-multi",
            ExportMode::FilesOnly => "files-only",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportMode::ExcelSingle | ExportMode::ExcelMulti => "xlsx",
            ExportMode::FilesOnly => "zip",
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Download query. Every field is optional; unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_mode: Option<ExportMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Sub-topic id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Only abstracts assigned to this reviewer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AbstractStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_only: Option<bool>,
}

impl ExportFilters {
    pub fn mode(&self) -> ExportMode {
        self.export_mode.unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_score, self.max_score) {
            if min > max {
                return Err(AppError::Validation {
                    message: "Minimum score must not exceed maximum score".to_string(),
                    field: Some("minScore".to_string()),
                });
            }
        }
        Ok(())
    }

    /// Score bounds are inclusive and compare against the mean review
    /// score. An abstract without reviews fails any score bound.
    pub fn matches(&self, record: &Abstract) -> bool {
        if let Some(category) = &self.category {
            if record.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(topic) = &self.topic {
            if record.sub_topic.as_deref() != Some(topic.as_str()) {
                return false;
            }
        }
        if let Some(reviewer) = &self.reviewer {
            if !record.is_assigned(reviewer) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if self.min_score.is_some() || self.max_score.is_some() {
            let Some(score) = record.average_score() else {
                return false;
            };
            if self.min_score.is_some_and(|min| score < min)
                || self.max_score.is_some_and(|max| score > max)
            {
                return false;
            }
        }
        if self.final_only == Some(true) && !record.has_final_file() {
            return false;
        }
        true
    }
}

/// `abstracts_{eventId}_{mode}.xlsx` or `.zip`
pub fn fallback_filename(event_id: &str, mode: ExportMode) -> String {
    format!("abstracts_{}_{}.{}", event_id, mode, mode.extension())
}

fn disposition_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)filename\*?\s*=\s*(?:UTF-8'')?"?([^";]+)"?"#)
            .expect("content-disposition pattern is valid")
    })
}

/// Pull the filename out of a `Content-Disposition` header value
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    disposition_pattern()
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

/// `Content-Disposition` value for a generated artifact
pub fn attachment_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", filename.replace('"', ""))
}

const CSV_HEADER: [&str; 12] = [
    "Abstract Number",
    "Title",
    "Authors",
    "Affiliations",
    "Category",
    "Sub-topic",
    "Status",
    "Reviewers",
    "Reviews",
    "Average Score",
    "Registration Verified",
    "Final File",
];

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Spreadsheet rows for the selected abstracts. `excel-multi` groups rows
/// by category; `files-only` has no tabular form.
pub fn render_csv(records: &[&Abstract], categories: &[Category], mode: ExportMode) -> Result<String> {
    if mode == ExportMode::FilesOnly {
        return Err(AppError::Unsupported {
            message: "File archive export is not available; choose a spreadsheet export"
                .to_string(),
        });
    }

    let category_name = |record: &Abstract| -> String {
        record
            .category
            .as_deref()
            .map(|id| {
                categories
                    .iter()
                    .find(|c| c.id == id)
                    .map_or_else(|| id.to_string(), |c| c.name.clone())
            })
            .unwrap_or_default()
    };

    let mut rows: Vec<&Abstract> = records.to_vec();
    if mode == ExportMode::ExcelMulti {
        rows.sort_by_key(|record| category_name(*record));
    }

    let mut out = CSV_HEADER.join(",");
    out.push('\n');

    for record in rows {
        let sub_topic = record
            .category
            .as_deref()
            .and_then(|id| categories.iter().find(|c| c.id == id))
            .zip(record.sub_topic.as_deref())
            .and_then(|(c, topic)| c.sub_topic(topic))
            .map(|t| t.name.clone())
            .unwrap_or_default();

        let line = [
            record.abstract_number.map(|n| n.to_string()).unwrap_or_default(),
            record.title.clone(),
            record.authors.clone(),
            record.author_affiliations.clone(),
            category_name(record),
            sub_topic,
            record.status.to_string(),
            record.assigned_reviewers.iter().cloned().collect::<Vec<_>>().join("; "),
            record.reviews.len().to_string(),
            record
                .average_score()
                .map(|s| format!("{:.2}", s))
                .unwrap_or_default(),
            if record.registration_verified { "yes" } else { "no" }.to_string(),
            record.final_file_url.clone().unwrap_or_default(),
        ];

        let fields: Vec<String> = line.iter().map(|f| csv_field(f)).collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstracts::model::fixtures::{at, sample};
    use crate::abstracts::{ReviewDecision, ReviewEntry};

    fn reviewed(id: &str, scores: &[u8]) -> Abstract {
        let mut record = sample(id, AbstractStatus::UnderReview);
        for (i, score) in scores.iter().enumerate() {
            let reviewer = format!("rev-{}", i + 1);
            record.assigned_reviewers.insert(reviewer.clone());
            record.reviews.push(ReviewEntry {
                reviewer,
                decision: ReviewDecision::Accept,
                score: *score,
                comments: String::new(),
                reviewed_at: at(2),
            });
        }
        record
    }

    #[test]
    fn fallback_names_follow_mode() {
        assert_eq!(
            fallback_filename("evt-9", ExportMode::ExcelSingle),
            "abstracts_evt-9_excel-single.xlsx"
        );
        assert_eq!(
            fallback_filename("evt-9", ExportMode::FilesOnly),
            "abstracts_evt-9_files-only.zip"
        );
    }

    #[test]
    fn content_disposition_parsing() {
        assert_eq!(
            filename_from_content_disposition("attachment; filename=\"report.xlsx\"").as_deref(),
            Some("report.xlsx")
        );
        assert_eq!(
            filename_from_content_disposition("attachment; filename*=UTF-8''abstracts.zip")
                .as_deref(),
            Some("abstracts.zip")
        );
        assert_eq!(filename_from_content_disposition("attachment"), None);
    }

    #[test]
    fn unset_filters_are_not_serialized() {
        let filters = ExportFilters {
            export_mode: Some(ExportMode::ExcelMulti),
            min_score: Some(6.0),
            ..ExportFilters::default()
        };
        let json = serde_json::to_value(&filters).unwrap();
        assert_eq!(json, serde_json::json!({"exportMode": "excel-multi", "minScore": 6.0}));
    }

    #[test]
    fn score_bounds_are_inclusive_on_mean() {
        let filters = ExportFilters {
            min_score: Some(7.0),
            max_score: Some(8.0),
            ..ExportFilters::default()
        };
        assert!(filters.matches(&reviewed("a1", &[6, 8])));
        assert!(filters.matches(&reviewed("a2", &[8, 8])));
        assert!(!filters.matches(&reviewed("a3", &[9, 9])));
        assert!(!filters.matches(&reviewed("a4", &[])));
        assert!(ExportFilters::default().matches(&reviewed("a4", &[])));
    }

    #[test]
    fn reviewer_and_final_filters() {
        let mut record = reviewed("a1", &[7]);
        let by_reviewer = ExportFilters {
            reviewer: Some("rev-1".into()),
            ..ExportFilters::default()
        };
        assert!(by_reviewer.matches(&record));

        let finals = ExportFilters {
            final_only: Some(true),
            ..ExportFilters::default()
        };
        assert!(!finals.matches(&record));
        record.final_file_url = Some("https://files/final.pdf".into());
        assert!(finals.matches(&record));
    }

    #[test]
    fn inverted_score_range_is_invalid() {
        let filters = ExportFilters {
            min_score: Some(9.0),
            max_score: Some(2.0),
            ..ExportFilters::default()
        };
        assert!(filters.validate().is_err());
    }

    #[test]
    fn csv_rows_escape_fields() {
        let mut record = reviewed("a1", &[6, 9]);
        record.title = "Heart, lungs and \"more\"".into();
        let csv = render_csv(&[&record], &[], ExportMode::ExcelSingle).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("Abstract Number,Title"));
        let row = lines.next().unwrap();
        assert!(row.contains("\"Heart, lungs and \"\"more\"\"\""));
        assert!(row.contains("7.50"));
        assert!(row.contains("rev-1; rev-2"));
    }

    #[test]
    fn files_only_is_unsupported() {
        let err = render_csv(&[], &[], ExportMode::FilesOnly).unwrap_err();
        assert!(matches!(err, AppError::Unsupported { .. }));
    }
}
