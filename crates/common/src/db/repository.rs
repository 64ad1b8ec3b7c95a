//! Postgres-backed `AbstractStore`
//!
//! Reviewer sets, reviews and settings live in JSONB columns; the status and
//! owner are plain text so they can be filtered in SQL.

use crate::abstracts::{
    Abstract, AbstractSettings, AbstractStatus, FileRef, Owner, RegistrantSummary, ReviewEntry,
    RevisionRequest,
};
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::store::AbstractStore;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter,
    QueryOrder, Set, Statement,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }
}

fn from_json<T: DeserializeOwned>(value: serde_json::Value, column: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| AppError::Internal {
        message: format!("Corrupt {} column: {}", column, e),
    })
}

fn optional_json<T: DeserializeOwned>(value: Option<serde_json::Value>, column: &str) -> Result<Option<T>> {
    value.map(|v| from_json(v, column)).transpose()
}

impl TryFrom<AbstractRow> for Abstract {
    type Error = AppError;

    fn try_from(row: AbstractRow) -> Result<Self> {
        let owner = match row.owner_kind.as_str() {
            "registration" => Owner::Registration(row.owner_id),
            "author" => Owner::Author(row.owner_id),
            other => {
                return Err(AppError::Internal {
                    message: format!("Unknown owner kind: {}", other),
                })
            }
        };

        Ok(Abstract {
            id: row.id,
            event_id: row.event_id,
            abstract_number: row.abstract_number.and_then(|n| u32::try_from(n).ok()),
            title: row.title,
            authors: row.authors,
            author_affiliations: row.author_affiliations,
            content: row.content,
            category: row.category,
            sub_topic: row.sub_topic,
            file: optional_json::<FileRef>(row.file, "file")?,
            owner,
            registrant: optional_json::<RegistrantSummary>(row.registrant, "registrant")?,
            status: row.status.parse::<AbstractStatus>()?,
            assigned_reviewers: from_json::<BTreeSet<String>>(row.assigned_reviewers, "assigned_reviewers")?,
            reviews: from_json::<Vec<ReviewEntry>>(row.reviews, "reviews")?,
            revision: optional_json::<RevisionRequest>(row.revision, "revision")?,
            decision_reason: row.decision_reason,
            registration_proof_url: row.registration_proof_url,
            registration_verified: row.registration_verified,
            final_file_url: row.final_file_url,
            created_at: row.created_at.with_timezone(&Utc),
            updated_at: row.updated_at.with_timezone(&Utc),
        })
    }
}

fn to_active_model(record: &Abstract) -> Result<AbstractActiveModel> {
    let owner_kind = match record.owner {
        Owner::Registration(_) => "registration",
        Owner::Author(_) => "author",
    };

    Ok(AbstractActiveModel {
        id: Set(record.id.clone()),
        event_id: Set(record.event_id.clone()),
        abstract_number: Set(record.abstract_number.and_then(|n| i32::try_from(n).ok())),
        title: Set(record.title.clone()),
        authors: Set(record.authors.clone()),
        author_affiliations: Set(record.author_affiliations.clone()),
        content: Set(record.content.clone()),
        category: Set(record.category.clone()),
        sub_topic: Set(record.sub_topic.clone()),
        file: Set(record.file.as_ref().map(serde_json::to_value).transpose()?),
        owner_kind: Set(owner_kind.to_string()),
        owner_id: Set(record.owner.id().to_string()),
        registrant: Set(record.registrant.as_ref().map(serde_json::to_value).transpose()?),
        status: Set(record.status.as_str().to_string()),
        assigned_reviewers: Set(serde_json::to_value(&record.assigned_reviewers)?),
        reviews: Set(serde_json::to_value(&record.reviews)?),
        revision: Set(record.revision.as_ref().map(serde_json::to_value).transpose()?),
        decision_reason: Set(record.decision_reason.clone()),
        registration_proof_url: Set(record.registration_proof_url.clone()),
        registration_verified: Set(record.registration_verified),
        final_file_url: Set(record.final_file_url.clone()),
        created_at: Set(record.created_at.fixed_offset()),
        updated_at: Set(record.updated_at.fixed_offset()),
    })
}

#[async_trait]
impl AbstractStore for Repository {
    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    async fn list_abstracts(&self, event_id: &str) -> Result<Vec<Abstract>> {
        AbstractEntity::find()
            .filter(AbstractColumn::EventId.eq(event_id))
            .order_by_asc(AbstractColumn::CreatedAt)
            .order_by_asc(AbstractColumn::Id)
            .all(self.read_conn())
            .await?
            .into_iter()
            .map(Abstract::try_from)
            .collect()
    }

    async fn find_abstract(&self, event_id: &str, id: &str) -> Result<Option<Abstract>> {
        AbstractEntity::find_by_id(id.to_string())
            .filter(AbstractColumn::EventId.eq(event_id))
            .one(self.read_conn())
            .await?
            .map(Abstract::try_from)
            .transpose()
    }

    async fn save_abstract(&self, record: &Abstract) -> Result<()> {
        let model = to_active_model(record)?;

        AbstractEntity::insert(model)
            .on_conflict(
                OnConflict::column(AbstractColumn::Id)
                    .update_columns([
                        AbstractColumn::AbstractNumber,
                        AbstractColumn::Title,
                        AbstractColumn::Authors,
                        AbstractColumn::AuthorAffiliations,
                        AbstractColumn::Content,
                        AbstractColumn::Category,
                        AbstractColumn::SubTopic,
                        AbstractColumn::File,
                        AbstractColumn::Registrant,
                        AbstractColumn::Status,
                        AbstractColumn::AssignedReviewers,
                        AbstractColumn::Reviews,
                        AbstractColumn::Revision,
                        AbstractColumn::DecisionReason,
                        AbstractColumn::RegistrationProofUrl,
                        AbstractColumn::RegistrationVerified,
                        AbstractColumn::FinalFileUrl,
                        AbstractColumn::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(self.write_conn())
            .await?;

        Ok(())
    }

    async fn delete_abstract(&self, event_id: &str, id: &str) -> Result<bool> {
        let result = AbstractEntity::delete_many()
            .filter(AbstractColumn::Id.eq(id))
            .filter(AbstractColumn::EventId.eq(event_id))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn next_abstract_number(&self, event_id: &str) -> Result<u32> {
        let defaults = serde_json::to_value(AbstractSettings::default())?;

        // Single statement so concurrent submissions never share a number
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO event_abstract_settings (event_id, settings, abstract_counter, updated_at)
            VALUES ($1, $2, 1, NOW())
            ON CONFLICT (event_id)
            DO UPDATE SET abstract_counter = event_abstract_settings.abstract_counter + 1
            RETURNING abstract_counter
            "#,
            vec![event_id.into(), defaults.into()],
        );

        let row = self
            .write_conn()
            .query_one(stmt)
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "Abstract counter update returned no row".to_string(),
            })?;
        let counter: i32 = row.try_get("", "abstract_counter")?;

        u32::try_from(counter).map_err(|_| AppError::Internal {
            message: format!("Invalid abstract counter: {}", counter),
        })
    }

    async fn find_settings(&self, event_id: &str) -> Result<Option<AbstractSettings>> {
        EventSettingsEntity::find_by_id(event_id.to_string())
            .one(self.read_conn())
            .await?
            .map(|row| from_json(row.settings, "settings"))
            .transpose()
    }

    async fn save_settings(&self, event_id: &str, settings: &AbstractSettings) -> Result<()> {
        let model = EventSettingsActiveModel {
            event_id: Set(event_id.to_string()),
            settings: Set(serde_json::to_value(settings)?),
            abstract_counter: Set(0),
            updated_at: Set(Utc::now().fixed_offset()),
        };

        EventSettingsEntity::insert(model)
            .on_conflict(
                OnConflict::column(EventSettingsColumn::EventId)
                    .update_columns([EventSettingsColumn::Settings, EventSettingsColumn::UpdatedAt])
                    .to_owned(),
            )
            .exec(self.write_conn())
            .await?;

        Ok(())
    }
}
