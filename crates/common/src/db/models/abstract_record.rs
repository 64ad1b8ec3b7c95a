//! Abstract entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "abstracts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    #[sea_orm(column_type = "Text", indexed)]
    pub event_id: String,

    pub abstract_number: Option<i32>,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub authors: String,

    #[sea_orm(column_type = "Text")]
    pub author_affiliations: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub category: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub sub_topic: Option<String>,

    /// `{url, name, size?}`
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub file: Option<Json>,

    /// `registration` or `author`
    #[sea_orm(column_type = "Text")]
    pub owner_kind: String,

    #[sea_orm(column_type = "Text")]
    pub owner_id: String,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub registrant: Option<Json>,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    /// Array of reviewer ids
    #[sea_orm(column_type = "JsonBinary")]
    pub assigned_reviewers: Json,

    /// Array of review entries, one per reviewer
    #[sea_orm(column_type = "JsonBinary")]
    pub reviews: Json,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub revision: Option<Json>,

    #[sea_orm(column_type = "Text", nullable)]
    pub decision_reason: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub registration_proof_url: Option<String>,

    pub registration_verified: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub final_file_url: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
