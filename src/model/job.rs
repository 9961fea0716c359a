use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// A job on a unit that is not yet completed.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct OpenJob {
    pub job_id: i64,
    pub status: Option<String>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub date_added: Option<NaiveDateTime>,
    #[schema(example = "Full Detail $249.99")]
    pub job1: Option<String>,
    pub priority: Option<String>,
    pub job_notes: Option<String>,
    pub assigned_tech_id: Option<i64>,
    pub assigned_tech_name: Option<String>,
    /// `job1` cut before any pricing text.
    #[sqlx(skip)]
    #[schema(example = "Full Detail")]
    pub job_description_display: String,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CompletedJob {
    pub stock_number: String,
    pub job1: Option<String>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub date_added: Option<NaiveDateTime>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Tech {
    #[schema(example = 4)]
    pub tech_number: i64,
    #[schema(example = "Jamie")]
    pub tech_name: String,
}
