use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Note {
    pub id: i64,
    #[schema(example = "A1234")]
    pub stock_number: String,
    #[schema(example = "Customer asked for extra attention on the seats.")]
    pub notes: String,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub date_time: Option<NaiveDateTime>,
    /// 0 = new
    pub status: i32,
}
