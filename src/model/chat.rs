use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ChatMessage {
    pub message_id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub message_text: String,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub timestamp: Option<NaiveDateTime>,
    #[schema(example = "A1234", nullable = true)]
    pub stock_number: Option<String>,
    pub sender_username: String,
}

/// Message tagged with a unit, shown on the unit page.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct UnitChatMessage {
    pub message_id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub message_text: String,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub timestamp: Option<NaiveDateTime>,
    pub is_read: bool,
    pub sender_username: String,
    pub recipient_username: String,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Conversation {
    pub id: i64,
    pub username: String,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub last_message_time: Option<NaiveDateTime>,
    pub unread_count: i64,
}
