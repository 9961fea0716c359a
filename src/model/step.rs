use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// One `newDaysInStep` entry for a unit.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Step {
    pub id: i64,
    #[schema(example = "Detail")]
    pub step: Option<String>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub date_in: Option<NaiveDateTime>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub date_out: Option<NaiveDateTime>,
}

/// A step entered and left on the same day, with the unit it belongs to.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ActiveStep {
    pub step_id: i64,
    pub stock_number: String,
    pub step: Option<String>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub date_in: Option<NaiveDateTime>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub date_out: Option<NaiveDateTime>,
    pub year: Option<i32>,
    pub make: Option<String>,
    pub model: Option<String>,
}

/// Step history row joined with its status colour, as read for the calendar.
#[derive(Debug, Clone, FromRow)]
pub struct StepSpan {
    pub stock_number: String,
    pub step: Option<String>,
    pub date_in: Option<NaiveDateTime>,
    pub date_out: Option<NaiveDateTime>,
    pub step_color: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventProps {
    pub description: String,
}

/// Calendar feed entry. Field names follow what calendar widgets expect.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[schema(example = "A1234")]
    pub title: String,
    #[schema(example = "2026-03-02")]
    pub start: String,
    #[schema(example = "2026-03-05", nullable = true)]
    pub end: Option<String>,
    pub extended_props: EventProps,
    #[schema(example = "#3B82F6")]
    pub background_color: String,
    #[schema(example = "#3B82F6")]
    pub border_color: String,
    #[schema(example = "#FFFFFF")]
    pub text_color: String,
    pub all_day: bool,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct StepAverage {
    pub step: Option<String>,
    #[serde(skip)]
    pub avg_minutes: Option<f64>,
    pub step_count: i64,
    #[sqlx(skip)]
    #[schema(example = "1d 2h 5m")]
    pub avg_time_readable: String,
}
