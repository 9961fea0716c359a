use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, MySqlPool};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::RequestContext,
    error::AppError,
    model::{step::StepAverage, unit::LocationCount},
    utils::{display::readable_minutes, flash},
};

const DEFAULT_RANGE_DAYS: u64 = 30;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// `YYYY-MM-DD`; defaults to 30 days ago
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`; defaults to today
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct OverdueUnit {
    pub stock_number: String,
    pub vin: Option<String>,
    pub year: Option<i32>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub location: Option<String>,
    #[schema(value_type = String, format = "date")]
    pub promise_date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct ReportsResponse {
    pub user: RequestContext,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub warnings: Vec<String>,
    pub overdue_units: Vec<OverdueUnit>,
    pub units_by_location: Vec<LocationCount>,
    pub average_step_times: Vec<StepAverage>,
}

#[derive(Debug, PartialEq, Eq)]
struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
    warnings: Vec<String>,
}

fn resolve_range(today: NaiveDate, start: Option<&str>, end: Option<&str>) -> DateRange {
    let default_start = today - Days::new(DEFAULT_RANGE_DAYS);
    // a present but blank parameter is a format error, not a default
    let parse = |raw: Option<&str>, fallback: NaiveDate| match raw {
        None => Ok(fallback),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d"),
    };

    match (parse(start, default_start), parse(end, today)) {
        (Ok(start), Ok(end)) if end < start => DateRange {
            start,
            end: start,
            warnings: vec!["End date cannot be before start date.".to_string()],
        },
        (Ok(start), Ok(end)) => DateRange {
            start,
            end,
            warnings: Vec::new(),
        },
        _ => DateRange {
            start: default_start,
            end: today,
            warnings: vec!["Invalid date format provided. Using default range.".to_string()],
        },
    }
}

/// Overdue units, units per location and average step times
#[utoipa::path(
    get,
    path = "/reports",
    params(ReportQuery),
    responses((status = 200, description = "Report data", body = ReportsResponse)),
    tag = "Reports"
)]
pub async fn reports(
    req: HttpRequest,
    ctx: RequestContext,
    query: web::Query<ReportQuery>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let range = resolve_range(
        Local::now().date_naive(),
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    );
    let pool = pool.get_ref();

    let overdue_units = sqlx::query_as::<_, OverdueUnit>(
        r#"
        SELECT stockNumber AS stock_number, vin, year, make, model, location, promiseDate AS promise_date
        FROM test_db
        WHERE promiseDate IS NOT NULL
          AND promiseDate < CURDATE()
          AND (location IS NULL OR location NOT IN ('FrontLine', 'Sold', 'Delivered', 'Wholesale'))
        ORDER BY promiseDate ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let units_by_location = sqlx::query_as::<_, LocationCount>(
        "SELECT location, COUNT(*) AS count FROM test_db GROUP BY location ORDER BY location ASC",
    )
    .fetch_all(pool)
    .await?;

    // end date is inclusive
    let end_exclusive = range.end + Days::new(1);
    let average_step_times: Vec<StepAverage> = sqlx::query_as::<_, StepAverage>(
        r#"
        SELECT step,
               CAST(AVG(TIMESTAMPDIFF(MINUTE, dateIn, dateOut)) AS DOUBLE) AS avg_minutes,
               COUNT(*) AS step_count
        FROM newDaysInStep
        WHERE dateIn IS NOT NULL
          AND dateOut IS NOT NULL
          AND dateIn >= ?
          AND dateIn < ?
        GROUP BY step
        ORDER BY step
        "#,
    )
    .bind(range.start)
    .bind(end_exclusive)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|mut row| {
        row.avg_time_readable = row
            .avg_minutes
            .map(readable_minutes)
            .unwrap_or_else(|| "N/A".to_string());
        row
    })
    .collect();

    Ok(flash::page(
        &req,
        ReportsResponse {
            user: ctx,
            start_date: range.start,
            end_date: range.end,
            warnings: range.warnings,
            overdue_units,
            units_by_location,
            average_step_times,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn defaults_to_last_thirty_days() {
        let range = resolve_range(day(2026, 10, 16), None, None);
        assert_eq!(range.start, day(2026, 9, 16));
        assert_eq!(range.end, day(2026, 10, 16));
        assert!(range.warnings.is_empty());
    }

    #[test]
    fn explicit_range_is_kept() {
        let range = resolve_range(day(2026, 10, 16), Some("2026-01-01"), Some("2026-01-31"));
        assert_eq!((range.start, range.end), (day(2026, 1, 1), day(2026, 1, 31)));
    }

    #[test]
    fn invalid_date_resets_to_default() {
        let range = resolve_range(day(2026, 10, 16), Some("2026-01-01"), Some("January"));
        assert_eq!((range.start, range.end), (day(2026, 9, 16), day(2026, 10, 16)));
        assert_eq!(range.warnings, vec!["Invalid date format provided. Using default range."]);
    }

    #[test]
    fn end_before_start_is_clamped() {
        let range = resolve_range(day(2026, 10, 16), Some("2026-05-10"), Some("2026-05-01"));
        assert_eq!((range.start, range.end), (day(2026, 5, 10), day(2026, 5, 10)));
        assert_eq!(range.warnings, vec!["End date cannot be before start date."]);
    }

    #[test]
    fn blank_date_is_reported_as_invalid() {
        let range = resolve_range(day(2026, 10, 16), Some(""), None);
        assert_eq!((range.start, range.end), (day(2026, 9, 16), day(2026, 10, 16)));
        assert_eq!(range.warnings, vec!["Invalid date format provided. Using default range."]);
    }
}
