use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{debug, error};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::RequestContext,
    error::AppError,
    model::{
        job::CompletedJob,
        pricing::ServicePrice,
        step::{ActiveStep, CalendarEvent, EventProps, StepSpan},
        unit::{Unit, UnitListRow},
    },
    utils::{
        display::{normalize_color, text_color_for_bg},
        flash,
    },
};

pub const PER_PAGE: i64 = 20;
pub const READY_FOR_PICKUP: &str = "Ready for Pickup";
const HIDDEN_LOCATIONS: [&str; 4] = ["FrontLine", "sold", "Deleted", "Delivered"];
const DEFAULT_EVENT_COLOR: &str = "#3B82F6";

/// Columns of `test_db` aliased to the [`Unit`] field names.
pub const UNIT_COLUMNS: &str = "id, stockNumber AS stock_number, vin, year, make, model, location, \
     dateIn AS date_in, promiseDate AS promise_date, access2";

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DashboardQuery {
    /// Page number, starting at 1
    pub page: Option<String>,
    /// Matches stock number, VIN, year, make, model or location
    pub search: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardCounts {
    /// Distinct units with completed jobs
    pub units_in_detail: i64,
    pub ready_pickup_count: i64,
    pub notes_today_count: i64,
}

#[derive(Debug, Serialize, PartialEq, Eq, ToSchema)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64, total_items: i64) -> Self {
        Self {
            page,
            per_page,
            total_items,
            total_pages: (total_items + per_page - 1) / per_page,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    pub user: RequestContext,
    pub counts: DashboardCounts,
    pub units: Vec<UnitListRow>,
    pub pagination: Pagination,
    pub search_term: String,
    /// Price list offered by the purchase-order dialog
    pub services: Vec<ServicePrice>,
}

/// Page numbers that do not parse fall back to 1.
fn page_number(raw: Option<&str>) -> i64 {
    raw.and_then(|p| p.trim().parse::<i64>().ok())
        .unwrap_or(1)
        .max(1)
}

/// WHERE clause for the unit list. Binds the hidden locations, then the
/// search pattern six times when searching.
fn unit_filter(searching: bool) -> String {
    let hidden = vec!["?"; HIDDEN_LOCATIONS.len()].join(", ");
    let mut sql = format!("WHERE t.location NOT IN ({hidden})");
    if searching {
        sql.push_str(
            " AND (t.stockNumber LIKE ? OR t.vin LIKE ? OR CAST(t.year AS CHAR) LIKE ? \
             OR t.make LIKE ? OR t.model LIKE ? OR t.location LIKE ?)",
        );
    }
    sql
}

fn with_colors(mut row: UnitListRow) -> UnitListRow {
    let stored = row.location_color.take();
    row.text_color = text_color_for_bg(stored.as_deref()).to_string();
    row.location_color = normalize_color(stored.as_deref());
    row
}

async fn count(pool: &MySqlPool, sql: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await
}

/// Dashboard summary
#[utoipa::path(
    get,
    path = "/",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Counts, current units and price list", body = DashboardResponse),
        (status = 302, description = "No session, redirected to login")
    ),
    tag = "Dashboard"
)]
pub async fn dashboard(
    req: HttpRequest,
    ctx: RequestContext,
    pool: web::Data<MySqlPool>,
    query: web::Query<DashboardQuery>,
) -> Result<HttpResponse, AppError> {
    let pool = pool.get_ref();
    let page = page_number(query.page.as_deref());
    let search_term = query.search.as_deref().unwrap_or("").trim().to_string();
    let today = Local::now().date_naive();

    let units_in_detail = count(pool, "SELECT COUNT(DISTINCT stockNumber) FROM jobs WHERE complete = 1").await?;
    let ready_pickup_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM test_db WHERE location = ?")
        .bind(READY_FOR_PICKUP)
        .fetch_one(pool)
        .await?;
    let notes_today_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notes WHERE DATE(dateTime) = ?")
        .bind(today)
        .fetch_one(pool)
        .await?;

    let services = ServicePrice::list(pool).await?;

    let searching = !search_term.is_empty();
    let filter = unit_filter(searching);
    let pattern = format!("%{search_term}%");

    let count_sql = format!(
        "WITH RankedUnits AS (
            SELECT t.stockNumber,
                   ROW_NUMBER() OVER (PARTITION BY t.stockNumber ORDER BY t.id DESC) AS rn
            FROM test_db t
            {filter}
        )
        SELECT COUNT(*) FROM RankedUnits WHERE rn = 1"
    );
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for location in HIDDEN_LOCATIONS {
        count_query = count_query.bind(location);
    }
    if searching {
        for _ in 0..6 {
            count_query = count_query.bind(&pattern);
        }
    }
    let total_items = count_query.fetch_one(pool).await?;
    let pagination = Pagination::new(page, PER_PAGE, total_items);

    let data_sql = format!(
        "WITH RankedUnits AS (
            SELECT t.id, t.stockNumber, t.vin, t.year, t.make, t.model, t.location, t.dateIn,
                   rs.color AS location_color,
                   ROW_NUMBER() OVER (PARTITION BY t.stockNumber ORDER BY t.id DESC) AS rn
            FROM test_db t
            LEFT JOIN reconStatus rs ON t.location = rs.status
            {filter}
        )
        SELECT id, stockNumber AS stock_number, vin, year, make, model, location,
               dateIn AS date_in, location_color
        FROM RankedUnits
        WHERE rn = 1
        ORDER BY dateIn DESC
        LIMIT ? OFFSET ?"
    );
    let mut data_query = sqlx::query_as::<_, UnitListRow>(&data_sql);
    for location in HIDDEN_LOCATIONS {
        data_query = data_query.bind(location);
    }
    if searching {
        for _ in 0..6 {
            data_query = data_query.bind(&pattern);
        }
    }
    let units: Vec<UnitListRow> = data_query
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(with_colors)
        .collect();

    debug!(page, total_items, search = %search_term, "Dashboard loaded");

    Ok(flash::page(
        &req,
        DashboardResponse {
            user: ctx,
            counts: DashboardCounts {
                units_in_detail,
                ready_pickup_count,
                notes_today_count,
            },
            units,
            pagination,
            search_term,
            services,
        },
    ))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsQuery {
    /// ISO date; any time part after `T` is ignored
    pub start: Option<String>,
    pub end: Option<String>,
}

fn parse_iso_date(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let date = raw.split('T').next().unwrap_or_default();
    if date.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| AppError::bad_request("Invalid date format"))
}

/// Bad formats are reported before missing values.
fn event_window(query: &EventsQuery) -> Result<(NaiveDate, NaiveDate), AppError> {
    let start = parse_iso_date(query.start.as_deref())?;
    let end = parse_iso_date(query.end.as_deref())?;
    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(AppError::bad_request("Missing start or end date parameters")),
    }
}

fn to_event(span: StepSpan) -> Option<CalendarEvent> {
    let start = span.date_in?.format("%Y-%m-%d").to_string();
    let color = normalize_color(span.step_color.as_deref()).unwrap_or_else(|| DEFAULT_EVENT_COLOR.to_string());
    Some(CalendarEvent {
        title: span.stock_number,
        start,
        end: span.date_out.map(|d| d.format("%Y-%m-%d").to_string()),
        extended_props: EventProps {
            description: span.step.unwrap_or_default(),
        },
        text_color: text_color_for_bg(Some(&color)).to_string(),
        border_color: color.clone(),
        background_color: color,
        all_day: true,
    })
}

/// Calendar events from step history
#[utoipa::path(
    get,
    path = "/api/overview/events",
    params(EventsQuery),
    responses(
        (status = 200, description = "Steps overlapping the window", body = [CalendarEvent]),
        (status = 400, description = "Missing or malformed dates", body = Object, example = json!({
            "error": "Missing start or end date parameters"
        }))
    ),
    tag = "Dashboard"
)]
pub async fn overview_events(
    pool: web::Data<MySqlPool>,
    query: web::Query<EventsQuery>,
) -> Result<HttpResponse, AppError> {
    let (start, end) = event_window(&query)?;

    let spans = sqlx::query_as::<_, StepSpan>(
        r#"
        SELECT nds.stockNumber AS stock_number, nds.step, nds.dateIn AS date_in,
               nds.dateOut AS date_out, ns.color AS step_color
        FROM newDaysInStep nds
        LEFT JOIN newStatus ns ON nds.step = ns.status
        WHERE nds.dateIn IS NOT NULL
          AND nds.dateIn < ?
          AND (nds.dateOut IS NULL OR nds.dateOut > ?)
        ORDER BY nds.dateIn
        "#,
    )
    .bind(end)
    .bind(start)
    .fetch_all(pool.get_ref())
    .await;

    let events: Vec<CalendarEvent> = match spans {
        Ok(spans) => spans.into_iter().filter_map(to_event).collect(),
        Err(e) => {
            error!(error = %e, "Failed to load calendar events");
            Vec::new()
        }
    };

    Ok(HttpResponse::Ok().json(events))
}

#[derive(Serialize, ToSchema)]
pub struct ActiveStepsResponse {
    pub steps: Vec<ActiveStep>,
}

/// Same-day steps this year
#[utoipa::path(
    get,
    path = "/view_active",
    responses((status = 200, description = "Newest first, at most 100", body = ActiveStepsResponse)),
    tag = "Dashboard"
)]
pub async fn view_active(req: HttpRequest, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let steps = sqlx::query_as::<_, ActiveStep>(
        r#"
        SELECT nds.id AS step_id, nds.stockNumber AS stock_number, nds.step,
               nds.dateIn AS date_in, nds.dateOut AS date_out, t.year, t.make, t.model
        FROM newDaysInStep nds
        LEFT JOIN test_db t ON nds.stockNumber = t.stockNumber
        WHERE nds.dateIn IS NOT NULL
          AND nds.dateOut IS NOT NULL
          AND DATE(nds.dateIn) = DATE(nds.dateOut)
          AND YEAR(nds.dateIn) = ?
        ORDER BY nds.dateIn DESC
        LIMIT 100
        "#,
    )
    .bind(Local::now().year())
    .fetch_all(pool.get_ref())
    .await?;

    Ok(flash::page(&req, ActiveStepsResponse { steps }))
}

#[derive(Serialize, ToSchema)]
pub struct UnitsResponse {
    pub units: Vec<Unit>,
}

/// Units waiting for pickup
#[utoipa::path(
    get,
    path = "/ready_pickup",
    responses((status = 200, description = "Units at Ready for Pickup", body = UnitsResponse)),
    tag = "Dashboard"
)]
pub async fn ready_pickup(req: HttpRequest, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let sql = format!("SELECT {UNIT_COLUMNS} FROM test_db WHERE location = ? ORDER BY dateIn DESC");
    let units = sqlx::query_as::<_, Unit>(&sql)
        .bind(READY_FOR_PICKUP)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(flash::page(&req, UnitsResponse { units }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompletedGroup {
    pub stock_number: String,
    pub jobs: Vec<CompletedJob>,
}

#[derive(Serialize, ToSchema)]
pub struct CompletedJobsResponse {
    pub units: Vec<CompletedGroup>,
}

/// Groups rows already ordered by stock number.
fn group_by_unit(jobs: Vec<CompletedJob>) -> Vec<CompletedGroup> {
    let mut groups: Vec<CompletedGroup> = Vec::new();
    for job in jobs {
        match groups.last_mut() {
            Some(group) if group.stock_number == job.stock_number => group.jobs.push(job),
            _ => groups.push(CompletedGroup {
                stock_number: job.stock_number.clone(),
                jobs: vec![job],
            }),
        }
    }
    groups
}

/// Completed jobs grouped by unit
#[utoipa::path(
    get,
    path = "/completed_jobs",
    responses((status = 200, description = "Completed jobs per stock number", body = CompletedJobsResponse)),
    tag = "Dashboard"
)]
pub async fn completed_jobs(req: HttpRequest, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let jobs = sqlx::query_as::<_, CompletedJob>(
        r#"
        SELECT stockNumber AS stock_number, job1, dateAdded AS date_added, status
        FROM jobs
        WHERE complete = 1
        ORDER BY stockNumber, dateAdded DESC
        "#,
    )
    .fetch_all(pool.get_ref())
    .await?;

    Ok(flash::page(
        &req,
        CompletedJobsResponse {
            units: group_by_unit(jobs),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn page_numbers_fall_back_to_one() {
        assert_eq!(page_number(None), 1);
        assert_eq!(page_number(Some("3")), 3);
        assert_eq!(page_number(Some("0")), 1);
        assert_eq!(page_number(Some("-4")), 1);
        assert_eq!(page_number(Some("abc")), 1);
    }

    #[test]
    fn pagination_math() {
        let p = Pagination::new(3, 20, 41);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset(), 40);
        assert_eq!(Pagination::new(1, 20, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 20, 20).total_pages, 1);
    }

    #[test]
    fn filter_placeholders_match_binds() {
        assert_eq!(unit_filter(false).matches('?').count(), 4);
        assert_eq!(unit_filter(true).matches('?').count(), 10);
        assert!(unit_filter(true).contains("CAST(t.year AS CHAR) LIKE ?"));
    }

    #[test]
    fn list_rows_get_usable_colors() {
        let row = |color: Option<&str>| UnitListRow {
            id: 1,
            stock_number: "A1".into(),
            vin: None,
            year: Some(2020),
            make: None,
            model: None,
            location: Some("Detail".into()),
            date_in: None,
            location_color: color.map(str::to_string),
            text_color: String::new(),
        };

        let bare = with_colors(row(Some("FFFF00")));
        assert_eq!(bare.location_color.as_deref(), Some("#FFFF00"));
        assert_eq!(bare.text_color, "#000000");

        let junk = with_colors(row(Some("yellow")));
        assert_eq!(junk.location_color, None);
        assert_eq!(junk.text_color, "#FFFFFF");
    }

    #[test]
    fn event_window_validation() {
        let q = |start: Option<&str>, end: Option<&str>| EventsQuery {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
        };

        let (start, end) = event_window(&q(Some("2026-03-01T00:00:00-05:00"), Some("2026-04-12"))).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 4, 12).unwrap());

        let err = event_window(&q(Some("2026-03-01"), None)).unwrap_err();
        assert_eq!(err.to_string(), "Missing start or end date parameters");

        let err = event_window(&q(Some("03/01/2026"), None)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid date format");
    }

    #[test]
    fn spans_become_events() {
        let event = to_event(StepSpan {
            stock_number: "A1".into(),
            step: Some("Detail".into()),
            date_in: Some(at("2026-03-02 09:15")),
            date_out: None,
            step_color: Some("ffffff".into()),
        })
        .unwrap();
        assert_eq!(event.start, "2026-03-02");
        assert_eq!(event.end, None);
        assert_eq!(event.background_color, "#ffffff");
        assert_eq!(event.text_color, "#000000");
        assert_eq!(event.extended_props.description, "Detail");

        let fallback = to_event(StepSpan {
            stock_number: "A2".into(),
            step: None,
            date_in: Some(at("2026-03-02 09:15")),
            date_out: Some(at("2026-03-04 17:00")),
            step_color: None,
        })
        .unwrap();
        assert_eq!(fallback.background_color, DEFAULT_EVENT_COLOR);
        assert_eq!(fallback.border_color, DEFAULT_EVENT_COLOR);
        assert_eq!(fallback.end.as_deref(), Some("2026-03-04"));

        let json = serde_json::to_value(&fallback).unwrap();
        assert_eq!(json["allDay"], true);
        assert_eq!(json["extendedProps"]["description"], "");

        assert!(
            to_event(StepSpan {
                stock_number: "A3".into(),
                step: None,
                date_in: None,
                date_out: None,
                step_color: None,
            })
            .is_none()
        );
    }

    #[test]
    fn completed_jobs_grouped_in_order() {
        let job = |sn: &str, name: &str| CompletedJob {
            stock_number: sn.into(),
            job1: Some(name.into()),
            date_added: None,
            status: Some("Approved".into()),
        };
        let groups = group_by_unit(vec![job("A1", "Wash"), job("A1", "Wax"), job("B2", "Buff")]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].stock_number, "A1");
        assert_eq!(groups[0].jobs.len(), 2);
        assert_eq!(groups[1].jobs[0].job1.as_deref(), Some("Buff"));
    }
}
