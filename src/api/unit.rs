use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::dashboard::UNIT_COLUMNS,
    auth::auth::{Identity, RequestContext},
    error::AppError,
    model::{
        chat::UnitChatMessage,
        job::{OpenJob, Tech},
        note::Note,
        pricing::{PurchaseOrder, ServicePrice},
        step::Step,
        unit::{InventoryChecklist, Unit},
    },
    utils::{
        display::truncate_description,
        flash,
        upload::{ALLOWED_EXTENSIONS, MAX_IMAGE_BYTES, allowed_file, encode_image},
    },
};

#[derive(Serialize, ToSchema)]
pub struct UnitInfoResponse {
    pub user: RequestContext,
    pub unit: Unit,
    pub inventory: Option<InventoryChecklist>,
    pub checkout_complete: bool,
    /// Base64-encoded image data, oldest first
    pub images: Vec<String>,
    pub steps: Vec<Step>,
    pub notes: Vec<Note>,
    pub jobs: Vec<OpenJob>,
    pub techs: Vec<Tech>,
    pub purchase_orders: Vec<PurchaseOrder>,
    pub services: Vec<ServicePrice>,
    pub chats: Vec<UnitChatMessage>,
}

/// Everything known about one unit
#[utoipa::path(
    get,
    path = "/unit/{stock_number}",
    params(("stock_number" = String, Path, description = "Unit stock number")),
    responses(
        (status = 200, description = "Unit details", body = UnitInfoResponse),
        (status = 404, description = "Unknown unit", body = Object, example = json!({
            "error": "Unit A1234 not found"
        }))
    ),
    tag = "Unit"
)]
pub async fn unit_info(
    req: HttpRequest,
    ctx: RequestContext,
    path: web::Path<String>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let stock_number = path.into_inner();
    let pool = pool.get_ref();

    let unit_sql = format!("SELECT {UNIT_COLUMNS} FROM test_db WHERE stockNumber = ? ORDER BY id DESC LIMIT 1");
    let unit = sqlx::query_as::<_, Unit>(&unit_sql)
        .bind(&stock_number)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Unit {stock_number} not found")))?;

    let inventory = sqlx::query_as::<_, InventoryChecklist>(
        r#"
        SELECT stockNumber AS stock_number,
               lockingNutsIn AS locking_nuts_in, manualsIn AS manuals_in, jacksIn AS jacks_in,
               tunneauCoverIn AS tunneau_cover_in, floorMatsIn AS floor_mats_in,
               cargoMatsIn AS cargo_mats_in, blockHeaterCordIn AS block_heater_cord_in, changed,
               lockingNutsOut AS locking_nuts_out, manualsOut AS manuals_out, jacksOut AS jacks_out,
               tunneauCoverOut AS tunneau_cover_out, floorMatsOut AS floor_mats_out,
               cargoMatsOut AS cargo_mats_out, blockHeaterCordOut AS block_heater_cord_out,
               checkOut AS check_out
        FROM unitInventory
        WHERE stockNumber = ?
        ORDER BY changed DESC
        LIMIT 1
        "#,
    )
    .bind(&stock_number)
    .fetch_optional(pool)
    .await?;
    let checkout_complete = inventory.as_ref().is_some_and(InventoryChecklist::checkout_complete);

    let images = sqlx::query_scalar::<_, String>("SELECT image FROM images WHERE stockNumber = ? ORDER BY id")
        .bind(&stock_number)
        .fetch_all(pool)
        .await?;

    let steps = sqlx::query_as::<_, Step>(
        "SELECT id, step, dateIn AS date_in, dateOut AS date_out \
         FROM newDaysInStep WHERE stockNumber = ? ORDER BY dateIn DESC",
    )
    .bind(&stock_number)
    .fetch_all(pool)
    .await?;

    let notes = sqlx::query_as::<_, Note>(
        "SELECT id, stockNumber AS stock_number, notes, dateTime AS date_time, status \
         FROM notes WHERE stockNumber = ? ORDER BY dateTime DESC",
    )
    .bind(&stock_number)
    .fetch_all(pool)
    .await?;

    let jobs: Vec<OpenJob> = sqlx::query_as::<_, OpenJob>(
        r#"
        SELECT j.id AS job_id, j.status, j.dateAdded AS date_added, j.job1, j.priority,
               j.notes AS job_notes, j.tech AS assigned_tech_id, tech.techName AS assigned_tech_name
        FROM jobs j
        LEFT JOIN techs tech ON j.tech = tech.techNumber
        WHERE j.stockNumber = ? AND (j.status IS NULL OR j.status != 'Completed')
        ORDER BY j.dateAdded DESC
        "#,
    )
    .bind(&stock_number)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|mut job| {
        job.job_description_display = job.job1.as_deref().map(truncate_description).unwrap_or_default();
        job
    })
    .collect();

    let techs = sqlx::query_as::<_, Tech>(
        "SELECT techNumber AS tech_number, techName AS tech_name FROM techs ORDER BY techName",
    )
    .fetch_all(pool)
    .await?;

    let purchase_orders = sqlx::query_as::<_, PurchaseOrder>(
        "SELECT po, dateIn AS date_in, service, status FROM preApproved WHERE stockNumber = ? ORDER BY dateIn DESC",
    )
    .bind(&stock_number)
    .fetch_all(pool)
    .await?;

    let services = ServicePrice::list(pool).await?;

    let chats = sqlx::query_as::<_, UnitChatMessage>(
        r#"
        SELECT cm.message_id, cm.sender_id, cm.recipient_id, cm.message_text, cm.timestamp, cm.is_read,
               sender.userName AS sender_username, recipient.userName AS recipient_username
        FROM chat_messages cm
        JOIN users sender ON cm.sender_id = sender.id
        JOIN users recipient ON cm.recipient_id = recipient.id
        WHERE cm.stockNumber = ?
        ORDER BY cm.timestamp ASC
        "#,
    )
    .bind(&stock_number)
    .fetch_all(pool)
    .await?;

    Ok(flash::page(
        &req,
        UnitInfoResponse {
            user: ctx,
            unit,
            inventory,
            checkout_complete,
            images,
            steps,
            notes,
            jobs,
            techs,
            purchase_orders,
            services,
            chats,
        },
    ))
}

/// Mark a unit as picked up
#[utoipa::path(
    post,
    path = "/unit/pickup/{stock_number}",
    params(("stock_number" = String, Path, description = "Unit stock number")),
    responses(
        (status = 200, description = "Location updated", body = Object, example = json!({
            "message": "Unit A1234 marked as picked up."
        })),
        (status = 404, description = "No unit rows changed")
    ),
    tag = "Unit"
)]
pub async fn pickup(
    user: Identity,
    path: web::Path<String>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let stock_number = path.into_inner();

    let result = sqlx::query("UPDATE test_db SET location = ?, access2 = ? WHERE stockNumber = ?")
        .bind("Autospa Pickup")
        .bind("Autosp Admin")
        .bind(&stock_number)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!(
            "Unit {stock_number} not found or already updated."
        )));
    }

    info!(stock_number = %stock_number, by = %user.username, "Unit picked up");
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Unit {stock_number} marked as picked up.")
    })))
}

/// Checkbox fields count as ticked when present at all.
fn ticked(field: &Option<String>) -> i32 {
    i32::from(field.is_some())
}

/// Integer fields fall back to 0 when missing or malformed.
fn count_or_zero(field: &Option<String>) -> i32 {
    field
        .as_deref()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockInForm {
    pub locking_nuts_in: Option<String>,
    pub manuals_in: Option<String>,
    pub jacks_in: Option<String>,
    pub tunneau_cover_in: Option<String>,
    pub block_heater_cord_in: Option<String>,
    pub floor_mats_count: Option<String>,
    pub cargo_mats_count: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutForm {
    pub locking_nuts_out: Option<String>,
    pub manuals_out: Option<String>,
    pub jacks_out: Option<String>,
    pub tunneau_cover_out: Option<String>,
    pub block_heater_cord_out: Option<String>,
    pub floor_mats_out_count: Option<String>,
    pub cargo_mats_out_count: Option<String>,
}

/// Checklist values in column order: locking nuts, manuals, jacks,
/// tonneau cover, floor mats, cargo mats, block heater cord.
type Checklist = [i32; 7];

impl StockInForm {
    fn values(&self) -> Checklist {
        [
            ticked(&self.locking_nuts_in),
            ticked(&self.manuals_in),
            ticked(&self.jacks_in),
            ticked(&self.tunneau_cover_in),
            count_or_zero(&self.floor_mats_count),
            count_or_zero(&self.cargo_mats_count),
            ticked(&self.block_heater_cord_in),
        ]
    }
}

impl CheckOutForm {
    fn values(&self) -> Checklist {
        [
            ticked(&self.locking_nuts_out),
            ticked(&self.manuals_out),
            ticked(&self.jacks_out),
            ticked(&self.tunneau_cover_out),
            count_or_zero(&self.floor_mats_out_count),
            count_or_zero(&self.cargo_mats_out_count),
            ticked(&self.block_heater_cord_out),
        ]
    }
}

/// Record the stock-in checklist (once per unit)
#[utoipa::path(
    post,
    path = "/unit/stock_in/{stock_number}",
    params(("stock_number" = String, Path, description = "Unit stock number")),
    request_body(content = StockInForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 201, description = "Checklist saved"),
        (status = 409, description = "Checklist already submitted")
    ),
    tag = "Unit"
)]
pub async fn stock_in(
    path: web::Path<String>,
    form: web::Form<StockInForm>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let stock_number = path.into_inner();
    let [locking_nuts, manuals, jacks, tonneau, floor_mats, cargo_mats, block_heater] = form.values();

    let mut tx = pool.begin().await?;

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM unitInventory WHERE stockNumber = ? FOR UPDATE")
        .bind(&stock_number)
        .fetch_one(&mut *tx)
        .await?;
    if existing > 0 {
        return Err(AppError::conflict(format!(
            "Inventory checklist already submitted for unit {stock_number}. Cannot submit again."
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO unitInventory (
            stockNumber, lockingNutsIn, manualsIn, jacksIn, tunneauCoverIn,
            floorMatsIn, cargoMatsIn, blockHeaterCordIn, changed
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&stock_number)
    .bind(locking_nuts)
    .bind(manuals)
    .bind(jacks)
    .bind(tonneau)
    .bind(floor_mats)
    .bind(cargo_mats)
    .bind(block_heater)
    .bind(Utc::now().naive_utc())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(stock_number = %stock_number, "Stock-in checklist saved");
    Ok(HttpResponse::Created().json(json!({
        "message": format!("Inventory checklist saved for unit {stock_number}.")
    })))
}

/// Record the check-out checklist
#[utoipa::path(
    post,
    path = "/unit/check_out/{stock_number}",
    params(("stock_number" = String, Path, description = "Unit stock number")),
    request_body(content = CheckOutForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Checklist updated"),
        (status = 404, description = "No stock-in checklist for this unit")
    ),
    tag = "Unit"
)]
pub async fn check_out(
    path: web::Path<String>,
    form: web::Form<CheckOutForm>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let stock_number = path.into_inner();
    let [locking_nuts, manuals, jacks, tonneau, floor_mats, cargo_mats, block_heater] = form.values();

    let result = sqlx::query(
        r#"
        UPDATE unitInventory SET
            lockingNutsOut = ?, manualsOut = ?, jacksOut = ?, tunneauCoverOut = ?,
            floorMatsOut = ?, cargoMatsOut = ?, blockHeaterCordOut = ?,
            checkOut = 1, changed = ?
        WHERE stockNumber = ?
        "#,
    )
    .bind(locking_nuts)
    .bind(manuals)
    .bind(jacks)
    .bind(tonneau)
    .bind(floor_mats)
    .bind(cargo_mats)
    .bind(block_heater)
    .bind(Utc::now().naive_utc())
    .bind(&stock_number)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!(
            "Could not find inventory record for unit {stock_number} to update."
        )));
    }

    info!(stock_number = %stock_number, "Check-out checklist saved");
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Check-out checklist saved for unit {stock_number}.")
    })))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ImageQuery {
    /// Client-side file name; only its extension is used
    pub filename: Option<String>,
}

fn check_image(filename: Option<&str>, body: &[u8]) -> Result<(), AppError> {
    let filename = filename.map(str::trim).unwrap_or_default();
    if filename.is_empty() {
        return Err(AppError::bad_request("No selected file."));
    }
    if !allowed_file(filename) {
        return Err(AppError::bad_request(format!(
            "Invalid file type. Allowed types are: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    if body.is_empty() {
        return Err(AppError::bad_request("Uploaded file is empty."));
    }
    if body.len() > MAX_IMAGE_BYTES {
        return Err(AppError::bad_request("Image is larger than 16 MiB."));
    }
    Ok(())
}

/// Upload a unit photo; the request body is the raw image
#[utoipa::path(
    post,
    path = "/unit/add_image/{stock_number}",
    params(
        ("stock_number" = String, Path, description = "Unit stock number"),
        ImageQuery
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Image stored"),
        (status = 400, description = "Missing name, bad extension, empty or oversized body")
    ),
    tag = "Unit"
)]
pub async fn add_image(
    path: web::Path<String>,
    query: web::Query<ImageQuery>,
    body: web::Bytes,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let stock_number = path.into_inner();
    check_image(query.filename.as_deref(), &body)?;

    let size = body.len();
    let encoded = web::block(move || encode_image(&body)).await.map_err(|e| {
        warn!(error = %e, "Image encoding task failed");
        AppError::Internal
    })?;

    sqlx::query("INSERT INTO images (stockNumber, image) VALUES (?, ?)")
        .bind(&stock_number)
        .bind(encoded)
        .execute(pool.get_ref())
        .await?;

    info!(stock_number = %stock_number, bytes = size, "Image uploaded");
    Ok(HttpResponse::Created().json(json!({ "message": "Image uploaded successfully!" })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NoteForm {
    #[serde(default)]
    pub note_text: String,
}

/// Add a note to a unit
#[utoipa::path(
    post,
    path = "/unit/add_note/{stock_number}",
    params(("stock_number" = String, Path, description = "Unit stock number")),
    request_body(content = NoteForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 201, description = "Note stored"),
        (status = 400, description = "Empty note", body = Object, example = json!({
            "error": "Note cannot be empty."
        }))
    ),
    tag = "Unit"
)]
pub async fn add_note(
    path: web::Path<String>,
    form: web::Form<NoteForm>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let stock_number = path.into_inner();
    let note = form.note_text.trim();
    if note.is_empty() {
        return Err(AppError::bad_request("Note cannot be empty."));
    }

    sqlx::query("INSERT INTO notes (stockNumber, notes, status) VALUES (?, ?, 0)")
        .bind(&stock_number)
        .bind(note)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::Created().json(json!({ "message": "Note added successfully." })))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotesHistoryQuery {
    /// `YYYY-MM-DD`; defaults to today
    pub date: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct NotesHistoryResponse {
    pub user: RequestContext,
    #[schema(value_type = String, format = "date")]
    pub selected_date: NaiveDate,
    pub notes: Vec<Note>,
    #[schema(nullable = true)]
    pub warning: Option<String>,
}

/// Missing dates mean today; unparseable ones mean today plus a warning.
fn selected_date(raw: Option<&str>, today: NaiveDate) -> (NaiveDate, Option<String>) {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => (today, None),
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => (date, None),
            Err(_) => (
                today,
                Some("Invalid date format provided. Showing today's notes.".to_string()),
            ),
        },
    }
}

/// Notes written on one day
#[utoipa::path(
    get,
    path = "/notes_history",
    params(NotesHistoryQuery),
    responses((status = 200, description = "Notes for the day, newest first", body = NotesHistoryResponse)),
    tag = "Unit"
)]
pub async fn notes_history(
    req: HttpRequest,
    ctx: RequestContext,
    query: web::Query<NotesHistoryQuery>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let (date, warning) = selected_date(query.date.as_deref(), Local::now().date_naive());

    let notes = sqlx::query_as::<_, Note>(
        "SELECT id, stockNumber AS stock_number, notes, dateTime AS date_time, status \
         FROM notes WHERE DATE(dateTime) = ? ORDER BY dateTime DESC",
    )
    .bind(date)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(flash::page(
        &req,
        NotesHistoryResponse {
            user: ctx,
            selected_date: date,
            notes,
            warning,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;
    use actix_web::http::StatusCode;

    #[test]
    fn stock_in_form_maps_checkboxes_and_counts() {
        let form = StockInForm {
            locking_nuts_in: Some("on".into()),
            jacks_in: Some("on".into()),
            floor_mats_count: Some("4".into()),
            cargo_mats_count: Some("abc".into()),
            ..Default::default()
        };
        assert_eq!(form.values(), [1, 0, 1, 0, 4, 0, 0]);
        assert_eq!(StockInForm::default().values(), [0; 7]);
    }

    #[test]
    fn check_out_form_maps_checkboxes_and_counts() {
        let form = CheckOutForm {
            manuals_out: Some("1".into()),
            block_heater_cord_out: Some("on".into()),
            floor_mats_out_count: Some(" 2 ".into()),
            cargo_mats_out_count: Some("1".into()),
            ..Default::default()
        };
        assert_eq!(form.values(), [0, 1, 0, 0, 2, 1, 1]);
    }

    #[test]
    fn image_checks() {
        assert!(check_image(Some("front.png"), b"\x89PNG").is_ok());

        let err = check_image(None, b"x").unwrap_err();
        assert_eq!(err.to_string(), "No selected file.");

        let err = check_image(Some("virus.exe"), b"x").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Invalid file type. Allowed types are: png, jpg, jpeg, gif, webp"
        );

        assert!(check_image(Some("empty.jpg"), b"").is_err());

        let oversized = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(check_image(Some("huge.gif"), &oversized).is_err());
    }

    #[test]
    fn notes_date_falls_back_to_today() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        assert_eq!(selected_date(None, today), (today, None));
        assert_eq!(selected_date(Some(""), today), (today, None));

        let (date, warning) = selected_date(Some("2026-09-30"), today);
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 9, 30).unwrap());
        assert!(warning.is_none());

        let (date, warning) = selected_date(Some("30/09/2026"), today);
        assert_eq!(date, today);
        assert!(warning.is_some());
    }
}
