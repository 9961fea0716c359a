use std::collections::HashMap;

use actix_web::{HttpResponse, web};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{auth::auth::Identity, error::AppError};

fn default_source() -> String {
    "unit_info".to_string()
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CustomService {
    #[serde(default)]
    #[schema(example = "Headlight restore")]
    pub name: String,
    /// String or number; blank or missing means 0
    #[schema(value_type = Option<String>, example = "59.00")]
    pub cost: Option<Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePoRequest {
    #[serde(default)]
    #[schema(example = "PO-7781")]
    pub po_number: String,
    /// `dashboard` or `unit_info`
    #[serde(default = "default_source")]
    #[schema(example = "dashboard")]
    pub source: String,
    #[serde(default)]
    pub standard_services: Vec<String>,
    #[serde(default)]
    pub custom_services: Vec<CustomService>,
}

impl CreatePoRequest {
    fn from_dashboard(&self) -> bool {
        self.source == "dashboard"
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatePoResponse {
    pub message: String,
    pub jobs_added: usize,
    pub warnings: Vec<String>,
    #[schema(value_type = String, example = "308.99")]
    pub total: Decimal,
}

fn check_request(req: &CreatePoRequest) -> Result<(), AppError> {
    if req.from_dashboard() && req.po_number.trim().is_empty() {
        return Err(AppError::bad_request(
            "PO Number is required when creating from Dashboard.",
        ));
    }
    let any_custom = req.custom_services.iter().any(|c| !c.name.trim().is_empty());
    if req.standard_services.is_empty() && !any_custom {
        return Err(AppError::bad_request(
            "Please select at least one standard service or add a custom service.",
        ));
    }
    Ok(())
}

fn parse_cost(cost: Option<&Value>) -> Option<Decimal> {
    let cost = match cost {
        None | Some(Value::Null) => return Some(Decimal::ZERO),
        Some(Value::String(s)) if s.trim().is_empty() => return Some(Decimal::ZERO),
        Some(Value::String(s)) => s.trim().parse::<Decimal>().ok()?,
        Some(Value::Number(n)) => n.to_string().parse::<Decimal>().ok()?,
        Some(_) => return None,
    };
    (!cost.is_sign_negative()).then_some(cost)
}

/// Resolves requested services to `(name, cost)` pairs. Anything that can't
/// be priced is dropped and reported in the returned warnings.
fn compile_services(
    req: &CreatePoRequest,
    price_list: &HashMap<String, Decimal>,
) -> (Vec<(String, Decimal)>, Vec<String>) {
    let mut services = Vec::new();
    let mut warnings = Vec::new();

    for name in &req.standard_services {
        match price_list.get(name) {
            Some(cost) => services.push((name.clone(), *cost)),
            None => warnings.push(format!(
                "Cost not found for standard service '{name}'. Skipping."
            )),
        }
    }

    for custom in &req.custom_services {
        let name = custom.name.trim();
        if name.is_empty() {
            continue;
        }
        match parse_cost(custom.cost.as_ref()) {
            Some(cost) => services.push((name.to_string(), cost)),
            None => warnings.push(format!(
                "Invalid cost format for custom service '{name}'. Skipping."
            )),
        }
    }

    (services, warnings)
}

/// Add services to a unit as jobs, optionally under a pre-approved PO
#[utoipa::path(
    post,
    path = "/unit/create_po/{stock_number}",
    params(("stock_number" = String, Path, description = "Unit stock number")),
    request_body = CreatePoRequest,
    responses(
        (status = 201, description = "Jobs created", body = CreatePoResponse),
        (status = 400, description = "Missing PO number or no valid services")
    ),
    tag = "Unit"
)]
pub async fn create_po(
    user: Identity,
    path: web::Path<String>,
    body: web::Json<CreatePoRequest>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let stock_number = path.into_inner();
    let req = body.into_inner();
    check_request(&req)?;

    let price_list: HashMap<String, Decimal> = if req.standard_services.is_empty() {
        HashMap::new()
    } else {
        sqlx::query_as::<_, (String, Decimal)>("SELECT service, cost FROM AutospaPricing")
            .fetch_all(pool.get_ref())
            .await?
            .into_iter()
            .collect()
    };

    let (services, warnings) = compile_services(&req, &price_list);
    for warning in &warnings {
        warn!(stock_number = %stock_number, "{warning}");
    }
    if services.is_empty() {
        return Err(AppError::bad_request("No valid services to add."));
    }

    let dashboard = req.from_dashboard();
    let job_status = if dashboard { "Approved" } else { "Pending" };
    let po_number = req.po_number.trim();
    let record_po = dashboard && !po_number.is_empty();
    let now = Utc::now().naive_utc();

    let mut tx = pool.begin().await?;
    for (service, _) in &services {
        sqlx::query(
            "INSERT INTO jobs (stockNumber, job1, status, priority, complete) VALUES (?, ?, ?, '0', 1)",
        )
        .bind(&stock_number)
        .bind(service)
        .bind(job_status)
        .execute(&mut *tx)
        .await?;

        if record_po {
            sqlx::query(
                "INSERT INTO preApproved (stockNumber, po, service, status, dateIn) VALUES (?, ?, ?, 'Approved', ?)",
            )
            .bind(&stock_number)
            .bind(po_number)
            .bind(service)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
    }
    tx.commit().await?;

    let total: Decimal = services.iter().map(|(_, cost)| *cost).sum();
    let message = if record_po {
        format!("PO {po_number} created and services added for unit {stock_number}.")
    } else {
        format!("Services added successfully for unit {stock_number}.")
    };

    info!(
        stock_number = %stock_number,
        jobs = services.len(),
        by = %user.username,
        "Purchase order recorded"
    );
    Ok(HttpResponse::Created().json(CreatePoResponse {
        message,
        jobs_added: services.len(),
        warnings,
        total,
    }))
}
