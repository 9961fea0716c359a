use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

use crate::{auth::auth::Identity, error::AppError};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AssignJobForm {
    #[schema(example = "4")]
    pub tech_id: Option<String>,
    #[serde(default)]
    #[schema(example = "1")]
    pub priority: String,
}

fn parse_tech_id(raw: Option<&str>) -> Result<i64, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_request("No technician selected."))?;
    raw.parse()
        .map_err(|_| AppError::bad_request("Invalid technician ID."))
}

/// Assign a technician and priority to a job
#[utoipa::path(
    post,
    path = "/job/assign/{job_id}",
    params(("job_id" = i64, Path, description = "Job id")),
    request_body(content = AssignJobForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Job assigned", body = Object, example = json!({
            "message": "Job 17 assigned to Jamie with priority 1."
        })),
        (status = 400, description = "No or malformed technician id"),
        (status = 404, description = "Unknown job")
    ),
    tag = "Unit"
)]
pub async fn assign_job(
    user: Identity,
    path: web::Path<i64>,
    form: web::Form<AssignJobForm>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let job_id = path.into_inner();
    let tech_id = parse_tech_id(form.tech_id.as_deref())?;
    let priority = form.priority.trim();

    let mut tx = pool.begin().await?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM jobs WHERE id = ? FOR UPDATE")
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(AppError::not_found(format!("Job ID {job_id} not found.")));
    }

    sqlx::query("UPDATE jobs SET tech = ?, priority = ? WHERE id = ?")
        .bind(tech_id)
        .bind(priority)
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

    let tech_name = sqlx::query_scalar::<_, String>("SELECT techName FROM techs WHERE techNumber = ?")
        .bind(tech_id)
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or_else(|| format!("Tech ID {tech_id}"));

    tx.commit().await?;

    info!(job_id, tech_id, by = %user.username, "Job assigned");
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Job {job_id} assigned to {tech_name} with priority {priority}.")
    })))
}
