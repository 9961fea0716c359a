use actix_web::{HttpRequest, HttpResponse, Responder, web};
use anyhow::anyhow;
use serde::Serialize;
use serde_json::json;
use sqlx::MySqlPool;
use strum::IntoEnumIterator;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    auth::{auth::AdminUser, password::hash_password},
    error::AppError,
    model::{
        pricing::ServicePrice,
        role::Role,
        user::{NewUser, UserSummary},
    },
    models::{CreateUserForm, ResetPasswordForm},
    store::users::{StoreError, UserStore},
    utils::{
        flash::{self, Level, Redirect},
        username_index::UsernameIndex,
    },
};

const CREATE_USER_PATH: &str = "/admin/create_user";
const MANAGE_USERS_PATH: &str = "/admin/manage_users";

#[derive(Serialize, ToSchema)]
pub struct CreateUserPage {
    #[schema(example = json!(["admin", "employee"]))]
    pub roles: Vec<Role>,
}

#[derive(Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserSummary>,
}

#[derive(Serialize, ToSchema)]
pub struct ServiceListResponse {
    pub services: Vec<ServicePrice>,
}

/// Roles the create-user form may offer
#[utoipa::path(
    get,
    path = "/admin/create_user",
    responses(
        (status = 200, description = "Assignable roles plus pending messages", body = CreateUserPage),
        (status = 302, description = "No session, redirected to login"),
        (status = 403, description = "Not an admin")
    ),
    tag = "Admin"
)]
pub async fn create_user_page(req: HttpRequest, _admin: AdminUser) -> impl Responder {
    flash::page(
        &req,
        CreateUserPage {
            roles: Role::iter().collect(),
        },
    )
}

fn validate(form: &CreateUserForm) -> Result<Role, Vec<&'static str>> {
    let mut problems = Vec::new();

    if form.username.trim().is_empty() {
        problems.push("Username is required.");
    }
    if form.password.is_empty() {
        problems.push("Password is required.");
    }
    if form.password != form.confirm_password {
        problems.push("Passwords do not match.");
    }
    let role = Role::from_db(&form.role);
    if role.is_none() {
        problems.push("Invalid role selected.");
    }

    match role {
        Some(role) if problems.is_empty() => Ok(role),
        _ => Err(problems),
    }
}

/// POST /admin/create_user
#[instrument(name = "admin_create_user", skip_all, fields(admin = %admin.0.username))]
pub async fn create_user(
    admin: AdminUser,
    form: web::Form<CreateUserForm>,
    store: web::Data<dyn UserStore>,
    index: web::Data<UsernameIndex>,
) -> impl Responder {
    let form = form.into_inner();

    let role = match validate(&form) {
        Ok(role) => role,
        Err(problems) => {
            info!(count = problems.len(), "Create user rejected by validation");
            return problems
                .into_iter()
                .fold(Redirect::to(CREATE_USER_PATH), |r, msg| r.flash(Level::Danger, msg))
                .finish();
        }
    };

    let username = form.username.trim().to_string();
    let already_exists = || {
        Redirect::to(CREATE_USER_PATH)
            .flash(Level::Danger, format!("Username '{username}' already exists."))
            .finish()
    };
    let failed = || {
        Redirect::to(CREATE_USER_PATH)
            .flash(Level::Danger, "Failed to create user.")
            .finish()
    };

    match index.is_available(&username, store.get_ref()).await {
        Ok(true) => {}
        Ok(false) => {
            info!(username = %username, "Username already taken");
            return already_exists();
        }
        Err(e) => {
            error!(error = %e, "Username lookup failed");
            return failed();
        }
    }

    let password = form.password;
    let password_hash = match web::block(move || hash_password(&password)).await {
        Ok(Ok(hash)) => hash,
        Ok(Err(e)) => {
            error!(error = ?e, "Password hashing failed");
            return Redirect::to(CREATE_USER_PATH)
                .flash(Level::Danger, "Failed to process password.")
                .finish();
        }
        Err(e) => {
            error!(error = %e, "Password hashing task failed");
            return Redirect::to(CREATE_USER_PATH)
                .flash(Level::Danger, "Failed to process password.")
                .finish();
        }
    };

    let new_user = NewUser {
        username: username.clone(),
        password_hash,
        role,
    };

    match store.create(&new_user).await {
        Ok(user_id) => {
            index.mark_taken(&username).await;
            info!(user_id, username = %username, role = %role, "User created");
            Redirect::to(CREATE_USER_PATH)
                .flash(Level::Success, format!("User '{username}' created successfully!"))
                .finish()
        }
        Err(StoreError::Duplicate) => {
            index.mark_taken(&username).await;
            info!(username = %username, "Username collided on insert");
            already_exists()
        }
        Err(StoreError::Database(e)) => {
            error!(error = %e, "Failed to create user");
            failed()
        }
    }
}

/// List users
#[utoipa::path(
    get,
    path = "/admin/manage_users",
    responses(
        (status = 200, description = "Users sorted by username", body = UserListResponse),
        (status = 403, description = "Not an admin"),
        (status = 500, description = "Internal server error", body = Object, example = json!({
            "error": "Internal Server Error"
        }))
    ),
    tag = "Admin"
)]
pub async fn manage_users(
    req: HttpRequest,
    _admin: AdminUser,
    store: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let users = store.list().await?;
    Ok(flash::page(&req, UserListResponse { users }))
}

/// POST /admin/reset_password/{user_id}
#[instrument(name = "admin_reset_password", skip_all, fields(admin = %admin.0.username, user_id = *user_id))]
pub async fn reset_password(
    admin: AdminUser,
    user_id: web::Path<i64>,
    form: web::Form<ResetPasswordForm>,
    store: web::Data<dyn UserStore>,
) -> impl Responder {
    let user_id = user_id.into_inner();
    let back = Redirect::to(MANAGE_USERS_PATH);

    let new_password = form.into_inner().new_password;
    if new_password.is_empty() {
        return back.flash(Level::Warning, "New password cannot be empty.").finish();
    }

    let password_hash = match web::block(move || hash_password(&new_password)).await {
        Ok(Ok(hash)) => hash,
        Ok(Err(e)) => {
            error!(error = ?e, "Password hashing failed");
            return back
                .flash(Level::Danger, "An unexpected error occurred while resetting the password.")
                .finish();
        }
        Err(e) => {
            error!(error = %e, "Password hashing task failed");
            return back
                .flash(Level::Danger, "An unexpected error occurred while resetting the password.")
                .finish();
        }
    };

    match store.reset_password(user_id, &password_hash).await {
        Ok(Some(username)) => {
            info!("Password reset");
            back.flash(
                Level::Success,
                format!("Password for user '{username}' updated successfully."),
            )
            .finish()
        }
        Ok(None) => {
            warn!("Password reset for unknown user");
            back.flash(Level::Warning, format!("User ID {user_id} not found."))
                .finish()
        }
        Err(e) => {
            error!(error = %e, "Failed to reset password");
            back.flash(Level::Danger, "Database error resetting password.")
                .finish()
        }
    }
}

/// Service price list
#[utoipa::path(
    get,
    path = "/admin/services",
    responses(
        (status = 200, description = "Services ordered by name", body = ServiceListResponse),
        (status = 403, description = "Not an admin")
    ),
    tag = "Admin"
)]
pub async fn services(
    req: HttpRequest,
    _admin: AdminUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let services = ServicePrice::list(pool.get_ref()).await?;
    Ok(flash::page(&req, ServiceListResponse { services }))
}

/// Creates the first admin when the users table is empty. Returns whether a
/// user was created.
pub async fn bootstrap_admin(store: &dyn UserStore, username: &str, password: &str) -> anyhow::Result<bool> {
    let existing = store.count().await.map_err(|e| anyhow!("counting users failed: {e}"))?;
    if existing > 0 {
        return Ok(false);
    }

    let password = password.to_string();
    let password_hash = web::block(move || hash_password(&password))
        .await?
        .map_err(|_| anyhow!("hashing bootstrap password failed"))?;

    let user_id = store
        .create(&NewUser {
            username: username.to_string(),
            password_hash,
            role: Role::Admin,
        })
        .await
        .map_err(|e| anyhow!("creating bootstrap admin failed: {e}"))?;

    info!(user_id, username = %username, "Bootstrap admin created");
    Ok(true)
}
