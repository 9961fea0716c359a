use crate::{
    auth::{
        auth::Identity,
        password::verify_password,
        session::{self, issue_session, removal_cookie, session_cookie},
    },
    config::Config,
    model::role::Role,
    models::{LoginForm, NextQuery},
    store::users::UserStore,
    utils::{
        display::html_escape,
        flash::{self, Level, Redirect},
    },
};
use actix_web::{HttpRequest, HttpResponse, Responder, http::header, web};
use tracing::{debug, error, info, instrument, warn};

const INVALID_CREDENTIALS: &str = "Invalid username or password.";

/// Well-formed record checked when the username is unknown, so both
/// outcomes cost one PBKDF2 derivation.
const DUMMY_HASH: &str = "6175746f7370612d64756d6d792d2d2d:\
     0000000000000000000000000000000000000000000000000000000000000000";

/// Only local absolute paths are followed after login.
fn safe_next(next: Option<&str>) -> Option<&str> {
    let next = next?.trim();
    // browsers drop tabs and newlines, so "/\t/host" would become "//host"
    if next.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return None;
    }
    let mut chars = next.chars();
    match (chars.next(), chars.next()) {
        (Some('/'), Some('/' | '\\')) => None,
        (Some('/'), _) => Some(next),
        _ => None,
    }
}

fn login_location(next: Option<&str>) -> String {
    match safe_next(next) {
        Some(next) => format!("/login?next={}", urlencoding::encode(next)),
        None => "/login".to_string(),
    }
}

/// Runs the verifier on the blocking pool whether or not the user exists.
async fn password_matches(stored: Option<String>, candidate: String) -> bool {
    let found = stored.is_some();
    let stored = stored.unwrap_or_else(|| DUMMY_HASH.to_string());
    match web::block(move || verify_password(&stored, &candidate)).await {
        Ok(verified) => found && verified,
        Err(e) => {
            error!(error = %e, "Password verification task failed");
            false
        }
    }
}

fn login_failed(next: Option<&str>, message: &str) -> HttpResponse {
    Redirect::to(login_location(next))
        .flash(Level::Danger, message)
        .finish()
}

/// GET /login: bare sign-in form with any pending messages.
pub async fn login_page(
    req: HttpRequest,
    query: web::Query<NextQuery>,
    config: web::Data<Config>,
) -> impl Responder {
    if session::identity_from_request(&req, &config).is_some() {
        return Redirect::to("/").finish();
    }

    let messages: String = flash::take(&req)
        .iter()
        .map(|m| {
            format!(
                "<p class=\"flash {}\">{}</p>",
                html_escape(&format!("{:?}", m.level).to_lowercase()),
                html_escape(&m.message)
            )
        })
        .collect();

    let action = html_escape(&login_location(query.next.as_deref()));

    let body = format!(
        r#"<!doctype html>
<html><head><meta charset="utf-8"><title>Sign in</title></head>
<body>
{messages}
<form method="post" action="{action}">
  <label>Username <input name="username" autocomplete="username" required></label>
  <label>Password <input name="password" type="password" autocomplete="current-password" required></label>
  <button type="submit">Sign in</button>
</form>
</body></html>"#
    );

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/html; charset=utf-8"))
        .cookie(flash::removal_cookie())
        .body(body)
}

/// POST /login
#[instrument(
    name = "auth_login",
    skip(form, query, store, config),
    fields(username = %form.username.trim())
)]
pub async fn login(
    form: web::Form<LoginForm>,
    query: web::Query<NextQuery>,
    store: web::Data<dyn UserStore>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");
    let form = form.into_inner();
    let next = query.next.as_deref();
    let username = form.username.trim();

    // 1️⃣ Basic validation
    if username.is_empty() || form.password.is_empty() {
        info!("Validation failed: empty username or password");
        return login_failed(next, "Username and password are required.");
    }

    // 2️⃣ Fetch user
    let db_user = match store.find_by_username(username).await {
        Ok(user) => user,
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return login_failed(next, "An error occurred during login.");
        }
    };

    // 3️⃣ Verify password off the async workers
    let stored = db_user.as_ref().map(|user| user.password.clone());
    let verified = password_matches(stored, form.password).await;

    let db_user = match db_user {
        Some(user) if verified => {
            debug!(user_id = user.id, "Password verified");
            user
        }
        Some(_) => {
            info!("Invalid credentials: password mismatch");
            return login_failed(next, INVALID_CREDENTIALS);
        }
        None => {
            info!("Invalid credentials: user not found");
            return login_failed(next, INVALID_CREDENTIALS);
        }
    };

    let Some(role) = Role::from_db(&db_user.role) else {
        warn!(user_id = db_user.id, role = %db_user.role, "User has unknown role");
        return login_failed(next, INVALID_CREDENTIALS);
    };

    // 4️⃣ Sign the session
    let identity = Identity {
        user_id: db_user.id,
        username: db_user.username,
        role,
    };

    let token = match issue_session(&identity, &config.session_secret, config.session_ttl) {
        Ok(token) => token,
        Err(e) => {
            error!(error = %e, "Failed to sign session");
            return login_failed(next, "An error occurred during login.");
        }
    };

    info!(user_id = identity.user_id, "Login successful");

    Redirect::to(safe_next(next).unwrap_or("/"))
        .flash(Level::Success, format!("Welcome back, {}!", identity.username))
        .cookie(session_cookie(token, &config))
        .finish()
}

/// GET /logout
pub async fn logout() -> impl Responder {
    Redirect::to("/login")
        .flash(Level::Info, "You have been logged out.")
        .cookie(removal_cookie())
        .finish()
}
