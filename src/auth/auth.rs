use actix_web::{
    FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError, dev::Payload, http::StatusCode,
    web::Data,
};
use derive_more::Display;
use futures::future::{LocalBoxFuture, Ready, ready};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::{
    auth::session,
    config::Config,
    model::role::Role,
    store::notifications::{UnreadCounter, unread_or_zero},
    utils::flash::{Level, Redirect},
};

/// The logged-in user as resolved from the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn require_admin(&self) -> Result<(), GateError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(GateError::Forbidden)
        }
    }
}

#[derive(Debug, Display)]
pub enum GateError {
    /// No valid session; carries the URL to return to after login.
    #[display(fmt = "Login required")]
    Unauthenticated { next: String },

    #[display(fmt = "Forbidden")]
    Forbidden,

    #[display(fmt = "Internal Server Error")]
    Misconfigured,
}

impl ResponseError for GateError {
    fn status_code(&self) -> StatusCode {
        match self {
            GateError::Unauthenticated { .. } => StatusCode::FOUND,
            GateError::Forbidden => StatusCode::FORBIDDEN,
            GateError::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            GateError::Unauthenticated { next } => login_redirect(next),
            _ => HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() })),
        }
    }
}

pub fn login_redirect(next: &str) -> HttpResponse {
    Redirect::to(format!("/login?next={}", urlencoding::encode(next)))
        .flash(Level::Warning, "Please log in to access this page.")
        .finish()
}

pub fn requested_path(req: &HttpRequest) -> String {
    req.uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

/// Identity attached by the login gate, or re-derived from the cookie when
/// the gate was not applied to this route.
pub fn resolve_identity(req: &HttpRequest) -> Result<Identity, GateError> {
    if let Some(identity) = req.extensions().get::<Identity>() {
        return Ok(identity.clone());
    }

    let config = req.app_data::<Data<Config>>().ok_or_else(|| {
        tracing::error!("App config missing");
        GateError::Misconfigured
    })?;

    session::identity_from_request(req, config).ok_or_else(|| GateError::Unauthenticated {
        next: requested_path(req),
    })
}

impl FromRequest for Identity {
    type Error = GateError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(resolve_identity(req))
    }
}

/// An identity that has passed the admin check.
pub struct AdminUser(pub Identity);

impl FromRequest for AdminUser {
    type Error = GateError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(resolve_identity(req).and_then(|identity| {
            identity.require_admin()?;
            Ok(AdminUser(identity))
        }))
    }
}

/// Identity plus the user's unread chat count, for page-level responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RequestContext {
    #[serde(flatten)]
    pub user: Identity,
    pub unread_messages: i64,
}

impl FromRequest for RequestContext {
    type Error = GateError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let identity = resolve_identity(req);
        let counter = req.app_data::<Data<dyn UnreadCounter>>().cloned();

        Box::pin(async move {
            let user = identity?;
            let unread_messages = match counter {
                Some(counter) => unread_or_zero(counter.get_ref(), user.user_id).await,
                None => 0,
            };
            Ok(RequestContext {
                user,
                unread_messages,
            })
        })
    }
}
