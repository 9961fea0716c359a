use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
};
use tracing::{debug, warn};

use crate::auth::auth::{GateError, resolve_identity};

fn reject(req: &ServiceRequest, e: GateError) -> HttpResponse {
    match &e {
        GateError::Unauthenticated { next } => {
            debug!(path = %next, "No valid session, redirecting to login")
        }
        GateError::Forbidden => warn!(path = %req.path(), "Admin route denied"),
        GateError::Misconfigured => {}
    }
    e.error_response()
}

/// Stage 1: a valid session must be present.
pub async fn require_login(req: ServiceRequest, next: Next<BoxBody>) -> Result<ServiceResponse<BoxBody>, Error> {
    match resolve_identity(req.request()) {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.call(req).await
        }
        Err(e) => {
            let resp = reject(&req, e);
            Ok(req.into_response(resp))
        }
    }
}

/// Stage 2: the session role must be admin. Re-derives the identity when
/// stage 1 did not run first.
pub async fn require_admin(req: ServiceRequest, next: Next<BoxBody>) -> Result<ServiceResponse<BoxBody>, Error> {
    let checked = resolve_identity(req.request()).and_then(|identity| {
        identity.require_admin()?;
        Ok(identity)
    });

    match checked {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.call(req).await
        }
        Err(e) => {
            let resp = reject(&req, e);
            Ok(req.into_response(resp))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{
            auth::Identity,
            session::{SESSION_COOKIE, issue_session},
        },
        config::Config,
        model::role::Role,
    };
    use actix_web::{
        App,
        cookie::Cookie,
        http::{StatusCode, header},
        middleware::from_fn,
        test,
        web::{self, Data},
    };

    fn cookie_for(role: Role) -> Cookie<'static> {
        let config = Config::for_tests();
        let identity = Identity {
            user_id: 11,
            username: "pat".into(),
            role,
        };
        Cookie::new(
            SESSION_COOKIE,
            issue_session(&identity, &config.session_secret, 600).unwrap(),
        )
    }

    async fn whoami(identity: Identity) -> HttpResponse {
        HttpResponse::Ok().body(identity.username)
    }

    macro_rules! gated_app {
        () => {
            test::init_service(
                App::new()
                    .app_data(Data::new(Config::for_tests()))
                    .service(
                        web::scope("/admin")
                            .wrap(from_fn(require_admin))
                            .wrap(from_fn(require_login))
                            .route("/users", web::get().to(whoami)),
                    )
                    .service(
                        web::scope("/direct-admin")
                            .wrap(from_fn(require_admin))
                            .route("/users", web::get().to(whoami)),
                    )
                    .service(
                        web::scope("/app")
                            .wrap(from_fn(require_login))
                            .route("/home", web::get().to(whoami)),
                    ),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn admin_route_without_session_redirects_to_login() {
        let app = gated_app!();
        let req = test::TestRequest::get().uri("/admin/users?sort=name").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/login?next=%2Fadmin%2Fusers%3Fsort%3Dname"
        );
    }

    #[actix_web::test]
    async fn admin_route_with_employee_session_is_forbidden() {
        let app = gated_app!();
        let req = test::TestRequest::get()
            .uri("/admin/users")
            .cookie(cookie_for(Role::Employee))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn admin_route_with_admin_session_succeeds() {
        let app = gated_app!();
        let req = test::TestRequest::get()
            .uri("/admin/users")
            .cookie(cookie_for(Role::Admin))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(test::read_body(resp).await, "pat");
    }

    #[actix_web::test]
    async fn admin_stage_alone_still_requires_session() {
        let app = gated_app!();

        let req = test::TestRequest::get().uri("/direct-admin/users").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);

        let req = test::TestRequest::get()
            .uri("/direct-admin/users")
            .cookie(cookie_for(Role::Employee))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::get()
            .uri("/direct-admin/users")
            .cookie(cookie_for(Role::Admin))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn login_stage_admits_any_role() {
        let app = gated_app!();
        let req = test::TestRequest::get()
            .uri("/app/home")
            .cookie(cookie_for(Role::Employee))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn forged_cookie_is_treated_as_no_session() {
        let app = gated_app!();
        let req = test::TestRequest::get()
            .uri("/app/home")
            .cookie(Cookie::new(SESSION_COOKIE, "not.a.token"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FOUND);
    }
}
