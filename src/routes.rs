use crate::{
    api::{admin, chat, dashboard, job, po, report, unit},
    auth::{
        handlers,
        middleware::{require_admin, require_login},
    },
    config::Config,
    utils::upload::MAX_IMAGE_BYTES,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Context, Result};

type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limiter configs. Built once so every worker shares the same buckets.
#[derive(Clone)]
pub struct RateLimits {
    login: LimiterConfig,
    protected: LimiterConfig,
}

fn build_limiter(requests_per_min: u32) -> Result<LimiterConfig> {
    let per_ms = 60_000 / u64::from(requests_per_min.max(1));
    GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .with_context(|| format!("invalid rate limit: {requests_per_min}/min"))
}

impl RateLimits {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, limits: &RateLimits) {
    // Public routes
    cfg.service(
        web::resource("/login")
            .wrap(Governor::new(&limits.login))
            .route(web::get().to(handlers::login_page))
            .route(web::post().to(handlers::login)),
    )
    .service(
        web::resource("/logout")
            .route(web::get().to(handlers::logout))
            .route(web::post().to(handlers::logout)),
    );

    // Admin routes: login gate runs first, then the role gate
    cfg.service(
        web::scope("/admin")
            .wrap(from_fn(require_admin))
            .wrap(from_fn(require_login))
            .wrap(Governor::new(&limits.protected))
            .service(
                web::resource("/create_user")
                    .route(web::get().to(admin::create_user_page))
                    .route(web::post().to(admin::create_user)),
            )
            .service(web::resource("/manage_users").route(web::get().to(admin::manage_users)))
            .service(
                web::resource("/reset_password/{user_id}")
                    .route(web::post().to(admin::reset_password)),
            )
            .service(web::resource("/services").route(web::get().to(admin::services))),
    );

    // Everything else requires a session
    cfg.service(
        web::scope("")
            .wrap(from_fn(require_login))
            .wrap(Governor::new(&limits.protected))
            .route("/", web::get().to(dashboard::dashboard))
            .route("/view_active", web::get().to(dashboard::view_active))
            .route("/ready_pickup", web::get().to(dashboard::ready_pickup))
            .route("/completed_jobs", web::get().to(dashboard::completed_jobs))
            .route("/notes_history", web::get().to(unit::notes_history))
            .route("/reports", web::get().to(report::reports))
            .route("/job/assign/{job_id}", web::post().to(job::assign_job))
            .service(
                web::scope("/unit")
                    .route("/{stock_number}", web::get().to(unit::unit_info))
                    .route("/pickup/{stock_number}", web::post().to(unit::pickup))
                    .route("/stock_in/{stock_number}", web::post().to(unit::stock_in))
                    .route("/check_out/{stock_number}", web::post().to(unit::check_out))
                    .route("/add_note/{stock_number}", web::post().to(unit::add_note))
                    .route("/create_po/{stock_number}", web::post().to(po::create_po))
                    .service(
                        web::resource("/add_image/{stock_number}")
                            .app_data(web::PayloadConfig::new(MAX_IMAGE_BYTES))
                            .route(web::post().to(unit::add_image)),
                    ),
            )
            .service(
                web::scope("/api")
                    .route("/overview/events", web::get().to(dashboard::overview_events))
                    .service(
                        web::scope("/chat")
                            .route("/users", web::get().to(chat::users))
                            .route("/conversations", web::get().to(chat::conversations))
                            .route("/messages/{other_user_id}", web::get().to(chat::messages))
                            .route("/send", web::post().to(chat::send))
                            .route("/unread", web::get().to(chat::unread)),
                    ),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{auth::Identity, session::{SESSION_COOKIE, issue_session}},
        model::role::Role,
        store::{
            fakes::{FixedUnreadCounter, InMemoryUserStore},
            notifications::UnreadCounter,
            users::UserStore,
        },
        utils::username_index::UsernameIndex,
    };
    use actix_web::{
        App,
        cookie::Cookie,
        http::{StatusCode, header},
        test,
        web::Data,
    };
    use std::{net::SocketAddr, sync::Arc};

    #[::core::prelude::v1::test]
    fn limiter_accepts_high_rates() {
        assert!(build_limiter(20).is_ok());
        // 60_000 per minute rounds to one token per millisecond
        assert!(build_limiter(120_000).is_ok());
    }

    fn session(user_id: i64, username: &str, role: Role) -> Cookie<'static> {
        let identity = Identity {
            user_id,
            username: username.into(),
            role,
        };
        let token = issue_session(&identity, &Config::for_tests().session_secret, 600).unwrap();
        Cookie::new(SESSION_COOKIE, token)
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    macro_rules! routed_app {
        () => {{
            let config = Config::for_tests();
            let limits = RateLimits::from_config(&config).unwrap();
            let store: Arc<dyn UserStore> = Arc::new(
                InMemoryUserStore::default()
                    .with_user("boss", "boss-pass", Role::Admin)
                    .with_user("bob", "bob-pass", Role::Employee),
            );
            let unread: Arc<dyn UnreadCounter> = Arc::new(FixedUnreadCounter(0));
            test::init_service(
                App::new()
                    .app_data(Data::new(config))
                    .app_data(Data::from(store))
                    .app_data(Data::from(unread))
                    .app_data(Data::new(UsernameIndex::default()))
                    .configure(|cfg| configure(cfg, &limits)),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn admin_scope_sends_anonymous_users_to_login() {
        let app = routed_app!();
        let req = test::TestRequest::get()
            .uri("/admin/manage_users")
            .peer_addr(peer())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/login?next=%2Fadmin%2Fmanage_users"
        );
    }

    #[actix_web::test]
    async fn admin_scope_forbids_employees() {
        let app = routed_app!();
        let req = test::TestRequest::get()
            .uri("/admin/manage_users")
            .peer_addr(peer())
            .cookie(session(2, "bob", Role::Employee))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn admin_scope_serves_admins() {
        let app = routed_app!();
        let req = test::TestRequest::get()
            .uri("/admin/manage_users")
            .peer_addr(peer())
            .cookie(session(1, "boss", Role::Admin))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        let names: Vec<&str> = body["users"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["username"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"boss"));
        assert!(names.contains(&"bob"));
    }

    #[actix_web::test]
    async fn login_page_is_public() {
        let app = routed_app!();
        let req = test::TestRequest::get()
            .uri("/login")
            .peer_addr(peer())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
    }

    #[actix_web::test]
    async fn protected_scope_requires_session() {
        let app = routed_app!();
        let req = test::TestRequest::get()
            .uri("/api/chat/unread")
            .peer_addr(peer())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/login?next=%2Fapi%2Fchat%2Funread"
        );
    }
}
