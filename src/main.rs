use std::sync::Arc;

use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod store;
mod utils;

use config::Config;
use db::init_db;
use routes::RateLimits;
use store::{
    notifications::{MySqlUnreadCounter, UnreadCounter},
    users::{MySqlUserStore, UserStore},
};
use utils::username_index::UsernameIndex;

use crate::docs::ApiDoc;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let level: tracing::Level = config
        .log_level
        .parse()
        .with_context(|| format!("LOG_LEVEL has an invalid value: {:?}", config.log_level))?;

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config).await?;
    let limits = RateLimits::from_config(&config)?;

    let users: Arc<dyn UserStore> = Arc::new(MySqlUserStore::new(pool.clone()));
    let unread: Arc<dyn UnreadCounter> = Arc::new(MySqlUnreadCounter::new(pool.clone()));
    let username_index = Data::new(UsernameIndex::default());

    if let Some((username, password)) = &config.bootstrap_admin {
        match api::admin::bootstrap_admin(users.as_ref(), username, password).await {
            Ok(true) => info!(username = %username, "Created bootstrap admin"),
            Ok(false) => info!("Users exist, skipping bootstrap admin"),
            Err(e) => error!(error = %e, "Bootstrap admin failed"),
        }
    }

    let index_for_warmup = username_index.clone();
    let pool_for_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = index_for_warmup.warmup(&pool_for_warmup, 250).await {
            warn!(error = %e, "Failed to warm up username index");
        }
    });

    let server_addr = config.server_addr.clone();
    let config = Data::new(config);
    let pool = Data::new(pool);
    let users = Data::from(users);
    let unread = Data::from(unread);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(pool.clone())
            .app_data(config.clone())
            .app_data(users.clone())
            .app_data(unread.clone())
            .app_data(username_index.clone())
            .configure(|cfg| routes::configure(cfg, &limits))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
