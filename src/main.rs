use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;

mod api;
mod auth;
mod clock;
mod config;
mod db;
mod docs;
mod model;
mod models;
mod routes;
mod store;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::store::{MySqlConfigStore, SharedSiteConfig};
use crate::utils::site_config_cache::SiteConfigCache;
use sqlx::MySqlPool;
use std::time::Duration;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Timeclock up"
}

/// Checks the database and primes the site-config cache so the first
/// clock-in does not pay the fetch.
async fn warmup_site_config(pool: MySqlPool, site: Data<SharedSiteConfig>) -> anyhow::Result<()> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&pool)
        .await?;

    let config = site.get().await;
    info!(
        "Site config warmed: ({}, {}) radius {}m",
        config.site.latitude,
        config.site.longitude,
        config.radius_m
    );
    Ok(())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;

    let site = Data::new(SiteConfigCache::new(
        MySqlConfigStore::new(pool.clone()),
        config.default_site_config(),
        Duration::from_secs(config.site_config_ttl_secs),
    ));

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    let pool_for_warmup = pool.clone();
    let site_for_warmup = site.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = warmup_site_config(pool_for_warmup, site_for_warmup).await {
            eprintln!("Failed to warm up site config: {:?}", e);
        }
    });

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(site.clone())
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
