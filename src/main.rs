use actix_web::middleware::{Logger, NormalizePath, from_fn};
use actix_web::web::Data;
use actix_web::{App, HttpResponse, HttpServer, Responder, get};
use dotenvy::dotenv;
use serde_json::json;
use std::io;
use std::sync::Arc;
use std::time::Duration;

mod api;
mod attendance;
mod auth;
mod clockify;
mod config;
mod docs;
mod errors;
mod live;
mod model;
mod routes;
mod schedule;
mod storage;
mod utils;

use crate::attendance::service::AttendanceService;
use crate::auth::gate::session_gate;
use crate::auth::password::hash_password;
use crate::auth::session::RevokedSessions;
use crate::clockify::client::{ClockifyClient, TimeTrackingApi};
use crate::docs::ApiDoc;
use crate::live::monitor::LiveMonitor;
use crate::model::class_period::reference_periods;
use crate::storage::document::{DocumentStore, FileDocumentStore};
use crate::storage::roster::RosterStore;
use config::Config;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "service": "attendance-dashboard",
        "docs": "/swagger-ui/"
    }))
}

fn startup_error(e: impl ToString) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
}

/// `attendance-dashboard hash-password` reads a password from stdin and prints
/// the value to put in `AUTH_PASSWORD_HASH`.
fn print_password_hash() -> io::Result<()> {
    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    let hash = hash_password(password.trim_end_matches(['\r', '\n'])).map_err(startup_error)?;
    println!("{hash}");
    Ok(())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    if std::env::args().nth(1).as_deref() == Some("hash-password") {
        return print_password_hash();
    }

    dotenv().ok();

    let config = Config::from_env().map_err(startup_error)?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "attendance.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    if config.auth_password_hash.is_none() || config.auth_secret.is_none() {
        warn!("AUTH_PASSWORD_HASH or AUTH_SECRET not set; every login will fail");
    }

    let documents: Arc<dyn DocumentStore> = Arc::new(FileDocumentStore::new(&config.roster_dir));
    let roster = RosterStore::new(documents, config.roster_document.clone());

    let tracker: Option<Arc<dyn TimeTrackingApi>> = match config.clockify_api_key.as_deref() {
        Some(key) => Some(Arc::new(
            ClockifyClient::new(
                key,
                &config.clockify_base_url,
                Duration::from_secs(config.clockify_timeout_secs),
            )
            .map_err(startup_error)?,
        )),
        None => {
            warn!("CLOCKIFY_API_KEY not set; attendance checks will fail until it is configured");
            None
        }
    };
    let service = AttendanceService::new(roster.clone(), tracker, config.clockify_max_concurrency);

    let periods = reference_periods(&config.period_group_ids);
    let (monitor, live) = LiveMonitor::new(periods, service.clone());
    if config.live_monitor {
        actix_web::rt::spawn(monitor.run());
    } else {
        info!("Live monitor disabled (LIVE_MONITOR=false)");
        // closes the command channel so pin requests fail fast
        drop(monitor);
    }

    let revoked = RevokedSessions::new(config.session_ttl);

    // Clone values for the closure (avoid move issues)
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(from_fn(session_gate))
            .wrap(NormalizePath::trim())
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(roster.clone()))
            .app_data(Data::new(service.clone()))
            .app_data(Data::new(live.clone()))
            .app_data(Data::new(revoked.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
