use crate::{
    api::{attendance, live, students},
    auth::handlers,
    config::Config,
    errors::ServiceError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

// Photos arrive as data URLs, so bodies can be large.
const BODY_LIMIT: usize = 16 * 1024 * 1024;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .milliseconds_per_request(per_ms.max(1))
            .burst_size(requests_per_min.max(1))
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap_or_default();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Malformed bodies surface as the usual `{"error": ...}` 400
    cfg.app_data(
        web::JsonConfig::default()
            .limit(BODY_LIMIT)
            .error_handler(|err, _req| {
                ServiceError::Validation(format!("Invalid request body: {err}")).into()
            }),
    )
    .app_data(web::PayloadConfig::new(BODY_LIMIT));

    cfg.route("/login", web::get().to(handlers::login_page));

    // Public routes (the gate lets /auth/login through)
    cfg.service(
        web::scope(&format!("{}/auth", config.api_prefix))
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/students")
                    // /students
                    .service(
                        web::resource("")
                            .route(web::get().to(students::list_students))
                            .route(web::put().to(students::replace_students)),
                    )
                    .service(
                        web::resource("/upload-csv")
                            .route(web::post().to(students::upload_students)),
                    )
                    .service(
                        web::resource("/import-csv")
                            .route(web::post().to(students::import_students_csv)),
                    )
                    .service(web::resource("/remove").route(web::post().to(students::remove_student)))
                    .service(web::resource("/clear").route(web::post().to(students::clear_students)))
                    .service(
                        web::resource("/update-hour")
                            .route(web::post().to(students::update_student_hour)),
                    )
                    .service(
                        web::resource("/update-photos")
                            .route(web::post().to(students::update_student_photos)),
                    )
                    .service(web::resource("/debug").route(web::get().to(students::roster_stats))),
            )
            .service(
                web::resource("/clockify/attendance")
                    .route(web::post().to(attendance::check_attendance)),
            )
            .service(web::resource("/workspaces").route(web::get().to(live::list_workspaces)))
            .service(web::resource("/live").route(web::get().to(live::live_snapshot)))
            .service(
                web::resource("/live/manual")
                    .route(web::post().to(live::pin_period))
                    .route(web::delete().to(live::unpin_period)),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::service::AttendanceService;
    use crate::auth::gate::session_gate;
    use crate::auth::password::hash_password;
    use crate::auth::session::{RevokedSessions, SESSION_COOKIE_NAME};
    use crate::live::monitor::LiveMonitor;
    use crate::model::class_period::reference_periods;
    use crate::storage::document::MemoryDocumentStore;
    use crate::storage::roster::RosterStore;
    use actix_web::cookie::Cookie;
    use actix_web::dev::{Service, ServiceResponse};
    use actix_web::http::{StatusCode, header};
    use actix_web::middleware::from_fn;
    use actix_web::{App, test, web::Data};
    use chrono::{Local, TimeZone};
    use serde_json::{Value, json};
    use std::net::SocketAddr;

    const PASSWORD: &str = "open sesame";

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn test_config() -> Config {
        let mut config = Config::for_tests();
        config.auth_password_hash = Some(hash_password(PASSWORD).unwrap());
        config.auth_secret = Some("test-secret".into());
        config.period_group_ids = [Some("ws-1".into()), None, Some("ws-3".into()), None];
        config
    }

    async fn app(
        config: Config,
    ) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error> {
        app_at(config, 7, 0).await
    }

    /// App whose live monitor runs with the wall clock frozen at `hour:minute`.
    async fn app_at(
        config: Config,
        hour: u32,
        minute: u32,
    ) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error> {
        let roster = RosterStore::new(Arc::new(MemoryDocumentStore::default()), "students.json");
        let service = AttendanceService::new(roster.clone(), None, 2);
        let frozen = Local.with_ymd_and_hms(2025, 9, 2, hour, minute, 0).unwrap();
        let (monitor, live) = LiveMonitor::with_clock(
            reference_periods(&config.period_group_ids),
            service.clone(),
            Arc::new(move || frozen),
        );
        actix_web::rt::spawn(monitor.run());
        let revoked = RevokedSessions::new(config.session_ttl);
        let routes_config = config.clone();

        test::init_service(
            App::new()
                .wrap(from_fn(session_gate))
                .app_data(Data::new(config))
                .app_data(Data::new(roster))
                .app_data(Data::new(service))
                .app_data(Data::new(live))
                .app_data(Data::new(revoked))
                .configure(|cfg| configure(cfg, routes_config)),
        )
        .await
    }

    async fn login<S>(app: &S) -> Cookie<'static>
    where
        S: Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
    {
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .peer_addr(peer())
            .set_json(json!({ "password": PASSWORD }))
            .to_request();
        let resp = test::call_service(app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        resp.response()
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE_NAME)
            .map(|c| c.into_owned())
            .expect("session cookie")
    }

    #[actix_web::test]
    async fn unauthenticated_requests_redirect_to_login() {
        let app = app(test_config()).await;
        let req = test::TestRequest::get()
            .uri("/api/students")
            .peer_addr(peer())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login");

        let req = test::TestRequest::get().uri("/login").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn forged_cookie_is_rejected() {
        let app = app(test_config()).await;
        let req = test::TestRequest::get()
            .uri("/api/students")
            .peer_addr(peer())
            .cookie(Cookie::new(SESSION_COOKIE_NAME, "not-a-token"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    #[actix_web::test]
    async fn login_checks_password() {
        let app = app(test_config()).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .peer_addr(peer())
            .set_json(json!({ "password": "wrong" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Invalid password" }));

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .peer_addr(peer())
            .set_json(json!({ "password": "" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let cookie = login(&app).await;
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(actix_web::cookie::SameSite::Lax));
    }

    #[actix_web::test]
    async fn login_without_configured_hash_is_a_server_error() {
        let mut config = test_config();
        config.auth_password_hash = None;
        let app = app(config).await;
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .peer_addr(peer())
            .set_json(json!({ "password": PASSWORD }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn logout_revokes_session() {
        let app = app(test_config()).await;
        let cookie = login(&app).await;

        let req = test::TestRequest::post()
            .uri("/api/auth/logout")
            .peer_addr(peer())
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/students")
            .peer_addr(peer())
            .cookie(cookie)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    #[actix_web::test]
    async fn roster_lifecycle_over_http() {
        let app = app(test_config()).await;
        let cookie = login(&app).await;

        let req = test::TestRequest::post()
            .uri("/api/students/upload-csv")
            .peer_addr(peer())
            .cookie(cookie.clone())
            .set_json(json!({ "students": [
                { "name": "Bob", "email": "Bob@X.org", "hour": "2" },
                { "name": "Ada", "email": "ada@x.org" }
            ]}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["newStudents"], 2);
        assert_eq!(body["totalStudents"], 2);

        let req = test::TestRequest::post()
            .uri("/api/students/import-csv")
            .peer_addr(peer())
            .cookie(cookie.clone())
            .insert_header((header::CONTENT_TYPE, "text/csv"))
            .set_payload("name,email,hour\nCy,cy@x.org,4\nAda Lovelace,ADA@x.org,3\n")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["newStudents"], 1);
        assert_eq!(body["updatedStudents"], 1);
        assert_eq!(body["existingKept"], 1);

        let req = test::TestRequest::post()
            .uri("/api/students/update-hour")
            .peer_addr(peer())
            .cookie(cookie.clone())
            .set_json(json!({ "email": "cy@x.org", "newHour": "5" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid hour. Must be 1, 2, 3, or 4");

        let req = test::TestRequest::post()
            .uri("/api/students/remove")
            .peer_addr(peer())
            .cookie(cookie.clone())
            .set_json(json!({ "email": "nobody@x.org" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri("/api/students")
            .peer_addr(peer())
            .cookie(cookie.clone())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["Bob", "Ada Lovelace", "Cy"]);

        let req = test::TestRequest::get()
            .uri("/api/students/debug")
            .peer_addr(peer())
            .cookie(cookie)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["totalStudents"], 3);
        assert_eq!(body["statsByHour"]["3"]["total"], 1);
    }

    #[actix_web::test]
    async fn malformed_json_is_a_validation_error() {
        let app = app(test_config()).await;
        let cookie = login(&app).await;
        let req = test::TestRequest::post()
            .uri("/api/students/remove")
            .peer_addr(peer())
            .cookie(cookie)
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[actix_web::test]
    async fn attendance_requires_workspace_and_api_key() {
        let app = app(test_config()).await;
        let cookie = login(&app).await;

        let req = test::TestRequest::post()
            .uri("/api/clockify/attendance")
            .peer_addr(peer())
            .cookie(cookie.clone())
            .set_json(json!({ "date": "2025-09-02", "studentEmails": ["a@x"], "workspaceId": "" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/clockify/attendance")
            .peer_addr(peer())
            .cookie(cookie)
            .set_json(json!({ "date": "2025-09-02", "studentEmails": ["a@x"], "workspaceId": "ws-1" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn workspaces_lists_configured_periods() {
        let app = app(test_config()).await;
        let cookie = login(&app).await;
        let req = test::TestRequest::get()
            .uri("/api/workspaces")
            .peer_addr(peer())
            .cookie(cookie.clone())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let workspaces = body["workspaces"].as_array().unwrap();
        assert_eq!(workspaces.len(), 2);
        assert_eq!(workspaces[0]["id"], "ws-1");
        assert_eq!(workspaces[0]["startTime"], "08:20");
        assert_eq!(workspaces[1]["hour"], "3");

        let req = test::TestRequest::get()
            .uri("/api/live")
            .peer_addr(peer())
            .cookie(cookie)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["mode"], "idle");
    }

    #[actix_web::test]
    async fn manual_pin_is_refused_while_a_period_runs() {
        let app = app_at(test_config(), 8, 30).await;
        let cookie = login(&app).await;

        let req = test::TestRequest::post()
            .uri("/api/live/manual")
            .peer_addr(peer())
            .cookie(cookie.clone())
            .set_json(json!({ "hour": "3" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::get()
            .uri("/api/live")
            .peer_addr(peer())
            .cookie(cookie)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_ne!(body["mode"], "manual");
        assert!(body["manualHour"].is_null());
    }

    #[actix_web::test]
    async fn manual_pin_between_periods_switches_to_manual_mode() {
        let app = app_at(test_config(), 11, 30).await;
        let cookie = login(&app).await;

        let req = test::TestRequest::post()
            .uri("/api/live/manual")
            .peer_addr(peer())
            .cookie(cookie.clone())
            .set_json(json!({ "hour": "3" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/live")
            .peer_addr(peer())
            .cookie(cookie.clone())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["mode"], "manual");
        assert_eq!(body["manualHour"], "3");

        let req = test::TestRequest::delete()
            .uri("/api/live/manual")
            .peer_addr(peer())
            .cookie(cookie)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn login_attempts_are_rate_limited_per_peer() {
        let mut config = test_config();
        config.rate_login_per_min = 2;
        let app = app(config).await;

        let attempt = || {
            test::TestRequest::post()
                .uri("/api/auth/login")
                .peer_addr(peer())
                .set_json(json!({ "password": "wrong" }))
                .to_request()
        };
        for _ in 0..2 {
            let resp = test::call_service(&app, attempt()).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
        let resp = test::call_service(&app, attempt()).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
