use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post, put};
use axum::Router;
use chrono::{Duration, Utc};
use tokio::sync::broadcast;
use tower::ServiceExt;

use barbershop::config::AppConfig;
use barbershop::db::{self, queries};
use barbershop::handlers;
use barbershop::models::{Barber, Service, WorkingHours};
use barbershop::services::identity::IdentityProvider;
use barbershop::state::AppState;

// ── Mock Identity ──

struct MockIdentity {
    accept: &'static str,
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn verify_credentials(&self, email: &str, password: &str) -> anyhow::Result<bool> {
        Ok(email == self.accept && password == "hunter2")
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        frontend_origin: "http://localhost:5500".to_string(),
        slot_granularity_minutes: 30,
        booking_window_days: 30,
        session_secret: "test-secret".to_string(),
        session_ttl_hours: 24,
        identity_url: "http://localhost:9999/auth/v1".to_string(),
        identity_api_key: "".to_string(),
    }
}

fn test_state() -> Arc<AppState> {
    let conn = db::init_db(":memory:").unwrap();

    let barber = Barber {
        id: "bb-1".to_string(),
        name: "Marcos".to_string(),
        email: "marcos@example.com".to_string(),
        specialty: Some("Fades".to_string()),
        bio: None,
        photo_url: None,
        active: true,
        // open every day so date-dependent tests don't care which weekday
        // "next week" lands on
        working_hours: WorkingHours::from_json(
            r#"{"windows":[
                {"day":"mon","start":"09:00","end":"18:00"},
                {"day":"tue","start":"09:00","end":"18:00"},
                {"day":"wed","start":"09:00","end":"18:00"},
                {"day":"thu","start":"09:00","end":"18:00"},
                {"day":"fri","start":"09:00","end":"18:00"},
                {"day":"sat","start":"09:00","end":"18:00"},
                {"day":"sun","start":"09:00","end":"18:00"}]}"#,
        )
        .unwrap(),
    };
    queries::save_barber(&conn, &barber).unwrap();

    queries::save_service(
        &conn,
        &Service {
            id: "sv-60".to_string(),
            name: "Cut and beard".to_string(),
            description: Some("Full service".to_string()),
            price_cents: 250000,
            duration_minutes: 60,
            active: true,
        },
    )
    .unwrap();
    queries::save_service(
        &conn,
        &Service {
            id: "sv-30".to_string(),
            name: "Classic cut".to_string(),
            description: None,
            price_cents: 150000,
            duration_minutes: 30,
            active: true,
        },
    )
    .unwrap();

    let (events_tx, _) = broadcast::channel(64);

    Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        identity: Box::new(MockIdentity {
            accept: "marcos@example.com",
        }),
        events_tx,
    })
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/session", get(handlers::auth::session))
        .route("/api/barbers", get(handlers::barbers::list))
        .route("/api/barbers/:id", get(handlers::barbers::get))
        .route("/api/barbers/:id/hours", put(handlers::barbers::update_hours))
        .route("/api/barbers/:id/appointments", get(handlers::barbers::day))
        .route("/api/services", get(handlers::catalog::list_services))
        .route("/api/availability", get(handlers::availability::free_slots))
        .route(
            "/api/appointments",
            post(handlers::appointments::create).get(handlers::appointments::list),
        )
        .route(
            "/api/appointments/:id",
            get(handlers::appointments::get).patch(handlers::appointments::transition),
        )
        .with_state(state)
}

/// A date next week, far enough out that "now" never catches up mid-test.
fn future_date() -> String {
    (Utc::now() + Duration::days(7)).date_naive().to_string()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_request(method: &str, uri: &str, token: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"));
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(res: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn book(
    state: &Arc<AppState>,
    phone: &str,
    name: &str,
    date: &str,
    start: &str,
    service: &str,
) -> (StatusCode, serde_json::Value) {
    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "POST",
            "/api/appointments",
            serde_json::json!({
                "client_name": name,
                "client_phone": phone,
                "barber_id": "bb-1",
                "service_id": service,
                "date": date,
                "start_time": start,
            }),
        ))
        .await
        .unwrap();
    let status = res.status();
    (status, body_json(res).await)
}

async fn login(state: &Arc<AppState>) -> String {
    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({"email": "marcos@example.com", "password": "hunter2"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await["token"].as_str().unwrap().to_string()
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let res = test_app(test_state())
        .oneshot(get_request("/health"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

// ── Catalog ──

#[tokio::test]
async fn test_list_barbers_and_services() {
    let state = test_state();

    let res = test_app(state.clone())
        .oneshot(get_request("/api/barbers"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let barbers = body_json(res).await;
    assert_eq!(barbers.as_array().unwrap().len(), 1);
    assert_eq!(barbers[0]["name"], "Marcos");

    let res = test_app(state)
        .oneshot(get_request("/api/services"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let services = body_json(res).await;
    // ordered by price ascending
    assert_eq!(services[0]["id"], "sv-30");
    assert_eq!(services[1]["id"], "sv-60");
}

#[tokio::test]
async fn test_get_unknown_barber() {
    let res = test_app(test_state())
        .oneshot(get_request("/api/barbers/nope"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

// ── Availability ──

#[tokio::test]
async fn test_availability_full_open_day() {
    let state = test_state();
    let date = future_date();

    let res = test_app(state)
        .oneshot(get_request(&format!(
            "/api/availability?barber_id=bb-1&date={date}"
        )))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let slots = body_json(res).await;
    let slots = slots.as_array().unwrap();
    // 09:00-18:00 at 30 min granularity
    assert_eq!(slots.len(), 18);
    assert_eq!(slots[0]["start_time"], "09:00:00");
}

#[tokio::test]
async fn test_availability_excludes_booked_slots() {
    let state = test_state();
    let date = future_date();

    let (status, _) = book(&state, "+15551110000", "Alice", &date, "10:00", "sv-60").await;
    assert_eq!(status, StatusCode::CREATED);

    let res = test_app(state)
        .oneshot(get_request(&format!(
            "/api/availability?barber_id=bb-1&date={date}&service_id=sv-60"
        )))
        .await
        .unwrap();
    let slots = body_json(res).await;
    let starts: Vec<String> = slots
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["start_time"].as_str().unwrap().to_string())
        .collect();
    assert!(!starts.contains(&"10:00:00".to_string()));
    assert!(!starts.contains(&"10:30:00".to_string()));
    assert!(starts.contains(&"11:00:00".to_string()));
}

#[tokio::test]
async fn test_availability_past_date_rejected() {
    let res = test_app(test_state())
        .oneshot(get_request("/api/availability?barber_id=bb-1&date=2020-01-01"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(res).await;
    assert_eq!(body["code"], "invalid_slot");
}

#[tokio::test]
async fn test_availability_bad_date_rejected() {
    let res = test_app(test_state())
        .oneshot(get_request("/api/availability?barber_id=bb-1&date=tomorrow"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

// ── Booking ──

#[tokio::test]
async fn test_booking_creates_pending_appointment() {
    let state = test_state();
    let date = future_date();

    let (status, apt) = book(&state, "+15551110000", "Alice", &date, "10:00", "sv-60").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(apt["status"], "pending");
    assert_eq!(apt["service_name"], "Cut and beard");
    assert_eq!(apt["price_cents"], 250000);
    assert_eq!(apt["duration_minutes"], 60);

    // readable back through the API
    let id = apt["id"].as_str().unwrap();
    let res = test_app(state)
        .oneshot(get_request(&format!("/api/appointments/{id}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_booking_conflict_and_adjacent() {
    let state = test_state();
    let date = future_date();

    let (status, _) = book(&state, "+15551110000", "Alice", &date, "10:00", "sv-60").await;
    assert_eq!(status, StatusCode::CREATED);

    // 10:30 overlaps the confirmed 10:00-11:00 hold
    let (status, body) = book(&state, "+15559990000", "Bob", &date, "10:30", "sv-60").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "slot_conflict");

    // 11:00 is adjacent and fine
    let (status, _) = book(&state, "+15559990000", "Bob", &date, "11:00", "sv-60").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_booking_same_slot_twice() {
    let state = test_state();
    let date = future_date();

    let (first, _) = book(&state, "+15551110000", "Alice", &date, "14:00", "sv-30").await;
    let (second, body) = book(&state, "+15559990000", "Bob", &date, "14:00", "sv-30").await;
    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["code"], "slot_conflict");
}

#[tokio::test]
async fn test_booking_outside_working_hours() {
    let state = test_state();
    let date = future_date();

    let (status, body) = book(&state, "+15551110000", "Alice", &date, "20:00", "sv-30").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "invalid_slot");
}

#[tokio::test]
async fn test_booking_past_date() {
    let state = test_state();
    let (status, body) = book(&state, "+15551110000", "Alice", "2020-06-15", "10:00", "sv-30").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "invalid_slot");
}

#[tokio::test]
async fn test_booking_unknown_service() {
    let state = test_state();
    let date = future_date();
    let (status, _) = book(&state, "+15551110000", "Alice", &date, "10:00", "sv-nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_booking_missing_fields() {
    let state = test_state();
    let date = future_date();
    let (status, _) = book(&state, "   ", "Alice", &date, "10:00", "sv-30").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_repeat_client_is_reused() {
    let state = test_state();
    let date = future_date();

    let (_, first) = book(&state, "+54 11 5555-0001", "Alice", &date, "10:00", "sv-30").await;
    let (_, second) = book(&state, "+5411 5555 0001", "Alice", &date, "11:00", "sv-30").await;
    assert_eq!(first["client_id"], second["client_id"]);
}

// ── My appointments / listings ──

#[tokio::test]
async fn test_client_history_by_phone() {
    let state = test_state();
    let date = future_date();

    book(&state, "+15551110000", "Alice", &date, "10:00", "sv-30").await;
    book(&state, "+15551110000", "Alice", &date, "15:00", "sv-30").await;
    book(&state, "+15559990000", "Bob", &date, "12:00", "sv-30").await;

    let res = test_app(state)
        .oneshot(get_request(
            "/api/appointments?phone=%2B15551110000&view=history",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let list = body_json(res).await;
    let list = list.as_array().unwrap().clone();
    assert_eq!(list.len(), 2);
    // history reads newest first
    assert_eq!(list[0]["start_time"], "15:00:00");
    assert_eq!(list[1]["start_time"], "10:00:00");
    assert!(list.iter().all(|v| v["client_phone"] == "+15551110000"));
}

#[tokio::test]
async fn test_listing_without_phone_requires_session() {
    let res = test_app(test_state())
        .oneshot(get_request("/api/appointments"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

// ── Transitions ──

#[tokio::test]
async fn test_barber_confirms_and_completes() {
    let state = test_state();
    let date = future_date();
    let token = login(&state).await;

    let (_, apt) = book(&state, "+15551110000", "Alice", &date, "10:00", "sv-30").await;
    let id = apt["id"].as_str().unwrap().to_string();

    let res = test_app(state.clone())
        .oneshot(authed_request(
            "PATCH",
            &format!("/api/appointments/{id}"),
            &token,
            Some(serde_json::json!({"status": "confirmed"})),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "confirmed");

    let res = test_app(state)
        .oneshot(authed_request(
            "PATCH",
            &format!("/api/appointments/{id}"),
            &token,
            Some(serde_json::json!({"status": "completed"})),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "completed");
}

#[tokio::test]
async fn test_confirm_requires_session() {
    let state = test_state();
    let date = future_date();

    let (_, apt) = book(&state, "+15551110000", "Alice", &date, "10:00", "sv-30").await;
    let id = apt["id"].as_str().unwrap();

    let res = test_app(state)
        .oneshot(json_request(
            "PATCH",
            &format!("/api/appointments/{id}"),
            serde_json::json!({"status": "confirmed"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_transition_rejected() {
    let state = test_state();
    let date = future_date();
    let token = login(&state).await;

    let (_, apt) = book(&state, "+15551110000", "Alice", &date, "10:00", "sv-30").await;
    let id = apt["id"].as_str().unwrap().to_string();

    // pending -> completed skips confirmation
    let res = test_app(state.clone())
        .oneshot(authed_request(
            "PATCH",
            &format!("/api/appointments/{id}"),
            &token,
            Some(serde_json::json!({"status": "completed"})),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await["code"], "invalid_transition");

    // the row is unchanged
    let res = test_app(state)
        .oneshot(get_request(&format!("/api/appointments/{id}")))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["status"], "pending");
}

#[tokio::test]
async fn test_client_cancels_future_appointment() {
    let state = test_state();
    let date = future_date();

    let (_, apt) = book(&state, "+15551110000", "Alice", &date, "10:00", "sv-30").await;
    let id = apt["id"].as_str().unwrap();

    // no session needed to cancel
    let res = test_app(state)
        .oneshot(json_request(
            "PATCH",
            &format!("/api/appointments/{id}"),
            serde_json::json!({"status": "cancelled"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "cancelled");
}

#[tokio::test]
async fn test_cancel_past_appointment_rejected() {
    let state = test_state();

    // seed a pending appointment that already started, bypassing the API
    let id = {
        let db = state.db.lock().unwrap();
        queries::create_client(
            &db,
            &barbershop::models::Client {
                id: "cl-past".to_string(),
                name: "Alice".to_string(),
                phone: "+15551110000".to_string(),
                created_at: Utc::now().naive_utc(),
            },
        )
        .unwrap();
        let yesterday = (Utc::now() - Duration::days(1)).naive_utc();
        let apt = barbershop::models::Appointment {
            id: "apt-past".to_string(),
            client_id: "cl-past".to_string(),
            barber_id: "bb-1".to_string(),
            service_id: "sv-30".to_string(),
            service_name: "Classic cut".to_string(),
            price_cents: 150000,
            duration_minutes: 30,
            date: yesterday.date(),
            start_time: yesterday.time(),
            status: barbershop::models::AppointmentStatus::Pending,
            notes: None,
            created_at: yesterday,
            updated_at: yesterday,
        };
        queries::insert_appointment(&db, &apt).unwrap();
        apt.id
    };

    let res = test_app(state)
        .oneshot(json_request(
            "PATCH",
            &format!("/api/appointments/{id}"),
            serde_json::json!({"status": "cancelled"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await["code"], "too_late_to_cancel");
}

#[tokio::test]
async fn test_cancelled_slot_can_be_rebooked() {
    let state = test_state();
    let date = future_date();

    let (_, apt) = book(&state, "+15551110000", "Alice", &date, "10:00", "sv-30").await;
    let id = apt["id"].as_str().unwrap();

    test_app(state.clone())
        .oneshot(json_request(
            "PATCH",
            &format!("/api/appointments/{id}"),
            serde_json::json!({"status": "cancelled"}),
        ))
        .await
        .unwrap();

    let (status, _) = book(&state, "+15559990000", "Bob", &date, "10:00", "sv-30").await;
    assert_eq!(status, StatusCode::CREATED);
}

// ── Auth & barber panel ──

#[tokio::test]
async fn test_login_wrong_password() {
    let res = test_app(test_state())
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({"email": "marcos@example.com", "password": "wrong"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_unknown_barber() {
    let state = test_state();
    // credentials pass upstream but no barber row matches
    let state2 = Arc::new(AppState {
        db: state.db.clone(),
        config: state.config.clone(),
        identity: Box::new(MockIdentity {
            accept: "ghost@example.com",
        }),
        events_tx: state.events_tx.clone(),
    });

    let res = test_app(state2)
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({"email": "ghost@example.com", "password": "hunter2"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_endpoint() {
    let state = test_state();
    let token = login(&state).await;

    let res = test_app(state.clone())
        .oneshot(authed_request("GET", "/api/auth/session", &token, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["barber"]["id"], "bb-1");

    let res = test_app(state)
        .oneshot(authed_request("GET", "/api/auth/session", "bogus-token", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_barber_day_view() {
    let state = test_state();
    let date = future_date();
    let token = login(&state).await;

    book(&state, "+15551110000", "Alice", &date, "15:00", "sv-30").await;
    book(&state, "+15559990000", "Bob", &date, "10:00", "sv-30").await;

    let res = test_app(state)
        .oneshot(authed_request(
            "GET",
            &format!("/api/barbers/bb-1/appointments?date={date}"),
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let day = body_json(res).await;
    let day = day.as_array().unwrap();
    assert_eq!(day.len(), 2);
    // earliest first
    assert_eq!(day[0]["start_time"], "10:00:00");
    assert_eq!(day[0]["client_name"], "Bob");
    assert_eq!(day[1]["start_time"], "15:00:00");
}

#[tokio::test]
async fn test_barber_day_requires_own_session() {
    let state = test_state();
    let date = future_date();
    let token = login(&state).await;

    let res = test_app(state)
        .oneshot(authed_request(
            "GET",
            &format!("/api/barbers/bb-2/appointments?date={date}"),
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_working_hours() {
    let state = test_state();
    let token = login(&state).await;

    let res = test_app(state.clone())
        .oneshot(authed_request(
            "PUT",
            "/api/barbers/bb-1/hours",
            &token,
            Some(serde_json::json!({
                "windows": [{"day": "mon", "start": "10:00", "end": "14:00"}]
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = test_app(state)
        .oneshot(get_request("/api/barbers/bb-1"))
        .await
        .unwrap();
    let barber = body_json(res).await;
    assert_eq!(barber["working_hours"]["windows"].as_array().unwrap().len(), 1);
    assert_eq!(barber["working_hours"]["windows"][0]["end"], "14:00");
}

#[tokio::test]
async fn test_update_working_hours_validates() {
    let state = test_state();
    let token = login(&state).await;

    let res = test_app(state)
        .oneshot(authed_request(
            "PUT",
            "/api/barbers/bb-1/hours",
            &token,
            Some(serde_json::json!({
                "windows": [{"day": "someday", "start": "10:00", "end": "14:00"}]
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
