//! Integration tests for the funnels, admin viewer and terminal front-end
//! against a mock registration service.
//!
//! Each test spins up an Axum server on a random port and drives the real
//! `reqwest` client through it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use cohort_funnel::admin::AdminSession;
use cohort_funnel::api::{AdminApi, HttpClient, RegistrationApi};
use cohort_funnel::cli::Console;
use cohort_funnel::config::FunnelConfig;
use cohort_funnel::error::{AdminError, FunnelError, SubmissionError};
use cohort_funnel::funnel::{
    Confirmation, EntryMode, LaunchpadAction, LaunchpadFunnel, LaunchpadStep, Outcome,
    SoulmateAction, SoulmateFunnel, SoulmateStep, Transition,
};
use cohort_funnel::store::{LibSqlStore, MemoryStore, SessionStore, session_keys};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state of the mock registration service.
#[derive(Default)]
struct Backend {
    admin_secret: Mutex<String>,
    registrations: Mutex<Vec<Value>>,
    /// Number of upcoming Soulmate requests to stall past the client timeout.
    stall_next: AtomicUsize,
}

async fn register(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    if backend
        .stall_next
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    match body["email"].as_str() {
        Some("full@example.com") => Json(json!({
            "success": false,
            "message": "All cohorts are currently full. Please join the waitlist."
        }))
        .into_response(),
        Some("crash@example.com") => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error\n").into_response()
        }
        _ => {
            backend.registrations.lock().unwrap().push(body);
            Json(json!({
                "success": true,
                "message": "Registration successful!",
                "clan_name": "Clan Alpha",
                "whatsapp_link": "https://chat.whatsapp.com/alpha"
            }))
            .into_response()
        }
    }
}

async fn register_launchpad(
    State(backend): State<Arc<Backend>>,
    Json(body): Json<Value>,
) -> Response {
    if body["email"]
        .as_str()
        .is_some_and(|email| email.ends_with("@blocked.test"))
    {
        return (StatusCode::FORBIDDEN, "Eligibility criteria not met\n").into_response();
    }
    backend.registrations.lock().unwrap().push(body);
    Json(json!({
        "message": "Registration successful",
        "whatsapp_link": "https://chat.whatsapp.com/couples",
        "telegram_link": "https://t.me/couples"
    }))
    .into_response()
}

fn authorized(backend: &Backend, headers: &HeaderMap) -> bool {
    let expected = backend.admin_secret.lock().unwrap().clone();
    !expected.is_empty()
        && headers
            .get("X-Admin-Secret")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|given| given == expected)
}

async fn admin_stats(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !authorized(&backend, &headers) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized Access\n").into_response();
    }
    Json(json!([
        {"id": 1, "name": "Clan Alpha", "current_count": 20, "max_capacity": 20},
        {"id": 2, "name": "Clan Beta", "current_count": 3, "max_capacity": 20}
    ]))
    .into_response()
}

async fn admin_participants(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&backend, &headers) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized Access\n").into_response();
    }
    match params.get("clan_id").map(String::as_str) {
        Some("1") => Json(json!([{
            "id": "7f9c",
            "full_name": "Ada Obi",
            "email": "ada@example.com",
            "whatsapp_number": "+2348000000000",
            "gender": "female",
            "country": "Nigeria",
            "state": "Lagos",
            "age_group": "26-30",
            "religion": "Christian",
            "church_name": "",
            "instagram_handle": "@ada",
            "relationship_status": "single",
            "clan_id": 1
        }]))
        .into_response(),
        // An empty clan comes back as `null`.
        Some(_) => Json(Value::Null).into_response(),
        None => (StatusCode::BAD_REQUEST, "Missing clan_id parameter\n").into_response(),
    }
}

/// Start the mock service on a random port, return (base_url, backend).
async fn start_server() -> (String, Arc<Backend>) {
    let backend = Arc::new(Backend::default());
    *backend.admin_secret.lock().unwrap() = "s3cret".to_string();

    let app = Router::new()
        .route("/api/register", post(register))
        .route("/api/launchpad/register", post(register_launchpad))
        .route("/api/admin/stats", get(admin_stats))
        .route("/api/admin/participants", get(admin_participants))
        .with_state(Arc::clone(&backend));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), backend)
}

fn client(base_url: &str) -> Arc<HttpClient> {
    Arc::new(HttpClient::new(base_url, Duration::from_millis(500)))
}

async fn fill_soulmate(funnel: &SoulmateFunnel, email: &str) {
    funnel.act(SoulmateAction::Start).await.unwrap();
    funnel
        .act(SoulmateAction::AnswerAttendance { attended_before: false })
        .await
        .unwrap();
    funnel
        .act(SoulmateAction::AnswerFeedback { will_give_feedback: true })
        .await
        .unwrap();
    for (field, value) in [
        ("full_name", "Ada Obi"),
        ("email", email),
        ("whatsapp_number", "+2348000000000"),
        ("gender", "female"),
        ("country", "Nigeria"),
        ("state", "Lagos"),
        ("age_group", "26-30"),
        ("religion", "Christian"),
        ("instagram_handle", "@ada"),
        ("relationship_status", "single"),
    ] {
        funnel.record_field(field, value).await.unwrap();
    }
    funnel.act(SoulmateAction::Continue).await.unwrap();
}

async fn fill_launchpad(funnel: &LaunchpadFunnel, email: &str) {
    funnel.act(LaunchpadAction::Start).await.unwrap();
    for (field, value) in [
        ("full_name", "Tobi Ade"),
        ("email", email),
        ("whatsapp_number", "+2348011111111"),
        ("country_city", "Nigeria, Ibadan"),
    ] {
        funnel.record_field(field, value).await.unwrap();
    }
    funnel.act(LaunchpadAction::FollowSocial).await.unwrap();
    funnel.act(LaunchpadAction::Next).await.unwrap();
    funnel.record_field("wedding_date", "2027-04-17").await.unwrap();
    funnel.record_field("spouse_name", "Kemi Ade").await.unwrap();
    funnel.act(LaunchpadAction::Next).await.unwrap();
    funnel.record_field("agreed_to_feedback", true).await.unwrap();
    funnel.record_field("agreed_to_participation", true).await.unwrap();
}

#[tokio::test]
async fn soulmate_happy_path_ends_in_clan_alpha() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, backend) = start_server().await;
        let store: Arc<dyn SessionStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let funnel = SoulmateFunnel::open(store.clone(), client(&base_url), EntryMode::Applicant).await;

        fill_soulmate(&funnel, "ada@example.com").await;
        assert_eq!(funnel.step().await, SoulmateStep::SocialLock);

        // Completing before following only shows the advisory.
        let blocked = funnel.act(SoulmateAction::Complete).await.unwrap();
        assert!(matches!(blocked, Transition::Blocked(ref r) if r.message == "Please follow to continue"));
        assert_eq!(funnel.step().await, SoulmateStep::SocialLock);

        funnel.act(SoulmateAction::FollowSocial).await.unwrap();
        let done = funnel.act(SoulmateAction::Complete).await.unwrap();
        assert_eq!(done, Transition::Advanced(SoulmateStep::Success));

        let state = funnel.state().await;
        assert_eq!(state.outcome, Outcome::Accepted("Clan Alpha".into()));
        assert_eq!(
            state.confirmation,
            Some(Confirmation::Clan {
                clan_name: "Clan Alpha".into(),
                whatsapp_link: "https://chat.whatsapp.com/alpha".into(),
            })
        );

        let sent = backend.registrations.lock().unwrap()[0].clone();
        assert_eq!(sent["email"], "ada@example.com");
        assert_eq!(sent["age_group"], "26-30");
        assert_eq!(sent["church_name"], "");

        // A restart lands back on the success screen.
        let reopened = SoulmateFunnel::open(store, client(&base_url), EntryMode::Applicant).await;
        assert_eq!(reopened.state().await.outcome.detail(), Some("Clan Alpha"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn soulmate_full_cohort_is_rejected_with_server_message() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, _backend) = start_server().await;
        let funnel =
            SoulmateFunnel::open(Arc::new(MemoryStore::new()), client(&base_url), EntryMode::Applicant)
                .await;
        fill_soulmate(&funnel, "full@example.com").await;
        funnel.act(SoulmateAction::FollowSocial).await.unwrap();

        funnel.act(SoulmateAction::Complete).await.unwrap();
        let state = funnel.state().await;
        assert_eq!(state.step, SoulmateStep::Rejected);
        assert_eq!(
            state.outcome.detail(),
            Some("All cohorts are currently full. Please join the waitlist.")
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn timeout_then_retry_sends_identical_application() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, backend) = start_server().await;
        backend.stall_next.store(1, Ordering::SeqCst);
        let funnel =
            SoulmateFunnel::open(Arc::new(MemoryStore::new()), client(&base_url), EntryMode::Applicant)
                .await;
        fill_soulmate(&funnel, "ada@example.com").await;
        funnel.act(SoulmateAction::FollowSocial).await.unwrap();
        let before = funnel.state().await;

        let err = funnel.act(SoulmateAction::Complete).await.unwrap_err();
        match err {
            FunnelError::Submission(e) => {
                assert!(matches!(e, SubmissionError::Timeout(_)));
                assert_eq!(e.user_message(), "Network error. Please try again later.");
            }
            other => panic!("expected a submission error, got {other:?}"),
        }
        assert_eq!(funnel.state().await, before);

        funnel.act(SoulmateAction::Complete).await.unwrap();
        assert_eq!(funnel.step().await, SoulmateStep::Success);
        assert_eq!(
            backend.registrations.lock().unwrap()[0]["full_name"],
            before.form_data.unwrap().full_name.as_str()
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unreachable_service_and_server_errors_are_retryable() {
    timeout(TEST_TIMEOUT, async {
        // Bind and drop to get a port nobody is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
        drop(listener);

        let funnel =
            SoulmateFunnel::open(Arc::new(MemoryStore::new()), client(&dead), EntryMode::Applicant)
                .await;
        fill_soulmate(&funnel, "ada@example.com").await;
        funnel.act(SoulmateAction::FollowSocial).await.unwrap();
        assert!(matches!(
            funnel.act(SoulmateAction::Complete).await,
            Err(FunnelError::Submission(SubmissionError::Network(_)))
        ));
        assert_eq!(funnel.step().await, SoulmateStep::SocialLock);

        let (base_url, _backend) = start_server().await;
        let funnel =
            SoulmateFunnel::open(Arc::new(MemoryStore::new()), client(&base_url), EntryMode::Applicant)
                .await;
        fill_soulmate(&funnel, "crash@example.com").await;
        funnel.act(SoulmateAction::FollowSocial).await.unwrap();
        let err = funnel.act(SoulmateAction::Complete).await.unwrap_err();
        assert!(matches!(
            err,
            FunnelError::Submission(SubmissionError::Server { status: 500, .. })
        ));
        assert_eq!(funnel.step().await, SoulmateStep::SocialLock);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn launchpad_wire_format_and_links() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, backend) = start_server().await;
        let funnel =
            LaunchpadFunnel::open(Arc::new(MemoryStore::new()), client(&base_url), Duration::from_secs(4))
                .await;
        fill_launchpad(&funnel, "tobi@example.com").await;

        let transition = funnel.act(LaunchpadAction::Next).await.unwrap();
        assert_eq!(transition, Transition::Advanced(LaunchpadStep::Success));
        assert_eq!(
            funnel.state().await.confirmation,
            Some(Confirmation::Couples {
                whatsapp_link: "https://chat.whatsapp.com/couples".into(),
                telegram_link: "https://t.me/couples".into(),
            })
        );

        let sent = backend.registrations.lock().unwrap()[0].clone();
        assert_eq!(sent["gender"], "Female");
        assert_eq!(sent["partner_registered"], "No");
        assert_eq!(sent["wedding_date"], "2027-04-17");
        assert_eq!(sent["agreed_to_participation"], true);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn launchpad_forbidden_is_a_terminal_decline() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, _backend) = start_server().await;
        let funnel =
            LaunchpadFunnel::open(Arc::new(MemoryStore::new()), client(&base_url), Duration::from_secs(4))
                .await;
        fill_launchpad(&funnel, "tobi@blocked.test").await;

        funnel.act(LaunchpadAction::Next).await.unwrap();
        let state = funnel.state().await;
        assert_eq!(state.step, LaunchpadStep::Rejected);
        assert_eq!(state.outcome.detail(), Some("Eligibility criteria not met"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn admin_login_drilldown_and_revocation() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, backend) = start_server().await;
        let store = Arc::new(MemoryStore::new());
        let mut session = AdminSession::new(client(&base_url), store.clone());

        assert_eq!(
            session.login(SecretString::from("guess")).await.unwrap_err(),
            AdminError::Unauthorized
        );

        let stats = session.login(SecretString::from("s3cret")).await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].status_label(), "FULL");
        assert_eq!(stats[1].fill_percentage(), 15);

        let people = session.participants(1).await.unwrap();
        assert_eq!(people[0].full_name, "Ada Obi");
        assert!(session.participants(2).await.unwrap().is_empty());

        // A fresh session picks up the persisted secret.
        let mut resumed = AdminSession::new(client(&base_url), store.clone());
        assert_eq!(resumed.restore().await, Ok(true));
        assert_eq!(resumed.overview().registered, 23);

        // Rotating the secret server-side logs the session out and clears storage.
        *backend.admin_secret.lock().unwrap() = "rotated".to_string();
        assert_eq!(resumed.refresh().await.unwrap_err(), AdminError::Unauthorized);
        assert!(!resumed.is_logged_in());
        assert_eq!(store.load(session_keys::ADMIN_SECRET).await.unwrap(), None);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn admin_api_reports_offline_service() {
    let api = HttpClient::new("http://127.0.0.1:9", Duration::from_millis(300));
    let err = timeout(TEST_TIMEOUT, api.clan_stats(&SecretString::from("s3cret")))
        .await
        .expect("test timed out")
        .unwrap_err();
    assert!(matches!(err, AdminError::Network(_)));
}

#[tokio::test]
async fn registration_api_is_usable_directly() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, _backend) = start_server().await;
        let api = HttpClient::new(base_url.clone(), Duration::from_secs(1));
        let funnel =
            SoulmateFunnel::open(Arc::new(MemoryStore::new()), client(&base_url), EntryMode::Applicant)
                .await;
        fill_soulmate(&funnel, "ada@example.com").await;
        let application = funnel.state().await.form_data.unwrap();

        let confirmation = api.register_soulmate(&application).await.unwrap();
        assert_eq!(confirmation.summary(), "Clan Alpha");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn console_walks_soulmate_flow_to_success() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, _backend) = start_server().await;
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let api = client(&base_url);
        let funnel = SoulmateFunnel::open(store.clone(), api.clone(), EntryMode::Applicant).await;
        let mut admin = AdminSession::new(api, store);

        let script = [
            "",                // welcome
            "n",               // attended before?
            "y",               // will give feedback?
            "Ada Obi",
            "ada@example.com",
            "+2348000000000",
            "female",
            "Nigeria",
            "Lagos",
            "26-30",
            "Christian",
            "@ada",
            "",                // church name
            "single",
            "2",               // complete without following
            "1",               // follow
            "2",               // complete
            "q",
        ]
        .join("\n");
        let mut console = Console::new(script.as_bytes(), Vec::new());
        console
            .run_soulmate(&funnel, &mut admin, &FunnelConfig::default())
            .await
            .unwrap();

        let printed = String::from_utf8(console.into_writer()).unwrap();
        assert!(printed.contains("Please follow to continue"));
        assert!(printed.contains("You have been assigned to Clan Alpha."));
        assert_eq!(funnel.step().await, SoulmateStep::Success);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn console_shows_gatekeeper_rejection() {
    timeout(TEST_TIMEOUT, async {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let api = client("http://127.0.0.1:9");
        let funnel = SoulmateFunnel::open(store.clone(), api.clone(), EntryMode::Applicant).await;
        let mut admin = AdminSession::new(api, store);

        let mut console = Console::new("\ny\nq\n".as_bytes(), Vec::new());
        console
            .run_soulmate(&funnel, &mut admin, &FunnelConfig::default())
            .await
            .unwrap();

        let printed = String::from_utf8(console.into_writer()).unwrap();
        assert!(printed.contains("Thank you for your truthfulness!"));
        assert_eq!(funnel.step().await, SoulmateStep::Rejected);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn console_admin_mode_lists_clans() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, _backend) = start_server().await;
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let api = client(&base_url);
        let funnel = SoulmateFunnel::open(store.clone(), api.clone(), EntryMode::Admin).await;
        let mut admin = AdminSession::new(api, store);

        let mut console = Console::new("wrong\ns3cret\n1\nq\n".as_bytes(), Vec::new());
        console
            .run_soulmate(&funnel, &mut admin, &FunnelConfig::default())
            .await
            .unwrap();

        let printed = String::from_utf8(console.into_writer()).unwrap();
        assert!(printed.contains("Invalid Secret Key"));
        assert!(printed.contains("FULL"));
        assert!(printed.contains("Participants in clan 1 (1)"));
        assert!(admin.is_logged_in());
    })
    .await
    .expect("test timed out");
}
