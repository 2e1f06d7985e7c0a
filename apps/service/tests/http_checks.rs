mod common;

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{OWNER_PHONE, RecordingDispatcher, engine};
use uppe_checks::database::{LibsqlStore, Namespace, RecordStore};
use uppe_checks::models::{Check, HttpMethod, Protocol};
use uppe_checks::monitoring::{CheckState, FailureReason, HttpChecker, ProbeOutcome, Prober};
use uppe_checks::validation::validate_check;

fn http_check(server: &MockServer, route: &str, method: HttpMethod, codes: Vec<u16>) -> Check {
    let host = server.uri().trim_start_matches("http://").to_string();
    Check::new(OWNER_PHONE, Protocol::Http, format!("{host}{route}"), method, codes, 2).unwrap()
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    Mock::given(path("/new")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let checker = HttpChecker::new().unwrap();
    let outcome = checker.probe(&http_check(&server, "/old", HttpMethod::Get, vec![200])).await;
    assert_eq!(outcome, ProbeOutcome::success(301));
}

#[tokio::test]
async fn test_method_is_sent_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let checker = HttpChecker::new().unwrap();
    let outcome = checker.probe(&http_check(&server, "/items/1", HttpMethod::Delete, vec![204])).await;
    assert_eq!(outcome, ProbeOutcome::success(204));
}

#[tokio::test]
async fn test_closed_port_is_connection_refused() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let check = Check::new(OWNER_PHONE, Protocol::Http, address.to_string(), HttpMethod::Get, vec![200], 2).unwrap();
    let outcome = HttpChecker::new().unwrap().probe(&check).await;
    assert_eq!(outcome, ProbeOutcome::failure(FailureReason::ConnectionRefused));
}

#[tokio::test]
async fn test_tick_against_live_endpoints_and_database() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/up")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    Mock::given(method("GET")).and(path("/broken")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

    let temp_dir = tempdir().unwrap();
    let store = Arc::new(LibsqlStore::open(temp_dir.path().join("checks.db"), 4).await.unwrap());

    let mut healthy = http_check(&server, "/up", HttpMethod::Get, vec![200]);
    healthy.state = CheckState::Down;
    healthy.last_checked_at = Some(Utc::now() - TimeDelta::minutes(1));
    let mut failing = http_check(&server, "/broken", HttpMethod::Get, vec![200]);
    failing.state = CheckState::Up;
    failing.last_checked_at = Some(Utc::now() - TimeDelta::minutes(1));

    for check in [&healthy, &failing] {
        store.create(Namespace::Checks, &check.id, &check.to_record()).await.unwrap();
    }

    let dispatcher = Arc::new(RecordingDispatcher::default());
    let engine = engine(store.clone(), Arc::new(HttpChecker::new().unwrap()), dispatcher.clone(), 10);

    let report = engine.run_tick().await;
    assert_eq!(report.probed, 2);
    assert_eq!(report.transitions, 2);
    assert_eq!(dispatcher.sent().len(), 2);

    for (check, expected) in [(&healthy, CheckState::Up), (&failing, CheckState::Down)] {
        let stored = validate_check(&store.read(Namespace::Checks, &check.id).await.unwrap()).unwrap();
        assert_eq!(stored.state, expected);
    }
}
