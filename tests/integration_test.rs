//! Integration tests for Ruster Trace
//!
//! Every scenario runs against `InMemoryLedger`; nothing touches the network.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use ruster_trace::api::{create_router, AppState};
use ruster_trace::core::{CommunityType, SearchStrategy};
use ruster_trace::models::Direction;
use ruster_trace::providers::AddressRiskStatus;
use ruster_trace::{
    Address, AnalysisEngine, AnalyzerConfig, ExchangeRegistry, InMemoryLedger, LedgerClient,
};
use std::sync::Arc;
use tower::ServiceExt;

const T0: i64 = 1_700_000_000_000;

fn addr(tag: &str) -> Address {
    Address::parse(&format!("T{:A<33}", tag)).unwrap()
}

fn engine_with(ledger: Arc<InMemoryLedger>, exchanges: ExchangeRegistry) -> AnalysisEngine {
    AnalysisEngine::new(
        ledger,
        Arc::new(exchanges),
        AnalyzerConfig::default().without_delays(),
    )
}

#[tokio::test]
async fn test_bidirectional_meets_at_intermediate() {
    let (a, b, c, d) = (addr("A"), addr("B"), addr("C"), addr("D"));
    let ledger = Arc::new(
        InMemoryLedger::new()
            .with_transfer(a.as_str(), b.as_str(), 5_000.0, T0, "ab")
            .with_transfer(b.as_str(), c.as_str(), 5_000.0, T0 + 60_000, "bc")
            .with_transfer(b.as_str(), d.as_str(), 5_000.0, T0 + 120_000, "bd"),
    );
    let exchanges = ExchangeRegistry::from_entries([(d.clone(), "Test Exchange".to_string())]);
    let engine = engine_with(ledger, exchanges);

    let report = engine.analyze(&a, &c, 2).await.unwrap();

    assert_eq!(report.search_strategy, SearchStrategy::Bidirectional);
    let shortest = report.shortest_path.expect("path expected");
    assert_eq!(shortest.path.addresses(), &[a, b, c]);
    assert_eq!(shortest.hops, 2);
    assert_eq!(shortest.total_amount, 10_000.0);
    assert_eq!(shortest.transaction_count, 2);
    assert!(shortest.exchange_addresses.is_empty());
}

#[tokio::test]
async fn test_same_address_zero_ledger_calls() {
    let ledger = Arc::new(InMemoryLedger::new());
    let engine = engine_with(ledger.clone(), ExchangeRegistry::empty());
    let a = addr("A");

    let report = engine.analyze(&a, &a, 3).await.unwrap();

    assert_eq!(ledger.total_calls(), 0);
    assert_eq!(report.total_paths_found, 1);
    assert_eq!(report.paths[0].path.addresses(), &[a]);
}

#[tokio::test]
async fn test_each_history_fetched_at_most_once() {
    let (a, b, c, d) = (addr("A"), addr("B"), addr("C"), addr("D"));
    let ledger = Arc::new(
        InMemoryLedger::new()
            .with_transfer(a.as_str(), b.as_str(), 100.0, T0, "1")
            .with_transfer(b.as_str(), c.as_str(), 100.0, T0 + 1, "2")
            .with_transfer(a.as_str(), d.as_str(), 100.0, T0 + 2, "3")
            .with_transfer(d.as_str(), c.as_str(), 100.0, T0 + 3, "4")
            .with_transfer(c.as_str(), a.as_str(), 100.0, T0 + 4, "5"),
    );
    let engine = engine_with(ledger.clone(), ExchangeRegistry::empty());

    let report = engine.analyze(&a, &c, 3).await.unwrap();

    assert!(report.is_connected());
    assert_eq!(ledger.max_fetches_per_key(), 1);
    assert_eq!(ledger.fetch_count(a.as_str(), Direction::From), 1);
    assert_eq!(ledger.fetch_count(a.as_str(), Direction::Both), 1);
}

#[tokio::test]
async fn test_structuring_path_flagged() {
    let (a, b, c, d) = (addr("A"), addr("B"), addr("C"), addr("D"));
    let ledger = Arc::new(
        InMemoryLedger::new()
            .with_transfer(a.as_str(), b.as_str(), 9_500.0, T0, "s1")
            .with_transfer(b.as_str(), c.as_str(), 9_500.0, T0 + 3_600_000, "s2")
            .with_transfer(c.as_str(), d.as_str(), 9_500.0, T0 + 7_200_000, "s3"),
    );
    let engine = engine_with(ledger, ExchangeRegistry::empty());

    let report = engine.analyze(&a, &d, 3).await.unwrap();

    let path = report.shortest_path.expect("path expected");
    assert_eq!(path.hops, 3);
    assert!(path.risk.breakdown.structuring > 0.0);
    assert!(path
        .risk
        .warnings
        .iter()
        .any(|w| w.starts_with("📊 STRUCTURING DETECTED")));
    assert!((0.0..=100.0).contains(&path.risk.score));
}

#[tokio::test]
async fn test_exchange_shortcut_and_service_connection() {
    let (a, x, c) = (addr("A"), addr("X"), addr("C"));
    let ledger = Arc::new(
        InMemoryLedger::new()
            .with_transfer(a.as_str(), x.as_str(), 500.0, T0, "ax")
            .with_transfer(x.as_str(), c.as_str(), 450.0, T0 + 10, "xc"),
    );
    let exchanges = ExchangeRegistry::from_entries([(x.clone(), "Binance".to_string())]);
    let engine = engine_with(ledger, exchanges);

    let report = engine.analyze(&a, &c, 2).await.unwrap();

    assert_eq!(report.search_strategy, SearchStrategy::ExchangeShortcut);
    let path = &report.paths[0];
    assert_eq!(path.exchange_addresses, vec![x.clone()]);
    assert_eq!(path.risk.breakdown.exchange_connection, -5.0);
    assert!(report
        .service_connections
        .iter()
        .any(|s| s.address == x && s.service_name == "Binance"));
}

#[tokio::test]
async fn test_blacklisted_member_marks_community_blocked() {
    let (a, b, c) = (addr("A"), addr("B"), addr("C"));
    let ledger = Arc::new(
        InMemoryLedger::new()
            .with_transfer(a.as_str(), b.as_str(), 2_000.0, T0, "ab")
            .with_transfer(b.as_str(), c.as_str(), 2_000.0, T0 + 10, "bc")
            .with_risk_status(b.as_str(), AddressRiskStatus::blacklisted(100.0)),
    );
    let engine = engine_with(ledger, ExchangeRegistry::empty());

    let report = engine.analyze(&a, &c, 2).await.unwrap();

    assert_eq!(report.blocked_wallets.len(), 1);
    let blocked = report
        .communities
        .iter()
        .find(|c| c.addresses.contains(&b))
        .expect("community containing the blacklisted address");
    assert_eq!(blocked.community_type, CommunityType::Blocked);

    let path = report.shortest_path.unwrap();
    assert!(path.risk.score >= 50.0);
    assert!(path.risk.warnings[0].starts_with("🚫 BLACKLISTED ADDRESS"));
}

#[tokio::test]
async fn test_upstream_outage_degrades_instead_of_failing() {
    let (a, b, c) = (addr("A"), addr("B"), addr("C"));
    let ledger = Arc::new(
        InMemoryLedger::new()
            .with_transfer(a.as_str(), b.as_str(), 300.0, T0, "ab")
            .with_transfer(b.as_str(), c.as_str(), 300.0, T0 + 10, "bc")
            .with_failure(b.as_str()),
    );
    let engine = engine_with(ledger, ExchangeRegistry::empty());

    let report = engine.analyze(&a, &c, 2).await.unwrap();

    // B's own history is unavailable, but both edges are seen from A and C
    assert!(report.is_connected());
    assert!(report.blocked_wallets.is_empty());
}

#[tokio::test]
async fn test_fixture_replay() {
    let fixture = serde_json::json!({
        "transfers": [
            {"from": addr("A").as_str(), "to": addr("B").as_str(), "value": "25000000", "block_timestamp": T0, "transaction_id": "f1"},
            {"from": addr("B").as_str(), "to": addr("C").as_str(), "value": 25000000u64, "block_timestamp": T0 + 5, "transaction_id": "f2"},
            {"from": "not-an-address", "to": addr("C").as_str(), "value": "1", "block_timestamp": T0, "transaction_id": "bad"}
        ],
        "risk": {}
    });
    let path = std::env::temp_dir().join(format!("ruster_trace_fixture_{}.json", std::process::id()));
    std::fs::write(&path, fixture.to_string()).unwrap();

    let ledger = Arc::new(InMemoryLedger::load(&path).unwrap());
    std::fs::remove_file(&path).ok();
    let engine = engine_with(ledger, ExchangeRegistry::empty());

    let report = engine.analyze(&addr("A"), &addr("C"), 2).await.unwrap();
    let shortest = report.shortest_path.unwrap();
    assert_eq!(shortest.total_amount, 50.0);
}

// ============================================
// API boundary
// ============================================

fn test_app(ledger: Arc<InMemoryLedger>) -> axum::Router {
    let state = AppState::new(
        AnalyzerConfig::default().without_delays(),
        Arc::new(ExchangeRegistry::empty()),
        ledger as Arc<dyn LedgerClient>,
    );
    create_router(Arc::new(state))
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_api_rejects_invalid_address_before_engine() {
    let ledger = Arc::new(InMemoryLedger::new());
    let app = test_app(ledger.clone());

    let response = app
        .oneshot(post_json(
            "/v1/analyze",
            serde_json::json!({"source_address": "0x1234", "target_address": addr("B").as_str()}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(ledger.total_calls(), 0);
}

#[tokio::test]
async fn test_api_rejects_out_of_range_depth() {
    let ledger = Arc::new(InMemoryLedger::new());
    let app = test_app(ledger.clone());

    let response = app
        .oneshot(post_json(
            "/v1/analyze",
            serde_json::json!({
                "source_address": addr("A").as_str(),
                "target_address": addr("B").as_str(),
                "max_depth": 9
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ledger.total_calls(), 0);
}

#[tokio::test]
async fn test_api_analyze_returns_report() {
    let (a, b) = (addr("A"), addr("B"));
    let ledger = Arc::new(InMemoryLedger::new().with_transfer(a.as_str(), b.as_str(), 42.0, T0, "ab"));
    let app = test_app(ledger);

    let response = app
        .oneshot(post_json(
            "/v1/analyze",
            serde_json::json!({"source_address": a.as_str(), "target_address": b.as_str()}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["total_paths_found"], 1);
    assert_eq!(body["data"]["max_depth"], 2);
}

#[tokio::test]
async fn test_api_blacklist_check_is_cached() {
    let a = addr("A");
    let ledger = Arc::new(
        InMemoryLedger::new().with_risk_status(a.as_str(), AddressRiskStatus::blacklisted(70.0)),
    );
    let state = Arc::new(AppState::new(
        AnalyzerConfig::default().without_delays(),
        Arc::new(ExchangeRegistry::empty()),
        ledger.clone() as Arc<dyn LedgerClient>,
    ));
    let app = create_router(state);

    let first = app
        .clone()
        .oneshot(post_json("/v1/blacklist/check", serde_json::json!({"address": a.as_str()})))
        .await
        .unwrap();
    let first = body_json(first).await;
    assert_eq!(first["data"]["is_blacklisted"], true);
    assert_eq!(first["data"]["cached"], false);

    let second = app
        .oneshot(post_json("/v1/blacklist/check", serde_json::json!({"address": a.as_str()})))
        .await
        .unwrap();
    let second = body_json(second).await;
    assert_eq!(second["data"]["cached"], true);
    assert_eq!(ledger.risk_calls(), 1);
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = test_app(Arc::new(InMemoryLedger::new()));
    for uri in ["/health", "/v1/health"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
