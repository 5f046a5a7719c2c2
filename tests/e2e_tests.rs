//! End-to-end tests of the collect and analyze pipeline
//!
//! A wiremock server stands in for the target endpoint; records go through a
//! real JSON-lines store in a temporary directory.

use std::sync::Arc;
use tempfile::TempDir;
use token_timing::{
    client::{retry::RetryPolicy, HttpTransport, Transport},
    executor::{PairedSampler, ProbeTarget, WarmupDriver},
    logging::Logger,
    models::Slot,
    stats::{Column, Metric, RankSumAnalyzer, SampleSelector},
    JsonLinesStore, SampleStore, TokenForge,
};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const PREFIX: &str = "AAAA";
const MISSING_LENGTH: usize = 3;

/// Mock endpoint answering 401 with a runtime header for both tokens
async fn start_target() -> MockServer {
    let server = MockServer::start().await;
    for (token, runtime) in [("AAAA100", "0.001200"), ("AAAA200", "0.001100")] {
        Mock::given(method("GET"))
            .and(path("/users/"))
            .and(header("authorization", format!("Token {}", token).as_str()))
            .respond_with(ResponseTemplate::new(401).insert_header("X-Runtime", runtime))
            .mount(&server)
            .await;
    }
    server
}

fn transport() -> Arc<dyn Transport> {
    Arc::new(HttpTransport::with_options(None, RetryPolicy::default(), Logger::silent()).unwrap())
}

fn target(server: &MockServer) -> ProbeTarget {
    ProbeTarget::new(format!("{}/users/", server.uri()))
}

#[test]
fn test_token_construction() {
    assert_eq!(TokenForge::build(PREFIX, "1", MISSING_LENGTH).unwrap().as_str(), "AAAA100");
    assert_eq!(TokenForge::build(PREFIX, "2", MISSING_LENGTH).unwrap().as_str(), "AAAA200");
}

#[tokio::test]
async fn test_collect_store_and_analyze() {
    let server = start_target().await;
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("samples.jsonl");

    {
        let mut store = JsonLinesStore::open_or_create(&store_path, &Logger::silent()).unwrap();
        let mut sampler = PairedSampler::new(transport(), target(&server), Logger::silent());
        let summary = sampler
            .collect(&mut store, "t1", PREFIX, "1", "2", MISSING_LENGTH, 50)
            .await
            .unwrap();

        assert_eq!(summary.records, 50);
        assert_eq!(summary.slot_0_first + summary.slot_1_first, 50);
    }

    // Fresh handle, as a separate analyze run would open it
    let store = JsonLinesStore::open_existing(&store_path, &Logger::silent()).unwrap();
    let records: Vec<_> = store
        .query_by_label("t1")
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(records.len(), 50);
    for record in &records {
        assert_eq!(record.test_label, "t1");
        assert_eq!(record.sample(Slot::Zero).token, "AAAA100");
        assert_eq!(record.sample(Slot::One).token, "AAAA200");
        assert_eq!(record.sample(Slot::Zero).status, 401);
        assert_eq!(record.sample(Slot::Zero).server_runtime.as_deref(), Some("0.001200"));
        assert_eq!(record.sample(Slot::One).server_runtime.as_deref(), Some("0.001100"));
    }

    let (zero, one) = Column::extract_pair(store.query_by_label("t1").unwrap(), Metric::Elapsed).unwrap();
    assert_eq!(zero.values.len(), 50);
    assert_eq!(one.values.len(), 50);

    let verdict = RankSumAnalyzer::new().compare(&zero.values, &one.values).unwrap();
    assert!(verdict.statistic.is_finite());
    assert!(verdict.p_value.is_finite());
    assert!((0.0..=1.0).contains(&verdict.p_value));

    // The runtime header differs by a constant, so the groups separate fully
    let (zero, one) = Column::extract_pair(store.query_by_label("t1").unwrap(), Metric::Runtime).unwrap();
    let verdict = RankSumAnalyzer::new().compare(&zero.values, &one.values).unwrap();
    assert!(verdict.statistic > 0.0);
    assert!(verdict.p_value <= 0.001);

    assert_eq!(server.received_requests().await.unwrap().len(), 100);
}

#[tokio::test]
async fn test_labels_are_kept_apart() {
    let server = start_target().await;
    let dir = TempDir::new().unwrap();
    let mut store = JsonLinesStore::open_or_create(dir.path().join("samples.jsonl"), &Logger::silent()).unwrap();

    let mut sampler = PairedSampler::new(transport(), target(&server), Logger::silent());
    sampler.collect(&mut store, "t1", PREFIX, "1", "2", MISSING_LENGTH, 10).await.unwrap();
    sampler.collect(&mut store, "t10", PREFIX, "2", "1", MISSING_LENGTH, 5).await.unwrap();

    assert_eq!(store.count("t1"), 10);
    assert_eq!(store.count("t10"), 5);
    assert_eq!(store.count("t"), 0);

    // Same token compared across labels, whichever slot carried it
    let selector = SampleSelector::Token("AAAA100".to_string());
    let a = Column::extract(store.query_by_label("t1").unwrap(), &selector, Metric::Elapsed).unwrap();
    let b = Column::extract(store.query_by_label("t10").unwrap(), &selector, Metric::Elapsed).unwrap();
    assert_eq!((a.values.len(), b.values.len()), (10, 5));
    assert!(RankSumAnalyzer::new().compare(&a.values, &b.values).is_ok());
}

#[tokio::test]
async fn test_warmup_then_collect() {
    let server = start_target().await;
    let dir = TempDir::new().unwrap();
    let mut store = JsonLinesStore::open_or_create(dir.path().join("samples.jsonl"), &Logger::silent()).unwrap();
    let transport = transport();

    let report = WarmupDriver::new(transport.clone(), target(&server), Logger::silent())
        .run(PREFIX, "1", "2", MISSING_LENGTH, 5)
        .await
        .unwrap();
    assert_eq!(report.sent, 10);
    assert_eq!(report.failed, 0);

    let mut sampler = PairedSampler::new(transport, target(&server), Logger::silent());
    sampler.collect(&mut store, "t1", PREFIX, "1", "2", MISSING_LENGTH, 5).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 20);

    // Warm-up sends every fail-token request before the success token
    let authorizations: Vec<_> = requests
        .iter()
        .take(10)
        .map(|r| r.headers.get("authorization").unwrap().to_str().unwrap().to_string())
        .collect();
    assert!(authorizations[..5].iter().all(|a| a == "Token AAAA200"));
    assert!(authorizations[5..].iter().all(|a| a == "Token AAAA100"));
}

#[tokio::test]
async fn test_server_error_statuses_are_still_samples() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut store = JsonLinesStore::open_or_create(dir.path().join("samples.jsonl"), &Logger::silent()).unwrap();
    let mut sampler = PairedSampler::new(transport(), target(&server), Logger::silent());
    sampler.collect(&mut store, "errors", PREFIX, "1", "2", MISSING_LENGTH, 4).await.unwrap();

    let records: Vec<_> = store.query_by_label("errors").unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.sample_0.status == 500 && r.sample_0.server_runtime.is_none()));

    // No runtime header anywhere: every record is skipped for that metric
    let (zero, _) = Column::extract_pair(store.query_by_label("errors").unwrap(), Metric::Runtime).unwrap();
    assert!(zero.values.is_empty());
    assert_eq!(zero.skipped, 4);
}
