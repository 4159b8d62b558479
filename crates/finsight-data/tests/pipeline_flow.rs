#![allow(clippy::unwrap_used, clippy::expect_used)]

use finsight_data::{
    AnalyticsClient, AnalyticsConfig, DocumentTarget, FinancialPipeline, PipelineError,
};
use finsight_protocol::{
    Delta, DeltaSink, FinancialSnapshot, SnapshotStatus, StreamRecord, ToolStage,
};
use finsight_store::{DocumentStore, InMemoryStore};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pipeline(server: &MockServer) -> FinancialPipeline {
    FinancialPipeline::new(AnalyticsClient::new(AnalyticsConfig {
        base_url: server.uri(),
        timeout_ms: 2_000,
        max_retries: 3,
        retry_delay_ms: 5,
        chunk_size: 100,
        chunk_delay_ms: 0,
    }))
}

fn drain(rx: &mut UnboundedReceiver<StreamRecord>) -> Vec<Delta> {
    let mut deltas = Vec::new();
    while let Ok(record) = rx.try_recv() {
        if let StreamRecord::Data(delta) = record {
            deltas.push(delta);
        }
    }
    deltas
}

fn stages(deltas: &[Delta]) -> Vec<ToolStage> {
    deltas
        .iter()
        .filter_map(|d| match d {
            Delta::ToolStatus(status) => Some(status.stage),
            _ => None,
        })
        .collect()
}

fn final_metadata(deltas: &[Delta]) -> FinancialSnapshot {
    deltas
        .iter()
        .rev()
        .find_map(|d| match d {
            Delta::Metadata(value) => Some(serde_json::from_value(value.clone()).unwrap()),
            _ => None,
        })
        .expect("metadata delta")
}

#[tokio::test]
async fn test_multi_entity_series_streams_and_checkpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process_query"))
        .and(body_partial_json(json!({"query": "AAPL price last year", "timeRange": "1y"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "tickers": ["AAPL"],
            "result_path": "results/aapl.parquet",
            "presigned_url": format!("{}/results/aapl", server.uri()),
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/results/aapl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"date": "2024-01-03", "AAPL": 184.25},
            {"date": "2024-01-02", "AAPL": 185.64}
        ]})))
        .mount(&server)
        .await;

    let store = InMemoryStore::new();
    let (sink, mut rx) = DeltaSink::channel();
    let target = DocumentTarget::new(Uuid::new_v4(), "user-1");

    let snapshot = pipeline(&server)
        .run_query("AAPL price last year", "1y", &target, &sink, &store)
        .await
        .unwrap();

    assert_eq!(snapshot.status, SnapshotStatus::Ready);
    assert!(snapshot.visualization_ready);
    assert_eq!(snapshot.ticker_data["AAPL"][0].timestamp, "2024-01-02");

    let deltas = drain(&mut rx);
    assert_eq!(deltas[0], Delta::Id(target.id.to_string()));
    assert_eq!(deltas.last(), Some(&Delta::Finish));
    let tickers: Vec<_> = deltas
        .iter()
        .filter_map(|d| match d {
            Delta::TickerData(series) => Some(series.ticker.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(tickers, ["AAPL"]);
    assert_eq!(
        stages(&deltas),
        [ToolStage::Loading, ToolStage::Processing, ToolStage::Ready]
    );
    let streamed = final_metadata(&deltas);
    assert_eq!(streamed.status, SnapshotStatus::Ready);
    assert!(streamed.visualization_ready);

    let versions = store.document_versions(target.id).await.unwrap();
    let statuses: Vec<SnapshotStatus> = versions
        .iter()
        .map(|doc| serde_json::from_str::<FinancialSnapshot>(&doc.content).unwrap().status)
        .collect();
    assert_eq!(
        statuses,
        [SnapshotStatus::Loading, SnapshotStatus::Processing, SnapshotStatus::Ready]
    );
    assert_eq!(versions[2].title, "Financial Data: AAPL");
}

#[tokio::test]
async fn test_failing_service_is_attempted_exactly_three_times() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process_query"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let store = InMemoryStore::new();
    let (sink, mut rx) = DeltaSink::channel();
    let target = DocumentTarget::new(Uuid::new_v4(), "user-1");

    let err = pipeline(&server)
        .run_query("AAPL", "1y", &target, &sink, &store)
        .await
        .unwrap_err();

    match &err {
        PipelineError::Fetch(failure) => {
            assert_eq!(failure.attempts, 3);
            assert!(!failure.is_timeout);
        }
        other => panic!("Expected fetch failure, got {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "Failed after 3 attempts: API request failed with status 500"
    );

    let deltas = drain(&mut rx);
    assert_eq!(deltas.last(), Some(&Delta::Finish));
    let error_status = deltas
        .iter()
        .find_map(|d| match d {
            Delta::ToolStatus(s) if s.stage == ToolStage::Error => Some(s.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(error_status.is_timeout, Some(false));
    assert!(error_status.details.is_some());

    let saved = store.get_document(target.id).await.unwrap().unwrap();
    let snapshot: FinancialSnapshot = serde_json::from_str(&saved.content).unwrap();
    assert_eq!(snapshot.status, SnapshotStatus::Error);
    assert!(snapshot.error.unwrap().contains("3 attempts"));
}

#[tokio::test]
async fn test_slow_service_reports_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process_query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "success"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let pipeline = FinancialPipeline::new(AnalyticsClient::new(AnalyticsConfig {
        base_url: server.uri(),
        timeout_ms: 50,
        max_retries: 2,
        retry_delay_ms: 1,
        ..AnalyticsConfig::default()
    }));
    let store = InMemoryStore::new();
    let (sink, mut rx) = DeltaSink::channel();
    let target = DocumentTarget::new(Uuid::new_v4(), "user-1");

    let err = pipeline
        .run_query("AAPL", "1y", &target, &sink, &store)
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    let failed = final_metadata(&drain(&mut rx));
    assert_eq!(failed.status, SnapshotStatus::Error);
    assert_eq!(failed.is_timeout, Some(true));
}

#[tokio::test]
async fn test_service_error_status_is_retried_with_its_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process_query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "error": {"message": "Unknown ticker ZZZZ"}
        })))
        .expect(3)
        .mount(&server)
        .await;

    let store = InMemoryStore::new();
    let (sink, _rx) = DeltaSink::channel();
    let target = DocumentTarget::new(Uuid::new_v4(), "user-1");
    let err = pipeline(&server)
        .run_query("ZZZZ", "1y", &target, &sink, &store)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Failed after 3 attempts: Unknown ticker ZZZZ");
}

#[tokio::test]
async fn test_fundamentals_payload_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process_query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "tickers": ["AAPL"],
            "presigned_url": format!("{}/results/fundamentals", server.uri()),
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/results/fundamentals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"ticker": "AAPL", "fiscal_period": "2024-Q1", "revenue": 90753000000_u64},
            {"ticker": "AAPL", "fiscal_period": "2024-Q2", "revenue": 85777000000_u64}
        ]})))
        .mount(&server)
        .await;

    let store = InMemoryStore::new();
    let (sink, mut rx) = DeltaSink::channel();
    let target = DocumentTarget::new(Uuid::new_v4(), "user-1");
    let snapshot = pipeline(&server)
        .run_query("AAPL revenue by quarter", "1y", &target, &sink, &store)
        .await
        .unwrap();

    let fundamentals = snapshot.fundamental_data.unwrap();
    assert_eq!(fundamentals.data.len(), 2);
    assert_eq!(fundamentals.metric_names(), ["revenue"]);
    assert!(snapshot.ticker_data.is_empty());
    assert!(!drain(&mut rx)
        .iter()
        .any(|d| matches!(d, Delta::TickerData(_))));
}

#[tokio::test]
async fn test_legacy_shape_reports_chunked_progress() {
    let server = MockServer::start().await;
    let rows: Vec<_> = (0..250)
        .map(|i| json!({"date": format!("2023-{:02}-{:02}", i / 28 + 1, i % 28 + 1), "TSLA": 200.0 + f64::from(i)}))
        .collect();
    Mock::given(method("POST"))
        .and(path("/process_query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "query": {"symbol": "TSLA"},
            "data": rows,
        })))
        .mount(&server)
        .await;

    let store = InMemoryStore::new();
    let (sink, mut rx) = DeltaSink::channel();
    let target = DocumentTarget::new(Uuid::new_v4(), "user-1");
    let snapshot = pipeline(&server)
        .run_query("TSLA", "1y", &target, &sink, &store)
        .await
        .unwrap();
    assert_eq!(snapshot.symbol.as_deref(), Some("TSLA"));
    assert_eq!(snapshot.data_points, Some(250));

    let progress: Vec<usize> = drain(&mut rx)
        .iter()
        .filter_map(|d| match d {
            Delta::ToolStatus(s) => s.progress.map(|p| p.loaded),
            _ => None,
        })
        .collect();
    assert_eq!(progress, [100, 200, 250]);
}

#[tokio::test]
async fn test_ranking_from_universe_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process_universe_query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "presigned_url": format!("{}/results/ranking", server.uri()),
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/results/ranking"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"ticker": "NVDA", "total_return": 1.9, "rank": 2},
                {"ticker": "SMCI", "total_return": 2.4, "rank": 1}
            ],
            "metadata": {"metric": "total_return", "sort": "desc", "length": 2}
        })))
        .mount(&server)
        .await;

    let store = InMemoryStore::new();
    let (sink, mut rx) = DeltaSink::channel();
    let target = DocumentTarget::new(Uuid::new_v4(), "user-1");
    let snapshot = pipeline(&server)
        .run_ranking("top 2 stocks this year", &target, &sink, &store)
        .await
        .unwrap();

    assert_eq!(snapshot.tickers, ["SMCI", "NVDA"]);
    assert_eq!(snapshot.universe_data.unwrap().metadata.metric, "total_return");
    let deltas = drain(&mut rx);
    assert!(deltas.contains(&Delta::Title("Universe Ranking: top 2 stocks this year".into())));
    assert_eq!(deltas.last(), Some(&Delta::Finish));

    let statuses: Vec<SnapshotStatus> = store
        .document_versions(target.id)
        .await
        .unwrap()
        .iter()
        .map(|doc| serde_json::from_str::<FinancialSnapshot>(&doc.content).unwrap().status)
        .collect();
    assert_eq!(
        statuses,
        [SnapshotStatus::Loading, SnapshotStatus::Processing, SnapshotStatus::Ready]
    );
}

#[tokio::test]
async fn test_unsupported_shape_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process_query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success", "rows": []})))
        .expect(1)
        .mount(&server)
        .await;

    let store = InMemoryStore::new();
    let (sink, _rx) = DeltaSink::channel();
    let target = DocumentTarget::new(Uuid::new_v4(), "user-1");
    let err = pipeline(&server)
        .run_query("???", "1y", &target, &sink, &store)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedShape(_)));
}

#[tokio::test]
async fn test_disconnected_client_still_persists_ready_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process_query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "query": {"symbol": "MSFT"},
            "data": [{"date": "2024-01-02", "MSFT": 370.87}],
        })))
        .mount(&server)
        .await;

    let store = InMemoryStore::new();
    let (sink, rx) = DeltaSink::channel();
    drop(rx);
    let target = DocumentTarget::new(Uuid::new_v4(), "user-1");
    pipeline(&server)
        .run_query("MSFT", "1y", &target, &sink, &store)
        .await
        .unwrap();

    let saved = store.get_document(target.id).await.unwrap().unwrap();
    let snapshot: FinancialSnapshot = serde_json::from_str(&saved.content).unwrap();
    assert_eq!(snapshot.status, SnapshotStatus::Ready);
}
