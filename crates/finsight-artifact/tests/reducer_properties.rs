#![allow(clippy::unwrap_used, clippy::expect_used)]

use finsight_artifact::{ArtifactStatus, ChatTurn, Fold};
use finsight_protocol::{
    status, ArtifactKind, Delta, TickerSeries, TimeSeriesPoint, ToolStage, ToolStatus,
};
use serde_json::json;

fn series(ticker: &str, base: f64) -> Delta {
    Delta::TickerData(TickerSeries {
        ticker: ticker.into(),
        data: (0..3)
            .map(|i| TimeSeriesPoint {
                timestamp: format!("2024-01-0{}", i + 2),
                value: base + f64::from(i),
            })
            .collect(),
    })
}

/// Every ordering of `items` (Heap's algorithm).
fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    fn heap<T: Clone>(k: usize, items: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
        if k <= 1 {
            out.push(items.clone());
            return;
        }
        for i in 0..k {
            heap(k - 1, items, out);
            let j = if k % 2 == 0 { i } else { 0 };
            items.swap(j, k - 1);
        }
    }
    let mut out = Vec::new();
    heap(items.len(), &mut items.to_vec(), &mut out);
    out
}

#[test]
fn test_reasoning_fold_is_last_writer_wins() {
    let buffer = "User wants AAPL prices for 2024 and a chart.";
    let snapshots: Vec<String> = (1..=buffer.len())
        .step_by(7)
        .map(|n| buffer[..n].to_string())
        .chain(std::iter::once(buffer.to_string()))
        .collect();

    let mut all = ChatTurn::default();
    all.apply_all(snapshots.iter().cloned().map(Delta::ReasoningChunk));

    let mut last_only = ChatTurn::default();
    last_only.apply(Delta::ReasoningChunk(buffer.into()));

    let mut duplicated = ChatTurn::default();
    for snapshot in &snapshots {
        duplicated.apply(Delta::ReasoningChunk(snapshot.clone()));
        duplicated.apply(Delta::ReasoningChunk(snapshot.clone()));
    }

    assert_eq!(all.reasoning(), buffer);
    assert_eq!(last_only.reasoning(), buffer);
    assert_eq!(duplicated.reasoning(), buffer);
}

#[test]
fn test_ticker_data_is_order_independent() {
    let tickers = vec![
        series("AAPL", 185.0),
        series("MSFT", 370.0),
        series("NVDA", 48.0),
        series("TSLA", 248.0),
    ];

    let mut results = Vec::new();
    for ordering in permutations(&tickers) {
        let mut turn = ChatTurn::default();
        turn.apply(Delta::Id("doc-1".into()));
        turn.apply(Delta::Kind(ArtifactKind::Financial));
        let mut ordering = ordering.into_iter();
        turn.apply(ordering.next().unwrap());
        turn.apply(Delta::ToolStatus(
            ToolStatus::new("financial_series", ToolStage::Processing),
        ));
        turn.apply(ordering.next().unwrap());
        turn.apply(Delta::Title("Financial Data: AAPL, MSFT, NVDA, TSLA".into()));
        for rest in ordering {
            turn.apply(rest);
        }
        results.push(turn.artifact().metadata.ticker_data.clone());
    }

    assert_eq!(results.len(), 24);
    assert!(results.iter().all(|r| *r == results[0]));
    assert_eq!(results[0].len(), 4);
}

#[test]
fn test_finish_is_monotonic() {
    let mut turn = ChatTurn::default();
    turn.apply_all([
        Delta::Id("doc-1".into()),
        Delta::Kind(ArtifactKind::Financial),
        series("AAPL", 185.0),
        Delta::Finish,
    ]);
    let settled = turn.artifact().clone();
    assert_eq!(settled.status, ArtifactStatus::Idle);

    let late = [
        Delta::Id("doc-1".into()),
        series("MSFT", 370.0),
        Delta::Metadata(json!({"status": "loading", "sessionId": "s"})),
        Delta::Clear,
        Delta::Finish,
    ];
    for delta in late {
        assert_eq!(turn.apply(delta), Fold::Ignored);
        assert_eq!(turn.artifact(), &settled);
    }
}

#[test]
fn test_full_financial_turn() {
    let mut turn = ChatTurn::default();
    turn.apply_all([
        Delta::status(status::REASONING_START),
        Delta::ReasoningChunk("User wants AAPL".into()),
        Delta::status(status::REASONING_COMPLETE),
        Delta::Id("doc-1".into()),
        Delta::Kind(ArtifactKind::Financial),
        Delta::Title("Financial Data: AAPL price last year".into()),
        Delta::ToolStatus(ToolStatus::new("financial_series", ToolStage::Loading)),
        series("AAPL", 185.0),
        Delta::Metadata(json!({
            "status": "ready",
            "tickers": ["AAPL"],
            "sessionId": "s",
            "visualizationReady": true
        })),
        Delta::ToolStatus(ToolStatus::new("financial_series", ToolStage::Ready)),
        Delta::Finish,
        Delta::status(status::RESPONDING),
    ]);

    let artifact = turn.artifact();
    assert_eq!(artifact.status, ArtifactStatus::Idle);
    assert!(artifact.is_visible);
    assert!(artifact.derived.chart_ready);
    assert_eq!(artifact.metadata.tickers, ["AAPL"]);
    assert_eq!(artifact.metadata.ticker_data["AAPL"].len(), 3);
    assert_eq!(
        artifact.metadata.tool_status["financial_series"].stage,
        ToolStage::Ready
    );
    assert_eq!(turn.phase(), Some(status::RESPONDING));
}
