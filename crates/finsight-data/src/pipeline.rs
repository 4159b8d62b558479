use crate::client::AnalyticsClient;
use crate::error::PipelineError;
use crate::parse::{parse_fundamentals, parse_ranking, parse_time_series, series_for};
use crate::shape::{detect_shape, PayloadKind, ResponseShape};
use finsight_protocol::{
    ArtifactKind, Delta, DeltaSink, FinancialSnapshot, SnapshotStatus, TickerSeries, ToolStage,
    ToolStatus,
};
use finsight_store::{Document, Storage};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Tool name reported by series/fundamentals runs.
pub const SERIES_TOOL: &str = "financial_series";
/// Tool name reported by ranking runs.
pub const RANKING_TOOL: &str = "ranking";

const RANKING_SUMMARY_ROWS: usize = 10;

/// The document a pipeline run writes to.
#[derive(Debug, Clone)]
pub struct DocumentTarget {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub user_id: String,
}

impl DocumentTarget {
    /// A fresh document in `chat_id`.
    pub fn new(chat_id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            user_id: user_id.into(),
        }
    }
}

/// State shared by every stage of one run.
struct Run<'a> {
    tool: &'static str,
    title: String,
    session_id: String,
    target: &'a DocumentTarget,
    sink: &'a DeltaSink,
    store: &'a dyn Storage,
    detached: bool,
}

impl<'a> Run<'a> {
    fn open(
        tool: &'static str,
        title: String,
        target: &'a DocumentTarget,
        sink: &'a DeltaSink,
        store: &'a dyn Storage,
    ) -> Self {
        Self {
            tool,
            title,
            session_id: target.chat_id.to_string(),
            target,
            sink,
            store,
            detached: false,
        }
    }

    fn emit(&mut self, delta: Delta) {
        if !self.sink.send(delta) && !self.detached {
            self.detached = true;
            debug!(tool = self.tool, document_id = %self.target.id, "Client gone, continuing without streaming");
        }
    }

    fn status(&mut self, status: ToolStatus) {
        self.emit(Delta::ToolStatus(status));
    }

    fn emit_snapshot(&mut self, snapshot: &FinancialSnapshot) {
        match Delta::metadata(snapshot) {
            Ok(delta) => self.emit(delta),
            Err(e) => warn!(document_id = %self.target.id, error = %e, "Failed to encode snapshot"),
        }
    }

    fn retitle(&mut self, title: String) {
        if title != self.title {
            self.title = title;
            self.emit(Delta::Title(self.title.clone()));
        }
    }

    async fn begin(&mut self) {
        self.emit(Delta::Id(self.target.id.to_string()));
        self.emit(Delta::Kind(ArtifactKind::Financial));
        self.emit(Delta::Title(self.title.clone()));
        self.status(ToolStatus::new(self.tool, ToolStage::Loading));
        let initial = FinancialSnapshot::at(SnapshotStatus::Loading, self.session_id.clone());
        self.checkpoint(&initial).await;
    }

    async fn save(&self, snapshot: &FinancialSnapshot) -> Result<(), PipelineError> {
        let content = serde_json::to_string(snapshot).map_err(finsight_core::FinsightError::from)?;
        let document = Document::new(
            self.target.id,
            self.target.chat_id,
            self.title.clone(),
            ArtifactKind::Financial,
            self.target.user_id.clone(),
            content,
        );
        self.store.save_document(&document).await?;
        Ok(())
    }

    /// Best-effort intermediate checkpoint.
    async fn checkpoint(&self, snapshot: &FinancialSnapshot) {
        if let Err(e) = self.save(snapshot).await {
            warn!(document_id = %self.target.id, status = ?snapshot.status, error = %e, "Failed to checkpoint document");
        }
    }

    async fn settle(
        mut self,
        outcome: Result<FinancialSnapshot, PipelineError>,
    ) -> Result<FinancialSnapshot, PipelineError> {
        match outcome {
            Ok(snapshot) => {
                info!(
                    tool = self.tool,
                    document_id = %self.target.id,
                    tickers = ?snapshot.tickers,
                    data_points = snapshot.data_points.unwrap_or_default(),
                    "Financial data ready"
                );
                self.emit_snapshot(&snapshot);
                let message = format!("Processed {} data points", snapshot.data_points.unwrap_or_default());
                self.status(ToolStatus::new(self.tool, ToolStage::Ready).with_message(message));
                self.emit(Delta::Finish);
                Ok(snapshot)
            }
            Err(e) => {
                let is_timeout = e.is_timeout();
                warn!(tool = self.tool, document_id = %self.target.id, error = %e, is_timeout, "Financial data run failed");
                let failed = FinancialSnapshot::failed(self.session_id.clone(), e.to_string(), is_timeout);
                self.checkpoint(&failed).await;
                self.status(ToolStatus::failed(self.tool, e.to_string(), is_timeout));
                self.emit_snapshot(&failed);
                self.emit(Delta::Finish);
                Err(e)
            }
        }
    }
}

/// Fetches financial data for one tool call, streams it and checkpoints the
/// document at loading, processing, ready and error.
///
/// Every run ends with a `finish` delta, success or not. A disconnected client
/// does not stop the run; the final snapshot is still persisted.
#[derive(Debug, Clone)]
pub struct FinancialPipeline {
    client: AnalyticsClient,
}

impl FinancialPipeline {
    pub fn new(client: AnalyticsClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AnalyticsClient {
        &self.client
    }

    /// Series or fundamentals for a natural-language query.
    pub async fn run_query(
        &self,
        query: &str,
        time_range: &str,
        target: &DocumentTarget,
        sink: &DeltaSink,
        store: &dyn Storage,
    ) -> Result<FinancialSnapshot, PipelineError> {
        let mut run = Run::open(SERIES_TOOL, format!("Financial Data: {query}"), target, sink, store);
        run.begin().await;
        let outcome = self.query_stages(&mut run, query, time_range).await;
        run.settle(outcome).await
    }

    /// A ranking over the supported universe.
    pub async fn run_ranking(
        &self,
        query: &str,
        target: &DocumentTarget,
        sink: &DeltaSink,
        store: &dyn Storage,
    ) -> Result<FinancialSnapshot, PipelineError> {
        let mut run = Run::open(RANKING_TOOL, format!("Universe Ranking: {query}"), target, sink, store);
        run.begin().await;
        let outcome = self.ranking_stages(&mut run, query).await;
        run.settle(outcome).await
    }

    async fn query_stages(
        &self,
        run: &mut Run<'_>,
        query: &str,
        time_range: &str,
    ) -> Result<FinancialSnapshot, PipelineError> {
        let response = self
            .client
            .process_query(query, time_range, &run.session_id)
            .await?;

        let snapshot = match detect_shape(&response)? {
            ResponseShape::Ranking { payload } => {
                let mut snapshot = FinancialSnapshot::at(SnapshotStatus::Processing, run.session_id.clone());
                apply_ranking(&mut snapshot, &payload)?;
                snapshot
            }
            ResponseShape::MultiEntity {
                tickers,
                result_path,
                presigned_url,
                session_id,
            } => {
                if !tickers.is_empty() {
                    run.retitle(format!("Financial Data: {}", tickers.join(", ")));
                }
                let mut snapshot = FinancialSnapshot::at(
                    SnapshotStatus::Processing,
                    session_id.unwrap_or_else(|| run.session_id.clone()),
                );
                snapshot.tickers = tickers;
                snapshot.result_path = result_path;
                run.checkpoint(&snapshot).await;
                run.status(
                    ToolStatus::new(run.tool, ToolStage::Processing)
                        .with_message("Fetching and processing data..."),
                );

                let payload = self.client.fetch_payload(&presigned_url).await?;
                self.apply_payload(run, &mut snapshot, &payload)?;
                snapshot
            }
            ResponseShape::Legacy { symbol, rows } => {
                run.retitle(format!("Financial Data: {symbol}"));
                let mut snapshot = FinancialSnapshot::at(SnapshotStatus::Processing, run.session_id.clone());
                snapshot.symbol = Some(symbol.clone());
                snapshot.tickers = vec![symbol.clone()];
                snapshot.data_points = Some(rows.len());
                run.checkpoint(&snapshot).await;

                let points = series_for(&rows, &symbol);
                self.report_chunks(run, points.len()).await;
                run.emit(Delta::TickerData(TickerSeries {
                    ticker: symbol.clone(),
                    data: points.clone(),
                }));
                snapshot.ticker_data.insert(symbol, points);
                snapshot.data_points = Some(snapshot.total_points());
                snapshot
            }
        };

        self.finish(run, snapshot).await
    }

    async fn ranking_stages(
        &self,
        run: &mut Run<'_>,
        query: &str,
    ) -> Result<FinancialSnapshot, PipelineError> {
        let response = self
            .client
            .process_universe_query(query, &run.session_id)
            .await?;

        let payload = match detect_shape(&response) {
            Ok(ResponseShape::Ranking { payload }) => payload,
            _ => {
                let url = response
                    .get("presigned_url")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        PipelineError::Payload("No presigned_url returned from universe query".into())
                    })?;
                let processing = FinancialSnapshot::at(SnapshotStatus::Processing, run.session_id.clone());
                run.checkpoint(&processing).await;
                run.status(
                    ToolStatus::new(run.tool, ToolStage::Processing)
                        .with_message("Fetching ranking data..."),
                );
                self.client.fetch_payload(url).await?
            }
        };

        if PayloadKind::of(&payload) != PayloadKind::Ranking {
            return Err(PipelineError::UnsupportedShape(
                "expected ranking rows with ranking metadata".into(),
            ));
        }
        let mut snapshot = FinancialSnapshot::at(SnapshotStatus::Processing, run.session_id.clone());
        apply_ranking(&mut snapshot, &payload)?;
        self.finish(run, snapshot).await
    }

    fn apply_payload(
        &self,
        run: &mut Run<'_>,
        snapshot: &mut FinancialSnapshot,
        payload: &Value,
    ) -> Result<(), PipelineError> {
        match PayloadKind::of(payload) {
            PayloadKind::Fundamentals => {
                let fundamentals = parse_fundamentals(payload)?;
                debug!(rows = fundamentals.data.len(), "Parsed fundamentals payload");
                snapshot.data_points = Some(fundamentals.data.len());
                snapshot.fundamental_data = Some(fundamentals);
            }
            PayloadKind::Ranking => apply_ranking(snapshot, payload)?,
            PayloadKind::TimeSeries => {
                for (ticker, points) in parse_time_series(payload, &snapshot.tickers) {
                    if points.is_empty() {
                        warn!(ticker = %ticker, "No data points for ticker");
                        continue;
                    }
                    run.emit(Delta::TickerData(TickerSeries {
                        ticker: ticker.clone(),
                        data: points.clone(),
                    }));
                    snapshot.ticker_data.insert(ticker, points);
                }
                if snapshot.ticker_data.is_empty() {
                    return Err(PipelineError::Payload(format!(
                        "No data points found for {}",
                        snapshot.tickers.join(", ")
                    )));
                }
                snapshot.data_points = Some(snapshot.total_points());
            }
        }
        Ok(())
    }

    /// Reports progress for a single-entity series in fixed-size chunks.
    async fn report_chunks(&self, run: &mut Run<'_>, total: usize) {
        let config = self.client.config();
        let chunk_size = config.chunk_size.max(1);
        let delay = Duration::from_millis(config.chunk_delay_ms);
        let mut loaded = 0;
        while loaded < total {
            if run.sink.is_closed() {
                debug!(loaded, total, "Client gone, skipping progress reports");
                break;
            }
            loaded = (loaded + chunk_size).min(total);
            run.status(ToolStatus::new(run.tool, ToolStage::Processing).with_progress(loaded, total));
            tokio::time::sleep(delay).await;
        }
    }

    async fn finish(
        &self,
        run: &mut Run<'_>,
        mut snapshot: FinancialSnapshot,
    ) -> Result<FinancialSnapshot, PipelineError> {
        snapshot.status = SnapshotStatus::Ready;
        snapshot.visualization_ready = true;
        run.save(&snapshot).await?;
        Ok(snapshot)
    }
}

fn apply_ranking(snapshot: &mut FinancialSnapshot, payload: &Value) -> Result<(), PipelineError> {
    let ranking = parse_ranking(payload)?;
    snapshot.tickers = ranking.data.iter().map(|row| row.ticker.clone()).collect();
    snapshot.data_points = Some(ranking.data.len());
    snapshot.universe_data = Some(ranking);
    Ok(())
}

/// Compact result handed back to the model after a successful run.
///
/// The full data lives in the document; the model gets enough to describe it.
pub fn tool_summary(document_id: Uuid, snapshot: &FinancialSnapshot) -> Value {
    let mut summary = json!({
        "kind": "financial",
        "documentId": document_id.to_string(),
        "success": true,
        "tickers": snapshot.tickers,
        "dataPoints": snapshot.data_points.unwrap_or_default(),
    });

    let message = if let Some(ranking) = &snapshot.universe_data {
        let top: Vec<Value> = ranking
            .data
            .iter()
            .take(RANKING_SUMMARY_ROWS)
            .map(|row| json!({"rank": row.rank, "ticker": row.ticker, "value": row.metric}))
            .collect();
        summary["ranking"] = json!({
            "metric": ranking.metadata.metric,
            "sort": ranking.metadata.sort,
            "top": top,
        });
        format!("Successfully ranked {} entities by {}", ranking.data.len(), ranking.metadata.metric)
    } else if let Some(fundamentals) = &snapshot.fundamental_data {
        summary["fundamentals"] = json!({
            "metrics": fundamentals.metric_names(),
            "rows": fundamentals.data.len(),
        });
        format!("Successfully processed fundamentals for: {}", snapshot.tickers.join(", "))
    } else {
        let mut series = Map::new();
        for (ticker, points) in &snapshot.ticker_data {
            let (Some(first), Some(last)) = (points.first(), points.last()) else {
                continue;
            };
            let change_pct = (first.value != 0.0).then(|| (last.value / first.value - 1.0) * 100.0);
            series.insert(
                ticker.clone(),
                json!({
                    "start": first.timestamp,
                    "end": last.timestamp,
                    "first": first.value,
                    "last": last.value,
                    "changePct": change_pct,
                }),
            );
        }
        summary["series"] = Value::Object(series);
        format!("Successfully processed data for tickers: {}", snapshot.tickers.join(", "))
    };
    summary["message"] = Value::String(message);
    summary
}
