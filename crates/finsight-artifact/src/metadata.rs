use finsight_protocol::{FinancialSnapshot, SnapshotStatus, TickerSeries, TimeSeriesPoint, ToolStage, ToolStatus};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// The last structured snapshot received, classified.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "variant", content = "value", rename_all = "camelCase")]
pub enum MetadataPayload {
    #[default]
    Empty,
    /// Per-entity series.
    TimeSeries(FinancialSnapshot),
    /// Universe ranking.
    Ranking(FinancialSnapshot),
    /// Per-period fundamentals.
    Fundamentals(FinancialSnapshot),
    /// A failed financial run.
    Error(FinancialSnapshot),
    /// Writing suggestions for a text document.
    Suggestions(Vec<Value>),
    /// Anything else, kept verbatim.
    Opaque(Value),
}

impl MetadataPayload {
    /// Classifies a `metadata` delta payload.
    pub fn from_value(value: Value) -> Self {
        if let Some(Value::Array(items)) = value.get("suggestions") {
            return MetadataPayload::Suggestions(items.clone());
        }
        if value.get("status").is_some_and(Value::is_string) {
            if let Ok(snapshot) = serde_json::from_value::<FinancialSnapshot>(value.clone()) {
                return if snapshot.status == SnapshotStatus::Error {
                    MetadataPayload::Error(snapshot)
                } else if snapshot.universe_data.is_some() {
                    MetadataPayload::Ranking(snapshot)
                } else if snapshot.fundamental_data.is_some() {
                    MetadataPayload::Fundamentals(snapshot)
                } else {
                    MetadataPayload::TimeSeries(snapshot)
                };
            }
        }
        if value.is_null() {
            MetadataPayload::Empty
        } else {
            MetadataPayload::Opaque(value)
        }
    }

    /// The financial snapshot, for the financial variants.
    pub fn snapshot(&self) -> Option<&FinancialSnapshot> {
        match self {
            MetadataPayload::TimeSeries(s)
            | MetadataPayload::Ranking(s)
            | MetadataPayload::Fundamentals(s)
            | MetadataPayload::Error(s) => Some(s),
            _ => None,
        }
    }
}

/// Artifact metadata.
///
/// `payload` is replaced wholesale by every `metadata` delta. The series and
/// tool-status maps are keyed stores that individual deltas merge into, so
/// concurrent tools and entities never clobber each other.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub payload: MetadataPayload,
    pub ticker_data: BTreeMap<String, Vec<TimeSeriesPoint>>,
    /// Known entity keys, first-seen order, no duplicates.
    pub tickers: Vec<String>,
    pub tool_status: BTreeMap<String, ToolStatus>,
}

impl ArtifactMetadata {
    fn remember(&mut self, ticker: &str) {
        if !self.tickers.iter().any(|t| t == ticker) {
            self.tickers.push(ticker.to_string());
        }
    }

    /// Replaces the payload; series carried by a financial snapshot are merged
    /// into the series store.
    pub fn replace(&mut self, value: Value) {
        let payload = MetadataPayload::from_value(value);
        if let Some(snapshot) = payload.snapshot() {
            for ticker in &snapshot.tickers {
                self.remember(ticker);
            }
            for (ticker, points) in &snapshot.ticker_data {
                self.ticker_data.insert(ticker.clone(), points.clone());
                self.remember(ticker);
            }
        }
        self.payload = payload;
    }

    /// Sets one entity's series.
    pub fn upsert_series(&mut self, series: &TickerSeries) {
        self.ticker_data
            .insert(series.ticker.clone(), series.data.clone());
        self.remember(&series.ticker);
    }

    /// Merges a status report into the entry for its tool.
    pub fn merge_tool_status(&mut self, incoming: &ToolStatus) {
        match self.tool_status.get_mut(&incoming.tool) {
            Some(current) => merge_status(current, incoming),
            None => {
                self.tool_status
                    .insert(incoming.tool.clone(), incoming.clone());
            }
        }
    }

    /// Whether any tool is currently in its error stage.
    pub fn has_tool_error(&self) -> bool {
        self.tool_status
            .values()
            .any(|s| s.stage == ToolStage::Error)
    }
}

fn merge_status(current: &mut ToolStatus, incoming: &ToolStatus) {
    let stage_changed = current.stage != incoming.stage;
    current.stage = incoming.stage;
    if incoming.progress.is_some() || stage_changed {
        current.progress = incoming.progress;
    }
    if incoming.message.is_some() || stage_changed {
        current.message = incoming.message.clone();
    }
    if incoming.stage == ToolStage::Error {
        current.error = incoming.error.clone();
        current.is_timeout = incoming.is_timeout;
        current.details = incoming.details.clone();
    } else {
        current.error = None;
        current.is_timeout = None;
        current.details = None;
    }
}
