use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One observation of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// Observation date as sent by upstream (usually `YYYY-MM-DD`).
    pub timestamp: String,
    pub value: f64,
}

/// Checkpoint a financial document is at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    #[default]
    Initial,
    Loading,
    Processing,
    Ready,
    Error,
}

/// One row of a ranking answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRow {
    pub ticker: String,
    /// Value of the ranked metric (named in [`RankingMetadata::metric`]).
    pub metric: f64,
    pub rank: u32,
}

/// Metadata sent alongside ranking rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RankingMetadata {
    pub metric: String,
    #[serde(default)]
    pub sort: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

/// Ranking result: rows ordered by rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingData {
    pub data: Vec<RankingRow>,
    pub metadata: RankingMetadata,
}

/// One fundamentals row: an entity's metrics for a reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalRow {
    pub ticker: String,
    pub fiscal_period: String,
    #[serde(flatten)]
    pub metrics: BTreeMap<String, serde_json::Value>,
}

/// Fundamentals result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsData {
    pub data: Vec<FundamentalRow>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl FundamentalsData {
    /// Metric names present in the rows, sorted.
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .data
            .iter()
            .flat_map(|row| row.metrics.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Full state of a financial tool run.
///
/// This is both the JSON stored as `Document.content` at every checkpoint and
/// the payload of the `metadata` delta sent when the run settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSnapshot {
    pub status: SnapshotStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tickers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default)]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ticker_data: BTreeMap<String, Vec<TimeSeriesPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub universe_data: Option<RankingData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fundamental_data: Option<FundamentalsData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_points: Option<usize>,
    #[serde(default)]
    pub visualization_ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_timeout: Option<bool>,
}

impl FinancialSnapshot {
    /// Snapshot at `status` for `session_id` with nothing else filled in.
    pub fn at(status: SnapshotStatus, session_id: impl Into<String>) -> Self {
        Self {
            status,
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    /// Error snapshot; written so that a reload shows the failure.
    pub fn failed(session_id: impl Into<String>, error: impl Into<String>, is_timeout: bool) -> Self {
        Self {
            error: Some(error.into()),
            is_timeout: Some(is_timeout),
            ..Self::at(SnapshotStatus::Error, session_id)
        }
    }

    /// Total number of points across all series.
    pub fn total_points(&self) -> usize {
        self.ticker_data.values().map(Vec::len).sum()
    }
}
