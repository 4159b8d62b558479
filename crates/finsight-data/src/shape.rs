use crate::error::PipelineError;
use serde_json::Value;
use tracing::debug;

/// A recognised answer from the analytics service.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// Inline ranking rows plus ranking metadata.
    Ranking {
        /// The answer itself; parsed by [`crate::parse::parse_ranking`].
        payload: Value,
    },
    /// Several entities whose data sits behind a presigned URL.
    MultiEntity {
        tickers: Vec<String>,
        result_path: Option<String>,
        presigned_url: String,
        session_id: Option<String>,
    },
    /// One entity with its rows inline.
    Legacy { symbol: String, rows: Vec<Value> },
}

type Detector = fn(&Value) -> Option<ResponseShape>;

/// Detectors in priority order; the first match wins.
const DETECTORS: [(&str, Detector); 3] = [
    ("ranking", detect_ranking),
    ("multi-entity", detect_multi_entity),
    ("legacy", detect_legacy),
];

/// Classifies a service answer.
pub fn detect_shape(response: &Value) -> Result<ResponseShape, PipelineError> {
    for (name, detector) in DETECTORS {
        if let Some(shape) = detector(response) {
            debug!(shape = name, "Recognised analytics response");
            return Ok(shape);
        }
    }
    let keys = match response.as_object() {
        Some(map) => map.keys().cloned().collect::<Vec<_>>().join(", "),
        None => "not an object".to_string(),
    };
    Err(PipelineError::UnsupportedShape(format!("keys: {keys}")))
}

fn is_ranking_payload(value: &Value) -> bool {
    let has_metric = value
        .pointer("/metadata/metric")
        .is_some_and(Value::is_string);
    let first_row_ranked = value
        .get("data")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .is_some_and(|row| row.get("rank").is_some());
    has_metric && first_row_ranked
}

fn detect_ranking(value: &Value) -> Option<ResponseShape> {
    is_ranking_payload(value).then(|| ResponseShape::Ranking {
        payload: value.clone(),
    })
}

fn detect_multi_entity(value: &Value) -> Option<ResponseShape> {
    let tickers = value
        .get("tickers")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect::<Vec<_>>();
    let presigned_url = value.get("presigned_url")?.as_str()?.to_string();
    Some(ResponseShape::MultiEntity {
        tickers,
        result_path: value
            .get("result_path")
            .and_then(Value::as_str)
            .map(str::to_string),
        presigned_url,
        session_id: value
            .get("session_id")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn detect_legacy(value: &Value) -> Option<ResponseShape> {
    let symbol = value.pointer("/query/symbol")?.as_str()?.to_string();
    let rows = value.get("data")?.as_array()?.clone();
    Some(ResponseShape::Legacy { symbol, rows })
}

/// What a downloaded result payload contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Dated rows with one column per entity.
    TimeSeries,
    /// Per-period reported metrics.
    Fundamentals,
    /// Ranked rows plus ranking metadata.
    Ranking,
}

impl PayloadKind {
    /// Peeks at the first row to decide how to parse a payload.
    pub fn of(payload: &Value) -> Self {
        if is_ranking_payload(payload) {
            return PayloadKind::Ranking;
        }
        let first = payload
            .get("data")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first());
        match first {
            Some(row) if row.get("fiscal_period").is_some() || row.get("report_period").is_some() => {
                PayloadKind::Fundamentals
            }
            _ => PayloadKind::TimeSeries,
        }
    }
}
