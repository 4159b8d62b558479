//! Normalisation of analytics payloads into snapshot types.
//!
//! Upstream sends numbers either as JSON numbers or as numeric strings; both
//! are accepted and anything non-finite is dropped.

use crate::error::PipelineError;
use chrono::NaiveDate;
use finsight_protocol::{
    FundamentalRow, FundamentalsData, RankingData, RankingMetadata, RankingRow, TimeSeriesPoint,
};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Reads a finite number from a number or a numeric string.
pub fn numeric(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn date_of(row: &Value) -> Option<String> {
    match row.get("date")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn calendar_day(timestamp: &str) -> Option<NaiveDate> {
    let day = timestamp.get(..10).unwrap_or(timestamp);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn by_date(a: &TimeSeriesPoint, b: &TimeSeriesPoint) -> Ordering {
    match (calendar_day(&a.timestamp), calendar_day(&b.timestamp)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.timestamp.cmp(&b.timestamp),
    }
}

/// Extracts one entity's column from dated rows, sorted by date.
///
/// Rows without a date or without a usable value for `ticker` are skipped.
pub fn series_for(rows: &[Value], ticker: &str) -> Vec<TimeSeriesPoint> {
    let mut points: Vec<TimeSeriesPoint> = rows
        .iter()
        .filter_map(|row| {
            let timestamp = date_of(row)?;
            let value = numeric(row.get(ticker)?)?;
            Some(TimeSeriesPoint { timestamp, value })
        })
        .collect();
    points.sort_by(by_date);
    points
}

/// Splits a time-series payload into one series per ticker, in `tickers`
/// order.
pub fn parse_time_series(payload: &Value, tickers: &[String]) -> Vec<(String, Vec<TimeSeriesPoint>)> {
    let rows = payload
        .get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    tickers
        .iter()
        .map(|ticker| (ticker.clone(), series_for(rows, ticker)))
        .collect()
}

/// Parses ranked rows; rows are returned in rank order.
pub fn parse_ranking(payload: &Value) -> Result<RankingData, PipelineError> {
    let metadata: RankingMetadata = payload
        .get("metadata")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| PipelineError::Payload(format!("Invalid ranking metadata: {e}")))?
        .ok_or_else(|| PipelineError::Payload("Ranking payload has no metadata".into()))?;
    let rows = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::Payload("Invalid data format: expected data array".into()))?;

    let mut data: Vec<RankingRow> = rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let ticker = row.get("ticker")?.as_str()?.to_string();
            let metric = [metadata.metric.as_str(), "metric", "value"]
                .iter()
                .find_map(|key| row.get(*key).and_then(numeric))?;
            let rank = row
                .get("rank")
                .and_then(numeric)
                .map(|r| r as u32)
                .unwrap_or(index as u32 + 1);
            Some(RankingRow {
                ticker,
                metric,
                rank,
            })
        })
        .collect();
    data.sort_by_key(|row| row.rank);

    Ok(RankingData { data, metadata })
}

/// Parses per-period fundamentals; `report_period` is accepted as the
/// period key.
pub fn parse_fundamentals(payload: &Value) -> Result<FundamentalsData, PipelineError> {
    let rows = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::Payload("Invalid data format: expected data array".into()))?;

    let data = rows
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|row| {
            let ticker = row.get("ticker")?.as_str()?.to_string();
            let period = row.get("fiscal_period").or_else(|| row.get("report_period"))?;
            let fiscal_period = match period {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let metrics: BTreeMap<String, Value> = row
                .iter()
                .filter(|(key, _)| {
                    !matches!(key.as_str(), "ticker" | "fiscal_period" | "report_period")
                })
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Some(FundamentalRow {
                ticker,
                fiscal_period,
                metrics,
            })
        })
        .collect();

    Ok(FundamentalsData {
        data,
        metadata: payload
            .get("metadata")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default())),
    })
}
