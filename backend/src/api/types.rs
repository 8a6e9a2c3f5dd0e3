//! JSON bodies of the HTTP API.

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::query::{DateWindow, DimensionOptions, NotReady, QueryOutcome, QueryResponse};

/// Status of a query envelope: "ready", "not_ready" or "error".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Ready,
    NotReady,
    Error,
}

/// Response body of `POST /api/query`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEnvelope {
    /// Unique request identifier, echoed in server logs
    pub request_id: String,

    pub status: QueryStatus,

    /// Present when ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResponse>,

    /// Present when not ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<NotReady>,

    /// Human-readable reason or error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<QueryOutcome> for QueryEnvelope {
    fn from(outcome: QueryOutcome) -> Self {
        let request_id = Uuid::new_v4().to_string();
        match outcome {
            QueryOutcome::Ready(response) => Self {
                request_id,
                status: QueryStatus::Ready,
                result: Some(response),
                reason: None,
                message: None,
            },
            QueryOutcome::NotReady(reason) => Self {
                request_id,
                status: QueryStatus::NotReady,
                message: Some(reason.to_string()),
                reason: Some(reason),
                result: None,
            },
            QueryOutcome::Error(error) => Self {
                request_id,
                status: QueryStatus::Error,
                result: None,
                reason: None,
                message: Some(error.to_string()),
            },
        }
    }
}

/// Response body of `GET /api/options`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsResponse {
    /// Earliest and latest order date; absent for an empty fact table
    pub date_bounds: Option<DateWindow>,
    pub dimensions: DimensionOptions,
    pub quick_ranges: Vec<&'static str>,
    pub default_top_n: usize,
}

/// Create an error body outside the query envelope (bad JSON and the like).
pub fn error_response(error: &str) -> Value {
    json!({
        "requestId": Uuid::new_v4().to_string(),
        "status": "error",
        "message": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use chrono::NaiveDate;

    #[test]
    fn test_not_ready_envelope() {
        let envelope = QueryEnvelope::from(QueryOutcome::NotReady(NotReady::MissingStartDate));
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["status"], "not_ready");
        assert_eq!(json["reason"]["kind"], "missing_start_date");
        assert_eq!(json["message"], "start date not set");
        assert!(json.get("result").is_none());
        assert_eq!(json["requestId"].as_str().unwrap().len(), 36);
    }

    #[test]
    fn test_error_envelope() {
        let outcome = QueryOutcome::Error(QueryError::InvertedWindow {
            start: NaiveDate::from_ymd_opt(2017, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2017, 2, 1).unwrap(),
        });
        let json = serde_json::to_value(QueryEnvelope::from(outcome)).unwrap();

        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Start date 2017-03-01 is after end date 2017-02-01");
    }

    #[test]
    fn test_error_response_shape() {
        let body = error_response("bad json");
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "bad json");
    }
}
