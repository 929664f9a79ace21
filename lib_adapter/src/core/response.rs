//! # Response Wire Shapes
//!
//! The response payload written to the cache and handed to callers. Field
//! names follow the established camelCase wire format; absent optionals are
//! omitted entirely rather than serialized as null.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current wall-clock time as Unix milliseconds.
pub fn unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Acquisition timestamps attached to every response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamps {
    /// When the upstream request was initiated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_data_requested_unix_ms: Option<i64>,
    /// When the upstream data arrived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_data_received_unix_ms: Option<i64>,
    /// Timestamp the provider itself attached to the data, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_indicated_time_unix_ms: Option<i64>,
}

impl Timestamps {
    /// True when no field is set; such a block is omitted from the wire.
    pub fn is_empty(&self) -> bool {
        self.provider_data_requested_unix_ms.is_none()
            && self.provider_data_received_unix_ms.is_none()
            && self.provider_indicated_time_unix_ms.is_none()
    }

    /// Request/receive pair both stamped with the current time, for sources
    /// where fetch and receipt happen in one call.
    pub fn requested_and_received_now() -> Self {
        let now = unix_ms();
        Self {
            provider_data_requested_unix_ms: Some(now),
            provider_data_received_unix_ms: Some(now),
            provider_indicated_time_unix_ms: None,
        }
    }

    /// Receipt-only stamp, for push sources that carry no provider-side time.
    pub fn received_now() -> Self {
        Self {
            provider_data_received_unix_ms: Some(unix_ms()),
            ..Self::default()
        }
    }
}

/// The `data` envelope of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    /// Endpoint-specific result payload.
    pub result: Value,
}

/// Full response payload as written to the cache and returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterResponse {
    /// HTTP-ish status of the answer (200 for data, 502 for upstream errors).
    pub status_code: u16,
    /// Aggregate result (string for balances, number for prices).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Detailed result envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    /// Human-readable reason when the answer is an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Acquisition timestamps; omitted when empty.
    #[serde(default, skip_serializing_if = "Timestamps::is_empty")]
    pub timestamps: Timestamps,
}

impl AdapterResponse {
    /// A 200 response carrying `result` plus the `data.result` detail payload.
    pub fn success(result: Value, data_result: Value, timestamps: Timestamps) -> Self {
        Self {
            status_code: 200,
            result: Some(result),
            data: Some(ResponseData { result: data_result }),
            error_message: None,
            timestamps,
        }
    }

    /// An error response with no data payload.
    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            result: None,
            data: None,
            error_message: Some(message.into()),
            timestamps: Timestamps::default(),
        }
    }

    /// The 502 shape used for provider failures.
    pub fn upstream_error(message: impl Into<String>) -> Self {
        Self::error(502, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_serializes_to_the_camel_case_wire_shape() {
        let response = AdapterResponse::success(
            json!(1272.12),
            json!(1272.12),
            Timestamps {
                provider_data_received_unix_ms: Some(1_672_531_200_000),
                ..Timestamps::default()
            },
        );
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(
            wire,
            json!({
                "statusCode": 200,
                "result": 1272.12,
                "data": {"result": 1272.12},
                "timestamps": {"providerDataReceivedUnixMs": 1_672_531_200_000i64}
            })
        );
    }

    #[test]
    fn error_omits_result_data_and_empty_timestamps() {
        let wire = serde_json::to_value(AdapterResponse::upstream_error("NoValidTradingPairs")).unwrap();
        assert_eq!(
            wire,
            json!({"statusCode": 502, "errorMessage": "NoValidTradingPairs"})
        );
    }

    #[test]
    fn wire_shape_deserializes_back() {
        let raw = r#"{"statusCode":200,"result":"15.40","data":{"result":[]},"timestamps":{"providerDataRequestedUnixMs":1}}"#;
        let parsed: AdapterResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.status_code, 200);
        assert_eq!(parsed.result, Some(json!("15.40")));
        assert_eq!(parsed.timestamps.provider_data_requested_unix_ms, Some(1));
        assert!(parsed.error_message.is_none());
    }
}
