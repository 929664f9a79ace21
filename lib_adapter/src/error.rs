use thiserror::Error;

use crate::core::response::AdapterResponse;

/// Errors surfaced by the adapter core.
///
/// Background refresh loops never let these escape (failures there are logged
/// and the stale cache entry stays authoritative); the synchronous foreground
/// path propagates them to the caller.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A component was constructed with unusable settings.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The upstream data provider failed or returned garbage.
    #[error("{0}")]
    Upstream(String),
}

impl AdapterError {
    /// HTTP-ish status code this error maps to on the response wire shape.
    pub fn status_code(&self) -> u16 {
        match self {
            AdapterError::Config(_) => 500,
            AdapterError::Upstream(_) => 502,
        }
    }

    /// Renders the error as a cacheable/emittable error response.
    pub fn to_response(&self) -> AdapterResponse {
        AdapterResponse::error(self.status_code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_errors_map_to_502() {
        let err = AdapterError::Upstream("error fetching balances: timeout".into());
        assert_eq!(err.status_code(), 502);
        let response = err.to_response();
        assert_eq!(response.status_code, 502);
        assert_eq!(
            response.error_message.as_deref(),
            Some("error fetching balances: timeout")
        );
        assert!(response.result.is_none());
    }
}
