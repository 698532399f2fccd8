use serde::Serialize;
use ts_rs::TS;

/// API error payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/error-response.ts"
)]
pub struct ErrorResponse {
    message: String,
    /// Criteria key rejected by the case search compiler.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    key: Option<String>,
}

impl ErrorResponse {
    pub(super) fn new(message: String) -> Self {
        Self { message, key: None }
    }

    pub(super) fn for_filter(message: String, key: String) -> Self {
        Self {
            message,
            key: Some(key),
        }
    }
}
