use serde::{Deserialize, Serialize};

/// Error or informational entry in an API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Envelope wrapping every API response.
///
/// `result` is absent on most error responses, so it stays optional and
/// callers decide whether a missing result is an error.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
    pub result: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Joins the reported errors into a single line (`"code: message; ..."`).
    ///
    /// Returns `None` when the response carried no errors.
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.message))
            .collect();
        Some(parts.join("; "))
    }
}
