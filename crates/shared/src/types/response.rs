//! Uniform response envelope for write operations.
//!
//! Every inbound operation answers with this envelope; failures are
//! reported through `status` and `message`, never as an error value.

use serde::{Deserialize, Serialize};

/// Outcome discriminator of an [`ApiResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// The operation completed.
    Success,
    /// The operation failed; `message` says what happened.
    Error,
}

/// Response envelope with a success/error discriminator and a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Success or error.
    pub status: ResponseStatus,
    /// Payload, present on success.
    pub data: Option<T>,
    /// Human-readable message.
    pub message: String,
}

impl<T> ApiResponse<T> {
    /// Builds a successful response carrying `data`.
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            data: Some(data),
            message: message.into(),
        }
    }

    /// Builds a failed response without payload.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            data: None,
            message: message.into(),
        }
    }

    /// Returns true if the operation succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_carries_data() {
        let response = ApiResponse::success("done".to_string(), "Transfer Completed");
        assert!(response.is_success());
        assert_eq!(response.data.as_deref(), Some("done"));
        assert_eq!(response.message, "Transfer Completed");
    }

    #[test]
    fn test_error_has_no_data() {
        let response = ApiResponse::<String>::error("Transfer Failed");
        assert!(!response.is_success());
        assert!(response.data.is_none());
    }

    #[test]
    fn test_envelope_json_shape() {
        let response = ApiResponse::<String>::error("Create Account Failed");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json["data"].is_null());
        assert_eq!(json["message"], "Create Account Failed");
    }
}
