//! The `{success, data, message}` envelope every role endpoint answers with.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, RoleSyncError};

/// Backend response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,

    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Either a plain string or an `{code, message}` object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    /// `success: true` with no payload.
    pub fn ack() -> Self {
        Self {
            success: true,
            data: None,
            message: None,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            error: None,
        }
    }

    /// Best available explanation for a failed envelope.
    pub fn failure_message(&self) -> Option<String> {
        if let Some(message) = self.message.as_ref().filter(|m| !m.trim().is_empty()) {
            return Some(message.clone());
        }
        match self.error.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| Some(Value::Object(map.clone()).to_string())),
            other => Some(other.to_string()),
        }
    }

    /// Payload of a successful envelope.
    ///
    /// `success: false` and a missing payload both map to `LogicalFailure`.
    pub fn into_data(self, operation: &str) -> Result<T> {
        if !self.success {
            let message = self.failure_message();
            return Err(RoleSyncError::logical_failure(operation, message));
        }
        self.data.ok_or_else(|| {
            RoleSyncError::logical_failure(operation, Some("response carried no data".into()))
        })
    }

    /// Check the success flag, ignoring any payload.
    pub fn into_ack(self, operation: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(RoleSyncError::logical_failure(operation, self.failure_message()))
        }
    }
}
