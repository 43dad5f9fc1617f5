use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A typed request routed by its action type.
pub trait Request: Debug + Send + Sync {
    fn action_type(&self) -> &str;
}

/// What a handler produced for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Outcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            payload: None,
        }
    }

    pub fn with_payload(payload: serde_json::Value) -> Self {
        Self {
            success: true,
            message: None,
            payload: Some(payload),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            payload: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
