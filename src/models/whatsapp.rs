use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct MessageSendRequest {
    pub body: MessageBody,
    pub to: String,
    pub from: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    pub template_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<HashMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
}

/// The provider's response contract is loose: a successful send may carry
/// an id, a status, both, or neither.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageSendResponse {
    pub id: Option<String>,
    pub status: Option<String>,
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub provider_message_id: String,
}

#[derive(Debug, Clone)]
pub struct DeliveryError {
    pub message: String,
}

impl DeliveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for DeliveryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DeliveryError {}
