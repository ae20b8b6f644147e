use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    models::whatsapp::{
        DeliveryError, DeliveryReceipt, MessageBody, MessageSendRequest, MessageSendResponse,
    },
};

/// Id reported when the provider accepts a message without returning one.
const PLACEHOLDER_MESSAGE_ID: &str = "accepted";

/// Outbound messaging seam. Policies talk to this trait; the only
/// production implementation is [`WhatsappClient`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_template_message(
        &self,
        phone: &str,
        template_id: &str,
        variables: Option<HashMap<String, String>>,
        link_url: Option<&str>,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}

pub struct WhatsappClient {
    http_client: Client,
    base_url: String,
    auth_token: String,
    channel_id: String,
}

impl WhatsappClient {
    pub fn new(config: &Config) -> Result<Self, DeliveryError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|_| DeliveryError::new("Failed to create HTTP client"))?;

        info!(base_url = %config.whatsapp_base_url, "WhatsApp client initialized");

        Ok(Self {
            http_client,
            base_url: config.whatsapp_base_url.clone(),
            auth_token: config.whatsapp_auth_token.clone(),
            channel_id: config.whatsapp_channel_id.clone(),
        })
    }
}

#[async_trait]
impl Transport for WhatsappClient {
    /// Sends one templated message. Every failure mode, including network
    /// errors and unparseable responses, comes back as a `DeliveryError`
    /// value; this method never propagates an exception-style error.
    async fn send_template_message(
        &self,
        phone: &str,
        template_id: &str,
        variables: Option<HashMap<String, String>>,
        link_url: Option<&str>,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let to = normalize_phone(phone);

        debug!(to = %to, template_id, "Sending WhatsApp template message");

        let request = MessageSendRequest {
            body: MessageBody {
                template_id: template_id.to_string(),
                variables,
                link_url: link_url.map(str::to_string),
            },
            to,
            from: self.channel_id.clone(),
        };

        let url = format!("{}/chat/v1/message/send", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", &self.auth_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError::new(format!("WhatsApp request failed: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "WhatsApp provider returned error status");
            return Err(DeliveryError::new(format!(
                "WhatsApp provider returned status {}: {}",
                status, body
            )));
        }

        let parsed: MessageSendResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::new(format!("Failed to parse provider response: {}", e)))?;

        if let Some(error) = parsed.error {
            return Err(DeliveryError::new(format!(
                "WhatsApp provider rejected message: {}",
                error
            )));
        }

        // The provider may acknowledge without an id; treat that as sent.
        let provider_message_id = parsed
            .id
            .unwrap_or_else(|| PLACEHOLDER_MESSAGE_ID.to_string());

        info!(provider_message_id = %provider_message_id, "WhatsApp message accepted");

        Ok(DeliveryReceipt {
            provider_message_id,
        })
    }
}

/// The provider expects bare digits: drop whitespace and a leading "+".
pub fn normalize_phone(raw: &str) -> String {
    let trimmed: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    trimmed
        .strip_prefix('+')
        .map(str::to_string)
        .unwrap_or(trimmed)
}
