use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub whatsapp_base_url: String,
    pub whatsapp_auth_token: String,
    pub whatsapp_channel_id: String,

    pub template_demand_created: String,
    pub template_demand_assigned: String,
    pub template_manager_comment: String,
    pub template_deadline_approaching: String,

    pub public_base_url: String,

    pub database_url: String,

    /// Shared secret for the scheduler endpoint. Optional so a deployment
    /// without an external scheduler still serves the inbox; the scan
    /// endpoint answers 500 while this is unset.
    pub scheduler_secret: Option<String>,

    pub server_port: u16,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        Ok(config)
    }

    pub fn templates(&self) -> TemplateConfig {
        TemplateConfig {
            demand_created: self.template_demand_created.clone(),
            demand_assigned: self.template_demand_assigned.clone(),
            manager_comment: self.template_manager_comment.clone(),
            deadline_approaching: self.template_deadline_approaching.clone(),
            public_base_url: self.public_base_url.clone(),
        }
    }
}

/// Template ids and link base handed to the policy layer at construction.
#[derive(Clone, Debug)]
pub struct TemplateConfig {
    pub demand_created: String,
    pub demand_assigned: String,
    pub manager_comment: String,
    pub deadline_approaching: String,
    pub public_base_url: String,
}
