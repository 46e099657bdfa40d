//! deploybot-slack — a small Slack Web API client.
//!
//! Covers the calls deploybot makes around a deployment: reading and
//! setting a channel topic and posting a message. [`SlackApi`] is the
//! seam the HTTP handlers depend on, so they can run against a recording
//! double in tests.

pub mod client;
pub mod error;

use async_trait::async_trait;

pub use client::{SLACK_WEB_API_ENDPOINT, WebApi};
pub use error::WebApiError;

/// Slack operations used to announce deployments.
#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn set_channel_topic(&self, channel_id: &str, topic: &str) -> Result<(), WebApiError>;

    async fn get_channel_topic(&self, channel_id: &str) -> Result<String, WebApiError>;

    async fn post_message(&self, channel_id: &str, text: &str) -> Result<(), WebApiError>;
}
