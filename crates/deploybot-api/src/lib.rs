//! deploybot-api — the `/deploy` slash command over HTTP.
//!
//! Slack posts slash command invocations as form-encoded bodies. The
//! handler parses the command text, runs it against [`ChannelDeploys`],
//! and answers with a Slack message. When a Slack client is configured
//! the channel topic carries a banner while a deployment is running.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/deploy` | Slash command endpoint |
//! | GET | `/healthz` | Liveness check |

pub mod command;
pub mod handlers;
pub mod topic;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use deploybot_slack::SlackApi;
use deploybot_state::ChannelDeploys;

/// Shared state for the handlers.
#[derive(Clone)]
pub struct ApiState {
    pub deploys: ChannelDeploys,
    /// Used to decorate channel topics; topics are left alone when `None`.
    pub slack: Option<Arc<dyn SlackApi>>,
    /// When set, requests must carry this Slack verification token.
    pub verification_token: Option<String>,
}

impl ApiState {
    pub fn new(deploys: ChannelDeploys) -> Self {
        Self {
            deploys,
            slack: None,
            verification_token: None,
        }
    }

    pub fn with_slack(mut self, slack: Arc<dyn SlackApi>) -> Self {
        self.slack = Some(slack);
        self
    }

    pub fn with_verification_token(mut self, token: impl Into<String>) -> Self {
        self.verification_token = Some(token.into());
        self
    }
}

/// Build the router serving the slash command.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/deploy", post(handlers::slash_command))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}
