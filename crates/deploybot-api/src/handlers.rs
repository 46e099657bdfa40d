//! Slash command handlers.
//!
//! Replies use Slack's message shape: `in_channel` for announcements
//! everyone should see, `ephemeral` for answers only the caller needs.

use axum::Form;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use deploybot_slack::SlackApi;
use deploybot_state::{Deployment, Operator, StartOutcome, StateResult};

use crate::ApiState;
use crate::command::{Command, USAGE};
use crate::topic;

/// The fields of a Slack slash command payload deploybot reads.
#[derive(Debug, Clone, Deserialize)]
pub struct SlashCommand {
    #[serde(default)]
    pub token: String,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    InChannel,
    Ephemeral,
}

/// Message returned to Slack in answer to a slash command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackReply {
    pub response_type: ResponseType,
    pub text: String,
}

impl SlackReply {
    fn in_channel(text: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::InChannel,
            text: text.into(),
        }
    }

    fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Ephemeral,
            text: text.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ErrorBody {
            error: msg.to_string(),
        }),
    )
}

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}

/// POST /deploy
pub async fn slash_command(
    State(state): State<ApiState>,
    Form(cmd): Form<SlashCommand>,
) -> impl IntoResponse {
    if let Some(expected) = &state.verification_token {
        if !token_matches(&cmd.token, expected) {
            warn!(channel = %cmd.channel_id, user = %cmd.user_id, "rejected slash command with bad token");
            return error_response("invalid verification token", StatusCode::UNAUTHORIZED)
                .into_response();
        }
    }

    let command = Command::parse(&cmd.text);
    debug!(channel = %cmd.channel_id, user = %cmd.user_id, ?command, "slash command");

    let result = match command {
        Command::Help => Ok(SlackReply::ephemeral(USAGE)),
        Command::Status => status(&state, &cmd),
        Command::Start(subject) => start(&state, &cmd, subject).await,
        Command::Finish => finish(&state, &cmd).await,
    };

    match result {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => {
            warn!(channel = %cmd.channel_id, error = %e, "deploy state unavailable");
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

fn status(state: &ApiState, cmd: &SlashCommand) -> StateResult<SlackReply> {
    let reply = match state.deploys.current(&cmd.channel_id)? {
        Some(d) => SlackReply::ephemeral(format!(
            "<@{}> is deploying {} since {}.",
            d.operator.id,
            d.subject,
            since(&d)
        )),
        None => SlackReply::ephemeral("No one is deploying at the moment."),
    };
    Ok(reply)
}

async fn start(state: &ApiState, cmd: &SlashCommand, subject: &str) -> StateResult<SlackReply> {
    let proposed = Deployment::new(
        Operator::new(cmd.user_id.as_str(), cmd.user_name.as_str()),
        subject,
    );

    match state.deploys.start(&cmd.channel_id, proposed)? {
        StartOutcome::Started(d) => {
            if let Some(slack) = &state.slack {
                update_topic(slack.as_ref(), &cmd.channel_id, |t| topic::decorate(t, &d)).await;
            }
            Ok(SlackReply::in_channel(format!(
                "<@{}> is about to deploy {}.",
                d.operator.id, d.subject
            )))
        }
        StartOutcome::Conflict(d) => Ok(SlackReply::ephemeral(format!(
            "<@{}> is already deploying {} since {}. Please wait until they finish.",
            d.operator.id,
            d.subject,
            since(&d)
        ))),
    }
}

async fn finish(state: &ApiState, cmd: &SlashCommand) -> StateResult<SlackReply> {
    let Some(d) = state.deploys.finish(&cmd.channel_id)? else {
        return Ok(SlackReply::ephemeral("No one is deploying at the moment."));
    };

    if let Some(slack) = &state.slack {
        update_topic(slack.as_ref(), &cmd.channel_id, |t| {
            topic::undecorate(t).to_string()
        })
        .await;
    }

    let mut text = format!("<@{}> has finished deploying {}.", d.operator.id, d.subject);
    if d.operator.id != cmd.user_id {
        text.push_str(&format!(" (closed by <@{}>)", cmd.user_id));
    }
    Ok(SlackReply::in_channel(text))
}

/// Rewrite the channel topic, logging failures. The stored deployment is
/// the source of truth, so a failed topic update never fails the command.
async fn update_topic(
    slack: &dyn SlackApi,
    channel: &str,
    rewrite: impl FnOnce(&str) -> String,
) {
    let current = match slack.get_channel_topic(channel).await {
        Ok(current) => current,
        Err(e) => {
            warn!(%channel, error = %e, "failed to read channel topic");
            return;
        }
    };

    let updated = rewrite(&current);
    if updated == current {
        return;
    }

    if let Err(e) = slack.set_channel_topic(channel, &updated).await {
        warn!(%channel, error = %e, "failed to update channel topic");
    }
}

/// Constant-time comparison of the request token against the configured one.
fn token_matches(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    if given.len() != expected.len() {
        return false;
    }
    given.ct_eq(expected).into()
}

fn since(d: &Deployment) -> String {
    match d.started_at {
        Some(at) => at.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => "an unknown time".to_string(),
    }
}
