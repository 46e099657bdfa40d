//! Slack Web API client.
//!
//! Every call is a `GET {base}/{method}?{params}&token=…`. A call fails
//! when the request cannot be sent, the status is 4xx/5xx, the body is
//! not JSON, or the body reports `"ok": false`.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::SlackApi;
use crate::error::WebApiError;

pub const SLACK_WEB_API_ENDPOINT: &str = "https://slack.com/api";

/// Placeholder written over the token in URLs carried by errors.
const REDACTED: &str = "[hidden]";

#[derive(Clone)]
pub struct WebApi {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl WebApi {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            base_url: SLACK_WEB_API_ENDPOINT.to_string(),
        }
    }

    /// Point the client somewhere other than slack.com (a proxy, a test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Call a Web API method and return the decoded response body.
    pub async fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<Value, WebApiError> {
        self.send(method, params).await.map(|(body, _)| body)
    }

    /// Like [`call`](Self::call), also returning the redacted request URL for
    /// errors raised while interpreting the body.
    async fn send(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<(Value, String), WebApiError> {
        let endpoint = format!("{}/{}", self.base_url.trim_end_matches('/'), method);
        let url = Url::parse_with_params(
            &endpoint,
            params
                .iter()
                .copied()
                .chain([("token", self.token.as_str())]),
        )
        .map_err(|e| {
            WebApiError::new(method, &endpoint, format!("failed to build WebAPI request ({e})"))
        })?;
        let redacted = redact(&url);

        debug!(%method, url = %redacted, "calling Slack Web API");

        // reqwest errors embed the request URL; strip it so the token stays out.
        let resp = self.http.get(url).send().await.map_err(|e| {
            WebApiError::new(
                method,
                &redacted,
                format!("failed to call method ({})", e.without_url()),
            )
        })?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| {
            WebApiError::new(
                method,
                &redacted,
                format!("failed to read response body ({})", e.without_url()),
            )
        })?;

        if status.is_client_error() || status.is_server_error() {
            return Err(WebApiError::new(
                method,
                &redacted,
                format!(
                    "WebAPI responded with HTTP {} {:?}",
                    status.as_u16(),
                    String::from_utf8_lossy(&body)
                ),
            ));
        }

        let value: Value = serde_json::from_slice(&body).map_err(|e| {
            WebApiError::new(
                method,
                &redacted,
                format!(
                    "failed to decode response body {:?} ({e})",
                    String::from_utf8_lossy(&body)
                ),
            )
        })?;

        if value.get("ok").and_then(Value::as_bool) != Some(true) {
            let cause = match value.get("error").and_then(Value::as_str) {
                Some(error) if !error.is_empty() => format!("WebAPI returned error ({error})"),
                _ => "WebAPI returned unknown error".to_string(),
            };
            return Err(WebApiError::new(method, &redacted, cause));
        }

        Ok((value, redacted))
    }
}

#[derive(Deserialize)]
struct ChannelInfo {
    channel: ChannelBody,
}

#[derive(Deserialize)]
struct ChannelBody {
    topic: Topic,
}

#[derive(Deserialize)]
struct Topic {
    value: String,
}

#[async_trait]
impl SlackApi for WebApi {
    async fn set_channel_topic(&self, channel_id: &str, topic: &str) -> Result<(), WebApiError> {
        self.call(
            "conversations.setTopic",
            &[("channel", channel_id), ("topic", topic)],
        )
        .await?;
        Ok(())
    }

    async fn get_channel_topic(&self, channel_id: &str) -> Result<String, WebApiError> {
        const METHOD: &str = "conversations.info";

        let (body, url) = self.send(METHOD, &[("channel", channel_id)]).await?;
        let info: ChannelInfo = serde_json::from_value(body.clone()).map_err(|e| {
            WebApiError::new(
                METHOD,
                url,
                format!("failed to decode response body {body} ({e})"),
            )
        })?;
        Ok(info.channel.topic.value)
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> Result<(), WebApiError> {
        self.call(
            "chat.postMessage",
            &[("channel", channel_id), ("text", text)],
        )
        .await?;
        Ok(())
    }
}

/// The URL with its `token` query parameter replaced by [`REDACTED`].
fn redact(url: &Url) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "token" {
                REDACTED.to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();

    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
