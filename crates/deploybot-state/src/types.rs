//! Domain types for the deploy state store.
//!
//! A [`Deployment`] is the one record a channel may hold while something
//! is being deployed there. Records are serialized to JSON for storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The actor who started a deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Operator {
    /// Stable unique id (e.g. a Slack user id).
    pub id: String,
    /// Display name, informational only.
    pub name: String,
}

impl Operator {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Whether `other` is the same actor. Only the id is compared.
    pub fn same_identity(&self, other: &Operator) -> bool {
        self.id == other.id
    }
}

/// A deployment in progress on a channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deployment {
    pub operator: Operator,
    /// Free-text description of what is being deployed.
    pub subject: String,
    /// Set by [`ChannelDeploys::start`](crate::ChannelDeploys::start) when the
    /// record is installed. `None` on a proposed record.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl Deployment {
    /// Propose a deployment. The start time is stamped on install.
    pub fn new(operator: Operator, subject: impl Into<String>) -> Self {
        Self {
            operator,
            subject: subject.into(),
            started_at: None,
        }
    }
}

/// Result of [`ChannelDeploys::start`](crate::ChannelDeploys::start).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The proposed record was installed, with its start time stamped.
    Started(Deployment),
    /// Another operator is already deploying; carries their record untouched.
    Conflict(Deployment),
}

impl StartOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, StartOutcome::Started(_))
    }

    pub fn deployment(&self) -> &Deployment {
        match self {
            StartOutcome::Started(d) | StartOutcome::Conflict(d) => d,
        }
    }

    pub fn into_deployment(self) -> Deployment {
        match self {
            StartOutcome::Started(d) | StartOutcome::Conflict(d) => d,
        }
    }
}
