//! Core records held by the interop server.
//!
//! Field names serialize in camelCase to match what the JavaScript, Python,
//! and Go module clients read off the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Capability tag every module is assumed to expose unless it says otherwise.
pub const RPC_ENDPOINT: &str = "rpc";

/// A remote module known to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    /// Unique name chosen by the module itself.
    pub name: String,
    /// Informational language tag (`"go"`, `"python"`, ...).
    pub language: String,
    /// Capability tags.
    pub endpoints: Vec<String>,
    /// Port of the module's own `/rpc` server. `None` means the module cannot
    /// receive real calls.
    pub port: Option<u16>,
    pub registered_at: DateTime<Utc>,
    /// Refreshed on every dispatch that resolves to this module.
    pub last_seen: DateTime<Utc>,
}

/// Lifecycle state of a queued message.
///
/// `Queued -> Completed | Failed`; both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    #[default]
    Queued,
    Completed,
    Failed,
}

impl QueueStatus {
    /// Returns the wire representation of this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the status can no longer change.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued)
    }
}

/// One asynchronous unit of work awaiting dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: String,
    pub target: String,
    pub method: String,
    /// Opaque parameters forwarded untouched to the target module.
    pub params: Value,
    /// Higher values drain first.
    pub priority: i64,
    /// Enqueue time.
    pub timestamp: DateTime<Utc>,
    pub status: QueueStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub failed_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    /// Marks the item completed with the module's result.
    pub fn complete(&mut self, result: Value, at: DateTime<Utc>) {
        self.status = QueueStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(at);
    }

    /// Marks the item failed with a human-readable reason.
    pub fn fail(&mut self, error: impl Into<String>, at: DateTime<Utc>) {
        self.status = QueueStatus::Failed;
        self.error = Some(error.into());
        self.failed_at = Some(at);
    }
}
