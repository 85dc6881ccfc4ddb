//! Structured logging and audit records for topology changes.
//!
//! Every change to the fabric graph that a later sweep or an operator may
//! need to reconstruct (links made or broken, ports created or torn down,
//! vports provisioned) is emitted as an [`AuditRecord`] through
//! [`audit_log!`](crate::audit_log). Records serialize to JSON so they can
//! be shipped to a log pipeline unchanged.
//!
//! | Macro        | Level | Usage                                  |
//! |--------------|-------|----------------------------------------|
//! | `error_log!` | error | precondition violations, aborted calls |
//! | `warn_log!`  | warn  | operational failures reported to caller|
//! | `info_log!`  | info  | lifecycle milestones                   |
//! | `debug_log!` | debug | per-port detail                        |
//! | `audit_log!` | info/debug/warn by outcome | topology changes  |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audit event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    /// Nodes or physical ports added to or removed from the subnet
    TopologyChange,
    /// Links made or broken between physical ports
    LinkChange,
    /// Logical port creation and deletion
    PortLifecycle,
    /// Directed route path replacement
    PathChange,
    /// VPort creation, update, deletion and virtualization teardown
    VirtualizationChange,
    /// Multicast membership changes
    McastMembership,
    /// Policy knobs loaded or changed
    ConfigurationChange,
    /// Error and failure events
    ErrorCondition,
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditCategory::TopologyChange => write!(f, "TOPOLOGY_CHANGE"),
            AuditCategory::LinkChange => write!(f, "LINK_CHANGE"),
            AuditCategory::PortLifecycle => write!(f, "PORT_LIFECYCLE"),
            AuditCategory::PathChange => write!(f, "PATH_CHANGE"),
            AuditCategory::VirtualizationChange => write!(f, "VIRTUALIZATION_CHANGE"),
            AuditCategory::McastMembership => write!(f, "MCAST_MEMBERSHIP"),
            AuditCategory::ConfigurationChange => write!(f, "CONFIGURATION_CHANGE"),
            AuditCategory::ErrorCondition => write!(f, "ERROR_CONDITION"),
        }
    }
}

/// Outcome of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    /// Action completed successfully
    Success,
    /// Action failed
    Failure,
    /// Action is in progress
    InProgress,
    /// Action was refused by policy (retry bound, occupied slot)
    Denied,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Failure => write!(f, "failure"),
            AuditOutcome::InProgress => write!(f, "in_progress"),
            AuditOutcome::Denied => write!(f, "denied"),
        }
    }
}

/// Structured audit record.
///
/// Built with the `with_*` methods and then handed to
/// [`audit_log!`](crate::audit_log).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// UTC timestamp
    pub timestamp: DateTime<Utc>,

    /// Event category
    pub category: AuditCategory,

    /// Component generating the event
    pub source: String,

    /// Human-readable action description
    pub action: String,

    /// Outcome of the action
    pub outcome: AuditOutcome,

    /// Object affected, e.g. a port GUID or physical port handle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,

    /// Object kind: "physp", "port", "vport", "alias_guid", ...
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,

    /// Additional context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Error message if outcome is failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Sweep the event belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl AuditRecord {
    /// Create a new audit record with the current timestamp.
    ///
    /// The outcome defaults to InProgress until explicitly set.
    pub fn new(
        category: AuditCategory,
        source: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            source: source.into(),
            action: action.into(),
            outcome: AuditOutcome::InProgress,
            object_id: None,
            object_type: None,
            details: None,
            error: None,
            correlation_id: None,
        }
    }

    /// Set the outcome of the action.
    pub fn with_outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Set the object identifier affected by the action.
    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    /// Set the object type for classification.
    pub fn with_object_type(mut self, obj_type: impl Into<String>) -> Self {
        self.object_type = Some(obj_type.into());
        self
    }

    /// Add additional context details as JSON.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Set the error message and mark outcome as Failure. A Denied
    /// outcome is kept.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        if self.outcome != AuditOutcome::Denied {
            self.outcome = AuditOutcome::Failure;
        }
        self
    }

    /// Tag the record with the sweep it was produced in.
    pub fn with_sweep(mut self, sweep_id: u64) -> Self {
        self.correlation_id = Some(format!("sweep-{}", sweep_id));
        self
    }

    /// Convert to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization_failed","message":"{}"}}"#, e))
    }
}

/// Debug-level logging with a `source` field.
///
/// ```ignore
/// debug_log!("PhysicalPort", port_num = 3, "message");
/// ```
#[macro_export]
macro_rules! debug_log {
    ($source:expr, $($arg:tt)*) => {
        tracing::debug!(
            source = $source,
            $($arg)*
        )
    };
}

/// Info-level logging with a `source` field.
#[macro_export]
macro_rules! info_log {
    ($source:expr, $($arg:tt)*) => {
        tracing::info!(
            source = $source,
            $($arg)*
        )
    };
}

/// Warn-level logging with a `source` field.
#[macro_export]
macro_rules! warn_log {
    ($source:expr, $($arg:tt)*) => {
        tracing::warn!(
            source = $source,
            $($arg)*
        )
    };
}

/// Error-level logging with a `source` field.
#[macro_export]
macro_rules! error_log {
    ($source:expr, $($arg:tt)*) => {
        tracing::error!(
            source = $source,
            $($arg)*
        )
    };
}

/// Emit an [`AuditRecord`] on the `audit` target.
///
/// Success is logged at info, InProgress at debug, Failure and Denied at
/// warn.
///
/// ```ignore
/// let record = AuditRecord::new(AuditCategory::LinkChange, "Subnet", "link")
///     .with_outcome(AuditOutcome::Success)
///     .with_object_type("physp");
/// audit_log!(record);
/// ```
#[macro_export]
macro_rules! audit_log {
    ($record:expr) => {
        let record = $record;
        match record.outcome {
            $crate::audit::AuditOutcome::Success => {
                tracing::info!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    outcome = %record.outcome,
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
            $crate::audit::AuditOutcome::InProgress => {
                tracing::debug!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    outcome = %record.outcome,
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
            $crate::audit::AuditOutcome::Failure | $crate::audit::AuditOutcome::Denied => {
                tracing::warn!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    outcome = %record.outcome,
                    error = record.error.as_deref().unwrap_or(""),
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
        }
    };
}

/// Install a JSON `tracing` subscriber.
///
/// `RUST_LOG` overrides `log_level` when set. Returns false if a global
/// subscriber was already installed.
pub fn init_logging(log_level: &str) -> bool {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json(),
        )
        .try_init()
        .is_ok()
}

/// Install a human-readable `tracing` subscriber for development.
pub fn init_logging_pretty(log_level: &str) -> bool {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).pretty())
        .try_init()
        .is_ok()
}
