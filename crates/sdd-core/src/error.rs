use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::graph::cycles::CycleWarning;
use crate::model::item::{ParseEnumError, Status};

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    InvalidEnumValue,
    InvalidField,
    ItemNotFound,
    InvalidStateTransition,
    CycleDetected,
    DependencyNotFound,
    DanglingReferences,
    CorruptStore,
    StoreWriteFailed,
    LockContention,
    QualityGateFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InvalidEnumValue => "E1003",
            Self::InvalidField => "E1004",
            Self::ItemNotFound => "E2001",
            Self::InvalidStateTransition => "E2002",
            Self::CycleDetected => "E2003",
            Self::DependencyNotFound => "E2004",
            Self::DanglingReferences => "E2005",
            Self::CorruptStore => "E3001",
            Self::StoreWriteFailed => "E5001",
            Self::LockContention => "E5002",
            Self::QualityGateFailed => "E6001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidEnumValue => "Invalid type/status/priority value",
            Self::InvalidField => "Invalid field value",
            Self::ItemNotFound => "Work item not found",
            Self::InvalidStateTransition => "Invalid state transition",
            Self::CycleDetected => "Cycle would be created",
            Self::DependencyNotFound => "Dependency references unknown item",
            Self::DanglingReferences => "Other items still depend on this item",
            Self::CorruptStore => "Corrupt work-item store",
            Self::StoreWriteFailed => "Store write failed",
            Self::LockContention => "Lock contention",
            Self::QualityGateFailed => "Quality gate failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `sdd init` to initialize this project."),
            Self::ConfigParseError => Some("Fix syntax in .sdd/config.toml and retry."),
            Self::InvalidEnumValue => Some("Use one of the documented type/status/priority values."),
            Self::InvalidField | Self::ItemNotFound => None,
            Self::InvalidStateTransition => Some(
                "Follow valid transitions: not_started -> in_progress -> completed, or block/unblock.",
            ),
            Self::CycleDetected => Some("Remove/adjust dependency links to keep the graph acyclic."),
            Self::DependencyNotFound => Some("Create the dependency first or fix the id."),
            Self::DanglingReferences => {
                Some("Pass `--detach` to remove the references from dependent items.")
            }
            Self::CorruptStore => Some("Restore .sdd/work_items.json from version control."),
            Self::StoreWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other `sdd` process releases its lock."),
            Self::QualityGateFailed => Some("Fix the failing checks and end the session again."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }

    /// Process exit code used by the CLI for this class of error.
    ///
    /// `0` success, `1` validation, `2` not found, `3` concurrent
    /// modification, `4` quality-gate failure.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::ItemNotFound | Self::NotInitialized => 2,
            Self::LockContention => 3,
            Self::QualityGateFailed => 4,
            Self::ConfigParseError
            | Self::InvalidEnumValue
            | Self::InvalidField
            | Self::InvalidStateTransition
            | Self::CycleDetected
            | Self::DependencyNotFound
            | Self::DanglingReferences
            | Self::CorruptStore
            | Self::StoreWriteFailed
            | Self::InternalUnexpected => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors returned by every fallible core operation.
///
/// Structural errors (validation, cycle, not-found, dangling references)
/// abort the operation before anything is written.
#[derive(Debug, thiserror::Error)]
pub enum SddError {
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("invalid value: {0}")]
    InvalidEnum(#[from] ParseEnumError),

    #[error("{0}")]
    DependencyCycle(CycleWarning),

    #[error("work item '{item_id}' depends on unknown item(s): {}", .missing.join(", "))]
    DependencyNotFound { item_id: String, missing: Vec<String> },

    #[error("work item '{id}' not found")]
    NotFound { id: String },

    #[error("cannot {event} work item '{id}' from {from}: {reason}")]
    InvalidTransition {
        id: String,
        from: Status,
        event: &'static str,
        reason: String,
    },

    #[error("work item '{id}' is still referenced by: {}", .dependents.join(", "))]
    DanglingReferences { id: String, dependents: Vec<String> },

    #[error("store lock at {} not acquired after {waited:?}", .path.display())]
    ConcurrentModification { path: PathBuf, waited: Duration },

    #[error("project not initialized at {}", .path.display())]
    NotInitialized { path: PathBuf },

    #[error("failed to parse {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("corrupt store at {}: {source}", .path.display())]
    CorruptStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("store I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SddError {
    /// Convenience constructor for field validation failures.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for unknown ids.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::InvalidField,
            Self::InvalidEnum(_) => ErrorCode::InvalidEnumValue,
            Self::DependencyCycle(_) => ErrorCode::CycleDetected,
            Self::DependencyNotFound { .. } => ErrorCode::DependencyNotFound,
            Self::NotFound { .. } => ErrorCode::ItemNotFound,
            Self::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            Self::DanglingReferences { .. } => ErrorCode::DanglingReferences,
            Self::ConcurrentModification { .. } => ErrorCode::LockContention,
            Self::NotInitialized { .. } => ErrorCode::NotInitialized,
            Self::Config { .. } => ErrorCode::ConfigParseError,
            Self::CorruptStore { .. } => ErrorCode::CorruptStore,
            Self::Io { .. } => ErrorCode::StoreWriteFailed,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// CLI exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.code().exit_code()
    }
}

pub type Result<T, E = SddError> = std::result::Result<T, E>;
