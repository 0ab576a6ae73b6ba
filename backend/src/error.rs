//! Error types for the scheduling engine.
//!
//! Only conditions the caller has to act on are errors: an unreadable target
//! file, an unusable configuration, a night window that cannot be computed,
//! or a failed snapshot write. Expected outcomes such as a rejected target or
//! a missing reference star are typed values elsewhere in the crate.

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Structured context for scheduler errors.
///
/// Records where in the input (file, row, column) or in the pipeline an
/// error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "parse_target_file", "write_snapshot")
    pub operation: Option<String>,
    /// Path of the file involved, if any
    pub path: Option<String>,
    /// 1-based data row number (header excluded)
    pub row: Option<usize>,
    /// Column name
    pub column: Option<String>,
    /// Additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with an operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    /// Set the file path.
    pub fn with_path(mut self, path: impl fmt::Display) -> Self {
        self.path = Some(path.to_string());
        self
    }

    /// Set the data row.
    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    /// Set the column name.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Set additional details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref path) = self.path {
            parts.push(format!("path={}", path));
        }
        if let Some(row) = self.row {
            parts.push(format!("row={}", row));
        }
        if let Some(ref column) = self.column {
            parts.push(format!("column={}", column));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for scheduler operations
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The target file is structurally unusable (missing or unparsable mandatory column).
    #[error("Parse error: {message} {context}")]
    ParseError {
        message: String,
        context: ErrorContext,
    },

    /// Configuration file could not be read or holds invalid values.
    #[error("Configuration error: {message} {context}")]
    ConfigurationError {
        message: String,
        context: ErrorContext,
    },

    /// The twilight-to-twilight window for the night cannot be computed.
    #[error("Night window error: {message} {context}")]
    NightWindowError {
        message: String,
        context: ErrorContext,
    },

    /// Snapshot file could not be written or read back.
    #[error("Snapshot error: {message} {context}")]
    SnapshotError {
        message: String,
        context: ErrorContext,
    },

    /// Underlying I/O failure.
    #[error("I/O error: {source} {context}")]
    IoError {
        #[source]
        source: std::io::Error,
        context: ErrorContext,
    },
}

impl SchedulerError {
    /// Create a parse error with context.
    pub fn parse(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::ParseError {
            message: message.into(),
            context,
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a configuration error with context.
    pub fn configuration_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            context,
        }
    }

    /// Create a night window error.
    pub fn night_window(message: impl Into<String>) -> Self {
        Self::NightWindowError {
            message: message.into(),
            context: ErrorContext::new("compute_night_window"),
        }
    }

    /// Create a snapshot error with context.
    pub fn snapshot(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::SnapshotError {
            message: message.into(),
            context,
        }
    }

    /// Wrap an I/O error with context.
    pub fn io(source: std::io::Error, context: ErrorContext) -> Self {
        Self::IoError { source, context }
    }

    /// Get the error context.
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::ParseError { context, .. } => context,
            Self::ConfigurationError { context, .. } => context,
            Self::NightWindowError { context, .. } => context,
            Self::SnapshotError { context, .. } => context,
            Self::IoError { context, .. } => context,
        }
    }

    /// Add or update the operation in the error context.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        match &mut self {
            Self::ParseError { context, .. }
            | Self::ConfigurationError { context, .. }
            | Self::NightWindowError { context, .. }
            | Self::SnapshotError { context, .. }
            | Self::IoError { context, .. } => {
                context.operation = Some(operation.into());
            }
        }
        self
    }
}
