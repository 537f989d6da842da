use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Machine-readable warning code.
///
/// Declared in priority order: when ingestion fails, the first error-severity
/// warning by this order is the one worth showing the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    /// The upload is not a ZIP container.
    NotZip,
    /// ZIP signature present, but the container can't be read.
    CorruptedZip,
    /// The export was requested in HTML instead of JSON.
    HtmlExport,
    MissingRequiredFile,
    /// A member is not well-formed JSON.
    JsonParseError,
    /// A member is valid JSON in an unexpected shape.
    InvalidDataStructure,
    /// Fewer accounts than the configured minimum.
    InsufficientData,
    /// A member was found but contained no usable entries.
    EmptyMember,
    OptionalFileMissing,
}

impl WarningCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::NotZip => "NOT_ZIP",
            WarningCode::CorruptedZip => "CORRUPTED_ZIP",
            WarningCode::HtmlExport => "HTML_EXPORT",
            WarningCode::MissingRequiredFile => "MISSING_REQUIRED_FILE",
            WarningCode::JsonParseError => "JSON_PARSE_ERROR",
            WarningCode::InvalidDataStructure => "INVALID_DATA_STRUCTURE",
            WarningCode::InsufficientData => "INSUFFICIENT_DATA",
            WarningCode::EmptyMember => "EMPTY_MEMBER",
            WarningCode::OptionalFileMissing => "OPTIONAL_FILE_MISSING",
        }
    }

    /// Problems the user fixes by supplying a different file. These are
    /// never retried automatically.
    pub fn is_user_fixable(&self) -> bool {
        matches!(self, WarningCode::NotZip | WarningCode::HtmlExport | WarningCode::MissingRequiredFile)
    }
}

impl Display for WarningCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// A problem (or observation) collected while ingesting an archive.
///
/// Ingestion collects all of these instead of failing on the first one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub code: WarningCode,
    pub message: String,
    pub severity: Severity,
    /// Remediation hint, when the user can do something about it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl ParseWarning {
    pub fn new(code: WarningCode, severity: Severity, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), severity, fix: None }
    }

    pub fn error(code: WarningCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, message)
    }

    pub fn warning(code: WarningCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warning, message)
    }

    pub fn info(code: WarningCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Info, message)
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Sort so the most relevant warning comes first: errors before warnings
    /// before info, then by code priority.
    pub fn sort(warnings: &mut [ParseWarning]) {
        warnings.sort_by_key(|w| (w.severity, w.code));
    }
}

impl Display for ParseWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(fix) = &self.fix {
            write!(f, " ({fix})")?;
        }
        Ok(())
    }
}
