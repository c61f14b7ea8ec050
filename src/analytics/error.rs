use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalyticsErrorCode {
    EmptyName,
    NullProperty,
    InvalidNamePattern,
    PayloadTooLarge,
    InvalidArgument,
    Internal,
}

impl AnalyticsErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsErrorCode::EmptyName => "analytics/empty-name",
            AnalyticsErrorCode::NullProperty => "analytics/null-property",
            AnalyticsErrorCode::InvalidNamePattern => "analytics/invalid-name-pattern",
            AnalyticsErrorCode::PayloadTooLarge => "analytics/payload-too-large",
            AnalyticsErrorCode::InvalidArgument => "analytics/invalid-argument",
            AnalyticsErrorCode::Internal => "analytics/internal",
        }
    }

    /// Validation failures are reported to the caller; nothing reaches the transport.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AnalyticsErrorCode::EmptyName
                | AnalyticsErrorCode::NullProperty
                | AnalyticsErrorCode::InvalidNamePattern
                | AnalyticsErrorCode::PayloadTooLarge
        )
    }
}

#[derive(Clone, Debug)]
pub struct AnalyticsError {
    pub code: AnalyticsErrorCode,
    message: String,
}

impl AnalyticsError {
    pub fn new(code: AnalyticsErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for AnalyticsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for AnalyticsError {}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

pub fn empty_name(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::EmptyName, message)
}

pub fn null_property(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::NullProperty, message)
}

pub fn invalid_name_pattern(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::InvalidNamePattern, message)
}

pub fn payload_too_large(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::PayloadTooLarge, message)
}

pub fn invalid_argument(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::InvalidArgument, message)
}

pub fn internal_error(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::Internal, message)
}
