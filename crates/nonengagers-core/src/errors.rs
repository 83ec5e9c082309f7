use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates malformed inputs rejected by identity parsing and the analyzer.
pub enum InvalidInputError {
    #[error("user identity must not be empty")]
    EmptyIdentity,
    #[error("user identity `{value}` contains whitespace or control characters")]
    MalformedIdentity { value: String },
    #[error("channel member `{member}` appears more than once")]
    DuplicateMember { member: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("api request `{operation}` failed: {message}")]
/// Failure reported by an engagement source while fetching one input list.
pub struct ApiError {
    pub operation: String,
    pub message: String,
}

impl ApiError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates failures of a full fetch-then-compute analysis.
pub enum AnalyzeError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),
}
