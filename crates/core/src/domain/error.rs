use std::fmt;

/// Rejection at the query boundary. Not retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    InvalidInput { field: &'static str, detail: String },
}

impl QueryError {
    pub fn invalid(field: &'static str, detail: impl Into<String>) -> Self {
        QueryError::InvalidInput {
            field,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidInput { field, detail } => {
                write!(f, "invalid input (field={field}): {detail}")
            }
        }
    }
}

impl std::error::Error for QueryError {}
