//! Error types
//!
//! Setup failures are fatal and end the process with status 1.
//! Query failures are reported to the user and the session continues.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures from the hosted embedding or chat API
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Request could not be sent or the response body could not be read
    #[error("connection to {service} failed")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success status code. `message` is the raw body and is only logged.
    #[error("{service} rejected the request (HTTP {status})")]
    Status {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("{service} returned an unexpected response: {reason}")]
    InvalidResponse {
        service: &'static str,
        reason: String,
    },

    #[error("{service} did not respond within {}s", .after.as_secs())]
    Timeout {
        service: &'static str,
        after: Duration,
    },
}

/// Fatal errors raised while preparing the QA system
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("{0}")]
    Configuration(String),

    #[error("Knowledge file not found at {}", .0.display())]
    KnowledgeNotFound(PathBuf),

    #[error("Knowledge file at {} contains no text", .0.display())]
    EmptyKnowledgeBase(PathBuf),

    #[error("Could not build the knowledge index: {0}")]
    ExternalService(#[from] ServiceError),

    #[error("Vector store error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for SetupError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Pipeline stage a query was in when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Retrieval,
    Generation,
}

impl std::fmt::Display for QueryStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retrieval => write!(f, "searching the knowledge base"),
            Self::Generation => write!(f, "generating the answer"),
        }
    }
}

/// Recoverable errors raised while answering a single query
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Could not search the knowledge base: {0}")]
    Retrieval(#[source] ServiceError),

    #[error("Could not generate an answer: {0}")]
    Generation(#[source] ServiceError),

    #[error("Could not read the knowledge index: {0}")]
    Storage(String),

    #[error("Timed out after {}s while {stage}", .after.as_secs())]
    Timeout { stage: QueryStage, after: Duration },
}

impl QueryError {
    /// Lift a service failure into the stage it happened in.
    /// Timeouts keep their own variant.
    pub fn at(stage: QueryStage, err: ServiceError) -> Self {
        match err {
            ServiceError::Timeout { after, .. } => Self::Timeout { stage, after },
            other => match stage {
                QueryStage::Retrieval => Self::Retrieval(other),
                QueryStage::Generation => Self::Generation(other),
            },
        }
    }
}

impl From<rusqlite::Error> for QueryError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_keeps_its_variant() {
        let err = QueryError::at(
            QueryStage::Generation,
            ServiceError::Timeout {
                service: "chat",
                after: Duration::from_secs(30),
            },
        );
        assert!(matches!(
            err,
            QueryError::Timeout {
                stage: QueryStage::Generation,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "Timed out after 30s while generating the answer"
        );
    }

    #[test]
    fn test_status_message_hides_body() {
        let err = QueryError::at(
            QueryStage::Retrieval,
            ServiceError::Status {
                service: "embeddings",
                status: 500,
                message: "{\"error\":{\"code\":\"internal_trace_42\"}}".to_string(),
            },
        );
        let shown = err.to_string();
        assert!(shown.contains("HTTP 500"));
        assert!(!shown.contains("internal_trace_42"));
    }
}
