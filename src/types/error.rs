use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single logical query against a chain.
///
/// Either the API itself answered with a logical error, or every configured
/// endpoint failed; in the latter case there is exactly one `NodeError` per
/// endpoint, in configured order.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryError {
    #[error("{0}")]
    Api(String),
    #[error("{}", describe_nodes(.0))]
    Nodes(Vec<NodeError>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeError {
    pub endpoint: String,
    pub error: String,
}

impl QueryError {
    pub fn api(message: impl Into<String>) -> Self {
        QueryError::Api(message.into())
    }

    pub fn node_errors(&self) -> &[NodeError] {
        match self {
            QueryError::Api(_) => &[],
            QueryError::Nodes(errors) => errors,
        }
    }
}

fn describe_nodes(errors: &[NodeError]) -> String {
    if errors.is_empty() {
        return "no endpoints to query".to_string();
    }

    let total = errors.len();
    errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("node #{} of {} ({}) failed: {}", i + 1, total, e.endpoint, e.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors collected from the concurrent sub-queries of an aggregate call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} sub-queries failed: {}", .0.len(), join_errors(.0))]
pub struct QueryErrors(pub Vec<QueryError>);

fn join_errors(errors: &[QueryError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}
