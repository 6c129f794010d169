use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle stage of a proposal, normalized across governance APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Voting,
    Deposit,
    Passed,
    Rejected,
    Failed,
    /// Upstream value with no mapping; kept verbatim.
    Other(String),
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProposalStatus::Voting => write!(f, "voting"),
            ProposalStatus::Deposit => write!(f, "deposit"),
            ProposalStatus::Passed => write!(f, "passed"),
            ProposalStatus::Rejected => write!(f, "rejected"),
            ProposalStatus::Failed => write!(f, "failed"),
            ProposalStatus::Other(raw) => write!(f, "{}", raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: ProposalStatus,
    #[serde(default)]
    pub voting_end_time: Option<DateTime<Utc>>,
}

impl Proposal {
    pub fn is_in_voting(&self) -> bool {
        self.status == ProposalStatus::Voting
    }
}
