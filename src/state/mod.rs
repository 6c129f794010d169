//! Observed governance state.
//!
//! A `Snapshot` is the minimal memory needed to diff two runs: per chain the
//! height proposals were last fetched at, the proposals error if the fetch
//! failed, and for every proposal in voting the vote status of each wallet.

pub mod generator;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Proposal, QueryError, Vote};

pub use generator::StateGenerator;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub chains: BTreeMap<String, ChainInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainInfo {
    /// Highest block height proposals were served at.
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub proposals_error: Option<QueryError>,
    /// Proposals in voting, keyed by proposal id.
    #[serde(default)]
    pub proposals: BTreeMap<String, ProposalVotes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalVotes {
    pub proposal: Proposal,
    /// Keyed by wallet address.
    #[serde(default)]
    pub votes: BTreeMap<String, WalletVote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStatus {
    Voted(Vote),
    NotVoted,
    Error(QueryError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletVote {
    pub status: VoteStatus,
    /// Height the status was last confirmed at.
    #[serde(default)]
    pub height: u64,
}

impl WalletVote {
    pub fn from_result(result: Result<(Option<Vote>, u64), QueryError>, prev_height: u64) -> Self {
        match result {
            Ok((Some(vote), height)) => Self {
                status: VoteStatus::Voted(vote),
                height,
            },
            Ok((None, height)) => Self {
                status: VoteStatus::NotVoted,
                height,
            },
            Err(e) => Self {
                status: VoteStatus::Error(e),
                height: prev_height,
            },
        }
    }

    pub fn has_voted(&self) -> bool {
        matches!(self.status, VoteStatus::Voted(_))
    }

    pub fn vote(&self) -> Option<&Vote> {
        match &self.status {
            VoteStatus::Voted(v) => Some(v),
            _ => None,
        }
    }
}

impl Snapshot {
    pub fn chain(&self, name: &str) -> Option<&ChainInfo> {
        self.chains.get(name)
    }

    pub fn wallet_vote(&self, chain: &str, proposal_id: &str, wallet: &str) -> Option<&WalletVote> {
        self.chains.get(chain)?.wallet_vote(proposal_id, wallet)
    }
}

impl ChainInfo {
    pub fn wallet_vote(&self, proposal_id: &str, wallet: &str) -> Option<&WalletVote> {
        self.proposals.get(proposal_id)?.votes.get(wallet)
    }
}
