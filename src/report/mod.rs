//! Typed events produced by diffing two snapshots.

pub mod generator;

use std::fmt;
use std::sync::Arc;

use crate::types::{Chain, Proposal, QueryError, Vote, Wallet};

pub use generator::generate;

#[derive(Debug, Clone, PartialEq)]
pub enum ReportEntry {
    /// Proposals could not be fetched for the chain at all.
    ProposalsQueryError { chain: Arc<Chain>, error: QueryError },
    /// A proposal left the voting period since the previous run.
    FinishedVoting { chain: Arc<Chain>, proposal: Proposal },
    VoteQueryError {
        chain: Arc<Chain>,
        proposal: Proposal,
        wallet: Wallet,
        error: QueryError,
    },
    NotVoted {
        chain: Arc<Chain>,
        proposal: Proposal,
        wallet: Wallet,
    },
    Voted {
        chain: Arc<Chain>,
        proposal: Proposal,
        wallet: Wallet,
        vote: Vote,
    },
    Revoted {
        chain: Arc<Chain>,
        proposal: Proposal,
        wallet: Wallet,
        vote: Vote,
        old_vote: Vote,
    },
    /// Anything else that went wrong for a chain, e.g. the store.
    GenericError { chain: Arc<Chain>, error: String },
}

impl ReportEntry {
    /// Stable name, used to pick templates and tag outgoing payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ReportEntry::ProposalsQueryError { .. } => "proposals_query_error",
            ReportEntry::FinishedVoting { .. } => "finished_voting",
            ReportEntry::VoteQueryError { .. } => "vote_query_error",
            ReportEntry::NotVoted { .. } => "not_voted",
            ReportEntry::Voted { .. } => "voted",
            ReportEntry::Revoted { .. } => "revoted",
            ReportEntry::GenericError { .. } => "generic_error",
        }
    }

    /// Entries about a single wallet's vote; incident channels only track these.
    pub fn is_alert(&self) -> bool {
        match self {
            ReportEntry::VoteQueryError { .. }
            | ReportEntry::NotVoted { .. }
            | ReportEntry::Voted { .. }
            | ReportEntry::Revoted { .. } => true,
            ReportEntry::ProposalsQueryError { .. }
            | ReportEntry::FinishedVoting { .. }
            | ReportEntry::GenericError { .. } => false,
        }
    }

    pub fn chain(&self) -> &Arc<Chain> {
        match self {
            ReportEntry::ProposalsQueryError { chain, .. }
            | ReportEntry::FinishedVoting { chain, .. }
            | ReportEntry::VoteQueryError { chain, .. }
            | ReportEntry::NotVoted { chain, .. }
            | ReportEntry::Voted { chain, .. }
            | ReportEntry::Revoted { chain, .. }
            | ReportEntry::GenericError { chain, .. } => chain,
        }
    }

    pub fn proposal(&self) -> Option<&Proposal> {
        match self {
            ReportEntry::FinishedVoting { proposal, .. }
            | ReportEntry::VoteQueryError { proposal, .. }
            | ReportEntry::NotVoted { proposal, .. }
            | ReportEntry::Voted { proposal, .. }
            | ReportEntry::Revoted { proposal, .. } => Some(proposal),
            ReportEntry::ProposalsQueryError { .. } | ReportEntry::GenericError { .. } => None,
        }
    }

    pub fn wallet(&self) -> Option<&Wallet> {
        match self {
            ReportEntry::VoteQueryError { wallet, .. }
            | ReportEntry::NotVoted { wallet, .. }
            | ReportEntry::Voted { wallet, .. }
            | ReportEntry::Revoted { wallet, .. } => Some(wallet),
            _ => None,
        }
    }

    /// (chain name, proposal id) for entries that concern one proposal.
    /// Only these can be muted.
    pub fn proposal_context(&self) -> Option<(&str, &str)> {
        self.proposal()
            .map(|p| (self.chain().name.as_str(), p.id.as_str()))
    }

    pub fn error(&self) -> Option<String> {
        match self {
            ReportEntry::ProposalsQueryError { error, .. }
            | ReportEntry::VoteQueryError { error, .. } => Some(error.to_string()),
            ReportEntry::GenericError { error, .. } => Some(error.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain = &self.chain().name;
        match self {
            ReportEntry::ProposalsQueryError { error, .. } => {
                write!(f, "[{}] failed to fetch proposals: {}", chain, error)
            }
            ReportEntry::FinishedVoting { proposal, .. } => {
                write!(f, "[{}] voting on #{} finished", chain, proposal.id)
            }
            ReportEntry::VoteQueryError {
                proposal,
                wallet,
                error,
                ..
            } => write!(
                f,
                "[{}] failed to fetch vote of {} on #{}: {}",
                chain, wallet, proposal.id, error
            ),
            ReportEntry::NotVoted {
                proposal, wallet, ..
            } => write!(f, "[{}] {} has not voted on #{}", chain, wallet, proposal.id),
            ReportEntry::Voted {
                proposal,
                wallet,
                vote,
                ..
            } => write!(f, "[{}] {} voted {} on #{}", chain, wallet, vote, proposal.id),
            ReportEntry::Revoted {
                proposal,
                wallet,
                vote,
                old_vote,
                ..
            } => write!(
                f,
                "[{}] {} changed vote on #{} from {} to {}",
                chain, wallet, proposal.id, old_vote, vote
            ),
            ReportEntry::GenericError { error, .. } => write!(f, "[{}] error: {}", chain, error),
        }
    }
}
