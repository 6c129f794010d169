//! Snapshot diffing.
//!
//! | new status | previous status          | entry            |
//! |------------|--------------------------|------------------|
//! | Error      | any                      | VoteQueryError   |
//! | NotVoted   | any                      | NotVoted         |
//! | Voted      | missing, NotVoted, Error | Voted            |
//! | Voted      | Voted, other options     | Revoted          |
//! | Voted      | Voted, same options      | (nothing)        |
//!
//! A chain whose proposals could not be fetched yields a single
//! `ProposalsQueryError` and no wallet entries.

use std::sync::Arc;
use tracing::debug;

use super::ReportEntry;
use crate::state::{ChainInfo, Snapshot, VoteStatus, WalletVote};
use crate::types::{Chain, Proposal, Wallet};

/// Diff `previous` against `new`, walking chains in configured order.
pub fn generate(previous: &Snapshot, new: &Snapshot, chains: &[Arc<Chain>]) -> Vec<ReportEntry> {
    let mut entries = Vec::new();

    for chain in chains {
        let Some(info) = new.chain(&chain.name) else {
            continue;
        };
        diff_chain(chain, previous.chain(&chain.name), info, &mut entries);
    }

    debug!(entries = entries.len(), "report generated");
    entries
}

fn diff_chain(
    chain: &Arc<Chain>,
    previous: Option<&ChainInfo>,
    info: &ChainInfo,
    entries: &mut Vec<ReportEntry>,
) {
    if let Some(error) = &info.proposals_error {
        entries.push(ReportEntry::ProposalsQueryError {
            chain: chain.clone(),
            error: error.clone(),
        });
        return;
    }

    if let Some(previous) = previous {
        for (id, prev) in &previous.proposals {
            if !info.proposals.contains_key(id) {
                entries.push(ReportEntry::FinishedVoting {
                    chain: chain.clone(),
                    proposal: prev.proposal.clone(),
                });
            }
        }
    }

    for (id, proposal_votes) in &info.proposals {
        for (address, current) in &proposal_votes.votes {
            let wallet = chain
                .find_wallet(address)
                .cloned()
                .unwrap_or_else(|| Wallet::new(address));
            let prev = previous
                .and_then(|p| p.proposals.get(id))
                .and_then(|p| p.votes.get(address));

            if let Some(entry) = classify(chain, &proposal_votes.proposal, wallet, current, prev) {
                entries.push(entry);
            }
        }
    }
}

fn classify(
    chain: &Arc<Chain>,
    proposal: &Proposal,
    wallet: Wallet,
    current: &WalletVote,
    prev: Option<&WalletVote>,
) -> Option<ReportEntry> {
    let chain = chain.clone();
    let proposal = proposal.clone();

    match &current.status {
        VoteStatus::Error(error) => Some(ReportEntry::VoteQueryError {
            chain,
            proposal,
            wallet,
            error: error.clone(),
        }),
        VoteStatus::NotVoted => Some(ReportEntry::NotVoted {
            chain,
            proposal,
            wallet,
        }),
        VoteStatus::Voted(vote) => match prev.and_then(WalletVote::vote) {
            None => Some(ReportEntry::Voted {
                chain,
                proposal,
                wallet,
                vote: vote.clone(),
            }),
            Some(old) if !old.same_options(vote) => Some(ReportEntry::Revoted {
                chain,
                proposal,
                wallet,
                vote: vote.clone(),
                old_vote: old.clone(),
            }),
            Some(_) => None,
        },
    }
}
