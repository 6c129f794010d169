//! Builds a fresh `Snapshot` from the network.
//!
//! Chains are processed concurrently; within a chain whose proposals were
//! fetched, every (proposal in voting, wallet) pair is queried concurrently.
//! Results land in one shared snapshot behind a mutex that is only held for
//! the individual write, never across a request.
//!
//! Failures stay local: a chain whose proposals cannot be fetched keeps its
//! previous votes, a wallet whose vote cannot be fetched gets an error entry,
//! and everything else proceeds normally.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{ChainInfo, ProposalVotes, Snapshot, WalletVote};
use crate::fetchers::Fetcher;
use crate::types::{Chain, Proposal, Wallet};

pub struct StateGenerator {
    chains: Vec<(Arc<Chain>, Arc<dyn Fetcher>)>,
}

impl StateGenerator {
    pub fn new(chains: Vec<(Arc<Chain>, Arc<dyn Fetcher>)>) -> Self {
        Self { chains }
    }

    /// Fetch everything and return the finished snapshot once all requests
    /// have completed.
    pub async fn generate(&self, previous: &Snapshot) -> Snapshot {
        let started = Instant::now();
        let state = Mutex::new(Snapshot::default());
        let empty = ChainInfo::default();

        join_all(self.chains.iter().map(|(chain, fetcher)| {
            let prev = previous.chain(&chain.name).unwrap_or(&empty);
            self.process_chain(chain, fetcher.as_ref(), prev, &state)
        }))
        .await;

        let snapshot = state.into_inner();
        info!(
            chains = snapshot.chains.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generated new state"
        );
        snapshot
    }

    async fn process_chain(
        &self,
        chain: &Chain,
        fetcher: &dyn Fetcher,
        prev: &ChainInfo,
        state: &Mutex<Snapshot>,
    ) {
        let proposals = match fetcher.get_all_proposals(prev.height).await {
            Ok((proposals, height)) => {
                let voting: Vec<Proposal> = proposals.into_iter().filter(Proposal::is_in_voting).collect();
                info!(chain = %chain.name, voting = voting.len(), height = height, "proposals fetched");

                let info = ChainInfo {
                    height,
                    proposals_error: None,
                    proposals: voting
                        .iter()
                        .map(|p| {
                            (
                                p.id.clone(),
                                ProposalVotes {
                                    proposal: p.clone(),
                                    votes: BTreeMap::new(),
                                },
                            )
                        })
                        .collect(),
                };
                state.lock().await.chains.insert(chain.name.clone(), info);
                voting
            }
            Err(e) => {
                warn!(chain = %chain.name, error = %e, "failed to fetch proposals, keeping previous votes");

                // Keep the last known votes instead of forgetting them
                // because of a transient outage.
                let carried = ChainInfo {
                    proposals_error: Some(e),
                    ..prev.clone()
                };
                state.lock().await.chains.insert(chain.name.clone(), carried);
                return;
            }
        };

        let pairs = proposals
            .iter()
            .flat_map(|p| chain.wallets.iter().map(move |w| (p, w)));

        join_all(pairs.map(|(proposal, wallet)| {
            self.process_vote(chain, fetcher, proposal, wallet, prev, state)
        }))
        .await;
    }

    async fn process_vote(
        &self,
        chain: &Chain,
        fetcher: &dyn Fetcher,
        proposal: &Proposal,
        wallet: &Wallet,
        prev: &ChainInfo,
        state: &Mutex<Snapshot>,
    ) {
        let prev_vote = prev.wallet_vote(&proposal.id, &wallet.address);
        let prev_height = prev_vote.map_or(0, |v| v.height);

        let result = fetcher.get_vote(&proposal.id, &wallet.address, prev_height).await;

        let entry = match (&result, prev_vote) {
            // Votes can show up late on some nodes; a confirmed vote never
            // goes back to "not voted".
            (Ok((None, _)), Some(prev)) if prev.has_voted() => {
                debug!(
                    chain = %chain.name,
                    proposal = %proposal.id,
                    wallet = %wallet.address,
                    "node reports no vote but one was seen before, keeping it"
                );
                prev.clone()
            }
            _ => {
                if let Err(e) = &result {
                    warn!(
                        chain = %chain.name,
                        proposal = %proposal.id,
                        wallet = %wallet.address,
                        error = %e,
                        "failed to fetch vote"
                    );
                }
                WalletVote::from_result(result, prev_height)
            }
        };

        let mut state = state.lock().await;
        let info = state.chains.entry(chain.name.clone()).or_default();
        info.proposals
            .entry(proposal.id.clone())
            .or_insert_with(|| ProposalVotes {
                proposal: proposal.clone(),
                votes: BTreeMap::new(),
            })
            .votes
            .insert(wallet.address.clone(), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::VoteStatus;
    use crate::testing::{chain, voting_proposal, FakeFetcher};
    use crate::types::{NodeError, ProposalStatus, QueryError, Vote};

    fn generator(entries: Vec<(Arc<Chain>, Arc<FakeFetcher>)>) -> StateGenerator {
        StateGenerator::new(
            entries
                .into_iter()
                .map(|(c, f)| (c, f as Arc<dyn Fetcher>))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_only_voting_proposals_are_checked() {
        let fetcher = Arc::new(FakeFetcher::new());
        let mut passed = voting_proposal("1");
        passed.status = ProposalStatus::Passed;
        fetcher.set_proposals(vec![passed, voting_proposal("2")], 100);
        fetcher.set_vote("2", "w1", Some("YES"));

        let gen = generator(vec![(chain("c1", &["w1", "w2"]), fetcher.clone())]);
        let snapshot = gen.generate(&Snapshot::default()).await;

        let info = snapshot.chain("c1").unwrap();
        assert_eq!(info.height, 100);
        assert_eq!(info.proposals.len(), 1);
        assert!(snapshot.wallet_vote("c1", "2", "w1").unwrap().has_voted());
        assert_eq!(
            snapshot.wallet_vote("c1", "2", "w2").unwrap().status,
            VoteStatus::NotVoted
        );
        assert_eq!(fetcher.proposal_floors(), vec![0]);
    }

    #[tokio::test]
    async fn test_previous_vote_survives_lagging_node() {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.set_proposals(vec![voting_proposal("1")], 100);

        let mut previous = Snapshot::default();
        let mut prev_info = ChainInfo {
            height: 90,
            ..Default::default()
        };
        let mut votes = BTreeMap::new();
        let prev_entry = WalletVote {
            status: VoteStatus::Voted(Vote::single("1", "w1", "YES")),
            height: 85,
        };
        votes.insert("w1".to_string(), prev_entry.clone());
        votes.insert(
            "w2".to_string(),
            WalletVote {
                status: VoteStatus::NotVoted,
                height: 70,
            },
        );
        prev_info.proposals.insert(
            "1".to_string(),
            ProposalVotes {
                proposal: voting_proposal("1"),
                votes,
            },
        );
        previous.chains.insert("c1".to_string(), prev_info);

        let gen = generator(vec![(chain("c1", &["w1", "w2"]), fetcher.clone())]);
        let snapshot = gen.generate(&previous).await;

        // w1 unchanged, vote and height
        assert_eq!(snapshot.wallet_vote("c1", "1", "w1"), Some(&prev_entry));
        assert_eq!(
            snapshot.wallet_vote("c1", "1", "w2").unwrap().status,
            VoteStatus::NotVoted
        );

        // chain-wide floor for proposals, per-wallet floor for votes
        assert_eq!(fetcher.proposal_floors(), vec![90]);
        let mut seen = fetcher.vote_floors();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("1".to_string(), "w1".to_string(), 85),
                ("1".to_string(), "w2".to_string(), 70)
            ]
        );
    }

    #[tokio::test]
    async fn test_proposals_failure_carries_previous_state() {
        let failing = Arc::new(FakeFetcher::new());
        failing.fail_proposals(QueryError::Nodes(vec![NodeError {
            endpoint: "https://lcd".to_string(),
            error: "timeout".to_string(),
        }]));
        let healthy = Arc::new(FakeFetcher::new());
        healthy.set_proposals(vec![voting_proposal("5")], 10);

        let mut previous = Snapshot::default();
        let mut prev_info = ChainInfo {
            height: 42,
            ..Default::default()
        };
        let mut votes = BTreeMap::new();
        votes.insert(
            "w1".to_string(),
            WalletVote {
                status: VoteStatus::NotVoted,
                height: 40,
            },
        );
        prev_info.proposals.insert(
            "1".to_string(),
            ProposalVotes {
                proposal: voting_proposal("1"),
                votes,
            },
        );
        previous.chains.insert("c1".to_string(), prev_info.clone());

        let gen = generator(vec![
            (chain("c1", &["w1"]), failing.clone()),
            (chain("c2", &["w9"]), healthy),
        ]);
        let snapshot = gen.generate(&previous).await;

        let info = snapshot.chain("c1").unwrap();
        assert!(info.proposals_error.is_some());
        assert_eq!(info.height, 42);
        assert_eq!(info.proposals, prev_info.proposals);
        assert!(failing.vote_floors().is_empty());

        let other = snapshot.chain("c2").unwrap();
        assert!(other.proposals_error.is_none());
        assert_eq!(
            snapshot.wallet_vote("c2", "5", "w9").unwrap().status,
            VoteStatus::NotVoted
        );
    }

    #[tokio::test]
    async fn test_vote_error_is_recorded() {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.set_proposals(vec![voting_proposal("1")], 100);
        fetcher.fail_vote("1", "w1", QueryError::api("internal"));

        let gen = generator(vec![(chain("c1", &["w1"]), fetcher)]);
        let snapshot = gen.generate(&Snapshot::default()).await;

        assert_eq!(
            snapshot.wallet_vote("c1", "1", "w1").unwrap().status,
            VoteStatus::Error(QueryError::api("internal"))
        );
    }
}
