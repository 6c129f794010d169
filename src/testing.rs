//! In-memory fakes shared by unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::fetchers::Fetcher;
use crate::mutes::{mute_key, Mute};
use crate::state::ChainInfo;
use crate::store::Store;
use crate::types::{
    Chain, ChainKind, ChainParams, Explorer, Proposal, ProposalStatus, ProposalTally, QueryError,
    QueryErrors, Vote, Wallet,
};

pub fn chain(name: &str, wallets: &[&str]) -> Arc<Chain> {
    Arc::new(Chain {
        name: name.to_string(),
        pretty_name: name.to_uppercase(),
        lcd_endpoints: vec![format!("https://lcd.{}.test", name)],
        kind: ChainKind::Cosmos,
        dao_address: String::new(),
        wallets: wallets.iter().map(|w| Wallet::new(w)).collect(),
        explorer: Explorer {
            proposal_link_pattern: format!("https://explorer.test/{}/gov/{{id}}", name),
            wallet_link_pattern: format!("https://explorer.test/{}/account/{{address}}", name),
        },
    })
}

pub fn voting_proposal(id: &str) -> Proposal {
    Proposal {
        id: id.to_string(),
        title: format!("Proposal {}", id),
        description: String::new(),
        status: ProposalStatus::Voting,
        voting_end_time: None,
    }
}

struct FakeState {
    proposals: Result<Vec<Proposal>, QueryError>,
    height: u64,
    votes: HashMap<(String, String), Result<Option<Vote>, QueryError>>,
    proposal_floors: Vec<u64>,
    vote_floors: Vec<(String, String, u64)>,
}

/// Scriptable `Fetcher`: answers from canned proposals and votes and records
/// the height floors it was called with.
pub struct FakeFetcher {
    state: Mutex<FakeState>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                proposals: Ok(Vec::new()),
                height: 0,
                votes: HashMap::new(),
                proposal_floors: Vec::new(),
                vote_floors: Vec::new(),
            }),
        }
    }

    pub fn set_proposals(&self, proposals: Vec<Proposal>, height: u64) {
        let mut state = self.state.lock().unwrap();
        state.proposals = Ok(proposals);
        state.height = height;
    }

    pub fn fail_proposals(&self, error: QueryError) {
        self.state.lock().unwrap().proposals = Err(error);
    }

    pub fn set_vote(&self, proposal_id: &str, voter: &str, option: Option<&str>) {
        let vote = option.map(|o| Vote::single(proposal_id, voter, o));
        self.state
            .lock()
            .unwrap()
            .votes
            .insert((proposal_id.to_string(), voter.to_string()), Ok(vote));
    }

    pub fn fail_vote(&self, proposal_id: &str, voter: &str, error: QueryError) {
        self.state
            .lock()
            .unwrap()
            .votes
            .insert((proposal_id.to_string(), voter.to_string()), Err(error));
    }

    pub fn proposal_floors(&self) -> Vec<u64> {
        self.state.lock().unwrap().proposal_floors.clone()
    }

    pub fn vote_floors(&self) -> Vec<(String, String, u64)> {
        self.state.lock().unwrap().vote_floors.clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn get_all_proposals(&self, prev_height: u64) -> Result<(Vec<Proposal>, u64), QueryError> {
        let mut state = self.state.lock().unwrap();
        state.proposal_floors.push(prev_height);
        let height = state.height.max(prev_height);
        state.proposals.clone().map(|p| (p, height))
    }

    async fn get_vote(
        &self,
        proposal_id: &str,
        voter: &str,
        prev_height: u64,
    ) -> Result<(Option<Vote>, u64), QueryError> {
        let mut state = self.state.lock().unwrap();
        state
            .vote_floors
            .push((proposal_id.to_string(), voter.to_string(), prev_height));
        let height = state.height.max(prev_height);
        state
            .votes
            .get(&(proposal_id.to_string(), voter.to_string()))
            .cloned()
            .unwrap_or(Ok(None))
            .map(|v| (v, height))
    }

    async fn get_tallies(&self) -> Result<Vec<ProposalTally>, QueryErrors> {
        Ok(Vec::new())
    }

    async fn get_chain_params(&self) -> Result<ChainParams, QueryErrors> {
        Ok(ChainParams {
            chain: "fake".to_string(),
            params: Vec::new(),
        })
    }
}

#[derive(Default)]
struct MemoryState {
    chains: HashMap<String, ChainInfo>,
    mutes: Vec<Mute>,
    fail_loads: bool,
    fail_commits: bool,
}

/// `Store` kept in memory. Clones share the same contents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn fail_loads(&self, fail: bool) {
        self.state.lock().unwrap().fail_loads = fail;
    }

    pub fn fail_commits(&self, fail: bool) {
        self.state.lock().unwrap().fail_commits = fail;
    }

    pub fn committed(&self, chain: &str) -> Option<ChainInfo> {
        self.state.lock().unwrap().chains.get(chain).cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_chain_state(&self, chain: &str) -> anyhow::Result<Option<ChainInfo>> {
        let state = self.state.lock().unwrap();
        if state.fail_loads {
            anyhow::bail!("store unavailable");
        }
        Ok(state.chains.get(chain).cloned())
    }

    async fn commit_chain_state(&self, chain: &str, info: &ChainInfo) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_commits {
            anyhow::bail!("store unavailable");
        }
        state.chains.insert(chain.to_string(), info.clone());
        Ok(())
    }

    async fn load_mutes(&self) -> anyhow::Result<Vec<Mute>> {
        Ok(self.state.lock().unwrap().mutes.clone())
    }

    async fn upsert_mute(&self, mute: &Mute) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        let key = mute.key();
        state.mutes.retain(|m| m.key() != key);
        state.mutes.push(mute.clone());
        Ok(())
    }

    async fn delete_mute(&self, chain: Option<&str>, proposal_id: Option<&str>) -> anyhow::Result<bool> {
        let mut state = self.state.lock().unwrap();
        let key = mute_key(chain, proposal_id);
        let before = state.mutes.len();
        state.mutes.retain(|m| m.key() != key);
        Ok(state.mutes.len() != before)
    }
}
