//! DAO proposal-contract fetcher.
//!
//! Governance lives in a `dao-proposal-single` style contract and is read
//! with wasm smart queries: the JSON query is base64-encoded into the path
//! `/cosmwasm/wasm/v1/contract/{address}/smart/{query}` and the answer comes
//! back wrapped in `{"data": ...}`.
//!
//! Proposals come back as a single bounded page, so there is no cross-page
//! height to keep consistent.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{parse_amount, Fetcher};
use crate::http::{height_after, Fetched, LcdClient};
use crate::types::{
    ChainParams, Proposal, ProposalStatus, ProposalTally, QueryError, QueryErrors, Tally, Vote,
    VoteOption,
};

/// Upper bound of proposals returned by `list_proposals`.
pub const PROPOSALS_LIMIT: u32 = 1000;

// ─── Wire types ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SmartResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ProposalListWire {
    #[serde(default)]
    proposals: Vec<ProposalEntryWire>,
}

#[derive(Debug, Deserialize)]
struct ProposalEntryWire {
    id: u64,
    proposal: DaoProposalWire,
}

#[derive(Debug, Deserialize)]
struct DaoProposalWire {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    expiration: Option<ExpirationWire>,
    #[serde(default)]
    votes: Option<VotesWire>,
    #[serde(default)]
    total_power: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ExpirationWire {
    AtHeight(u64),
    /// Nanoseconds since the epoch, as a string.
    AtTime(String),
    Never {},
}

#[derive(Debug, Deserialize)]
struct VotesWire {
    #[serde(default)]
    yes: String,
    #[serde(default)]
    no: String,
    #[serde(default)]
    abstain: String,
}

#[derive(Debug, Deserialize)]
struct VoteInfoResponse {
    vote: Option<VoteInfoWire>,
}

#[derive(Debug, Deserialize)]
struct VoteInfoWire {
    vote: String,
}

// ─── Status mapping ─────────────────────────────────────────────────────────

pub fn map_status(raw: &str) -> ProposalStatus {
    match raw {
        "open" => ProposalStatus::Voting,
        "passed" | "executed" => ProposalStatus::Passed,
        "rejected" | "closed" => ProposalStatus::Rejected,
        "execution_failed" => ProposalStatus::Failed,
        other => ProposalStatus::Other(other.to_string()),
    }
}

fn expiration_time(expiration: Option<&ExpirationWire>) -> Option<DateTime<Utc>> {
    match expiration? {
        ExpirationWire::AtTime(nanos) => nanos.parse::<i64>().ok().map(|n| Utc.timestamp_nanos(n)),
        ExpirationWire::AtHeight(_) | ExpirationWire::Never {} => None,
    }
}

fn amount_or_zero(raw: &str) -> Result<Decimal, QueryError> {
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    parse_amount(raw, "vote power")
}

impl ProposalEntryWire {
    fn to_proposal(&self) -> Proposal {
        Proposal {
            id: self.id.to_string(),
            title: self.proposal.title.clone(),
            description: self.proposal.description.clone(),
            status: map_status(&self.proposal.status),
            voting_end_time: expiration_time(self.proposal.expiration.as_ref()),
        }
    }

    fn to_tally(&self) -> Result<ProposalTally, QueryError> {
        let tally = match &self.proposal.votes {
            Some(v) => Tally {
                yes: amount_or_zero(&v.yes)?,
                no: amount_or_zero(&v.no)?,
                no_with_veto: Decimal::ZERO,
                abstain: amount_or_zero(&v.abstain)?,
            },
            None => Tally::default(),
        };

        Ok(ProposalTally {
            proposal: self.to_proposal(),
            tally,
            total_voting_power: amount_or_zero(self.proposal.total_power.as_deref().unwrap_or(""))?,
        })
    }
}

/// Path of a smart query against `contract`.
pub fn smart_query_path(contract: &str, query: &serde_json::Value) -> String {
    format!(
        "/cosmwasm/wasm/v1/contract/{}/smart/{}",
        contract,
        URL_SAFE.encode(query.to_string())
    )
}

// ─── Fetcher ────────────────────────────────────────────────────────────────

pub struct DaoFetcher {
    chain: String,
    contract: String,
    client: LcdClient,
}

impl DaoFetcher {
    pub fn new(chain: &str, contract: &str, client: LcdClient) -> Self {
        Self {
            chain: chain.to_string(),
            contract: contract.to_string(),
            client,
        }
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: serde_json::Value,
        prev_height: u64,
    ) -> Result<Fetched<T>, QueryError> {
        let path = smart_query_path(&self.contract, &query);
        let fetched = self
            .client
            .get::<SmartResponse<T>>(&path, &height_after(prev_height))
            .await?;

        Ok(Fetched {
            value: fetched.value.data,
            height: fetched.height,
        })
    }

    /// Smart query for a single object; `None` when the contract says it
    /// does not exist.
    async fn lookup<T: DeserializeOwned>(
        &self,
        query: serde_json::Value,
        prev_height: u64,
    ) -> Result<Option<Fetched<T>>, QueryError> {
        let path = smart_query_path(&self.contract, &query);
        let fetched = self
            .client
            .lookup::<SmartResponse<T>>(&path, &height_after(prev_height))
            .await?;

        Ok(fetched.map(|f| Fetched {
            value: f.value.data,
            height: f.height,
        }))
    }

    async fn list_proposals(&self) -> Result<Vec<ProposalEntryWire>, QueryError> {
        let query = json!({ "list_proposals": { "limit": PROPOSALS_LIMIT } });
        let list = self.query::<ProposalListWire>(query, 0).await?;
        Ok(list.value.proposals)
    }
}

#[async_trait]
impl Fetcher for DaoFetcher {
    async fn get_all_proposals(&self, prev_height: u64) -> Result<(Vec<Proposal>, u64), QueryError> {
        let entries = self.list_proposals().await?;
        let proposals: Vec<Proposal> = entries.iter().map(ProposalEntryWire::to_proposal).collect();

        info!(chain = %self.chain, proposals = proposals.len(), "fetched all DAO proposals");
        Ok((proposals, prev_height))
    }

    async fn get_vote(
        &self,
        proposal_id: &str,
        voter: &str,
        prev_height: u64,
    ) -> Result<(Option<Vote>, u64), QueryError> {
        let numeric_id: u64 = proposal_id
            .parse()
            .map_err(|_| QueryError::api(format!("invalid DAO proposal id {:?}", proposal_id)))?;
        let query = json!({ "get_vote": { "proposal_id": numeric_id, "voter": voter } });

        let Some(resp) = self.lookup::<VoteInfoResponse>(query, prev_height).await? else {
            debug!(chain = %self.chain, proposal = proposal_id, voter = voter, "no DAO vote found");
            return Ok((None, prev_height));
        };

        let height = resp.height.map_or(prev_height, |h| h.max(prev_height));
        let vote = resp.value.vote.and_then(|info| {
            Vote::new(
                proposal_id,
                voter,
                vec![VoteOption {
                    option: info.vote.to_uppercase(),
                    weight: Decimal::ONE,
                }],
            )
        });

        Ok((vote, height))
    }

    async fn get_tallies(&self) -> Result<Vec<ProposalTally>, QueryErrors> {
        let entries = self.list_proposals().await.map_err(|e| QueryErrors(vec![e]))?;

        let mut tallies = Vec::new();
        let mut errors = Vec::new();
        for entry in entries.iter().filter(|e| map_status(&e.proposal.status) == ProposalStatus::Voting) {
            match entry.to_tally() {
                Ok(t) => tallies.push(t),
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(tallies)
        } else {
            Err(QueryErrors(errors))
        }
    }

    async fn get_chain_params(&self) -> Result<ChainParams, QueryErrors> {
        let (config, count) = futures::join!(
            self.query::<serde_json::Value>(json!({ "config": {} }), 0),
            self.query::<u64>(json!({ "proposal_count": {} }), 0),
        );

        let mut errors = Vec::new();
        let config = config.map_err(|e| errors.push(e)).ok();
        let count = count.map_err(|e| errors.push(e)).ok();

        let (Some(config), Some(count)) = (config, count) else {
            return Err(QueryErrors(errors));
        };

        let mut params = ChainParams {
            chain: self.chain.clone(),
            params: Vec::new(),
        };
        params.push("Proposal count", count.value.to_string());

        if let serde_json::Value::Object(fields) = config.value {
            for (key, value) in fields {
                let rendered = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                params.push(&humanize_key(&key), rendered);
            }
        }

        Ok(params)
    }
}

/// "max_voting_period" -> "Max voting period"
fn humanize_key(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
