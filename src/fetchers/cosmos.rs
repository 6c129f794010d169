//! Cosmos SDK `x/gov` fetcher (v1beta1 REST gateway).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use super::{collect_results, format_proto_duration, parse_amount, Fetcher};
use crate::http::{accept_all, height_after, LcdClient};
use crate::types::{
    ChainParams, Proposal, ProposalStatus, ProposalTally, QueryError, QueryErrors, Tally, Vote,
    VoteOption,
};

/// Proposals requested per page.
pub const PAGE_LIMIT: usize = 100;

// ─── Wire types ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ProposalsResponse {
    #[serde(default)]
    proposals: Vec<ProposalWire>,
}

#[derive(Debug, Deserialize)]
struct ProposalWire {
    proposal_id: String,
    #[serde(default)]
    content: Option<ContentWire>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    voting_end_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentWire {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct VoteResponse {
    vote: Option<VoteWire>,
}

#[derive(Debug, Deserialize)]
struct VoteWire {
    #[serde(default)]
    option: Option<String>,
    #[serde(default)]
    options: Vec<VoteOptionWire>,
}

#[derive(Debug, Deserialize)]
struct VoteOptionWire {
    option: String,
    weight: String,
}

#[derive(Debug, Deserialize)]
struct TallyResponse {
    tally: TallyWire,
}

#[derive(Debug, Deserialize)]
struct TallyWire {
    yes: String,
    no: String,
    no_with_veto: String,
    abstain: String,
}

#[derive(Debug, Deserialize)]
struct PoolResponse {
    pool: PoolWire,
}

#[derive(Debug, Deserialize)]
struct PoolWire {
    bonded_tokens: String,
}

#[derive(Debug, Deserialize)]
struct VotingParamsResponse {
    voting_params: VotingParamsWire,
}

#[derive(Debug, Deserialize)]
struct VotingParamsWire {
    voting_period: String,
}

#[derive(Debug, Deserialize)]
struct DepositParamsResponse {
    deposit_params: DepositParamsWire,
}

#[derive(Debug, Deserialize)]
struct DepositParamsWire {
    #[serde(default)]
    min_deposit: Vec<CoinWire>,
    max_deposit_period: String,
}

#[derive(Debug, Deserialize)]
struct CoinWire {
    denom: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct TallyParamsResponse {
    tally_params: TallyParamsWire,
}

#[derive(Debug, Deserialize)]
struct TallyParamsWire {
    quorum: String,
    threshold: String,
    veto_threshold: String,
}

// ─── Status / option mapping ────────────────────────────────────────────────

pub fn map_status(raw: &str) -> ProposalStatus {
    match raw {
        "PROPOSAL_STATUS_VOTING_PERIOD" => ProposalStatus::Voting,
        "PROPOSAL_STATUS_DEPOSIT_PERIOD" => ProposalStatus::Deposit,
        "PROPOSAL_STATUS_PASSED" => ProposalStatus::Passed,
        "PROPOSAL_STATUS_REJECTED" => ProposalStatus::Rejected,
        "PROPOSAL_STATUS_FAILED" => ProposalStatus::Failed,
        other => ProposalStatus::Other(other.to_string()),
    }
}

/// "VOTE_OPTION_NO_WITH_VETO" -> "NO_WITH_VETO"
fn normalize_option(raw: &str) -> String {
    raw.trim_start_matches("VOTE_OPTION_").to_string()
}

fn parse_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl ProposalWire {
    fn into_proposal(self) -> Proposal {
        let (title, description) = match self.content {
            Some(c) => (c.title, c.description),
            None => (String::new(), String::new()),
        };

        Proposal {
            status: map_status(&self.status),
            voting_end_time: parse_time(self.voting_end_time.as_deref()),
            id: self.proposal_id,
            title,
            description,
        }
    }
}

impl VoteWire {
    fn into_vote(self, proposal_id: &str, voter: &str) -> Result<Option<Vote>, QueryError> {
        let mut options = Vec::with_capacity(self.options.len());
        for o in self.options {
            options.push(VoteOption {
                option: normalize_option(&o.option),
                weight: parse_amount(&o.weight, "vote weight")?,
            });
        }

        // Nodes predating split votes only fill the single `option` field
        if options.is_empty() {
            if let Some(option) = self.option.filter(|o| o != "VOTE_OPTION_UNSPECIFIED" && !o.is_empty()) {
                options.push(VoteOption {
                    option: normalize_option(&option),
                    weight: Decimal::ONE,
                });
            }
        }

        Ok(Vote::new(proposal_id, voter, options))
    }
}

// ─── Fetcher ────────────────────────────────────────────────────────────────

pub struct CosmosFetcher {
    chain: String,
    client: LcdClient,
    page_limit: usize,
}

impl CosmosFetcher {
    pub fn new(chain: &str, client: LcdClient) -> Self {
        Self {
            chain: chain.to_string(),
            client,
            page_limit: PAGE_LIMIT,
        }
    }

    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    async fn get_tally(&self, proposal_id: &str) -> Result<Tally, QueryError> {
        let path = format!("/cosmos/gov/v1beta1/proposals/{}/tally", proposal_id);
        let resp = self.client.get::<TallyResponse>(&path, &accept_all()).await?;
        let t = resp.value.tally;

        Ok(Tally {
            yes: parse_amount(&t.yes, "tally")?,
            no: parse_amount(&t.no, "tally")?,
            no_with_veto: parse_amount(&t.no_with_veto, "tally")?,
            abstain: parse_amount(&t.abstain, "tally")?,
        })
    }

    async fn get_bonded_tokens(&self) -> Result<Decimal, QueryError> {
        let resp = self
            .client
            .get::<PoolResponse>("/cosmos/staking/v1beta1/pool", &accept_all())
            .await?;
        parse_amount(&resp.value.pool.bonded_tokens, "bonded tokens")
    }
}

#[async_trait]
impl Fetcher for CosmosFetcher {
    async fn get_all_proposals(&self, prev_height: u64) -> Result<(Vec<Proposal>, u64), QueryError> {
        let mut proposals = Vec::new();
        let mut height = prev_height;
        let mut offset = 0usize;

        loop {
            let path = format!(
                "/cosmos/gov/v1beta1/proposals?pagination.limit={}&pagination.offset={}",
                self.page_limit, offset
            );

            // Every page must come from a node at least as far as the
            // previous pages, otherwise the list could be inconsistent.
            // Any failure drops the pages fetched so far.
            let page = self
                .client
                .get::<ProposalsResponse>(&path, &height_after(height))
                .await?;

            if let Some(h) = page.height {
                height = height.max(h);
            }

            let count = page.value.proposals.len();
            proposals.extend(page.value.proposals.into_iter().map(ProposalWire::into_proposal));
            offset += count;

            debug!(chain = %self.chain, offset = offset, page = count, height = height, "fetched proposals page");

            if count < self.page_limit {
                break;
            }
        }

        info!(chain = %self.chain, proposals = proposals.len(), height = height, "fetched all proposals");
        Ok((proposals, height))
    }

    async fn get_vote(
        &self,
        proposal_id: &str,
        voter: &str,
        prev_height: u64,
    ) -> Result<(Option<Vote>, u64), QueryError> {
        let path = format!("/cosmos/gov/v1beta1/proposals/{}/votes/{}", proposal_id, voter);

        let Some(resp) = self
            .client
            .lookup::<VoteResponse>(&path, &height_after(prev_height))
            .await?
        else {
            debug!(chain = %self.chain, proposal = proposal_id, voter = voter, "no vote found");
            return Ok((None, prev_height));
        };

        let height = resp.height.map_or(prev_height, |h| h.max(prev_height));
        let vote = match resp.value.vote {
            Some(wire) => wire.into_vote(proposal_id, voter)?,
            None => None,
        };
        Ok((vote, height))
    }

    async fn get_tallies(&self) -> Result<Vec<ProposalTally>, QueryErrors> {
        let (proposals, _) = self
            .get_all_proposals(0)
            .await
            .map_err(|e| QueryErrors(vec![e]))?;
        let voting: Vec<Proposal> = proposals.into_iter().filter(|p| p.is_in_voting()).collect();

        let (bonded, tallies) = futures::join!(
            self.get_bonded_tokens(),
            join_all(voting.iter().map(|p| self.get_tally(&p.id)))
        );

        let bonded = bonded.map_err(|e| vec![e]);
        let tallies = collect_results(tallies);

        match (bonded, tallies) {
            (Ok(total_voting_power), Ok(tallies)) => Ok(voting
                .into_iter()
                .zip(tallies)
                .map(|(proposal, tally)| ProposalTally {
                    proposal,
                    tally,
                    total_voting_power,
                })
                .collect()),
            (bonded, tallies) => {
                let mut errors = bonded.err().unwrap_or_default();
                if let Err(QueryErrors(mut more)) = tallies {
                    errors.append(&mut more);
                }
                Err(QueryErrors(errors))
            }
        }
    }

    async fn get_chain_params(&self) -> Result<ChainParams, QueryErrors> {
        let accept = accept_all();
        let (voting, deposit, tallying) = futures::join!(
            self.client
                .get::<VotingParamsResponse>("/cosmos/gov/v1beta1/params/voting", &accept),
            self.client
                .get::<DepositParamsResponse>("/cosmos/gov/v1beta1/params/deposit", &accept),
            self.client
                .get::<TallyParamsResponse>("/cosmos/gov/v1beta1/params/tallying", &accept),
        );

        let mut errors = Vec::new();
        let voting = voting.map_err(|e| errors.push(e)).ok();
        let deposit = deposit.map_err(|e| errors.push(e)).ok();
        let tallying = tallying.map_err(|e| errors.push(e)).ok();

        let (Some(voting), Some(deposit), Some(tallying)) = (voting, deposit, tallying) else {
            return Err(QueryErrors(errors));
        };

        let mut params = ChainParams {
            chain: self.chain.clone(),
            params: Vec::new(),
        };

        params.push("Voting period", format_proto_duration(&voting.value.voting_params.voting_period));
        params.push(
            "Max deposit period",
            format_proto_duration(&deposit.value.deposit_params.max_deposit_period),
        );
        let min_deposit: Vec<String> = deposit
            .value
            .deposit_params
            .min_deposit
            .iter()
            .map(|c| format!("{} {}", c.amount, c.denom))
            .collect();
        params.push("Min deposit", min_deposit.join(", "));

        let t = &tallying.value.tally_params;
        for (description, raw) in [
            ("Quorum", &t.quorum),
            ("Threshold", &t.threshold),
            ("Veto threshold", &t.veto_threshold),
        ] {
            let pct = parse_amount(raw, description)
                .map_err(|e| QueryErrors(vec![e]))?
                * Decimal::ONE_HUNDRED;
            params.push(description, format!("{}%", pct.round_dp(2).normalize()));
        }

        Ok(params)
    }
}
