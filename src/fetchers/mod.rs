//! Governance data fetchers.
//!
//! Chains expose governance either through the Cosmos SDK `x/gov` REST
//! gateway (`cosmos`) or through a DAO proposal contract queried with wasm
//! smart queries (`dao`). Both are hidden behind the `Fetcher` trait so the
//! state generator never cares which one it talks to.

pub mod cosmos;
pub mod dao;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::http::LcdClient;
use crate::types::{Chain, ChainKind, ChainParams, Proposal, ProposalTally, QueryError, QueryErrors, Vote};

pub use cosmos::CosmosFetcher;
pub use dao::DaoFetcher;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Every proposal known to the chain, with the highest block height the
    /// answer was served at (never lower than `prev_height`).
    async fn get_all_proposals(&self, prev_height: u64) -> Result<(Vec<Proposal>, u64), QueryError>;

    /// The wallet's vote on a proposal, `None` if it has not voted.
    async fn get_vote(
        &self,
        proposal_id: &str,
        voter: &str,
        prev_height: u64,
    ) -> Result<(Option<Vote>, u64), QueryError>;

    /// Tallies of all proposals currently in voting.
    async fn get_tallies(&self) -> Result<Vec<ProposalTally>, QueryErrors>;

    async fn get_chain_params(&self) -> Result<ChainParams, QueryErrors>;
}

pub fn build_fetcher(chain: &Chain, timeout: Duration) -> Arc<dyn Fetcher> {
    let client = LcdClient::new(&chain.name, chain.lcd_endpoints.clone(), timeout);
    match chain.kind {
        ChainKind::Cosmos => Arc::new(CosmosFetcher::new(&chain.name, client)),
        ChainKind::Dao => Arc::new(DaoFetcher::new(&chain.name, &chain.dao_address, client)),
    }
}

/// Split the results of concurrent sub-queries into values or all their errors.
fn collect_results<T>(results: Vec<Result<T, QueryError>>) -> Result<Vec<T>, QueryErrors> {
    let mut values = Vec::with_capacity(results.len());
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(v) => values.push(v),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(QueryErrors(errors))
    }
}

fn parse_amount(raw: &str, what: &str) -> Result<rust_decimal::Decimal, QueryError> {
    use std::str::FromStr;
    rust_decimal::Decimal::from_str(raw.trim())
        .map_err(|e| QueryError::api(format!("invalid {} {:?}: {}", what, raw, e)))
}

/// "1209600s" style protobuf durations, rendered as days/hours/minutes.
fn format_proto_duration(raw: &str) -> String {
    let secs = match raw.trim_end_matches('s').parse::<f64>() {
        Ok(s) => s as u64,
        Err(_) => return raw.to_string(),
    };
    format_secs(secs)
}

fn format_secs(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 || parts.is_empty() {
        parts.push(format!("{}m", minutes));
    }
    parts.join(" ")
}
