//! Domain types shared by the fetch layer, the state snapshot and the reports.

mod chain;
mod error;
mod proposal;
mod tally;
mod vote;

pub use chain::{Chain, ChainKind, Explorer, Wallet};
pub use error::{NodeError, QueryError, QueryErrors};
pub use proposal::{Proposal, ProposalStatus};
pub use tally::{ChainParam, ChainParams, ProposalTally, Tally};
pub use vote::{Vote, VoteOption};
