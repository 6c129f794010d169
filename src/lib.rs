//! Governance vote watcher for Cosmos SDK chains and DAO contracts.
//!
//! Polls every configured chain for proposals in voting, checks whether the
//! watched wallets have voted, and reports what changed since the last run.

pub mod app;
pub mod config;
pub mod fetchers;
pub mod http;
pub mod mutes;
pub mod render;
pub mod report;
pub mod reporters;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;
