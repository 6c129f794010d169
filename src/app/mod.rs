//! Wires config, fetchers, store and channels into polling runs.
//!
//! A run: load every chain's previous state, build the new snapshot, diff,
//! drop muted entries, dispatch, then commit the new state per chain. Runs
//! never fail as a whole; every problem ends up in the log or as a report
//! entry.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::fetchers::{build_fetcher, Fetcher};
use crate::mutes::{wildcard, Mute};
use crate::report::{self, ReportEntry};
use crate::reporters::Dispatcher;
use crate::state::{Snapshot, StateGenerator};
use crate::store::{self, Store};
use crate::types::{Chain, ChainParams, Proposal, ProposalTally, QueryError, QueryErrors};

pub struct App {
    chains: Vec<(Arc<Chain>, Arc<dyn Fetcher>)>,
    generator: StateGenerator,
    store: Box<dyn Store>,
    dispatcher: Dispatcher,
    interval: Duration,
}

impl App {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let timeout = config.request_timeout();
        let chains: Vec<(Arc<Chain>, Arc<dyn Fetcher>)> = config
            .chains()
            .into_iter()
            .map(|chain| {
                let fetcher = build_fetcher(&chain, timeout);
                (chain, fetcher)
            })
            .collect();

        let store = store::open(&config.storage).await?;
        let dispatcher = Dispatcher::from_config(config)?;

        info!(
            chains = chains.len(),
            wallets = chains.iter().map(|(c, _)| c.wallets.len()).sum::<usize>(),
            channels = ?dispatcher.enabled_channels(),
            "govwatch configured"
        );

        Ok(Self::from_parts(chains, store, dispatcher, config.interval()))
    }

    pub fn from_parts(
        chains: Vec<(Arc<Chain>, Arc<dyn Fetcher>)>,
        store: Box<dyn Store>,
        dispatcher: Dispatcher,
        interval: Duration,
    ) -> Self {
        Self {
            generator: StateGenerator::new(chains.clone()),
            chains,
            store,
            dispatcher,
            interval,
        }
    }

    fn chain_list(&self) -> Vec<Arc<Chain>> {
        self.chains.iter().map(|(c, _)| c.clone()).collect()
    }

    /// One full polling run. Returns every generated entry, muted ones included.
    pub async fn run_once(&self) -> Vec<ReportEntry> {
        let started = Instant::now();
        let (previous, mut entries) = self.load_previous().await;

        let new = self.generator.generate(&previous).await;
        entries.extend(report::generate(&previous, &new, &self.chain_list()));

        let mutes = match self.store.load_mutes().await {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "failed to load mutes, dispatching unfiltered");
                Vec::new()
            }
        };
        self.dispatcher.dispatch(&entries, &mutes, Utc::now()).await;

        for (name, info) in &new.chains {
            if let Err(e) = self.store.commit_chain_state(name, info).await {
                error!(chain = %name, error = %e, "failed to commit state");
            }
        }

        info!(
            entries = entries.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run complete"
        );
        entries
    }

    /// Previous snapshot from the store. A chain whose state cannot be read
    /// starts fresh and gets a `GenericError` entry.
    async fn load_previous(&self) -> (Snapshot, Vec<ReportEntry>) {
        let mut previous = Snapshot::default();
        let mut entries = Vec::new();

        for (chain, _) in &self.chains {
            match self.store.load_chain_state(&chain.name).await {
                Ok(Some(info)) => {
                    previous.chains.insert(chain.name.clone(), info);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(chain = %chain.name, error = %e, "failed to load previous state, starting fresh");
                    entries.push(ReportEntry::GenericError {
                        chain: chain.clone(),
                        error: format!("failed to load previous state: {:#}", e),
                    });
                }
            }
        }

        (previous, entries)
    }

    /// Run forever on the configured interval. Runs never overlap; a tick
    /// missed during a long run is delayed, not doubled up.
    pub async fn run_forever(&self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "polling started");

        loop {
            interval.tick().await;
            self.run_once().await;
        }
    }

    // --- Operator commands ---

    pub async fn proposals(&self) -> Vec<(Arc<Chain>, Result<Vec<Proposal>, QueryError>)> {
        join_all(self.chains.iter().map(|(chain, fetcher)| async move {
            let result = fetcher
                .get_all_proposals(0)
                .await
                .map(|(proposals, _)| proposals.into_iter().filter(Proposal::is_in_voting).collect::<Vec<_>>());
            (chain.clone(), result)
        }))
        .await
    }

    pub async fn tallies(&self) -> Vec<(Arc<Chain>, Result<Vec<ProposalTally>, QueryErrors>)> {
        join_all(
            self.chains
                .iter()
                .map(|(chain, fetcher)| async move { (chain.clone(), fetcher.get_tallies().await) }),
        )
        .await
    }

    pub async fn params(&self) -> Vec<(Arc<Chain>, Result<ChainParams, QueryErrors>)> {
        join_all(
            self.chains
                .iter()
                .map(|(chain, fetcher)| async move { (chain.clone(), fetcher.get_chain_params().await) }),
        )
        .await
    }

    pub async fn mute(
        &self,
        chain: &str,
        proposal_id: &str,
        ttl: chrono::Duration,
        comment: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Mute> {
        if let Some(name) = wildcard(chain) {
            if !self.chains.iter().any(|(c, _)| c.name == name) {
                anyhow::bail!("unknown chain {:?}", name);
            }
        }

        let mute = Mute::from_args(chain, proposal_id, ttl, comment, now).map_err(anyhow::Error::msg)?;
        self.store.upsert_mute(&mute).await?;
        info!(mute = %mute, "mute added");
        Ok(mute)
    }

    pub async fn unmute(&self, chain: &str, proposal_id: &str) -> anyhow::Result<bool> {
        let removed = self
            .store
            .delete_mute(wildcard(chain).as_deref(), wildcard(proposal_id).as_deref())
            .await?;
        info!(chain = chain, proposal = proposal_id, removed = removed, "unmute");
        Ok(removed)
    }

    /// Mutes still in force at `now`.
    pub async fn active_mutes(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Mute>> {
        let mut mutes: Vec<Mute> = self
            .store
            .load_mutes()
            .await?
            .into_iter()
            .filter(|m| m.is_active(now))
            .collect();
        mutes.sort_by(|a, b| a.expires.cmp(&b.expires));
        Ok(mutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Renderer;
    use crate::reporters::Reporter;
    use crate::testing::{chain, voting_proposal, FakeFetcher, MemoryStore};
    use crate::types::NodeError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Collect(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Reporter for Collect {
        fn name(&self) -> &str {
            "collect"
        }

        async fn send(&self, entry: &ReportEntry, _renderer: &Renderer) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(entry.kind().to_string());
            Ok(())
        }
    }

    fn app(chains: Vec<(Arc<Chain>, Arc<FakeFetcher>)>, store: MemoryStore) -> (App, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(Renderer::default()).with_reporter(Box::new(Collect(sent.clone())));
        let chains = chains
            .into_iter()
            .map(|(c, f)| (c, f as Arc<dyn Fetcher>))
            .collect();
        (
            App::from_parts(chains, Box::new(store), dispatcher, Duration::from_secs(60)),
            sent,
        )
    }

    #[tokio::test]
    async fn test_vote_lifecycle_across_runs() {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.set_proposals(vec![voting_proposal("100")], 10);
        let store = MemoryStore::default();
        let (app, _) = app(vec![(chain("c1", &["w1"]), fetcher.clone())], store.clone());

        let run1 = app.run_once().await;
        assert_eq!(run1.len(), 1);
        assert!(matches!(
            &run1[0],
            ReportEntry::NotVoted { chain, proposal, wallet }
                if chain.name == "c1" && proposal.id == "100" && wallet.address == "w1"
        ));

        fetcher.set_vote("100", "w1", Some("YES"));
        let run2 = app.run_once().await;
        assert_eq!(run2.len(), 1);
        assert!(matches!(&run2[0], ReportEntry::Voted { vote, .. } if vote.to_string() == "YES"));

        // unchanged vote is silent
        assert!(app.run_once().await.is_empty());

        fetcher.set_vote("100", "w1", Some("NO"));
        let run4 = app.run_once().await;
        assert_eq!(run4.len(), 1);
        assert!(matches!(
            &run4[0],
            ReportEntry::Revoted { vote, old_vote, .. }
                if vote.to_string() == "NO" && old_vote.to_string() == "YES"
        ));

        // voting closes
        fetcher.set_proposals(Vec::new(), 20);
        let run5 = app.run_once().await;
        assert_eq!(run5.len(), 1);
        assert_eq!(run5[0].kind(), "finished_voting");
        assert_eq!(store.committed("c1").map(|i| i.height), Some(20));
    }

    #[tokio::test]
    async fn test_failing_chain_is_isolated() {
        let healthy = Arc::new(FakeFetcher::new());
        healthy.set_proposals(vec![voting_proposal("1")], 10);
        let broken = Arc::new(FakeFetcher::new());
        broken.fail_proposals(QueryError::Nodes(vec![
            NodeError {
                endpoint: "https://a".to_string(),
                error: "timeout".to_string(),
            },
            NodeError {
                endpoint: "https://b".to_string(),
                error: "bad status 503".to_string(),
            },
        ]));

        let store = MemoryStore::default();
        let (app, sent) = app(
            vec![
                (chain("c1", &["w1"]), healthy),
                (chain("c2", &["w2", "w3"]), broken),
            ],
            store,
        );

        let entries = app.run_once().await;
        let c2: Vec<_> = entries.iter().filter(|e| e.chain().name == "c2").collect();
        assert_eq!(c2.len(), 1);
        match c2[0] {
            ReportEntry::ProposalsQueryError { error, .. } => assert_eq!(error.node_errors().len(), 2),
            other => panic!("unexpected entry {:?}", other),
        }

        let c1: Vec<_> = entries.iter().filter(|e| e.chain().name == "c1").collect();
        assert_eq!(c1.len(), 1);
        assert_eq!(c1[0].kind(), "not_voted");
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_store_failures_do_not_stop_the_run() {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.set_proposals(vec![voting_proposal("1")], 10);
        let store = MemoryStore::default();
        store.fail_loads(true);
        store.fail_commits(true);
        let (app, sent) = app(vec![(chain("c1", &["w1"]), fetcher)], store.clone());

        let entries = app.run_once().await;
        let kinds: Vec<_> = entries.iter().map(ReportEntry::kind).collect();
        assert_eq!(kinds, vec!["generic_error", "not_voted"]);
        assert_eq!(sent.lock().unwrap().len(), 2);
        assert!(store.committed("c1").is_none());
    }

    #[tokio::test]
    async fn test_mutes_filter_dispatch_not_report() {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.set_proposals(vec![voting_proposal("1")], 10);
        let store = MemoryStore::default();
        let (app, sent) = app(vec![(chain("c1", &["w1"]), fetcher)], store);

        let now = Utc::now();
        assert!(app
            .mute("nope", "*", chrono::Duration::hours(1), "", now)
            .await
            .is_err());
        assert!(app
            .mute("c1", "*", chrono::Duration::days(100_000_000), "", now)
            .await
            .is_err());
        app.mute("c1", "1", chrono::Duration::hours(1), "known", now)
            .await
            .unwrap();
        assert_eq!(app.active_mutes(now).await.unwrap().len(), 1);

        let entries = app.run_once().await;
        assert_eq!(entries.len(), 1);
        assert!(sent.lock().unwrap().is_empty());

        assert!(app.unmute("c1", "1").await.unwrap());
        assert!(app.active_mutes(now).await.unwrap().is_empty());
        app.run_once().await;
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_operator_queries() {
        let fetcher = Arc::new(FakeFetcher::new());
        let mut passed = voting_proposal("1");
        passed.status = crate::types::ProposalStatus::Passed;
        fetcher.set_proposals(vec![passed, voting_proposal("2")], 10);
        let (app, _) = app(vec![(chain("c1", &["w1"]), fetcher)], MemoryStore::default());

        let proposals = app.proposals().await;
        assert_eq!(proposals.len(), 1);
        let ids: Vec<_> = proposals[0].1.as_ref().unwrap().iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec!["2"]);

        assert!(app.tallies().await[0].1.is_ok());
        assert!(app.params().await[0].1.is_ok());
    }
}
