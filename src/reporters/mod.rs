//! Notification channels and the dispatcher feeding them.
//!
//! Every enabled channel gets its own sequential delivery loop over the
//! unmuted entries; the loops run concurrently. A failed delivery is logged
//! and counted, and the channel moves on to the next entry.

pub mod log;
pub mod pagerduty;
pub mod webhook;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::mutes::{is_suppressed, Mute};
use crate::render::Renderer;
use crate::report::ReportEntry;

pub use self::log::LogReporter;
pub use pagerduty::PagerDutyReporter;
pub use webhook::WebhookReporter;

#[async_trait]
pub trait Reporter: Send + Sync {
    fn name(&self) -> &str;

    /// Disabled channels are skipped entirely, e.g. when unconfigured.
    fn enabled(&self) -> bool {
        true
    }

    /// Whether this channel wants the entry at all.
    fn accepts(&self, _entry: &ReportEntry) -> bool {
        true
    }

    async fn send(&self, entry: &ReportEntry, renderer: &Renderer) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub entries: usize,
    pub muted: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct Dispatcher {
    reporters: Vec<Box<dyn Reporter>>,
    renderer: Renderer,
}

impl Dispatcher {
    pub fn new(renderer: Renderer) -> Self {
        Self {
            reporters: Vec::new(),
            renderer,
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    /// Log channel plus every channel the config enables.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let renderer = Renderer::with_overrides(&config.templates).map_err(anyhow::Error::msg)?;
        let client = http_client(config.request_timeout());

        Ok(Self::new(renderer)
            .with_reporter(Box::new(LogReporter))
            .with_reporter(Box::new(WebhookReporter::new(client.clone(), &config.webhook.url)))
            .with_reporter(Box::new(PagerDutyReporter::new(
                client,
                &config.pagerduty.routing_key,
                &config.pagerduty.api_url,
            ))))
    }

    pub fn enabled_channels(&self) -> Vec<&str> {
        self.reporters
            .iter()
            .filter(|r| r.enabled())
            .map(|r| r.name())
            .collect()
    }

    pub async fn dispatch(&self, entries: &[ReportEntry], mutes: &[Mute], now: DateTime<Utc>) -> DispatchSummary {
        let visible: Vec<&ReportEntry> = entries
            .iter()
            .filter(|e| !is_suppressed(e, mutes, now))
            .collect();

        let mut summary = DispatchSummary {
            entries: entries.len(),
            muted: entries.len() - visible.len(),
            ..Default::default()
        };

        let results = join_all(
            self.reporters
                .iter()
                .filter(|r| r.enabled())
                .map(|r| self.deliver(r.as_ref(), &visible)),
        )
        .await;

        for (delivered, failed) in results {
            summary.delivered += delivered;
            summary.failed += failed;
        }

        info!(
            entries = summary.entries,
            muted = summary.muted,
            delivered = summary.delivered,
            failed = summary.failed,
            "report dispatched"
        );
        summary
    }

    async fn deliver(&self, reporter: &dyn Reporter, entries: &[&ReportEntry]) -> (usize, usize) {
        let mut delivered = 0;
        let mut failed = 0;

        for entry in entries.iter().filter(|e| reporter.accepts(e)) {
            match reporter.send(entry, &self.renderer).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    error!(
                        channel = reporter.name(),
                        kind = entry.kind(),
                        chain = %entry.chain().name,
                        error = %e,
                        "failed to deliver report entry"
                    );
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            warn!(channel = reporter.name(), delivered = delivered, failed = failed, "channel had failures");
        }
        (delivered, failed)
    }
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to build HTTP client, using defaults");
            reqwest::Client::new()
        })
}
