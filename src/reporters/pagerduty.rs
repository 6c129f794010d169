//! PagerDuty Events API v2.
//!
//! One incident per (chain, proposal, wallet). A vote resolves the incident;
//! every other alert (re)triggers it.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::Reporter;
use crate::render::Renderer;
use crate::report::ReportEntry;

#[derive(Debug, Serialize)]
struct Event<'a> {
    routing_key: &'a str,
    event_action: &'static str,
    dedup_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<EventPayload>,
}

#[derive(Debug, Serialize)]
struct EventPayload {
    summary: String,
    source: &'static str,
    severity: &'static str,
    component: String,
}

pub struct PagerDutyReporter {
    client: reqwest::Client,
    routing_key: String,
    api_url: String,
}

impl PagerDutyReporter {
    pub fn new(client: reqwest::Client, routing_key: &str, api_url: &str) -> Self {
        Self {
            client,
            routing_key: routing_key.to_string(),
            api_url: api_url.to_string(),
        }
    }
}

/// "{chain}-{proposal}-{wallet}", `None` for entries that are not about a wallet.
pub fn dedup_key(entry: &ReportEntry) -> Option<String> {
    let (chain, proposal) = entry.proposal_context()?;
    let wallet = entry.wallet()?;
    Some(format!("{}-{}-{}", chain, proposal, wallet.address))
}

fn severity(entry: &ReportEntry) -> &'static str {
    match entry {
        ReportEntry::NotVoted { .. } => "error",
        ReportEntry::VoteQueryError { .. } => "warning",
        _ => "info",
    }
}

#[async_trait]
impl Reporter for PagerDutyReporter {
    fn name(&self) -> &str {
        "pagerduty"
    }

    fn enabled(&self) -> bool {
        !self.routing_key.is_empty()
    }

    fn accepts(&self, entry: &ReportEntry) -> bool {
        entry.is_alert()
    }

    async fn send(&self, entry: &ReportEntry, renderer: &Renderer) -> anyhow::Result<()> {
        let dedup_key = dedup_key(entry).ok_or_else(|| anyhow::anyhow!("{} entries have no incident key", entry.kind()))?;

        let event = match entry {
            ReportEntry::Voted { .. } => Event {
                routing_key: &self.routing_key,
                event_action: "resolve",
                dedup_key,
                payload: None,
            },
            _ => Event {
                routing_key: &self.routing_key,
                event_action: "trigger",
                dedup_key,
                payload: Some(EventPayload {
                    summary: renderer.render(entry),
                    source: "govwatch",
                    severity: severity(entry),
                    component: entry.chain().name.clone(),
                }),
            },
        };

        let resp = self.client.post(&self.api_url).json(&event).send().await?;
        let status = resp.status().as_u16();
        if status >= 400 {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("PagerDuty returned {}: {}", status, body);
        }

        debug!(action = event.event_action, dedup_key = %event.dedup_key, "PagerDuty event sent");
        Ok(())
    }
}
