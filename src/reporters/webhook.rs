//! Generic JSON webhook: one POST per entry.
//!
//! Body: `{"kind": "...", "chain": "...", "alert": bool, "text": "..."}`

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::Reporter;
use crate::render::Renderer;
use crate::report::ReportEntry;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    kind: &'a str,
    chain: &'a str,
    alert: bool,
    text: String,
}

pub struct WebhookReporter {
    client: reqwest::Client,
    url: String,
}

impl WebhookReporter {
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Reporter for WebhookReporter {
    fn name(&self) -> &str {
        "webhook"
    }

    fn enabled(&self) -> bool {
        !self.url.is_empty()
    }

    async fn send(&self, entry: &ReportEntry, renderer: &Renderer) -> anyhow::Result<()> {
        let payload = WebhookPayload {
            kind: entry.kind(),
            chain: &entry.chain().name,
            alert: entry.is_alert(),
            text: renderer.render(entry),
        };

        let resp = self.client.post(&self.url).json(&payload).send().await?;
        let status = resp.status().as_u16();
        if status >= 400 {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("webhook returned {}: {}", status, body);
        }

        debug!(kind = entry.kind(), status = status, "webhook delivered");
        Ok(())
    }
}
