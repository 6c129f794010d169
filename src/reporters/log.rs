use async_trait::async_trait;
use tracing::{info, warn};

use super::Reporter;
use crate::render::Renderer;
use crate::report::ReportEntry;

/// Writes every entry to the tracing log. Always enabled.
pub struct LogReporter;

#[async_trait]
impl Reporter for LogReporter {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, entry: &ReportEntry, renderer: &Renderer) -> anyhow::Result<()> {
        let text = renderer.render(entry);
        let chain = &entry.chain().name;

        match entry {
            ReportEntry::Voted { .. } | ReportEntry::Revoted { .. } | ReportEntry::FinishedVoting { .. } => {
                info!(kind = entry.kind(), chain = %chain, "{}", text)
            }
            ReportEntry::NotVoted { .. }
            | ReportEntry::VoteQueryError { .. }
            | ReportEntry::ProposalsQueryError { .. }
            | ReportEntry::GenericError { .. } => warn!(kind = entry.kind(), chain = %chain, "{}", text),
        }
        Ok(())
    }
}
