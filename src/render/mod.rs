//! Plain-text rendering of report entries.
//!
//! One template per entry kind. Placeholders are `{name}` tokens filled from
//! the entry; a placeholder the entry has no value for renders empty.

use std::collections::HashMap;

use crate::report::ReportEntry;

pub const KINDS: [&str; 7] = [
    "proposals_query_error",
    "finished_voting",
    "vote_query_error",
    "not_voted",
    "voted",
    "revoted",
    "generic_error",
];

fn default_template(kind: &str) -> &'static str {
    match kind {
        "proposals_query_error" => "{chain}: failed to fetch proposals: {error}",
        "finished_voting" => "{chain}: voting on proposal #{proposal_id} \"{proposal_title}\" has finished {proposal_link}",
        "vote_query_error" => "{chain}: could not check the vote of {wallet} on proposal #{proposal_id}: {error}",
        "not_voted" => {
            "{chain}: {wallet} has not voted on proposal #{proposal_id} \"{proposal_title}\", voting ends {voting_end} {proposal_link}"
        }
        "voted" => "{chain}: {wallet} voted {vote} on proposal #{proposal_id} \"{proposal_title}\" {proposal_link}",
        "revoted" => "{chain}: {wallet} changed its vote on proposal #{proposal_id} from {old_vote} to {vote} {proposal_link}",
        "generic_error" => "{chain}: {error}",
        _ => "{chain}: {error}",
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    templates: HashMap<String, String>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            templates: KINDS
                .iter()
                .map(|k| (k.to_string(), default_template(k).to_string()))
                .collect(),
        }
    }
}

impl Renderer {
    /// Built-in templates with the given per-kind overrides applied.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Result<Self, String> {
        let mut renderer = Self::default();
        for (kind, template) in overrides {
            if !KINDS.contains(&kind.as_str()) {
                return Err(format!("unknown template kind {:?}", kind));
            }
            renderer.templates.insert(kind.clone(), template.clone());
        }
        Ok(renderer)
    }

    pub fn render(&self, entry: &ReportEntry) -> String {
        let template = self
            .templates
            .get(entry.kind())
            .map(String::as_str)
            .unwrap_or_else(|| default_template(entry.kind()));

        fill(template, &placeholders(entry)).trim_end().to_string()
    }
}

/// Substitute `{name}` tokens in one pass over the template, so values that
/// themselves contain braces are copied verbatim. Unknown tokens are kept.
fn fill(template: &str, values: &[(&'static str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after
            .find('}')
            .and_then(|close| values.iter().find(|(name, _)| *name == &after[..close]).map(|v| (close, v)));

        match value {
            Some((close, (_, value))) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn placeholders(entry: &ReportEntry) -> Vec<(&'static str, String)> {
    let chain = entry.chain();
    let proposal = entry.proposal();
    let wallet = entry.wallet();

    let (vote, old_vote) = match entry {
        ReportEntry::Voted { vote, .. } => (vote.to_string(), String::new()),
        ReportEntry::Revoted { vote, old_vote, .. } => (vote.to_string(), old_vote.to_string()),
        _ => (String::new(), String::new()),
    };

    vec![
        ("chain", chain.pretty_name.clone()),
        ("proposal_id", proposal.map(|p| p.id.clone()).unwrap_or_default()),
        ("proposal_title", proposal.map(|p| p.title.clone()).unwrap_or_default()),
        ("wallet", wallet.map(|w| w.display_name().to_string()).unwrap_or_default()),
        ("vote", vote),
        ("old_vote", old_vote),
        ("error", entry.error().unwrap_or_default()),
        (
            "proposal_link",
            proposal.and_then(|p| chain.proposal_link(&p.id)).unwrap_or_default(),
        ),
        (
            "wallet_link",
            wallet.and_then(|w| chain.wallet_link(&w.address)).unwrap_or_default(),
        ),
        (
            "voting_end",
            proposal
                .and_then(|p| p.voting_end_time)
                .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        ),
    ]
}
