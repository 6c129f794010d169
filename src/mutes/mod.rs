//! Time-bounded suppression of report entries.
//!
//! A mute matches by optional chain and optional proposal; leaving both empty
//! silences everything. Mutes never look at wallets. Expired mutes are simply
//! ignored, so nothing has to delete them for alerts to resume.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::report::ReportEntry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mute {
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub proposal_id: Option<String>,
    pub expires: DateTime<Utc>,
    #[serde(default)]
    pub comment: String,
}

impl Mute {
    /// Build from operator arguments, where `*` means "any".
    pub fn from_args(
        chain: &str,
        proposal_id: &str,
        ttl: Duration,
        comment: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, String> {
        let expires = now
            .checked_add_signed(ttl)
            .ok_or_else(|| format!("mute duration {} is out of range", ttl))?;

        Ok(Self {
            chain: wildcard(chain),
            proposal_id: wildcard(proposal_id),
            expires,
            comment: comment.to_string(),
        })
    }

    /// Storage key; one mute per (chain, proposal) filter pair.
    pub fn key(&self) -> String {
        mute_key(self.chain.as_deref(), self.proposal_id.as_deref())
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires > now
    }

    pub fn matches(&self, chain: &str, proposal_id: &str) -> bool {
        self.chain.as_deref().map_or(true, |c| c == chain)
            && self.proposal_id.as_deref().map_or(true, |p| p == proposal_id)
    }
}

impl std::fmt::Display for Mute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "chain={} proposal={} until {}",
            self.chain.as_deref().unwrap_or("*"),
            self.proposal_id.as_deref().unwrap_or("*"),
            self.expires.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        if !self.comment.is_empty() {
            write!(f, " ({})", self.comment)?;
        }
        Ok(())
    }
}

pub fn mute_key(chain: Option<&str>, proposal_id: Option<&str>) -> String {
    format!("{}/{}", chain.unwrap_or("*"), proposal_id.unwrap_or("*"))
}

pub fn wildcard(arg: &str) -> Option<String> {
    match arg.trim() {
        "" | "*" => None,
        other => Some(other.to_string()),
    }
}

/// Whether an active mute covers this entry. Only entries about a specific
/// proposal can be muted; chain-wide errors always go through.
pub fn is_suppressed(entry: &ReportEntry, mutes: &[Mute], now: DateTime<Utc>) -> bool {
    let Some((chain, proposal_id)) = entry.proposal_context() else {
        return false;
    };
    mutes
        .iter()
        .any(|m| m.is_active(now) && m.matches(chain, proposal_id))
}

/// Parse `<n>[s|m|h|d]`, e.g. "90m" or "2d". A bare number is seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&raw[..i], c),
        Some(_) => (raw, 's'),
        None => return Err("empty duration".to_string()),
    };

    let n: i64 = digits
        .parse()
        .map_err(|_| format!("invalid duration {:?}", raw))?;
    if n <= 0 {
        return Err(format!("duration must be positive: {:?}", raw));
    }

    let duration = match unit {
        's' => Duration::try_seconds(n),
        'm' => Duration::try_minutes(n),
        'h' => Duration::try_hours(n),
        'd' => Duration::try_days(n),
        other => return Err(format!("unknown duration unit {:?} in {:?}", other, raw)),
    };
    duration.ok_or_else(|| format!("duration out of range: {:?}", raw))
}
