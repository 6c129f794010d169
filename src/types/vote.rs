use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One weighted option of a (possibly split) vote.
///
/// `option` is the normalized upper-case name, e.g. "YES" or "NO_WITH_VETO".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOption {
    pub option: String,
    pub weight: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: String,
    pub voter: String,
    pub options: Vec<VoteOption>,
}

impl Vote {
    /// Build a vote; zero options means the wallet has not voted.
    pub fn new(proposal_id: &str, voter: &str, options: Vec<VoteOption>) -> Option<Self> {
        if options.is_empty() {
            return None;
        }
        Some(Self {
            proposal_id: proposal_id.to_string(),
            voter: voter.to_string(),
            options,
        })
    }

    /// Single full-weight option.
    pub fn single(proposal_id: &str, voter: &str, option: &str) -> Self {
        Self {
            proposal_id: proposal_id.to_string(),
            voter: voter.to_string(),
            options: vec![VoteOption {
                option: option.to_string(),
                weight: Decimal::ONE,
            }],
        }
    }

    /// Whether both votes pick the same options with the same weights,
    /// regardless of the order they were reported in.
    pub fn same_options(&self, other: &Vote) -> bool {
        if self.options.len() != other.options.len() {
            return false;
        }

        let mut ours: Vec<_> = self.options.iter().map(|o| (&o.option, o.weight)).collect();
        let mut theirs: Vec<_> = other.options.iter().map(|o| (&o.option, o.weight)).collect();
        ours.sort();
        theirs.sort();
        ours == theirs
    }
}

impl std::fmt::Display for Vote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let [only] = self.options.as_slice() {
            return write!(f, "{}", only.option);
        }

        let parts: Vec<String> = self
            .options
            .iter()
            .map(|o| format!("{} ({}%)", o.option, (o.weight * Decimal::ONE_HUNDRED).normalize()))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}
