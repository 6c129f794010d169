use rust_decimal::Decimal;

use super::Proposal;

/// Voting power cast per option.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub yes: Decimal,
    pub no: Decimal,
    pub no_with_veto: Decimal,
    pub abstain: Decimal,
}

/// `part` as a percentage of `whole`, rounded to 2 places. Zero when
/// `whole` is zero or the amounts are out of `Decimal` range.
fn percent(part: Decimal, whole: Option<Decimal>) -> Decimal {
    whole
        .filter(|w| !w.is_zero())
        .and_then(|w| part.checked_div(w))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map_or(Decimal::ZERO, |p| p.round_dp(2))
}

impl Tally {
    /// Sum of all options, `None` on overflow.
    pub fn total(&self) -> Option<Decimal> {
        [self.yes, self.no, self.no_with_veto, self.abstain]
            .into_iter()
            .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
    }

    /// Share of each option among cast votes, as percentages.
    pub fn shares(&self) -> Vec<(&'static str, Decimal)> {
        let total = self.total();
        let pct = |v: Decimal| percent(v, total);

        vec![
            ("yes", pct(self.yes)),
            ("no", pct(self.no)),
            ("no_with_veto", pct(self.no_with_veto)),
            ("abstain", pct(self.abstain)),
        ]
    }
}

/// Tally of one proposal in voting, with the voting power it is measured against.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalTally {
    pub proposal: Proposal,
    pub tally: Tally,
    pub total_voting_power: Decimal,
}

impl ProposalTally {
    /// Percentage of the total voting power that has voted.
    pub fn turnout(&self) -> Decimal {
        match self.tally.total() {
            Some(cast) => percent(cast, Some(self.total_voting_power)),
            None => Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParam {
    pub description: String,
    pub value: String,
}

/// Governance parameters, flattened to description/value pairs so both API
/// flavours can be displayed the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParams {
    pub chain: String,
    pub params: Vec<ChainParam>,
}

impl ChainParams {
    pub fn push(&mut self, description: &str, value: impl Into<String>) {
        self.params.push(ChainParam {
            description: description.to_string(),
            value: value.into(),
        });
    }
}
