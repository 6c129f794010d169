use serde::Deserialize;

/// Which governance API a chain exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainKind {
    /// Cosmos SDK `x/gov` module over the LCD REST gateway.
    #[default]
    Cosmos,
    /// DAO DAO style proposal contract queried through `/cosmwasm/wasm/v1`.
    Dao,
}

/// A watched chain. Built once from config and shared as `Arc<Chain>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub name: String,
    pub pretty_name: String,
    /// Equivalent LCD base URLs, tried in this order.
    pub lcd_endpoints: Vec<String>,
    pub kind: ChainKind,
    pub dao_address: String,
    pub wallets: Vec<Wallet>,
    pub explorer: Explorer,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Explorer {
    pub proposal_link_pattern: String,
    pub wallet_link_pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    pub address: String,
    pub alias: Option<String>,
}

impl Chain {
    pub fn proposal_link(&self, proposal_id: &str) -> Option<String> {
        if self.explorer.proposal_link_pattern.is_empty() {
            return None;
        }
        Some(self.explorer.proposal_link_pattern.replace("{id}", proposal_id))
    }

    pub fn wallet_link(&self, address: &str) -> Option<String> {
        if self.explorer.wallet_link_pattern.is_empty() {
            return None;
        }
        Some(self.explorer.wallet_link_pattern.replace("{address}", address))
    }

    pub fn find_wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.address == address)
    }
}

impl Wallet {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            alias: None,
        }
    }

    /// Alias if configured, otherwise the raw address.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.address)
    }
}

impl std::fmt::Display for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
