use crate::values::Symbol;
use serde::{Deserialize, Serialize};

/// Where the market connectivity collaborator should connect
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Exchange identifier, e.g. "binance"
    pub exchange: String,
    /// Stream endpoint
    pub url: String,
    /// Instruments to subscribe to
    #[serde(default)]
    pub symbols: Vec<Symbol>,
}

impl ConnectionDescriptor {
    pub fn new(exchange: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            url: url.into(),
            symbols: Vec::new(),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<Symbol>) -> Self {
        self.symbols.push(symbol.into());
        self
    }
}
