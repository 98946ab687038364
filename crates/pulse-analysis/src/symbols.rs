//! Catalog of well-known symbols for search-as-you-type

use serde::{Deserialize, Serialize};

/// Most results a search returns
pub const SEARCH_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Stock,
    Crypto,
    Commodity,
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: String,
    pub asset_class: AssetClass,
}

const CATALOG: &[(&str, &str, AssetClass)] = &[
    ("AAPL", "Apple Inc.", AssetClass::Stock),
    ("GOOGL", "Alphabet Inc.", AssetClass::Stock),
    ("MSFT", "Microsoft Corporation", AssetClass::Stock),
    ("AMZN", "Amazon.com Inc.", AssetClass::Stock),
    ("TSLA", "Tesla Inc.", AssetClass::Stock),
    ("META", "Meta Platforms Inc.", AssetClass::Stock),
    ("NVDA", "NVIDIA Corporation", AssetClass::Stock),
    ("JPM", "JPMorgan Chase & Co.", AssetClass::Stock),
    ("V", "Visa Inc.", AssetClass::Stock),
    ("WMT", "Walmart Inc.", AssetClass::Stock),
    ("DIS", "The Walt Disney Company", AssetClass::Stock),
    ("NFLX", "Netflix Inc.", AssetClass::Stock),
    ("BA", "Boeing Company", AssetClass::Stock),
    ("GE", "General Electric", AssetClass::Stock),
    ("F", "Ford Motor Company", AssetClass::Stock),
    ("BTC-USD", "Bitcoin", AssetClass::Crypto),
    ("ETH-USD", "Ethereum", AssetClass::Crypto),
    ("BNB-USD", "Binance Coin", AssetClass::Crypto),
    ("XRP-USD", "Ripple", AssetClass::Crypto),
    ("ADA-USD", "Cardano", AssetClass::Crypto),
    ("DOGE-USD", "Dogecoin", AssetClass::Crypto),
    ("SOL-USD", "Solana", AssetClass::Crypto),
    ("MATIC-USD", "Polygon", AssetClass::Crypto),
    ("GC=F", "Gold Futures", AssetClass::Commodity),
    ("SI=F", "Silver Futures", AssetClass::Commodity),
    ("CL=F", "Crude Oil Futures", AssetClass::Commodity),
    ("NG=F", "Natural Gas Futures", AssetClass::Commodity),
    ("HG=F", "Copper Futures", AssetClass::Commodity),
    ("^GSPC", "S&P 500", AssetClass::Index),
    ("^DJI", "Dow Jones Industrial Average", AssetClass::Index),
    ("^IXIC", "NASDAQ Composite", AssetClass::Index),
    ("^RUT", "Russell 2000", AssetClass::Index),
];

/// Case-insensitive substring search over symbol and name
///
/// A blank query lists the catalog. At most `limit` results, in catalog order.
pub fn search(query: &str, limit: usize) -> Vec<SymbolMatch> {
    let needle = query.trim().to_uppercase();

    CATALOG
        .iter()
        .filter(|(symbol, name, _)| {
            needle.is_empty() || symbol.contains(&needle) || name.to_uppercase().contains(&needle)
        })
        .take(limit)
        .map(|&(symbol, name, asset_class)| SymbolMatch {
            symbol: symbol.to_string(),
            name: name.to_string(),
            asset_class,
        })
        .collect()
}
