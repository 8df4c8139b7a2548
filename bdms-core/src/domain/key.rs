//! Logical time-series identity and request expansion.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use super::registry::{ConfigurationError, Interval, MarketDataType, Registry, TradingType};

/// One time series: symbol × trading type × data type × optional interval.
///
/// Only constructible through [`LogicalKey::new`], which validates the
/// combination against a [`Registry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LogicalKey {
    symbol: String,
    trading_type: TradingType,
    data_type: MarketDataType,
    interval: Option<Interval>,
}

impl LogicalKey {
    pub fn new(
        symbol: &str,
        trading_type: TradingType,
        data_type: MarketDataType,
        interval: Option<Interval>,
        registry: &Registry,
    ) -> Result<Self, ConfigurationError> {
        let symbol = normalize_symbol(symbol)?;
        registry.check(trading_type, data_type, interval)?;
        Ok(Self {
            symbol,
            trading_type,
            data_type,
            interval,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn trading_type(&self) -> TradingType {
        self.trading_type
    }

    pub fn data_type(&self) -> MarketDataType {
        self.data_type
    }

    pub fn interval(&self) -> Option<Interval> {
        self.interval
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.symbol, self.trading_type, self.data_type)?;
        if let Some(interval) = self.interval {
            write!(f, " {interval}")?;
        }
        Ok(())
    }
}

fn normalize_symbol(symbol: &str) -> Result<String, ConfigurationError> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ConfigurationError::InvalidSymbol(symbol.to_string()));
    }
    Ok(trimmed.to_ascii_uppercase())
}

/// Expand a request into every valid [`LogicalKey`].
///
/// Combinations a trading type does not publish are dropped (a futures-only
/// data type requested alongside `spot` only yields futures keys). The request
/// fails when a data type is available for none of the requested trading
/// types, when klines are requested without intervals, or when nothing
/// survives the expansion.
pub fn expand_keys(
    symbols: &[String],
    trading_types: &[TradingType],
    data_types: &[MarketDataType],
    intervals: &[Interval],
    registry: &Registry,
) -> Result<Vec<LogicalKey>, ConfigurationError> {
    for &data_type in data_types {
        if !trading_types.iter().any(|&t| registry.supports(t, data_type)) {
            let trading_type = trading_types.first().copied().unwrap_or(TradingType::Spot);
            return Err(ConfigurationError::UnsupportedDataType {
                trading_type,
                data_type,
            });
        }
        if data_type.is_kline() && intervals.is_empty() {
            return Err(ConfigurationError::MissingInterval(data_type));
        }
    }

    let mut seen = BTreeSet::new();
    let mut keys = Vec::new();
    for symbol in symbols {
        for &trading_type in trading_types {
            for &data_type in data_types {
                if !registry.supports(trading_type, data_type) {
                    continue;
                }
                let candidates: Vec<Option<Interval>> = if data_type.is_kline() {
                    intervals
                        .iter()
                        .copied()
                        .filter(|&i| registry.supports_interval(trading_type, data_type, i))
                        .map(Some)
                        .collect()
                } else {
                    vec![None]
                };
                for interval in candidates {
                    let key = LogicalKey::new(symbol, trading_type, data_type, interval, registry)?;
                    if seen.insert(key.clone()) {
                        keys.push(key);
                    }
                }
            }
        }
    }

    if keys.is_empty() {
        return Err(ConfigurationError::NoCombinations);
    }
    Ok(keys)
}
