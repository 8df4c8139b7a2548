//! Static registry of trading types, market data types, intervals and their
//! compatibility rules.
//!
//! The registry is an immutable value. `Registry::standard()` returns the
//! archive's canonical tables; callers pass it by reference into key
//! validation and job building.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("unknown trading type '{0}' (expected spot, um, cm)")]
    UnknownTradingType(String),

    #[error("unknown market data type '{0}'")]
    UnknownDataType(String),

    #[error("unknown interval '{0}'")]
    UnknownInterval(String),

    #[error("unknown storage format '{0}' (expected zip, csv, parquet)")]
    UnknownFormat(String),

    #[error("market data type {data_type} is not available for trading type {trading_type}")]
    UnsupportedDataType {
        trading_type: TradingType,
        data_type: MarketDataType,
    },

    #[error("interval is required for {0}")]
    MissingInterval(MarketDataType),

    #[error("interval must not be set for {0}")]
    UnexpectedInterval(MarketDataType),

    #[error("interval {interval} is not available for {trading_type} {data_type}")]
    UnsupportedInterval {
        trading_type: TradingType,
        data_type: MarketDataType,
        interval: Interval,
    },

    #[error("invalid symbol '{0}': expected ASCII letters and digits")]
    InvalidSymbol(String),

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("no valid symbol/trading type/data type combinations requested")]
    NoCombinations,

    #[error("duplicate key {0} in request")]
    DuplicateKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TradingType {
    #[serde(rename = "spot")]
    Spot,
    /// USD-margined futures.
    #[serde(rename = "um")]
    UsdMargined,
    /// Coin-margined futures.
    #[serde(rename = "cm")]
    CoinMargined,
}

impl TradingType {
    pub const ALL: [TradingType; 3] = [
        TradingType::Spot,
        TradingType::UsdMargined,
        TradingType::CoinMargined,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TradingType::Spot => "spot",
            TradingType::UsdMargined => "um",
            TradingType::CoinMargined => "cm",
        }
    }

    pub fn is_futures(self) -> bool {
        !matches!(self, TradingType::Spot)
    }
}

impl fmt::Display for TradingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradingType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TradingType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownTradingType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarketDataType {
    #[serde(rename = "trades")]
    Trades,
    #[serde(rename = "aggTrades")]
    AggTrades,
    #[serde(rename = "klines")]
    Klines,
    #[serde(rename = "bookTicker")]
    BookTicker,
    #[serde(rename = "fundingRate")]
    FundingRate,
    #[serde(rename = "indexPriceKlines")]
    IndexPriceKlines,
    #[serde(rename = "markPriceKlines")]
    MarkPriceKlines,
    #[serde(rename = "premiumIndexKlines")]
    PremiumIndexKlines,
}

impl MarketDataType {
    pub const ALL: [MarketDataType; 8] = [
        MarketDataType::Trades,
        MarketDataType::AggTrades,
        MarketDataType::Klines,
        MarketDataType::BookTicker,
        MarketDataType::FundingRate,
        MarketDataType::IndexPriceKlines,
        MarketDataType::MarkPriceKlines,
        MarketDataType::PremiumIndexKlines,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MarketDataType::Trades => "trades",
            MarketDataType::AggTrades => "aggTrades",
            MarketDataType::Klines => "klines",
            MarketDataType::BookTicker => "bookTicker",
            MarketDataType::FundingRate => "fundingRate",
            MarketDataType::IndexPriceKlines => "indexPriceKlines",
            MarketDataType::MarkPriceKlines => "markPriceKlines",
            MarketDataType::PremiumIndexKlines => "premiumIndexKlines",
        }
    }

    /// Kline-like series are the only ones partitioned by interval.
    pub fn is_kline(self) -> bool {
        self.as_str().to_ascii_lowercase().contains("klines")
    }
}

impl fmt::Display for MarketDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketDataType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarketDataType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownDataType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1s")]
    S1,
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "8h")]
    H8,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "3d")]
    D3,
    #[serde(rename = "1w")]
    W1,
    #[serde(rename = "1mo")]
    Mo1,
}

impl Interval {
    pub const ALL: [Interval; 16] = [
        Interval::S1,
        Interval::M1,
        Interval::M3,
        Interval::M5,
        Interval::M15,
        Interval::M30,
        Interval::H1,
        Interval::H2,
        Interval::H4,
        Interval::H6,
        Interval::H8,
        Interval::H12,
        Interval::D1,
        Interval::D3,
        Interval::W1,
        Interval::Mo1,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Interval::S1 => "1s",
            Interval::M1 => "1m",
            Interval::M3 => "3m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::H2 => "2h",
            Interval::H4 => "4h",
            Interval::H6 => "6h",
            Interval::H8 => "8h",
            Interval::H12 => "12h",
            Interval::D1 => "1d",
            Interval::D3 => "3d",
            Interval::W1 => "1w",
            Interval::Mo1 => "1mo",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownInterval(s.to_string()))
    }
}

// ── Column schemas ───────────────────────────────────────────────────

const AGGTRADES_COLUMNS: &[&str] = &[
    "agg_id",
    "price",
    "quantity",
    "first_trade_id",
    "last_trade_id",
    "timestamp",
    "is_buyer_maker",
    "is_best_match",
];

const TRADES_COLUMNS: &[&str] = &[
    "id",
    "price",
    "quantity",
    "quote_quantity",
    "timestamp",
    "is_buyer_maker",
    "is_best_match",
];

const KLINE_COLUMNS: &[&str] = &[
    "open_time",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_volume",
    "count",
    "taker_buy_volume",
    "taker_buy_quote_volume",
    "ignore",
];

const BOOKTICKER_COLUMNS: &[&str] = &[
    "update_id",
    "best_bid_price",
    "best_bid_qty",
    "best_ask_price",
    "best_ask_qty",
    "transaction_time",
    "event_time",
];

const FUNDINGRATE_COLUMNS: &[&str] = &["calc_time", "funding_interval_hours", "last_funding_rate"];

/// Compatibility and schema tables for the archive.
#[derive(Debug, Clone)]
pub struct Registry {
    /// Data types published for every trading type.
    pub common_data_types: &'static [MarketDataType],
    /// Data types published only for futures trading types.
    pub futures_data_types: &'static [MarketDataType],
    /// Intervals published only for spot klines.
    pub spot_only_intervals: &'static [Interval],
    /// First date each trading type has data for.
    pub listing_dates: &'static [(TradingType, (i32, u32, u32))],
}

static STANDARD: Registry = Registry {
    common_data_types: &[
        MarketDataType::Trades,
        MarketDataType::AggTrades,
        MarketDataType::Klines,
    ],
    futures_data_types: &[
        MarketDataType::BookTicker,
        MarketDataType::FundingRate,
        MarketDataType::IndexPriceKlines,
        MarketDataType::MarkPriceKlines,
        MarketDataType::PremiumIndexKlines,
    ],
    spot_only_intervals: &[Interval::S1],
    listing_dates: &[
        (TradingType::Spot, (2017, 8, 15)),
        (TradingType::UsdMargined, (2020, 1, 1)),
        (TradingType::CoinMargined, (2020, 8, 1)),
    ],
};

impl Registry {
    pub fn standard() -> &'static Registry {
        &STANDARD
    }

    pub fn supports(&self, trading_type: TradingType, data_type: MarketDataType) -> bool {
        self.common_data_types.contains(&data_type)
            || (trading_type.is_futures() && self.futures_data_types.contains(&data_type))
    }

    pub fn supports_interval(
        &self,
        trading_type: TradingType,
        data_type: MarketDataType,
        interval: Interval,
    ) -> bool {
        if !data_type.is_kline() {
            return false;
        }
        trading_type == TradingType::Spot || !self.spot_only_intervals.contains(&interval)
    }

    /// Check a (trading type, data type, interval) triple against the tables.
    pub fn check(
        &self,
        trading_type: TradingType,
        data_type: MarketDataType,
        interval: Option<Interval>,
    ) -> Result<(), ConfigurationError> {
        if !self.supports(trading_type, data_type) {
            return Err(ConfigurationError::UnsupportedDataType {
                trading_type,
                data_type,
            });
        }
        match (data_type.is_kline(), interval) {
            (true, None) => Err(ConfigurationError::MissingInterval(data_type)),
            (false, Some(_)) => Err(ConfigurationError::UnexpectedInterval(data_type)),
            (true, Some(interval)) if !self.supports_interval(trading_type, data_type, interval) => {
                Err(ConfigurationError::UnsupportedInterval {
                    trading_type,
                    data_type,
                    interval,
                })
            }
            _ => Ok(()),
        }
    }

    /// Column names for raw segments that carry no header row.
    pub fn columns(&self, trading_type: TradingType, data_type: MarketDataType) -> &'static [&'static str] {
        let spot = trading_type == TradingType::Spot;
        match data_type {
            MarketDataType::AggTrades if spot => AGGTRADES_COLUMNS,
            MarketDataType::AggTrades => &AGGTRADES_COLUMNS[..AGGTRADES_COLUMNS.len() - 1],
            MarketDataType::Trades if spot => TRADES_COLUMNS,
            MarketDataType::Trades => &TRADES_COLUMNS[..TRADES_COLUMNS.len() - 1],
            MarketDataType::Klines
            | MarketDataType::IndexPriceKlines
            | MarketDataType::MarkPriceKlines
            | MarketDataType::PremiumIndexKlines => KLINE_COLUMNS,
            MarketDataType::BookTicker => BOOKTICKER_COLUMNS,
            MarketDataType::FundingRate => FUNDINGRATE_COLUMNS,
        }
    }

    /// Column holding a gap-free, strictly increasing record identifier.
    pub fn identifier_column(&self, data_type: MarketDataType) -> Option<&'static str> {
        match data_type {
            MarketDataType::Trades => Some("id"),
            MarketDataType::AggTrades => Some("agg_id"),
            _ => None,
        }
    }

    pub fn listing_date(&self, trading_type: TradingType) -> Option<NaiveDate> {
        self.listing_dates
            .iter()
            .find(|(t, _)| *t == trading_type)
            .and_then(|(_, (y, m, d))| NaiveDate::from_ymd_opt(*y, *m, *d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip_through_from_str() {
        for t in TradingType::ALL {
            assert_eq!(t.as_str().parse::<TradingType>().unwrap(), t);
        }
        for t in MarketDataType::ALL {
            assert_eq!(t.as_str().parse::<MarketDataType>().unwrap(), t);
        }
        for i in Interval::ALL {
            assert_eq!(i.as_str().parse::<Interval>().unwrap(), i);
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!(
            "futures".parse::<TradingType>(),
            Err(ConfigurationError::UnknownTradingType(_))
        ));
        assert!(matches!(
            "2m".parse::<Interval>(),
            Err(ConfigurationError::UnknownInterval(_))
        ));
    }

    #[test]
    fn kline_detection_is_name_based() {
        assert!(MarketDataType::Klines.is_kline());
        assert!(MarketDataType::MarkPriceKlines.is_kline());
        assert!(!MarketDataType::AggTrades.is_kline());
        assert!(!MarketDataType::FundingRate.is_kline());
    }

    #[test]
    fn futures_only_types_rejected_for_spot() {
        let reg = Registry::standard();
        assert!(!reg.supports(TradingType::Spot, MarketDataType::FundingRate));
        assert!(reg.supports(TradingType::UsdMargined, MarketDataType::FundingRate));
        assert!(reg.supports(TradingType::Spot, MarketDataType::AggTrades));
    }

    #[test]
    fn one_second_klines_only_on_spot() {
        let reg = Registry::standard();
        assert!(reg.check(TradingType::Spot, MarketDataType::Klines, Some(Interval::S1)).is_ok());
        assert_eq!(
            reg.check(TradingType::UsdMargined, MarketDataType::Klines, Some(Interval::S1)),
            Err(ConfigurationError::UnsupportedInterval {
                trading_type: TradingType::UsdMargined,
                data_type: MarketDataType::Klines,
                interval: Interval::S1,
            })
        );
    }

    #[test]
    fn interval_required_iff_kline() {
        let reg = Registry::standard();
        assert_eq!(
            reg.check(TradingType::Spot, MarketDataType::Klines, None),
            Err(ConfigurationError::MissingInterval(MarketDataType::Klines))
        );
        assert_eq!(
            reg.check(TradingType::Spot, MarketDataType::Trades, Some(Interval::M1)),
            Err(ConfigurationError::UnexpectedInterval(MarketDataType::Trades))
        );
    }

    #[test]
    fn futures_trade_columns_drop_best_match() {
        let reg = Registry::standard();
        let spot = reg.columns(TradingType::Spot, MarketDataType::AggTrades);
        let um = reg.columns(TradingType::UsdMargined, MarketDataType::AggTrades);
        assert_eq!(spot.len(), um.len() + 1);
        assert_eq!(spot.last(), Some(&"is_best_match"));
        assert_eq!(reg.identifier_column(MarketDataType::AggTrades), Some(spot[0]));
    }

    #[test]
    fn listing_dates_are_known() {
        let reg = Registry::standard();
        assert_eq!(
            reg.listing_date(TradingType::CoinMargined),
            NaiveDate::from_ymd_opt(2020, 8, 1)
        );
    }
}
