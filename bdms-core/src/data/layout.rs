//! Archive directory layout and segment file naming.
//!
//! Raw segments:
//! `{root}/data/spot/{monthly|daily}/{type}/{SYMBOL}/[{interval}/]{file}`
//! `{root}/data/futures/{um|cm}/{monthly|daily}/{type}/{SYMBOL}/[{interval}/]{file}`
//!
//! Merged output (one file per key):
//! `{merged_root}/spot/{type}/[{interval}/]{SYMBOL}.{ext}`

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

use crate::calendar::Granularity;
use crate::domain::{LogicalKey, OutputFormat, StorageFormat, TradingType};

/// Path derivation for one archive root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    root: PathBuf,
    merged_root: PathBuf,
}

impl ArchiveLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let merged_root = root.join("merged");
        Self { root, merged_root }
    }

    /// Write merged files somewhere other than `{root}/merged`.
    pub fn with_merged_root(mut self, merged_root: impl Into<PathBuf>) -> Self {
        self.merged_root = merged_root.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn merged_root(&self) -> &Path {
        &self.merged_root
    }

    fn market_dir(base: &Path, trading_type: TradingType) -> PathBuf {
        match trading_type {
            TradingType::Spot => base.join("spot"),
            futures => base.join("futures").join(futures.as_str()),
        }
    }

    /// Directory holding every segment of `key` at `granularity`.
    pub fn segment_dir(&self, key: &LogicalKey, granularity: Granularity) -> PathBuf {
        let mut dir = Self::market_dir(&self.root.join("data"), key.trading_type())
            .join(granularity.as_str())
            .join(key.data_type().as_str())
            .join(key.symbol());
        if let Some(interval) = key.interval() {
            dir.push(interval.as_str());
        }
        dir
    }

    /// Full path of the segment covering `date`.
    pub fn segment_path(
        &self,
        key: &LogicalKey,
        granularity: Granularity,
        date: NaiveDate,
        format: StorageFormat,
    ) -> PathBuf {
        self.segment_dir(key, granularity)
            .join(segment_file_name(key, granularity, date, format))
    }

    /// Destination of the merged series for `key`. Stable across runs, so a
    /// rerun overwrites the previous result.
    pub fn merged_path(&self, key: &LogicalKey, format: OutputFormat) -> PathBuf {
        let mut dir = Self::market_dir(&self.merged_root, key.trading_type()).join(key.data_type().as_str());
        if let Some(interval) = key.interval() {
            dir.push(interval.as_str());
        }
        dir.join(format!("{}.{}", key.symbol(), format.extension()))
    }
}

/// `{SYMBOL}-{interval|type}-{YYYY-MM}` for monthly, `-{YYYY-MM-DD}` for daily.
pub fn segment_file_name(
    key: &LogicalKey,
    granularity: Granularity,
    date: NaiveDate,
    format: StorageFormat,
) -> String {
    let tag = match key.interval() {
        Some(interval) => interval.as_str(),
        None => key.data_type().as_str(),
    };
    let stamp = match granularity {
        Granularity::Monthly => date.format("%Y-%m"),
        Granularity::Daily => date.format("%Y-%m-%d"),
    };
    format!("{}-{tag}-{stamp}.{}", key.symbol(), format.extension())
}

/// Recover the date embedded in a segment file name.
///
/// Looks for a four-digit year token (>= 2000) and parses everything after it
/// as `YYYY-MM` (monthly, day 1) or `YYYY-MM-DD` (daily). Tokens are tried left
/// to right; the first one that yields a valid date wins.
pub fn extract_date(file_name: &str) -> Option<(NaiveDate, Granularity)> {
    let stem = file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem);
    let bytes = stem.as_bytes();

    for i in 0..bytes.len().saturating_sub(3) {
        let token = &bytes[i..i + 4];
        let standalone = (i == 0 || !bytes[i - 1].is_ascii_digit())
            && bytes.get(i + 4).map_or(true, |b| !b.is_ascii_digit());
        if !standalone || !token.iter().all(u8::is_ascii_digit) {
            continue;
        }
        let year_ok = stem[i..i + 4].parse::<i32>().is_ok_and(|y| y >= 2000);
        if !year_ok {
            continue;
        }
        let tail = &stem[i..];
        let parsed = match tail.len() {
            7 => NaiveDate::parse_from_str(&format!("{tail}-01"), "%Y-%m-%d")
                .ok()
                .map(|d| (d, Granularity::Monthly)),
            10 => NaiveDate::parse_from_str(tail, "%Y-%m-%d")
                .ok()
                .map(|d| (d, Granularity::Daily)),
            _ => None,
        };
        if parsed.is_some() {
            return parsed;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Interval, MarketDataType, Registry};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn kline_key() -> LogicalKey {
        LogicalKey::new(
            "BTCUSDT",
            TradingType::Spot,
            MarketDataType::Klines,
            Some(Interval::M1),
            Registry::standard(),
        )
        .unwrap()
    }

    fn futures_key() -> LogicalKey {
        LogicalKey::new(
            "BTCUSD",
            TradingType::CoinMargined,
            MarketDataType::AggTrades,
            None,
            Registry::standard(),
        )
        .unwrap()
    }

    #[test]
    fn spot_segment_dir_includes_interval() {
        let layout = ArchiveLayout::new("/archive");
        assert_eq!(
            layout.segment_dir(&kline_key(), Granularity::Monthly),
            PathBuf::from("/archive/data/spot/monthly/klines/BTCUSDT/1m")
        );
    }

    #[test]
    fn futures_segment_dir_nests_market() {
        let layout = ArchiveLayout::new("/archive");
        assert_eq!(
            layout.segment_dir(&futures_key(), Granularity::Daily),
            PathBuf::from("/archive/data/futures/cm/daily/aggTrades/BTCUSD")
        );
    }

    #[test]
    fn merged_path_drops_granularity_and_symbol_dir() {
        let layout = ArchiveLayout::new("/archive");
        assert_eq!(
            layout.merged_path(&kline_key(), OutputFormat::Parquet),
            PathBuf::from("/archive/merged/spot/klines/1m/BTCUSDT.parquet")
        );
        let custom = ArchiveLayout::new("/archive").with_merged_root("/out");
        assert_eq!(
            custom.merged_path(&futures_key(), OutputFormat::Csv),
            PathBuf::from("/out/futures/cm/aggTrades/BTCUSD.csv")
        );
    }

    #[test]
    fn file_names_follow_archive_convention() {
        assert_eq!(
            segment_file_name(&kline_key(), Granularity::Monthly, d(2024, 1, 1), StorageFormat::Zip),
            "BTCUSDT-1m-2024-01.zip"
        );
        assert_eq!(
            segment_file_name(&futures_key(), Granularity::Daily, d(2024, 3, 9), StorageFormat::Parquet),
            "BTCUSD-aggTrades-2024-03-09.parquet"
        );
    }

    #[test]
    fn extracts_monthly_and_daily_dates() {
        assert_eq!(
            extract_date("BTCUSDT-1m-2024-01.zip"),
            Some((d(2024, 1, 1), Granularity::Monthly))
        );
        assert_eq!(
            extract_date("BTCUSDT-aggTrades-2023-12-31.parquet"),
            Some((d(2023, 12, 31), Granularity::Daily))
        );
    }

    #[test]
    fn skips_numeric_symbol_prefixes() {
        assert_eq!(
            extract_date("1000SHIBUSDT-trades-2024-02-29.csv"),
            Some((d(2024, 2, 29), Granularity::Daily))
        );
        assert_eq!(
            extract_date("AB2024-trades-2024-02.csv"),
            Some((d(2024, 2, 1), Granularity::Monthly))
        );
    }

    #[test]
    fn rejects_names_without_dates() {
        assert_eq!(extract_date("BTCUSDT.parquet"), None);
        assert_eq!(extract_date("BTCUSDT-1m-2024-13.zip"), None);
        assert_eq!(extract_date("BTCUSDT-1m-1999-01.zip"), None);
    }
}
