//! BDMS Core: continuity-aware merge engine for time-partitioned market data.
//!
//! - Calendar algebra: half-open range partitioning into monthly and daily
//!   units, and continuity validation of date sequences
//! - Static registry of trading types, data types, intervals and schemas
//! - Archive layout and segment discovery
//! - Monthly/daily reconciliation and merge job planning
//! - Streaming concatenation into csv or parquet, plus single-file conversion

pub mod calendar;
pub mod data;
pub mod domain;
pub mod merge;
