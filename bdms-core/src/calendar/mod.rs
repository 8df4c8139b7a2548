//! Calendar algebra for monthly and daily segments.

pub mod continuity;
pub mod partition;
pub mod unit;

pub use continuity::{validate, ContinuityReport, Violation, ViolationKind};
pub use partition::{partition, DatePartition};
pub use unit::{month_start, next_month_start, year_month, CalendarError, DateUnit, Granularity};
