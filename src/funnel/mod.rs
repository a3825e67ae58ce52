pub mod aggregate;
pub mod cost;
pub mod dates;
pub mod domain;
pub mod ingest;
pub mod join;
mod normalize;
pub mod report;
pub mod stages;

pub use aggregate::{FunnelAggregator, Grouping};
pub use cost::{CostProrationCalculator, OpenTermBilling};
pub use dates::{MonthKey, MonthRange, PeriodWindow};
pub use ingest::{DataWarning, ProjectionSnapshot};
pub use join::ChannelCostJoiner;
pub use report::{
    build_performance_report, parse_month_range, PerformanceReport, ReportError, ReportRequest,
    ReportSettings,
};
pub use stages::StageTimestampResolver;
