//! Month-range performance report: funnel counts joined with prorated channel cost.

mod summary;
pub mod views;

pub use views::{PerformanceReport, PeriodComparison, ReportRow, ReportSummary};

use super::aggregate::{created_within, FunnelAggregator, Grouping};
use super::cost::{CostProrationCalculator, OpenTermBilling};
use super::dates::{MonthKey, MonthParseError, MonthRange};
use super::domain::{default_report_offset, DEFAULT_WARRANTY_DAYS};
use super::ingest::ProjectionSnapshot;
use super::join::ChannelCostJoiner;
use chrono::{FixedOffset, NaiveDate};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("both start_month and end_month are required")]
    MissingRange,
    #[error(transparent)]
    InvalidMonth(#[from] MonthParseError),
    #[error("start_month {start} is after end_month {end}")]
    InvertedRange { start: MonthKey, end: MonthKey },
}

/// Parses a `YYYY-MM..=YYYY-MM` range; blank values count as missing.
pub fn parse_month_range(
    start_month: Option<&str>,
    end_month: Option<&str>,
) -> Result<MonthRange, ReportError> {
    fn present(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|raw| !raw.is_empty())
    }

    let (Some(start), Some(end)) = (present(start_month), present(end_month)) else {
        return Err(ReportError::MissingRange);
    };

    let start_month: MonthKey = start.parse()?;
    let end_month: MonthKey = end.parse()?;
    if start_month > end_month {
        return Err(ReportError::InvertedRange {
            start: start_month,
            end: end_month,
        });
    }

    Ok(MonthRange {
        start_month,
        end_month,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRequest {
    pub range: MonthRange,
    pub as_of: NaiveDate,
    pub compare_previous: bool,
}

impl ReportRequest {
    pub fn new(
        start_month: Option<&str>,
        end_month: Option<&str>,
        as_of: NaiveDate,
        compare_previous: bool,
    ) -> Result<Self, ReportError> {
        Ok(Self {
            range: parse_month_range(start_month, end_month)?,
            as_of,
            compare_previous,
        })
    }
}

/// Business rules that come from configuration rather than the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSettings {
    pub default_warranty_days: u32,
    pub open_term: OpenTermBilling,
    /// Calendar that zoned instants are bucketed in.
    pub utc_offset: FixedOffset,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            default_warranty_days: DEFAULT_WARRANTY_DAYS,
            open_term: OpenTermBilling::default(),
            utc_offset: default_report_offset(),
        }
    }
}

pub fn build_performance_report(
    request: &ReportRequest,
    snapshot: &ProjectionSnapshot,
    settings: &ReportSettings,
) -> PerformanceReport {
    let ingested = snapshot.ingest_at(settings.utc_offset);
    let window = request.range.window();
    let months = request.range.months();

    let calculator = CostProrationCalculator::with_open_term(request.as_of, settings.open_term);
    let costs = calculator.monthly_costs(&ingested.contracts, &months);

    let aggregator = FunnelAggregator::new(&ingested.placements, settings.default_warranty_days);
    let funnel = aggregator.aggregate(
        created_within(&ingested.applications, &window),
        Grouping::MonthAndChannel,
        &window,
    );

    let rows = ChannelCostJoiner.join(&costs, funnel);
    let summary = ReportSummary::from_rows(&rows);

    let comparison = request.compare_previous.then(|| PeriodComparison {
        window,
        previous_window: window.previous(),
        groups: aggregator.compare(&ingested.applications, Grouping::Channel, &window),
    });

    let cohort_rates =
        aggregator.cohort_rates(created_within(&ingested.applications, &window), &window);

    info!(
        range = %window,
        as_of = %request.as_of,
        rows = rows.len(),
        warnings = ingested.warnings.len(),
        "performance report built"
    );

    PerformanceReport {
        range: request.range,
        as_of: request.as_of,
        rows,
        summary,
        comparison,
        cohort_rates,
        warnings: ingested.warnings,
    }
}
