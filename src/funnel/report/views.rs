use super::super::aggregate::{CohortConversion, FunnelComparison, FunnelRates, StageCounts};
use super::super::dates::{MonthKey, MonthRange, PeriodWindow};
use super::super::ingest::DataWarning;
use chrono::NaiveDate;
use serde::Serialize;

/// One `(month, channel)` line of the performance report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub id: String,
    pub period: MonthKey,
    pub channel: String,
    pub applications: usize,
    pub valid_applications: usize,
    pub stages: StageCounts,
    pub hired: usize,
    pub early_attrition: usize,
    pub rates: FunnelRates,
    pub cost: f64,
    pub revenue: f64,
    pub refund: f64,
    pub roi: i64,
    pub retention: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_applications: usize,
    pub total_valid_applications: usize,
    pub total_hired: usize,
    pub total_cost: f64,
    pub total_revenue: f64,
    pub total_refund: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub window: PeriodWindow,
    pub previous_window: PeriodWindow,
    pub groups: Vec<FunnelComparison>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub range: MonthRange,
    pub as_of: NaiveDate,
    pub rows: Vec<ReportRow>,
    pub summary: ReportSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<PeriodComparison>,
    pub cohort_rates: Vec<CohortConversion>,
    pub warnings: Vec<DataWarning>,
}
