use super::views::{ReportRow, ReportSummary};

impl ReportSummary {
    /// Totals over the joined rows; cost adds up the already rounded row costs.
    pub fn from_rows(rows: &[ReportRow]) -> Self {
        rows.iter().fold(Self::default(), |mut summary, row| {
            summary.total_applications += row.applications;
            summary.total_valid_applications += row.valid_applications;
            summary.total_hired += row.hired;
            summary.total_cost += row.cost;
            summary.total_revenue += row.revenue;
            summary.total_refund += row.refund;
            summary
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::aggregate::{FunnelRates, StageCounts};
    use crate::funnel::dates::MonthKey;

    fn row(channel: &str, applications: usize, hired: usize, cost: f64, revenue: f64) -> ReportRow {
        let period = MonthKey::new(2026, 2).expect("valid month");
        ReportRow {
            id: format!("{period}-{channel}"),
            period,
            channel: channel.to_string(),
            applications,
            valid_applications: applications / 2,
            stages: StageCounts::default(),
            hired,
            early_attrition: 0,
            rates: FunnelRates::default(),
            cost,
            revenue,
            refund: 0.0,
            roi: 0,
            retention: 0.0,
        }
    }

    #[test]
    fn summary_adds_up_rows() {
        let rows = vec![
            row("media-A", 10, 1, 30_000.0, 900_000.0),
            row("media-B", 4, 0, 20_357.0, 0.0),
        ];
        let summary = ReportSummary::from_rows(&rows);
        assert_eq!(summary.total_applications, 14);
        assert_eq!(summary.total_valid_applications, 7);
        assert_eq!(summary.total_hired, 1);
        assert_eq!(summary.total_cost, 50_357.0);
        assert_eq!(summary.total_revenue, 900_000.0);
    }

    #[test]
    fn empty_rows_give_zero_summary() {
        assert_eq!(ReportSummary::from_rows(&[]), ReportSummary::default());
    }
}
