use super::aggregate::{FunnelMetrics, FunnelRow};
use super::cost::ChannelCost;
use super::dates::MonthKey;
use super::report::views::ReportRow;
use std::collections::BTreeMap;
use tracing::debug;

/// `round((revenue - cost) / cost * 100)`, or 0 without cost.
pub fn roi_percent(revenue: f64, cost: f64) -> i64 {
    if cost <= 0.0 {
        return 0;
    }
    (((revenue - cost) / cost) * 100.0).round() as i64
}

/// Share of hires not lost to early attrition, as a one-decimal percentage.
pub fn retention_percent(hired: usize, early_attrition: usize) -> f64 {
    if hired == 0 {
        return 0.0;
    }
    let retained = hired as f64 - early_attrition as f64;
    ((retained / hired as f64) * 1000.0).round() / 10.0
}

/// Full outer join of per-(month, channel) cost and funnel figures.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelCostJoiner;

impl ChannelCostJoiner {
    pub fn join(
        &self,
        costs: &BTreeMap<(MonthKey, String), ChannelCost>,
        funnel: Vec<FunnelRow>,
    ) -> Vec<ReportRow> {
        let mut joined: BTreeMap<(MonthKey, String), (Option<&ChannelCost>, FunnelMetrics)> =
            costs
                .iter()
                .map(|(key, cost)| (key.clone(), (Some(cost), FunnelMetrics::default())))
                .collect();

        for row in funnel {
            let (Some(period), Some(channel)) = (row.key.period, row.key.channel) else {
                debug!("skipping funnel row without a month and channel key");
                continue;
            };
            joined.entry((period, channel)).or_default().1 = row.metrics;
        }

        joined
            .into_iter()
            .map(|((period, channel), (cost, metrics))| {
                let cost = cost.map(|entry| entry.cost).unwrap_or(0.0).round();
                let revenue = metrics.revenue.round();
                let hired = metrics.stages.onboarded;

                ReportRow {
                    id: format!("{period}-{channel}"),
                    period,
                    channel,
                    applications: metrics.applications,
                    valid_applications: metrics.valid_applications,
                    stages: metrics.stages,
                    hired,
                    early_attrition: metrics.early_attrition,
                    rates: metrics.rates,
                    cost,
                    revenue,
                    refund: metrics.refund.round(),
                    roi: roi_percent(revenue, cost),
                    retention: retention_percent(hired, metrics.early_attrition),
                }
            })
            .collect()
    }
}
