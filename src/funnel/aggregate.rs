//! Funnel stage counts, conversion rates, and previous-period comparison.

use super::dates::{safe_percent, MonthKey, PeriodWindow};
use super::domain::{Application, FunnelStage, Placement};
use super::stages::StageTimestampResolver;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    Total,
    Month,
    Channel,
    MonthAndChannel,
}

impl Grouping {
    pub const fn by_month(self) -> bool {
        matches!(self, Self::Month | Self::MonthAndChannel)
    }

    pub const fn by_channel(self) -> bool {
        matches!(self, Self::Channel | Self::MonthAndChannel)
    }
}

/// Group identity; `None` parts are not grouped on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FunnelKey {
    pub period: Option<MonthKey>,
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub recommended: usize,
    pub first_interview_scheduled: usize,
    pub first_interview_held: usize,
    pub second_interview_held: usize,
    pub offer_extended: usize,
    pub offer_accepted: usize,
    pub onboarded: usize,
    pub pre_onboarding_withdrawn: usize,
    pub post_onboarding_departed: usize,
}

impl StageCounts {
    fn slot(&mut self, stage: FunnelStage) -> &mut usize {
        match stage {
            FunnelStage::Recommended => &mut self.recommended,
            FunnelStage::FirstInterviewScheduled => &mut self.first_interview_scheduled,
            FunnelStage::FirstInterviewHeld => &mut self.first_interview_held,
            FunnelStage::SecondInterviewHeld => &mut self.second_interview_held,
            FunnelStage::OfferExtended => &mut self.offer_extended,
            FunnelStage::OfferAccepted => &mut self.offer_accepted,
            FunnelStage::Onboarded => &mut self.onboarded,
            FunnelStage::PreOnboardingWithdrawn => &mut self.pre_onboarding_withdrawn,
            FunnelStage::PostOnboardingDeparted => &mut self.post_onboarding_departed,
        }
    }

    pub fn get(&self, stage: FunnelStage) -> usize {
        match stage {
            FunnelStage::Recommended => self.recommended,
            FunnelStage::FirstInterviewScheduled => self.first_interview_scheduled,
            FunnelStage::FirstInterviewHeld => self.first_interview_held,
            FunnelStage::SecondInterviewHeld => self.second_interview_held,
            FunnelStage::OfferExtended => self.offer_extended,
            FunnelStage::OfferAccepted => self.offer_accepted,
            FunnelStage::Onboarded => self.onboarded,
            FunnelStage::PreOnboardingWithdrawn => self.pre_onboarding_withdrawn,
            FunnelStage::PostOnboardingDeparted => self.post_onboarding_departed,
        }
    }

    fn increment(&mut self, stage: FunnelStage) {
        *self.slot(stage) += 1;
    }
}

/// Stage-to-stage conversion percentages (one decimal).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FunnelRates {
    pub valid_application_rate: f64,
    pub recommendation_rate: f64,
    pub interview_schedule_rate: f64,
    pub interview_held_rate: f64,
    pub second_interview_rate: f64,
    pub offer_rate: f64,
    pub acceptance_rate: f64,
    pub onboarding_rate: f64,
    pub withdrawal_rate: f64,
    pub hire_rate: f64,
}

impl FunnelRates {
    pub fn from_counts(
        applications: usize,
        valid_applications: usize,
        stages: &StageCounts,
    ) -> Self {
        let pct = |numerator: usize, denominator: usize| {
            safe_percent(numerator as f64, denominator as f64)
        };

        Self {
            valid_application_rate: pct(valid_applications, applications),
            recommendation_rate: pct(stages.recommended, applications),
            interview_schedule_rate: pct(stages.first_interview_scheduled, stages.recommended),
            interview_held_rate: pct(stages.first_interview_held, stages.first_interview_scheduled),
            second_interview_rate: pct(stages.second_interview_held, stages.first_interview_held),
            offer_rate: pct(stages.offer_extended, stages.first_interview_held),
            acceptance_rate: pct(stages.offer_accepted, stages.offer_extended),
            onboarding_rate: pct(stages.onboarded, stages.offer_accepted),
            withdrawal_rate: pct(stages.pre_onboarding_withdrawn, stages.offer_accepted),
            hire_rate: pct(stages.onboarded, applications),
        }
    }
}

/// Funnel figures for one group.
///
/// `applications` and `valid_applications` belong to the creation month, and
/// each stage count to the month its instant falls in. `revenue`, `refund` and
/// `early_attrition` follow the onboarding: a hire created in January and
/// onboarded in March credits its fee to the March row, not the January cohort.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FunnelMetrics {
    pub applications: usize,
    pub valid_applications: usize,
    pub stages: StageCounts,
    pub early_attrition: usize,
    pub revenue: f64,
    pub refund: f64,
    pub rates: FunnelRates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelRow {
    pub key: FunnelKey,
    pub metrics: FunnelMetrics,
}

/// Current and previous-period values for one group; no deltas are derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelComparison {
    pub key: FunnelKey,
    pub current: FunnelMetrics,
    pub previous: FunnelMetrics,
}

/// Share of applications entering `stage` inside the window that later reached `next_stage`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortConversion {
    pub stage: FunnelStage,
    pub stage_label: &'static str,
    pub next_stage: FunnelStage,
    pub entered: usize,
    pub progressed: usize,
    pub rate: f64,
}

#[derive(Debug, Default)]
struct GroupAccumulator<'a> {
    applications: usize,
    valid_candidates: HashSet<&'a str>,
    stages: StageCounts,
    early_attrition: usize,
    revenue: f64,
    refund: f64,
}

impl GroupAccumulator<'_> {
    fn finish(self) -> FunnelMetrics {
        let valid_applications = self.valid_candidates.len();
        FunnelMetrics {
            applications: self.applications,
            valid_applications,
            rates: FunnelRates::from_counts(self.applications, valid_applications, &self.stages),
            stages: self.stages,
            early_attrition: self.early_attrition,
            revenue: self.revenue,
            refund: self.refund,
        }
    }
}

/// Applications whose creation date lies in `window`.
pub fn created_within<'a>(
    applications: &'a [Application],
    window: &'a PeriodWindow,
) -> impl Iterator<Item = &'a Application> + 'a {
    applications
        .iter()
        .filter(move |application| window.contains(application.created_on()))
}

pub struct FunnelAggregator<'a> {
    resolver: StageTimestampResolver,
    placements: HashMap<&'a str, &'a Placement>,
    default_warranty_days: u32,
}

impl<'a> FunnelAggregator<'a> {
    pub fn new(placements: &'a [Placement], default_warranty_days: u32) -> Self {
        let mut index = HashMap::with_capacity(placements.len());
        for placement in placements {
            index.entry(placement.application_id.as_str()).or_insert(placement);
        }

        Self {
            resolver: StageTimestampResolver,
            placements: index,
            default_warranty_days,
        }
    }

    /// Onboarded and departed within the hiring client's warranty window.
    pub fn is_early_attrition(&self, application: &Application) -> bool {
        let (Some(onboarded), Some(departed)) = (
            application.stages.onboarded,
            application.stages.post_onboarding_departed,
        ) else {
            return false;
        };

        let warranty = i64::from(application.warranty_days.unwrap_or(self.default_warranty_days));
        let tenure = (departed.date() - onboarded.date()).num_days();
        (0..=warranty).contains(&tenure)
    }

    /// Counts the given applications per group. Applications created outside
    /// `window` are ignored; stage instants are judged against each group's own
    /// window (a calendar month clipped to `window` when grouping by month).
    pub fn aggregate<'b, I>(
        &self,
        applications: I,
        grouping: Grouping,
        window: &PeriodWindow,
    ) -> Vec<FunnelRow>
    where
        I: IntoIterator<Item = &'b Application>,
    {
        let windows: Vec<(Option<MonthKey>, PeriodWindow)> = if grouping.by_month() {
            window
                .month_windows()
                .into_iter()
                .map(|(month, clipped)| (Some(month), clipped))
                .collect()
        } else {
            vec![(None, *window)]
        };

        let mut groups: BTreeMap<FunnelKey, GroupAccumulator<'b>> = BTreeMap::new();
        if !grouping.by_channel() {
            for (period, _) in &windows {
                groups
                    .entry(FunnelKey {
                        period: *period,
                        channel: None,
                    })
                    .or_default();
            }
        }

        for application in applications {
            let created_on = application.created_on();
            if !window.contains(created_on) {
                continue;
            }

            let channel = grouping.by_channel().then(|| application.channel.clone());

            for (period, group_window) in &windows {
                let hits = self.resolver.resolve(application, group_window);
                let created_here = group_window.contains(created_on);
                if !created_here && hits.is_empty() {
                    continue;
                }

                let group = groups
                    .entry(FunnelKey {
                        period: *period,
                        channel: channel.clone(),
                    })
                    .or_default();

                if created_here {
                    group.applications += 1;
                    if application.is_valid {
                        group.valid_candidates.insert(application.candidate_id.as_str());
                    }
                }

                for stage in hits.iter() {
                    group.stages.increment(stage);
                }

                if hits.contains(FunnelStage::Onboarded) {
                    if self.is_early_attrition(application) {
                        group.early_attrition += 1;
                    }
                    if let Some(placement) = self.placements.get(application.id.as_str()) {
                        group.revenue += placement.fee;
                        group.refund += placement.refund;
                    }
                }
            }
        }

        groups
            .into_iter()
            .map(|(key, group)| FunnelRow {
                key,
                metrics: group.finish(),
            })
            .collect()
    }

    /// Runs the aggregation for `window` and for the window before it, pairing
    /// groups by key. Month keys of the previous window are aligned by position.
    pub fn compare(
        &self,
        applications: &[Application],
        grouping: Grouping,
        window: &PeriodWindow,
    ) -> Vec<FunnelComparison> {
        let previous_window = window.previous();
        let current = self.aggregate(created_within(applications, window), grouping, window);
        let previous = self.aggregate(
            created_within(applications, &previous_window),
            grouping,
            &previous_window,
        );

        let aligned_months: HashMap<MonthKey, MonthKey> = previous_window
            .month_windows()
            .into_iter()
            .map(|(month, _)| month)
            .zip(window.month_windows().into_iter().map(|(month, _)| month))
            .collect();

        let mut merged: BTreeMap<FunnelKey, (FunnelMetrics, FunnelMetrics)> = BTreeMap::new();
        for row in current {
            merged.entry(row.key).or_default().0 = row.metrics;
        }

        for row in previous {
            let period = match row.key.period {
                None => None,
                Some(month) => match aligned_months.get(&month) {
                    Some(aligned) => Some(*aligned),
                    None => continue,
                },
            };
            let key = FunnelKey {
                period,
                channel: row.key.channel,
            };
            merged.entry(key).or_default().1 = row.metrics;
        }

        merged
            .into_iter()
            .map(|(key, (current, previous))| FunnelComparison {
                key,
                current,
                previous,
            })
            .collect()
    }

    /// Stepwise conversion for every stage that has a successor.
    pub fn cohort_rates<'b, I>(
        &self,
        applications: I,
        window: &PeriodWindow,
    ) -> Vec<CohortConversion>
    where
        I: IntoIterator<Item = &'b Application>,
    {
        let stages: Vec<(FunnelStage, FunnelStage)> = FunnelStage::ordered()
            .into_iter()
            .filter_map(|stage| stage.next().map(|next| (stage, next)))
            .collect();
        let mut tallies = vec![(0usize, 0usize); stages.len()];

        for application in applications {
            for ((stage, _), (entered, progressed)) in stages.iter().zip(tallies.iter_mut()) {
                if !self.resolver.reached_in(application, *stage, window) {
                    continue;
                }
                *entered += 1;
                if self.resolver.progressed_from(application, *stage) {
                    *progressed += 1;
                }
            }
        }

        stages
            .into_iter()
            .zip(tallies)
            .map(|((stage, next_stage), (entered, progressed))| CohortConversion {
                stage,
                stage_label: stage.label(),
                next_stage,
                entered,
                progressed,
                rate: safe_percent(progressed as f64, entered as f64),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::domain::StageInstants;
    use chrono::{NaiveDate, NaiveDateTime};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        day(y, m, d).and_hms_opt(10, 0, 0).expect("valid time")
    }

    fn application(id: &str, channel: &str, created: NaiveDateTime) -> Application {
        Application {
            id: id.to_string(),
            candidate_id: format!("cand-{id}"),
            channel: channel.to_string(),
            created_at: created,
            stages: StageInstants::default(),
            is_valid: false,
            warranty_days: None,
        }
    }

    fn q1() -> PeriodWindow {
        PeriodWindow::new(day(2026, 1, 1), day(2026, 4, 1))
    }

    #[test]
    fn empty_input_yields_zero_metrics() {
        let aggregator = FunnelAggregator::new(&[], 90);
        let rows = aggregator.aggregate(std::iter::empty(), Grouping::Total, &q1());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].metrics, FunnelMetrics::default());
        assert_eq!(rows[0].metrics.rates.hire_rate, 0.0);

        let monthly = aggregator.aggregate(std::iter::empty(), Grouping::Month, &q1());
        assert_eq!(monthly.len(), 3);
        assert!(monthly.iter().all(|row| row.metrics == FunnelMetrics::default()));

        assert!(aggregator
            .aggregate(std::iter::empty(), Grouping::MonthAndChannel, &q1())
            .is_empty());
    }

    #[test]
    fn valid_applications_count_distinct_candidates() {
        let mut first = application("a-1", "media-A", at(2026, 1, 5));
        first.is_valid = true;
        first.candidate_id = "cand-shared".to_string();
        let mut second = application("a-2", "media-A", at(2026, 1, 9));
        second.is_valid = true;
        second.candidate_id = "cand-shared".to_string();
        let third = application("a-3", "media-A", at(2026, 1, 12));

        let apps = vec![first, second, third];
        let aggregator = FunnelAggregator::new(&[], 90);
        let rows = aggregator.aggregate(&apps, Grouping::Channel, &q1());

        assert_eq!(rows.len(), 1);
        let metrics = &rows[0].metrics;
        assert_eq!(metrics.applications, 3);
        assert_eq!(metrics.valid_applications, 1);
        assert_eq!(metrics.rates.valid_application_rate, 33.3);
    }

    #[test]
    fn stages_are_counted_in_the_month_they_happen() {
        let mut app = application("a-1", "media-A", at(2026, 1, 20));
        app.stages.recommended = Some(at(2026, 1, 25));
        app.stages.first_interview_held = Some(at(2026, 2, 3));
        app.stages.onboarded = Some(at(2026, 3, 2));
        let apps = vec![app];
        let placements = vec![Placement {
            application_id: "a-1".to_string(),
            fee: 900_000.0,
            refund: 0.0,
        }];

        let aggregator = FunnelAggregator::new(&placements, 90);
        let rows = aggregator.aggregate(&apps, Grouping::MonthAndChannel, &q1());

        let months: Vec<String> = rows
            .iter()
            .map(|row| row.key.period.expect("month key").to_string())
            .collect();
        assert_eq!(months, vec!["2026-01", "2026-02", "2026-03"]);

        assert_eq!(rows[0].metrics.applications, 1);
        assert_eq!(rows[0].metrics.stages.recommended, 1);
        assert_eq!(rows[1].metrics.applications, 0);
        assert_eq!(rows[1].metrics.stages.first_interview_held, 1);
        assert_eq!(rows[2].metrics.stages.onboarded, 1);
        assert_eq!(rows[2].metrics.revenue, 900_000.0);
        assert_eq!(rows[0].metrics.revenue, 0.0);
    }

    #[test]
    fn applications_created_outside_the_window_are_ignored() {
        let mut early = application("a-1", "media-A", at(2025, 12, 20));
        early.stages.recommended = Some(at(2026, 1, 3));
        let apps = vec![early];
        let aggregator = FunnelAggregator::new(&[], 90);
        let rows = aggregator.aggregate(&apps, Grouping::Total, &q1());
        assert_eq!(rows[0].metrics, FunnelMetrics::default());
    }

    #[test]
    fn early_attrition_uses_client_warranty_or_default() {
        let mut inside_default = application("a-1", "media-A", at(2026, 1, 2));
        inside_default.stages.onboarded = Some(at(2026, 1, 10));
        inside_default.stages.post_onboarding_departed = Some(at(2026, 4, 10));

        let mut outside_client = inside_default.clone();
        outside_client.id = "a-2".to_string();
        outside_client.warranty_days = Some(30);

        let mut departed_before_onboarding = inside_default.clone();
        departed_before_onboarding.id = "a-3".to_string();
        departed_before_onboarding.stages.post_onboarding_departed = Some(at(2026, 1, 5));

        let aggregator = FunnelAggregator::new(&[], 90);
        assert!(aggregator.is_early_attrition(&inside_default));
        assert!(!aggregator.is_early_attrition(&outside_client));
        assert!(!aggregator.is_early_attrition(&departed_before_onboarding));

        let apps = vec![inside_default, outside_client, departed_before_onboarding];
        let rows = aggregator.aggregate(&apps, Grouping::Total, &q1());
        assert_eq!(rows[0].metrics.stages.onboarded, 3);
        assert_eq!(rows[0].metrics.early_attrition, 1);
    }

    #[test]
    fn rates_follow_adjacent_stages() {
        let mut apps = Vec::new();
        for index in 0..4 {
            let mut app = application(&format!("a-{index}"), "media-A", at(2026, 2, 1));
            app.stages.recommended = Some(at(2026, 2, 2));
            if index < 2 {
                app.stages.first_interview_scheduled = Some(at(2026, 2, 3));
            }
            if index < 1 {
                app.stages.first_interview_held = Some(at(2026, 2, 4));
            }
            apps.push(app);
        }

        let aggregator = FunnelAggregator::new(&[], 90);
        let rows = aggregator.aggregate(&apps, Grouping::Total, &q1());
        let rates = rows[0].metrics.rates;
        assert_eq!(rates.recommendation_rate, 100.0);
        assert_eq!(rates.interview_schedule_rate, 50.0);
        assert_eq!(rates.interview_held_rate, 50.0);
        assert_eq!(rates.offer_rate, 0.0);
        assert_eq!(rates.acceptance_rate, 0.0);
    }

    #[test]
    fn comparison_pairs_previous_months_by_position() {
        let current = application("a-1", "media-A", at(2026, 2, 14));
        let previous = application("a-2", "media-A", at(2026, 1, 14));
        let older = application("a-3", "media-A", at(2025, 12, 14));
        let apps = vec![current, previous, older];

        let february = PeriodWindow::new(day(2026, 2, 1), day(2026, 3, 1));
        let aggregator = FunnelAggregator::new(&[], 90);

        let by_month = aggregator.compare(&apps, Grouping::Month, &february);
        assert_eq!(by_month.len(), 1);
        assert_eq!(by_month[0].key.period.map(|m| m.to_string()).as_deref(), Some("2026-02"));
        assert_eq!(by_month[0].current.applications, 1);
        assert_eq!(by_month[0].previous.applications, 1);

        let by_channel = aggregator.compare(&apps, Grouping::Channel, &february);
        assert_eq!(by_channel.len(), 1);
        assert_eq!(by_channel[0].key.channel.as_deref(), Some("media-A"));
        assert_eq!(by_channel[0].previous.applications, 1);
    }

    #[test]
    fn comparison_keeps_channels_seen_only_last_period() {
        let apps = vec![application("a-1", "media-B", at(2026, 1, 14))];
        let february = PeriodWindow::new(day(2026, 2, 1), day(2026, 3, 1));
        let aggregator = FunnelAggregator::new(&[], 90);

        let rows = aggregator.compare(&apps, Grouping::Channel, &february);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].current, FunnelMetrics::default());
        assert_eq!(rows[0].previous.applications, 1);
    }

    #[test]
    fn cohort_rates_follow_entrants_forward() {
        let mut progressed = application("a-1", "media-A", at(2026, 1, 3));
        progressed.stages.offer_extended = Some(at(2026, 3, 30));
        progressed.stages.offer_accepted = Some(at(2026, 4, 2));
        let mut stalled = application("a-2", "media-A", at(2026, 1, 3));
        stalled.stages.offer_extended = Some(at(2026, 2, 1));
        let apps = vec![progressed, stalled];

        let aggregator = FunnelAggregator::new(&[], 90);
        let cohort = aggregator.cohort_rates(&apps, &q1());
        let offers = cohort
            .iter()
            .find(|entry| entry.stage == FunnelStage::OfferExtended)
            .expect("offer cohort present");
        assert_eq!(offers.entered, 2);
        assert_eq!(offers.progressed, 1);
        assert_eq!(offers.rate, 50.0);

        let recommended = cohort
            .iter()
            .find(|entry| entry.stage == FunnelStage::Recommended)
            .expect("recommended cohort present");
        assert_eq!(recommended.entered, 0);
        assert_eq!(recommended.rate, 0.0);
    }
}
