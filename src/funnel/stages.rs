use super::dates::PeriodWindow;
use super::domain::{Application, FunnelStage};

/// Stages an application reached inside one window, in pipeline order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageHits {
    stages: Vec<FunnelStage>,
}

impl StageHits {
    pub fn contains(&self, stage: FunnelStage) -> bool {
        self.stages.contains(&stage)
    }

    pub fn iter(&self) -> impl Iterator<Item = FunnelStage> + '_ {
        self.stages.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }
}

/// Evaluates stage instants against half-open windows. Each stage is judged on
/// its own instant only, so out-of-order pipelines are counted as recorded.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTimestampResolver;

impl StageTimestampResolver {
    pub fn reached_in(
        &self,
        application: &Application,
        stage: FunnelStage,
        window: &PeriodWindow,
    ) -> bool {
        application
            .stages
            .get(stage)
            .is_some_and(|instant| window.contains(instant.date()))
    }

    pub fn resolve(&self, application: &Application, window: &PeriodWindow) -> StageHits {
        let stages = FunnelStage::ordered()
            .into_iter()
            .filter(|&stage| self.reached_in(application, stage, window))
            .collect();
        StageHits { stages }
    }

    /// Whether the application went on to `stage.next()` no earlier than it entered `stage`.
    pub fn progressed_from(&self, application: &Application, stage: FunnelStage) -> bool {
        let Some(next) = stage.next() else {
            return false;
        };
        match (application.stages.get(stage), application.stages.get(next)) {
            (Some(entered), Some(reached)) => reached >= entered,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::domain::StageInstants;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .expect("valid date")
            .and_hms_opt(12, 0, 0)
            .expect("valid time")
    }

    fn application(stages: StageInstants) -> Application {
        Application {
            id: "a-1".to_string(),
            candidate_id: "c-1".to_string(),
            channel: "media-A".to_string(),
            created_at: at(2026, 1, 20),
            stages,
            is_valid: true,
            warranty_days: None,
        }
    }

    fn february() -> PeriodWindow {
        PeriodWindow::new(
            NaiveDate::from_ymd_opt(2026, 2, 1).expect("valid date"),
            NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date"),
        )
    }

    #[test]
    fn several_stages_can_land_in_one_window() {
        let app = application(StageInstants {
            recommended: Some(at(2026, 2, 2)),
            offer_extended: Some(at(2026, 2, 27)),
            onboarded: Some(at(2026, 3, 1)),
            ..StageInstants::default()
        });

        let hits = StageTimestampResolver.resolve(&app, &february());
        assert_eq!(hits.len(), 2);
        assert!(hits.contains(FunnelStage::Recommended));
        assert!(hits.contains(FunnelStage::OfferExtended));
        assert!(!hits.contains(FunnelStage::Onboarded), "window end is exclusive");
    }

    #[test]
    fn window_start_is_inclusive() {
        let app = application(StageInstants {
            first_interview_held: Some(at(2026, 2, 1)),
            ..StageInstants::default()
        });
        assert!(StageTimestampResolver.reached_in(
            &app,
            FunnelStage::FirstInterviewHeld,
            &february()
        ));
    }

    #[test]
    fn out_of_order_instants_are_counted_independently() {
        let app = application(StageInstants {
            offer_extended: Some(at(2026, 2, 3)),
            recommended: Some(at(2026, 2, 10)),
            ..StageInstants::default()
        });
        let hits = StageTimestampResolver.resolve(&app, &february());
        assert_eq!(
            hits.iter().collect::<Vec<_>>(),
            vec![FunnelStage::Recommended, FunnelStage::OfferExtended]
        );
        assert!(!StageTimestampResolver.progressed_from(&app, FunnelStage::Recommended));
    }

    #[test]
    fn progression_requires_the_next_stage_on_or_after_entry() {
        let app = application(StageInstants {
            offer_extended: Some(at(2026, 2, 3)),
            offer_accepted: Some(at(2026, 2, 3)),
            ..StageInstants::default()
        });
        assert!(StageTimestampResolver.progressed_from(&app, FunnelStage::OfferExtended));
        assert!(!StageTimestampResolver.progressed_from(&app, FunnelStage::OfferAccepted));
    }
}
