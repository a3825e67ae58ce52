use chrono::NaiveDate;
use hiring_funnel::funnel::ingest::RecordKind;
use hiring_funnel::funnel::report::ReportRow;
use hiring_funnel::funnel::{
    build_performance_report, OpenTermBilling, PerformanceReport, ReportRequest, ReportSettings,
};
use hiring_funnel::import::ProjectionImporter;
use std::path::PathBuf;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn first_quarter_report(settings: &ReportSettings, compare_previous: bool) -> PerformanceReport {
    let snapshot = ProjectionImporter::from_dir(fixtures_dir()).expect("fixtures import");
    let request = ReportRequest::new(
        Some("2026-01"),
        Some("2026-03"),
        date(2026, 3, 31),
        compare_previous,
    )
    .expect("valid request");
    build_performance_report(&request, &snapshot, settings)
}

fn row<'a>(report: &'a PerformanceReport, period: &str, channel: &str) -> &'a ReportRow {
    report
        .rows
        .iter()
        .find(|row| row.period.to_string() == period && row.channel == channel)
        .unwrap_or_else(|| panic!("row {period} {channel} present"))
}

#[test]
fn rows_cover_every_channel_month_with_cost_or_activity() {
    let report = first_quarter_report(&ReportSettings::default(), false);

    let keys: Vec<String> = report.rows.iter().map(|row| row.id.clone()).collect();
    assert_eq!(
        keys,
        vec![
            "2026-01-media-A",
            "2026-02-media-A",
            "2026-02-media-B",
            "2026-03-(unknown)",
            "2026-03-media-A",
            "2026-03-media-B",
            "2026-03-media-C",
        ]
    );
}

#[test]
fn costs_are_prorated_per_month() {
    let report = first_quarter_report(&ReportSettings::default(), false);

    assert_eq!(row(&report, "2026-01", "media-A").cost, 31_000.0);
    assert_eq!(row(&report, "2026-02", "media-A").cost, 28_000.0);
    assert_eq!(row(&report, "2026-02", "media-B").cost, 20_357.0);
    assert_eq!(row(&report, "2026-03", "media-C").cost, 120_000.0);
    assert_eq!(row(&report, "2026-03", "media-B").cost, 0.0);
    assert_eq!(report.summary.total_cost, 230_357.0);
}

#[test]
fn funnel_counts_land_in_the_month_each_stage_happened() {
    let report = first_quarter_report(&ReportSettings::default(), false);

    let january = row(&report, "2026-01", "media-A");
    assert_eq!(january.applications, 2);
    assert_eq!(january.valid_applications, 2);
    assert_eq!(january.stages.recommended, 2);
    assert_eq!(january.stages.offer_accepted, 1);
    assert_eq!(january.hired, 0);
    assert_eq!(january.roi, -100);

    let february = row(&report, "2026-02", "media-A");
    assert_eq!(february.applications, 2);
    assert_eq!(february.hired, 1);
    assert_eq!(february.revenue, 900_000.0);
    assert_eq!(february.roi, 3114);
    assert_eq!(february.retention, 100.0);

    let unknown = row(&report, "2026-03", "(unknown)");
    assert_eq!(unknown.applications, 1);
    assert_eq!(unknown.valid_applications, 0);
}

#[test]
fn early_attrition_uses_each_clients_warranty() {
    let report = first_quarter_report(&ReportSettings::default(), false);

    let media_a = row(&report, "2026-03", "media-A");
    assert_eq!(media_a.hired, 1);
    assert_eq!(media_a.early_attrition, 1);
    assert_eq!(media_a.retention, 0.0);
    assert_eq!(media_a.refund, 800_000.0);
    assert_eq!(media_a.roi, 2481);

    let media_b = row(&report, "2026-03", "media-B");
    assert_eq!(media_b.hired, 1);
    assert_eq!(media_b.early_attrition, 0, "departure falls outside the 30-day warranty");
    assert_eq!(media_b.retention, 100.0);
    assert_eq!(media_b.roi, 0, "no cost means no ROI");
}

#[test]
fn summary_and_warnings_reflect_the_whole_range() {
    let report = first_quarter_report(&ReportSettings::default(), false);

    assert_eq!(report.summary.total_applications, 7);
    assert_eq!(report.summary.total_valid_applications, 5);
    assert_eq!(report.summary.total_hired, 3);
    assert_eq!(report.summary.total_revenue, 2_900_000.0);
    assert_eq!(report.summary.total_refund, 1_000_000.0);

    let kinds: Vec<(RecordKind, &str)> = report
        .warnings
        .iter()
        .map(|warning| (warning.record_kind, warning.record_id.as_str()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (RecordKind::Application, "a-09"),
            (RecordKind::Contract, "k-4"),
            (RecordKind::Placement, "a-08"),
        ]
    );
}

#[test]
fn cohort_rates_follow_entrants_to_the_next_stage() {
    let report = first_quarter_report(&ReportSettings::default(), false);

    let recommended = &report.cohort_rates[0];
    assert_eq!(recommended.stage_label, "Recommended");
    assert_eq!(recommended.entered, 4);
    assert_eq!(recommended.progressed, 3);
    assert_eq!(recommended.rate, 75.0);
}

#[test]
fn previous_period_comparison_uses_the_preceding_quarter() {
    let report = first_quarter_report(&ReportSettings::default(), true);
    let comparison = report.comparison.expect("comparison requested");

    assert_eq!(comparison.previous_window.start, date(2025, 10, 1));
    assert_eq!(comparison.previous_window.end, date(2026, 1, 1));

    let media_a = comparison
        .groups
        .iter()
        .find(|group| group.key.channel.as_deref() == Some("media-A"))
        .expect("media-A compared");
    assert_eq!(media_a.current.applications, 4);
    assert_eq!(media_a.previous.applications, 1);
    assert_eq!(comparison.groups.len(), 3);
}

#[test]
fn open_contracts_are_billed_through_the_as_of_date_unless_month_end_is_configured() {
    let snapshot = ProjectionImporter::from_dir(fixtures_dir()).expect("fixtures import");
    let request = ReportRequest::new(Some("2026-03"), Some("2026-03"), date(2026, 3, 15), false)
        .expect("valid request");

    let report = build_performance_report(&request, &snapshot, &ReportSettings::default());
    assert_eq!(row(&report, "2026-03", "media-A").cost, 15_000.0);

    let month_end = ReportSettings {
        open_term: OpenTermBilling::AsOfMonthEnd,
        ..ReportSettings::default()
    };
    let report = build_performance_report(&request, &snapshot, &month_end);
    assert_eq!(row(&report, "2026-03", "media-A").cost, 31_000.0);
}
