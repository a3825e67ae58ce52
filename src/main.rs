use axum::extract::{FromRef, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use hiring_funnel::config::AppConfig;
use hiring_funnel::error::AppError;
use hiring_funnel::funnel::ingest::ProjectionSnapshot;
use hiring_funnel::funnel::{
    build_performance_report, PerformanceReport, ReportRequest, ReportSettings,
};
use hiring_funnel::import::{
    ProjectionImportError, ProjectionImporter, APPLICATIONS_FILE, CONTRACTS_FILE, PLACEMENTS_FILE,
};
use hiring_funnel::telemetry;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
    reports: ReportState,
}

#[derive(Clone)]
struct ReportState {
    settings: ReportSettings,
    data_dir: Option<Arc<PathBuf>>,
}

impl FromRef<AppState> for ReportState {
    fn from_ref(state: &AppState) -> Self {
        state.reports.clone()
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "hiring-funnel",
    about = "Recruiting funnel and advertising cost performance reports",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print a channel performance report from CSV projection exports
    Report(ReportArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// First month of the report (YYYY-MM)
    #[arg(long)]
    start_month: String,
    /// Last month of the report, inclusive (YYYY-MM)
    #[arg(long)]
    end_month: String,
    /// Date open-ended contracts are billed against (defaults to today)
    #[arg(long, value_parser = parse_date)]
    as_of: Option<NaiveDate>,
    /// Directory holding applications.csv, contracts.csv and placements.csv
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Also aggregate the preceding period of the same length
    #[arg(long)]
    compare_previous: bool,
    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Deserialize)]
struct PerformanceRequest {
    #[serde(default)]
    start_month: Option<String>,
    #[serde(default)]
    end_month: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    as_of: Option<NaiveDate>,
    #[serde(default)]
    compare_previous: bool,
    #[serde(default)]
    projections: ProjectionSnapshot,
}

#[derive(Debug, Default, Deserialize)]
struct PerformanceQuery {
    #[serde(default)]
    start_month: Option<String>,
    #[serde(default)]
    end_month: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    as_of: Option<NaiveDate>,
    #[serde(default)]
    compare_previous: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Report(args) => run_report(args).await,
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.filter(|value| !value.trim().is_empty())
        .map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route(
            "/api/v1/funnel/performance",
            get(stored_performance_endpoint).post(performance_endpoint),
        )
        .with_state(state)
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
        reports: ReportState {
            settings: config.reporting.report_settings(),
            data_dir: config.reporting.data_dir.clone().map(Arc::new),
        },
    };

    let app = router(state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        data_dir = ?config.reporting.data_dir,
        "funnel performance service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let ReportArgs {
        start_month,
        end_month,
        as_of,
        data_dir,
        compare_previous,
        json,
    } = args;

    let request = ReportRequest::new(
        Some(&start_month),
        Some(&end_month),
        as_of.unwrap_or_else(today),
        compare_previous,
    )?;

    let data_dir = data_dir
        .or_else(|| config.reporting.data_dir.clone())
        .ok_or(AppError::DataSourceUnavailable)?;
    let snapshot = load_snapshot(Arc::new(data_dir)).await?;
    let report =
        build_performance_report(&request, &snapshot, &config.reporting.report_settings());

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|err| AppError::Io(std::io::Error::other(err)))?;
        println!("{rendered}");
    } else {
        render_performance_report(&report);
    }

    Ok(())
}

async fn blocking_import<T, F>(task: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProjectionImportError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| AppError::Server(axum::Error::new(err)))?
        .map_err(AppError::from)
}

/// Reads the three projection exports concurrently.
async fn load_snapshot(dir: Arc<PathBuf>) -> Result<ProjectionSnapshot, AppError> {
    let applications_path = dir.join(APPLICATIONS_FILE);
    let contracts_path = dir.join(CONTRACTS_FILE);
    let placements_path = dir.join(PLACEMENTS_FILE);

    let (applications, contracts, placements) = tokio::try_join!(
        blocking_import(move || ProjectionImporter::applications_from_path(applications_path)),
        blocking_import(move || ProjectionImporter::contracts_from_path(contracts_path)),
        blocking_import(move || ProjectionImporter::placements_from_path(placements_path)),
    )?;

    Ok(ProjectionSnapshot {
        applications,
        contracts,
        placements,
    })
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn performance_endpoint(
    State(state): State<ReportState>,
    Json(payload): Json<PerformanceRequest>,
) -> Result<Json<PerformanceReport>, AppError> {
    let PerformanceRequest {
        start_month,
        end_month,
        as_of,
        compare_previous,
        projections,
    } = payload;

    let request = ReportRequest::new(
        start_month.as_deref(),
        end_month.as_deref(),
        as_of.unwrap_or_else(today),
        compare_previous,
    )?;

    Ok(Json(build_performance_report(
        &request,
        &projections,
        &state.settings,
    )))
}

async fn stored_performance_endpoint(
    State(state): State<ReportState>,
    Query(query): Query<PerformanceQuery>,
) -> Result<Json<PerformanceReport>, AppError> {
    let request = ReportRequest::new(
        query.start_month.as_deref(),
        query.end_month.as_deref(),
        query.as_of.unwrap_or_else(today),
        query.compare_previous,
    )?;

    let data_dir = state.data_dir.ok_or(AppError::DataSourceUnavailable)?;
    let snapshot = load_snapshot(data_dir).await?;

    Ok(Json(build_performance_report(
        &request,
        &snapshot,
        &state.settings,
    )))
}

fn render_performance_report(report: &PerformanceReport) {
    println!("Channel performance report");
    println!(
        "Months: {} -> {} (as of {})",
        report.range.start_month, report.range.end_month, report.as_of
    );

    if report.rows.is_empty() {
        println!("\nNo funnel activity or contract cost in range");
    } else {
        println!("\nPeriod  | Channel | Apps | Valid | Hired | Cost | Revenue | ROI % | Retention %");
        for row in &report.rows {
            println!(
                "{} | {} | {} | {} | {} | {:.0} | {:.0} | {} | {:.1}",
                row.period,
                row.channel,
                row.applications,
                row.valid_applications,
                row.hired,
                row.cost,
                row.revenue,
                row.roi,
                row.retention
            );
        }
    }

    let summary = &report.summary;
    println!(
        "\nTotals: {} applications, {} valid, {} hired, cost {:.0}, revenue {:.0}, refund {:.0}",
        summary.total_applications,
        summary.total_valid_applications,
        summary.total_hired,
        summary.total_cost,
        summary.total_revenue,
        summary.total_refund
    );

    println!("\nStepwise conversion");
    for cohort in &report.cohort_rates {
        println!(
            "- {}: {}/{} moved on ({:.1}%)",
            cohort.stage_label, cohort.progressed, cohort.entered, cohort.rate
        );
    }

    if let Some(comparison) = &report.comparison {
        println!(
            "\nPrevious period {} vs current {}",
            comparison.previous_window, comparison.window
        );
        for group in &comparison.groups {
            println!(
                "- {}: applications {} -> {}, hired {} -> {}",
                group.key.channel.as_deref().unwrap_or("all channels"),
                group.previous.applications,
                group.current.applications,
                group.previous.stages.onboarded,
                group.current.stages.onboarded
            );
        }
    }

    if report.warnings.is_empty() {
        println!("\nData warnings: none");
    } else {
        println!("\nData warnings");
        for warning in &report.warnings {
            println!("- {:?} {}: {}", warning.record_kind, warning.record_id, warning.message);
        }
    }
}
