use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use predictions_core::domain::contract::validate_records;
use predictions_core::export::{export_to_spreadsheet, ExportBuffer};
use predictions_core::report::DashboardReport;

#[derive(Debug, Parser)]
#[command(name = "predictions_cli")]
struct Args {
    /// Prediction rows (.json or .xlsx). Defaults to PREDICTIONS_PATH, then the built-in sample.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Directory the workbook is written to.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Generation date used in the file name (YYYY-MM-DD). Defaults to today's local date.
    #[arg(long)]
    generated_on: Option<String>,

    /// Compute and log the report without writing the workbook.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = predictions_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(args, &settings) {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "prediction report failed");
        return Err(err);
    }
    Ok(())
}

fn run(args: Args, settings: &predictions_core::config::Settings) -> anyhow::Result<()> {
    let generated_on = resolve_generated_on(args.generated_on.as_deref())?;

    let input = args.input.as_deref().or(settings.predictions_path.as_deref());
    let raw = predictions_core::ingest::load_or_sample(input)?;

    let validated = validate_records(&raw);
    for err in &validated.rejected {
        tracing::warn!(index = err.index(), error = %err, "skipping invalid prediction row");
    }

    let report = DashboardReport::build(&validated.records);
    tracing::info!(
        records = report.total_records,
        rejected = validated.rejected.len(),
        dates = report.accuracy_over_time.len(),
        leagues = report.predictions_per_league.len(),
        overall_accuracy_pct = report.overall_accuracy_pct(),
        "built prediction report"
    );
    for point in &report.accuracy_over_time {
        tracing::info!(date = %point.date, accuracy_pct = point.accuracy_pct, "accuracy");
    }
    for entry in &report.outcome_distribution {
        tracing::info!(outcome = %entry.label, count = entry.count, "outcome distribution");
    }
    for entry in &report.predictions_per_league {
        tracing::info!(league = %entry.label, count = entry.count, "predictions per league");
    }

    let buffer = export_to_spreadsheet(&validated.records).context("workbook export failed")?;
    let path = args.out_dir.join(ExportBuffer::file_name(generated_on));

    if args.dry_run {
        tracing::info!(
            path = %path.display(),
            bytes = buffer.len(),
            dry_run = true,
            "skipping workbook write"
        );
        return Ok(());
    }

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create {} failed", args.out_dir.display()))?;
    std::fs::write(&path, buffer.as_bytes())
        .with_context(|| format!("write {} failed", path.display()))?;

    tracing::info!(path = %path.display(), bytes = buffer.len(), "wrote predictions workbook");
    Ok(())
}

fn init_sentry(settings: &predictions_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

fn resolve_generated_on(arg: Option<&str>) -> anyhow::Result<chrono::NaiveDate> {
    if let Some(s) = arg {
        return chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("--generated-on must be YYYY-MM-DD (got {s:?})"));
    }
    Ok(chrono::Local::now().date_naive())
}
