use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use predictions_core::domain::contract::validate_records;
use predictions_core::domain::record::PredictionRecord;
use predictions_core::export::{export_to_spreadsheet, ExportBuffer, XLSX_MIME_TYPE};
use predictions_core::report::DashboardReport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = predictions_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let raw = match predictions_core::ingest::load_or_sample(settings.predictions_path.as_deref()) {
        Ok(raw) => raw,
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %format!("{e:#}"), "failed to load predictions");
            return Err(e);
        }
    };

    let validated = validate_records(&raw);
    for err in &validated.rejected {
        tracing::warn!(index = err.index(), error = %err, "skipping invalid prediction row");
    }

    let state = AppState {
        records: Arc::new(validated.records),
        rejected: Arc::new(validated.rejected.iter().map(|e| e.to_string()).collect()),
    };

    let app = router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/report", get(get_report))
        .route("/records", get(get_records))
        .route("/export.xlsx", get(get_export))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

/// Records are validated once at startup and shared read-only across handlers.
#[derive(Debug, Clone)]
struct AppState {
    records: Arc<Vec<PredictionRecord>>,
    rejected: Arc<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ApiReport {
    #[serde(flatten)]
    report: DashboardReport,
    rejected: Vec<String>,
}

async fn get_report(State(state): State<AppState>) -> Json<ApiReport> {
    Json(ApiReport {
        report: DashboardReport::build(&state.records),
        rejected: state.rejected.as_ref().clone(),
    })
}

async fn get_records(State(state): State<AppState>) -> Json<Vec<PredictionRecord>> {
    Json(state.records.as_ref().clone())
}

async fn get_export(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let buffer = export_to_spreadsheet(&state.records).map_err(|e| {
        let err = anyhow::Error::new(e);
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "workbook export failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let disposition = content_disposition(Local::now().date_naive());
    let disposition =
        HeaderValue::from_str(&disposition).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_MIME_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        buffer.into_bytes(),
    )
        .into_response())
}

fn content_disposition(generated_on: NaiveDate) -> String {
    format!(
        "attachment; filename=\"{}\"",
        ExportBuffer::file_name(generated_on)
    )
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
