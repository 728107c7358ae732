#![cfg(not(tarpaulin_include))]

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::Query;
use chrono::Local;
use log::{error, info, warn};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::cache::{content_key, DatasetCache};
use crate::chart::ChartKind;
use crate::config::{ServerConfig, MAX_UPLOAD_BYTES};
use crate::dashboard::{self, DataSource, Download};
use crate::error::{DashboardError, LoadError};
use crate::filter::FilterSelection;
use crate::loader::{load_bytes, FileFormat};
use crate::present;
use crate::record::Dataset;

/// A dataset the page can be showing, with the cache key it is stored under
#[derive(Clone)]
struct ActiveDataset {
    key: String,
    source: DataSource,
    dataset: Arc<Dataset>,
}

pub struct AppState {
    config: ServerConfig,
    cache: Mutex<DatasetCache>,
    default: ActiveDataset,
    /// Last successful upload; `None` shows the default dataset
    upload: Mutex<Option<ActiveDataset>>,
    /// Message shown once on the next page view
    flash: Mutex<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AppState {
    /// Load the default dataset named in the config
    pub fn new(config: ServerConfig) -> Result<Self, LoadError> {
        let format = FileFormat::from_name(&config.dataset)?;
        let bytes = std::fs::read(&config.dataset).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound(config.dataset.display().to_string()),
            _ => LoadError::Read(e.to_string()),
        })?;

        let mut cache = DatasetCache::new();
        let (key, dataset) = cache.get_or_load(&bytes, format)?;
        info!(
            "Default dataset {} loaded with {} rows",
            config.dataset.display(),
            dataset.len()
        );

        let default = ActiveDataset {
            key,
            source: DataSource::Default {
                path: config.dataset.display().to_string(),
            },
            dataset,
        };

        Ok(AppState {
            config,
            cache: Mutex::new(cache),
            default,
            upload: Mutex::new(None),
            flash: Mutex::new(None),
        })
    }

    fn active(&self) -> ActiveDataset {
        lock(&self.upload).clone().unwrap_or_else(|| self.default.clone())
    }

    /// Parse an upload and make it the active dataset
    ///
    /// On failure the previously active dataset stays in place. Parsing runs
    /// without holding the cache lock.
    fn replace_upload(&self, file_name: &str, bytes: &[u8]) -> Result<usize, LoadError> {
        let format = FileFormat::from_name(file_name)?;
        let key = content_key(bytes);
        let cached = lock(&self.cache).get(&key);
        let dataset = match cached {
            Some(dataset) => dataset,
            None => {
                let parsed = Arc::new(load_bytes(bytes, format)?);
                lock(&self.cache).insert(key.clone(), parsed)
            }
        };
        let rows = dataset.len();

        let previous = lock(&self.upload).replace(ActiveDataset {
            key: key.clone(),
            source: DataSource::Upload {
                file_name: file_name.to_string(),
            },
            dataset,
        });
        if let Some(previous) = previous {
            self.forget(&previous.key, &key);
        }
        Ok(rows)
    }

    fn reset(&self) {
        if let Some(previous) = lock(&self.upload).take() {
            self.forget(&previous.key, &self.default.key);
        }
    }

    /// Drop a replaced upload from the cache unless it is still in use
    fn forget(&self, stale: &str, current: &str) {
        if stale != current && stale != self.default.key {
            lock(&self.cache).invalidate(stale);
        }
    }

    fn take_flash(&self) -> Option<String> {
        lock(&self.flash).take()
    }

    fn set_flash(&self, message: String) {
        *lock(&self.flash) = Some(message);
    }
}

/// Filter state as sent by the sidebar form
///
/// Keys repeat once per checked label. `filtered=1` marks a submitted form,
/// where an absent key means nothing of that column is checked.
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    #[serde(default)]
    pub filtered: Option<String>,
    #[serde(default)]
    pub segment: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub product: Vec<String>,
}

impl FilterQuery {
    pub fn into_selection(self) -> FilterSelection {
        let submitted = self.filtered.as_deref() == Some("1");
        let pick = |labels: Vec<String>| -> Option<BTreeSet<String>> {
            (submitted || !labels.is_empty()).then(|| labels.into_iter().collect())
        };

        FilterSelection {
            segments: pick(self.segment),
            categories: pick(self.category),
            products: pick(self.product),
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            DashboardError::Load(_) => StatusCode::BAD_REQUEST,
            DashboardError::Forecast(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DashboardError::Export(_) | DashboardError::Chart(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!("Request failed: {}", self);

        (
            status,
            Json(serde_json::json!({
                "status": "error",
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

/// Build the router over shared state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_dashboard))
        .route("/api/report", get(get_report))
        .route("/upload", post(upload_dataset))
        .route("/reset", post(reset_dataset))
        .route("/download/:file_name", get(download))
        .route("/chart/:name", get(chart))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let address = config.bind_address();
    let state = Arc::new(AppState::new(config)?);

    let listener = TcpListener::bind(&address).await?;
    info!("Listening on http://{}", address);
    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Run parsing and rendering on the blocking pool
async fn off_runtime<T, F>(work: F) -> Result<T, Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        error!("Background task failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

async fn serve_dashboard(
    Query(query): Query<FilterQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let selection = query.into_selection();
    let flash = state.take_flash();
    let rendered = off_runtime(move || {
        let active = state.active();
        let report = dashboard::build_report(
            &active.dataset,
            &selection,
            active.source,
            &state.config.dashboard,
        );
        present::render_dashboard(&report, flash.as_deref())
    })
    .await;

    match rendered {
        Ok(Ok(html)) => Html(html).into_response(),
        Ok(Err(e)) => {
            error!("Template rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Gagal menampilkan dashboard").into_response()
        }
        Err(response) => response,
    }
}

async fn get_report(
    Query(query): Query<FilterQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let selection = query.into_selection();
    off_runtime(move || {
        let active = state.active();
        Json(dashboard::build_report(
            &active.dataset,
            &selection,
            active.source,
            &state.config.dashboard,
        ))
        .into_response()
    })
    .await
    .unwrap_or_else(|response| response)
}

async fn read_upload(multipart: &mut Multipart) -> Result<(String, Bytes), String> {
    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        if field.name() == Some("dataset") {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(|e| e.to_string())?;
            if bytes.is_empty() {
                return Err("berkas kosong".to_string());
            }
            return Ok((file_name, bytes));
        }
    }
    Err("tidak ada berkas pada field 'dataset'".to_string())
}

async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Redirect {
    let outcome = match read_upload(&mut multipart).await {
        Ok((file_name, bytes)) => {
            let worker = Arc::clone(&state);
            off_runtime(move || {
                worker
                    .replace_upload(&file_name, &bytes)
                    .map(|rows| (file_name, rows))
                    .map_err(|e| e.to_string())
            })
            .await
            .unwrap_or_else(|_| Err("pemrosesan berkas terhenti".to_string()))
        }
        Err(message) => Err(message),
    };

    match outcome {
        Ok((file_name, rows)) => info!("Upload {} accepted with {} rows", file_name, rows),
        Err(message) => {
            warn!("Upload rejected: {}", message);
            state.set_flash(format!("Gagal memuat dataset: {}", message));
        }
    }
    Redirect::to("/")
}

async fn reset_dataset(State(state): State<Arc<AppState>>) -> Redirect {
    state.reset();
    info!("Switched back to the default dataset");
    Redirect::to("/")
}

fn file_response(bytes: Vec<u8>, content_type: &str, disposition: Option<&str>) -> Response {
    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    if let Ok(value) = header::HeaderValue::from_str(content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Some(file_name) = disposition {
        let value = format!("attachment; filename=\"{}\"", file_name);
        if let Ok(value) = header::HeaderValue::from_str(&value) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}

async fn download(
    Path(file_name): Path<String>,
    Query(query): Query<FilterQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(download) = Download::from_file_name(&file_name) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let selection = query.into_selection();
    let today = Local::now().date_naive();
    let rendered = off_runtime(move || {
        let active = state.active();
        dashboard::render_download(
            &active.dataset,
            &selection,
            download,
            &state.config.dashboard,
            today,
        )
    })
    .await;

    match rendered {
        Ok(Ok(bytes)) => file_response(bytes, download.content_type(), Some(download.file_name())),
        Ok(Err(e)) => e.into_response(),
        Err(response) => response,
    }
}

async fn chart(
    Path(name): Path<String>,
    Query(query): Query<FilterQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(kind) = ChartKind::from_name(&name) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let selection = query.into_selection();
    let rendered = off_runtime(move || {
        let active = state.active();
        dashboard::render_chart(&active.dataset, &selection, kind, &state.config.dashboard)
    })
    .await;

    match rendered {
        Ok(Ok(png)) => file_response(png, "image/png", None),
        Ok(Err(e)) => e.into_response(),
        Err(response) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_CSV: &str = "Order ID,Order Date,Ship Date,Segment,Category,Product Name,Sales,Profit\n\
                               A-1,2024-01-05,2024-01-07,Consumer,Furniture,Chair,100,10\n\
                               A-2,2024-02-05,2024-02-07,Corporate,Technology,Phone,300,60\n";
    const UPLOAD_CSV: &str = "Order ID,Order Date,Ship Date,Segment,Category,Product Name,Sales,Profit\n\
                              B-1,2024-05-01,2024-05-03,Consumer,Furniture,Lamp,120,30\n";

    fn state_in(dir: &std::path::Path) -> AppState {
        let dataset = dir.join("default.csv");
        std::fs::write(&dataset, DEFAULT_CSV).unwrap();
        AppState::new(ServerConfig {
            dataset,
            ..ServerConfig::default()
        })
        .unwrap()
    }

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_query_means_default_selection() {
        assert_eq!(FilterQuery::default().into_selection(), FilterSelection::all());
    }

    #[test]
    fn submitted_form_with_unchecked_column_selects_nothing_there() {
        let query = FilterQuery {
            filtered: Some("1".to_string()),
            segment: labels(&["Consumer"]),
            category: labels(&["Furniture"]),
            product: Vec::new(),
        };
        let selection = query.into_selection();
        assert_eq!(selection.segments.unwrap().len(), 1);
        assert_eq!(selection.products, Some(BTreeSet::new()));
    }

    #[test]
    fn bare_labels_narrow_only_their_column() {
        let query = FilterQuery {
            segment: labels(&["Corporate"]),
            ..FilterQuery::default()
        };
        let selection = query.into_selection();
        assert!(selection.segments.is_some());
        assert!(selection.categories.is_none());
        assert!(selection.products.is_none());
    }

    #[test]
    fn repeated_upload_reuses_the_parsed_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        assert_eq!(state.replace_upload("toko.csv", UPLOAD_CSV.as_bytes()).unwrap(), 1);
        let first = state.active();
        assert_eq!(state.replace_upload("lagi.csv", UPLOAD_CSV.as_bytes()).unwrap(), 1);
        let second = state.active();

        assert!(Arc::ptr_eq(&first.dataset, &second.dataset));
        assert_eq!(
            second.source,
            DataSource::Upload {
                file_name: "lagi.csv".to_string()
            }
        );
        assert_eq!(lock(&state.cache).len(), 2);
    }

    #[test]
    fn failed_upload_keeps_the_active_dataset_and_reset_drops_the_upload() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        state.replace_upload("toko.csv", UPLOAD_CSV.as_bytes()).unwrap();

        assert!(state.replace_upload("rusak.csv", b"Order ID,Segment\nA-1,Consumer\n").is_err());
        assert_eq!(state.active().dataset.len(), 1);
        assert_eq!(lock(&state.cache).len(), 2);

        state.reset();
        assert_eq!(state.active().dataset.len(), 2);
        assert_eq!(lock(&state.cache).len(), 1);
    }

    #[tokio::test]
    async fn blocking_work_returns_its_value() {
        assert!(matches!(off_runtime(|| 2 + 2).await, Ok(4)));
        assert!(off_runtime(|| -> u8 { panic!("render failed") }).await.is_err());
    }
}
