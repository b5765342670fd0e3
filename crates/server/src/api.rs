//! Substitution HTTP API.
//!
//! - `POST   /load-nomenclature`      upload a catalog workbook or delimited export, either as
//!                                      the multipart field `file` or as the raw request body
//! - `GET    /nomenclature`           loaded catalog with upload metadata
//! - `DELETE /nomenclature`           drop the loaded catalog
//! - `GET    /predict/{product_id}`   ranked substitutes for an out-of-stock product
//! - `POST   /train` and `/train/`    record substitutes handed out in practice

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        multipart::Multipart, rejection::JsonRejection, DefaultBodyLimit, FromRequest, Path, Query,
        Request, State,
    },
    http::{header, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use pairadox_core::catalog::{parse_upload, CatalogIndex};
use pairadox_core::config::ServerConfig;
use pairadox_core::domain::product::{ProductCode, ProductListing};
use pairadox_core::errors::{ApplicationError, InterfaceError};
use pairadox_core::substitution::{Prediction, SubstitutionEngine};
use pairadox_db::repositories::{CatalogRepository, CatalogSnapshot};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_SOURCE_NAME: &str = "upload";
const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct ApiState {
    engine: Arc<SubstitutionEngine>,
    repository: Arc<dyn CatalogRepository>,
    /// Held across persist + publish so the served catalog is always the stored one.
    catalog_writes: Arc<Mutex<()>>,
}

impl ApiState {
    pub fn new(engine: Arc<SubstitutionEngine>, repository: Arc<dyn CatalogRepository>) -> Self {
        Self { engine, repository, catalog_writes: Arc::new(Mutex::new(())) }
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct UploadQuery {
    /// File name reported for the upload, e.g. `catalog.csv`; overrides the multipart file name
    pub source: Option<String>,
}

/// Catalog file as received, before parsing.
#[derive(Debug, Clone)]
pub struct CatalogUpload {
    pub file_name: Option<String>,
    pub contents: Bytes,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadResponse {
    pub message: String,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct NomenclatureResponse {
    pub count: usize,
    pub loaded_at: Option<DateTime<Utc>>,
    pub source_name: Option<String>,
    pub products: Vec<ProductListing>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

/// Product identifier as sent by clients: spreadsheet exports often carry numeric codes.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ProductIdParam {
    Text(String),
    Number(i64),
}

impl From<ProductIdParam> for ProductCode {
    fn from(value: ProductIdParam) -> Self {
        match value {
            ProductIdParam::Text(text) => ProductCode::new(text.trim()),
            ProductIdParam::Number(number) => ProductCode::new(number.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubstituteEntry {
    pub real_sub: ProductIdParam,
}

#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    pub product_out_id: ProductIdParam,
    #[serde(default)]
    pub zero_stock_data: Vec<SubstituteEntry>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainResponse {
    pub message: String,
    pub trained: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub error: String,
    pub correlation_id: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: ApiState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/load-nomenclature", post(load_nomenclature))
        .route("/nomenclature", get(nomenclature).delete(clear_nomenclature))
        .route("/predict/{product_id}", get(predict))
        .route("/train", post(train))
        .route("/train/", post(train))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// `"*"` among the configured origins allows any origin.
pub fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins = if server.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let allowed: Vec<HeaderValue> = server
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
        AllowOrigin::list(allowed)
    };

    CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn load_nomenclature(
    State(state): State<ApiState>,
    Query(query): Query<UploadQuery>,
    request: Request,
) -> ApiResult<LoadResponse> {
    let correlation_id = new_correlation_id();
    let upload = read_upload(&state, request)
        .await
        .map_err(|(status, detail)| rejection_error(status, detail, &correlation_id))?;

    let source_name = query
        .source
        .or_else(|| upload.file_name.clone())
        .map(|source| source.trim().to_string())
        .filter(|source| !source.is_empty())
        .unwrap_or_else(|| DEFAULT_SOURCE_NAME.to_string());

    publish_upload(&state, upload, source_name, &correlation_id).await
}

/// Multipart forms carry the catalog in their `file` field; any other body is the file itself.
async fn read_upload(
    state: &ApiState,
    request: Request,
) -> Result<CatalogUpload, (StatusCode, String)> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if !is_multipart {
        let contents = Bytes::from_request(request, state)
            .await
            .map_err(|rejection| (rejection.status(), rejection.body_text()))?;
        return Ok(CatalogUpload { file_name: None, contents });
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|rejection| (rejection.status(), rejection.body_text()))?;
    while let Some(field) =
        multipart.next_field().await.map_err(|error| (error.status(), error.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let contents = field.bytes().await.map_err(|error| (error.status(), error.body_text()))?;
        return Ok(CatalogUpload { file_name, contents });
    }

    Err((StatusCode::BAD_REQUEST, format!("multipart upload has no `{UPLOAD_FIELD}` field")))
}

async fn publish_upload(
    state: &ApiState,
    upload: CatalogUpload,
    source_name: String,
    correlation_id: &str,
) -> ApiResult<LoadResponse> {
    let rows = parse_upload(upload.file_name.as_deref(), &upload.contents)
        .map_err(|error| api_error(ApplicationError::from(error), correlation_id))?;
    let index = CatalogIndex::build(&rows)
        .map_err(|error| api_error(ApplicationError::from(error), correlation_id))?;

    // stored first; the engine only ever serves a persisted catalog
    let summary = {
        let _writes = state.catalog_writes.lock().await;
        state
            .repository
            .replace(CatalogSnapshot::new(source_name.clone(), rows))
            .await
            .map_err(|error| {
                api_error(ApplicationError::Persistence(error.to_string()), correlation_id)
            })?;
        state.engine.install(index)
    };

    info!(
        event_name = "catalog.load.completed",
        correlation_id = %correlation_id,
        source_name = %source_name,
        rows = summary.rows,
        products = summary.products,
        "catalog loaded"
    );

    Ok(Json(LoadResponse {
        message: "Nomenclature loaded successfully!".to_string(),
        count: summary.products,
    }))
}

pub async fn nomenclature(State(state): State<ApiState>) -> ApiResult<NomenclatureResponse> {
    let correlation_id = new_correlation_id();
    let metadata = state.repository.metadata().await.map_err(|error| {
        api_error(ApplicationError::Persistence(error.to_string()), &correlation_id)
    })?;
    let info = state.engine.catalog_info();

    Ok(Json(NomenclatureResponse {
        count: info.count,
        loaded_at: metadata.as_ref().map(|metadata| metadata.loaded_at),
        source_name: metadata.map(|metadata| metadata.source_name),
        products: info.products,
    }))
}

pub async fn clear_nomenclature(State(state): State<ApiState>) -> ApiResult<MessageResponse> {
    let correlation_id = new_correlation_id();
    {
        let _writes = state.catalog_writes.lock().await;
        state.repository.clear().await.map_err(|error| {
            api_error(ApplicationError::Persistence(error.to_string()), &correlation_id)
        })?;
        state.engine.clear_catalog();
    }

    info!(
        event_name = "catalog.cleared",
        correlation_id = %correlation_id,
        "catalog cleared"
    );

    Ok(Json(MessageResponse { message: "Nomenclature cleared".to_string() }))
}

pub async fn predict(
    State(state): State<ApiState>,
    Path(product_id): Path<String>,
) -> ApiResult<Prediction> {
    let correlation_id = new_correlation_id();
    let code = ProductCode::new(product_id.trim());

    let prediction = state
        .engine
        .predict(&code)
        .map_err(|error| api_error(ApplicationError::from(error), &correlation_id))?;

    info!(
        event_name = "prediction.served",
        correlation_id = %correlation_id,
        product_id = %code,
        candidates = prediction.substitutes.len(),
        "prediction served"
    );

    Ok(Json(prediction))
}

pub async fn train(
    State(state): State<ApiState>,
    payload: Result<Json<TrainRequest>, JsonRejection>,
) -> ApiResult<TrainResponse> {
    let correlation_id = new_correlation_id();
    let Json(request) = payload.map_err(|rejection| {
        api_error(ApplicationError::InvalidRequest(rejection.body_text()), &correlation_id)
    })?;
    let source = ProductCode::from(request.product_out_id);
    let substitutes: Vec<ProductCode> = request
        .zero_stock_data
        .into_iter()
        .map(|entry| ProductCode::from(entry.real_sub))
        .collect();

    let receipt = state.engine.record_outcome(&source, &substitutes);

    info!(
        event_name = "feedback.recorded",
        correlation_id = %correlation_id,
        product_id = %source,
        trained = receipt.trained,
        exposure = receipt.exposure,
        "substitution feedback recorded"
    );

    Ok(Json(TrainResponse { message: format!("Trained product {source}"), trained: receipt.trained }))
}

fn api_error(error: ApplicationError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    let error = error.into_interface(correlation_id);
    let status = match &error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    warn!(
        event_name = "api.request.failed",
        correlation_id = %error.correlation_id(),
        status = status.as_u16(),
        error = %error.message(),
        "request failed"
    );

    // only bad requests expose their detail
    let message = match &error {
        InterfaceError::BadRequest { message, .. } => message.clone(),
        other => other.user_message().to_string(),
    };

    (status, Json(ApiError { error: message, correlation_id: error.correlation_id().to_string() }))
}

/// Failures raised by axum before a handler sees the request, in the usual error shape.
fn rejection_error(
    status: StatusCode,
    detail: String,
    correlation_id: &str,
) -> (StatusCode, Json<ApiError>) {
    warn!(
        event_name = "api.request.rejected",
        correlation_id = %correlation_id,
        status = status.as_u16(),
        error = %detail,
        "request rejected"
    );

    (status, Json(ApiError { error: detail, correlation_id: correlation_id.to_string() }))
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}
