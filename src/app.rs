//! The equistat REST API.
//!
//! All dataset routes require HTTP Basic credentials for a registered user.
//! Uploaded CSV documents are validated before they are stored, so every
//! dataset reachable through the API is well formed.

use crate::app_state::{self, AppState, SharedAppState};
use crate::auth::CurrentUser;
use crate::dataset_store::DatasetMeta;
use crate::error::EquistatError;
use crate::metrics::{self, DATASET_UPLOADS};
use crate::models::{
    AuthResponse, DatasetInfo, FilterQuery, FilterResult, LoginRequest, RegisterRequest,
    SummaryStatistics, UserInfo,
};
use crate::operations;
use crate::report;
use crate::table;
use crate::user_store::{Principal, UserRecord};
use crate::validated_json::ValidatedJson;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use bytes::Bytes;
use tower::{Layer, ServiceBuilder};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::{event, Level};
use uuid::Uuid;

/// `Service` is the type of the equistat service, allowing it to be passed around.
pub type Service = NormalizePath<Router>;

/// Returns a [Service] for the equistat server.
pub fn service(state: SharedAppState) -> Service {
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

/// Returns a [Router] for the equistat server.
fn router(state: SharedAppState) -> Router {
    fn api(state: SharedAppState) -> Router {
        let body_limit = app_state::parse_size(&state.args.max_upload_size);
        Router::new()
            .route("/auth/register", post(register))
            .route("/auth/login", post(login))
            .route("/datasets", get(list_datasets).post(upload_dataset))
            .route(
                "/datasets/:dataset_id",
                get(get_dataset).delete(delete_dataset),
            )
            .route("/datasets/:dataset_id/summary", get(dataset_summary))
            .route("/datasets/:dataset_id/records", get(dataset_records))
            .route("/datasets/:dataset_id/report", get(dataset_report))
            .route("/admin/users", get(list_users))
            .route("/admin/users/:user_id", delete(delete_user))
            .layer(
                ServiceBuilder::new().layer(
                    TraceLayer::new_for_http()
                        .on_request(metrics::request_counter)
                        .on_response(metrics::record_response_metrics),
                ),
            )
            .layer(DefaultBodyLimit::max(body_limit))
            .with_state(state)
    }

    Router::new()
        .route("/.well-known/equistat-schema", get(schema))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api", api(state))
}

/// Describe the CSV schema accepted by the service.
async fn schema() -> impl IntoResponse {
    Json(serde_json::json!({
        "required_columns": ["Type", "Flowrate", "Pressure", "Temperature"],
        "name_aliases": table::NAME_ALIASES,
    }))
}

/// Register a new user account.
async fn register(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, EquistatError> {
    let record = state
        .user_store
        .register(
            &request.username,
            &request.password,
            request.email.as_deref().unwrap_or_default(),
            false,
        )
        .await?;
    event!(Level::INFO, username = %record.username, "registered user");
    let response = AuthResponse {
        id: record.id,
        username: record.username,
        email: record.email,
        message: "registration successful".to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Verify credentials, returning the account details.
async fn login(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, EquistatError> {
    let principal = state
        .user_store
        .authenticate(&request.username, &request.password)?;
    Ok(Json(AuthResponse {
        id: principal.id,
        username: principal.username,
        email: principal.email,
        message: "login successful".to_string(),
    }))
}

/// List datasets visible to the caller, most recent first.
///
/// Administrators see every dataset; other users see only their own.
async fn list_datasets(
    State(state): State<SharedAppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<Vec<DatasetInfo>>, EquistatError> {
    let datasets = if principal.is_admin {
        state.dataset_store.list()?
    } else {
        state.dataset_store.list_for_owner(principal.id)?
    };
    Ok(Json(datasets.iter().map(DatasetMeta::to_info).collect()))
}

/// Upload a CSV dataset.
///
/// The request must be a multipart form with a `file` part holding the CSV
/// document. The document is validated before it is stored; an upload that
/// fails validation is not retained.
async fn upload_dataset(
    State(state): State<SharedAppState>,
    CurrentUser(principal): CurrentUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, EquistatError> {
    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("dataset.csv").to_string();
            let data = field.bytes().await?;
            upload = Some((filename, data));
            break;
        }
    }
    let (filename, data) = upload.ok_or(EquistatError::MissingUploadFile)?;

    let _mem = state.resource_manager.memory(data.len()).await?;
    let validated = execute(&state, {
        let data = data.clone();
        move || table::validate(&data)
    })
    .await;
    let outcome = if validated.is_ok() { "accepted" } else { "rejected" };
    DATASET_UPLOADS.with_label_values(&[outcome]).inc();
    validated?;

    let (meta, evicted) = state
        .dataset_store
        .create(principal.id, &principal.username, &filename, data)
        .await?;
    event!(
        Level::INFO,
        dataset_id = %meta.id,
        owner = %principal.username,
        size_bytes = meta.size_bytes,
        evicted = evicted.len(),
        "stored dataset"
    );
    Ok((StatusCode::CREATED, Json(meta.to_info())))
}

/// Return metadata for one dataset.
async fn get_dataset(
    State(state): State<SharedAppState>,
    CurrentUser(principal): CurrentUser,
    Path(dataset_id): Path<Uuid>,
) -> Result<Json<DatasetInfo>, EquistatError> {
    let meta = visible_dataset(&state, &principal, dataset_id)?;
    Ok(Json(meta.to_info()))
}

/// Delete a dataset and its stored file.
async fn delete_dataset(
    State(state): State<SharedAppState>,
    CurrentUser(principal): CurrentUser,
    Path(dataset_id): Path<Uuid>,
) -> Result<StatusCode, EquistatError> {
    let meta = visible_dataset(&state, &principal, dataset_id)?;
    state.dataset_store.delete(meta.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Compute summary statistics for a dataset.
async fn dataset_summary(
    State(state): State<SharedAppState>,
    CurrentUser(principal): CurrentUser,
    Path(dataset_id): Path<Uuid>,
) -> Result<Json<SummaryStatistics>, EquistatError> {
    let meta = visible_dataset(&state, &principal, dataset_id)?;
    let data = state.dataset_store.read(&meta).await?;
    let _mem = state.resource_manager.memory(data.len()).await?;
    let summary = execute(&state, move || {
        let table = table::validate(&data)?;
        operations::summarize(&table)
    })
    .await?;
    Ok(Json(summary))
}

/// Return a filtered view of a dataset's records.
async fn dataset_records(
    State(state): State<SharedAppState>,
    CurrentUser(principal): CurrentUser,
    Path(dataset_id): Path<Uuid>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<FilterResult>, EquistatError> {
    let meta = visible_dataset(&state, &principal, dataset_id)?;
    let data = state.dataset_store.read(&meta).await?;
    let _mem = state.resource_manager.memory(data.len()).await?;
    let result = execute(&state, move || {
        let table = table::validate(&data)?;
        operations::filter(&table, &query)
    })
    .await?;
    Ok(Json(result))
}

/// Render a downloadable text report for a dataset.
async fn dataset_report(
    State(state): State<SharedAppState>,
    CurrentUser(principal): CurrentUser,
    Path(dataset_id): Path<Uuid>,
) -> Result<Response, EquistatError> {
    let meta = visible_dataset(&state, &principal, dataset_id)?;
    let data = state.dataset_store.read(&meta).await?;
    let _mem = state.resource_manager.memory(data.len()).await?;
    let summary = execute(&state, move || {
        let table = table::validate(&data)?;
        operations::summarize(&table)
    })
    .await?;
    let body = report::render(&meta, &summary);
    let headers = [
        (header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"dataset_{}_report.txt\"", meta.id),
        ),
    ];
    Ok((headers, body).into_response())
}

/// List all user accounts. Administrators only.
async fn list_users(
    State(state): State<SharedAppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<Vec<UserInfo>>, EquistatError> {
    require_admin(&principal)?;
    let users = state.user_store.list()?;
    Ok(Json(users.iter().map(UserRecord::to_info).collect()))
}

/// Delete a user account and all of their datasets. Administrators only.
async fn delete_user(
    State(state): State<SharedAppState>,
    CurrentUser(principal): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, EquistatError> {
    require_admin(&principal)?;
    if user_id == principal.id {
        return Err(EquistatError::DeleteCurrentUser);
    }
    let removed = state.user_store.delete(user_id).await?;
    let datasets = state.dataset_store.delete_for_owner(user_id).await?;
    event!(
        Level::INFO,
        username = %removed.username,
        datasets,
        "deleted user account"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch a dataset if the caller may act on it.
///
/// Datasets belonging to other users are reported as not found rather than
/// forbidden, so dataset identifiers cannot be probed.
fn visible_dataset(
    state: &AppState,
    principal: &Principal,
    dataset_id: Uuid,
) -> Result<DatasetMeta, EquistatError> {
    let meta = state.dataset_store.get(dataset_id)?;
    if meta.owner_id == principal.id || principal.is_admin {
        Ok(meta)
    } else {
        Err(EquistatError::DatasetNotFound { dataset_id })
    }
}

fn require_admin(principal: &Principal) -> Result<(), EquistatError> {
    if principal.is_admin {
        Ok(())
    } else {
        Err(EquistatError::Forbidden)
    }
}

/// Run an analysis step, offloading to the rayon pool when configured.
async fn execute<T, F>(state: &AppState, f: F) -> Result<T, EquistatError>
where
    F: FnOnce() -> Result<T, EquistatError> + Send + 'static,
    T: Send + 'static,
{
    let _task = state.resource_manager.task().await?;
    if state.args.use_rayon {
        tokio_rayon::spawn(f).await
    } else {
        f()
    }
}
