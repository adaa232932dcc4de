//! Export job endpoint handlers.
//!
//! Covers both sides of the export lifecycle: the sourcing system announces
//! jobs and delivers files (create / store file / fail), and operators list
//! their jobs and preview a file's decoded rows.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use persistence::files::ExportFileStore;
use persistence::repositories::ExportJobRepository;
use tracing::{info, warn};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::OperatorContext;
use crate::middleware::metrics::record_export_file_stored;
use domain::models::export_job::{
    CreateExportJobRequest, ExportFileLead, ExportFileLeadsResponse, ExportJob, ExportJobStatus,
    FailExportJobRequest, ListExportJobsQuery, ListExportJobsResponse, StoreExportFileResponse,
};
use domain::services::decode_export;

/// List recent export jobs for the operator, with per-status counts.
///
/// GET /api/v1/export-jobs
pub async fn list_export_jobs(
    State(state): State<AppState>,
    operator: OperatorContext,
    Query(query): Query<ListExportJobsQuery>,
) -> Result<Json<ListExportJobsResponse>, ApiError> {
    query.validate()?;

    let repo = ExportJobRepository::new(state.pool.clone());
    let jobs = repo.list_recent(operator.operator_id, query.limit).await?;
    let summary = repo.counts_by_status(operator.operator_id).await?;

    Ok(Json(ListExportJobsResponse {
        jobs: jobs.into_iter().map(ExportJob::from).collect(),
        summary,
    }))
}

/// Announce a sourcing job, creating (or resetting) its pending record.
///
/// POST /api/v1/export-jobs
pub async fn create_export_job(
    State(state): State<AppState>,
    operator: OperatorContext,
    Json(request): Json<CreateExportJobRequest>,
) -> Result<(StatusCode, Json<ExportJob>), ApiError> {
    request.validate()?;

    let repo = ExportJobRepository::new(state.pool.clone());
    let entity = repo
        .create(operator.operator_id, &request.log_id, &request.file_name)
        .await?
        .ok_or_else(|| {
            ApiError::Conflict(format!(
                "Export job {} belongs to another operator",
                request.log_id
            ))
        })?;

    info!(
        operator_id = operator.operator_id,
        log_id = %request.log_id,
        file_name = %request.file_name,
        "Export job announced"
    );
    Ok((StatusCode::CREATED, Json(ExportJob::from(entity))))
}

/// Store the produced CSV for a job and mark it completed.
///
/// PUT /api/v1/export-jobs/:log_id/file
pub async fn store_export_file(
    State(state): State<AppState>,
    operator: OperatorContext,
    Path(log_id): Path<String>,
    body: String,
) -> Result<Json<StoreExportFileResponse>, ApiError> {
    if body.trim().is_empty() {
        return Err(ApiError::Validation(
            "Export file body must not be empty".to_string(),
        ));
    }

    let repo = ExportJobRepository::new(state.pool.clone());
    let entity = repo
        .find_by_log_id(operator.operator_id, &log_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Export job {} not found", log_id)))?;
    let job = ExportJob::from(entity);
    if job.status == ExportJobStatus::Failed {
        return Err(ApiError::Conflict(format!(
            "Export job {} is failed and cannot take a file",
            log_id
        )));
    }

    let location = ExportFileStore::location_for(&log_id);
    let checksum = state.files.write(&location, body.as_bytes()).await?;

    let updated = repo
        .set_file(operator.operator_id, &log_id, &location)
        .await?;
    if !updated {
        // The job went failed while the file was being written.
        let _ = state.files.delete(&location).await;
        return Err(ApiError::Conflict(format!(
            "Export job {} no longer accepts a file",
            log_id
        )));
    }

    record_export_file_stored(body.len() as u64);
    info!(
        operator_id = operator.operator_id,
        log_id = %log_id,
        bytes = body.len(),
        checksum = %checksum,
        "Export file stored"
    );
    Ok(Json(StoreExportFileResponse {
        log_id,
        file_location: location,
        checksum,
    }))
}

/// Mark a pending job failed on behalf of the sourcing system.
///
/// POST /api/v1/export-jobs/:log_id/fail
pub async fn fail_export_job(
    State(state): State<AppState>,
    operator: OperatorContext,
    Path(log_id): Path<String>,
    Json(request): Json<FailExportJobRequest>,
) -> Result<Json<ExportJob>, ApiError> {
    let repo = ExportJobRepository::new(state.pool.clone());
    let failed = repo.mark_failed(operator.operator_id, &log_id).await?;
    if !failed {
        return match repo.find_by_log_id(operator.operator_id, &log_id).await? {
            Some(_) => Err(ApiError::Conflict(format!(
                "Export job {} is not pending",
                log_id
            ))),
            None => Err(ApiError::NotFound(format!(
                "Export job {} not found",
                log_id
            ))),
        };
    }

    warn!(
        operator_id = operator.operator_id,
        log_id = %log_id,
        reason = request.reason.as_deref().unwrap_or("unspecified"),
        "Export job marked failed"
    );

    let entity = repo
        .find_by_log_id(operator.operator_id, &log_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Export job {} not found", log_id)))?;
    Ok(Json(ExportJob::from(entity)))
}

/// Decode the job's current file into reviewable records.
///
/// GET /api/v1/export-jobs/:log_id/leads
pub async fn list_export_file_leads(
    State(state): State<AppState>,
    operator: OperatorContext,
    Path(log_id): Path<String>,
) -> Result<Json<ExportFileLeadsResponse>, ApiError> {
    let repo = ExportJobRepository::new(state.pool.clone());
    let entity = repo
        .find_by_log_id(operator.operator_id, &log_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Export job {} not found", log_id)))?;
    let job = ExportJob::from(entity);
    let location = job
        .file_location
        .ok_or_else(|| ApiError::NotFound(format!("Export job {} has no stored file", log_id)))?;

    let text = state.files.read(&location).await?;
    let decoded = decode_export(&text);

    let records = decoded
        .records
        .iter()
        .map(|record| ExportFileLead {
            temp_id: record.temp_id,
            name: record.name.clone(),
            email: record.email.clone(),
            company_name: record.company_name.clone(),
            company_website: record.company_website.clone(),
            job_title: record.job_title.clone(),
            phone: record.phone.clone(),
            linkedin_url: record.linkedin_url.clone(),
            country_name: record.country_name.clone(),
            state_name: record.state_name.clone(),
        })
        .collect();

    Ok(Json(ExportFileLeadsResponse {
        log_id,
        records,
        total_rows: decoded.data_rows,
        skipped_rows: decoded.skipped_rows,
    }))
}
