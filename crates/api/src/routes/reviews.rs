//! Review endpoint handlers.
//!
//! Accept/reject/undo delegate to the reconciliation engine; the recent
//! ledger is a keyset-paginated read over stored leads.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, Utc};
use persistence::repositories::{LeadRepository, LedgerQuery};
use shared::pagination::ReviewCursor;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::OperatorContext;
use domain::models::lead::Lead;
use domain::models::review::{
    AcceptReviewsRequest, AcceptReviewsResponse, RecentReviewsQuery, RecentReviewsResponse,
    RejectReviewsRequest, RejectReviewsResponse, UndoReviewRequest, UndoReviewResponse,
};

/// Accept selected rows from an export.
///
/// POST /api/v1/export-jobs/:log_id/reviews/accept
pub async fn accept_reviews(
    State(state): State<AppState>,
    operator: OperatorContext,
    Path(log_id): Path<String>,
    Json(request): Json<AcceptReviewsRequest>,
) -> Result<Json<AcceptReviewsResponse>, ApiError> {
    request.validate()?;
    check_selection_size(&request.temp_ids, state.config.review.max_selection)?;

    let outcome = state
        .engine
        .accept(
            operator.operator_id,
            &log_id,
            &request.temp_ids,
            request.campaign_id.as_deref(),
            operator.default_campaign.as_deref(),
        )
        .await?;

    Ok(Json(AcceptReviewsResponse::from(outcome)))
}

/// Reject selected rows from an export.
///
/// POST /api/v1/export-jobs/:log_id/reviews/reject
pub async fn reject_reviews(
    State(state): State<AppState>,
    operator: OperatorContext,
    Path(log_id): Path<String>,
    Json(request): Json<RejectReviewsRequest>,
) -> Result<Json<RejectReviewsResponse>, ApiError> {
    request.validate()?;
    check_selection_size(&request.temp_ids, state.config.review.max_selection)?;

    let outcome = state
        .engine
        .reject(operator.operator_id, &log_id, &request.temp_ids)
        .await?;

    Ok(Json(RejectReviewsResponse::from(outcome)))
}

/// Flip a reviewed lead to the other verdict inside the undo window.
///
/// POST /api/v1/leads/:lead_id/review/undo
pub async fn undo_review(
    State(state): State<AppState>,
    operator: OperatorContext,
    Path(lead_id): Path<i64>,
    Json(request): Json<UndoReviewRequest>,
) -> Result<Json<UndoReviewResponse>, ApiError> {
    let outcome = state
        .engine
        .undo(operator.operator_id, lead_id, request.target_status)
        .await?;

    Ok(Json(UndoReviewResponse::from(outcome)))
}

/// Leads reviewed within the undo window, newest first.
///
/// GET /api/v1/reviews/recent
pub async fn recent_reviews(
    State(state): State<AppState>,
    operator: OperatorContext,
    Query(query): Query<RecentReviewsQuery>,
) -> Result<Json<RecentReviewsResponse>, ApiError> {
    query.validate()?;

    let cursor = match query.cursor.as_deref() {
        Some(raw) => Some(ReviewCursor::decode(raw)?),
        None => None,
    };

    let cutoff = Utc::now() - Duration::hours(i64::from(state.config.review.undo_window_hours));
    let repo = LeadRepository::new(state.pool.clone());
    let page = repo
        .recently_reviewed(&LedgerQuery {
            user_id: operator.operator_id,
            cutoff,
            status: query.filter.status(),
            cursor: cursor.map(|c| (c.reviewed_at, c.lead_id)),
            limit: query.limit,
        })
        .await?;

    let next_cursor = page
        .next_cursor
        .map(|(reviewed_at, lead_id)| ReviewCursor::new(reviewed_at, lead_id).encode());

    Ok(Json(RecentReviewsResponse {
        reviews: page.leads.into_iter().map(Lead::from).collect(),
        next_cursor,
    }))
}

/// Cap one review call to a manageable selection.
fn check_selection_size(temp_ids: &[u32], max: usize) -> Result<(), ApiError> {
    if temp_ids.len() > max {
        return Err(ApiError::Validation(format!(
            "tempIds must not exceed {} entries",
            max
        )));
    }
    Ok(())
}
