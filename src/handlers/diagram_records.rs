//! Diagram records handlers
//!
//! GET /api/diagrams/{diagram}/records and GET /api/diagrams/{diagram}/latest
//! endpoints serving chart data.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::models::diagram_query::{
    DiagramRecordEntry, DiagramRecordsQuery, DiagramRecordsResponse, ErrorResponse, LatestRecordsQuery,
    LatestRecordsResponse,
};
use crate::services::record_store::{Comparison, Condition, RecordFilter, SortOrder};
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn invalid_query(error: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error,
            code: Some("INVALID_QUERY".to_string()),
        }),
    )
}

fn store_failure(e: StoreError) -> ApiError {
    match e {
        StoreError::NotProvisioned(table) => {
            warn!(table = %table, "Diagram storage not provisioned");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: format!("Storage not provisioned: table '{}' is missing", table),
                    code: Some("NOT_PROVISIONED".to_string()),
                }),
            )
        }
        other => {
            error!(error = %other, "Database error fetching diagram records");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Database error: {}", other),
                    code: Some("DATABASE_ERROR".to_string()),
                }),
            )
        }
    }
}

fn query_rejected(rejection: QueryRejection) -> ApiError {
    warn!(error = %rejection.body_text(), "Rejected query string");
    invalid_query(rejection.body_text())
}

/// GET /api/diagrams/{diagram}/records
///
/// Returns one page of records, newest page first, sorted ascending.
///
/// # Query Parameters
/// - `page`: 1-based page (default: 1)
/// - `limit`: page size, 1..=5000 (default: 100)
/// - `consolidation-type`: comma-separated codes (default: 0)
/// - `start` / `end`: inclusive UTC bounds
///
/// # Response
/// - 200: Records and total count
/// - 400: Invalid query parameter
/// - 503: Storage not provisioned
/// - 500: Database error
pub async fn get_diagram_records(
    State(state): State<AppState>,
    Path(diagram): Path<String>,
    query: Result<Query<DiagramRecordsQuery>, QueryRejection>,
) -> Result<Json<DiagramRecordsResponse>, ApiError> {
    let Query(query) = query.map_err(query_rejected)?;
    let page = query.validate().map_err(invalid_query)?;

    info!(
        diagram = %diagram,
        page = page.page,
        limit = page.limit,
        "Fetching diagram records"
    );

    let mut filter = RecordFilter::for_diagram(diagram.as_str())
        .with(Condition::ConsolidationType(Comparison::In(page.types.clone())));
    filter = match (page.start, page.end) {
        (Some(start), Some(end)) => filter.with(Condition::MeasurementTime(Comparison::Between(start, end))),
        (Some(start), None) => filter.with(Condition::MeasurementTime(Comparison::Gte(start))),
        (None, Some(end)) => filter.with(Condition::MeasurementTime(Comparison::Lte(end))),
        (None, None) => filter,
    };

    let total_count = state.store.count_records(&filter).await.map_err(store_failure)?;

    let mut records = state
        .store
        .find_records(&filter, SortOrder::Desc, page.limit, page.offset())
        .await
        .map_err(store_failure)?;
    records.reverse();

    info!(diagram = %diagram, count = records.len(), total_count = total_count, "Diagram records query completed");

    Ok(Json(DiagramRecordsResponse {
        data: records.into_iter().map(DiagramRecordEntry::from).collect(),
        total_count,
    }))
}

/// GET /api/diagrams/{diagram}/latest
///
/// Returns the newest record of each requested consolidation type. Types
/// without records are left out.
pub async fn get_latest_records(
    State(state): State<AppState>,
    Path(diagram): Path<String>,
    query: Result<Query<LatestRecordsQuery>, QueryRejection>,
) -> Result<Json<LatestRecordsResponse>, ApiError> {
    let Query(query) = query.map_err(query_rejected)?;
    let types = query.validate().map_err(invalid_query)?;

    let mut records = Vec::with_capacity(types.len());
    for kind in types {
        let filter = RecordFilter::for_diagram(diagram.as_str()).consolidation_type(kind);
        let newest = state
            .store
            .find_records(&filter, SortOrder::Desc, 1, 0)
            .await
            .map_err(store_failure)?;
        records.extend(newest.into_iter().map(DiagramRecordEntry::from));
    }

    Ok(Json(LatestRecordsResponse { diagram, records }))
}
