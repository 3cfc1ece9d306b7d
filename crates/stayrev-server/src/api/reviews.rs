use axum::{extract::State, Extension, Json};
use serde::Serialize;
use stayrev_core::NormalizedReview;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct ReviewsData {
    reviews: Vec<NormalizedReview>,
    count: usize,
}

#[derive(Debug, Serialize)]
pub(super) struct ReviewCountData {
    count: i64,
}

/// Every stored normalized review, in the order the last batch was written.
pub(super) async fn list_reviews(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<ReviewsData>>, ApiError> {
    let reviews = stayrev_db::list_processed_reviews(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ReviewsData {
            count: reviews.len(),
            reviews,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn count_reviews(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<ReviewCountData>>, ApiError> {
    let count = stayrev_db::count_processed_reviews(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ReviewCountData { count },
        meta: ResponseMeta::new(req_id.0),
    }))
}
