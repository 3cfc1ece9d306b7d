use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct IngestionRunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct IngestionRunItem {
    ingestion_run_id: Uuid,
    trigger_source: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    raw_count: i32,
    records_processed: i32,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<stayrev_db::IngestionRunRow> for IngestionRunItem {
    fn from(row: stayrev_db::IngestionRunRow) -> Self {
        Self {
            ingestion_run_id: row.public_id,
            trigger_source: row.trigger_source,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            raw_count: row.raw_count,
            records_processed: row.records_processed,
            error_message: row.error_message,
            created_at: row.created_at,
        }
    }
}

pub(super) async fn list_ingestion_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<IngestionRunsQuery>,
) -> Result<Json<ApiResponse<Vec<IngestionRunItem>>>, ApiError> {
    let rows = stayrev_db::list_ingestion_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(IngestionRunItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::IngestionRunItem;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn ingestion_run_item_is_serializable() {
        let item = IngestionRunItem {
            ingestion_run_id: Uuid::new_v4(),
            trigger_source: "cli".to_string(),
            status: "failed".to_string(),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            raw_count: 12,
            records_processed: 0,
            error_message: Some("model output was not a JSON array".to_string()),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&item).expect("serialize ingestion run");
        assert!(json.contains("\"raw_count\":12"));
        assert!(json.contains("\"status\":\"failed\""));
    }
}
