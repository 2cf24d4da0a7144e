//! 操作日志查询处理器

use axum::{Extension, extract::State};

use gym_domain::models::OperationLog;

use crate::auth::Claims;
use crate::dto::{ApiResponse, OperationLogQuery, PageResponse, PaginationParams};
use crate::error::Result;
use crate::extract::{Json, Query};
use crate::state::AppState;

/// 操作日志列表
///
/// GET /api/operation-logs
pub async fn list_operation_logs(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<OperationLogQuery>,
) -> Result<Json<ApiResponse<PageResponse<OperationLog>>>> {
    let actor = claims.actor()?;
    let page = pagination.pagination();
    let result = state.audit_service.list(&actor, query.into(), page).await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(result, page))))
}
