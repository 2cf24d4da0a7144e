//! 仪表盘统计 API 处理器

use axum::{Extension, extract::State};

use gym_domain::models::OverviewStats;

use crate::auth::Claims;
use crate::dto::ApiResponse;
use crate::error::Result;
use crate::extract::Json;
use crate::state::AppState;

/// 总览统计，教练看不到财务数据
///
/// GET /api/stats/overview
pub async fn overview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<OverviewStats>>> {
    let actor = claims.actor()?;
    let stats = state.stats_service.overview(&actor).await?;
    Ok(Json(ApiResponse::success(stats)))
}
