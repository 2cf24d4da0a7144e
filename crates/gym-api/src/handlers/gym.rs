//! 健身房设置 API 处理器

use axum::{Extension, extract::State};
use validator::Validate;

use gym_domain::models::Gym;

use crate::auth::Claims;
use crate::dto::{ApiResponse, UpdateGymRequest};
use crate::error::Result;
use crate::extract::Json;
use crate::state::AppState;

/// 获取当前健身房
///
/// GET /api/gym
pub async fn get_gym(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<Gym>>> {
    let actor = claims.actor()?;
    let gym = state.gym_service.get_current(&actor).await?;
    Ok(Json(ApiResponse::success(gym)))
}

/// 修改健身房名称或货币
///
/// PUT /api/gym
pub async fn update_gym(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateGymRequest>,
) -> Result<Json<ApiResponse<Gym>>> {
    req.validate()?;

    let actor = claims.actor()?;
    let gym = state
        .gym_service
        .update_gym(&actor, req.name, req.currency)
        .await?;
    Ok(Json(ApiResponse::success(gym)))
}
