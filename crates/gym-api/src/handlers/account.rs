//! 账号管理 API 处理器
//!
//! 实现账号的 CRUD、状态切换、重置密码以及额度调整和账本查询

use axum::{Extension, extract::State, http::StatusCode};
use tracing::info;
use validator::Validate;

use gym_domain::models::{Account, QuotaLedgerEntry};
use gym_domain::service::{CreateAccountInput, UpdateAccountInput};

use crate::auth::Claims;
use crate::dto::{
    AccountQuery, AdjustQuotaRequest, ApiResponse, CreateAccountRequest, DeletedResponse,
    PageResponse, PaginationParams, ResetPasswordRequest, SetAccountStatusRequest,
    UpdateAccountRequest,
};
use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

/// 账号列表
///
/// GET /api/accounts
pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<AccountQuery>,
) -> Result<Json<ApiResponse<PageResponse<Account>>>> {
    let actor = claims.actor()?;
    let page = pagination.pagination();
    let result = state
        .account_service
        .list(&actor, query.into(), page)
        .await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(result, page))))
}

/// 账号详情，本人或员工可查看
///
/// GET /api/accounts/{id}
pub async fn get_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Account>>> {
    let actor = claims.actor()?;
    let account = state.account_service.get(&actor, id).await?;
    Ok(Json(ApiResponse::success(account)))
}

/// 创建账号
///
/// POST /api/accounts
pub async fn create_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Account>>)> {
    req.validate()?;

    let actor = claims.actor()?;
    let account = state
        .account_service
        .create(&actor, CreateAccountInput::from(req))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(account))))
}

/// 更新账号资料或角色
///
/// PUT /api/accounts/{id}
pub async fn update_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<Json<ApiResponse<Account>>> {
    req.validate()?;

    let actor = claims.actor()?;
    let account = state
        .account_service
        .update(&actor, id, UpdateAccountInput::from(req))
        .await?;
    Ok(Json(ApiResponse::success(account)))
}

/// 启用或禁用账号
///
/// PATCH /api/accounts/{id}/status
pub async fn set_account_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<SetAccountStatusRequest>,
) -> Result<Json<ApiResponse<Account>>> {
    let actor = claims.actor()?;
    let account = state
        .account_service
        .set_status(&actor, id, req.status)
        .await?;
    Ok(Json(ApiResponse::success(account)))
}

/// 管理员重置密码
///
/// POST /api/accounts/{id}/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>> {
    req.validate()?;

    let actor = claims.actor()?;
    state
        .account_service
        .reset_password(&actor, id, &req.new_password)
        .await?;
    Ok(Json(ApiResponse::<()>::success_with_message((), "密码已重置")))
}

/// 删除账号
///
/// DELETE /api/accounts/{id}
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DeletedResponse>>> {
    let actor = claims.actor()?;
    state.account_service.delete(&actor, id).await?;
    Ok(Json(ApiResponse::success(DeletedResponse { id })))
}

/// 手动调整额度
///
/// POST /api/accounts/{id}/quota
pub async fn adjust_quota(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<AdjustQuotaRequest>,
) -> Result<Json<ApiResponse<QuotaLedgerEntry>>> {
    req.validate()?;

    let actor = claims.actor()?;
    let entry = state
        .quota_service
        .adjust(&actor, id, req.delta, req.reason)
        .await?;
    info!(
        account_id = id,
        delta = req.delta,
        operator_id = actor.account_id,
        "额度已调整"
    );
    Ok(Json(ApiResponse::success(entry)))
}

/// 额度账本，本人或员工可查看
///
/// GET /api/accounts/{id}/quota-ledger
pub async fn list_quota_ledger(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<QuotaLedgerEntry>>>> {
    let actor = claims.actor()?;
    let page = pagination.pagination();
    let result = state.quota_service.list_ledger(&actor, id, page).await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(result, page))))
}

/// 当前账号的额度账本
///
/// GET /api/me/quota-ledger
pub async fn my_quota_ledger(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<QuotaLedgerEntry>>>> {
    let actor = claims.actor()?;
    let page = pagination.pagination();
    let result = state
        .quota_service
        .list_ledger(&actor, actor.account_id, page)
        .await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(result, page))))
}
