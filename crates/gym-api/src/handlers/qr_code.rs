//! 二维码 API 处理器
//!
//! 管理员维护购买/充值二维码，会员扫码后按二维码类型增加额度

use axum::{
    Extension,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use validator::Validate;

use gym_domain::models::{QrCode, QrScan, ScanOutcome};
use gym_domain::service::{CreateQrCodeInput, ScanInput};

use crate::auth::Claims;
use crate::dto::{
    ApiResponse, CreateQrCodeRequest, DeletedResponse, PageResponse, PaginationParams,
    QrCodeQuery, ScanRequest, SetQrCodeStatusRequest,
};
use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// 创建二维码，服务端生成随机码
///
/// POST /api/qr-codes
pub async fn create_qr_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateQrCodeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<QrCode>>)> {
    req.validate()?;

    let actor = claims.actor()?;
    let qr_code = state
        .qr_service
        .create(&actor, CreateQrCodeInput::from(req))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(qr_code))))
}

/// 二维码列表
///
/// GET /api/qr-codes
pub async fn list_qr_codes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<QrCodeQuery>,
) -> Result<Json<ApiResponse<PageResponse<QrCode>>>> {
    let actor = claims.actor()?;
    let page = pagination.pagination();
    let result = state.qr_service.list(&actor, query.into(), page).await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(result, page))))
}

/// 二维码详情
///
/// GET /api/qr-codes/{id}
pub async fn get_qr_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<QrCode>>> {
    let actor = claims.actor()?;
    let qr_code = state.qr_service.get(&actor, id).await?;
    Ok(Json(ApiResponse::success(qr_code)))
}

/// 启用或停用二维码
///
/// PATCH /api/qr-codes/{id}/status
pub async fn set_qr_code_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<SetQrCodeStatusRequest>,
) -> Result<Json<ApiResponse<QrCode>>> {
    let actor = claims.actor()?;
    let qr_code = state.qr_service.set_active(&actor, id, req.active).await?;
    Ok(Json(ApiResponse::success(qr_code)))
}

/// 删除未被扫过的二维码
///
/// DELETE /api/qr-codes/{id}
pub async fn delete_qr_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DeletedResponse>>> {
    let actor = claims.actor()?;
    state.qr_service.delete(&actor, id).await?;
    Ok(Json(ApiResponse::success(DeletedResponse { id })))
}

/// 扫码记录
///
/// GET /api/qr-codes/{id}/scans
pub async fn list_qr_scans(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<QrScan>>>> {
    let actor = claims.actor()?;
    let page = pagination.pagination();
    let result = state.qr_service.list_scans(&actor, id, page).await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(result, page))))
}

/// 扫码
///
/// 幂等键可放在请求体或 `Idempotency-Key` 头中；重放返回 200，首次成功返回 201
///
/// POST /api/qr-codes/scan
pub async fn scan_qr_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    Json(req): Json<ScanRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ScanOutcome>>)> {
    req.validate()?;

    let idempotency_key = req.idempotency_key.or_else(|| {
        headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty() && v.len() <= 100)
            .map(str::to_string)
    });

    let actor = claims.actor()?;
    let outcome = state
        .qr_service
        .scan(
            &actor,
            ScanInput {
                code: req.code,
                member_id: req.member_id,
                idempotency_key,
            },
        )
        .await?;

    let status = if outcome.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(ApiResponse::success(outcome))))
}
