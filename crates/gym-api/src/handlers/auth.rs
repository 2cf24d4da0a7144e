//! 认证相关的 HTTP 处理器
//!
//! 提供健身房注册、会员注册、登录、登出、获取当前账号、刷新 Token 和修改密码的 API

use axum::{Extension, extract::State, http::StatusCode};
use tracing::info;
use validator::Validate;

use gym_domain::service::{AuthenticatedAccount, LoginInput, RegisterGymInput, SignupInput};

use crate::auth::Claims;
use crate::dto::{
    ApiResponse, ChangePasswordRequest, CurrentAccountResponse, LoginRequest, LoginResponse,
    RegisterGymRequest, SignupRequest, TokenResponse,
};
use crate::error::Result;
use crate::extract::Json;
use crate::state::AppState;

/// 签发 Token 并组装登录响应
fn issue_login(state: &AppState, authenticated: AuthenticatedAccount) -> Result<LoginResponse> {
    let (token, expires_at) = state.jwt_manager.generate_token(&authenticated.account)?;
    let permissions = authenticated.account.role.permissions();
    Ok(LoginResponse {
        token,
        expires_at,
        account: authenticated.account,
        gym: authenticated.gym,
        permissions,
    })
}

/// 注册健身房并创建首个管理员
///
/// POST /api/auth/register-gym
pub async fn register_gym(
    State(state): State<AppState>,
    Json(req): Json<RegisterGymRequest>,
) -> Result<(StatusCode, Json<ApiResponse<LoginResponse>>)> {
    req.validate()?;

    let authenticated = state
        .gym_service
        .register_gym(RegisterGymInput::from(req))
        .await?;
    info!(
        gym_id = authenticated.gym.id,
        account_id = authenticated.account.id,
        "健身房注册成功"
    );

    let response = issue_login(&state, authenticated)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// 会员自助注册
///
/// 新账号角色为 pending_member，需管理员审核后才能预约
///
/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<ApiResponse<LoginResponse>>)> {
    req.validate()?;

    let authenticated = state.account_service.signup(SignupInput::from(req)).await?;
    let response = issue_login(&state, authenticated)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// 登录
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>> {
    req.validate()?;

    let authenticated = state.account_service.login(LoginInput::from(req)).await?;
    let response = issue_login(&state, authenticated)?;
    Ok(Json(ApiResponse::success(response)))
}

/// 登出
///
/// Token 无状态，客户端丢弃即可
///
/// POST /api/auth/logout
pub async fn logout() -> Json<ApiResponse<()>> {
    Json(ApiResponse::<()>::success_empty())
}

/// 获取当前账号
///
/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<CurrentAccountResponse>>> {
    let actor = claims.actor()?;
    let account = state.account_service.me(&actor).await?;
    let permissions = account.role.permissions();
    Ok(Json(ApiResponse::success(CurrentAccountResponse {
        account,
        permissions,
    })))
}

/// 刷新 Token
///
/// 重新加载账号，角色变更和禁用在刷新时生效
///
/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<TokenResponse>>> {
    let actor = claims.actor()?;
    let account = state.account_service.ensure_active(&actor).await?;
    let (token, expires_at) = state.jwt_manager.generate_token(&account)?;
    Ok(Json(ApiResponse::success(TokenResponse { token, expires_at })))
}

/// 修改自己的密码
///
/// PUT /api/auth/password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>> {
    req.validate()?;

    let actor = claims.actor()?;
    state
        .account_service
        .change_password(&actor, &req.old_password, &req.new_password)
        .await?;
    Ok(Json(ApiResponse::<()>::success_with_message((), "密码已修改")))
}
